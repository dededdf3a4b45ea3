//! Go build constraint evaluation.
//!
//! Supports both `//go:build` expressions and legacy `// +build` lines, plus
//! the `_GOOS`/`_GOARCH` file name suffixes.
//!
//! Release tags are lenient: every `go1.N` is satisfied, whatever the
//! installed toolchain. Files are selected before the toolchain is probed, so
//! a tools file guarded by a newer release tag is still scanned and the
//! toolchain reports the mismatch when it builds.

use std::collections::HashSet;

/// GOOS values known to the Go toolchain.
const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

/// GOARCH values known to the Go toolchain.
const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// GOOS values that satisfy the `unix` tag.
const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// The set of tags a file is matched against.
#[derive(Debug, Clone)]
pub struct BuildContext {
    goos: String,
    goarch: String,
    tags: HashSet<String>,
}

impl BuildContext {
    /// Context for the host platform with extra `tags` enabled.
    #[must_use]
    pub fn host(tags: &[&str]) -> Self {
        Self::new(host_goos(), host_goarch(), tags)
    }

    /// Context for an explicit platform.
    #[must_use]
    pub fn new(goos: &str, goarch: &str, tags: &[&str]) -> Self {
        let mut set: HashSet<String> = tags.iter().map(|t| (*t).to_string()).collect();
        set.insert(goos.to_string());
        set.insert(goarch.to_string());
        set.insert("gc".to_string());
        set.insert("cgo".to_string());
        if UNIX_OS.contains(&goos) {
            set.insert("unix".to_string());
        }
        // GOOS=android implies linux, GOOS=illumos implies solaris, ios implies darwin.
        match goos {
            "android" => {
                set.insert("linux".to_string());
            }
            "illumos" => {
                set.insert("solaris".to_string());
            }
            "ios" => {
                set.insert("darwin".to_string());
            }
            _ => {}
        }

        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            tags: set,
        }
    }

    /// Whether a single tag is satisfied.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag) || is_release_tag(tag)
    }

    /// Whether the `_GOOS`/`_GOARCH` suffixes of `file_name` match.
    #[must_use]
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        let stem = file_name.strip_suffix(".go").unwrap_or(file_name);
        let stem = stem.strip_suffix("_test").unwrap_or(stem);
        let parts: Vec<&str> = stem.split('_').collect();
        // The first element is the name proper; `linux.go` carries no constraint.
        if parts.len() < 2 {
            return true;
        }

        let last = parts[parts.len() - 1];
        let second_last = if parts.len() >= 3 {
            Some(parts[parts.len() - 2])
        } else {
            None
        };

        if let Some(os) = second_last
            && KNOWN_OS.contains(&os)
            && KNOWN_ARCH.contains(&last)
        {
            return self.has_tag(os) && last == self.goarch;
        }
        if KNOWN_OS.contains(&last) {
            return self.has_tag(last);
        }
        if KNOWN_ARCH.contains(&last) {
            return last == self.goarch;
        }
        true
    }

    /// Evaluate a `//go:build` expression (the text after `//go:build`).
    ///
    /// # Errors
    ///
    /// Returns a message describing the syntax error.
    pub fn eval_go_build(&self, expr: &str) -> Result<bool, String> {
        let tokens = lex_expr(expr)?;
        let mut parser = ExprParser {
            tokens: &tokens,
            pos: 0,
            ctx: self,
        };
        let value = parser.or()?;
        if parser.pos != tokens.len() {
            return Err(format!("unexpected token in build constraint: {expr}"));
        }
        Ok(value)
    }

    /// Evaluate one legacy `// +build` line (the text after `+build`).
    ///
    /// Space-separated options are OR-ed, comma-separated terms AND-ed.
    #[must_use]
    pub fn eval_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(tag) => !self.has_tag(tag),
                None => self.has_tag(term),
            })
        })
    }

    /// The GOOS this context targets.
    #[must_use]
    pub fn goos(&self) -> &str {
        &self.goos
    }
}

/// Release tags `go1.N` are always satisfied.
fn is_release_tag(tag: &str) -> bool {
    tag.strip_prefix("go1.")
        .is_some_and(|minor| !minor.is_empty() && minor.bytes().all(|b| b.is_ascii_digit()))
}

/// Map the Rust target OS onto GOOS.
#[must_use]
pub fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

/// Map the Rust target architecture onto GOARCH.
#[must_use]
pub fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Not,
    And,
    Or,
    Open,
    Close,
    Tag(String),
}

fn lex_expr(expr: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = expr.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(ch) {
                    return Err(format!("invalid operator {ch} in build constraint"));
                }
                tokens.push(if ch == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        tag.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Tag(tag));
            }
            other => return Err(format!("invalid character {other:?} in build constraint")),
        }
    }

    if tokens.is_empty() {
        return Err("empty build constraint".to_string());
    }
    Ok(tokens)
}

struct ExprParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    ctx: &'a BuildContext,
}

impl ExprParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Result<bool, String> {
        let mut value = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<bool, String> {
        let mut value = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let rhs = self.not()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn not(&mut self) -> Result<bool, String> {
        match self.tokens.get(self.pos) {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(!self.not()?)
            }
            Some(Token::Open) => {
                self.pos += 1;
                let value = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("missing ) in build constraint".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            Some(Token::Tag(tag)) => {
                self.pos += 1;
                Ok(self.ctx.has_tag(tag))
            }
            _ => Err("expected tag in build constraint".to_string()),
        }
    }
}
