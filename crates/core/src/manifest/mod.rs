//! `go.mod` reader.
//!
//! Only the directives gomodrun needs are interpreted (`module`, `go` and
//! `require`). The remaining directives of the go.mod grammar are accepted
//! and skipped so that real-world manifests parse cleanly.

use crate::paths::MANIFEST_FILE;
use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Directives accepted in a go.mod file.
const KNOWN_DIRECTIVES: &[&str] = &[
    "module",
    "go",
    "toolchain",
    "godebug",
    "require",
    "replace",
    "exclude",
    "retract",
    "tool",
    "ignore",
];

/// A single `require` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Module path, e.g. `github.com/onsi/ginkgo`.
    pub path: String,
    /// Resolved version, e.g. `v1.16.5`.
    pub version: String,
    /// Marked `// indirect`.
    pub indirect: bool,
}

impl Requirement {
    /// `<path>@<version>`, the module's identity in the store and the cache.
    #[must_use]
    pub fn versioned_path(&self) -> String {
        format!("{}@{}", self.path, self.version)
    }

    /// Whether this module provides `import`.
    ///
    /// Matches on path segment boundaries, so `example.com/foo` provides
    /// `example.com/foo/cmd` but not `example.com/foobar`.
    #[must_use]
    pub fn provides(&self, import: &str) -> bool {
        import
            .strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Parsed go.mod.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoMod {
    /// Path of the file this was read from.
    pub path: PathBuf,
    /// Module path declared by `module`.
    pub module: Option<String>,
    /// Language version declared by `go`.
    pub go_version: Option<String>,
    /// Requirements in declaration order.
    pub requirements: Vec<Requirement>,
}

impl GoMod {
    /// Find the requirement that provides `import`.
    ///
    /// When nested modules both match (`example.com/x` and
    /// `example.com/x/tools`), the longest module path wins; among equal
    /// lengths the first declared wins.
    #[must_use]
    pub fn requirement_for(&self, import: &str) -> Option<&Requirement> {
        self.requirements
            .iter()
            .filter(|req| req.provides(import))
            .fold(None, |best: Option<&Requirement>, req| match best {
                Some(b) if b.path.len() >= req.path.len() => Some(b),
                _ => Some(req),
            })
    }
}

/// Read and parse `<root>/go.mod`.
///
/// # Errors
///
/// Returns [`Error::ManifestNotFound`] if the file does not exist and
/// [`Error::ManifestParse`] if it is malformed.
pub fn read_go_mod(root: &Path) -> Result<GoMod> {
    let path = root.join(MANIFEST_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::ManifestNotFound { path });
        }
        Err(e) => return Err(Error::io(e, path, "reading go.mod")),
    };

    parse_go_mod(&path, &contents)
}

/// Parse go.mod `contents`; `path` is used for error reporting.
///
/// # Errors
///
/// Returns [`Error::ManifestParse`] on malformed input.
pub fn parse_go_mod(path: &Path, contents: &str) -> Result<GoMod> {
    let mut parser = Parser {
        path,
        manifest: GoMod {
            path: path.to_path_buf(),
            ..GoMod::default()
        },
        block: None,
    };

    for (idx, raw) in contents.lines().enumerate() {
        parser.line(idx + 1, raw)?;
    }

    if let Some((directive, line)) = parser.block {
        return Err(Error::manifest_parse(
            path,
            line,
            format!("unterminated {directive} block"),
        ));
    }

    Ok(parser.manifest)
}

struct Parser<'a> {
    path: &'a Path,
    manifest: GoMod,
    /// Directive of the open `(` block and the line it opened on.
    block: Option<(String, usize)>,
}

impl Parser<'_> {
    fn line(&mut self, line: usize, raw: &str) -> Result<()> {
        let (code, comment) = split_comment(raw);
        let tokens = tokenize(code).map_err(|msg| Error::manifest_parse(self.path, line, msg))?;
        let indirect = comment.is_some_and(|c| c.trim() == "indirect" || c.trim().starts_with("indirect;"));

        if let Some((directive, _)) = &self.block {
            if tokens.first().map(String::as_str) == Some(")") {
                if tokens.len() > 1 {
                    return Err(Error::manifest_parse(
                        self.path,
                        line,
                        "unexpected tokens after )",
                    ));
                }
                self.block = None;
                return Ok(());
            }
            if tokens.is_empty() {
                return Ok(());
            }
            let directive = directive.clone();
            return self.directive(line, &directive, &tokens, indirect);
        }

        let Some((head, rest)) = tokens.split_first() else {
            return Ok(());
        };

        if !KNOWN_DIRECTIVES.contains(&head.as_str()) {
            return Err(Error::manifest_parse(
                self.path,
                line,
                format!("unknown directive: {head}"),
            ));
        }

        if rest.first().map(String::as_str) == Some("(") {
            if rest.len() > 1 {
                return Err(Error::manifest_parse(
                    self.path,
                    line,
                    "unexpected tokens after (",
                ));
            }
            self.block = Some((head.clone(), line));
            return Ok(());
        }

        self.directive(line, head, rest, indirect)
    }

    fn directive(&mut self, line: usize, directive: &str, args: &[String], indirect: bool) -> Result<()> {
        match directive {
            "module" => {
                let [module] = args else {
                    return Err(Error::manifest_parse(self.path, line, "usage: module module/path"));
                };
                self.manifest.module = Some(module.clone());
            }
            "go" => {
                let [version] = args else {
                    return Err(Error::manifest_parse(self.path, line, "usage: go 1.23"));
                };
                self.manifest.go_version = Some(version.clone());
            }
            "require" => {
                let [module, version] = args else {
                    return Err(Error::manifest_parse(
                        self.path,
                        line,
                        "usage: require module/path v1.2.3",
                    ));
                };
                validate_version(version)
                    .map_err(|msg| Error::manifest_parse(self.path, line, format!("{module}: {msg}")))?;
                self.manifest.requirements.push(Requirement {
                    path: module.clone(),
                    version: version.clone(),
                    indirect,
                });
            }
            _ => {
                if args.is_empty() {
                    return Err(Error::manifest_parse(
                        self.path,
                        line,
                        format!("{directive} directive has no arguments"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Split a line at its `//` comment, ignoring `//` inside quoted strings.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' && q == b'"' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => {
                if b == b'"' || b == b'`' {
                    quote = Some(b);
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    return (&line[..i], Some(&line[i + 2..]));
                }
            }
        }
        i += 1;
    }
    (line, None)
}

/// Split a comment-free line into tokens. Quoted strings are unquoted,
/// parentheses and brackets are separate tokens.
fn tokenize(code: &str) -> std::result::Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = code.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
        } else if matches!(ch, '(' | ')' | '[' | ']' | ',') {
            tokens.push(ch.to_string());
            chars.next();
        } else if ch == '"' || ch == '`' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some(c) = chars.next() {
                if c == ch {
                    closed = true;
                    break;
                }
                if c == '\\' && ch == '"' {
                    match chars.next() {
                        Some(escaped) => value.push(escaped),
                        None => break,
                    }
                } else {
                    value.push(c);
                }
            }
            if !closed {
                return Err("unterminated quoted string".to_string());
            }
            tokens.push(value);
        } else {
            let mut value = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | ',' | '"' | '`') {
                    break;
                }
                value.push(c);
                chars.next();
            }
            tokens.push(value);
        }
    }

    Ok(tokens)
}

/// Module versions are `v` followed by a semantic version.
fn validate_version(version: &str) -> std::result::Result<(), String> {
    let Some(semver_part) = version.strip_prefix('v') else {
        return Err(format!("invalid version {version}: must start with v"));
    };
    semver::Version::parse(semver_part)
        .map(|_| ())
        .map_err(|e| format!("invalid version {version}: {e}"))
}
