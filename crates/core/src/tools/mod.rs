//! Tool declaration scanning.
//!
//! Projects pin their CLI tools by blank-importing them from a Go file that
//! only builds under the `tools` tag:
//!
//! ```go
//! //go:build tools
//!
//! package tools
//!
//! import (
//!     _ "github.com/golangci/golangci-lint/cmd/golangci-lint"
//!     _ "github.com/onsi/ginkgo/v2/ginkgo"
//! )
//! ```
//!
//! The scanner selects the Go files of the project root that build under the
//! `tools` tag, the same way `go build -tags tools` would, and collects their
//! imports.

pub mod constraint;

use crate::{Error, Result};
use constraint::BuildContext;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Build tag guarding the tools file.
pub const TOOLS_BUILD_TAG: &str = "tools";

/// Imports declared by the tools sources of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDeclarations {
    /// Directory that was scanned.
    pub dir: PathBuf,
    /// Files that matched the build tag.
    pub files: Vec<PathBuf>,
    /// Unique import paths, sorted.
    pub imports: Vec<String>,
}

impl ToolDeclarations {
    /// Iterate over the declared import paths in scan order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(String::as_str)
    }
}

/// Scan `root` for the imports of its `tools`-tagged Go files.
///
/// # Errors
///
/// Returns [`Error::Scanner`] if the directory cannot be read, a matching
/// file has a malformed package/import header, or no file matches.
pub fn scan_tool_imports(root: &Path) -> Result<ToolDeclarations> {
    scan_with_context(root, &BuildContext::host(&[TOOLS_BUILD_TAG]))
}

/// Like [`scan_tool_imports`] with an explicit build context.
///
/// # Errors
///
/// See [`scan_tool_imports`].
pub fn scan_with_context(root: &Path, ctx: &BuildContext) -> Result<ToolDeclarations> {
    let entries = std::fs::read_dir(root).map_err(|e| Error::scanner(root, e.to_string()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::scanner(root, e.to_string()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".go")
            || name.ends_with("_test.go")
            || name.starts_with('_')
            || name.starts_with('.')
            || !ctx.matches_file_name(&name)
        {
            continue;
        }
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        candidates.push(entry.path());
    }
    candidates.sort();

    let mut files = Vec::new();
    let mut imports = BTreeSet::new();
    for path in candidates {
        let source = std::fs::read_to_string(&path).map_err(|e| Error::scanner(root, format!("{}: {e}", path.display())))?;
        let header = parse_header(&source).map_err(|msg| Error::scanner(root, format!("{}: {msg}", path.display())))?;

        let included = header
            .constraint(ctx)
            .map_err(|msg| Error::scanner(root, format!("{}: {msg}", path.display())))?;
        if !included {
            tracing::trace!(file = %path.display(), "Excluded by build constraints");
            continue;
        }

        imports.extend(header.imports);
        files.push(path);
    }

    if files.is_empty() {
        return Err(Error::scanner(
            root,
            format!("no buildable Go source files with build tag {TOOLS_BUILD_TAG}"),
        ));
    }

    tracing::debug!(dir = %root.display(), files = files.len(), imports = imports.len(), "Scanned tool declarations");

    Ok(ToolDeclarations {
        dir: root.to_path_buf(),
        files,
        imports: imports.into_iter().collect(),
    })
}

/// The parts of a Go file that precede its first non-import declaration.
#[derive(Debug, Default, PartialEq, Eq)]
struct Header {
    go_build: Option<String>,
    plus_build: Vec<String>,
    package: String,
    imports: Vec<String>,
}

impl Header {
    fn constraint(&self, ctx: &BuildContext) -> std::result::Result<bool, String> {
        if let Some(expr) = &self.go_build {
            return ctx.eval_go_build(expr);
        }
        Ok(self.plus_build.iter().all(|line| ctx.eval_plus_build(line)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Punct(char),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    /// Line comments seen before the `package` clause.
    leading_comments: Vec<&'a str>,
    seen_token: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.strip_prefix('\u{feff}').unwrap_or(src),
            pos: 0,
            leading_comments: Vec::new(),
            seen_token: false,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn next_token(&mut self) -> std::result::Result<Option<Tok>, String> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();

            if let Some(comment) = trimmed.strip_prefix("//") {
                let end = comment.find('\n').unwrap_or(comment.len());
                if !self.seen_token {
                    self.leading_comments.push(&comment[..end]);
                }
                self.pos += 2 + end;
                continue;
            }
            if let Some(comment) = trimmed.strip_prefix("/*") {
                let end = comment
                    .find("*/")
                    .ok_or_else(|| "comment not terminated".to_string())?;
                self.pos += 2 + end + 2;
                continue;
            }
            break;
        }

        let rest = self.rest();
        let Some(ch) = rest.chars().next() else {
            return Ok(None);
        };
        self.seen_token = true;

        if ch.is_alphabetic() || ch == '_' {
            let len = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_'))
                .unwrap_or(rest.len());
            self.pos += len;
            return Ok(Some(Tok::Ident(rest[..len].to_string())));
        }

        if ch == '"' {
            let mut value = String::new();
            let mut chars = rest.char_indices().skip(1);
            while let Some((idx, c)) = chars.next() {
                match c {
                    '"' => {
                        self.pos += idx + 1;
                        return Ok(Some(Tok::Str(value)));
                    }
                    '\\' => match chars.next() {
                        Some((_, escaped)) => value.push(escaped),
                        None => break,
                    },
                    '\n' => break,
                    c => value.push(c),
                }
            }
            return Err("string literal not terminated".to_string());
        }

        if ch == '`' {
            let body = &rest[1..];
            let end = body
                .find('`')
                .ok_or_else(|| "raw string literal not terminated".to_string())?;
            self.pos += end + 2;
            return Ok(Some(Tok::Str(body[..end].to_string())));
        }

        self.pos += ch.len_utf8();
        Ok(Some(Tok::Punct(ch)))
    }
}

fn parse_header(src: &str) -> std::result::Result<Header, String> {
    let mut lexer = Lexer::new(src);

    match lexer.next_token()? {
        Some(Tok::Ident(kw)) if kw == "package" => {}
        _ => return Err("expected 'package' clause".to_string()),
    }
    let package = match lexer.next_token()? {
        Some(Tok::Ident(name)) => name,
        _ => return Err("expected package name".to_string()),
    };

    let mut header = Header {
        package,
        ..Header::default()
    };
    for comment in &lexer.leading_comments {
        if let Some(expr) = comment.strip_prefix("go:build") {
            if header.go_build.is_none() {
                header.go_build = Some(expr.trim().to_string());
            }
        } else if let Some(line) = comment.trim_start().strip_prefix("+build") {
            header.plus_build.push(line.trim().to_string());
        }
    }

    let mut token = lexer.next_token()?;
    loop {
        if token == Some(Tok::Punct(';')) {
            token = lexer.next_token()?;
            continue;
        }
        match token {
            Some(Tok::Ident(ref kw)) if kw == "import" => {}
            _ => break,
        }

        match lexer.next_token()? {
            Some(Tok::Punct('(')) => loop {
                match lexer.next_token()? {
                    Some(Tok::Punct(')')) => break,
                    Some(Tok::Punct(';')) => continue,
                    Some(tok) => {
                        let path = import_spec(&mut lexer, tok)?;
                        header.imports.push(path);
                    }
                    None => return Err("unterminated import block".to_string()),
                }
            },
            Some(tok) => {
                let path = import_spec(&mut lexer, tok)?;
                header.imports.push(path);
            }
            None => return Err("expected import path".to_string()),
        }

        token = lexer.next_token()?;
    }

    Ok(header)
}

/// Parse `[name] "path"` given its first token.
fn import_spec(lexer: &mut Lexer<'_>, first: Tok) -> std::result::Result<String, String> {
    let path_tok = match first {
        Tok::Ident(_) | Tok::Punct('.') => lexer.next_token()?,
        tok => Some(tok),
    };

    match path_tok {
        Some(Tok::Str(path)) if !path.is_empty() => Ok(path),
        Some(Tok::Str(_)) => Err("empty import path".to_string()),
        other => Err(format!("expected import path, found {other:?}")),
    }
}
