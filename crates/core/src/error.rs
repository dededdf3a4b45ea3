//! Error types for gomodrun operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for gomodrun operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving, building, running or tidying tools.
///
/// None of these are retried. Subprocess failures carry the combined
/// stdout/stderr of the failing command in `output`.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// No `go.mod` was found walking upward from the start directory.
    #[error("go.mod not found in {} or any parent directory", start.display())]
    #[diagnostic(
        code(gomodrun::root_not_found),
        help("Run gomodrun inside a Go module, or pass --pkg-root <dir>")
    )]
    RootNotFound {
        /// Directory the search started from.
        start: PathBuf,
    },

    /// The project root has no `go.mod`.
    #[error("go.mod not found at {}", path.display())]
    #[diagnostic(
        code(gomodrun::manifest_not_found),
        help("The package root must contain a go.mod file")
    )]
    ManifestNotFound {
        /// Expected location of the manifest.
        path: PathBuf,
    },

    /// `go.mod` is malformed.
    #[error("{}:{line}: {message}", path.display())]
    #[diagnostic(
        code(gomodrun::manifest_parse),
        help("Fix the go.mod syntax, `go mod tidy` can help")
    )]
    ManifestParse {
        /// Path of the manifest.
        path: PathBuf,
        /// One-based line of the offending directive.
        line: usize,
        /// What is wrong.
        message: String,
    },

    /// The tools sources could not be scanned.
    #[error("can't read tools imports in {}: {message}", dir.display())]
    #[diagnostic(
        code(gomodrun::scanner),
        help("Add a tools.go file guarded by `//go:build tools` that blank-imports your tools")
    )]
    Scanner {
        /// Directory that was scanned.
        dir: PathBuf,
        /// Why no declarations could be read.
        message: String,
    },

    /// The requested binary is not imported by the tools file.
    #[error("cant find bin {binary} in tools file")]
    #[diagnostic(
        code(gomodrun::binary_not_declared),
        help("Add a blank import of the tool's main package to tools.go")
    )]
    BinaryNotDeclared {
        /// Normalized binary name.
        binary: String,
    },

    /// The import declaring the binary has no matching requirement.
    #[error("cant find require for module {import} in go.mod")]
    #[diagnostic(
        code(gomodrun::requirement_not_found),
        help("Run `go mod tidy` so go.mod requires every module imported by tools.go")
    )]
    RequirementNotFound {
        /// The declared import path.
        import: String,
    },

    /// The toolchain version could not be determined.
    #[error("failed to query go version: {message}")]
    #[diagnostic(
        code(gomodrun::toolchain_probe),
        help("Make sure `go` is installed and on PATH, or set GOMODRUN_GO")
    )]
    ToolchainProbe {
        /// What went wrong.
        message: String,
    },

    /// `go mod download` failed.
    #[error("downloading module {module} failed: {output}")]
    #[diagnostic(code(gomodrun::download_failed))]
    DownloadFailed {
        /// Module that was being fetched.
        module: String,
        /// Combined output of the download command.
        output: String,
    },

    /// The module source is not in the module store, even after downloading.
    #[error("module source not found at {}", path.display())]
    #[diagnostic(
        code(gomodrun::module_source_not_found),
        help("Check GOMODCACHE/GOPATH point at the module store used by `go mod download`")
    )]
    ModuleSourceNotFound {
        /// Location that was searched.
        path: PathBuf,
    },

    /// Synthesizing a `go.mod` in a temporary module copy failed.
    #[error("initializing modules {module} go.mod failed: {output}")]
    #[diagnostic(code(gomodrun::module_init_failed))]
    ModuleInitFailed {
        /// Module name passed to `go mod init`.
        module: String,
        /// Combined output of the init command.
        output: String,
    },

    /// `go build` failed.
    #[error("building {binary} failed: {output}")]
    #[diagnostic(code(gomodrun::build_failed))]
    BuildFailed {
        /// Binary being built.
        binary: String,
        /// Combined output of the build command.
        output: String,
    },

    /// The cached binary could not be started.
    #[error("failed to start {}: {source}", path.display())]
    #[diagnostic(
        code(gomodrun::exec_start_failed),
        help("Delete the cached binary or run `gomodrun --tidy` to force a rebuild")
    )]
    ExecStartFailed {
        /// Cached binary path.
        path: PathBuf,
        /// Underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation failed while tidying the cache.
    #[error("tidy {operation} failed at {}: {source}", path.display())]
    #[diagnostic(
        code(gomodrun::tidy_io),
        help("Tidy is safe to re-run once the path is accessible again")
    )]
    TidyIo {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Path the operation was applied to.
        path: PathBuf,
        /// Description of the operation.
        operation: String,
    },

    /// I/O error outside of tidy.
    #[error("I/O error during {operation}{}: {source}", path.as_ref().map(|p| format!(" at {}", p.display())).unwrap_or_default())]
    #[diagnostic(code(gomodrun::io))]
    Io {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
        /// Optional path where the error occurred.
        path: Option<PathBuf>,
        /// Description of the operation being performed.
        operation: String,
    },
}

impl Error {
    /// Create an I/O error for an operation on `path`.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
            operation: operation.into(),
        }
    }

    /// Create a tidy I/O error for an operation on `path`.
    #[must_use]
    pub fn tidy_io(
        source: std::io::Error,
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
    ) -> Self {
        Self::TidyIo {
            source,
            path: path.into(),
            operation: operation.into(),
        }
    }

    /// Create a scanner error for `dir`.
    #[must_use]
    pub fn scanner(dir: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scanner {
            dir: dir.into(),
            message: message.into(),
        }
    }

    /// Create a manifest parse error.
    #[must_use]
    pub fn manifest_parse(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::ManifestParse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a toolchain probe error.
    #[must_use]
    pub fn toolchain_probe(message: impl Into<String>) -> Self {
        Self::ToolchainProbe {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            source,
            path: None,
            operation: "file operation".to_string(),
        }
    }
}
