//! Per-project cache of built tool binaries.
//!
//! ## Layout
//!
//! Binaries live under the project root, keyed by toolchain version and the
//! versioned command path of the package they were built from:
//!
//! ```text
//! <root>/.gomodrun/
//!   go1.22.1/
//!     github.com/golangci/golangci-lint@v1.55.2/
//!       cmd/golangci-lint/
//!         golangci-lint
//! ```
//!
//! An entry is built on first use and never rebuilt: existence is the only
//! freshness check. Changing the toolchain or the pinned version selects a
//! different path, and [`tidy`] removes the entries nothing points at any
//! more.
//!
//! Builds go to a uniquely named partial file next to the destination and are
//! renamed into place, so a concurrent first build of the same entry never
//! exposes a half-written binary. A build killed before the rename leaves its
//! partial file behind; [`tidy`] removes those.

pub mod materialize;
pub mod tidy;

pub use materialize::{BuildableSource, materialize_buildable_source};
pub use tidy::{TidyReport, tidy};

use crate::paths::{find_module_root, join_slash_path, module_source_path};
use crate::toolchain::Toolchain;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Suffix of the temporary file a build writes before it is renamed into place.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Whether `path` names a partial build output (`.<binary>.<random>.partial`).
#[must_use]
pub fn is_partial_build(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.ends_with(PARTIAL_SUFFIX))
}

/// Name of the cached executable for `binary` on this platform.
///
/// On Windows `.exe` is appended unless already present.
#[must_use]
pub fn executable_name(binary: &str) -> String {
    if cfg!(windows) && !binary.ends_with(crate::resolve::EXE_SUFFIX) {
        format!("{binary}{}", crate::resolve::EXE_SUFFIX)
    } else {
        binary.to_string()
    }
}

/// Split a versioned command path into its `<module>@<version>` prefix and
/// the package subpath.
///
/// `github.com/a/b@v1.0.0/cmd/b` gives `("github.com/a/b@v1.0.0", "cmd/b")`.
#[must_use]
pub fn split_command_path(command_path: &str) -> (&str, &str) {
    let Some(at) = command_path.find('@') else {
        return (command_path, "");
    };
    match command_path[at..].find('/') {
        Some(slash) => (&command_path[..at + slash], &command_path[at + slash + 1..]),
        None => (command_path, ""),
    }
}

/// The binary cache of one project.
#[derive(Debug, Clone)]
pub struct BinaryCache {
    root: PathBuf,
}

impl BinaryCache {
    /// Cache rooted at `<project_root>/<cache_dir_name>`.
    #[must_use]
    pub fn new(project_root: &Path, cache_dir_name: &str) -> Self {
        Self {
            root: project_root.join(cache_dir_name),
        }
    }

    /// The cache directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every entry built with toolchain `version`.
    #[must_use]
    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    /// Path of the cached executable for `binary` built from `command_path`.
    #[must_use]
    pub fn binary_path(&self, version: &str, command_path: &str, binary: &str) -> PathBuf {
        join_slash_path(&self.version_dir(version), command_path).join(executable_name(binary))
    }

    /// Return the cached executable for `binary`, building it first if needed.
    ///
    /// # Errors
    ///
    /// Propagates toolchain failures ([`Error::ToolchainProbe`],
    /// [`Error::DownloadFailed`], [`Error::ModuleInitFailed`],
    /// [`Error::BuildFailed`]), returns [`Error::ModuleSourceNotFound`] if the
    /// module source is missing from the store after downloading, and
    /// [`Error::Io`] for filesystem failures.
    pub fn get_or_build(
        &self,
        toolchain: &dyn Toolchain,
        project_root: &Path,
        binary: &str,
        command_path: &str,
    ) -> Result<PathBuf> {
        let version = toolchain.version()?;
        let binary_path = self.binary_path(&version, command_path, binary);

        if binary_path.exists() {
            debug!(path = %binary_path.display(), "Cache hit");
            return Ok(binary_path);
        }
        debug!(path = %binary_path.display(), "Cache miss");

        let store = toolchain.module_store()?;
        let source_dir = module_source_path(&store, command_path);
        if !source_dir.exists() {
            let (module, _) = split_command_path(command_path);
            toolchain.download_module(project_root, module)?;
            if !source_dir.exists() {
                return Err(Error::ModuleSourceNotFound { path: source_dir });
            }
        }

        let module_root = find_module_root(&store, &source_dir)?;
        let source = materialize_buildable_source(toolchain, &store, &module_root, &source_dir)?;

        let built = self.build_into_place(toolchain, source.path(), &binary_path);
        source.cleanup();
        built?;

        info!(%binary, path = %binary_path.display(), "Cached tool binary");
        Ok(binary_path)
    }

    fn build_into_place(&self, toolchain: &dyn Toolchain, source_dir: &Path, binary_path: &Path) -> Result<()> {
        let parent = binary_path.parent().unwrap_or(&self.root);
        fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create cache directory"))?;

        let file_name = binary_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let partial = tempfile::Builder::new()
            .prefix(&format!(".{file_name}."))
            .suffix(PARTIAL_SUFFIX)
            .tempfile_in(parent)
            .map_err(|e| Error::io(e, parent, "create partial binary"))?
            .into_temp_path();

        toolchain.build(source_dir, &partial)?;

        if let Err(e) = partial.persist(binary_path) {
            // Another process won the race to the same entry.
            if binary_path.exists() {
                warn!(path = %binary_path.display(), error = %e.error, "Binary appeared during build, keeping it");
                return Ok(());
            }
            return Err(Error::io(e.error, binary_path, "move binary into cache"));
        }
        Ok(())
    }
}
