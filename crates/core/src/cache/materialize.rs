//! Buildable copies of modules that ship without a `go.mod`.
//!
//! Modules predating Go modules are stored read-only and without a manifest,
//! so `go build` refuses them in module mode. Such a module is copied into a
//! temporary directory, made writable and given a synthesized `go.mod`.

use crate::paths::module_name_from_store_path;
use crate::toolchain::Toolchain;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Source directory ready for `go build`.
///
/// When the source had to be copied, the temporary copy is owned here and
/// removed by [`BuildableSource::cleanup`] or on drop.
#[derive(Debug)]
pub struct BuildableSource {
    path: PathBuf,
    temp: Option<TempDir>,
}

impl BuildableSource {
    /// Use `path` in place.
    #[must_use]
    pub fn in_place(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            temp: None,
        }
    }

    /// Directory to run the build in.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the source lives in a temporary copy.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.temp.is_some()
    }

    /// Remove the temporary copy, if any. Failures are logged and ignored.
    pub fn cleanup(self) {
        if let Some(temp) = self.temp {
            let dir = temp.path().to_path_buf();
            if let Err(e) = temp.close() {
                warn!(dir = %dir.display(), error = %e, "Failed to remove temporary module copy");
            }
        }
    }
}

/// Prepare `source_dir` (inside `module_root`) for building.
///
/// If `module_root` has a `go.mod` the source is used in place. Otherwise the
/// module root is copied into a fresh temporary directory, `go mod init` is
/// run there with the module's path, and the returned source points at the
/// same subdirectory inside the copy.
///
/// # Errors
///
/// Returns [`Error::Io`] if the copy fails, [`Error::ModuleSourceNotFound`]
/// if the module path cannot be derived, and [`Error::ModuleInitFailed`] if
/// the toolchain cannot initialize the copy.
pub fn materialize_buildable_source(
    toolchain: &dyn Toolchain,
    store: &Path,
    module_root: &Path,
    source_dir: &Path,
) -> Result<BuildableSource> {
    if module_root.join(crate::paths::MANIFEST_FILE).is_file() {
        return Ok(BuildableSource::in_place(source_dir));
    }

    let module = module_name_from_store_path(store, module_root).ok_or_else(|| {
        Error::ModuleSourceNotFound {
            path: module_root.to_path_buf(),
        }
    })?;

    let prefix = module_root
        .file_name()
        .map(|n| n.to_string_lossy().replace('@', "-"))
        .unwrap_or_else(|| "gomodrun".to_string());
    let temp = tempfile::Builder::new()
        .prefix(&format!("{prefix}-"))
        .tempdir()
        .map_err(|e| Error::io(e, std::env::temp_dir(), "create temporary directory"))?;

    debug!(
        %module,
        from = %module_root.display(),
        to = %temp.path().display(),
        "Copying module without go.mod"
    );
    copy_tree(module_root, temp.path())?;

    toolchain.init_module(temp.path(), &module)?;

    let relative = source_dir.strip_prefix(module_root).unwrap_or(Path::new(""));
    Ok(BuildableSource {
        path: temp.path().join(relative),
        temp: Some(temp),
    })
}

/// Recursively copy `from` into the existing directory `to`, making the copy
/// writable by its owner.
fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            Error::io(std::io::Error::other(e), path, "walk module source")
        })?;

        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::io(e, &target, "create directory"))?;
            set_writable(&target, true)?;
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target).map_err(|e| Error::io(e, &target, "copy file"))?;
            set_writable(&target, false)?;
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular file");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn set_writable(path: &Path, is_dir: bool) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|e| Error::io(e, path, "read metadata"))?;
    let mut permissions = metadata.permissions();
    let mode = if is_dir {
        0o755
    } else {
        permissions.mode() | 0o200
    };
    permissions.set_mode(mode);
    fs::set_permissions(path, permissions).map_err(|e| Error::io(e, path, "set permissions"))
}

#[cfg(not(unix))]
fn set_writable(path: &Path, _is_dir: bool) -> Result<()> {
    let metadata = fs::metadata(path).map_err(|e| Error::io(e, path, "read metadata"))?;
    let mut permissions = metadata.permissions();
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions).map_err(|e| Error::io(e, path, "set permissions"))
}
