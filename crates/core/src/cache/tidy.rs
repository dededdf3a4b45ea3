//! Removal of stale cache entries.
//!
//! An entry is stale when it was built by another toolchain version, or when
//! its `<module>@<version>` no longer matches any tool the project declares
//! and requires. Partial outputs of interrupted builds are always stale.
//! Tidy is monotonic: a failure part-way leaves a smaller but
//! still valid cache, and running it again is always safe.

use super::{BinaryCache, is_partial_build};
use crate::manifest::read_go_mod;
use crate::paths::slash_relative;
use crate::resolve::versioned_imports;
use crate::toolchain::Toolchain;
use crate::tools::scan_tool_imports;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// What a tidy run removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TidyReport {
    /// Top-level entries belonging to other toolchain versions.
    pub removed_toolchains: usize,
    /// Binaries whose module version is no longer declared.
    pub removed_binaries: usize,
    /// Partial files left behind by interrupted builds.
    pub removed_partials: usize,
    /// Directories left empty by the removals.
    pub removed_dirs: usize,
}

impl TidyReport {
    /// Whether nothing was removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Remove stale entries from the cache of the project at `project_root`.
///
/// A missing cache directory is not an error.
///
/// # Errors
///
/// Returns [`Error::TidyIo`] on filesystem failures, the toolchain error if
/// its version cannot be determined, and scanner or manifest errors if the
/// declarations have to be read.
pub fn tidy(toolchain: &dyn Toolchain, project_root: &Path, cache_dir_name: &str) -> Result<TidyReport> {
    let cache = BinaryCache::new(project_root, cache_dir_name);
    let mut report = TidyReport::default();

    if !cache.root().is_dir() {
        debug!(cache = %cache.root().display(), "No cache directory, nothing to tidy");
        return Ok(report);
    }

    let version = toolchain.version()?;
    report.removed_toolchains = remove_other_versions(cache.root(), &version)?;

    let version_dir = cache.version_dir(&version);
    let (partials, binaries): (Vec<_>, Vec<_>) = list_files(&version_dir)?
        .into_iter()
        .partition(|path| is_partial_build(path));

    for partial in partials {
        info!(path = %partial.display(), "Removing partial build");
        fs::remove_file(&partial).map_err(|e| Error::tidy_io(e, &partial, "remove partial build"))?;
        report.removed_partials += 1;
    }

    if !binaries.is_empty() {
        let declarations = scan_tool_imports(project_root)?;
        let gomod = read_go_mod(project_root)?;
        let valid = versioned_imports(&declarations, &gomod);
        debug!(?valid, "Declared tool modules");

        for binary in binaries {
            let relative = slash_relative(&version_dir, &binary).unwrap_or_default();
            if valid.iter().any(|v| relative.contains(v.as_str())) {
                continue;
            }
            info!(path = %binary.display(), "Removing stale binary");
            fs::remove_file(&binary).map_err(|e| Error::tidy_io(e, &binary, "remove binary"))?;
            report.removed_binaries += 1;
        }
    }

    report.removed_dirs = remove_empty_dirs(cache.root())?;

    info!(
        toolchains = report.removed_toolchains,
        binaries = report.removed_binaries,
        partials = report.removed_partials,
        dirs = report.removed_dirs,
        "Tidied cache"
    );
    Ok(report)
}

/// Remove every top-level entry of `cache_root` not named `version`.
fn remove_other_versions(cache_root: &Path, version: &str) -> Result<usize> {
    let entries = fs::read_dir(cache_root).map_err(|e| Error::tidy_io(e, cache_root, "read cache directory"))?;

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(|e| Error::tidy_io(e, cache_root, "read cache directory"))?;
        if entry.file_name() == version {
            continue;
        }

        let path = entry.path();
        info!(path = %path.display(), "Removing binaries of another toolchain");
        let file_type = entry
            .file_type()
            .map_err(|e| Error::tidy_io(e, &path, "read file type"))?;
        if file_type.is_dir() {
            fs::remove_dir_all(&path).map_err(|e| Error::tidy_io(e, &path, "remove directory"))?;
        } else {
            fs::remove_file(&path).map_err(|e| Error::tidy_io(e, &path, "remove file"))?;
        }
        removed += 1;
    }
    Ok(removed)
}

/// Every non-directory below `dir`. A missing `dir` has no files.
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| walk_error(e, dir))?;
        if !entry.file_type().is_dir() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Remove empty directories below `root`, deepest first. `root` itself stays.
fn remove_empty_dirs(root: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| walk_error(e, root))?;
        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let mut children = fs::read_dir(path).map_err(|e| Error::tidy_io(e, path, "read directory"))?;
        if children.next().is_some() {
            continue;
        }

        debug!(path = %path.display(), "Removing empty directory");
        fs::remove_dir(path).map_err(|e| Error::tidy_io(e, path, "remove directory"))?;
        removed += 1;
    }
    Ok(removed)
}

fn walk_error(err: walkdir::Error, fallback: &Path) -> Error {
    let path = err.path().unwrap_or(fallback).to_path_buf();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
    Error::tidy_io(source, path, "walk cache directory")
}
