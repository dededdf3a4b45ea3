//! The Go toolchain as seen by gomodrun.
//!
//! Every interaction with the `go` command goes through the [`Toolchain`]
//! trait so the cache and tidy logic can be exercised without a Go install.

use crate::config::Settings;
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Capabilities gomodrun needs from the Go toolchain.
///
/// All calls block until the underlying command finishes. No timeouts are
/// applied.
pub trait Toolchain {
    /// Toolchain version, e.g. `go1.22.1`. Used as the top-level cache key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ToolchainProbe`] if the version cannot be determined.
    fn version(&self) -> Result<String>;

    /// Root of the local module store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store location cannot be determined.
    fn module_store(&self) -> Result<PathBuf>;

    /// Fetch `module` into the module store, running from `project_root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DownloadFailed`] on failure.
    fn download_module(&self, project_root: &Path, module: &str) -> Result<()>;

    /// Create a `go.mod` declaring `module` in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ModuleInitFailed`] on failure.
    fn init_module(&self, dir: &Path, module: &str) -> Result<()>;

    /// Build the main package in `source_dir` into `output`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BuildFailed`] on failure.
    fn build(&self, source_dir: &Path, output: &Path) -> Result<()>;
}

/// [`Toolchain`] backed by the `go` command.
///
/// The version is probed once and memoized for the lifetime of the value.
#[derive(Debug)]
pub struct GoToolchain {
    go: PathBuf,
    module_store: Option<PathBuf>,
    version: OnceLock<String>,
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self::new(&Settings::default())
    }
}

impl GoToolchain {
    /// Create a toolchain using `settings`.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            go: settings.go_binary.clone(),
            module_store: settings.module_store.clone(),
            version: OnceLock::new(),
        }
    }

    /// Create a toolchain configured from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(&Settings::from_env())
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.go);
        cmd.current_dir(dir);
        cmd
    }

    fn combined_output(output: &Output) -> String {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        combined.trim_end().to_string()
    }
}

impl Toolchain for GoToolchain {
    fn version(&self) -> Result<String> {
        if let Some(version) = self.version.get() {
            return Ok(version.clone());
        }

        let output = Command::new(&self.go)
            .arg("version")
            .output()
            .map_err(|e| Error::toolchain_probe(format!("failed to run {}: {e}", self.go.display())))?;

        if !output.status.success() {
            return Err(Error::toolchain_probe(Self::combined_output(&output)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = parse_go_version(&stdout)
            .ok_or_else(|| Error::toolchain_probe(format!("unexpected `go version` output: {}", stdout.trim())))?;

        debug!(%version, "Probed go version");
        Ok(self.version.get_or_init(|| version).clone())
    }

    fn module_store(&self) -> Result<PathBuf> {
        self.module_store
            .clone()
            .or_else(crate::config::module_store_from_env)
            .ok_or_else(|| Error::ModuleSourceNotFound {
                path: PathBuf::from("$GOMODCACHE"),
            })
    }

    fn download_module(&self, project_root: &Path, module: &str) -> Result<()> {
        info!(%module, "Downloading module");

        let output = self
            .command(project_root)
            .args(["mod", "download", module])
            .output()
            .map_err(|e| Error::DownloadFailed {
                module: module.to_string(),
                output: format!("failed to run {}: {e}", self.go.display()),
            })?;

        if !output.status.success() {
            return Err(Error::DownloadFailed {
                module: module.to_string(),
                output: Self::combined_output(&output),
            });
        }
        Ok(())
    }

    fn init_module(&self, dir: &Path, module: &str) -> Result<()> {
        debug!(%module, dir = %dir.display(), "Initializing module");

        let output = self
            .command(dir)
            .args(["mod", "init", module])
            .output()
            .map_err(|e| Error::ModuleInitFailed {
                module: module.to_string(),
                output: format!("failed to run {}: {e}", self.go.display()),
            })?;

        if !output.status.success() {
            return Err(Error::ModuleInitFailed {
                module: module.to_string(),
                output: Self::combined_output(&output),
            });
        }
        Ok(())
    }

    fn build(&self, source_dir: &Path, output_path: &Path) -> Result<()> {
        let binary = output_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(%binary, source = %source_dir.display(), "Building tool");

        let output = self
            .command(source_dir)
            .arg("build")
            .arg("-o")
            .arg(output_path)
            .output()
            .map_err(|e| Error::BuildFailed {
                binary: binary.clone(),
                output: format!("failed to run {}: {e}", self.go.display()),
            })?;

        if !output.status.success() {
            return Err(Error::BuildFailed {
                binary,
                output: Self::combined_output(&output),
            });
        }
        Ok(())
    }
}

/// Extract the version from `go version` output.
///
/// `go version go1.22.1 linux/amd64` gives `go1.22.1`.
#[must_use]
pub fn parse_go_version(output: &str) -> Option<String> {
    let mut words = output.split_whitespace();
    if words.next()? != "go" || words.next()? != "version" {
        return None;
    }
    words
        .next()
        .filter(|v| v.starts_with("go") || v.starts_with("devel"))
        .map(str::to_string)
}
