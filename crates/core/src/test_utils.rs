//! Shared test utilities for gomodrun-core tests.
//!
//! [`FakeToolchain`] stands in for the `go` command: it records every call,
//! "downloads" modules by seeding the store and "builds" a shell script that
//! exits with its first argument.

use crate::paths::{escape_module_path, join_slash_path, MANIFEST_FILE};
use crate::toolchain::Toolchain;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Toolchain version reported by [`FakeToolchain`].
pub const FAKE_GO_VERSION: &str = "go1.22.1";

/// Script written by [`FakeToolchain::build`].
pub const FAKE_TOOL_SCRIPT: &str = "#!/bin/sh\nexit \"${1:-0}\"\n";

/// A recorded toolchain call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainCall {
    Version,
    Download(String),
    InitModule(String),
    Build(PathBuf),
}

/// In-memory [`Toolchain`] for tests.
#[derive(Debug)]
pub struct FakeToolchain {
    version: String,
    store: PathBuf,
    download_seeds: Option<String>,
    fail_download: bool,
    fail_init: bool,
    fail_build: bool,
    calls: Mutex<Vec<ToolchainCall>>,
}

impl FakeToolchain {
    /// A toolchain whose module store is `store`.
    pub fn new(store: &Path) -> Self {
        Self {
            version: FAKE_GO_VERSION.to_string(),
            store: store.to_path_buf(),
            download_seeds: None,
            fail_download: false,
            fail_init: false,
            fail_build: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Seed `command_path` into the store when a download is requested.
    pub fn downloading(mut self, command_path: &str) -> Self {
        self.download_seeds = Some(command_path.to_string());
        self
    }

    pub fn failing_download(mut self) -> Self {
        self.fail_download = true;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    /// Calls made so far, excluding version probes.
    pub fn calls(&self) -> Vec<ToolchainCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c != ToolchainCall::Version)
            .cloned()
            .collect()
    }

    pub fn build_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ToolchainCall::Build(_)))
            .count()
    }

    fn record(&self, call: ToolchainCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Toolchain for FakeToolchain {
    fn version(&self) -> Result<String> {
        self.record(ToolchainCall::Version);
        Ok(self.version.clone())
    }

    fn module_store(&self) -> Result<PathBuf> {
        Ok(self.store.clone())
    }

    fn download_module(&self, _project_root: &Path, module: &str) -> Result<()> {
        self.record(ToolchainCall::Download(module.to_string()));
        if self.fail_download {
            return Err(Error::DownloadFailed {
                module: module.to_string(),
                output: "go: module not found".to_string(),
            });
        }
        if let Some(command_path) = &self.download_seeds {
            seed_module(&self.store, command_path, true);
        }
        Ok(())
    }

    fn init_module(&self, dir: &Path, module: &str) -> Result<()> {
        self.record(ToolchainCall::InitModule(module.to_string()));
        if self.fail_init {
            return Err(Error::ModuleInitFailed {
                module: module.to_string(),
                output: "go: cannot determine module path".to_string(),
            });
        }
        fs::write(dir.join(MANIFEST_FILE), format!("module {module}\n"))?;
        Ok(())
    }

    fn build(&self, source_dir: &Path, output: &Path) -> Result<()> {
        self.record(ToolchainCall::Build(source_dir.to_path_buf()));
        if self.fail_build {
            return Err(Error::BuildFailed {
                binary: output.display().to_string(),
                output: "main.go:1: syntax error".to_string(),
            });
        }
        assert!(source_dir.join("main.go").is_file(), "no main package in {}", source_dir.display());

        fs::write(output, FAKE_TOOL_SCRIPT)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(output, fs::Permissions::from_mode(0o755))?;
        }
        Ok(())
    }
}

/// Create the module source for `command_path` inside `store`.
///
/// The module root gets a `go.mod` only when `with_manifest` is set; the
/// command directory gets a `main.go`.
pub fn seed_module(store: &Path, command_path: &str, with_manifest: bool) {
    let source = join_slash_path(store, &escape_module_path(command_path));
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("main.go"), "package main\n\nfunc main() {}\n").unwrap();

    if with_manifest {
        let (module, _) = crate::cache::split_command_path(command_path);
        let root = join_slash_path(store, &escape_module_path(module));
        let name = module.split('@').next().unwrap_or(module);
        fs::write(root.join(MANIFEST_FILE), format!("module {name}\n")).unwrap();
    }
}
