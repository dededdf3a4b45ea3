//! Running declared tools.
//!
//! [`Runner`] ties resolution, the binary cache and process execution
//! together: find the project root, map the binary name to a versioned
//! command path, get or build the cached executable and run it.

use crate::cache::{BinaryCache, TidyReport, tidy};
use crate::config::Settings;
use crate::paths::discover_project_root;
use crate::resolve::{normalize_binary_name, resolve_command_path};
use crate::toolchain::{GoToolchain, Toolchain};
use crate::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use tracing::{debug, error};

/// Exit code reported when gomodrun itself fails, as opposed to the tool.
pub const ORCHESTRATION_FAILURE_CODE: i32 = -1;

/// How to run a tool.
///
/// Unset streams are inherited. When `env` is set the child environment is
/// replaced by it; otherwise the parent environment is inherited.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Project root; discovered from the working directory when unset.
    pub project_root: Option<PathBuf>,
    /// Standard input for the tool.
    pub stdin: Option<Stdio>,
    /// Standard output for the tool.
    pub stdout: Option<Stdio>,
    /// Standard error for the tool.
    pub stderr: Option<Stdio>,
    /// Complete environment for the tool.
    pub env: Option<Vec<(OsString, OsString)>>,
}

impl RunOptions {
    /// Use `root` as the project root.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Replace the child environment with `env`.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        self.env = Some(env.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Set the tool's standard streams.
    #[must_use]
    pub fn with_stdio(mut self, stdin: Stdio, stdout: Stdio, stderr: Stdio) -> Self {
        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.stderr = Some(stderr);
        self
    }
}

/// Resolves, builds and runs declared tools.
#[derive(Debug)]
pub struct Runner<T: Toolchain = GoToolchain> {
    toolchain: T,
    settings: Settings,
}

impl Runner<GoToolchain> {
    /// Runner backed by the `go` command, configured from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let settings = Settings::from_env();
        Self::new(GoToolchain::new(&settings), settings)
    }
}

impl<T: Toolchain> Runner<T> {
    /// Create a runner.
    pub fn new(toolchain: T, settings: Settings) -> Self {
        Self { toolchain, settings }
    }

    /// The toolchain builds are delegated to.
    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// The active settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run `binary` with `args` and return its exit code.
    ///
    /// Whatever the tool exits with is `Ok`, including non-zero codes. A tool
    /// killed by a signal reports `128 + signal`.
    ///
    /// # Errors
    ///
    /// Returns an error if the project root cannot be found, the binary cannot
    /// be resolved or built, or the cached executable cannot be started.
    pub fn run<S: AsRef<OsStr>>(&self, binary: &str, args: &[S], options: RunOptions) -> Result<i32> {
        let root = self.project_root(options.project_root.as_deref())?;
        let binary = normalize_binary_name(binary);

        let command_path = resolve_command_path(&root, binary)?;
        let cache = BinaryCache::new(&root, &self.settings.cache_dir_name);
        let executable = cache.get_or_build(&self.toolchain, &root, binary, &command_path)?;

        let mut cmd = Command::new(&executable);
        cmd.args(args);
        if let Some(stdin) = options.stdin {
            cmd.stdin(stdin);
        }
        if let Some(stdout) = options.stdout {
            cmd.stdout(stdout);
        }
        if let Some(stderr) = options.stderr {
            cmd.stderr(stderr);
        }
        if let Some(env) = options.env {
            cmd.env_clear();
            cmd.envs(env);
        }

        debug!(executable = %executable.display(), args = args.len(), "Running tool");
        let status = cmd.status().map_err(|source| Error::ExecStartFailed {
            path: executable.clone(),
            source,
        })?;

        let code = exit_code_of(status);
        debug!(%binary, code, "Tool exited");
        Ok(code)
    }

    /// Like [`Runner::run`], reporting failures as
    /// [`ORCHESTRATION_FAILURE_CODE`] after logging them.
    pub fn run_with_code<S: AsRef<OsStr>>(&self, binary: &str, args: &[S], options: RunOptions) -> i32 {
        match self.run(binary, args, options) {
            Ok(code) => code,
            Err(e) => {
                error!(%binary, error = %e, "Failed to run tool");
                ORCHESTRATION_FAILURE_CODE
            }
        }
    }

    /// Remove stale entries from the project's binary cache.
    ///
    /// # Errors
    ///
    /// See [`tidy`].
    pub fn tidy(&self, project_root: Option<PathBuf>) -> Result<TidyReport> {
        let root = self.project_root(project_root.as_deref())?;
        tidy(&self.toolchain, &root, &self.settings.cache_dir_name)
    }

    fn project_root(&self, explicit: Option<&Path>) -> Result<PathBuf> {
        match explicit {
            Some(root) => Ok(root.to_path_buf()),
            None => discover_project_root(),
        }
    }
}

/// Map a process exit status to an exit code.
#[must_use]
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    ORCHESTRATION_FAILURE_CODE
}
