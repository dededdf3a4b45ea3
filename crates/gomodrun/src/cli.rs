//! Command line interface.

use crate::tracing::{LogLevel, TracingConfig, TracingFormat, init_tracing};
use clap::Parser;
use clap::error::ErrorKind;
use crossterm::style::Stylize;
use gomodrun_core::{RunOptions, Runner};
use miette::Diagnostic;
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for success
pub const EXIT_OK: i32 = 0;
/// Exit code when gomodrun itself fails
pub const EXIT_FAILURE: i32 = 1;

const AFTER_HELP: &str = "\
Examples:
  gomodrun golangci-lint run
  echo example.json | gomodrun gojson > example.go
  gomodrun -r ./alternative-tools-dir golangci-lint run
  gomodrun --tidy";

/// CLI-specific errors.
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Neither a binary name nor `--tidy` was given.
    #[error("no binary name provided")]
    #[diagnostic(
        code(gomodrun::cli::no_binary),
        help("Usage: gomodrun [flags] <binary-name> [args...]")
    )]
    NoBinary,

    /// The binary name is not valid UTF-8.
    #[error("binary name {0:?} is not valid UTF-8")]
    #[diagnostic(code(gomodrun::cli::invalid_binary))]
    InvalidBinary(OsString),

    /// Resolving, building, running or tidying failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Core(#[from] gomodrun_core::Error),
}

/// Runs and caches Go tools versioned in go.mod.
///
/// Tools are declared by blank-importing them from a file guarded by the
/// `tools` build tag and pinned by the requirements in go.mod. They are built
/// once per Go version and module version and cached under the project root.
#[derive(Parser, Debug)]
#[command(name = "gomodrun")]
#[command(about = "The forgotten go tool that executes and caches binaries included in go.mod files")]
#[command(version, after_help = AFTER_HELP)]
pub struct Cli {
    /// Directory containing go.mod and the tools file. Defaults to walking up
    /// from the current directory to the nearest go.mod.
    #[arg(short = 'r', long = "pkg-root", value_name = "DIR")]
    pub pkg_root: Option<PathBuf>,

    /// Remove cached binaries of other Go versions and undeclared tool versions.
    #[arg(short = 't', long)]
    pub tidy: bool,

    /// Logging verbosity level.
    #[arg(short = 'L', long, default_value = "warn", value_enum)]
    pub level: LogLevel,

    /// Log output format.
    #[arg(long = "log-format", default_value = "compact", value_enum)]
    pub log_format: TracingFormat,

    /// Binary name followed by the arguments passed to it verbatim.
    #[arg(
        value_name = "BINARY [ARGS]",
        trailing_var_arg = true,
        allow_hyphen_values = true,
        num_args = 0..
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// The binary name and its arguments, if a binary was given.
    #[must_use]
    pub fn binary_and_args(&self) -> Option<(&OsString, &[OsString])> {
        self.command.split_first()
    }
}

/// Parse `args`, run, and return the process exit code.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => return report_parse_error(&e),
    };

    let config = TracingConfig {
        format: cli.log_format,
        level: cli.level.into(),
    };
    if let Err(e) = init_tracing(config) {
        let _ = writeln!(io::stderr(), "gomodrun: {e}");
    }

    execute(cli)
}

/// Execute a parsed command line and return the process exit code.
///
/// The tool's own exit code is returned unchanged; gomodrun failures are
/// rendered on stderr and give [`EXIT_FAILURE`].
pub fn execute(cli: Cli) -> i32 {
    let runner = Runner::from_env();

    if cli.tidy {
        return match runner.tidy(cli.pkg_root) {
            Ok(report) => {
                tracing::debug!(?report, "Tidy finished");
                EXIT_OK
            }
            Err(e) => fail(&e.into()),
        };
    }

    let Some((binary, args)) = cli.binary_and_args() else {
        return fail(&CliError::NoBinary);
    };
    let Some(binary) = binary.to_str() else {
        return fail(&CliError::InvalidBinary(binary.clone()));
    };

    let options = RunOptions {
        project_root: cli.pkg_root.clone(),
        ..RunOptions::default()
    };
    match runner.run(binary, args, options) {
        Ok(code) => code,
        Err(e) => fail(&e.into()),
    }
}

/// Map CLI error to exit code
#[must_use]
pub const fn exit_code_for(_err: &CliError) -> i32 {
    EXIT_FAILURE
}

/// Print `err` as a red `gomodrun:` line, followed by its help if any.
pub fn render_error(err: &CliError) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "{}", format!("gomodrun: {err}").red());
    if let Some(help) = err.help() {
        let _ = writeln!(stderr, "{}", format!("help: {help}").dim());
    }
    let _ = stderr.flush();
}

fn fail(err: &CliError) -> i32 {
    render_error(err);
    exit_code_for(err)
}

fn report_parse_error(err: &clap::Error) -> i32 {
    let _ = err.print();
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_OK,
        _ => EXIT_FAILURE,
    }
}
