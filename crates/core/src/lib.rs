//! Versioned Go tool runner.
//!
//! Go projects pin their CLI tools (linters, generators, test runners) in
//! `go.mod` by blank-importing them from a `tools.go` file guarded by the
//! `tools` build tag. This crate runs such a tool by its binary name:
//!
//! 1. [`resolve`] maps the name to a versioned command path using the tools
//!    file ([`tools`]) and the requirements in `go.mod` ([`manifest`]).
//! 2. [`cache::BinaryCache`] returns the executable built from that path,
//!    building it once from the module store through the [`Toolchain`].
//! 3. [`Runner`] executes it with the caller's streams and environment and
//!    reports its exit code.
//!
//! [`cache::tidy`] removes binaries built by other toolchain versions or for
//! module versions the project no longer declares.
//!
//! # Example
//!
//! ```rust,no_run
//! use gomodrun_core::{RunOptions, Runner};
//!
//! let runner = Runner::from_env();
//! let code = runner.run("golangci-lint", &["run"], RunOptions::default())?;
//! std::process::exit(code);
//! # Ok::<(), gomodrun_core::Error>(())
//! ```

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod resolve;
pub mod runner;
pub mod toolchain;
pub mod tools;

#[cfg(test)]
mod test_utils;

pub use cache::{BinaryCache, TidyReport};
pub use config::Settings;
pub use error::{Error, Result};
pub use runner::{ORCHESTRATION_FAILURE_CODE, RunOptions, Runner};
pub use toolchain::{GoToolchain, Toolchain};
