//! The `gomodrun` command line tool.
//!
//! Thin glue over [`gomodrun_core`]: argument parsing, logging setup and
//! error rendering.

#![warn(missing_docs)]

pub mod cli;
pub mod tracing;
