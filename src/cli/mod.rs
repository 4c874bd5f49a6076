//! Command-line interface for pkgbatch.
//!
//! Provides commands for executing, inspecting, and demonstrating
//! operation batches.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
