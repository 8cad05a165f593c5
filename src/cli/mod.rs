//! Command-line interface for piface.
//!
//! Provides commands for resolving invocations and inspecting interfaces.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands, OutputFormat};
