//! CLI module for aerocolumn
//!
//! Provides command-line tools over a saved file family:
//! - inspect: Print the validated headers of every present file
//! - verify: Load the family against a configuration and report statistics

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{inspect, run, run_command, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
