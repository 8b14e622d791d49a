//! CLI argument definitions using clap
//!
//! Commands:
//! - aerocolumn inspect <base>
//! - aerocolumn verify <base> --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerocolumn - inspect and verify saved attribute files
#[derive(Parser, Debug)]
#[command(name = "aerocolumn")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit trace-level log lines
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the validated header of every file in a family
    Inspect {
        /// Base file name, without suffix
        base: PathBuf,
    },

    /// Load a family into a fresh attribute and print its statistics
    Verify {
        /// Base file name, without suffix
        base: PathBuf,

        /// Path to attribute configuration file
        #[arg(long, default_value = "./attribute.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
