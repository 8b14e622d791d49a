//! aerocolumn CLI entry point
//!
//! Parses arguments, dispatches to the CLI module and exits non-zero on
//! failure. All logic lives in `cli`.

use aerocolumn::cli;

fn main() {
    if let Err(e) = cli::run() {
        // Best effort: the process exits non-zero either way
        let _ = cli::write_error(e.code_str(), e.message());
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
