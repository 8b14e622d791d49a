//! CLI command implementations
//!
//! Both commands are read-only: they never write to the family they are
//! pointed at.

use std::path::Path;

use serde_json::{json, Value};

use crate::attribute::{AttributeConfig, AttributeVector};
use crate::observability::{Logger, Severity};
use crate::persistence::{read_headers, FileKind, FileLoadSource, LoadSource};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments, run the command and print its response.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    if cli.verbose {
        Logger::set_min_severity(Severity::Trace);
    }
    let data = run_command(cli.command)?;
    write_response(data)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Inspect { base } => inspect(&base),
        Command::Verify { base, config } => verify(&base, &config),
    }
}

/// Headers of every present file of the family at `base`.
pub fn inspect(base: &Path) -> CliResult<Value> {
    let source = FileLoadSource::new(base);
    let headers = read_headers(&source)?;
    if headers.is_empty() {
        return Err(CliError::not_found(base));
    }
    let files: Vec<Value> = headers
        .iter()
        .map(|h| -> CliResult<Value> {
            Ok(json!({
                "file": source.describe(h.kind),
                "header": serde_json::to_value(h)?,
            }))
        })
        .collect::<CliResult<_>>()?;
    Ok(json!({
        "base": base.display().to_string(),
        "files": files,
    }))
}

/// Load the family into a fresh attribute built from `config_path`.
pub fn verify(base: &Path, config_path: &Path) -> CliResult<Value> {
    let config = AttributeConfig::load(config_path)
        .map_err(|e| CliError::config_error(format!("{}: {}", config_path.display(), e)))?;
    let source = FileLoadSource::new(base);
    let headers = read_headers(&source)?;
    let Some(dat) = headers.iter().find(|h| h.kind == FileKind::Dat) else {
        return Err(CliError::not_found(base));
    };

    let name = base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| base.display().to_string());
    let mut attribute = AttributeVector::new(&name, config)?;
    attribute.load_from(&source)?;

    let status = attribute.status();
    Ok(json!({
        "base": base.display().to_string(),
        "create_serial_num": attribute.create_serial_num(),
        "doc_id_limit": attribute.committed_doc_id_limit(),
        "enumerated": dat.enumerated,
        "status": serde_json::to_value(status)?,
    }))
}
