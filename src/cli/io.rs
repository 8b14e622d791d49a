//! JSON output for the CLI
//!
//! Every command prints exactly one JSON object to stdout.

use std::io::{self, Write};

use serde_json::Value;

use super::errors::CliResult;

fn write_line(mut out: impl Write, response: &Value) -> CliResult<()> {
    serde_json::to_writer(&mut out, response)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

pub fn response(data: Value) -> Value {
    serde_json::json!({
        "status": "ok",
        "data": data
    })
}

pub fn error_response(code: &str, message: &str) -> Value {
    serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    })
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    write_line(io::stdout().lock(), &response(data))
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    write_line(io::stdout().lock(), &error_response(code, message))
}
