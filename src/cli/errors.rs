//! CLI-specific error types
//!
//! All CLI errors end the process with a non-zero status.

use std::fmt;
use std::io;

use crate::attribute::AttributeError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Attribute configuration file error
    ConfigError,
    /// I/O error (files, stdout)
    IoError,
    /// No file of the family exists
    NotFound,
    /// The family failed validation
    LoadFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
            Self::NotFound => "AERO_CLI_NOT_FOUND",
            Self::LoadFailed => "AERO_CLI_LOAD_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn not_found(base: &std::path::Path) -> Self {
        Self::new(
            CliErrorCode::NotFound,
            format!("no attribute files found for base '{}'", base.display()),
        )
    }

    pub fn load_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::LoadFailed, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<AttributeError> for CliError {
    fn from(e: AttributeError) -> Self {
        let message = format!("{}: {}", e.code(), e);
        match e {
            AttributeError::InvalidConfig(_) => Self::config_error(message),
            AttributeError::Io { .. } => Self::io_error(message),
            AttributeError::ConfigMismatch { .. } | AttributeError::CorruptFile { .. } => {
                Self::load_failed(message)
            }
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
