//! Attribute error types
//!
//! Error codes:
//! - AERO_ATTR_CONFIG_MISMATCH (ERROR) - file header disagrees with the live config
//! - AERO_ATTR_CORRUPT_FILE (FATAL) - payload failed a structural or checksum check
//! - AERO_ATTR_IO_ERROR (ERROR) - underlying file operation failed
//! - AERO_ATTR_INVALID_CONFIG (ERROR) - configuration rejected by validation

use std::io;

use thiserror::Error;

use crate::observability::Severity;

pub type AttributeResult<T> = Result<T, AttributeError>;

#[derive(Debug, Error)]
pub enum AttributeError {
    #[error("config mismatch in {file}: {field} is {found}, expected {expected}")]
    ConfigMismatch {
        file: String,
        field: &'static str,
        expected: String,
        found: String,
    },

    #[error("corrupt file {file}: {reason}")]
    CorruptFile { file: String, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl AttributeError {
    pub fn corrupt(file: impl Into<String>, reason: impl Into<String>) -> Self {
        AttributeError::CorruptFile {
            file: file.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        AttributeError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn mismatch(
        file: impl Into<String>,
        field: &'static str,
        expected: impl ToString,
        found: impl ToString,
    ) -> Self {
        AttributeError::ConfigMismatch {
            file: file.into(),
            field,
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AttributeError::ConfigMismatch { .. } => "AERO_ATTR_CONFIG_MISMATCH",
            AttributeError::CorruptFile { .. } => "AERO_ATTR_CORRUPT_FILE",
            AttributeError::Io { .. } => "AERO_ATTR_IO_ERROR",
            AttributeError::InvalidConfig(_) => "AERO_ATTR_INVALID_CONFIG",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            AttributeError::CorruptFile { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            AttributeError::corrupt("a.dat", "x").code(),
            "AERO_ATTR_CORRUPT_FILE"
        );
        assert_eq!(
            AttributeError::mismatch("a.dat", "basic_type", "int32", "string").code(),
            "AERO_ATTR_CONFIG_MISMATCH"
        );
        assert_eq!(
            AttributeError::InvalidConfig("x".into()).code(),
            "AERO_ATTR_INVALID_CONFIG"
        );
    }

    #[test]
    fn test_corruption_is_fatal() {
        assert!(AttributeError::corrupt("a.idx", "offsets").is_fatal());
        let io = AttributeError::io("a.dat", io::Error::new(io::ErrorKind::Other, "disk"));
        assert!(!io.is_fatal());
        assert_eq!(io.severity(), Severity::Error);
    }

    #[test]
    fn test_display_names_field() {
        let err = AttributeError::mismatch("a.dat", "collection_type", "array", "single");
        let text = err.to_string();
        assert!(text.contains("collection_type"));
        assert!(text.contains("array"));
    }
}
