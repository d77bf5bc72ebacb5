//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation (dotted path for nested values).
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Required field was absent from the document.
    #[error("missing configuration field")]
    MissingField {
        /// Name of the absent field.
        field: String,
    },
    /// Configuration document was not valid JSON for the expected layout.
    #[error("failed to parse configuration document")]
    Parse {
        /// Path of the document when read from disk.
        path: Option<PathBuf>,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value,
            reason,
        }
    }

    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
