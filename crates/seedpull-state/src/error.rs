//! # Design
//!
//! - Constant-message errors for watch-state persistence.
//! - Operation and path context live in fields so failures are reproducible.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for watch-state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors produced by the watch-state store.
#[derive(Debug, Error)]
pub enum StateError {
    /// IO failures while reading or writing the state document.
    #[error("state io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// The state document could not be parsed or serialised.
    #[error("state json failure")]
    Json {
        /// Operation that triggered the JSON failure.
        operation: &'static str,
        /// Path involved in the JSON failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl StateError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }
}
