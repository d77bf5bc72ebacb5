//! Error types for torrent client operations.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// Operation is not supported by the backend.
    #[error("torrent operation not supported")]
    Unsupported {
        /// Operation identifier.
        operation: &'static str,
    },
    /// Transport or backend failure.
    #[error("torrent operation failed")]
    OperationFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Torrent identifier when available.
        torrent_id: Option<String>,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend answered with an application-level error.
    #[error("torrent client rejected request")]
    Rejected {
        /// Operation identifier.
        operation: &'static str,
        /// Message reported by the backend.
        message: String,
    },
    /// The backend answered with a payload that could not be interpreted.
    #[error("unexpected torrent client response")]
    InvalidResponse {
        /// Operation identifier.
        operation: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
    },
    /// Reading a submission file failed.
    #[error("torrent submission io failure")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
}

impl TorrentError {
    /// Wrap a transport failure.
    pub fn failed(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::OperationFailed {
            operation,
            torrent_id: None,
            source: source.into(),
        }
    }

    /// Report an uninterpretable backend payload.
    #[must_use]
    pub const fn invalid(operation: &'static str, reason: &'static str) -> Self {
        Self::InvalidResponse { operation, reason }
    }
}

/// Convenience alias for torrent operation results.
pub type TorrentResult<T> = Result<T, TorrentError>;
