//! Errors surfaced by the daemon binary.
//!
//! # Design
//!
//! - One variant per collaborating crate, each tagged with the operation that
//!   failed; messages stay constant.
//! - Unit-level fsops failures never reach this type: the orchestrator logs
//!   them and retries the unit next cycle.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration operations failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: seedpull_config::ConfigError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: seedpull_telemetry::TelemetryError,
    },
    /// Watch-state store operations failed.
    #[error("watch state operation failed")]
    State {
        /// Operation identifier.
        operation: &'static str,
        /// Source store error.
        source: seedpull_state::StateError,
    },
    /// Torrent client operations failed.
    #[error("torrent operation failed")]
    Torrent {
        /// Operation identifier.
        operation: &'static str,
        /// Source torrent error.
        source: seedpull_torrent_core::TorrentError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: seedpull_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: seedpull_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn state(operation: &'static str, source: seedpull_state::StateError) -> Self {
        Self::State { operation, source }
    }

    pub(crate) const fn torrent(
        operation: &'static str,
        source: seedpull_torrent_core::TorrentError,
    ) -> Self {
        Self::Torrent { operation, source }
    }

    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
