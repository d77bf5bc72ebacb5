//! # Design
//!
//! - Provide structured, constant-message errors for the fetch/extract/finalize stages.
//! - Capture operation context (paths, programs, exit status) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for filesystem operations.
pub type FsOpsResult<T> = Result<T, FsOpsError>;

/// Errors produced by the materialisation stages.
#[derive(Debug, Error)]
pub enum FsOpsError {
    /// IO failures while interacting with the filesystem.
    #[error("fsops io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("fsops walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// A subordinate program could not be started.
    #[error("fsops command spawn failure")]
    CommandSpawn {
        /// Operation that launched the program.
        operation: &'static str,
        /// Program name.
        program: String,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A subordinate program exited unsuccessfully.
    #[error("fsops command failed")]
    CommandFailed {
        /// Operation that launched the program.
        operation: &'static str,
        /// Program name.
        program: String,
        /// Exit code, absent when the program was killed by a signal.
        status: Option<i32>,
    },
    /// Input validation failures.
    #[error("fsops invalid input")]
    InvalidInput {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Unsupported operation on this platform.
    #[error("fsops unsupported operation")]
    Unsupported {
        /// Operation that is unsupported.
        operation: &'static str,
        /// Optional value that triggered the unsupported error.
        value: Option<String>,
    },
}

impl FsOpsError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure came from a subordinate program.
    #[must_use]
    pub const fn is_command_failure(&self) -> bool {
        matches!(self, Self::CommandSpawn { .. } | Self::CommandFailed { .. })
    }
}
