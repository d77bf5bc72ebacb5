//! Error types for telemetry operations.

use std::path::PathBuf;

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while installing logging or exporting metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Another global subscriber was already installed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: TryInitError,
    },
    /// A Prometheus collector could not be built or registered.
    #[error("metrics collector rejected")]
    Collector {
        /// Step that failed (`metrics.build` or `metrics.register`).
        operation: &'static str,
        /// Metric name tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The registry could not be rendered as text exposition.
    #[error("failed to render metrics")]
    Render {
        /// Underlying encoder error.
        #[source]
        source: PrometheusError,
    },
    /// The encoder produced bytes that are not UTF-8.
    #[error("rendered metrics were not valid utf-8")]
    RenderUtf8 {
        /// Underlying conversion error.
        #[source]
        source: std::string::FromUtf8Error,
    },
    /// Writing or swapping the node-exporter textfile failed.
    #[error("metrics textfile io failed")]
    Textfile {
        /// Step that failed (`textfile.write` or `textfile.rename`).
        operation: &'static str,
        /// Path involved in the failed step.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TelemetryError {
    pub(crate) const fn collector(
        operation: &'static str,
        name: &'static str,
        source: PrometheusError,
    ) -> Self {
        Self::Collector {
            operation,
            name,
            source,
        }
    }

    pub(crate) fn textfile(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Textfile {
            operation,
            path: path.into(),
            source,
        }
    }
}
