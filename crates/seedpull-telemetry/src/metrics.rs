//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters/gauges the polling daemon reports per cycle.
//! - Exposition is file based: the daemon has no HTTP surface, so
//!   [`Metrics::write_textfile`] renders the registry for a node-exporter
//!   style textfile collector.

use std::convert::TryFrom;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared across the daemon.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    fsops_steps_total: IntCounterVec,
    submissions_total: IntCounterVec,
    poll_cycles_total: IntCounter,
    poll_cycle_failures_total: IntCounter,
    units_finalized_total: IntCounter,
    watched_torrents: IntGauge,
    last_cycle_duration_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Number of torrents currently tracked by the watch-state store.
    pub watched_torrents: i64,
    /// Wall-clock duration of the most recent poll cycle (ms).
    pub last_cycle_duration_ms: i64,
    /// Total poll cycles started.
    pub poll_cycles_total: u64,
    /// Total poll cycles that aborted with an error.
    pub poll_cycle_failures_total: u64,
    /// Total download units moved into their final directory.
    pub units_finalized_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let fsops_steps_total = IntCounterVec::new(
            Opts::new(
                "fsops_steps_total",
                "Filesystem post-processing steps executed by status",
            ),
            &["step", "status"],
        )
        .map_err(|source| {
            TelemetryError::collector("metrics.build", "fsops_steps_total", source)
        })?;
        let submissions_total = IntCounterVec::new(
            Opts::new(
                "submissions_total",
                "Torrent submissions to the client by outcome",
            ),
            &["outcome"],
        )
        .map_err(|source| {
            TelemetryError::collector("metrics.build", "submissions_total", source)
        })?;
        let poll_cycles_total = counter("poll_cycles_total", "Poll cycles started")?;
        let poll_cycle_failures_total = counter(
            "poll_cycle_failures_total",
            "Poll cycles aborted by an error",
        )?;
        let units_finalized_total = counter(
            "units_finalized_total",
            "Download units moved into their final directory",
        )?;
        let watched_torrents = gauge(
            "watched_torrents",
            "Torrents tracked by the watch-state store",
        )?;
        let last_cycle_duration_ms = gauge(
            "last_cycle_duration_ms",
            "Duration of the most recent poll cycle (ms)",
        )?;

        register(&registry, "fsops_steps_total", fsops_steps_total.clone())?;
        register(&registry, "submissions_total", submissions_total.clone())?;
        register(&registry, "poll_cycles_total", poll_cycles_total.clone())?;
        register(
            &registry,
            "poll_cycle_failures_total",
            poll_cycle_failures_total.clone(),
        )?;
        register(
            &registry,
            "units_finalized_total",
            units_finalized_total.clone(),
        )?;
        register(&registry, "watched_torrents", watched_torrents.clone())?;
        register(
            &registry,
            "last_cycle_duration_ms",
            last_cycle_duration_ms.clone(),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                fsops_steps_total,
                submissions_total,
                poll_cycles_total,
                poll_cycle_failures_total,
                units_finalized_total,
                watched_torrents,
                last_cycle_duration_ms,
            }),
        })
    }

    /// Increment the filesystem post-processing step counter.
    pub fn inc_fsops_step(&self, step: &str, status: &str) {
        self.inner
            .fsops_steps_total
            .with_label_values(&[step, status])
            .inc();
    }

    /// Increment the submission counter for the given outcome label.
    pub fn inc_submission(&self, outcome: &str) {
        self.inner
            .submissions_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Increment the started poll cycle counter.
    pub fn inc_poll_cycle(&self) {
        self.inner.poll_cycles_total.inc();
    }

    /// Increment the failed poll cycle counter.
    pub fn inc_poll_cycle_failure(&self) {
        self.inner.poll_cycle_failures_total.inc();
    }

    /// Increment the finalised unit counter.
    pub fn inc_unit_finalized(&self) {
        self.inner.units_finalized_total.inc();
    }

    /// Set the watched torrent gauge.
    pub fn set_watched_torrents(&self, count: usize) {
        self.inner
            .watched_torrents
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record the wall-clock duration of a completed poll cycle.
    pub fn observe_cycle_duration(&self, duration: Duration) {
        self.inner
            .last_cycle_duration_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Render { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::RenderUtf8 { source })
    }

    /// Render the registry and atomically replace `path` with the output.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the file cannot be written.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let staging = path.with_extension("prom.tmp");
        fs::write(&staging, rendered)
            .map_err(|source| TelemetryError::textfile("textfile.write", &staging, source))?;
        fs::rename(&staging, path)
            .map_err(|source| TelemetryError::textfile("textfile.rename", path, source))
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            watched_torrents: self.inner.watched_torrents.get(),
            last_cycle_duration_ms: self.inner.last_cycle_duration_ms.get(),
            poll_cycles_total: self.inner.poll_cycles_total.get(),
            poll_cycle_failures_total: self.inner.poll_cycle_failures_total.get(),
            units_finalized_total: self.inner.units_finalized_total.get(),
        }
    }

    /// Current value of the step counter for `step` and `status`.
    #[must_use]
    pub fn fsops_step_count(&self, step: &str, status: &str) -> u64 {
        self.inner
            .fsops_steps_total
            .with_label_values(&[step, status])
            .get()
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::collector("metrics.build", name, source))
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::collector("metrics.build", name, source))
}

fn register<C>(registry: &Registry, name: &'static str, collector: C) -> Result<()>
where
    C: prometheus::core::Collector + 'static,
{
    registry
        .register(Box::new(collector))
        .map_err(|source| TelemetryError::collector("metrics.register", name, source))
}
