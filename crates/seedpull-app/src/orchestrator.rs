//! Poll-cycle orchestration: scan, query, resolve, materialise, release.
//!
//! # Design
//! - One cycle runs inside an `info_span` carrying a fresh `cycle_id`.
//! - Units are materialised one at a time on the blocking pool; a failing
//!   unit is logged and the cycle moves on to the next one.
//! - A watch record is released only when every unit of its torrent was
//!   finalised in the same cycle; anything else is retried next cycle. A
//!   store failure while releasing one torrent does not hold back the others.
//! - Shutdown is honoured between cycles; a running cycle is never cancelled.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use seedpull_config::WatchDirConfig;
use seedpull_fsops::{DownloadUnit, FsOpsService};
use seedpull_state::WatchStore;
use seedpull_telemetry::Metrics;
use seedpull_torrent_core::TorrentClient;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::resolver::resolve_units;
use crate::scanner::scan_watch_dirs;

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    /// Torrent client backend.
    pub client: Arc<dyn TorrentClient>,
    /// Watch-state store.
    pub store: Arc<dyn WatchStore>,
    /// Fetch/extract/finalize stages.
    pub fsops: FsOpsService,
    /// Shared metrics registry.
    pub metrics: Metrics,
    /// Watch directories scanned at the start of every cycle.
    pub watch_dirs: Vec<WatchDirConfig>,
    /// Prometheus textfile refreshed after every cycle.
    pub metrics_textfile: Option<PathBuf>,
}

/// Outcome of a single poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Watch files submitted to the client.
    pub submitted: usize,
    /// Download units resolved from completed torrents.
    pub units: usize,
    /// Units moved into their final directory.
    pub finalized: usize,
    /// Units that failed a stage.
    pub failed: usize,
    /// Torrents no longer watched after this cycle.
    pub released: Vec<String>,
    /// Fully finalised torrents whose watch record could not be removed.
    pub release_failures: usize,
}

/// Drives poll cycles.
pub struct Orchestrator {
    client: Arc<dyn TorrentClient>,
    store: Arc<dyn WatchStore>,
    fsops: FsOpsService,
    metrics: Metrics,
    watch_dirs: Vec<WatchDirConfig>,
    metrics_textfile: Option<PathBuf>,
}

impl Orchestrator {
    /// Assemble an orchestrator from its collaborators.
    #[must_use]
    pub fn new(deps: OrchestratorDeps) -> Self {
        let OrchestratorDeps {
            client,
            store,
            fsops,
            metrics,
            watch_dirs,
            metrics_textfile,
        } = deps;
        Self {
            client,
            store,
            fsops,
            metrics,
            watch_dirs,
            metrics_textfile,
        }
    }

    /// Run cycles every `poll_interval` until `shutdown` resolves.
    ///
    /// A cycle that fails is logged and the loop carries on. When `shutdown`
    /// resolves mid-cycle, the cycle is completed before returning.
    pub async fn run_until<F>(&self, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            let mut stop = false;
            let result = {
                let mut cycle = std::pin::pin!(self.run_cycle());
                loop {
                    tokio::select! {
                        result = &mut cycle => break result,
                        () = &mut shutdown, if !stop => {
                            info!("shutdown requested; finishing current cycle");
                            stop = true;
                        }
                    }
                }
            };
            if let Err(err) = result {
                error!(error = ?err, "poll cycle failed");
            }
            if stop {
                return;
            }
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    return;
                }
                () = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Run one full poll cycle.
    ///
    /// # Errors
    ///
    /// Returns an error when scanning, listing watched torrents, or the
    /// completion query fails. Unit and release failures are not errors; they
    /// show up in the report and are retried next cycle.
    pub async fn run_cycle(&self) -> AppResult<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("poll_cycle", cycle_id = %cycle_id);
        let started = Instant::now();
        self.metrics.inc_poll_cycle();

        let result = self.cycle().instrument(span).await;

        self.metrics.observe_cycle_duration(started.elapsed());
        if result.is_err() {
            self.metrics.inc_poll_cycle_failure();
        }
        self.export_metrics();
        result
    }

    async fn cycle(&self) -> AppResult<CycleReport> {
        let submitted = scan_watch_dirs(
            &self.watch_dirs,
            self.client.as_ref(),
            self.store.as_ref(),
            &self.metrics,
        )
        .await?;
        let mut report = CycleReport {
            submitted,
            ..CycleReport::default()
        };

        let watching = self
            .store
            .watching()
            .map_err(|source| AppError::state("state.watching", source))?;
        self.metrics.set_watched_torrents(watching.len());
        if watching.is_empty() {
            info!(submitted, "no watched torrents");
            return Ok(report);
        }

        let ids: BTreeSet<String> = watching.keys().cloned().collect();
        let completed = self
            .client
            .list_completed(&ids)
            .await
            .map_err(|source| AppError::torrent("torrent.list_completed", source))?;
        let units = resolve_units(&watching, &completed);
        report.units = units.len();

        let mut remaining: BTreeMap<String, usize> = BTreeMap::new();
        for unit in &units {
            *remaining.entry(unit.torrent_id.clone()).or_default() += 1;
        }

        for unit in units {
            let torrent_id = unit.torrent_id.clone();
            if self.materialize(unit).await {
                report.finalized += 1;
                self.metrics.inc_unit_finalized();
                if let Some(count) = remaining.get_mut(&torrent_id) {
                    *count -= 1;
                }
            } else {
                report.failed += 1;
            }
        }

        for (torrent_id, count) in remaining {
            if count > 0 {
                warn!(
                    torrent_id = %torrent_id,
                    unfinished_units = count,
                    "torrent stays watched until every unit is finalised"
                );
                continue;
            }
            match self.store.remove(&torrent_id) {
                Ok(_) => {
                    info!(torrent_id = %torrent_id, "torrent finalised; no longer watched");
                    report.released.push(torrent_id);
                }
                Err(err) => {
                    error!(
                        torrent_id = %torrent_id,
                        error = ?err,
                        "failed to release finalised torrent; will retry next cycle"
                    );
                    report.release_failures += 1;
                }
            }
        }
        self.metrics
            .set_watched_torrents(watching.len().saturating_sub(report.released.len()));

        info!(
            submitted = report.submitted,
            completed = completed.len(),
            units = report.units,
            finalized = report.finalized,
            failed = report.failed,
            released = report.released.len(),
            release_failures = report.release_failures,
            "poll cycle finished"
        );
        Ok(report)
    }

    async fn materialize(&self, unit: DownloadUnit) -> bool {
        let fsops = self.fsops.clone();
        let torrent_id = unit.torrent_id.clone();
        let remote_path = unit.remote_path.clone();
        info!(
            torrent_id = %torrent_id,
            remote_path = %remote_path,
            is_directory = unit.is_directory,
            "processing download unit"
        );
        match tokio::task::spawn_blocking(move || fsops.materialize(&unit)).await {
            Ok(Ok(destination)) => {
                info!(
                    torrent_id = %torrent_id,
                    remote_path = %remote_path,
                    destination = %destination.display(),
                    "download unit finalised"
                );
                true
            }
            Ok(Err(err)) => {
                error!(
                    torrent_id = %torrent_id,
                    remote_path = %remote_path,
                    error = ?err,
                    "download unit failed; will retry next cycle"
                );
                false
            }
            Err(err) => {
                error!(
                    torrent_id = %torrent_id,
                    remote_path = %remote_path,
                    error = %err,
                    "download unit task aborted"
                );
                false
            }
        }
    }

    fn export_metrics(&self) {
        if let Some(path) = &self.metrics_textfile {
            if let Err(err) = self.metrics.write_textfile(path) {
                warn!(path = %path.display(), error = ?err, "failed to write metrics textfile");
            }
        }
    }
}
