//! Stage orchestration for a single download unit.
//!
//! # Design
//! - Each unit runs fetch, extract, set-permissions and relocate in order;
//!   a failing stage stops the unit and leaves staged content in place.
//! - Every stage transition feeds the `fsops_steps_total` counter.
//! - Nothing is persisted between attempts: the stages converge on re-run
//!   because fetch resumes, extraction overwrites and relocation merges.

use std::path::PathBuf;
use std::sync::Arc;

use seedpull_config::{ChmodPolicy, SftpConfig, TransferConfig};
use seedpull_telemetry::Metrics;
use tracing::{debug, warn};

use crate::command::CommandRunner;
use crate::error::FsOpsResult;
use crate::model::{DownloadUnit, LocalContent};
use crate::{extract, fetch, finalize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepKind {
    Fetch,
    Extract,
    SetPermissions,
    Relocate,
}

impl StepKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::SetPermissions => "set_permissions",
            Self::Relocate => "relocate",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StepStatus {
    Started,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Materialises download units: fetch, extract, set permissions, relocate.
#[derive(Clone)]
pub struct FsOpsService {
    runner: Arc<dyn CommandRunner>,
    sftp: SftpConfig,
    transfer: TransferConfig,
    chmod: ChmodPolicy,
    metrics: Metrics,
}

impl FsOpsService {
    /// Construct a service running subordinate programs through `runner`.
    #[must_use]
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        sftp: SftpConfig,
        transfer: TransferConfig,
        chmod: ChmodPolicy,
        metrics: Metrics,
    ) -> Self {
        Self {
            runner,
            sftp,
            transfer,
            chmod,
            metrics,
        }
    }

    /// Fetch `unit` into its staging directory.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`fetch::fetch`].
    pub fn fetch(&self, unit: &DownloadUnit) -> FsOpsResult<LocalContent> {
        self.execute_step(unit, StepKind::Fetch, || {
            fetch::fetch(self.runner.as_ref(), unit, &self.sftp, &self.transfer)
        })
    }

    /// Extract archives inside fetched `content` when the unit asks for it.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`extract::extract`].
    pub fn extract(&self, unit: &DownloadUnit, content: LocalContent) -> FsOpsResult<LocalContent> {
        if !unit.auto_extract {
            self.record_step(unit, StepKind::Extract, StepStatus::Skipped);
            return Ok(content);
        }
        self.execute_step(unit, StepKind::Extract, || {
            extract::extract(self.runner.as_ref(), unit, content)
        })
    }

    /// Apply the permission policy to `content` and move it into the unit's
    /// final directory, returning the new location.
    ///
    /// # Errors
    ///
    /// Propagates failures from [`finalize::apply_permissions`] and [`finalize::relocate`].
    pub fn finalize(&self, unit: &DownloadUnit, content: &LocalContent) -> FsOpsResult<PathBuf> {
        if self.chmod.is_enabled() {
            self.execute_step(unit, StepKind::SetPermissions, || {
                finalize::apply_permissions(&content.path, &self.chmod)
            })?;
        } else {
            self.record_step(unit, StepKind::SetPermissions, StepStatus::Skipped);
        }
        self.execute_step(unit, StepKind::Relocate, || {
            finalize::relocate(&content.path, &unit.final_dir)
        })
    }

    /// Run every stage for `unit` and return where its content ended up.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure; later stages are not attempted.
    pub fn materialize(&self, unit: &DownloadUnit) -> FsOpsResult<PathBuf> {
        let content = self.fetch(unit)?;
        let content = self.extract(unit, content)?;
        self.finalize(unit, &content)
    }

    fn execute_step<T, F>(&self, unit: &DownloadUnit, step: StepKind, op: F) -> FsOpsResult<T>
    where
        F: FnOnce() -> FsOpsResult<T>,
    {
        self.record_step(unit, step, StepStatus::Started);
        match op() {
            Ok(value) => {
                self.record_step(unit, step, StepStatus::Completed);
                Ok(value)
            }
            Err(err) => {
                warn!(
                    torrent_id = %unit.torrent_id,
                    remote_path = %unit.remote_path,
                    step = step.as_str(),
                    error = ?err,
                    "download unit step failed"
                );
                self.record_step(unit, step, StepStatus::Failed);
                Err(err)
            }
        }
    }

    fn record_step(&self, unit: &DownloadUnit, step: StepKind, status: StepStatus) {
        debug!(
            torrent_id = %unit.torrent_id,
            step = step.as_str(),
            status = status.as_str(),
            "download unit step"
        );
        self.metrics.inc_fsops_step(step.as_str(), status.as_str());
    }
}
