//! Fetch stage: mirror a download unit from the seedbox with `lftp`.
//!
//! # Design
//! - Directory units use `mirror -c`, file units `pget -c`; both resume
//!   partial transfers, so a failed fetch is simply retried next cycle.
//! - A file unit whose staging path is already a directory was wrapped by an
//!   earlier extraction pass; the transfer then targets the inner file.

use std::fs;
use std::path::{Path, PathBuf};

use seedpull_config::{SftpConfig, TransferConfig};
use tracing::info;

use crate::command::{CommandRunner, CommandSpec, lftp_quote};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{DownloadUnit, LocalContent};

/// Environment variable `lftp --env-password` reads the password from.
pub const LFTP_PASSWORD_ENV: &str = "LFTP_PASSWORD";

/// Resolved fetch for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    /// Content the unit occupies locally once fetched.
    pub content: LocalContent,
    /// Path the transfer writes to.
    pub target: PathBuf,
    /// Whether the unit was found wrapped by an earlier pass.
    pub wrapped: bool,
    /// The `lftp` invocation.
    pub command: CommandSpec,
}

/// Wrap a transfer command into an `lftp -c` invocation that opens the SFTP site first.
#[must_use]
pub fn lftp_command(sftp: &SftpConfig, transfer: &str) -> CommandSpec {
    let script = format!(
        "open --env-password -u {} -p {} {} && {transfer}",
        lftp_quote(&sftp.user),
        sftp.port,
        lftp_quote(&format!("sftp://{}", sftp.host)),
    );
    CommandSpec::new("lftp")
        .arg("-c")
        .arg(script)
        .env(LFTP_PASSWORD_ENV, sftp.password.clone())
}

/// Work out where and how `unit` is fetched by inspecting the staging directory.
///
/// # Errors
///
/// Returns an error when the unit's remote path has no usable name.
pub fn plan_fetch(
    unit: &DownloadUnit,
    sftp: &SftpConfig,
    transfer: &TransferConfig,
) -> FsOpsResult<FetchPlan> {
    let local = unit.local_path()?;
    let remote = lftp_quote(&unit.remote_path);

    if unit.is_directory {
        let command = lftp_command(
            sftp,
            &format!(
                "mirror -c --parallel={} --use-pget-n={} {remote} {}",
                transfer.mirror_parallel,
                transfer.mirror_conn,
                lftp_quote(&local.to_string_lossy()),
            ),
        );
        return Ok(FetchPlan {
            content: LocalContent {
                path: local.clone(),
                is_directory: true,
            },
            target: local,
            wrapped: false,
            command,
        });
    }

    let wrapped = local.is_dir();
    let target = if wrapped {
        local.join(unit.basename()?)
    } else {
        local.clone()
    };
    let command = lftp_command(
        sftp,
        &format!(
            "pget -c -n {} {remote} -o {}",
            transfer.pget_conn,
            lftp_quote(&target.to_string_lossy()),
        ),
    );
    Ok(FetchPlan {
        content: LocalContent {
            path: local,
            is_directory: wrapped,
        },
        target,
        wrapped,
        command,
    })
}

/// Fetch `unit` into its staging directory.
///
/// # Errors
///
/// Returns an IO error when staging directories cannot be created and a
/// command error when `lftp` fails. Partially transferred bytes are kept.
pub fn fetch(
    runner: &dyn CommandRunner,
    unit: &DownloadUnit,
    sftp: &SftpConfig,
    transfer: &TransferConfig,
) -> FsOpsResult<LocalContent> {
    let plan = plan_fetch(unit, sftp, transfer)?;

    let directory = if unit.is_directory {
        plan.target.clone()
    } else {
        plan.target
            .parent()
            .map_or_else(|| unit.temp_dir.clone(), Path::to_path_buf)
    };
    fs::create_dir_all(&directory)
        .map_err(|source| FsOpsError::io("fetch.create_dir", &directory, source))?;

    info!(
        torrent_id = %unit.torrent_id,
        remote_path = %unit.remote_path,
        target = %plan.target.display(),
        wrapped = plan.wrapped,
        "fetching download unit"
    );
    runner.run("fetch.lftp", &plan.command)?;
    Ok(plan.content)
}
