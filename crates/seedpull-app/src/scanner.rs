//! Watch-directory scanner: submits dropped `.torrent`/`.magnet` files.
//!
//! # Design
//! - A watch directory whose watch, temp or final path is missing is logged
//!   and skipped; the scan goes on with the next one.
//! - Files are handled in name order. A file is deleted only after the
//!   client accepted it and its watch record was stored; a rejected file stays
//!   in place and is retried next cycle.

use std::fs;
use std::path::{Path, PathBuf};

use seedpull_config::WatchDirConfig;
use seedpull_state::{WatchRecord, WatchStore};
use seedpull_telemetry::Metrics;
use seedpull_torrent_core::{TorrentClient, TorrentSubmission};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Submit every file found in the configured watch directories.
///
/// Returns the number of files submitted.
///
/// # Errors
///
/// Returns an error when a watch directory cannot be listed, a watch record
/// cannot be stored, or a submitted file cannot be deleted.
pub async fn scan_watch_dirs(
    watch_dirs: &[WatchDirConfig],
    client: &dyn TorrentClient,
    store: &dyn WatchStore,
    metrics: &Metrics,
) -> AppResult<usize> {
    let mut submitted = 0;
    for watch_dir in watch_dirs {
        if let Some(missing) = missing_path(watch_dir) {
            warn!(
                directory = %watch_dir.directory.display(),
                missing = %missing.display(),
                "watch directory is incomplete; skipping"
            );
            continue;
        }
        for path in list_files(&watch_dir.directory)? {
            if submit_file(&path, watch_dir, client, store, metrics).await? {
                submitted += 1;
            }
        }
    }
    Ok(submitted)
}

fn missing_path(watch_dir: &WatchDirConfig) -> Option<&Path> {
    [
        &watch_dir.directory,
        &watch_dir.temp_download_dir,
        &watch_dir.final_download_dir,
    ]
    .into_iter()
    .map(PathBuf::as_path)
    .find(|path| !path.is_dir())
}

fn list_files(directory: &Path) -> AppResult<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .map_err(|source| AppError::io("scanner.read_dir", directory, source))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| AppError::io("scanner.read_entry", directory, source))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn submit_file(
    path: &Path,
    watch_dir: &WatchDirConfig,
    client: &dyn TorrentClient,
    store: &dyn WatchStore,
    metrics: &Metrics,
) -> AppResult<bool> {
    let submission = match TorrentSubmission::from_path(path) {
        Ok(submission) => submission,
        Err(err) => {
            warn!(path = %path.display(), error = ?err, "failed to read watch file");
            metrics.inc_submission("unreadable");
            return Ok(false);
        }
    };
    let kind = submission.kind();
    let torrent_id = match client.submit(submission).await {
        Ok(torrent_id) => torrent_id,
        Err(err) => {
            warn!(
                path = %path.display(),
                client = client.name(),
                error = ?err,
                "torrent submission failed; will retry next cycle"
            );
            metrics.inc_submission("failed");
            return Ok(false);
        }
    };

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    store
        .add(
            &torrent_id,
            WatchRecord {
                temp_dir: watch_dir.temp_download_dir.clone(),
                final_dir: watch_dir.final_download_dir.clone(),
                name,
                auto_extract: watch_dir.auto_extract,
                auto_delete_extracted: watch_dir.auto_delete_extracted,
            },
        )
        .map_err(|source| AppError::state("state.add", source))?;
    fs::remove_file(path).map_err(|source| AppError::io("scanner.remove_file", path, source))?;
    debug!(path = %path.display(), "removed submitted watch file");

    metrics.inc_submission("accepted");
    info!(
        torrent_id = %torrent_id,
        path = %path.display(),
        kind,
        "torrent submitted and watched"
    );
    Ok(true)
}
