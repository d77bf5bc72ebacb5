//! Finalize stage: apply the permission policy and move content into its
//! destination directory.
//!
//! # Design
//! - Permissions are applied recursively, the root included, before the move
//!   so content never appears in the library with staging permissions.
//! - The move prefers `rename`; across filesystems it falls back to a copy
//!   followed by removal of the staged content.
//! - A destination that already exists is merged into, never removed:
//!   same-named files are overwritten, everything else already in the library
//!   stays. A file and a directory competing for one name is an error.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use seedpull_config::ChmodPolicy;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{FsOpsError, FsOpsResult};

/// Recursively apply `policy` to `root` and everything beneath it.
///
/// # Errors
///
/// Returns an IO or walk error when permissions cannot be set, and
/// [`FsOpsError::Unsupported`] on platforms without POSIX permissions.
pub fn apply_permissions(root: &Path, policy: &ChmodPolicy) -> FsOpsResult<()> {
    if !policy.is_enabled() {
        return Ok(());
    }

    #[cfg(not(unix))]
    {
        let _ = root;
        return Err(FsOpsError::Unsupported {
            operation: "apply_permissions",
            value: Some(format!("{policy:?}")),
        });
    }

    #[cfg(unix)]
    {
        for entry in WalkDir::new(root) {
            let entry = entry
                .map_err(|source| FsOpsError::walkdir("apply_permissions.walk", root, source))?;
            let path = entry.path();
            if entry.file_type().is_dir() {
                if let Some(mode) = policy.folder {
                    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(
                        |source| FsOpsError::io("apply_permissions.set_dir", path, source),
                    )?;
                }
            } else if entry.file_type().is_file() {
                if let Some(mode) = policy.file {
                    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(
                        |source| FsOpsError::io("apply_permissions.set_file", path, source),
                    )?;
                }
            }
        }
        debug!(path = %root.display(), "applied permission policy");
        Ok(())
    }
}

/// Move `source` into `final_dir`, keeping its name, and return the new location.
///
/// # Errors
///
/// Returns an IO error when the destination cannot be prepared or the move fails.
pub fn relocate(source: &Path, final_dir: &Path) -> FsOpsResult<PathBuf> {
    let name = source.file_name().ok_or_else(|| FsOpsError::InvalidInput {
        field: "source_path",
        reason: "missing_file_name",
        value: Some(source.to_string_lossy().into_owned()),
    })?;
    fs::create_dir_all(final_dir)
        .map_err(|err| FsOpsError::io("relocate.create_final_dir", final_dir, err))?;

    let destination = final_dir.join(name);
    merge_into(source, &destination)?;
    info!(
        source = %source.display(),
        destination = %destination.display(),
        "moved content into final directory"
    );
    Ok(destination)
}

fn merge_into(source: &Path, destination: &Path) -> FsOpsResult<()> {
    let existing = match fs::symlink_metadata(destination) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return move_tree(source, destination);
        }
        Err(err) => return Err(FsOpsError::io("relocate.inspect_existing", destination, err)),
    };
    let source_is_dir = fs::symlink_metadata(source)
        .map_err(|err| FsOpsError::io("relocate.inspect_source", source, err))?
        .is_dir();

    match (source_is_dir, existing.is_dir()) {
        (true, true) => {
            debug!(path = %destination.display(), "merging into existing directory");
            let mut entries = Vec::new();
            for entry in fs::read_dir(source)
                .map_err(|err| FsOpsError::io("relocate.read_source", source, err))?
            {
                let entry =
                    entry.map_err(|err| FsOpsError::io("relocate.read_source", source, err))?;
                entries.push(entry.file_name());
            }
            entries.sort();
            for name in entries {
                merge_into(&source.join(&name), &destination.join(&name))?;
            }
            fs::remove_dir(source)
                .map_err(|err| FsOpsError::io("relocate.remove_staged_dir", source, err))
        }
        (false, false) => {
            debug!(path = %destination.display(), "overwriting existing file");
            move_tree(source, destination)
        }
        _ => Err(FsOpsError::InvalidInput {
            field: "destination",
            reason: "file_directory_conflict",
            value: Some(destination.to_string_lossy().into_owned()),
        }),
    }
}

fn move_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            debug!(error = %rename_err, "rename failed; falling back to copy");
            copy_tree(source, destination)?;
            let removed = if source.is_dir() {
                fs::remove_dir_all(source)
            } else {
                fs::remove_file(source)
            };
            match removed {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(FsOpsError::io("move_tree.cleanup", source, err)),
            }
        }
    }
}

fn copy_tree(source: &Path, destination: &Path) -> FsOpsResult<()> {
    if source.is_file() {
        fs::copy(source, destination)
            .map_err(|err| FsOpsError::io("copy_tree.copy_file", destination, err))?;
        return Ok(());
    }

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| FsOpsError::walkdir("copy_tree.walk", source, err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| FsOpsError::InvalidInput {
                field: "source_path",
                reason: "strip_prefix",
                value: Some(entry.path().to_string_lossy().into_owned()),
            })?;
        let target_path = destination.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target_path)
                .map_err(|err| FsOpsError::io("copy_tree.create_dir", &target_path, err))?;
        } else {
            fs::copy(entry.path(), &target_path)
                .map_err(|err| FsOpsError::io("copy_tree.copy_entry", &target_path, err))?;
        }
    }
    Ok(())
}
