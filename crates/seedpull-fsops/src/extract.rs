//! Extraction stage: unpack archives found in fetched content.
//!
//! # Design
//! - A single `.zip`/`.rar` file is first wrapped into a same-named directory
//!   so its contents land next to it instead of in the shared staging root.
//! - Archives are discovered in sorted walk order and extracted in place with
//!   overwrite flags, which makes a repeated pass harmless.
//! - Only the first volume of a multi-part RAR set is handed to `unrar`.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::command::{CommandRunner, CommandSpec};
use crate::error::{FsOpsError, FsOpsResult};
use crate::model::{ArchiveKind, ArchivePart, DownloadUnit, LocalContent};

const WRAP_SUFFIX: &str = ".temp";

/// Extraction work discovered under a directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionPlan {
    /// Archives to extract, in discovery order.
    pub archives: Vec<ArchivePart>,
    /// Later volumes of multi-part sets, left to the extractor of their first volume.
    pub skipped: Vec<ArchivePart>,
}

impl ExtractionPlan {
    /// Commands for every archive, in discovery order.
    #[must_use]
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.archives
            .iter()
            .filter_map(extraction_command)
            .collect()
    }

    /// Files to remove once every extraction succeeded: the extracted archives
    /// plus the skipped volumes of the sets they opened.
    #[must_use]
    pub fn cleanup_paths(&self) -> Vec<PathBuf> {
        let opened: BTreeSet<PathBuf> = self
            .archives
            .iter()
            .filter_map(ArchivePart::set_key)
            .collect();
        self.archives
            .iter()
            .map(|part| part.path.clone())
            .chain(
                self.skipped
                    .iter()
                    .filter(|part| part.set_key().is_some_and(|key| opened.contains(&key)))
                    .map(|part| part.path.clone()),
            )
            .collect()
    }
}

/// Build the extractor invocation for `part`; `None` for non-archives.
#[must_use]
pub fn extraction_command(part: &ArchivePart) -> Option<CommandSpec> {
    let directory = part.path.parent()?.to_string_lossy().into_owned();
    let file = part.path.to_string_lossy().into_owned();
    match part.kind {
        ArchiveKind::Zip => Some(
            CommandSpec::new("unzip")
                .arg("-o")
                .arg(file)
                .arg("-d")
                .arg(directory),
        ),
        ArchiveKind::Rar => Some(
            CommandSpec::new("unrar")
                .arg("x")
                .arg("-o+")
                .arg("-y")
                .arg(file)
                .arg(format!("{}/", directory.trim_end_matches('/'))),
        ),
        ArchiveKind::None => None,
    }
}

/// Move the single file at `path` into a new directory of the same name,
/// returning that directory. Resumes a wrap interrupted between its renames.
///
/// # Errors
///
/// Returns an IO error when a rename or directory creation fails, or
/// [`FsOpsError::InvalidInput`] when there is nothing to wrap.
pub fn wrap_single_archive(path: &Path) -> FsOpsResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| FsOpsError::InvalidInput {
            field: "archive_path",
            reason: "missing_file_name",
            value: Some(path.to_string_lossy().into_owned()),
        })?
        .to_os_string();
    let mut staged_name = name.clone();
    staged_name.push(WRAP_SUFFIX);
    let staged = path.with_file_name(staged_name);

    if path.is_file() {
        fs::rename(path, &staged)
            .map_err(|source| FsOpsError::io("extract.wrap_stage", path, source))?;
    } else if !staged.is_file() {
        return Err(FsOpsError::InvalidInput {
            field: "archive_path",
            reason: "nothing_to_wrap",
            value: Some(path.to_string_lossy().into_owned()),
        });
    }

    fs::create_dir_all(path)
        .map_err(|source| FsOpsError::io("extract.wrap_create_dir", path, source))?;
    let inner = path.join(&name);
    fs::rename(&staged, &inner)
        .map_err(|source| FsOpsError::io("extract.wrap_restore", &inner, source))?;
    debug!(path = %path.display(), "wrapped single archive");
    Ok(path.to_path_buf())
}

/// Discover archives under `root` in sorted order.
///
/// # Errors
///
/// Returns [`FsOpsError::Walkdir`] when the tree cannot be traversed.
pub fn plan_extraction(root: &Path) -> FsOpsResult<ExtractionPlan> {
    let mut plan = ExtractionPlan::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| FsOpsError::walkdir("extract.walk", root, source))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let part = ArchivePart::classify(entry.path());
        if part.should_extract() {
            plan.archives.push(part);
        } else if part.is_multipart {
            plan.skipped.push(part);
        }
    }
    Ok(plan)
}

/// Run the extraction stage for `unit` over freshly fetched `content`.
///
/// Returns the content the next stage works on, which becomes a directory
/// when a single archive was wrapped.
///
/// # Errors
///
/// Returns a command error when an extractor fails (remaining archives are
/// not attempted and nothing is deleted) and IO errors from wrapping or cleanup.
pub fn extract(
    runner: &dyn CommandRunner,
    unit: &DownloadUnit,
    content: LocalContent,
) -> FsOpsResult<LocalContent> {
    if !unit.auto_extract {
        return Ok(content);
    }

    let content = if !content.is_directory
        && ArchivePart::classify(&content.path).kind != ArchiveKind::None
    {
        LocalContent {
            path: wrap_single_archive(&content.path)?,
            is_directory: true,
        }
    } else {
        content
    };
    if !content.is_directory {
        return Ok(content);
    }

    let plan = plan_extraction(&content.path)?;
    if plan.archives.is_empty() {
        return Ok(content);
    }

    info!(
        torrent_id = %unit.torrent_id,
        path = %content.path.display(),
        archives = plan.archives.len(),
        skipped_volumes = plan.skipped.len(),
        "extracting archives"
    );
    for part in &plan.archives {
        let Some(command) = extraction_command(part) else {
            continue;
        };
        let operation = match part.kind {
            ArchiveKind::Rar => "extract.unrar",
            _ => "extract.unzip",
        };
        runner.run(operation, &command)?;
    }

    if unit.auto_delete_extracted {
        for path in plan.cleanup_paths() {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed extracted archive"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(source) => return Err(FsOpsError::io("extract.cleanup", &path, source)),
            }
        }
    }

    Ok(content)
}
