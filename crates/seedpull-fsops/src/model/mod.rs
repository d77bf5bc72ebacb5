//! Units of work flowing through the fetch, extract and finalize stages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FsOpsError, FsOpsResult};

/// One top-level file or folder of a completed torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadUnit {
    /// Torrent the unit belongs to.
    pub torrent_id: String,
    /// Absolute posix path on the seedbox.
    pub remote_path: String,
    /// Completion time shared by every unit of the torrent.
    pub completed_time: DateTime<Utc>,
    /// Whether the unit is a folder (mirrored) rather than a single file.
    pub is_directory: bool,
    /// Local staging directory.
    pub temp_dir: PathBuf,
    /// Local destination directory.
    pub final_dir: PathBuf,
    /// Whether archives are extracted after fetching.
    pub auto_extract: bool,
    /// Whether extracted archives are deleted afterwards.
    pub auto_delete_extracted: bool,
}

impl DownloadUnit {
    /// Final component of `remote_path`.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::InvalidInput`] when the path has no usable name.
    pub fn basename(&self) -> FsOpsResult<&str> {
        self.remote_path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .filter(|segment| *segment != "." && *segment != "..")
            .ok_or_else(|| FsOpsError::InvalidInput {
                field: "remote_path",
                reason: "missing_basename",
                value: Some(self.remote_path.clone()),
            })
    }

    /// Staging location: `temp_dir/<basename>`.
    ///
    /// # Errors
    ///
    /// Returns an error when the remote path has no usable name.
    pub fn local_path(&self) -> FsOpsResult<PathBuf> {
        Ok(self.temp_dir.join(self.basename()?))
    }
}

/// Local content produced by a stage and consumed by the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalContent {
    /// File or directory under the staging directory.
    pub path: PathBuf,
    /// Whether `path` is a directory.
    pub is_directory: bool,
}

/// Archive format recognised by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveKind {
    /// `.zip`
    Zip,
    /// `.rar`
    Rar,
    /// Anything else.
    None,
}

/// Classification of a file found in fetched content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePart {
    /// Location of the file.
    pub path: PathBuf,
    /// Archive format.
    pub kind: ArchiveKind,
    /// Whether the file is one volume of a multi-part RAR set.
    pub is_multipart: bool,
    /// Volume number for multi-part members.
    pub part_index: Option<u32>,
}

impl ArchivePart {
    /// Classify `path` by its suffixes.
    ///
    /// A `.rar` file is a multi-part member when its second-to-last suffix is
    /// `.partN` (one to three digits, any case) or a bare one-to-three digit
    /// number, e.g. `show.part01.rar` or `show.2.rar`.
    #[must_use]
    pub fn classify(path: &Path) -> Self {
        let kind = match extension_lowercase(path).as_deref() {
            Some("zip") => ArchiveKind::Zip,
            Some("rar") => ArchiveKind::Rar,
            _ => ArchiveKind::None,
        };
        let part_index = if kind == ArchiveKind::Rar {
            path.file_stem()
                .map(Path::new)
                .and_then(|stem| stem.extension())
                .and_then(|suffix| suffix.to_str())
                .and_then(parse_part_suffix)
        } else {
            None
        };
        Self {
            path: path.to_path_buf(),
            kind,
            is_multipart: part_index.is_some(),
            part_index,
        }
    }

    /// Whether this file should be handed to an extractor.
    ///
    /// Zip files always are; RAR files only when standalone or the first volume.
    #[must_use]
    pub const fn should_extract(&self) -> bool {
        match self.kind {
            ArchiveKind::Zip => true,
            ArchiveKind::Rar => !self.is_multipart || matches!(self.part_index, Some(1)),
            ArchiveKind::None => false,
        }
    }

    /// Identity shared by every volume of a multi-part set: the path without
    /// the volume and `.rar` suffixes.
    #[must_use]
    pub fn set_key(&self) -> Option<PathBuf> {
        if !self.is_multipart {
            return None;
        }
        let stem = Path::new(self.path.file_stem()?);
        let base = stem.file_stem()?;
        Some(self.path.with_file_name(base))
    }
}

/// Lowercased final extension of `path`.
pub(crate) fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

fn parse_part_suffix(suffix: &str) -> Option<u32> {
    let digits = match suffix.get(..4) {
        Some(prefix) if suffix.len() > 4 && prefix.eq_ignore_ascii_case("part") => &suffix[4..],
        _ => suffix,
    };
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn unit(remote_path: &str) -> DownloadUnit {
        DownloadUnit {
            torrent_id: "abc".into(),
            remote_path: remote_path.into(),
            completed_time: Utc::now(),
            is_directory: false,
            temp_dir: PathBuf::from("/tmp/incoming"),
            final_dir: PathBuf::from("/library"),
            auto_extract: false,
            auto_delete_extracted: false,
        }
    }

    #[test]
    fn basename_ignores_trailing_separators() -> Result<()> {
        assert_eq!(unit("/data/Show/").basename()?, "Show");
        assert_eq!(
            unit("/data/a.txt").local_path()?,
            PathBuf::from("/tmp/incoming/a.txt")
        );
        assert!(unit("/").basename().is_err());
        assert!(unit("/data/..").basename().is_err());
        Ok(())
    }

    #[test]
    fn first_volumes_are_extracted() {
        for name in ["show.part1.rar", "show.part01.rar", "show.PART001.rar", "show.1.rar"] {
            let part = ArchivePart::classify(Path::new(name));
            assert!(part.is_multipart, "{name}");
            assert_eq!(part.part_index, Some(1), "{name}");
            assert!(part.should_extract(), "{name}");
        }
    }

    #[test]
    fn later_volumes_are_skipped() {
        for name in ["show.part2.rar", "show.part02.rar", "show.2.rar", "show.Part010.rar"] {
            let part = ArchivePart::classify(Path::new(name));
            assert!(part.is_multipart, "{name}");
            assert!(!part.should_extract(), "{name}");
        }
    }

    #[test]
    fn standalone_archives_and_other_files() {
        let rar = ArchivePart::classify(Path::new("movie.RAR"));
        assert_eq!(rar.kind, ArchiveKind::Rar);
        assert!(!rar.is_multipart);
        assert!(rar.should_extract());

        let dotted = ArchivePart::classify(Path::new("movie.2019.rar"));
        assert!(!dotted.is_multipart);
        assert!(dotted.should_extract());

        let zip = ArchivePart::classify(Path::new("subs.part2.zip"));
        assert_eq!(zip.kind, ArchiveKind::Zip);
        assert!(!zip.is_multipart);
        assert!(zip.should_extract());

        let volume = ArchivePart::classify(Path::new("movie.r00"));
        assert_eq!(volume.kind, ArchiveKind::None);
        assert!(!volume.should_extract());

        let partial = ArchivePart::classify(Path::new("movie.partial.rar"));
        assert!(!partial.is_multipart);
    }

    #[test]
    fn volumes_share_a_set_key() {
        let first = ArchivePart::classify(Path::new("/d/show.part01.rar"));
        let second = ArchivePart::classify(Path::new("/d/show.part02.rar"));
        assert_eq!(first.set_key(), Some(PathBuf::from("/d/show")));
        assert_eq!(first.set_key(), second.set_key());
        assert_eq!(ArchivePart::classify(Path::new("/d/x.rar")).set_key(), None);
    }
}
