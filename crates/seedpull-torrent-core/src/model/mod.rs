//! Submission payloads and completion reports exchanged with torrent clients.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TorrentError, TorrentResult};

/// File extension that marks a text file holding a magnet URI or a URL.
pub const MAGNET_EXTENSION: &str = "magnet";

/// Payload handed to a torrent client when submitting a new torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentSubmission {
    /// A magnet URI.
    Magnet {
        /// Magnet URI to resolve and add.
        uri: String,
    },
    /// A URL the client downloads the metainfo from.
    Url {
        /// Location of the `.torrent` document.
        url: String,
    },
    /// Raw `.torrent` metainfo bytes.
    Metainfo {
        /// File name the metainfo was read from.
        name: String,
        /// Bencoded metainfo payload.
        bytes: Vec<u8>,
    },
}

impl TorrentSubmission {
    /// Build a submission from a file found in a watch directory.
    ///
    /// `.magnet` files are read as text: content starting with `magnet:`
    /// becomes [`TorrentSubmission::Magnet`], anything else
    /// [`TorrentSubmission::Url`]. Every other file is sent as metainfo.
    ///
    /// # Errors
    ///
    /// Returns [`TorrentError::Io`] when the file cannot be read.
    pub fn from_path(path: &Path) -> TorrentResult<Self> {
        let is_magnet = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(MAGNET_EXTENSION));

        if is_magnet {
            let text = fs::read_to_string(path).map_err(|source| TorrentError::Io {
                operation: "submission.read_magnet",
                path: path.to_path_buf(),
                source,
            })?;
            let text = text.trim().to_string();
            return Ok(if text.starts_with("magnet:") {
                Self::Magnet { uri: text }
            } else {
                Self::Url { url: text }
            });
        }

        let bytes = fs::read(path).map_err(|source| TorrentError::Io {
            operation: "submission.read_metainfo",
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::Metainfo { name, bytes })
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Magnet { .. } => "magnet",
            Self::Url { .. } => "url",
            Self::Metainfo { .. } => "metainfo",
        }
    }
}

/// A torrent the client reports as fully downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTorrent {
    /// Remote directory the torrent's files are stored under.
    pub base_dir: String,
    /// Moment the client finished the download.
    pub completed_time: DateTime<Utc>,
    /// File paths relative to `base_dir`, posix separated, in client order.
    pub files: Vec<String>,
}
