//! Watch records and the persisted state document.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-torrent bookkeeping created when a torrent is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchRecord {
    /// Directory that receives the fetched content.
    pub temp_dir: PathBuf,
    /// Directory the content is moved into once processed.
    pub final_dir: PathBuf,
    /// Name of the submitted file, kept for log context.
    #[serde(default)]
    pub name: String,
    /// Whether archives are extracted after fetching.
    #[serde(default)]
    pub auto_extract: bool,
    /// Whether extracted archives are deleted after extraction succeeds.
    #[serde(default)]
    pub auto_delete_extracted: bool,
}

/// On-disk layout of the state file.
///
/// Top-level keys other than `watching_torrents` are carried through rewrites
/// untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    /// Watched torrents keyed by torrent id.
    #[serde(default)]
    pub watching_torrents: BTreeMap<String, WatchRecord>,
    /// Unrecognised top-level keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
