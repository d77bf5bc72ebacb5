//! Watch-state store implementations.
//!
//! # Design
//! - `WatchStore` is the sole source of truth for which torrents the daemon
//!   still owns; records disappear only after every unit was finalised.
//! - `JsonFileStore` re-reads the document on every call and rewrites it in
//!   full through a sibling temporary file renamed into place.
//! - `MemoryStore` backs tests and dry runs.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::error::{StateError, StateResult};
use crate::model::{StateDocument, WatchRecord};

/// Persistence seam for watch records.
pub trait WatchStore: Send + Sync {
    /// Every watched torrent keyed by id.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing document cannot be read.
    fn watching(&self) -> StateResult<BTreeMap<String, WatchRecord>>;

    /// Look up a single watch record.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing document cannot be read.
    fn get(&self, torrent_id: &str) -> StateResult<Option<WatchRecord>> {
        Ok(self.watching()?.remove(torrent_id))
    }

    /// Insert or replace the record for `torrent_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing document cannot be updated.
    fn add(&self, torrent_id: &str, record: WatchRecord) -> StateResult<()>;

    /// Stop watching `torrent_id`. Returns `false` when it was not watched.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing document cannot be updated.
    fn remove(&self, torrent_id: &str) -> StateResult<bool>;
}

/// Watch store persisted as a single JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Create a store backed by the document at `path`. The file is created on
    /// the first mutation.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StateResult<StateDocument> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(
                    path = %self.path.display(),
                    "state file missing; treating as empty"
                );
                return Ok(StateDocument::default());
            }
            Err(source) => return Err(StateError::io("state.read", &self.path, source)),
        };
        if contents.trim().is_empty() {
            return Ok(StateDocument::default());
        }
        serde_json::from_str(&contents)
            .map_err(|source| StateError::json("state.parse", &self.path, source))
    }

    fn persist(&self, document: &StateDocument) -> StateResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|source| StateError::io("state.create_parent", parent, source))?;
        }
        let serialised = serde_json::to_string_pretty(document)
            .map_err(|source| StateError::json("state.serialize", &self.path, source))?;
        let staging = staging_path(&self.path);
        fs::write(&staging, serialised)
            .map_err(|source| StateError::io("state.write", &staging, source))?;
        fs::rename(&staging, &self.path)
            .map_err(|source| StateError::io("state.rename", &self.path, source))
    }

    fn mutate<T>(&self, op: impl FnOnce(&mut StateDocument) -> Mutation<T>) -> StateResult<T> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut document = self.load()?;
        match op(&mut document) {
            Mutation::Changed(value) => {
                self.persist(&document)?;
                Ok(value)
            }
            Mutation::Unchanged(value) => Ok(value),
        }
    }
}

/// Result of an edit to the loaded document; only changed documents are written back.
enum Mutation<T> {
    Changed(T),
    Unchanged(T),
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

impl WatchStore for JsonFileStore {
    fn watching(&self) -> StateResult<BTreeMap<String, WatchRecord>> {
        Ok(self.load()?.watching_torrents)
    }

    fn add(&self, torrent_id: &str, record: WatchRecord) -> StateResult<()> {
        self.mutate(|document| {
            document
                .watching_torrents
                .insert(torrent_id.to_string(), record);
            Mutation::Changed(())
        })?;
        debug!(torrent_id = %torrent_id, "watch record stored");
        Ok(())
    }

    fn remove(&self, torrent_id: &str) -> StateResult<bool> {
        let removed = self.mutate(|document| {
            if document.watching_torrents.remove(torrent_id).is_some() {
                Mutation::Changed(true)
            } else {
                Mutation::Unchanged(false)
            }
        })?;
        if removed {
            debug!(torrent_id = %torrent_id, "watch record released");
        } else {
            warn!(torrent_id = %torrent_id, "attempted to stop watching an unknown torrent");
        }
        Ok(removed)
    }
}

/// In-memory watch store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<String, WatchRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WatchStore for MemoryStore {
    fn watching(&self) -> StateResult<BTreeMap<String, WatchRecord>> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn add(&self, torrent_id: &str, record: WatchRecord) -> StateResult<()> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(torrent_id.to_string(), record);
        Ok(())
    }

    fn remove(&self, torrent_id: &str) -> StateResult<bool> {
        let removed = self
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(torrent_id)
            .is_some();
        if !removed {
            warn!(torrent_id = %torrent_id, "attempted to stop watching an unknown torrent");
        }
        Ok(removed)
    }
}
