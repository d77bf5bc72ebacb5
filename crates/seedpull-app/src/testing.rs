//! In-memory torrent client used by scanner and orchestrator tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use seedpull_torrent_core::{
    CompletedTorrent, TorrentClient, TorrentError, TorrentResult, TorrentSubmission,
};

#[derive(Debug, Default)]
pub(crate) struct FakeClient {
    submitted: Mutex<Vec<TorrentSubmission>>,
    completed: Mutex<BTreeMap<String, CompletedTorrent>>,
    list_calls: Mutex<Vec<BTreeSet<String>>>,
    reject_submissions: AtomicBool,
    fail_listing: AtomicBool,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Id the client assigns to a submission keyed by file name, URI or URL.
    pub(crate) fn id_for(key: &str) -> String {
        format!("id-{key}")
    }

    pub(crate) fn reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    pub(crate) fn fail_listing(&self, fail: bool) {
        self.fail_listing.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn complete(&self, torrent_id: &str, torrent: CompletedTorrent) {
        self.completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(torrent_id.to_string(), torrent);
    }

    pub(crate) fn submitted(&self) -> Vec<TorrentSubmission> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn list_calls(&self) -> Vec<BTreeSet<String>> {
        self.list_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl TorrentClient for FakeClient {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn submit(&self, submission: TorrentSubmission) -> TorrentResult<String> {
        self.submitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(submission.clone());
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(TorrentError::Rejected {
                operation: "submit",
                message: "rejected by test".into(),
            });
        }
        let key = match &submission {
            TorrentSubmission::Magnet { uri } => uri,
            TorrentSubmission::Url { url } => url,
            TorrentSubmission::Metainfo { name, .. } => name,
        };
        Ok(Self::id_for(key))
    }

    async fn list_completed(
        &self,
        ids: &BTreeSet<String>,
    ) -> TorrentResult<BTreeMap<String, CompletedTorrent>> {
        self.list_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ids.clone());
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(TorrentError::InvalidResponse {
                operation: "list_completed",
                reason: "listing disabled by test",
            });
        }
        Ok(self
            .completed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(id, _)| ids.contains(*id))
            .map(|(id, torrent)| (id.clone(), torrent.clone()))
            .collect())
    }
}
