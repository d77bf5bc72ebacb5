//! Client trait implemented by torrent backends.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::error::TorrentResult;
use crate::model::{CompletedTorrent, TorrentSubmission};

/// Operations the daemon needs from a torrent client.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend label used in logs.
    fn name(&self) -> &'static str;

    /// Hand a torrent to the client and return its id.
    ///
    /// A torrent the client already knows resolves to the existing id rather
    /// than an error.
    async fn submit(&self, submission: TorrentSubmission) -> TorrentResult<String>;

    /// Report which of `ids` are fully downloaded.
    ///
    /// Ids that are unknown to the client or still downloading are absent from
    /// the result. An empty request yields an empty map.
    async fn list_completed(
        &self,
        ids: &BTreeSet<String>,
    ) -> TorrentResult<BTreeMap<String, CompletedTorrent>>;
}
