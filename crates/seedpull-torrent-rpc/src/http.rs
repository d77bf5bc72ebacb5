//! Shared HTTP plumbing for the RPC adapters.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use seedpull_torrent_core::{TorrentError, TorrentResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn build_client(cookies: bool) -> TorrentResult<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .cookie_store(cookies)
        .build()
        .map_err(|source| TorrentError::failed("http.build_client", source))
}

/// Convert fractional unix seconds into a UTC timestamp, clamping bad input to the epoch.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn timestamp_from_secs(secs: f64) -> DateTime<Utc> {
    if !secs.is_finite() || secs <= 0.0 {
        return DateTime::<Utc>::UNIX_EPOCH;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
