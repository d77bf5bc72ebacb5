#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! HTTP adapters that implement [`TorrentClient`] for Deluge and Transmission.
//!
//! Layout: `deluge.rs` (Web UI JSON-RPC), `transmission.rs` (Transmission RPC),
//! `http.rs` (shared HTTP client construction and timestamp helpers).

use std::sync::Arc;

use seedpull_config::TorrentClientConfig;
use seedpull_torrent_core::{TorrentClient, TorrentResult};

pub mod deluge;
mod http;
pub mod transmission;

pub use deluge::DelugeClient;
pub use transmission::TransmissionClient;

/// Build the backend selected by configuration.
///
/// # Errors
///
/// Returns an error when the HTTP client cannot be constructed.
pub fn connect(config: &TorrentClientConfig) -> TorrentResult<Arc<dyn TorrentClient>> {
    Ok(match config {
        TorrentClientConfig::Deluge(settings) => Arc::new(DelugeClient::new(settings)?),
        TorrentClientConfig::Transmission(settings) => {
            Arc::new(TransmissionClient::new(settings)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedpull_config::{DelugeConfig, TransmissionConfig};
    use url::Url;

    #[test]
    fn connect_picks_the_configured_backend() -> anyhow::Result<()> {
        let deluge = connect(&TorrentClientConfig::Deluge(DelugeConfig {
            web_url: Url::parse("http://seedbox.example:8112")?,
            password: "secret".into(),
        }))?;
        assert_eq!(deluge.name(), "deluge");

        let transmission = connect(&TorrentClientConfig::Transmission(TransmissionConfig {
            rpc_url: Url::parse("http://seedbox.example:9091/transmission/rpc")?,
            user: None,
            password: None,
        }))?;
        assert_eq!(transmission.name(), "transmission");
        Ok(())
    }
}
