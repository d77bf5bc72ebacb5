//! Transmission adapter speaking the Transmission RPC protocol.
//!
//! # Design
//! - Requests carry the `X-Transmission-Session-Id` header. A `409` response
//!   hands out a fresh id; the request is retried once with it.
//! - Torrents are addressed by hash string, which Transmission accepts
//!   anywhere it accepts numeric ids.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

use seedpull_config::TransmissionConfig;
use seedpull_torrent_core::{
    CompletedTorrent, TorrentClient, TorrentError, TorrentResult, TorrentSubmission,
};

use crate::http::{build_client, timestamp_from_secs};

/// Header carrying the CSRF session token.
pub const SESSION_HEADER: &str = "X-Transmission-Session-Id";

const STATUS_FIELDS: [&str; 5] = ["hashString", "percentDone", "downloadDir", "doneDate", "files"];

/// Torrent client backed by Transmission's RPC endpoint.
#[derive(Debug)]
pub struct TransmissionClient {
    client: Client,
    endpoint: Url,
    user: Option<String>,
    password: Option<String>,
    session_id: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct AddedTorrent {
    #[serde(rename = "hashString")]
    hash_string: String,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<TorrentStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TorrentStatus {
    hash_string: String,
    #[serde(default)]
    percent_done: f64,
    #[serde(default)]
    download_dir: String,
    #[serde(default)]
    done_date: i64,
    #[serde(default)]
    files: Vec<TorrentFile>,
}

#[derive(Debug, Deserialize)]
struct TorrentFile {
    name: String,
}

impl TransmissionClient {
    /// Build a client for the RPC endpoint at `config.rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: &TransmissionConfig) -> TorrentResult<Self> {
        Ok(Self {
            client: build_client(false)?,
            endpoint: config.rpc_url.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            session_id: RwLock::new(None),
        })
    }

    fn request(&self, body: &Value, session_id: Option<&str>) -> RequestBuilder {
        let mut request = self.client.post(self.endpoint.clone()).json(body);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_deref());
        }
        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }
        request
    }

    async fn call(&self, method: &'static str, arguments: Value) -> TorrentResult<Value> {
        let body = json!({ "method": method, "arguments": arguments });

        let current = self.session_id.read().await.clone();
        let mut response = self
            .request(&body, current.as_deref())
            .send()
            .await
            .map_err(|source| TorrentError::failed(method, source))?;

        if response.status() == StatusCode::CONFLICT {
            let fresh = response
                .headers()
                .get(SESSION_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(TorrentError::invalid(method, "409 without session id"))?;
            debug!("transmission session id refreshed");
            *self.session_id.write().await = Some(fresh.clone());
            response = self
                .request(&body, Some(&fresh))
                .send()
                .await
                .map_err(|source| TorrentError::failed(method, source))?;
        }

        let body: RpcResponse = response
            .error_for_status()
            .map_err(|source| TorrentError::failed(method, source))?
            .json()
            .await
            .map_err(|source| TorrentError::failed(method, source))?;

        if body.result != "success" {
            return Err(TorrentError::Rejected {
                operation: method,
                message: body.result,
            });
        }
        Ok(body.arguments)
    }
}

#[async_trait]
impl TorrentClient for TransmissionClient {
    fn name(&self) -> &'static str {
        "transmission"
    }

    async fn submit(&self, submission: TorrentSubmission) -> TorrentResult<String> {
        let arguments = match &submission {
            TorrentSubmission::Magnet { uri } => json!({ "filename": uri }),
            TorrentSubmission::Url { url } => json!({ "filename": url }),
            TorrentSubmission::Metainfo { bytes, .. } => {
                json!({ "metainfo": STANDARD.encode(bytes) })
            }
        };

        let mut response = self.call("torrent-add", arguments).await?;
        if let Some(added) = response.get_mut("torrent-added").map(Value::take) {
            let added: AddedTorrent = serde_json::from_value(added)
                .map_err(|_| TorrentError::invalid("torrent-add", "malformed torrent-added"))?;
            return Ok(added.hash_string);
        }
        if let Some(existing) = response.get_mut("torrent-duplicate").map(Value::take) {
            let existing: AddedTorrent = serde_json::from_value(existing).map_err(|_| {
                TorrentError::invalid("torrent-add", "malformed torrent-duplicate")
            })?;
            info!(torrent_id = %existing.hash_string, "torrent already in session");
            return Ok(existing.hash_string);
        }
        Err(TorrentError::invalid(
            "torrent-add",
            "response names neither an added nor a duplicate torrent",
        ))
    }

    #[allow(clippy::cast_precision_loss)]
    async fn list_completed(
        &self,
        ids: &BTreeSet<String>,
    ) -> TorrentResult<BTreeMap<String, CompletedTorrent>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let arguments = self
            .call(
                "torrent-get",
                json!({ "ids": ids, "fields": STATUS_FIELDS }),
            )
            .await?;
        let list: TorrentList = serde_json::from_value(arguments)
            .map_err(|_| TorrentError::invalid("torrent-get", "malformed torrent list"))?;

        Ok(list
            .torrents
            .into_iter()
            .filter(|torrent| ids.contains(&torrent.hash_string))
            .filter(|torrent| (torrent.percent_done - 1.0).abs() < f64::EPSILON)
            .map(|torrent| {
                let completed = CompletedTorrent {
                    base_dir: torrent.download_dir,
                    completed_time: timestamp_from_secs(torrent.done_date as f64),
                    files: torrent.files.into_iter().map(|file| file.name).collect(),
                };
                (torrent.hash_string, completed)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use httpmock::MockServer;
    use httpmock::prelude::*;

    fn client_for(server: &MockServer, user: Option<&str>) -> Result<TransmissionClient> {
        Ok(TransmissionClient::new(&TransmissionConfig {
            rpc_url: Url::parse(&format!("{}/transmission/rpc", server.base_url()))?,
            user: user.map(str::to_string),
            password: user.map(|_| "secret".to_string()),
        })?)
    }

    #[tokio::test]
    async fn conflict_refreshes_session_and_retries() -> Result<()> {
        let server = MockServer::start_async().await;
        let stale = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .header(SESSION_HEADER, "stale");
            then.status(409).header(SESSION_HEADER, "fresh");
        });
        let fresh = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .header(SESSION_HEADER, "fresh")
                .json_body(json!({
                    "method": "torrent-add",
                    "arguments": {"filename": "magnet:?xt=urn:btih:abc"}
                }));
            then.status(200).json_body(json!({
                "result": "success",
                "arguments": {
                    "torrent-added": {"hashString": "abc", "id": 7, "name": "show"}
                }
            }));
        });

        let client = client_for(&server, None)?;
        *client.session_id.write().await = Some("stale".to_string());
        let id = client
            .submit(TorrentSubmission::Magnet {
                uri: "magnet:?xt=urn:btih:abc".into(),
            })
            .await?;

        assert_eq!(id, "abc");
        stale.assert();
        fresh.assert();
        assert_eq!(client.session_id.read().await.as_deref(), Some("fresh"));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_submission_returns_existing_hash() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/transmission/rpc")
                .header("authorization", "Basic dXNlcjpzZWNyZXQ=")
                .json_body(json!({
                    "method": "torrent-add",
                    "arguments": {"metainfo": "ZDQ6aW5mb2Vl"}
                }));
            then.status(200).json_body(json!({
                "result": "success",
                "arguments": {
                    "torrent-duplicate": {"hashString": "def", "id": 3, "name": "movie"}
                }
            }));
        });

        let client = client_for(&server, Some("user"))?;
        let id = client
            .submit(TorrentSubmission::Metainfo {
                name: "movie.torrent".into(),
                bytes: b"d4:infoee".to_vec(),
            })
            .await?;
        assert_eq!(id, "def");
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn list_completed_keeps_only_finished_torrents() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/transmission/rpc").json_body(json!({
                "method": "torrent-get",
                "arguments": {
                    "ids": ["aaa", "bbb"],
                    "fields": ["hashString", "percentDone", "downloadDir", "doneDate", "files"]
                }
            }));
            then.status(200).json_body(json!({
                "result": "success",
                "arguments": {
                    "torrents": [
                        {
                            "hashString": "aaa",
                            "percentDone": 1,
                            "downloadDir": "/downloads/complete",
                            "doneDate": 1_700_000_100,
                            "files": [
                                {"name": "a.txt", "length": 1, "bytesCompleted": 1},
                                {"name": "sub/b.txt", "length": 1, "bytesCompleted": 1}
                            ]
                        },
                        {
                            "hashString": "bbb",
                            "percentDone": 0.5,
                            "downloadDir": "/downloads/incomplete",
                            "doneDate": 0,
                            "files": []
                        }
                    ]
                }
            }));
        });

        let client = client_for(&server, None)?;
        let ids = BTreeSet::from(["aaa".to_string(), "bbb".to_string()]);
        let completed = client.list_completed(&ids).await?;

        mock.assert();
        assert_eq!(completed.len(), 1);
        let torrent = &completed["aaa"];
        assert_eq!(torrent.base_dir, "/downloads/complete");
        assert_eq!(torrent.completed_time.timestamp(), 1_700_000_100);
        assert_eq!(torrent.files, vec!["a.txt", "sub/b.txt"]);
        Ok(())
    }

    #[tokio::test]
    async fn non_success_result_is_rejected() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/transmission/rpc");
            then.status(200)
                .json_body(json!({"result": "invalid or corrupt torrent file", "arguments": {}}));
        });

        let client = client_for(&server, None)?;
        let err = client
            .submit(TorrentSubmission::Url {
                url: "https://tracker.example/bad.torrent".into(),
            })
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected rejection"))?;
        assert!(matches!(
            err,
            TorrentError::Rejected { ref message, .. } if message == "invalid or corrupt torrent file"
        ));
        Ok(())
    }

    #[tokio::test]
    async fn list_completed_with_no_ids_skips_the_backend() -> Result<()> {
        let server = MockServer::start_async().await;
        let client = client_for(&server, None)?;
        assert!(client.list_completed(&BTreeSet::new()).await?.is_empty());
        Ok(())
    }
}
