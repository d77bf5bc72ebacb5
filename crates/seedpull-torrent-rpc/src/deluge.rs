//! Deluge adapter speaking the Web UI JSON-RPC protocol.
//!
//! # Design
//! - Every call is `POST <web_url>/json` with `{method, params, id}`; the Web UI
//!   keeps the session in a cookie, so the HTTP client carries a cookie store.
//! - The session is established lazily (`auth.login`, then `web.connect` to the
//!   first known daemon when the Web UI is not attached to one). A call answered
//!   with the "not authenticated" error code re-establishes it once.
//! - Duplicate submissions only surface as an error message; the hash is
//!   recovered from it with a regex and treated as success.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use regex::{Regex, RegexBuilder};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use seedpull_config::DelugeConfig;
use seedpull_torrent_core::{
    CompletedTorrent, TorrentClient, TorrentError, TorrentResult, TorrentSubmission,
};

use crate::http::{build_client, timestamp_from_secs};

/// Error code the Web UI uses for calls made without a valid session.
const NOT_AUTHENTICATED: i64 = 1;

const STATUS_KEYS: [&str; 4] = ["completed_time", "download_location", "files", "progress"];

const DUPLICATE_PATTERN: &str = r"Torrent already in session \(([0-9a-z]+)\)";

/// Torrent client backed by the Deluge Web UI.
#[derive(Debug)]
pub struct DelugeClient {
    client: Client,
    endpoint: Url,
    password: String,
    next_id: AtomicU64,
    session_ready: AtomicBool,
    duplicate: Regex,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: i64,
}

#[derive(Debug, Deserialize)]
struct TorrentStatus {
    #[serde(default)]
    completed_time: f64,
    #[serde(default)]
    download_location: String,
    #[serde(default)]
    files: Vec<TorrentFile>,
    #[serde(default)]
    progress: f64,
}

#[derive(Debug, Deserialize)]
struct TorrentFile {
    path: String,
}

impl DelugeClient {
    /// Build a client for the Web UI at `config.web_url`.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be constructed.
    pub fn new(config: &DelugeConfig) -> TorrentResult<Self> {
        let mut base = config.web_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("json")
            .map_err(|source| TorrentError::failed("deluge.endpoint", source))?;
        let duplicate = RegexBuilder::new(DUPLICATE_PATTERN)
            .case_insensitive(true)
            .build()
            .map_err(|source| TorrentError::failed("deluge.duplicate_pattern", source))?;

        Ok(Self {
            client: build_client(true)?,
            endpoint,
            password: config.password.clone(),
            next_id: AtomicU64::new(1),
            session_ready: AtomicBool::new(false),
            duplicate,
        })
    }

    /// Issue one raw JSON-RPC call. The outer result carries transport
    /// failures, the inner one errors reported by the Web UI.
    async fn call(
        &self,
        method: &'static str,
        params: Value,
    ) -> TorrentResult<Result<Value, RpcError>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&json!({ "method": method, "params": params, "id": id }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| TorrentError::failed(method, source))?;
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|source| TorrentError::failed(method, source))?;
        Ok(match body.error {
            Some(error) => Err(error),
            None => Ok(body.result),
        })
    }

    async fn call_checked(&self, method: &'static str, params: Value) -> TorrentResult<Value> {
        self.call(method, params)
            .await?
            .map_err(|error| TorrentError::Rejected {
                operation: method,
                message: error.message,
            })
    }

    async fn establish_session(&self) -> TorrentResult<()> {
        let logged_in = self
            .call_checked("auth.login", json!([self.password]))
            .await?;
        if logged_in != Value::Bool(true) {
            return Err(TorrentError::Rejected {
                operation: "auth.login",
                message: "web ui rejected the configured password".to_string(),
            });
        }

        let connected = self.call_checked("web.connected", json!([])).await?;
        if connected != Value::Bool(true) {
            let hosts = self.call_checked("web.get_hosts", json!([])).await?;
            let host_id = hosts
                .as_array()
                .and_then(|hosts| hosts.first())
                .and_then(|host| host.get(0))
                .and_then(Value::as_str)
                .ok_or(TorrentError::invalid(
                    "web.get_hosts",
                    "no daemon configured in web ui",
                ))?
                .to_string();
            self.call_checked("web.connect", json!([host_id])).await?;
            info!(host_id = %host_id, "connected deluge web ui to daemon");
        }

        self.session_ready.store(true, Ordering::Release);
        debug!(endpoint = %self.endpoint, "deluge session established");
        Ok(())
    }

    /// Call a method that needs an authenticated, daemon-attached session.
    async fn call_session(
        &self,
        method: &'static str,
        params: Value,
    ) -> TorrentResult<Result<Value, RpcError>> {
        if !self.session_ready.load(Ordering::Acquire) {
            self.establish_session().await?;
        }
        match self.call(method, params.clone()).await? {
            Err(error) if error.code == NOT_AUTHENTICATED => {
                debug!(method, "deluge session expired; logging in again");
                self.session_ready.store(false, Ordering::Release);
                self.establish_session().await?;
                self.call(method, params).await
            }
            outcome => Ok(outcome),
        }
    }

    /// Hash named by a "Torrent already in session" error message.
    fn duplicate_id(&self, message: &str) -> Option<String> {
        self.duplicate
            .captures(message)
            .and_then(|captures| captures.get(1))
            .map(|hash| hash.as_str().to_ascii_lowercase())
    }
}

#[async_trait]
impl TorrentClient for DelugeClient {
    fn name(&self) -> &'static str {
        "deluge"
    }

    async fn submit(&self, submission: TorrentSubmission) -> TorrentResult<String> {
        let (method, params) = match &submission {
            TorrentSubmission::Magnet { uri } => ("core.add_torrent_magnet", json!([uri, {}])),
            TorrentSubmission::Url { url } => ("core.add_torrent_url", json!([url, {}])),
            TorrentSubmission::Metainfo { name, bytes } => (
                "core.add_torrent_file",
                json!([name, STANDARD.encode(bytes), {}]),
            ),
        };

        match self.call_session(method, params).await? {
            Ok(Value::String(id)) => Ok(id),
            Ok(_) => Err(TorrentError::invalid(method, "torrent id missing from response")),
            Err(error) => {
                if let Some(existing) = self.duplicate_id(&error.message) {
                    info!(torrent_id = %existing, "torrent already in session");
                    return Ok(existing);
                }
                Err(TorrentError::Rejected {
                    operation: method,
                    message: error.message,
                })
            }
        }
    }

    async fn list_completed(
        &self,
        ids: &BTreeSet<String>,
    ) -> TorrentResult<BTreeMap<String, CompletedTorrent>> {
        if ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let method = "core.get_torrents_status";
        let result = self
            .call_session(method, json!([{ "id": ids }, STATUS_KEYS]))
            .await?
            .map_err(|error| TorrentError::Rejected {
                operation: method,
                message: error.message,
            })?;
        let statuses: BTreeMap<String, TorrentStatus> = serde_json::from_value(result)
            .map_err(|_| TorrentError::invalid(method, "malformed torrent status map"))?;

        Ok(statuses
            .into_iter()
            .filter(|(id, status)| {
                ids.contains(id) && status.completed_time > 0.0 && status.progress >= 100.0
            })
            .map(|(id, status)| {
                let completed = CompletedTorrent {
                    base_dir: status.download_location,
                    completed_time: timestamp_from_secs(status.completed_time),
                    files: status.files.into_iter().map(|file| file.path).collect(),
                };
                (id, completed)
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

    fn client_for(server: &MockServer) -> Result<DelugeClient> {
        Ok(DelugeClient::new(&DelugeConfig {
            web_url: Url::parse(&server.base_url())?,
            password: "deluge".into(),
        })?)
    }

    fn rpc_ok(id: u64, result: &Value) -> Value {
        json!({ "result": result, "error": null, "id": id })
    }

    #[test]
    fn endpoint_keeps_base_path() -> Result<()> {
        let client = DelugeClient::new(&DelugeConfig {
            web_url: Url::parse("http://seedbox.example/deluge")?,
            password: String::new(),
        })?;
        assert_eq!(client.endpoint.as_str(), "http://seedbox.example/deluge/json");
        Ok(())
    }

    #[test]
    fn duplicate_message_yields_lowercase_hash() -> Result<()> {
        let client = DelugeClient::new(&DelugeConfig {
            web_url: Url::parse("http://seedbox.example:8112")?,
            password: String::new(),
        })?;
        assert_eq!(
            client.duplicate_id("AddTorrentError: Torrent already in session (ABCDEF0123)."),
            Some("abcdef0123".to_string())
        );
        assert_eq!(
            client.duplicate_id("torrent ALREADY in session (deadbeef)"),
            Some("deadbeef".to_string())
        );
        assert_eq!(client.duplicate_id("Unable to add torrent"), None);
        Ok(())
    }

    #[tokio::test]
    async fn submit_resolves_duplicates_to_existing_id() -> Result<()> {
        let server = MockServer::start_async().await;
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "auth.login", "params": ["deluge"], "id": 1}));
            then.status(200).json_body(rpc_ok(1, &json!(true)));
        });
        let connected = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "web.connected", "params": [], "id": 2}));
            then.status(200).json_body(rpc_ok(2, &json!(true)));
        });
        let add = server.mock(|when, then| {
            when.method(POST).path("/json").json_body(json!({
                "method": "core.add_torrent_magnet",
                "params": ["magnet:?xt=urn:btih:abcdef0123", {}],
                "id": 3
            }));
            then.status(200).json_body(json!({
                "result": null,
                "error": {
                    "message": "AddTorrentError: Torrent already in session (abcdef0123).",
                    "code": 4
                },
                "id": 3
            }));
        });

        let client = client_for(&server)?;
        let id = client
            .submit(TorrentSubmission::Magnet {
                uri: "magnet:?xt=urn:btih:abcdef0123".into(),
            })
            .await?;

        assert_eq!(id, "abcdef0123");
        login.assert();
        connected.assert();
        add.assert();
        Ok(())
    }

    #[tokio::test]
    async fn list_completed_connects_daemon_and_filters_progress() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "auth.login", "params": ["deluge"], "id": 1}));
            then.status(200).json_body(rpc_ok(1, &json!(true)));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "web.connected", "params": [], "id": 2}));
            then.status(200).json_body(rpc_ok(2, &json!(false)));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "web.get_hosts", "params": [], "id": 3}));
            then.status(200).json_body(rpc_ok(
                3,
                &json!([["host-1", "127.0.0.1", 58846, "localclient"]]),
            ));
        });
        let connect = server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "web.connect", "params": ["host-1"], "id": 4}));
            then.status(200).json_body(rpc_ok(4, &json!(["core.get_torrents_status"])));
        });
        let status = server.mock(|when, then| {
            when.method(POST).path("/json").json_body(json!({
                "method": "core.get_torrents_status",
                "params": [
                    {"id": ["aaa", "bbb"]},
                    ["completed_time", "download_location", "files", "progress"]
                ],
                "id": 5
            }));
            then.status(200).json_body(rpc_ok(
                5,
                &json!({
                    "aaa": {
                        "completed_time": 1_700_000_000.0,
                        "download_location": "/data/complete",
                        "files": [
                            {"index": 0, "path": "Show/e01.mkv", "size": 10},
                            {"index": 1, "path": "Show/e02.mkv", "size": 10}
                        ],
                        "progress": 100.0
                    },
                    "bbb": {
                        "completed_time": 0.0,
                        "download_location": "/data/incomplete",
                        "files": [{"index": 0, "path": "movie.mkv", "size": 10}],
                        "progress": 42.5
                    }
                }),
            ));
        });

        let client = client_for(&server)?;
        let ids = BTreeSet::from(["aaa".to_string(), "bbb".to_string()]);
        let completed = client.list_completed(&ids).await?;

        connect.assert();
        status.assert();
        assert_eq!(completed.len(), 1);
        let torrent = &completed["aaa"];
        assert_eq!(torrent.base_dir, "/data/complete");
        assert_eq!(torrent.completed_time.timestamp(), 1_700_000_000);
        assert_eq!(torrent.files, vec!["Show/e01.mkv", "Show/e02.mkv"]);
        Ok(())
    }

    #[tokio::test]
    async fn expired_session_is_re_established_once() -> Result<()> {
        let server = MockServer::start_async().await;
        for (id, method, params, result) in [
            (1, "auth.login", json!(["deluge"]), json!(true)),
            (2, "web.connected", json!([]), json!(true)),
            (4, "auth.login", json!(["deluge"]), json!(true)),
            (5, "web.connected", json!([]), json!(true)),
        ] {
            server.mock(|when, then| {
                when.method(POST)
                    .path("/json")
                    .json_body(json!({"method": method, "params": params, "id": id}));
                then.status(200).json_body(rpc_ok(id, &result));
            });
        }
        server.mock(|when, then| {
            when.method(POST).path("/json").json_body(json!({
                "method": "core.get_torrents_status",
                "params": [
                    {"id": ["aaa"]},
                    ["completed_time", "download_location", "files", "progress"]
                ],
                "id": 3
            }));
            then.status(200).json_body(json!({
                "result": null,
                "error": {"message": "Not authenticated", "code": 1},
                "id": 3
            }));
        });
        let retried = server.mock(|when, then| {
            when.method(POST).path("/json").json_body(json!({
                "method": "core.get_torrents_status",
                "params": [
                    {"id": ["aaa"]},
                    ["completed_time", "download_location", "files", "progress"]
                ],
                "id": 6
            }));
            then.status(200).json_body(rpc_ok(6, &json!({})));
        });

        let client = client_for(&server)?;
        let ids = BTreeSet::from(["aaa".to_string()]);
        assert!(client.list_completed(&ids).await?.is_empty());
        retried.assert();
        Ok(())
    }

    #[tokio::test]
    async fn list_completed_with_no_ids_skips_the_backend() -> Result<()> {
        let server = MockServer::start_async().await;
        let client = client_for(&server)?;
        assert!(client.list_completed(&BTreeSet::new()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn rejected_login_is_reported() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/json")
                .json_body(json!({"method": "auth.login", "params": ["deluge"], "id": 1}));
            then.status(200).json_body(rpc_ok(1, &json!(false)));
        });

        let client = client_for(&server)?;
        let err = client
            .submit(TorrentSubmission::Url {
                url: "https://tracker.example/a.torrent".into(),
            })
            .await
            .err()
            .ok_or_else(|| anyhow::anyhow!("expected login failure"))?;
        assert!(matches!(
            err,
            TorrentError::Rejected {
                operation: "auth.login",
                ..
            }
        ));
        Ok(())
    }
}
