//! Configuration models.
//!
//! # Design
//! - `RawConfig` mirrors the flat JSON document operators write by hand; every
//!   field is optional so validation can report precise field names.
//! - `DaemonConfig` is the validated, typed view consumed by the rest of the
//!   workspace. Secrets are redacted from its `Debug` output.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

/// Raw configuration document as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// Location of the watch-state JSON document.
    pub state_json: Option<PathBuf>,
    /// SFTP host name of the seedbox.
    pub sftp_host: Option<String>,
    /// SFTP port of the seedbox.
    pub sftp_port: Option<i64>,
    /// SFTP user name.
    pub sftp_user: Option<String>,
    /// SFTP password.
    pub sftp_password: Option<String>,
    /// Segment count for single-file `pget` transfers.
    pub pget_conn: Option<i64>,
    /// Number of files `mirror` transfers in parallel.
    pub mirror_parallel: Option<i64>,
    /// Segment count per file for `mirror` transfers.
    pub mirror_conn: Option<i64>,
    /// Torrent client backend label (`deluge` or `transmission`).
    pub torrent_client: Option<String>,
    /// Base URL of the Deluge Web UI.
    pub deluge_web_url: Option<String>,
    /// Password of the Deluge Web UI.
    pub deluge_web_password: Option<String>,
    /// Transmission RPC endpoint.
    pub transmission_rpc_url: Option<String>,
    /// Transmission RPC user.
    pub transmission_rpc_user: Option<String>,
    /// Transmission RPC password.
    pub transmission_rpc_password: Option<String>,
    /// Watch directories.
    pub torrent_watch_dirs: Vec<RawWatchDir>,
    /// Optional permission normalisation.
    pub chmod: Option<RawChmod>,
    /// Seconds to sleep between poll cycles.
    pub poll_interval_secs: Option<i64>,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: Option<String>,
    /// Log output format (`json` or `pretty`).
    pub log_format: Option<String>,
    /// Prometheus textfile written after each cycle.
    pub metrics_textfile: Option<PathBuf>,
    /// Keys not recognised by this version of the daemon.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

/// Raw watch directory entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawWatchDir {
    /// Directory scanned for `.torrent` / `.magnet` files.
    pub directory: Option<PathBuf>,
    /// Directory that receives in-flight transfers.
    pub temp_download_dir: Option<PathBuf>,
    /// Directory that receives finished downloads.
    pub final_download_dir: Option<PathBuf>,
    /// Whether archives are extracted after fetching.
    pub auto_extract: bool,
    /// Whether extracted archives are deleted afterwards.
    pub auto_delete_extracted: bool,
}

/// Raw chmod section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawChmod {
    /// Mode applied to regular files.
    pub file: Option<RawMode>,
    /// Mode applied to directories.
    pub folder: Option<RawMode>,
}

/// A permission mode written either as an integer or as an octal string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMode {
    /// Mode bits as a plain integer (`420` is `0o644`).
    Bits(i64),
    /// Octal text such as `"0644"`, `"755"` or `"0o755"`.
    Octal(String),
}

/// Validated daemon configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Location of the watch-state JSON document.
    pub state_json: PathBuf,
    /// Remote SFTP endpoint.
    pub sftp: SftpConfig,
    /// `lftp` transfer tuning.
    pub transfer: TransferConfig,
    /// Torrent client backend.
    pub client: TorrentClientConfig,
    /// Watch directories in configuration order.
    pub watch_dirs: Vec<WatchDirConfig>,
    /// Permission normalisation applied before relocation.
    pub chmod: ChmodPolicy,
    /// Sleep between poll cycles.
    pub poll_interval: Duration,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Requested log format label.
    pub log_format: Option<String>,
    /// Prometheus textfile written after each cycle.
    pub metrics_textfile: Option<PathBuf>,
}

/// Remote SFTP endpoint used by `lftp`.
#[derive(Clone, PartialEq, Eq)]
pub struct SftpConfig {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password.
    pub password: String,
}

impl fmt::Debug for SftpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SftpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection tuning for `lftp` transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferConfig {
    /// Segment count for single-file `pget` transfers.
    pub pget_conn: u16,
    /// Number of files `mirror` transfers in parallel.
    pub mirror_parallel: u16,
    /// Segment count per file for `mirror` transfers.
    pub mirror_conn: u16,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            pget_conn: 4,
            mirror_parallel: 2,
            mirror_conn: 4,
        }
    }
}

/// Torrent client backend selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TorrentClientConfig {
    /// Deluge via its Web UI JSON-RPC endpoint.
    Deluge(DelugeConfig),
    /// Transmission via its RPC endpoint.
    Transmission(TransmissionConfig),
}

impl TorrentClientConfig {
    /// Backend label used in logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Deluge(_) => "deluge",
            Self::Transmission(_) => "transmission",
        }
    }
}

/// Deluge Web UI connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DelugeConfig {
    /// Base URL of the Web UI (the `/json` endpoint is derived from it).
    pub web_url: Url,
    /// Web UI password.
    pub password: String,
}

impl fmt::Debug for DelugeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelugeConfig")
            .field("web_url", &self.web_url.as_str())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Transmission RPC connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct TransmissionConfig {
    /// RPC endpoint (usually `http://host:9091/transmission/rpc`).
    pub rpc_url: Url,
    /// Basic-auth user, when RPC authentication is enabled.
    pub user: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
}

impl fmt::Debug for TransmissionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransmissionConfig")
            .field("rpc_url", &self.rpc_url.as_str())
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Validated watch directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchDirConfig {
    /// Directory scanned for `.torrent` / `.magnet` files.
    pub directory: PathBuf,
    /// Directory that receives in-flight transfers.
    pub temp_download_dir: PathBuf,
    /// Directory that receives finished downloads.
    pub final_download_dir: PathBuf,
    /// Whether archives are extracted after fetching.
    pub auto_extract: bool,
    /// Whether extracted archives are deleted afterwards.
    pub auto_delete_extracted: bool,
}

/// Permission modes applied to fetched content before relocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChmodPolicy {
    /// Mode applied to regular files.
    pub file: Option<u32>,
    /// Mode applied to directories.
    pub folder: Option<u32>,
}

impl ChmodPolicy {
    /// Whether the policy requests any permission change at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.file.is_some() || self.folder.is_some()
    }
}
