//! Validation helpers and parsing utilities for configuration documents.

use std::path::Path;
use std::time::Duration;

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ChmodPolicy, DaemonConfig, DelugeConfig, RawChmod, RawConfig, RawMode, RawWatchDir,
    SftpConfig, TorrentClientConfig, TransferConfig, TransmissionConfig, WatchDirConfig,
};

/// Default poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
/// Highest permission mode accepted for chmod values.
pub const MAX_MODE: u32 = 0o7777;

/// Validate a raw document and convert it into the typed daemon configuration.
///
/// # Errors
///
/// Returns the first [`ConfigError`] encountered while validating fields.
pub fn validate(raw: RawConfig) -> ConfigResult<DaemonConfig> {
    let state_json = raw
        .state_json
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| ConfigError::missing("state_json"))?;

    let sftp = SftpConfig {
        host: require_string("sftp_host", raw.sftp_host)?,
        port: parse_port("sftp_port", raw.sftp_port)?,
        user: require_string("sftp_user", raw.sftp_user)?,
        password: raw
            .sftp_password
            .ok_or_else(|| ConfigError::missing("sftp_password"))?,
    };

    let defaults = TransferConfig::default();
    let transfer = TransferConfig {
        pget_conn: parse_count("pget_conn", raw.pget_conn, defaults.pget_conn)?,
        mirror_parallel: parse_count(
            "mirror_parallel",
            raw.mirror_parallel,
            defaults.mirror_parallel,
        )?,
        mirror_conn: parse_count("mirror_conn", raw.mirror_conn, defaults.mirror_conn)?,
    };

    let client = match raw.torrent_client.as_deref().map(str::trim) {
        None | Some("deluge") => TorrentClientConfig::Deluge(DelugeConfig {
            web_url: parse_url(
                "deluge_web_url",
                &require_string("deluge_web_url", raw.deluge_web_url)?,
            )?,
            password: raw
                .deluge_web_password
                .ok_or_else(|| ConfigError::missing("deluge_web_password"))?,
        }),
        Some("transmission") => TorrentClientConfig::Transmission(TransmissionConfig {
            rpc_url: parse_url(
                "transmission_rpc_url",
                &require_string("transmission_rpc_url", raw.transmission_rpc_url)?,
            )?,
            user: raw.transmission_rpc_user.filter(|user| !user.is_empty()),
            password: raw.transmission_rpc_password,
        }),
        Some(other) => {
            return Err(ConfigError::invalid(
                "torrent_client",
                "must be 'deluge' or 'transmission'",
                Some(other.to_string()),
            ));
        }
    };

    let watch_dirs = raw
        .torrent_watch_dirs
        .into_iter()
        .enumerate()
        .map(|(index, entry)| validate_watch_dir(index, entry))
        .collect::<ConfigResult<Vec<_>>>()?;

    let chmod = raw
        .chmod
        .as_ref()
        .map(parse_chmod)
        .transpose()?
        .unwrap_or_default();

    let poll_interval = match raw.poll_interval_secs {
        None => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        Some(secs) => u64::try_from(secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "poll_interval_secs",
                    "must be a positive number of seconds",
                    Some(secs.to_string()),
                )
            })?,
    };

    if let Some(path) = raw.metrics_textfile.as_deref() {
        ensure_absolute("metrics_textfile", path)?;
    }

    Ok(DaemonConfig {
        state_json,
        sftp,
        transfer,
        client,
        watch_dirs,
        chmod,
        poll_interval,
        log_level: raw
            .log_level
            .filter(|level| !level.trim().is_empty())
            .unwrap_or_else(|| "info".to_string()),
        log_format: raw.log_format,
        metrics_textfile: raw.metrics_textfile,
    })
}

fn validate_watch_dir(index: usize, entry: RawWatchDir) -> ConfigResult<WatchDirConfig> {
    let field = |name: &str| format!("torrent_watch_dirs[{index}].{name}");
    let directory = entry
        .directory
        .ok_or_else(|| ConfigError::missing(field("directory")))?;
    let temp_download_dir = entry
        .temp_download_dir
        .ok_or_else(|| ConfigError::missing(field("temp_download_dir")))?;
    let final_download_dir = entry
        .final_download_dir
        .ok_or_else(|| ConfigError::missing(field("final_download_dir")))?;

    ensure_absolute(&field("directory"), &directory)?;
    ensure_absolute(&field("temp_download_dir"), &temp_download_dir)?;
    ensure_absolute(&field("final_download_dir"), &final_download_dir)?;

    Ok(WatchDirConfig {
        directory,
        temp_download_dir,
        final_download_dir,
        auto_extract: entry.auto_extract,
        auto_delete_extracted: entry.auto_delete_extracted,
    })
}

fn parse_chmod(raw: &RawChmod) -> ConfigResult<ChmodPolicy> {
    Ok(ChmodPolicy {
        file: raw
            .file
            .as_ref()
            .map(|mode| parse_mode("chmod.file", mode))
            .transpose()?,
        folder: raw
            .folder
            .as_ref()
            .map(|mode| parse_mode("chmod.folder", mode))
            .transpose()?,
    })
}

/// Parse a permission mode given either as integer bits or octal text.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the value is not a valid mode
/// or exceeds `0o7777`.
pub fn parse_mode(field: &str, mode: &RawMode) -> ConfigResult<u32> {
    let parsed = match mode {
        RawMode::Bits(bits) => u32::try_from(*bits).map_err(|_| {
            ConfigError::invalid(field, "must be a non-negative mode", Some(bits.to_string()))
        })?,
        RawMode::Octal(text) => {
            let trimmed = text.trim();
            let digits = trimmed.trim_start_matches("0o");
            u32::from_str_radix(digits, 8).map_err(|_| {
                ConfigError::invalid(field, "must be an octal mode", Some(text.clone()))
            })?
        }
    };
    if parsed > MAX_MODE {
        return Err(ConfigError::invalid(
            field,
            "must not exceed 0o7777",
            Some(format!("{parsed:o}")),
        ));
    }
    Ok(parsed)
}

/// Validate a TCP port.
///
/// # Errors
///
/// Returns an error when the value is absent or outside `1..=65535`.
pub fn parse_port(field: &str, value: Option<i64>) -> ConfigResult<u16> {
    let port = value.ok_or_else(|| ConfigError::missing(field))?;
    u16::try_from(port)
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| {
            ConfigError::invalid(
                field,
                "must be between 1 and 65535",
                Some(port.to_string()),
            )
        })
}

fn parse_count(field: &str, value: Option<i64>, default: u16) -> ConfigResult<u16> {
    let Some(count) = value else {
        return Ok(default);
    };
    u16::try_from(count)
        .ok()
        .filter(|count| *count >= 1)
        .ok_or_else(|| {
            ConfigError::invalid(field, "must be at least 1", Some(count.to_string()))
        })
}

fn parse_url(field: &str, value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value)
        .map_err(|_| ConfigError::invalid(field, "must be a URL", Some(value.to_string())))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            field,
            "must use http or https",
            Some(value.to_string()),
        ));
    }
    Ok(url)
}

fn require_string(field: &str, value: Option<String>) -> ConfigResult<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ConfigError::missing(field))
}

fn ensure_absolute(field: &str, path: &Path) -> ConfigResult<()> {
    if path.is_absolute() {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            "must be an absolute path",
            Some(path.display().to_string()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use serde_json::json;

    fn raw(value: serde_json::Value) -> Result<RawConfig> {
        Ok(serde_json::from_value(value)?)
    }

    fn minimal() -> serde_json::Value {
        json!({
            "state_json": "/var/lib/seedpull/state.json",
            "sftp_host": "seedbox.example",
            "sftp_port": 22,
            "sftp_user": "user",
            "sftp_password": "secret",
            "deluge_web_url": "http://seedbox.example:8112",
            "deluge_web_password": "deluge",
            "torrent_watch_dirs": [{
                "directory": "/watch/tv",
                "temp_download_dir": "/tmp/tv",
                "final_download_dir": "/library/tv",
                "auto_extract": true
            }]
        })
    }

    fn invalid_field(err: ConfigError) -> Result<(String, &'static str)> {
        match err {
            ConfigError::InvalidField { field, reason, .. } => Ok((field, reason)),
            other => Err(anyhow!("unexpected error: {other:?}")),
        }
    }

    #[test]
    fn minimal_document_applies_defaults() -> Result<()> {
        let config = validate(raw(minimal())?)?;
        assert_eq!(config.sftp.port, 22);
        assert_eq!(config.transfer, TransferConfig::default());
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.log_level, "info");
        assert!(!config.chmod.is_enabled());
        assert_eq!(config.client.label(), "deluge");
        let watch = &config.watch_dirs[0];
        assert!(watch.auto_extract);
        assert!(!watch.auto_delete_extracted);
        Ok(())
    }

    #[test]
    fn relative_watch_paths_are_rejected() -> Result<()> {
        let mut doc = minimal();
        doc["torrent_watch_dirs"][0]["temp_download_dir"] = json!("tmp/tv");
        let err = validate(raw(doc)?).err().ok_or_else(|| anyhow!("expected error"))?;
        let (field, reason) = invalid_field(err)?;
        assert_eq!(field, "torrent_watch_dirs[0].temp_download_dir");
        assert_eq!(reason, "must be an absolute path");
        Ok(())
    }

    #[test]
    fn missing_watch_paths_are_reported() -> Result<()> {
        let mut doc = minimal();
        doc["torrent_watch_dirs"][0]
            .as_object_mut()
            .ok_or_else(|| anyhow!("watch dir entry not an object"))?
            .remove("final_download_dir");
        let err = validate(raw(doc)?).err().ok_or_else(|| anyhow!("expected error"))?;
        assert!(matches!(
            err,
            ConfigError::MissingField { ref field } if field == "torrent_watch_dirs[0].final_download_dir"
        ));
        Ok(())
    }

    #[test]
    fn ports_and_counts_are_range_checked() -> Result<()> {
        let mut doc = minimal();
        doc["sftp_port"] = json!(70_000);
        let (field, _) = invalid_field(
            validate(raw(doc)?).err().ok_or_else(|| anyhow!("expected error"))?,
        )?;
        assert_eq!(field, "sftp_port");

        let mut doc = minimal();
        doc["mirror_conn"] = json!(0);
        let (field, reason) = invalid_field(
            validate(raw(doc)?).err().ok_or_else(|| anyhow!("expected error"))?,
        )?;
        assert_eq!(field, "mirror_conn");
        assert_eq!(reason, "must be at least 1");
        Ok(())
    }

    #[test]
    fn chmod_modes_accept_integers_and_octal_strings() -> Result<()> {
        let mut doc = minimal();
        doc["chmod"] = json!({ "file": 420, "folder": "0o755" });
        let config = validate(raw(doc)?)?;
        assert_eq!(config.chmod.file, Some(0o644));
        assert_eq!(config.chmod.folder, Some(0o755));

        assert_eq!(parse_mode("m", &RawMode::Octal("0775".into()))?, 0o775);
        assert!(parse_mode("m", &RawMode::Octal("999".into())).is_err());
        assert!(parse_mode("m", &RawMode::Bits(0o17_777)).is_err());
        Ok(())
    }

    #[test]
    fn transmission_backend_requires_rpc_url() -> Result<()> {
        let mut doc = minimal();
        doc["torrent_client"] = json!("transmission");
        let err = validate(raw(doc.clone())?)
            .err()
            .ok_or_else(|| anyhow!("expected error"))?;
        assert!(matches!(
            err,
            ConfigError::MissingField { ref field } if field == "transmission_rpc_url"
        ));

        doc["transmission_rpc_url"] = json!("http://seedbox.example:9091/transmission/rpc");
        doc["transmission_rpc_user"] = json!("");
        let config = validate(raw(doc)?)?;
        match config.client {
            TorrentClientConfig::Transmission(settings) => {
                assert_eq!(settings.user, None);
                assert_eq!(settings.rpc_url.path(), "/transmission/rpc");
            }
            TorrentClientConfig::Deluge(_) => return Err(anyhow!("expected transmission")),
        }
        Ok(())
    }

    #[test]
    fn unknown_backend_is_rejected() -> Result<()> {
        let mut doc = minimal();
        doc["torrent_client"] = json!("rtorrent");
        let (field, _) = invalid_field(
            validate(raw(doc)?).err().ok_or_else(|| anyhow!("expected error"))?,
        )?;
        assert_eq!(field, "torrent_client");
        Ok(())
    }

    #[test]
    fn debug_output_redacts_secrets() -> Result<()> {
        let config = validate(raw(minimal())?)?;
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<redacted>"));
        Ok(())
    }
}
