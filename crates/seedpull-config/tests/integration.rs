use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use seedpull_config::{ChmodPolicy, ConfigError, TorrentClientConfig, load_from_path};

const DOCUMENT: &str = r#"{
    "state_json": "/var/lib/seedpull/state.json",
    "sftp_host": "seedbox.example",
    "sftp_port": 2222,
    "sftp_user": "me",
    "sftp_password": "hunter2",
    "pget_conn": 8,
    "torrent_client": "transmission",
    "transmission_rpc_url": "http://seedbox.example:9091/transmission/rpc",
    "transmission_rpc_user": "",
    "torrent_watch_dirs": [
        {
            "directory": "/watch/tv",
            "temp_download_dir": "/incoming/tv",
            "final_download_dir": "/library/tv",
            "auto_extract": true,
            "auto_delete_extracted": true
        },
        {
            "directory": "/watch/movies",
            "temp_download_dir": "/incoming/movies",
            "final_download_dir": "/library/movies"
        }
    ],
    "chmod": {"file": "0o644", "folder": 493},
    "poll_interval_secs": 60,
    "log_format": "json",
    "metrics_textfile": "/var/lib/node_exporter/seedpull.prom",
    "legacy_option": true
}"#;

#[test]
fn document_on_disk_loads_into_daemon_config() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.json");
    fs::write(&path, DOCUMENT)?;

    let config = load_from_path(&path)?;
    assert_eq!(config.state_json, PathBuf::from("/var/lib/seedpull/state.json"));
    assert_eq!(config.sftp.port, 2222);
    assert_eq!(config.transfer.pget_conn, 8);
    assert_eq!(config.transfer.mirror_parallel, 2);
    assert_eq!(config.poll_interval, Duration::from_secs(60));
    assert_eq!(config.log_format.as_deref(), Some("json"));
    assert_eq!(
        config.chmod,
        ChmodPolicy {
            file: Some(0o644),
            folder: Some(0o755),
        }
    );

    let TorrentClientConfig::Transmission(transmission) = &config.client else {
        anyhow::bail!("expected transmission backend, got {:?}", config.client);
    };
    assert_eq!(transmission.user, None);
    assert!(!format!("{:?}", config.sftp).contains("hunter2"));

    assert_eq!(config.watch_dirs.len(), 2);
    assert!(config.watch_dirs[0].auto_delete_extracted);
    assert!(!config.watch_dirs[1].auto_extract);
    Ok(())
}

#[test]
fn malformed_document_reports_its_path() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config.json");
    fs::write(&path, "{ not json")?;

    match load_from_path(&path) {
        Err(ConfigError::Parse {
            path: Some(reported),
            ..
        }) => assert_eq!(reported, path),
        other => anyhow::bail!("unexpected result: {other:?}"),
    }
    Ok(())
}
