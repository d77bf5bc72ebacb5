//! Loading the configuration document from disk.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{DaemonConfig, RawConfig};
use crate::validate::validate;

/// Configuration path used when neither `--config` nor `SEEDPULL_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Read, parse, and validate the configuration document at `path`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when the file cannot be read,
/// [`ConfigError::Parse`] for malformed JSON, and validation errors otherwise.
pub fn load_from_path(path: &Path) -> ConfigResult<DaemonConfig> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        operation: "config.read",
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawConfig =
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })?;
    finish(raw)
}

/// Parse and validate an in-memory configuration document.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON and validation errors otherwise.
pub fn parse_document(contents: &str) -> ConfigResult<DaemonConfig> {
    let raw: RawConfig = serde_json::from_str(contents)
        .map_err(|source| ConfigError::Parse { path: None, source })?;
    finish(raw)
}

fn finish(raw: RawConfig) -> ConfigResult<DaemonConfig> {
    for key in raw.unknown.keys() {
        warn!(key = %key, "ignoring unknown configuration key");
    }
    validate(raw)
}
