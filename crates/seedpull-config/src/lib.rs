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

//! File-backed configuration for the seedpull daemon.
//!
//! Layout: `model.rs` (raw document and typed config models), `validate.rs`
//! (validation/parsing helpers), `loader.rs` (reading and validating the JSON
//! document), `error.rs` (typed failures).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::{DEFAULT_CONFIG_PATH, load_from_path, parse_document};
pub use model::{
    ChmodPolicy, DaemonConfig, DelugeConfig, RawChmod, RawConfig, RawMode, RawWatchDir, SftpConfig,
    TorrentClientConfig, TransferConfig, TransmissionConfig, WatchDirConfig,
};
