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

//! Client-agnostic torrent interfaces and DTOs.
//!
//! Layout: `model/` (submissions and completion reports), `service/`
//! (`TorrentClient` trait), `error.rs` (typed failures).

pub mod error;
pub mod model;
pub mod service;

pub use error::{TorrentError, TorrentResult};
pub use model::{CompletedTorrent, TorrentSubmission};
pub use service::TorrentClient;
