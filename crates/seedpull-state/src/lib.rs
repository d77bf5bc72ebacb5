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

//! Watch-state store: the durable record of torrents the daemon is responsible for.
//!
//! Layout: `model.rs` (watch records and the on-disk document), `store.rs`
//! (`WatchStore` trait with JSON-file and in-memory implementations),
//! `error.rs` (typed failures).

pub mod error;
pub mod model;
pub mod store;

pub use error::{StateError, StateResult};
pub use model::{StateDocument, WatchRecord};
pub use store::{JsonFileStore, MemoryStore, WatchStore};
