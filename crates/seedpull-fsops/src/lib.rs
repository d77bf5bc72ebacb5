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

//! Materialisation of completed torrents on the local machine.
//!
//! Layout: `model/` (download units and archive classification), `command.rs`
//! (subordinate process seam), `fetch.rs` (`lftp` transfers), `extract.rs`
//! (`unzip`/`unrar`), `finalize.rs` (permissions and relocation), `service.rs`
//! (per-unit stage orchestration).

pub mod command;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod finalize;
pub mod model;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use command::{CommandRunner, CommandSpec, SystemCommandRunner};
pub use error::{FsOpsError, FsOpsResult};
pub use model::{ArchiveKind, ArchivePart, DownloadUnit, LocalContent};
pub use service::FsOpsService;
