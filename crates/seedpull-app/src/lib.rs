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

//! Seedpull daemon wiring.
//!
//! Layout: `cli.rs` (arguments), `bootstrap.rs` (configuration, logging and
//! service wiring), `scanner.rs` (watch directories), `resolver.rs` (download
//! units), `orchestrator.rs` (poll cycles).

/// Application bootstrap.
pub mod bootstrap;
/// Command-line arguments.
pub mod cli;
/// Application error types.
pub mod error;
/// Poll-cycle orchestration.
pub mod orchestrator;
/// Download-unit resolution.
pub mod resolver;
/// Watch-directory scanning.
pub mod scanner;
#[cfg(test)]
mod testing;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
