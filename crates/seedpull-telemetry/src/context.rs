//! Process-wide span carrying the run mode and build identifier.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Keeps the `seedpull` span entered until dropped, so every event logged by
/// the daemon carries `mode` and `build_sha`.
pub struct GlobalContextGuard {
    _entered: Entered<'static>,
}

impl GlobalContextGuard {
    /// Enter the process span for `mode` (`daemon` or `once`).
    #[must_use]
    pub fn new(mode: &str) -> Self {
        let span: &'static Span = Box::leak(Box::new(tracing::info_span!(
            "seedpull",
            mode = %mode,
            build_sha = %build_sha(),
        )));
        Self {
            _entered: span.enter(),
        }
    }
}
