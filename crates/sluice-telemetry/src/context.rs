//! Process-wide span carrying the run mode and build version.

use tracing::Span;
use tracing::span::EnteredSpan;

use crate::init::build_version;

/// Keeps the `sluice` span entered until dropped, so every event logged on
/// this thread carries `mode` and `version`.
#[derive(Debug)]
pub struct GlobalContextGuard {
    _span: EnteredSpan,
}

impl GlobalContextGuard {
    /// Enter the process span with the given starting mode.
    #[must_use]
    pub fn new(mode: &str) -> Self {
        let span = tracing::info_span!("sluice", mode = %mode, version = %build_version());
        Self {
            _span: span.entered(),
        }
    }
}

/// Overwrite `mode` on the current span once the configuration is known.
pub fn record_mode(mode: &str) {
    Span::current().record("mode", tracing::field::display(mode));
}
