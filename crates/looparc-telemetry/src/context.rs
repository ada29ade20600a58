//! Span helpers shared by the binary entrypoints.
//!
//! # Design
//! - One top-level span per command invocation carries the command name and
//!   build SHA so every event emitted during the pass inherits them.

use tracing::span::EnteredSpan;

use crate::init::build_sha;

/// Guard that keeps the command-level span entered until dropped.
pub struct CommandSpanGuard {
    _entered: EnteredSpan,
}

impl CommandSpanGuard {
    /// Enter the `looparc` span for `command`.
    #[must_use]
    pub fn new(command: &str) -> Self {
        let span = tracing::info_span!("looparc", command = %command, build_sha = %build_sha());
        Self {
            _entered: span.entered(),
        }
    }
}
