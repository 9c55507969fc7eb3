//! # LogObserver: tracing progress writer
//!
//! Emits one `tracing` event per progress notification. Use it for tests or demos.
//!
//! ## Example output (fmt subscriber)
//! ```text
//! INFO settled task=5f0c9a2e1b7d4c36 entry=5f0c9a2e1b7d4c36-0 event=ping complete=false
//! WARN settled with error task=5f0c9a2e1b7d4c36 entry=5f0c9a2e1b7d4c36-1 event=pong err=handler failed: boom complete=false
//! INFO task complete task=5f0c9a2e1b7d4c36 nodes=2
//! ```

use super::{Observe, Progress};

/// Progress writer observer.
#[derive(Default)]
pub struct LogObserver;

impl LogObserver {
    /// Construct a new [`LogObserver`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Observe for LogObserver {
    fn on_progress(&self, p: &Progress) {
        if let Some(settled) = &p.settled {
            match &settled.error {
                None => tracing::info!(
                    task = %p.task,
                    entry = %settled.entry,
                    event = %settled.event,
                    complete = p.complete,
                    "settled"
                ),
                Some(err) => tracing::warn!(
                    task = %p.task,
                    entry = %settled.entry,
                    event = %settled.event,
                    err = %err,
                    complete = p.complete,
                    "settled with error"
                ),
            }
        }
        if p.complete {
            tracing::info!(task = %p.task, nodes = p.tree.len(), "task complete");
        }
    }

    fn name(&self) -> &str {
        "LogObserver"
    }
}
