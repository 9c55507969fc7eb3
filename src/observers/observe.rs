//! # Core observer trait and notification payload.

use crate::error::HandlerError;
use crate::stack::{NodeId, StackTree, TaskId};

/// Contract for completion observers.
///
/// Called synchronously from the drain loop of the observed task. Keep it short:
/// the next pending reply is not polled until every observer returned. Panics are
/// caught and logged.
pub trait Observe: Send + Sync + 'static {
    /// Handles one progress notification.
    fn on_progress(&self, progress: &Progress);

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Observe for F
where
    F: Fn(&Progress) + Send + Sync + 'static,
{
    fn on_progress(&self, progress: &Progress) {
        self(progress)
    }
}

/// The entry whose pending reply just settled.
#[derive(Debug)]
pub struct Settled {
    /// Node of the settled invocation.
    pub entry: NodeId,
    /// Event of the settled invocation.
    pub event: String,
    /// Failure of the reply, `None` on success.
    pub error: Option<HandlerError>,
}

impl Settled {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// One notification of a task's drain loop.
#[derive(Debug)]
pub struct Progress {
    /// Task being drained.
    pub task: TaskId,
    /// Call-stack tree as of this notification.
    pub tree: StackTree,
    /// `true` exactly once per task, on the last notification.
    pub complete: bool,
    /// Settled entry. `None` when completion was reached without a settle: an
    /// empty dispatch, or the last outstanding scope being dropped.
    pub settled: Option<Settled>,
}

impl Progress {
    /// Failure of the settled entry, if any.
    pub fn error(&self) -> Option<&HandlerError> {
        self.settled.as_ref().and_then(|s| s.error.as_ref())
    }
}
