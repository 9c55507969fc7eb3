//! # Dispatch handle returned by [`Bus::trigger`](crate::Bus::trigger).
//!
//! Combines the synchronous result of a trigger (the call-stack tree as it was when
//! the top-level handlers returned) with access to the asynchronous side: observer
//! subscription, cancellation and waiting for the drain loop.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::error::BusError;
use crate::observers::Observe;
use crate::stack::{StackTree, TaskId};

use super::tracker::TaskState;

/// Handle to one top-level trigger.
///
/// Dropping it does not stop the drain loop.
pub struct Dispatch {
    stack_tree: StackTree,
    task: Arc<TaskState>,
    join: Option<JoinHandle<()>>,
}

impl Dispatch {
    pub(crate) fn new(stack_tree: StackTree, task: Arc<TaskState>, join: JoinHandle<()>) -> Self {
        Self {
            stack_tree,
            task,
            join: Some(join),
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Invocations that happened synchronously, before any pending reply was polled.
    pub fn stack_tree(&self) -> &StackTree {
        &self.stack_tree
    }

    /// The tree including everything recorded so far.
    pub fn current_tree(&self) -> StackTree {
        self.task.tree()
    }

    pub fn is_complete(&self) -> bool {
        self.task.is_complete()
    }

    /// Subscribes `observer` to this trigger's completion stream.
    ///
    /// If the task already completed, the observer is called immediately with the
    /// final tree and `complete = true`. Otherwise it is called after every
    /// subsequent settle, the last call being the one with `complete = true`.
    pub fn subscribe(&self, observer: impl Observe) {
        self.subscribe_arc(Arc::new(observer));
    }

    /// Same as [`subscribe`](Self::subscribe) for an already shared observer.
    pub fn subscribe_arc(&self, observer: Arc<dyn Observe>) {
        self.task.subscribe(observer);
    }

    /// Cancels the trigger: pending replies are dropped and reported as cancelled,
    /// and further sub-triggers fail with [`BusError::Cancelled`].
    pub fn cancel(&self) {
        self.task.cancel_token().cancel();
    }

    /// Waits until the task completed and returns the final tree.
    pub async fn wait(&mut self) -> Result<StackTree, BusError> {
        if let Some(join) = self.join.take() {
            join.await.map_err(|e| BusError::Drain {
                reason: e.to_string(),
            })?;
        }
        Ok(self.task.tree())
    }
}

impl fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("task", &self.task.id())
            .field("stack_tree", &self.stack_tree)
            .field("complete", &self.task.is_complete())
            .finish()
    }
}
