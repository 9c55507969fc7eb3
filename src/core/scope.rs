//! # Scope: the sub-trigger capability handed to handlers.
//!
//! A [`Scope`] binds the bus, the running task and the invoking call-stack entry.
//! Triggering through it nests the new invocations under that entry, in the same
//! call-stack list and the same completion queue as the top-level trigger.
//!
//! Scopes can be cloned into pending replies (or detached tasks) to trigger after
//! the synchronous handler body returned. The task stays incomplete while any
//! clone is alive.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::stack::{Entry, NodeId, TaskId};

use super::bus::{Bus, Inner};
use super::invoke::invoke;
use super::tracker::TaskState;

/// Sub-trigger capability bound to one call-stack entry.
pub struct Scope<A> {
    bus: Arc<Inner<A>>,
    task: Arc<TaskState>,
    index: usize,
}

impl<A: Send + Sync + 'static> Scope<A> {
    pub(crate) fn new(bus: Arc<Inner<A>>, task: Arc<TaskState>, index: usize) -> Self {
        task.enter();
        Self { bus, task, index }
    }

    /// Dispatches `event` nested under this scope's entry.
    ///
    /// Runs every handler of `event` synchronously before returning. Fails with
    /// [`BusError::Circular`] if `event` is this entry's event or one of its
    /// ancestors', and with [`BusError::Cancelled`] once the dispatch was cancelled.
    pub fn trigger(&self, event: &str, args: &A) -> Result<(), BusError> {
        if self.task.cancel_token().is_cancelled() {
            return Err(BusError::Cancelled {
                event: event.to_string(),
            });
        }
        invoke(&self.bus, &self.task, Some(self.index), event, args)
    }

    /// The bus this scope dispatches on, e.g. to `listen`/`remove` from a handler.
    pub fn bus(&self) -> Bus<A> {
        Bus::from_inner(Arc::clone(&self.bus))
    }
}

impl<A> Scope<A> {
    /// Id of the top-level trigger this scope belongs to.
    pub fn task_id(&self) -> TaskId {
        self.task.id()
    }

    /// Tree node of the invoking entry.
    pub fn node_id(&self) -> NodeId {
        NodeId::new(self.task.id(), self.index)
    }

    /// The invoking call-stack entry.
    pub fn entry(&self) -> Option<Entry> {
        self.task.stack().get(self.index)
    }

    /// Whether the dispatch was cancelled or aborted.
    pub fn is_cancelled(&self) -> bool {
        self.task.cancel_token().is_cancelled()
    }

    /// Token cancelled by [`Dispatch::cancel`](super::Dispatch::cancel) or bus shutdown.
    pub fn cancellation(&self) -> CancellationToken {
        self.task.cancel_token().clone()
    }
}

impl<A> Clone for Scope<A> {
    fn clone(&self) -> Self {
        self.task.enter();
        Self {
            bus: Arc::clone(&self.bus),
            task: Arc::clone(&self.task),
            index: self.index,
        }
    }
}

impl<A> Drop for Scope<A> {
    fn drop(&mut self) {
        self.task.leave();
    }
}

impl<A> fmt::Debug for Scope<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("task", &self.task.id())
            .field("index", &self.index)
            .finish()
    }
}
