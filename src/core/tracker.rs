//! # Async completion tracker.
//!
//! One [`TaskState`] per top-level trigger owns the call-stack list, the queue of
//! pending replies, the observers and the completion latch. Its drain loop runs on
//! the tokio runtime, detached from the caller of `trigger`.
//!
//! ## Drain loop
//! ```text
//! loop {
//!   ├─► pop oldest reply (queue order = invocation order)
//!   │     ├─ Some ─► await (timeout / cancellation aware), drop the future
//!   │     │          ├─ complete = queue empty && no live scope
//!   │     │          └─ notify observers(tree, complete, settled)
//!   │     └─ None  ─► live scopes == 0 ? latch + final notify : wait for wake
//!   └─ exit once complete is latched ─► remove task from the table
//! }
//! ```
//!
//! ## Rules
//! - Only a live [`Scope`](super::Scope) can enqueue into a task, so `complete` is
//!   latched only when the queue is empty and no scope is alive. After the latch no
//!   further enqueue is possible.
//! - Once cancelled, scopes refuse to trigger, so the latch no longer waits for them.
//! - A failed, panicking or timed-out reply is reported on its own notification and
//!   draining continues with the next one.
//! - Locks are released before any observer runs and before any `.await`.

use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::error::HandlerError;
use crate::handlers::BoxReply;
use crate::lock::lock;
use crate::observers::{notify_one, panic_message, Observe, ObserverSet, Progress, Settled};
use crate::stack::{CallStack, NodeId, StackTree, TaskId};

/// A reply waiting in the queue.
struct Pending {
    index: usize,
    reply: BoxReply,
}

struct Queue {
    pending: VecDeque<Pending>,
    observers: ObserverSet,
    complete: bool,
}

/// Per-trigger state shared by the dispatcher, scopes, the drain loop and the
/// caller's [`Dispatch`](super::Dispatch) handle.
pub(crate) struct TaskState {
    id: TaskId,
    stack: CallStack,
    cancel: CancellationToken,
    live: AtomicUsize,
    wake: Notify,
    queue: Mutex<Queue>,
}

impl TaskState {
    pub(crate) fn new(id: TaskId, cancel: CancellationToken, observers: ObserverSet) -> Self {
        Self {
            id,
            stack: CallStack::new(),
            cancel,
            live: AtomicUsize::new(0),
            wake: Notify::new(),
            queue: Mutex::new(Queue {
                pending: VecDeque::new(),
                observers,
                complete: false,
            }),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn stack(&self) -> &CallStack {
        &self.stack
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn tree(&self) -> StackTree {
        self.stack.tree(self.id)
    }

    pub(crate) fn is_complete(&self) -> bool {
        lock(&self.queue).complete
    }

    /// Records one more live scope.
    pub(crate) fn enter(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    /// Releases a scope; the last one wakes an idle drain loop.
    pub(crate) fn leave(&self) {
        if self.live.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.wake.notify_one();
        }
    }

    /// Queues the reply of entry `index`, keeping the queue in invocation order.
    ///
    /// A parent's reply arrives after the replies of the handlers it triggered
    /// synchronously, so it is slotted in front of them.
    ///
    /// After completion (only reachable through cancellation or an aborted
    /// trigger) the reply is dropped.
    pub(crate) fn enqueue(&self, index: usize, reply: BoxReply) {
        let late = {
            let mut queue = lock(&self.queue);
            if queue.complete {
                Some(reply)
            } else {
                let pos = queue.pending.partition_point(|p| p.index < index);
                queue.pending.insert(pos, Pending { index, reply });
                None
            }
        };
        match late {
            Some(reply) => {
                tracing::debug!(task = %self.id, index, "reply dropped, task already complete");
                drop(reply);
            }
            None => self.wake.notify_one(),
        }
    }

    /// Tears down a task that will never be drained.
    ///
    /// Outstanding scopes see the task as cancelled. Queued and late replies are
    /// dropped unpolled.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
        let (dropped, observers) = {
            let mut queue = lock(&self.queue);
            queue.complete = true;
            let dropped: Vec<Pending> = queue.pending.drain(..).collect();
            (dropped, std::mem::take(&mut queue.observers))
        };
        drop(dropped);
        drop(observers);
    }

    /// Adds an observer, or notifies it right away if the task already completed.
    pub(crate) fn subscribe(&self, observer: Arc<dyn Observe>) {
        {
            let mut queue = lock(&self.queue);
            if !queue.complete {
                queue.observers.push(observer);
                return;
            }
        }

        let progress = Progress {
            task: self.id,
            tree: self.tree(),
            complete: true,
            settled: None,
        };
        notify_one(observer.as_ref(), &progress);
    }

    fn pop(&self) -> Option<Pending> {
        lock(&self.queue).pending.pop_front()
    }

    /// Latches completion if nothing can enqueue anymore.
    ///
    /// Returns the completion flag and the observers to notify.
    fn check_complete(&self) -> (bool, ObserverSet) {
        let mut queue = lock(&self.queue);
        let quiet = self.live.load(Ordering::SeqCst) == 0 || self.cancel.is_cancelled();
        let complete = queue.pending.is_empty() && quiet;
        if complete {
            queue.complete = true;
            (true, std::mem::take(&mut queue.observers))
        } else {
            (false, queue.observers.clone())
        }
    }

    fn report(&self, complete: bool, observers: &ObserverSet, settled: Option<Settled>) {
        let progress = Progress {
            task: self.id,
            tree: self.tree(),
            complete,
            settled,
        };
        observers.notify(&progress);
    }

    async fn settle(&self, pending: Pending, limit: Option<Duration>) -> Settled {
        let Pending { index, reply } = pending;
        let guarded = AssertUnwindSafe(reply).catch_unwind();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(HandlerError::Cancelled),
            res = await_with_limit(guarded, limit) => res,
        };

        let event = self
            .stack
            .get(index)
            .map(|e| e.event().to_string())
            .unwrap_or_default();

        match &outcome {
            Ok(()) => tracing::debug!(task = %self.id, index, event = %event, "reply settled"),
            Err(err) => tracing::warn!(
                task = %self.id,
                index,
                event = %event,
                label = err.as_label(),
                err = %err,
                "reply failed"
            ),
        }

        Settled {
            entry: NodeId::new(self.id, index),
            event,
            error: outcome.err(),
        }
    }
}

async fn await_with_limit<F>(fut: F, limit: Option<Duration>) -> Result<(), HandlerError>
where
    F: std::future::Future<Output = std::thread::Result<Result<(), HandlerError>>>,
{
    let joined = match limit {
        Some(timeout) => match tokio::time::timeout(timeout, fut).await {
            Ok(joined) => joined,
            Err(_) => return Err(HandlerError::Timeout { timeout }),
        },
        None => fut.await,
    };

    match joined {
        Ok(res) => res,
        Err(panic_err) => Err(HandlerError::Panicked {
            info: panic_message(panic_err.as_ref()),
        }),
    }
}

/// Tasks that have not completed yet, keyed by id.
#[derive(Default)]
pub(crate) struct TaskTable {
    tasks: Mutex<HashMap<TaskId, Arc<TaskState>>>,
}

impl TaskTable {
    /// Registers a new task under a fresh, unused id.
    pub(crate) fn open(&self, cancel: CancellationToken, observers: ObserverSet) -> Arc<TaskState> {
        let mut tasks = lock(&self.tasks);
        let id = loop {
            let id = TaskId::random();
            if !tasks.contains_key(&id) {
                break id;
            }
        };
        let task = Arc::new(TaskState::new(id, cancel, observers));
        tasks.insert(id, Arc::clone(&task));
        task
    }

    pub(crate) fn close(&self, id: TaskId) {
        lock(&self.tasks).remove(&id);
    }

    /// Sorted ids of tasks still draining.
    pub(crate) fn ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = lock(&self.tasks).keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Drains `task` until completion, then drops it from `table`.
pub(crate) async fn drain(table: Arc<TaskTable>, task: Arc<TaskState>, limit: Option<Duration>) {
    tracing::debug!(task = %task.id, "drain started");

    loop {
        match task.pop() {
            Some(pending) => {
                let settled = task.settle(pending, limit).await;
                let (complete, observers) = task.check_complete();
                task.report(complete, &observers, Some(settled));
                if complete {
                    break;
                }
            }
            None => {
                let (complete, observers) = task.check_complete();
                if complete {
                    task.report(true, &observers, None);
                    break;
                }
                tokio::select! {
                    _ = task.wake.notified() => {}
                    _ = task.cancel.cancelled() => {}
                }
            }
        }
    }

    table.close(task.id);
    tracing::debug!(task = %task.id, nodes = task.stack.len(), "drain complete");
}
