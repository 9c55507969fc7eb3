//! # Handler invocation (dispatcher core).
//!
//! ```text
//! invoke(task, parent, event, args)
//!   for handler in registry.handlers(event):      (snapshot, registration order)
//!     ├─► cycle check: event in parent's ancestor chain?  ─► Err(Circular)
//!     ├─► depth check: depth > max_depth?                  ─► Err(DepthExceeded)
//!     ├─► append entry { event, handler, parent }
//!     ├─► handler.call(scope(entry), args)                 (may re-enter invoke)
//!     └─► enqueue reply                                    (invocation order)
//! ```
//!
//! Errors are not caught here: they unwind to the caller of `trigger`, or to the
//! handler whose scope issued the sub-trigger.

use std::sync::Arc;

use crate::error::{BusError, HandlerError};
use crate::handlers::Reply;
use crate::stack::HandlerTag;

use super::bus::Inner;
use super::scope::Scope;
use super::tracker::TaskState;

pub(crate) fn invoke<A: Send + Sync + 'static>(
    bus: &Arc<Inner<A>>,
    task: &Arc<TaskState>,
    parent: Option<usize>,
    event: &str,
    args: &A,
) -> Result<(), BusError> {
    let handlers = bus.registry.handlers(event);
    if handlers.is_empty() {
        tracing::trace!(task = %task.id(), event, "no listeners");
        return Ok(());
    }

    let event: Arc<str> = Arc::from(event);
    for handler in handlers {
        task.stack().check_circular(parent, &event)?;

        let depth = task.stack().child_depth(parent);
        if let Some(limit) = bus.config.depth_limit() {
            if depth > limit {
                return Err(BusError::DepthExceeded {
                    event: event.to_string(),
                    depth,
                    limit,
                });
            }
        }

        let index = task.stack().push(
            Arc::clone(&event),
            Arc::from(handler.name()),
            HandlerTag::of(&handler),
            parent,
        );
        tracing::debug!(
            task = %task.id(),
            index,
            event = %event,
            handler = handler.name(),
            depth,
            "invoking handler"
        );

        let scope = Scope::new(Arc::clone(bus), Arc::clone(task), index);
        match handler.call(&scope, args) {
            Ok(reply) => task.enqueue(index, reply.into_future()),
            Err(err) => {
                // keep one queue element per entry even if an ancestor swallows the error
                let failed = Reply::fail(HandlerError::Dispatch(err.clone()));
                task.enqueue(index, failed.into_future());
                return Err(err);
            }
        }
        drop(scope);
    }

    Ok(())
}
