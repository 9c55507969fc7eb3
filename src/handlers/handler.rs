//! # Handler abstraction.
//!
//! A handler runs synchronously inside the dispatcher. Its [`Reply`] is either a
//! ready outcome or a pending future; pending futures are lazy and are driven by
//! the task's drain loop, in invocation order, after the synchronous dispatch
//! returned.
//!
//! Handler identity (for [`Bus::remove`](crate::Bus::remove)) is the identity of the
//! shared [`HandlerRef`], not the handler's name.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::core::Scope;
use crate::error::{BusError, HandlerError};

/// Boxed pending reply.
pub type BoxReply = BoxFuture<'static, Result<(), HandlerError>>;

/// Shared handle to a handler.
pub type HandlerRef<A> = Arc<dyn Handler<A>>;

/// # Reaction to one event.
///
/// `call` receives the trigger arguments and a [`Scope`] that can dispatch nested
/// events into the same call tree. Returning `Err` unwinds the triggering call:
/// sub-trigger errors are usually forwarded with `?`.
///
/// # Example
/// ```
/// use callstack_bus::{BusError, Handler, Reply, Scope};
///
/// struct Forward;
///
/// impl Handler<u32> for Forward {
///     fn name(&self) -> &str { "forward" }
///
///     fn call(&self, scope: &Scope<u32>, n: &u32) -> Result<Reply, BusError> {
///         scope.trigger("next", &(n + 1))?;
///         Ok(Reply::done())
///     }
/// }
/// ```
pub trait Handler<A>: Send + Sync + 'static {
    /// Human-readable name, recorded on every call-stack entry.
    fn name(&self) -> &str;

    /// Handles one event.
    fn call(&self, scope: &Scope<A>, args: &A) -> Result<Reply, BusError>;
}

/// Result of a handler call.
pub enum Reply {
    /// Already settled.
    Ready(Result<(), HandlerError>),
    /// Settles when the drain loop has driven the future to completion.
    Pending(BoxReply),
}

impl Reply {
    /// A successfully settled reply.
    pub fn done() -> Self {
        Reply::Ready(Ok(()))
    }

    /// A settled failure.
    pub fn fail(err: HandlerError) -> Self {
        Reply::Ready(Err(err))
    }

    /// Pending work, settled by the drain loop.
    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        Reply::Pending(fut.boxed())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Reply::Pending(_))
    }

    pub(crate) fn into_future(self) -> BoxReply {
        match self {
            Reply::Ready(res) => futures::future::ready(res).boxed(),
            Reply::Pending(fut) => fut,
        }
    }
}

impl From<Result<(), HandlerError>> for Reply {
    fn from(res: Result<(), HandlerError>) -> Self {
        Reply::Ready(res)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ready(res) => f.debug_tuple("Ready").field(res).finish(),
            Reply::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// Pointer identity of two handler references.
pub(crate) fn same_handler<A>(a: &HandlerRef<A>, b: &HandlerRef<A>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
