//! # Function-backed handler (`HandlerFn`)
//!
//! [`HandlerFn`] wraps a closure `Fn(&Scope<A>, &A) -> Result<Reply, BusError>`.
//! Closures that need to trigger from inside pending work clone the scope into
//! the future.
//!
//! ## Example
//! ```rust
//! use callstack_bus::{Bus, HandlerError, HandlerFn, Reply};
//!
//! let bus: Bus = Bus::new();
//! bus.listen("ping", HandlerFn::arc("on_ping", |scope, _args| {
//!     let scope = scope.clone();
//!     Ok(Reply::pending(async move {
//!         scope.trigger("pong", &())?;
//!         Ok::<_, HandlerError>(())
//!     }))
//! }));
//! assert_eq!(bus.listener_count("ping"), 1);
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use crate::core::Scope;
use crate::error::BusError;
use crate::handlers::handler::{Handler, HandlerRef, Reply};

const ANONYMOUS: &str = "<anonymous>";

/// Closure-backed handler.
pub struct HandlerFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> HandlerFn<F> {
    /// Creates a named handler.
    ///
    /// Prefer [`HandlerFn::arc`] when you immediately need a [`HandlerRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates a named handler and returns it as a shared [`HandlerRef`].
    pub fn arc<A>(name: impl Into<Cow<'static, str>>, f: F) -> HandlerRef<A>
    where
        A: Send + Sync + 'static,
        F: Fn(&Scope<A>, &A) -> Result<Reply, BusError> + Send + Sync + 'static,
    {
        Arc::new(Self::new(name, f))
    }

    /// Creates an unnamed handler, recorded as `<anonymous>`.
    pub fn anonymous<A>(f: F) -> HandlerRef<A>
    where
        A: Send + Sync + 'static,
        F: Fn(&Scope<A>, &A) -> Result<Reply, BusError> + Send + Sync + 'static,
    {
        Self::arc(ANONYMOUS, f)
    }
}

impl<A, F> Handler<A> for HandlerFn<F>
where
    A: Send + Sync + 'static,
    F: Fn(&Scope<A>, &A) -> Result<Reply, BusError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, scope: &Scope<A>, args: &A) -> Result<Reply, BusError> {
        (self.f)(scope, args)
    }
}
