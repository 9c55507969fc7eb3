//! # Event handlers.
//!
//! - [`Handler`] - trait for anything that can react to an event
//! - [`HandlerFn`] - closure-backed handler
//! - [`HandlerRef`] - shared reference to a handler (`Arc<dyn Handler<A>>`)
//! - [`Reply`] - what a handler hands back: a ready outcome or pending work

mod handler;
mod handler_fn;

pub(crate) use handler::same_handler;
pub use handler::{BoxReply, Handler, HandlerRef, Reply};
pub use handler_fn::HandlerFn;
