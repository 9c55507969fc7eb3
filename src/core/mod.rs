//! Bus core: registry, dispatcher and completion tracking.
//!
//! The public API from this module is [`Bus`] (with [`BusBuilder`] and
//! [`BusConfig`]), the per-trigger [`Dispatch`] handle and the [`Scope`] handed to
//! handlers.
//!
//! Internal modules:
//! - [`registry`]: event name → ordered handlers;
//! - [`invoke`]: handler invocation, cycle and depth checks;
//! - [`tracker`]: per-task queue, observers, drain loop and completion latch;
//! - [`scope`]: sub-trigger capability, counted to know when a task can still grow.

mod builder;
mod bus;
mod config;
mod handle;
mod invoke;
mod registry;
mod scope;
mod tracker;

pub use builder::BusBuilder;
pub use bus::Bus;
pub use config::BusConfig;
pub use handle::Dispatch;
pub use scope::Scope;
