//! # Completion observers.
//!
//! An observer is notified each time the drain loop of a task settles one pending
//! reply, and once more if the task completes without a settle (see
//! [`Progress::settled`]).
//!
//! ## Architecture
//! ```text
//! drain loop (one per task)
//!   pop reply ─► await ─► build Progress { tree, complete, settled }
//!                              │
//!                              ▼
//!                        ObserverSet::notify(&Progress)
//!                     ┌────────┼─────────┐
//!                     ▼        ▼         ▼
//!                 closure   LogObserver  custom ...
//! ```
//!
//! ## Implementing custom observers
//! ```no_run
//! use callstack_bus::{Observe, Progress};
//!
//! struct FailureCounter;
//!
//! impl Observe for FailureCounter {
//!     fn on_progress(&self, progress: &Progress) {
//!         if let Some(err) = progress.error() {
//!             eprintln!("entry failed: {err}");
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod observe;
mod set;

#[cfg(feature = "logging")]
pub use log::LogObserver;
pub use observe::{Observe, Progress, Settled};
pub(crate) use set::{notify_one, panic_message, ObserverSet};
