//! # ObserverSet: panic-isolated fan-out over observers
//!
//! ## What it guarantees
//! - Observers are called in subscription order.
//! - A panicking observer is logged and skipped; the others still run.
//!
//! ## What it does **not** guarantee
//! - No retries: a notification that panicked is not delivered again.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use super::{Observe, Progress};

/// Ordered observer list. Cheap to clone (Arc per observer).
#[derive(Clone, Default)]
pub(crate) struct ObserverSet {
    observers: Vec<Arc<dyn Observe>>,
}

impl ObserverSet {
    pub(crate) fn new(observers: Vec<Arc<dyn Observe>>) -> Self {
        Self { observers }
    }

    pub(crate) fn push(&mut self, observer: Arc<dyn Observe>) {
        self.observers.push(observer);
    }

    /// Delivers `progress` to every observer.
    pub(crate) fn notify(&self, progress: &Progress) {
        for observer in &self.observers {
            notify_one(observer.as_ref(), progress);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }
}

/// Delivers `progress` to a single observer, containing its panic.
pub(crate) fn notify_one(observer: &dyn Observe, progress: &Progress) {
    if let Err(panic_err) = catch_unwind(AssertUnwindSafe(|| observer.on_progress(progress))) {
        tracing::warn!(
            observer = observer.name(),
            task = %progress.task,
            info = %panic_message(panic_err.as_ref()),
            "observer panicked"
        );
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
