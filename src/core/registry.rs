//! # Listener registry - event name to ordered handlers.
//!
//! ## Rules
//! - Insertion order is dispatch order; duplicates are allowed.
//! - `handlers()` returns a snapshot, so handlers may `listen`/`remove` while a
//!   dispatch is running: additions are not called in the current round, removals
//!   are still called in it.
//! - The lock is never held while a handler runs.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::handlers::{same_handler, HandlerRef};
use crate::lock::lock;

pub(crate) struct Registry<A> {
    listeners: Mutex<HashMap<String, Vec<HandlerRef<A>>>>,
}

impl<A: Send + Sync + 'static> Registry<A> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }

    /// Appends `handler` to `event`'s list.
    pub(crate) fn listen(&self, event: &str, handler: HandlerRef<A>) {
        let mut listeners = lock(&self.listeners);
        let list = listeners.entry(event.to_string()).or_default();
        list.push(handler);
        tracing::trace!(event, listeners = list.len(), "listener added");
    }

    /// Removes every registration of `handler` under `event`, or the whole list when
    /// `handler` is `None`. Unknown events are ignored.
    pub(crate) fn remove(&self, event: &str, handler: Option<&HandlerRef<A>>) {
        let mut listeners = lock(&self.listeners);
        let Some(list) = listeners.get_mut(event) else {
            return;
        };

        match handler {
            Some(target) => list.retain(|h| !same_handler(h, target)),
            None => list.clear(),
        }
        tracing::trace!(event, listeners = list.len(), "listeners removed");

        if list.is_empty() {
            listeners.remove(event);
        }
    }

    /// Snapshot of `event`'s handlers in registration order.
    pub(crate) fn handlers(&self, event: &str) -> Vec<HandlerRef<A>> {
        lock(&self.listeners)
            .get(event)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn count(&self, event: &str) -> usize {
        lock(&self.listeners).get(event).map_or(0, Vec::len)
    }

    /// Sorted names of events with at least one handler.
    pub(crate) fn events(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.listeners).keys().cloned().collect();
        names.sort_unstable();
        names
    }
}
