use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::observers::{Observe, ObserverSet};

use super::bus::{Bus, Inner};
use super::config::BusConfig;
use super::registry::Registry;
use super::tracker::TaskTable;

/// Builder for constructing a [`Bus`] with optional features.
pub struct BusBuilder<A> {
    cfg: BusConfig,
    observers: Vec<Arc<dyn Observe>>,
    shutdown: Option<CancellationToken>,
    _args: std::marker::PhantomData<fn(&A)>,
}

impl<A: Send + Sync + 'static> BusBuilder<A> {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: BusConfig) -> Self {
        Self {
            cfg,
            observers: Vec::new(),
            shutdown: None,
            _args: std::marker::PhantomData,
        }
    }

    /// Sets bus-wide observers.
    ///
    /// They are attached to every task before its first handler runs, ahead of
    /// observers added through [`Dispatch::subscribe`](crate::Dispatch::subscribe).
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Ties the bus to an external token: cancelling it cancels every task, like
    /// [`Bus::shutdown`].
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Builds the bus.
    pub fn build(self) -> Bus<A> {
        Bus::from_inner(Arc::new(Inner {
            config: self.cfg,
            registry: Registry::new(),
            tasks: Arc::new(TaskTable::default()),
            observers: ObserverSet::new(self.observers),
            shutdown: self.shutdown.unwrap_or_default(),
        }))
    }
}
