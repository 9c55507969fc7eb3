//! # Bus: listener registry, dispatcher and completion tracking in one handle.
//!
//! ## Architecture
//! ```text
//! bus.trigger("ping", &args)
//!   ├─► TaskTable::open()            → TaskState { id, stack, queue, observers }
//!   ├─► invoke(task, None, "ping")   → handlers run synchronously, may sub-trigger
//!   ├─► tree = stack.tree()          → Dispatch::stack_tree()
//!   └─► spawn drain(task)            → observers(tree, complete) per settled reply
//! ```
//!
//! ## Rules
//! - `trigger` needs a tokio runtime for the drain loop; it fails with
//!   [`BusError::NoRuntime`] otherwise.
//! - A synchronous error or a panicking handler aborts the trigger: the task is
//!   cancelled, its queued replies are dropped and nothing is drained.
//! - `Bus` is cheap to clone (internally an `Arc`).

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::BusError;
use crate::handlers::HandlerRef;
use crate::observers::ObserverSet;
use crate::stack::TaskId;

use super::builder::BusBuilder;
use super::config::BusConfig;
use super::handle::Dispatch;
use super::invoke::invoke;
use super::registry::Registry;
use super::tracker::{drain, TaskState, TaskTable};

pub(crate) struct Inner<A> {
    pub(crate) config: BusConfig,
    pub(crate) registry: Registry<A>,
    pub(crate) tasks: Arc<TaskTable>,
    pub(crate) observers: ObserverSet,
    pub(crate) shutdown: CancellationToken,
}

/// Event bus with re-entrant dispatch and async completion tracking.
///
/// `A` is the argument type passed to every handler.
pub struct Bus<A = ()> {
    inner: Arc<Inner<A>>,
}

impl<A: Send + Sync + 'static> Bus<A> {
    /// Creates a bus with [`BusConfig::default`] and no bus-wide observers.
    pub fn new() -> Self {
        Self::builder(BusConfig::default()).build()
    }

    pub fn builder(cfg: BusConfig) -> BusBuilder<A> {
        BusBuilder::new(cfg)
    }

    pub(crate) fn from_inner(inner: Arc<Inner<A>>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Appends `handler` to `event`'s handlers.
    pub fn listen(&self, event: &str, handler: HandlerRef<A>) {
        self.inner.registry.listen(event, handler);
    }

    /// Removes `handler` from `event` (every registration of it), or all of
    /// `event`'s handlers when `handler` is `None`.
    pub fn remove(&self, event: &str, handler: Option<&HandlerRef<A>>) {
        self.inner.registry.remove(event, handler);
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.inner.registry.count(event)
    }

    /// Sorted names of events that have handlers.
    pub fn events(&self) -> Vec<String> {
        self.inner.registry.events()
    }

    /// Dispatches `event` as a new top-level trigger.
    ///
    /// All handlers, and everything they trigger synchronously, have run when this
    /// returns. Pending replies are drained afterwards on the runtime.
    pub fn trigger(&self, event: &str, args: &A) -> Result<Dispatch, BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        if self.inner.shutdown.is_cancelled() {
            return Err(BusError::Cancelled {
                event: event.to_string(),
            });
        }

        let task = self
            .inner
            .tasks
            .open(self.inner.shutdown.child_token(), self.inner.observers.clone());
        tracing::debug!(task = %task.id(), event, "trigger");

        let mut guard = AbortGuard {
            tasks: &self.inner.tasks,
            task: &task,
            armed: true,
        };
        if let Err(err) = invoke(&self.inner, &task, None, event, args) {
            tracing::debug!(task = %task.id(), event, err = %err, "trigger aborted");
            return Err(err);
        }
        guard.armed = false;
        drop(guard);

        let stack_tree = task.tree();
        let join = runtime.spawn(drain(
            Arc::clone(&self.inner.tasks),
            Arc::clone(&task),
            self.inner.config.settle_limit(),
        ));

        Ok(Dispatch::new(stack_tree, task, join))
    }

    /// Ids of triggers whose drain loop has not completed.
    pub fn pending_tasks(&self) -> Vec<TaskId> {
        self.inner.tasks.ids()
    }

    /// Cancels every running task and refuses new triggers.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }
}

/// Tears down a task whose synchronous dispatch returned an error or unwound.
struct AbortGuard<'a> {
    tasks: &'a TaskTable,
    task: &'a Arc<TaskState>,
    armed: bool,
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if std::thread::panicking() {
            tracing::warn!(task = %self.task.id(), "handler panicked during dispatch");
        }
        self.task.abort();
        self.tasks.close(self.task.id());
    }
}

impl<A: Send + Sync + 'static> Default for Bus<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Bus<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Bus<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("config", &self.inner.config)
            .field("observers", &self.inner.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::handlers::{HandlerFn, Reply};
    use crate::observers::{Observe, Progress};
    use crate::core::Scope;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    type Parked = Arc<Mutex<Option<Scope<()>>>>;

    #[derive(Clone, Debug, PartialEq)]
    struct Seen {
        complete: bool,
        events: Vec<String>,
        settled: Option<String>,
        error: Option<&'static str>,
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Seen>>>);

    impl Recorder {
        fn seen(&self) -> Vec<Seen> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Observe for Recorder {
        fn on_progress(&self, p: &Progress) {
            self.0.lock().unwrap().push(Seen {
                complete: p.complete,
                events: p.tree.events().into_iter().map(String::from).collect(),
                settled: p.settled.as_ref().map(|s| s.event.clone()),
                error: p.error().map(HandlerError::as_label),
            });
        }
    }

    fn noop(name: &'static str) -> HandlerRef<()> {
        HandlerFn::arc(name, |_, _| Ok(Reply::done()))
    }

    fn logging(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> HandlerRef<()> {
        let log = log.clone();
        HandlerFn::arc(name, move |_, _| {
            log.lock().unwrap().push(name.to_string());
            Ok(Reply::done())
        })
    }

    fn forward(name: &'static str, to: &'static str) -> HandlerRef<()> {
        HandlerFn::arc(name, move |scope, _| {
            scope.trigger(to, &())?;
            Ok(Reply::done())
        })
    }

    #[tokio::test]
    async fn handlers_fire_in_registration_order() {
        let bus: Bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.listen("e", logging("first", &log));
        bus.listen("e", logging("second", &log));
        bus.listen("e", logging("third", &log));

        let dispatch = bus.trigger("e", &()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        let handlers: Vec<&str> = dispatch
            .stack_tree()
            .roots()
            .iter()
            .map(|n| n.handler())
            .collect();
        assert_eq!(handlers, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn remove_single_handler_keeps_the_others() {
        let bus: Bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let gone = logging("gone", &log);
        bus.listen("e", logging("kept", &log));
        bus.listen("e", gone.clone());

        bus.remove("e", Some(&gone));
        bus.trigger("e", &()).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["kept"]);
    }

    #[tokio::test]
    async fn cleared_event_yields_empty_tree() {
        let bus: Bus = Bus::new();
        bus.listen("e", noop("a"));
        bus.listen("e", noop("b"));

        bus.remove("e", None);
        let mut dispatch = bus.trigger("e", &()).unwrap();

        assert!(dispatch.stack_tree().is_empty());
        assert_eq!(bus.listener_count("e"), 0);
        assert!(dispatch.wait().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn self_recursion_is_rejected_before_second_entry() {
        let bus: Bus = Bus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        bus.listen(
            "a",
            HandlerFn::arc("again", move |scope, _| {
                c.fetch_add(1, Ordering::SeqCst);
                scope.trigger("a", &())?;
                Ok(Reply::done())
            }),
        );

        let err = bus.trigger("a", &()).unwrap_err();

        assert_eq!(
            err,
            BusError::Circular {
                event: "a".into(),
                path: vec!["a".into(), "a".into()],
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(bus.pending_tasks().is_empty());
    }

    #[tokio::test]
    async fn indirect_cycle_names_the_reentered_event() {
        let bus: Bus = Bus::new();
        bus.listen("a", forward("a_to_b", "b"));
        bus.listen("b", forward("b_to_a", "a"));

        let err = bus.trigger("a", &()).unwrap_err();

        assert_eq!(err.event(), Some("a"));
        assert_eq!(err.as_label(), "bus_circular");
        match err {
            BusError::Circular { path, .. } => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn sibling_event_is_not_a_cycle() {
        let bus: Bus = Bus::new();
        bus.listen("a", forward("a_to_b", "b"));
        bus.listen("a", forward("a_to_d", "d"));
        bus.listen("b", forward("b_to_c", "c"));
        bus.listen("c", forward("c_to_d", "d"));
        bus.listen("d", noop("on_d"));

        let dispatch = bus.trigger("a", &()).unwrap();
        let tree = dispatch.stack_tree();

        assert_eq!(tree.events(), vec!["a", "b", "c", "d", "a", "d"]);
        assert_eq!(tree.roots().len(), 2);
        let d = &tree.roots()[0].children()[0].children()[0].children()[0];
        assert_eq!(d.event(), "d");
        assert_eq!(d.id().index(), 3);
    }

    #[tokio::test]
    async fn swallowed_sub_trigger_error_still_settles_every_entry() {
        let bus: Bus = Bus::new();
        bus.listen(
            "a",
            HandlerFn::arc("tolerant", |scope, _| {
                let _ = scope.trigger("b", &());
                Ok(Reply::done())
            }),
        );
        bus.listen("b", forward("b_to_a", "a"));
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("a", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        let tree = dispatch.wait().await.unwrap();

        assert_eq!(tree.events(), vec!["a", "b"]);
        let seen = recorder.seen();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].settled.as_deref(), Some("a"));
        assert_eq!(seen[0].error, None);
        assert_eq!(seen[1].settled.as_deref(), Some("b"));
        assert_eq!(seen[1].error, Some("handler_dispatch"));
        assert!(seen[1].complete);
    }

    #[tokio::test]
    async fn sync_tree_excludes_deferred_sub_triggers() {
        let bus: Bus = Bus::new();
        bus.listen(
            "e",
            HandlerFn::arc("deferred", |scope, _| {
                let scope = scope.clone();
                Ok(Reply::pending(async move {
                    sleep(Duration::from_millis(10)).await;
                    scope.trigger("e2", &())?;
                    Ok::<(), HandlerError>(())
                }))
            }),
        );
        bus.listen("e2", noop("on_e2"));

        let mut dispatch = bus.trigger("e", &()).unwrap();
        assert_eq!(dispatch.stack_tree().events(), vec!["e"]);

        let tree = dispatch.wait().await.unwrap();
        assert_eq!(tree.events(), vec!["e", "e2"]);
        assert_eq!(dispatch.stack_tree().events(), vec!["e"]);
    }

    #[tokio::test]
    async fn late_subscriber_gets_final_tree_immediately() {
        let bus: Bus = Bus::new();
        bus.listen("e", forward("to_f", "f"));
        bus.listen("f", noop("on_f"));

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.wait().await.unwrap();
        assert!(dispatch.is_complete());

        let recorder = Recorder::default();
        dispatch.subscribe(recorder.clone());

        let seen = recorder.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].complete);
        assert_eq!(seen[0].settled, None);
        assert_eq!(seen[0].events, vec!["e", "f"]);
    }

    #[tokio::test]
    async fn resolved_reply_completes_with_single_node() {
        let bus: Bus = Bus::new();
        bus.listen(
            "ping",
            HandlerFn::arc("resolve_a", |_, _| {
                Ok(Reply::pending(async { Ok::<(), HandlerError>(()) }))
            }),
        );

        let mut dispatch = bus.trigger("ping", &()).unwrap();
        assert_eq!(dispatch.stack_tree().roots().len(), 1);
        assert_eq!(dispatch.stack_tree().roots()[0].event(), "ping");

        let recorder = Recorder::default();
        dispatch.subscribe(recorder.clone());
        dispatch.wait().await.unwrap();

        let seen = recorder.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].complete);
        assert_eq!(seen[0].events, vec!["ping"]);
    }

    #[tokio::test]
    async fn async_body_sub_trigger_appears_as_child() {
        let bus: Bus = Bus::new();
        bus.listen(
            "ping",
            HandlerFn::arc("ping", |scope, _| {
                let scope = scope.clone();
                Ok(Reply::pending(async move {
                    scope.trigger("pong", &())?;
                    Ok::<(), HandlerError>(())
                }))
            }),
        );
        bus.listen("pong", noop("pong"));

        let mut dispatch = bus.trigger("ping", &()).unwrap();
        assert_eq!(dispatch.stack_tree().events(), vec!["ping"]);

        let recorder = Recorder::default();
        dispatch.subscribe(recorder.clone());
        let tree = dispatch.wait().await.unwrap();

        let root = &tree.roots()[0];
        assert_eq!(root.event(), "ping");
        assert_eq!(root.children().len(), 1);
        assert_eq!(root.children()[0].event(), "pong");
        assert_eq!(root.children()[0].parent_id(), Some(root.id()));

        let seen = recorder.seen();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].complete);
        assert_eq!(seen[0].events, vec!["ping", "pong"]);
        assert!(seen[1].complete);
        assert_eq!(seen.iter().filter(|s| s.complete).count(), 1);
    }

    #[tokio::test]
    async fn failed_reply_does_not_stop_the_drain() {
        let bus: Bus = Bus::new();
        bus.listen(
            "e",
            HandlerFn::arc("fails", |_, _| {
                Ok(Reply::pending(async {
                    Err::<(), _>(HandlerError::failed("boom"))
                }))
            }),
        );
        bus.listen(
            "e",
            HandlerFn::arc("panics", |_, _| {
                Ok(Reply::pending(async {
                    if true {
                        panic!("kaboom");
                    }
                    Ok::<(), HandlerError>(())
                }))
            }),
        );
        bus.listen("e", noop("fine"));
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        dispatch.wait().await.unwrap();

        let seen = recorder.seen();
        let errors: Vec<Option<&str>> = seen.iter().map(|s| s.error).collect();
        assert_eq!(
            errors,
            vec![Some("handler_failed"), Some("handler_panicked"), None]
        );
        assert!(seen[2].complete);
    }

    #[tokio::test]
    async fn slow_reply_times_out() {
        let bus: Bus = Bus::builder(BusConfig {
            settle_timeout: Duration::from_millis(20),
            ..BusConfig::default()
        })
        .build();
        bus.listen(
            "e",
            HandlerFn::arc("slow", |_, _| {
                Ok(Reply::pending(async {
                    sleep(Duration::from_secs(10)).await;
                    Ok::<(), HandlerError>(())
                }))
            }),
        );
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        dispatch.wait().await.unwrap();

        let seen = recorder.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].error, Some("handler_timeout"));
        assert!(seen[0].complete);
    }

    #[tokio::test]
    async fn depth_limit_rejects_deep_chains() {
        let bus: Bus = Bus::builder(BusConfig {
            max_depth: 2,
            ..BusConfig::default()
        })
        .build();
        bus.listen("a", forward("a_to_b", "b"));
        bus.listen("b", forward("b_to_c", "c"));
        bus.listen("c", noop("on_c"));

        let err = bus.trigger("a", &()).unwrap_err();

        assert_eq!(
            err,
            BusError::DepthExceeded {
                event: "c".into(),
                depth: 3,
                limit: 2,
            }
        );
    }

    #[tokio::test]
    async fn cancel_drops_pending_replies() {
        let bus: Bus = Bus::new();
        let parked: Parked = Arc::new(Mutex::new(None));
        let p = parked.clone();
        bus.listen(
            "e",
            HandlerFn::arc("forever", move |scope, _| {
                *p.lock().unwrap() = Some(scope.clone());
                Ok(Reply::pending(async {
                    sleep(Duration::from_secs(10)).await;
                    Ok::<(), HandlerError>(())
                }))
            }),
        );
        bus.listen("late", noop("on_late"));
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        dispatch.cancel();
        dispatch.wait().await.unwrap();

        let seen = recorder.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].error, Some("handler_cancelled"));
        assert!(seen[0].complete);

        let scope = parked.lock().unwrap().take().unwrap();
        assert!(scope.is_cancelled());
        assert_eq!(
            scope.trigger("late", &()),
            Err(BusError::Cancelled {
                event: "late".into()
            })
        );
    }

    #[tokio::test]
    async fn completion_waits_for_outstanding_scope() {
        let bus: Bus = Bus::new();
        bus.listen(
            "e",
            HandlerFn::arc("detaches", |scope, _| {
                let scope = scope.clone();
                tokio::spawn(async move {
                    sleep(Duration::from_millis(20)).await;
                    let _ = scope.trigger("late", &());
                });
                Ok(Reply::done())
            }),
        );
        bus.listen("late", noop("on_late"));
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        let tree = dispatch.wait().await.unwrap();

        assert_eq!(tree.events(), vec!["e", "late"]);
        let seen = recorder.seen();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].complete);
        assert_eq!(seen[1].settled.as_deref(), Some("late"));
        assert!(seen[1].complete);
    }

    #[tokio::test]
    async fn dropping_last_scope_emits_final_notification() {
        let bus: Bus = Bus::new();
        bus.listen(
            "e",
            HandlerFn::arc("holds", |scope, _| {
                let scope = scope.clone();
                tokio::spawn(async move {
                    sleep(Duration::from_millis(20)).await;
                    drop(scope);
                });
                Ok(Reply::done())
            }),
        );
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        dispatch.wait().await.unwrap();

        let seen = recorder.seen();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].complete);
        assert!(seen[1].complete);
        assert_eq!(seen[1].settled, None);
    }

    #[tokio::test]
    async fn unregistered_event_completes_empty() {
        let bus: Bus = Bus::new();
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("nobody", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        dispatch.wait().await.unwrap();

        let seen = recorder.seen();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].complete);
        assert!(seen[0].events.is_empty());
    }

    #[tokio::test]
    async fn bus_observers_see_every_trigger() {
        let recorder = Recorder::default();
        let bus: Bus = Bus::builder(BusConfig::default())
            .with_observers(vec![Arc::new(recorder.clone()) as Arc<dyn Observe>])
            .build();
        bus.listen("a", noop("on_a"));
        bus.listen("b", noop("on_b"));

        bus.trigger("a", &()).unwrap().wait().await.unwrap();
        bus.trigger("b", &()).unwrap().wait().await.unwrap();

        let settled: Vec<Option<String>> = recorder.seen().into_iter().map(|s| s.settled).collect();
        assert_eq!(settled, vec![Some("a".into()), Some("b".into())]);
    }

    #[tokio::test]
    async fn panicking_observer_is_isolated() {
        let bus: Bus = Bus::new();
        bus.listen("e", noop("a"));
        bus.listen("e", noop("b"));
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(|_: &Progress| panic!("observer bug"));
        dispatch.subscribe(recorder.clone());
        dispatch.wait().await.unwrap();

        assert_eq!(recorder.seen().len(), 2);
    }

    #[tokio::test]
    async fn listen_during_dispatch_applies_to_next_round() {
        let bus: Bus = Bus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let added = logging("added", &log);
        bus.listen(
            "e",
            HandlerFn::arc("adder", move |scope, _| {
                scope.bus().listen("e", added.clone());
                Ok(Reply::done())
            }),
        );

        bus.trigger("e", &()).unwrap();
        assert!(log.lock().unwrap().is_empty());

        bus.trigger("e", &()).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["added"]);
    }

    #[tokio::test]
    async fn arguments_flow_through_sub_triggers() {
        let bus: Bus<u32> = Bus::new();
        let total = Arc::new(AtomicUsize::new(0));
        bus.listen(
            "count",
            HandlerFn::arc("double", |scope, n: &u32| {
                scope.trigger("sum", &(n * 2))?;
                Ok(Reply::done())
            }),
        );
        let t = total.clone();
        bus.listen(
            "sum",
            HandlerFn::arc("sum", move |_, n: &u32| {
                t.fetch_add(*n as usize, Ordering::SeqCst);
                Ok(Reply::done())
            }),
        );

        bus.trigger("count", &21).unwrap();

        assert_eq!(total.load(Ordering::SeqCst), 42);
    }

    #[tokio::test]
    async fn pending_tasks_are_released_on_completion() {
        let bus: Bus = Bus::new();
        bus.listen(
            "e",
            HandlerFn::arc("slow", |_, _| {
                Ok(Reply::pending(async {
                    sleep(Duration::from_millis(10)).await;
                    Ok::<(), HandlerError>(())
                }))
            }),
        );

        let mut dispatch = bus.trigger("e", &()).unwrap();
        assert_eq!(bus.pending_tasks(), vec![dispatch.task_id()]);

        dispatch.wait().await.unwrap();
        assert!(bus.pending_tasks().is_empty());
    }

    #[tokio::test]
    async fn shutdown_cancels_tasks_and_refuses_triggers() {
        let bus: Bus = Bus::new();
        bus.listen(
            "e",
            HandlerFn::arc("forever", |_, _| {
                Ok(Reply::pending(futures::future::pending::<Result<(), HandlerError>>()))
            }),
        );
        let recorder = Recorder::default();

        let mut dispatch = bus.trigger("e", &()).unwrap();
        dispatch.subscribe(recorder.clone());
        bus.shutdown();
        dispatch.wait().await.unwrap();

        assert_eq!(recorder.seen()[0].error, Some("handler_cancelled"));
        assert_eq!(
            bus.trigger("e", &()).unwrap_err(),
            BusError::Cancelled { event: "e".into() }
        );
    }

    #[tokio::test]
    async fn aborted_trigger_drops_queued_replies() {
        struct Flag(Arc<AtomicUsize>);
        impl Drop for Flag {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let dropped = Arc::new(AtomicUsize::new(0));
        let bus: Bus = Bus::new();
        let d = dropped.clone();
        bus.listen(
            "a",
            HandlerFn::arc("holds_scope", move |scope, _| {
                let scope = scope.clone();
                let flag = Flag(d.clone());
                Ok(Reply::pending(async move {
                    let _keep = (scope, flag);
                    Ok::<(), HandlerError>(())
                }))
            }),
        );
        bus.listen("a", forward("loops", "a"));

        let err = bus.trigger("a", &()).unwrap_err();
        assert_eq!(err.as_label(), "bus_circular");
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert!(bus.pending_tasks().is_empty());
    }

    #[tokio::test]
    async fn tree_nodes_name_and_reference_their_handlers() {
        let bus: Bus = Bus::new();
        let anon: HandlerRef<()> = HandlerFn::anonymous(|_, _| Ok(Reply::done()));
        bus.listen("e", anon.clone());
        bus.listen("e", noop("named"));

        let dispatch = bus.trigger("e", &()).unwrap();
        let roots = dispatch.stack_tree().roots();
        assert_eq!(roots[0].handler(), "<anonymous>");
        assert!(roots[0].is_handler(&anon));
        assert_eq!(roots[1].handler(), "named");
        assert!(!roots[1].is_handler(&anon));

        bus.remove("e", roots[1].handler_ref::<()>().as_ref());
        assert_eq!(bus.listener_count("e"), 1);
    }

    #[tokio::test]
    async fn panicking_handler_releases_the_task() {
        let bus: Bus = Bus::new();
        bus.listen("e", HandlerFn::arc("buggy", |_, _| panic!("handler bug")));

        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| bus.trigger("e", &())));
        assert!(res.is_err());
        assert!(bus.pending_tasks().is_empty());

        bus.remove("e", None);
        bus.listen("e", noop("fixed"));
        let mut dispatch = bus.trigger("e", &()).unwrap();
        assert_eq!(dispatch.wait().await.unwrap().events(), vec!["e"]);
    }

    #[tokio::test]
    async fn scope_outliving_an_aborted_trigger_is_cancelled() {
        let parked: Parked = Arc::new(Mutex::new(None));
        let late_calls = Arc::new(AtomicUsize::new(0));
        let bus: Bus = Bus::new();

        let p = parked.clone();
        bus.listen(
            "a",
            HandlerFn::arc("parks", move |scope, _| {
                *p.lock().unwrap() = Some(scope.clone());
                Ok(Reply::done())
            }),
        );
        bus.listen("a", forward("loops", "a"));
        let c = late_calls.clone();
        bus.listen(
            "late",
            HandlerFn::arc("on_late", move |_, _| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(Reply::done())
            }),
        );

        assert_eq!(bus.trigger("a", &()).unwrap_err().as_label(), "bus_circular");

        let scope = parked.lock().unwrap().take().unwrap();
        assert!(scope.is_cancelled());
        assert_eq!(
            scope.trigger("late", &()),
            Err(BusError::Cancelled {
                event: "late".into()
            })
        );
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert!(bus.pending_tasks().is_empty());
    }

    #[test]
    fn trigger_outside_runtime_fails() {
        let bus: Bus = Bus::new();
        bus.listen("e", noop("a"));
        assert_eq!(bus.trigger("e", &()).unwrap_err(), BusError::NoRuntime);
    }
}
