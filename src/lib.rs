//! # callstack-bus
//!
//! **callstack-bus** is an embedded, in-process event bus whose handlers can
//! trigger further events. Every top-level trigger records the resulting call
//! tree, rejects handler chains that re-enter an ancestor event, and tracks the
//! asynchronous work returned by every handler in the tree until all of it settled.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   bus.listen("ping", h1)  bus.listen("pong", h2)
//!                 │                 │
//!                 ▼                 ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Bus                                                         │
//! │  - Registry   (event → ordered handlers)                     │
//! │  - TaskTable  (task id → TaskState, while draining)          │
//! │  - observers  (bus-wide, attached to every task)             │
//! └──────┬───────────────────────────────────────────────────────┘
//!        │ bus.trigger("ping", &args)
//!        ▼
//!   invoke(None, "ping") ──► h1.call(scope#0, args) ──► Reply
//!                                  │
//!                                  └─ scope#0.trigger("pong") ──► invoke(Some(#0), "pong")
//!                                                                   └─► h2.call(scope#1)
//!        │
//!        ├──► Dispatch::stack_tree()        (synchronous tree)
//!        └──► drain loop (tokio task)
//!               pop reply ─► await ─► observers(Progress { tree, complete, settled })
//! ```
//!
//! ### Lifecycle of one trigger
//! ```text
//! trigger(event)
//!   ├─► open task (random id, empty call stack, empty queue)
//!   ├─► for each handler (registration order):
//!   │     ├─ cycle check against the parent chain   ─► Err(Circular)
//!   │     ├─ depth check (BusConfig::max_depth)      ─► Err(DepthExceeded)
//!   │     ├─ record entry, call handler with a Scope
//!   │     └─ queue its Reply (invocation order)
//!   ├─► return Dispatch { stack_tree, .. }
//!   └─► drain: settle replies one by one, notify observers,
//!              latch `complete` when the queue is empty and no Scope is alive
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                          |
//! |-------------------|--------------------------------------------------------------|------------------------------------|
//! | **Dispatch**      | Register handlers, trigger events, nested sub-triggers.      | [`Bus`], [`Scope`], [`Dispatch`]   |
//! | **Handlers**      | Closure or trait handlers returning ready or pending work.   | [`Handler`], [`HandlerFn`], [`Reply`] |
//! | **Call trees**    | Flat call stack and its tree view.                           | [`StackTree`], [`StackNode`]       |
//! | **Observers**     | Per-settle progress and completion notifications.            | [`Observe`], [`Progress`]          |
//! | **Errors**        | Typed dispatch and handler errors.                           | [`BusError`], [`HandlerError`]     |
//! | **Configuration** | Depth limit and settle timeout.                              | [`BusConfig`]                      |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogObserver`] writing progress through `tracing`.
//!
//! ## Example
//! ```rust
//! use callstack_bus::{Bus, HandlerError, HandlerFn, Progress, Reply};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus: Bus = Bus::new();
//!
//!     bus.listen("ping", HandlerFn::arc("on_ping", |scope, _| {
//!         let scope = scope.clone();
//!         Ok(Reply::pending(async move {
//!             scope.trigger("pong", &())?;
//!             Ok::<_, HandlerError>(())
//!         }))
//!     }));
//!     bus.listen("pong", HandlerFn::arc("on_pong", |_, _| Ok(Reply::done())));
//!
//!     let mut dispatch = bus.trigger("ping", &())?;
//!     assert_eq!(dispatch.stack_tree().events(), vec!["ping"]);
//!
//!     dispatch.subscribe(|p: &Progress| {
//!         if p.complete {
//!             println!("{}", p.tree);
//!         }
//!     });
//!
//!     let tree = dispatch.wait().await?;
//!     assert_eq!(tree.events(), vec!["ping", "pong"]);
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod handlers;
mod lock;
mod observers;
mod stack;

// ---- Public re-exports ----

pub use crate::core::{Bus, BusBuilder, BusConfig, Dispatch, Scope};
pub use error::{BusError, HandlerError};
pub use handlers::{BoxReply, Handler, HandlerFn, HandlerRef, Reply};
pub use observers::{Observe, Progress, Settled};
pub use stack::{Entry, NodeId, StackNode, StackTree, TaskId};

// Optional: expose a simple built-in tracing observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogObserver;
