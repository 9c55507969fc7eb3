//! # Call-stack records and their tree view.
//!
//! Every handler invocation of one top-level trigger appends an [`Entry`] to a
//! shared, append-only [`CallStack`]. The [`StackTree`] is a read-only forest
//! rebuilt from that flat list on demand.
//!
//! ```text
//! CallStack (flat, append-only)          StackTree (view)
//!   #0 ping        parent=None             ping
//!   #1 pong        parent=#0               ├── pong
//!   #2 audit       parent=#1               │   └── audit
//!   #3 pong        parent=#0               └── pong
//! ```

mod call_stack;
mod task_id;
mod tree;

pub(crate) use call_stack::{CallStack, HandlerTag};
pub use call_stack::Entry;
pub use task_id::TaskId;
pub use tree::{NodeId, StackNode, StackTree};
