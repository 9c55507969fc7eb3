//! # Flat call-stack list of one task.
//!
//! ## Rules
//! - Append-only: entries are never modified or removed once pushed.
//! - A parent is referenced by index and always precedes its children.
//! - The cycle check runs against the list before every push.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::BusError;
use crate::handlers::HandlerRef;
use crate::lock::lock;

use super::{StackTree, TaskId};

/// Type-erased reference to the handler behind an entry.
///
/// Keeps the handler alive, so its address identifies it for as long as any
/// entry or tree node refers to it. Equality is handler identity.
#[derive(Clone)]
pub(crate) struct HandlerTag {
    addr: usize,
    keep: Arc<dyn Any + Send + Sync>,
}

impl HandlerTag {
    pub(crate) fn of<A: 'static>(handler: &HandlerRef<A>) -> Self {
        Self {
            addr: addr_of(handler),
            keep: Arc::new(Arc::clone(handler)),
        }
    }

    pub(crate) fn handler_ref<A: 'static>(&self) -> Option<HandlerRef<A>> {
        self.keep.downcast_ref::<HandlerRef<A>>().cloned()
    }

    pub(crate) fn is<A: 'static>(&self, handler: &HandlerRef<A>) -> bool {
        self.addr == addr_of(handler)
    }
}

fn addr_of<A>(handler: &HandlerRef<A>) -> usize {
    Arc::as_ptr(handler) as *const () as usize
}

impl PartialEq for HandlerTag {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for HandlerTag {}

impl fmt::Debug for HandlerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerTag({:#x})", self.addr)
    }
}

/// One recorded handler invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    event: Arc<str>,
    handler: Arc<str>,
    tag: HandlerTag,
    parent: Option<usize>,
    depth: usize,
}

impl Entry {
    /// Event the handler was invoked for.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Name of the invoked handler.
    pub fn handler(&self) -> &str {
        &self.handler
    }

    /// The invoked handler, if it takes arguments of type `A`.
    pub fn handler_ref<A: 'static>(&self) -> Option<HandlerRef<A>> {
        self.tag.handler_ref()
    }

    /// Whether `handler` is the one that was invoked (pointer identity).
    pub fn is_handler<A: 'static>(&self, handler: &HandlerRef<A>) -> bool {
        self.tag.is(handler)
    }

    pub(crate) fn tag(&self) -> &HandlerTag {
        &self.tag
    }

    /// Index of the triggering entry, `None` for roots.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Nesting depth, roots are at depth 1.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Shared append-only list of entries for one task.
#[derive(Debug, Default)]
pub(crate) struct CallStack {
    entries: Mutex<Vec<Entry>>,
}

impl CallStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Walks the ancestor chain starting at `parent` (inclusive) and rejects `event`
    /// if it already appears there.
    pub(crate) fn check_circular(&self, parent: Option<usize>, event: &str) -> Result<(), BusError> {
        let entries = lock(&self.entries);

        let mut chain = Vec::new();
        let mut cursor = parent;
        let mut hit = false;
        while let Some(idx) = cursor {
            let entry = &entries[idx];
            chain.push(entry.event.to_string());
            if &*entry.event == event {
                hit = true;
            }
            cursor = entry.parent;
        }

        if !hit {
            return Ok(());
        }

        chain.reverse();
        chain.push(event.to_string());
        Err(BusError::Circular {
            event: event.to_string(),
            path: chain,
        })
    }

    /// Depth a child of `parent` would have.
    pub(crate) fn child_depth(&self, parent: Option<usize>) -> usize {
        match parent {
            Some(idx) => lock(&self.entries)[idx].depth + 1,
            None => 1,
        }
    }

    /// Appends an entry and returns its index.
    pub(crate) fn push(
        &self,
        event: Arc<str>,
        handler: Arc<str>,
        tag: HandlerTag,
        parent: Option<usize>,
    ) -> usize {
        let mut entries = lock(&self.entries);
        let depth = parent.map_or(1, |idx| entries[idx].depth + 1);
        entries.push(Entry {
            event,
            handler,
            tag,
            parent,
            depth,
        });
        entries.len() - 1
    }

    pub(crate) fn get(&self, idx: usize) -> Option<Entry> {
        lock(&self.entries).get(idx).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Builds the tree view of the entries recorded so far.
    pub(crate) fn tree(&self, task: TaskId) -> StackTree {
        let entries = lock(&self.entries).clone();
        StackTree::build(task, &entries)
    }
}
