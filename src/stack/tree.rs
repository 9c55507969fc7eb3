//! # Tree view over a call-stack list.
//!
//! Node identifiers are derived from the task id and the entry index, so the same
//! invocation keeps the same [`NodeId`] across every snapshot of a task.

use std::fmt;
use std::sync::Arc;

use crate::handlers::HandlerRef;

use super::{Entry, HandlerTag, TaskId};

/// Identifier of one node in a [`StackTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    task: TaskId,
    index: usize,
}

impl NodeId {
    pub(crate) fn new(task: TaskId, index: usize) -> Self {
        Self { task, index }
    }

    /// Task the node belongs to.
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Position of the invocation in the task's call order.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.task, self.index)
    }
}

/// One invocation with its nested invocations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackNode {
    id: NodeId,
    parent_id: Option<NodeId>,
    event: Arc<str>,
    handler: Arc<str>,
    tag: HandlerTag,
    children: Vec<StackNode>,
}

impl StackNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.parent_id
    }

    pub fn event(&self) -> &str {
        &self.event
    }

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

    /// Invocations triggered by this one, in call order.
    pub fn children(&self) -> &[StackNode] {
        &self.children
    }

    fn render(&self, out: &mut String, prefix: &str, last: bool, root: bool) {
        let (branch, next) = match (root, last) {
            (true, _) => ("", String::new()),
            (false, true) => ("└── ", format!("{prefix}    ")),
            (false, false) => ("├── ", format!("{prefix}│   ")),
        };
        out.push_str(prefix);
        out.push_str(branch);
        out.push_str(&self.event);
        out.push_str(" [");
        out.push_str(&self.handler);
        out.push_str("]\n");

        let n = self.children.len();
        for (i, child) in self.children.iter().enumerate() {
            child.render(out, &next, i + 1 == n, false);
        }
    }
}

/// Forest of invocations of one task; roots are the top-level handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackTree {
    task: TaskId,
    roots: Vec<StackNode>,
    len: usize,
}

impl StackTree {
    /// Builds the forest from a flat list whose parents precede their children.
    pub(crate) fn build(task: TaskId, entries: &[Entry]) -> Self {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); entries.len()];
        let mut roots = Vec::new();
        for (idx, entry) in entries.iter().enumerate() {
            match entry.parent() {
                Some(p) => children[p].push(idx),
                None => roots.push(idx),
            }
        }

        fn node(task: TaskId, entries: &[Entry], children: &[Vec<usize>], idx: usize) -> StackNode {
            let entry = &entries[idx];
            StackNode {
                id: NodeId::new(task, idx),
                parent_id: entry.parent().map(|p| NodeId::new(task, p)),
                event: Arc::from(entry.event()),
                handler: Arc::from(entry.handler()),
                tag: entry.tag().clone(),
                children: children[idx]
                    .iter()
                    .map(|&c| node(task, entries, children, c))
                    .collect(),
            }
        }

        Self {
            task,
            roots: roots
                .into_iter()
                .map(|r| node(task, entries, &children, r))
                .collect(),
            len: entries.len(),
        }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn roots(&self) -> &[StackNode] {
        &self.roots
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Depth-first, pre-order iterator over all nodes.
    pub fn iter(&self) -> impl Iterator<Item = &StackNode> {
        let mut stack: Vec<&StackNode> = self.roots.iter().rev().collect();
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    /// Event names in pre-order.
    pub fn events(&self) -> Vec<&str> {
        self.iter().map(StackNode::event).collect()
    }

    /// First node (pre-order) for `event`.
    pub fn find(&self, event: &str) -> Option<&StackNode> {
        self.iter().find(|n| n.event() == event)
    }
}

impl fmt::Display for StackTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for root in &self.roots {
            root.render(&mut out, "", true, true);
        }
        f.write_str(out.trim_end())
    }
}
