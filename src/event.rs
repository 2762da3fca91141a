use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::tree::node::Node;

/// Scope of a refresh request or a fired tree-change notification.
#[derive(Debug, Clone)]
pub enum RefreshTarget {
    /// The whole tree.
    Root,
    /// One node and its subtree.
    Node(Arc<Node>),
}

impl RefreshTarget {
    /// Whether a notification for `self` already covers `other`.
    pub fn covers(&self, other: &RefreshTarget) -> bool {
        match (self, other) {
            (RefreshTarget::Root, _) => true,
            (RefreshTarget::Node(_), RefreshTarget::Root) => false,
            (RefreshTarget::Node(a), RefreshTarget::Node(b)) => a.is_itself_or_ancestor_of(b),
        }
    }

    pub(crate) fn label(&self) -> &str {
        match self {
            RefreshTarget::Root => "<root>",
            RefreshTarget::Node(node) => node.name(),
        }
    }
}

impl PartialEq for RefreshTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefreshTarget::Root, RefreshTarget::Root) => true,
            (RefreshTarget::Node(a), RefreshTarget::Node(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for RefreshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tree events delivered to the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    /// The structure under `RefreshTarget` changed; re-query it.
    Changed(RefreshTarget),
}

/// Sending half of the tree event channel; the provider is the single
/// producer.
#[derive(Clone)]
pub struct TreeEvents {
    tx: mpsc::UnboundedSender<TreeEvent>,
}

impl TreeEvents {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TreeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event; a disconnected subscriber is not an error.
    pub fn emit(&self, event: TreeEvent) {
        let _ = self.tx.send(event);
    }
}
