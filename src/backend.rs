use async_trait::async_trait;

use crate::error::Result;
use crate::tree::node::NodeData;

/// Routing key for a child-listing request: the parent's handler identifier
/// when the backing service issued one, its URI otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildrenQuery {
    HandlerIdentifier(String),
    Uri(String),
}

impl ChildrenQuery {
    pub fn key(&self) -> &str {
        match self {
            ChildrenQuery::HandlerIdentifier(key) | ChildrenQuery::Uri(key) => key,
        }
    }
}

/// The backing language service, seen through the narrow surface the tree
/// engine needs.
#[async_trait]
pub trait LanguageBackend: Send + Sync {
    /// Resolves once the service can answer queries; `false` means it will
    /// never become available this session.
    async fn ready(&self) -> bool;

    /// List the children of the node routed by `query`.
    async fn list_children(&self, query: &ChildrenQuery) -> Result<Vec<NodeData>>;

    /// Whether the resource a URI points at still exists on disk/storage.
    fn resource_exists(&self, uri: &str) -> bool;
}
