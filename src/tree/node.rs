use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::backend::{ChildrenQuery, LanguageBackend};
use crate::error::{ExplorerError, Result};
use crate::tree::hierarchical;
use crate::tree::lock::TreeLock;
use crate::tree::reconcile::reconcile_children;

/// Kind of tree element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Workspace,
    Project,
    Container,
    PackageRoot,
    Package,
    PrimaryType,
    Folder,
    File,
}

impl NodeKind {
    /// Display/sort precedence; lower sorts first.
    pub fn order(self) -> u8 {
        match self {
            NodeKind::Workspace => 1,
            NodeKind::Project => 2,
            NodeKind::Container => 3,
            NodeKind::PackageRoot => 4,
            NodeKind::Package => 5,
            NodeKind::PrimaryType => 6,
            NodeKind::Folder => 7,
            NodeKind::File => 8,
        }
    }

    /// Whether nodes of this kind can carry children at all.
    pub fn may_have_children(self) -> bool {
        !matches!(self, NodeKind::PrimaryType | NodeKind::File)
    }

    /// Whether this kind's URI points at a real filesystem resource.
    pub fn is_resource(self) -> bool {
        matches!(
            self,
            NodeKind::PackageRoot
                | NodeKind::Package
                | NodeKind::PrimaryType
                | NodeKind::Folder
                | NodeKind::File
        )
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Serializable description of one tree element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub kind: NodeKind,
    /// Opaque routing key the backing service uses to answer child queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handler_identifier: Option<String>,
    /// `None` means the children have never been loaded. `Some` (even empty)
    /// is authoritative for reconciliation until a refresh forces a reload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeData>>,
    /// Marks the collapsed-but-pre-expanded package variant whose children
    /// are synthesized and cached in the snapshot side table.
    #[serde(default, skip_serializing_if = "is_false")]
    pub hierarchical: bool,
}

impl NodeData {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            display_name: None,
            uri: None,
            path: None,
            kind,
            handler_identifier: None,
            children: None,
            hierarchical: false,
        }
    }
}

/// One step of a reveal walk, matched against a child by name and path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStep {
    pub name: String,
    pub path: Option<PathBuf>,
}

impl PathStep {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: Some(path.into()),
        }
    }
}

/// Shared handles a node needs to load and merge children.
pub struct LoadContext<'a> {
    pub backend: &'a dyn LanguageBackend,
    pub lock: &'a TreeLock,
    /// Fold flat package listings into nested package hierarchies.
    pub hierarchical: bool,
}

/// Runtime tree element wrapping one [`NodeData`].
///
/// A node owns its identity fields and its materialized child list; the
/// parent is reachable only through a weak back-reference, so ownership
/// flows strictly root-to-leaf. The child list is `None` until loaded.
#[derive(Debug)]
pub struct Node {
    data: NodeData,
    parent: Weak<Node>,
    children: Mutex<Option<Vec<Arc<Node>>>>,
}

impl Node {
    /// Build a node (and any already-loaded descendants) from cached data.
    pub fn from_data(mut data: NodeData, parent: Weak<Node>) -> Arc<Node> {
        let child_data = data.children.take();
        Arc::new_cyclic(|me: &Weak<Node>| {
            let children = child_data.map(|list| {
                list.into_iter()
                    .map(|child| Node::from_data(child, me.clone()))
                    .collect()
            });
            Node {
                data,
                parent,
                children: Mutex::new(children),
            }
        })
    }

    /// Build a parentless root node.
    pub fn new_root(data: NodeData) -> Arc<Node> {
        Node::from_data(data, Weak::new())
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    /// Display label: the pretty name when present, the identity name otherwise.
    pub fn label(&self) -> &str {
        self.data.display_name.as_deref().unwrap_or(&self.data.name)
    }

    pub fn uri(&self) -> Option<&str> {
        self.data.uri.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.data.path.as_deref()
    }

    pub fn kind(&self) -> NodeKind {
        self.data.kind
    }

    pub fn handler_identifier(&self) -> Option<&str> {
        self.data.handler_identifier.as_deref()
    }

    /// Identity fields only; the live child list is not reflected here.
    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.parent.upgrade()
    }

    /// Whether the child list has been loaded (possibly empty).
    pub fn is_loaded(&self) -> bool {
        self.children.lock().is_some()
    }

    /// Current child handles without loading; empty when not yet loaded.
    pub fn child_nodes(&self) -> Vec<Arc<Node>> {
        self.children.lock().clone().unwrap_or_default()
    }

    /// Reassemble the serializable subtree, loaded descendants included.
    pub fn to_node_data(&self) -> NodeData {
        let mut data = self.data.clone();
        data.children = self
            .children
            .lock()
            .as_ref()
            .map(|nodes| nodes.iter().map(|n| n.to_node_data()).collect());
        data
    }

    /// Routing key for a child-listing request: the handler identifier when
    /// present, the URI otherwise.
    pub fn children_query(&self) -> Result<ChildrenQuery> {
        if let Some(handler) = &self.data.handler_identifier {
            return Ok(ChildrenQuery::HandlerIdentifier(handler.clone()));
        }
        if let Some(uri) = &self.data.uri {
            return Ok(ChildrenQuery::Uri(uri.clone()));
        }
        Err(ExplorerError::MissingIdentifier(self.data.name.clone()))
    }

    /// Load the child list, merging the fresh listing with any previously
    /// loaded subtree so expanded descendants keep their identity.
    ///
    /// The whole fetch-reconcile-replace sequence runs under the tree lock.
    /// A failed fetch degrades to the pruned cached list, never an error.
    pub async fn get_children(self: &Arc<Self>, ctx: &LoadContext<'_>) -> Vec<Arc<Node>> {
        if !self.data.kind.may_have_children() {
            return Vec::new();
        }
        let _guard = ctx.lock.acquire().await;

        let fresh = self.fetch_children(ctx).await;
        let previous = self
            .children
            .lock()
            .as_ref()
            .map(|nodes| nodes.iter().map(|n| n.to_node_data()).collect());
        let merged = reconcile_children(previous, fresh, |uri| ctx.backend.resource_exists(uri));

        let Some(mut merged) = merged else {
            return Vec::new();
        };
        sort_node_data(&mut merged);
        let built: Vec<Arc<Node>> = merged
            .into_iter()
            .map(|child| Node::from_data(child, Arc::downgrade(self)))
            .collect();
        *self.children.lock() = Some(built.clone());
        built
    }

    async fn fetch_children(&self, ctx: &LoadContext<'_>) -> Option<Vec<NodeData>> {
        let query = match self.children_query() {
            Ok(query) => query,
            Err(err) => {
                tracing::debug!(node = %self.data.name, %err, "no routing key for child fetch");
                return None;
            }
        };
        match ctx.backend.list_children(&query).await {
            Ok(list) => {
                if ctx.hierarchical
                    && (self.data.kind == NodeKind::PackageRoot || self.data.hierarchical)
                {
                    Some(hierarchical::fold_packages(list, self.data.uri.as_deref()))
                } else {
                    Some(list)
                }
            }
            Err(err) => {
                tracing::warn!(node = %self.data.name, %err, "child fetch failed, serving cached children");
                None
            }
        }
    }

    /// Rebuild child handles from already-loaded data without consulting the
    /// backend; the warm-start path.
    pub async fn get_child_node_list(self: &Arc<Self>, lock: &TreeLock) -> Vec<Arc<Node>> {
        let _guard = lock.acquire().await;
        self.child_nodes()
    }

    /// Graft extra child data onto this node (hierarchical packages
    /// re-attach their side-table children on warm start).
    pub fn attach_child_data(self: &Arc<Self>, extra: Vec<NodeData>) {
        if extra.is_empty() {
            return;
        }
        let mut children = self.children.lock();
        let list = children.get_or_insert_with(Vec::new);
        list.extend(
            extra
                .into_iter()
                .map(|data| Node::from_data(data, Arc::downgrade(self))),
        );
        sort_nodes(list);
    }

    /// Walk down the tree consuming one `(name, path)` step per level.
    ///
    /// `None` means a segment could not be matched: the path no longer
    /// exists in the tree, which callers must not treat as an error.
    pub fn reveal_paths<'a>(
        self: &'a Arc<Self>,
        steps: &'a [PathStep],
        ctx: &'a LoadContext<'a>,
    ) -> Pin<Box<dyn Future<Output = Option<Arc<Node>>> + Send + 'a>> {
        Box::pin(async move {
            let Some((step, rest)) = steps.split_first() else {
                return Some(Arc::clone(self));
            };
            let children = self.get_children(ctx).await;
            let child = children
                .into_iter()
                .find(|c| c.name() == step.name && c.path() == step.path.as_deref())?;
            child.reveal_paths(rest, ctx).await
        })
    }

    /// Structural ancestor test by pointer identity.
    pub fn is_itself_or_ancestor_of(self: &Arc<Self>, other: &Arc<Node>) -> bool {
        let mut current = Some(Arc::clone(other));
        while let Some(node) = current {
            if Arc::ptr_eq(self, &node) {
                return true;
            }
            current = node.parent.upgrade();
        }
        false
    }
}

/// Order children by kind precedence, then lexicographically by name.
pub fn sort_node_data(list: &mut [NodeData]) {
    list.sort_by(|a, b| {
        a.kind
            .order()
            .cmp(&b.kind.order())
            .then_with(|| a.name.cmp(&b.name))
    });
}

pub(crate) fn sort_nodes(list: &mut [Arc<Node>]) {
    list.sort_by(|a, b| {
        a.data
            .kind
            .order()
            .cmp(&b.data.kind.order())
            .then_with(|| a.data.name.cmp(&b.data.name))
    });
}
