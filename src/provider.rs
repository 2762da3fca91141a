//! The tree data provider: root loading, warm start from snapshots, and
//! the debounced refresh scheduler.
//!
//! On startup any per-folder snapshot is loaded synchronously so the first
//! render is instant; once the backing service reports ready, one coalesced
//! full refresh reconciles the stale snapshot against fresh data. All
//! structural reads and writes funnel through the shared [`TreeLock`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::backend::{ChildrenQuery, LanguageBackend};
use crate::config::ExplorerConfig;
use crate::error::Result;
use crate::event::{RefreshTarget, TreeEvent, TreeEvents};
use crate::path_index::PathIndex;
use crate::refresh::DebouncedTrigger;
use crate::snapshot::{self, SnapshotRoots, ViewMode};
use crate::tree::hierarchical::{self, HierarchicalPackageNodeData};
use crate::tree::lock::TreeLock;
use crate::tree::node::{LoadContext, Node, NodeData, NodeKind, PathStep};
use crate::tree::reconcile::reconcile_children;

/// One open workspace folder the explorer is rooted in.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceFolder {
    pub name: String,
    pub path: PathBuf,
}

impl WorkspaceFolder {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn uri(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// Shared-handle tree data provider; cheap to clone.
#[derive(Clone)]
pub struct ExplorerTreeProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    folders: Vec<WorkspaceFolder>,
    backend: Arc<dyn LanguageBackend>,
    mode: ViewMode,
    lock: TreeLock,
    /// Live root nodes; `None` forces a reload on next access.
    roots: Mutex<Option<Vec<Arc<Node>>>>,
    /// Snapshot-derived roots served while the backing service warms up,
    /// then consumed as the `previous` side of the first root reconciliation.
    warm_roots: Mutex<Option<Vec<Arc<Node>>>>,
    warm: AtomicBool,
    side_table: Mutex<HashMap<String, HierarchicalPackageNodeData>>,
    path_index: PathIndex,
    events: TreeEvents,
    trigger: Mutex<DebouncedTrigger<RefreshTarget>>,
}

fn make_trigger(
    weak: Weak<ProviderInner>,
    delay: Duration,
) -> DebouncedTrigger<RefreshTarget> {
    DebouncedTrigger::new(delay, move |target| {
        if let Some(inner) = weak.upgrade() {
            inner.do_refresh(target);
        }
    })
}

fn workspace_node_data(folder: &WorkspaceFolder) -> NodeData {
    let mut data = NodeData::new(folder.name.clone(), NodeKind::Workspace);
    data.uri = Some(folder.uri());
    data.path = Some(folder.path.clone());
    data
}

fn snapshot_data(node: &Arc<Node>, mode: ViewMode) -> NodeData {
    let mut data = node.to_node_data();
    if mode == ViewMode::Hierarchical {
        hierarchical::prune_synthesized_children(&mut data);
    }
    data
}

impl ExplorerTreeProvider {
    /// Build the provider, loading any per-folder snapshots for an instant
    /// first render, and spawn the readiness watcher that triggers the one
    /// coalesced full refresh once the backing service can answer queries.
    ///
    /// Must be called from within a Tokio runtime. The returned receiver
    /// delivers the tree-changed notifications.
    pub fn new(
        folders: Vec<WorkspaceFolder>,
        backend: Arc<dyn LanguageBackend>,
        config: &ExplorerConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TreeEvent>) {
        let mode = config.view_mode();
        let (events, rx) = TreeEvents::channel();

        let mut warm_roots = Vec::new();
        let mut side_table = HashMap::new();
        for folder in &folders {
            if let Some(payload) = snapshot::load(&folder.path, mode) {
                warm_roots.extend(payload.roots.into_iter().map(Node::new_root));
                side_table.extend(payload.hierarchical_packages);
            }
        }
        let warm = !warm_roots.is_empty();

        let delay = config.refresh_delay();
        let inner = Arc::new_cyclic(|weak: &Weak<ProviderInner>| ProviderInner {
            folders,
            backend: Arc::clone(&backend),
            mode,
            lock: TreeLock::new(),
            roots: Mutex::new(None),
            warm_roots: Mutex::new(if warm { Some(warm_roots) } else { None }),
            warm: AtomicBool::new(warm),
            side_table: Mutex::new(side_table),
            path_index: PathIndex::new(),
            events,
            trigger: Mutex::new(make_trigger(weak.clone(), delay)),
        });

        if warm {
            let weak = Arc::downgrade(&inner);
            tokio::spawn(async move {
                if backend.ready().await {
                    if let Some(inner) = weak.upgrade() {
                        inner.end_warm_start();
                    }
                }
            });
        }

        (Self { inner }, rx)
    }

    pub fn folders(&self) -> &[WorkspaceFolder] {
        &self.inner.folders
    }

    pub fn view_mode(&self) -> ViewMode {
        self.inner.mode
    }

    /// Whether snapshot data is still being served in place of live data.
    pub fn is_warm(&self) -> bool {
        self.inner.warm.load(Ordering::SeqCst)
    }

    /// Children of `element`, or the root list when `element` is `None`.
    ///
    /// During warm start this serves snapshot data without touching the
    /// backing service; afterwards it loads through the tree lock and
    /// reconciles. Never fails: fetch problems degrade to cached or empty.
    pub async fn get_children(&self, element: Option<&Arc<Node>>) -> Vec<Arc<Node>> {
        let inner = &self.inner;
        if inner.warm.load(Ordering::SeqCst) {
            let children = match element {
                None => inner.warm_roots.lock().clone().unwrap_or_default(),
                Some(node) => {
                    if inner.mode == ViewMode::Hierarchical {
                        inner.graft_side_table(node).await;
                    }
                    node.get_child_node_list(&inner.lock).await
                }
            };
            inner.path_index.save_nodes(&children);
            return children;
        }

        if !inner.backend.ready().await {
            return Vec::new();
        }
        let children = match element {
            None => inner.root_nodes().await,
            Some(node) => {
                let list = {
                    let ctx = inner.load_context();
                    node.get_children(&ctx).await
                };
                if inner.mode == ViewMode::Hierarchical {
                    inner.capture_side_table(node, &list);
                }
                list
            }
        };
        inner.path_index.save_nodes(&children);
        children
    }

    pub fn get_parent(&self, node: &Arc<Node>) -> Option<Arc<Node>> {
        node.parent()
    }

    /// The project-level roots: the root list itself, or every workspace
    /// root's children in a multi-folder workspace.
    pub async fn root_projects(&self) -> Vec<Arc<Node>> {
        let roots = self.get_children(None).await;
        if roots.iter().all(|node| node.kind() != NodeKind::Workspace) {
            return roots;
        }
        let mut projects = Vec::new();
        for workspace in &roots {
            projects.extend(self.get_children(Some(workspace)).await);
        }
        projects
    }

    /// Walk to the node a `(name, path)` step sequence leads to, starting
    /// from the project roots. The path index short-circuits the walk when
    /// the deepest segment is already materialized. `None` means the path
    /// no longer exists in the tree.
    pub async fn reveal_by_path(&self, steps: &[PathStep]) -> Option<Arc<Node>> {
        if let Some(path) = steps.last().and_then(|step| step.path.as_deref()) {
            if let Some(node) = self.inner.path_index.lookup(path) {
                return Some(node);
            }
        }
        let (first, rest) = steps.split_first()?;
        let projects = self.root_projects().await;
        let project = projects
            .into_iter()
            .find(|node| node.name() == first.name && node.path() == first.path.as_deref())?;
        let ctx = self.inner.load_context();
        project.reveal_paths(rest, &ctx).await
    }

    /// Request a refresh of `element` (or the whole tree when `None`),
    /// coalescing with any pending request: a broader pending refresh is
    /// never narrowed, a narrower one is absorbed, and disjoint requests
    /// release the queued notification before scheduling a new one.
    pub fn request_refresh(&self, immediate: bool, element: Option<&Arc<Node>>) {
        self.inner.request_refresh(immediate, element);
    }

    /// The user-facing refresh: drop the warm-start cache entirely, then
    /// refresh the whole tree immediately.
    pub fn force_refresh(&self) {
        let inner = &self.inner;
        inner.warm.store(false, Ordering::SeqCst);
        for folder in &inner.folders {
            snapshot::clear(&folder.path);
        }
        *inner.warm_roots.lock() = None;
        inner.request_refresh(true, None);
    }

    /// Refresh the deepest indexed node containing `path`, or the whole
    /// tree when nothing on the path is indexed. Watcher entry point.
    pub fn refresh_for_path(&self, path: &Path) {
        for candidate in path.ancestors() {
            if let Some(node) = self.inner.path_index.lookup(candidate) {
                self.inner.request_refresh(false, Some(&node));
                return;
            }
        }
        self.inner.request_refresh(false, None);
    }

    /// Rebuild the debounce window. Any request still queued is dropped.
    pub fn set_refresh_delay(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let mut trigger = self.inner.trigger.lock();
        trigger.cancel();
        *trigger = make_trigger(weak, delay);
    }

    pub fn refresh_delay(&self) -> Duration {
        self.inner.trigger.lock().delay()
    }

    /// Serialize the live tree back to the per-folder snapshot files:
    /// one file per folder holding that folder's own root subtree.
    ///
    /// Runs synchronously; call it once at teardown, there is no later
    /// opportunity to persist.
    pub fn persist(&self) -> Result<()> {
        let inner = &self.inner;
        let roots = inner
            .roots
            .lock()
            .clone()
            .or_else(|| inner.warm_roots.lock().clone());
        let Some(roots) = roots else {
            return Ok(());
        };
        let side_table = inner.side_table.lock().clone();

        if inner.folders.len() > 1 {
            for folder in &inner.folders {
                let uri = folder.uri();
                let Some(root) = roots.iter().find(|r| r.uri() == Some(uri.as_str())) else {
                    continue;
                };
                let data = snapshot_data(root, inner.mode);
                snapshot::save(
                    &folder.path,
                    inner.mode,
                    &SnapshotRoots::One(data),
                    &side_table,
                )?;
            }
        } else if let Some(folder) = inner.folders.first() {
            let list: Vec<NodeData> = roots
                .iter()
                .map(|root| snapshot_data(root, inner.mode))
                .collect();
            snapshot::save(
                &folder.path,
                inner.mode,
                &SnapshotRoots::Many(list),
                &side_table,
            )?;
        }
        Ok(())
    }
}

impl ProviderInner {
    fn load_context(&self) -> LoadContext<'_> {
        LoadContext {
            backend: self.backend.as_ref(),
            lock: &self.lock,
            hierarchical: self.mode == ViewMode::Hierarchical,
        }
    }

    /// Load (or reuse) the live root node list under the tree lock.
    ///
    /// On the first live load the snapshot-derived roots, if any, become
    /// the `previous` side of the reconciliation, so projects the service
    /// re-reports keep their already-expanded subtrees.
    async fn root_nodes(&self) -> Vec<Arc<Node>> {
        let _guard = self.lock.acquire().await;
        if let Some(roots) = self.roots.lock().clone() {
            return roots;
        }
        let previous = self
            .warm_roots
            .lock()
            .take()
            .map(|nodes| nodes.iter().map(|n| n.to_node_data()).collect());
        let fresh = self.fetch_roots().await;
        let merged = reconcile_children(previous, fresh, |uri| self.backend.resource_exists(uri));
        let Some(merged) = merged else {
            // nothing cached and the fetch failed; retry on next access
            return Vec::new();
        };
        let nodes: Vec<Arc<Node>> = merged.into_iter().map(Node::new_root).collect();
        *self.roots.lock() = Some(nodes.clone());
        nodes
    }

    async fn fetch_roots(&self) -> Option<Vec<NodeData>> {
        if self.folders.is_empty() {
            return Some(Vec::new());
        }
        if self.folders.len() > 1 {
            return Some(self.folders.iter().map(workspace_node_data).collect());
        }
        let folder = &self.folders[0];
        let query = ChildrenQuery::Uri(folder.uri());
        match self.backend.list_children(&query).await {
            Ok(projects) => Some(projects),
            Err(err) => {
                tracing::warn!(folder = %folder.name, %err, "project listing failed, serving cached roots");
                None
            }
        }
    }

    /// Re-attach a hierarchical package node's side-table children before a
    /// warm-start expansion, dropping entries whose resource is gone. The
    /// attach is a structural write, so it goes through the tree lock.
    async fn graft_side_table(&self, node: &Arc<Node>) {
        if !node.data().hierarchical {
            return;
        }
        let Some(uri) = node.uri() else {
            return;
        };
        let Some(record) = self.side_table.lock().get(uri).cloned() else {
            return;
        };
        let _guard = self.lock.acquire().await;
        if node.is_loaded() {
            return;
        }
        let existing: Vec<NodeData> = record
            .children
            .into_iter()
            .filter(|child| {
                child
                    .uri
                    .as_deref()
                    .is_some_and(|uri| self.backend.resource_exists(uri))
            })
            .collect();
        node.attach_child_data(existing);
    }

    /// Record a hierarchical package node's freshly loaded children in the
    /// side table; the snapshot embeds them there instead of in the subtree.
    fn capture_side_table(&self, node: &Arc<Node>, children: &[Arc<Node>]) {
        if !node.data().hierarchical {
            return;
        }
        let Some(uri) = node.uri() else {
            return;
        };
        let record = HierarchicalPackageNodeData {
            name: node.name().to_string(),
            uri: Some(uri.to_string()),
            children: children.iter().map(|child| child.to_node_data()).collect(),
        };
        self.side_table.lock().insert(uri.to_string(), record);
    }

    /// The readiness hand-off: stop serving the snapshot, drop the now
    /// stale files, and fire one immediate full refresh. The snapshot
    /// roots stay in memory for the first root reconciliation.
    fn end_warm_start(&self) {
        if !self.warm.swap(false, Ordering::SeqCst) {
            return;
        }
        for folder in &self.folders {
            snapshot::clear(&folder.path);
        }
        self.request_refresh(true, None);
    }

    fn request_refresh(&self, immediate: bool, element: Option<&Arc<Node>>) {
        let trigger = self.trigger.lock();
        let requested =
            element.map_or(RefreshTarget::Root, |node| RefreshTarget::Node(Arc::clone(node)));
        match (&requested, trigger.pending()) {
            // a whole-tree request, or a whole-tree refresh already queued
            (RefreshTarget::Root, _) | (_, Some(RefreshTarget::Root)) => {
                trigger.call(RefreshTarget::Root);
            }
            (_, None) => trigger.call(requested.clone()),
            (_, Some(queued)) => {
                if requested.covers(&queued) {
                    // widen the queued refresh to the covering element
                    trigger.call(requested.clone());
                } else if queued.covers(&requested) {
                    // already covered; re-arm without narrowing
                    trigger.call(queued);
                } else {
                    // disjoint subtrees: release the queued one, then queue ours
                    trigger.flush();
                    trigger.call(requested.clone());
                }
            }
        }
        if immediate {
            trigger.flush();
        }
    }

    fn do_refresh(&self, target: RefreshTarget) {
        tracing::debug!(target = %target, "firing tree refresh");
        if matches!(target, RefreshTarget::Root) {
            *self.roots.lock() = None;
        }
        self.path_index.invalidate(&target);
        self.events.emit(TreeEvent::Changed(target));
    }
}
