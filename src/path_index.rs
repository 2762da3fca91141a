use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::event::RefreshTarget;
use crate::tree::node::Node;

/// Advisory path → node cache.
///
/// Populated as a side effect of every tree read and invalidated by subtree
/// when a refresh fires. Entries hold weak references, so a rebuilt subtree
/// can never be resurrected through the index; a miss only means the caller
/// walks down from the roots instead.
#[derive(Debug, Default)]
pub struct PathIndex {
    map: Mutex<HashMap<PathBuf, Weak<Node>>>,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every node of a batch that carries a filesystem path.
    pub fn save_nodes(&self, nodes: &[Arc<Node>]) {
        if nodes.is_empty() {
            return;
        }
        let mut map = self.map.lock();
        for node in nodes {
            if let Some(path) = node.path() {
                map.insert(path.to_path_buf(), Arc::downgrade(node));
            }
        }
    }

    /// The most recently materialized node at `path`, if still alive.
    pub fn lookup(&self, path: &Path) -> Option<Arc<Node>> {
        let mut map = self.map.lock();
        match map.get(path) {
            Some(weak) => match weak.upgrade() {
                Some(node) => Some(node),
                None => {
                    map.remove(path);
                    None
                }
            },
            None => None,
        }
    }

    /// Drop the entries under a refresh target.
    pub fn invalidate(&self, target: &RefreshTarget) {
        let mut map = self.map.lock();
        match target {
            RefreshTarget::Root => map.clear(),
            RefreshTarget::Node(node) => {
                map.retain(|_, weak| match weak.upgrade() {
                    Some(entry) => !node.is_itself_or_ancestor_of(&entry),
                    None => false,
                });
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::{NodeData, NodeKind};

    fn sample_tree() -> (Arc<Node>, Arc<Node>, Arc<Node>) {
        let mut inner = NodeData::new("Main.java", NodeKind::File);
        inner.path = Some("/p/src/a/Main.java".into());
        let mut pkg = NodeData::new("a", NodeKind::Package);
        pkg.path = Some("/p/src/a".into());
        pkg.children = Some(vec![inner]);
        let mut root = NodeData::new("p", NodeKind::Project);
        root.path = Some("/p".into());
        root.children = Some(vec![pkg]);

        let root = Node::new_root(root);
        let pkg = root.child_nodes()[0].clone();
        let file = pkg.child_nodes()[0].clone();
        (root, pkg, file)
    }

    #[test]
    fn lookup_returns_saved_node() {
        let (root, pkg, _) = sample_tree();
        let index = PathIndex::new();
        index.save_nodes(&[Arc::clone(&root), Arc::clone(&pkg)]);

        let found = index.lookup(Path::new("/p/src/a")).unwrap();
        assert!(Arc::ptr_eq(&found, &pkg));
    }

    #[test]
    fn lookup_miss_is_none() {
        let index = PathIndex::new();
        assert!(index.lookup(Path::new("/nowhere")).is_none());
    }

    #[test]
    fn nodes_without_path_are_not_indexed() {
        let node = Node::new_root(NodeData::new("anon", NodeKind::Container));
        let index = PathIndex::new();
        index.save_nodes(&[node]);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn dropped_nodes_evaporate() {
        let index = PathIndex::new();
        {
            let (root, _, _) = sample_tree();
            index.save_nodes(&[root]);
        }
        assert!(index.lookup(Path::new("/p")).is_none());
        // the dead entry was removed on lookup
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn invalidate_root_clears_everything() {
        let (root, pkg, file) = sample_tree();
        let index = PathIndex::new();
        index.save_nodes(&[root, pkg, file]);
        index.invalidate(&RefreshTarget::Root);
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn invalidate_node_drops_its_subtree_only() {
        let (root, pkg, file) = sample_tree();
        let index = PathIndex::new();
        index.save_nodes(&[Arc::clone(&root), Arc::clone(&pkg), Arc::clone(&file)]);

        index.invalidate(&RefreshTarget::Node(Arc::clone(&pkg)));
        assert!(index.lookup(Path::new("/p")).is_some());
        assert!(index.lookup(Path::new("/p/src/a")).is_none());
        assert!(index.lookup(Path::new("/p/src/a/Main.java")).is_none());
    }
}
