use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tree::node::{NodeData, NodeKind};

/// Side-table record for a hierarchical package node, keyed by URI in the
/// snapshot. Its children are synthesized rather than fetched, so they are
/// cached here instead of being embedded in the node's own subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalPackageNodeData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub children: Vec<NodeData>,
}

/// Fold a flat `Package` listing into a nested hierarchy by splitting
/// dot-separated package names segment-wise. Non-package entries pass
/// through untouched and are appended after the folded packages.
///
/// Intermediate segments that the listing does not report as packages are
/// synthesized; when `base_uri` is known their URI is derived from the
/// segment path so existence pruning keeps working for them.
pub fn fold_packages(list: Vec<NodeData>, base_uri: Option<&str>) -> Vec<NodeData> {
    let mut trie = PackageTrie::default();
    let mut others = Vec::new();
    for entry in list {
        if entry.kind == NodeKind::Package {
            trie.insert(&entry.name.clone(), entry);
        } else {
            others.push(entry);
        }
    }
    let mut result = trie.into_nodes("", base_uri);
    result.extend(others);
    result
}

#[derive(Default)]
struct PackageTrie {
    children: BTreeMap<String, PackageTrie>,
    data: Option<NodeData>,
}

impl PackageTrie {
    fn insert(&mut self, full_name: &str, entry: NodeData) {
        let mut node = self;
        for segment in full_name.split('.') {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.data = Some(entry);
    }

    fn into_nodes(self, prefix: &str, base_uri: Option<&str>) -> Vec<NodeData> {
        self.children
            .into_iter()
            .map(|(segment, subtree)| {
                let PackageTrie { children, data } = subtree;
                let full_name = if prefix.is_empty() {
                    segment.clone()
                } else {
                    format!("{prefix}.{segment}")
                };
                let mut data = data.unwrap_or_else(|| {
                    let mut synthesized = NodeData::new(full_name.clone(), NodeKind::Package);
                    synthesized.uri = base_uri
                        .map(|base| format!("{}/{}", base, full_name.replace('.', "/")));
                    synthesized
                });
                data.display_name = Some(segment);
                data.hierarchical = true;
                let nested = PackageTrie {
                    children,
                    data: None,
                }
                .into_nodes(&full_name, base_uri);
                if !nested.is_empty() {
                    data.children = Some(nested);
                }
                data
            })
            .collect()
    }
}

/// Strip the synthesized children of hierarchical package nodes before a
/// subtree is embedded in a snapshot; the side table carries them instead.
pub fn prune_synthesized_children(data: &mut NodeData) {
    if data.hierarchical {
        data.children = None;
        return;
    }
    if let Some(children) = &mut data.children {
        for child in children {
            prune_synthesized_children(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(name: &str, uri: &str) -> NodeData {
        let mut data = NodeData::new(name, NodeKind::Package);
        data.uri = Some(uri.into());
        data
    }

    #[test]
    fn folds_dotted_names_into_nested_tree() {
        let list = vec![
            package("com.example.app", "file:///src/com/example/app"),
            package("com.example.util", "file:///src/com/example/util"),
        ];
        let folded = fold_packages(list, Some("file:///src"));
        assert_eq!(folded.len(), 1);

        let com = &folded[0];
        assert_eq!(com.name, "com");
        assert_eq!(com.display_name.as_deref(), Some("com"));
        assert!(com.hierarchical);
        // synthesized segment gets a derived uri
        assert_eq!(com.uri.as_deref(), Some("file:///src/com"));

        let example = &com.children.as_ref().unwrap()[0];
        assert_eq!(example.name, "com.example");
        let leaves: Vec<&str> = example
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(leaves, vec!["com.example.app", "com.example.util"]);
    }

    #[test]
    fn reported_packages_keep_their_own_uri() {
        let list = vec![
            package("com", "file:///src/com"),
            package("com.example", "file:///src/com/example"),
        ];
        let folded = fold_packages(list, Some("file:///src"));
        let com = &folded[0];
        assert_eq!(com.uri.as_deref(), Some("file:///src/com"));
        assert_eq!(com.display_name.as_deref(), Some("com"));
        let example = &com.children.as_ref().unwrap()[0];
        assert_eq!(example.uri.as_deref(), Some("file:///src/com/example"));
        assert_eq!(example.display_name.as_deref(), Some("example"));
    }

    #[test]
    fn non_package_entries_pass_through() {
        let mut folder = NodeData::new("resources", NodeKind::Folder);
        folder.uri = Some("file:///src/resources".into());
        let list = vec![package("com.example", "file:///src/com/example"), folder];
        let folded = fold_packages(list, Some("file:///src"));
        assert_eq!(folded.len(), 2);
        assert_eq!(folded[1].name, "resources");
        assert!(!folded[1].hierarchical);
    }

    #[test]
    fn leaf_packages_stay_unloaded() {
        let list = vec![package("com.example", "file:///src/com/example")];
        let folded = fold_packages(list, Some("file:///src"));
        let com = &folded[0];
        let example = &com.children.as_ref().unwrap()[0];
        // a leaf package still fetches its own contents later
        assert!(example.children.is_none());
    }

    #[test]
    fn prune_strips_hierarchical_subtrees_only() {
        let mut pkg = package("com", "file:///src/com");
        pkg.hierarchical = true;
        pkg.children = Some(vec![package("com.a", "file:///src/com/a")]);
        let mut plain = package("plain", "file:///src/plain");
        plain.children = Some(vec![pkg.clone()]);
        let mut root = NodeData::new("p", NodeKind::Project);
        root.children = Some(vec![pkg, plain]);

        prune_synthesized_children(&mut root);
        let children = root.children.as_ref().unwrap();
        assert!(children[0].children.is_none());
        // nested hierarchical nodes under plain containers are pruned too
        assert!(children[1].children.as_ref().unwrap()[0].children.is_none());
    }
}
