//! Per-workspace-folder snapshot store.
//!
//! Snapshots are disposable warm-start caches: their absence or corruption
//! must never prevent normal operation, only forfeit the instant first
//! render. One file exists per folder and view mode, pretty-printed so the
//! cache stays diffable.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tree::hierarchical::HierarchicalPackageNodeData;
use crate::tree::node::NodeData;

/// Tool-reserved subdirectory of each workspace folder.
pub const SNAPSHOT_DIR: &str = ".explorer-tree";

const FLAT_FILE: &str = "nodes.json";
const HIERARCHICAL_FILE: &str = "nodes-hierarchical.json";

/// How packages are presented, which also selects the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Flat,
    Hierarchical,
}

/// Root payload of a snapshot file: one workspace node (multi-root
/// workspaces store one per folder) or the folder's project list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotRoots {
    One(NodeData),
    Many(Vec<NodeData>),
}

impl SnapshotRoots {
    pub fn into_vec(self) -> Vec<NodeData> {
        match self {
            SnapshotRoots::One(data) => vec![data],
            SnapshotRoots::Many(list) => list,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HierarchicalSnapshot {
    root: SnapshotRoots,
    #[serde(default)]
    hierarchical_packages: HashMap<String, HierarchicalPackageNodeData>,
}

/// Parsed snapshot contents for one folder.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPayload {
    pub roots: Vec<NodeData>,
    pub hierarchical_packages: HashMap<String, HierarchicalPackageNodeData>,
}

/// Snapshot file for a folder under the given view mode.
pub fn snapshot_file(folder: &Path, mode: ViewMode) -> PathBuf {
    let file = match mode {
        ViewMode::Flat => FLAT_FILE,
        ViewMode::Hierarchical => HIERARCHICAL_FILE,
    };
    folder.join(SNAPSHOT_DIR).join(file)
}

/// Read and parse a folder's snapshot.
///
/// A missing file, unreadable file or bad JSON all degrade to `None`; the
/// caller falls back to the backing service.
pub fn load(folder: &Path, mode: ViewMode) -> Option<SnapshotPayload> {
    let file = snapshot_file(folder, mode);
    let text = match fs::read_to_string(&file) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
        Err(err) => {
            tracing::warn!(file = %file.display(), %err, "snapshot unreadable, cold start");
            return None;
        }
    };
    let parsed = match mode {
        ViewMode::Flat => serde_json::from_str::<SnapshotRoots>(&text).map(|roots| {
            SnapshotPayload {
                roots: roots.into_vec(),
                hierarchical_packages: HashMap::new(),
            }
        }),
        ViewMode::Hierarchical => {
            serde_json::from_str::<HierarchicalSnapshot>(&text).map(|snapshot| SnapshotPayload {
                roots: snapshot.root.into_vec(),
                hierarchical_packages: snapshot.hierarchical_packages,
            })
        }
    };
    match parsed {
        Ok(payload) => Some(payload),
        Err(err) => {
            tracing::warn!(file = %file.display(), %err, "snapshot corrupt, cold start");
            None
        }
    }
}

/// Serialize a folder's root subtree (and, in hierarchical mode, the
/// package side table) to the mode-appropriate file, creating it if absent.
pub fn save(
    folder: &Path,
    mode: ViewMode,
    roots: &SnapshotRoots,
    hierarchical_packages: &HashMap<String, HierarchicalPackageNodeData>,
) -> Result<()> {
    let file = snapshot_file(folder, mode);
    if let Some(dir) = file.parent() {
        fs::create_dir_all(dir)?;
    }
    let text = match mode {
        ViewMode::Flat => serde_json::to_string_pretty(roots)?,
        ViewMode::Hierarchical => serde_json::to_string_pretty(&HierarchicalSnapshot {
            root: roots.clone(),
            hierarchical_packages: hierarchical_packages.clone(),
        })?,
    };
    fs::write(&file, text)?;
    Ok(())
}

/// Remove both mode files for a folder; missing files are fine.
pub fn clear(folder: &Path) {
    for mode in [ViewMode::Flat, ViewMode::Hierarchical] {
        let _ = fs::remove_file(snapshot_file(folder, mode));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::NodeKind;
    use tempfile::TempDir;

    fn project_with_packages() -> NodeData {
        let mut a = NodeData::new("a", NodeKind::Package);
        a.uri = Some("file:///p/a".into());
        let mut b = NodeData::new("b", NodeKind::Package);
        b.uri = Some("file:///p/b".into());
        let mut project = NodeData::new("p", NodeKind::Project);
        project.uri = Some("file:///p".into());
        project.children = Some(vec![a, b]);
        project
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(load(dir.path(), ViewMode::Flat).is_none());
    }

    #[test]
    fn load_corrupt_file_is_none() {
        let dir = TempDir::new().unwrap();
        let file = snapshot_file(dir.path(), ViewMode::Flat);
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "{ not json").unwrap();
        assert!(load(dir.path(), ViewMode::Flat).is_none());
    }

    #[test]
    fn flat_round_trip_many() {
        let dir = TempDir::new().unwrap();
        let roots = SnapshotRoots::Many(vec![project_with_packages()]);
        save(dir.path(), ViewMode::Flat, &roots, &HashMap::new()).unwrap();

        let payload = load(dir.path(), ViewMode::Flat).unwrap();
        assert_eq!(payload.roots, vec![project_with_packages()]);
        assert!(payload.hierarchical_packages.is_empty());
    }

    #[test]
    fn flat_round_trip_single_object() {
        let dir = TempDir::new().unwrap();
        let mut workspace = NodeData::new("ws", NodeKind::Workspace);
        workspace.uri = Some("file:///ws".into());
        workspace.children = Some(vec![project_with_packages()]);
        let roots = SnapshotRoots::One(workspace.clone());
        save(dir.path(), ViewMode::Flat, &roots, &HashMap::new()).unwrap();

        let payload = load(dir.path(), ViewMode::Flat).unwrap();
        assert_eq!(payload.roots, vec![workspace]);
    }

    #[test]
    fn hierarchical_round_trip_with_side_table() {
        let dir = TempDir::new().unwrap();
        let mut side = HashMap::new();
        side.insert(
            "file:///p/src/com".to_string(),
            HierarchicalPackageNodeData {
                name: "com".into(),
                uri: Some("file:///p/src/com".into()),
                children: vec![NodeData::new("com.example", NodeKind::Package)],
            },
        );
        let roots = SnapshotRoots::Many(vec![project_with_packages()]);
        save(dir.path(), ViewMode::Hierarchical, &roots, &side).unwrap();

        let payload = load(dir.path(), ViewMode::Hierarchical).unwrap();
        assert_eq!(payload.roots, vec![project_with_packages()]);
        assert_eq!(payload.hierarchical_packages, side);
    }

    #[test]
    fn modes_use_separate_files() {
        let dir = TempDir::new().unwrap();
        let roots = SnapshotRoots::Many(vec![project_with_packages()]);
        save(dir.path(), ViewMode::Flat, &roots, &HashMap::new()).unwrap();
        assert!(load(dir.path(), ViewMode::Hierarchical).is_none());
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let first = SnapshotRoots::Many(vec![project_with_packages()]);
        save(dir.path(), ViewMode::Flat, &first, &HashMap::new()).unwrap();

        let second = SnapshotRoots::Many(vec![NodeData::new("other", NodeKind::Project)]);
        save(dir.path(), ViewMode::Flat, &second, &HashMap::new()).unwrap();

        let payload = load(dir.path(), ViewMode::Flat).unwrap();
        assert_eq!(payload.roots[0].name, "other");
    }

    #[test]
    fn snapshot_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let roots = SnapshotRoots::Many(vec![project_with_packages()]);
        save(dir.path(), ViewMode::Flat, &roots, &HashMap::new()).unwrap();
        let text = fs::read_to_string(snapshot_file(dir.path(), ViewMode::Flat)).unwrap();
        assert!(text.contains('\n'));
        assert!(text.contains("  "));
    }

    #[test]
    fn clear_removes_both_mode_files() {
        let dir = TempDir::new().unwrap();
        let roots = SnapshotRoots::Many(vec![project_with_packages()]);
        save(dir.path(), ViewMode::Flat, &roots, &HashMap::new()).unwrap();
        save(dir.path(), ViewMode::Hierarchical, &roots, &HashMap::new()).unwrap();

        clear(dir.path());
        assert!(load(dir.path(), ViewMode::Flat).is_none());
        assert!(load(dir.path(), ViewMode::Hierarchical).is_none());
    }
}
