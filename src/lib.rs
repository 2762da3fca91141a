//! Cached, incrementally-refreshed project tree engine for
//! language-server-backed explorers.
//!
//! The engine renders a hierarchical view of build projects (workspace →
//! project → package root → package → type/file) sourced from a slow
//! backing service. A per-folder snapshot serves the previous tree
//! instantly while the service warms up; once ready, the stale snapshot is
//! reconciled against fresh data without losing the identity of expanded
//! subtrees, and bursty refresh requests are coalesced into single
//! notifications.

pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod path_index;
pub mod provider;
pub mod refresh;
pub mod snapshot;
pub mod tree;
pub mod watcher;

pub use backend::{ChildrenQuery, LanguageBackend};
pub use config::ExplorerConfig;
pub use error::{ExplorerError, Result};
pub use event::{RefreshTarget, TreeEvent};
pub use provider::{ExplorerTreeProvider, WorkspaceFolder};
pub use snapshot::ViewMode;
pub use tree::hierarchical::HierarchicalPackageNodeData;
pub use tree::lock::TreeLock;
pub use tree::node::{Node, NodeData, NodeKind, PathStep};
pub use watcher::ExplorerWatcher;
