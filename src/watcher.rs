use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{new_debouncer, DebouncedEventKind};

use crate::provider::ExplorerTreeProvider;

/// Default patterns to drop when watching workspace folders.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    ".gradle",
    ".explorer-tree",
    "node_modules",
    "target",
    "build",
    "out",
];

/// Default debounce interval in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Default flood threshold (events per debounce window).
pub const DEFAULT_FLOOD_THRESHOLD: usize = 100;

/// Filesystem watcher that turns change events under the workspace folders
/// into scoped refresh requests on the provider.
///
/// Each surviving event refreshes the deepest materialized node containing
/// the changed path; the provider's scheduler coalesces the burst into one
/// notification. Floods collapse to a single whole-tree refresh.
pub struct ExplorerWatcher {
    /// Whether the watcher is currently forwarding events.
    active: Arc<AtomicBool>,
    /// Handle to the debouncer (dropped to stop watching).
    _debouncer: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl ExplorerWatcher {
    /// Watch every workspace folder of `provider` recursively.
    ///
    /// Raw events are batched by `debounce_duration`; paths with a component
    /// matching `ignore_patterns` are dropped. A batch larger than
    /// `flood_threshold` collapses into one whole-tree refresh instead of
    /// per-path requests.
    pub fn new(
        provider: ExplorerTreeProvider,
        debounce_duration: Duration,
        ignore_patterns: Vec<String>,
        flood_threshold: usize,
    ) -> notify::Result<Self> {
        let active = Arc::new(AtomicBool::new(true));
        let active_clone = active.clone();
        let scheduler = provider.clone();

        let mut debouncer = new_debouncer(
            debounce_duration,
            move |result: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                if !active_clone.load(Ordering::Relaxed) {
                    // paused: drop the batch
                    return;
                }

                match result {
                    Ok(events) => {
                        let paths: Vec<PathBuf> = events
                            .into_iter()
                            .filter(|e| e.kind == DebouncedEventKind::Any)
                            .map(|e| e.path)
                            .filter(|p| !should_ignore(p, &ignore_patterns))
                            .collect();

                        if paths.is_empty() {
                            return;
                        }

                        // flood protection: collapse to one whole-tree refresh
                        if paths.len() > flood_threshold {
                            scheduler.request_refresh(false, None);
                            return;
                        }
                        for path in paths {
                            scheduler.refresh_for_path(&path);
                        }
                    }
                    Err(err) => {
                        // non-fatal: the next event batch re-syncs the tree
                        tracing::warn!(%err, "filesystem watcher error");
                    }
                }
            },
        )?;

        for folder in provider.folders() {
            debouncer
                .watcher()
                .watch(&folder.path, notify::RecursiveMode::Recursive)?;
        }

        Ok(Self {
            active,
            _debouncer: debouncer,
        })
    }

    /// Stop forwarding events; the underlying watches stay registered so
    /// resuming is cheap.
    pub fn pause(&self) {
        self.active.store(false, Ordering::Relaxed);
    }

    /// Resume forwarding events.
    pub fn resume(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    /// Whether events are currently being forwarded.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }
}

/// Whether a changed path should be dropped: true when any of its components
/// equals one of the ignore patterns.
pub fn should_ignore(path: &Path, patterns: &[String]) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            patterns.iter().any(|pattern| name == *pattern)
        }
        _ => false,
    })
}
