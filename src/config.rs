//! Engine configuration: TOML file loading and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. `$EXPLORER_TREE_CONFIG` environment variable (path to config file)
//! 2. Project-local `.explorer-tree.toml` in the current working directory
//! 3. Global `~/.config/explorer-tree/config.toml`
//! 4. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::snapshot::ViewMode;

// ── Section configs ──────────────────────────────────────────────────────────

/// Tree presentation settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ViewConfig {
    /// Present packages as a nested hierarchy instead of a flat list.
    pub hierarchical: Option<bool>,
}

/// Refresh scheduler settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RefreshConfig {
    /// Debounce delay for coalescing refresh requests, in milliseconds.
    pub delay_ms: Option<u64>,
}

/// Filesystem watcher settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct WatcherConfig {
    /// Enable the filesystem watcher for auto-refresh.
    pub enabled: Option<bool>,
    /// Debounce interval for raw filesystem events, in milliseconds.
    pub debounce_ms: Option<u64>,
    /// Path components whose events are dropped.
    pub ignore: Option<Vec<String>>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level engine configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ExplorerConfig {
    pub view: ViewConfig,
    pub refresh: RefreshConfig,
    pub watcher: WatcherConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default refresh coalescing delay in milliseconds.
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 2000;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. $EXPLORER_TREE_CONFIG environment variable
    if let Ok(env_path) = std::env::var("EXPLORER_TREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    // 2. Project-local `.explorer-tree.toml` in CWD
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".explorer-tree.toml"));
    }

    // 3. Global `~/.config/explorer-tree/config.toml`
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("explorer-tree").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<ExplorerConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match toml::from_str::<ExplorerConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            tracing::warn!(file = %path.display(), %err, "failed to parse config file");
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl ExplorerConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &ExplorerConfig) -> ExplorerConfig {
        ExplorerConfig {
            view: ViewConfig {
                hierarchical: other.view.hierarchical.or(self.view.hierarchical),
            },
            refresh: RefreshConfig {
                delay_ms: other.refresh.delay_ms.or(self.refresh.delay_ms),
            },
            watcher: WatcherConfig {
                enabled: other.watcher.enabled.or(self.watcher.enabled),
                debounce_ms: other.watcher.debounce_ms.or(self.watcher.debounce_ms),
                ignore: other.watcher.ignore.clone().or(self.watcher.ignore),
            },
        }
    }

    /// Load the final merged configuration from the candidate files.
    pub fn load() -> ExplorerConfig {
        let mut config = ExplorerConfig::default();
        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }
        config
    }

    /// Parse a specific config file, failing loudly on bad TOML.
    pub fn load_from(path: &Path) -> crate::error::Result<ExplorerConfig> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|err| crate::error::ExplorerError::Config(err.to_string()))
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// The configured view mode; flat unless hierarchical is requested.
    pub fn view_mode(&self) -> ViewMode {
        if self.view.hierarchical.unwrap_or(false) {
            ViewMode::Hierarchical
        } else {
            ViewMode::Flat
        }
    }

    /// Refresh coalescing delay.
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh.delay_ms.unwrap_or(DEFAULT_REFRESH_DELAY_MS))
    }

    /// Whether the filesystem watcher is enabled.
    pub fn watcher_enabled(&self) -> bool {
        self.watcher.enabled.unwrap_or(true)
    }

    /// Watcher debounce interval.
    pub fn watcher_debounce(&self) -> Duration {
        Duration::from_millis(
            self.watcher
                .debounce_ms
                .unwrap_or(crate::watcher::DEFAULT_DEBOUNCE_MS),
        )
    }

    /// Watcher ignore patterns.
    pub fn ignore_patterns(&self) -> Vec<String> {
        self.watcher.ignore.clone().unwrap_or_else(|| {
            crate::watcher::DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect()
        })
    }
}
