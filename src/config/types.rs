use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    /// Polling interval in seconds.
    pub update_interval: u64,
    pub repositories: Vec<RepoEntry>,
    pub auth: AuthConfig,
    pub dropdown: DropdownConfig,
    pub advanced: AdvancedConfig,
}

impl Default for VigilConfig {
    fn default() -> Self {
        Self {
            update_interval: 30,
            repositories: Vec::new(),
            auth: AuthConfig::default(),
            dropdown: DropdownConfig::default(),
            advanced: AdvancedConfig::default(),
        }
    }
}

impl VigilConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.update_interval)
    }

    /// Effective TTL for cached statuses. A cache outliving the polling
    /// interval would only ever serve stale cycles.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.advanced.cache_duration.min(self.update_interval))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.fetch_timeout)
    }

    pub fn local_guard(&self) -> Duration {
        Duration::from_millis(self.advanced.local_guard_ms)
    }
}

/// One monitored repository: its path plus display overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
}

impl RepoEntry {
    /// Display name: the override if set, else the directory name.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enable_fetch: bool,
    /// Hard bound on one remote round trip, in seconds.
    pub fetch_timeout: u64,
    pub use_gh_cli: bool,
    pub use_ssh_agent: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enable_fetch: true,
            fetch_timeout: 5,
            use_gh_cli: true,
            use_ssh_agent: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropdownConfig {
    pub max_items: usize,
    pub show_full_path: bool,
    pub sort_by: SortBy,
}

impl Default for DropdownConfig {
    fn default() -> Self {
        Self {
            max_items: 20,
            show_full_path: false,
            sort_by: SortBy::Alphabetical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Alphabetical,
    /// Most urgent display class first.
    Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedConfig {
    /// How long a probe result stays fresh, in seconds.
    pub cache_duration: u64,
    /// Upper bound on concurrent repository probes.
    pub parallel_checks: usize,
    /// Guard on the local (non-network) status step.
    pub local_guard_ms: u64,
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            cache_duration: 5,
            parallel_checks: 4,
            local_guard_ms: 2000,
        }
    }
}
