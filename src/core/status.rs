use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observable condition on a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    Uncommitted,
    Untracked,
    Unpushed,
    UpstreamAvailable,
}

impl StatusFlag {
    pub fn label(&self) -> &'static str {
        match self {
            StatusFlag::Uncommitted => "uncommitted",
            StatusFlag::Untracked => "untracked",
            StatusFlag::Unpushed => "unpushed",
            StatusFlag::UpstreamAvailable => "upstream available",
        }
    }

    /// The display class this flag maps to on its own.
    pub fn class(&self) -> DisplayClass {
        match self {
            StatusFlag::Uncommitted => DisplayClass::Uncommitted,
            StatusFlag::Untracked => DisplayClass::Untracked,
            StatusFlag::Unpushed => DisplayClass::Unpushed,
            StatusFlag::UpstreamAvailable => DisplayClass::Upstream,
        }
    }
}

/// Why a repository could not be probed. Repository-scoped; never aborts
/// the surrounding cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeError {
    InvalidPath,
    NotARepository,
    ProbeTimeout,
    FetchTimedOut,
    AuthUnavailable,
}

impl ProbeError {
    pub fn label(&self) -> &'static str {
        match self {
            ProbeError::InvalidPath => "path does not exist",
            ProbeError::NotARepository => "not a git repository",
            ProbeError::ProbeTimeout => "status check timed out",
            ProbeError::FetchTimedOut => "fetch timed out",
            ProbeError::AuthUnavailable => "no authentication available",
        }
    }
}

/// File/commit counts behind the flags, for tooltip and dropdown details.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub modified: u32,
    pub untracked: u32,
    pub unpushed: u32,
    pub behind_upstream: u32,
}

/// Snapshot of one repository's observed state. Produced fresh by each
/// probe and replaced, never mutated, on the next cycle.
///
/// Invariant: `error` set implies `flags` empty; detection short-circuits
/// on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoStatus {
    pub path: PathBuf,
    pub name: String,
    pub flags: BTreeSet<StatusFlag>,
    pub counts: StatusCounts,
    pub error: Option<ProbeError>,
    pub checked_at: DateTime<Utc>,
}

impl RepoStatus {
    /// A status with no flags and no error.
    pub fn clean(path: &Path, name: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            flags: BTreeSet::new(),
            counts: StatusCounts::default(),
            error: None,
            checked_at: Utc::now(),
        }
    }

    /// A status that failed to probe. Flags stay empty.
    pub fn failed(path: &Path, name: &str, error: ProbeError) -> Self {
        Self {
            error: Some(error),
            ..Self::clean(path, name)
        }
    }

    pub fn needs_attention(&self) -> bool {
        self.error.is_some() || !self.flags.is_empty()
    }

    /// The highest-priority class present on this repository.
    pub fn display_class(&self) -> DisplayClass {
        if self.error.is_some() {
            return DisplayClass::Error;
        }
        self.flags
            .iter()
            .map(StatusFlag::class)
            .min()
            .unwrap_or(DisplayClass::Clean)
    }

    /// Every distinct non-clean class present on this repository.
    pub fn classes(&self) -> BTreeSet<DisplayClass> {
        let mut out = BTreeSet::new();
        if self.error.is_some() {
            out.insert(DisplayClass::Error);
        }
        out.extend(self.flags.iter().map(StatusFlag::class));
        out
    }

    /// Human detail string for tooltip and dropdown lines, e.g.
    /// `2 modified, 1 untracked` or the error label.
    pub fn describe(&self) -> String {
        if let Some(err) = self.error {
            return err.label().to_string();
        }
        let mut parts = Vec::new();
        if self.flags.contains(&StatusFlag::Uncommitted) {
            parts.push(format!("{} modified", self.counts.modified));
        }
        if self.flags.contains(&StatusFlag::Untracked) {
            parts.push(format!("{} untracked", self.counts.untracked));
        }
        if self.flags.contains(&StatusFlag::Unpushed) {
            parts.push(format!("{} unpushed", self.counts.unpushed));
        }
        if self.flags.contains(&StatusFlag::UpstreamAvailable) {
            parts.push(format!("{} behind", self.counts.behind_upstream));
        }
        if parts.is_empty() {
            "clean".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Display-level classification. Declaration order is priority order,
/// highest first, so `min()` over a set picks the dominant class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayClass {
    Error,
    Uncommitted,
    Unpushed,
    Untracked,
    Upstream,
    Multiple,
    Clean,
}

impl DisplayClass {
    /// Stable class string consumed by the status-bar styling.
    pub fn as_class_str(&self) -> &'static str {
        match self {
            DisplayClass::Clean => "clean",
            DisplayClass::Uncommitted => "uncommitted",
            DisplayClass::Untracked => "untracked",
            DisplayClass::Unpushed => "unpushed",
            DisplayClass::Upstream => "upstream",
            DisplayClass::Multiple => "multiple",
            DisplayClass::Error => "error",
        }
    }

    /// Text glyph shown in the bar and in per-repo lines.
    pub fn glyph(&self) -> &'static str {
        match self {
            DisplayClass::Clean => "✓",
            DisplayClass::Uncommitted => "●",
            DisplayClass::Untracked => "◉",
            DisplayClass::Unpushed => "↑",
            DisplayClass::Upstream => "↓",
            DisplayClass::Multiple => "⚠",
            DisplayClass::Error => "✗",
        }
    }
}

/// The reduction of every monitored repository into one display state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatus {
    pub class: DisplayClass,
    pub count_needing_attention: usize,
    pub tooltip: Vec<String>,
}
