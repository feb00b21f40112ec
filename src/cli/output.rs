use serde::Serialize;

use vigil::config::types::{DropdownConfig, SortBy};
use vigil::core::status::{AggregateStatus, DisplayClass, RepoStatus};

/// Tooltip shows at most this many repository lines.
const TOOLTIP_LIMIT: usize = 10;

/// One structured result per cycle, consumed by the status bar.
#[derive(Debug, Clone, Serialize)]
pub struct BarOutput {
    pub text: String,
    pub class: String,
    pub tooltip: String,
}

pub fn render_bar(aggregated: &AggregateStatus, total: usize) -> BarOutput {
    // Empty text when clean so the widget disappears.
    let text = match aggregated.class {
        DisplayClass::Clean => String::new(),
        class => class.glyph().to_string(),
    };

    let tooltip = if total == 0 {
        "No repositories configured".to_string()
    } else if aggregated.count_needing_attention == 0 {
        format!("All {total} repositories clean")
    } else {
        let mut lines = vec![format!(
            "{} of {} repositories need attention:",
            aggregated.count_needing_attention, total
        )];
        for line in aggregated.tooltip.iter().take(TOOLTIP_LIMIT) {
            lines.push(format!("  {line}"));
        }
        let hidden = aggregated.tooltip.len().saturating_sub(TOOLTIP_LIMIT);
        if hidden > 0 {
            lines.push(format!("  … and {hidden} more"));
        }
        lines.join("\n")
    };

    BarOutput {
        text,
        class: aggregated.class.as_class_str().to_string(),
        tooltip,
    }
}

/// The single top-level error state, e.g. an unreadable config.
pub fn error_bar(message: &str) -> BarOutput {
    BarOutput {
        text: DisplayClass::Error.glyph().to_string(),
        class: DisplayClass::Error.as_class_str().to_string(),
        tooltip: message.to_string(),
    }
}

/// Per-repository dropdown lines: `glyph name (details) | path`.
pub fn render_dropdown(statuses: &[RepoStatus], config: &DropdownConfig) -> Vec<String> {
    if statuses.is_empty() {
        return vec!["No repositories configured".to_string()];
    }

    let mut ordered: Vec<&RepoStatus> = statuses.iter().collect();
    match config.sort_by {
        SortBy::Alphabetical => ordered.sort_by(|a, b| a.path.cmp(&b.path)),
        SortBy::Status => ordered.sort_by_key(|status| status.display_class()),
    }
    if config.max_items > 0 {
        ordered.truncate(config.max_items);
    }

    ordered
        .iter()
        .map(|status| {
            let label = if config.show_full_path {
                status.path.display().to_string()
            } else {
                status.name.clone()
            };
            let detail = if status.needs_attention() {
                format!(" ({})", status.describe())
            } else {
                String::new()
            };
            format!(
                "{} {label}{detail} | {}",
                status.display_class().glyph(),
                status.path.display()
            )
        })
        .collect()
}
