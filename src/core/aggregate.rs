use std::collections::BTreeSet;

use super::status::{AggregateStatus, DisplayClass, RepoStatus};

/// Collapse every monitored repository into one display state.
///
/// Deterministic: the input is sorted by path before the rule applies, so
/// the result depends only on the multiset of statuses, not on probe
/// completion order.
pub fn aggregate(statuses: &[RepoStatus]) -> AggregateStatus {
    let mut sorted: Vec<&RepoStatus> = statuses.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let mut classes = BTreeSet::new();
    for status in &sorted {
        classes.extend(status.classes());
    }

    // Two or more distinct non-clean classes, whether across repos or
    // stacked on a single one, collapse to Multiple.
    let class = match classes.len() {
        0 => DisplayClass::Clean,
        1 => *classes.iter().next().expect("non-empty set"),
        _ => DisplayClass::Multiple,
    };

    let tooltip = sorted
        .iter()
        .filter(|status| status.needs_attention())
        .map(|status| {
            format!(
                "{} {}: {}",
                status.display_class().glyph(),
                status.name,
                status.describe()
            )
        })
        .collect::<Vec<_>>();

    AggregateStatus {
        class,
        count_needing_attention: sorted
            .iter()
            .filter(|status| status.needs_attention())
            .count(),
        tooltip,
    }
}
