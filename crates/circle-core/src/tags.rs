use std::collections::HashMap;

use circle_domain::{LedgerEvent, YearMonth};
use serde::Serialize;

use crate::reconstruct::Timeline;

/// Bucket for debits that carry no tags.
pub const UNCATEGORIZED_TAG: &str = "uncategorized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagTotal {
    pub tag: String,
    pub total: i64,
    pub count: u64,
}

/// Sums debit magnitudes per tag, optionally within one month, and returns the `top`
/// largest totals. Equal totals keep the order in which their tags first appeared.
pub fn aggregate_tags(events: &[LedgerEvent], month: Option<YearMonth>, top: Option<usize>) -> Vec<TagTotal> {
    let mut totals: Vec<TagTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    let timeline = Timeline::new(events);
    for event in timeline.events() {
        let Some(debit) = event.as_debit() else {
            continue;
        };
        if month.is_some_and(|month| !month.contains(event.date())) {
            continue;
        }
        let uncategorized = [UNCATEGORIZED_TAG.to_string()];
        let tags: &[String] = if debit.tags.is_empty() {
            &uncategorized
        } else {
            &debit.tags
        };
        for tag in tags {
            let slot = *index.entry(tag.clone()).or_insert_with(|| {
                totals.push(TagTotal {
                    tag: tag.clone(),
                    total: 0,
                    count: 0,
                });
                totals.len() - 1
            });
            totals[slot].total = totals[slot].total.saturating_add(debit.amount);
            totals[slot].count += 1;
        }
    }

    totals.sort_by(|a, b| b.total.cmp(&a.total));
    if let Some(top) = top {
        totals.truncate(top);
    }
    totals
}
