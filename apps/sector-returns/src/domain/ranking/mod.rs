//! Sector Ranking
//!
//! Groups validated return records by sector, computes each sector's mean
//! return, and produces the two ranked views served to readers.
//!
//! Both views are sorted descending. Ties keep first-seen order: items in
//! the order they were supplied, sectors in the order their first member
//! appeared.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;

use super::instrument::normalize_group;
use super::returns::ReturnRecord;
use super::window::DateWindow;

// =============================================================================
// Types
// =============================================================================

/// Mean return of one sector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    /// Sector label.
    pub group: String,
    /// Exact mean of member returns.
    pub average_decimal: Decimal,
    /// Display mean, narrowed from `average_decimal`.
    pub average_return: f64,
    /// Number of members (always at least one).
    pub member_count: usize,
}

/// One complete, immutable refresh result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    /// Per-instrument records, highest return first.
    pub items: Vec<ReturnRecord>,
    /// Per-sector summaries, highest mean first.
    pub categories: Vec<CategorySummary>,
    /// When the set was built.
    pub generated_at: DateTime<Utc>,
    /// Window the returns were measured over.
    pub window: DateWindow,
}

impl ResultSet {
    /// Number of instruments in the set.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of sectors in the set.
    #[must_use]
    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Look up a sector summary by label.
    #[must_use]
    pub fn category(&self, group: &str) -> Option<&CategorySummary> {
        self.categories.iter().find(|c| c.group == group)
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Build a ranked [`ResultSet`] from validated records.
#[must_use]
pub fn aggregate(
    records: Vec<ReturnRecord>,
    window: DateWindow,
    generated_at: DateTime<Utc>,
) -> ResultSet {
    let mut items: Vec<ReturnRecord> = records
        .into_iter()
        .map(|mut record| {
            record.group = normalize_group(Some(&record.group));
            record
        })
        .collect();

    let mut order: Vec<&str> = Vec::new();
    let mut members: HashMap<&str, Vec<&ReturnRecord>> = HashMap::new();
    for record in &items {
        let group = record.group.as_str();
        members
            .entry(group)
            .or_insert_with(|| {
                order.push(group);
                Vec::new()
            })
            .push(record);
    }

    let mut categories: Vec<CategorySummary> = order
        .iter()
        .filter_map(|group| {
            let group_members = members.get(group)?;
            let average_decimal = mean(group_members.iter().map(|r| r.return_decimal))?;
            Some(CategorySummary {
                group: (*group).to_string(),
                average_decimal,
                average_return: average_decimal.to_f64().unwrap_or_default(),
                member_count: group_members.len(),
            })
        })
        .collect();

    // sort_by is stable, which gives the first-seen tie-break.
    categories.sort_by(|a, b| b.average_decimal.cmp(&a.average_decimal));
    items.sort_by(|a, b| b.return_decimal.cmp(&a.return_decimal));

    ResultSet {
        items,
        categories,
        generated_at,
        window,
    }
}

/// Arithmetic mean in decimal. `None` for an empty input or on overflow.
fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    let mut count = 0u32;
    for value in values {
        sum = sum.checked_add(value)?;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    sum.checked_div(Decimal::from(count))
}
