//! Ranking and search over one period's records
//!
//! Global invariants enforced:
//! - Absent values sort last in both directions
//! - Ties are broken by id so output order is deterministic

use crate::record::{MetricKey, PerformanceRecord};
use crate::risk;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Column to sort rankings by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Metric(MetricKey),
}

impl std::str::FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("name") || s.eq_ignore_ascii_case("ACO_NAME") {
            return Ok(SortKey::Name);
        }
        s.parse::<MetricKey>().map(SortKey::Metric)
    }
}

/// Options for [`sort_records`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOptions {
    pub key: SortKey,
    pub direction: SortDirection,
    /// Sort metric columns by their risk-adjusted display value
    pub risk_adjusted: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        SortOptions {
            key: SortKey::Metric(MetricKey::SavingsRatePct),
            direction: SortDirection::Descending,
            risk_adjusted: false,
        }
    }
}

fn compare_optional(a: Option<f64>, b: Option<f64>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Ascending => a.total_cmp(&b),
            SortDirection::Descending => b.total_cmp(&a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort records by a column
pub fn sort_records<'a>(
    records: &'a [PerformanceRecord],
    options: SortOptions,
) -> Vec<&'a PerformanceRecord> {
    let mut sorted: Vec<&PerformanceRecord> = records.iter().collect();

    sorted.sort_by(|a, b| {
        let primary = match options.key {
            SortKey::Name => {
                let by_name = a.name.to_lowercase().cmp(&b.name.to_lowercase());
                match options.direction {
                    SortDirection::Ascending => by_name,
                    SortDirection::Descending => by_name.reverse(),
                }
            }
            SortKey::Metric(metric) => compare_optional(
                risk::get_display_value(a, metric, options.risk_adjusted),
                risk::get_display_value(b, metric, options.risk_adjusted),
                options.direction,
            ),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });

    sorted
}

/// Case-insensitive substring search over name and id, sorted by name
pub fn search_records<'a>(records: &'a [PerformanceRecord], term: &str) -> Vec<&'a PerformanceRecord> {
    let needle = term.to_lowercase();
    let mut matches: Vec<&PerformanceRecord> = records
        .iter()
        .filter(|r| {
            needle.is_empty()
                || r.name.to_lowercase().contains(&needle)
                || r.id.to_lowercase().contains(&needle)
        })
        .collect();

    matches.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
    matches
}
