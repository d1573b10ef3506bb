//! Comparison statistics of a focal record against its peer group
//!
//! Global invariants enforced:
//! - All statistics of one metric come from a single sorted snapshot of peer values
//! - An absent focal value or an empty peer list yields `None`, never NaN or zero
//! - The median is the upper median: index `floor(n / 2)` of the ascending values

use crate::filter::{self, PeerFilter};
use crate::record::{MetricKey, PerformanceRecord};
use crate::risk;
use serde::{Deserialize, Serialize};

/// Focal value relative to a peer group, for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonMetric {
    pub focus_value: f64,
    pub group_mean: f64,
    pub group_median: f64,
    pub percentile_rank: f64,
    pub peer_count: usize,
}

/// Comparison of one named metric; `stats` is `None` when unavailable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricComparison {
    pub metric: MetricKey,
    pub label: String,
    pub adjusted: bool,
    pub stats: Option<ComparisonMetric>,
}

/// Compare a focal value against peer values
pub fn compare_values(focus_value: f64, peer_values: Vec<f64>) -> Option<ComparisonMetric> {
    let mut values = peer_values;
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let n = values.len();
    let group_mean = values.iter().sum::<f64>() / n as f64;
    let group_median = values[n / 2];
    let at_or_below = values.iter().filter(|v| **v <= focus_value).count();
    let percentile_rank = at_or_below as f64 / n as f64 * 100.0;

    Some(ComparisonMetric {
        focus_value,
        group_mean,
        group_median,
        percentile_rank,
        peer_count: n,
    })
}

/// Compare a focal record against an already-filtered peer group
pub fn compare_against_group<F>(
    focal: &PerformanceRecord,
    peers: &[&PerformanceRecord],
    accessor: F,
) -> Option<ComparisonMetric>
where
    F: Fn(&PerformanceRecord) -> Option<f64>,
{
    let focus_value = accessor(focal)?;
    let peer_values: Vec<f64> = peers.iter().filter_map(|peer| accessor(peer)).collect();
    compare_values(focus_value, peer_values)
}

/// Filter the peers of `focal_id` and compare it on one metric
pub fn compute_comparison_stats<F>(
    records: &[PerformanceRecord],
    focal_id: &str,
    filter: &PeerFilter,
    accessor: F,
) -> Option<ComparisonMetric>
where
    F: Fn(&PerformanceRecord) -> Option<f64>,
{
    let focal = records.iter().find(|r| r.id == focal_id)?;
    let peers = filter::comparison_group(records, focal_id, filter);
    compare_against_group(focal, &peers, accessor)
}

/// Compare a focal record on several named metrics, optionally risk-adjusted
///
/// Each metric goes through [`risk::get_display_value`], so metrics outside the
/// adjustment allow-list are compared unadjusted even when `risk_adjusted` is set.
pub fn compare_metrics(
    focal: &PerformanceRecord,
    peers: &[&PerformanceRecord],
    metrics: &[MetricKey],
    risk_adjusted: bool,
) -> Vec<MetricComparison> {
    metrics
        .iter()
        .map(|&metric| {
            let stats = compare_against_group(focal, peers, |r| {
                risk::get_display_value(r, metric, risk_adjusted)
            });
            MetricComparison {
                metric,
                label: metric.label().to_string(),
                adjusted: risk_adjusted && metric.is_adjustable(),
                stats,
            }
        })
        .collect()
}
