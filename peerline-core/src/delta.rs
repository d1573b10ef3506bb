//! Year-over-year comparison
//!
//! Global invariants enforced:
//! - A change against an absent or zero baseline has no percentage and yields `None`
//! - Record deltas match by id only; a record with no prior-period match has no delta
//! - History is ordered oldest to newest

use crate::aggregates::PeriodSummary;
use crate::dataset::Dataset;
use crate::record::PerformanceRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Changes smaller than this are reported as neutral
pub const NEUTRAL_EPSILON: f64 = 0.01;

/// Change of one value between two periods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct YoyIndicator {
    pub value: f64,
    pub percentage: f64,
    /// Direction is good given whether higher values are better
    pub is_favorable: bool,
    pub is_neutral: bool,
}

/// Year-over-year change of `current` against `previous`
pub fn calculate_yoy(current: f64, previous: Option<f64>, higher_is_better: bool) -> Option<YoyIndicator> {
    let previous = previous.filter(|p| *p != 0.0)?;

    let value = current - previous;
    let percentage = value / previous * 100.0;
    let is_favorable = if higher_is_better { value > 0.0 } else { value < 0.0 };
    let is_neutral = value.abs() < NEUTRAL_EPSILON;

    Some(YoyIndicator {
        value,
        percentage,
        is_favorable,
        is_neutral,
    })
}

/// Per-record change against the same organization in the prior period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecordDelta {
    pub id: String,
    pub previous_savings_rate_pct: Option<f64>,
    pub previous_quality_score: Option<f64>,
    pub savings_rate_change: Option<f64>,
    pub quality_score_change: Option<f64>,
}

fn change(current: Option<f64>, previous: Option<f64>) -> Option<f64> {
    Some(current? - previous?)
}

/// Savings-rate and quality-score change for every record of `current`
///
/// Output order follows `current`.
pub fn record_deltas(
    current: &[PerformanceRecord],
    previous_period: &[PerformanceRecord],
) -> Vec<RecordDelta> {
    let previous_by_id: HashMap<&str, &PerformanceRecord> = previous_period
        .iter()
        .map(|r| (r.id.as_str(), r))
        .collect();

    current
        .iter()
        .map(|record| {
            let prev = previous_by_id.get(record.id.as_str()).copied();
            let previous_savings_rate_pct = prev.and_then(|p| p.savings_rate_pct);
            let previous_quality_score = prev.and_then(|p| p.quality_score);
            RecordDelta {
                id: record.id.clone(),
                previous_savings_rate_pct,
                previous_quality_score,
                savings_rate_change: change(record.savings_rate_pct, previous_savings_rate_pct),
                quality_score_change: change(record.quality_score, previous_quality_score),
            }
        })
        .collect()
}

/// KPI changes between two period summaries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SummaryDelta {
    pub record_count: Option<YoyIndicator>,
    pub total_population: Option<YoyIndicator>,
    pub mean_savings_rate_pct: Option<YoyIndicator>,
    pub total_savings_losses: Option<YoyIndicator>,
}

/// Compare a period summary with the prior one
pub fn summary_delta(current: &PeriodSummary, previous: &PeriodSummary) -> SummaryDelta {
    SummaryDelta {
        record_count: calculate_yoy(
            current.record_count as f64,
            Some(previous.record_count as f64),
            true,
        ),
        total_population: calculate_yoy(
            current.total_population as f64,
            Some(previous.total_population as f64),
            true,
        ),
        mean_savings_rate_pct: current
            .mean_savings_rate_pct
            .and_then(|c| calculate_yoy(c, previous.mean_savings_rate_pct, true)),
        total_savings_losses: calculate_yoy(
            current.total_savings_losses,
            Some(previous.total_savings_losses),
            true,
        ),
    }
}

/// Up to `depth` periods at or before `year` in which `id` appears, oldest first
pub fn history<'a>(
    dataset: &'a Dataset,
    id: &str,
    year: i32,
    depth: usize,
) -> Vec<(i32, &'a PerformanceRecord)> {
    let mut years: Vec<i32> = dataset.years().into_iter().filter(|y| *y <= year).collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.truncate(depth);
    years.reverse();

    years
        .into_iter()
        .filter_map(|y| dataset.find(y, id).map(|record| (y, record)))
        .collect()
}
