//! Peerline core library - peer comparison and risk adjustment for ACO performance data

// Global invariants enforced in this crate:
// - Computations are pure functions over in-memory slices; inputs are never mutated
// - No global mutable state
// - No randomness, clocks, threads, or async
// - Absent data is `None`, never coerced to zero or NaN
// - Identical input yields byte-for-byte identical output

pub mod aggregates;
pub mod config;
pub mod dataset;
pub mod delta;
pub mod filter;
pub mod ranking;
pub mod record;
pub mod report;
pub mod risk;
pub mod stats;

pub use config::ResolvedConfig;
pub use dataset::{load_dataset, Dataset};
pub use filter::{comparison_group, FacilityKind, PeerFilter, TenureIndex};
pub use record::{MetricKey, PerformanceCategory, PerformanceRecord};
pub use report::{
    CellReport, ComparisonReport, DistributionReport, RankingReport, RankingRow, RiskRow,
    SummaryReport,
};
pub use risk::{
    apply_risk_adjustment, calculate_composite_risk_score, get_display_value,
    is_adjustable_metric,
};
pub use stats::{compute_comparison_stats, ComparisonMetric, MetricComparison};

use anyhow::{Context, Result};
use ranking::SortOptions;
use std::collections::{HashMap, HashSet};

/// Inputs of a single peer comparison
#[derive(Debug, Clone)]
pub struct CompareOptions {
    pub focal_id: String,
    /// Performance year (None: latest loaded)
    pub year: Option<i32>,
    pub filter: PeerFilter,
    pub metrics: Vec<MetricKey>,
    pub risk_adjusted: bool,
    /// Periods of focal history to attach (0: none)
    pub history_years: usize,
}

impl CompareOptions {
    /// Options for `focal_id` taking filter and view settings from config
    pub fn from_config(focal_id: impl Into<String>, config: &ResolvedConfig) -> Self {
        CompareOptions {
            focal_id: focal_id.into(),
            year: None,
            filter: config.filter.clone(),
            metrics: config.metrics.clone(),
            risk_adjusted: config.risk_adjusted,
            history_years: config.history_years,
        }
    }
}

/// Compare one record against its filtered peer group
///
/// Tenure filters use first/last appearance across every loaded period.
pub fn compare(dataset: &Dataset, options: &CompareOptions) -> Result<ComparisonReport> {
    options.filter.validate().context("invalid peer filter")?;
    let (year, records) = dataset.resolve_period(options.year)?;

    let Some(focal) = records.iter().find(|r| r.id == options.focal_id) else {
        anyhow::bail!(
            "no record with id {} in performance year {}",
            options.focal_id,
            year.map(|y| y.to_string())
                .unwrap_or_else(|| "(undated)".to_string())
        );
    };

    let tenure = dataset.tenure_index();
    let peers =
        filter::comparison_group_with_tenure(records, &options.focal_id, &options.filter, &tenure);
    let comparisons =
        stats::compare_metrics(focal, &peers, &options.metrics, options.risk_adjusted);

    let history = match year {
        Some(year) if options.history_years > 0 => {
            delta::history(dataset, &options.focal_id, year, options.history_years)
                .into_iter()
                .map(|(year, record)| report::HistoryPoint {
                    year,
                    savings_rate_pct: record.savings_rate_pct,
                    quality_score: record.quality_score,
                    composite_risk_score: record.composite_risk_score,
                })
                .collect()
        }
        _ => Vec::new(),
    };

    tracing::debug!(
        focal_id = %options.focal_id,
        year = ?year,
        peers = peers.len(),
        unrestricted = options.filter.is_unrestricted(),
        metrics = comparisons.len(),
        "comparison complete"
    );

    Ok(ComparisonReport {
        focal_id: focal.id.clone(),
        focal_name: focal.name.clone(),
        year,
        risk_adjusted: options.risk_adjusted,
        composite_risk_score: focal.composite_risk_score,
        peer_count: peers.len(),
        filter: options.filter.clone(),
        comparisons,
        history,
    })
}

/// Composite risk score and coverage for every record of a period, by id
pub fn risk_table(dataset: &Dataset, year: Option<i32>) -> Result<Vec<RiskRow>> {
    let (_, records) = dataset.resolve_period(year)?;

    let mut rows: Vec<RiskRow> = records
        .iter()
        .map(|record| RiskRow {
            id: record.id.clone(),
            name: record.name.clone(),
            composite_risk_score: record.composite_risk_score,
            coverage: risk::composite_risk_coverage(record).map(|c| c.coverage),
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));

    let missing = records
        .iter()
        .filter(|r| risk::has_missing_risk_score(r))
        .count();
    if missing > 0 {
        tracing::info!(missing, total = records.len(), "records without a composite risk score");
    }

    Ok(rows)
}

/// Inputs of the rankings view
#[derive(Debug, Clone, Default)]
pub struct RankingOptions {
    pub year: Option<i32>,
    pub sort: SortOptions,
    /// Keep only records whose name or id contains this term
    pub search: Option<String>,
    pub top: Option<usize>,
}

/// Sorted rankings of one period with year-over-year changes
///
/// Ranks are positions in the full sorted period, so a search keeps each
/// record's rank.
pub fn rankings(dataset: &Dataset, options: &RankingOptions) -> Result<RankingReport> {
    let (year, records) = dataset.resolve_period(options.year)?;
    let previous_year = year.and_then(|y| dataset.previous_year(y));
    let previous = previous_year.map(|y| dataset.period(y)).unwrap_or(&[]);

    let deltas: HashMap<String, delta::RecordDelta> = delta::record_deltas(records, previous)
        .into_iter()
        .map(|d| (d.id.clone(), d))
        .collect();

    let matched: Option<HashSet<&str>> = options.search.as_deref().map(|term| {
        ranking::search_records(records, term)
            .into_iter()
            .map(|r| r.id.as_str())
            .collect()
    });

    let sort_metric = match options.sort.key {
        ranking::SortKey::Name => None,
        ranking::SortKey::Metric(metric) => Some(metric),
    };

    let ranked: Vec<RankingRow> = ranking::sort_records(records, options.sort)
        .into_iter()
        .enumerate()
        .filter(|(_, r)| matched.as_ref().map_or(true, |ids| ids.contains(r.id.as_str())))
        .map(|(i, r)| {
            let d = deltas.get(&r.id);
            RankingRow {
                rank: i + 1,
                id: r.id.clone(),
                name: r.name.clone(),
                track: r.track.clone(),
                region: r.region.clone(),
                category: r.category(),
                sort_value: sort_metric
                    .and_then(|m| risk::get_display_value(r, m, options.sort.risk_adjusted)),
                savings_rate_pct: r.savings_rate_pct,
                quality_score: r.quality_score,
                savings_rate_change: d.and_then(|d| d.savings_rate_change),
                quality_score_change: d.and_then(|d| d.quality_score_change),
            }
        })
        .collect();

    let total_matches = ranked.len();
    let rows = match options.top {
        Some(n) => ranked.into_iter().take(n).collect(),
        None => ranked,
    };

    Ok(RankingReport {
        year,
        previous_year,
        sort_metric,
        risk_adjusted: options.sort.risk_adjusted,
        total_matches,
        rows,
    })
}

/// Savings distribution by track for one period
pub fn distribution(dataset: &Dataset, year: Option<i32>) -> Result<DistributionReport> {
    let (year, records) = dataset.resolve_period(year)?;
    Ok(DistributionReport {
        year,
        matrix: aggregates::distribution_matrix(records),
    })
}

/// Organizations of one period counted in the `track` row and `band` column
pub fn distribution_cell(
    dataset: &Dataset,
    year: Option<i32>,
    track: &str,
    band: aggregates::SavingsBand,
) -> Result<CellReport> {
    let (year, records) = dataset.resolve_period(year)?;

    let mut rows: Vec<report::CellRow> = aggregates::records_in_cell(records, track, band)
        .into_iter()
        .map(|r| report::CellRow {
            id: r.id.clone(),
            name: r.name.clone(),
            savings_rate_pct: r.savings_rate_pct,
        })
        .collect();
    rows.sort_by(|a, b| a.id.cmp(&b.id));

    Ok(CellReport {
        year,
        track: track.to_string(),
        band,
        rows,
    })
}

/// Period KPIs with the change against the prior loaded period
pub fn summary(dataset: &Dataset, year: Option<i32>) -> Result<SummaryReport> {
    let (year, records) = dataset.resolve_period(year)?;
    let current = aggregates::summarize(records);

    let previous_year = year.and_then(|y| dataset.previous_year(y));
    let delta = previous_year.map(|y| {
        let previous = aggregates::summarize(dataset.period(y));
        delta::summary_delta(&current, &previous)
    });

    Ok(SummaryReport {
        year,
        previous_year,
        summary: current,
        delta,
    })
}
