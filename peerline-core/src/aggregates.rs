//! Period aggregates - dashboard summary and savings distribution
//!
//! Global invariants enforced:
//! - Aggregates are strictly derived (never stored, always computed)
//! - Deterministic ordering
//! - Means skip absent values; nothing to average yields `None`

use crate::record::PerformanceRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headline KPIs for one period
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PeriodSummary {
    pub record_count: usize,
    pub with_savings: usize,
    pub with_losses: usize,
    pub total_population: u64,
    pub total_benchmark_expenditure: f64,
    pub total_expenditure: f64,
    pub total_savings_losses: f64,
    pub mean_savings_rate_pct: Option<f64>,
    pub mean_quality_score: Option<f64>,
}

fn mean<I: Iterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Summarize one period of records
pub fn summarize(records: &[PerformanceRecord]) -> PeriodSummary {
    let rates = || records.iter().filter_map(|r| r.savings_rate_pct);

    PeriodSummary {
        record_count: records.len(),
        with_savings: rates().filter(|rate| *rate > 0.0).count(),
        with_losses: rates().filter(|rate| *rate < 0.0).count(),
        total_population: records.iter().filter_map(|r| r.total_population).sum(),
        total_benchmark_expenditure: records.iter().filter_map(|r| r.benchmark_expenditure).sum(),
        total_expenditure: records.iter().filter_map(|r| r.total_expenditure).sum(),
        total_savings_losses: records.iter().filter_map(|r| r.savings_losses).sum(),
        mean_savings_rate_pct: mean(rates()),
        mean_quality_score: mean(records.iter().filter_map(|r| r.quality_score)),
    }
}

/// Savings-rate band; every band is the half-open interval `(min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SavingsBand {
    Above10,
    From5To10,
    From0To5,
    FromMinus5To0,
    BelowMinus5,
}

impl SavingsBand {
    /// Bands in display order, highest savings first
    pub const ALL: [SavingsBand; 5] = [
        SavingsBand::Above10,
        SavingsBand::From5To10,
        SavingsBand::From0To5,
        SavingsBand::FromMinus5To0,
        SavingsBand::BelowMinus5,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SavingsBand::Above10 => "> 10%",
            SavingsBand::From5To10 => "5% to 10%",
            SavingsBand::From0To5 => "0% to 5%",
            SavingsBand::FromMinus5To0 => "-5% to 0%",
            SavingsBand::BelowMinus5 => "< -5%",
        }
    }

    /// Key accepted by `FromStr`
    pub fn key(&self) -> &'static str {
        match self {
            SavingsBand::Above10 => "above-10",
            SavingsBand::From5To10 => "5-to-10",
            SavingsBand::From0To5 => "0-to-5",
            SavingsBand::FromMinus5To0 => "minus-5-to-0",
            SavingsBand::BelowMinus5 => "below-minus-5",
        }
    }

    fn bounds(&self) -> (f64, f64) {
        match self {
            SavingsBand::Above10 => (10.0, f64::INFINITY),
            SavingsBand::From5To10 => (5.0, 10.0),
            SavingsBand::From0To5 => (0.0, 5.0),
            SavingsBand::FromMinus5To0 => (-5.0, 0.0),
            SavingsBand::BelowMinus5 => (f64::NEG_INFINITY, -5.0),
        }
    }

    pub fn contains(&self, savings_rate_pct: f64) -> bool {
        let (min, max) = self.bounds();
        savings_rate_pct > min && savings_rate_pct <= max
    }

    pub fn classify(savings_rate_pct: f64) -> Option<SavingsBand> {
        SavingsBand::ALL.into_iter().find(|band| band.contains(savings_rate_pct))
    }
}

impl std::str::FromStr for SavingsBand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SavingsBand::ALL
            .into_iter()
            .find(|band| band.key().eq_ignore_ascii_case(s) || band.label() == s)
            .ok_or_else(|| {
                let keys: Vec<&str> = SavingsBand::ALL.iter().map(|b| b.key()).collect();
                anyhow::anyhow!("unknown savings band: {} (expected one of {})", s, keys.join(", "))
            })
    }
}

/// Track label used for records with no track
pub const UNKNOWN_TRACK: &str = "Unknown";

fn track_of(record: &PerformanceRecord) -> &str {
    if record.track.is_empty() {
        UNKNOWN_TRACK
    } else {
        &record.track
    }
}

/// Record counts per track and savings band
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct DistributionMatrix {
    pub tracks: Vec<String>,
    pub bands: Vec<SavingsBand>,
    /// `counts[t][b]` counts records of `tracks[t]` in `bands[b]`
    pub counts: Vec<Vec<usize>>,
}

impl DistributionMatrix {
    pub fn count(&self, track: &str, band: SavingsBand) -> usize {
        let t = self.tracks.iter().position(|t| t == track);
        let b = self.bands.iter().position(|b| *b == band);
        match (t, b) {
            (Some(t), Some(b)) => self.counts[t][b],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }
}

/// Count records by track and savings band
///
/// Records with no savings rate are not counted but still contribute their track.
pub fn distribution_matrix(records: &[PerformanceRecord]) -> DistributionMatrix {
    let mut by_track: BTreeMap<&str, Vec<usize>> = BTreeMap::new();

    for record in records {
        let row = by_track
            .entry(track_of(record))
            .or_insert_with(|| vec![0; SavingsBand::ALL.len()]);

        if let Some(band) = record.savings_rate_pct.and_then(SavingsBand::classify) {
            let idx = SavingsBand::ALL
                .iter()
                .position(|b| *b == band)
                .unwrap_or_default();
            row[idx] += 1;
        }
    }

    let (tracks, counts): (Vec<String>, Vec<Vec<usize>>) = by_track
        .into_iter()
        .map(|(track, row)| (track.to_string(), row))
        .unzip();

    DistributionMatrix {
        tracks,
        bands: SavingsBand::ALL.to_vec(),
        counts,
    }
}

/// Records of `track` whose savings rate falls in `band` (matrix drill-down)
pub fn records_in_cell<'a>(
    records: &'a [PerformanceRecord],
    track: &str,
    band: SavingsBand,
) -> Vec<&'a PerformanceRecord> {
    records
        .iter()
        .filter(|r| track_of(r) == track)
        .filter(|r| r.savings_rate_pct.is_some_and(|rate| band.contains(rate)))
        .collect()
}
