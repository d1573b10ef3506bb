//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs
//! - Unavailable values render as `N/A` in text and `null` in JSON

use crate::aggregates::{DistributionMatrix, PeriodSummary, SavingsBand};
use crate::delta::{SummaryDelta, YoyIndicator};
use crate::filter::PeerFilter;
use crate::record::{MetricKey, PerformanceCategory};
use crate::risk;
use crate::stats::MetricComparison;
use serde::{Deserialize, Serialize};

/// One period of a record's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HistoryPoint {
    pub year: i32,
    pub savings_rate_pct: Option<f64>,
    pub quality_score: Option<f64>,
    pub composite_risk_score: Option<f64>,
}

/// Focal record compared against its peer group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComparisonReport {
    pub focal_id: String,
    pub focal_name: String,
    pub year: Option<i32>,
    pub risk_adjusted: bool,
    pub composite_risk_score: Option<f64>,
    /// Records that passed the filter, before dropping absent values per metric
    pub peer_count: usize,
    pub filter: PeerFilter,
    pub comparisons: Vec<MetricComparison>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub history: Vec<HistoryPoint>,
}

impl ComparisonReport {
    pub fn render_text(&self) -> String {
        let mut output = String::new();

        let year = self
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!(
            "{} {} (performance year {})\n",
            self.focal_id, self.focal_name, year
        ));
        output.push_str(&format!(
            "Composite risk score: {}\n",
            risk::format_risk_score(self.composite_risk_score)
        ));
        output.push_str(&format!(
            "Peers: {}{}\n\n",
            self.peer_count,
            if self.risk_adjusted {
                " (risk-adjusted)"
            } else {
                ""
            }
        ));

        output.push_str(&format!(
            "{:<32} {:>12} {:>12} {:>12} {:>6} {:>5}\n",
            "METRIC", "FOCAL", "PEER MEAN", "PEER MEDIAN", "PCTL", "N"
        ));

        for comparison in &self.comparisons {
            let label = if comparison.adjusted {
                format!("{} (adj)", comparison.label)
            } else {
                comparison.label.clone()
            };
            let unit = comparison.metric.unit();

            match comparison.stats {
                Some(stats) => output.push_str(&format!(
                    "{:<32} {:>12} {:>12} {:>12} {:>6} {:>5}\n",
                    truncate_or_pad(&label, 32),
                    format_value(Some(stats.focus_value), unit),
                    format_value(Some(stats.group_mean), unit),
                    format_value(Some(stats.group_median), unit),
                    format!("{:.0}", stats.percentile_rank),
                    stats.peer_count,
                )),
                None => output.push_str(&format!(
                    "{:<32} {:>12} {:>12} {:>12} {:>6} {:>5}\n",
                    truncate_or_pad(&label, 32),
                    "N/A",
                    "N/A",
                    "N/A",
                    "N/A",
                    0
                )),
            }
        }

        if !self.history.is_empty() {
            output.push_str(&format!(
                "\n{:<6} {:>10} {:>10} {:>8}\n",
                "YEAR", "SAVINGS", "QUALITY", "RISK"
            ));
            for point in &self.history {
                output.push_str(&format!(
                    "{:<6} {:>10} {:>10} {:>8}\n",
                    point.year,
                    format_value(point.savings_rate_pct, "%"),
                    format_value(point.quality_score, MetricKey::QualityScore.unit()),
                    risk::format_risk_score(point.composite_risk_score),
                ));
            }
        }

        output
    }

    pub fn render_json(&self) -> String {
        render_json(self)
    }
}

/// Composite risk score and segment coverage of one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskRow {
    pub id: String,
    pub name: String,
    pub composite_risk_score: Option<f64>,
    pub coverage: Option<f64>,
}

pub fn render_risk_text(rows: &[RiskRow]) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{:<10} {:<30} {:>8} {:>9}\n",
        "ID", "NAME", "RISK", "COVERAGE"
    ));

    for row in rows {
        let coverage = row
            .coverage
            .map(|c| format!("{:.1}%", c * 100.0))
            .unwrap_or_else(|| "N/A".to_string());
        output.push_str(&format!(
            "{:<10} {:<30} {:>8} {:>9}\n",
            truncate_or_pad(&row.id, 10),
            truncate_or_pad(&row.name, 30),
            risk::format_risk_score(row.composite_risk_score),
            coverage,
        ));
    }

    let missing = rows.iter().filter(|r| r.composite_risk_score.is_none()).count();
    if missing > 0 {
        output.push_str(&format!(
            "\n{} record(s) without a usable composite risk score\n",
            missing
        ));
    }

    output
}

/// One row of the rankings view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankingRow {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub track: String,
    pub region: String,
    pub category: PerformanceCategory,
    /// Value of the sort column (risk-adjusted when requested)
    pub sort_value: Option<f64>,
    pub savings_rate_pct: Option<f64>,
    pub quality_score: Option<f64>,
    pub savings_rate_change: Option<f64>,
    pub quality_score_change: Option<f64>,
}

/// Sorted, searched and truncated rankings of one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RankingReport {
    pub year: Option<i32>,
    pub previous_year: Option<i32>,
    /// Metric the rows are sorted by (None: name)
    pub sort_metric: Option<MetricKey>,
    pub risk_adjusted: bool,
    pub total_matches: usize,
    pub rows: Vec<RankingRow>,
}

impl RankingReport {
    pub fn render_text(&self) -> String {
        let mut output = String::new();
        let sort_header = self.sort_metric.map(|m| m.label()).unwrap_or("Name");
        let sort_unit = self.sort_metric.map(|m| m.unit()).unwrap_or("");

        output.push_str(&format!(
            "{:<5} {:<10} {:<30} {:<10} {:<15} {:>14} {:>9} {:>9}\n",
            "RANK",
            "ID",
            "NAME",
            "TRACK",
            "CATEGORY",
            truncate_or_pad(sort_header, 14).trim_end(),
            "SAV YOY",
            "QUAL YOY"
        ));

        for row in &self.rows {
            let sort_value = if self.sort_metric.is_some() {
                format_value(row.sort_value, sort_unit)
            } else {
                "-".to_string()
            };
            output.push_str(&format!(
                "{:<5} {:<10} {:<30} {:<10} {:<15} {:>14} {:>9} {:>9}\n",
                row.rank,
                truncate_or_pad(&row.id, 10),
                truncate_or_pad(&row.name, 30),
                truncate_or_pad(&row.track, 10),
                row.category.as_str(),
                sort_value,
                format_change(row.savings_rate_change),
                format_change(row.quality_score_change),
            ));
        }

        if self.rows.len() < self.total_matches {
            output.push_str(&format!(
                "\nShowing {} of {} records\n",
                self.rows.len(),
                self.total_matches
            ));
        }

        output
    }

    pub fn render_json(&self) -> String {
        render_json(self)
    }
}

/// Track-by-band distribution of one period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DistributionReport {
    pub year: Option<i32>,
    pub matrix: DistributionMatrix,
}

impl DistributionReport {
    pub fn render_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{:<16}", "TRACK"));
        for band in &self.matrix.bands {
            output.push_str(&format!(" {:>10}", band.label()));
        }
        output.push_str(&format!(" {:>7}\n", "TOTAL"));

        for (track, row) in self.matrix.tracks.iter().zip(&self.matrix.counts) {
            output.push_str(&truncate_or_pad(track, 16));
            for count in row {
                output.push_str(&format!(" {:>10}", count));
            }
            output.push_str(&format!(" {:>7}\n", row.iter().sum::<usize>()));
        }

        output.push_str(&format!("{:<16}", "TOTAL"));
        for b in 0..self.matrix.bands.len() {
            let column: usize = self.matrix.counts.iter().map(|row| row[b]).sum();
            output.push_str(&format!(" {:>10}", column));
        }
        output.push_str(&format!(" {:>7}\n", self.matrix.total()));

        output
    }

    pub fn render_json(&self) -> String {
        render_json(self)
    }
}

/// One organization inside a distribution cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CellRow {
    pub id: String,
    pub name: String,
    pub savings_rate_pct: Option<f64>,
}

/// Organizations behind one track-by-band count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CellReport {
    pub year: Option<i32>,
    pub track: String,
    pub band: SavingsBand,
    pub rows: Vec<CellRow>,
}

impl CellReport {
    pub fn render_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{} / {}: {} record(s)\n\n",
            self.track,
            self.band.label(),
            self.rows.len()
        ));
        output.push_str(&format!("{:<10} {:<30} {:>10}\n", "ID", "NAME", "SAVINGS"));
        for row in &self.rows {
            output.push_str(&format!(
                "{:<10} {:<30} {:>10}\n",
                truncate_or_pad(&row.id, 10),
                truncate_or_pad(&row.name, 30),
                format_value(row.savings_rate_pct, "%"),
            ));
        }

        output
    }

    pub fn render_json(&self) -> String {
        render_json(self)
    }
}

/// Period KPIs with the change against the prior loaded period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SummaryReport {
    pub year: Option<i32>,
    pub previous_year: Option<i32>,
    pub summary: PeriodSummary,
    pub delta: Option<SummaryDelta>,
}

impl SummaryReport {
    pub fn render_text(&self) -> String {
        let s = &self.summary;
        let d = self.delta.as_ref();
        let mut output = String::new();

        if let Some(year) = self.year {
            output.push_str(&format!("Performance year {}", year));
            if let Some(prev) = self.previous_year {
                output.push_str(&format!(" (vs {})", prev));
            }
            output.push_str("\n\n");
        }

        let rows: [(&str, String, Option<YoyIndicator>); 9] = [
            ("Records", s.record_count.to_string(), d.and_then(|d| d.record_count)),
            ("With savings", s.with_savings.to_string(), None),
            ("With losses", s.with_losses.to_string(), None),
            (
                "Total beneficiaries",
                s.total_population.to_string(),
                d.and_then(|d| d.total_population),
            ),
            (
                "Total benchmark",
                format!("{:.0}", s.total_benchmark_expenditure),
                None,
            ),
            ("Total expenditure", format!("{:.0}", s.total_expenditure), None),
            (
                "Total savings/losses",
                format!("{:.0}", s.total_savings_losses),
                d.and_then(|d| d.total_savings_losses),
            ),
            (
                "Mean savings rate",
                format_value(s.mean_savings_rate_pct, "%"),
                d.and_then(|d| d.mean_savings_rate_pct),
            ),
            (
                "Mean quality score",
                format_value(s.mean_quality_score, MetricKey::QualityScore.unit()),
                None,
            ),
        ];

        for (label, value, yoy) in rows {
            let yoy = yoy.map(format_yoy).unwrap_or_default();
            output.push_str(&format!("{:<22} {:>16}  {}\n", label, value, yoy).trim_end());
            output.push('\n');
        }

        output
    }

    pub fn render_json(&self) -> String {
        render_json(self)
    }
}

/// Render any report as pretty JSON
pub fn render_json<T: Serialize + ?Sized>(report: &T) -> String {
    serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
}

/// Two decimals plus unit, or `N/A`
pub fn format_value(value: Option<f64>, unit: &str) -> String {
    match value {
        Some(v) => format!("{:.2}{}", v, unit),
        None => "N/A".to_string(),
    }
}

fn format_change(change: Option<f64>) -> String {
    match change {
        Some(c) => format!("{:+.2}", c),
        None => "-".to_string(),
    }
}

fn format_yoy(yoy: YoyIndicator) -> String {
    if yoy.is_neutral {
        return "(no change)".to_string();
    }
    let arrow = if yoy.value > 0.0 { "up" } else { "down" };
    format!("({} {:.1}%)", arrow, yoy.percentage.abs())
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
