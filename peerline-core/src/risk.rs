//! Composite risk score and risk adjustment
//!
//! Global invariants enforced:
//! - Missing denominators yield `None`, never zero
//! - Adjustment requests for non-rate metrics are ignored, not rejected
//! - Display values degrade to the raw value instead of failing

use crate::record::{MetricKey, PerformanceRecord};
use serde::{Deserialize, Serialize};

/// Minimum share of the population that must have a known segment risk score
pub const MIN_RISK_COVERAGE: f64 = 0.5;

/// Metrics eligible for risk adjustment (utilization and cost rates)
pub const ADJUSTABLE_METRICS: [MetricKey; 10] = [
    MetricKey::CostPerBeneficiary,
    MetricKey::SnfAdmissionsPer1k,
    MetricKey::IpAdmissions,
    MetricKey::EdVisitsPer1k,
    MetricKey::ReadmissionRatePer1000,
    MetricKey::PcpVisitsPer1k,
    MetricKey::SpecialistVisitsPer1k,
    MetricKey::SnfLengthOfStay,
    MetricKey::SnfPayPerStay,
    MetricKey::EdVisitsHospPer1k,
];

/// Population segment with its own CMS-HCC risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Segment {
    AgedNonDual,
    AgedDual,
    Disabled,
}

impl Segment {
    pub const ALL: [Segment; 3] = [Segment::AgedNonDual, Segment::AgedDual, Segment::Disabled];

    /// Segment member count and risk score for a record
    pub fn observe(&self, record: &PerformanceRecord) -> (Option<u64>, Option<f64>) {
        match self {
            Segment::AgedNonDual => (record.aged_non_dual_count, record.risk_score_aged_non_dual),
            Segment::AgedDual => (record.aged_dual_count, record.risk_score_aged_dual),
            Segment::Disabled => (record.disabled_count, record.risk_score_disabled),
        }
    }
}

/// Intermediate result of the composite score calculation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskCoverage {
    /// Sum of `(segment_count / total) * segment_score` over covered segments
    pub weighted_sum: f64,
    /// Share of the total population in segments with a known score
    pub coverage: f64,
}

impl RiskCoverage {
    pub fn is_sufficient(&self) -> bool {
        self.coverage > 0.0 && self.coverage >= MIN_RISK_COVERAGE
    }
}

/// Weighted sum and coverage over the segments with usable data
///
/// Returns `None` when the record has no usable population denominator.
pub fn composite_risk_coverage(record: &PerformanceRecord) -> Option<RiskCoverage> {
    let total = match record.total_population {
        Some(total) if total > 0 => total as f64,
        _ => return None,
    };

    let mut weighted_sum = 0.0;
    let mut coverage = 0.0;

    for segment in Segment::ALL {
        if let (Some(count), Some(score)) = segment.observe(record) {
            if count > 0 {
                let weight = count as f64 / total;
                weighted_sum += weight * score;
                coverage += weight;
            }
        }
    }

    Some(RiskCoverage {
        weighted_sum,
        coverage,
    })
}

/// Population-weighted composite risk score
///
/// The weighted sum is returned as-is, not divided by coverage, so a record
/// with partial coverage gets a score scaled by its covered share.
pub fn calculate_composite_risk_score(record: &PerformanceRecord) -> Option<f64> {
    composite_risk_coverage(record)
        .filter(RiskCoverage::is_sufficient)
        .map(|c| c.weighted_sum)
}

/// Copy of `record` with its composite score filled in when absent
pub fn with_composite_risk_score(record: &PerformanceRecord) -> PerformanceRecord {
    let mut filled = record.clone();
    if filled.composite_risk_score.is_none() {
        filled.composite_risk_score = calculate_composite_risk_score(record);
    }
    filled
}

/// Indirect standardization: `raw / risk_score`
pub fn apply_risk_adjustment(raw_value: Option<f64>, risk_score: Option<f64>) -> Option<f64> {
    let raw = raw_value?;
    match risk_score {
        Some(score) if score != 0.0 => Some(raw / score),
        _ => None,
    }
}

/// Whether the metric named by `metric_key` is on the adjustment allow-list
pub fn is_adjustable_metric(metric_key: &str) -> bool {
    metric_key
        .parse::<MetricKey>()
        .map(|key| key.is_adjustable())
        .unwrap_or(false)
}

impl MetricKey {
    pub fn is_adjustable(&self) -> bool {
        ADJUSTABLE_METRICS.contains(self)
    }
}

/// Value to show for a metric, risk-adjusted when requested and possible
pub fn get_display_value(
    record: &PerformanceRecord,
    metric: MetricKey,
    should_adjust: bool,
) -> Option<f64> {
    let raw = metric.value(record);

    if !should_adjust || !metric.is_adjustable() {
        return raw;
    }

    apply_risk_adjustment(raw, record.composite_risk_score).or(raw)
}

/// Risk score formatted to three decimals, `N/A` when absent
pub fn format_risk_score(score: Option<f64>) -> String {
    match score {
        Some(score) => format!("{:.3}", score),
        None => "N/A".to_string(),
    }
}

pub fn has_missing_risk_score(record: &PerformanceRecord) -> bool {
    record.composite_risk_score.is_none()
}
