//! Performance records and the named metrics they carry
//!
//! Global invariants enforced:
//! - Absent data is `None`, never a zero sentinel
//! - Records are read-only inputs; nothing in this crate mutates a borrowed record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

fn unknown() -> String {
    "Unknown".to_string()
}

/// One organization's metrics for one performance period
///
/// Field names serialize to the column names of the warehouse export.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PerformanceRecord {
    #[serde(rename = "ACO_ID")]
    pub id: String,
    #[serde(rename = "ACO_NAME", default)]
    pub name: String,
    #[serde(rename = "ACO_STATE", default = "unknown")]
    pub region: String,
    #[serde(rename = "ACO_TRACK", default = "unknown")]
    pub track: String,
    #[serde(rename = "ACO_OWNER", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_year: Option<i32>,

    // Population
    #[serde(rename = "TOTAL_BENEFICIARIES", default)]
    pub total_population: Option<u64>,
    #[serde(rename = "AGED_NONDUAL_BENES", default)]
    pub aged_non_dual_count: Option<u64>,
    #[serde(rename = "AGED_DUAL_BENES", default)]
    pub aged_dual_count: Option<u64>,
    #[serde(rename = "DISABLED_BENES", default)]
    pub disabled_count: Option<u64>,
    #[serde(rename = "ESRD_BENES", default)]
    pub esrd_count: Option<u64>,

    // Segment risk scores (CMS-HCC)
    #[serde(default)]
    pub risk_score_aged_non_dual: Option<f64>,
    #[serde(default)]
    pub risk_score_aged_dual: Option<f64>,
    #[serde(default)]
    pub risk_score_disabled: Option<f64>,
    #[serde(default)]
    pub composite_risk_score: Option<f64>,

    // Financial
    #[serde(default)]
    pub savings_rate_pct: Option<f64>,
    #[serde(default)]
    pub quality_score: Option<f64>,
    #[serde(default)]
    pub benchmark_expenditure: Option<f64>,
    #[serde(default)]
    pub total_expenditure: Option<f64>,
    #[serde(default)]
    pub savings_losses: Option<f64>,
    #[serde(default)]
    pub earned_shared_savings_payment: Option<f64>,
    #[serde(default)]
    pub cost_per_beneficiary: Option<f64>,

    // Utilization
    #[serde(default)]
    pub ip_admissions: Option<f64>,
    #[serde(rename = "ED_VISITS_PER_1K", default)]
    pub ed_visits_per_1k: Option<f64>,
    #[serde(rename = "ED_VISITS_HOSP_PER_1K", default)]
    pub ed_visits_hosp_per_1k: Option<f64>,
    #[serde(rename = "PCP_VISITS_PER_1K", default)]
    pub pcp_visits_per_1k: Option<f64>,
    #[serde(rename = "SPECIALIST_VISITS_PER_1K", default)]
    pub specialist_visits_per_1k: Option<f64>,
    #[serde(rename = "READMISSION_RATE_PER_1000", default)]
    pub readmission_rate_per_1000: Option<f64>,
    #[serde(default)]
    pub snf_length_of_stay: Option<f64>,
    #[serde(rename = "SNF_ADMISSIONS_PER_1K", default)]
    pub snf_admissions_per_1k: Option<f64>,
    #[serde(default)]
    pub snf_pay_per_stay: Option<f64>,

    // Provider and facility counts
    #[serde(rename = "NUM_PCPS", default)]
    pub num_pcps: Option<u64>,
    #[serde(rename = "NUM_SPECIALISTS", default)]
    pub num_specialists: Option<u64>,
    #[serde(rename = "NUM_FQHCS", default)]
    pub num_fqhcs: Option<u64>,
    #[serde(rename = "NUM_RHCS", default)]
    pub num_rhcs: Option<u64>,
    #[serde(rename = "NUM_HOSPITALS", default)]
    pub num_hospitals: Option<u64>,
}

impl PerformanceRecord {
    /// Create an otherwise-empty record with the given id and name
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        PerformanceRecord {
            id: id.into(),
            name: name.into(),
            region: unknown(),
            track: unknown(),
            ..Default::default()
        }
    }

    /// Value of a named metric, `None` when absent
    pub fn metric(&self, key: MetricKey) -> Option<f64> {
        key.value(self)
    }

    /// Savings-rate classification for this record
    pub fn category(&self) -> PerformanceCategory {
        PerformanceCategory::classify(self.savings_rate_pct)
    }
}

/// Named numeric metric of a [`PerformanceRecord`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKey {
    #[serde(rename = "TOTAL_BENEFICIARIES")]
    TotalPopulation,
    CompositeRiskScore,
    SavingsRatePct,
    QualityScore,
    BenchmarkExpenditure,
    TotalExpenditure,
    SavingsLosses,
    EarnedSharedSavingsPayment,
    CostPerBeneficiary,
    IpAdmissions,
    #[serde(rename = "ED_VISITS_PER_1K")]
    EdVisitsPer1k,
    #[serde(rename = "ED_VISITS_HOSP_PER_1K")]
    EdVisitsHospPer1k,
    #[serde(rename = "PCP_VISITS_PER_1K")]
    PcpVisitsPer1k,
    #[serde(rename = "SPECIALIST_VISITS_PER_1K")]
    SpecialistVisitsPer1k,
    #[serde(rename = "READMISSION_RATE_PER_1000")]
    ReadmissionRatePer1000,
    SnfLengthOfStay,
    #[serde(rename = "SNF_ADMISSIONS_PER_1K")]
    SnfAdmissionsPer1k,
    SnfPayPerStay,
}

impl MetricKey {
    pub const ALL: [MetricKey; 18] = [
        MetricKey::TotalPopulation,
        MetricKey::CompositeRiskScore,
        MetricKey::SavingsRatePct,
        MetricKey::QualityScore,
        MetricKey::BenchmarkExpenditure,
        MetricKey::TotalExpenditure,
        MetricKey::SavingsLosses,
        MetricKey::EarnedSharedSavingsPayment,
        MetricKey::CostPerBeneficiary,
        MetricKey::IpAdmissions,
        MetricKey::EdVisitsPer1k,
        MetricKey::EdVisitsHospPer1k,
        MetricKey::PcpVisitsPer1k,
        MetricKey::SpecialistVisitsPer1k,
        MetricKey::ReadmissionRatePer1000,
        MetricKey::SnfLengthOfStay,
        MetricKey::SnfAdmissionsPer1k,
        MetricKey::SnfPayPerStay,
    ];

    /// Export column name
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::TotalPopulation => "TOTAL_BENEFICIARIES",
            MetricKey::CompositeRiskScore => "COMPOSITE_RISK_SCORE",
            MetricKey::SavingsRatePct => "SAVINGS_RATE_PCT",
            MetricKey::QualityScore => "QUALITY_SCORE",
            MetricKey::BenchmarkExpenditure => "BENCHMARK_EXPENDITURE",
            MetricKey::TotalExpenditure => "TOTAL_EXPENDITURE",
            MetricKey::SavingsLosses => "SAVINGS_LOSSES",
            MetricKey::EarnedSharedSavingsPayment => "EARNED_SHARED_SAVINGS_PAYMENT",
            MetricKey::CostPerBeneficiary => "COST_PER_BENEFICIARY",
            MetricKey::IpAdmissions => "IP_ADMISSIONS",
            MetricKey::EdVisitsPer1k => "ED_VISITS_PER_1K",
            MetricKey::EdVisitsHospPer1k => "ED_VISITS_HOSP_PER_1K",
            MetricKey::PcpVisitsPer1k => "PCP_VISITS_PER_1K",
            MetricKey::SpecialistVisitsPer1k => "SPECIALIST_VISITS_PER_1K",
            MetricKey::ReadmissionRatePer1000 => "READMISSION_RATE_PER_1000",
            MetricKey::SnfLengthOfStay => "SNF_LENGTH_OF_STAY",
            MetricKey::SnfAdmissionsPer1k => "SNF_ADMISSIONS_PER_1K",
            MetricKey::SnfPayPerStay => "SNF_PAY_PER_STAY",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::TotalPopulation => "Beneficiaries",
            MetricKey::CompositeRiskScore => "Composite Risk Score",
            MetricKey::SavingsRatePct => "Savings Rate",
            MetricKey::QualityScore => "Quality Score",
            MetricKey::BenchmarkExpenditure => "Benchmark Expenditure",
            MetricKey::TotalExpenditure => "Total Expenditure",
            MetricKey::SavingsLosses => "Savings/Losses",
            MetricKey::EarnedSharedSavingsPayment => "Earned Shared Savings",
            MetricKey::CostPerBeneficiary => "Cost per Beneficiary",
            MetricKey::IpAdmissions => "Inpatient Admissions",
            MetricKey::EdVisitsPer1k => "ED Visits per 1K",
            MetricKey::EdVisitsHospPer1k => "ED Visits (Hosp.) per 1K",
            MetricKey::PcpVisitsPer1k => "PCP Visits per 1K",
            MetricKey::SpecialistVisitsPer1k => "Specialist Visits per 1K",
            MetricKey::ReadmissionRatePer1000 => "Readmissions per 1,000",
            MetricKey::SnfLengthOfStay => "SNF Length of Stay",
            MetricKey::SnfAdmissionsPer1k => "SNF Admissions per 1K",
            MetricKey::SnfPayPerStay => "SNF Pay per Stay",
        }
    }

    /// Display unit suffix
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKey::SavingsRatePct | MetricKey::QualityScore => "%",
            MetricKey::SnfLengthOfStay => " days",
            _ => "",
        }
    }

    /// Canonical accessor for this metric
    pub fn value(&self, record: &PerformanceRecord) -> Option<f64> {
        match self {
            MetricKey::TotalPopulation => record.total_population.map(|n| n as f64),
            MetricKey::CompositeRiskScore => record.composite_risk_score,
            MetricKey::SavingsRatePct => record.savings_rate_pct,
            MetricKey::QualityScore => record.quality_score,
            MetricKey::BenchmarkExpenditure => record.benchmark_expenditure,
            MetricKey::TotalExpenditure => record.total_expenditure,
            MetricKey::SavingsLosses => record.savings_losses,
            MetricKey::EarnedSharedSavingsPayment => record.earned_shared_savings_payment,
            MetricKey::CostPerBeneficiary => record.cost_per_beneficiary,
            MetricKey::IpAdmissions => record.ip_admissions,
            MetricKey::EdVisitsPer1k => record.ed_visits_per_1k,
            MetricKey::EdVisitsHospPer1k => record.ed_visits_hosp_per_1k,
            MetricKey::PcpVisitsPer1k => record.pcp_visits_per_1k,
            MetricKey::SpecialistVisitsPer1k => record.specialist_visits_per_1k,
            MetricKey::ReadmissionRatePer1000 => record.readmission_rate_per_1000,
            MetricKey::SnfLengthOfStay => record.snf_length_of_stay,
            MetricKey::SnfAdmissionsPer1k => record.snf_admissions_per_1k,
            MetricKey::SnfPayPerStay => record.snf_pay_per_stay,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = anyhow::Error;

    /// Parse an export column name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase();
        MetricKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| anyhow::anyhow!("unknown metric: {}", s))
    }
}

/// Savings-rate classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PerformanceCategory {
    HighSaver,
    ModerateSaver,
    SlightLoss,
    HighLoss,
    Unknown,
}

impl PerformanceCategory {
    /// `> 5` high saver, `0..=5` moderate, `-5..0` slight loss, `< -5` high loss
    pub fn classify(savings_rate_pct: Option<f64>) -> Self {
        match savings_rate_pct {
            Some(rate) if rate > 5.0 => PerformanceCategory::HighSaver,
            Some(rate) if rate >= 0.0 => PerformanceCategory::ModerateSaver,
            Some(rate) if rate >= -5.0 => PerformanceCategory::SlightLoss,
            Some(rate) if rate < -5.0 => PerformanceCategory::HighLoss,
            _ => PerformanceCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceCategory::HighSaver => "High Saver",
            PerformanceCategory::ModerateSaver => "Moderate Saver",
            PerformanceCategory::SlightLoss => "Slight Loss",
            PerformanceCategory::HighLoss => "High Loss",
            PerformanceCategory::Unknown => "Unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_export_row() {
        let json = r#"{
            "ACO_ID": "A1234",
            "ACO_NAME": "Valley Health ACO",
            "ACO_TRACK": "ENHANCED",
            "PERFORMANCE_YEAR": 2023,
            "TOTAL_BENEFICIARIES": 12000,
            "AGED_NONDUAL_BENES": 9000,
            "RISK_SCORE_AGED_NON_DUAL": 1.05,
            "SAVINGS_RATE_PCT": 4.2,
            "ED_VISITS_PER_1K": 610.5,
            "NUM_FQHCS": 3
        }"#;
        let record: PerformanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "A1234");
        assert_eq!(record.region, "Unknown");
        assert_eq!(record.track, "ENHANCED");
        assert_eq!(record.performance_year, Some(2023));
        assert_eq!(record.total_population, Some(12000));
        assert_eq!(record.aged_non_dual_count, Some(9000));
        assert_eq!(record.aged_dual_count, None);
        assert_eq!(record.risk_score_aged_non_dual, Some(1.05));
        assert_eq!(record.ed_visits_per_1k, Some(610.5));
        assert_eq!(record.num_fqhcs, Some(3));
        assert_eq!(record.composite_risk_score, None);
    }

    #[test]
    fn test_null_fields_are_absent() {
        let json = r#"{"ACO_ID": "A1", "COST_PER_BENEFICIARY": null, "QUALITY_SCORE": null}"#;
        let record: PerformanceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.cost_per_beneficiary, None);
        assert_eq!(record.quality_score, None);
    }

    #[test]
    fn test_metric_key_parse_matches_column_names() {
        for key in MetricKey::ALL {
            assert_eq!(key.as_str().parse::<MetricKey>().unwrap(), key);
        }
        assert_eq!(
            "ed_visits_per_1k".parse::<MetricKey>().unwrap(),
            MetricKey::EdVisitsPer1k
        );
        assert!("NUM_FQHCS".parse::<MetricKey>().is_err());
    }

    #[test]
    fn test_metric_key_serde_uses_column_names() {
        for key in MetricKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_metric_value_accessor() {
        let mut record = PerformanceRecord::new("A1", "Alpha");
        record.total_population = Some(500);
        record.snf_pay_per_stay = Some(12_500.0);
        assert_eq!(record.metric(MetricKey::TotalPopulation), Some(500.0));
        assert_eq!(record.metric(MetricKey::SnfPayPerStay), Some(12_500.0));
        assert_eq!(record.metric(MetricKey::QualityScore), None);
    }

    #[test]
    fn test_performance_category_boundaries() {
        assert_eq!(PerformanceCategory::classify(Some(5.1)), PerformanceCategory::HighSaver);
        assert_eq!(PerformanceCategory::classify(Some(5.0)), PerformanceCategory::ModerateSaver);
        assert_eq!(PerformanceCategory::classify(Some(0.0)), PerformanceCategory::ModerateSaver);
        assert_eq!(PerformanceCategory::classify(Some(-0.1)), PerformanceCategory::SlightLoss);
        assert_eq!(PerformanceCategory::classify(Some(-5.0)), PerformanceCategory::SlightLoss);
        assert_eq!(PerformanceCategory::classify(Some(-5.1)), PerformanceCategory::HighLoss);
        assert_eq!(PerformanceCategory::classify(None), PerformanceCategory::Unknown);
    }
}
