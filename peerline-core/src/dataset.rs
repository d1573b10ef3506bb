//! Dataset loading - reads a warehouse export of performance records
//!
//! Accepted shapes:
//! 1. A bare JSON array of records (each carrying `PERFORMANCE_YEAR`)
//! 2. The multi-year dashboard export:
//!    `{ "years": [...], "dataByYear": { "2024": { "rankings": [...] } } }`
//!
//! Global invariants enforced:
//! - Periods are ordered by year; records within a period keep export order
//! - One record per id per period (first wins)
//! - In the multi-year export the `dataByYear` key decides a record's period
//! - Composite risk scores are derived on load when the export omits them

use crate::filter::TenureIndex;
use crate::record::PerformanceRecord;
use crate::risk;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ExportShape {
    Records(Vec<PerformanceRecord>),
    MultiYear(MultiYearExport),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultiYearExport {
    data_by_year: BTreeMap<String, YearlyExport>,
}

#[derive(Debug, Deserialize)]
struct YearlyExport {
    #[serde(default)]
    rankings: Vec<PerformanceRecord>,
}

/// Records grouped by performance period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    periods: BTreeMap<i32, Vec<PerformanceRecord>>,
    /// Records that carried no performance year
    undated: Vec<PerformanceRecord>,
}

impl Dataset {
    /// Build from records of any number of periods
    pub fn from_records(records: Vec<PerformanceRecord>) -> Self {
        let mut dataset = Dataset::default();
        let mut seen: HashSet<(Option<i32>, String)> = HashSet::new();

        for record in records {
            if !seen.insert((record.performance_year, record.id.clone())) {
                tracing::warn!(
                    id = %record.id,
                    year = ?record.performance_year,
                    "duplicate record in period, keeping first"
                );
                continue;
            }

            let record = risk::with_composite_risk_score(&record);
            match record.performance_year {
                Some(year) => dataset.periods.entry(year).or_default().push(record),
                None => dataset.undated.push(record),
            }
        }

        tracing::debug!(
            periods = dataset.periods.len(),
            undated = dataset.undated.len(),
            "dataset assembled"
        );

        dataset
    }

    /// Parse an export from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let shape: ExportShape =
            serde_json::from_str(json).context("failed to parse performance export")?;

        let records = match shape {
            ExportShape::Records(records) => records,
            ExportShape::MultiYear(export) => {
                let mut records = Vec::new();
                for (year_key, yearly) in export.data_by_year {
                    let year: i32 = year_key
                        .parse()
                        .with_context(|| format!("invalid year key in dataByYear: {}", year_key))?;
                    // The bucket key is authoritative for the period
                    records.extend(yearly.rankings.into_iter().map(|mut r| {
                        if let Some(stated) = r.performance_year.filter(|y| *y != year) {
                            tracing::warn!(
                                id = %r.id,
                                stated,
                                bucket = year,
                                "PERFORMANCE_YEAR disagrees with dataByYear key, using key"
                            );
                        }
                        r.performance_year = Some(year);
                        r
                    }));
                }
                records
            }
        };

        Ok(Dataset::from_records(records))
    }

    /// All years with at least one record, ascending
    pub fn years(&self) -> Vec<i32> {
        self.periods.keys().copied().collect()
    }

    pub fn latest_year(&self) -> Option<i32> {
        self.periods.keys().next_back().copied()
    }

    /// Closest loaded year strictly before `year`
    pub fn previous_year(&self, year: i32) -> Option<i32> {
        self.periods.range(..year).next_back().map(|(y, _)| *y)
    }

    /// Records of one period (empty slice if the year is not loaded)
    pub fn period(&self, year: i32) -> &[PerformanceRecord] {
        self.periods.get(&year).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records of `year`, or of the undated bucket when `year` is `None`
    /// and the dataset carries no dated records
    pub fn resolve_period(&self, year: Option<i32>) -> Result<(Option<i32>, &[PerformanceRecord])> {
        match year.or_else(|| self.latest_year()) {
            Some(year) => {
                if !self.periods.contains_key(&year) {
                    anyhow::bail!(
                        "no records for performance year {} (available: {:?})",
                        year,
                        self.years()
                    );
                }
                Ok((Some(year), self.period(year)))
            }
            None => Ok((None, self.undated.as_slice())),
        }
    }

    /// Find one record by id in a period
    pub fn find(&self, year: i32, id: &str) -> Option<&PerformanceRecord> {
        self.period(year).iter().find(|r| r.id == id)
    }

    /// First/last appearance of every id across all periods
    pub fn tenure_index(&self) -> TenureIndex {
        TenureIndex::from_records(self.periods.values().flatten())
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty() && self.undated.is_empty()
    }
}

/// Load a dataset export from disk
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset: {}", path.display()))?;

    Dataset::from_json(&content).with_context(|| format!("invalid dataset: {}", path.display()))
}
