//! Peer-group filtering
//!
//! Global invariants enforced:
//! - The focal record is never part of its own comparison group
//! - Predicates are AND-combined; an empty set or unset bound does not restrict
//! - Input order is preserved; records are borrowed, never copied or mutated

use crate::record::PerformanceRecord;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Facility type whose presence and share can restrict the peer group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityKind {
    Pcp,
    Specialist,
    #[default]
    Fqhc,
    Rhc,
}

impl FacilityKind {
    pub fn count(&self, record: &PerformanceRecord) -> u64 {
        let count = match self {
            FacilityKind::Pcp => record.num_pcps,
            FacilityKind::Specialist => record.num_specialists,
            FacilityKind::Fqhc => record.num_fqhcs,
            FacilityKind::Rhc => record.num_rhcs,
        };
        count.unwrap_or(0)
    }
}

/// Total provider count used as the denominator for facility share
fn total_facilities(record: &PerformanceRecord) -> u64 {
    [
        FacilityKind::Pcp,
        FacilityKind::Specialist,
        FacilityKind::Fqhc,
        FacilityKind::Rhc,
    ]
    .iter()
    .map(|kind| kind.count(record))
    .sum()
}

/// Share of `kind` among all provider counts, in percent
///
/// `None` when the record reports no providers at all.
pub fn facility_share_pct(record: &PerformanceRecord, kind: FacilityKind) -> Option<f64> {
    let total = total_facilities(record);
    if total == 0 {
        return None;
    }
    Some(kind.count(record) as f64 / total as f64 * 100.0)
}

/// First and last period in which an organization appears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Tenure {
    pub contract_start_year: i32,
    pub current_performance_year: i32,
}

/// Tenure per organization id across every loaded period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenureIndex {
    by_id: BTreeMap<String, Tenure>,
}

impl TenureIndex {
    /// Build from records of any number of periods; records without a year are skipped
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PerformanceRecord>,
    {
        let mut index = TenureIndex::default();
        for record in records {
            if let Some(year) = record.performance_year {
                index.observe(&record.id, year);
            }
        }
        index
    }

    /// Record that `id` appears in `year`
    pub fn observe(&mut self, id: &str, year: i32) {
        self.by_id
            .entry(id.to_string())
            .and_modify(|t| {
                t.contract_start_year = t.contract_start_year.min(year);
                t.current_performance_year = t.current_performance_year.max(year);
            })
            .or_insert(Tenure {
                contract_start_year: year,
                current_performance_year: year,
            });
    }

    pub fn get(&self, id: &str) -> Option<&Tenure> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

fn check_range<T: PartialOrd + std::fmt::Display>(
    name: &str,
    min: Option<T>,
    max: Option<T>,
) -> Result<()> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            anyhow::bail!(
                "min_{name} ({}) must not exceed max_{name} ({})",
                min,
                max
            );
        }
    }
    Ok(())
}

/// Peer-group filter criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PeerFilter {
    /// Allowed tracks (empty: any)
    pub tracks: Vec<String>,
    /// Allowed regions (empty: any)
    pub regions: Vec<String>,
    /// Allowed owners (empty: any)
    pub owners: Vec<String>,
    /// Inclusive lower bound on total population
    pub min_population: Option<u64>,
    /// Inclusive upper bound on total population
    pub max_population: Option<u64>,
    /// Facility type used by the two facility predicates
    pub qualifying_facility: FacilityKind,
    /// Require (true) or forbid (false) at least one qualifying facility
    pub has_qualifying_facility: Option<bool>,
    /// Inclusive lower bound on qualifying facility share, percent
    pub min_facility_share_pct: Option<f64>,
    /// Inclusive upper bound on qualifying facility share, percent
    pub max_facility_share_pct: Option<f64>,
    /// Allowed first-appearance years (empty: any)
    pub contract_start_years: Vec<i32>,
    /// Allowed last-appearance years (empty: any)
    pub current_performance_years: Vec<i32>,
}

impl PeerFilter {
    /// True when no predicate restricts the group
    pub fn is_unrestricted(&self) -> bool {
        self.tracks.is_empty()
            && self.regions.is_empty()
            && self.owners.is_empty()
            && self.min_population.is_none()
            && self.max_population.is_none()
            && self.has_qualifying_facility.is_none()
            && self.min_facility_share_pct.is_none()
            && self.max_facility_share_pct.is_none()
            && self.contract_start_years.is_empty()
            && self.current_performance_years.is_empty()
    }

    /// Reject bounds that can never match: inverted ranges and shares outside 0-100
    pub fn validate(&self) -> Result<()> {
        check_range("population", self.min_population, self.max_population)?;
        check_range(
            "facility_share_pct",
            self.min_facility_share_pct,
            self.max_facility_share_pct,
        )?;

        for (name, val) in [
            ("min_facility_share_pct", self.min_facility_share_pct),
            ("max_facility_share_pct", self.max_facility_share_pct),
        ] {
            if let Some(v) = val {
                if !(0.0..=100.0).contains(&v) {
                    anyhow::bail!("{} must be between 0 and 100 (got {})", name, v);
                }
            }
        }

        Ok(())
    }

    fn uses_tenure(&self) -> bool {
        !self.contract_start_years.is_empty() || !self.current_performance_years.is_empty()
    }

    /// Check every predicate against one record
    pub fn matches(&self, record: &PerformanceRecord, tenure: &TenureIndex) -> bool {
        if !self.tracks.is_empty() && !self.tracks.contains(&record.track) {
            return false;
        }

        if !self.regions.is_empty() && !self.regions.contains(&record.region) {
            return false;
        }

        if !self.owners.is_empty() {
            match &record.owner {
                Some(owner) if self.owners.contains(owner) => {}
                _ => return false,
            }
        }

        if self.min_population.is_some() || self.max_population.is_some() {
            let Some(population) = record.total_population else {
                return false;
            };
            if self.min_population.is_some_and(|min| population < min) {
                return false;
            }
            if self.max_population.is_some_and(|max| population > max) {
                return false;
            }
        }

        if let Some(wanted) = self.has_qualifying_facility {
            if (self.qualifying_facility.count(record) > 0) != wanted {
                return false;
            }
        }

        if self.min_facility_share_pct.is_some() || self.max_facility_share_pct.is_some() {
            let Some(share) = facility_share_pct(record, self.qualifying_facility) else {
                return false;
            };
            if self.min_facility_share_pct.is_some_and(|min| share < min) {
                return false;
            }
            if self.max_facility_share_pct.is_some_and(|max| share > max) {
                return false;
            }
        }

        if self.uses_tenure() {
            let Some(t) = tenure.get(&record.id) else {
                return false;
            };
            if !self.contract_start_years.is_empty()
                && !self.contract_start_years.contains(&t.contract_start_year)
            {
                return false;
            }
            if !self.current_performance_years.is_empty()
                && !self.current_performance_years.contains(&t.current_performance_year)
            {
                return false;
            }
        }

        true
    }
}

/// Peers of `focal_id` matching `filter`, tenure derived from `records` alone
pub fn comparison_group<'a>(
    records: &'a [PerformanceRecord],
    focal_id: &str,
    filter: &PeerFilter,
) -> Vec<&'a PerformanceRecord> {
    let tenure = if filter.uses_tenure() {
        TenureIndex::from_records(records)
    } else {
        TenureIndex::default()
    };
    comparison_group_with_tenure(records, focal_id, filter, &tenure)
}

/// Peers of `focal_id` matching `filter`, tenure looked up in `tenure`
pub fn comparison_group_with_tenure<'a>(
    records: &'a [PerformanceRecord],
    focal_id: &str,
    filter: &PeerFilter,
    tenure: &TenureIndex,
) -> Vec<&'a PerformanceRecord> {
    let group: Vec<&PerformanceRecord> = records
        .iter()
        .filter(|record| record.id != focal_id)
        .filter(|record| filter.matches(record, tenure))
        .collect();

    tracing::debug!(
        focal_id,
        candidates = records.len(),
        peers = group.len(),
        "built comparison group"
    );

    group
}
