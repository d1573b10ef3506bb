//! Configuration file support for Peerline
//!
//! Loads default peer filters and view settings from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.peerlinerc.json` in the working directory
//! 3. `peerline.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::filter::PeerFilter;
use crate::record::MetricKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Metrics compared when neither the config nor the CLI names any
pub const DEFAULT_METRICS: &[MetricKey] = &[
    MetricKey::SavingsRatePct,
    MetricKey::QualityScore,
    MetricKey::TotalPopulation,
    MetricKey::CostPerBeneficiary,
    MetricKey::EdVisitsPer1k,
    MetricKey::PcpVisitsPer1k,
    MetricKey::SpecialistVisitsPer1k,
    MetricKey::ReadmissionRatePer1000,
    MetricKey::SnfAdmissionsPer1k,
];

/// Number of periods shown in a record's history
pub const DEFAULT_HISTORY_YEARS: usize = 3;

/// Peerline configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerlineConfig {
    /// Default peer group filter
    #[serde(default)]
    pub filter: PeerFilter,

    /// Compare risk-adjusted values by default
    #[serde(default)]
    pub risk_adjusted: Option<bool>,

    /// Metric keys to compare (column names, e.g. "SAVINGS_RATE_PCT")
    #[serde(default)]
    pub metrics: Vec<String>,

    /// Periods of history to show (default: 3)
    #[serde(default)]
    pub history_years: Option<usize>,

    /// Maximum number of ranking rows to show
    #[serde(default)]
    pub top: Option<usize>,
}

/// Resolved configuration with parsed metric keys
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub filter: PeerFilter,
    pub risk_adjusted: bool,
    pub metrics: Vec<MetricKey>,
    pub history_years: usize,
    pub top_n: Option<usize>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl PeerlineConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        self.filter.validate().context("invalid filter")?;

        for key in &self.metrics {
            key.parse::<MetricKey>()
                .with_context(|| format!("invalid metrics entry: {}", key))?;
        }

        if self.history_years == Some(0) {
            anyhow::bail!("history_years must be at least 1");
        }

        if self.top == Some(0) {
            anyhow::bail!("top must be at least 1");
        }

        Ok(())
    }

    /// Resolve config into parsed form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        let metrics = if self.metrics.is_empty() {
            DEFAULT_METRICS.to_vec()
        } else {
            self.metrics
                .iter()
                .map(|key| key.parse::<MetricKey>())
                .collect::<Result<Vec<_>>>()?
        };

        Ok(ResolvedConfig {
            filter: self.filter.clone(),
            risk_adjusted: self.risk_adjusted.unwrap_or(false),
            metrics,
            history_years: self.history_years.unwrap_or(DEFAULT_HISTORY_YEARS),
            top_n: self.top,
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        PeerlineConfig::default().resolve()
    }
}

/// Discover and load a config file from a directory
///
/// Search order:
/// 1. `.peerlinerc.json`
/// 2. `peerline.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(PeerlineConfig, PathBuf)>> {
    for name in [".peerlinerc.json", "peerline.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }

    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<PeerlineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: PeerlineConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (PeerlineConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;

    tracing::debug!(
        config = ?resolved.config_path,
        metrics = resolved.metrics.len(),
        "configuration resolved"
    );

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FacilityKind;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = PeerlineConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert!(resolved.filter.is_unrestricted());
        assert!(!resolved.risk_adjusted);
        assert_eq!(resolved.metrics, DEFAULT_METRICS.to_vec());
        assert_eq!(resolved.history_years, 3);
        assert_eq!(resolved.top_n, None);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: PeerlineConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "filter": {
                "tracks": ["ENHANCED"],
                "regions": ["OH", "MI"],
                "min_population": 5000,
                "max_population": 50000,
                "qualifying_facility": "rhc",
                "has_qualifying_facility": true,
                "min_facility_share_pct": 1.0,
                "max_facility_share_pct": 20.0,
                "contract_start_years": [2021]
            },
            "risk_adjusted": true,
            "metrics": ["COST_PER_BENEFICIARY", "quality_score"],
            "history_years": 5,
            "top": 25
        }"#;
        let config: PeerlineConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.filter.tracks, vec!["ENHANCED"]);
        assert_eq!(resolved.filter.min_population, Some(5000));
        assert_eq!(resolved.filter.qualifying_facility, FacilityKind::Rhc);
        assert_eq!(resolved.filter.contract_start_years, vec![2021]);
        assert!(resolved.risk_adjusted);
        assert_eq!(
            resolved.metrics,
            vec![MetricKey::CostPerBeneficiary, MetricKey::QualityScore]
        );
        assert_eq!(resolved.history_years, 5);
        assert_eq!(resolved.top_n, Some(25));
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<PeerlineConfig, _> = serde_json::from_str(r#"{"unknown_field": true}"#);
        assert!(result.is_err());

        let result: Result<PeerlineConfig, _> =
            serde_json::from_str(r#"{"filter": {"states": ["OH"]}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_inverted_population_bounds() {
        let config: PeerlineConfig =
            serde_json::from_str(r#"{"filter": {"min_population": 10, "max_population": 5}}"#)
                .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equal_bounds_are_valid() {
        let config: PeerlineConfig =
            serde_json::from_str(r#"{"filter": {"min_population": 10, "max_population": 10}}"#)
                .unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_reject_share_outside_percent_range() {
        let config: PeerlineConfig =
            serde_json::from_str(r#"{"filter": {"max_facility_share_pct": 120.0}}"#).unwrap();
        assert!(config.validate().is_err());

        let config: PeerlineConfig =
            serde_json::from_str(r#"{"filter": {"min_facility_share_pct": -1.0}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_unknown_metric() {
        let config: PeerlineConfig =
            serde_json::from_str(r#"{"metrics": ["NOT_A_METRIC"]}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_history() {
        let config: PeerlineConfig = serde_json::from_str(r#"{"history_years": 0}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_peerlinerc() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".peerlinerc.json"), r#"{"top": 10}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.top, Some(10));
        assert!(path.ends_with(".peerlinerc.json"));
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".peerlinerc.json"), r#"{"top": 1}"#).unwrap();
        fs::write(dir.path().join("peerline.config.json"), r#"{"top": 2}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.top, Some(1));
    }

    #[test]
    fn test_discover_peerline_config_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("peerline.config.json"),
            r#"{"risk_adjusted": true}"#,
        )
        .unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.risk_adjusted, Some(true));
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.history_years, DEFAULT_HISTORY_YEARS);
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{"metrics": ["SAVINGS_RATE_PCT"]}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&path)).unwrap();
        assert_eq!(resolved.config_path.as_deref(), Some(path.as_path()));
        assert_eq!(resolved.metrics, vec![MetricKey::SavingsRatePct]);
    }

    #[test]
    fn test_invalid_config_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, r#"{"history_years": 0}"#).unwrap();
        assert!(load_config_file(&path).is_err());
    }
}
