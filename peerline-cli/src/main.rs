//! Peerline CLI - peer comparison and risk adjustment for ACO performance exports

// Global invariants enforced:
// - Deterministic output ordering
// - Identical input yields byte-for-byte identical output
// - Diagnostics go to stderr; stdout carries only the rendered report

use anyhow::Context;
use clap::{Parser, Subcommand};
use peerline_core::aggregates::SavingsBand;
use peerline_core::config::{self, ResolvedConfig};
use peerline_core::ranking::{SortDirection, SortKey, SortOptions};
use peerline_core::{
    compare, distribution, distribution_cell, load_dataset, rankings, report, risk_table, summary,
    CompareOptions, FacilityKind, MetricKey, PeerFilter, RankingOptions,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "peerline")]
#[command(about = "Peer comparison and risk-adjusted ranking of ACO performance data")]
#[command(version = env!("PEERLINE_VERSION"))]
struct Cli {
    /// Log debug events to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (default: auto-discover in the working directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare one organization against its peer group
    Compare {
        /// Dataset export (JSON)
        data: PathBuf,

        /// Organization id (ACO_ID)
        #[arg(long)]
        id: String,

        /// Performance year (default: latest in the export)
        #[arg(long)]
        year: Option<i32>,

        #[command(flatten)]
        adjust: RiskAdjustArgs,

        /// Metric to compare, repeatable (overrides config file)
        #[arg(long = "metric")]
        metrics: Vec<String>,

        /// Periods of history to show (overrides config file)
        #[arg(long)]
        history: Option<usize>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Composite risk score and segment coverage per organization
    Risk {
        data: PathBuf,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Ranked list with year-over-year changes
    Rankings {
        data: PathBuf,

        #[arg(long)]
        year: Option<i32>,

        /// Sort column: "name" or a metric key (default: SAVINGS_RATE_PCT)
        #[arg(long, default_value = "SAVINGS_RATE_PCT")]
        sort: String,

        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,

        #[command(flatten)]
        adjust: RiskAdjustArgs,

        /// Keep only organizations whose name or id contains this term
        #[arg(long)]
        search: Option<String>,

        /// Show only top N rows (overrides config file)
        #[arg(long)]
        top: Option<usize>,

        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Organizations per track and savings-rate band
    Distribution {
        data: PathBuf,

        #[arg(long)]
        year: Option<i32>,

        /// List the organizations of one track row (requires --band)
        #[arg(long, requires = "band")]
        track: Option<String>,

        /// Savings band column: above-10, 5-to-10, 0-to-5, minus-5-to-0, below-minus-5
        #[arg(long, requires = "track")]
        band: Option<String>,

        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Period KPIs with year-over-year change
    Summary {
        data: PathBuf,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Risk adjustment switches; either one replaces the config file's value
#[derive(clap::Args)]
struct RiskAdjustArgs {
    /// Divide allow-listed metrics by the composite risk score
    #[arg(long, conflicts_with = "no_risk_adjusted")]
    risk_adjusted: bool,

    /// Use raw values even when the config enables risk adjustment
    #[arg(long)]
    no_risk_adjusted: bool,
}

impl RiskAdjustArgs {
    fn resolve(&self, config_default: bool) -> bool {
        if self.no_risk_adjusted {
            false
        } else {
            self.risk_adjusted || config_default
        }
    }
}

/// Peer filter flags; each one set replaces the config file's value
#[derive(clap::Args)]
struct FilterArgs {
    /// Allowed track, repeatable
    #[arg(long = "track")]
    tracks: Vec<String>,

    /// Allowed state, repeatable
    #[arg(long = "region")]
    regions: Vec<String>,

    /// Allowed owner, repeatable
    #[arg(long = "owner")]
    owners: Vec<String>,

    #[arg(long)]
    min_population: Option<u64>,

    #[arg(long)]
    max_population: Option<u64>,

    /// Facility type for the facility filters
    #[arg(long)]
    facility: Option<FacilityArg>,

    /// Require (true) or forbid (false) at least one qualifying facility
    #[arg(long)]
    has_facility: Option<bool>,

    /// Minimum qualifying facility share, percent
    #[arg(long)]
    min_facility_share: Option<f64>,

    /// Maximum qualifying facility share, percent
    #[arg(long)]
    max_facility_share: Option<f64>,

    /// Allowed first performance year, repeatable
    #[arg(long = "contract-start")]
    contract_start_years: Vec<i32>,

    /// Allowed latest performance year, repeatable
    #[arg(long = "current-year")]
    current_performance_years: Vec<i32>,
}

impl FilterArgs {
    fn apply(self, mut filter: PeerFilter) -> PeerFilter {
        if !self.tracks.is_empty() {
            filter.tracks = self.tracks;
        }
        if !self.regions.is_empty() {
            filter.regions = self.regions;
        }
        if !self.owners.is_empty() {
            filter.owners = self.owners;
        }
        filter.min_population = self.min_population.or(filter.min_population);
        filter.max_population = self.max_population.or(filter.max_population);
        if let Some(kind) = self.facility {
            filter.qualifying_facility = kind.into();
        }
        filter.has_qualifying_facility = self.has_facility.or(filter.has_qualifying_facility);
        filter.min_facility_share_pct = self.min_facility_share.or(filter.min_facility_share_pct);
        filter.max_facility_share_pct = self.max_facility_share.or(filter.max_facility_share_pct);
        if !self.contract_start_years.is_empty() {
            filter.contract_start_years = self.contract_start_years;
        }
        if !self.current_performance_years.is_empty() {
            filter.current_performance_years = self.current_performance_years;
        }
        filter
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum FacilityArg {
    Pcp,
    Specialist,
    Fqhc,
    Rhc,
}

impl From<FacilityArg> for FacilityKind {
    fn from(arg: FacilityArg) -> Self {
        match arg {
            FacilityArg::Pcp => FacilityKind::Pcp,
            FacilityArg::Specialist => FacilityKind::Specialist,
            FacilityArg::Fqhc => FacilityKind::Fqhc,
            FacilityArg::Rhc => FacilityKind::Rhc,
        }
    }
}

#[derive(Clone, Copy, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(config_path: Option<&Path>) -> anyhow::Result<ResolvedConfig> {
    let cwd = std::env::current_dir()?;
    let resolved = config::load_and_resolve(&cwd, config_path)
        .context("failed to load configuration")?;

    if let Some(path) = &resolved.config_path {
        tracing::info!(config = %path.display(), "using config file");
    }
    Ok(resolved)
}

fn emit(format: OutputFormat, text: impl FnOnce() -> String, json: impl FnOnce() -> String) {
    match format {
        OutputFormat::Text => print!("{}", text()),
        OutputFormat::Json => println!("{}", json()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let resolved_config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Compare {
            data,
            id,
            year,
            adjust,
            metrics,
            history,
            filter,
            format,
        } => {
            let dataset = load_dataset(&data)?;

            // CLI flags override config file values
            let mut options = CompareOptions::from_config(id, &resolved_config);
            options.year = year;
            options.risk_adjusted = adjust.resolve(resolved_config.risk_adjusted);
            options.filter = filter.apply(options.filter);
            if !metrics.is_empty() {
                options.metrics = metrics
                    .iter()
                    .map(|m| m.parse::<MetricKey>())
                    .collect::<anyhow::Result<Vec<_>>>()?;
            }
            if let Some(h) = history {
                options.history_years = h;
            }

            let report = compare(&dataset, &options)?;
            emit(format, || report.render_text(), || report.render_json());
        }
        Commands::Risk { data, year, format } => {
            let dataset = load_dataset(&data)?;
            let rows = risk_table(&dataset, year)?;
            emit(
                format,
                || report::render_risk_text(&rows),
                || report::render_json(&rows),
            );
        }
        Commands::Rankings {
            data,
            year,
            sort,
            asc,
            adjust,
            search,
            top,
            format,
        } => {
            let dataset = load_dataset(&data)?;
            let key: SortKey = sort
                .parse()
                .with_context(|| format!("invalid --sort value: {}", sort))?;
            let options = RankingOptions {
                year,
                sort: SortOptions {
                    key,
                    direction: if asc {
                        SortDirection::Ascending
                    } else {
                        SortDirection::Descending
                    },
                    risk_adjusted: adjust.resolve(resolved_config.risk_adjusted),
                },
                search,
                top: top.or(resolved_config.top_n),
            };

            let report = rankings(&dataset, &options)?;
            emit(format, || report.render_text(), || report.render_json());
        }
        Commands::Distribution {
            data,
            year,
            track,
            band,
            format,
        } => {
            let dataset = load_dataset(&data)?;
            match (track, band) {
                (Some(track), Some(band)) => {
                    let band: SavingsBand = band
                        .parse()
                        .with_context(|| format!("invalid --band value: {}", band))?;
                    let report = distribution_cell(&dataset, year, &track, band)?;
                    emit(format, || report.render_text(), || report.render_json());
                }
                _ => {
                    let report = distribution(&dataset, year)?;
                    emit(format, || report.render_text(), || report.render_json());
                }
            }
        }
        Commands::Summary { data, year, format } => {
            let dataset = load_dataset(&data)?;
            let report = summary(&dataset, year)?;
            emit(format, || report.render_text(), || report.render_json());
        }
    }

    Ok(())
}
