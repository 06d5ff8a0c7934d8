//! CLI interface for spending
//!
//! Three subcommands share the same artifact locations:
//!
//! ```bash
//! # Query the last 30 days for two regions plus the total, then summarize
//! spending fetch -r us-east-1 -r eu-west-1 --start 30
//!
//! # Chart the material groups from the latest table
//! spending plot --threshold 10
//!
//! # Per-group totals as JSON
//! spending summary --json
//! ```

use crate::error::{Result, SpendingError};
use crate::pipeline::{DEFAULT_LOOKBACK_DAYS, DEFAULT_REGIONS, ExtractionPlan};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use spending_core::query::{Dimension, Granularity, Metric};
use spending_core::types::RegionScope;
use std::path::PathBuf;

/// Extract, store, and chart cloud spending per region
#[derive(Parser, Debug, Clone)]
#[command(name = "spending")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Query the cost API and save raw and tabular artifacts
    ///
    /// The run fails after saving when the returned amounts mix units.
    Fetch(FetchArgs),
    /// Chart material groups from a saved table
    Plot(PlotArgs),
    /// Print per-group totals from a saved table
    Summary(SummaryArgs),
}

/// Arguments for `fetch`
#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// Region to query; repeat for several (replaces the defaults)
    #[arg(long = "region", short = 'r', default_values_t = DEFAULT_REGIONS.map(|r| RegionScope::Region(r.to_string())))]
    pub regions: Vec<RegionScope>,

    /// Do not query the cross-region total
    #[arg(long)]
    pub no_total: bool,

    /// Days of history to query, ending today
    #[arg(long, short = 's', default_value_t = DEFAULT_LOOKBACK_DAYS, value_parser = clap::value_parser!(u32).range(1..))]
    pub start: u32,

    /// Period size (DAILY, MONTHLY, HOURLY)
    #[arg(long, short = 'g', default_value_t = Granularity::Daily)]
    pub granularity: Granularity,

    /// Dimension to group costs by
    #[arg(long, short = 'd', default_value_t = Dimension::Service)]
    pub dimension: Dimension,

    /// Metric to request; repeat for several
    #[arg(long = "metric", short = 'm', default_values_t = [Metric::AmortizedCost])]
    pub metrics: Vec<Metric>,

    /// Directory for raw and tabular artifacts
    #[arg(long, env = "SPENDING_DATA_DIR", default_value = "cache")]
    pub data_dir: PathBuf,

    /// Date stamped on artifacts and ending the query window (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub as_of: Option<NaiveDate>,

    /// Region of the Cost Explorer endpoint
    #[arg(long, env = "SPENDING_API_REGION", default_value = "us-east-1")]
    pub api_region: String,

    /// Replay a saved raw JSON snapshot instead of calling the API
    #[arg(long)]
    pub from_raw: Option<PathBuf>,

    /// Materiality threshold for the post-run summary
    #[arg(long, default_value_t = Decimal::new(5, 0))]
    pub threshold: Decimal,
}

impl FetchArgs {
    /// Build the extraction plan for a resolved as-of date
    pub fn plan(&self, as_of: NaiveDate) -> ExtractionPlan {
        ExtractionPlan {
            regions: self.regions.clone(),
            include_total: !self.no_total,
            dimension: self.dimension,
            metrics: self.metrics.clone(),
            granularity: self.granularity,
            lookback_days: self.start,
            as_of,
        }
    }
}

/// Arguments for `plot`
#[derive(Args, Debug, Clone)]
pub struct PlotArgs {
    /// Tabular CSV to chart
    #[arg(long, env = "SPENDING_CSV", default_value = "cache/spending-latest.csv")]
    pub csv: PathBuf,

    /// Root directory for charts
    #[arg(long, env = "SPENDING_IMG_DIR", default_value = "img")]
    pub outdir: PathBuf,

    /// Groups must total more than this to be charted
    #[arg(long, default_value_t = Decimal::new(5, 0))]
    pub threshold: Decimal,

    /// Date naming the output directory (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub as_of: Option<NaiveDate>,
}

/// Arguments for `summary`
#[derive(Args, Debug, Clone)]
pub struct SummaryArgs {
    /// Tabular CSV to summarize
    #[arg(long, env = "SPENDING_CSV", default_value = "cache/spending-latest.csv")]
    pub csv: PathBuf,

    /// Groups must total more than this to be flagged material
    #[arg(long, default_value_t = Decimal::new(5, 0))]
    pub threshold: Decimal,
}

/// Parse a `YYYY-MM-DD` date
///
/// # Examples
/// ```
/// use spending::cli::parse_date;
/// use chrono::Datelike;
///
/// assert_eq!(parse_date("2024-03-31").unwrap().day(), 31);
/// assert!(parse_date("2024-03").is_err());
/// ```
pub fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
        SpendingError::InvalidDate(format!("Expected YYYY-MM-DD, got '{date_str}'"))
    })
}
