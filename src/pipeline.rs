//! Extraction pipeline: query every region, persist raw, flatten, persist table
//!
//! Regions are queried one after another. The raw artifact is written only
//! after every region answered, and the table only after the whole response
//! flattened cleanly, so a failed run leaves at most the raw snapshot behind.
//!
//! # Examples
//!
//! ```no_run
//! use spending::{
//!     persist::{Persister, RawSnapshotSource},
//!     pipeline::{ExtractionPlan, Extractor},
//! };
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! # async fn example() -> spending::Result<()> {
//! let as_of = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
//! let source = Arc::new(RawSnapshotSource::load("cache/spending-latest.json")?);
//! let extractor = Extractor::new(source, Persister::new("cache", as_of));
//!
//! let report = extractor.run(&ExtractionPlan::new(as_of)).await?;
//! println!("{} rows written to {}", report.dataset.len(), report.table.latest.display());
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::persist::{Persister, SavedArtifact};
use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use spending_core::flatten::flatten;
use spending_core::query::{CostQuery, DateRange, Dimension, Granularity, Metric};
use spending_core::source::CostSource;
use spending_core::types::{Dataset, RawCostData, RegionScope};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Regions queried when none are given
pub const DEFAULT_REGIONS: [&str; 4] = ["us-east-1", "us-east-2", "us-west-1", "us-west-2"];

/// Days of history queried when no lookback is given
pub const DEFAULT_LOOKBACK_DAYS: u32 = 90;

/// What one extraction run asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    /// Regions in query order
    pub regions: Vec<RegionScope>,
    /// Append the cross-region total when it is not listed
    pub include_total: bool,
    /// GroupBy dimension
    pub dimension: Dimension,
    /// Requested metrics
    pub metrics: Vec<Metric>,
    /// Period size
    pub granularity: Granularity,
    /// Days of history, ending with `as_of`
    pub lookback_days: u32,
    /// Date the run is stamped with
    pub as_of: NaiveDate,
}

impl ExtractionPlan {
    /// Plan with the documented defaults for the given date
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            regions: DEFAULT_REGIONS
                .iter()
                .map(|code| RegionScope::Region((*code).to_string()))
                .collect(),
            include_total: true,
            dimension: Dimension::default(),
            metrics: vec![Metric::default()],
            granularity: Granularity::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            as_of,
        }
    }

    /// Regions actually queried: deduplicated, with `all` appended if wanted
    pub fn scopes(&self) -> Vec<RegionScope> {
        let mut scopes: Vec<RegionScope> = Vec::with_capacity(self.regions.len() + 1);
        for region in &self.regions {
            if !scopes.contains(region) {
                scopes.push(region.clone());
            }
        }
        if self.include_total && !scopes.contains(&RegionScope::All) {
            scopes.push(RegionScope::All);
        }
        scopes
    }

    /// One query per scope
    pub fn queries(&self) -> Result<Vec<CostQuery>> {
        let period = DateRange::lookback(self.as_of, self.lookback_days)?;
        self.scopes()
            .into_iter()
            .map(|region| {
                CostQuery::new(
                    region,
                    self.dimension,
                    self.metrics.clone(),
                    self.granularity,
                    period,
                )
            })
            .collect()
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Where the raw JSON went
    pub raw: SavedArtifact,
    /// Where the CSV table went
    pub table: SavedArtifact,
    /// The flattened rows
    pub dataset: Dataset,
}

/// Runs an [`ExtractionPlan`] against a cost source
pub struct Extractor {
    source: Arc<dyn CostSource>,
    persister: Persister,
    show_progress: bool,
}

impl Extractor {
    /// Create an extractor writing through `persister`
    pub fn new(source: Arc<dyn CostSource>, persister: Persister) -> Self {
        Self {
            source,
            persister,
            show_progress: false,
        }
    }

    /// Show a spinner while regions are queried
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    fn spinner(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }

    /// Query every scope in order and collect the raw results
    ///
    /// Each response may only carry the metrics its query asked for.
    pub async fn collect(&self, plan: &ExtractionPlan) -> Result<RawCostData> {
        let queries = plan.queries()?;
        let spinner = self.spinner();
        let mut data = RawCostData::new();

        for query in &queries {
            if let Some(pb) = &spinner {
                pb.set_message(format!("Querying {} via {}", query.region, self.source.name()));
            }
            let results = match self.source.fetch(query).await {
                Ok(results) => results,
                Err(e) => {
                    if let Some(pb) = &spinner {
                        pb.abandon_with_message(format!("Query for {} failed", query.region));
                    }
                    return Err(e);
                }
            };
            info!("Received {} periods for {}", results.len(), query.region);
            let requested = query.metric_names();
            if let Err(e) = results
                .iter()
                .try_for_each(|period| period.check_metrics(query.region.as_str(), &requested))
            {
                if let Some(pb) = &spinner {
                    pb.abandon_with_message(format!("Response for {} rejected", query.region));
                }
                return Err(e);
            }
            data.insert(query.region.as_str(), results)?;
        }

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        Ok(data)
    }

    /// Full run: collect, save raw, flatten, save table
    pub async fn run(&self, plan: &ExtractionPlan) -> Result<ExtractionReport> {
        let data = self.collect(plan).await?;
        let raw = self.persister.save_raw(&data)?;

        let dataset = flatten(&data)?;
        info!(
            "Flattened {} regions into {} observations",
            data.len(),
            dataset.len()
        );
        let table = self.persister.save_table(&dataset)?;

        Ok(ExtractionReport {
            raw,
            table,
            dataset,
        })
    }
}
