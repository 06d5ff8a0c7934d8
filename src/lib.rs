//! spending - Extract, store, and chart cloud spending per region
//!
//! This library provides functionality to:
//! - Query cost-and-usage data per region plus a cross-region total
//! - Flatten the nested responses into one tabular dataset
//! - Persist raw JSON and tabular CSV artifacts with stable `latest` aliases
//! - Chart the groups whose spending is material
//!
//! # Examples
//!
//! ```no_run
//! use spending::{
//!     chart::ChartRenderer,
//!     persist::{Persister, load_table},
//!     pipeline::{ExtractionPlan, Extractor},
//! };
//! use spending_provider_aws::CostExplorerSource;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> spending::Result<()> {
//!     let as_of = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
//!     let source = Arc::new(CostExplorerSource::new("us-east-1").await);
//!     let extractor = Extractor::new(source, Persister::new("cache", as_of));
//!     let report = extractor.run(&ExtractionPlan::new(as_of)).await?;
//!
//!     let dataset = load_table(&report.table.latest)?;
//!     ChartRenderer::new("img", as_of).render(&dataset)?;
//!     Ok(())
//! }
//! ```

pub mod chart;
pub mod cli;
pub mod output;
pub mod persist;
pub mod pipeline;

pub use spending_core::{aggregation, error, flatten, query, source, types};

// Re-export commonly used types
pub use error::{Result, SpendingError};
pub use types::{Dataset, Observation, RawCostData, RegionScope};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
