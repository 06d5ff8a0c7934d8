//! Core types, traits, and normalization logic for spending
//!
//! This crate provides the data model shared by every spending crate, the
//! `CostSource` trait implemented by cost API clients, the flattener that
//! turns nested `ResultsByTime` responses into a flat dataset, and the
//! aggregation helpers that decide which groups are worth reporting.

pub mod aggregation;
pub mod error;
pub mod flatten;
pub mod query;
pub mod source;
pub mod types;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use aggregation::{
    DEFAULT_MATERIALITY_THRESHOLD, GroupTotal, assert_uniform_unit, group_totals,
    select_material_groups,
};
pub use error::{Result, SpendingError};
pub use flatten::{derive_group, flatten};
pub use query::{CostQuery, DateRange, Dimension, Granularity, Metric};
pub use source::CostSource;
pub use types::{Dataset, DatasetBuilder, Observation, PeriodDate, RawCostData, RegionScope};
