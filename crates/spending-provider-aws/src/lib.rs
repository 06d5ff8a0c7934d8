//! AWS Cost Explorer provider for spending
//!
//! This crate implements the `CostSource` trait on top of the AWS SDK,
//! translating SDK result types into the validated raw model of
//! `spending-core`.

pub mod cost_explorer;

pub use cost_explorer::{CostExplorerSource, DEFAULT_API_REGION};
