//! Cost source trait for query clients
//!
//! This module defines the `CostSource` trait that every backend of cost data
//! implements: the live Cost Explorer client in `spending-provider-aws`, the
//! raw snapshot replayer in the `spending` binary, and in-memory fixtures in
//! tests.

use crate::error::Result;
use crate::query::CostQuery;
use crate::types::RawPeriodResult;
use async_trait::async_trait;

/// Trait for backends that answer one region's cost query.
///
/// Implementations resolve pagination themselves and return every
/// `ResultsByTime` element for the query, in period order. A response that
/// lacks the result container must fail with
/// [`crate::error::SpendingError::MissingData`] naming the queried region.
#[async_trait]
pub trait CostSource: Send + Sync {
    /// Short name for log lines
    fn name(&self) -> &str;

    /// Fetch all result periods for one query
    async fn fetch(&self, query: &CostQuery) -> Result<Vec<RawPeriodResult>>;
}
