//! AWS Cost Explorer client implementing [`CostSource`]
//!
//! One `GetCostAndUsage` call per region, grouped by a single dimension and
//! filtered on the `REGION` dimension unless the cross-region total is
//! requested. Pages are followed until the API stops returning a
//! `NextPageToken`. Credentials come from the default AWS provider chain.
//!
//! # Examples
//!
//! ```no_run
//! use spending_core::{CostQuery, CostSource, DateRange, Dimension, Granularity, Metric, RegionScope};
//! use spending_provider_aws::CostExplorerSource;
//! use chrono::NaiveDate;
//!
//! # async fn example() -> spending_core::Result<()> {
//! let source = CostExplorerSource::new("us-east-1").await;
//! let query = CostQuery::new(
//!     RegionScope::All,
//!     Dimension::Service,
//!     vec![Metric::AmortizedCost],
//!     Granularity::Daily,
//!     DateRange::lookback(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(), 30)?,
//! )?;
//! let periods = source.fetch(&query).await?;
//! println!("{} periods", periods.len());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use aws_sdk_costexplorer::Client;
use aws_sdk_costexplorer::config::Region;
use aws_sdk_costexplorer::error::DisplayErrorContext;
use aws_sdk_costexplorer::types::{
    DateInterval, Dimension as ApiDimension, DimensionValues, Expression,
    Granularity as ApiGranularity, GroupDefinition, GroupDefinitionType, MetricValue,
    ResultByTime,
};
use spending_core::error::{Result, SpendingError};
use spending_core::query::{CostQuery, Granularity};
use spending_core::source::CostSource;
use spending_core::types::{
    PeriodDate, RawGroup, RawMetricValue, RawPeriodResult, RegionScope, TimePeriod,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Cost Explorer is a global service served from us-east-1
pub const DEFAULT_API_REGION: &str = "us-east-1";

/// Cost source backed by the AWS Cost Explorer API
#[derive(Debug, Clone)]
pub struct CostExplorerSource {
    client: Client,
}

impl CostExplorerSource {
    /// Create a client for the given API endpoint region
    pub async fn new(api_region: impl Into<String>) -> Self {
        let api_region = api_region.into();
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(api_region.clone()))
            .load()
            .await;
        debug!(api_region = %api_region, "Cost Explorer client initialized");
        Self::from_client(Client::new(&config))
    }

    /// Wrap an already configured SDK client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Filter restricting the query to one region, `None` for the total
    pub fn region_filter(region: &RegionScope) -> Option<Expression> {
        match region {
            RegionScope::All => None,
            RegionScope::Region(code) => Some(
                Expression::builder()
                    .dimensions(
                        DimensionValues::builder()
                            .key(ApiDimension::Region)
                            .values(code.clone())
                            .build(),
                    )
                    .build(),
            ),
        }
    }

    fn api_granularity(granularity: Granularity) -> ApiGranularity {
        match granularity {
            Granularity::Daily => ApiGranularity::Daily,
            Granularity::Monthly => ApiGranularity::Monthly,
            Granularity::Hourly => ApiGranularity::Hourly,
        }
    }

    fn convert_metrics(
        region: &str,
        keys: &[String],
        metrics: &HashMap<String, MetricValue>,
    ) -> Result<BTreeMap<String, RawMetricValue>> {
        metrics
            .iter()
            .map(|(name, value)| {
                let (Some(amount), Some(unit)) = (value.amount(), value.unit()) else {
                    return Err(SpendingError::missing_data(
                        region,
                        format!("metric {name} of group {keys:?} lacks Amount or Unit"),
                    ));
                };
                Ok((
                    name.clone(),
                    RawMetricValue {
                        amount: amount.to_string(),
                        unit: unit.to_string(),
                    },
                ))
            })
            .collect()
    }

    /// Convert one SDK result period into the validated raw model
    pub fn convert_period(region: &str, item: &ResultByTime) -> Result<RawPeriodResult> {
        let interval = item
            .time_period()
            .ok_or_else(|| SpendingError::missing_data(region, "TimePeriod missing from result"))?;
        let time_period = TimePeriod {
            start: PeriodDate::parse(interval.start())?,
            end: PeriodDate::parse(interval.end())?,
        };

        let mut groups = Vec::with_capacity(item.groups().len());
        for group in item.groups() {
            let metrics = group.metrics().ok_or_else(|| {
                SpendingError::missing_data(
                    region,
                    format!("group {:?} has no Metrics", group.keys()),
                )
            })?;
            groups.push(RawGroup {
                keys: group.keys().to_vec(),
                metrics: Self::convert_metrics(region, group.keys(), metrics)?,
            });
        }

        let total = match item.total() {
            Some(total) => Self::convert_metrics(region, &[], total)?,
            None => BTreeMap::new(),
        };

        let result = RawPeriodResult {
            time_period,
            total,
            groups,
            estimated: Some(item.estimated()),
        };
        result.validate(region)?;
        Ok(result)
    }
}

#[async_trait]
impl CostSource for CostExplorerSource {
    fn name(&self) -> &str {
        "aws-cost-explorer"
    }

    async fn fetch(&self, query: &CostQuery) -> Result<Vec<RawPeriodResult>> {
        let region = query.region.as_str();
        info!(
            "Querying {} cost by {} for {}",
            query.granularity.as_str().to_lowercase(),
            query.dimension,
            region
        );

        let interval = DateInterval::builder()
            .start(query.period.start_str())
            .end(query.period.end_str())
            .build()
            .map_err(|e| SpendingError::InvalidArgument(e.to_string()))?;
        let group_by = GroupDefinition::builder()
            .r#type(GroupDefinitionType::Dimension)
            .key(query.dimension.as_str())
            .build();
        let metrics: Vec<String> = query.metric_names().into_iter().map(String::from).collect();
        let filter = Self::region_filter(&query.region);

        let mut results = Vec::new();
        let mut next_page_token: Option<String> = None;
        loop {
            let output = self
                .client
                .get_cost_and_usage()
                .time_period(interval.clone())
                .granularity(Self::api_granularity(query.granularity))
                .group_by(group_by.clone())
                .set_metrics(Some(metrics.clone()))
                .set_filter(filter.clone())
                .set_next_page_token(next_page_token.take())
                .send()
                .await
                .map_err(|e| SpendingError::Api(format!("{region}: {}", DisplayErrorContext(&e))))?;

            let Some(page) = output.results_by_time else {
                return Err(SpendingError::missing_data(
                    region,
                    "ResultsByTime missing from response",
                ));
            };
            for item in &page {
                results.push(Self::convert_period(region, item)?);
            }
            debug!("Region {}: {} periods so far", region, results.len());

            match output.next_page_token {
                Some(token) if !token.is_empty() => next_page_token = Some(token),
                _ => break,
            }
        }

        Ok(results)
    }
}
