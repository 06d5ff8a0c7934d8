//! Common test utilities for spending integration tests
//!
//! Fixture builders for raw API periods and an in-memory cost source that
//! answers queries from canned per-region results.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use spending::{
    error::{Result, SpendingError},
    query::CostQuery,
    source::CostSource,
    types::{PeriodDate, RawGroup, RawMetricValue, RawPeriodResult, TimePeriod},
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Date every fixture run is stamped with
pub fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

/// Builder for one `ResultsByTime` element
pub struct PeriodBuilder {
    result: RawPeriodResult,
}

impl PeriodBuilder {
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            result: RawPeriodResult {
                time_period: TimePeriod {
                    start: PeriodDate::parse(start).unwrap(),
                    end: PeriodDate::parse(end).unwrap(),
                },
                total: BTreeMap::new(),
                groups: Vec::new(),
                estimated: None,
            },
        }
    }

    /// Add a group with `(metric, amount, unit)` entries
    pub fn group(mut self, keys: &[&str], metrics: &[(&str, &str, &str)]) -> Self {
        self.result.groups.push(RawGroup {
            keys: keys.iter().map(|k| k.to_string()).collect(),
            metrics: metrics
                .iter()
                .map(|(name, amount, unit)| {
                    (
                        name.to_string(),
                        RawMetricValue {
                            amount: amount.to_string(),
                            unit: unit.to_string(),
                        },
                    )
                })
                .collect(),
        });
        self
    }

    /// Shorthand for a single-key USD `AmortizedCost` group
    pub fn cost(self, key: &str, amount: &str) -> Self {
        self.group(&[key], &[("AmortizedCost", amount, "USD")])
    }

    pub fn build(self) -> RawPeriodResult {
        self.result
    }
}

/// In-memory cost source keyed by region name
#[derive(Default)]
pub struct StaticSource {
    responses: HashMap<String, Vec<RawPeriodResult>>,
    queried: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `region` with `periods`
    pub fn with_region(mut self, region: &str, periods: Vec<RawPeriodResult>) -> Self {
        self.responses.insert(region.to_string(), periods);
        self
    }

    /// Regions queried so far, in order
    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl CostSource for StaticSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, query: &CostQuery) -> Result<Vec<RawPeriodResult>> {
        let region = query.region.as_str();
        self.queried.lock().unwrap().push(region.to_string());
        self.responses
            .get(region)
            .cloned()
            .ok_or_else(|| SpendingError::missing_data(region, "ResultsByTime missing from response"))
    }
}

/// Two days of EC2, S3 and tax spending for one region
pub fn two_day_periods(ec2: [&str; 2]) -> Vec<RawPeriodResult> {
    vec![
        PeriodBuilder::new("2024-01-01", "2024-01-02")
            .cost("Amazon EC2", ec2[0])
            .cost("Amazon Simple Storage Service", "0.40")
            .cost("Tax", "0.10")
            .build(),
        PeriodBuilder::new("2024-01-02", "2024-01-03")
            .cost("Amazon EC2", ec2[1])
            .cost("Amazon Simple Storage Service", "0.45")
            .build(),
    ]
}
