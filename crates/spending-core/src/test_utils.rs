//! Shared test utilities for unit tests
//!
//! Note: Integration tests (in tests/) cannot access this module because it's
//! marked with #[cfg(test)]. Integration tests have their own copy in
//! tests/common/mod.rs.

use crate::types::{
    Observation, PeriodDate, RawCostData, RawGroup, RawMetricValue, RawPeriodResult, TimePeriod,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Builder for one `ResultsByTime` element
pub struct RawPeriodBuilder {
    result: RawPeriodResult,
}

impl RawPeriodBuilder {
    /// Start a period; bounds are not validated so bad shapes can be tested
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

    pub fn build(self) -> RawPeriodResult {
        self.result
    }
}

/// Assemble raw data from `(region, periods)` pairs, in order
pub fn raw_data(regions: Vec<(&str, Vec<RawPeriodResult>)>) -> RawCostData {
    let mut data = RawCostData::new();
    for (region, periods) in regions {
        data.insert(region, periods).unwrap();
    }
    data
}

/// A USD `AmortizedCost` row for 2024-01-01
pub fn observation(region: &str, group: &str, amount: &str) -> Observation {
    Observation {
        region: region.to_string(),
        group: group.to_string(),
        metric: "AmortizedCost".to_string(),
        amount: Decimal::from_str(amount).unwrap(),
        unit: "USD".to_string(),
        start_date: PeriodDate::parse("2024-01-01").unwrap(),
        end_date: PeriodDate::parse("2024-01-02").unwrap(),
    }
}
