//! Flattener turning nested per-region results into a tabular [`Dataset`]
//!
//! Every (region, period, group, metric) tuple of the raw response becomes
//! exactly one [`Observation`]. The transformation is pure: no network, no
//! filesystem, and nothing is dropped or deduplicated.
//!
//! # Examples
//!
//! ```
//! use spending_core::flatten::{derive_group, flatten};
//! use spending_core::types::RawCostData;
//!
//! assert_eq!(derive_group(["EC2", "US East"]), "ec2_us-east");
//!
//! let raw = RawCostData::from_json_str(r#"{
//!     "us-east-1": [{
//!         "TimePeriod": {"Start": "2024-01-01", "End": "2024-01-02"},
//!         "Groups": [{"Keys": ["Amazon EC2"],
//!                     "Metrics": {"AmortizedCost": {"Amount": "10.00", "Unit": "USD"}}}]
//!     }]
//! }"#).unwrap();
//!
//! let dataset = flatten(&raw).unwrap();
//! assert_eq!(dataset.len(), 1);
//! assert_eq!(dataset.observations()[0].group, "amazon-ec2");
//! ```

use crate::error::{Result, SpendingError};
use crate::types::{Dataset, DatasetBuilder, Observation, RawCostData};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info};

/// Normalize a group's keys into a single group name
///
/// Keys are joined with `_`, lowercased, and spaces become `-`. Distinct key
/// tuples that only differ in case or in space/dash placement collapse to the
/// same name.
pub fn derive_group<I, S>(keys: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = keys
        .into_iter()
        .map(|k| k.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("_");
    joined.to_lowercase().replace(' ', "-")
}

/// Parse an API amount string into an exact decimal
///
/// Accepts plain decimals (`-12.50`) and the scientific notation the API uses
/// for tiny amounts (`1.5E-7`). Returns `None` for anything else.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

/// Flatten raw results of every region into one dataset
///
/// Row order follows region order, then period, group and metric order.
/// An amount that does not parse aborts the whole flattening with
/// [`SpendingError::MalformedAmount`].
pub fn flatten(raw: &RawCostData) -> Result<Dataset> {
    let capacity = raw
        .regions()
        .flat_map(|(_, results)| results.iter())
        .flat_map(|period| period.groups.iter())
        .map(|group| group.metrics.len())
        .sum();
    let mut builder = DatasetBuilder::with_capacity(capacity);

    for (region, results) in raw.regions() {
        info!("Adding {} to the dataset", region);
        let before = builder.len();

        for period in results {
            period.validate(region)?;
            let start = &period.time_period.start;
            let end = &period.time_period.end;
            debug!(
                "Region {} period {}..{}: {} groups",
                region,
                start,
                end,
                period.groups.len()
            );

            for item in &period.groups {
                let group = derive_group(&item.keys);
                for (metric, value) in &item.metrics {
                    let amount = parse_amount(&value.amount).ok_or_else(|| {
                        SpendingError::MalformedAmount {
                            region: region.to_string(),
                            group: group.clone(),
                            metric: metric.clone(),
                            amount: value.amount.clone(),
                        }
                    })?;

                    builder.push(Observation {
                        region: region.to_string(),
                        group: group.clone(),
                        metric: metric.clone(),
                        amount,
                        unit: value.unit.clone(),
                        start_date: start.clone(),
                        end_date: end.clone(),
                    });
                }
            }
        }

        debug!("Region {} contributed {} rows", region, builder.len() - before);
    }

    Ok(builder.finish())
}
