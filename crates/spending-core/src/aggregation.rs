//! Aggregation and materiality filtering
//!
//! Groups whose total across every region and metric does not exceed a
//! threshold are left out of reports and charts. The decision is never
//! persisted: consumers re-run [`select_material_groups`] over the reloaded
//! dataset so the threshold can change without re-querying the API. Rows of
//! immaterial groups stay in the dataset.

use crate::error::{Result, SpendingError};
use crate::types::Dataset;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

/// Default materiality threshold, in dataset units
pub const DEFAULT_MATERIALITY_THRESHOLD: Decimal = Decimal::from_parts(5, 0, 0, false, 0);

/// Sum of all amounts recorded for one group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTotal {
    /// Normalized group key
    pub group: String,
    /// Sum over every region and metric
    pub total_amount: Decimal,
}

impl GroupTotal {
    /// Whether the total strictly exceeds `threshold`
    pub fn is_material(&self, threshold: Decimal) -> bool {
        self.total_amount > threshold
    }
}

/// Per-group totals in first-seen group order
///
/// Fails with [`SpendingError::AmountOverflow`] when a group's sum leaves the
/// decimal range.
pub fn group_totals(dataset: &Dataset) -> Result<Vec<GroupTotal>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut totals: Vec<GroupTotal> = Vec::new();

    for obs in dataset {
        match index.get(obs.group.as_str()) {
            Some(&i) => {
                let total = &mut totals[i];
                total.total_amount = total.total_amount.checked_add(obs.amount).ok_or_else(|| {
                    SpendingError::AmountOverflow {
                        group: obs.group.clone(),
                    }
                })?;
            }
            None => {
                index.insert(obs.group.as_str(), totals.len());
                totals.push(GroupTotal {
                    group: obs.group.clone(),
                    total_amount: obs.amount,
                });
            }
        }
    }

    Ok(totals)
}

/// Groups whose total strictly exceeds `threshold`
///
/// Totals include the cross-region `all` rows as well as every metric. A
/// group whose total equals the threshold is not material.
///
/// # Examples
/// ```
/// use spending_core::aggregation::{DEFAULT_MATERIALITY_THRESHOLD, select_material_groups};
/// use spending_core::types::{Dataset, Observation, PeriodDate};
/// use rust_decimal::Decimal;
///
/// let row = |group: &str, cents: i64| Observation {
///     region: "us-east-1".to_string(),
///     group: group.to_string(),
///     metric: "AmortizedCost".to_string(),
///     amount: Decimal::new(cents, 2),
///     unit: "USD".to_string(),
///     start_date: PeriodDate::parse("2024-01-01").unwrap(),
///     end_date: PeriodDate::parse("2024-01-02").unwrap(),
/// };
/// let dataset: Dataset = vec![row("amazon-ec2", 501), row("amazon-s3", 500)]
///     .into_iter()
///     .collect();
///
/// let material = select_material_groups(&dataset, DEFAULT_MATERIALITY_THRESHOLD).unwrap();
/// assert!(material.contains("amazon-ec2"));
/// assert!(!material.contains("amazon-s3"));
/// ```
pub fn select_material_groups(dataset: &Dataset, threshold: Decimal) -> Result<BTreeSet<String>> {
    let mut keepers = BTreeSet::new();
    for total in group_totals(dataset)? {
        if total.is_material(threshold) {
            keepers.insert(total.group);
        } else {
            info!(
                "Skipping {} - total across regions is {} (not above {})",
                total.group, total.total_amount, threshold
            );
        }
    }
    Ok(keepers)
}

/// The single unit shared by every observation
///
/// Fails with [`SpendingError::InconsistentUnits`] when more than one unit is
/// present and with [`SpendingError::EmptyDataset`] when there are no rows.
pub fn assert_uniform_unit(dataset: &Dataset) -> Result<String> {
    let units = dataset.units();
    match units.as_slice() {
        [] => Err(SpendingError::EmptyDataset),
        [unit] => Ok((*unit).to_string()),
        _ => Err(SpendingError::InconsistentUnits {
            units: units.iter().map(|u| u.to_string()).collect(),
        }),
    }
}
