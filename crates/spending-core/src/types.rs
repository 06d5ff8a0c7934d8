//! Core domain types for spending
//!
//! This module contains the two shapes billing data takes on its way through
//! the pipeline:
//!
//! - the **raw** shape ([`RawCostData`] / [`RawPeriodResult`]), mirroring the
//!   Cost Explorer `ResultsByTime` structure, validated on ingestion and
//!   persisted verbatim;
//! - the **tabular** shape ([`Observation`] / [`Dataset`]), one flat row per
//!   (region, period, group, metric) with the amount parsed to an exact decimal.

use crate::error::{Result, SpendingError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Sentinel region meaning "cross-region total"
pub const ALL_REGIONS: &str = "all";

/// Which slice of the account a query covers
///
/// # Examples
/// ```
/// use spending_core::types::RegionScope;
///
/// let scope: RegionScope = "us-east-1".parse().unwrap();
/// assert_eq!(scope.as_str(), "us-east-1");
/// assert!("all".parse::<RegionScope>().unwrap().is_total());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegionScope {
    /// Cross-region total, no region filter applied
    All,
    /// A single region code such as `us-east-1`
    Region(String),
}

impl RegionScope {
    /// Region code, or `all` for the cross-region total
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_REGIONS,
            Self::Region(code) => code,
        }
    }

    /// Whether this scope is the cross-region total
    pub fn is_total(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl fmt::Display for RegionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RegionScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Region must not be empty".to_string());
        }
        if trimmed.eq_ignore_ascii_case(ALL_REGIONS) {
            Ok(Self::All)
        } else {
            Ok(Self::Region(trimmed.to_string()))
        }
    }
}

/// Boundary of a billing period
///
/// The API reports `YYYY-MM-DD` dates for daily and monthly granularity and
/// RFC 3339 timestamps for hourly granularity. The original string is kept so
/// persisted output matches the response byte for byte, while ordering uses
/// the parsed instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeriodDate {
    raw: String,
    at: NaiveDateTime,
}

impl PeriodDate {
    /// Parse a period boundary from either `YYYY-MM-DD` or RFC 3339
    ///
    /// # Examples
    /// ```
    /// use spending_core::types::PeriodDate;
    ///
    /// let day = PeriodDate::parse("2024-01-01").unwrap();
    /// let hour = PeriodDate::parse("2024-01-01T05:00:00Z").unwrap();
    /// assert!(day < hour);
    /// assert_eq!(hour.as_str(), "2024-01-01T05:00:00Z");
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Ok(Self {
                raw: s.to_string(),
                at: date.and_time(chrono::NaiveTime::MIN),
            });
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self {
                raw: s.to_string(),
                at: dt.naive_utc(),
            });
        }
        Err(SpendingError::InvalidDate(format!(
            "'{s}', expected YYYY-MM-DD or an RFC 3339 timestamp"
        )))
    }

    /// Build a boundary from a calendar date
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            raw: date.format("%Y-%m-%d").to_string(),
            at: date.and_time(chrono::NaiveTime::MIN),
        }
    }

    /// The boundary exactly as reported upstream
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed instant (midnight for plain dates)
    pub fn at(&self) -> NaiveDateTime {
        self.at
    }
}

impl Ord for PeriodDate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at).then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for PeriodDate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PeriodDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl Serialize for PeriodDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for PeriodDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Half-open `[start, end)` interval of one result period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TimePeriod {
    /// Inclusive start
    pub start: PeriodDate,
    /// Exclusive end
    pub end: PeriodDate,
}

/// One metric value as reported by the API (amount is still a string here)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawMetricValue {
    /// Decimal-formatted amount, may be negative for credits/refunds
    pub amount: String,
    /// Unit of the amount, e.g. `USD` or `N/A` for usage quantities
    pub unit: String,
}

/// One group within a result period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawGroup {
    /// Dimension values identifying the group (typically one)
    pub keys: Vec<String>,
    /// Metric name to value; ordered so flattening is reproducible
    pub metrics: BTreeMap<String, RawMetricValue>,
}

/// One `ResultsByTime` element returned for one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawPeriodResult {
    /// Period covered by this result
    pub time_period: TimePeriod,
    /// Ungrouped totals; empty whenever a GroupBy is requested
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub total: BTreeMap<String, RawMetricValue>,
    /// Per-group metrics
    pub groups: Vec<RawGroup>,
    /// Whether the API flagged the period as an estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated: Option<bool>,
}

impl RawPeriodResult {
    /// Check the shape invariants for a result belonging to `region`
    ///
    /// The period must satisfy `start < end` and every group must carry at
    /// least one key.
    pub fn validate(&self, region: &str) -> Result<()> {
        if self.time_period.start >= self.time_period.end {
            return Err(SpendingError::missing_data(
                region,
                format!(
                    "time period {}..{} is empty or reversed",
                    self.time_period.start, self.time_period.end
                ),
            ));
        }
        for group in &self.groups {
            if group.keys.is_empty() {
                return Err(SpendingError::missing_data(
                    region,
                    format!("group without keys in period starting {}", self.time_period.start),
                ));
            }
        }
        Ok(())
    }

    /// Check that every metric in the period was asked for
    ///
    /// A metric outside `requested` means the response does not answer the
    /// query, so it is reported as [`SpendingError::MissingData`].
    pub fn check_metrics(&self, region: &str, requested: &[&str]) -> Result<()> {
        let unexpected = self
            .groups
            .iter()
            .flat_map(|group| group.metrics.keys())
            .find(|name| !requested.contains(&name.as_str()));
        match unexpected {
            Some(name) => Err(SpendingError::missing_data(
                region,
                format!(
                    "metric {name} in period starting {} was not requested (expected {})",
                    self.time_period.start,
                    requested.join(", ")
                ),
            )),
            None => Ok(()),
        }
    }
}

/// Raw results for every queried region, in query order
///
/// Serializes to the persisted raw JSON layout
/// `{region: [ResultsByTime...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCostData {
    regions: Vec<(String, Vec<RawPeriodResult>)>,
}

impl RawCostData {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the validated results for one region
    ///
    /// Fails if any result violates its shape invariants or if the region was
    /// already added.
    pub fn insert(&mut self, region: impl Into<String>, results: Vec<RawPeriodResult>) -> Result<()> {
        let region = region.into();
        if self.get(&region).is_some() {
            return Err(SpendingError::InvalidArgument(format!(
                "region '{region}' appears more than once"
            )));
        }
        for result in &results {
            result.validate(&region)?;
        }
        self.regions.push((region, results));
        Ok(())
    }

    /// Results for one region
    pub fn get(&self, region: &str) -> Option<&[RawPeriodResult]> {
        self.regions
            .iter()
            .find(|(name, _)| name == region)
            .map(|(_, results)| results.as_slice())
    }

    /// Iterate regions in insertion order
    pub fn regions(&self) -> impl Iterator<Item = (&str, &[RawPeriodResult])> {
        self.regions
            .iter()
            .map(|(name, results)| (name.as_str(), results.as_slice()))
    }

    /// Number of regions
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether no region has been added
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Parse a persisted raw snapshot
    ///
    /// Each region must map to a list of `ResultsByTime` entries. A region
    /// whose value has any other shape fails with
    /// [`SpendingError::MissingData`] naming that region.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(map) = value else {
            return Err(SpendingError::InvalidArgument(
                "raw snapshot must be a JSON object keyed by region".to_string(),
            ));
        };

        let mut data = Self::new();
        for (region, listing) in map {
            if !listing.is_array() {
                return Err(SpendingError::missing_data(
                    &region,
                    "expected a list of ResultsByTime entries",
                ));
            }
            let results: Vec<RawPeriodResult> = serde_json::from_value(listing)
                .map_err(|e| SpendingError::missing_data(&region, e.to_string()))?;
            data.insert(region, results)?;
        }
        Ok(data)
    }

    /// Render as pretty-printed JSON
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for RawCostData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.regions.iter().map(|(name, results)| (name, results)))
    }
}

/// One flattened row of the tabular model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Region code, or `all` for the cross-region total
    pub region: String,
    /// Normalized group key, see [`crate::flatten::derive_group`]
    pub group: String,
    /// Metric name such as `AmortizedCost`
    pub metric: String,
    /// Exact amount; negative for credits and refunds
    pub amount: Decimal,
    /// Unit of `amount`
    pub unit: String,
    /// Inclusive period start
    pub start_date: PeriodDate,
    /// Exclusive period end
    pub end_date: PeriodDate,
}

impl Observation {
    /// Whether this row belongs to the cross-region total
    pub fn is_total(&self) -> bool {
        self.region == ALL_REGIONS
    }
}

/// The finished, read-only table of one extraction run
///
/// Row order is region order × period order × group order × metric order.
/// A `Dataset` is only produced by [`DatasetBuilder::finish`] or by collecting
/// observations, so it is never observed half-built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    /// All rows in insertion order
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Iterate rows in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.observations.iter()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct groups in first-seen order
    pub fn groups(&self) -> Vec<&str> {
        Self::distinct(self.iter().map(|o| o.group.as_str()))
    }

    /// Distinct regions in first-seen order
    pub fn regions(&self) -> Vec<&str> {
        Self::distinct(self.iter().map(|o| o.region.as_str()))
    }

    /// Distinct metrics in first-seen order
    pub fn metrics(&self) -> Vec<&str> {
        Self::distinct(self.iter().map(|o| o.metric.as_str()))
    }

    /// Distinct units in first-seen order
    pub fn units(&self) -> Vec<&str> {
        Self::distinct(self.iter().map(|o| o.unit.as_str()))
    }

    fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
        let mut seen = HashSet::new();
        values.filter(|v| seen.insert(*v)).collect()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Observation> for Dataset {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self {
            observations: iter.into_iter().collect(),
        }
    }
}

/// Append-only builder for a [`Dataset`]
///
/// # Examples
/// ```
/// use spending_core::types::{DatasetBuilder, Observation, PeriodDate};
/// use rust_decimal::Decimal;
///
/// let mut builder = DatasetBuilder::new();
/// builder.push(Observation {
///     region: "us-east-1".to_string(),
///     group: "amazon-ec2".to_string(),
///     metric: "AmortizedCost".to_string(),
///     amount: Decimal::new(1000, 2),
///     unit: "USD".to_string(),
///     start_date: PeriodDate::parse("2024-01-01").unwrap(),
///     end_date: PeriodDate::parse("2024-01-02").unwrap(),
/// });
/// let dataset = builder.finish();
/// assert_eq!(dataset.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct DatasetBuilder {
    observations: Vec<Observation>,
}

impl DatasetBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with room for `capacity` rows
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            observations: Vec::with_capacity(capacity),
        }
    }

    /// Append one row
    pub fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    /// Rows appended so far
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Seal the builder into a read-only dataset
    pub fn finish(self) -> Dataset {
        Dataset {
            observations: self.observations,
        }
    }
}
