//! Query vocabulary for the cost API
//!
//! The enums here mirror the Cost Explorer `GetCostAndUsage` parameters that
//! the pipeline exposes. Each one parses case-insensitively from its API name
//! and displays back as the API name, so they can be used directly as CLI
//! values and as request parameters.

use crate::error::{Result, SpendingError};
use crate::types::RegionScope;
use chrono::{Days, NaiveDate};
use std::fmt;
use std::str::FromStr;

fn normalize_choice(s: &str) -> String {
    s.trim().to_ascii_uppercase().replace('-', "_")
}

/// Dimension used for the GroupBy clause
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Availability zone
    Az,
    InstanceType,
    LegalEntityName,
    InvoicingEntity,
    LinkedAccount,
    Operation,
    Platform,
    PurchaseType,
    #[default]
    Service,
    Tenancy,
    RecordType,
    UsageType,
}

impl Dimension {
    /// Every supported dimension
    pub const ALL: [Dimension; 12] = [
        Self::Az,
        Self::InstanceType,
        Self::LegalEntityName,
        Self::InvoicingEntity,
        Self::LinkedAccount,
        Self::Operation,
        Self::Platform,
        Self::PurchaseType,
        Self::Service,
        Self::Tenancy,
        Self::RecordType,
        Self::UsageType,
    ];

    /// Name as sent to the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Az => "AZ",
            Self::InstanceType => "INSTANCE_TYPE",
            Self::LegalEntityName => "LEGAL_ENTITY_NAME",
            Self::InvoicingEntity => "INVOICING_ENTITY",
            Self::LinkedAccount => "LINKED_ACCOUNT",
            Self::Operation => "OPERATION",
            Self::Platform => "PLATFORM",
            Self::PurchaseType => "PURCHASE_TYPE",
            Self::Service => "SERVICE",
            Self::Tenancy => "TENANCY",
            Self::RecordType => "RECORD_TYPE",
            Self::UsageType => "USAGE_TYPE",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = normalize_choice(s);
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == wanted)
            .ok_or_else(|| {
                let choices: Vec<_> = Self::ALL.iter().map(|d| d.as_str()).collect();
                format!("Invalid dimension: {s} (expected one of {})", choices.join(", "))
            })
    }
}

/// Cost or usage metric to retrieve
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Metric {
    #[default]
    AmortizedCost,
    BlendedCost,
    NetAmortizedCost,
    NetUnblendedCost,
    NormalizedUsageAmount,
    UnblendedCost,
    UsageQuantity,
}

impl Metric {
    /// Every supported metric
    pub const ALL: [Metric; 7] = [
        Self::AmortizedCost,
        Self::BlendedCost,
        Self::NetAmortizedCost,
        Self::NetUnblendedCost,
        Self::NormalizedUsageAmount,
        Self::UnblendedCost,
        Self::UsageQuantity,
    ];

    /// Name as sent to (and returned by) the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AmortizedCost => "AmortizedCost",
            Self::BlendedCost => "BlendedCost",
            Self::NetAmortizedCost => "NetAmortizedCost",
            Self::NetUnblendedCost => "NetUnblendedCost",
            Self::NormalizedUsageAmount => "NormalizedUsageAmount",
            Self::UnblendedCost => "UnblendedCost",
            Self::UsageQuantity => "UsageQuantity",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().replace(['-', '_'], "");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                let choices: Vec<_> = Self::ALL.iter().map(|m| m.as_str()).collect();
                format!("Invalid metric: {s} (expected one of {})", choices.join(", "))
            })
    }
}

/// Time bucket size of the returned periods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Granularity {
    #[default]
    Daily,
    Monthly,
    Hourly,
}

impl Granularity {
    /// Name as sent to the API
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Monthly => "MONTHLY",
            Self::Hourly => "HOURLY",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_choice(s).as_str() {
            "DAILY" => Ok(Self::Daily),
            "MONTHLY" => Ok(Self::Monthly),
            "HOURLY" => Ok(Self::Hourly),
            _ => Err(format!(
                "Invalid granularity: {s} (expected one of DAILY, MONTHLY, HOURLY)"
            )),
        }
    }
}

/// Half-open `[start, end)` date range of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, requiring `start < end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(SpendingError::InvalidDate(format!(
                "range start {start} must be before end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering `days` days and ending after `as_of` (inclusive of it)
    ///
    /// # Examples
    /// ```
    /// use spending_core::query::DateRange;
    /// use chrono::NaiveDate;
    ///
    /// let as_of = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
    /// let range = DateRange::lookback(as_of, 90).unwrap();
    /// assert_eq!(range.end_str(), "2024-04-01");
    /// assert_eq!(range.start_str(), "2024-01-02");
    /// ```
    pub fn lookback(as_of: NaiveDate, days: u32) -> Result<Self> {
        if days == 0 {
            return Err(SpendingError::InvalidArgument(
                "lookback window must be at least one day".to_string(),
            ));
        }
        let end = as_of
            .checked_add_days(Days::new(1))
            .ok_or_else(|| SpendingError::InvalidDate(format!("{as_of} is out of range")))?;
        let start = end.checked_sub_days(Days::new(u64::from(days))).ok_or_else(|| {
            SpendingError::InvalidDate(format!("{days} days before {end} is out of range"))
        })?;
        Self::new(start, end)
    }

    /// Inclusive start
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive end
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Start formatted as `YYYY-MM-DD`
    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// End formatted as `YYYY-MM-DD`
    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

/// Everything a [`crate::source::CostSource`] needs for one region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostQuery {
    /// Region filter, or the cross-region total
    pub region: RegionScope,
    /// GroupBy dimension
    pub dimension: Dimension,
    /// Requested metrics, never empty
    pub metrics: Vec<Metric>,
    /// Period size
    pub granularity: Granularity,
    /// Half-open date range
    pub period: DateRange,
}

impl CostQuery {
    /// Create a query, rejecting an empty metric list
    pub fn new(
        region: RegionScope,
        dimension: Dimension,
        metrics: Vec<Metric>,
        granularity: Granularity,
        period: DateRange,
    ) -> Result<Self> {
        if metrics.is_empty() {
            return Err(SpendingError::InvalidArgument(
                "at least one metric is required".to_string(),
            ));
        }
        Ok(Self {
            region,
            dimension,
            metrics,
            granularity,
            period,
        })
    }

    /// Metric names as sent to the API
    pub fn metric_names(&self) -> Vec<&'static str> {
        self.metrics.iter().map(Metric::as_str).collect()
    }
}
