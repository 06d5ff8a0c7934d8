//! Error types for spending
//!
//! This module defines the error types used throughout the spending crates.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! Every error in the normalization pipeline is fatal at the point of
//! detection: billing data is never coerced, truncated or partially kept.
//!
//! # Example
//!
//! ```
//! use spending_core::error::{SpendingError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to SpendingError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for spending operations
#[derive(Error, Debug)]
pub enum SpendingError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The upstream response for a region does not have the expected shape
    #[error("Missing data for region '{region}': {reason}")]
    MissingData {
        /// Region code (or `all`) whose response was rejected
        region: String,
        /// What was missing or malformed
        reason: String,
    },

    /// An amount string could not be parsed as a decimal
    #[error("Malformed amount '{amount}' for region '{region}', group '{group}', metric '{metric}'")]
    MalformedAmount {
        /// Region the amount belongs to
        region: String,
        /// Normalized group key
        group: String,
        /// Metric name
        metric: String,
        /// The offending raw string
        amount: String,
    },

    /// The dataset mixes more than one unit
    #[error("Trying to compare different units: {}", .units.join(", "))]
    InconsistentUnits {
        /// Distinct units in first-seen order
        units: Vec<String>,
    },

    /// Summing a group's amounts exceeded the decimal range
    #[error("Total for group '{group}' overflows the decimal range")]
    AmountOverflow {
        /// Normalized group key
        group: String,
    },

    /// A required input file does not exist
    #[error("Input file {} does not exist, run `spending fetch` first", .0.display())]
    MissingInput(PathBuf),

    /// The dataset has no observations to report on
    #[error("Dataset contains no observations")]
    EmptyDataset,

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Cost API call failed
    #[error("Cost API error: {0}")]
    Api(String),
}

impl SpendingError {
    /// Shorthand for a [`SpendingError::MissingData`] naming the region
    pub fn missing_data(region: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MissingData {
            region: region.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for Results in spending
///
/// # Example
///
/// ```
/// use spending_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, SpendingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SpendingError::missing_data("us-east-1", "ResultsByTime missing from response");
        assert_eq!(
            error.to_string(),
            "Missing data for region 'us-east-1': ResultsByTime missing from response"
        );

        let error = SpendingError::InconsistentUnits {
            units: vec!["USD".to_string(), "N/A".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Trying to compare different units: USD, N/A"
        );
    }

    #[test]
    fn test_overflow_names_group() {
        let error = SpendingError::AmountOverflow {
            group: "amazon-ec2".to_string(),
        };
        assert!(error.to_string().contains("'amazon-ec2'"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: SpendingError = io_error.into();
        assert!(matches!(error, SpendingError::Io(_)));
    }

    #[test]
    fn test_missing_input_names_path() {
        let error = SpendingError::MissingInput(PathBuf::from("cache/spending-latest.csv"));
        assert!(error.to_string().contains("cache/spending-latest.csv"));
    }
}
