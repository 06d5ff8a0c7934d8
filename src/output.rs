//! Output formatters for the spending summary
//!
//! The summary lists every group's total over all regions and metrics,
//! largest first, flags the groups above the materiality threshold, and ends
//! with a grand total.
//!
//! # Examples
//!
//! ```
//! use spending::output::{Summary, get_formatter};
//! use spending_core::types::Dataset;
//! use rust_decimal::Decimal;
//!
//! let summary = Summary::from_dataset(&Dataset::default(), Decimal::new(5, 0), "USD").unwrap();
//! let table = get_formatter(false).format_summary(&summary);
//! assert!(table.contains("TOTAL"));
//! ```

use crate::error::{Result, SpendingError};
use prettytable::{Cell, Row, Table, format, row};
use rust_decimal::Decimal;
use serde_json::json;
use spending_core::aggregation::{GroupTotal, assert_uniform_unit, group_totals};
use spending_core::types::Dataset;

/// Group totals prepared for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    /// Unit shared by every amount
    pub unit: String,
    /// Threshold a group must exceed to be material
    pub threshold: Decimal,
    /// Totals, largest first; ties keep first-seen order
    pub groups: Vec<GroupTotal>,
    /// Sum of every group total
    pub total: Decimal,
}

impl Summary {
    /// Summarize a dataset already known to share `unit`
    pub fn from_dataset(
        dataset: &Dataset,
        threshold: Decimal,
        unit: impl Into<String>,
    ) -> Result<Self> {
        let mut groups = group_totals(dataset)?;
        groups.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        let total = groups
            .iter()
            .try_fold(Decimal::ZERO, |acc, g| acc.checked_add(g.total_amount))
            .ok_or_else(|| SpendingError::AmountOverflow {
                group: "TOTAL".to_string(),
            })?;
        Ok(Self {
            unit: unit.into(),
            threshold,
            groups,
            total,
        })
    }

    /// Number of groups above the threshold
    pub fn material_count(&self) -> usize {
        self.groups
            .iter()
            .filter(|g| g.is_material(self.threshold))
            .count()
    }
}

/// Renders a [`Summary`] for the terminal or for other programs
pub trait OutputFormatter {
    /// Format the group summary
    fn format_summary(&self, summary: &Summary) -> String;
}

/// Human-readable table
pub struct TableFormatter;

impl TableFormatter {
    fn format_amount(amount: Decimal) -> String {
        format!("{:.2}", amount.round_dp(2))
    }
}

impl OutputFormatter for TableFormatter {
    fn format_summary(&self, summary: &Summary) -> String {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        table.set_titles(row![
            b -> "Group",
            b -> format!("Total ({})", summary.unit),
            b -> "Material"
        ]);

        for group in &summary.groups {
            let material = if group.is_material(summary.threshold) {
                "yes"
            } else {
                ""
            };
            table.add_row(row![
                group.group,
                r -> Self::format_amount(group.total_amount),
                c -> material
            ]);
        }

        table.add_row(Row::new(vec![Cell::new(""); 3]));
        table.add_row(row![
            b -> "TOTAL",
            br -> Self::format_amount(summary.total),
            bc -> format!("{}/{}", summary.material_count(), summary.groups.len())
        ]);

        let mut output = table.to_string();
        output.push_str(&format!(
            "\nGroups at or below {} {} are left out of charts.\n",
            summary.threshold, summary.unit
        ));
        output
    }
}

/// Pretty-printed JSON
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_summary(&self, summary: &Summary) -> String {
        let output = json!({
            "unit": summary.unit,
            "threshold": summary.threshold.to_string(),
            "groups": summary.groups.iter().map(|g| json!({
                "group": g.group,
                "total_amount": g.total_amount.to_string(),
                "material": g.is_material(summary.threshold),
            })).collect::<Vec<_>>(),
            "total": summary.total.to_string(),
        });
        serde_json::to_string_pretty(&output).unwrap_or_default()
    }
}

/// Pick the formatter for the `--json` flag
pub fn get_formatter(json_output: bool) -> Box<dyn OutputFormatter> {
    if json_output {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}

/// Check units and render the summary of a dataset
pub fn render_summary(dataset: &Dataset, threshold: Decimal, json_output: bool) -> Result<String> {
    let unit = assert_uniform_unit(dataset)?;
    let summary = Summary::from_dataset(dataset, threshold, unit)?;
    Ok(get_formatter(json_output).format_summary(&summary))
}
