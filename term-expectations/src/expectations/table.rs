//! Table-level expectations.

use serde_json::json;

use super::configuration::ExpectationConfiguration;
use super::kwargs::{self, Bounds};
use super::result::{ExpectationOutcome, ResultDetails};
use super::result_format::ResultFormatConfig;
use super::traits::{Expectation, MetricDependencies, ResolvedDependencies};
use crate::error::{Result, TermError};

pub const TABLE_ROW_COUNT_TYPE: &str = "expect_table_row_count_to_be_between";
pub const COLUMN_TO_EXIST_TYPE: &str = "expect_column_to_exist";

/// `expect_table_row_count_to_be_between`.
#[derive(Debug, Clone)]
pub struct TableRowCountExpectation {
    configuration: ExpectationConfiguration,
    bounds: Bounds,
}

impl TableRowCountExpectation {
    pub fn new(configuration: &ExpectationConfiguration) -> Result<Self> {
        let configuration = kwargs::normalize(
            configuration,
            &["min_value", "max_value"],
            &["strict_min", "strict_max"],
        )?;
        let bounds = Bounds::from_config(&configuration)?;
        Ok(Self {
            configuration,
            bounds,
        })
    }
}

impl Expectation for TableRowCountExpectation {
    fn configuration(&self) -> &ExpectationConfiguration {
        &self.configuration
    }

    fn validation_dependencies(&self, _format: &ResultFormatConfig) -> Result<MetricDependencies> {
        Ok(MetricDependencies::from([(
            "row_count".to_string(),
            kwargs::table_metric(&self.configuration, "table.row_count"),
        )]))
    }

    fn validate(
        &self,
        metrics: &ResolvedDependencies,
        _format: &ResultFormatConfig,
    ) -> Result<ExpectationOutcome> {
        let row_count = kwargs::dependency(metrics, "row_count")?;
        let success = row_count
            .as_f64()
            .map(|n| self.bounds.contains(n))
            .unwrap_or(false);
        Ok(ExpectationOutcome::new(
            success,
            ResultDetails::new().with_basic("observed_value", row_count.to_json()),
        ))
    }
}

/// `expect_column_to_exist`, optionally at a 1-based `column_index`.
#[derive(Debug, Clone)]
pub struct ColumnToExistExpectation {
    configuration: ExpectationConfiguration,
    column: String,
    column_index: Option<usize>,
}

impl ColumnToExistExpectation {
    pub fn new(configuration: &ExpectationConfiguration) -> Result<Self> {
        let configuration = kwargs::normalize(configuration, &["column_index"], &[])?;
        let column = kwargs::required_str(&configuration, "column")?;
        let column_index = match kwargs::number(&configuration, "column_index")? {
            None => None,
            Some(i) if i >= 1.0 && i.fract() == 0.0 => Some(i as usize),
            Some(i) => {
                return Err(TermError::configuration(format!(
                    "column_index must be a positive integer, got {i}"
                )))
            }
        };
        Ok(Self {
            configuration,
            column,
            column_index,
        })
    }
}

impl Expectation for ColumnToExistExpectation {
    fn configuration(&self) -> &ExpectationConfiguration {
        &self.configuration
    }

    fn validation_dependencies(&self, _format: &ResultFormatConfig) -> Result<MetricDependencies> {
        Ok(MetricDependencies::from([(
            "columns".to_string(),
            kwargs::table_metric(&self.configuration, "table.columns"),
        )]))
    }

    fn validate(
        &self,
        metrics: &ResolvedDependencies,
        _format: &ResultFormatConfig,
    ) -> Result<ExpectationOutcome> {
        let columns: Vec<&str> = kwargs::dependency(metrics, "columns")?
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|c| c.as_str())
            .collect();
        let position = columns.iter().position(|c| *c == self.column);
        let success = match (position, self.column_index) {
            (Some(found), Some(expected)) => found + 1 == expected,
            (Some(_), None) => true,
            (None, _) => false,
        };
        Ok(ExpectationOutcome::new(
            success,
            ResultDetails::new().with_basic("observed_value", json!(columns)),
        ))
    }
}
