//! Row-wise column expectations tolerating a fraction of failures (`mostly`).

use serde_json::{json, Value};

use super::configuration::ExpectationConfiguration;
use super::kwargs::{self, Bounds};
use super::result::{ExpectationOutcome, ResultDetails};
use super::result_format::{ResultFormat, ResultFormatConfig};
use super::traits::{Expectation, MetricDependencies, ResolvedDependencies};
use crate::error::{Result, TermError};
use crate::metrics::providers::{map_metric_name, MapCondition, MapMetricSuffix};
use crate::metrics::{MetricConfiguration, MetricValue};

const ELEMENT_COUNT: &str = "element_count";
const NONNULL_COUNT: &str = "nonnull_count";
const UNEXPECTED_COUNT: &str = "unexpected_count";
const PARTIAL_UNEXPECTED: &str = "partial_unexpected_list";
const PARTIAL_COUNTS: &str = "partial_unexpected_counts";
const UNEXPECTED_LIST: &str = "unexpected_list";

/// Expectation type backed by a map condition.
pub fn map_expectation_type(condition: MapCondition) -> &'static str {
    match condition {
        MapCondition::Between => "expect_column_values_to_be_between",
        MapCondition::ValueLengthBetween => "expect_column_value_lengths_to_be_between",
        MapCondition::InSet => "expect_column_values_to_be_in_set",
        MapCondition::NotNull => "expect_column_values_to_not_be_null",
    }
}

/// A column map expectation.
///
/// Every non-null row is classified as expected or unexpected by the map
/// condition; the expectation succeeds when at least `mostly` of the
/// non-null rows are expected. For `expect_column_values_to_not_be_null`
/// the null rows themselves are the unexpected ones and the ratio is taken
/// over all rows.
#[derive(Debug, Clone)]
pub struct ColumnMapExpectation {
    condition: MapCondition,
    configuration: ExpectationConfiguration,
    mostly: f64,
}

impl ColumnMapExpectation {
    pub fn new(condition: MapCondition, configuration: &ExpectationConfiguration) -> Result<Self> {
        let configuration = kwargs::normalize(
            configuration,
            &["min_value", "max_value", "mostly"],
            &["strict_min", "strict_max"],
        )?;
        kwargs::required_str(&configuration, "column")?;
        let mostly = kwargs::mostly(&configuration)?;

        match condition {
            MapCondition::Between | MapCondition::ValueLengthBetween => {
                let bounds = Bounds::from_config(&configuration)?;
                if bounds.is_unbounded() {
                    return Err(TermError::configuration(format!(
                        "{} requires min_value or max_value",
                        configuration.expectation_type()
                    )));
                }
            }
            MapCondition::InSet => {
                if !matches!(configuration.kwarg("value_set"), Some(Value::Array(_))) {
                    return Err(TermError::configuration(format!(
                        "{} requires a 'value_set' list",
                        configuration.expectation_type()
                    )));
                }
            }
            MapCondition::NotNull => {}
        }

        Ok(Self {
            condition,
            configuration,
            mostly,
        })
    }

    pub fn condition(&self) -> MapCondition {
        self.condition
    }

    fn map_metric(&self, suffix: MapMetricSuffix) -> MetricConfiguration {
        let mut metric =
            kwargs::domain_metric(&self.configuration, &map_metric_name(self.condition, suffix));
        for key in ["min_value", "max_value", "strict_min", "strict_max", "value_set"] {
            if let Some(value) = self.configuration.kwarg(key) {
                metric = metric.with_value_kwarg(key, value.clone());
            }
        }
        metric
    }

    fn ignores_nulls(&self) -> bool {
        self.condition != MapCondition::NotNull
    }
}

fn percent(part: i64, whole: i64) -> Value {
    if whole == 0 {
        Value::Null
    } else {
        json!(part as f64 / whole as f64 * 100.0)
    }
}

fn count(metrics: &ResolvedDependencies, key: &str) -> Result<i64> {
    let value = kwargs::dependency(metrics, key)?;
    value.as_i64().ok_or_else(|| TermError::TypeMismatch {
        expected: format!("integer {key}"),
        found: value.to_string(),
    })
}

impl Expectation for ColumnMapExpectation {
    fn configuration(&self) -> &ExpectationConfiguration {
        &self.configuration
    }

    fn validation_dependencies(&self, format: &ResultFormatConfig) -> Result<MetricDependencies> {
        let mut deps = MetricDependencies::new();
        deps.insert(
            ELEMENT_COUNT.to_string(),
            kwargs::table_metric(&self.configuration, "table.row_count"),
        );
        deps.insert(
            UNEXPECTED_COUNT.to_string(),
            self.map_metric(MapMetricSuffix::UnexpectedCount),
        );
        if self.ignores_nulls() {
            deps.insert(
                NONNULL_COUNT.to_string(),
                kwargs::domain_metric(&self.configuration, "column_values.nonnull.count"),
            );
        }

        let limit = json!(format.partial_unexpected_count);
        if format.includes(ResultFormat::Basic) {
            deps.insert(
                PARTIAL_UNEXPECTED.to_string(),
                self.map_metric(MapMetricSuffix::UnexpectedValues)
                    .with_value_kwarg("limit", limit.clone()),
            );
        }
        if format.includes(ResultFormat::Summary) {
            deps.insert(
                PARTIAL_COUNTS.to_string(),
                self.map_metric(MapMetricSuffix::UnexpectedValueCounts)
                    .with_value_kwarg("limit", limit),
            );
        }
        if format.includes(ResultFormat::Complete) {
            deps.insert(
                UNEXPECTED_LIST.to_string(),
                self.map_metric(MapMetricSuffix::UnexpectedValues),
            );
        }
        Ok(deps)
    }

    fn validate(
        &self,
        metrics: &ResolvedDependencies,
        _format: &ResultFormatConfig,
    ) -> Result<ExpectationOutcome> {
        let element_count = count(metrics, ELEMENT_COUNT)?;
        let unexpected_count = count(metrics, UNEXPECTED_COUNT)?;

        let (denominator, mut details) = if self.ignores_nulls() {
            let nonmissing = count(metrics, NONNULL_COUNT)?;
            let missing = element_count - nonmissing;
            let details = ResultDetails::new()
                .with_basic("missing_count", json!(missing))
                .with_basic("missing_percent", percent(missing, element_count))
                .with_basic("unexpected_percent", percent(unexpected_count, nonmissing))
                .with_basic(
                    "unexpected_percent_total",
                    percent(unexpected_count, element_count),
                )
                .with_basic(
                    "unexpected_percent_nonmissing",
                    percent(unexpected_count, nonmissing),
                );
            (nonmissing, details)
        } else {
            let details = ResultDetails::new()
                .with_basic("unexpected_percent", percent(unexpected_count, element_count))
                .with_basic(
                    "unexpected_percent_total",
                    percent(unexpected_count, element_count),
                );
            (element_count, details)
        };

        details = details
            .with_basic("element_count", json!(element_count))
            .with_basic("unexpected_count", json!(unexpected_count));
        let list = |key: &str| metrics.get(key).map(MetricValue::to_json);
        if let Some(values) = list(PARTIAL_UNEXPECTED) {
            details = details.with_basic(PARTIAL_UNEXPECTED, values);
        }
        if let Some(counts) = list(PARTIAL_COUNTS) {
            details = details.with_summary(PARTIAL_COUNTS, counts);
        }
        if let Some(values) = list(UNEXPECTED_LIST) {
            details = details.with_complete(UNEXPECTED_LIST, values);
        }

        let success = if denominator == 0 {
            true
        } else {
            let expected = (denominator - unexpected_count) as f64 / denominator as f64;
            expected >= self.mostly
        };
        Ok(ExpectationOutcome::new(success, details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn between(mostly: f64) -> ColumnMapExpectation {
        ColumnMapExpectation::new(
            MapCondition::Between,
            &ExpectationConfiguration::new(map_expectation_type(MapCondition::Between))
                .with_kwarg("column", json!("age"))
                .with_kwarg("min_value", json!(18))
                .with_kwarg("max_value", json!(100))
                .with_kwarg("mostly", json!(mostly)),
        )
        .unwrap()
    }

    fn resolved(element: i64, nonnull: i64, unexpected: i64) -> ResolvedDependencies {
        ResolvedDependencies::from([
            (ELEMENT_COUNT.into(), MetricValue::Long(element)),
            (NONNULL_COUNT.into(), MetricValue::Long(nonnull)),
            (UNEXPECTED_COUNT.into(), MetricValue::Long(unexpected)),
            (
                PARTIAL_UNEXPECTED.into(),
                MetricValue::List(vec![MetricValue::Long(150)]),
            ),
        ])
    }

    #[test]
    fn test_mostly_over_nonmissing_rows() {
        let format = ResultFormatConfig::basic();
        let metrics = resolved(6, 5, 1);
        assert!(!between(1.0).validate(&metrics, &format).unwrap().success);
        assert!(between(0.8).validate(&metrics, &format).unwrap().success);

        let result = between(0.8)
            .validate(&metrics, &format)
            .unwrap()
            .details
            .render(format.result_format)
            .unwrap();
        assert_eq!(result["element_count"], json!(6));
        assert_eq!(result["missing_count"], json!(1));
        assert_eq!(result["unexpected_percent"], json!(20.0));
        assert_eq!(result[PARTIAL_UNEXPECTED], json!([150]));
    }

    #[test]
    fn test_dependencies_grow_with_format() {
        let expectation = between(1.0);
        let boolean = expectation
            .validation_dependencies(&ResultFormatConfig::boolean_only())
            .unwrap();
        let complete = expectation
            .validation_dependencies(&ResultFormatConfig::complete())
            .unwrap();
        assert_eq!(boolean.len(), 3);
        assert_eq!(complete.len(), 6);
        assert_eq!(
            complete[UNEXPECTED_COUNT].metric_name(),
            "column_values.between.unexpected_count"
        );
        assert_eq!(
            complete[PARTIAL_UNEXPECTED].value_kwarg("limit"),
            Some(&json!(20))
        );
        assert_eq!(complete[UNEXPECTED_LIST].value_kwarg("limit"), None);
    }

    #[test]
    fn test_not_null_uses_all_rows() {
        let expectation = ColumnMapExpectation::new(
            MapCondition::NotNull,
            &ExpectationConfiguration::new(map_expectation_type(MapCondition::NotNull))
                .with_kwarg("column", json!("name"))
                .with_kwarg("mostly", json!(0.8)),
        )
        .unwrap();
        let metrics = ResolvedDependencies::from([
            (ELEMENT_COUNT.into(), MetricValue::Long(6)),
            (UNEXPECTED_COUNT.into(), MetricValue::Long(1)),
        ]);
        let outcome = expectation
            .validate(&metrics, &ResultFormatConfig::basic())
            .unwrap();
        assert!(outcome.success);
        let result = outcome.details.render(ResultFormat::Basic).unwrap();
        assert!(!result.contains_key("missing_count"));
    }

    #[test]
    fn test_empty_column_is_vacuously_successful() {
        let outcome = between(1.0)
            .validate(&resolved(0, 0, 0), &ResultFormatConfig::basic())
            .unwrap();
        assert!(outcome.success);
        let result = outcome.details.render(ResultFormat::Basic).unwrap();
        assert_eq!(result["unexpected_percent"], Value::Null);
    }

    #[test]
    fn test_misconfiguration() {
        let unbounded = ExpectationConfiguration::new("expect_column_values_to_be_between")
            .with_kwarg("column", json!("age"));
        assert!(ColumnMapExpectation::new(MapCondition::Between, &unbounded).is_err());

        let no_set = ExpectationConfiguration::new("expect_column_values_to_be_in_set")
            .with_kwarg("column", json!("name"));
        assert!(ColumnMapExpectation::new(MapCondition::InSet, &no_set).is_err());
    }
}
