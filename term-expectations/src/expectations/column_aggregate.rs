//! Expectations on a single aggregate of a column.

use super::configuration::ExpectationConfiguration;
use super::kwargs::{self, Bounds};
use super::result::{ExpectationOutcome, ResultDetails};
use super::result_format::ResultFormatConfig;
use super::traits::{Expectation, MetricDependencies, ResolvedDependencies};
use crate::error::Result;

const OBSERVED: &str = "observed";

/// Which aggregate a [`ColumnAggregateExpectation`] bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    Min,
    Max,
    Mean,
    Median,
    Stdev,
    Sum,
    ProportionOfUniqueValues,
}

impl AggregateKind {
    pub const ALL: [AggregateKind; 7] = [
        AggregateKind::Min,
        AggregateKind::Max,
        AggregateKind::Mean,
        AggregateKind::Median,
        AggregateKind::Stdev,
        AggregateKind::Sum,
        AggregateKind::ProportionOfUniqueValues,
    ];

    pub fn expectation_type(&self) -> &'static str {
        match self {
            AggregateKind::Min => "expect_column_min_to_be_between",
            AggregateKind::Max => "expect_column_max_to_be_between",
            AggregateKind::Mean => "expect_column_mean_to_be_between",
            AggregateKind::Median => "expect_column_median_to_be_between",
            AggregateKind::Stdev => "expect_column_stdev_to_be_between",
            AggregateKind::Sum => "expect_column_sum_to_be_between",
            AggregateKind::ProportionOfUniqueValues => {
                "expect_column_proportion_of_unique_values_to_be_between"
            }
        }
    }

    pub fn metric_name(&self) -> &'static str {
        match self {
            AggregateKind::Min => "column.min",
            AggregateKind::Max => "column.max",
            AggregateKind::Mean => "column.mean",
            AggregateKind::Median => "column.median",
            AggregateKind::Stdev => "column.standard_deviation",
            AggregateKind::Sum => "column.sum",
            AggregateKind::ProportionOfUniqueValues => "column.unique_proportion",
        }
    }
}

/// `expect_column_<aggregate>_to_be_between`.
///
/// Succeeds when the observed aggregate lies within `[min_value, max_value]`
/// (either bound may be omitted; `strict_min`/`strict_max` exclude them).
/// A null aggregate, as produced by an empty column, never succeeds.
#[derive(Debug, Clone)]
pub struct ColumnAggregateExpectation {
    kind: AggregateKind,
    configuration: ExpectationConfiguration,
    bounds: Bounds,
}

impl ColumnAggregateExpectation {
    pub fn new(kind: AggregateKind, configuration: &ExpectationConfiguration) -> Result<Self> {
        let configuration = kwargs::normalize(
            configuration,
            &["min_value", "max_value"],
            &["strict_min", "strict_max"],
        )?;
        kwargs::required_str(&configuration, "column")?;
        let bounds = Bounds::from_config(&configuration)?;
        Ok(Self {
            kind,
            configuration,
            bounds,
        })
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }
}

impl Expectation for ColumnAggregateExpectation {
    fn configuration(&self) -> &ExpectationConfiguration {
        &self.configuration
    }

    fn validation_dependencies(&self, _format: &ResultFormatConfig) -> Result<MetricDependencies> {
        Ok(MetricDependencies::from([(
            OBSERVED.to_string(),
            kwargs::domain_metric(&self.configuration, self.kind.metric_name()),
        )]))
    }

    fn validate(
        &self,
        metrics: &ResolvedDependencies,
        _format: &ResultFormatConfig,
    ) -> Result<ExpectationOutcome> {
        let observed = kwargs::dependency(metrics, OBSERVED)?;
        let success = observed
            .as_f64()
            .map(|v| self.bounds.contains(v))
            .unwrap_or(false);
        Ok(ExpectationOutcome::new(
            success,
            ResultDetails::new().with_basic("observed_value", observed.to_json()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricValue;
    use serde_json::json;

    fn config(kind: AggregateKind) -> ExpectationConfiguration {
        ExpectationConfiguration::new(kind.expectation_type()).with_kwarg("column", json!("score"))
    }

    #[test]
    fn test_bounds_decide_success() {
        let expectation = ColumnAggregateExpectation::new(
            AggregateKind::Mean,
            &config(AggregateKind::Mean)
                .with_kwarg("min_value", json!(0.5))
                .with_kwarg("max_value", json!(0.7)),
        )
        .unwrap();
        let format = ResultFormatConfig::basic();

        let inside = ResolvedDependencies::from([(OBSERVED.into(), MetricValue::Double(0.6))]);
        let outcome = expectation.validate(&inside, &format).unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.details.render(format.result_format).unwrap()["observed_value"],
            json!(0.6)
        );

        let outside = ResolvedDependencies::from([(OBSERVED.into(), MetricValue::Double(0.9))]);
        assert!(!expectation.validate(&outside, &format).unwrap().success);

        let null = ResolvedDependencies::from([(OBSERVED.into(), MetricValue::Null)]);
        assert!(!expectation.validate(&null, &format).unwrap().success);
    }

    #[test]
    fn test_depends_on_aggregate_metric() {
        let expectation = ColumnAggregateExpectation::new(
            AggregateKind::Stdev,
            &config(AggregateKind::Stdev).with_kwarg("batch_id", json!("b1")),
        )
        .unwrap();
        let deps = expectation
            .validation_dependencies(&ResultFormatConfig::basic())
            .unwrap();
        let metric = &deps[OBSERVED];
        assert_eq!(metric.metric_name(), "column.standard_deviation");
        assert_eq!(metric.domain_str("column"), Some("score"));
        assert_eq!(metric.domain_str("batch_id"), Some("b1"));
    }

    #[test]
    fn test_misconfiguration() {
        assert!(ColumnAggregateExpectation::new(
            AggregateKind::Min,
            &ExpectationConfiguration::new("expect_column_min_to_be_between")
        )
        .is_err());
        assert!(ColumnAggregateExpectation::new(
            AggregateKind::Min,
            &config(AggregateKind::Min)
                .with_kwarg("min_value", json!(10))
                .with_kwarg("max_value", json!(1))
        )
        .is_err());
    }
}
