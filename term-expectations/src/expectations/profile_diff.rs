//! Expectations judged from a single profile-comparison metric.

use serde_json::Value;
use std::collections::BTreeMap;

use super::configuration::ExpectationConfiguration;
use super::kwargs;
use super::result::{ExpectationOutcome, ResultDetails};
use super::result_format::ResultFormatConfig;
use super::traits::{Expectation, MetricDependencies, ResolvedDependencies};
use crate::error::{Result, TermError};
use crate::metrics::providers::PROFILE_NUMERIC_COLUMNS_DIFF_METRIC;
use crate::metrics::{Kwargs, MetricConfiguration, MetricValue};

pub const PROFILE_NUMERIC_COLUMNS_DIFF_TYPE: &str =
    "expect_profile_numeric_columns_diff_between_threshold_range";

/// Value kwargs forwarded from the expectation to its profile metric.
const PROFILE_VALUE_KWARGS: [&str; 2] = ["limit_check_report_keys", "reference_profile"];

/// Tally of a profile diff metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDiffSummary {
    pub total_stats: usize,
    pub failed_stats: usize,
    /// Per column: the offending scalar, or a map holding only failed statistics.
    pub unexpected_values: BTreeMap<String, MetricValue>,
}

impl ProfileDiffSummary {
    /// Tallies a map `column -> (scalar | {stat -> bool})`.
    ///
    /// A statistic passes only when its value is `true`. A column whose value
    /// is not a map counts as one failed statistic.
    pub fn from_metric(value: &MetricValue) -> Result<Self> {
        let columns = value.as_map().ok_or_else(|| TermError::TypeMismatch {
            expected: "map of column to statistic results".to_string(),
            found: value.to_string(),
        })?;

        let mut summary = Self {
            total_stats: 0,
            failed_stats: 0,
            unexpected_values: BTreeMap::new(),
        };
        for (column, stats) in columns {
            match stats {
                MetricValue::Map(stats) => {
                    let failed: BTreeMap<String, MetricValue> = stats
                        .iter()
                        .filter(|(_, passed)| **passed != MetricValue::Boolean(true))
                        .map(|(stat, value)| (stat.clone(), value.clone()))
                        .collect();
                    summary.total_stats += stats.len();
                    summary.failed_stats += failed.len();
                    if !failed.is_empty() {
                        summary
                            .unexpected_values
                            .insert(column.clone(), MetricValue::Map(failed));
                    }
                }
                scalar => {
                    summary.total_stats += 1;
                    summary.failed_stats += 1;
                    summary.unexpected_values.insert(column.clone(), scalar.clone());
                }
            }
        }
        Ok(summary)
    }

    /// Share of statistics that passed. `None` when there were none.
    pub fn percent_successful(&self) -> Option<f64> {
        if self.total_stats == 0 {
            None
        } else {
            Some((self.total_stats - self.failed_stats) as f64 / self.total_stats as f64)
        }
    }

    /// No statistics at all is a vacuous success.
    pub fn is_successful(&self, mostly: f64) -> bool {
        self.percent_successful().map_or(true, |p| p >= mostly)
    }
}

/// Builder for [`ProfileNumericColumnsDiffExpectation`].
///
/// `profile_metric` has no default; [`build`](Self::build) fails without it.
#[derive(Debug, Clone, Default)]
pub struct ProfileNumericColumnsDiffExpectationBuilder {
    profile_metric: Option<String>,
    configuration: Option<ExpectationConfiguration>,
}

impl ProfileNumericColumnsDiffExpectationBuilder {
    pub fn profile_metric(mut self, metric_name: impl Into<String>) -> Self {
        self.profile_metric = Some(metric_name.into());
        self
    }

    pub fn configuration(mut self, configuration: &ExpectationConfiguration) -> Self {
        self.configuration = Some(configuration.clone());
        self
    }

    pub fn build(self) -> Result<ProfileNumericColumnsDiffExpectation> {
        let profile_metric = self
            .profile_metric
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                TermError::configuration(
                    "a profile expectation must name exactly one profile_metric",
                )
            })?;
        let configuration = self.configuration.ok_or_else(|| {
            TermError::configuration("a profile expectation requires a configuration")
        })?;
        let configuration = kwargs::normalize(&configuration, &["mostly"], &[])?;
        let mostly = kwargs::mostly(&configuration)?;
        for key in PROFILE_VALUE_KWARGS {
            if !matches!(configuration.kwarg(key), Some(Value::Object(_))) {
                return Err(TermError::configuration(format!(
                    "{} requires '{key}' to be an object",
                    configuration.expectation_type()
                )));
            }
        }
        Ok(ProfileNumericColumnsDiffExpectation {
            profile_metric,
            configuration,
            mostly,
        })
    }
}

/// `expect_profile_numeric_columns_diff_between_threshold_range`.
///
/// Succeeds when the share of numeric column statistics whose drift from the
/// reference profile lies within its threshold range is at least `mostly`
/// (default 1.0).
#[derive(Debug, Clone)]
pub struct ProfileNumericColumnsDiffExpectation {
    profile_metric: String,
    configuration: ExpectationConfiguration,
    mostly: f64,
}

impl ProfileNumericColumnsDiffExpectation {
    pub fn builder() -> ProfileNumericColumnsDiffExpectationBuilder {
        ProfileNumericColumnsDiffExpectationBuilder::default()
    }

    /// Builds the expectation over the built-in profile comparison metric.
    pub fn new(configuration: &ExpectationConfiguration) -> Result<Self> {
        Self::builder()
            .profile_metric(PROFILE_NUMERIC_COLUMNS_DIFF_METRIC)
            .configuration(configuration)
            .build()
    }

    pub fn profile_metric(&self) -> &str {
        &self.profile_metric
    }

    pub fn mostly(&self) -> f64 {
        self.mostly
    }
}

impl Expectation for ProfileNumericColumnsDiffExpectation {
    fn configuration(&self) -> &ExpectationConfiguration {
        &self.configuration
    }

    fn validation_dependencies(&self, _format: &ResultFormatConfig) -> Result<MetricDependencies> {
        let value_kwargs: Kwargs = PROFILE_VALUE_KWARGS
            .iter()
            .filter_map(|k| self.configuration.kwarg(k).map(|v| (k.to_string(), v.clone())))
            .collect();
        let metric = MetricConfiguration::with_kwargs(
            self.profile_metric.as_str(),
            self.configuration.domain_kwargs(),
            value_kwargs,
        );
        Ok(MetricDependencies::from([(self.profile_metric.clone(), metric)]))
    }

    fn validate(
        &self,
        metrics: &ResolvedDependencies,
        _format: &ResultFormatConfig,
    ) -> Result<ExpectationOutcome> {
        if metrics.len() != 1 {
            return Err(TermError::configuration(format!(
                "{} expects exactly one metric dependency, got {}",
                self.configuration.expectation_type(),
                metrics.len()
            )));
        }
        let value = kwargs::dependency(metrics, &self.profile_metric)?;
        let summary = ProfileDiffSummary::from_metric(value)?;
        let unexpected = MetricValue::Map(summary.unexpected_values.clone());
        Ok(ExpectationOutcome::new(
            summary.is_successful(self.mostly),
            ResultDetails::new().with_basic("unexpected_values", unexpected.to_json()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectations::ResultFormat;
    use serde_json::json;

    fn expectation(mostly: f64) -> ProfileNumericColumnsDiffExpectation {
        ProfileNumericColumnsDiffExpectation::new(
            &ExpectationConfiguration::new(PROFILE_NUMERIC_COLUMNS_DIFF_TYPE)
                .with_kwarg("limit_check_report_keys", json!({}))
                .with_kwarg("reference_profile", json!({}))
                .with_kwarg("mostly", json!(mostly)),
        )
        .unwrap()
    }

    fn resolved(diff: Value) -> ResolvedDependencies {
        ResolvedDependencies::from([(
            PROFILE_NUMERIC_COLUMNS_DIFF_METRIC.to_string(),
            MetricValue::from_json(&diff),
        )])
    }

    #[test]
    fn test_mostly_threshold() {
        let metrics = resolved(json!({
            "colA": {"mean": true, "std": false},
            "colB": {"mean": true}
        }));
        let format = ResultFormatConfig::basic();

        let strict = expectation(0.7).validate(&metrics, &format).unwrap();
        assert!(!strict.success);
        assert!(expectation(0.5).validate(&metrics, &format).unwrap().success);

        let result = strict.details.render(ResultFormat::Basic).unwrap();
        assert_eq!(result["unexpected_values"], json!({"colA": {"std": false}}));
    }

    #[test]
    fn test_scalar_counts_as_one_failure() {
        let summary = ProfileDiffSummary::from_metric(&MetricValue::from_json(&json!({"colA": 4.2})))
            .unwrap();
        assert_eq!(summary.total_stats, 1);
        assert_eq!(summary.failed_stats, 1);

        let outcome = expectation(0.0)
            .validate(&resolved(json!({"colA": 4.2})), &ResultFormatConfig::basic())
            .unwrap();
        assert!(outcome.success);
        assert_eq!(
            outcome.details.render(ResultFormat::Basic).unwrap()["unexpected_values"],
            json!({"colA": 4.2})
        );
    }

    #[test]
    fn test_no_statistics_is_vacuous_success() {
        let outcome = expectation(1.0)
            .validate(&resolved(json!({})), &ResultFormatConfig::basic())
            .unwrap();
        assert!(outcome.success);
    }

    #[test]
    fn test_builder_requires_profile_metric() {
        let config = ExpectationConfiguration::new(PROFILE_NUMERIC_COLUMNS_DIFF_TYPE)
            .with_kwarg("limit_check_report_keys", json!({}))
            .with_kwarg("reference_profile", json!({}));
        let err = ProfileNumericColumnsDiffExpectation::builder()
            .configuration(&config)
            .build()
            .unwrap_err();
        assert!(matches!(err, TermError::Configuration(_)));
    }

    #[test]
    fn test_exactly_one_dependency() {
        let e = expectation(1.0);
        let deps = e.validation_dependencies(&ResultFormatConfig::basic()).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(
            deps[PROFILE_NUMERIC_COLUMNS_DIFF_METRIC].metric_name(),
            PROFILE_NUMERIC_COLUMNS_DIFF_METRIC
        );

        let mut two = resolved(json!({}));
        two.insert("extra".into(), MetricValue::Null);
        assert!(e.validate(&two, &ResultFormatConfig::basic()).is_err());
    }
}
