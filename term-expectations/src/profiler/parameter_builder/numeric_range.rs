//! Estimating a `[min, max]` range for a numeric metric from its history.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::metric::MetricMultiBatchParameterBuilder;
use super::{
    f64_directive, json_f64, numeric_sequence, resolve_directive, round_decimals_directive,
    str_directive, ParameterBuilder, ProfilerRuntime,
};
use crate::error::{Result, TermError};
use crate::metrics::Kwargs;
use crate::profiler::domain::Domain;
use crate::profiler::parameter_container::{ParameterNode, Parameters};
use crate::profiler::statistics::{self, QuantileMethod};

const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.05;

/// Estimates the range a metric is expected to stay within.
///
/// The per-batch values are reduced to `[q(fpr / 2), q(1 - fpr / 2)]`,
/// optionally clipped to `truncate_values` and rounded. With
/// `round_decimals = 0` the bounds are emitted as integers.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_expectations::profiler::parameter_builder::NumericMetricRangeMultiBatchParameterBuilder;
///
/// let rows = NumericMetricRangeMultiBatchParameterBuilder::new("row_count_range", "table.row_count")
///     .with_metric_domain_kwargs(json!({}))
///     .with_false_positive_rate(0.1)
///     .with_round_decimals(0)
///     .with_truncate_values(json!({"lower_bound": 0}));
/// ```
#[derive(Debug, Clone)]
pub struct NumericMetricRangeMultiBatchParameterBuilder {
    metric: MetricMultiBatchParameterBuilder,
    false_positive_rate: Option<Value>,
    quantile_statistic_interpolation_method: Option<Value>,
    round_decimals: Option<Value>,
    truncate_values: Option<Value>,
}

impl NumericMetricRangeMultiBatchParameterBuilder {
    pub fn new(name: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            metric: MetricMultiBatchParameterBuilder::new(name, metric_name)
                .with_enforce_numeric_metric(true)
                .with_replace_nan_with_zero(true)
                .with_reduce_scalar_metric(true),
            false_positive_rate: None,
            quantile_statistic_interpolation_method: None,
            round_decimals: None,
            truncate_values: None,
        }
    }

    pub fn with_metric_domain_kwargs(mut self, kwargs: Value) -> Self {
        self.metric = self.metric.with_metric_domain_kwargs(kwargs);
        self
    }

    pub fn with_metric_value_kwargs(mut self, kwargs: Value) -> Self {
        self.metric = self.metric.with_metric_value_kwargs(kwargs);
        self
    }

    pub fn with_false_positive_rate(mut self, rate: impl Into<Value>) -> Self {
        self.false_positive_rate = Some(rate.into());
        self
    }

    pub fn with_quantile_statistic_interpolation_method(mut self, method: impl Into<Value>) -> Self {
        self.quantile_statistic_interpolation_method = Some(method.into());
        self
    }

    pub fn with_round_decimals(mut self, decimals: impl Into<Value>) -> Self {
        self.round_decimals = Some(decimals.into());
        self
    }

    /// `{"lower_bound": .., "upper_bound": ..}`; either bound may be omitted.
    pub fn with_truncate_values(mut self, bounds: Value) -> Self {
        self.truncate_values = Some(bounds);
        self
    }

    pub fn with_evaluation_parameter_builder(mut self, builder: Arc<dyn ParameterBuilder>) -> Self {
        self.metric = self.metric.with_evaluation_parameter_builder(builder);
        self
    }

    fn truncation(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
    ) -> Result<(Option<f64>, Option<f64>)> {
        let Some(directive) = &self.truncate_values else {
            return Ok((None, None));
        };
        let bounds = resolve_directive(directive, domain, variables, parameters)?;
        let bound = |key: &str| -> Result<Option<f64>> {
            f64_directive(bounds.get(key), domain, variables, parameters, key)
        };
        match &bounds {
            Value::Null => Ok((None, None)),
            Value::Object(_) => Ok((bound("lower_bound")?, bound("upper_bound")?)),
            other => Err(TermError::configuration(format!(
                "truncate_values must be an object, got {other}"
            ))),
        }
    }
}

fn emit(value: f64, round_decimals: Option<u32>) -> Value {
    match round_decimals {
        Some(0) if value.is_finite() => json!(statistics::round_half_even(value) as i64),
        Some(decimals) => json_f64(statistics::round_to(value, decimals)),
        None => json_f64(value),
    }
}

#[async_trait]
impl ParameterBuilder for NumericMetricRangeMultiBatchParameterBuilder {
    fn name(&self) -> &str {
        self.metric.name()
    }

    fn evaluation_parameter_builders(&self) -> &[Arc<dyn ParameterBuilder>] {
        self.metric.evaluation_parameter_builders()
    }

    async fn compute(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<ParameterNode> {
        let history = self.metric.compute(domain, variables, parameters, runtime).await?;
        let values = numeric_sequence(&history.value, self.metric.metric_name())?;

        let rate = f64_directive(
            self.false_positive_rate.as_ref(),
            domain,
            variables,
            parameters,
            "false_positive_rate",
        )?
        .unwrap_or(DEFAULT_FALSE_POSITIVE_RATE);
        if !(0.0..=1.0).contains(&rate) {
            return Err(TermError::configuration(format!(
                "false_positive_rate must be between 0 and 1, got {rate}"
            )));
        }
        let round_decimals = round_decimals_directive(
            self.round_decimals.as_ref(),
            domain,
            variables,
            parameters,
            self.name(),
        )?;
        let method = match str_directive(
            self.quantile_statistic_interpolation_method.as_ref(),
            domain,
            variables,
            parameters,
            "quantile_statistic_interpolation_method",
        )?
        .as_deref()
        {
            None | Some("auto") if round_decimals == Some(0) => QuantileMethod::Nearest,
            None | Some("auto") => QuantileMethod::Linear,
            Some(other) => other.parse()?,
        };

        let mut lower = statistics::quantile(&values, rate / 2.0, method)?;
        let mut upper = statistics::quantile(&values, 1.0 - rate / 2.0, method)?;
        let (lower_bound, upper_bound) = self.truncation(domain, variables, parameters)?;
        if let Some(bound) = lower_bound {
            lower = lower.max(bound);
        }
        if let Some(bound) = upper_bound {
            upper = upper.min(bound);
        }

        Ok(ParameterNode::new(json!([
            emit(lower, round_decimals),
            emit(upper, round_decimals)
        ]))
        .with_details(history.details)
        .with_detail("false_positive_rate", json_f64(rate))
        .with_detail("quantile_statistic_interpolation_method", json!(method.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricValue;
    use crate::test_utils::MockBackend;

    fn backend() -> MockBackend {
        MockBackend::new().with_batch_values(
            "table.row_count",
            &[
                ("b1", MetricValue::Long(10)),
                ("b2", MetricValue::Long(20)),
                ("b3", MetricValue::Long(30)),
                ("b4", MetricValue::Long(40)),
                ("b5", MetricValue::Long(50)),
            ],
        )
    }

    fn batches() -> Vec<String> {
        (1..=5).map(|i| format!("b{i}")).collect()
    }

    async fn range(builder: NumericMetricRangeMultiBatchParameterBuilder) -> Value {
        let backend = backend();
        let mut runtime = ProfilerRuntime::new(&backend, batches()).unwrap();
        builder
            .compute(&Domain::table(), &Kwargs::new(), &Parameters::new(), &mut runtime)
            .await
            .unwrap()
            .value
    }

    fn rows() -> NumericMetricRangeMultiBatchParameterBuilder {
        NumericMetricRangeMultiBatchParameterBuilder::new("rows", "table.row_count")
            .with_false_positive_rate(0.2)
    }

    #[tokio::test]
    async fn test_linear_range() {
        let value = range(rows()).await;
        let bounds = numeric_sequence(&value, "rows").unwrap();
        assert!((bounds[0] - 14.0).abs() < 1e-9);
        assert!((bounds[1] - 46.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_whole_number_rounding_uses_nearest() {
        assert_eq!(range(rows().with_round_decimals(0)).await, json!([10, 50]));
    }

    #[tokio::test]
    async fn test_truncation() {
        let value = range(
            rows()
                .with_round_decimals(0)
                .with_truncate_values(json!({"lower_bound": 12, "upper_bound": 45})),
        )
        .await;
        assert_eq!(value, json!([12, 45]));
    }

    #[tokio::test]
    async fn test_details_carry_the_estimator() {
        let backend = backend();
        let mut runtime = ProfilerRuntime::new(&backend, batches()).unwrap();
        let node = rows()
            .compute(&Domain::table(), &Kwargs::new(), &Parameters::new(), &mut runtime)
            .await
            .unwrap();
        assert_eq!(node.details["num_batches"], json!(5));
        assert_eq!(node.details["quantile_statistic_interpolation_method"], json!("linear"));
    }
}
