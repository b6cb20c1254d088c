//! Aggregating the unexpected fraction of a map metric across batches.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use super::metric::MetricMultiBatchParameterBuilder;
use super::{
    f64_directive, json_f64, numeric_sequence, round_decimals_directive, str_directive,
    ParameterBuilder, ProfilerRuntime,
};
use crate::error::{Result, TermError};
use crate::metrics::providers::MapMetricSuffix;
use crate::metrics::Kwargs;
use crate::profiler::domain::Domain;
use crate::profiler::parameter_container::{
    fully_qualified_parameter_name, get_parameter_value, ParameterNode, Parameters, DETAILS_KEY,
    VALUE_KEY,
};
use crate::profiler::statistics::{self, QuantileMethod, NP_EPSILON};

const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.02;

/// How per-batch unexpected fractions are reduced to one parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationMethod {
    /// The fractions themselves, one per batch.
    Noop,
    Mean,
    /// Population standard deviation.
    Std,
    Median,
    /// `1 - quantile(fractions, false_positive_rate)`: the share of values
    /// expected to pass, usable as `mostly`.
    Quantile,
}

impl AggregationMethod {
    pub const NAMES: [&'static str; 5] = ["noop", "mean", "std", "median", "quantile"];

    fn unrecognized(found: &str) -> TermError {
        TermError::configuration(format!(
            "aggregation_method can only be one of {:?} (\"{found}\" was detected)",
            Self::NAMES
        ))
    }
}

impl fmt::Display for AggregationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationMethod::Noop => "noop",
            AggregationMethod::Mean => "mean",
            AggregationMethod::Std => "std",
            AggregationMethod::Median => "median",
            AggregationMethod::Quantile => "quantile",
        };
        f.write_str(name)
    }
}

impl FromStr for AggregationMethod {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "noop" => Ok(AggregationMethod::Noop),
            "mean" => Ok(AggregationMethod::Mean),
            "std" => Ok(AggregationMethod::Std),
            "median" => Ok(AggregationMethod::Median),
            "quantile" => Ok(AggregationMethod::Quantile),
            other => Err(Self::unrecognized(other)),
        }
    }
}

/// Computes the fraction of unexpected values of a map metric for every
/// batch and aggregates it.
///
/// The total count comes from an earlier parameter (usually the row count).
/// The unexpected count comes from another parameter when named, and is
/// otherwise resolved here as `<map_metric_name>.unexpected_count`.
///
/// # Examples
///
/// ```rust
/// use term_expectations::profiler::parameter_builder::{
///     ParameterBuilder, UnexpectedMapMetricMultiBatchParameterBuilder,
/// };
///
/// let mostly = UnexpectedMapMetricMultiBatchParameterBuilder::new(
///     "not_null_mostly",
///     "column_values.nonnull",
///     "row_counts",
/// )
/// .with_aggregation_method("quantile")
/// .with_false_positive_rate(0.05)
/// .with_round_decimals(2);
/// assert_eq!(mostly.name(), "not_null_mostly");
/// ```
#[derive(Debug, Clone)]
pub struct UnexpectedMapMetricMultiBatchParameterBuilder {
    name: String,
    map_metric_name: String,
    total_count_parameter_builder_name: Value,
    unexpected_count_parameter_builder_name: Option<Value>,
    aggregation_method: Option<Value>,
    false_positive_rate: Option<Value>,
    quantile_statistic_interpolation_method: Option<Value>,
    round_decimals: Option<Value>,
    unexpected_count: MetricMultiBatchParameterBuilder,
    evaluation_parameter_builders: Vec<Arc<dyn ParameterBuilder>>,
}

impl UnexpectedMapMetricMultiBatchParameterBuilder {
    pub fn new(
        name: impl Into<String>,
        map_metric_name: impl Into<String>,
        total_count_parameter_builder_name: impl Into<Value>,
    ) -> Self {
        let name = name.into();
        let map_metric_name = map_metric_name.into();
        let unexpected_count = MetricMultiBatchParameterBuilder::new(
            name.clone(),
            unexpected_count_metric_name(&map_metric_name),
        )
        .with_enforce_numeric_metric(true)
        .with_replace_nan_with_zero(true)
        .with_reduce_scalar_metric(true);
        Self {
            name,
            map_metric_name,
            total_count_parameter_builder_name: total_count_parameter_builder_name.into(),
            unexpected_count_parameter_builder_name: None,
            aggregation_method: None,
            false_positive_rate: None,
            quantile_statistic_interpolation_method: None,
            round_decimals: None,
            unexpected_count,
            evaluation_parameter_builders: Vec::new(),
        }
    }

    pub fn with_unexpected_count_parameter_builder_name(mut self, name: impl Into<Value>) -> Self {
        self.unexpected_count_parameter_builder_name = Some(name.into());
        self
    }

    pub fn with_aggregation_method(mut self, method: impl Into<Value>) -> Self {
        self.aggregation_method = Some(method.into());
        self
    }

    pub fn with_false_positive_rate(mut self, rate: impl Into<Value>) -> Self {
        self.false_positive_rate = Some(rate.into());
        self
    }

    /// `auto`, `linear`, `lower`, `higher`, `nearest` or `midpoint`.
    pub fn with_quantile_statistic_interpolation_method(mut self, method: impl Into<Value>) -> Self {
        self.quantile_statistic_interpolation_method = Some(method.into());
        self
    }

    pub fn with_round_decimals(mut self, decimals: impl Into<Value>) -> Self {
        self.round_decimals = Some(decimals.into());
        self
    }

    pub fn with_metric_domain_kwargs(mut self, kwargs: Value) -> Self {
        self.unexpected_count = self.unexpected_count.with_metric_domain_kwargs(kwargs);
        self
    }

    pub fn with_metric_value_kwargs(mut self, kwargs: Value) -> Self {
        self.unexpected_count = self.unexpected_count.with_metric_value_kwargs(kwargs);
        self
    }

    pub fn with_evaluation_parameter_builder(mut self, builder: Arc<dyn ParameterBuilder>) -> Self {
        self.evaluation_parameter_builders.push(builder);
        self
    }

    pub fn map_metric_name(&self) -> &str {
        &self.map_metric_name
    }

    fn upstream_node(
        name: &str,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
    ) -> Result<ParameterNode> {
        let node = get_parameter_value(
            &fully_qualified_parameter_name(name),
            domain,
            variables,
            parameters,
        )?;
        let value = node.get(VALUE_KEY).cloned().unwrap_or(Value::Null);
        let details = node
            .get(DETAILS_KEY)
            .and_then(Value::as_object)
            .map(|d| d.clone().into_iter().collect())
            .unwrap_or_default();
        Ok(ParameterNode::new(value).with_details(details))
    }

    fn aggregate(
        &self,
        method: AggregationMethod,
        fractions: &[f64],
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
    ) -> Result<Value> {
        Ok(match method {
            AggregationMethod::Noop => Value::Array(fractions.iter().copied().map(json_f64).collect()),
            AggregationMethod::Mean => json_f64(statistics::mean(fractions)?),
            AggregationMethod::Std => json_f64(statistics::std(fractions)?),
            AggregationMethod::Median => json_f64(statistics::median(fractions)?),
            AggregationMethod::Quantile => {
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
                    &self.name,
                )?;
                let interpolation = str_directive(
                    self.quantile_statistic_interpolation_method.as_ref(),
                    domain,
                    variables,
                    parameters,
                    "quantile_statistic_interpolation_method",
                )?;
                let method = interpolation_method(interpolation.as_deref())?;

                let mostly = 1.0 - statistics::quantile(fractions, rate, method)?;
                debug!(
                    parameter.name = %self.name,
                    false_positive_rate = rate,
                    interpolation = %method,
                    mostly,
                    "Derived mostly threshold"
                );
                json_f64(match round_decimals {
                    Some(decimals) => statistics::round_to(mostly, decimals),
                    None => mostly,
                })
            }
        })
    }
}

fn unexpected_count_metric_name(map_metric: &str) -> String {
    format!("{map_metric}.{}", MapMetricSuffix::UnexpectedCount.as_str())
}

/// `auto` is always `linear` here: fractions are never rounded to whole numbers.
fn interpolation_method(name: Option<&str>) -> Result<QuantileMethod> {
    match name.unwrap_or("auto") {
        "auto" => Ok(QuantileMethod::Linear),
        other => other.parse(),
    }
}

#[async_trait]
impl ParameterBuilder for UnexpectedMapMetricMultiBatchParameterBuilder {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluation_parameter_builders(&self) -> &[Arc<dyn ParameterBuilder>] {
        &self.evaluation_parameter_builders
    }

    async fn compute(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<ParameterNode> {
        let total_name = str_directive(
            Some(&self.total_count_parameter_builder_name),
            domain,
            variables,
            parameters,
            "total_count_parameter_builder_name",
        )?
        .ok_or_else(|| {
            TermError::configuration(format!(
                "parameter builder '{}' requires total_count_parameter_builder_name",
                self.name
            ))
        })?;
        let total = Self::upstream_node(&total_name, domain, variables, parameters)?;
        let totals = numeric_sequence(&total.value, "total counts")?;

        let unexpected_name = str_directive(
            self.unexpected_count_parameter_builder_name.as_ref(),
            domain,
            variables,
            parameters,
            "unexpected_count_parameter_builder_name",
        )?;
        let unexpected = match unexpected_name {
            Some(name) => Self::upstream_node(&name, domain, variables, parameters)?,
            None => {
                self.unexpected_count
                    .compute(domain, variables, parameters, runtime)
                    .await?
            }
        };
        let unexpected_counts = numeric_sequence(&unexpected.value, "unexpected counts")?;

        if totals.len() != unexpected_counts.len() {
            return Err(TermError::configuration(format!(
                "parameter builder '{}' got {} total counts but {} unexpected counts",
                self.name,
                totals.len(),
                unexpected_counts.len()
            )));
        }
        let fractions: Vec<f64> = unexpected_counts
            .iter()
            .zip(&totals)
            .map(|(unexpected, total)| unexpected / (total + NP_EPSILON))
            .collect();

        let method_name = str_directive(
            self.aggregation_method.as_ref(),
            domain,
            variables,
            parameters,
            "aggregation_method",
        )?;
        let method = match method_name.as_deref() {
            Some(name) => name.parse::<AggregationMethod>()?,
            None => return Err(AggregationMethod::unrecognized("none")),
        };
        let value = self.aggregate(method, &fractions, domain, variables, parameters)?;

        Ok(ParameterNode::new(value)
            .with_details(unexpected.details)
            .with_detail("aggregation_method", json!(method.to_string())))
    }
}
