//! Resolving one metric across every batch under profile.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{kwargs_directive, ParameterBuilder, ProfilerRuntime};
use crate::error::{Result, TermError};
use crate::metrics::{Kwargs, MetricConfiguration, MetricValue};
use crate::profiler::domain::Domain;
use crate::profiler::parameter_container::{ParameterNode, Parameters};

/// Values of one metric configuration, attributed to the batches that
/// produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributedResolvedMetrics {
    pub batch_ids: Vec<String>,
    pub values: BTreeMap<String, MetricValue>,
    pub metric_configuration: MetricConfiguration,
}

impl AttributedResolvedMetrics {
    /// Values in the order of `batch_ids`.
    pub fn ordered_values(&self) -> Vec<&MetricValue> {
        self.batch_ids
            .iter()
            .filter_map(|batch| self.values.get(batch))
            .collect()
    }
}

/// Output of a metric computation performed on behalf of a parameter builder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComputationResult {
    pub attributed_resolved_metrics: Vec<AttributedResolvedMetrics>,
    pub details: Kwargs,
}

/// Resolves a metric for every batch (or only the most recent one in
/// single-batch mode) and exposes the per-batch values as a list.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_expectations::profiler::parameter_builder::{
///     MetricMultiBatchParameterBuilder, ParameterBuilder,
/// };
///
/// let builder = MetricMultiBatchParameterBuilder::new("row_counts", "table.row_count")
///     .with_metric_domain_kwargs(json!({}))
///     .with_enforce_numeric_metric(true);
/// assert_eq!(builder.fully_qualified_parameter_name(), "$parameter.row_counts");
/// ```
#[derive(Debug, Clone)]
pub struct MetricMultiBatchParameterBuilder {
    name: String,
    metric_name: String,
    metric_domain_kwargs: Option<Value>,
    metric_value_kwargs: Option<Value>,
    single_batch_mode: bool,
    enforce_numeric_metric: bool,
    replace_nan_with_zero: bool,
    reduce_scalar_metric: bool,
    evaluation_parameter_builders: Vec<Arc<dyn ParameterBuilder>>,
}

impl MetricMultiBatchParameterBuilder {
    /// Metric domain kwargs default to the domain under evaluation.
    pub fn new(name: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metric_name: metric_name.into(),
            metric_domain_kwargs: None,
            metric_value_kwargs: None,
            single_batch_mode: false,
            enforce_numeric_metric: false,
            replace_nan_with_zero: false,
            reduce_scalar_metric: true,
            evaluation_parameter_builders: Vec::new(),
        }
    }

    /// An object, or a reference to one.
    pub fn with_metric_domain_kwargs(mut self, kwargs: Value) -> Self {
        self.metric_domain_kwargs = Some(kwargs);
        self
    }

    /// An object, or a reference to one.
    pub fn with_metric_value_kwargs(mut self, kwargs: Value) -> Self {
        self.metric_value_kwargs = Some(kwargs);
        self
    }

    pub fn with_single_batch_mode(mut self, single_batch_mode: bool) -> Self {
        self.single_batch_mode = single_batch_mode;
        self
    }

    pub fn with_enforce_numeric_metric(mut self, enforce: bool) -> Self {
        self.enforce_numeric_metric = enforce;
        self
    }

    pub fn with_replace_nan_with_zero(mut self, replace: bool) -> Self {
        self.replace_nan_with_zero = replace;
        self
    }

    pub fn with_reduce_scalar_metric(mut self, reduce: bool) -> Self {
        self.reduce_scalar_metric = reduce;
        self
    }

    pub fn with_evaluation_parameter_builder(mut self, builder: Arc<dyn ParameterBuilder>) -> Self {
        self.evaluation_parameter_builders.push(builder);
        self
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    fn prepare(&self, value: MetricValue) -> Result<MetricValue> {
        let value = match value {
            MetricValue::List(mut items) if self.reduce_scalar_metric && items.len() == 1 => {
                items.remove(0)
            }
            other => other,
        };
        let value = if self.enforce_numeric_metric {
            match value {
                MetricValue::Null => MetricValue::Double(f64::NAN),
                numeric if numeric.is_numeric() => numeric,
                other => {
                    return Err(TermError::TypeMismatch {
                        expected: format!("numeric value for metric '{}'", self.metric_name),
                        found: other.to_string_pretty(),
                    })
                }
            }
        } else {
            value
        };
        Ok(match value {
            MetricValue::Double(v) if self.replace_nan_with_zero && v.is_nan() => {
                MetricValue::Double(0.0)
            }
            MetricValue::Null if self.replace_nan_with_zero => MetricValue::Double(0.0),
            other => other,
        })
    }

    /// Resolves the metric for the batches of the run.
    pub async fn compute_metric(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<MetricComputationResult> {
        let domain_kwargs = match &self.metric_domain_kwargs {
            None => domain.domain_kwargs.clone(),
            Some(directive) => kwargs_directive(
                Some(directive),
                domain,
                variables,
                parameters,
                "metric_domain_kwargs",
            )?,
        };
        let value_kwargs = kwargs_directive(
            self.metric_value_kwargs.as_ref(),
            domain,
            variables,
            parameters,
            "metric_value_kwargs",
        )?;

        let batch_ids: Vec<String> = if self.single_batch_mode {
            runtime.batch_ids().iter().rev().take(1).cloned().collect()
        } else {
            runtime.batch_ids().to_vec()
        };
        let configurations: Vec<MetricConfiguration> = batch_ids
            .iter()
            .map(|batch_id| {
                let mut kwargs = domain_kwargs.clone();
                kwargs.insert("batch_id".to_string(), Value::String(batch_id.clone()));
                MetricConfiguration::with_kwargs(&self.metric_name, kwargs, value_kwargs.clone())
            })
            .collect();

        let resolved = runtime.resolve(&configurations).await?;
        let mut values = BTreeMap::new();
        for (batch_id, configuration) in batch_ids.iter().zip(&configurations) {
            let value = match resolved.get(configuration) {
                Some(Ok(value)) => value.clone(),
                Some(Err(failure)) => {
                    return Err(TermError::metric_computation(
                        &self.metric_name,
                        format!("batch '{batch_id}': {}", failure.message),
                    ))
                }
                None => {
                    return Err(TermError::Internal(format!(
                        "metric '{}' missing from resolution output",
                        self.metric_name
                    )))
                }
            };
            values.insert(batch_id.clone(), self.prepare(value)?);
        }
        debug!(
            parameter.name = %self.name,
            metric.name = %self.metric_name,
            batches = batch_ids.len(),
            "Resolved multi-batch metric"
        );

        let template = MetricConfiguration::with_kwargs(&self.metric_name, domain_kwargs, value_kwargs);
        let details = Kwargs::from([
            ("metric_configuration".to_string(), serde_json::to_value(&template)?),
            ("num_batches".to_string(), json!(batch_ids.len())),
        ]);
        Ok(MetricComputationResult {
            attributed_resolved_metrics: vec![AttributedResolvedMetrics {
                batch_ids,
                values,
                metric_configuration: template,
            }],
            details,
        })
    }
}

#[async_trait]
impl ParameterBuilder for MetricMultiBatchParameterBuilder {
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
        let result = self.compute_metric(domain, variables, parameters, runtime).await?;
        let values = result
            .attributed_resolved_metrics
            .iter()
            .flat_map(|attributed| attributed.ordered_values())
            .map(MetricValue::to_json)
            .collect();
        Ok(ParameterNode::new(Value::Array(values)).with_details(result.details))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockBackend;

    fn batches() -> Vec<String> {
        vec!["b1".into(), "b2".into(), "b3".into()]
    }

    #[tokio::test]
    async fn test_value_per_batch() {
        let backend = MockBackend::new().with_batch_values(
            "column.max",
            &[
                ("b1", MetricValue::Long(3)),
                ("b2", MetricValue::Long(5)),
                ("b3", MetricValue::Long(4)),
            ],
        );
        let mut runtime = ProfilerRuntime::new(&backend, batches()).unwrap();
        let builder = MetricMultiBatchParameterBuilder::new("max", "column.max");

        let mut parameters = Parameters::new();
        let node = builder
            .build_parameters(&Domain::column("x"), &Kwargs::new(), &mut parameters, &mut runtime)
            .await
            .unwrap();
        assert_eq!(node.value, json!([3, 5, 4]));
        assert_eq!(node.details["num_batches"], json!(3));
        assert_eq!(
            node.details["metric_configuration"]["metric_name"],
            json!("column.max")
        );
        assert_eq!(
            node.details["metric_configuration"]["metric_domain_kwargs"]["column"],
            json!("x")
        );
        assert_eq!(backend.compute_count("column.max"), 3);
    }

    #[tokio::test]
    async fn test_single_batch_mode_uses_latest_batch() {
        let backend = MockBackend::new().with_batch_values(
            "table.row_count",
            &[("b1", MetricValue::Long(1)), ("b3", MetricValue::Long(9))],
        );
        let mut runtime = ProfilerRuntime::new(&backend, batches()).unwrap();
        let builder =
            MetricMultiBatchParameterBuilder::new("rows", "table.row_count").with_single_batch_mode(true);
        let node = builder
            .compute(&Domain::table(), &Kwargs::new(), &Parameters::new(), &mut runtime)
            .await
            .unwrap();
        assert_eq!(node.value, json!([9]));
        assert_eq!(node.details["num_batches"], json!(1));
    }

    #[tokio::test]
    async fn test_numeric_enforcement() {
        let backend = MockBackend::new()
            .with_value("column.mode", MetricValue::String("a".into()))
            .with_value("column.mean", MetricValue::Null);
        let mut runtime = ProfilerRuntime::new(&backend, vec!["b1".into()]).unwrap();
        let domain = Domain::column("x");

        let err = MetricMultiBatchParameterBuilder::new("mode", "column.mode")
            .with_enforce_numeric_metric(true)
            .compute(&domain, &Kwargs::new(), &Parameters::new(), &mut runtime)
            .await
            .unwrap_err();
        assert!(matches!(err, TermError::TypeMismatch { .. }));

        let node = MetricMultiBatchParameterBuilder::new("mean", "column.mean")
            .with_enforce_numeric_metric(true)
            .with_replace_nan_with_zero(true)
            .compute(&domain, &Kwargs::new(), &Parameters::new(), &mut runtime)
            .await
            .unwrap();
        assert_eq!(node.value, json!([0.0]));
    }

    #[tokio::test]
    async fn test_failed_metric_is_an_error() {
        let backend = MockBackend::new().with_failure("column.sum", "overflow");
        let mut runtime = ProfilerRuntime::new(&backend, vec!["b1".into()]).unwrap();
        let err = MetricMultiBatchParameterBuilder::new("sum", "column.sum")
            .compute(&Domain::column("x"), &Kwargs::new(), &Parameters::new(), &mut runtime)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[tokio::test]
    async fn test_value_kwargs_accept_references() {
        let backend = MockBackend::new().with_value("column.quantile", MetricValue::Double(0.5));
        let mut runtime = ProfilerRuntime::new(&backend, vec!["b1".into()]).unwrap();
        let variables = Kwargs::from([("quantile_kwargs".to_string(), json!({"q": 0.5}))]);
        let node = MetricMultiBatchParameterBuilder::new("q", "column.quantile")
            .with_metric_value_kwargs(json!("$variables.quantile_kwargs"))
            .compute(&Domain::column("x"), &variables, &Parameters::new(), &mut runtime)
            .await
            .unwrap();
        assert_eq!(
            node.details["metric_configuration"]["metric_value_kwargs"],
            json!({"q": 0.5})
        );
    }
}
