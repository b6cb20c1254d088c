//! Parameter builders: derived statistics computed per domain.
//!
//! A builder computes one [`ParameterNode`] for a domain and stores it in
//! that domain's [`ParameterContainer`](super::parameter_container::ParameterContainer)
//! under `$parameter.<name>`. Builders may depend on other builders
//! ("evaluation parameter builders") whose outputs are built on demand
//! before their own computation starts.
//!
//! Directive fields of the built-in builders accept either literal JSON
//! values or `$variables.` / `$parameter.` / `$domain.` references, which
//! are resolved at build time.

mod metric;
mod numeric_range;
mod unexpected_map;

pub use metric::{
    AttributedResolvedMetrics, MetricComputationResult, MetricMultiBatchParameterBuilder,
};
pub use numeric_range::NumericMetricRangeMultiBatchParameterBuilder;
pub use unexpected_map::{AggregationMethod, UnexpectedMapMetricMultiBatchParameterBuilder};

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use super::domain::Domain;
use super::parameter_container::{
    fully_qualified_parameter_name, resolve_references, ParameterNode, Parameters,
};
use crate::backend::ExecutionBackend;
use crate::error::{Result, TermError};
use crate::metrics::{
    Kwargs, MetricCache, MetricConfiguration, MetricResolutionEngine, ResolvedMetrics,
    ResolverConfig,
};

/// Shared state of one profiler run: the backend, the batches under
/// profile and the metric cache every builder resolves through.
#[derive(Debug)]
pub struct ProfilerRuntime<'a> {
    backend: &'a dyn ExecutionBackend,
    batch_ids: Vec<String>,
    cache: MetricCache,
    resolver: ResolverConfig,
}

impl<'a> ProfilerRuntime<'a> {
    /// When `batch_ids` is empty, every batch loaded in the backend is used.
    pub fn new(backend: &'a dyn ExecutionBackend, batch_ids: Vec<String>) -> Result<Self> {
        let batch_ids = if batch_ids.is_empty() {
            backend.loaded_batch_ids()
        } else {
            batch_ids
        };
        if batch_ids.is_empty() {
            return Err(TermError::configuration(
                "profiling requires at least one batch",
            ));
        }
        Ok(Self {
            backend,
            batch_ids,
            cache: MetricCache::new(),
            resolver: ResolverConfig::default(),
        })
    }

    pub fn with_resolver_config(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn backend(&self) -> &dyn ExecutionBackend {
        self.backend
    }

    /// Batches under profile, oldest first.
    pub fn batch_ids(&self) -> &[String] {
        &self.batch_ids
    }

    pub fn cache(&self) -> &MetricCache {
        &self.cache
    }

    /// Resolves metrics through the run's cache.
    pub async fn resolve(&mut self, configurations: &[MetricConfiguration]) -> Result<ResolvedMetrics> {
        let engine = MetricResolutionEngine::with_config(self.backend, self.resolver.clone());
        engine.resolve(configurations, &mut self.cache).await
    }
}

/// Computes one named parameter for a domain.
#[async_trait]
pub trait ParameterBuilder: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn fully_qualified_parameter_name(&self) -> String {
        fully_qualified_parameter_name(self.name())
    }

    /// Builders whose outputs must exist before this one computes.
    fn evaluation_parameter_builders(&self) -> &[Arc<dyn ParameterBuilder>] {
        &[]
    }

    /// Computes the parameter without storing it.
    async fn compute(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<ParameterNode>;

    /// Builds missing prerequisites, computes the parameter and stores it in
    /// the domain's container.
    async fn build_parameters(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &mut Parameters,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<ParameterNode> {
        for prerequisite in self.evaluation_parameter_builders() {
            let name = prerequisite.fully_qualified_parameter_name();
            let present = parameters
                .get(&domain.id())
                .is_some_and(|container| container.contains(&name));
            if !present {
                prerequisite
                    .build_parameters(domain, variables, parameters, runtime)
                    .await?;
            }
        }

        let node = self.compute(domain, variables, parameters, runtime).await?;
        parameters
            .entry(domain.id())
            .or_default()
            .set(&self.fully_qualified_parameter_name(), node.clone())?;
        debug!(
            parameter.name = %self.fully_qualified_parameter_name(),
            domain = %domain,
            "Parameter built"
        );
        Ok(node)
    }
}

/// Resolves a directive that may be a literal or a reference.
pub(crate) fn resolve_directive(
    directive: &Value,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
) -> Result<Value> {
    resolve_references(directive, domain, variables, parameters)
}

/// Resolves a directive that must be an object (or absent).
pub(crate) fn kwargs_directive(
    directive: Option<&Value>,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
    what: &str,
) -> Result<Kwargs> {
    let Some(directive) = directive else {
        return Ok(Kwargs::new());
    };
    match resolve_directive(directive, domain, variables, parameters)? {
        Value::Null => Ok(Kwargs::new()),
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(TermError::configuration(format!(
            "{what} must be an object, got {other}"
        ))),
    }
}

/// Resolves an optional numeric directive. Numeric strings are accepted.
pub(crate) fn f64_directive(
    directive: Option<&Value>,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
    what: &str,
) -> Result<Option<f64>> {
    let Some(directive) = directive else {
        return Ok(None);
    };
    match resolve_directive(directive, domain, variables, parameters)? {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            TermError::configuration(format!("{what} must be a number, got '{s}'"))
        }),
        other => Err(TermError::configuration(format!(
            "{what} must be a number, got {other}"
        ))),
    }
}

/// Resolves an optional string directive.
pub(crate) fn str_directive(
    directive: Option<&Value>,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
    what: &str,
) -> Result<Option<String>> {
    let Some(directive) = directive else {
        return Ok(None);
    };
    match resolve_directive(directive, domain, variables, parameters)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(TermError::configuration(format!(
            "{what} must be a string, got {other}"
        ))),
    }
}

/// Resolves an optional non-negative decimal count.
pub(crate) fn round_decimals_directive(
    directive: Option<&Value>,
    domain: &Domain,
    variables: &Kwargs,
    parameters: &Parameters,
    builder: &str,
) -> Result<Option<u32>> {
    let Some(value) = f64_directive(directive, domain, variables, parameters, "round_decimals")?
    else {
        return Ok(None);
    };
    if value < 0.0 || value.fract() != 0.0 {
        return Err(TermError::configuration(format!(
            "round_decimals for parameter builder '{builder}' must be 0 or a positive integer, or omitted (got {value})"
        )));
    }
    // Saturates; anything past f64 precision leaves values unrounded anyway.
    Ok(Some(value as u32))
}

/// Reads a builder output as a numeric sequence. A scalar counts as a
/// sequence of one; nulls are rejected.
pub(crate) fn numeric_sequence(value: &Value, what: &str) -> Result<Vec<f64>> {
    let items = match value {
        Value::Array(items) => items.as_slice(),
        scalar => std::slice::from_ref(scalar),
    };
    items
        .iter()
        .map(|item| {
            item.as_f64().ok_or_else(|| TermError::TypeMismatch {
                expected: format!("numeric values for {what}"),
                found: item.to_string(),
            })
        })
        .collect()
}

/// JSON form of a float; non-finite values become null.
pub(crate) fn json_f64(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}
