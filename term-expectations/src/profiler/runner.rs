//! Running a set of rules over batches to produce an expectation suite.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument};

use super::domain::Domain;
use super::parameter_builder::ProfilerRuntime;
use super::rule::Rule;
use crate::backend::ExecutionBackend;
use crate::error::{Result, TermError};
use crate::expectations::{ExpectationRegistry, ExpectationSuite};
use crate::metrics::{Kwargs, ResolverConfig};

/// Called after each rule with the fraction of rules completed.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Output of a profiler run.
#[derive(Debug, Clone, Serialize)]
pub struct RuleBasedProfilerResult {
    pub expectation_suite: ExpectationSuite,
    /// Every domain a rule was applied to, in rule order.
    pub domains: Vec<Domain>,
    /// Parameter names built per domain, keyed by [`Domain::id`].
    pub fully_qualified_parameter_names_by_domain: BTreeMap<String, Vec<String>>,
    pub rule_execution_time: BTreeMap<String, Duration>,
    pub batch_ids: Vec<String>,
    /// When the run started.
    pub run_time: DateTime<Utc>,
}

impl RuleBasedProfilerResult {
    pub fn total_execution_time(&self) -> Duration {
        self.rule_execution_time.values().sum()
    }
}

/// Derives an expectation suite from data by applying rules.
///
/// Rules run sequentially and share one metric cache, so a metric needed
/// by several rules is computed once per run.
///
/// # Examples
///
/// ```rust,no_run
/// use serde_json::json;
/// use term_expectations::backend::DataFusionBackend;
/// use term_expectations::profiler::{
///     ColumnDomainBuilder, DefaultExpectationConfigurationBuilder, Rule, RuleBasedProfiler,
///     UnexpectedMapMetricMultiBatchParameterBuilder, MetricMultiBatchParameterBuilder,
/// };
///
/// # async fn example(backend: DataFusionBackend) -> term_expectations::prelude::Result<()> {
/// let not_null = Rule::new("not_null", ColumnDomainBuilder::new())
///     .with_parameter_builder(
///         MetricMultiBatchParameterBuilder::new("row_counts", "table.row_count")
///             .with_metric_domain_kwargs(json!({})),
///     )
///     .with_parameter_builder(
///         UnexpectedMapMetricMultiBatchParameterBuilder::new(
///             "mostly",
///             "column_values.nonnull",
///             "row_counts",
///         )
///         .with_aggregation_method("quantile")
///         .with_round_decimals(2),
///     )
///     .with_expectation_configuration_builder(
///         DefaultExpectationConfigurationBuilder::new("expect_column_values_to_not_be_null")
///             .with_kwarg("mostly", json!("$parameter.mostly.value")),
///     );
///
/// let result = RuleBasedProfiler::new("customers_profile")
///     .with_rule(not_null)
///     .run(&backend, vec![])
///     .await?;
/// println!("{} expectations", result.expectation_suite.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RuleBasedProfiler {
    name: String,
    variables: Kwargs,
    rules: Vec<Rule>,
    registry: Arc<ExpectationRegistry>,
    resolver: ResolverConfig,
    on_progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for RuleBasedProfiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleBasedProfiler")
            .field("name", &self.name)
            .field("variables", &self.variables)
            .field("rules", &self.rules)
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl RuleBasedProfiler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: Kwargs::new(),
            rules: Vec::new(),
            registry: Arc::new(ExpectationRegistry::with_defaults()),
            resolver: ResolverConfig::default(),
            on_progress: None,
        }
    }

    /// Variables visible to every rule as `$variables.<key>`.
    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ExpectationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolver_config(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Profiles `batch_ids` (every loaded batch when empty).
    ///
    /// Any rule failure aborts the run.
    #[instrument(skip_all, fields(profiler.name = %self.name, rules = self.rules.len()))]
    pub async fn run(
        &self,
        backend: &dyn ExecutionBackend,
        batch_ids: Vec<String>,
    ) -> Result<RuleBasedProfilerResult> {
        let mut seen = BTreeSet::new();
        if let Some(duplicate) = self.rules.iter().find(|rule| !seen.insert(rule.name())) {
            return Err(TermError::configuration(format!(
                "profiler '{}' has more than one rule named '{}'",
                self.name,
                duplicate.name()
            )));
        }

        let run_time = Utc::now();
        let started = Instant::now();
        let mut runtime =
            ProfilerRuntime::new(backend, batch_ids)?.with_resolver_config(self.resolver.clone());
        info!(batches = runtime.batch_ids().len(), "Starting profiler run");

        let mut suite = ExpectationSuite::new(&self.name)
            .with_meta("profiler_name", json!(self.name))
            .with_meta("batch_ids", json!(runtime.batch_ids()));
        let mut domains = Vec::new();
        let mut parameter_names = BTreeMap::new();
        let mut rule_execution_time = BTreeMap::new();

        for (index, rule) in self.rules.iter().enumerate() {
            let state = rule.run(&self.variables, &mut runtime, &self.registry).await?;
            for configuration in state.expectation_configurations {
                suite.add_expectation(configuration);
            }
            for (domain_id, container) in &state.parameters {
                parameter_names.insert(domain_id.clone(), container.fully_qualified_parameter_names());
            }
            domains.extend(state.domains);
            rule_execution_time.insert(state.rule_name, state.execution_time);

            if let Some(callback) = &self.on_progress {
                callback((index + 1) as f64 / self.rules.len() as f64);
            }
        }

        info!(
            expectations = suite.len(),
            metrics = runtime.cache().len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Profiler run finished"
        );
        Ok(RuleBasedProfilerResult {
            expectation_suite: suite,
            domains,
            fully_qualified_parameter_names_by_domain: parameter_names,
            rule_execution_time,
            batch_ids: runtime.batch_ids().to_vec(),
            run_time,
        })
    }
}
