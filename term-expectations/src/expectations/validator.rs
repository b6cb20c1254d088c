//! Validates expectation configurations against a backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::configuration::ExpectationConfiguration;
use super::registry::ExpectationRegistry;
use super::result::ExpectationValidationResult;
use super::result_format::ResultFormatConfig;
use super::suite::ExpectationSuite;
use super::traits::{Expectation, MetricDependencies, ResolvedDependencies};
use crate::backend::ExecutionBackend;
use crate::error::Result;
use crate::metrics::{MetricCache, MetricResolutionEngine, ResolverConfig};

/// Counts over one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    pub evaluated_expectations: usize,
    pub successful_expectations: usize,
    pub unsuccessful_expectations: usize,
    /// `None` when nothing was evaluated
    pub success_percent: Option<f64>,
}

impl ValidationStatistics {
    fn from_results(results: &[ExpectationValidationResult]) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success()).count();
        Self {
            evaluated_expectations: evaluated,
            successful_expectations: successful,
            unsuccessful_expectations: evaluated - successful,
            success_percent: (evaluated > 0)
                .then(|| successful as f64 / evaluated as f64 * 100.0),
        }
    }
}

/// Results of validating a set of expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteValidationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suite_name: Option<String>,
    pub success: bool,
    pub results: Vec<ExpectationValidationResult>,
    pub statistics: ValidationStatistics,
}

impl SuiteValidationResult {
    pub fn new(suite_name: Option<String>, results: Vec<ExpectationValidationResult>) -> Self {
        Self {
            suite_name,
            success: results.iter().all(|r| r.success()),
            statistics: ValidationStatistics::from_results(&results),
            results,
        }
    }

    /// Results that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &ExpectationValidationResult> {
        self.results.iter().filter(|r| !r.success())
    }
}

enum Slot {
    Settled(ExpectationValidationResult),
    Pending {
        expectation: Box<dyn Expectation>,
        dependencies: MetricDependencies,
    },
}

/// Evaluates expectations with one shared metric resolution pass.
///
/// Errors that only concern one expectation (bad kwargs, a metric that failed
/// to compute) become a failed result with `exception_info`. Only errors that
/// invalidate the whole run, such as a metric dependency cycle, are returned
/// as `Err`.
///
/// # Examples
///
/// ```rust,no_run
/// use serde_json::json;
/// use term_expectations::backend::DataFusionBackend;
/// use term_expectations::expectations::{
///     ExpectationConfiguration, ExpectationSuite, ResultFormatConfig, Validator,
/// };
///
/// # async fn example(backend: DataFusionBackend) -> term_expectations::prelude::Result<()> {
/// let suite = ExpectationSuite::new("orders").with_expectation(
///     ExpectationConfiguration::new("expect_column_values_to_not_be_null")
///         .with_kwarg("column", json!("order_id")),
/// );
/// let result = Validator::new(&backend)
///     .validate_suite(&suite, &ResultFormatConfig::summary())
///     .await?;
/// println!("passed: {}", result.success);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Validator<'a> {
    backend: &'a dyn ExecutionBackend,
    registry: Arc<ExpectationRegistry>,
    resolver: ResolverConfig,
    batch_id: Option<String>,
}

impl<'a> Validator<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend) -> Self {
        Self {
            backend,
            registry: Arc::new(ExpectationRegistry::with_defaults()),
            resolver: ResolverConfig::default(),
            batch_id: None,
        }
    }

    pub fn with_registry(mut self, registry: Arc<ExpectationRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_resolver_config(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// Validates against this batch unless a configuration names its own.
    pub fn with_batch_id(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    pub fn registry(&self) -> &ExpectationRegistry {
        &self.registry
    }

    #[instrument(skip(self, suite, format), fields(suite.name = %suite.name(), expectations = suite.len()))]
    pub async fn validate_suite(
        &self,
        suite: &ExpectationSuite,
        format: &ResultFormatConfig,
    ) -> Result<SuiteValidationResult> {
        let mut cache = MetricCache::new();
        let mut result = self
            .validate_with_cache(suite.expectations(), format, &mut cache)
            .await?;
        result.suite_name = Some(suite.name().to_string());
        Ok(result)
    }

    pub async fn validate_configurations(
        &self,
        configurations: &[ExpectationConfiguration],
        format: &ResultFormatConfig,
    ) -> Result<SuiteValidationResult> {
        self.validate_with_cache(configurations, format, &mut MetricCache::new())
            .await
    }

    /// Validates a single configuration.
    pub async fn validate_expectation(
        &self,
        configuration: &ExpectationConfiguration,
        format: &ResultFormatConfig,
    ) -> Result<ExpectationValidationResult> {
        let mut result = self
            .validate_configurations(std::slice::from_ref(configuration), format)
            .await?;
        Ok(result.results.remove(0))
    }

    /// Validates with a caller-owned metric cache, so metrics resolved by an
    /// earlier call of the same run are reused.
    pub async fn validate_with_cache(
        &self,
        configurations: &[ExpectationConfiguration],
        format: &ResultFormatConfig,
        cache: &mut MetricCache,
    ) -> Result<SuiteValidationResult> {
        let start = Instant::now();
        info!(
            expectations = configurations.len(),
            result_format = %format.result_format,
            "Starting validation"
        );

        let slots: Vec<Slot> = configurations
            .iter()
            .map(|configuration| self.prepare(configuration, format))
            .collect();

        let requested: Vec<_> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Pending { dependencies, .. } => Some(dependencies.values().cloned()),
                Slot::Settled(_) => None,
            })
            .flatten()
            .collect();
        MetricResolutionEngine::with_config(self.backend, self.resolver.clone())
            .resolve(&requested, cache)
            .await?;

        let results: Vec<ExpectationValidationResult> = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Settled(result) => result,
                Slot::Pending {
                    expectation,
                    dependencies,
                } => Self::judge(expectation.as_ref(), &dependencies, cache, format),
            })
            .collect();

        let result = SuiteValidationResult::new(None, results);
        info!(
            success = result.success,
            passed = result.statistics.successful_expectations,
            failed = result.statistics.unsuccessful_expectations,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Validation completed"
        );
        Ok(result)
    }

    fn prepare(&self, configuration: &ExpectationConfiguration, format: &ResultFormatConfig) -> Slot {
        let prepared = self.registry.build(configuration).and_then(|expectation| {
            let mut dependencies = expectation.validation_dependencies(format)?;
            if let Some(batch_id) = &self.batch_id {
                let batch_id = Value::String(batch_id.clone());
                for metric in dependencies.values_mut() {
                    *metric = metric.clone().with_default_domain_kwarg("batch_id", &batch_id);
                }
            }
            Ok((expectation, dependencies))
        });
        match prepared {
            Ok((expectation, dependencies)) => Slot::Pending {
                expectation,
                dependencies,
            },
            Err(error) => {
                warn!(
                    expectation.type = %configuration.expectation_type(),
                    error = %error,
                    "Expectation could not be built"
                );
                Slot::Settled(ExpectationValidationResult::from_exception(
                    configuration.clone(),
                    error.to_string(),
                    format,
                ))
            }
        }
    }

    fn judge(
        expectation: &dyn Expectation,
        dependencies: &MetricDependencies,
        cache: &MetricCache,
        format: &ResultFormatConfig,
    ) -> ExpectationValidationResult {
        let configuration = expectation.configuration().clone();
        let mut resolved = ResolvedDependencies::new();
        for (key, metric) in dependencies {
            match cache.get(&metric.id()) {
                Some(Ok(value)) => {
                    resolved.insert(key.clone(), value.clone());
                }
                Some(Err(failure)) => {
                    return ExpectationValidationResult::from_exception(
                        configuration,
                        failure.to_string(),
                        format,
                    );
                }
                None => {
                    return ExpectationValidationResult::from_exception(
                        configuration,
                        format!("metric '{}' was not resolved", metric.metric_name()),
                        format,
                    );
                }
            }
        }

        match expectation.validate(&resolved, format) {
            Ok(outcome) => {
                debug!(
                    expectation.type = %expectation.expectation_type(),
                    success = outcome.success,
                    "Expectation evaluated"
                );
                ExpectationValidationResult::from_outcome(configuration, outcome, format)
            }
            Err(error) => {
                ExpectationValidationResult::from_exception(configuration, error.to_string(), format)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricValue;
    use crate::test_utils::MockBackend;
    use serde_json::json;

    #[tokio::test]
    async fn test_shared_metrics_resolved_once() {
        let backend = MockBackend::new().with_value("table.row_count", MetricValue::Long(6));
        let validator = Validator::new(&backend);
        let configs = vec![
            ExpectationConfiguration::new("expect_table_row_count_to_be_between")
                .with_kwarg("min_value", json!(1)),
            ExpectationConfiguration::new("expect_table_row_count_to_be_between")
                .with_kwarg("max_value", json!(3)),
        ];
        let result = validator
            .validate_configurations(&configs, &ResultFormatConfig::basic())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.results[0].success());
        assert!(!result.results[1].success());
        assert_eq!(backend.compute_count("table.row_count"), 1);
        assert_eq!(result.statistics.success_percent, Some(50.0));
    }

    #[tokio::test]
    async fn test_bad_configuration_becomes_exception_result() {
        let backend = MockBackend::new().with_value("table.row_count", MetricValue::Long(6));
        let configs = vec![
            ExpectationConfiguration::new("expect_column_values_to_be_between")
                .with_kwarg("column", json!("age"))
                .with_kwarg("min_value", json!(10))
                .with_kwarg("max_value", json!(1)),
            ExpectationConfiguration::new("expect_table_row_count_to_be_between")
                .with_kwarg("min_value", json!(1)),
        ];
        let result = Validator::new(&backend)
            .validate_configurations(&configs, &ResultFormatConfig::basic())
            .await
            .unwrap();
        let info = result.results[0].exception_info().unwrap();
        assert!(info.exception_message.contains("cannot be greater"));
        assert!(result.results[1].success());
    }

    #[tokio::test]
    async fn test_metric_failure_becomes_exception_result() {
        let backend = MockBackend::new().with_failure("column.max", "column 'price' not found");
        let config = ExpectationConfiguration::new("expect_column_max_to_be_between")
            .with_kwarg("column", json!("price"))
            .with_kwarg("max_value", json!(10));
        let result = Validator::new(&backend)
            .validate_expectation(&config, &ResultFormatConfig::basic())
            .await
            .unwrap();
        assert!(!result.success());
        assert!(result
            .exception_info()
            .unwrap()
            .exception_message
            .contains("not found"));
    }

    #[tokio::test]
    async fn test_batch_id_injected() {
        let backend = MockBackend::new().with_value("table.row_count", MetricValue::Long(1));
        let validator = Validator::new(&backend).with_batch_id("b7");
        let config = ExpectationConfiguration::new("expect_table_row_count_to_be_between")
            .with_kwarg("min_value", json!(1));
        let mut cache = MetricCache::new();
        validator
            .validate_with_cache(
                std::slice::from_ref(&config),
                &ResultFormatConfig::basic(),
                &mut cache,
            )
            .await
            .unwrap();
        let expected = crate::metrics::MetricConfiguration::new("table.row_count")
            .with_domain_kwarg("batch_id", json!("b7"));
        assert_eq!(cache.value(&expected), Some(&MetricValue::Long(1)));
    }
}
