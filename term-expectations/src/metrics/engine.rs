//! Dependency-aware metric resolution.
//!
//! Resolution happens in two phases. Expansion walks the dependency graph of
//! every requested metric, collapsing duplicates and rejecting cycles. The
//! resolution phase then hands "ready" metrics (all dependencies settled) to
//! the backend wave after wave until nothing is pending.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, instrument, warn};

use super::cache::{MetricCache, MetricFailure, MetricOutcome};
use super::configuration::{MetricConfiguration, MetricConfigurationId};
use super::value::MetricValue;
use crate::backend::{ExecutionBackend, ResolutionRequest};
use crate::error::{Result, TermError};
use crate::log_metric_value;
use crate::logging::{truncate_field, LogConfig};

/// Settings for a [`MetricResolutionEngine`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Maximum number of metrics handed to the backend in one call
    pub max_metrics_per_call: usize,
    pub log: LogConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_metrics_per_call: 256,
            log: LogConfig::default(),
        }
    }
}

impl ResolverConfig {
    pub fn with_max_metrics_per_call(mut self, max: usize) -> Self {
        self.max_metrics_per_call = max.max(1);
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }
}

#[derive(Debug)]
struct Node {
    configuration: MetricConfiguration,
    dependencies: Vec<MetricConfigurationId>,
    /// Set when the node's dependencies could not even be determined.
    planning_failure: Option<MetricFailure>,
}

#[derive(Debug, Default)]
struct Graph {
    nodes: BTreeMap<MetricConfigurationId, Node>,
}

/// Outcomes of the metrics a caller asked for.
#[derive(Debug, Clone, Default)]
pub struct ResolvedMetrics {
    outcomes: HashMap<MetricConfigurationId, MetricOutcome>,
}

impl ResolvedMetrics {
    pub fn get(&self, configuration: &MetricConfiguration) -> Option<&MetricOutcome> {
        self.outcomes.get(&configuration.id())
    }

    pub fn value(&self, configuration: &MetricConfiguration) -> Option<&MetricValue> {
        self.get(configuration).and_then(|o| o.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&MetricConfigurationId, &MetricFailure)> {
        self.outcomes
            .iter()
            .filter_map(|(id, outcome)| outcome.as_ref().err().map(|f| (id, f)))
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Resolves metric configurations against a backend.
///
/// Every unique configuration is computed at most once per [`MetricCache`]:
/// metrics already cached (successfully or not) are never handed to the
/// backend again.
///
/// # Examples
///
/// ```rust,no_run
/// use term_expectations::backend::DataFusionBackend;
/// use term_expectations::metrics::{MetricCache, MetricConfiguration, MetricResolutionEngine};
///
/// # async fn example(backend: DataFusionBackend) -> term_expectations::prelude::Result<()> {
/// let engine = MetricResolutionEngine::new(&backend);
/// let mut cache = MetricCache::new();
/// let rows = MetricConfiguration::new("table.row_count");
/// let resolved = engine.resolve(&[rows.clone()], &mut cache).await?;
/// println!("{:?}", resolved.value(&rows));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MetricResolutionEngine<'a> {
    backend: &'a dyn ExecutionBackend,
    config: ResolverConfig,
}

impl<'a> MetricResolutionEngine<'a> {
    pub fn new(backend: &'a dyn ExecutionBackend) -> Self {
        Self::with_config(backend, ResolverConfig::default())
    }

    pub fn with_config(backend: &'a dyn ExecutionBackend, config: ResolverConfig) -> Self {
        Self { backend, config }
    }

    /// Resolves `requested` and everything it depends on.
    ///
    /// Fails only when the dependency graph is malformed (a cycle). Metric
    /// computation failures are recorded per metric in the cache and in the
    /// returned outcomes.
    #[instrument(skip(self, requested, cache), fields(requested = requested.len()))]
    pub async fn resolve(
        &self,
        requested: &[MetricConfiguration],
        cache: &mut MetricCache,
    ) -> Result<ResolvedMetrics> {
        let graph = self.expand(requested, cache)?;
        info!(
            metrics = graph.nodes.len(),
            cached = cache.len(),
            "Resolving metric graph"
        );
        self.resolve_graph(graph, cache).await?;

        let mut resolved = ResolvedMetrics::default();
        for configuration in requested {
            let id = configuration.id();
            let outcome = cache.get(&id).cloned().unwrap_or_else(|| {
                Err(MetricFailure::new(
                    configuration.metric_name(),
                    "metric was not resolved",
                ))
            });
            resolved.outcomes.insert(id, outcome);
        }
        Ok(resolved)
    }

    fn expand(&self, requested: &[MetricConfiguration], cache: &MetricCache) -> Result<Graph> {
        let mut graph = Graph::default();
        let mut in_progress = Vec::new();
        for configuration in requested {
            self.expand_node(configuration, cache, &mut graph, &mut in_progress)?;
        }
        Ok(graph)
    }

    fn expand_node(
        &self,
        configuration: &MetricConfiguration,
        cache: &MetricCache,
        graph: &mut Graph,
        in_progress: &mut Vec<MetricConfigurationId>,
    ) -> Result<()> {
        let id = configuration.id();
        if graph.nodes.contains_key(&id) || cache.contains(&id) {
            return Ok(());
        }
        if let Some(start) = in_progress.iter().position(|p| p == &id) {
            let cycle = in_progress[start..]
                .iter()
                .chain(std::iter::once(&id))
                .map(|p| p.metric_name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(TermError::MetricResolution(format!(
                "metric dependency cycle detected: {cycle}"
            )));
        }

        let mut dependencies: Vec<MetricConfiguration> = configuration.metric_dependencies().to_vec();
        let planning_failure = match self.backend.metric_dependencies(configuration) {
            Ok(declared) => {
                dependencies.extend(declared);
                None
            }
            Err(error) => Some(MetricFailure::new(
                configuration.metric_name(),
                error.to_string(),
            )),
        };

        in_progress.push(id.clone());
        let mut dependency_ids = Vec::new();
        let mut seen = BTreeSet::new();
        for dependency in &dependencies {
            let dependency_id = dependency.id();
            if seen.insert(dependency_id.clone()) {
                self.expand_node(dependency, cache, graph, in_progress)?;
                dependency_ids.push(dependency_id);
            }
        }
        in_progress.pop();

        graph.nodes.insert(
            id,
            Node {
                configuration: configuration.clone(),
                dependencies: dependency_ids,
                planning_failure,
            },
        );
        Ok(())
    }

    async fn resolve_graph(&self, graph: Graph, cache: &mut MetricCache) -> Result<()> {
        let mut pending = graph.nodes;
        let mut wave = 0usize;

        while !pending.is_empty() {
            wave += 1;
            let mut ready = Vec::new();
            let mut doomed = Vec::new();

            for (id, node) in &pending {
                if let Some(failure) = &node.planning_failure {
                    doomed.push((id.clone(), failure.clone()));
                    continue;
                }
                let failed_dependency = node.dependencies.iter().find_map(|dep| match cache.get(dep) {
                    Some(Err(failure)) => Some((dep, failure)),
                    _ => None,
                });
                if let Some((dep, failure)) = failed_dependency {
                    doomed.push((
                        id.clone(),
                        MetricFailure::new(
                            node.configuration.metric_name(),
                            format!(
                                "dependency '{}' failed: {}",
                                dep.metric_name, failure.message
                            ),
                        ),
                    ));
                } else if node.dependencies.iter().all(|dep| cache.contains(dep)) {
                    ready.push(id.clone());
                }
            }

            for (id, failure) in doomed {
                debug!(metric.name = %failure.metric_name, reason = %failure.message, "Metric skipped");
                pending.remove(&id);
                cache.insert(id, Err(failure));
            }

            if ready.is_empty() {
                if pending.is_empty() {
                    break;
                }
                // Only reachable if every remaining node waits on another
                // remaining node, which expansion rules out.
                let stuck = pending.keys().next().map(|id| id.metric_name.clone());
                return Err(TermError::MetricResolution(format!(
                    "no metric is ready to resolve (stuck at {})",
                    stuck.unwrap_or_default()
                )));
            }

            debug!(wave, ready = ready.len(), "Resolving metric wave");
            for chunk in ready.chunks(self.config.max_metrics_per_call.max(1)) {
                let mut requests = Vec::with_capacity(chunk.len());
                for id in chunk {
                    if let Some(node) = pending.remove(id) {
                        let dependencies = node
                            .dependencies
                            .iter()
                            .filter_map(|dep| match cache.get(dep) {
                                Some(Ok(value)) => Some((dep.clone(), value.clone())),
                                _ => None,
                            })
                            .collect();
                        requests.push(ResolutionRequest::with_dependencies(
                            node.configuration,
                            dependencies,
                        ));
                    }
                }

                match self.backend.resolve_metrics(&requests).await {
                    Ok(mut outcomes) => {
                        for request in &requests {
                            let id = request.configuration.id();
                            let outcome = outcomes.remove(&id).unwrap_or_else(|| {
                                Err(MetricFailure::new(
                                    request.configuration.metric_name(),
                                    "backend returned no outcome",
                                ))
                            });
                            match &outcome {
                                Ok(value) => log_metric_value!(
                                    self.config.log,
                                    metric.name = %request.configuration.metric_name(),
                                    value = %truncate_field(&value.to_string(), self.config.log.max_field_length),
                                    "Metric resolved"
                                ),
                                Err(failure) => warn!(metric.name = %failure.metric_name, error = %failure.message, "Metric failed"),
                            }
                            cache.insert(id, outcome);
                        }
                    }
                    Err(error) => {
                        warn!(metrics = requests.len(), error = %error, "Backend failed for metric group");
                        for request in &requests {
                            cache.insert(
                                request.configuration.id(),
                                Err(MetricFailure::new(
                                    request.configuration.metric_name(),
                                    error.to_string(),
                                )),
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
