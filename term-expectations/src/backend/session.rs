//! DataFusion-backed metric execution.

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::{CsvReadOptions, SessionConfig, SessionContext};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::batch::{Batch, BatchManager, LoadedBatch};
use super::{ExecutionBackend, ResolutionRequest};
use crate::error::{Result, TermError};
use crate::log_backend_query;
use crate::logging::{truncate_field, LogConfig};
use crate::metrics::providers::{collect, value_at};
use crate::metrics::{
    BackendCapability, MetricConfiguration, MetricConfigurationId, MetricFailure, MetricOutcome,
    MetricProvider, MetricRegistry, MetricRequest, MetricValue,
};
use crate::security::SqlSecurity;

/// Configuration of a [`DataFusionBackend`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Maximum number of aggregates fused into one query
    pub max_aggregates_per_query: usize,
    /// DataFusion target partitions (None uses the session default)
    pub target_partitions: Option<usize>,
    /// DataFusion execution batch size (None uses the session default)
    pub batch_size: Option<usize>,
    pub log: LogConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_aggregates_per_query: 32,
            target_partitions: None,
            batch_size: None,
            log: LogConfig::default(),
        }
    }
}

impl BackendConfig {
    /// One aggregate per query; every metric is computed on its own.
    pub fn unfused() -> Self {
        Self {
            max_aggregates_per_query: 1,
            ..Self::default()
        }
    }

    /// Sets the maximum number of aggregates fused into one query.
    pub fn with_max_aggregates_per_query(mut self, max: usize) -> Self {
        self.max_aggregates_per_query = max.max(1);
        self
    }

    pub fn with_target_partitions(mut self, partitions: usize) -> Self {
        self.target_partitions = Some(partitions);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    fn session_config(&self) -> SessionConfig {
        let mut config = SessionConfig::new();
        if let Some(partitions) = self.target_partitions {
            config = config.with_target_partitions(partitions);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        config
    }
}

/// Computes metrics as SQL over batches registered in a DataFusion session.
///
/// Aggregate metrics over the same table and row condition are fused into a
/// single `SELECT`. If a fused query fails, its members are retried one by
/// one so the failure is pinned on the metric that caused it.
///
/// # Examples
///
/// ```rust,no_run
/// use term_expectations::backend::{Batch, DataFusionBackend, ExecutionBackend};
/// # use arrow::record_batch::RecordBatch;
/// # fn example(data: RecordBatch) -> term_expectations::prelude::Result<()> {
/// let mut backend = DataFusionBackend::new();
/// backend.load_batch(Batch::new("2024-01", data)?)?;
/// assert_eq!(backend.loaded_batch_ids(), vec!["2024-01"]);
/// # Ok(())
/// # }
/// ```
pub struct DataFusionBackend {
    session: SessionContext,
    registry: Arc<MetricRegistry>,
    batches: BatchManager,
    config: BackendConfig,
}

impl fmt::Debug for DataFusionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionBackend")
            .field("batches", &self.batches)
            .field("metrics", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for DataFusionBackend {
    fn default() -> Self {
        Self::new()
    }
}

struct PendingAggregate<'a> {
    request: &'a ResolutionRequest,
    provider: Arc<dyn MetricProvider>,
    table: String,
    expression: String,
}

struct PendingDirect<'a> {
    request: &'a ResolutionRequest,
    provider: Arc<dyn MetricProvider>,
    table: Option<String>,
}

enum Plan<'a> {
    Aggregate {
        condition: Option<String>,
        pending: PendingAggregate<'a>,
    },
    Direct(PendingDirect<'a>),
}

fn failure(configuration: &MetricConfiguration, error: TermError) -> MetricFailure {
    MetricFailure::new(configuration.metric_name(), error.to_string())
}

impl DataFusionBackend {
    /// Creates a backend with the built-in metric providers.
    pub fn new() -> Self {
        Self::with_config(BackendConfig::default())
    }

    pub fn with_config(config: BackendConfig) -> Self {
        Self {
            session: SessionContext::new_with_config(config.session_config()),
            registry: Arc::new(MetricRegistry::with_defaults()),
            batches: BatchManager::new(),
            config,
        }
    }

    /// Replaces the metric registry.
    pub fn with_registry(mut self, registry: Arc<MetricRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Loads a batch and makes it the active batch.
    pub fn load_batch(&mut self, batch: Batch) -> Result<LoadedBatch> {
        let loaded = self.batches.load(&batch);
        if !loaded.reused_table {
            self.session
                .register_batch(&loaded.table_name, batch.data().clone())?;
        }
        Ok(loaded)
    }

    /// Convenience for `load_batch(Batch::new(id, data)?)`.
    pub fn load_record_batch(
        &mut self,
        batch_id: impl Into<String>,
        data: RecordBatch,
    ) -> Result<LoadedBatch> {
        self.load_batch(Batch::new(batch_id, data)?)
    }

    /// Reads a CSV file into memory and loads it as a batch.
    #[instrument(skip(self), fields(batch.id = %batch_id))]
    pub async fn load_csv(&mut self, batch_id: &str, path: &str) -> Result<LoadedBatch> {
        let df = self.session.read_csv(path, CsvReadOptions::new()).await?;
        let schema = Arc::new(df.schema().as_arrow().clone());
        let parts = df.collect().await?;
        let data = if parts.is_empty() {
            RecordBatch::new_empty(schema)
        } else {
            concat_batches(&schema, &parts)?
        };
        self.load_record_batch(batch_id, data)
    }

    pub fn set_active_batch(&mut self, batch_id: &str) -> Result<()> {
        self.batches.set_active_batch(batch_id)
    }

    pub fn batch_manager(&self) -> &BatchManager {
        &self.batches
    }

    fn plan<'a>(&self, request: &'a ResolutionRequest) -> Result<Plan<'a>> {
        let configuration = &request.configuration;
        let provider = self
            .registry
            .provider_for(configuration.metric_name(), BackendCapability::DataFusion)?;

        let table = match provider.capability() {
            BackendCapability::Derived => None,
            BackendCapability::DataFusion => {
                let batch_id = match configuration.metric_domain_kwargs().get("batch_id") {
                    None | Some(serde_json::Value::Null) => None,
                    Some(serde_json::Value::String(id)) => Some(id.as_str()),
                    Some(other) => {
                        return Err(TermError::configuration(format!(
                            "batch_id must be a string, got {other}"
                        )))
                    }
                };
                let table = self.batches.table_for(batch_id)?;
                Some(SqlSecurity::escape_identifier(table)?)
            }
        };

        let metric_request = MetricRequest::new(configuration, table.clone(), &request.dependencies);
        match (provider.aggregate_expression(&metric_request)?, table) {
            (Some(expression), Some(table)) => Ok(Plan::Aggregate {
                condition: metric_request.row_condition()?,
                pending: PendingAggregate {
                    request,
                    provider,
                    table,
                    expression,
                },
            }),
            (_, table) => Ok(Plan::Direct(PendingDirect {
                request,
                provider,
                table,
            })),
        }
    }

    /// Runs one fused aggregate query and returns its single row.
    async fn run_aggregates(
        &self,
        table: &str,
        condition: Option<&str>,
        group: &[PendingAggregate<'_>],
    ) -> Result<Vec<MetricValue>> {
        let select = group
            .iter()
            .enumerate()
            .map(|(i, pending)| format!("{} AS m{i}", pending.expression))
            .collect::<Vec<_>>()
            .join(", ");
        let filter = condition
            .map(|c| format!(" WHERE ({c})"))
            .unwrap_or_default();
        let sql = format!("SELECT {select} FROM {table}{filter}");
        log_backend_query!(
            self.config.log,
            sql = %truncate_field(&sql, self.config.log.max_field_length),
            "Running aggregate query"
        );

        let batches = collect(&self.session, &sql).await?;
        let row = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| TermError::Internal("aggregate query returned no rows".to_string()))?;
        (0..group.len()).map(|i| value_at(row, i, 0)).collect()
    }

    fn finish_aggregate(
        pending: &PendingAggregate<'_>,
        raw: MetricValue,
    ) -> MetricOutcome {
        let configuration = &pending.request.configuration;
        let metric_request = MetricRequest::new(
            configuration,
            Some(pending.table.clone()),
            &pending.request.dependencies,
        );
        pending
            .provider
            .finalize(raw, &metric_request)
            .map_err(|e| failure(configuration, e))
    }

    async fn resolve_aggregates(
        &self,
        table: &str,
        condition: Option<&str>,
        group: &[PendingAggregate<'_>],
        outcomes: &mut HashMap<MetricConfigurationId, MetricOutcome>,
    ) {
        match self.run_aggregates(table, condition, group).await {
            Ok(values) => {
                for (pending, raw) in group.iter().zip(values) {
                    outcomes.insert(
                        pending.request.configuration.id(),
                        Self::finish_aggregate(pending, raw),
                    );
                }
            }
            Err(error) if group.len() > 1 => {
                warn!(
                    table = %table,
                    metrics = group.len(),
                    error = %error,
                    "Fused aggregate query failed, resolving metrics individually"
                );
                for pending in group {
                    let single = std::slice::from_ref(pending);
                    let outcome = match self.run_aggregates(table, condition, single).await {
                        Ok(mut values) => match values.pop() {
                            Some(raw) => Self::finish_aggregate(pending, raw),
                            None => Err(MetricFailure::new(
                                pending.request.configuration.metric_name(),
                                "aggregate query returned no value",
                            )),
                        },
                        Err(e) => Err(failure(&pending.request.configuration, e)),
                    };
                    outcomes.insert(pending.request.configuration.id(), outcome);
                }
            }
            Err(error) => {
                if let Some(pending) = group.first() {
                    outcomes.insert(
                        pending.request.configuration.id(),
                        Err(failure(&pending.request.configuration, error)),
                    );
                }
            }
        }
    }
}

#[async_trait]
impl ExecutionBackend for DataFusionBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::DataFusion
    }

    fn metric_dependencies(
        &self,
        configuration: &MetricConfiguration,
    ) -> Result<Vec<MetricConfiguration>> {
        self.registry
            .provider_for(configuration.metric_name(), BackendCapability::DataFusion)?
            .dependencies(configuration)
    }

    #[instrument(skip(self, requests), fields(metric_count = requests.len()))]
    async fn resolve_metrics(
        &self,
        requests: &[ResolutionRequest],
    ) -> Result<HashMap<MetricConfigurationId, MetricOutcome>> {
        let mut outcomes = HashMap::with_capacity(requests.len());
        let mut fused: BTreeMap<(String, Option<String>), Vec<PendingAggregate<'_>>> =
            BTreeMap::new();
        let mut direct = Vec::new();

        for request in requests {
            match self.plan(request) {
                Ok(Plan::Aggregate { condition, pending }) => fused
                    .entry((pending.table.clone(), condition))
                    .or_default()
                    .push(pending),
                Ok(Plan::Direct(pending)) => direct.push(pending),
                Err(error) => {
                    debug!(metric.name = %request.configuration.metric_name(), error = %error, "Metric could not be planned");
                    outcomes.insert(
                        request.configuration.id(),
                        Err(failure(&request.configuration, error)),
                    );
                }
            }
        }

        for ((table, condition), group) in &fused {
            for chunk in group.chunks(self.config.max_aggregates_per_query.max(1)) {
                debug!(table = %table, metrics = chunk.len(), "Resolving fused aggregates");
                self.resolve_aggregates(table, condition.as_deref(), chunk, &mut outcomes)
                    .await;
            }
        }

        for pending in direct {
            let configuration = &pending.request.configuration;
            let metric_request =
                MetricRequest::new(configuration, pending.table.clone(), &pending.request.dependencies);
            let outcome = pending
                .provider
                .compute(&self.session, &metric_request)
                .await
                .map_err(|e| failure(configuration, e));
            outcomes.insert(configuration.id(), outcome);
        }

        Ok(outcomes)
    }

    fn loaded_batch_ids(&self) -> Vec<String> {
        self.batches.loaded_batch_ids()
    }

    fn active_batch_id(&self) -> Option<String> {
        self.batches.active_batch_id()
    }
}
