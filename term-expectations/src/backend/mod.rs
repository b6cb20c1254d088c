//! Execution backends: where metrics are actually computed.
//!
//! The resolution engine only talks to the [`ExecutionBackend`] trait. The
//! crate ships [`DataFusionBackend`], which evaluates metrics as SQL over
//! Arrow batches registered in a DataFusion session.

mod batch;
mod session;

pub use session::{BackendConfig, DataFusionBackend};
pub use batch::{Batch, BatchFingerprint, BatchManager, LoadedBatch};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;

use crate::error::Result;
use crate::metrics::{
    BackendCapability, MetricConfiguration, MetricConfigurationId, MetricOutcome, MetricValue,
};

/// One metric handed to a backend, together with its resolved dependencies.
#[derive(Debug, Clone)]
pub struct ResolutionRequest {
    pub configuration: MetricConfiguration,
    pub dependencies: BTreeMap<MetricConfigurationId, MetricValue>,
}

impl ResolutionRequest {
    pub fn new(configuration: MetricConfiguration) -> Self {
        Self {
            configuration,
            dependencies: BTreeMap::new(),
        }
    }

    pub fn with_dependencies(
        configuration: MetricConfiguration,
        dependencies: BTreeMap<MetricConfigurationId, MetricValue>,
    ) -> Self {
        Self {
            configuration,
            dependencies,
        }
    }
}

/// Contract between the resolution engine and a compute backend.
///
/// `resolve_metrics` receives a group of metrics whose dependencies are
/// already resolved. An `Err` return means the whole group failed; otherwise
/// every requested id maps to its own outcome, so one bad metric does not
/// spoil its neighbours.
#[async_trait]
pub trait ExecutionBackend: Send + Sync + Debug {
    /// Kind of provider this backend evaluates.
    fn capability(&self) -> BackendCapability;

    /// Dependencies the metric's provider declares for these kwargs.
    fn metric_dependencies(
        &self,
        _configuration: &MetricConfiguration,
    ) -> Result<Vec<MetricConfiguration>> {
        Ok(Vec::new())
    }

    /// Resolves a group of ready metrics.
    async fn resolve_metrics(
        &self,
        requests: &[ResolutionRequest],
    ) -> Result<HashMap<MetricConfigurationId, MetricOutcome>>;

    /// Ids of loaded batches, in load order.
    fn loaded_batch_ids(&self) -> Vec<String> {
        Vec::new()
    }

    /// Batch used when a domain names none.
    fn active_batch_id(&self) -> Option<String> {
        None
    }
}
