//! Fixtures shared by unit tests, integration tests and benches.
//!
//! Enabled for the crate's own tests and, for downstream crates, through the
//! `test-utils` feature.

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::backend::{DataFusionBackend, ExecutionBackend, ResolutionRequest};
use crate::error::{Result, TermError};
use crate::metrics::{
    BackendCapability, Kwargs, MetricConfiguration, MetricConfigurationId, MetricFailure,
    MetricOutcome, MetricValue,
};

/// A single nullable `Float64` column named `x`.
pub fn numbers_batch(values: &[Option<f64>]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, true)]));
    RecordBatch::try_new(schema, vec![Arc::new(Float64Array::from(values.to_vec()))])
        .expect("numbers batch")
}

/// Small customer table: `id` (Int64), `name` (Utf8, nullable),
/// `age` (Int64, nullable) and `score` (Float64).
pub fn customers_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("age", DataType::Int64, true),
        Field::new("score", DataType::Float64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6])),
            Arc::new(StringArray::from(vec![
                Some("Alice"),
                Some("Bob"),
                None,
                Some("Dan"),
                Some("Eve"),
                Some("Alexandra"),
            ])),
            Arc::new(Int64Array::from(vec![
                Some(34),
                Some(27),
                Some(45),
                None,
                Some(19),
                Some(150),
            ])),
            Arc::new(Float64Array::from(vec![0.5, 0.75, 0.9, 0.3, 0.6, 0.8])),
        ],
    )
    .expect("customers batch")
}

/// A DataFusion backend with the given batches loaded in order; the last one
/// is active.
pub fn backend_with(batches: Vec<(&str, RecordBatch)>) -> DataFusionBackend {
    let mut backend = DataFusionBackend::new();
    for (id, data) in batches {
        backend
            .load_record_batch(id, data)
            .expect("load test batch");
    }
    backend
}

type Derivation = fn(&MetricValue) -> MetricValue;

#[derive(Debug, Clone)]
enum MockMetric {
    Value(MetricValue),
    PerBatch(HashMap<String, MetricValue>),
    Failure(String),
    Derived { dependency: String, derive: Derivation },
}

/// In-memory backend that counts how often each metric is computed.
///
/// Metrics are keyed by name only; domain kwargs are passed through to
/// derived dependencies unchanged.
#[derive(Debug, Default)]
pub struct MockBackend {
    metrics: HashMap<String, MockMetric>,
    computed: Mutex<HashMap<String, usize>>,
    calls: Mutex<usize>,
    fail_groups: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: &str, value: MetricValue) -> Self {
        self.metrics.insert(name.to_string(), MockMetric::Value(value));
        self
    }

    /// A metric whose value depends on the `batch_id` domain kwarg.
    pub fn with_batch_values(mut self, name: &str, values: &[(&str, MetricValue)]) -> Self {
        let values = values
            .iter()
            .map(|(batch, value)| (batch.to_string(), value.clone()))
            .collect();
        self.metrics
            .insert(name.to_string(), MockMetric::PerBatch(values));
        self
    }

    pub fn with_failure(mut self, name: &str, message: &str) -> Self {
        self.metrics
            .insert(name.to_string(), MockMetric::Failure(message.to_string()));
        self
    }

    /// A metric computed from one dependency resolved over the same domain.
    pub fn with_derived(mut self, name: &str, dependency: &str, derive: Derivation) -> Self {
        self.metrics.insert(
            name.to_string(),
            MockMetric::Derived {
                dependency: dependency.to_string(),
                derive,
            },
        );
        self
    }

    /// Makes every `resolve_metrics` call fail as a whole.
    pub fn failing_groups(mut self) -> Self {
        self.fail_groups = true;
        self
    }

    pub fn compute_count(&self, name: &str) -> usize {
        self.computed
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| *c).unwrap_or(0)
    }

    fn dependency_of(configuration: &MetricConfiguration, dependency: &str) -> MetricConfiguration {
        MetricConfiguration::with_kwargs(
            dependency,
            configuration.metric_domain_kwargs().clone(),
            Kwargs::new(),
        )
    }

    fn outcome(&self, request: &ResolutionRequest) -> MetricOutcome {
        let name = request.configuration.metric_name();
        match self.metrics.get(name) {
            None => Err(MetricFailure::new(name, "unknown metric")),
            Some(MockMetric::Value(value)) => Ok(value.clone()),
            Some(MockMetric::PerBatch(values)) => request
                .configuration
                .domain_str("batch_id")
                .and_then(|batch| values.get(batch))
                .cloned()
                .ok_or_else(|| MetricFailure::new(name, "no value for batch")),
            Some(MockMetric::Failure(message)) => Err(MetricFailure::new(name, message.clone())),
            Some(MockMetric::Derived { dependency, derive }) => {
                let id = Self::dependency_of(&request.configuration, dependency).id();
                request
                    .dependencies
                    .get(&id)
                    .map(*derive)
                    .ok_or_else(|| MetricFailure::new(name, "dependency missing"))
            }
        }
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    fn capability(&self) -> BackendCapability {
        BackendCapability::Derived
    }

    fn metric_dependencies(
        &self,
        configuration: &MetricConfiguration,
    ) -> Result<Vec<MetricConfiguration>> {
        match self.metrics.get(configuration.metric_name()) {
            Some(MockMetric::Derived { dependency, .. }) => {
                Ok(vec![Self::dependency_of(configuration, dependency)])
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn resolve_metrics(
        &self,
        requests: &[ResolutionRequest],
    ) -> Result<HashMap<MetricConfigurationId, MetricOutcome>> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls += 1;
        }
        if self.fail_groups {
            return Err(TermError::Internal("mock backend is down".to_string()));
        }
        let mut outcomes = HashMap::new();
        for request in requests {
            if let Ok(mut computed) = self.computed.lock() {
                *computed
                    .entry(request.configuration.metric_name().to_string())
                    .or_insert(0) += 1;
            }
            outcomes.insert(request.configuration.id(), self.outcome(request));
        }
        Ok(outcomes)
    }
}
