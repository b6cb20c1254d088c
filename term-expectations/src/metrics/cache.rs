//! Per-run storage of resolved metrics.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::configuration::{MetricConfiguration, MetricConfigurationId};
use super::value::MetricValue;

/// Why a single metric could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFailure {
    /// Name of the metric that failed
    pub metric_name: String,
    /// Human-readable failure message
    pub message: String,
}

impl MetricFailure {
    pub fn new(metric_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for MetricFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric_name, self.message)
    }
}

/// Outcome of resolving one metric.
pub type MetricOutcome = std::result::Result<MetricValue, MetricFailure>;

/// Resolved metrics of one run, keyed by configuration identity.
///
/// Both successes and failures are remembered, so a metric is handed to a
/// backend at most once per cache.
#[derive(Debug, Clone, Default)]
pub struct MetricCache {
    outcomes: HashMap<MetricConfigurationId, MetricOutcome>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: MetricConfigurationId, outcome: MetricOutcome) {
        self.outcomes.insert(id, outcome);
    }

    pub fn contains(&self, id: &MetricConfigurationId) -> bool {
        self.outcomes.contains_key(id)
    }

    pub fn get(&self, id: &MetricConfigurationId) -> Option<&MetricOutcome> {
        self.outcomes.get(id)
    }

    /// Resolved value of a configuration, if it succeeded.
    pub fn value(&self, configuration: &MetricConfiguration) -> Option<&MetricValue> {
        self.outcomes
            .get(&configuration.id())
            .and_then(|outcome| outcome.as_ref().ok())
    }

    /// Failure recorded for a configuration, if any.
    pub fn failure(&self, configuration: &MetricConfiguration) -> Option<&MetricFailure> {
        self.outcomes
            .get(&configuration.id())
            .and_then(|outcome| outcome.as_ref().err())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_err()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_separates_values_and_failures() {
        let ok = MetricConfiguration::new("table.row_count");
        let bad = MetricConfiguration::new("column.max");
        let mut cache = MetricCache::new();
        cache.insert(ok.id(), Ok(MetricValue::Long(3)));
        cache.insert(bad.id(), Err(MetricFailure::new("column.max", "boom")));

        assert_eq!(cache.value(&ok), Some(&MetricValue::Long(3)));
        assert!(cache.failure(&ok).is_none());
        assert_eq!(cache.failure(&bad).unwrap().message, "boom");
        assert_eq!(cache.failure_count(), 1);
        assert_eq!(cache.len(), 2);
    }
}
