//! Startup-time table of metric providers.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::provider::{BackendCapability, MetricProvider};
use super::providers;
use crate::error::{Result, TermError};

/// Maps `(metric_name, backend capability)` to the provider computing it.
///
/// Registries are built explicitly, usually through [`MetricRegistry::with_defaults`],
/// and then shared read-only by backends.
///
/// # Examples
///
/// ```rust
/// use term_expectations::metrics::{BackendCapability, MetricRegistry};
///
/// let registry = MetricRegistry::with_defaults();
/// assert!(registry
///     .lookup("table.row_count", BackendCapability::DataFusion)
///     .is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    providers: HashMap<(String, BackendCapability), Arc<dyn MetricProvider>>,
}

impl MetricRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        providers::register_defaults(&mut registry);
        registry
    }

    /// Registers a provider under its own name and capability, replacing any
    /// previous registration.
    pub fn register<P>(&mut self, provider: P) -> &mut Self
    where
        P: MetricProvider + 'static,
    {
        self.register_arc(Arc::new(provider))
    }

    pub fn register_arc(&mut self, provider: Arc<dyn MetricProvider>) -> &mut Self {
        let key = (provider.metric_name().to_string(), provider.capability());
        debug!(metric.name = %key.0, backend = %key.1, "Registering metric provider");
        if self.providers.insert(key.clone(), provider).is_some() {
            warn!(metric.name = %key.0, backend = %key.1, "Replaced metric provider");
        }
        self
    }

    /// Exact lookup.
    pub fn lookup(
        &self,
        metric_name: &str,
        capability: BackendCapability,
    ) -> Option<Arc<dyn MetricProvider>> {
        self.providers
            .get(&(metric_name.to_string(), capability))
            .cloned()
    }

    /// Provider for a backend: its own capability first, then derived metrics.
    pub fn provider_for(
        &self,
        metric_name: &str,
        capability: BackendCapability,
    ) -> Result<Arc<dyn MetricProvider>> {
        self.lookup(metric_name, capability)
            .or_else(|| self.lookup(metric_name, BackendCapability::Derived))
            .ok_or_else(|| TermError::MetricNotFound {
                metric: metric_name.to_string(),
                backend: capability.to_string(),
            })
    }

    /// Sorted names of all registered metrics.
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().map(|(n, _)| n.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
