//! Metrics: what can be measured, how requests are identified, and how they
//! get resolved.
//!
//! A [`MetricConfiguration`] names a metric plus the domain and value kwargs
//! it is computed under. Providers registered in a [`MetricRegistry`] know
//! how to compute a metric; the [`MetricResolutionEngine`] works out the
//! order and memoizes outcomes in a [`MetricCache`].

pub mod cache;
pub mod configuration;
pub mod engine;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod value;

pub use cache::{MetricCache, MetricFailure, MetricOutcome};
pub use configuration::{
    canonical_kwargs, canonical_value, Kwargs, MetricConfiguration, MetricConfigurationId,
};
pub use engine::{MetricResolutionEngine, ResolvedMetrics, ResolverConfig};
pub use provider::{BackendCapability, MetricProvider, MetricRequest};
pub use registry::MetricRegistry;
pub use value::MetricValue;
