//! Rule-based profiling: deriving expectations from observed data.
//!
//! A [`RuleBasedProfiler`] applies [`Rule`]s to one or more batches. Each
//! rule combines:
//!
//! | Stage | Trait | Built-ins |
//! |-------|-------|-----------|
//! | domains | [`DomainBuilder`] | [`TableDomainBuilder`], [`ColumnDomainBuilder`] |
//! | parameters | [`ParameterBuilder`] | [`MetricMultiBatchParameterBuilder`], [`UnexpectedMapMetricMultiBatchParameterBuilder`], [`NumericMetricRangeMultiBatchParameterBuilder`] |
//! | expectations | [`ExpectationConfigurationBuilder`] | [`DefaultExpectationConfigurationBuilder`] |
//!
//! Parameters live in a per-domain [`ParameterContainer`] and are referenced
//! from later builders by fully-qualified name, e.g.
//! `$parameter.row_count_range.value[0]`.

pub mod domain;
pub mod domain_builder;
pub mod expectation_builder;
pub mod parameter_builder;
pub mod parameter_container;
pub mod rule;
pub mod runner;
pub mod statistics;

pub use domain::{Domain, DomainType};
pub use domain_builder::{ColumnDomainBuilder, DomainBuilder, TableDomainBuilder};
pub use expectation_builder::{DefaultExpectationConfigurationBuilder, ExpectationConfigurationBuilder};
pub use parameter_builder::{
    AggregationMethod, AttributedResolvedMetrics, MetricComputationResult,
    MetricMultiBatchParameterBuilder, NumericMetricRangeMultiBatchParameterBuilder,
    ParameterBuilder, ProfilerRuntime, UnexpectedMapMetricMultiBatchParameterBuilder,
};
pub use parameter_container::{
    fully_qualified_parameter_name, get_parameter_value, ParameterContainer, ParameterNode,
    Parameters,
};
pub use rule::{Rule, RuleState};
pub use runner::{ProgressCallback, RuleBasedProfiler, RuleBasedProfilerResult};
pub use statistics::{QuantileMethod, NP_EPSILON};
