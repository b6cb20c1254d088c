//! The expectation contract.

use std::collections::BTreeMap;
use std::fmt::Debug;

use super::configuration::ExpectationConfiguration;
use super::result::ExpectationOutcome;
use super::result_format::ResultFormatConfig;
use crate::error::Result;
use crate::metrics::{MetricConfiguration, MetricValue};

/// Metrics an expectation needs, keyed by a name local to the expectation.
pub type MetricDependencies = BTreeMap<String, MetricConfiguration>;

/// Resolved values of an expectation's metric dependencies.
pub type ResolvedDependencies = BTreeMap<String, MetricValue>;

/// A declarative assertion about data.
///
/// Evaluation is split in two: the expectation first names the metrics it
/// needs, then judges their resolved values. Metric resolution in between is
/// handled by the [`Validator`](super::Validator) so that metrics shared
/// between expectations are computed once.
///
/// Constructors validate kwargs, so a built expectation is always
/// well-formed. [`configuration`](Expectation::configuration) returns the
/// normalized configuration, which makes round-tripping idempotent.
pub trait Expectation: Send + Sync + Debug {
    fn expectation_type(&self) -> &str {
        self.configuration().expectation_type()
    }

    /// The normalized configuration this expectation was built from.
    fn configuration(&self) -> &ExpectationConfiguration;

    /// Metrics needed to validate at the given verbosity.
    fn validation_dependencies(&self, format: &ResultFormatConfig) -> Result<MetricDependencies>;

    /// Judges the resolved metrics.
    fn validate(
        &self,
        metrics: &ResolvedDependencies,
        format: &ResultFormatConfig,
    ) -> Result<ExpectationOutcome>;
}
