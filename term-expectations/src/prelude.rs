//! Commonly used types.

pub use crate::backend::{Batch, BackendConfig, DataFusionBackend, ExecutionBackend};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::expectations::{
    ExpectationConfiguration, ExpectationRegistry, ExpectationSuite, ExpectationValidationResult,
    ResultFormat, ResultFormatConfig, SuiteValidationResult, Validator,
};
pub use crate::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ResultFormatter};
pub use crate::logging::LogConfig;
pub use crate::metrics::{
    MetricConfiguration, MetricRegistry, MetricResolutionEngine, MetricValue, ResolverConfig,
};
pub use crate::profiler::{
    ColumnDomainBuilder, DefaultExpectationConfigurationBuilder, Rule, RuleBasedProfiler,
    TableDomainBuilder,
};
pub use crate::render::{InlineRenderer, RendererRegistry};
