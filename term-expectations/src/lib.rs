//! # term-expectations
//!
//! Declarative data-quality expectations and rule-based profiling on top of
//! Apache DataFusion.
//!
//! Data is described by *metrics* (`table.row_count`, `column.mean`,
//! `column_values.nonnull.unexpected_count`, ...). Expectations name the
//! metrics they need, the resolution engine computes each distinct metric at
//! most once, and the expectations judge the values. The rule-based profiler
//! runs the same machinery over one or more batches to *derive* a suite of
//! expectations from data.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use term_expectations::prelude::*;
//!
//! # async fn example(data: arrow::record_batch::RecordBatch) -> Result<()> {
//! let mut backend = DataFusionBackend::new();
//! backend.load_record_batch("2024-06-01", data)?;
//!
//! let suite = ExpectationSuite::new("customers")
//!     .with_expectation(
//!         ExpectationConfiguration::new("expect_column_values_to_not_be_null")
//!             .with_kwarg("column", json!("id")),
//!     )
//!     .with_expectation(
//!         ExpectationConfiguration::new("expect_column_values_to_be_between")
//!             .with_kwarg("column", json!("age"))
//!             .with_kwarg("min_value", json!(0))
//!             .with_kwarg("max_value", json!(120))
//!             .with_kwarg("mostly", json!(0.95)),
//!     );
//!
//! let result = Validator::new(&backend)
//!     .validate_suite(&suite, &ResultFormatConfig::summary())
//!     .await?;
//! println!("{}", HumanFormatter::new().format(&result)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`metrics`] | metric configurations, providers, registry and the resolution engine |
//! | [`backend`] | the [`ExecutionBackend`](backend::ExecutionBackend) seam and the DataFusion adapter |
//! | [`expectations`] | expectation configurations, evaluation, result formats and suites |
//! | [`profiler`] | rule-based profiler and parameter builders |
//! | [`render`] | inline renderers with failure placeholders |
//! | [`formatters`] | JSON and console output for suite results |
//!
//! ## Logging
//!
//! Everything is instrumented with `tracing`. Install a subscriber yourself
//! or call [`logging::setup::init_logging`].

pub mod backend;
pub mod error;
pub mod expectations;
pub mod formatters;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod profiler;
pub mod render;
pub mod security;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
