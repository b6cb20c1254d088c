//! Expectation configuration builders: turn parameters into expectations.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use super::domain::Domain;
use super::parameter_builder::{ParameterBuilder, ProfilerRuntime};
use super::parameter_container::{resolve_references, Parameters};
use crate::error::{Result, TermError};
use crate::expectations::{ExpectationConfiguration, ExpectationRegistry};
use crate::metrics::Kwargs;

/// Emits (at most) one expectation configuration per domain.
#[async_trait]
pub trait ExpectationConfigurationBuilder: Send + Sync + Debug {
    fn expectation_type(&self) -> &str;

    /// Parameters that must be built before the configuration is assembled.
    fn validation_parameter_builders(&self) -> &[Arc<dyn ParameterBuilder>] {
        &[]
    }

    /// Assembles the raw configuration; `None` skips the domain.
    fn build_configuration(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
    ) -> Result<Option<ExpectationConfiguration>>;

    /// Builds validation parameters, assembles the configuration, merges in
    /// the domain kwargs and normalizes the result through the registry.
    async fn build_expectation_configuration(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &mut Parameters,
        runtime: &mut ProfilerRuntime<'_>,
        registry: &ExpectationRegistry,
    ) -> Result<Option<ExpectationConfiguration>> {
        for builder in self.validation_parameter_builders() {
            builder
                .build_parameters(domain, variables, parameters, runtime)
                .await?;
        }
        let Some(configuration) = self.build_configuration(domain, variables, parameters)? else {
            debug!(expectation.type = %self.expectation_type(), domain = %domain, "Expectation skipped");
            return Ok(None);
        };

        let mut kwargs = configuration.kwargs().clone();
        kwargs.extend(domain.domain_kwargs.clone());
        let merged = ExpectationConfiguration::from_parts(
            configuration.expectation_type(),
            kwargs,
            configuration.meta().clone(),
        );
        registry.roundtrip(&merged).map(Some)
    }
}

/// Builds a configuration from a kwargs template.
///
/// Values in `kwargs` and `meta` may reference parameters, variables or the
/// domain; they are resolved per domain. `extra` kwargs are copied verbatim.
/// An optional `condition` must resolve to a boolean; the expectation is
/// only emitted when it is true.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_expectations::profiler::expectation_builder::DefaultExpectationConfigurationBuilder;
///
/// let builder = DefaultExpectationConfigurationBuilder::new("expect_table_row_count_to_be_between")
///     .with_kwarg("min_value", json!("$parameter.row_count_range.value[0]"))
///     .with_kwarg("max_value", json!("$parameter.row_count_range.value[1]"))
///     .with_meta("profiler_details", json!("$parameter.row_count_range.details"));
/// ```
#[derive(Debug, Clone)]
pub struct DefaultExpectationConfigurationBuilder {
    expectation_type: String,
    kwargs: Kwargs,
    meta: Kwargs,
    extra: Kwargs,
    condition: Option<Value>,
    validation_parameter_builders: Vec<Arc<dyn ParameterBuilder>>,
}

impl DefaultExpectationConfigurationBuilder {
    pub fn new(expectation_type: impl Into<String>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs: Kwargs::new(),
            meta: Kwargs::new(),
            extra: Kwargs::new(),
            condition: None,
            validation_parameter_builders: Vec::new(),
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_validation_parameter_builder(mut self, builder: Arc<dyn ParameterBuilder>) -> Self {
        self.validation_parameter_builders.push(builder);
        self
    }

    fn resolve_all(
        template: &Kwargs,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
    ) -> Result<Kwargs> {
        template
            .iter()
            .map(|(key, value)| {
                Ok((
                    key.clone(),
                    resolve_references(value, domain, variables, parameters)?,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl ExpectationConfigurationBuilder for DefaultExpectationConfigurationBuilder {
    fn expectation_type(&self) -> &str {
        &self.expectation_type
    }

    fn validation_parameter_builders(&self) -> &[Arc<dyn ParameterBuilder>] {
        &self.validation_parameter_builders
    }

    fn build_configuration(
        &self,
        domain: &Domain,
        variables: &Kwargs,
        parameters: &Parameters,
    ) -> Result<Option<ExpectationConfiguration>> {
        if let Some(condition) = &self.condition {
            match resolve_references(condition, domain, variables, parameters)? {
                Value::Bool(true) => {}
                Value::Bool(false) => return Ok(None),
                other => {
                    return Err(TermError::configuration(format!(
                        "condition for '{}' must resolve to a boolean, got {other}",
                        self.expectation_type
                    )))
                }
            }
        }

        let mut kwargs = Self::resolve_all(&self.kwargs, domain, variables, parameters)?;
        kwargs.extend(self.extra.clone());
        let meta = Self::resolve_all(&self.meta, domain, variables, parameters)?;
        Ok(Some(ExpectationConfiguration::from_parts(
            &self.expectation_type,
            kwargs,
            meta,
        )))
    }
}
