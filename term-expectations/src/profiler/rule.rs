//! Rules: a domain builder, parameter builders and expectation builders
//! applied together.

use std::sync::Arc;
use std::time::{Duration, Instant};
use serde_json::Value;
use tracing::{debug, instrument};

use super::domain::Domain;
use super::domain_builder::DomainBuilder;
use super::expectation_builder::ExpectationConfigurationBuilder;
use super::parameter_builder::{ParameterBuilder, ProfilerRuntime};
use super::parameter_container::Parameters;
use crate::error::Result;
use crate::expectations::{ExpectationConfiguration, ExpectationRegistry};
use crate::metrics::Kwargs;

/// A named profiling rule.
///
/// For every domain the domain builder yields, the parameter builders run in
/// order, then each expectation configuration builder may emit one
/// configuration.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    variables: Kwargs,
    domain_builder: Arc<dyn DomainBuilder>,
    parameter_builders: Vec<Arc<dyn ParameterBuilder>>,
    expectation_configuration_builders: Vec<Arc<dyn ExpectationConfigurationBuilder>>,
}

/// What one rule produced.
#[derive(Debug, Clone)]
pub struct RuleState {
    pub rule_name: String,
    pub domains: Vec<Domain>,
    pub parameters: Parameters,
    pub expectation_configurations: Vec<ExpectationConfiguration>,
    pub execution_time: Duration,
}

impl Rule {
    pub fn new(name: impl Into<String>, domain_builder: impl DomainBuilder + 'static) -> Self {
        Self {
            name: name.into(),
            variables: Kwargs::new(),
            domain_builder: Arc::new(domain_builder),
            parameter_builders: Vec::new(),
            expectation_configuration_builders: Vec::new(),
        }
    }

    /// Rule variables override profiler variables of the same name.
    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn with_parameter_builder(mut self, builder: impl ParameterBuilder + 'static) -> Self {
        self.parameter_builders.push(Arc::new(builder));
        self
    }

    pub fn with_expectation_configuration_builder(
        mut self,
        builder: impl ExpectationConfigurationBuilder + 'static,
    ) -> Self {
        self.expectation_configuration_builders.push(Arc::new(builder));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &Kwargs {
        &self.variables
    }

    #[instrument(skip_all, fields(rule.name = %self.name))]
    pub async fn run(
        &self,
        profiler_variables: &Kwargs,
        runtime: &mut ProfilerRuntime<'_>,
        registry: &ExpectationRegistry,
    ) -> Result<RuleState> {
        let started = Instant::now();
        let mut variables = profiler_variables.clone();
        variables.extend(self.variables.clone());

        let domains = self
            .domain_builder
            .get_domains(&self.name, &variables, runtime)
            .await?;

        let mut parameters = Parameters::new();
        let mut expectation_configurations = Vec::new();
        for domain in &domains {
            for builder in &self.parameter_builders {
                builder
                    .build_parameters(domain, &variables, &mut parameters, runtime)
                    .await?;
            }
            for builder in &self.expectation_configuration_builders {
                if let Some(configuration) = builder
                    .build_expectation_configuration(
                        domain,
                        &variables,
                        &mut parameters,
                        runtime,
                        registry,
                    )
                    .await?
                {
                    expectation_configurations.push(configuration);
                }
            }
        }

        let execution_time = started.elapsed();
        debug!(
            domains = domains.len(),
            expectations = expectation_configurations.len(),
            elapsed_ms = execution_time.as_millis() as u64,
            "Rule finished"
        );
        Ok(RuleState {
            rule_name: self.name.clone(),
            domains,
            parameters,
            expectation_configurations,
            execution_time,
        })
    }
}
