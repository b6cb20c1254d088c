//! Named collections of expectation configurations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::configuration::ExpectationConfiguration;
use crate::error::{ErrorContext, Result, TermError};
use crate::metrics::Kwargs;

/// A named list of expectation configurations.
///
/// At most one configuration exists per expectation type and domain: adding
/// an equivalent configuration replaces the earlier one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationSuite {
    name: String,
    #[serde(default)]
    expectations: Vec<ExpectationConfiguration>,
    #[serde(default)]
    meta: Kwargs,
}

impl ExpectationSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expectations: Vec::new(),
            meta: Kwargs::new(),
        }
    }

    pub fn with_expectation(mut self, configuration: ExpectationConfiguration) -> Self {
        self.add_expectation(configuration);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Adds a configuration; returns true when it replaced an equivalent one.
    pub fn add_expectation(&mut self, configuration: ExpectationConfiguration) -> bool {
        match self
            .expectations
            .iter_mut()
            .find(|existing| existing.is_equivalent_to(&configuration))
        {
            Some(existing) => {
                debug!(
                    suite.name = %self.name,
                    expectation.type = %configuration.expectation_type(),
                    "Replacing equivalent expectation"
                );
                *existing = configuration;
                true
            }
            None => {
                self.expectations.push(configuration);
                false
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expectations(&self) -> &[ExpectationConfiguration] {
        &self.expectations
    }

    pub fn meta(&self) -> &Kwargs {
        &self.meta
    }

    /// Configurations of the given type.
    pub fn find(&self, expectation_type: &str) -> Vec<&ExpectationConfiguration> {
        self.expectations
            .iter()
            .filter(|e| e.expectation_type() == expectation_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let suite: Self =
            serde_json::from_value(value.clone()).context("invalid expectation suite JSON")?;
        if suite.name.trim().is_empty() {
            return Err(TermError::configuration("suite name cannot be empty"));
        }
        Ok(suite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equivalent_expectation_replaced() {
        let mut suite = ExpectationSuite::new("customers");
        suite.add_expectation(
            ExpectationConfiguration::new("expect_column_values_to_not_be_null")
                .with_kwarg("column", json!("id")),
        );
        suite.add_expectation(
            ExpectationConfiguration::new("expect_column_values_to_not_be_null")
                .with_kwarg("column", json!("name")),
        );
        let replaced = suite.add_expectation(
            ExpectationConfiguration::new("expect_column_values_to_not_be_null")
                .with_kwarg("column", json!("id"))
                .with_kwarg("mostly", json!(0.5)),
        );
        assert!(replaced);
        assert_eq!(suite.len(), 2);
        assert_eq!(suite.expectations()[0].kwarg("mostly"), Some(&json!(0.5)));
    }

    #[test]
    fn test_json_roundtrip() {
        let suite = ExpectationSuite::new("s")
            .with_expectation(ExpectationConfiguration::new("expect_table_row_count_to_be_between"))
            .with_meta("source", json!("profiler"));
        let json = suite.to_json().unwrap();
        assert_eq!(json["expectations"][0]["type"], json!("expect_table_row_count_to_be_between"));
        assert_eq!(ExpectationSuite::from_json(&json).unwrap(), suite);
    }
}
