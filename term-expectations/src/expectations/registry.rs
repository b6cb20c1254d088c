//! Startup-time table of expectation constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::column_aggregate::{AggregateKind, ColumnAggregateExpectation};
use super::column_map::{map_expectation_type, ColumnMapExpectation};
use super::configuration::ExpectationConfiguration;
use super::profile_diff::{ProfileNumericColumnsDiffExpectation, PROFILE_NUMERIC_COLUMNS_DIFF_TYPE};
use super::table::{
    ColumnToExistExpectation, TableRowCountExpectation, COLUMN_TO_EXIST_TYPE, TABLE_ROW_COUNT_TYPE,
};
use super::traits::Expectation;
use crate::error::{Result, TermError};
use crate::metrics::providers::MapCondition;

/// Builds an expectation from its configuration.
pub type ExpectationFactory =
    Arc<dyn Fn(&ExpectationConfiguration) -> Result<Box<dyn Expectation>> + Send + Sync>;

/// Maps expectation type names to constructors.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_expectations::expectations::{ExpectationConfiguration, ExpectationRegistry};
///
/// let registry = ExpectationRegistry::with_defaults();
/// let config = ExpectationConfiguration::new("expect_column_max_to_be_between")
///     .with_kwarg("column", json!("price"))
///     .with_kwarg("max_value", json!("100"));
///
/// let normalized = registry.roundtrip(&config).unwrap();
/// assert_eq!(normalized.kwarg("max_value"), Some(&json!(100)));
/// assert_eq!(registry.roundtrip(&normalized).unwrap(), normalized);
/// ```
#[derive(Clone, Default)]
pub struct ExpectationRegistry {
    factories: HashMap<String, ExpectationFactory>,
}

impl fmt::Debug for ExpectationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpectationRegistry")
            .field("expectation_types", &self.expectation_types())
            .finish()
    }
}

impl ExpectationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in expectation.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in AggregateKind::ALL {
            registry.register(kind.expectation_type(), move |config| {
                Ok(Box::new(ColumnAggregateExpectation::new(kind, config)?))
            });
        }
        for condition in MapCondition::ALL {
            registry.register(map_expectation_type(condition), move |config| {
                Ok(Box::new(ColumnMapExpectation::new(condition, config)?))
            });
        }
        registry.register(TABLE_ROW_COUNT_TYPE, |config| {
            Ok(Box::new(TableRowCountExpectation::new(config)?))
        });
        registry.register(COLUMN_TO_EXIST_TYPE, |config| {
            Ok(Box::new(ColumnToExistExpectation::new(config)?))
        });
        registry.register(PROFILE_NUMERIC_COLUMNS_DIFF_TYPE, |config| {
            Ok(Box::new(ProfileNumericColumnsDiffExpectation::new(config)?))
        });
        debug!(expectations = registry.len(), "Registered built-in expectations");
        registry
    }

    pub fn register<F>(&mut self, expectation_type: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ExpectationConfiguration) -> Result<Box<dyn Expectation>> + Send + Sync + 'static,
    {
        let expectation_type = expectation_type.into();
        if self
            .factories
            .insert(expectation_type.clone(), Arc::new(factory))
            .is_some()
        {
            warn!(expectation.type = %expectation_type, "Replacing registered expectation");
        }
        self
    }

    pub fn contains(&self, expectation_type: &str) -> bool {
        self.factories.contains_key(expectation_type)
    }

    /// Constructs the expectation a configuration describes.
    pub fn build(&self, configuration: &ExpectationConfiguration) -> Result<Box<dyn Expectation>> {
        let factory = self
            .factories
            .get(configuration.expectation_type())
            .ok_or_else(|| {
                TermError::configuration(format!(
                    "unknown expectation type '{}'",
                    configuration.expectation_type()
                ))
            })?;
        factory(configuration)
    }

    /// Validates and normalizes a configuration by constructing its expectation.
    pub fn roundtrip(&self, configuration: &ExpectationConfiguration) -> Result<ExpectationConfiguration> {
        Ok(self.build(configuration)?.configuration().clone())
    }

    /// Registered types, sorted.
    pub fn expectation_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let registry = ExpectationRegistry::with_defaults();
        assert_eq!(registry.len(), 14);
        assert!(registry.contains("expect_column_values_to_be_in_set"));
        assert!(registry.contains(PROFILE_NUMERIC_COLUMNS_DIFF_TYPE));
    }

    #[test]
    fn test_unknown_type() {
        let err = ExpectationRegistry::with_defaults()
            .build(&ExpectationConfiguration::new("expect_the_unexpected"))
            .unwrap_err();
        assert!(err.to_string().contains("expect_the_unexpected"));
    }

    #[test]
    fn test_roundtrip_is_idempotent() {
        let registry = ExpectationRegistry::with_defaults();
        let config = ExpectationConfiguration::new("expect_column_values_to_be_between")
            .with_kwarg("column", json!("age"))
            .with_kwarg("min_value", json!("18"))
            .with_kwarg("mostly", json!("0.9"))
            .with_kwarg("row_condition", serde_json::Value::Null)
            .with_meta("notes", json!("adults only"));
        let once = registry.roundtrip(&config).unwrap();
        assert_eq!(once.kwarg("min_value"), Some(&json!(18)));
        assert_eq!(once.kwarg("mostly"), Some(&json!(0.9)));
        assert_eq!(once.meta()["notes"], json!("adults only"));
        assert_eq!(registry.roundtrip(&once).unwrap(), once);
    }
}
