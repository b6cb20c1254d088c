//! Declarative description of one expectation instance.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorContext, Result, TermError};
use crate::metrics::Kwargs;

/// Kwargs that select data rather than parameterize a check.
pub const DOMAIN_KWARG_KEYS: [&str; 7] = [
    "batch_id",
    "table",
    "column",
    "column_A",
    "column_B",
    "column_list",
    "row_condition",
];

/// `{type, kwargs, meta}` triple describing an expectation.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_expectations::expectations::ExpectationConfiguration;
///
/// let config = ExpectationConfiguration::new("expect_column_values_to_not_be_null")
///     .with_kwarg("column", json!("email"))
///     .with_kwarg("mostly", json!(0.95));
///
/// assert_eq!(config.kwarg("column"), Some(&json!("email")));
/// assert_eq!(config.domain_kwargs().len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationConfiguration {
    #[serde(rename = "type")]
    expectation_type: String,
    #[serde(default)]
    kwargs: Kwargs,
    #[serde(default)]
    meta: Kwargs,
}

impl ExpectationConfiguration {
    pub fn new(expectation_type: impl Into<String>) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs: Kwargs::new(),
            meta: Kwargs::new(),
        }
    }

    pub fn from_parts(expectation_type: impl Into<String>, kwargs: Kwargs, meta: Kwargs) -> Self {
        Self {
            expectation_type: expectation_type.into(),
            kwargs,
            meta,
        }
    }

    pub fn with_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.kwargs.insert(key.into(), value);
        self
    }

    pub fn with_kwargs(mut self, kwargs: Kwargs) -> Self {
        self.kwargs.extend(kwargs);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn expectation_type(&self) -> &str {
        &self.expectation_type
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    pub fn meta(&self) -> &Kwargs {
        &self.meta
    }

    /// Kwarg by key; JSON `null` counts as absent.
    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key).filter(|v| !v.is_null())
    }

    /// The subset of kwargs that select data.
    pub fn domain_kwargs(&self) -> Kwargs {
        self.kwargs
            .iter()
            .filter(|(k, v)| DOMAIN_KWARG_KEYS.contains(&k.as_str()) && !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// True when both configurations have the same type and select the same data.
    pub fn is_equivalent_to(&self, other: &ExpectationConfiguration) -> bool {
        self.expectation_type == other.expectation_type
            && self.domain_kwargs() == other.domain_kwargs()
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value.clone())
            .context("invalid expectation configuration JSON")?;
        if config.expectation_type.trim().is_empty() {
            return Err(TermError::configuration("expectation type cannot be empty"));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_type_key() {
        let config = ExpectationConfiguration::new("expect_table_row_count_to_be_between")
            .with_kwarg("min_value", json!(1));
        let json = config.to_json().unwrap();
        assert_eq!(json["type"], json!("expect_table_row_count_to_be_between"));
        assert_eq!(json["kwargs"]["min_value"], json!(1));
        assert_eq!(ExpectationConfiguration::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_domain_kwargs_and_equivalence() {
        let a = ExpectationConfiguration::new("expect_column_values_to_not_be_null")
            .with_kwarg("column", json!("id"))
            .with_kwarg("mostly", json!(0.9));
        let b = ExpectationConfiguration::new("expect_column_values_to_not_be_null")
            .with_kwarg("column", json!("id"))
            .with_kwarg("row_condition", Value::Null);
        assert_eq!(a.domain_kwargs(), Kwargs::from([("column".into(), json!("id"))]));
        assert!(a.is_equivalent_to(&b));
    }

    #[test]
    fn test_empty_type_rejected() {
        assert!(ExpectationConfiguration::from_json(&json!({"type": " ", "kwargs": {}})).is_err());
    }

    #[test]
    fn test_malformed_json_names_what_failed() {
        let err = ExpectationConfiguration::from_json(&json!({"kwargs": {}})).unwrap_err();
        assert!(matches!(err, TermError::Serialization(_)));
        assert!(err
            .to_string()
            .contains("invalid expectation configuration JSON"));
    }
}
