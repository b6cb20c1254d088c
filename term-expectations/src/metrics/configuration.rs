//! Metric request descriptors and their identities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Keyword arguments attached to metrics, domains and expectations.
///
/// A `BTreeMap` keeps keys sorted, so serializing the same logical map always
/// produces the same JSON text.
pub type Kwargs = BTreeMap<String, Value>;

/// Serializes kwargs into their canonical text form.
pub fn canonical_kwargs(kwargs: &Kwargs) -> String {
    canonical_value(&Value::Object(
        kwargs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    ))
}

/// Serializes any JSON value with object keys sorted at every depth.
pub fn canonical_value(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, Value> =
                    map.iter().map(|(k, v)| (k, sort(v))).collect();
                Value::Object(
                    sorted
                        .into_iter()
                        .map(|(k, v)| (k.clone(), v))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Identity of a metric request: `(metric_name, domain kwargs, value kwargs)`.
///
/// Two configurations with equal ids describe the same computation and are
/// resolved once per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricConfigurationId {
    pub metric_name: String,
    pub metric_domain_kwargs_id: String,
    pub metric_value_kwargs_id: String,
}

impl fmt::Display for MetricConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.metric_name, self.metric_domain_kwargs_id, self.metric_value_kwargs_id
        )
    }
}

/// A request to compute one named metric over one domain.
///
/// Configurations are immutable once built; the `with_*` methods consume the
/// value and return a new one.
///
/// # Examples
///
/// ```rust
/// use term_expectations::metrics::MetricConfiguration;
/// use serde_json::json;
///
/// let a = MetricConfiguration::new("column.max")
///     .with_domain_kwarg("column", json!("price"))
///     .with_domain_kwarg("batch_id", json!("b1"));
/// let b = MetricConfiguration::new("column.max")
///     .with_domain_kwarg("batch_id", json!("b1"))
///     .with_domain_kwarg("column", json!("price"));
///
/// assert_eq!(a.id(), b.id());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfiguration {
    metric_name: String,
    #[serde(default)]
    metric_domain_kwargs: Kwargs,
    #[serde(default)]
    metric_value_kwargs: Kwargs,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    metric_dependencies: Vec<MetricConfiguration>,
}

impl MetricConfiguration {
    /// Creates a configuration with empty domain and value kwargs.
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs: Kwargs::new(),
            metric_value_kwargs: Kwargs::new(),
            metric_dependencies: Vec::new(),
        }
    }

    /// Creates a configuration from complete kwargs maps.
    pub fn with_kwargs(
        metric_name: impl Into<String>,
        metric_domain_kwargs: Kwargs,
        metric_value_kwargs: Kwargs,
    ) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_domain_kwargs,
            metric_value_kwargs,
            metric_dependencies: Vec::new(),
        }
    }

    pub fn with_domain_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metric_domain_kwargs.insert(key.into(), value);
        self
    }

    pub fn with_value_kwarg(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metric_value_kwargs.insert(key.into(), value);
        self
    }

    /// Declares a dependency that must be resolved before this metric.
    pub fn with_dependency(mut self, dependency: MetricConfiguration) -> Self {
        self.metric_dependencies.push(dependency);
        self
    }

    /// Returns a copy whose domain (and the domains of its declared
    /// dependencies) carries `key`, unless the key is already present.
    pub fn with_default_domain_kwarg(mut self, key: &str, value: &Value) -> Self {
        self.metric_domain_kwargs
            .entry(key.to_string())
            .or_insert_with(|| value.clone());
        self.metric_dependencies = self
            .metric_dependencies
            .into_iter()
            .map(|dep| dep.with_default_domain_kwarg(key, value))
            .collect();
        self
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn metric_domain_kwargs(&self) -> &Kwargs {
        &self.metric_domain_kwargs
    }

    pub fn metric_value_kwargs(&self) -> &Kwargs {
        &self.metric_value_kwargs
    }

    pub fn metric_dependencies(&self) -> &[MetricConfiguration] {
        &self.metric_dependencies
    }

    /// Domain kwarg as a string, if present and a string.
    pub fn domain_str(&self, key: &str) -> Option<&str> {
        self.metric_domain_kwargs.get(key).and_then(Value::as_str)
    }

    /// Value kwarg, treating JSON `null` as absent.
    pub fn value_kwarg(&self, key: &str) -> Option<&Value> {
        self.metric_value_kwargs.get(key).filter(|v| !v.is_null())
    }

    /// Canonical id of the domain kwargs.
    pub fn domain_kwargs_id(&self) -> String {
        canonical_kwargs(&self.metric_domain_kwargs)
    }

    /// Canonical id of the value kwargs.
    pub fn value_kwargs_id(&self) -> String {
        canonical_kwargs(&self.metric_value_kwargs)
    }

    /// Identity used as the resolution cache key.
    pub fn id(&self) -> MetricConfigurationId {
        MetricConfigurationId {
            metric_name: self.metric_name.clone(),
            metric_domain_kwargs_id: self.domain_kwargs_id(),
            metric_value_kwargs_id: self.value_kwargs_id(),
        }
    }
}

impl fmt::Display for MetricConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(domain={}, value={})",
            self.metric_name,
            self.domain_kwargs_id(),
            self.value_kwargs_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_ignores_insertion_order() {
        let a = MetricConfiguration::new("column.mean")
            .with_domain_kwarg("column", json!("a"))
            .with_domain_kwarg("row_condition", json!("b > 1"));
        let b = MetricConfiguration::new("column.mean")
            .with_domain_kwarg("row_condition", json!("b > 1"))
            .with_domain_kwarg("column", json!("a"));
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_id_distinguishes_value_kwargs() {
        let a = MetricConfiguration::new("column_values.between.unexpected_count")
            .with_value_kwarg("min_value", json!(1));
        let b = MetricConfiguration::new("column_values.between.unexpected_count")
            .with_value_kwarg("min_value", json!(2));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_nested_objects_are_canonical() {
        let a = MetricConfiguration::new("m").with_value_kwarg("k", json!({"b": 1, "a": 2}));
        let b = MetricConfiguration::new("m").with_value_kwarg("k", json!({"a": 2, "b": 1}));
        assert_eq!(a.value_kwargs_id(), b.value_kwargs_id());
        assert_eq!(a.value_kwargs_id(), r#"{"k":{"a":2,"b":1}}"#);
    }

    #[test]
    fn test_dependencies_do_not_affect_identity() {
        let dep = MetricConfiguration::new("table.row_count");
        let a = MetricConfiguration::new("m");
        let b = MetricConfiguration::new("m").with_dependency(dep);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_default_domain_kwarg_propagates_to_dependencies() {
        let config = MetricConfiguration::new("m")
            .with_domain_kwarg("batch_id", json!("explicit"))
            .with_dependency(MetricConfiguration::new("table.row_count"))
            .with_default_domain_kwarg("batch_id", &json!("b2"));

        assert_eq!(config.domain_str("batch_id"), Some("explicit"));
        assert_eq!(config.metric_dependencies()[0].domain_str("batch_id"), Some("b2"));
    }

    #[test]
    fn test_null_value_kwarg_is_absent() {
        let config = MetricConfiguration::new("m").with_value_kwarg("limit", Value::Null);
        assert!(config.value_kwarg("limit").is_none());
    }
}
