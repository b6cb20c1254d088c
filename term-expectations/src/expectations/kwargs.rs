//! Typed access to expectation kwargs.

use serde_json::{Number, Value};

use super::configuration::ExpectationConfiguration;
use super::traits::ResolvedDependencies;
use crate::error::{Result, TermError};
use crate::metrics::{MetricConfiguration, MetricValue};

fn invalid(config: &ExpectationConfiguration, key: &str, expected: &str, got: &Value) -> TermError {
    TermError::configuration(format!(
        "'{key}' of {} must be {expected}, got {got}",
        config.expectation_type()
    ))
}

/// Coerces a numeric kwarg, accepting numbers and numeric strings.
fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                Some(Value::from(i))
            } else {
                s.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
            }
        }
        _ => None,
    }
}

fn coerce_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Returns a copy with null kwargs dropped and the listed kwargs coerced to
/// numbers or booleans. Applying it twice changes nothing.
pub(crate) fn normalize(
    config: &ExpectationConfiguration,
    numeric: &[&str],
    boolean: &[&str],
) -> Result<ExpectationConfiguration> {
    let mut kwargs = config.kwargs().clone();
    kwargs.retain(|_, v| !v.is_null());
    for key in numeric {
        if let Some(value) = kwargs.get_mut(*key) {
            *value = coerce_number(value).ok_or_else(|| invalid(config, key, "numeric", value))?;
        }
    }
    for key in boolean {
        if let Some(value) = kwargs.get_mut(*key) {
            *value = coerce_bool(value).ok_or_else(|| invalid(config, key, "a boolean", value))?;
        }
    }
    Ok(ExpectationConfiguration::from_parts(
        config.expectation_type(),
        kwargs,
        config.meta().clone(),
    ))
}

pub(crate) fn number(config: &ExpectationConfiguration, key: &str) -> Result<Option<f64>> {
    match config.kwarg(key) {
        None => Ok(None),
        Some(value) => coerce_number(value)
            .and_then(|v| v.as_f64())
            .map(Some)
            .ok_or_else(|| invalid(config, key, "numeric", value)),
    }
}

pub(crate) fn boolean(config: &ExpectationConfiguration, key: &str) -> Result<bool> {
    match config.kwarg(key) {
        None => Ok(false),
        Some(value) => coerce_bool(value)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| invalid(config, key, "a boolean", value)),
    }
}

pub(crate) fn required_str(config: &ExpectationConfiguration, key: &str) -> Result<String> {
    match config.kwarg(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(other) => Err(invalid(config, key, "a non-empty string", other)),
        None => Err(TermError::configuration(format!(
            "{} requires '{key}'",
            config.expectation_type()
        ))),
    }
}

/// `mostly`, defaulting to 1.0 and validated to `[0, 1]`.
pub(crate) fn mostly(config: &ExpectationConfiguration) -> Result<f64> {
    let mostly = number(config, "mostly")?.unwrap_or(1.0);
    if !(0.0..=1.0).contains(&mostly) {
        return Err(TermError::configuration(format!(
            "'mostly' of {} must be between 0 and 1, got {mostly}",
            config.expectation_type()
        )));
    }
    Ok(mostly)
}

/// Numeric range bounds from `min_value`/`max_value`/`strict_min`/`strict_max`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub strict_min: bool,
    pub strict_max: bool,
}

impl Bounds {
    pub fn from_config(config: &ExpectationConfiguration) -> Result<Self> {
        let bounds = Self {
            min: number(config, "min_value")?,
            max: number(config, "max_value")?,
            strict_min: boolean(config, "strict_min")?,
            strict_max: boolean(config, "strict_max")?,
        };
        if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
            if min > max {
                return Err(TermError::configuration(format!(
                    "min_value ({min}) cannot be greater than max_value ({max}) in {}",
                    config.expectation_type()
                )));
            }
        }
        Ok(bounds)
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn contains(&self, value: f64) -> bool {
        let above = match self.min {
            Some(min) if self.strict_min => value > min,
            Some(min) => value >= min,
            None => true,
        };
        let below = match self.max {
            Some(max) if self.strict_max => value < max,
            Some(max) => value <= max,
            None => true,
        };
        above && below
    }
}

/// Metric configuration over the expectation's domain kwargs.
pub(crate) fn domain_metric(config: &ExpectationConfiguration, metric_name: &str) -> MetricConfiguration {
    MetricConfiguration::with_kwargs(metric_name, config.domain_kwargs(), Default::default())
}

/// Metric configuration over the expectation's table (its domain without the column).
pub(crate) fn table_metric(config: &ExpectationConfiguration, metric_name: &str) -> MetricConfiguration {
    let mut domain = config.domain_kwargs();
    domain.remove("column");
    MetricConfiguration::with_kwargs(metric_name, domain, Default::default())
}

pub(crate) fn dependency<'a>(
    metrics: &'a ResolvedDependencies,
    key: &str,
) -> Result<&'a MetricValue> {
    metrics
        .get(key)
        .ok_or_else(|| TermError::Internal(format!("metric dependency '{key}' was not provided")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_is_idempotent() {
        let config = ExpectationConfiguration::new("expect_column_max_to_be_between")
            .with_kwarg("min_value", json!("5"))
            .with_kwarg("max_value", json!(" 7.5"))
            .with_kwarg("strict_min", json!("TRUE"))
            .with_kwarg("row_condition", Value::Null);
        let once = normalize(&config, &["min_value", "max_value"], &["strict_min"]).unwrap();
        let twice = normalize(&once, &["min_value", "max_value"], &["strict_min"]).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.kwarg("min_value"), Some(&json!(5)));
        assert_eq!(once.kwarg("max_value"), Some(&json!(7.5)));
        assert_eq!(once.kwarg("strict_min"), Some(&json!(true)));
        assert!(!once.kwargs().contains_key("row_condition"));
    }

    #[test]
    fn test_bounds() {
        let config = ExpectationConfiguration::new("t")
            .with_kwarg("min_value", json!(1))
            .with_kwarg("max_value", json!(3))
            .with_kwarg("strict_max", json!(true));
        let bounds = Bounds::from_config(&config).unwrap();
        assert!(bounds.contains(1.0));
        assert!(!bounds.contains(3.0));

        let inverted = ExpectationConfiguration::new("t")
            .with_kwarg("min_value", json!(4))
            .with_kwarg("max_value", json!(3));
        assert!(Bounds::from_config(&inverted).is_err());
    }

    #[test]
    fn test_mostly_range() {
        assert_eq!(mostly(&ExpectationConfiguration::new("t")).unwrap(), 1.0);
        let bad = ExpectationConfiguration::new("t").with_kwarg("mostly", json!(1.5));
        assert!(mostly(&bad).is_err());
    }

    #[test]
    fn test_table_metric_drops_column() {
        let config = ExpectationConfiguration::new("t")
            .with_kwarg("column", json!("a"))
            .with_kwarg("batch_id", json!("b1"));
        let metric = table_metric(&config, "table.row_count");
        assert_eq!(metric.domain_str("batch_id"), Some("b1"));
        assert!(metric.domain_str("column").is_none());
    }
}
