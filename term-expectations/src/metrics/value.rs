//! Resolved metric values.

use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A value produced by resolving a metric.
///
/// Covers scalars, lists of observations (e.g. unexpected values) and nested
/// maps (e.g. per-column profile comparisons).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MetricValue {
    /// A floating-point metric value (e.g., mean, proportion).
    Double(f64),

    /// An integer metric value (e.g., count).
    Long(i64),

    /// A string metric value.
    String(String),

    /// A boolean metric value.
    Boolean(bool),

    /// A list of values (e.g., unexpected values, column names).
    List(Vec<MetricValue>),

    /// A map of string keys to metric values.
    Map(BTreeMap<String, MetricValue>),

    /// The metric has no value (e.g., the max of an empty column).
    Null,
}

impl MetricValue {
    /// Checks if the metric value is numeric (Double or Long).
    pub fn is_numeric(&self) -> bool {
        matches!(self, MetricValue::Double(_) | MetricValue::Long(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetricValue::Null)
    }

    /// Attempts to get the numeric value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Double(v) => Some(*v),
            MetricValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Long(v) => Some(*v),
            MetricValue::Double(v) => {
                if v.fract() == 0.0 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetricValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetricValue]> {
        match self {
            MetricValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, MetricValue>> {
        match self {
            MetricValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Converts to plain JSON, as it appears in validation results.
    ///
    /// Non-finite doubles have no JSON form and become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            MetricValue::Double(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            MetricValue::Long(v) => Value::from(*v),
            MetricValue::String(s) => Value::String(s.clone()),
            MetricValue::Boolean(b) => Value::Bool(*b),
            MetricValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            MetricValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            MetricValue::Null => Value::Null,
        }
    }

    /// Builds a metric value from plain JSON.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => MetricValue::Null,
            Value::Bool(b) => MetricValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => MetricValue::Long(i),
                None => MetricValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => MetricValue::String(s.clone()),
            Value::Array(items) => MetricValue::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => MetricValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Returns a human-readable string representation of the metric value.
    pub fn to_string_pretty(&self) -> String {
        match self {
            MetricValue::Double(v) => {
                if v.fract() == 0.0 {
                    format!("{v:.0}")
                } else {
                    format!("{v:.4}")
                }
            }
            MetricValue::Long(v) => v.to_string(),
            MetricValue::String(s) => s.clone(),
            MetricValue::Boolean(b) => b.to_string(),
            MetricValue::List(v) => format!("List({} elements)", v.len()),
            MetricValue::Map(m) => format!("Map({} entries)", m.len()),
            MetricValue::Null => "null".to_string(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_pretty())
    }
}

impl From<&ScalarValue> for MetricValue {
    fn from(scalar: &ScalarValue) -> Self {
        if scalar.is_null() {
            return MetricValue::Null;
        }
        match scalar {
            ScalarValue::Boolean(Some(b)) => MetricValue::Boolean(*b),
            ScalarValue::Float32(Some(v)) => MetricValue::Double(f64::from(*v)),
            ScalarValue::Float64(Some(v)) => MetricValue::Double(*v),
            ScalarValue::Int8(Some(v)) => MetricValue::Long(i64::from(*v)),
            ScalarValue::Int16(Some(v)) => MetricValue::Long(i64::from(*v)),
            ScalarValue::Int32(Some(v)) => MetricValue::Long(i64::from(*v)),
            ScalarValue::Int64(Some(v)) => MetricValue::Long(*v),
            ScalarValue::UInt8(Some(v)) => MetricValue::Long(i64::from(*v)),
            ScalarValue::UInt16(Some(v)) => MetricValue::Long(i64::from(*v)),
            ScalarValue::UInt32(Some(v)) => MetricValue::Long(i64::from(*v)),
            ScalarValue::UInt64(Some(v)) => match i64::try_from(*v) {
                Ok(v) => MetricValue::Long(v),
                Err(_) => MetricValue::Double(*v as f64),
            },
            ScalarValue::Decimal128(Some(v), _, scale) => {
                MetricValue::Double(*v as f64 / 10f64.powi(i32::from(*scale)))
            }
            ScalarValue::Utf8(Some(s))
            | ScalarValue::LargeUtf8(Some(s))
            | ScalarValue::Utf8View(Some(s)) => MetricValue::String(s.clone()),
            other => MetricValue::String(other.to_string()),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Double(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Long(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Boolean(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::String(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_conversion_keeps_structure() {
        let value = MetricValue::from_json(&json!({"colA": {"mean": true}, "colB": 4.2}));
        let map = value.as_map().unwrap();
        assert_eq!(map["colB"], MetricValue::Double(4.2));
        assert_eq!(value.to_json(), json!({"colA": {"mean": true}, "colB": 4.2}));
    }

    #[test]
    fn test_non_finite_double_becomes_null() {
        assert_eq!(MetricValue::Double(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn test_scalar_conversion() {
        assert_eq!(
            MetricValue::from(&ScalarValue::Int64(Some(7))),
            MetricValue::Long(7)
        );
        assert_eq!(
            MetricValue::from(&ScalarValue::Float64(None)),
            MetricValue::Null
        );
        assert_eq!(
            MetricValue::from(&ScalarValue::Decimal128(Some(1234), 10, 2)),
            MetricValue::Double(12.34)
        );
    }

    #[test]
    fn test_as_i64_only_for_whole_doubles() {
        assert_eq!(MetricValue::Double(3.0).as_i64(), Some(3));
        assert_eq!(MetricValue::Double(3.5).as_i64(), None);
    }
}
