//! Verbosity levels for validation results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TermError};

/// How much detail a validation result carries.
///
/// Levels are ordered: each one includes everything the previous one does.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultFormat {
    /// Only `success`; the `result` payload is omitted.
    BooleanOnly,
    Basic,
    #[default]
    Summary,
    Complete,
}

impl fmt::Display for ResultFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultFormat::BooleanOnly => "BOOLEAN_ONLY",
            ResultFormat::Basic => "BASIC",
            ResultFormat::Summary => "SUMMARY",
            ResultFormat::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

impl FromStr for ResultFormat {
    type Err = TermError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BOOLEAN_ONLY" => Ok(ResultFormat::BooleanOnly),
            "BASIC" => Ok(ResultFormat::Basic),
            "SUMMARY" => Ok(ResultFormat::Summary),
            "COMPLETE" => Ok(ResultFormat::Complete),
            other => Err(TermError::configuration(format!(
                "unknown result format '{other}' (expected BOOLEAN_ONLY, BASIC, SUMMARY or COMPLETE)"
            ))),
        }
    }
}

/// Result format plus the knobs that bound its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFormatConfig {
    pub result_format: ResultFormat,
    /// Maximum number of sample values in `partial_unexpected_*` fields
    pub partial_unexpected_count: usize,
}

impl Default for ResultFormatConfig {
    fn default() -> Self {
        Self {
            result_format: ResultFormat::Summary,
            partial_unexpected_count: 20,
        }
    }
}

impl From<ResultFormat> for ResultFormatConfig {
    fn from(result_format: ResultFormat) -> Self {
        Self {
            result_format,
            ..Self::default()
        }
    }
}

impl ResultFormatConfig {
    pub fn boolean_only() -> Self {
        ResultFormat::BooleanOnly.into()
    }

    pub fn basic() -> Self {
        ResultFormat::Basic.into()
    }

    pub fn summary() -> Self {
        ResultFormat::Summary.into()
    }

    pub fn complete() -> Self {
        ResultFormat::Complete.into()
    }

    pub fn with_partial_unexpected_count(mut self, count: usize) -> Self {
        self.partial_unexpected_count = count;
        self
    }

    /// True when the payload includes the given level.
    pub fn includes(&self, level: ResultFormat) -> bool {
        self.result_format >= level
    }

    /// Parses either a bare level (`"SUMMARY"`) or an object
    /// `{"result_format": "SUMMARY", "partial_unexpected_count": 5}`.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(s.parse::<ResultFormat>()?.into()),
            Value::Object(map) => {
                let mut config = match map.get("result_format") {
                    Some(Value::String(s)) => Self::from(s.parse::<ResultFormat>()?),
                    None => Self::default(),
                    Some(other) => {
                        return Err(TermError::configuration(format!(
                            "result_format must be a string, got {other}"
                        )))
                    }
                };
                if let Some(count) = map.get("partial_unexpected_count") {
                    config.partial_unexpected_count = count.as_u64().ok_or_else(|| {
                        TermError::configuration(
                            "partial_unexpected_count must be a non-negative integer",
                        )
                    })? as usize;
                }
                Ok(config)
            }
            other => Err(TermError::configuration(format!(
                "unsupported result format specification: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levels_are_ordered() {
        assert!(ResultFormat::BooleanOnly < ResultFormat::Basic);
        assert!(ResultFormat::Basic < ResultFormat::Summary);
        assert!(ResultFormat::Summary < ResultFormat::Complete);
        assert!(ResultFormatConfig::complete().includes(ResultFormat::Summary));
        assert!(!ResultFormatConfig::basic().includes(ResultFormat::Summary));
    }

    #[test]
    fn test_summary_is_the_default() {
        assert_eq!(ResultFormat::default(), ResultFormat::Summary);
        assert_eq!(ResultFormatConfig::default(), ResultFormatConfig::summary());
        let config =
            ResultFormatConfig::from_json(&json!({"partial_unexpected_count": 5})).unwrap();
        assert_eq!(config.result_format, ResultFormat::Summary);
        assert_eq!(config.partial_unexpected_count, 5);
    }

    #[test]
    fn test_parse() {
        assert_eq!("summary".parse::<ResultFormat>().unwrap(), ResultFormat::Summary);
        assert!("VERBOSE".parse::<ResultFormat>().is_err());

        let config = ResultFormatConfig::from_json(&json!({
            "result_format": "COMPLETE",
            "partial_unexpected_count": 3
        }))
        .unwrap();
        assert_eq!(config.result_format, ResultFormat::Complete);
        assert_eq!(config.partial_unexpected_count, 3);
        assert_eq!(
            ResultFormatConfig::from_json(&json!("BOOLEAN_ONLY")).unwrap(),
            ResultFormatConfig::boolean_only()
        );
    }
}
