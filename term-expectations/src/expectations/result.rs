//! Validation results and their verbosity-tiered payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::configuration::ExpectationConfiguration;
use super::result_format::{ResultFormat, ResultFormatConfig};
use crate::metrics::Kwargs;

/// Result payload split by the verbosity level that first includes each key.
///
/// The payload emitted at a level is the union of every tier up to that
/// level, so a more verbose format can only ever add keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultDetails {
    basic: Kwargs,
    summary: Kwargs,
    complete: Kwargs,
}

impl ResultDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_basic(mut self, key: impl Into<String>, value: Value) -> Self {
        self.basic.insert(key.into(), value);
        self
    }

    pub fn with_summary(mut self, key: impl Into<String>, value: Value) -> Self {
        self.summary.insert(key.into(), value);
        self
    }

    pub fn with_complete(mut self, key: impl Into<String>, value: Value) -> Self {
        self.complete.insert(key.into(), value);
        self
    }

    /// Payload for the given format; `None` at BOOLEAN_ONLY.
    pub fn render(&self, format: ResultFormat) -> Option<Kwargs> {
        if format == ResultFormat::BooleanOnly {
            return None;
        }
        let mut payload = self.basic.clone();
        if format >= ResultFormat::Summary {
            payload.extend(self.summary.clone());
        }
        if format >= ResultFormat::Complete {
            payload.extend(self.complete.clone());
        }
        Some(payload)
    }
}

/// What an expectation's validation logic decided.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectationOutcome {
    pub success: bool,
    pub details: ResultDetails,
}

impl ExpectationOutcome {
    pub fn new(success: bool, details: ResultDetails) -> Self {
        Self { success, details }
    }
}

/// Why an expectation could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub raised_exception: bool,
    pub exception_message: String,
}

impl ExceptionInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            raised_exception: true,
            exception_message: message.into(),
        }
    }
}

/// Outcome of validating one expectation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationValidationResult {
    success: bool,
    expectation_config: ExpectationConfiguration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Kwargs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exception_info: Option<ExceptionInfo>,
    #[serde(default, skip_serializing_if = "Kwargs::is_empty")]
    meta: Kwargs,
}

impl ExpectationValidationResult {
    /// Builds the result of a successful evaluation at the requested verbosity.
    pub fn from_outcome(
        expectation_config: ExpectationConfiguration,
        outcome: ExpectationOutcome,
        format: &ResultFormatConfig,
    ) -> Self {
        Self {
            success: outcome.success,
            result: outcome.details.render(format.result_format),
            expectation_config,
            exception_info: None,
            meta: Kwargs::new(),
        }
    }

    /// A failed result carrying the error that prevented evaluation.
    pub fn from_exception(
        expectation_config: ExpectationConfiguration,
        message: impl Into<String>,
        format: &ResultFormatConfig,
    ) -> Self {
        Self {
            success: false,
            result: ResultDetails::new().render(format.result_format),
            expectation_config,
            exception_info: Some(ExceptionInfo::new(message)),
            meta: Kwargs::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn expectation_config(&self) -> &ExpectationConfiguration {
        &self.expectation_config
    }

    pub fn result(&self) -> Option<&Kwargs> {
        self.result.as_ref()
    }

    /// A key of the result payload, if the payload and key exist.
    pub fn result_value(&self, key: &str) -> Option<&Value> {
        self.result.as_ref().and_then(|r| r.get(key))
    }

    pub fn exception_info(&self) -> Option<&ExceptionInfo> {
        self.exception_info.as_ref()
    }

    pub fn meta(&self) -> &Kwargs {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn details() -> ResultDetails {
        ResultDetails::new()
            .with_basic("observed_value", json!(3))
            .with_summary("partial_unexpected_counts", json!([]))
            .with_complete("unexpected_list", json!([1, 2]))
    }

    #[test]
    fn test_payload_grows_with_verbosity() {
        let d = details();
        assert_eq!(d.render(ResultFormat::BooleanOnly), None);
        let basic = d.render(ResultFormat::Basic).unwrap();
        let summary = d.render(ResultFormat::Summary).unwrap();
        let complete = d.render(ResultFormat::Complete).unwrap();
        assert_eq!(basic.len(), 1);
        assert!(basic.keys().all(|k| summary.contains_key(k)));
        assert!(summary.keys().all(|k| complete.contains_key(k)));
        assert_eq!(complete.len(), 3);
    }

    #[test]
    fn test_boolean_only_serialization_omits_result() {
        let config = ExpectationConfiguration::new("expect_table_row_count_to_be_between");
        let result = ExpectationValidationResult::from_outcome(
            config,
            ExpectationOutcome::new(true, details()),
            &ResultFormatConfig::boolean_only(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], json!(true));
        assert!(json.get("result").is_none());
        assert!(json.get("exception_info").is_none());
    }

    #[test]
    fn test_exception_result() {
        let config = ExpectationConfiguration::new("expect_column_min_to_be_between");
        let result = ExpectationValidationResult::from_exception(
            config,
            "column 'x' not found",
            &ResultFormatConfig::basic(),
        );
        assert!(!result.success());
        assert_eq!(result.result(), Some(&Kwargs::new()));
        assert!(result
            .exception_info()
            .unwrap()
            .exception_message
            .contains("not found"));
    }
}
