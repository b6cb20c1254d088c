//! Rendered content: the output of inline renderers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metrics::Kwargs;

/// The `value_type` every built-in renderer emits.
pub const STRING_VALUE_TYPE: &str = "StringValueType";

/// A string template with `$name` placeholders and their values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedTemplate {
    pub template: String,
    #[serde(default, skip_serializing_if = "Kwargs::is_empty")]
    pub params: Kwargs,
}

impl RenderedTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            params: Kwargs::new(),
        }
    }

    pub(crate) fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Substitutes every `$name` placeholder that has a param.
    ///
    /// Longer names are substituted first so `$min_value` is not clobbered
    /// by a param called `min`. String params are inserted without quotes.
    pub fn to_text(&self) -> String {
        let mut names: Vec<&String> = self.params.keys().collect();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));

        let mut text = self.template.clone();
        for name in names {
            let replacement = match &self.params[name] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            text = text.replace(&format!("${name}"), &replacement);
        }
        text
    }
}

/// One piece of content produced by an inline renderer.
///
/// `exception` is set only on placeholders emitted in place of a renderer
/// that failed, and carries that renderer's error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedAtomicContent {
    pub name: String,
    pub value: RenderedTemplate,
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl RenderedAtomicContent {
    pub fn new(name: impl Into<String>, value: RenderedTemplate) -> Self {
        Self {
            name: name.into(),
            value,
            value_type: STRING_VALUE_TYPE.to_string(),
            exception: None,
        }
    }

    pub fn with_exception(mut self, message: impl Into<String>) -> Self {
        self.exception = Some(message.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.exception.is_some()
    }

    pub fn to_text(&self) -> String {
        self.value.to_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_template_substitution() {
        let template = RenderedTemplate::new("$column minimum value must be at least $min_value.")
            .with_param("column", json!("age"))
            .with_param("min_value", json!(18))
            .with_param("min", json!("unused"));
        assert_eq!(template.to_text(), "age minimum value must be at least 18.");
    }

    #[test]
    fn test_exception_is_skipped_when_absent() {
        let content = RenderedAtomicContent::new("atomic.prescriptive.summary", RenderedTemplate::new("ok"));
        let json = serde_json::to_value(&content).unwrap();
        assert!(json.get("exception").is_none());
        assert_eq!(json["value_type"], json!(STRING_VALUE_TYPE));
        assert!(!content.is_failure());
    }
}
