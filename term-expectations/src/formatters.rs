//! Output formats for suite validation results.
//!
//! ```rust
//! use term_expectations::expectations::SuiteValidationResult;
//! use term_expectations::formatters::{HumanFormatter, ResultFormatter};
//!
//! let result = SuiteValidationResult::new(Some("orders".into()), vec![]);
//! let text = HumanFormatter::new().format(&result).unwrap();
//! assert!(text.contains("Suite: orders"));
//! ```

use serde_json::{json, Value};
use std::fmt::{self, Write};

use crate::error::{Result, TermError};
use crate::expectations::{ExpectationValidationResult, SuiteValidationResult};
use crate::render::{InlineRenderer, RendererRegistry, RendererType};

/// Options shared by the formatters.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the statistics block
    pub include_statistics: bool,
    /// Include per-expectation results
    pub include_results: bool,
    /// Only list results that did not succeed
    pub failures_only: bool,
    /// Maximum number of results to list (None for all)
    pub max_results: Option<usize>,
    /// Attach inline-rendered text to each listed result
    pub include_rendered: bool,
    /// ANSI colors (human formatter only)
    pub use_colors: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_statistics: true,
            include_results: true,
            failures_only: true,
            max_results: None,
            include_rendered: true,
            use_colors: true,
        }
    }
}

impl FormatterConfig {
    /// Statistics only.
    pub fn minimal() -> Self {
        Self {
            include_results: false,
            include_rendered: false,
            use_colors: false,
            ..Self::default()
        }
    }

    /// Every result, successful or not.
    pub fn detailed() -> Self {
        Self {
            failures_only: false,
            ..Self::default()
        }
    }

    /// No colors, at most 20 failures.
    pub fn ci() -> Self {
        Self {
            max_results: Some(20),
            use_colors: false,
            ..Self::default()
        }
    }

    pub fn with_results(mut self, include: bool) -> Self {
        self.include_results = include;
        self
    }

    pub fn with_failures_only(mut self, failures_only: bool) -> Self {
        self.failures_only = failures_only;
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = Some(max);
        self
    }

    pub fn with_rendered(mut self, include: bool) -> Self {
        self.include_rendered = include;
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    /// The listed results and how many were left out.
    fn select<'r>(
        &self,
        result: &'r SuiteValidationResult,
    ) -> (Vec<&'r ExpectationValidationResult>, usize) {
        if !self.include_results {
            return (Vec::new(), 0);
        }
        let candidates: Vec<_> = result
            .results
            .iter()
            .filter(|r| !self.failures_only || !r.success())
            .collect();
        let limit = self.max_results.unwrap_or(candidates.len());
        let omitted = candidates.len().saturating_sub(limit);
        (candidates.into_iter().take(limit).collect(), omitted)
    }
}

/// Converts a suite validation result into text.
pub trait ResultFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String>;
}

/// Rendered text of one result, by renderer family.
struct RenderedText {
    prescriptive: Vec<String>,
    diagnostic: Vec<String>,
}

fn rendered_text(
    renderer: &InlineRenderer<'_>,
    result: &ExpectationValidationResult,
) -> Result<RenderedText> {
    let mut text = RenderedText {
        prescriptive: Vec::new(),
        diagnostic: Vec::new(),
    };
    for content in renderer.render_validation_result(result)? {
        match RendererType::of_renderer(&content.name) {
            RendererType::Prescriptive => text.prescriptive.push(content.to_text()),
            RendererType::Diagnostic => text.diagnostic.push(content.to_text()),
        }
    }
    Ok(text)
}

/// Structured JSON output.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    renderers: RendererRegistry,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            renderers: RendererRegistry::with_defaults(),
            pretty: true,
        }
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    /// The value that [`format`](ResultFormatter::format) serializes.
    pub fn to_value(&self, result: &SuiteValidationResult) -> Result<Value> {
        let renderer = InlineRenderer::new(&self.renderers);
        let mut output = json!({ "success": result.success });
        if let Some(name) = &result.suite_name {
            output["suite_name"] = json!(name);
        }
        if self.config.include_statistics {
            output["statistics"] = serde_json::to_value(&result.statistics)?;
        }

        let (listed, omitted) = self.config.select(result);
        if self.config.include_results {
            let mut results = Vec::with_capacity(listed.len());
            for item in listed {
                let mut value = serde_json::to_value(item)?;
                if self.config.include_rendered {
                    value["rendered"] =
                        serde_json::to_value(renderer.render_validation_result(item)?)?;
                }
                results.push(value);
            }
            output["results"] = Value::Array(results);
            if omitted > 0 {
                output["omitted_results"] = json!(omitted);
            }
        }
        Ok(output)
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for JsonFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String> {
        let value = self.to_value(result)?;
        let text = if self.pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }
}

/// Console output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
    renderers: RendererRegistry,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self::with_config(FormatterConfig::default())
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            renderers: RendererRegistry::with_defaults(),
        }
    }

    pub fn with_renderers(mut self, renderers: RendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    fn paint(&self, text: &str, color: u8) -> String {
        if self.config.use_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn write_report(
        &self,
        out: &mut String,
        result: &SuiteValidationResult,
        rendered: &[(&ExpectationValidationResult, Option<RenderedText>)],
        omitted: usize,
    ) -> fmt::Result {
        writeln!(out)?;
        if result.success {
            writeln!(out, "✅ {}", self.paint("Validation PASSED", 32))?;
        } else {
            writeln!(out, "❌ {}", self.paint("Validation FAILED", 31))?;
        }
        if let Some(name) = &result.suite_name {
            writeln!(out)?;
            writeln!(out, "Suite: {name}")?;
        }

        if self.config.include_statistics {
            let stats = &result.statistics;
            writeln!(out)?;
            writeln!(out, "📊 Summary Statistics:")?;
            writeln!(out, "   Evaluated: {}", stats.evaluated_expectations)?;
            writeln!(
                out,
                "   ✅ Passed: {}",
                self.paint(&stats.successful_expectations.to_string(), 32)
            )?;
            writeln!(
                out,
                "   ❌ Failed: {}",
                self.paint(&stats.unsuccessful_expectations.to_string(), 31)
            )?;
            match stats.success_percent {
                Some(percent) => writeln!(out, "   Success Rate: {percent:.1}%")?,
                None => writeln!(out, "   Success Rate: n/a")?,
            }
        }

        if !rendered.is_empty() {
            writeln!(out)?;
            let heading = if self.config.failures_only {
                "🔍 Failed Expectations:"
            } else {
                "🔍 Expectations:"
            };
            writeln!(out, "{heading}")?;
            for (position, (item, text)) in rendered.iter().enumerate() {
                let symbol = if item.success() { "✅" } else { "❌" };
                writeln!(out)?;
                writeln!(
                    out,
                    "   {symbol} #{}: {}",
                    position + 1,
                    item.expectation_config().expectation_type()
                )?;
                if let Some(text) = text {
                    for line in &text.prescriptive {
                        writeln!(out, "      Expects: {line}")?;
                    }
                    for line in &text.diagnostic {
                        writeln!(out, "      Observed: {line}")?;
                    }
                }
                if let Some(info) = item.exception_info() {
                    writeln!(out, "      Exception: {}", info.exception_message)?;
                }
            }
            if omitted > 0 {
                writeln!(out)?;
                writeln!(out, "   ... and {omitted} more")?;
            }
        }
        writeln!(out)
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultFormatter for HumanFormatter {
    fn format(&self, result: &SuiteValidationResult) -> Result<String> {
        let renderer = InlineRenderer::new(&self.renderers);
        let (listed, omitted) = self.config.select(result);

        let mut rendered = Vec::with_capacity(listed.len());
        for item in listed {
            let text = if self.config.include_rendered {
                Some(rendered_text(&renderer, item)?)
            } else {
                None
            };
            rendered.push((item, text));
        }

        let mut out = String::new();
        self.write_report(&mut out, result, &rendered, omitted)
            .map_err(|e| TermError::Internal(format!("failed to format result: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectations::{
        ExpectationConfiguration, ExpectationOutcome, ResultDetails, ResultFormatConfig,
    };

    fn suite_result() -> SuiteValidationResult {
        let format = ResultFormatConfig::summary();
        let passed = ExpectationValidationResult::from_outcome(
            ExpectationConfiguration::new("expect_column_to_exist").with_kwarg("column", json!("id")),
            ExpectationOutcome::new(true, ResultDetails::new()),
            &format,
        );
        let failed = ExpectationValidationResult::from_outcome(
            ExpectationConfiguration::new("expect_column_max_to_be_between")
                .with_kwarg("column", json!("age"))
                .with_kwarg("max_value", json!(65)),
            ExpectationOutcome::new(
                false,
                ResultDetails::new().with_basic("observed_value", json!(70)),
            ),
            &format,
        );
        let errored = ExpectationValidationResult::from_exception(
            ExpectationConfiguration::new("expect_column_values_to_not_be_null")
                .with_kwarg("column", json!("name")),
            "column 'name' not found",
            &format,
        );
        SuiteValidationResult::new(Some("customers".into()), vec![passed, failed, errored])
    }

    #[test]
    fn test_config_presets() {
        let config = FormatterConfig::minimal();
        assert!(!config.include_results);
        let config = FormatterConfig::ci();
        assert_eq!(config.max_results, Some(20));
        assert!(!config.use_colors);
        assert!(!FormatterConfig::detailed().failures_only);
    }

    #[test]
    fn test_json_formatter() {
        let formatter = JsonFormatter::new();
        let value = formatter.to_value(&suite_result()).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["suite_name"], json!("customers"));
        assert_eq!(value["statistics"]["unsuccessful_expectations"], json!(2));
        let results = value["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[0]["rendered"][1]["value"]["template"],
            json!("$column maximum value must be less than or equal to $max_value.")
        );

        let text = formatter.with_pretty(false).format(&suite_result()).unwrap();
        assert!(!text.contains('\n'));
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_json_formatter_limits_results() {
        let formatter = JsonFormatter::with_config(
            FormatterConfig::detailed()
                .with_max_results(1)
                .with_rendered(false),
        );
        let value = formatter.to_value(&suite_result()).unwrap();
        assert_eq!(value["results"].as_array().unwrap().len(), 1);
        assert_eq!(value["omitted_results"], json!(2));
        assert!(value["results"][0].get("rendered").is_none());
    }

    #[test]
    fn test_human_formatter() {
        let formatter = HumanFormatter::with_config(FormatterConfig::default().with_colors(false));
        let text = formatter.format(&suite_result()).unwrap();
        assert!(text.contains("❌ Validation FAILED"));
        assert!(text.contains("Suite: customers"));
        assert!(text.contains("   ❌ Failed: 2"));
        assert!(text.contains("Success Rate: 33.3%"));
        assert!(text.contains("Expects: age maximum value must be less than or equal to 65."));
        assert!(text.contains("Observed: 70"));
        assert!(text.contains("Exception: column 'name' not found"));
        assert!(!text.contains("expect_column_to_exist"));
    }

    #[test]
    fn test_human_formatter_empty_suite() {
        let result = SuiteValidationResult::new(None, vec![]);
        let text = HumanFormatter::with_config(FormatterConfig::minimal())
            .format(&result)
            .unwrap();
        assert!(text.contains("Validation PASSED"));
        assert!(text.contains("Success Rate: n/a"));
        assert!(!text.contains("Suite:"));
    }
}
