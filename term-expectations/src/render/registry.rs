//! Renderer registry and the built-in atomic renderers.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::content::{RenderedAtomicContent, RenderedTemplate};
use crate::error::{Result, TermError};
use crate::expectations::{
    map_expectation_type, AggregateKind, ExpectationConfiguration, ExpectationValidationResult,
    PROFILE_NUMERIC_COLUMNS_DIFF_TYPE,
};
use crate::metrics::providers::MapCondition;

pub const PRESCRIPTIVE_SUMMARY: &str = "atomic.prescriptive.summary";
pub const DIAGNOSTIC_OBSERVED_VALUE: &str = "atomic.diagnostic.observed_value";
pub const PRESCRIPTIVE_FAILED: &str = "atomic.prescriptive.failed";
pub const DIAGNOSTIC_FAILED: &str = "atomic.diagnostic.failed";

/// Registration key matching every expectation type.
const ANY_EXPECTATION_TYPE: &str = "*";

/// What is being rendered.
#[derive(Debug, Clone, Copy)]
pub enum RenderTarget<'a> {
    Configuration(&'a ExpectationConfiguration),
    ValidationResult(&'a ExpectationValidationResult),
}

impl<'a> RenderTarget<'a> {
    pub fn configuration(&self) -> &'a ExpectationConfiguration {
        match self {
            RenderTarget::Configuration(configuration) => configuration,
            RenderTarget::ValidationResult(result) => result.expectation_config(),
        }
    }

    pub fn validation_result(&self) -> Option<&'a ExpectationValidationResult> {
        match self {
            RenderTarget::Configuration(_) => None,
            RenderTarget::ValidationResult(result) => Some(result),
        }
    }

    /// Renderer families applied to this target, in output order.
    pub fn renderer_types(&self) -> &'static [RendererType] {
        match self {
            RenderTarget::Configuration(_) => &[RendererType::Prescriptive],
            RenderTarget::ValidationResult(_) => {
                &[RendererType::Diagnostic, RendererType::Prescriptive]
            }
        }
    }
}

/// Renderer families, distinguished by name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererType {
    /// Describes what an expectation asserts.
    Prescriptive,
    /// Describes what a validation observed.
    Diagnostic,
}

impl RendererType {
    pub fn prefix(&self) -> &'static str {
        match self {
            RendererType::Prescriptive => "atomic.prescriptive",
            RendererType::Diagnostic => "atomic.diagnostic",
        }
    }

    pub fn failed_renderer_name(&self) -> &'static str {
        match self {
            RendererType::Prescriptive => PRESCRIPTIVE_FAILED,
            RendererType::Diagnostic => DIAGNOSTIC_FAILED,
        }
    }

    /// Prescriptive names map to prescriptive; anything else is diagnostic.
    pub fn of_renderer(renderer_name: &str) -> Self {
        if renderer_name.starts_with(RendererType::Prescriptive.prefix()) {
            RendererType::Prescriptive
        } else {
            RendererType::Diagnostic
        }
    }
}

pub fn is_failed_renderer(renderer_name: &str) -> bool {
    renderer_name == PRESCRIPTIVE_FAILED || renderer_name == DIAGNOSTIC_FAILED
}

/// A renderer: turns a target into one piece of content or fails.
pub type Renderer = Arc<dyn Fn(&RenderTarget<'_>) -> Result<RenderedAtomicContent> + Send + Sync>;

/// Maps `(expectation_type, renderer_name)` to a renderer.
///
/// Renderers registered with [`register_generic`](Self::register_generic)
/// apply to every expectation type; a type-specific registration of the
/// same name takes precedence.
#[derive(Clone, Default)]
pub struct RendererRegistry {
    renderers: BTreeMap<(String, String), Renderer>,
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererRegistry")
            .field("renderers", &self.renderers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Summaries for the built-in expectation types, a generic observed
    /// value renderer and the failure placeholders.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry
            .register_generic(DIAGNOSTIC_OBSERVED_VALUE, observed_value)
            .register_generic(PRESCRIPTIVE_FAILED, |target: &RenderTarget<'_>| {
                Ok(failed(PRESCRIPTIVE_FAILED, target))
            })
            .register_generic(DIAGNOSTIC_FAILED, |target: &RenderTarget<'_>| {
                Ok(failed(DIAGNOSTIC_FAILED, target))
            });

        for kind in AggregateKind::ALL {
            let subject = aggregate_subject(kind);
            registry.register(kind.expectation_type(), PRESCRIPTIVE_SUMMARY, move |target| {
                let config = target.configuration();
                let (phrase, template) = bounds(config, "be")?;
                summary(
                    template
                        .with_param("column", column(config)?)
                        .with_template(format!("$column {subject} must {phrase}.")),
                )
            });
        }
        registry
            .register("expect_table_row_count_to_be_between", PRESCRIPTIVE_SUMMARY, |target| {
                let (phrase, template) = bounds(target.configuration(), "have")?;
                summary(template.with_template(format!("Must {phrase} rows.")))
            })
            .register("expect_column_to_exist", PRESCRIPTIVE_SUMMARY, |target| {
                summary(
                    RenderedTemplate::new("$column is a required field.")
                        .with_param("column", column(target.configuration())?),
                )
            })
            .register(
                map_expectation_type(MapCondition::Between),
                PRESCRIPTIVE_SUMMARY,
                |target| {
                    let config = target.configuration();
                    let (phrase, template) = bounds(config, "be")?;
                    let (suffix, template) = mostly(config, template)?;
                    summary(
                        template
                            .with_param("column", column(config)?)
                            .with_template(format!("$column values must {phrase}{suffix}.")),
                    )
                },
            )
            .register(
                map_expectation_type(MapCondition::ValueLengthBetween),
                PRESCRIPTIVE_SUMMARY,
                |target| {
                    let config = target.configuration();
                    let (phrase, template) = bounds(config, "be")?;
                    let (suffix, template) = mostly(config, template)?;
                    summary(template.with_param("column", column(config)?).with_template(
                        format!("$column values must {phrase} characters long{suffix}."),
                    ))
                },
            )
            .register(
                map_expectation_type(MapCondition::InSet),
                PRESCRIPTIVE_SUMMARY,
                |target| {
                    let config = target.configuration();
                    let values = config
                        .kwarg("value_set")
                        .and_then(Value::as_array)
                        .ok_or_else(|| TermError::Render("value_set must be a list".to_string()))?;
                    let value_set = values
                        .iter()
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    let (suffix, template) = mostly(config, RenderedTemplate::new(""))?;
                    summary(
                        template
                            .with_param("column", column(config)?)
                            .with_param("value_set", json!(value_set))
                            .with_template(format!(
                                "$column values must belong to this set: $value_set{suffix}."
                            )),
                    )
                },
            )
            .register(
                map_expectation_type(MapCondition::NotNull),
                PRESCRIPTIVE_SUMMARY,
                |target| {
                    let config = target.configuration();
                    let (suffix, template) = mostly(config, RenderedTemplate::new(""))?;
                    let phrase = if suffix.is_empty() { "never be null" } else { "not be null" };
                    summary(
                        template
                            .with_param("column", column(config)?)
                            .with_template(format!("$column values must {phrase}{suffix}.")),
                    )
                },
            )
            .register(PROFILE_NUMERIC_COLUMNS_DIFF_TYPE, PRESCRIPTIVE_SUMMARY, |target| {
                let (suffix, template) = mostly(target.configuration(), RenderedTemplate::new(""))?;
                summary(template.with_template(format!(
                    "Numeric column profile differences must stay within their threshold ranges{suffix}."
                )))
            });
        registry
    }

    pub fn register<F>(
        &mut self,
        expectation_type: impl Into<String>,
        renderer_name: impl Into<String>,
        renderer: F,
    ) -> &mut Self
    where
        F: Fn(&RenderTarget<'_>) -> Result<RenderedAtomicContent> + Send + Sync + 'static,
    {
        self.renderers
            .insert((expectation_type.into(), renderer_name.into()), Arc::new(renderer));
        self
    }

    pub fn register_generic<F>(&mut self, renderer_name: impl Into<String>, renderer: F) -> &mut Self
    where
        F: Fn(&RenderTarget<'_>) -> Result<RenderedAtomicContent> + Send + Sync + 'static,
    {
        self.register(ANY_EXPECTATION_TYPE, renderer_name, renderer)
    }

    pub fn get(&self, expectation_type: &str, renderer_name: &str) -> Option<Renderer> {
        self.renderers
            .get(&(expectation_type.to_string(), renderer_name.to_string()))
            .or_else(|| {
                self.renderers
                    .get(&(ANY_EXPECTATION_TYPE.to_string(), renderer_name.to_string()))
            })
            .cloned()
    }

    /// Non-failure renderer names of one family available for a type, sorted.
    pub fn renderer_names(&self, expectation_type: &str, renderer_type: RendererType) -> Vec<String> {
        let mut names: Vec<String> = self
            .renderers
            .keys()
            .filter(|(registered_type, _)| {
                registered_type == expectation_type || registered_type == ANY_EXPECTATION_TYPE
            })
            .map(|(_, name)| name)
            .filter(|name| name.starts_with(renderer_type.prefix()) && !is_failed_renderer(name))
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

fn summary(template: RenderedTemplate) -> Result<RenderedAtomicContent> {
    Ok(RenderedAtomicContent::new(PRESCRIPTIVE_SUMMARY, template))
}

fn aggregate_subject(kind: AggregateKind) -> &'static str {
    match kind {
        AggregateKind::Min => "minimum value",
        AggregateKind::Max => "maximum value",
        AggregateKind::Mean => "mean",
        AggregateKind::Median => "median",
        AggregateKind::Stdev => "standard deviation",
        AggregateKind::Sum => "sum",
        AggregateKind::ProportionOfUniqueValues => "fraction of unique values",
    }
}

fn column(config: &ExpectationConfiguration) -> Result<Value> {
    match config.kwarg("column") {
        Some(Value::String(name)) => Ok(json!(name)),
        _ => Err(TermError::Render(format!(
            "{} has no column to render",
            config.expectation_type()
        ))),
    }
}

fn non_null<'a>(config: &'a ExpectationConfiguration, key: &str) -> Option<&'a Value> {
    config.kwarg(key).filter(|v| !v.is_null())
}

/// The bounds clause, e.g. `be greater than or equal to $min_value`.
fn bounds(config: &ExpectationConfiguration, verb: &str) -> Result<(String, RenderedTemplate)> {
    let strict = |key: &str| config.kwarg(key).and_then(Value::as_bool).unwrap_or(false);
    let lower = if strict("strict_min") { "greater than" } else { "greater than or equal to" };
    let upper = if strict("strict_max") { "less than" } else { "less than or equal to" };

    let mut template = RenderedTemplate::new("");
    let phrase = match (non_null(config, "min_value"), non_null(config, "max_value")) {
        (Some(min), Some(max)) => {
            template = template
                .with_param("min_value", min.clone())
                .with_param("max_value", max.clone());
            format!("{verb} {lower} $min_value and {upper} $max_value")
        }
        (Some(min), None) => {
            template = template.with_param("min_value", min.clone());
            format!("{verb} {lower} $min_value")
        }
        (None, Some(max)) => {
            template = template.with_param("max_value", max.clone());
            format!("{verb} {upper} $max_value")
        }
        (None, None) => {
            return Err(TermError::Render(format!(
                "{}: min_value and max_value are both unset",
                config.expectation_type()
            )))
        }
    };
    Ok((phrase, template))
}

/// The `mostly` clause, empty when every row must match.
fn mostly(
    config: &ExpectationConfiguration,
    template: RenderedTemplate,
) -> Result<(String, RenderedTemplate)> {
    let Some(value) = non_null(config, "mostly") else {
        return Ok((String::new(), template));
    };
    let mostly = value
        .as_f64()
        .ok_or_else(|| TermError::Render(format!("mostly must be numeric, got {value}")))?;
    if mostly >= 1.0 {
        return Ok((String::new(), template));
    }
    let percent = (mostly * 10_000.0).round() / 100.0;
    Ok((
        ", at least $mostly_pct % of the time".to_string(),
        template.with_param("mostly_pct", json!(format!("{percent}"))),
    ))
}

fn observed_value(target: &RenderTarget<'_>) -> Result<RenderedAtomicContent> {
    let result = target.validation_result().ok_or_else(|| {
        TermError::Render("observed values exist only for validation results".to_string())
    })?;

    let template = if let Some(observed) = result.result_value("observed_value") {
        RenderedTemplate::new("$observed_value").with_param("observed_value", observed.clone())
    } else if let Some(percent) = result.result_value("unexpected_percent") {
        RenderedTemplate::new("$unexpected_percent% unexpected")
            .with_param("unexpected_percent", percent.clone())
    } else {
        RenderedTemplate::new("--")
    };
    Ok(RenderedAtomicContent::new(DIAGNOSTIC_OBSERVED_VALUE, template))
}

fn failed(renderer_name: &str, target: &RenderTarget<'_>) -> RenderedAtomicContent {
    let config = target.configuration();
    RenderedAtomicContent::new(
        renderer_name,
        RenderedTemplate::new("$expectation_type(**$kwargs)")
            .with_param("expectation_type", json!(config.expectation_type()))
            .with_param("kwargs", json!(config.kwargs())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_summary(config: &ExpectationConfiguration) -> Result<String> {
        let registry = RendererRegistry::with_defaults();
        let renderer = registry
            .get(config.expectation_type(), PRESCRIPTIVE_SUMMARY)
            .ok_or_else(|| TermError::Render("missing".into()))?;
        Ok(renderer(&RenderTarget::Configuration(config))?.to_text())
    }

    #[test]
    fn test_aggregate_and_row_count_summaries() {
        let config = ExpectationConfiguration::new("expect_column_min_to_be_between")
            .with_kwarg("column", json!("age"))
            .with_kwarg("min_value", json!(18))
            .with_kwarg("strict_min", json!(true));
        assert_eq!(
            render_summary(&config).unwrap(),
            "age minimum value must be greater than 18."
        );

        let config = ExpectationConfiguration::new("expect_table_row_count_to_be_between")
            .with_kwarg("min_value", json!(1))
            .with_kwarg("max_value", json!(10));
        assert_eq!(
            render_summary(&config).unwrap(),
            "Must have greater than or equal to 1 and less than or equal to 10 rows."
        );
    }

    #[test]
    fn test_map_summaries_with_mostly() {
        let config = ExpectationConfiguration::new("expect_column_values_to_not_be_null")
            .with_kwarg("column", json!("name"))
            .with_kwarg("mostly", json!(0.95));
        assert_eq!(
            render_summary(&config).unwrap(),
            "name values must not be null, at least 95 % of the time."
        );

        let config = ExpectationConfiguration::new("expect_column_values_to_be_in_set")
            .with_kwarg("column", json!("name"))
            .with_kwarg("value_set", json!(["a", "b", 3]));
        assert_eq!(
            render_summary(&config).unwrap(),
            "name values must belong to this set: a, b, 3."
        );
    }

    #[test]
    fn test_unset_bounds_fail_to_render() {
        let config = ExpectationConfiguration::new("expect_column_values_to_be_between")
            .with_kwarg("column", json!("age"));
        let err = render_summary(&config).unwrap_err();
        assert!(matches!(err, TermError::Render(_)));
    }

    #[test]
    fn test_renderer_names_exclude_failures() {
        let registry = RendererRegistry::with_defaults();
        assert_eq!(
            registry.renderer_names("expect_column_to_exist", RendererType::Prescriptive),
            vec![PRESCRIPTIVE_SUMMARY.to_string()]
        );
        assert_eq!(
            registry.renderer_names("expect_custom_thing", RendererType::Diagnostic),
            vec![DIAGNOSTIC_OBSERVED_VALUE.to_string()]
        );
        assert!(registry
            .renderer_names("expect_custom_thing", RendererType::Prescriptive)
            .is_empty());
        assert!(registry.get("expect_custom_thing", PRESCRIPTIVE_FAILED).is_some());
    }

    #[test]
    fn test_renderer_type_of_name() {
        assert_eq!(
            RendererType::of_renderer("atomic.prescriptive.custom"),
            RendererType::Prescriptive
        );
        assert_eq!(
            RendererType::of_renderer("atomic.diagnostic.observed_value"),
            RendererType::Diagnostic
        );
        assert_eq!(RendererType::of_renderer("legacy"), RendererType::Diagnostic);
    }
}
