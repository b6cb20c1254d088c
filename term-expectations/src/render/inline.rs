//! Rendering configurations and validation results into atomic content.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info};

use super::content::RenderedAtomicContent;
use super::registry::{RenderTarget, RendererRegistry, RendererType};
use crate::error::{Result, TermError};
use crate::expectations::{ExpectationConfiguration, ExpectationValidationResult};

/// Renders expectations inline, substituting a failure placeholder for any
/// renderer that errors.
///
/// A configuration gets its prescriptive renderers; a validation result
/// gets its diagnostic renderers followed by the prescriptive ones.
///
/// # Examples
///
/// ```rust
/// use serde_json::json;
/// use term_expectations::expectations::ExpectationConfiguration;
/// use term_expectations::render::{InlineRenderer, RendererRegistry};
///
/// let registry = RendererRegistry::with_defaults();
/// let config = ExpectationConfiguration::new("expect_column_to_exist")
///     .with_kwarg("column", json!("id"));
/// let content = InlineRenderer::new(&registry).render_configuration(&config).unwrap();
/// assert_eq!(content[0].to_text(), "id is a required field.");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct InlineRenderer<'a> {
    registry: &'a RendererRegistry,
}

impl<'a> InlineRenderer<'a> {
    pub fn new(registry: &'a RendererRegistry) -> Self {
        Self { registry }
    }

    pub fn render_configuration(
        &self,
        configuration: &ExpectationConfiguration,
    ) -> Result<Vec<RenderedAtomicContent>> {
        self.get_rendered_content(RenderTarget::Configuration(configuration))
    }

    pub fn render_validation_result(
        &self,
        result: &ExpectationValidationResult,
    ) -> Result<Vec<RenderedAtomicContent>> {
        self.get_rendered_content(RenderTarget::ValidationResult(result))
    }

    /// Every applicable renderer's output, in family then name order.
    ///
    /// Only a missing failure placeholder is an error.
    pub fn get_rendered_content(
        &self,
        target: RenderTarget<'_>,
    ) -> Result<Vec<RenderedAtomicContent>> {
        let expectation_type = target.configuration().expectation_type();
        let mut content = Vec::new();
        for renderer_type in target.renderer_types() {
            for name in self.registry.renderer_names(expectation_type, *renderer_type) {
                content.push(self.render(&target, &name)?);
            }
        }
        debug!(expectation.type = %expectation_type, items = content.len(), "Rendered expectation");
        Ok(content)
    }

    /// Renders one named renderer, falling back to its family's failure
    /// placeholder when the renderer is missing, errors or panics.
    pub fn render(&self, target: &RenderTarget<'_>, renderer_name: &str) -> Result<RenderedAtomicContent> {
        let expectation_type = target.configuration().expectation_type();
        let outcome = match self.registry.get(expectation_type, renderer_name) {
            Some(renderer) => panic::catch_unwind(AssertUnwindSafe(|| renderer(target)))
                .unwrap_or_else(|payload| Err(panicked(payload.as_ref()))),
            None => Err(not_found(renderer_name)),
        };

        let error = match outcome {
            Ok(content) => return Ok(content),
            Err(error) => error,
        };

        let message = format!(
            "Renderer \"{renderer_name}\" failed to render Expectation \"{expectation_type}\" with exception message: {error}."
        );
        info!(
            renderer = %renderer_name,
            expectation.type = %expectation_type,
            "{message}"
        );

        let failure_name = RendererType::of_renderer(renderer_name).failed_renderer_name();
        let failure = self
            .registry
            .get(expectation_type, failure_name)
            .ok_or_else(|| not_found(failure_name))?;
        Ok(failure(target)?.with_exception(message))
    }
}

fn not_found(renderer_name: &str) -> TermError {
    TermError::Render(format!("Renderer \"{renderer_name}\" was not found in the registry."))
}

fn panicked(payload: &(dyn Any + Send)) -> TermError {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    TermError::Render(format!("renderer panicked: {detail}"))
}
