//! Inline rendering of expectations and validation results.
//!
//! Renderers are looked up in a [`RendererRegistry`] by expectation type
//! and renderer name. [`InlineRenderer`] never lets a broken renderer
//! abort: its output is replaced with a failure placeholder that records
//! the error in [`RenderedAtomicContent::exception`].

pub mod content;
pub mod inline;
pub mod registry;

pub use content::{RenderedAtomicContent, RenderedTemplate, STRING_VALUE_TYPE};
pub use inline::InlineRenderer;
pub use registry::{
    is_failed_renderer, RenderTarget, Renderer, RendererRegistry, RendererType,
    DIAGNOSTIC_FAILED, DIAGNOSTIC_OBSERVED_VALUE, PRESCRIPTIVE_FAILED, PRESCRIPTIVE_SUMMARY,
};
