//! Error types for the expectations framework.
//!
//! All fallible operations return [`Result`], whose error side is [`TermError`].
//! Errors fall into two groups: those that abort a run (configuration problems,
//! dependency cycles) and those that are recorded against a single metric or
//! expectation and reported in its result.

use thiserror::Error;

/// The main error type for the expectations framework.
#[derive(Error, Debug)]
pub enum TermError {
    /// A builder, expectation or directive was configured incorrectly.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The metric dependency graph could not be resolved (for example, it contains a cycle).
    #[error("Metric resolution error: {0}")]
    MetricResolution(String),

    /// A single metric could not be computed.
    #[error("Metric computation failed for '{metric}': {message}")]
    MetricComputation {
        /// Name of the metric that failed
        metric: String,
        /// Detailed error message
        message: String,
    },

    /// No provider is registered for the metric on the requested backend.
    #[error("Metric '{metric}' is not registered for backend '{backend}'")]
    MetricNotFound { metric: String, backend: String },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A renderer could not produce content and no fallback was available.
    #[error("Render error: {0}")]
    Render(String),

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error when data types don't match expected types.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Error when an operation is not supported.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),
}

/// A type alias for `Result<T, TermError>`.
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new metric computation error.
    pub fn metric_computation(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetricComputation {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors that must abort a whole run instead of being
    /// recorded against a single expectation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::MetricResolution(_))
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.with_context(|| msg.to_string())
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| match e.into() {
            TermError::Configuration(inner) => {
                TermError::Configuration(format!("{}: {inner}", f()))
            }
            TermError::Serialization(inner) => {
                TermError::Serialization(format!("{}: {inner}", f()))
            }
            TermError::Internal(inner) => TermError::Internal(format!("{}: {inner}", f())),
            other => TermError::Internal(format!("{}: {other}", f())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_computation_display() {
        let err = TermError::metric_computation("column.max", "column is not numeric");
        assert_eq!(
            err.to_string(),
            "Metric computation failed for 'column.max': column is not numeric"
        );
    }

    #[test]
    fn test_column_not_found() {
        let err = TermError::ColumnNotFound {
            column: "user_id".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'user_id' not found in dataset");
    }

    #[test]
    fn test_only_resolution_errors_are_fatal() {
        assert!(TermError::MetricResolution("cycle".into()).is_fatal());
        assert!(!TermError::configuration("bad").is_fatal());
        assert!(!TermError::metric_computation("m", "x").is_fatal());
    }

    #[test]
    fn test_error_context_keeps_configuration_kind() {
        let result: Result<()> = Err(TermError::configuration("mostly must be in [0, 1]"));
        let err = result.context("While building expectation").unwrap_err();
        assert!(matches!(err, TermError::Configuration(_)));
        assert!(err.to_string().contains("While building expectation"));
    }

    #[test]
    fn test_serde_error_conversion() {
        let err: TermError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, TermError::Serialization(_)));
    }
}
