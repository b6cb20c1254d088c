//! Logging configuration for metric resolution and profiling.
//!
//! [`LogConfig`] controls how chatty the resolver and backend are; the
//! `setup` module installs a `tracing-subscriber` for applications that do
//! not bring their own.

use tracing::Level;

/// Log-volume knobs read by the resolver and the DataFusion backend.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for crate components
    pub base_level: Level,
    /// Whether to log every resolved metric value
    pub log_metric_values: bool,
    /// Whether to log the SQL sent to the backend
    pub log_backend_queries: bool,
    /// Maximum length for logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_metric_values: false,
            log_backend_queries: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Everything, with long fields kept mostly intact.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_metric_values: true,
            log_backend_queries: true,
            max_field_length: 1024,
        }
    }

    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_metric_values: false,
            log_backend_queries: false,
            max_field_length: 128,
        }
    }

    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Debug event emitted only when `log_metric_values` is on.
#[macro_export]
macro_rules! log_metric_value {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_metric_values && $config.base_level >= tracing::Level::DEBUG {
            tracing::debug!($($arg)*);
        }
    };
}

/// Debug event emitted only when `log_backend_queries` is on.
#[macro_export]
macro_rules! log_backend_query {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_backend_queries {
            tracing::debug!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes, on a char boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber installation.
pub mod setup {
    use tracing::Level;

    /// Configuration for [`init_logging`].
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything else
        pub level: Level,
        /// Log level for this crate
        pub crate_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// The filter directive used when `RUST_LOG` is unset.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},term_expectations={}",
                    self.level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global fmt subscriber filtered by `RUST_LOG` or the config.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use term_expectations::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_presets() {
        let config = LogConfig::default();
        assert_eq!(config.base_level, Level::INFO);
        assert!(!config.log_metric_values);
        assert!(config.log_backend_queries);

        let config = LogConfig::verbose();
        assert!(config.log_metric_values);
        assert_eq!(config.max_field_length, 1024);

        let config = LogConfig::production();
        assert!(!config.log_backend_queries);
        assert_eq!(config.base_level, Level::WARN);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("SELECT COUNT(*) FROM t", 6),
            "SELECT...(truncated)"
        );
        // 'é' is two bytes; the cut backs off to the previous boundary.
        assert_eq!(truncate_field("aé", 2), "a...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        assert_eq!(
            LoggingConfig::default().env_filter(),
            "info,term_expectations=debug"
        );
        assert_eq!(
            LoggingConfig::default().with_env_filter("warn").env_filter(),
            "warn"
        );
    }
}
