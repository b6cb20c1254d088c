//! The provider contract: how one named metric is computed on a backend.

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use super::configuration::{MetricConfiguration, MetricConfigurationId};
use super::value::MetricValue;
use crate::error::{Result, TermError};
use crate::security::SqlSecurity;

/// The kind of backend a provider computes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendCapability {
    /// SQL over a DataFusion session.
    DataFusion,
    /// Pure function of already-resolved dependency values; usable by any backend.
    Derived,
}

impl fmt::Display for BackendCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendCapability::DataFusion => write!(f, "datafusion"),
            BackendCapability::Derived => write!(f, "derived"),
        }
    }
}

/// Everything a provider needs to compute one metric.
#[derive(Debug)]
pub struct MetricRequest<'a> {
    configuration: &'a MetricConfiguration,
    table: Option<String>,
    dependencies: &'a BTreeMap<MetricConfigurationId, MetricValue>,
}

impl<'a> MetricRequest<'a> {
    /// `table` is the already-quoted table the domain resolved to; derived
    /// metrics carry none.
    pub fn new(
        configuration: &'a MetricConfiguration,
        table: Option<String>,
        dependencies: &'a BTreeMap<MetricConfigurationId, MetricValue>,
    ) -> Self {
        Self {
            configuration,
            table,
            dependencies,
        }
    }

    pub fn configuration(&self) -> &MetricConfiguration {
        self.configuration
    }

    pub fn metric_name(&self) -> &str {
        self.configuration.metric_name()
    }

    /// Quoted table name of the domain.
    pub fn table(&self) -> Result<&str> {
        self.table.as_deref().ok_or_else(|| {
            TermError::Internal(format!(
                "metric '{}' was dispatched without a table",
                self.metric_name()
            ))
        })
    }

    /// Raw column name from the `column` domain kwarg.
    pub fn column_name(&self) -> Result<&str> {
        self.configuration.domain_str("column").ok_or_else(|| {
            TermError::configuration(format!(
                "metric '{}' requires a 'column' domain kwarg",
                self.metric_name()
            ))
        })
    }

    /// Column from the domain, validated and quoted for SQL.
    pub fn column(&self) -> Result<String> {
        SqlSecurity::escape_identifier(self.column_name()?)
    }

    /// Row condition from the domain, validated for SQL.
    pub fn row_condition(&self) -> Result<Option<String>> {
        row_condition(self.configuration)
    }

    /// `WHERE` clause restricting rows to the domain (empty when unrestricted).
    pub fn where_clause(&self) -> Result<String> {
        Ok(self
            .row_condition()?
            .map(|condition| format!(" WHERE ({condition})"))
            .unwrap_or_default())
    }

    /// Numeric value kwarg; `null` and absent both yield `None`.
    pub fn value_f64(&self, key: &str) -> Result<Option<f64>> {
        match self.configuration.value_kwarg(key) {
            None => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                TermError::configuration(format!(
                    "value kwarg '{key}' of metric '{}' must be numeric, got {v}",
                    self.metric_name()
                ))
            }),
        }
    }

    /// Boolean value kwarg, defaulting to false.
    pub fn value_bool(&self, key: &str) -> bool {
        self.configuration
            .value_kwarg(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Resolved value of the dependency named `metric_name`.
    pub fn dependency(&self, metric_name: &str) -> Result<&MetricValue> {
        self.dependencies
            .iter()
            .find(|(id, _)| id.metric_name == metric_name)
            .map(|(_, value)| value)
            .ok_or_else(|| {
                TermError::metric_computation(
                    self.metric_name(),
                    format!("dependency '{metric_name}' was not resolved"),
                )
            })
    }
}

/// Validated row condition of a configuration's domain.
pub(crate) fn row_condition(configuration: &MetricConfiguration) -> Result<Option<String>> {
    match configuration.domain_str("row_condition") {
        None => Ok(None),
        Some(condition) => {
            SqlSecurity::validate_sql_expression(condition)?;
            Ok(Some(condition.to_string()))
        }
    }
}

/// Computes one named metric.
///
/// A provider either contributes an aggregate expression, which the backend
/// fuses with other aggregates over the same table into one query, or
/// computes its value itself in [`MetricProvider::compute`].
#[async_trait]
pub trait MetricProvider: Send + Sync + Debug {
    /// Name under which the provider is registered.
    fn metric_name(&self) -> &str;

    /// Backend kind this provider computes on.
    fn capability(&self) -> BackendCapability {
        BackendCapability::DataFusion
    }

    /// Metrics that must be resolved first, derived from the request's kwargs.
    fn dependencies(&self, _configuration: &MetricConfiguration) -> Result<Vec<MetricConfiguration>> {
        Ok(Vec::new())
    }

    /// SQL aggregate expression over the domain table, if the metric is a
    /// single aggregate.
    fn aggregate_expression(&self, _request: &MetricRequest<'_>) -> Result<Option<String>> {
        Ok(None)
    }

    /// Post-processes the raw value of a fused aggregate.
    fn finalize(&self, value: MetricValue, _request: &MetricRequest<'_>) -> Result<MetricValue> {
        Ok(value)
    }

    /// Computes the metric directly.
    async fn compute(
        &self,
        _session: &SessionContext,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValue> {
        Err(TermError::NotSupported(format!(
            "metric '{}' has no direct computation",
            request.metric_name()
        )))
    }
}
