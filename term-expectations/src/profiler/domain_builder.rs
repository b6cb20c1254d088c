//! Domain builders: decide which slices of the data a rule reasons about.

use async_trait::async_trait;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

use super::domain::{Domain, DomainType};
use super::parameter_builder::ProfilerRuntime;
use crate::error::{Result, TermError};
use crate::metrics::{Kwargs, MetricConfiguration, MetricValue};

/// Produces the domains a rule is applied to.
#[async_trait]
pub trait DomainBuilder: Send + Sync + Debug {
    fn domain_type(&self) -> DomainType;

    async fn get_domains(
        &self,
        rule_name: &str,
        variables: &Kwargs,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<Vec<Domain>>;
}

/// The whole table as a single domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableDomainBuilder;

#[async_trait]
impl DomainBuilder for TableDomainBuilder {
    fn domain_type(&self) -> DomainType {
        DomainType::Table
    }

    async fn get_domains(
        &self,
        rule_name: &str,
        _variables: &Kwargs,
        _runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<Vec<Domain>> {
        Ok(vec![Domain::table().with_rule_name(rule_name)])
    }
}

fn is_numeric_type(data_type: &str) -> bool {
    ["Int", "UInt", "Float", "Decimal"]
        .iter()
        .any(|prefix| data_type.starts_with(prefix))
}

/// One column domain per selected column of the most recent batch.
///
/// Columns are taken in schema order, restricted to `include_column_names`
/// when given, minus `exclude_column_names`, and optionally to numeric
/// columns only.
///
/// # Examples
///
/// ```rust
/// use term_expectations::profiler::domain_builder::ColumnDomainBuilder;
///
/// let numeric = ColumnDomainBuilder::new()
///     .with_exclude_column_names(["id"])
///     .numeric_only();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ColumnDomainBuilder {
    include_column_names: Option<Vec<String>>,
    exclude_column_names: Vec<String>,
    numeric_only: bool,
}

impl ColumnDomainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_column_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude_column_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_column_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn numeric_only(mut self) -> Self {
        self.numeric_only = true;
        self
    }

    fn batch_metric(name: &str, batch_id: &str) -> MetricConfiguration {
        MetricConfiguration::new(name).with_domain_kwarg("batch_id", json!(batch_id))
    }

    async fn fetch(
        runtime: &mut ProfilerRuntime<'_>,
        configuration: &MetricConfiguration,
    ) -> Result<MetricValue> {
        let resolved = runtime.resolve(std::slice::from_ref(configuration)).await?;
        match resolved.get(configuration) {
            Some(Ok(value)) => Ok(value.clone()),
            Some(Err(failure)) => Err(TermError::metric_computation(
                configuration.metric_name(),
                failure.message.clone(),
            )),
            None => Err(TermError::Internal(format!(
                "metric '{}' missing from resolution output",
                configuration.metric_name()
            ))),
        }
    }
}

#[async_trait]
impl DomainBuilder for ColumnDomainBuilder {
    fn domain_type(&self) -> DomainType {
        DomainType::Column
    }

    async fn get_domains(
        &self,
        rule_name: &str,
        _variables: &Kwargs,
        runtime: &mut ProfilerRuntime<'_>,
    ) -> Result<Vec<Domain>> {
        let batch_id = runtime
            .batch_ids()
            .last()
            .cloned()
            .ok_or_else(|| TermError::configuration("profiling requires at least one batch"))?;

        let columns = Self::fetch(runtime, &Self::batch_metric("table.columns", &batch_id)).await?;
        let columns: Vec<String> = columns
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|c| c.as_str().map(str::to_string))
            .collect();

        if let Some(included) = &self.include_column_names {
            if let Some(missing) = included.iter().find(|name| !columns.contains(name)) {
                return Err(TermError::ColumnNotFound {
                    column: missing.clone(),
                });
            }
        }

        let types = if self.numeric_only {
            Some(Self::fetch(runtime, &Self::batch_metric("table.column_types", &batch_id)).await?)
        } else {
            None
        };

        let domains: Vec<Domain> = columns
            .into_iter()
            .filter(|name| {
                self.include_column_names
                    .as_ref()
                    .map_or(true, |included| included.contains(name))
            })
            .filter(|name| !self.exclude_column_names.contains(name))
            .filter(|name| match &types {
                Some(types) => types
                    .as_map()
                    .and_then(|m| m.get(name))
                    .and_then(MetricValue::as_str)
                    .is_some_and(is_numeric_type),
                None => true,
            })
            .map(|name| Domain::column(name).with_rule_name(rule_name))
            .collect();

        debug!(rule.name = %rule_name, domains = domains.len(), "Built column domains");
        Ok(domains)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use crate::test_utils::{backend_with, customers_batch};

    async fn column_names(builder: ColumnDomainBuilder) -> Result<Vec<String>> {
        let backend = backend_with(vec![("customers", customers_batch())]);
        let mut runtime = ProfilerRuntime::new(&backend, vec![])?;
        let domains = builder.get_domains("r", &Kwargs::new(), &mut runtime).await?;
        Ok(domains
            .iter()
            .filter_map(|d| d.domain_kwargs.get("column").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    #[tokio::test]
    async fn test_all_columns_in_schema_order() {
        let names = column_names(ColumnDomainBuilder::new()).await.unwrap();
        assert_eq!(names, vec!["id", "name", "age", "score"]);
    }

    #[tokio::test]
    async fn test_include_exclude_and_numeric_filter() {
        let names = column_names(
            ColumnDomainBuilder::new()
                .with_exclude_column_names(["id"])
                .numeric_only(),
        )
        .await
        .unwrap();
        assert_eq!(names, vec!["age", "score"]);

        let names = column_names(ColumnDomainBuilder::new().with_include_column_names(["score", "name"]))
            .await
            .unwrap();
        assert_eq!(names, vec!["name", "score"]);
    }

    #[tokio::test]
    async fn test_unknown_included_column() {
        let err = column_names(ColumnDomainBuilder::new().with_include_column_names(["salary"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TermError::ColumnNotFound { .. }));
    }

    #[tokio::test]
    async fn test_table_domain() {
        let backend = backend_with(vec![("customers", customers_batch())]);
        let mut runtime = ProfilerRuntime::new(&backend, vec![]).unwrap();
        let domains = TableDomainBuilder
            .get_domains("rows", &Kwargs::new(), &mut runtime)
            .await
            .unwrap();
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].domain_type, DomainType::Table);
        assert_eq!(domains[0].rule_name.as_deref(), Some("rows"));
    }
}
