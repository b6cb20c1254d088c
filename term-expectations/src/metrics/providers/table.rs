//! Table-level metrics.

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::metrics::provider::{MetricProvider, MetricRequest};
use crate::metrics::value::MetricValue;

/// `table.row_count`: number of rows in the domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableRowCount;

#[async_trait]
impl MetricProvider for TableRowCount {
    fn metric_name(&self) -> &str {
        "table.row_count"
    }

    fn aggregate_expression(&self, _request: &MetricRequest<'_>) -> Result<Option<String>> {
        Ok(Some("COUNT(*)".to_string()))
    }
}

async fn table_fields(
    session: &SessionContext,
    request: &MetricRequest<'_>,
) -> Result<Vec<(String, String)>> {
    let sql = format!("SELECT * FROM {} LIMIT 0", request.table()?);
    let df = session.sql(&sql).await?;
    Ok(df
        .schema()
        .fields()
        .iter()
        .map(|field| (field.name().clone(), field.data_type().to_string()))
        .collect())
}

/// `table.columns`: column names in schema order.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableColumns;

#[async_trait]
impl MetricProvider for TableColumns {
    fn metric_name(&self) -> &str {
        "table.columns"
    }

    async fn compute(
        &self,
        session: &SessionContext,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValue> {
        let fields = table_fields(session, request).await?;
        Ok(MetricValue::List(
            fields
                .into_iter()
                .map(|(name, _)| MetricValue::String(name))
                .collect(),
        ))
    }
}

/// `table.column_types`: column name to Arrow data type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableColumnTypes;

#[async_trait]
impl MetricProvider for TableColumnTypes {
    fn metric_name(&self) -> &str {
        "table.column_types"
    }

    async fn compute(
        &self,
        session: &SessionContext,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValue> {
        let fields = table_fields(session, request).await?;
        Ok(MetricValue::Map(
            fields
                .into_iter()
                .map(|(name, data_type)| (name, MetricValue::String(data_type)))
                .collect::<BTreeMap<_, _>>(),
        ))
    }
}
