//! Built-in metric providers.
//!
//! | Family | Metrics |
//! |--------|---------|
//! | table  | `table.row_count`, `table.columns`, `table.column_types` |
//! | column aggregates | `column.{min,max,mean,sum,median,standard_deviation}`, `column.distinct_values.count`, `column_values.{nonnull,null}.count` |
//! | derived | `column.unique_proportion` |
//! | map metrics | `column_values.{between,value_length_between,in_set,nonnull}.{unexpected_count,unexpected_values,unexpected_value_counts}` |
//! | profile | `profile.numeric_columns_diff_between_threshold_range` |

mod column;
mod map;
mod profile;
mod table;

pub use column::{ColumnAggregate, ColumnAggregateMetric, ColumnUniqueProportion};
pub use map::{map_metric_name, MapCondition, MapMetric, MapMetricSuffix};
pub use profile::{ProfileNumericColumnsDiff, PROFILE_NUMERIC_COLUMNS_DIFF_METRIC};
pub use table::{TableColumnTypes, TableColumns, TableRowCount};

use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use datafusion::scalar::ScalarValue;
use serde_json::Value;

use super::registry::MetricRegistry;
use super::value::MetricValue;
use crate::error::{Result, TermError};
use crate::security::SqlSecurity;

/// Registers every built-in provider.
pub fn register_defaults(registry: &mut MetricRegistry) {
    registry
        .register(TableRowCount)
        .register(TableColumns)
        .register(TableColumnTypes)
        .register(ColumnUniqueProportion)
        .register(ProfileNumericColumnsDiff);

    for aggregate in ColumnAggregate::ALL {
        registry.register(ColumnAggregateMetric::new(aggregate));
    }

    for condition in MapCondition::ALL {
        for suffix in MapMetricSuffix::ALL {
            registry.register(MapMetric::new(condition, suffix));
        }
    }
}

/// Runs a query and collects all result batches.
pub(crate) async fn collect(session: &SessionContext, sql: &str) -> Result<Vec<RecordBatch>> {
    tracing::debug!(sql = %sql, "Executing metric query");
    let df = session.sql(sql).await?;
    Ok(df.collect().await?)
}

/// Value at `(row, column)` of a result batch.
pub(crate) fn value_at(batch: &RecordBatch, column: usize, row: usize) -> Result<MetricValue> {
    if column >= batch.num_columns() || row >= batch.num_rows() {
        return Err(TermError::Internal(format!(
            "result cell ({row}, {column}) is out of bounds"
        )));
    }
    let scalar = ScalarValue::try_from_array(batch.column(column), row)?;
    Ok(MetricValue::from(&scalar))
}

/// Values of one result column across all batches.
pub(crate) fn column_values(batches: &[RecordBatch], column: usize) -> Result<Vec<MetricValue>> {
    let mut values = Vec::new();
    for batch in batches {
        for row in 0..batch.num_rows() {
            values.push(value_at(batch, column, row)?);
        }
    }
    Ok(values)
}

/// Renders a JSON scalar as a SQL literal.
pub(crate) fn sql_literal(value: &Value) -> Result<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => SqlSecurity::quote_string_literal(s),
        Value::Bool(b) => Ok(if *b { "TRUE" } else { "FALSE" }.to_string()),
        other => Err(TermError::configuration(format!(
            "cannot use {other} as a SQL literal"
        ))),
    }
}
