//! Row-wise ("map") conditions and their summary metrics.
//!
//! A map condition classifies each row of a column as expected or
//! unexpected. Each condition exposes three summaries: the number of
//! unexpected rows, a sample of unexpected values and the most frequent
//! unexpected values with their counts.

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{collect, column_values, sql_literal};
use crate::error::{Result, TermError};
use crate::metrics::provider::{MetricProvider, MetricRequest};
use crate::metrics::value::MetricValue;

/// Row conditions backing the column map expectations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapCondition {
    /// Value within `[min_value, max_value]` (`strict_min`/`strict_max` exclude bounds).
    Between,
    /// String length within `[min_value, max_value]`.
    ValueLengthBetween,
    /// Value is a member of `value_set`.
    InSet,
    /// Value is not null. Its unexpected rows are the null rows.
    NotNull,
}

impl MapCondition {
    pub const ALL: [MapCondition; 4] = [
        MapCondition::Between,
        MapCondition::ValueLengthBetween,
        MapCondition::InSet,
        MapCondition::NotNull,
    ];

    /// Prefix shared by the condition's summary metrics.
    pub fn map_metric_name(&self) -> &'static str {
        match self {
            MapCondition::Between => "column_values.between",
            MapCondition::ValueLengthBetween => "column_values.value_length_between",
            MapCondition::InSet => "column_values.in_set",
            MapCondition::NotNull => "column_values.nonnull",
        }
    }

    /// SQL predicate that holds for unexpected rows.
    pub(crate) fn unexpected_predicate(&self, request: &MetricRequest<'_>) -> Result<String> {
        let column = request.column()?;
        match self {
            MapCondition::Between => {
                let expected = range_predicate(&column, request)?;
                Ok(format!("{column} IS NOT NULL AND NOT ({expected})"))
            }
            MapCondition::ValueLengthBetween => {
                let length = format!("character_length(CAST({column} AS VARCHAR))");
                let expected = range_predicate(&length, request)?;
                Ok(format!("{column} IS NOT NULL AND NOT ({expected})"))
            }
            MapCondition::InSet => {
                let values = request
                    .configuration()
                    .value_kwarg("value_set")
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        TermError::configuration(format!(
                            "metric '{}' requires a 'value_set' list",
                            request.metric_name()
                        ))
                    })?;
                if values.is_empty() {
                    return Ok(format!("{column} IS NOT NULL"));
                }
                let literals = values
                    .iter()
                    .map(sql_literal)
                    .collect::<Result<Vec<_>>>()?
                    .join(", ");
                Ok(format!("{column} IS NOT NULL AND {column} NOT IN ({literals})"))
            }
            MapCondition::NotNull => Ok(format!("{column} IS NULL")),
        }
    }
}

fn range_predicate(expression: &str, request: &MetricRequest<'_>) -> Result<String> {
    let min = request.value_f64("min_value")?;
    let max = request.value_f64("max_value")?;
    let mut parts = Vec::new();
    if let Some(min) = min {
        let op = if request.value_bool("strict_min") { ">" } else { ">=" };
        parts.push(format!("{expression} {op} {min}"));
    }
    if let Some(max) = max {
        let op = if request.value_bool("strict_max") { "<" } else { "<=" };
        parts.push(format!("{expression} {op} {max}"));
    }
    if parts.is_empty() {
        return Err(TermError::configuration(format!(
            "metric '{}' requires min_value or max_value",
            request.metric_name()
        )));
    }
    Ok(parts.join(" AND "))
}

/// Which summary of a map condition a metric reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMetricSuffix {
    UnexpectedCount,
    UnexpectedValues,
    UnexpectedValueCounts,
}

impl MapMetricSuffix {
    pub const ALL: [MapMetricSuffix; 3] = [
        MapMetricSuffix::UnexpectedCount,
        MapMetricSuffix::UnexpectedValues,
        MapMetricSuffix::UnexpectedValueCounts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MapMetricSuffix::UnexpectedCount => "unexpected_count",
            MapMetricSuffix::UnexpectedValues => "unexpected_values",
            MapMetricSuffix::UnexpectedValueCounts => "unexpected_value_counts",
        }
    }
}

/// Full metric name for a condition and summary.
pub fn map_metric_name(condition: MapCondition, suffix: MapMetricSuffix) -> String {
    format!("{}.{}", condition.map_metric_name(), suffix.as_str())
}

/// Provider for one `(condition, summary)` pair.
///
/// `unexpected_values` and `unexpected_value_counts` honour an optional
/// `limit` value kwarg.
#[derive(Debug, Clone)]
pub struct MapMetric {
    condition: MapCondition,
    suffix: MapMetricSuffix,
    name: String,
}

impl MapMetric {
    pub fn new(condition: MapCondition, suffix: MapMetricSuffix) -> Self {
        Self {
            condition,
            suffix,
            name: map_metric_name(condition, suffix),
        }
    }

    fn filter(&self, request: &MetricRequest<'_>) -> Result<String> {
        let predicate = self.condition.unexpected_predicate(request)?;
        Ok(match request.row_condition()? {
            Some(condition) => format!(" WHERE ({condition}) AND ({predicate})"),
            None => format!(" WHERE {predicate}"),
        })
    }

    fn limit(&self, request: &MetricRequest<'_>) -> Result<String> {
        match request.configuration().value_kwarg("limit") {
            None => Ok(String::new()),
            Some(v) => v
                .as_u64()
                .map(|n| format!(" LIMIT {n}"))
                .ok_or_else(|| {
                    TermError::configuration(format!(
                        "'limit' of metric '{}' must be a non-negative integer",
                        self.name
                    ))
                }),
        }
    }
}

#[async_trait]
impl MetricProvider for MapMetric {
    fn metric_name(&self) -> &str {
        &self.name
    }

    fn aggregate_expression(&self, request: &MetricRequest<'_>) -> Result<Option<String>> {
        match self.suffix {
            MapMetricSuffix::UnexpectedCount => {
                let predicate = self.condition.unexpected_predicate(request)?;
                Ok(Some(format!("COUNT(CASE WHEN {predicate} THEN 1 END)")))
            }
            _ => Ok(None),
        }
    }

    async fn compute(
        &self,
        session: &SessionContext,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValue> {
        let column = request.column()?;
        let table = request.table()?;
        let filter = self.filter(request)?;
        let limit = self.limit(request)?;

        match self.suffix {
            MapMetricSuffix::UnexpectedCount => {
                let sql = format!("SELECT COUNT(*) FROM {table}{filter}");
                let batches = collect(session, &sql).await?;
                Ok(column_values(&batches, 0)?
                    .into_iter()
                    .next()
                    .unwrap_or(MetricValue::Long(0)))
            }
            MapMetricSuffix::UnexpectedValues => {
                let sql = format!("SELECT {column} FROM {table}{filter}{limit}");
                let batches = collect(session, &sql).await?;
                Ok(MetricValue::List(column_values(&batches, 0)?))
            }
            MapMetricSuffix::UnexpectedValueCounts => {
                let sql = format!(
                    "SELECT {column} AS unexpected_value, COUNT(*) AS value_count \
                     FROM {table}{filter} GROUP BY {column} \
                     ORDER BY value_count DESC, unexpected_value ASC{limit}"
                );
                let batches = collect(session, &sql).await?;
                let values = column_values(&batches, 0)?;
                let counts = column_values(&batches, 1)?;
                Ok(MetricValue::List(
                    values
                        .into_iter()
                        .zip(counts)
                        .map(|(value, count)| {
                            MetricValue::Map(BTreeMap::from([
                                ("value".to_string(), value),
                                ("count".to_string(), count),
                            ]))
                        })
                        .collect(),
                ))
            }
        }
    }
}
