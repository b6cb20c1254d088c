//! Comparison of numeric column statistics against a reference profile.

use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{collect, value_at};
use crate::error::{Result, TermError};
use crate::metrics::provider::{MetricProvider, MetricRequest};
use crate::metrics::value::MetricValue;
use crate::security::SqlSecurity;

/// Name of the profile comparison metric.
pub const PROFILE_NUMERIC_COLUMNS_DIFF_METRIC: &str =
    "profile.numeric_columns_diff_between_threshold_range";

/// `profile.numeric_columns_diff_between_threshold_range`.
///
/// Value kwargs:
/// - `limit_check_report_keys`: `{column: {stat: {"lower": x, "upper": y}}}`
/// - `reference_profile`: `{column: {stat: number}}`
///
/// For every column the result holds either a map `stat -> bool` (whether
/// `current - reference` lies within `[lower, upper]`) or, when the column
/// cannot be checked at all, a string explaining why. A statistic that cannot
/// be compared also reports a string instead of a boolean.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileNumericColumnsDiff;

const STATISTICS: [(&str, &str); 6] = [
    ("min", "MIN"),
    ("max", "MAX"),
    ("mean", "AVG"),
    ("sum", "SUM"),
    ("median", "MEDIAN"),
    ("stddev", "STDDEV"),
];

fn object<'a>(value: Option<&'a Value>, what: &str) -> Result<&'a serde_json::Map<String, Value>> {
    value.and_then(Value::as_object).ok_or_else(|| {
        TermError::configuration(format!(
            "'{what}' must be an object for {PROFILE_NUMERIC_COLUMNS_DIFF_METRIC}"
        ))
    })
}

fn within(diff: f64, threshold: &Value) -> Result<bool> {
    let bound = |key: &str| -> Result<Option<f64>> {
        match threshold.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| {
                TermError::configuration(format!("threshold '{key}' must be numeric, got {v}"))
            }),
        }
    };
    let lower = bound("lower")?.unwrap_or(f64::NEG_INFINITY);
    let upper = bound("upper")?.unwrap_or(f64::INFINITY);
    Ok(lower <= diff && diff <= upper)
}

impl ProfileNumericColumnsDiff {
    async fn current_statistics(
        &self,
        session: &SessionContext,
        request: &MetricRequest<'_>,
        column: &str,
    ) -> Result<BTreeMap<&'static str, MetricValue>> {
        let quoted = SqlSecurity::escape_identifier(column)?;
        let select = STATISTICS
            .iter()
            .map(|(_, function)| format!("{function}(CAST({quoted} AS DOUBLE))"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {select} FROM {}{}",
            request.table()?,
            request.where_clause()?
        );
        let batches = collect(session, &sql).await?;
        let batch = batches
            .iter()
            .find(|b| b.num_rows() > 0)
            .ok_or_else(|| TermError::metric_computation(self.metric_name(), "empty result"))?;

        let mut stats = BTreeMap::new();
        for (index, (name, _)) in STATISTICS.iter().enumerate() {
            stats.insert(*name, value_at(batch, index, 0)?);
        }
        Ok(stats)
    }
}

#[async_trait]
impl MetricProvider for ProfileNumericColumnsDiff {
    fn metric_name(&self) -> &str {
        PROFILE_NUMERIC_COLUMNS_DIFF_METRIC
    }

    async fn compute(
        &self,
        session: &SessionContext,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValue> {
        let config = request.configuration();
        let report_keys = object(
            config.value_kwarg("limit_check_report_keys"),
            "limit_check_report_keys",
        )?;
        let reference = object(config.value_kwarg("reference_profile"), "reference_profile")?;

        let schema_sql = format!("SELECT * FROM {} LIMIT 0", request.table()?);
        let df = session.sql(&schema_sql).await?;
        let schema = df.schema().clone();

        let mut report = BTreeMap::new();
        for (column, checks) in report_keys {
            let field = schema.fields().iter().find(|f| f.name() == column);
            let Some(field) = field else {
                report.insert(
                    column.clone(),
                    MetricValue::String(format!("column '{column}' not found in dataset")),
                );
                continue;
            };
            if !field.data_type().is_numeric() {
                report.insert(
                    column.clone(),
                    MetricValue::String(format!(
                        "column '{column}' is not numeric ({})",
                        field.data_type()
                    )),
                );
                continue;
            }
            let checks = object(Some(checks), "limit_check_report_keys.<column>")?;
            let current = self.current_statistics(session, request, column).await?;

            let mut column_report = BTreeMap::new();
            for (stat, threshold) in checks {
                let outcome = match (
                    current.get(stat.as_str()).and_then(MetricValue::as_f64),
                    reference
                        .get(column)
                        .and_then(|stats| stats.get(stat))
                        .and_then(Value::as_f64),
                ) {
                    _ if !current.contains_key(stat.as_str()) => {
                        MetricValue::String(format!("unknown statistic '{stat}'"))
                    }
                    (None, _) => MetricValue::String(format!("statistic '{stat}' is unavailable")),
                    (_, None) => {
                        MetricValue::String(format!("no reference value for '{stat}'"))
                    }
                    (Some(current), Some(reference)) => {
                        MetricValue::Boolean(within(current - reference, threshold)?)
                    }
                };
                column_report.insert(stat.clone(), outcome);
            }
            report.insert(column.clone(), MetricValue::Map(column_report));
        }

        Ok(MetricValue::Map(report))
    }
}
