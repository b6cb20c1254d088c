//! Column aggregate metrics.

use async_trait::async_trait;
use datafusion::prelude::SessionContext;

use crate::error::{Result, TermError};
use crate::metrics::configuration::MetricConfiguration;
use crate::metrics::provider::{BackendCapability, MetricProvider, MetricRequest};
use crate::metrics::value::MetricValue;

/// Single-aggregate column statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnAggregate {
    Min,
    Max,
    Mean,
    Sum,
    Median,
    StandardDeviation,
    DistinctCount,
    NonNullCount,
    NullCount,
}

impl ColumnAggregate {
    pub const ALL: [ColumnAggregate; 9] = [
        ColumnAggregate::Min,
        ColumnAggregate::Max,
        ColumnAggregate::Mean,
        ColumnAggregate::Sum,
        ColumnAggregate::Median,
        ColumnAggregate::StandardDeviation,
        ColumnAggregate::DistinctCount,
        ColumnAggregate::NonNullCount,
        ColumnAggregate::NullCount,
    ];

    pub fn metric_name(&self) -> &'static str {
        match self {
            ColumnAggregate::Min => "column.min",
            ColumnAggregate::Max => "column.max",
            ColumnAggregate::Mean => "column.mean",
            ColumnAggregate::Sum => "column.sum",
            ColumnAggregate::Median => "column.median",
            ColumnAggregate::StandardDeviation => "column.standard_deviation",
            ColumnAggregate::DistinctCount => "column.distinct_values.count",
            ColumnAggregate::NonNullCount => "column_values.nonnull.count",
            ColumnAggregate::NullCount => "column_values.null.count",
        }
    }

    fn expression(&self, column: &str) -> String {
        match self {
            ColumnAggregate::Min => format!("MIN({column})"),
            ColumnAggregate::Max => format!("MAX({column})"),
            ColumnAggregate::Mean => format!("AVG(CAST({column} AS DOUBLE))"),
            ColumnAggregate::Sum => format!("SUM({column})"),
            ColumnAggregate::Median => format!("MEDIAN(CAST({column} AS DOUBLE))"),
            ColumnAggregate::StandardDeviation => format!("STDDEV(CAST({column} AS DOUBLE))"),
            ColumnAggregate::DistinctCount => format!("COUNT(DISTINCT {column})"),
            ColumnAggregate::NonNullCount => format!("COUNT({column})"),
            ColumnAggregate::NullCount => format!("COUNT(*) - COUNT({column})"),
        }
    }
}

/// Provider for one [`ColumnAggregate`].
#[derive(Debug, Clone, Copy)]
pub struct ColumnAggregateMetric {
    aggregate: ColumnAggregate,
}

impl ColumnAggregateMetric {
    pub fn new(aggregate: ColumnAggregate) -> Self {
        Self { aggregate }
    }
}

#[async_trait]
impl MetricProvider for ColumnAggregateMetric {
    fn metric_name(&self) -> &str {
        self.aggregate.metric_name()
    }

    fn aggregate_expression(&self, request: &MetricRequest<'_>) -> Result<Option<String>> {
        Ok(Some(self.aggregate.expression(&request.column()?)))
    }
}

/// `column.unique_proportion`: distinct values over non-null values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColumnUniqueProportion;

#[async_trait]
impl MetricProvider for ColumnUniqueProportion {
    fn metric_name(&self) -> &str {
        "column.unique_proportion"
    }

    fn capability(&self) -> BackendCapability {
        BackendCapability::Derived
    }

    fn dependencies(&self, configuration: &MetricConfiguration) -> Result<Vec<MetricConfiguration>> {
        let domain = configuration.metric_domain_kwargs().clone();
        Ok(vec![
            MetricConfiguration::with_kwargs(
                ColumnAggregate::DistinctCount.metric_name(),
                domain.clone(),
                Default::default(),
            ),
            MetricConfiguration::with_kwargs(
                ColumnAggregate::NonNullCount.metric_name(),
                domain,
                Default::default(),
            ),
        ])
    }

    async fn compute(
        &self,
        _session: &SessionContext,
        request: &MetricRequest<'_>,
    ) -> Result<MetricValue> {
        let count = |name: &str| -> Result<f64> {
            request.dependency(name)?.as_f64().ok_or_else(|| {
                TermError::metric_computation(self.metric_name(), format!("'{name}' is not numeric"))
            })
        };
        let distinct = count(ColumnAggregate::DistinctCount.metric_name())?;
        let nonnull = count(ColumnAggregate::NonNullCount.metric_name())?;
        if nonnull > 0.0 {
            Ok(MetricValue::Double(distinct / nonnull))
        } else {
            Ok(MetricValue::Double(0.0))
        }
    }
}
