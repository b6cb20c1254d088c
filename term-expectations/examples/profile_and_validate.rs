//! Profiles three days of orders into a suite, then validates a fourth day
//! against it and prints a report.
//!
//! Run with `cargo run --example profile_and_validate`.

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use serde_json::json;
use std::sync::Arc;
use term_expectations::logging::setup::{init_logging, LoggingConfig};
use term_expectations::prelude::*;
use term_expectations::profiler::{
    MetricMultiBatchParameterBuilder, NumericMetricRangeMultiBatchParameterBuilder,
    UnexpectedMapMetricMultiBatchParameterBuilder,
};

fn orders(rows: usize, missing_coupons: usize, scale: f64) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("amount", DataType::Float64, false),
        Field::new("coupon", DataType::Utf8, true),
    ]));
    let amounts: Vec<f64> = (1..=rows).map(|i| i as f64 * scale).collect();
    let coupons: Vec<Option<&str>> = (0..rows)
        .map(|i| (i >= missing_coupons).then_some("SPRING"))
        .collect();
    Ok(RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from(amounts)),
            Arc::new(StringArray::from(coupons)),
        ],
    )?)
}

fn rules() -> Vec<Rule> {
    let row_count = Rule::new("row_count", TableDomainBuilder)
        .with_parameter_builder(
            NumericMetricRangeMultiBatchParameterBuilder::new("row_count_range", "table.row_count")
                .with_false_positive_rate(0.05)
                .with_round_decimals(0),
        )
        .with_expectation_configuration_builder(
            DefaultExpectationConfigurationBuilder::new("expect_table_row_count_to_be_between")
                .with_kwarg("min_value", json!("$parameter.row_count_range.value[0]"))
                .with_kwarg("max_value", json!("$parameter.row_count_range.value[1]")),
        );

    let amount_mean = Rule::new("amount_mean", ColumnDomainBuilder::new().numeric_only())
        .with_parameter_builder(
            NumericMetricRangeMultiBatchParameterBuilder::new("mean_range", "column.mean")
                .with_round_decimals(2),
        )
        .with_expectation_configuration_builder(
            DefaultExpectationConfigurationBuilder::new("expect_column_mean_to_be_between")
                .with_kwarg("min_value", json!("$parameter.mean_range.value[0]"))
                .with_kwarg("max_value", json!("$parameter.mean_range.value[1]")),
        );

    let coupon = Rule::new(
        "coupon_not_null",
        ColumnDomainBuilder::new().with_include_column_names(["coupon"]),
    )
    .with_parameter_builder(
        MetricMultiBatchParameterBuilder::new("row_counts", "table.row_count")
            .with_metric_domain_kwargs(json!({})),
    )
    .with_parameter_builder(
        UnexpectedMapMetricMultiBatchParameterBuilder::new(
            "coupon_mostly",
            "column_values.nonnull",
            "row_counts",
        )
        .with_aggregation_method("quantile")
        .with_false_positive_rate(0.5)
        .with_round_decimals(2),
    )
    .with_expectation_configuration_builder(
        DefaultExpectationConfigurationBuilder::new("expect_column_values_to_not_be_null")
            .with_kwarg("mostly", json!("$parameter.coupon_mostly.value")),
    );

    vec![row_count, amount_mean, coupon]
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::development())?;

    let mut backend = DataFusionBackend::new();
    backend.load_record_batch("2024-05-01", orders(100, 4, 1.0)?)?;
    backend.load_record_batch("2024-05-02", orders(110, 6, 1.1)?)?;
    backend.load_record_batch("2024-05-03", orders(95, 5, 0.9)?)?;

    let profiler = rules()
        .into_iter()
        .fold(RuleBasedProfiler::new("orders"), RuleBasedProfiler::with_rule);
    let profile = profiler.run(&backend, vec![]).await?;
    println!("{}", serde_json::to_string_pretty(&profile.expectation_suite.to_json()?)?);

    backend.load_record_batch("2024-05-04", orders(60, 20, 1.0)?)?;
    backend.set_active_batch("2024-05-04")?;
    let result = Validator::new(&backend)
        .validate_suite(&profile.expectation_suite, &ResultFormatConfig::summary())
        .await?;

    println!("{}", HumanFormatter::new().format(&result)?);
    Ok(())
}
