//! Profiling several batches into a suite, then validating with it.

mod common;

use serde_json::json;
use term_expectations::backend::DataFusionBackend;
use term_expectations::expectations::{ExpectationSuite, ResultFormatConfig, Validator};
use term_expectations::profiler::{
    ColumnDomainBuilder, DefaultExpectationConfigurationBuilder, MetricMultiBatchParameterBuilder,
    NumericMetricRangeMultiBatchParameterBuilder, Rule, RuleBasedProfiler, TableDomainBuilder,
    UnexpectedMapMetricMultiBatchParameterBuilder,
};
use term_expectations::prelude::TermError;

fn amounts(rows: usize) -> Vec<f64> {
    (1..=rows).map(|i| i as f64 * 10.0).collect()
}

/// Null coupon fractions 0.1, 0.2 and 0.0; row counts 10, 10 and 12.
fn three_days() -> DataFusionBackend {
    let mut backend = DataFusionBackend::new();
    backend
        .load_record_batch("monday", common::orders(&amounts(10), 1))
        .unwrap();
    backend
        .load_record_batch("tuesday", common::orders(&amounts(10), 2))
        .unwrap();
    backend
        .load_record_batch("wednesday", common::orders(&amounts(12), 0))
        .unwrap();
    backend.set_active_batch("wednesday").unwrap();
    backend
}

fn row_count_rule() -> Rule {
    Rule::new("row_count", TableDomainBuilder)
        .with_parameter_builder(
            NumericMetricRangeMultiBatchParameterBuilder::new("row_count_range", "table.row_count")
                .with_false_positive_rate(0.0)
                .with_round_decimals(0),
        )
        .with_expectation_configuration_builder(
            DefaultExpectationConfigurationBuilder::new("expect_table_row_count_to_be_between")
                .with_kwarg("min_value", json!("$parameter.row_count_range.value[0]"))
                .with_kwarg("max_value", json!("$parameter.row_count_range.value[1]"))
                .with_meta("profiler_details", json!("$parameter.row_count_range.details")),
        )
}

fn coupon_rule() -> Rule {
    Rule::new(
        "coupon_not_null",
        ColumnDomainBuilder::new().with_include_column_names(["coupon"]),
    )
    .with_variable("false_positive_rate", json!(0.5))
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
        .with_false_positive_rate("$variables.false_positive_rate")
        .with_round_decimals(2),
    )
    .with_expectation_configuration_builder(
        DefaultExpectationConfigurationBuilder::new("expect_column_values_to_not_be_null")
            .with_kwarg("mostly", json!("$parameter.coupon_mostly.value"))
            .with_meta("profiler_details", json!("$parameter.coupon_mostly.details")),
    )
}

async fn profile(backend: &DataFusionBackend) -> ExpectationSuite {
    RuleBasedProfiler::new("orders_profile")
        .with_rule(row_count_rule())
        .with_rule(coupon_rule())
        .run(backend, vec![])
        .await
        .unwrap()
        .expectation_suite
}

#[tokio::test]
async fn test_profiler_derives_expectations_from_batches() {
    let backend = three_days();
    let result = RuleBasedProfiler::new("orders_profile")
        .with_rule(row_count_rule())
        .with_rule(coupon_rule())
        .run(&backend, vec![])
        .await
        .unwrap();

    assert_eq!(result.batch_ids, vec!["monday", "tuesday", "wednesday"]);
    assert_eq!(result.domains.len(), 2);
    assert_eq!(result.rule_execution_time.len(), 2);

    let suite = &result.expectation_suite;
    assert_eq!(suite.name(), "orders_profile");
    assert_eq!(suite.len(), 2);

    let row_count = suite.find("expect_table_row_count_to_be_between")[0];
    assert_eq!(row_count.kwarg("min_value"), Some(&json!(10)));
    assert_eq!(row_count.kwarg("max_value"), Some(&json!(12)));
    assert_eq!(
        row_count.meta()["profiler_details"]["num_batches"],
        json!(3)
    );

    let not_null = suite.find("expect_column_values_to_not_be_null")[0];
    assert_eq!(not_null.kwarg("column"), Some(&json!("coupon")));
    assert_eq!(not_null.kwarg("mostly"), Some(&json!(0.9)));
    assert_eq!(
        not_null.meta()["profiler_details"]["aggregation_method"],
        json!("quantile")
    );

    let names: Vec<&String> = result
        .fully_qualified_parameter_names_by_domain
        .values()
        .flatten()
        .collect();
    assert!(names.iter().any(|n| n.as_str() == "$parameter.coupon_mostly"));
    assert!(names.iter().any(|n| n.as_str() == "$parameter.row_count_range"));
}

#[tokio::test]
async fn test_profiled_suite_validates_batches() {
    let backend = three_days();
    let suite = profile(&backend).await;
    let format = ResultFormatConfig::summary();

    let wednesday = Validator::new(&backend)
        .validate_suite(&suite, &format)
        .await
        .unwrap();
    assert!(wednesday.success);

    // Tuesday has 20% null coupons, above the profiled 10%.
    let tuesday = Validator::new(&backend)
        .with_batch_id("tuesday")
        .validate_suite(&suite, &format)
        .await
        .unwrap();
    assert!(!tuesday.success);
    let failed: Vec<&str> = tuesday
        .failures()
        .map(|r| r.expectation_config().expectation_type())
        .collect();
    assert_eq!(failed, vec!["expect_column_values_to_not_be_null"]);
}

#[tokio::test]
async fn test_profiled_suite_survives_json() {
    let backend = three_days();
    let suite = profile(&backend).await;
    let restored = ExpectationSuite::from_json(&suite.to_json().unwrap()).unwrap();
    assert_eq!(restored.len(), suite.len());
    assert_eq!(restored.to_json().unwrap(), suite.to_json().unwrap());
}

#[tokio::test]
async fn test_numeric_column_profile_over_selected_batches() {
    let backend = three_days();
    let rule = Rule::new("amount_mean", ColumnDomainBuilder::new().numeric_only())
        .with_parameter_builder(
            NumericMetricRangeMultiBatchParameterBuilder::new("mean_range", "column.mean")
                .with_false_positive_rate(0.0),
        )
        .with_expectation_configuration_builder(
            DefaultExpectationConfigurationBuilder::new("expect_column_mean_to_be_between")
                .with_kwarg("min_value", json!("$parameter.mean_range.value[0]"))
                .with_kwarg("max_value", json!("$parameter.mean_range.value[1]")),
        );

    let result = RuleBasedProfiler::new("amounts")
        .with_rule(rule)
        .run(&backend, vec!["monday".into(), "wednesday".into()])
        .await
        .unwrap();

    assert_eq!(result.domains.len(), 1);
    let mean = result.expectation_suite.find("expect_column_mean_to_be_between")[0];
    assert_eq!(mean.kwarg("column"), Some(&json!("amount")));
    assert_eq!(mean.kwarg("min_value"), Some(&json!(55.0)));
    assert_eq!(mean.kwarg("max_value"), Some(&json!(65.0)));
}

#[tokio::test]
async fn test_unknown_aggregation_method_aborts_profiling() {
    let backend = three_days();
    let rule = Rule::new("broken", ColumnDomainBuilder::new().with_include_column_names(["coupon"]))
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
            .with_aggregation_method("mode"),
        );
    let err = RuleBasedProfiler::new("p")
        .with_rule(rule)
        .run(&backend, vec![])
        .await
        .unwrap_err();
    assert!(matches!(err, TermError::Configuration(_)));
    assert!(err.to_string().contains("\"mode\" was detected"));
}
