//! End-to-end validation of expectation suites on DataFusion.

mod common;

use serde_json::json;
use term_expectations::expectations::ExpectationConfiguration;
use term_expectations::prelude::*;

fn not_null(column: &str) -> ExpectationConfiguration {
    ExpectationConfiguration::new("expect_column_values_to_not_be_null")
        .with_kwarg("column", json!(column))
}

fn age_between(mostly: f64) -> ExpectationConfiguration {
    ExpectationConfiguration::new("expect_column_values_to_be_between")
        .with_kwarg("column", json!("age"))
        .with_kwarg("min_value", json!(0))
        .with_kwarg("max_value", json!(120))
        .with_kwarg("mostly", json!(mostly))
}

#[tokio::test]
async fn test_suite_with_mixed_outcomes() {
    let backend = common::customers_backend();
    let suite = ExpectationSuite::new("customers")
        .with_expectation(not_null("id"))
        .with_expectation(not_null("name").with_kwarg("mostly", json!(0.8)))
        .with_expectation(age_between(0.9))
        .with_expectation(
            ExpectationConfiguration::new("expect_table_row_count_to_be_between")
                .with_kwarg("min_value", json!(1))
                .with_kwarg("max_value", json!(10)),
        )
        .with_expectation(
            ExpectationConfiguration::new("expect_column_to_exist")
                .with_kwarg("column", json!("salary")),
        );

    let result = Validator::new(&backend)
        .validate_suite(&suite, &ResultFormatConfig::summary())
        .await
        .unwrap();

    assert_eq!(result.suite_name.as_deref(), Some("customers"));
    assert!(!result.success);
    let successes: Vec<bool> = result.results.iter().map(|r| r.success()).collect();
    assert_eq!(successes, vec![true, true, false, true, false]);
    assert_eq!(result.statistics.evaluated_expectations, 5);
    assert_eq!(result.statistics.unsuccessful_expectations, 2);

    let ages = &result.results[2];
    assert_eq!(ages.result_value("unexpected_count"), Some(&json!(1)));
    assert_eq!(ages.result_value("missing_count"), Some(&json!(1)));
    assert_eq!(ages.result_value("unexpected_percent"), Some(&json!(20.0)));
}

#[tokio::test]
async fn test_mostly_threshold_on_real_data() {
    let backend = common::customers_backend();
    let validator = Validator::new(&backend);
    let format = ResultFormatConfig::basic();

    // 4 of 5 non-null ages are in range.
    let lenient = validator.validate_expectation(&age_between(0.8), &format).await.unwrap();
    assert!(lenient.success());
    let strict = validator.validate_expectation(&age_between(0.81), &format).await.unwrap();
    assert!(!strict.success());
}

#[tokio::test]
async fn test_result_format_levels() {
    let backend = common::customers_backend();
    let validator = Validator::new(&backend);
    let config = not_null("name");

    let boolean_only = validator
        .validate_expectation(&config, &ResultFormatConfig::boolean_only())
        .await
        .unwrap();
    assert!(boolean_only.result().is_none());

    let basic = validator
        .validate_expectation(&config, &ResultFormatConfig::basic())
        .await
        .unwrap();
    let summary = validator
        .validate_expectation(&config, &ResultFormatConfig::summary())
        .await
        .unwrap();
    let complete = validator
        .validate_expectation(&config, &ResultFormatConfig::complete())
        .await
        .unwrap();

    let keys = |r: &ExpectationValidationResult| -> Vec<String> {
        r.result().map(|m| m.keys().cloned().collect()).unwrap_or_default()
    };
    for key in keys(&basic) {
        assert!(keys(&summary).contains(&key), "summary lost {key}");
    }
    for key in keys(&summary) {
        assert!(keys(&complete).contains(&key), "complete lost {key}");
    }
    assert!(summary.result_value("partial_unexpected_counts").is_some());
    assert!(basic.result_value("partial_unexpected_counts").is_none());
}

#[tokio::test]
async fn test_metric_failure_becomes_exception_info() {
    let backend = common::customers_backend();
    let configurations = vec![
        ExpectationConfiguration::new("expect_column_max_to_be_between")
            .with_kwarg("column", json!("salary"))
            .with_kwarg("max_value", json!(10)),
        not_null("id"),
    ];
    let result = Validator::new(&backend)
        .validate_configurations(&configurations, &ResultFormatConfig::basic())
        .await
        .unwrap();

    let failed = &result.results[0];
    assert!(!failed.success());
    let info = failed.exception_info().unwrap();
    assert!(info.raised_exception);
    assert!(!info.exception_message.is_empty());
    assert!(result.results[1].success());
}

#[tokio::test]
async fn test_invalid_configuration_does_not_abort_suite() {
    let backend = common::customers_backend();
    let configurations = vec![
        ExpectationConfiguration::new("expect_column_values_to_be_between")
            .with_kwarg("column", json!("age"))
            .with_kwarg("min_value", json!(10))
            .with_kwarg("max_value", json!(1)),
        ExpectationConfiguration::new("expect_something_unregistered"),
        not_null("id"),
    ];
    let result = Validator::new(&backend)
        .validate_configurations(&configurations, &ResultFormatConfig::basic())
        .await
        .unwrap();
    assert!(result.results[0].exception_info().is_some());
    assert!(result.results[1].exception_info().is_some());
    assert!(result.results[2].success());
}

#[tokio::test]
async fn test_profile_diff_against_reference() {
    let backend = common::customers_backend();
    let threshold = json!({"lower": -0.1, "upper": 0.1});
    let profile_diff = |mostly: f64| {
        ExpectationConfiguration::new("expect_profile_numeric_columns_diff_between_threshold_range")
            .with_kwarg(
                "limit_check_report_keys",
                json!({
                    "score": {"mean": threshold, "max": threshold},
                    "age": {"mean": {"lower": -1, "upper": 1}},
                    "salary": {"mean": threshold},
                }),
            )
            .with_kwarg(
                "reference_profile",
                json!({
                    "score": {"mean": 0.6, "max": 0.5},
                    "age": {"mean": 55.0},
                    "salary": {"mean": 1.0},
                }),
            )
            .with_kwarg("mostly", json!(mostly))
    };

    let validator = Validator::new(&backend);
    let format = ResultFormatConfig::basic();
    // 2 of 4 statistics are within range.
    let passing = validator.validate_expectation(&profile_diff(0.5), &format).await.unwrap();
    assert!(passing.success(), "{passing:?}");
    let failing = validator.validate_expectation(&profile_diff(0.75), &format).await.unwrap();
    assert!(!failing.success());

    let unexpected = failing.result_value("unexpected_values").unwrap();
    assert_eq!(unexpected["score"], json!({"max": false}));
    assert!(unexpected["salary"].is_string());
    assert!(unexpected.get("age").is_none());
}

#[tokio::test]
async fn test_formatters_on_validation_output() {
    let backend = common::customers_backend();
    let suite = ExpectationSuite::new("customers")
        .with_expectation(not_null("name"))
        .with_expectation(not_null("id"));
    let result = Validator::new(&backend)
        .validate_suite(&suite, &ResultFormatConfig::summary())
        .await
        .unwrap();

    let text = HumanFormatter::with_config(FormatterConfig::ci()).format(&result).unwrap();
    assert!(text.contains("Validation FAILED"));
    assert!(text.contains("Expects: name values must never be null."));

    let json: serde_json::Value =
        serde_json::from_str(&JsonFormatter::new().format(&result).unwrap()).unwrap();
    assert_eq!(json["statistics"]["successful_expectations"], json!(1));
    assert_eq!(json["results"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_keyword_like_column_names_and_quoted_conditions() {
    use arrow::array::{BooleanArray, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    let schema = Arc::new(Schema::new(vec![
        Field::new("created_at", DataType::Utf8, true),
        Field::new("closed", DataType::Boolean, true),
        Field::new("status", DataType::Utf8, false),
        Field::new("execution_ms", DataType::Int64, true),
    ]));
    let tickets = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["2024-01-01", "2024-01-02", "2024-01-03"])),
            Arc::new(BooleanArray::from(vec![false, false, true])),
            Arc::new(StringArray::from(vec!["open", "open", "closed"])),
            Arc::new(Int64Array::from(vec![Some(12), Some(40), None])),
        ],
    )
    .unwrap();
    let mut backend = DataFusionBackend::new();
    backend.load_record_batch("tickets", tickets).unwrap();

    let configurations = vec![
        not_null("created_at"),
        not_null("closed"),
        not_null("execution_ms").with_kwarg("row_condition", json!("status = 'open'")),
    ];
    let result = Validator::new(&backend)
        .validate_configurations(&configurations, &ResultFormatConfig::summary())
        .await
        .unwrap();

    for item in &result.results {
        assert!(item.exception_info().is_none(), "{:?}", item.exception_info());
        assert!(item.success());
    }
}
