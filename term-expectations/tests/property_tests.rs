//! Property-based tests for metric identity, result formats and the
//! `mostly` threshold.
//!
//! Each property generates inputs, computes the expected outcome
//! independently and compares it with what the library reports.

mod common;

use proptest::prelude::*;
use serde_json::{json, Value};
use term_expectations::expectations::{ExpectationConfiguration, ResultDetails, ResultFormat};
use term_expectations::metrics::{Kwargs, MetricConfiguration};
use term_expectations::prelude::*;

const FORMATS: [ResultFormat; 4] = [
    ResultFormat::BooleanOnly,
    ResultFormat::Basic,
    ResultFormat::Summary,
    ResultFormat::Complete,
];

fn kwarg_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(|v| json!(v)),
        "[a-z]{0,8}".prop_map(|v| json!(v)),
        any::<bool>().prop_map(|v| json!(v)),
        prop::collection::btree_map("[a-z]{1,4}", any::<i32>(), 0..4).prop_map(|m| json!(m)),
    ]
}

proptest! {
    #[test]
    fn test_metric_id_ignores_kwarg_insertion_order(
        pairs in prop::collection::btree_map("[a-z_]{1,10}", kwarg_value(), 0..8)
    ) {
        let forward = pairs
            .iter()
            .fold(MetricConfiguration::new("column.mean"), |config, (k, v)| {
                config.with_domain_kwarg(k.clone(), v.clone())
            });
        let backward = pairs
            .iter()
            .rev()
            .fold(MetricConfiguration::new("column.mean"), |config, (k, v)| {
                config.with_domain_kwarg(k.clone(), v.clone())
            });
        prop_assert_eq!(forward.id(), backward.id());
    }

    #[test]
    fn test_metric_id_changes_with_value_kwargs(
        threshold in any::<i64>(),
        other in any::<i64>()
    ) {
        prop_assume!(threshold != other);
        let base = MetricConfiguration::new("column_values.between.unexpected_count")
            .with_domain_kwarg("column", json!("age"));
        let a = base.clone().with_value_kwarg("min_value", json!(threshold));
        let b = base.with_value_kwarg("min_value", json!(other));
        prop_assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_more_verbose_formats_only_add_keys(
        basic in prop::collection::btree_map("b_[a-z]{1,5}", any::<i32>(), 0..4),
        summary in prop::collection::btree_map("s_[a-z]{1,5}", any::<i32>(), 0..4),
        complete in prop::collection::btree_map("c_[a-z]{1,5}", any::<i32>(), 0..4),
    ) {
        let mut details = ResultDetails::new();
        for (k, v) in &basic {
            details = details.with_basic(k.clone(), json!(v));
        }
        for (k, v) in &summary {
            details = details.with_summary(k.clone(), json!(v));
        }
        for (k, v) in &complete {
            details = details.with_complete(k.clone(), json!(v));
        }

        prop_assert!(details.render(ResultFormat::BooleanOnly).is_none());
        let payloads: Vec<Kwargs> = FORMATS[1..]
            .iter()
            .map(|f| details.render(*f).unwrap_or_default())
            .collect();
        for pair in payloads.windows(2) {
            for (key, value) in &pair[0] {
                prop_assert_eq!(pair[1].get(key), Some(value));
            }
        }
        prop_assert_eq!(payloads[2].len(), basic.len() + summary.len() + complete.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_not_null_mostly_threshold(
        rows in 1usize..40,
        null_fraction in 0.0f64..=1.0,
        mostly in 0.0f64..=1.0,
    ) {
        let nulls = ((rows as f64) * null_fraction).floor() as usize;
        let non_null = (rows - nulls) as f64 / rows as f64;
        prop_assume!((non_null - mostly).abs() > 1e-9);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let result = rt.block_on(async {
            let mut backend = DataFusionBackend::new();
            let amounts: Vec<f64> = (0..rows).map(|i| i as f64).collect();
            backend
                .load_record_batch("orders", common::orders(&amounts, nulls))
                .unwrap();
            let config = ExpectationConfiguration::new("expect_column_values_to_not_be_null")
                .with_kwarg("column", json!("coupon"))
                .with_kwarg("mostly", json!(mostly));
            Validator::new(&backend)
                .validate_expectation(&config, &ResultFormatConfig::summary())
                .await
                .unwrap()
        });

        prop_assert_eq!(result.success(), non_null >= mostly);
        prop_assert_eq!(result.result_value("unexpected_count"), Some(&json!(nulls)));
    }
}
