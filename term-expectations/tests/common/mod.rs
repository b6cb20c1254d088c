//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;
use term_expectations::backend::DataFusionBackend;

/// `id`, `name` (one null), `age` (one null, one outlier) and `score`.
pub fn customers() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("age", DataType::Int64, true),
        Field::new("score", DataType::Float64, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4, 5, 6])),
            Arc::new(StringArray::from(vec![
                Some("Alice"),
                Some("Bob"),
                None,
                Some("Dan"),
                Some("Eve"),
                Some("Alexandra"),
            ])),
            Arc::new(Int64Array::from(vec![
                Some(34),
                Some(27),
                Some(45),
                None,
                Some(19),
                Some(150),
            ])),
            Arc::new(Float64Array::from(vec![0.5, 0.75, 0.9, 0.3, 0.6, 0.8])),
        ],
    )
    .unwrap()
}

/// Daily order batches: `amount` values and a nullable `coupon` column with
/// `nulls` missing entries.
pub fn orders(amounts: &[f64], nulls: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("amount", DataType::Float64, false),
        Field::new("coupon", DataType::Utf8, true),
    ]));
    let coupons: Vec<Option<&str>> = (0..amounts.len())
        .map(|i| if i < nulls { None } else { Some("SPRING") })
        .collect();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Float64Array::from(amounts.to_vec())),
            Arc::new(StringArray::from(coupons)),
        ],
    )
    .unwrap()
}

pub fn customers_backend() -> DataFusionBackend {
    let mut backend = DataFusionBackend::new();
    backend.load_record_batch("customers", customers()).unwrap();
    backend
}
