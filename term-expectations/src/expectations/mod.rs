//! Expectations: declarative assertions about data and their evaluation.
//!
//! An [`ExpectationConfiguration`] is turned into an [`Expectation`] by the
//! [`ExpectationRegistry`]. The expectation names the metrics it needs; the
//! [`Validator`] resolves them for a whole suite at once and asks each
//! expectation to judge the values, producing an
//! [`ExpectationValidationResult`] at the requested [`ResultFormat`].
//!
//! | Expectation | Metric(s) |
//! |-------------|-----------|
//! | `expect_column_{min,max,mean,median,stdev,sum}_to_be_between` | `column.<aggregate>` |
//! | `expect_column_proportion_of_unique_values_to_be_between` | `column.unique_proportion` |
//! | `expect_table_row_count_to_be_between` | `table.row_count` |
//! | `expect_column_to_exist` | `table.columns` |
//! | `expect_column_values_to_be_between` | `column_values.between.*` |
//! | `expect_column_value_lengths_to_be_between` | `column_values.value_length_between.*` |
//! | `expect_column_values_to_be_in_set` | `column_values.in_set.*` |
//! | `expect_column_values_to_not_be_null` | `column_values.nonnull.*` |
//! | `expect_profile_numeric_columns_diff_between_threshold_range` | `profile.numeric_columns_diff_between_threshold_range` |

pub mod column_aggregate;
pub mod column_map;
pub mod configuration;
mod kwargs;
pub mod profile_diff;
pub mod registry;
pub mod result;
pub mod result_format;
pub mod suite;
pub mod table;
pub mod traits;
pub mod validator;

pub use column_aggregate::{AggregateKind, ColumnAggregateExpectation};
pub use column_map::{map_expectation_type, ColumnMapExpectation};
pub use configuration::{ExpectationConfiguration, DOMAIN_KWARG_KEYS};
pub use profile_diff::{
    ProfileDiffSummary, ProfileNumericColumnsDiffExpectation,
    ProfileNumericColumnsDiffExpectationBuilder, PROFILE_NUMERIC_COLUMNS_DIFF_TYPE,
};
pub use registry::{ExpectationFactory, ExpectationRegistry};
pub use result::{ExceptionInfo, ExpectationOutcome, ExpectationValidationResult, ResultDetails};
pub use result_format::{ResultFormat, ResultFormatConfig};
pub use suite::ExpectationSuite;
pub use table::{ColumnToExistExpectation, TableRowCountExpectation};
pub use traits::{Expectation, MetricDependencies, ResolvedDependencies};
pub use validator::{SuiteValidationResult, ValidationStatistics, Validator};
