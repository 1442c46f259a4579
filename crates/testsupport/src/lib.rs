//! Shared test fixtures, assertions, and mocks for the query pipeline
//! test suites.

mod assertions;
mod fixtures;
mod macros;
mod mocks;

pub use assertions::{assert_error_contains, assert_exhausted, assert_next_row};
pub use fixtures::{int_row, kv_row, logs_schema, str_row};
pub use mocks::{EmptyDataSource, MockOperator, StaticDataSource};

/// Convenient re-exports for test modules.
pub mod prelude {
    pub use crate::assertions::{assert_error_contains, assert_exhausted, assert_next_row};
    pub use crate::fixtures::{int_row, kv_row, logs_schema, str_row};
    pub use crate::mocks::{EmptyDataSource, MockOperator, StaticDataSource};
    pub use crate::test_ctx;
    pub use ast::Expr;
    pub use common::Row;
    pub use pretty_assertions::assert_eq;
    pub use types::Value;
}
