//! Assertions for operator streams and error messages.

use common::{QueryResult, Row};
use executor::{ExecutionContext, Operator};
use pretty_assertions::assert_eq;

/// Assert the operator's next row equals `expected`.
pub fn assert_next_row(op: &mut dyn Operator, ctx: &mut ExecutionContext, expected: Row) {
    match op.next(ctx) {
        Ok(Some(row)) => assert_eq!(row, expected),
        Ok(None) => panic!("expected a row, stream ended"),
        Err(err) => panic!("expected a row, got error: {err}"),
    }
}

/// Assert the operator stream has ended.
pub fn assert_exhausted(op: &mut dyn Operator, ctx: &mut ExecutionContext) {
    match op.next(ctx) {
        Ok(None) => {}
        Ok(Some(row)) => panic!("expected end of stream, got row: {row:?}"),
        Err(err) => panic!("expected end of stream, got error: {err}"),
    }
}

/// Assert a result is an error whose message contains `needle`.
pub fn assert_error_contains<T: std::fmt::Debug>(result: QueryResult<T>, needle: &str) {
    match result {
        Err(err) => assert!(
            err.to_string().contains(needle),
            "error '{err}' does not contain '{needle}'"
        ),
        Ok(value) => panic!("expected an error containing '{needle}', got {value:?}"),
    }
}
