//! Filter operator: applies residual `where` conditions.

use crate::eval::evaluate;
use crate::{ExecutionContext, Operator};
use ast::Expr;
use common::{OperatorStats, QueryResult, Row};
use types::Value;

/// Passes a row through only when the condition evaluates to Bool-true.
/// Null and non-boolean results drop the row.
pub struct FilterExec {
    input: Box<dyn Operator>,
    condition: Expr,
    stats: OperatorStats,
}

impl FilterExec {
    pub fn new(input: Box<dyn Operator>, condition: Expr) -> Self {
        Self {
            input,
            condition,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for FilterExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        loop {
            ctx.cancel.check()?;
            let Some(row) = self.input.next(ctx)? else {
                return Ok(None);
            };
            self.stats.rows_read += 1;
            if matches!(evaluate(&self.condition, &row)?, Value::Bool(true)) {
                self.stats.rows_returned += 1;
                return Ok(Some(row));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

