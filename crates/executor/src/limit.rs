//! Limit operator: emits at most N rows, short-circuiting afterwards.

use crate::{ExecutionContext, Operator};
use common::{OperatorStats, QueryResult, Row};

pub struct LimitExec {
    input: Box<dyn Operator>,
    count: u64,
    returned: u64,
    stats: OperatorStats,
}

impl LimitExec {
    pub fn new(input: Box<dyn Operator>, count: u64) -> Self {
        Self {
            input,
            count,
            returned: 0,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for LimitExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.returned = 0;
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        if self.returned >= self.count {
            return Ok(None);
        }
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        self.stats.rows_read += 1;
        self.returned += 1;
        self.stats.rows_returned += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

