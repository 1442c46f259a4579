//! Projection operators: `fields` include/exclude and strict `table`.

use crate::{ExecutionContext, Operator};
use common::{OperatorStats, QueryResult, Row};

/// Include mode builds a new row with the named fields in request
/// order, keeping `_id` when present; exclude mode deletes the listed
/// fields from a clone of the row.
pub struct ProjectExec {
    input: Box<dyn Operator>,
    fields: Vec<String>,
    exclude: bool,
    stats: OperatorStats,
}

impl ProjectExec {
    pub fn new(input: Box<dyn Operator>, fields: Vec<String>, exclude: bool) -> Self {
        Self {
            input,
            fields,
            exclude,
            stats: OperatorStats::default(),
        }
    }

    fn project(&self, row: Row) -> Row {
        if self.exclude {
            let mut row = row;
            for field in &self.fields {
                row.delete(field);
            }
            return row;
        }
        let mut out = Row::new();
        if let Some(id) = row.get("_id") {
            out.set("_id", id.clone());
        }
        for field in &self.fields {
            if let Some(value) = row.get_path(field) {
                out.set(field.clone(), value.clone());
            }
        }
        out
    }
}

impl Operator for ProjectExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        self.stats.rows_read += 1;
        self.stats.rows_returned += 1;
        Ok(Some(self.project(row)))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

/// Strict projection for the `table` command: exactly the named
/// fields, no `_id` pass-through.
pub struct TableExec {
    input: Box<dyn Operator>,
    fields: Vec<String>,
    stats: OperatorStats,
}

impl TableExec {
    pub fn new(input: Box<dyn Operator>, fields: Vec<String>) -> Self {
        Self {
            input,
            fields,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for TableExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        let Some(row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        self.stats.rows_read += 1;
        let mut out = Row::new();
        for field in &self.fields {
            if let Some(value) = row.get_path(field) {
                out.set(field.clone(), value.clone());
            }
        }
        self.stats.rows_returned += 1;
        Ok(Some(out))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}
