//! Parse/rex operator: regex extraction of named capture groups into
//! string fields.

use crate::{ExecutionContext, Operator};
use common::{OperatorStats, QueryError, QueryResult, Row};
use types::Value;

/// Applies a compiled extraction pattern to a string field and writes
/// one field per named capture group. Rows that do not match pass
/// through unchanged. The `regex` engine guarantees linear-time
/// matching, which keeps every row within the configured bound.
pub struct ExtractExec {
    input: Box<dyn Operator>,
    field: String,
    regex: regex::Regex,
    group_names: Vec<String>,
    stats: OperatorStats,
}

impl ExtractExec {
    pub fn new(input: Box<dyn Operator>, field: String, pattern: &str) -> QueryResult<Self> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| QueryError::Plan(format!("invalid extraction pattern: {e}")))?;
        let group_names = regex
            .capture_names()
            .flatten()
            .map(str::to_string)
            .collect();
        Ok(Self {
            input,
            field,
            regex,
            group_names,
            stats: OperatorStats::default(),
        })
    }
}

impl Operator for ExtractExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        let Some(mut row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        self.stats.rows_read += 1;
        if let Some(text) = row.get_str(&self.field) {
            if let Some(captures) = self.regex.captures(&text) {
                for name in &self.group_names {
                    if let Some(m) = captures.name(name) {
                        row.set(name.clone(), Value::Str(m.as_str().to_string()));
                    }
                }
            }
        }
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

