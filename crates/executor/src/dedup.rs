//! Dedup operator: stream-preserving "keep up to N per key".

use crate::aggregate::composite_key;
use crate::{ExecutionContext, Operator};
use common::{OperatorStats, QueryResult, Row};
use types::Value;

type Counts = hashbrown::HashMap<String, u64, ahash::RandomState>;

/// Emits a row iff its key has been seen at most `count` times,
/// preserving input order. With `consecutive` set, the counter resets
/// whenever the key differs from the immediately previous row.
pub struct DedupExec {
    input: Box<dyn Operator>,
    count: u64,
    fields: Vec<String>,
    consecutive: bool,
    seen: Counts,
    previous_key: Option<String>,
    stats: OperatorStats,
}

impl DedupExec {
    pub fn new(input: Box<dyn Operator>, count: u64, fields: Vec<String>, consecutive: bool) -> Self {
        Self {
            input,
            count,
            fields,
            consecutive,
            seen: Counts::default(),
            previous_key: None,
            stats: OperatorStats::default(),
        }
    }

    fn key(&self, row: &Row) -> String {
        let values: Vec<Value> = self
            .fields
            .iter()
            .map(|f| row.get_path(f).cloned().unwrap_or(Value::Null))
            .collect();
        composite_key(&values)
    }
}

impl Operator for DedupExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.seen.clear();
        self.previous_key = None;
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
            let key = self.key(&row);
            if self.consecutive && self.previous_key.as_deref() != Some(key.as_str()) {
                self.seen.clear();
            }
            self.previous_key = Some(key.clone());
            let count = self.seen.entry(key).or_insert(0);
            *count += 1;
            if *count <= self.count {
                self.stats.rows_returned += 1;
                return Ok(Some(row));
            }
        }
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.seen.clear();
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

