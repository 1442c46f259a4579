//! Top/rare operators: frequency ranking over the full input.

use crate::aggregate::composite_key;
use crate::{ExecutionContext, Operator};
use common::{OperatorStats, QueryResult, Row};
use indexmap::IndexMap;
use types::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrequencyOrder {
    /// `top`: most frequent first.
    MostFrequent,
    /// `rare`: least frequent first.
    LeastFrequent,
}

/// Fully materializes the child, counts value combinations, and emits
/// at most `limit` rows ordered by frequency. Ties break by first-seen
/// order; group values are emitted in canonical string form together
/// with `count` and optionally `percent`.
pub struct FrequencyExec {
    input: Box<dyn Operator>,
    order: FrequencyOrder,
    limit: usize,
    fields: Vec<String>,
    show_count: bool,
    show_percent: bool,
    output: Vec<Row>,
    cursor: usize,
    drained: bool,
    stats: OperatorStats,
}

impl FrequencyExec {
    pub fn new(
        input: Box<dyn Operator>,
        order: FrequencyOrder,
        limit: usize,
        fields: Vec<String>,
        show_count: bool,
        show_percent: bool,
    ) -> Self {
        Self {
            input,
            order,
            limit,
            fields,
            show_count,
            show_percent,
            output: Vec::new(),
            cursor: 0,
            drained: false,
            stats: OperatorStats::default(),
        }
    }

    fn drain(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        // First-seen order of keys is preserved for tie-breaking.
        let mut counts: IndexMap<String, (Vec<String>, u64)> = IndexMap::new();
        let mut total: u64 = 0;
        while let Some(row) = self.input.next(ctx)? {
            ctx.cancel.check()?;
            self.stats.rows_read += 1;
            total += 1;
            let values: Vec<Value> = self
                .fields
                .iter()
                .map(|f| row.get_path(f).cloned().unwrap_or(Value::Null))
                .collect();
            let canonical: Vec<String> = values
                .iter()
                .map(crate::aggregate::canonical_value)
                .collect();
            let key = composite_key(&values);
            counts.entry(key).or_insert((canonical, 0)).1 += 1;
        }

        let mut entries: Vec<(usize, Vec<String>, u64)> = counts
            .into_values()
            .enumerate()
            .map(|(seen, (values, count))| (seen, values, count))
            .collect();
        entries.sort_by(|a, b| {
            let by_count = match self.order {
                FrequencyOrder::MostFrequent => b.2.cmp(&a.2),
                FrequencyOrder::LeastFrequent => a.2.cmp(&b.2),
            };
            by_count.then(a.0.cmp(&b.0))
        });

        for (_, values, count) in entries.into_iter().take(self.limit) {
            let mut row = Row::new();
            for (field, value) in self.fields.iter().zip(values) {
                row.set(field.clone(), Value::Str(value));
            }
            if self.show_count {
                row.set("count", Value::Int(count as i64));
            }
            if self.show_percent && total > 0 {
                row.set(
                    "percent",
                    Value::Float(count as f64 / total as f64 * 100.0),
                );
            }
            self.output.push(row);
        }
        self.drained = true;
        Ok(())
    }
}

impl Operator for FrequencyExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.output.clear();
        self.cursor = 0;
        self.drained = false;
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        if !self.drained {
            self.drain(ctx)?;
        }
        if self.cursor >= self.output.len() {
            return Ok(None);
        }
        let row = std::mem::take(&mut self.output[self.cursor]);
        self.cursor += 1;
        self.stats.rows_returned += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.output.clear();
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

