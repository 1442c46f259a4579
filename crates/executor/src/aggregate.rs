//! Hash aggregation and its two annotating variants, eventstats and
//! streamstats.

use crate::eval::evaluate;
use crate::{ExecutionContext, Operator};
use ast::Aggregation;
use common::{OperatorStats, QueryError, QueryResult, Row};
use indexmap::IndexMap;
use types::Value;

/// Reserved separator for composite group keys.
const KEY_SEPARATOR: char = '\u{1}';

/// Canonical string form of a group value; used to index accumulator
/// maps and by dedup/top/rare.
pub(crate) fn canonical_value(value: &Value) -> String {
    value
        .as_str_coerced()
        .unwrap_or_else(|| String::from("\u{0}"))
}

pub(crate) fn composite_key(values: &[Value]) -> String {
    let mut key = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(&canonical_value(value));
    }
    key
}

/// One monotone, associative accumulator.
#[derive(Clone, Debug)]
enum Accumulator {
    Count(u64),
    Sum(f64),
    Avg { sum: f64, count: u64 },
    Min(Option<f64>),
    Max(Option<f64>),
}

impl Accumulator {
    fn for_function(func: &str) -> QueryResult<Accumulator> {
        Ok(match func {
            "count" => Accumulator::Count(0),
            "sum" => Accumulator::Sum(0.0),
            "avg" | "mean" => Accumulator::Avg { sum: 0.0, count: 0 },
            "min" => Accumulator::Min(None),
            "max" => Accumulator::Max(None),
            other => {
                return Err(QueryError::Runtime(format!(
                    "aggregation '{other}' is not supported at runtime"
                )));
            }
        })
    }

    /// Count counts rows; the numeric reducers coerce through Float64
    /// and skip null or non-coercible values.
    fn update(&mut self, value: Option<&Value>) {
        match self {
            Accumulator::Count(count) => *count += 1,
            Accumulator::Sum(sum) => {
                if let Some(v) = value.and_then(Value::as_f64) {
                    *sum += v;
                }
            }
            Accumulator::Avg { sum, count } => {
                if let Some(v) = value.and_then(Value::as_f64) {
                    *sum += v;
                    *count += 1;
                }
            }
            Accumulator::Min(current) => {
                if let Some(v) = value.and_then(Value::as_f64) {
                    *current = Some(current.map_or(v, |c| c.min(v)));
                }
            }
            Accumulator::Max(current) => {
                if let Some(v) = value.and_then(Value::as_f64) {
                    *current = Some(current.map_or(v, |c| c.max(v)));
                }
            }
        }
    }

    fn finish(&self) -> Value {
        match self {
            Accumulator::Count(count) => Value::Int(*count as i64),
            Accumulator::Sum(sum) => Value::Float(*sum),
            Accumulator::Avg { sum, count } => {
                if *count == 0 {
                    Value::Null
                } else {
                    Value::Float(*sum / *count as f64)
                }
            }
            Accumulator::Min(v) | Accumulator::Max(v) => {
                v.map(Value::Float).unwrap_or(Value::Null)
            }
        }
    }
}

struct AccumulatorSet {
    group_values: Vec<Value>,
    accumulators: Vec<Accumulator>,
}

fn new_accumulators(aggregations: &[Aggregation]) -> QueryResult<Vec<Accumulator>> {
    aggregations
        .iter()
        .map(|a| Accumulator::for_function(&a.func))
        .collect()
}

fn update_set(
    accumulators: &mut [Accumulator],
    aggregations: &[Aggregation],
    row: &Row,
) -> QueryResult<()> {
    for (accumulator, aggregation) in accumulators.iter_mut().zip(aggregations) {
        let value = match &aggregation.arg {
            Some(arg) => Some(evaluate(arg, row)?),
            None => None,
        };
        accumulator.update(value.as_ref());
    }
    Ok(())
}

/// Hash aggregation operator.
///
/// Global mode (no group keys) emits exactly one row after draining the
/// child. Grouped mode emits one row per group, keys first, in
/// first-seen group order.
pub struct AggregationExec {
    input: Box<dyn Operator>,
    aggregations: Vec<Aggregation>,
    group_by: Vec<String>,
    output: Vec<Row>,
    cursor: usize,
    drained: bool,
    stats: OperatorStats,
}

impl AggregationExec {
    pub fn new(
        input: Box<dyn Operator>,
        aggregations: Vec<Aggregation>,
        group_by: Vec<String>,
    ) -> Self {
        Self {
            input,
            aggregations,
            group_by,
            output: Vec::new(),
            cursor: 0,
            drained: false,
            stats: OperatorStats::default(),
        }
    }

    fn drain(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        if self.group_by.is_empty() {
            let mut accumulators = new_accumulators(&self.aggregations)?;
            while let Some(row) = self.input.next(ctx)? {
                ctx.cancel.check()?;
                self.stats.rows_read += 1;
                update_set(&mut accumulators, &self.aggregations, &row)?;
            }
            let mut out = Row::new();
            for (aggregation, accumulator) in self.aggregations.iter().zip(&accumulators) {
                out.set(aggregation.alias.clone(), accumulator.finish());
            }
            self.output.push(out);
        } else {
            // Validate the aggregation functions once up front.
            let template = new_accumulators(&self.aggregations)?;
            let mut groups: IndexMap<String, AccumulatorSet> = IndexMap::new();
            while let Some(row) = self.input.next(ctx)? {
                ctx.cancel.check()?;
                self.stats.rows_read += 1;
                let group_values: Vec<Value> = self
                    .group_by
                    .iter()
                    .map(|k| row.get_path(k).cloned().unwrap_or(Value::Null))
                    .collect();
                let key = composite_key(&group_values);
                if !groups.contains_key(&key) && groups.len() >= ctx.config.agg_max_groups {
                    return Err(QueryError::ResourceExhausted(format!(
                        "aggregation exceeds {} groups",
                        ctx.config.agg_max_groups
                    )));
                }
                let entry = groups.entry(key).or_insert_with(|| AccumulatorSet {
                    group_values,
                    accumulators: template.clone(),
                });
                update_set(&mut entry.accumulators, &self.aggregations, &row)?;
            }
            for (_, set) in groups {
                let mut out = Row::new();
                for (name, value) in self.group_by.iter().zip(set.group_values) {
                    out.set(name.clone(), value);
                }
                for (aggregation, accumulator) in self.aggregations.iter().zip(&set.accumulators) {
                    out.set(aggregation.alias.clone(), accumulator.finish());
                }
                self.output.push(out);
            }
        }
        self.drained = true;
        Ok(())
    }
}

impl Operator for AggregationExec {
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

/// Two-pass annotator: aggregates per group, then replays every input
/// row with its group's aggregate values appended.
pub struct EventstatsExec {
    input: Box<dyn Operator>,
    aggregations: Vec<Aggregation>,
    by: Vec<String>,
    output: Vec<Row>,
    cursor: usize,
    drained: bool,
    stats: OperatorStats,
}

impl EventstatsExec {
    pub fn new(input: Box<dyn Operator>, aggregations: Vec<Aggregation>, by: Vec<String>) -> Self {
        Self {
            input,
            aggregations,
            by,
            output: Vec::new(),
            cursor: 0,
            drained: false,
            stats: OperatorStats::default(),
        }
    }

    fn drain(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        let template = new_accumulators(&self.aggregations)?;
        let mut rows: Vec<Row> = Vec::new();
        let mut groups: IndexMap<String, Vec<Accumulator>> = IndexMap::new();
        while let Some(row) = self.input.next(ctx)? {
            ctx.cancel.check()?;
            self.stats.rows_read += 1;
            let key = self.group_key(&row);
            let accumulators = groups.entry(key).or_insert_with(|| template.clone());
            update_set(accumulators, &self.aggregations, &row)?;
            rows.push(row);
        }
        for mut row in rows {
            let key = self.group_key(&row);
            if let Some(accumulators) = groups.get(&key) {
                for (aggregation, accumulator) in self.aggregations.iter().zip(accumulators) {
                    row.set(aggregation.alias.clone(), accumulator.finish());
                }
            }
            self.output.push(row);
        }
        self.drained = true;
        Ok(())
    }

    fn group_key(&self, row: &Row) -> String {
        let values: Vec<Value> = self
            .by
            .iter()
            .map(|k| row.get_path(k).cloned().unwrap_or(Value::Null))
            .collect();
        composite_key(&values)
    }
}

impl Operator for EventstatsExec {
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

/// Streaming annotator: running aggregates over everything seen so
/// far, per group.
pub struct StreamstatsExec {
    input: Box<dyn Operator>,
    aggregations: Vec<Aggregation>,
    by: Vec<String>,
    template: Vec<Accumulator>,
    groups: IndexMap<String, Vec<Accumulator>>,
    stats: OperatorStats,
}

impl StreamstatsExec {
    pub fn new(input: Box<dyn Operator>, aggregations: Vec<Aggregation>, by: Vec<String>) -> Self {
        Self {
            input,
            aggregations,
            by,
            template: Vec::new(),
            groups: IndexMap::new(),
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for StreamstatsExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.template = new_accumulators(&self.aggregations)?;
        self.groups.clear();
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        let Some(mut row) = self.input.next(ctx)? else {
            return Ok(None);
        };
        self.stats.rows_read += 1;
        let values: Vec<Value> = self
            .by
            .iter()
            .map(|k| row.get_path(k).cloned().unwrap_or(Value::Null))
            .collect();
        let key = composite_key(&values);
        let template = &self.template;
        let accumulators = self
            .groups
            .entry(key)
            .or_insert_with(|| template.clone());
        update_set(accumulators, &self.aggregations, &row)?;
        for (aggregation, accumulator) in self.aggregations.iter().zip(accumulators.iter()) {
            row.set(aggregation.alias.clone(), accumulator.finish());
        }
        self.stats.rows_returned += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.groups.clear();
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

