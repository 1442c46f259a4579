//! Row-shaping operators: eval, rename, replace, fillnull, reverse,
//! flatten, and lookup enrichment.

use crate::eval::{evaluate, literal_value};
use crate::{ExecutionContext, Operator};
use ast::{Expr, Literal};
use common::{OperatorStats, QueryResult, Row};
use types::Value;

/// Evaluates assignments left to right; later assignments see the
/// values written by earlier ones.
pub struct EvalExec {
    input: Box<dyn Operator>,
    assignments: Vec<(String, Expr)>,
    stats: OperatorStats,
}

impl EvalExec {
    pub fn new(input: Box<dyn Operator>, assignments: Vec<(String, Expr)>) -> Self {
        Self {
            input,
            assignments,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for EvalExec {
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
        for (field, expr) in &self.assignments {
            let value = evaluate(expr, &row)?;
            row.set(field.clone(), value);
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

/// Moves values to their new names; unknown old names are silently
/// skipped (the analyzer already validated schema-known names).
pub struct RenameExec {
    input: Box<dyn Operator>,
    renames: Vec<(String, String)>,
    stats: OperatorStats,
}

impl RenameExec {
    pub fn new(input: Box<dyn Operator>, renames: Vec<(String, String)>) -> Self {
        Self {
            input,
            renames,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for RenameExec {
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
        for (old, new) in &self.renames {
            if let Some(value) = row.delete(old) {
                row.set(new.clone(), value);
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

/// Rewrites matching values of one field according to literal
/// mappings.
pub struct ReplaceExec {
    input: Box<dyn Operator>,
    field: String,
    mappings: Vec<(Literal, Literal)>,
    stats: OperatorStats,
}

impl ReplaceExec {
    pub fn new(input: Box<dyn Operator>, field: String, mappings: Vec<(Literal, Literal)>) -> Self {
        Self {
            input,
            field,
            mappings,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for ReplaceExec {
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
        if let Some(current) = row.get(&self.field).cloned() {
            for (from, to) in &self.mappings {
                if current.eq_coerced(&literal_value(from)) {
                    row.set(self.field.clone(), literal_value(to));
                    break;
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

/// Fills null or missing values with a literal default. An empty field
/// list fills every field present in the row.
pub struct FillnullExec {
    input: Box<dyn Operator>,
    value: Literal,
    fields: Vec<String>,
    stats: OperatorStats,
}

impl FillnullExec {
    pub fn new(input: Box<dyn Operator>, value: Literal, fields: Vec<String>) -> Self {
        Self {
            input,
            value,
            fields,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for FillnullExec {
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
        let default = literal_value(&self.value);
        if self.fields.is_empty() {
            let fields: Vec<String> = row.fields().map(str::to_string).collect();
            for field in fields {
                if row.get(&field).is_some_and(Value::is_null) {
                    row.set(field, default.clone());
                }
            }
        } else {
            for field in &self.fields {
                let missing = row.get(field).is_none_or(Value::is_null);
                if missing {
                    row.set(field.clone(), default.clone());
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

/// Materializes the child stream and replays it backwards.
pub struct ReverseExec {
    input: Box<dyn Operator>,
    buffered: Option<Vec<Row>>,
    stats: OperatorStats,
}

impl ReverseExec {
    pub fn new(input: Box<dyn Operator>) -> Self {
        Self {
            input,
            buffered: None,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for ReverseExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.buffered = None;
        self.stats = OperatorStats::default();
        self.input.open(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        if self.buffered.is_none() {
            let mut rows = Vec::new();
            while let Some(row) = self.input.next(ctx)? {
                ctx.cancel.check()?;
                self.stats.rows_read += 1;
                rows.push(row);
            }
            rows.reverse();
            self.buffered = Some(rows);
        }
        let Some(rows) = self.buffered.as_mut() else {
            return Ok(None);
        };
        if rows.is_empty() {
            return Ok(None);
        }
        self.stats.rows_returned += 1;
        Ok(Some(rows.remove(0)))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.buffered = None;
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

/// Lifts an object field's children to dotted top-level fields.
pub struct FlattenExec {
    input: Box<dyn Operator>,
    field: String,
    stats: OperatorStats,
}

impl FlattenExec {
    pub fn new(input: Box<dyn Operator>, field: String) -> Self {
        Self {
            input,
            field,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for FlattenExec {
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
        if let Some(Value::Object(children)) = row.delete(&self.field) {
            for (child, value) in children {
                row.set(format!("{}.{child}", self.field), value);
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

/// Enriches rows from an in-memory lookup table registered on the
/// context. Rows without a match (or a missing table) get Null
/// outputs; lookup failures never fail the query.
pub struct LookupExec {
    input: Box<dyn Operator>,
    table: String,
    join_field: String,
    outputs: Vec<(String, Option<String>)>,
    stats: OperatorStats,
}

impl LookupExec {
    pub fn new(
        input: Box<dyn Operator>,
        table: String,
        join_field: String,
        outputs: Vec<(String, Option<String>)>,
    ) -> Self {
        Self {
            input,
            table,
            join_field,
            outputs,
            stats: OperatorStats::default(),
        }
    }
}

impl Operator for LookupExec {
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
        let key = row.get(&self.join_field).cloned().unwrap_or(Value::Null);
        let matched = ctx.lookup_table(&self.table).and_then(|rows| {
            rows.iter()
                .find(|candidate| {
                    candidate
                        .get(&self.join_field)
                        .is_some_and(|v| v.eq_coerced(&key))
                })
                .cloned()
        });
        for (name, alias) in &self.outputs {
            let value = matched
                .as_ref()
                .and_then(|m| m.get(name).cloned())
                .unwrap_or(Value::Null);
            row.set(alias.as_deref().unwrap_or(name).to_string(), value);
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

#[cfg(test)]
mod tests {
    use super::*;
    use ast::BinaryOp;
    use testsupport::prelude::*;

    #[test]
    fn eval_assignments_build_on_each_other() {
        let input = MockOperator::with_rows(vec![int_row(&[("price", 100), ("qty", 5)])]);
        let mut eval = EvalExec::new(
            Box::new(input),
            vec![
                (
                    "total".into(),
                    Expr::binary(BinaryOp::Mul, Expr::field("price"), Expr::field("qty")),
                ),
                (
                    "double_total".into(),
                    Expr::binary(BinaryOp::Mul, Expr::field("total"), Expr::int(2)),
                ),
            ],
        );
        test_ctx!(ctx);
        eval.open(&mut ctx).unwrap();
        let row = eval.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.get_i64("total"), Some(500));
        assert_eq!(row.get_i64("double_total"), Some(1000));
    }

    #[test]
    fn rename_moves_value_and_skips_unknowns() {
        let input = MockOperator::with_rows(vec![int_row(&[("a", 1)])]);
        let mut rename = RenameExec::new(
            Box::new(input),
            vec![("a".into(), "b".into()), ("ghost".into(), "c".into())],
        );
        test_ctx!(ctx);
        rename.open(&mut ctx).unwrap();
        let row = rename.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.get_i64("b"), Some(1));
        assert!(row.get("a").is_none());
        assert!(row.get("c").is_none());
    }

    #[test]
    fn replace_rewrites_matching_values() {
        let mut row = Row::new();
        row.set("level", Value::Str("warn".into()));
        let input = MockOperator::with_rows(vec![row]);
        let mut replace = ReplaceExec::new(
            Box::new(input),
            "level".into(),
            vec![
                (Literal::Str("warn".into()), Literal::Str("warning".into())),
                (Literal::Str("err".into()), Literal::Str("error".into())),
            ],
        );
        test_ctx!(ctx);
        replace.open(&mut ctx).unwrap();
        let row = replace.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.get_str("level"), Some("warning".into()));
    }

    #[test]
    fn fillnull_fills_named_and_missing_fields() {
        let mut row = Row::new();
        row.set("a", Value::Null);
        row.set("b", Value::Int(1));
        let input = MockOperator::with_rows(vec![row]);
        let mut fill = FillnullExec::new(
            Box::new(input),
            Literal::Int(0),
            vec!["a".into(), "c".into()],
        );
        test_ctx!(ctx);
        fill.open(&mut ctx).unwrap();
        let row = fill.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.get_i64("a"), Some(0));
        assert_eq!(row.get_i64("b"), Some(1));
        assert_eq!(row.get_i64("c"), Some(0));
    }

    #[test]
    fn reverse_replays_backwards() {
        let input = MockOperator::with_rows(vec![
            int_row(&[("n", 1)]),
            int_row(&[("n", 2)]),
            int_row(&[("n", 3)]),
        ]);
        let mut reverse = ReverseExec::new(Box::new(input));
        test_ctx!(ctx);
        reverse.open(&mut ctx).unwrap();
        assert_next_row(&mut reverse, &mut ctx, int_row(&[("n", 3)]));
        assert_next_row(&mut reverse, &mut ctx, int_row(&[("n", 2)]));
        assert_next_row(&mut reverse, &mut ctx, int_row(&[("n", 1)]));
        assert_exhausted(&mut reverse, &mut ctx);
    }

    #[test]
    fn flatten_lifts_object_children() {
        let mut geo = indexmap::IndexMap::new();
        geo.insert("lat".to_string(), Value::Float(1.5));
        geo.insert("lon".to_string(), Value::Float(2.5));
        let mut row = Row::new();
        row.set("geo", Value::Object(geo));
        row.set("host", Value::Str("h1".into()));

        let input = MockOperator::with_rows(vec![row]);
        let mut flatten = FlattenExec::new(Box::new(input), "geo".into());
        test_ctx!(ctx);
        flatten.open(&mut ctx).unwrap();
        let row = flatten.next(&mut ctx).unwrap().unwrap();
        assert_eq!(row.get_f64("geo.lat"), Some(1.5));
        assert_eq!(row.get_f64("geo.lon"), Some(2.5));
        assert!(row.get("geo").is_none());
    }

    #[test]
    fn lookup_enriches_matches_and_nulls_misses() {
        let mut table_row = Row::new();
        table_row.set("host", Value::Str("h1".into()));
        table_row.set("owner", Value::Str("infra".into()));

        let input = MockOperator::with_rows(vec![
            {
                let mut r = Row::new();
                r.set("host", Value::Str("h1".into()));
                r
            },
            {
                let mut r = Row::new();
                r.set("host", Value::Str("h2".into()));
                r
            },
        ]);
        let mut lookup = LookupExec::new(
            Box::new(input),
            "hosts".into(),
            "host".into(),
            vec![("owner".into(), Some("team".into()))],
        );
        test_ctx!(ctx);
        ctx.add_lookup_table("hosts", vec![table_row]);
        lookup.open(&mut ctx).unwrap();

        let hit = lookup.next(&mut ctx).unwrap().unwrap();
        assert_eq!(hit.get_str("team"), Some("infra".into()));
        let miss = lookup.next(&mut ctx).unwrap().unwrap();
        assert_eq!(miss.get("team"), Some(&Value::Null));
    }
}
