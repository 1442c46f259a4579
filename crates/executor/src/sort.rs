//! Sort operator: materializes the child stream and emits it in
//! sorted order.

use crate::eval::evaluate;
use crate::{ExecutionContext, Operator};
use ast::SortKey;
use common::{OperatorStats, QueryError, QueryResult, Row};
use std::cmp::Ordering;
use types::Value;

/// Blocking operator: the whole child stream is buffered during
/// `open`, bounded by `sort.max_rows`. Uses a stable multi-key
/// comparator with NULLs last in either direction.
pub struct SortExec {
    input: Box<dyn Operator>,
    keys: Vec<SortKey>,
    sorted: Option<Vec<Row>>,
    cursor: usize,
    stats: OperatorStats,
}

impl SortExec {
    pub fn new(input: Box<dyn Operator>, keys: Vec<SortKey>) -> Self {
        Self {
            input,
            keys,
            sorted: None,
            cursor: 0,
            stats: OperatorStats::default(),
        }
    }

    fn materialize(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        let mut keyed: Vec<(Vec<Value>, Row)> = Vec::new();
        while let Some(row) = self.input.next(ctx)? {
            ctx.cancel.check()?;
            if keyed.len() >= ctx.config.sort_max_rows {
                return Err(QueryError::ResourceExhausted(format!(
                    "sort buffer exceeds {} rows",
                    ctx.config.sort_max_rows
                )));
            }
            self.stats.rows_read += 1;
            let key = self
                .keys
                .iter()
                .map(|k| evaluate(&k.expr, &row))
                .collect::<QueryResult<Vec<_>>>()?;
            keyed.push((key, row));
        }

        let keys = &self.keys;
        keyed.sort_by(|(a, _), (b, _)| compare_key_sets(a, b, keys));
        self.sorted = Some(keyed.into_iter().map(|(_, row)| row).collect());
        self.cursor = 0;
        Ok(())
    }
}

impl Operator for SortExec {
    fn open(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.sorted = None;
        self.cursor = 0;
        self.stats = OperatorStats::default();
        self.input.open(ctx)?;
        self.materialize(ctx)
    }

    fn next(&mut self, ctx: &mut ExecutionContext) -> QueryResult<Option<Row>> {
        ctx.cancel.check()?;
        let Some(rows) = &mut self.sorted else {
            return Ok(None);
        };
        if self.cursor >= rows.len() {
            return Ok(None);
        }
        let row = std::mem::take(&mut rows[self.cursor]);
        self.cursor += 1;
        self.stats.rows_returned += 1;
        Ok(Some(row))
    }

    fn close(&mut self, ctx: &mut ExecutionContext) -> QueryResult<()> {
        self.sorted = None;
        self.input.close(ctx)
    }

    fn stats(&self) -> OperatorStats {
        self.stats
    }
}

fn compare_key_sets(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for (i, key) in keys.iter().enumerate() {
        let ordering = compare_values(&a[i], &b[i], key.ascending);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// NULLs (and incomparable values) sort last regardless of direction;
/// the direction applies only to comparable pairs.
fn compare_values(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    let ordering = a
        .compare(b)
        .or_else(|| {
            // Fall back to string form so mixed types order somehow.
            let (a, b) = (a.as_str_coerced()?, b.as_str_coerced()?);
            Some(a.cmp(&b))
        })
        .unwrap_or(Ordering::Equal);
    if ascending { ordering } else { ordering.reverse() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Config;
    use testsupport::prelude::*;

    fn key(field: &str, ascending: bool) -> SortKey {
        SortKey {
            expr: ast::Expr::field(field),
            ascending,
        }
    }

    #[test]
    fn sorts_numerically_ascending() {
        let input = MockOperator::with_rows(vec![
            int_row(&[("n", 3)]),
            int_row(&[("n", 1)]),
            int_row(&[("n", 2)]),
        ]);
        let mut sort = SortExec::new(Box::new(input), vec![key("n", true)]);
        test_ctx!(ctx);
        sort.open(&mut ctx).unwrap();
        assert_next_row(&mut sort, &mut ctx, int_row(&[("n", 1)]));
        assert_next_row(&mut sort, &mut ctx, int_row(&[("n", 2)]));
        assert_next_row(&mut sort, &mut ctx, int_row(&[("n", 3)]));
        assert_exhausted(&mut sort, &mut ctx);
        sort.close(&mut ctx).unwrap();
    }

    #[test]
    fn multi_key_with_directions() {
        let rows = vec![
            str_int_row("a", 1),
            str_int_row("b", 2),
            str_int_row("a", 2),
            str_int_row("b", 1),
        ];
        fn str_int_row(host: &str, n: i64) -> common::Row {
            let mut row = common::Row::new();
            row.set("host", types::Value::Str(host.into()));
            row.set("n", types::Value::Int(n));
            row
        }
        let input = MockOperator::with_rows(rows);
        let mut sort = SortExec::new(
            Box::new(input),
            vec![key("host", true), key("n", false)],
        );
        test_ctx!(ctx);
        sort.open(&mut ctx).unwrap();
        let collected: Vec<(String, i64)> = std::iter::from_fn(|| {
            sort.next(&mut ctx)
                .unwrap()
                .map(|r| (r.get_str("host").unwrap(), r.get_i64("n").unwrap()))
        })
        .collect();
        assert_eq!(
            collected,
            vec![
                ("a".into(), 2),
                ("a".into(), 1),
                ("b".into(), 2),
                ("b".into(), 1),
            ]
        );
    }

    #[test]
    fn nulls_sort_last_in_both_directions() {
        let rows = vec![
            int_row(&[("n", 2)]),
            int_row(&[("other", 9)]), // no "n": evaluates to Null
            int_row(&[("n", 1)]),
        ];
        let input = MockOperator::with_rows(rows.clone());
        let mut sort = SortExec::new(Box::new(input), vec![key("n", true)]);
        test_ctx!(ctx);
        sort.open(&mut ctx).unwrap();
        let first = sort.next(&mut ctx).unwrap().unwrap();
        assert_eq!(first.get_i64("n"), Some(1));
        sort.next(&mut ctx).unwrap();
        let last = sort.next(&mut ctx).unwrap().unwrap();
        assert_eq!(last.get_i64("n"), None);

        let input = MockOperator::with_rows(rows);
        let mut sort = SortExec::new(Box::new(input), vec![key("n", false)]);
        test_ctx!(ctx2);
        sort.open(&mut ctx2).unwrap();
        let first = sort.next(&mut ctx2).unwrap().unwrap();
        assert_eq!(first.get_i64("n"), Some(2));
    }

    #[test]
    fn sort_is_stable_for_equal_keys() {
        let mut a = common::Row::new();
        a.set("k", types::Value::Int(1));
        a.set("tag", types::Value::Str("first".into()));
        let mut b = common::Row::new();
        b.set("k", types::Value::Int(1));
        b.set("tag", types::Value::Str("second".into()));

        let input = MockOperator::with_rows(vec![a, b]);
        let mut sort = SortExec::new(Box::new(input), vec![key("k", true)]);
        test_ctx!(ctx);
        sort.open(&mut ctx).unwrap();
        assert_eq!(
            sort.next(&mut ctx).unwrap().unwrap().get_str("tag"),
            Some("first".into())
        );
        assert_eq!(
            sort.next(&mut ctx).unwrap().unwrap().get_str("tag"),
            Some("second".into())
        );
    }

    #[test]
    fn buffer_cap_returns_resource_exhausted() {
        let input = MockOperator::with_rows(vec![
            int_row(&[("n", 1)]),
            int_row(&[("n", 2)]),
            int_row(&[("n", 3)]),
        ]);
        let mut sort = SortExec::new(Box::new(input), vec![key("n", true)]);
        let config = Config::builder().sort_max_rows(2).build();
        test_ctx!(ctx, config: &config);
        let err = sort.open(&mut ctx).unwrap_err();
        assert!(
            matches!(err, QueryError::ResourceExhausted(_)),
            "unexpected error {err}"
        );
    }
}
