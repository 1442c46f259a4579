//! Lowering of the pushed-down plan portion into a backend DSL
//! document.
//!
//! The translator consumes a physical plan containing exactly one scan
//! and emits a JSON document with the sections `query`, `_source`,
//! `sort`, `size`, `aggs`, and `script_fields`. It never talks to the
//! backend itself; the data source collaborator does.

#[cfg(test)]
mod tests;

use ast::{Aggregation, BinaryOp, Expr, Literal, SortKey, Span, UnaryOp};
use common::{QueryError, QueryResult};
use planner::{PhysicalPlan, PushedAggregation};
use serde_json::{Value, json};

/// A resolved user-defined-function reference for one computed field.
#[derive(Clone, Debug, PartialEq)]
pub struct UdfReference {
    pub name: String,
    pub version: String,
    pub parameters: Value,
    pub field_bindings: Vec<String>,
}

/// Collaborator that resolves eval assignments into UDF references for
/// the `script_fields` section.
pub trait FunctionBuilder {
    fn build(&self, field: &str, expr: &Expr) -> QueryResult<UdfReference>;
}

/// Translates physical scans into DSL documents.
#[derive(Default)]
pub struct Translator<'a> {
    function_builder: Option<&'a dyn FunctionBuilder>,
}

impl<'a> Translator<'a> {
    pub fn new() -> Self {
        Self {
            function_builder: None,
        }
    }

    pub fn with_function_builder(builder: &'a dyn FunctionBuilder) -> Self {
        Self {
            function_builder: Some(builder),
        }
    }

    /// Emit the DSL document for the plan's single scan.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::Translate` when the plan holds zero or more
    /// than one scan, or when a pushed expression has no DSL form.
    pub fn translate(&self, plan: &PhysicalPlan) -> QueryResult<Value> {
        let scans = plan.scans();
        if scans.len() != 1 {
            return Err(QueryError::Translate(format!(
                "expected exactly one scan, found {}",
                scans.len()
            )));
        }
        let PhysicalPlan::Scan {
            source,
            filter,
            fields,
            sort_keys,
            limit,
            computed_fields,
            aggregation,
            ..
        } = scans[0]
        else {
            unreachable!("scans() returns scan nodes only");
        };

        let mut doc = serde_json::Map::new();

        let query = match filter {
            Some(condition) => lower_filter(condition)?,
            None => json!({ "match_all": {} }),
        };
        doc.insert("query".into(), query);

        if let Some(fields) = fields {
            doc.insert("_source".into(), json!(fields));
        }

        let sort = lower_sort(sort_keys);
        if !sort.is_empty() {
            doc.insert("sort".into(), Value::Array(sort));
        }

        if let Some(aggregation) = aggregation {
            doc.insert("aggs".into(), lower_aggregation(aggregation)?);
            // Aggregation documents answer through buckets, not hits.
            doc.insert("size".into(), json!(0));
        } else if let Some(limit) = limit {
            doc.insert("size".into(), json!(limit));
        }

        if let (Some(builder), false) = (self.function_builder, computed_fields.is_empty()) {
            let mut script_fields = serde_json::Map::new();
            for (field, expr) in computed_fields {
                let udf = builder.build(field, expr)?;
                script_fields.insert(
                    field.clone(),
                    json!({
                        "wasm_udf": {
                            "name": udf.name,
                            "version": udf.version,
                            "parameters": udf.parameters,
                            "field_bindings": udf.field_bindings,
                        }
                    }),
                );
            }
            doc.insert("script_fields".into(), Value::Object(script_fields));
        }

        tracing::debug!(source = %source, sections = doc.len(), "emitted DSL document");
        Ok(Value::Object(doc))
    }
}

/// Lower a pushed filter expression into a leaf-query tree.
fn lower_filter(expr: &Expr) -> QueryResult<Value> {
    match expr {
        Expr::Binary { op, left, right } => match op {
            BinaryOp::And => {
                let mut must = Vec::new();
                flatten_conjunction(expr, &mut must)?;
                Ok(json!({ "bool": { "must": must } }))
            }
            BinaryOp::Or => Ok(json!({
                "bool": {
                    "should": [lower_filter(left)?, lower_filter(right)?],
                    "minimum_should_match": 1,
                }
            })),
            BinaryOp::Eq => {
                let (field, value) = field_and_literal(left, right)?;
                Ok(json!({ "term": { field: value } }))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let (field, value) = field_and_literal(left, right)?;
                let bound = match op {
                    BinaryOp::Lt => "lt",
                    BinaryOp::Le => "lte",
                    BinaryOp::Gt => "gt",
                    _ => "gte",
                };
                Ok(json!({ "range": { field: { bound: value } } }))
            }
            BinaryOp::Like => {
                let (field, value) = field_and_literal(left, right)?;
                let pattern = value
                    .as_str()
                    .ok_or_else(|| {
                        QueryError::Translate("LIKE pattern must be a string".into())
                    })?
                    .replace('%', "*")
                    .replace('_', "?");
                Ok(json!({ "wildcard": { field: pattern } }))
            }
            BinaryOp::In => {
                let field = expect_field(left)?;
                let Expr::List(values) = right.as_ref() else {
                    return Err(QueryError::Translate(
                        "IN requires a literal list".into(),
                    ));
                };
                let values = values
                    .iter()
                    .map(expect_literal)
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(json!({ "terms": { field: values } }))
            }
            other => Err(QueryError::Translate(format!(
                "operator {other:?} has no leaf-query form"
            ))),
        },
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => Ok(json!({ "bool": { "must_not": [lower_filter(expr)?] } })),
        other => Err(QueryError::Translate(format!(
            "expression {other:?} has no leaf-query form"
        ))),
    }
}

/// Nested ANDs flatten into a single `must` list.
fn flatten_conjunction(expr: &Expr, out: &mut Vec<Value>) -> QueryResult<()> {
    match expr {
        Expr::Binary {
            op: BinaryOp::And,
            left,
            right,
        } => {
            flatten_conjunction(left, out)?;
            flatten_conjunction(right, out)
        }
        other => {
            out.push(lower_filter(other)?);
            Ok(())
        }
    }
}

fn expect_field(expr: &Expr) -> QueryResult<&str> {
    expr.as_field().ok_or_else(|| {
        QueryError::Translate(format!("expected a field reference, got {expr:?}"))
    })
}

fn expect_literal(expr: &Expr) -> QueryResult<Value> {
    match expr {
        Expr::Literal(lit) => literal_to_json(lit),
        other => Err(QueryError::Translate(format!(
            "expected a literal, got {other:?}"
        ))),
    }
}

fn field_and_literal<'e>(left: &'e Expr, right: &'e Expr) -> QueryResult<(&'e str, Value)> {
    Ok((expect_field(left)?, expect_literal(right)?))
}

fn literal_to_json(lit: &Literal) -> QueryResult<Value> {
    Ok(match lit {
        Literal::Int(v) => json!(v),
        Literal::Float(v) => json!(v),
        Literal::Str(v) => json!(v),
        Literal::Bool(v) => json!(v),
        Literal::Null => Value::Null,
    })
}

/// Plain field keys become sort entries; complex keys are handled by
/// the residual sort operator.
fn lower_sort(keys: &[SortKey]) -> Vec<Value> {
    keys.iter()
        .filter_map(|key| {
            let field = key.expr.as_field()?;
            let order = if key.ascending { "asc" } else { "desc" };
            Some(json!({ field: { "order": order } }))
        })
        .collect()
}

fn lower_aggregation(aggregation: &PushedAggregation) -> QueryResult<Value> {
    match aggregation {
        PushedAggregation::Top { fields, limit, by } => {
            Ok(frequency_buckets(fields, by, *limit, false))
        }
        PushedAggregation::Rare { fields, limit, by } => {
            Ok(frequency_buckets(fields, by, *limit, true))
        }
        PushedAggregation::Bin { field, span, bins } => lower_bin(field, span.as_ref(), *bins),
        PushedAggregation::Aggregate { group_by, aggregations } => {
            let metrics = lower_metrics(aggregations)?;
            Ok(nest_group_by(group_by, metrics))
        }
    }
}

/// Terms buckets for top/rare, ordered by document count. The first
/// field owns the outer `top_<field>` bucket; additional fields (and
/// group-by fields, outermost) nest as `by_<field>` sub-aggregations.
fn frequency_buckets(fields: &[String], by: &[String], limit: usize, ascending: bool) -> Value {
    let order = if ascending { "asc" } else { "desc" };
    let mut chain: Vec<(String, &String)> = Vec::new();
    for field in by {
        chain.push((format!("by_{field}"), field));
    }
    for (i, field) in fields.iter().enumerate() {
        let name = if i == 0 {
            format!("top_{field}")
        } else {
            format!("by_{field}")
        };
        chain.push((name, field));
    }

    let mut inner: Option<Value> = None;
    for (name, field) in chain.into_iter().rev() {
        let mut bucket = json!({
            "terms": {
                "field": field,
                "size": limit,
                "order": { "_count": order },
            }
        });
        if let Some(previous) = inner.take() {
            bucket["aggs"] = previous;
        }
        let mut wrapper = serde_json::Map::new();
        wrapper.insert(name, bucket);
        inner = Some(Value::Object(wrapper));
    }
    inner.unwrap_or_else(|| json!({}))
}

fn lower_bin(field: &str, span: Option<&Span>, bins: Option<usize>) -> QueryResult<Value> {
    let bucket = match (span, bins) {
        (Some(span), _) => json!({
            "date_histogram": {
                "field": field,
                "calendar_interval": serialize_span(span)?,
            }
        }),
        (None, Some(bins)) => json!({
            "auto_date_histogram": {
                "field": field,
                "buckets": bins,
            }
        }),
        (None, None) => {
            return Err(QueryError::Translate(
                "bin requires a span or a bin count".into(),
            ));
        }
    };
    let mut wrapper = serde_json::Map::new();
    wrapper.insert(format!("bin_{field}"), bucket);
    Ok(Value::Object(wrapper))
}

/// Nested `group_by_<field>` terms buckets with the metric
/// aggregations at the innermost level.
fn nest_group_by(group_by: &[String], metrics: Value) -> Value {
    let mut inner = metrics;
    for field in group_by.iter().rev() {
        let bucket = json!({
            "terms": { "field": field },
            "aggs": inner,
        });
        let mut wrapper = serde_json::Map::new();
        wrapper.insert(format!("group_by_{field}"), bucket);
        inner = Value::Object(wrapper);
    }
    inner
}

fn lower_metrics(aggregations: &[Aggregation]) -> QueryResult<Value> {
    let mut metrics = serde_json::Map::new();
    for agg in aggregations {
        metrics.insert(agg.alias.clone(), lower_metric(agg)?);
    }
    Ok(Value::Object(metrics))
}

fn lower_metric(agg: &Aggregation) -> QueryResult<Value> {
    let arg_field = match &agg.arg {
        Some(expr) => Some(expect_field(expr).map_err(|_| {
            QueryError::Translate(format!(
                "aggregation '{}' requires a plain field argument",
                agg.func
            ))
        })?),
        None => None,
    };
    Ok(match (agg.func.as_str(), arg_field) {
        ("count", None) => json!({ "value_count": { "field": "_id" } }),
        ("count", Some(field)) => json!({ "value_count": { "field": field } }),
        ("sum" | "avg" | "min" | "max", Some(field)) => {
            let func = agg.func.clone();
            json!({ func: { "field": field } })
        }
        ("dc", Some(field)) => json!({ "cardinality": { "field": field } }),
        ("stats", Some(field)) => json!({ "extended_stats": { "field": field } }),
        ("percentiles" | "percentile", Some(field)) => {
            json!({ "percentiles": { "field": field } })
        }
        (func, _) => {
            return Err(QueryError::Translate(format!(
                "aggregation '{func}' has no metric form"
            )));
        }
    })
}

/// Span units serialize with the numeric value as a decimal prefix:
/// `30s`, `5m`, `1M`.
fn serialize_span(span: &Span) -> QueryResult<String> {
    let unit = match span.unit.as_str() {
        "s" => "s",
        "m" | "min" => "m",
        "h" | "hour" => "h",
        "d" | "day" => "d",
        "w" => "w",
        "mon" => "M",
        "y" => "y",
        other => {
            return Err(QueryError::Translate(format!(
                "unsupported time unit '{other}'"
            )));
        }
    };
    Ok(format!("{}{unit}", span.value))
}
