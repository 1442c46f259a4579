use crate::logical::LogicalPlan;
use crate::physical::{PhysicalPlan, PushedAggregation};
use ast::{BinaryOp, Expr, Literal, UnaryOp};
use common::{Config, QueryResult};

/// What the pushdown rewrite is allowed to absorb into the scan.
#[derive(Clone, Copy, Debug)]
pub struct PushdownOptions {
    /// Global switch; when false everything runs locally.
    pub enabled: bool,
    /// Absorb top/rare/bin/aggregate into the scan's aggregation slot.
    /// The resulting document answers through its `aggs` section, so
    /// this is only useful when the caller consumes the DSL directly.
    pub aggregations: bool,
    /// Absorb eval assignments into `script_fields`; requires a
    /// function-builder collaborator on the translator.
    pub computed_fields: bool,
}

impl PushdownOptions {
    /// Full pushdown for DSL emission.
    pub fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.pushdown_enabled,
            aggregations: true,
            computed_fields: false,
        }
    }

    /// Pushdown for local execution: the data source returns hits only,
    /// so aggregations stay in the residual pipeline.
    pub fn for_execution(config: &Config) -> Self {
        Self {
            enabled: config.pushdown_enabled,
            aggregations: false,
            computed_fields: false,
        }
    }
}

/// Rewrite a logical plan into a physical plan, moving eligible work
/// from the stem above the scan into the scan's pushdown slots.
pub fn push_down(plan: &LogicalPlan, options: &PushdownOptions) -> QueryResult<PhysicalPlan> {
    let physical = convert(plan, options)?;
    tracing::debug!(scans = physical.scans().len(), "physical plan ready");
    Ok(physical)
}

fn convert(plan: &LogicalPlan, options: &PushdownOptions) -> QueryResult<PhysicalPlan> {
    Ok(match plan {
        LogicalPlan::Scan { source, schema } => PhysicalPlan::Scan {
            source: source.clone(),
            schema: schema.clone(),
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: None,
        },
        LogicalPlan::Filter { input, condition } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter: None,
                    fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: None,
                } if options.enabled && is_pushable_filter(condition) => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter: Some(condition.clone()),
                    fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: None,
                },
                child => PhysicalPlan::Filter {
                    input: Box::new(child),
                    condition: condition.clone(),
                },
            }
        }
        LogicalPlan::Project { input, fields, exclude, .. } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields: None,
                    sort_keys,
                    limit,
                    computed_fields,
                    aggregation: None,
                } if options.enabled && !exclude => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields: Some(fields.clone()),
                    sort_keys,
                    limit,
                    computed_fields,
                    aggregation: None,
                },
                child => PhysicalPlan::Project {
                    input: Box::new(child),
                    fields: fields.clone(),
                    exclude: *exclude,
                },
            }
        }
        LogicalPlan::Sort { input, keys } => {
            let child = convert(input, options)?;
            let all_plain = keys.iter().all(|k| k.expr.as_field().is_some());
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: None,
                } if options.enabled && all_plain && sort_keys.is_empty() => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys: keys.clone(),
                    limit: None,
                    computed_fields,
                    aggregation: None,
                },
                child => PhysicalPlan::Sort {
                    input: Box::new(child),
                    keys: keys.clone(),
                },
            }
        }
        LogicalPlan::Limit { input, count } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: None,
                } if options.enabled => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    limit: Some(*count),
                    computed_fields,
                    aggregation: None,
                },
                child => PhysicalPlan::Limit {
                    input: Box::new(child),
                    count: *count,
                },
            }
        }
        LogicalPlan::Eval { input, assignments, .. } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    limit,
                    mut computed_fields,
                    aggregation: None,
                } if options.enabled && options.computed_fields => {
                    computed_fields.extend(assignments.iter().cloned());
                    PhysicalPlan::Scan {
                        source,
                        schema,
                        filter,
                        fields,
                        sort_keys,
                        limit,
                        computed_fields,
                        aggregation: None,
                    }
                }
                child => PhysicalPlan::Eval {
                    input: Box::new(child),
                    assignments: assignments.clone(),
                },
            }
        }
        LogicalPlan::Aggregate { input, aggregations, group_by, span, .. } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    computed_fields,
                    aggregation: None,
                    ..
                } if absorb_aggregations(options) && span.is_none() => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    // `size` is forced to zero at translation.
                    limit: None,
                    computed_fields,
                    aggregation: Some(PushedAggregation::Aggregate {
                        group_by: group_by.clone(),
                        aggregations: aggregations.clone(),
                    }),
                },
                child => PhysicalPlan::Aggregate {
                    input: Box::new(child),
                    aggregations: aggregations.clone(),
                    group_by: group_by.clone(),
                },
            }
        }
        LogicalPlan::Top { input, limit, fields, by, show_count, show_percent, .. } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields: scan_fields,
                    sort_keys,
                    computed_fields,
                    aggregation: None,
                    ..
                } if absorb_aggregations(options) => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields: scan_fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: Some(PushedAggregation::Top {
                        fields: fields.clone(),
                        limit: *limit,
                        by: by.clone(),
                    }),
                },
                child => PhysicalPlan::Top {
                    input: Box::new(child),
                    limit: *limit,
                    fields: fields.clone(),
                    by: by.clone(),
                    show_count: *show_count,
                    show_percent: *show_percent,
                },
            }
        }
        LogicalPlan::Rare { input, limit, fields, by, show_count, show_percent, .. } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields: scan_fields,
                    sort_keys,
                    computed_fields,
                    aggregation: None,
                    ..
                } if absorb_aggregations(options) => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields: scan_fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: Some(PushedAggregation::Rare {
                        fields: fields.clone(),
                        limit: *limit,
                        by: by.clone(),
                    }),
                },
                child => PhysicalPlan::Rare {
                    input: Box::new(child),
                    limit: *limit,
                    fields: fields.clone(),
                    by: by.clone(),
                    show_count: *show_count,
                    show_percent: *show_percent,
                },
            }
        }
        LogicalPlan::Bin { input, field, span, bins } => {
            let child = convert(input, options)?;
            match child {
                PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    computed_fields,
                    aggregation: None,
                    ..
                } if absorb_aggregations(options) => PhysicalPlan::Scan {
                    source,
                    schema,
                    filter,
                    fields,
                    sort_keys,
                    limit: None,
                    computed_fields,
                    aggregation: Some(PushedAggregation::Bin {
                        field: field.clone(),
                        span: span.clone(),
                        bins: *bins,
                    }),
                },
                child => PhysicalPlan::Bin {
                    input: Box::new(child),
                    field: field.clone(),
                    span: span.clone(),
                    bins: *bins,
                },
            }
        }
        LogicalPlan::Dedup { input, count, fields, consecutive } => PhysicalPlan::Dedup {
            input: Box::new(convert(input, options)?),
            count: *count,
            fields: fields.clone(),
            consecutive: *consecutive,
        },
        LogicalPlan::Rename { input, renames, .. } => PhysicalPlan::Rename {
            input: Box::new(convert(input, options)?),
            renames: renames.clone(),
        },
        LogicalPlan::Replace { input, field, mappings } => PhysicalPlan::Replace {
            input: Box::new(convert(input, options)?),
            field: field.clone(),
            mappings: mappings.clone(),
        },
        LogicalPlan::Fillnull { input, value, fields } => PhysicalPlan::Fillnull {
            input: Box::new(convert(input, options)?),
            value: value.clone(),
            fields: fields.clone(),
        },
        LogicalPlan::Parse { input, field, pattern, .. } => PhysicalPlan::Parse {
            input: Box::new(convert(input, options)?),
            field: field.clone(),
            pattern: pattern.clone(),
        },
        LogicalPlan::Rex { input, field, pattern, .. } => PhysicalPlan::Rex {
            input: Box::new(convert(input, options)?),
            field: field.clone(),
            pattern: pattern.clone(),
        },
        LogicalPlan::Lookup { input, table, join_field, outputs, .. } => PhysicalPlan::Lookup {
            input: Box::new(convert(input, options)?),
            table: table.clone(),
            join_field: join_field.clone(),
            outputs: outputs.clone(),
        },
        LogicalPlan::Table { input, fields, .. } => PhysicalPlan::Table {
            input: Box::new(convert(input, options)?),
            fields: fields.clone(),
        },
        LogicalPlan::Eventstats { input, aggregations, by, .. } => PhysicalPlan::Eventstats {
            input: Box::new(convert(input, options)?),
            aggregations: aggregations.clone(),
            by: by.clone(),
        },
        LogicalPlan::Streamstats { input, aggregations, by, .. } => PhysicalPlan::Streamstats {
            input: Box::new(convert(input, options)?),
            aggregations: aggregations.clone(),
            by: by.clone(),
        },
        LogicalPlan::Reverse { input } => PhysicalPlan::Reverse {
            input: Box::new(convert(input, options)?),
        },
        LogicalPlan::Flatten { input, field } => PhysicalPlan::Flatten {
            input: Box::new(convert(input, options)?),
            field: field.clone(),
        },
        LogicalPlan::Append { input, subsearch, .. } => PhysicalPlan::Append {
            input: Box::new(convert(input, options)?),
            subsearch: Box::new(convert(subsearch, options)?),
        },
        LogicalPlan::Join { left, right, join_type, field, .. } => PhysicalPlan::Join {
            left: Box::new(convert(left, options)?),
            right: Box::new(convert(right, options)?),
            join_type: *join_type,
            field: field.clone(),
        },
        LogicalPlan::Explain { input } => PhysicalPlan::Explain {
            input: Box::new(convert(input, options)?),
        },
    })
}

fn absorb_aggregations(options: &PushdownOptions) -> bool {
    options.enabled && options.aggregations
}

/// Whether a filter condition is fully expressible as a leaf-query
/// tree: comparisons between a field and a scalar literal, LIKE with a
/// string pattern, IN over literals, and AND/OR/NOT combinations
/// thereof. Anything else stays in the residual pipeline.
pub fn is_pushable_filter(expr: &Expr) -> bool {
    match expr {
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Eq | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                left.as_field().is_some() && is_scalar_literal(right)
            }
            BinaryOp::Like => {
                left.as_field().is_some()
                    && matches!(right.as_ref(), Expr::Literal(Literal::Str(_)))
            }
            BinaryOp::In => {
                left.as_field().is_some()
                    && match right.as_ref() {
                        Expr::List(values) => values.iter().all(is_scalar_literal),
                        _ => false,
                    }
            }
            BinaryOp::And | BinaryOp::Or => is_pushable_filter(left) && is_pushable_filter(right),
            _ => false,
        },
        Expr::Unary {
            op: UnaryOp::Not,
            expr,
        } => is_pushable_filter(expr),
        _ => false,
    }
}

fn is_scalar_literal(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal(Literal::Int(_) | Literal::Float(_) | Literal::Str(_) | Literal::Bool(_))
    )
}
