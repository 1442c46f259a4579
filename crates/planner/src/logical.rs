use ast::{Aggregation, Command, Expr, JoinType, Literal, Query, SortKey, Span};
use catalog::Schema;
use common::{QueryError, QueryResult};
use types::FieldType;

/// Logical operator tree: one node per pipeline command.
///
/// Nodes are immutable once constructed; rewrites produce new trees via
/// [`LogicalPlan::replace_child`]. Nodes that change the output shape
/// carry their derived schema; pass-through nodes delegate to their
/// input.
#[derive(Clone, Debug, PartialEq)]
pub enum LogicalPlan {
    Scan {
        source: String,
        schema: Schema,
    },
    Filter {
        input: Box<LogicalPlan>,
        condition: Expr,
    },
    Project {
        input: Box<LogicalPlan>,
        fields: Vec<String>,
        exclude: bool,
        schema: Schema,
    },
    Sort {
        input: Box<LogicalPlan>,
        keys: Vec<SortKey>,
    },
    Limit {
        input: Box<LogicalPlan>,
        count: u64,
    },
    Aggregate {
        input: Box<LogicalPlan>,
        aggregations: Vec<Aggregation>,
        group_by: Vec<String>,
        /// Bucket span when lowered from `timechart`.
        span: Option<Span>,
        schema: Schema,
    },
    Dedup {
        input: Box<LogicalPlan>,
        count: u64,
        fields: Vec<String>,
        consecutive: bool,
    },
    Bin {
        input: Box<LogicalPlan>,
        field: String,
        span: Option<Span>,
        bins: Option<usize>,
    },
    Top {
        input: Box<LogicalPlan>,
        limit: usize,
        fields: Vec<String>,
        by: Vec<String>,
        show_count: bool,
        show_percent: bool,
        schema: Schema,
    },
    Rare {
        input: Box<LogicalPlan>,
        limit: usize,
        fields: Vec<String>,
        by: Vec<String>,
        show_count: bool,
        show_percent: bool,
        schema: Schema,
    },
    Eval {
        input: Box<LogicalPlan>,
        assignments: Vec<(String, Expr)>,
        schema: Schema,
    },
    Rename {
        input: Box<LogicalPlan>,
        renames: Vec<(String, String)>,
        schema: Schema,
    },
    Replace {
        input: Box<LogicalPlan>,
        field: String,
        mappings: Vec<(Literal, Literal)>,
    },
    Fillnull {
        input: Box<LogicalPlan>,
        value: Literal,
        fields: Vec<String>,
    },
    Parse {
        input: Box<LogicalPlan>,
        field: String,
        pattern: String,
        schema: Schema,
    },
    Rex {
        input: Box<LogicalPlan>,
        field: String,
        pattern: String,
        schema: Schema,
    },
    Lookup {
        input: Box<LogicalPlan>,
        table: String,
        join_field: String,
        outputs: Vec<(String, Option<String>)>,
        schema: Schema,
    },
    Append {
        input: Box<LogicalPlan>,
        subsearch: Box<LogicalPlan>,
        schema: Schema,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        join_type: JoinType,
        field: String,
        schema: Schema,
    },
    Table {
        input: Box<LogicalPlan>,
        fields: Vec<String>,
        schema: Schema,
    },
    Eventstats {
        input: Box<LogicalPlan>,
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
        schema: Schema,
    },
    Streamstats {
        input: Box<LogicalPlan>,
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
        schema: Schema,
    },
    Reverse {
        input: Box<LogicalPlan>,
    },
    Flatten {
        input: Box<LogicalPlan>,
        field: String,
    },
    Explain {
        input: Box<LogicalPlan>,
    },
}

impl LogicalPlan {
    /// Output schema of this node.
    pub fn schema(&self) -> &Schema {
        match self {
            LogicalPlan::Scan { schema, .. }
            | LogicalPlan::Project { schema, .. }
            | LogicalPlan::Aggregate { schema, .. }
            | LogicalPlan::Top { schema, .. }
            | LogicalPlan::Rare { schema, .. }
            | LogicalPlan::Eval { schema, .. }
            | LogicalPlan::Rename { schema, .. }
            | LogicalPlan::Parse { schema, .. }
            | LogicalPlan::Rex { schema, .. }
            | LogicalPlan::Lookup { schema, .. }
            | LogicalPlan::Append { schema, .. }
            | LogicalPlan::Join { schema, .. }
            | LogicalPlan::Table { schema, .. }
            | LogicalPlan::Eventstats { schema, .. }
            | LogicalPlan::Streamstats { schema, .. } => schema,
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Dedup { input, .. }
            | LogicalPlan::Bin { input, .. }
            | LogicalPlan::Replace { input, .. }
            | LogicalPlan::Fillnull { input, .. }
            | LogicalPlan::Reverse { input }
            | LogicalPlan::Flatten { input, .. }
            | LogicalPlan::Explain { input } => input.schema(),
        }
    }

    /// Operator name as printed by the plan formatter.
    pub fn name(&self) -> &'static str {
        match self {
            LogicalPlan::Scan { .. } => "Scan",
            LogicalPlan::Filter { .. } => "Filter",
            LogicalPlan::Project { .. } => "Project",
            LogicalPlan::Sort { .. } => "Sort",
            LogicalPlan::Limit { .. } => "Limit",
            LogicalPlan::Aggregate { .. } => "Aggregate",
            LogicalPlan::Dedup { .. } => "Dedup",
            LogicalPlan::Bin { .. } => "Bin",
            LogicalPlan::Top { .. } => "Top",
            LogicalPlan::Rare { .. } => "Rare",
            LogicalPlan::Eval { .. } => "Eval",
            LogicalPlan::Rename { .. } => "Rename",
            LogicalPlan::Replace { .. } => "Replace",
            LogicalPlan::Fillnull { .. } => "Fillnull",
            LogicalPlan::Parse { .. } => "Parse",
            LogicalPlan::Rex { .. } => "Rex",
            LogicalPlan::Lookup { .. } => "Lookup",
            LogicalPlan::Append { .. } => "Append",
            LogicalPlan::Join { .. } => "Join",
            LogicalPlan::Table { .. } => "Table",
            LogicalPlan::Eventstats { .. } => "Eventstats",
            LogicalPlan::Streamstats { .. } => "Streamstats",
            LogicalPlan::Reverse { .. } => "Reverse",
            LogicalPlan::Flatten { .. } => "Flatten",
            LogicalPlan::Explain { .. } => "Explain",
        }
    }

    /// Immediate children, in input order.
    pub fn children(&self) -> Vec<&LogicalPlan> {
        match self {
            LogicalPlan::Scan { .. } => vec![],
            LogicalPlan::Append { input, subsearch, .. } => vec![input, subsearch],
            LogicalPlan::Join { left, right, .. } => vec![left, right],
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Dedup { input, .. }
            | LogicalPlan::Bin { input, .. }
            | LogicalPlan::Top { input, .. }
            | LogicalPlan::Rare { input, .. }
            | LogicalPlan::Eval { input, .. }
            | LogicalPlan::Rename { input, .. }
            | LogicalPlan::Replace { input, .. }
            | LogicalPlan::Fillnull { input, .. }
            | LogicalPlan::Parse { input, .. }
            | LogicalPlan::Rex { input, .. }
            | LogicalPlan::Lookup { input, .. }
            | LogicalPlan::Table { input, .. }
            | LogicalPlan::Eventstats { input, .. }
            | LogicalPlan::Streamstats { input, .. }
            | LogicalPlan::Reverse { input }
            | LogicalPlan::Flatten { input, .. }
            | LogicalPlan::Explain { input } => vec![input],
        }
    }

    /// Return a copy of this node with any child equal to `old`
    /// replaced by `new`. Children that do not match are returned
    /// unchanged.
    pub fn replace_child(&self, old: &LogicalPlan, new: &LogicalPlan) -> LogicalPlan {
        let swap = |child: &Box<LogicalPlan>| -> Box<LogicalPlan> {
            if child.as_ref() == old {
                Box::new(new.clone())
            } else {
                child.clone()
            }
        };
        let mut plan = self.clone();
        match &mut plan {
            LogicalPlan::Scan { .. } => {}
            LogicalPlan::Append { input, subsearch, .. } => {
                *input = swap(input);
                *subsearch = swap(subsearch);
            }
            LogicalPlan::Join { left, right, .. } => {
                *left = swap(left);
                *right = swap(right);
            }
            LogicalPlan::Filter { input, .. }
            | LogicalPlan::Project { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. }
            | LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Dedup { input, .. }
            | LogicalPlan::Bin { input, .. }
            | LogicalPlan::Top { input, .. }
            | LogicalPlan::Rare { input, .. }
            | LogicalPlan::Eval { input, .. }
            | LogicalPlan::Rename { input, .. }
            | LogicalPlan::Replace { input, .. }
            | LogicalPlan::Fillnull { input, .. }
            | LogicalPlan::Parse { input, .. }
            | LogicalPlan::Rex { input, .. }
            | LogicalPlan::Lookup { input, .. }
            | LogicalPlan::Table { input, .. }
            | LogicalPlan::Eventstats { input, .. }
            | LogicalPlan::Streamstats { input, .. }
            | LogicalPlan::Reverse { input }
            | LogicalPlan::Flatten { input, .. }
            | LogicalPlan::Explain { input } => *input = swap(input),
        }
        plan
    }

    /// One-line description of this node, without children.
    pub fn describe(&self) -> String {
        match self {
            LogicalPlan::Scan { source, .. } => format!("Scan source={source}"),
            LogicalPlan::Filter { condition, .. } => format!("Filter [{condition:?}]"),
            LogicalPlan::Project { fields, exclude, .. } => {
                format!("Project fields={fields:?} exclude={exclude}")
            }
            LogicalPlan::Sort { keys, .. } => {
                let keys: Vec<String> = keys.iter().map(describe_sort_key).collect();
                format!("Sort keys=[{}]", keys.join(", "))
            }
            LogicalPlan::Limit { count, .. } => format!("Limit count={count}"),
            LogicalPlan::Aggregate { aggregations, group_by, .. } => {
                let aggs: Vec<String> = aggregations.iter().map(describe_aggregation).collect();
                format!("Aggregate group_by={group_by:?} aggs=[{}]", aggs.join(", "))
            }
            LogicalPlan::Dedup { count, fields, consecutive, .. } => {
                format!("Dedup count={count} fields={fields:?} consecutive={consecutive}")
            }
            LogicalPlan::Bin { field, span, bins, .. } => {
                format!("Bin field={field} span={span:?} bins={bins:?}")
            }
            LogicalPlan::Top { limit, fields, .. } => {
                format!("Top limit={limit} fields={fields:?}")
            }
            LogicalPlan::Rare { limit, fields, .. } => {
                format!("Rare limit={limit} fields={fields:?}")
            }
            LogicalPlan::Eval { assignments, .. } => {
                let names: Vec<&str> = assignments.iter().map(|(n, _)| n.as_str()).collect();
                format!("Eval fields={names:?}")
            }
            LogicalPlan::Rename { renames, .. } => format!("Rename {renames:?}"),
            LogicalPlan::Replace { field, mappings, .. } => {
                format!("Replace field={field} mappings={}", mappings.len())
            }
            LogicalPlan::Fillnull { fields, .. } => format!("Fillnull fields={fields:?}"),
            LogicalPlan::Parse { field, pattern, .. } => {
                format!("Parse field={field} pattern={pattern:?}")
            }
            LogicalPlan::Rex { field, pattern, .. } => {
                format!("Rex field={field} pattern={pattern:?}")
            }
            LogicalPlan::Lookup { table, join_field, .. } => {
                format!("Lookup table={table} on={join_field}")
            }
            LogicalPlan::Append { .. } => "Append".into(),
            LogicalPlan::Join { join_type, field, .. } => {
                format!("Join type={join_type:?} on={field}")
            }
            LogicalPlan::Table { fields, .. } => format!("Table fields={fields:?}"),
            LogicalPlan::Eventstats { aggregations, by, .. } => {
                let aggs: Vec<String> = aggregations.iter().map(describe_aggregation).collect();
                format!("Eventstats by={by:?} aggs=[{}]", aggs.join(", "))
            }
            LogicalPlan::Streamstats { aggregations, by, .. } => {
                let aggs: Vec<String> = aggregations.iter().map(describe_aggregation).collect();
                format!("Streamstats by={by:?} aggs=[{}]", aggs.join(", "))
            }
            LogicalPlan::Reverse { .. } => "Reverse".into(),
            LogicalPlan::Flatten { field, .. } => format!("Flatten field={field}"),
            LogicalPlan::Explain { .. } => "Explain".into(),
        }
    }
}

fn describe_sort_key(key: &SortKey) -> String {
    let dir = if key.ascending { "ASC" } else { "DESC" };
    match key.expr.as_field() {
        Some(name) => format!("{name} {dir}"),
        None => format!("{:?} {dir}", key.expr),
    }
}

fn describe_aggregation(agg: &Aggregation) -> String {
    match &agg.arg {
        Some(Expr::Field(name)) => format!("{}({}) AS {}", agg.func, name, agg.alias),
        Some(expr) => format!("{}({expr:?}) AS {}", agg.func, agg.alias),
        None => format!("{}() AS {}", agg.func, agg.alias),
    }
}

/// Pretty-print a plan tree, one node per line, two-space indent.
pub fn format_plan(plan: &LogicalPlan) -> String {
    let mut out = String::new();
    format_into(plan, 0, &mut out);
    out
}

fn format_into(plan: &LogicalPlan, depth: usize, out: &mut String) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&"  ".repeat(depth));
    out.push_str(&plan.describe());
    for child in plan.children() {
        format_into(child, depth + 1, out);
    }
}

/// Build a logical plan by folding over the command chain.
///
/// The head command must be `search`; `explain` wraps the whole plan.
pub fn build(query: &Query, schema: &Schema) -> QueryResult<LogicalPlan> {
    tracing::debug!(commands = query.commands.len(), "building logical plan");
    let mut commands = query.commands.as_slice();
    let mut explain = false;
    if let Some(Command::Explain) = commands.first() {
        explain = true;
        commands = &commands[1..];
    }

    let Some((head, rest)) = commands.split_first() else {
        return Err(QueryError::Plan("query has no commands".into()));
    };
    let mut plan = match head {
        Command::Search { source } => scan(source, schema),
        other => {
            return Err(QueryError::Plan(format!(
                "pipeline must start with search, found '{}'",
                other.name()
            )));
        }
    };

    for command in rest {
        plan = append_command(plan, command)?;
    }

    if explain {
        plan = LogicalPlan::Explain {
            input: Box::new(plan),
        };
    }
    Ok(plan)
}

fn scan(source: &str, schema: &Schema) -> LogicalPlan {
    let schema = if source == schema.source {
        schema.clone()
    } else {
        // Unknown sources scan with an empty schema; field references
        // against them resolve at runtime only.
        Schema::new(source)
    };
    LogicalPlan::Scan {
        source: source.to_string(),
        schema,
    }
}

fn append_command(plan: LogicalPlan, command: &Command) -> QueryResult<LogicalPlan> {
    let input_schema = plan.schema().clone();
    let input = Box::new(plan);
    Ok(match command {
        Command::Search { .. } => {
            return Err(QueryError::Plan("search may only start a pipeline".into()));
        }
        Command::Describe | Command::ShowDatasources => {
            // Metadata commands are answered by the front-end.
            return Err(QueryError::Plan(format!(
                "'{}' is handled by the front-end",
                command.name()
            )));
        }
        Command::Explain => {
            return Err(QueryError::Plan("explain may only start a pipeline".into()));
        }
        Command::Where { condition } => LogicalPlan::Filter {
            input,
            condition: condition.clone(),
        },
        Command::Fields { fields, exclude } => {
            let names = field_names(fields)?;
            let schema = if *exclude {
                let mut schema = input_schema;
                for name in &names {
                    schema.remove(name);
                }
                schema
            } else {
                input_schema
                    .project(&names)
                    .map_err(|e| QueryError::Plan(e.to_string()))?
            };
            LogicalPlan::Project {
                input,
                fields: names,
                exclude: *exclude,
                schema,
            }
        }
        Command::Stats { aggregations, by } | Command::Chart { aggregations, by } => {
            let schema = aggregate_schema(&input_schema, aggregations, by, None);
            LogicalPlan::Aggregate {
                input,
                aggregations: aggregations.clone(),
                group_by: by.clone(),
                span: None,
                schema,
            }
        }
        Command::Timechart { span, aggregations, by } => {
            let mut group_by = Vec::with_capacity(by.len() + 1);
            group_by.push("_time".to_string());
            group_by.extend(by.iter().cloned());
            let schema = aggregate_schema(
                &input_schema,
                aggregations,
                by,
                Some(("_time", FieldType::Date)),
            );
            LogicalPlan::Aggregate {
                input,
                aggregations: aggregations.clone(),
                group_by,
                span: span.clone(),
                schema,
            }
        }
        Command::Sort { keys } => LogicalPlan::Sort {
            input,
            keys: keys.clone(),
        },
        Command::Head { count } => LogicalPlan::Limit {
            input,
            count: *count as u64,
        },
        Command::Top { limit, fields, by, show_count, show_percent } => LogicalPlan::Top {
            schema: frequency_schema(&input_schema, fields, by, *show_percent),
            input,
            limit: *limit,
            fields: fields.clone(),
            by: by.clone(),
            show_count: *show_count,
            show_percent: *show_percent,
        },
        Command::Rare { limit, fields, by, show_count, show_percent } => LogicalPlan::Rare {
            schema: frequency_schema(&input_schema, fields, by, *show_percent),
            input,
            limit: *limit,
            fields: fields.clone(),
            by: by.clone(),
            show_count: *show_count,
            show_percent: *show_percent,
        },
        Command::Dedup { count, fields, consecutive } => LogicalPlan::Dedup {
            input,
            count: *count as u64,
            fields: fields.clone(),
            consecutive: *consecutive,
        },
        Command::Eval { assignments } => {
            let mut schema = input_schema;
            for (name, expr) in assignments {
                schema.add_field(name.clone(), eval_result_type(expr, &schema));
            }
            LogicalPlan::Eval {
                input,
                assignments: assignments.clone(),
                schema,
            }
        }
        Command::Rename { renames } => {
            let mut schema = input_schema;
            for (old, new) in renames {
                // The old name stays in the schema, matching analysis.
                let ty = schema
                    .lookup(old)
                    .map(|f| f.field_type)
                    .unwrap_or(FieldType::Unknown);
                schema.add_field(new.clone(), ty);
            }
            LogicalPlan::Rename {
                input,
                renames: renames.clone(),
                schema,
            }
        }
        Command::Replace { field, mappings } => LogicalPlan::Replace {
            input,
            field: field.clone(),
            mappings: mappings.clone(),
        },
        Command::Bin { field, span, bins } => LogicalPlan::Bin {
            input,
            field: field.clone(),
            span: span.clone(),
            bins: *bins,
        },
        Command::Parse { field, pattern } => {
            let schema = extraction_schema(input_schema, pattern)?;
            LogicalPlan::Parse {
                input,
                field: field.clone(),
                pattern: pattern.clone(),
                schema,
            }
        }
        Command::Rex { field, pattern } => {
            let schema = extraction_schema(input_schema, pattern)?;
            LogicalPlan::Rex {
                input,
                field: field.clone().unwrap_or_else(|| "_raw".to_string()),
                pattern: pattern.clone(),
                schema,
            }
        }
        Command::Lookup { table, join_field, outputs } => {
            let mut schema = input_schema;
            for (name, alias) in outputs {
                schema.add_field(
                    alias.as_deref().unwrap_or(name).to_string(),
                    FieldType::String,
                );
            }
            LogicalPlan::Lookup {
                input,
                table: table.clone(),
                join_field: join_field.clone(),
                outputs: outputs.clone(),
                schema,
            }
        }
        Command::Append { subsearch } => {
            let sub_plan = build_subsearch(subsearch)?;
            let mut schema = input_schema;
            // Union of both sides; the main input wins on conflicts.
            for field in sub_plan.schema().fields() {
                if schema.field(&field.name).is_none() {
                    schema.add(field.clone());
                }
            }
            LogicalPlan::Append {
                input,
                subsearch: Box::new(sub_plan),
                schema,
            }
        }
        Command::Join { join_type, field, subsearch } => {
            let right = build_subsearch(subsearch)?;
            let mut schema = input_schema;
            for right_field in right.schema().fields() {
                if right_field.name == *field {
                    // The join key is taken from the left side.
                    continue;
                }
                if schema.field(&right_field.name).is_some() {
                    let mut renamed = right_field.clone();
                    renamed.name = format!("{}_right", right_field.name);
                    schema.add(renamed);
                } else {
                    schema.add(right_field.clone());
                }
            }
            LogicalPlan::Join {
                left: input,
                right: Box::new(right),
                join_type: *join_type,
                field: field.clone(),
                schema,
            }
        }
        Command::Table { fields } => {
            let schema = input_schema
                .project(fields)
                .map_err(|e| QueryError::Plan(e.to_string()))?;
            LogicalPlan::Table {
                input,
                fields: fields.clone(),
                schema,
            }
        }
        Command::Eventstats { aggregations, by } => LogicalPlan::Eventstats {
            schema: annotate_schema(input_schema, aggregations),
            input,
            aggregations: aggregations.clone(),
            by: by.clone(),
        },
        Command::Streamstats { aggregations, by } => LogicalPlan::Streamstats {
            schema: annotate_schema(input_schema, aggregations),
            input,
            aggregations: aggregations.clone(),
            by: by.clone(),
        },
        Command::Fillnull { value, fields } => LogicalPlan::Fillnull {
            input,
            value: value.clone(),
            fields: field_names(fields)?,
        },
        Command::Reverse => LogicalPlan::Reverse { input },
        Command::Flatten { field } => LogicalPlan::Flatten {
            input,
            field: field.clone(),
        },
    })
}

/// Subsearches plan against a fresh schema keyed only by their own
/// source name; field references inside them resolve at runtime.
fn build_subsearch(subsearch: &Query) -> QueryResult<LogicalPlan> {
    let source = match subsearch.commands.first() {
        Some(Command::Search { source }) => source.clone(),
        _ => return Err(QueryError::Plan("subsearch must start with search".into())),
    };
    build(subsearch, &Schema::new(source))
}

fn field_names(fields: &[Expr]) -> QueryResult<Vec<String>> {
    fields
        .iter()
        .map(|f| {
            f.as_field()
                .map(str::to_string)
                .ok_or_else(|| QueryError::Plan(format!("expected a field reference, got {f:?}")))
        })
        .collect()
}

/// Output type of one aggregation in a grouped schema: Long by default,
/// Double for the numeric reducers.
fn aggregation_output_type(func: &str) -> FieldType {
    match func {
        "sum" | "avg" | "stddev" | "variance" | "min" | "max" => FieldType::Double,
        _ => FieldType::Long,
    }
}

fn aggregate_schema(
    input: &Schema,
    aggregations: &[Aggregation],
    by: &[String],
    prelude: Option<(&str, FieldType)>,
) -> Schema {
    let mut schema = Schema::new(input.source.clone());
    if let Some((name, ty)) = prelude {
        schema.add_field(name.to_string(), ty);
    }
    for key in by {
        let ty = input
            .lookup(key)
            .map(|f| f.field_type)
            .unwrap_or(FieldType::Unknown);
        schema.add_field(key.clone(), ty);
    }
    for agg in aggregations {
        schema.add_field(agg.alias.clone(), aggregation_output_type(&agg.func));
    }
    schema
}

fn frequency_schema(
    input: &Schema,
    fields: &[String],
    by: &[String],
    show_percent: bool,
) -> Schema {
    let mut schema = Schema::new(input.source.clone());
    for name in by.iter().chain(fields.iter()) {
        let ty = input
            .lookup(name)
            .map(|f| f.field_type)
            .unwrap_or(FieldType::Unknown);
        schema.add_field(name.clone(), ty);
    }
    schema.add_field("count", FieldType::Long);
    if show_percent {
        schema.add_field("percent", FieldType::Double);
    }
    schema
}

/// Eventstats/streamstats keep the input columns and add one output per
/// aggregation; min/max preserve the input field's type when the
/// argument is a plain reference.
fn annotate_schema(mut schema: Schema, aggregations: &[Aggregation]) -> Schema {
    for agg in aggregations {
        let ty = match (&agg.func[..], &agg.arg) {
            ("min" | "max", Some(Expr::Field(name))) => schema
                .lookup(name)
                .map(|f| f.field_type)
                .unwrap_or_else(|_| aggregation_output_type(&agg.func)),
            _ => aggregation_output_type(&agg.func),
        };
        schema.add_field(agg.alias.clone(), ty);
    }
    schema
}

/// Result-type heuristic for eval assignments: literals and field
/// references type exactly, anything else defaults to Double.
fn eval_result_type(expr: &Expr, schema: &Schema) -> FieldType {
    match expr {
        Expr::Literal(Literal::Int(_)) => FieldType::Long,
        Expr::Literal(Literal::Float(_)) => FieldType::Double,
        Expr::Literal(Literal::Str(_)) => FieldType::String,
        Expr::Literal(Literal::Bool(_)) => FieldType::Bool,
        Expr::Literal(Literal::Null) => FieldType::Unknown,
        Expr::Field(name) => schema
            .lookup(name)
            .map(|f| f.field_type)
            .unwrap_or(FieldType::Unknown),
        _ => FieldType::Double,
    }
}

/// Input schema plus one String field per named capture group. Fails on
/// invalid patterns and on patterns with no named groups.
fn extraction_schema(mut schema: Schema, pattern: &str) -> QueryResult<Schema> {
    let regex = regex::Regex::new(pattern)
        .map_err(|e| QueryError::Plan(format!("invalid extraction pattern: {e}")))?;
    let names: Vec<&str> = regex.capture_names().flatten().collect();
    if names.is_empty() {
        return Err(QueryError::Plan(
            "extraction pattern has no named capture groups".into(),
        ));
    }
    for name in names {
        schema.add_field(name.to_string(), FieldType::String);
    }
    Ok(schema)
}
