use ast::{Aggregation, Expr, JoinType, Literal, SortKey, Span};
use catalog::Schema;

/// Aggregation work absorbed into the scan, translated to a bucket
/// tree by the DSL translator. Precedence on absorption: Top, Rare,
/// Bin, Aggregate.
#[derive(Clone, Debug, PartialEq)]
pub enum PushedAggregation {
    Top {
        fields: Vec<String>,
        limit: usize,
        by: Vec<String>,
    },
    Rare {
        fields: Vec<String>,
        limit: usize,
        by: Vec<String>,
    },
    Bin {
        field: String,
        span: Option<Span>,
        bins: Option<usize>,
    },
    Aggregate {
        group_by: Vec<String>,
        aggregations: Vec<Aggregation>,
    },
}

/// Physical operator tree: a scan with pushdown slots plus residual
/// operators executed locally over the returned hits.
#[derive(Clone, Debug, PartialEq)]
pub enum PhysicalPlan {
    Scan {
        source: String,
        schema: Schema,
        /// Filter lowered to a leaf-query tree.
        filter: Option<Expr>,
        /// `_source` projection.
        fields: Option<Vec<String>>,
        /// Backend-side sort; plain field keys only.
        sort_keys: Vec<SortKey>,
        /// Request `size`.
        limit: Option<u64>,
        /// Eval assignments lowered to `script_fields`.
        computed_fields: Vec<(String, Expr)>,
        aggregation: Option<PushedAggregation>,
    },
    Filter {
        input: Box<PhysicalPlan>,
        condition: Expr,
    },
    Project {
        input: Box<PhysicalPlan>,
        fields: Vec<String>,
        exclude: bool,
    },
    Sort {
        input: Box<PhysicalPlan>,
        keys: Vec<SortKey>,
    },
    Limit {
        input: Box<PhysicalPlan>,
        count: u64,
    },
    Aggregate {
        input: Box<PhysicalPlan>,
        aggregations: Vec<Aggregation>,
        group_by: Vec<String>,
    },
    Dedup {
        input: Box<PhysicalPlan>,
        count: u64,
        fields: Vec<String>,
        consecutive: bool,
    },
    Bin {
        input: Box<PhysicalPlan>,
        field: String,
        span: Option<Span>,
        bins: Option<usize>,
    },
    Top {
        input: Box<PhysicalPlan>,
        limit: usize,
        fields: Vec<String>,
        by: Vec<String>,
        show_count: bool,
        show_percent: bool,
    },
    Rare {
        input: Box<PhysicalPlan>,
        limit: usize,
        fields: Vec<String>,
        by: Vec<String>,
        show_count: bool,
        show_percent: bool,
    },
    Eval {
        input: Box<PhysicalPlan>,
        assignments: Vec<(String, Expr)>,
    },
    Rename {
        input: Box<PhysicalPlan>,
        renames: Vec<(String, String)>,
    },
    Replace {
        input: Box<PhysicalPlan>,
        field: String,
        mappings: Vec<(Literal, Literal)>,
    },
    Fillnull {
        input: Box<PhysicalPlan>,
        value: Literal,
        fields: Vec<String>,
    },
    Parse {
        input: Box<PhysicalPlan>,
        field: String,
        pattern: String,
    },
    Rex {
        input: Box<PhysicalPlan>,
        field: String,
        pattern: String,
    },
    Lookup {
        input: Box<PhysicalPlan>,
        table: String,
        join_field: String,
        outputs: Vec<(String, Option<String>)>,
    },
    Table {
        input: Box<PhysicalPlan>,
        fields: Vec<String>,
    },
    Eventstats {
        input: Box<PhysicalPlan>,
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
    Streamstats {
        input: Box<PhysicalPlan>,
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
    Reverse {
        input: Box<PhysicalPlan>,
    },
    Flatten {
        input: Box<PhysicalPlan>,
        field: String,
    },
    /// Two-input concatenation; never eligible for single-document
    /// translation.
    Append {
        input: Box<PhysicalPlan>,
        subsearch: Box<PhysicalPlan>,
    },
    Join {
        left: Box<PhysicalPlan>,
        right: Box<PhysicalPlan>,
        join_type: JoinType,
        field: String,
    },
    Explain {
        input: Box<PhysicalPlan>,
    },
}

impl PhysicalPlan {
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalPlan::Scan { .. } => "PhysicalScan",
            PhysicalPlan::Filter { .. } => "PhysicalFilter",
            PhysicalPlan::Project { .. } => "PhysicalProject",
            PhysicalPlan::Sort { .. } => "PhysicalSort",
            PhysicalPlan::Limit { .. } => "PhysicalLimit",
            PhysicalPlan::Aggregate { .. } => "PhysicalAggregate",
            PhysicalPlan::Dedup { .. } => "PhysicalDedup",
            PhysicalPlan::Bin { .. } => "PhysicalBin",
            PhysicalPlan::Top { .. } => "PhysicalTop",
            PhysicalPlan::Rare { .. } => "PhysicalRare",
            PhysicalPlan::Eval { .. } => "PhysicalEval",
            PhysicalPlan::Rename { .. } => "PhysicalRename",
            PhysicalPlan::Replace { .. } => "PhysicalReplace",
            PhysicalPlan::Fillnull { .. } => "PhysicalFillnull",
            PhysicalPlan::Parse { .. } => "PhysicalParse",
            PhysicalPlan::Rex { .. } => "PhysicalRex",
            PhysicalPlan::Lookup { .. } => "PhysicalLookup",
            PhysicalPlan::Table { .. } => "PhysicalTable",
            PhysicalPlan::Eventstats { .. } => "PhysicalEventstats",
            PhysicalPlan::Streamstats { .. } => "PhysicalStreamstats",
            PhysicalPlan::Reverse { .. } => "PhysicalReverse",
            PhysicalPlan::Flatten { .. } => "PhysicalFlatten",
            PhysicalPlan::Append { .. } => "PhysicalAppend",
            PhysicalPlan::Join { .. } => "PhysicalJoin",
            PhysicalPlan::Explain { .. } => "Explain",
        }
    }

    pub fn children(&self) -> Vec<&PhysicalPlan> {
        match self {
            PhysicalPlan::Scan { .. } => vec![],
            PhysicalPlan::Append { input, subsearch } => vec![input, subsearch],
            PhysicalPlan::Join { left, right, .. } => vec![left, right],
            PhysicalPlan::Filter { input, .. }
            | PhysicalPlan::Project { input, .. }
            | PhysicalPlan::Sort { input, .. }
            | PhysicalPlan::Limit { input, .. }
            | PhysicalPlan::Aggregate { input, .. }
            | PhysicalPlan::Dedup { input, .. }
            | PhysicalPlan::Bin { input, .. }
            | PhysicalPlan::Top { input, .. }
            | PhysicalPlan::Rare { input, .. }
            | PhysicalPlan::Eval { input, .. }
            | PhysicalPlan::Rename { input, .. }
            | PhysicalPlan::Replace { input, .. }
            | PhysicalPlan::Fillnull { input, .. }
            | PhysicalPlan::Parse { input, .. }
            | PhysicalPlan::Rex { input, .. }
            | PhysicalPlan::Lookup { input, .. }
            | PhysicalPlan::Table { input, .. }
            | PhysicalPlan::Eventstats { input, .. }
            | PhysicalPlan::Streamstats { input, .. }
            | PhysicalPlan::Reverse { input }
            | PhysicalPlan::Flatten { input, .. }
            | PhysicalPlan::Explain { input } => vec![input],
        }
    }

    /// All scans in the tree, in traversal order.
    pub fn scans(&self) -> Vec<&PhysicalPlan> {
        let mut out = Vec::new();
        collect_scans(self, &mut out);
        out
    }
}

fn collect_scans<'a>(plan: &'a PhysicalPlan, out: &mut Vec<&'a PhysicalPlan>) {
    if matches!(plan, PhysicalPlan::Scan { .. }) {
        out.push(plan);
    }
    for child in plan.children() {
        collect_scans(child, out);
    }
}

/// Pretty-print a physical plan for debugging.
pub fn format_physical(plan: &PhysicalPlan) -> String {
    let mut out = String::new();
    format_into(plan, 0, &mut out);
    out
}

fn format_into(plan: &PhysicalPlan, depth: usize, out: &mut String) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&"  ".repeat(depth));
    match plan {
        PhysicalPlan::Scan { source, filter, fields, sort_keys, limit, aggregation, .. } => {
            out.push_str(&format!(
                "PhysicalScan source={source} filter={} fields={fields:?} sort={} limit={limit:?} agg={}",
                filter.is_some(),
                sort_keys.len(),
                aggregation.is_some()
            ));
        }
        other => out.push_str(other.name()),
    }
    for child in plan.children() {
        format_into(child, depth + 1, out);
    }
}
