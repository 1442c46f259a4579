//! Abstract syntax tree for the pipelined query language.
//!
//! The parser (an external collaborator) produces these values; the
//! analyzer annotates them against a schema and the planner lowers them
//! into logical operators. Nodes are plain data with serde derives and
//! are never mutated after parsing.

use serde::{Deserialize, Serialize};

/// A parsed query: a chain of `|`-separated commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub commands: Vec<Command>,
}

impl Query {
    pub fn new(commands: Vec<Command>) -> Self {
        Self { commands }
    }
}

/// Literal constant kinds as written in the query text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

/// Binary comparison, logical, and arithmetic operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    In,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
                | BinaryOp::Like
                | BinaryOp::In
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

/// Expression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),
    /// Field reference; dotted paths reach into object fields.
    Field(String),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Case {
        whens: Vec<WhenClause>,
        else_: Option<Box<Expr>>,
    },
    List(Vec<Expr>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WhenClause {
    pub condition: Expr,
    pub then: Expr,
}

/// One `stats`-style aggregation: `func(arg) as alias`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub func: String,
    pub arg: Option<Expr>,
    pub alias: String,
}

/// One `sort` key. Complex expressions are permitted; only plain field
/// references are eligible for pushdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
}

/// A `bin`/`timechart` span such as `30s` or `5m`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub value: u64,
    pub unit: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
    Full,
}

/// One pipeline command.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    Search {
        source: String,
    },
    Where {
        condition: Expr,
    },
    Fields {
        fields: Vec<Expr>,
        exclude: bool,
    },
    Stats {
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
    Sort {
        keys: Vec<SortKey>,
    },
    Head {
        count: i64,
    },
    Describe,
    ShowDatasources,
    Explain,
    Top {
        limit: usize,
        fields: Vec<String>,
        by: Vec<String>,
        show_count: bool,
        show_percent: bool,
    },
    Rare {
        limit: usize,
        fields: Vec<String>,
        by: Vec<String>,
        show_count: bool,
        show_percent: bool,
    },
    Dedup {
        count: i64,
        fields: Vec<String>,
        consecutive: bool,
    },
    Eval {
        assignments: Vec<(String, Expr)>,
    },
    Rename {
        renames: Vec<(String, String)>,
    },
    Replace {
        field: String,
        mappings: Vec<(Literal, Literal)>,
    },
    Bin {
        field: String,
        span: Option<Span>,
        bins: Option<usize>,
    },
    Timechart {
        span: Option<Span>,
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
    Chart {
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
    Parse {
        field: String,
        pattern: String,
    },
    Rex {
        field: Option<String>,
        pattern: String,
    },
    Lookup {
        table: String,
        join_field: String,
        /// Output fields, each with an optional alias.
        outputs: Vec<(String, Option<String>)>,
    },
    Append {
        subsearch: Query,
    },
    Join {
        join_type: JoinType,
        field: String,
        subsearch: Query,
    },
    Reverse,
    Flatten {
        field: String,
    },
    Fillnull {
        value: Literal,
        fields: Vec<Expr>,
    },
    Table {
        fields: Vec<String>,
    },
    Eventstats {
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
    Streamstats {
        aggregations: Vec<Aggregation>,
        by: Vec<String>,
    },
}

impl Command {
    /// Display name used in error context and plan text.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Search { .. } => "search",
            Command::Where { .. } => "where",
            Command::Fields { .. } => "fields",
            Command::Stats { .. } => "stats",
            Command::Sort { .. } => "sort",
            Command::Head { .. } => "head",
            Command::Describe => "describe",
            Command::ShowDatasources => "show datasources",
            Command::Explain => "explain",
            Command::Top { .. } => "top",
            Command::Rare { .. } => "rare",
            Command::Dedup { .. } => "dedup",
            Command::Eval { .. } => "eval",
            Command::Rename { .. } => "rename",
            Command::Replace { .. } => "replace",
            Command::Bin { .. } => "bin",
            Command::Timechart { .. } => "timechart",
            Command::Chart { .. } => "chart",
            Command::Parse { .. } => "parse",
            Command::Rex { .. } => "rex",
            Command::Lookup { .. } => "lookup",
            Command::Append { .. } => "append",
            Command::Join { .. } => "join",
            Command::Reverse => "reverse",
            Command::Flatten { .. } => "flatten",
            Command::Fillnull { .. } => "fillnull",
            Command::Table { .. } => "table",
            Command::Eventstats { .. } => "eventstats",
            Command::Streamstats { .. } => "streamstats",
        }
    }
}

impl Expr {
    pub fn int(v: i64) -> Expr {
        Expr::Literal(Literal::Int(v))
    }

    pub fn float(v: f64) -> Expr {
        Expr::Literal(Literal::Float(v))
    }

    pub fn string(v: impl Into<String>) -> Expr {
        Expr::Literal(Literal::Str(v.into()))
    }

    pub fn boolean(v: bool) -> Expr {
        Expr::Literal(Literal::Bool(v))
    }

    pub fn null() -> Expr {
        Expr::Literal(Literal::Null)
    }

    pub fn field(name: impl Into<String>) -> Expr {
        Expr::Field(name.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
        Expr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// True for bare field references, the only expressions eligible for
    /// sort and projection pushdown.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Expr::Field(name) => Some(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_families_are_disjoint() {
        let all = [
            BinaryOp::Eq,
            BinaryOp::Ne,
            BinaryOp::Lt,
            BinaryOp::Le,
            BinaryOp::Gt,
            BinaryOp::Ge,
            BinaryOp::Like,
            BinaryOp::In,
            BinaryOp::And,
            BinaryOp::Or,
            BinaryOp::Add,
            BinaryOp::Sub,
            BinaryOp::Mul,
            BinaryOp::Div,
            BinaryOp::Mod,
        ];
        for op in all {
            let families = [op.is_comparison(), op.is_logical(), op.is_arithmetic()];
            assert_eq!(
                families.iter().filter(|f| **f).count(),
                1,
                "{op:?} must belong to exactly one family"
            );
        }
    }

    #[test]
    fn expr_builders_nest() {
        let e = Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
            Expr::binary(BinaryOp::Gt, Expr::field("latency"), Expr::float(100.0)),
        );
        match e {
            Expr::Binary { op: BinaryOp::And, left, .. } => match *left {
                Expr::Binary { op: BinaryOp::Eq, .. } => {}
                other => panic!("unexpected left side {other:?}"),
            },
            other => panic!("unexpected expr {other:?}"),
        }
    }

    #[test]
    fn as_field_only_matches_bare_references() {
        assert_eq!(Expr::field("host").as_field(), Some("host"));
        assert_eq!(Expr::int(1).as_field(), None);
        assert_eq!(
            Expr::call("upper", vec![Expr::field("host")]).as_field(),
            None
        );
    }

    #[test]
    fn command_names_for_error_context() {
        let cmd = Command::Stats {
            aggregations: vec![],
            by: vec![],
        };
        assert_eq!(cmd.name(), "stats");
        assert_eq!(Command::Reverse.name(), "reverse");
    }

    #[test]
    fn ast_serde_round_trip() {
        let query = Query::new(vec![
            Command::Search {
                source: "logs".into(),
            },
            Command::Where {
                condition: Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
            },
            Command::Head { count: 10 },
        ]);
        let json = serde_json::to_string(&query).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(query, back);
    }
}
