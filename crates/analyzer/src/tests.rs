use super::*;
use ast::{BinaryOp, Expr, SortKey};
use pretty_assertions::assert_eq;

fn logs_schema() -> Schema {
    let mut schema = Schema::new("logs");
    schema.add_field("status", FieldType::Int);
    schema.add_field("host", FieldType::String);
    schema.add_field("timestamp", FieldType::Date);
    schema.add_field("latency", FieldType::Double);
    schema.add_field("level", FieldType::String);
    schema.add_field("message", FieldType::Text);
    schema
}

fn analyze(commands: Vec<Command>) -> QueryResult<Scope> {
    let schema = logs_schema();
    let registry = FunctionRegistry::builtin();
    Analyzer::new(&schema, &registry).analyze(&Query::new(commands))
}

fn search() -> Command {
    Command::Search {
        source: "logs".into(),
    }
}

fn agg(func: &str, arg: Option<Expr>, alias: &str) -> Aggregation {
    Aggregation {
        func: func.into(),
        arg,
        alias: alias.into(),
    }
}

#[test]
fn empty_query_is_rejected() {
    let err = analyze(vec![]).unwrap_err();
    assert!(err.to_string().contains("no commands"), "{err}");
}

#[test]
fn search_defines_schema_fields() {
    let scope = analyze(vec![search()]).unwrap();
    assert_eq!(scope.resolve("status").unwrap().field_type, FieldType::Int);
    assert_eq!(scope.resolve("host").unwrap().field_type, FieldType::String);
    assert!(scope.resolve("unknown").is_none());
}

#[test]
fn search_requires_a_source() {
    let err = analyze(vec![Command::Search { source: "".into() }]).unwrap_err();
    assert!(err.to_string().contains("search requires a source"), "{err}");
}

#[test]
fn search_on_foreign_source_leaves_scope_empty() {
    let scope = analyze(vec![Command::Search {
        source: "metrics".into(),
    }])
    .unwrap();
    assert!(scope.resolve("status").is_none());
}

#[test]
fn where_requires_boolean_condition() {
    let ok = analyze(vec![
        search(),
        Command::Where {
            condition: Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
        },
    ]);
    assert!(ok.is_ok());

    let err = analyze(vec![
        search(),
        Command::Where {
            condition: Expr::field("status"),
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("non-boolean condition"), "{err}");
}

#[test]
fn errors_carry_command_context() {
    let err = analyze(vec![
        search(),
        Command::Where {
            condition: Expr::field("nope"),
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("command 2 (where)"), "{err}");
}

#[test]
fn fields_requires_at_least_one() {
    let err = analyze(vec![
        search(),
        Command::Fields {
            fields: vec![],
            exclude: false,
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("at least one field"), "{err}");
}

#[test]
fn fields_does_not_narrow_scope() {
    // Dropped names stay referencable; an acknowledged simplification.
    let result = analyze(vec![
        search(),
        Command::Fields {
            fields: vec![Expr::field("host")],
            exclude: false,
        },
        Command::Where {
            condition: Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
        },
    ]);
    assert!(result.is_ok());
}

#[test]
fn stats_installs_child_scope_with_keys_and_aliases() {
    let scope = analyze(vec![
        search(),
        Command::Stats {
            aggregations: vec![agg("count", None, "total")],
            by: vec!["host".into()],
        },
    ])
    .unwrap();

    assert_eq!(scope.resolve("total").unwrap().field_type, FieldType::Long);
    assert_eq!(scope.resolve("host").unwrap().field_type, FieldType::String);
    // The current level holds exactly the group keys and aliases.
    assert_eq!(scope.level_len(), 2);
}

#[test]
fn stats_requires_aggregations() {
    let err = analyze(vec![
        search(),
        Command::Stats {
            aggregations: vec![],
            by: vec![],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("at least one aggregation"), "{err}");
}

#[test]
fn stats_rejects_duplicate_aliases() {
    let err = analyze(vec![
        search(),
        Command::Stats {
            aggregations: vec![
                agg("count", None, "x"),
                agg("sum", Some(Expr::field("latency")), "x"),
            ],
            by: vec![],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("duplicate alias 'x'"), "{err}");
}

#[test]
fn stats_rejects_scalar_functions() {
    let err = analyze(vec![
        search(),
        Command::Stats {
            aggregations: vec![agg("upper", Some(Expr::field("host")), "h")],
            by: vec![],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("not an aggregation"), "{err}");
}

#[test]
fn timechart_requires_span_and_predefines_time() {
    let err = analyze(vec![
        search(),
        Command::Timechart {
            span: None,
            aggregations: vec![agg("count", None, "total")],
            by: vec![],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("requires a span"), "{err}");

    let scope = analyze(vec![
        search(),
        Command::Timechart {
            span: Some(Span {
                value: 5,
                unit: "m".into(),
            }),
            aggregations: vec![agg("count", None, "total")],
            by: vec!["host".into()],
        },
    ])
    .unwrap();
    assert_eq!(scope.resolve("_time").unwrap().field_type, FieldType::Date);
    assert_eq!(scope.resolve("total").unwrap().field_type, FieldType::Long);
}

#[test]
fn sort_requires_comparable_keys() {
    let ok = analyze(vec![
        search(),
        Command::Sort {
            keys: vec![SortKey {
                expr: Expr::field("latency"),
                ascending: false,
            }],
        },
    ]);
    assert!(ok.is_ok());

    let err = analyze(vec![search(), Command::Sort { keys: vec![] }]).unwrap_err();
    assert!(err.to_string().contains("at least one key"), "{err}");
}

#[test]
fn head_requires_positive_count() {
    assert!(analyze(vec![search(), Command::Head { count: 10 }]).is_ok());
    let err = analyze(vec![search(), Command::Head { count: 0 }]).unwrap_err();
    assert!(err.to_string().contains("positive count"), "{err}");
}

#[test]
fn top_installs_child_scope_with_count_and_percent() {
    let scope = analyze(vec![
        search(),
        Command::Top {
            limit: 5,
            fields: vec!["status".into()],
            by: vec![],
            show_count: true,
            show_percent: true,
        },
    ])
    .unwrap();
    assert_eq!(scope.resolve("status").unwrap().field_type, FieldType::Int);
    assert_eq!(scope.resolve("count").unwrap().field_type, FieldType::Long);
    assert_eq!(
        scope.resolve("percent").unwrap().field_type,
        FieldType::Double
    );
}

#[test]
fn top_requires_fields() {
    let err = analyze(vec![
        search(),
        Command::Top {
            limit: 5,
            fields: vec![],
            by: vec![],
            show_count: true,
            show_percent: false,
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("at least one field"), "{err}");
}

#[test]
fn dedup_count_must_be_non_negative() {
    let err = analyze(vec![
        search(),
        Command::Dedup {
            count: -1,
            fields: vec!["host".into()],
            consecutive: false,
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("non-negative"), "{err}");
}

#[test]
fn eval_defines_and_redefines() {
    let scope = analyze(vec![
        search(),
        Command::Eval {
            assignments: vec![
                (
                    "double_latency".into(),
                    Expr::binary(BinaryOp::Mul, Expr::field("latency"), Expr::int(2)),
                ),
                // Redefinition of an existing name is permitted.
                ("double_latency".into(), Expr::string("overwritten")),
            ],
        },
    ])
    .unwrap();
    assert_eq!(
        scope.resolve("double_latency").unwrap().field_type,
        FieldType::String
    );
}

#[test]
fn eval_assignments_see_earlier_ones() {
    let result = analyze(vec![
        search(),
        Command::Eval {
            assignments: vec![
                ("a".into(), Expr::int(1)),
                (
                    "b".into(),
                    Expr::binary(BinaryOp::Add, Expr::field("a"), Expr::int(1)),
                ),
            ],
        },
    ]);
    assert!(result.is_ok());
}

#[test]
fn rename_keeps_old_name_visible() {
    let scope = analyze(vec![
        search(),
        Command::Rename {
            renames: vec![("host".into(), "server".into())],
        },
        // The old name still works afterwards; a product decision.
        Command::Where {
            condition: Expr::binary(BinaryOp::Eq, Expr::field("host"), Expr::string("s1")),
        },
    ])
    .unwrap();
    assert_eq!(scope.resolve("server").unwrap().field_type, FieldType::String);
    assert_eq!(scope.resolve("host").unwrap().field_type, FieldType::String);
    assert_eq!(scope.resolve_field_name("server"), Some("host".into()));
}

#[test]
fn rename_unknown_source_fails() {
    let err = analyze(vec![
        search(),
        Command::Rename {
            renames: vec![("nope".into(), "x".into())],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}

#[test]
fn replace_requires_field_and_mappings() {
    let err = analyze(vec![
        search(),
        Command::Replace {
            field: "host".into(),
            mappings: vec![],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("at least one mapping"), "{err}");
}

#[test]
fn parse_requires_string_like_source() {
    let ok = analyze(vec![
        search(),
        Command::Parse {
            field: "message".into(),
            pattern: r"(?P<code>\d+)".into(),
        },
    ]);
    assert!(ok.is_ok());

    let err = analyze(vec![
        search(),
        Command::Parse {
            field: "status".into(),
            pattern: r"(?P<code>\d+)".into(),
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("string-like"), "{err}");
}

#[test]
fn rex_tolerates_missing_field() {
    let ok = analyze(vec![
        search(),
        Command::Rex {
            field: None,
            pattern: r"(?P<code>\d+)".into(),
        },
    ]);
    assert!(ok.is_ok());
}

#[test]
fn lookup_adds_unknown_typed_outputs() {
    let scope = analyze(vec![
        search(),
        Command::Lookup {
            table: "hosts".into(),
            join_field: "host".into(),
            outputs: vec![("owner".into(), None), ("region".into(), Some("zone".into()))],
        },
    ])
    .unwrap();
    assert_eq!(
        scope.resolve("owner").unwrap().field_type,
        FieldType::Unknown
    );
    assert!(scope.resolve("zone").is_some());
    assert!(scope.resolve("region").is_none());
}

#[test]
fn append_requires_subsearch_starting_with_search() {
    let err = analyze(vec![
        search(),
        Command::Append {
            subsearch: Query::new(vec![Command::Head { count: 1 }]),
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("must start with search"), "{err}");

    let ok = analyze(vec![
        search(),
        Command::Append {
            subsearch: Query::new(vec![Command::Search {
                source: "audit".into(),
            }]),
        },
    ]);
    assert!(ok.is_ok());
}

#[test]
fn join_resolves_its_field() {
    let err = analyze(vec![
        search(),
        Command::Join {
            join_type: ast::JoinType::Left,
            field: "ghost".into(),
            subsearch: Query::new(vec![Command::Search {
                source: "audit".into(),
            }]),
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}

#[test]
fn bin_validates_field_and_width() {
    let err = analyze(vec![
        search(),
        Command::Bin {
            field: "host".into(),
            span: Some(Span {
                value: 30,
                unit: "s".into(),
            }),
            bins: None,
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("numeric or a date"), "{err}");

    let err = analyze(vec![
        search(),
        Command::Bin {
            field: "timestamp".into(),
            span: None,
            bins: None,
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("span or a bin count"), "{err}");
}

#[test]
fn fillnull_accepts_only_field_references() {
    let err = analyze(vec![
        search(),
        Command::Fillnull {
            value: ast::Literal::Int(0),
            fields: vec![Expr::int(1)],
        },
    ])
    .unwrap_err();
    assert!(err.to_string().contains("field references"), "{err}");
}

#[test]
fn eventstats_extends_scope_without_replacing_it() {
    let scope = analyze(vec![
        search(),
        Command::Eventstats {
            aggregations: vec![agg("avg", Some(Expr::field("latency")), "avg_latency")],
            by: vec!["host".into()],
        },
    ])
    .unwrap();
    // Existing columns survive alongside the new alias.
    assert!(scope.resolve("status").is_some());
    assert_eq!(
        scope.resolve("avg_latency").unwrap().field_type,
        FieldType::Double
    );
}

#[test]
fn trivial_commands_validate() {
    assert!(analyze(vec![search(), Command::Reverse]).is_ok());
    assert!(analyze(vec![search(), Command::Describe]).is_ok());
    assert!(analyze(vec![Command::Explain, search()]).is_ok());
}
