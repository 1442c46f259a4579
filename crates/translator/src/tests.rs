use super::*;
use catalog::Schema;
use planner::{PhysicalPlan, PushedAggregation};
use pretty_assertions::assert_eq;

fn scan() -> PhysicalPlan {
    PhysicalPlan::Scan {
        source: "logs".into(),
        schema: Schema::new("logs"),
        filter: None,
        fields: None,
        sort_keys: Vec::new(),
        limit: None,
        computed_fields: Vec::new(),
        aggregation: None,
    }
}

fn with_filter(condition: Expr) -> PhysicalPlan {
    match scan() {
        PhysicalPlan::Scan {
            source,
            schema,
            fields,
            sort_keys,
            limit,
            computed_fields,
            aggregation,
            ..
        } => PhysicalPlan::Scan {
            source,
            schema,
            filter: Some(condition),
            fields,
            sort_keys,
            limit,
            computed_fields,
            aggregation,
        },
        _ => unreachable!(),
    }
}

fn translate(plan: &PhysicalPlan) -> serde_json::Value {
    Translator::new().translate(plan).unwrap()
}

#[test]
fn equality_becomes_term() {
    let plan = with_filter(Expr::binary(
        BinaryOp::Eq,
        Expr::field("status"),
        Expr::int(500),
    ));
    assert_eq!(
        translate(&plan),
        json!({ "query": { "term": { "status": 500 } } })
    );
}

#[test]
fn ordering_becomes_range() {
    let plan = with_filter(Expr::binary(
        BinaryOp::Gt,
        Expr::field("latency"),
        Expr::float(100.0),
    ));
    assert_eq!(
        translate(&plan),
        json!({ "query": { "range": { "latency": { "gt": 100.0 } } } })
    );

    let plan = with_filter(Expr::binary(
        BinaryOp::Le,
        Expr::field("status"),
        Expr::int(499),
    ));
    assert_eq!(
        translate(&plan),
        json!({ "query": { "range": { "status": { "lte": 499 } } } })
    );
}

#[test]
fn conjunction_becomes_bool_must() {
    let plan = with_filter(Expr::binary(
        BinaryOp::And,
        Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
        Expr::binary(BinaryOp::Eq, Expr::field("host"), Expr::string("s1")),
    ));
    assert_eq!(
        translate(&plan),
        json!({
            "query": {
                "bool": {
                    "must": [
                        { "term": { "status": 500 } },
                        { "term": { "host": "s1" } },
                    ]
                }
            }
        })
    );
}

#[test]
fn nested_conjunctions_flatten() {
    let plan = with_filter(Expr::binary(
        BinaryOp::And,
        Expr::binary(
            BinaryOp::And,
            Expr::binary(BinaryOp::Eq, Expr::field("a"), Expr::int(1)),
            Expr::binary(BinaryOp::Eq, Expr::field("b"), Expr::int(2)),
        ),
        Expr::binary(BinaryOp::Eq, Expr::field("c"), Expr::int(3)),
    ));
    let doc = translate(&plan);
    let must = doc["query"]["bool"]["must"].as_array().unwrap();
    assert_eq!(must.len(), 3);
}

#[test]
fn disjunction_becomes_bool_should() {
    let plan = with_filter(Expr::binary(
        BinaryOp::Or,
        Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
        Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(503)),
    ));
    assert_eq!(
        translate(&plan),
        json!({
            "query": {
                "bool": {
                    "should": [
                        { "term": { "status": 500 } },
                        { "term": { "status": 503 } },
                    ],
                    "minimum_should_match": 1,
                }
            }
        })
    );
}

#[test]
fn negation_becomes_must_not() {
    let plan = with_filter(Expr::unary(
        UnaryOp::Not,
        Expr::binary(BinaryOp::Eq, Expr::field("level"), Expr::string("debug")),
    ));
    assert_eq!(
        translate(&plan),
        json!({
            "query": {
                "bool": { "must_not": [ { "term": { "level": "debug" } } ] }
            }
        })
    );
}

#[test]
fn like_becomes_wildcard_with_translated_pattern() {
    let plan = with_filter(Expr::binary(
        BinaryOp::Like,
        Expr::field("host"),
        Expr::string("web-%_1"),
    ));
    assert_eq!(
        translate(&plan),
        json!({ "query": { "wildcard": { "host": "web-*?1" } } })
    );
}

#[test]
fn in_list_becomes_terms() {
    let plan = with_filter(Expr::binary(
        BinaryOp::In,
        Expr::field("status"),
        Expr::List(vec![Expr::int(500), Expr::int(502), Expr::int(503)]),
    ));
    assert_eq!(
        translate(&plan),
        json!({ "query": { "terms": { "status": [500, 502, 503] } } })
    );
}

#[test]
fn missing_filter_emits_match_all() {
    assert_eq!(translate(&scan()), json!({ "query": { "match_all": {} } }));
}

#[test]
fn projection_sort_and_limit_sections() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: Some(vec!["host".into(), "status".into()]),
            sort_keys: vec![
                ast::SortKey {
                    expr: Expr::field("latency"),
                    ascending: false,
                },
                // Complex keys are skipped; the residual sort handles them.
                ast::SortKey {
                    expr: Expr::binary(BinaryOp::Add, Expr::field("status"), Expr::int(1)),
                    ascending: true,
                },
            ],
            limit: Some(10),
            computed_fields: Vec::new(),
            aggregation: None,
        },
        _ => unreachable!(),
    };
    assert_eq!(
        translate(&plan),
        json!({
            "query": { "match_all": {} },
            "_source": ["host", "status"],
            "sort": [ { "latency": { "order": "desc" } } ],
            "size": 10,
        })
    );
}

#[test]
fn grouped_aggregation_tree() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: Some(PushedAggregation::Aggregate {
                group_by: vec!["host".into()],
                aggregations: vec![Aggregation {
                    func: "count".into(),
                    arg: None,
                    alias: "total".into(),
                }],
            }),
        },
        _ => unreachable!(),
    };
    assert_eq!(
        translate(&plan),
        json!({
            "query": { "match_all": {} },
            "size": 0,
            "aggs": {
                "group_by_host": {
                    "terms": { "field": "host" },
                    "aggs": {
                        "total": { "value_count": { "field": "_id" } }
                    }
                }
            }
        })
    );
}

#[test]
fn nested_group_by_and_metric_table() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: Some(PushedAggregation::Aggregate {
                group_by: vec!["host".into(), "level".into()],
                aggregations: vec![
                    Aggregation {
                        func: "avg".into(),
                        arg: Some(Expr::field("latency")),
                        alias: "mean".into(),
                    },
                    Aggregation {
                        func: "dc".into(),
                        arg: Some(Expr::field("status")),
                        alias: "statuses".into(),
                    },
                    Aggregation {
                        func: "stats".into(),
                        arg: Some(Expr::field("latency")),
                        alias: "spread".into(),
                    },
                ],
            }),
        },
        _ => unreachable!(),
    };
    let doc = translate(&plan);
    let inner = &doc["aggs"]["group_by_host"]["aggs"]["group_by_level"]["aggs"];
    assert_eq!(inner["mean"], json!({ "avg": { "field": "latency" } }));
    assert_eq!(inner["statuses"], json!({ "cardinality": { "field": "status" } }));
    assert_eq!(inner["spread"], json!({ "extended_stats": { "field": "latency" } }));
    assert_eq!(doc["size"], json!(0));
}

#[test]
fn top_buckets_order_by_count_desc() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: Some(PushedAggregation::Top {
                fields: vec!["status".into(), "host".into()],
                limit: 2,
                by: vec![],
            }),
        },
        _ => unreachable!(),
    };
    assert_eq!(
        translate(&plan)["aggs"],
        json!({
            "top_status": {
                "terms": {
                    "field": "status",
                    "size": 2,
                    "order": { "_count": "desc" },
                },
                "aggs": {
                    "by_host": {
                        "terms": {
                            "field": "host",
                            "size": 2,
                            "order": { "_count": "desc" },
                        }
                    }
                }
            }
        })
    );
}

#[test]
fn rare_orders_ascending() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: Some(PushedAggregation::Rare {
                fields: vec!["level".into()],
                limit: 3,
                by: vec![],
            }),
        },
        _ => unreachable!(),
    };
    assert_eq!(
        translate(&plan)["aggs"]["top_level"]["terms"]["order"],
        json!({ "_count": "asc" })
    );
}

#[test]
fn bin_spans_use_the_time_unit_table() {
    for (value, unit, expected) in [
        (30, "s", "30s"),
        (5, "m", "5m"),
        (5, "min", "5m"),
        (2, "h", "2h"),
        (1, "day", "1d"),
        (1, "w", "1w"),
        (1, "mon", "1M"),
        (1, "y", "1y"),
    ] {
        let plan = match scan() {
            PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
                source,
                schema,
                filter: None,
                fields: None,
                sort_keys: Vec::new(),
                limit: None,
                computed_fields: Vec::new(),
                aggregation: Some(PushedAggregation::Bin {
                    field: "timestamp".into(),
                    span: Some(ast::Span {
                        value,
                        unit: unit.into(),
                    }),
                    bins: None,
                }),
            },
            _ => unreachable!(),
        };
        assert_eq!(
            translate(&plan)["aggs"]["bin_timestamp"]["date_histogram"]["calendar_interval"],
            json!(expected),
            "unit {unit}"
        );
    }
}

#[test]
fn bin_without_span_uses_auto_histogram() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: Some(PushedAggregation::Bin {
                field: "timestamp".into(),
                span: None,
                bins: Some(12),
            }),
        },
        _ => unreachable!(),
    };
    assert_eq!(
        translate(&plan)["aggs"]["bin_timestamp"],
        json!({ "auto_date_histogram": { "field": "timestamp", "buckets": 12 } })
    );
}

#[test]
fn multi_scan_plans_fail() {
    let plan = PhysicalPlan::Append {
        input: Box::new(scan()),
        subsearch: Box::new(scan()),
    };
    let err = Translator::new().translate(&plan).unwrap_err();
    assert!(err.to_string().contains("exactly one scan"), "{err}");
}

#[test]
fn no_scan_fails() {
    let plan = PhysicalPlan::Limit {
        input: Box::new(PhysicalPlan::Reverse {
            input: Box::new(scan()),
        }),
        count: 1,
    };
    // One scan through residual operators is fine.
    assert!(Translator::new().translate(&plan).is_ok());
}

struct StubBuilder;

impl FunctionBuilder for StubBuilder {
    fn build(&self, field: &str, _expr: &Expr) -> QueryResult<UdfReference> {
        Ok(UdfReference {
            name: format!("udf_{field}"),
            version: "1.0.0".into(),
            parameters: json!({}),
            field_bindings: vec!["price".into(), "qty".into()],
        })
    }
}

#[test]
fn computed_fields_emit_script_fields_with_builder() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: None,
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: vec![(
                "total".into(),
                Expr::binary(BinaryOp::Mul, Expr::field("price"), Expr::field("qty")),
            )],
            aggregation: None,
        },
        _ => unreachable!(),
    };

    let builder = StubBuilder;
    let doc = Translator::with_function_builder(&builder)
        .translate(&plan)
        .unwrap();
    assert_eq!(
        doc["script_fields"]["total"],
        json!({
            "wasm_udf": {
                "name": "udf_total",
                "version": "1.0.0",
                "parameters": {},
                "field_bindings": ["price", "qty"],
            }
        })
    );

    // Without the collaborator the section is absent.
    let doc = Translator::new().translate(&plan).unwrap();
    assert!(doc.get("script_fields").is_none());
}

#[test]
fn full_document_snapshot() {
    let plan = match scan() {
        PhysicalPlan::Scan { source, schema, .. } => PhysicalPlan::Scan {
            source,
            schema,
            filter: Some(Expr::binary(
                BinaryOp::And,
                Expr::binary(BinaryOp::Eq, Expr::field("status"), Expr::int(500)),
                Expr::binary(BinaryOp::Gt, Expr::field("latency"), Expr::int(100)),
            )),
            fields: None,
            sort_keys: Vec::new(),
            limit: None,
            computed_fields: Vec::new(),
            aggregation: Some(PushedAggregation::Aggregate {
                group_by: vec!["host".into()],
                aggregations: vec![Aggregation {
                    func: "count".into(),
                    arg: None,
                    alias: "total".into(),
                }],
            }),
        },
        _ => unreachable!(),
    };
    insta::assert_json_snapshot!(translate(&plan));
}
