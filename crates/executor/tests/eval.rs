use ast::{BinaryOp, Expr, UnaryOp};
use common::Row;
use executor::evaluate;
use types::Value;

use pretty_assertions::assert_eq;

fn row() -> Row {
    let mut row = Row::new();
    row.set("price", Value::Int(100));
    row.set("qty", Value::Int(5));
    row.set("rate", Value::Float(2.5));
    row.set("host", Value::Str("Web-01".into()));
    row.set("missing_is_null", Value::Null);
    row
}

fn eval(expr: &Expr) -> Value {
    evaluate(expr, &row()).unwrap()
}

#[test]
fn field_lookup_defaults_to_null() {
    assert_eq!(eval(&Expr::field("ghost")), Value::Null);
    assert_eq!(eval(&Expr::field("price")), Value::Int(100));
}

#[test]
fn integer_arithmetic_stays_integer() {
    let e = Expr::binary(BinaryOp::Mul, Expr::field("price"), Expr::field("qty"));
    assert_eq!(eval(&e), Value::Int(500));

    let div = Expr::binary(BinaryOp::Div, Expr::int(7), Expr::int(2));
    assert_eq!(eval(&div), Value::Int(3));
}

#[test]
fn mixed_arithmetic_coerces_to_float() {
    let e = Expr::binary(BinaryOp::Mul, Expr::field("price"), Expr::field("rate"));
    assert_eq!(eval(&e), Value::Float(250.0));
}

#[test]
fn null_operand_propagates_through_arithmetic() {
    let e = Expr::binary(BinaryOp::Add, Expr::field("ghost"), Expr::int(1));
    assert_eq!(eval(&e), Value::Null);
}

#[test]
fn division_by_zero_is_an_error() {
    let e = Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(0));
    let err = evaluate(&e, &row()).unwrap_err();
    assert!(err.to_string().contains("division by zero"), "{err}");

    let e = Expr::binary(BinaryOp::Mod, Expr::float(1.0), Expr::float(0.0));
    assert!(evaluate(&e, &row()).is_err());
}

#[test]
fn null_comparison_is_false() {
    let e = Expr::binary(BinaryOp::Eq, Expr::field("ghost"), Expr::field("ghost"));
    assert_eq!(eval(&e), Value::Bool(false));
    let e = Expr::binary(BinaryOp::Lt, Expr::null(), Expr::int(1));
    assert_eq!(eval(&e), Value::Bool(false));
}

#[test]
fn equality_coerces_across_families() {
    let e = Expr::binary(BinaryOp::Eq, Expr::field("price"), Expr::string("100"));
    assert_eq!(eval(&e), Value::Bool(true));
    // Ordering across families is false rather than coerced.
    let e = Expr::binary(BinaryOp::Lt, Expr::field("price"), Expr::string("200"));
    assert_eq!(eval(&e), Value::Bool(false));
}

#[test]
fn logic_short_circuits_on_truthiness() {
    // Right side would divide by zero; short-circuit avoids it.
    let e = Expr::binary(
        BinaryOp::And,
        Expr::boolean(false),
        Expr::binary(BinaryOp::Div, Expr::int(1), Expr::int(0)),
    );
    assert_eq!(eval(&e), Value::Bool(false));

    let e = Expr::binary(BinaryOp::Or, Expr::int(1), Expr::boolean(false));
    assert_eq!(eval(&e), Value::Bool(true));
}

#[test]
fn like_translates_wildcards() {
    let e = Expr::binary(BinaryOp::Like, Expr::field("host"), Expr::string("Web-%"));
    assert_eq!(eval(&e), Value::Bool(true));
    let e = Expr::binary(BinaryOp::Like, Expr::field("host"), Expr::string("Web-0_"));
    assert_eq!(eval(&e), Value::Bool(true));
    let e = Expr::binary(BinaryOp::Like, Expr::field("host"), Expr::string("db-%"));
    assert_eq!(eval(&e), Value::Bool(false));
}

#[test]
fn in_membership_uses_coerced_equality() {
    let e = Expr::binary(
        BinaryOp::In,
        Expr::field("price"),
        Expr::List(vec![Expr::int(99), Expr::int(100)]),
    );
    assert_eq!(eval(&e), Value::Bool(true));
}

#[test]
fn unary_operators() {
    assert_eq!(eval(&Expr::unary(UnaryOp::Not, Expr::int(0))), Value::Bool(true));
    assert_eq!(
        eval(&Expr::unary(UnaryOp::Neg, Expr::field("rate"))),
        Value::Float(-2.5)
    );
    assert_eq!(eval(&Expr::unary(UnaryOp::Neg, Expr::null())), Value::Null);
}

#[test]
fn string_functions() {
    assert_eq!(
        eval(&Expr::call("upper", vec![Expr::field("host")])),
        Value::Str("WEB-01".into())
    );
    assert_eq!(
        eval(&Expr::call(
            "concat",
            vec![Expr::field("host"), Expr::string(":"), Expr::field("price")]
        )),
        Value::Str("Web-01:100".into())
    );
    assert_eq!(
        eval(&Expr::call(
            "substring",
            vec![Expr::string("pipeline"), Expr::int(1), Expr::int(4)]
        )),
        Value::Str("pipe".into())
    );
    assert_eq!(
        eval(&Expr::call("trim", vec![Expr::string("  x  ")])),
        Value::Str("x".into())
    );
    assert_eq!(
        eval(&Expr::call("length", vec![Expr::field("host")])),
        Value::Int(6)
    );
}

#[test]
fn math_functions() {
    assert_eq!(eval(&Expr::call("abs", vec![Expr::int(-3)])), Value::Int(3));
    assert_eq!(
        eval(&Expr::call("round", vec![Expr::float(2.6)])),
        Value::Int(3)
    );
    assert_eq!(
        eval(&Expr::call("floor", vec![Expr::float(2.9)])),
        Value::Int(2)
    );
    assert_eq!(
        eval(&Expr::call("ceil", vec![Expr::float(2.1)])),
        Value::Int(3)
    );
    assert_eq!(
        eval(&Expr::call("sqrt", vec![Expr::int(16)])),
        Value::Float(4.0)
    );
    assert_eq!(
        eval(&Expr::call("pow", vec![Expr::int(2), Expr::int(10)])),
        Value::Float(1024.0)
    );
}

#[test]
fn date_parts_parse_rfc3339_and_epoch() {
    let e = Expr::call("year", vec![Expr::string("2024-03-05T10:20:30Z")]);
    assert_eq!(eval(&e), Value::Int(2024));
    let e = Expr::call("month", vec![Expr::string("2024-03-05 10:20:30")]);
    assert_eq!(eval(&e), Value::Int(3));
    let e = Expr::call("day", vec![Expr::string("not a date")]);
    assert_eq!(eval(&e), Value::Null);
}

#[test]
fn cast_converts_dynamically() {
    let e = Expr::call("cast", vec![Expr::string("42"), Expr::string("int")]);
    assert_eq!(eval(&e), Value::Int(42));
    let e = Expr::call("cast", vec![Expr::int(1), Expr::string("string")]);
    assert_eq!(eval(&e), Value::Str("1".into()));
    let e = Expr::call("cast", vec![Expr::int(1), Expr::string("mystery")]);
    assert!(evaluate(&e, &row()).is_err());
}

#[test]
fn aggregates_are_rejected_in_scalar_position() {
    let e = Expr::call("count", vec![]);
    let err = evaluate(&e, &row()).unwrap_err();
    assert!(err.to_string().contains("inside an aggregation"), "{err}");
}

#[test]
fn unknown_function_is_a_runtime_error() {
    let err = evaluate(&Expr::call("mystery", vec![]), &row()).unwrap_err();
    assert!(err.to_string().contains("unknown function"), "{err}");
}

#[test]
fn case_returns_first_true_branch() {
    let e = Expr::Case {
        whens: vec![
            ast::WhenClause {
                condition: Expr::binary(BinaryOp::Gt, Expr::field("price"), Expr::int(1000)),
                then: Expr::string("expensive"),
            },
            ast::WhenClause {
                condition: Expr::binary(BinaryOp::Gt, Expr::field("price"), Expr::int(50)),
                then: Expr::string("medium"),
            },
        ],
        else_: Some(Box::new(Expr::string("cheap"))),
    };
    assert_eq!(eval(&e), Value::Str("medium".into()));
}

#[test]
fn case_without_match_or_else_is_null() {
    let e = Expr::Case {
        whens: vec![ast::WhenClause {
            condition: Expr::boolean(false),
            then: Expr::int(1),
        }],
        else_: None,
    };
    assert_eq!(eval(&e), Value::Null);
}
