//! Row-level expression evaluator shared by filter, eval, sort keys,
//! and aggregation arguments.
//!
//! Null handling follows two-valued logic: arithmetic on a Null operand
//! yields Null, comparisons involving Null yield false, and logical
//! operands go through truthiness (Null is false).

use ast::{BinaryOp, Expr, Literal, UnaryOp};
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use common::{QueryError, QueryResult, Row};
use types::Value;

/// Evaluate an expression against one row. Missing fields evaluate to
/// Null rather than failing; runtime failures are reserved for actual
/// evaluation errors such as division by zero.
pub fn evaluate(expr: &Expr, row: &Row) -> QueryResult<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Field(name) => Ok(row.get_path(name).cloned().unwrap_or(Value::Null)),
        Expr::Binary { op, left, right } => eval_binary(*op, left, right, row),
        Expr::Unary { op, expr } => eval_unary(*op, expr, row),
        Expr::Call { name, args } => {
            let values = args
                .iter()
                .map(|a| evaluate(a, row))
                .collect::<QueryResult<Vec<_>>>()?;
            call_function(name, &values)
        }
        Expr::Case { whens, else_ } => {
            for when in whens {
                if evaluate(&when.condition, row)?.truthy() {
                    return evaluate(&when.then, row);
                }
            }
            match else_ {
                Some(else_) => evaluate(else_, row),
                None => Ok(Value::Null),
            }
        }
        Expr::List(values) => {
            let values = values
                .iter()
                .map(|v| evaluate(v, row))
                .collect::<QueryResult<Vec<_>>>()?;
            Ok(Value::Array(values))
        }
    }
}

pub fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Int(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::Str(v) => Value::Str(v.clone()),
        Literal::Bool(v) => Value::Bool(*v),
        Literal::Null => Value::Null,
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, row: &Row) -> QueryResult<Value> {
    if op.is_logical() {
        // Short-circuit on truthiness; Null is false.
        let lhs = evaluate(left, row)?.truthy();
        return Ok(Value::Bool(match op {
            BinaryOp::And => lhs && evaluate(right, row)?.truthy(),
            _ => lhs || evaluate(right, row)?.truthy(),
        }));
    }

    let lhs = evaluate(left, row)?;

    if op == BinaryOp::In {
        let rhs = evaluate(right, row)?;
        let members = match rhs {
            Value::Array(values) => values,
            other => vec![other],
        };
        return Ok(Value::Bool(members.iter().any(|m| lhs.eq_coerced(m))));
    }

    let rhs = evaluate(right, row)?;

    if op.is_arithmetic() {
        return eval_arithmetic(op, &lhs, &rhs);
    }

    // Comparisons involving Null are false.
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(match op {
        BinaryOp::Eq => lhs.eq_coerced(&rhs),
        BinaryOp::Ne => !lhs.eq_coerced(&rhs),
        BinaryOp::Like => eval_like(&lhs, &rhs)?,
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            // Mixed-family ordering yields false.
            match lhs.compare(&rhs) {
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
                None => false,
            }
        }
        other => {
            return Err(QueryError::Runtime(format!(
                "operator {other:?} is not evaluable"
            )));
        }
    }))
}

/// Integer arithmetic is preserved only when both operands are
/// integers; otherwise both sides coerce to Float64.
fn eval_arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> QueryResult<Value> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return Ok(Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(*b),
            BinaryOp::Sub => a.wrapping_sub(*b),
            BinaryOp::Mul => a.wrapping_mul(*b),
            BinaryOp::Div => {
                if *b == 0 {
                    return Err(QueryError::Runtime("division by zero".into()));
                }
                a / b
            }
            BinaryOp::Mod => {
                if *b == 0 {
                    return Err(QueryError::Runtime("division by zero".into()));
                }
                a % b
            }
            other => {
                return Err(QueryError::Runtime(format!(
                    "operator {other:?} is not arithmetic"
                )));
            }
        }));
    }

    let (a, b) = match (lhs.as_f64(), rhs.as_f64()) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(QueryError::Runtime(format!(
                "cannot apply {op:?} to {lhs:?} and {rhs:?}"
            )));
        }
    };
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => {
            if b == 0.0 {
                return Err(QueryError::Runtime("division by zero".into()));
            }
            a / b
        }
        BinaryOp::Mod => {
            if b == 0.0 {
                return Err(QueryError::Runtime("division by zero".into()));
            }
            a % b
        }
        other => {
            return Err(QueryError::Runtime(format!(
                "operator {other:?} is not arithmetic"
            )));
        }
    }))
}

fn eval_like(value: &Value, pattern: &Value) -> QueryResult<bool> {
    let (Some(value), Some(pattern)) = (value.as_str_coerced(), pattern.as_str_coerced()) else {
        return Ok(false);
    };
    let regex = like_to_regex(&pattern)?;
    Ok(regex.is_match(&value))
}

/// Translate a LIKE pattern (`%` any run, `_` one character) into an
/// anchored regex.
fn like_to_regex(pattern: &str) -> QueryResult<regex::Regex> {
    let mut translated = String::with_capacity(pattern.len() + 2);
    translated.push('^');
    for ch in pattern.chars() {
        match ch {
            '%' => translated.push_str(".*"),
            '_' => translated.push('.'),
            other => translated.push_str(&regex::escape(&other.to_string())),
        }
    }
    translated.push('$');
    regex::Regex::new(&translated)
        .map_err(|e| QueryError::Runtime(format!("invalid LIKE pattern: {e}")))
}

fn eval_unary(op: UnaryOp, expr: &Expr, row: &Row) -> QueryResult<Value> {
    let value = evaluate(expr, row)?;
    Ok(match op {
        UnaryOp::Not => Value::Bool(!value.truthy()),
        UnaryOp::Plus => match value {
            Value::Int(_) | Value::Float(_) | Value::Null => value,
            other => {
                return Err(QueryError::Runtime(format!(
                    "unary plus requires a number, got {other:?}"
                )));
            }
        },
        UnaryOp::Neg => match value {
            Value::Int(v) => Value::Int(-v),
            Value::Float(v) => Value::Float(-v),
            Value::Null => Value::Null,
            other => {
                return Err(QueryError::Runtime(format!(
                    "cannot negate {other:?}"
                )));
            }
        },
    })
}

/// Names the runtime dispatches, aggregation accumulators included.
/// Must stay in lockstep with the analyzer's registry; a mismatch is a
/// programming bug caught by tests.
pub fn runtime_function_names() -> Vec<&'static str> {
    vec![
        "count", "sum", "avg", "mean", "stddev", "variance", "percentile", "percentiles", "min",
        "max", "dc", "stats", "sqrt", "pow", "exp", "log", "ln", "abs", "round", "ceil", "floor",
        "concat", "substring", "upper", "lower", "trim", "length", "year", "month", "day", "hour",
        "minute", "second", "now", "curdate", "curtime", "cast", "convert",
    ]
}

const AGGREGATE_ONLY: &[&str] = &[
    "count", "sum", "avg", "mean", "stddev", "variance", "percentile", "percentiles", "min",
    "max", "dc", "stats",
];

fn call_function(name: &str, args: &[Value]) -> QueryResult<Value> {
    if AGGREGATE_ONLY.contains(&name) {
        return Err(QueryError::Runtime(format!(
            "'{name}' is only valid inside an aggregation"
        )));
    }
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Null);
    Ok(match name {
        "abs" => match arg(0) {
            Value::Int(v) => Value::Int(v.abs()),
            Value::Null => Value::Null,
            other => other.as_f64().map(|f| Value::Float(f.abs())).unwrap_or(Value::Null),
        },
        "round" => match (arg(0).as_f64(), args.len()) {
            (Some(v), 1) => Value::Int(v.round() as i64),
            (Some(v), _) => {
                let digits = arg(1).as_i64().unwrap_or(0);
                let factor = 10f64.powi(digits as i32);
                Value::Float((v * factor).round() / factor)
            }
            (None, _) => Value::Null,
        },
        "ceil" => float_to_int(arg(0), f64::ceil),
        "floor" => float_to_int(arg(0), f64::floor),
        "sqrt" => float_fn(arg(0), f64::sqrt),
        "exp" => float_fn(arg(0), f64::exp),
        "ln" => float_fn(arg(0), f64::ln),
        "log" => match (arg(0).as_f64(), args.len()) {
            (Some(v), 1) => Value::Float(v.log10()),
            (Some(v), _) => match arg(1).as_f64() {
                Some(base) => Value::Float(v.log(base)),
                None => Value::Null,
            },
            (None, _) => Value::Null,
        },
        "pow" => match (arg(0).as_f64(), arg(1).as_f64()) {
            (Some(base), Some(exp)) => Value::Float(base.powf(exp)),
            _ => Value::Null,
        },
        "upper" => string_fn(arg(0), |s| s.to_uppercase()),
        "lower" => string_fn(arg(0), |s| s.to_lowercase()),
        "trim" => string_fn(arg(0), |s| s.trim().to_string()),
        "concat" => {
            let mut out = String::new();
            for value in args {
                if let Some(s) = value.as_str_coerced() {
                    out.push_str(&s);
                }
            }
            Value::Str(out)
        }
        "substring" => match arg(0).as_str_coerced() {
            Some(s) => {
                // 1-based start position, SQL style.
                let start = arg(1).as_i64().unwrap_or(1).max(1) as usize - 1;
                let chars: Vec<char> = s.chars().collect();
                let end = match args.get(2).and_then(Value::as_i64) {
                    Some(len) if len >= 0 => (start + len as usize).min(chars.len()),
                    _ => chars.len(),
                };
                if start >= chars.len() {
                    Value::Str(String::new())
                } else {
                    Value::Str(chars[start..end].iter().collect())
                }
            }
            None => Value::Null,
        },
        "length" => match arg(0) {
            Value::Str(s) => Value::Int(s.chars().count() as i64),
            Value::Array(a) => Value::Int(a.len() as i64),
            _ => Value::Null,
        },
        "year" => date_part(arg(0), |d| d.year() as i64),
        "month" => date_part(arg(0), |d| d.month() as i64),
        "day" => date_part(arg(0), |d| d.day() as i64),
        "hour" => date_part(arg(0), |d| d.hour() as i64),
        "minute" => date_part(arg(0), |d| d.minute() as i64),
        "second" => date_part(arg(0), |d| d.second() as i64),
        "now" => Value::Str(Utc::now().to_rfc3339()),
        "curdate" => Value::Str(Utc::now().date_naive().to_string()),
        "curtime" => Value::Str(Utc::now().time().format("%H:%M:%S").to_string()),
        "cast" | "convert" => {
            let target = arg(1).as_str_coerced().unwrap_or_default();
            cast_value(arg(0), &target)?
        }
        other => {
            return Err(QueryError::Runtime(format!("unknown function '{other}'")));
        }
    })
}

fn float_fn(value: Value, f: impl Fn(f64) -> f64) -> Value {
    value.as_f64().map(|v| Value::Float(f(v))).unwrap_or(Value::Null)
}

fn float_to_int(value: Value, f: impl Fn(f64) -> f64) -> Value {
    value
        .as_f64()
        .map(|v| Value::Int(f(v) as i64))
        .unwrap_or(Value::Null)
}

fn string_fn(value: Value, f: impl Fn(&str) -> String) -> Value {
    value
        .as_str_coerced()
        .map(|s| Value::Str(f(&s)))
        .unwrap_or(Value::Null)
}

fn date_part(value: Value, f: impl Fn(&DateTime<Utc>) -> i64) -> Value {
    parse_date(&value).map(|d| Value::Int(f(&d))).unwrap_or(Value::Null)
}

/// Dates flow through rows as RFC 3339 strings or epoch milliseconds.
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Str(s) => DateTime::parse_from_rfc3339(s)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|d| d.and_utc())
            }),
        Value::Int(millis) => DateTime::from_timestamp_millis(*millis),
        _ => None,
    }
}

fn cast_value(value: Value, target: &str) -> QueryResult<Value> {
    Ok(match target.to_ascii_lowercase().as_str() {
        "int" | "long" => value.as_i64().map(Value::Int).unwrap_or(Value::Null),
        "float" | "double" => value.as_f64().map(Value::Float).unwrap_or(Value::Null),
        "string" => value.as_str_coerced().map(Value::Str).unwrap_or(Value::Null),
        "bool" | "boolean" => value.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        other => {
            return Err(QueryError::Runtime(format!(
                "unknown cast target '{other}'"
            )));
        }
    })
}

