use indexmap::IndexMap;
use std::cmp::Ordering;

/// Semantic type of a dataset field or an inferred expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FieldType {
    /// "Any; do not constrain" — the type of NULL literals and of
    /// dynamically-typed outputs such as `cast`.
    Unknown,
    Bool,
    Int,
    Long,
    Float,
    Double,
    String,
    Text,
    Keyword,
    Date,
    Object,
    Array,
    GeoPoint,
    Ip,
}

impl FieldType {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            FieldType::Int | FieldType::Long | FieldType::Float | FieldType::Double
        )
    }

    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Text | FieldType::Keyword
        )
    }

    /// Types that admit ordering comparisons. `Object` is never comparable.
    pub fn is_comparable(self) -> bool {
        self.is_numeric() || self.is_string_like() || matches!(self, FieldType::Bool | FieldType::Date)
    }

    /// Numeric widening rank: Int < Long < Float < Double.
    fn numeric_rank(self) -> Option<u8> {
        match self {
            FieldType::Int => Some(0),
            FieldType::Long => Some(1),
            FieldType::Float => Some(2),
            FieldType::Double => Some(3),
            _ => None,
        }
    }

    /// Widest of two numeric types in the promotion order, or None when
    /// either side is not numeric.
    pub fn promote(a: FieldType, b: FieldType) -> Option<FieldType> {
        let (ra, rb) = (a.numeric_rank()?, b.numeric_rank()?);
        Some(if ra >= rb { a } else { b })
    }

    /// Common type used to unify CASE branches: same type → itself, two
    /// numerics → promotion, two string-likes → String, otherwise none.
    pub fn common_type(a: FieldType, b: FieldType) -> Option<FieldType> {
        if a == b {
            return Some(a);
        }
        if a.is_numeric() && b.is_numeric() {
            return FieldType::promote(a, b);
        }
        if a.is_string_like() && b.is_string_like() {
            return Some(FieldType::String);
        }
        None
    }
}

/// Dynamic value flowing through execution rows.
///
/// Type erasure is deliberate: hits come back from the backend as
/// schemaless JSON, so every accessor is fallible with best-effort
/// coercion.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort string view: scalars render, containers do not.
    pub fn as_str_coerced(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Str(s) => match s.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Truthiness used by logical operators: NULL is false, numbers are
    /// non-zero, strings and containers are non-empty.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(m) => !m.is_empty(),
        }
    }

    /// Typed ordering: numeric-numeric and string-string compare
    /// directly, bools compare as bools. Mixed or container operands are
    /// incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            _ => None,
        }
    }

    /// Equality with the runtime's mixed-type tolerance: same-family
    /// operands compare directly, otherwise both sides are coerced to
    /// strings. NULL is equal to nothing.
    pub fn eq_coerced(&self, other: &Value) -> bool {
        if self.is_null() || other.is_null() {
            return false;
        }
        if let Some(ord) = self.compare(other) {
            return ord == Ordering::Equal;
        }
        match (self.as_str_coerced(), other.as_str_coerced()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn from_json(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(a) => {
                Value::Array(a.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(m) => Value::Object(
                m.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => {
                serde_json::Number::from_f64(*f).map_or(serde_json::Value::Null, serde_json::Value::Number)
            }
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_json).collect()),
            Value::Object(m) => serde_json::Value::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}
