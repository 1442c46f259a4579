//! Row and schema builders shared across crates.

use catalog::Schema;
use common::Row;
use types::{FieldType, Value};

/// Build a row from integer fields, in order.
pub fn int_row(fields: &[(&str, i64)]) -> Row {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Int(*value)))
        .collect()
}

/// Build a row from string fields, in order.
pub fn str_row(fields: &[(&str, &str)]) -> Row {
    fields
        .iter()
        .map(|(name, value)| (name.to_string(), Value::Str(value.to_string())))
        .collect()
}

/// Build a row from arbitrary values, in order.
pub fn kv_row(fields: Vec<(&str, Value)>) -> Row {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// The canonical test dataset schema.
pub fn logs_schema() -> Schema {
    let mut schema = Schema::new("logs");
    schema.add_field("status", FieldType::Int);
    schema.add_field("host", FieldType::String);
    schema.add_field("timestamp", FieldType::Date);
    schema.add_field("latency", FieldType::Double);
    schema.add_field("level", FieldType::String);
    schema.add_field("message", FieldType::Text);
    schema
}
