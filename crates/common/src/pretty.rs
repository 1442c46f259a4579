use crate::Row;
use tabled::{Table, builder::Builder, settings};
use types::Value;

/// Predefined output styles that map to `tabled` styles.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TableStyleKind {
    #[default]
    Modern,
    Ascii,
    Plain,
}

impl TableStyleKind {
    fn apply(self, table: &mut Table) {
        match self {
            Self::Modern => table.with(settings::Style::modern()),
            Self::Ascii => table.with(settings::Style::ascii()),
            Self::Plain => table.with(settings::Style::empty()),
        };
    }
}

/// Render result rows into a human-friendly table string.
///
/// Column headers are the union of field names across all rows, in
/// first-seen order; fields absent from a row render as NULL.
pub fn render_rows(rows: &[Row], style: TableStyleKind) -> String {
    if rows.is_empty() {
        return "<empty>".into();
    }

    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for field in row.fields() {
            if !columns.iter().any(|c| c == field) {
                columns.push(field.to_string());
            }
        }
    }

    let mut builder = Builder::default();
    builder.push_record(columns.iter().cloned());
    for row in rows {
        builder.push_record(
            columns
                .iter()
                .map(|c| row.get(c).map_or_else(|| "NULL".into(), format_value)),
        );
    }

    let mut table = builder.build();
    style.apply(&mut table);
    table.to_string()
}

/// Format a single value for display.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Str(text) => format!("'{text}'"),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(&value.to_json()).unwrap_or_else(|_| "<opaque>".into())
        }
    }
}
