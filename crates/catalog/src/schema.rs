use crate::Map;
use common::{QueryError, QueryResult};
use serde::{Deserialize, Serialize};
use types::FieldType;

/// One field of a source dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub array: bool,
    /// Sub-fields keyed by child name; only populated for `Object`.
    pub sub_fields: Map<String, Field>,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: true,
            array: false,
            sub_fields: Map::default(),
        }
    }

    pub fn object(name: impl Into<String>, children: Vec<Field>) -> Self {
        let sub_fields = children
            .into_iter()
            .map(|f| (f.name.clone(), f))
            .collect();
        Self {
            name: name.into(),
            field_type: FieldType::Object,
            nullable: true,
            array: false,
            sub_fields,
        }
    }

    pub fn array_of(name: impl Into<String>, element_type: FieldType) -> Self {
        let mut field = Field::new(name, element_type);
        field.array = true;
        field
    }

    /// Walk a dot path below this field. Fails when an intermediate is
    /// not an object or a segment is absent.
    fn lookup(&self, segments: &[&str]) -> QueryResult<&Field> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(self);
        };
        if self.field_type != FieldType::Object {
            return Err(QueryError::Schema(format!(
                "field '{}' is not an object, cannot descend into '{head}'",
                self.name
            )));
        }
        let child = self.sub_fields.get(*head).ok_or_else(|| {
            QueryError::Schema(format!(
                "unknown sub-field '{head}' under object '{}'",
                self.name
            ))
        })?;
        child.lookup(rest)
    }
}

/// Catalog of fields for a named source dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub source: String,
    fields: Vec<Field>,
    #[serde(skip)]
    #[serde(default)]
    field_index: Map<String, usize>,
}

impl Schema {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            fields: Vec::new(),
            field_index: Map::default(),
        }
    }

    /// Add or replace a top-level field.
    pub fn add_field(&mut self, name: impl Into<String>, field_type: FieldType) {
        self.add(Field::new(name, field_type));
    }

    pub fn add_object(&mut self, name: impl Into<String>, children: Vec<Field>) {
        self.add(Field::object(name, children));
    }

    pub fn add_array(&mut self, name: impl Into<String>, element_type: FieldType) {
        self.add(Field::array_of(name, element_type));
    }

    pub fn add(&mut self, field: Field) {
        match self.field_index.get(&field.name) {
            Some(&idx) => self.fields[idx] = field,
            None => {
                self.field_index.insert(field.name.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
    }

    /// Exact top-level lookup.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.field_index.get(name).map(|&idx| &self.fields[idx])
    }

    /// Dot-path lookup walking object sub-fields.
    pub fn lookup(&self, path: &str) -> QueryResult<&Field> {
        if let Some(field) = self.field(path) {
            return Ok(field);
        }
        let segments: Vec<&str> = path.split('.').collect();
        let (head, rest) = segments
            .split_first()
            .ok_or_else(|| QueryError::Schema("empty field path".into()))?;
        let root = self
            .field(head)
            .ok_or_else(|| QueryError::Schema(format!("unknown field '{path}'")))?;
        root.lookup(rest)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup(path).is_ok()
    }

    /// Union of two schemas; on a name conflict the other schema wins.
    pub fn merge(&mut self, other: &Schema) {
        for field in &other.fields {
            self.add(field.clone());
        }
    }

    /// New schema keeping only the named fields, in the given order.
    pub fn project(&self, names: &[String]) -> QueryResult<Schema> {
        let mut projected = Schema::new(self.source.clone());
        for name in names {
            let field = self
                .field(name)
                .ok_or_else(|| QueryError::Schema(format!("unknown field '{name}'")))?;
            projected.add(field.clone());
        }
        Ok(projected)
    }

    pub fn remove(&mut self, name: &str) {
        if let Some(idx) = self.field_index.remove(name) {
            self.fields.remove(idx);
            self.rebuild_index();
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn rebuild_index(&mut self) {
        self.field_index.clear();
        for (idx, field) in self.fields.iter().enumerate() {
            self.field_index.insert(field.name.clone(), idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn logs_schema() -> Schema {
        let mut schema = Schema::new("logs");
        schema.add_field("status", FieldType::Int);
        schema.add_field("host", FieldType::String);
        schema.add_field("timestamp", FieldType::Date);
        schema.add_object(
            "geo",
            vec![
                Field::new("lat", FieldType::Double),
                Field::object("city", vec![Field::new("name", FieldType::Keyword)]),
            ],
        );
        schema
    }

    #[test]
    fn lookup_top_level() {
        let schema = logs_schema();
        assert_eq!(schema.lookup("status").unwrap().field_type, FieldType::Int);
        assert!(schema.lookup("nope").is_err());
    }

    #[test]
    fn lookup_walks_dot_paths() {
        let schema = logs_schema();
        assert_eq!(
            schema.lookup("geo.lat").unwrap().field_type,
            FieldType::Double
        );
        assert_eq!(
            schema.lookup("geo.city.name").unwrap().field_type,
            FieldType::Keyword
        );
    }

    #[test]
    fn lookup_fails_through_non_object() {
        let schema = logs_schema();
        let err = schema.lookup("status.code").unwrap_err();
        assert!(err.to_string().contains("not an object"), "{err}");

        let err = schema.lookup("geo.altitude").unwrap_err();
        assert!(err.to_string().contains("unknown sub-field"), "{err}");
    }

    #[test]
    fn merge_second_wins_on_conflict() {
        let mut left = logs_schema();
        let mut right = Schema::new("other");
        right.add_field("status", FieldType::Keyword);
        right.add_field("extra", FieldType::Long);

        left.merge(&right);
        assert_eq!(left.lookup("status").unwrap().field_type, FieldType::Keyword);
        assert_eq!(left.lookup("extra").unwrap().field_type, FieldType::Long);
        // Position of the overwritten field is preserved.
        assert_eq!(left.field_names().next(), Some("status"));
    }

    #[test]
    fn project_keeps_only_named_fields() {
        let schema = logs_schema();
        let projected = schema
            .project(&["host".to_string(), "status".to_string()])
            .unwrap();
        let names: Vec<&str> = projected.field_names().collect();
        assert_eq!(names, vec!["host", "status"]);

        assert!(schema.project(&["missing".to_string()]).is_err());
    }

    #[test]
    fn remove_rebuilds_index() {
        let mut schema = logs_schema();
        schema.remove("host");
        assert!(schema.lookup("host").is_err());
        assert!(schema.lookup("timestamp").is_ok());
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn add_replaces_in_place() {
        let mut schema = logs_schema();
        let before = schema.len();
        schema.add_field("status", FieldType::Long);
        assert_eq!(schema.len(), before);
        assert_eq!(schema.lookup("status").unwrap().field_type, FieldType::Long);
    }

    #[test]
    fn fields_default_to_nullable_scalars() {
        let field = Field::new("latency", FieldType::Double);
        assert!(field.nullable);
        assert!(!field.array);

        let arr = Field::array_of("tags", FieldType::Keyword);
        assert!(arr.array);
    }
}
