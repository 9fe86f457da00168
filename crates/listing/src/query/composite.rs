//! Composite primary key identifiers.
//!
//! Records whose primary key spans several columns get a single string
//! identifier: the key values in key order, joined with `|`.
//!
//! Inside a value, `\` and `|` are escaped with a backslash and a null or
//! missing value renders as `\N`, so distinct keys never share an identifier.

use serde_json::Value;

use crate::schema::EntitySchema;
use crate::types::Record;

/// Separator between key values.
pub const GLUE: char = '|';

/// Builds composite identifiers for one entity.
#[derive(Debug, Clone, Copy)]
pub struct CompositeKeysManager<'a> {
    schema: &'a EntitySchema,
}

impl<'a> CompositeKeysManager<'a> {
    /// Creates a manager for `schema`.
    pub fn new(schema: &'a EntitySchema) -> Self {
        Self { schema }
    }

    /// Returns the composite identifier of a record.
    pub fn create_composite_primary(&self, record: &Record) -> String {
        self.schema
            .primary_keys
            .iter()
            .map(|key| render(record.get(key)))
            .collect::<Vec<_>>()
            .join(&GLUE.to_string())
    }

    /// Sets `composite_id` on every record.
    pub fn decorate(&self, records: &mut [Record]) {
        for record in records {
            record.composite_id = Some(self.create_composite_primary(record));
        }
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "\\N".to_string(),
        Some(Value::String(s)) => escape(s),
        Some(other) => escape(&other.to_string()),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || c == GLUE {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType};
    use serde_json::json;

    fn schema() -> EntitySchema {
        EntitySchema::new("ArticleTag", "article_tags")
            .field(FieldDescriptor::new("article_id", FieldType::Integer))
            .field(FieldDescriptor::new("tag", FieldType::String))
            .primary_key(["article_id", "tag"])
    }

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => Record::new(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_create_composite_primary() {
        let schema = schema();
        let manager = CompositeKeysManager::new(&schema);
        let tagged = record(json!({"tag": "x", "article_id": 1}));
        assert_eq!(manager.create_composite_primary(&tagged), "1|x");
        assert_eq!(manager.create_composite_primary(&tagged), "1|x");

        let partial = record(json!({"article_id": 1, "tag": null}));
        assert_eq!(manager.create_composite_primary(&partial), "1|\\N");
    }

    #[test]
    fn test_composite_ids_do_not_collide() {
        let schema = schema();
        let manager = CompositeKeysManager::new(&schema);
        let id = |value: Value| manager.create_composite_primary(&record(value));

        assert_ne!(
            id(json!({"article_id": null, "tag": "z"})),
            id(json!({"article_id": "null", "tag": "z"}))
        );
        assert_ne!(
            id(json!({"article_id": "x|y", "tag": "z"})),
            id(json!({"article_id": "x", "tag": "y|z"}))
        );
        assert_eq!(id(json!({"article_id": "x|y", "tag": "a\\b"})), "x\\|y|a\\\\b");
    }

    #[test]
    fn test_decorate() {
        let schema = schema();
        let mut records = vec![
            record(json!({"article_id": 1, "tag": "rust"})),
            record(json!({"article_id": 2, "tag": "sql"})),
        ];
        CompositeKeysManager::new(&schema).decorate(&mut records);
        assert_eq!(records[0].composite_id.as_deref(), Some("1|rust"));
        assert_eq!(records[1].composite_id.as_deref(), Some("2|sql"));
    }
}
