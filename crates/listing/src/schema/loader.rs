//! Schema loader.
//!
//! Reads entity schemas from a JSON document, either an object with an
//! `entities` array or a bare array of entities:
//!
//! ```json
//! {
//!   "entities": [{
//!     "name": "Article",
//!     "table": "articles",
//!     "primaryKeys": ["id"],
//!     "fields": [
//!       {"name": "id", "type": "integer"},
//!       {"name": "status", "type": "enum", "values": ["draft", "published"]},
//!       {"name": "author", "type": "integer",
//!        "relation": {"target": "User", "foreignKey": "author_id"}}
//!     ],
//!     "scopes": {"visible": {"leaf": {"path": "status", "condition": {"op": "ne", "value": "draft"}}}},
//!     "segments": [{"name": "Published", "where": {"leaf": {"path": "status", "condition": {"op": "eq", "value": "published"}}}}]
//!   }]
//! }
//! ```
//!
//! Search hooks and computed segments are code, not data; attach them to the
//! loaded schemas before building the registry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::types::Predicate;

use super::registry::SchemaRegistry;
use super::types::{EntitySchema, FieldDescriptor, FieldType, Relation, Segment};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelationDef {
    target: String,
    foreign_key: String,
    #[serde(default = "default_target_key")]
    target_key: String,
}

fn default_target_key() -> String {
    "id".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    values: Option<Vec<String>>,
    #[serde(default)]
    relation: Option<RelationDef>,
    #[serde(default, rename = "virtual")]
    is_virtual: bool,
}

#[derive(Debug, Deserialize)]
struct SegmentDef {
    name: String,
    #[serde(default, rename = "where")]
    predicate: Option<Predicate>,
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntityDef {
    name: String,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    primary_keys: Option<Vec<String>>,
    fields: Vec<FieldDef>,
    #[serde(default)]
    segments: Vec<SegmentDef>,
    #[serde(default)]
    scopes: BTreeMap<String, Predicate>,
}

/// Loader for entity schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaLoader;

impl SchemaLoader {
    /// Creates a new loader.
    pub fn new() -> Self {
        Self
    }

    /// Parses entity schemas from a JSON value.
    pub fn load_from_json(&self, json: &Value) -> Result<Vec<EntitySchema>, SchemaError> {
        let entities = match json {
            Value::Array(_) => json,
            Value::Object(object) => object.get("entities").ok_or_else(|| SchemaError::Malformed {
                message: "missing 'entities' array".to_string(),
            })?,
            _ => {
                return Err(SchemaError::Malformed {
                    message: "expected an object or an array".to_string(),
                });
            }
        };

        let defs: Vec<EntityDef> = serde_json::from_value(entities.clone())?;
        defs.into_iter().map(convert_entity).collect()
    }

    /// Parses entity schemas from a JSON string.
    pub fn load_from_str(&self, content: &str) -> Result<Vec<EntitySchema>, SchemaError> {
        let json: Value = serde_json::from_str(content)?;
        self.load_from_json(&json)
    }

    /// Parses entity schemas from a JSON file.
    pub fn load_file(&self, path: &Path) -> Result<Vec<EntitySchema>, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::Malformed {
            message: format!("{}: {}", path.display(), e),
        })?;
        self.load_from_str(&content)
    }

    /// Loads a file and builds a validated registry from it.
    pub fn load_registry(&self, path: &Path) -> Result<SchemaRegistry, SchemaError> {
        SchemaRegistry::from_schemas(self.load_file(path)?)
    }
}

fn convert_entity(def: EntityDef) -> Result<EntitySchema, SchemaError> {
    let table = def.table.unwrap_or_else(|| def.name.to_lowercase());
    let mut schema = EntitySchema::new(def.name, table);
    if let Some(keys) = def.primary_keys {
        schema = schema.primary_key(keys);
    }

    for field in def.fields {
        let descriptor = convert_field(&schema.name, field)?;
        schema = schema.field(descriptor);
    }
    for segment in def.segments {
        let mut converted = Segment::new(segment.name);
        if let Some(predicate) = segment.predicate {
            converted = converted.with_where(predicate);
        }
        if let Some(scope) = segment.scope {
            converted = converted.with_scope(scope);
        }
        schema = schema.segment(converted);
    }
    for (name, predicate) in def.scopes {
        schema = schema.scope(name, predicate);
    }
    Ok(schema)
}

fn convert_field(entity: &str, def: FieldDef) -> Result<FieldDescriptor, SchemaError> {
    let field_type =
        FieldType::from_name(&def.field_type, def.values).ok_or_else(|| SchemaError::Malformed {
            message: format!(
                "unknown type '{}' for field {}.{}",
                def.field_type, entity, def.name
            ),
        })?;

    let mut descriptor = FieldDescriptor::new(def.name, field_type);
    descriptor.is_virtual = def.is_virtual;
    descriptor.relation = def.relation.map(|r| Relation {
        target: r.target,
        foreign_key: r.foreign_key,
        target_key: r.target_key,
    });
    Ok(descriptor)
}
