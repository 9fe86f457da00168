//! Entity schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::query::{SearchHook, SegmentQuery};
use crate::types::Predicate;

/// Declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// Free text.
    String,
    /// 64-bit integer.
    Integer,
    /// Floating point number.
    Float,
    /// Boolean (stored as 0/1 by SQLite).
    Boolean,
    /// Instant, stored as RFC 3339 UTC text (`2024-01-15T09:30:00Z`).
    Date,
    /// UUID stored as text.
    Uuid,
    /// Text restricted to a set of values.
    Enum(Vec<String>),
    /// Arbitrary JSON; neither filterable nor searchable.
    Json,
}

impl FieldType {
    /// Parses a type name as used in schema documents.
    pub fn from_name(name: &str, values: Option<Vec<String>>) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" | "text" => Some(FieldType::String),
            "integer" | "int" => Some(FieldType::Integer),
            "float" | "number" | "double" => Some(FieldType::Float),
            "boolean" | "bool" => Some(FieldType::Boolean),
            "date" | "datetime" => Some(FieldType::Date),
            "uuid" => Some(FieldType::Uuid),
            "enum" => Some(FieldType::Enum(values.unwrap_or_default())),
            "json" => Some(FieldType::Json),
            _ => None,
        }
    }

    /// Returns the type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Uuid => "uuid",
            FieldType::Enum(_) => "enum",
            FieldType::Json => "json",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A belongs-to association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Name of the associated entity.
    pub target: String,
    /// Column on this entity holding the reference.
    pub foreign_key: String,
    /// Referenced column on the associated entity.
    pub target_key: String,
}

/// Description of one field.
#[derive(Clone)]
pub struct FieldDescriptor {
    /// Field (and column) name.
    pub name: String,
    /// Declared type. For relations, the type of the referenced key.
    pub field_type: FieldType,
    /// Set when the field is an association.
    pub relation: Option<Relation>,
    /// Smart fields have no column.
    pub is_virtual: bool,
    /// Custom search logic for smart fields.
    pub search_hook: Option<Arc<dyn SearchHook>>,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("field_type", &self.field_type)
            .field("relation", &self.relation)
            .field("is_virtual", &self.is_virtual)
            .field("has_search_hook", &self.search_hook.is_some())
            .finish()
    }
}

impl FieldDescriptor {
    /// Creates a stored field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            relation: None,
            is_virtual: false,
            search_hook: None,
        }
    }

    /// Creates a belongs-to association field.
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::Integer,
            relation: Some(Relation {
                target: target.into(),
                foreign_key: foreign_key.into(),
                target_key: target_key.into(),
            }),
            is_virtual: false,
            search_hook: None,
        }
    }

    /// Creates a smart field with no backing column.
    pub fn smart(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            is_virtual: true,
            ..Self::new(name, field_type)
        }
    }

    /// Attaches a search hook.
    pub fn with_search_hook(mut self, hook: Arc<dyn SearchHook>) -> Self {
        self.search_hook = Some(hook);
        self
    }

    /// Sets the type of a relation's referenced key.
    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = field_type;
        self
    }

    /// Returns true if this field is an association.
    pub fn is_relation(&self) -> bool {
        self.relation.is_some()
    }

    /// Returns true if this field maps to a selectable column.
    pub fn is_stored(&self) -> bool {
        !self.is_virtual && !self.is_relation()
    }
}

/// Where a segment's predicate comes from.
#[derive(Clone)]
pub enum SegmentPredicate {
    /// A fixed predicate.
    Static(Predicate),
    /// A predicate computed from the request parameters.
    Computed(Arc<dyn SegmentQuery>),
}

impl fmt::Debug for SegmentPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentPredicate::Static(predicate) => {
                f.debug_tuple("Static").field(predicate).finish()
            }
            SegmentPredicate::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A named, predefined sub-view of an entity.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Segment name.
    pub name: String,
    /// Row filter of the segment.
    pub predicate: Option<SegmentPredicate>,
    /// Named scope applied as a pre-filter.
    pub scope: Option<String>,
}

impl Segment {
    /// Creates a segment without predicate or scope.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicate: None,
            scope: None,
        }
    }

    /// Sets a static predicate.
    pub fn with_where(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(SegmentPredicate::Static(predicate));
        self
    }

    /// Sets a computed predicate.
    pub fn with_query(mut self, query: Arc<dyn SegmentQuery>) -> Self {
        self.predicate = Some(SegmentPredicate::Computed(query));
        self
    }

    /// Sets the scope.
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Schema of one entity.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    /// Entity name, as used in requests (`fields[<name>]`).
    pub name: String,
    /// Backing table.
    pub table: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDescriptor>,
    /// Primary key fields in key order.
    pub primary_keys: Vec<String>,
    /// Segments in declaration order.
    pub segments: Vec<Segment>,
    /// Named scopes.
    pub scopes: BTreeMap<String, Predicate>,
}

impl EntitySchema {
    /// Creates an entity with no fields. The primary key defaults to `id`.
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            primary_keys: vec!["id".to_string()],
            segments: Vec::new(),
            scopes: BTreeMap::new(),
        }
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Sets the primary key fields, in key order.
    pub fn primary_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a segment.
    pub fn segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Adds a named scope.
    pub fn scope(mut self, name: impl Into<String>, predicate: Predicate) -> Self {
        self.scopes.insert(name.into(), predicate);
        self
    }

    /// Looks up a field by name.
    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Looks up a segment by name.
    pub fn get_segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.name == name)
    }

    /// Returns true if the primary key spans more than one field.
    pub fn is_composite_primary(&self) -> bool {
        self.primary_keys.len() > 1
    }

    /// The first primary key field.
    pub fn primary_key_field(&self) -> &str {
        self.primary_keys.first().map(String::as_str).unwrap_or("id")
    }

    /// Fields that map to selectable columns.
    pub fn stored_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_stored())
    }

    /// Association fields.
    pub fn relations(&self) -> impl Iterator<Item = (&FieldDescriptor, &Relation)> {
        self.fields
            .iter()
            .filter_map(|f| f.relation.as_ref().map(|r| (f, r)))
    }
}
