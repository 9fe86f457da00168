//! Records returned by a listing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A fetched record.
///
/// Joined association attributes are nested under the association name (`null` when the
/// association is absent).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Column values keyed by field name.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,

    /// Synthesized identifier for entities with a composite primary key.
    #[serde(rename = "_compositeId", skip_serializing_if = "Option::is_none", default)]
    pub composite_id: Option<String>,
}

impl Record {
    /// Creates a record from its attributes.
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            attributes,
            composite_id: None,
        }
    }

    /// Returns an attribute value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Returns an attribute of a joined association.
    pub fn get_joined(&self, association: &str, field: &str) -> Option<&Value> {
        self.attributes
            .get(association)
            .and_then(Value::as_object)
            .and_then(|object| object.get(field))
    }

    /// Sets an attribute value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.attributes.insert(field.into(), value);
    }
}

/// The result of a listing: the total match count and one page of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Number of records matching the request, ignoring pagination.
    pub count: u64,
    /// The requested page.
    pub records: Vec<Record>,
}
