//! Dialect-neutral predicate trees.
//!
//! A [`Predicate`] is the unit every clause source (filter, search, segment,
//! live query) produces and the unit the orchestrator combines. Leaves compare
//! a [`FieldPath`] against a [`Condition`]; inner nodes are AND/OR/NOT.
//! Backends compile predicates into their own query language.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A scalar value bound into a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// SQL NULL.
    Null,
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
}

impl Scalar {
    /// Creates a text scalar.
    pub fn text(s: impl Into<String>) -> Self {
        Scalar::Text(s.into())
    }

    /// Returns true for [`Scalar::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Converts a JSON value into a scalar, if it is not a container.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Scalar::Null),
            serde_json::Value::Bool(b) => Some(Scalar::Boolean(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Scalar::Integer)
                .or_else(|| n.as_f64().map(Scalar::Float)),
            serde_json::Value::String(s) => Some(Scalar::Text(s.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Boolean(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Text(s) => write!(f, "{}", s),
        }
    }
}

/// A reference to a column, optionally through a belongs-to association.
///
/// Client-facing keys use `association:field`; sort keys and the serialized
/// form use `association.field`. Both parse to the same path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldPath {
    /// The association traversed, or `None` for a local field.
    pub association: Option<String>,
    /// The field name on the (possibly associated) entity.
    pub field: String,
}

impl FieldPath {
    /// A field of the entity being listed.
    pub fn local(field: impl Into<String>) -> Self {
        Self {
            association: None,
            field: field.into(),
        }
    }

    /// A field reached through an association.
    pub fn joined(association: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            association: Some(association.into()),
            field: field.into(),
        }
    }

    /// Parses `field`, `association:field` or `association.field`.
    pub fn parse(key: &str) -> Self {
        match key.split_once(':').or_else(|| key.split_once('.')) {
            Some((association, field)) => Self::joined(association, field),
            None => Self::local(key),
        }
    }

    /// Returns true if the path traverses an association.
    pub fn is_joined(&self) -> bool {
        self.association.is_some()
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.association {
            Some(association) => write!(f, "{}.{}", association, self.field),
            None => write!(f, "{}", self.field),
        }
    }
}

impl From<String> for FieldPath {
    fn from(s: String) -> Self {
        FieldPath::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

/// A comparison applied to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Condition {
    /// Equal (`Eq(Null)` is compiled as IS NULL).
    Eq(Scalar),
    /// Not equal.
    Ne(Scalar),
    /// Greater than.
    Gt(Scalar),
    /// Greater than or equal.
    Gte(Scalar),
    /// Less than.
    Lt(Scalar),
    /// Less than or equal.
    Lte(Scalar),
    /// LIKE pattern, `%`/`_` wildcards, `\` escape.
    Like(String),
    /// NOT LIKE pattern.
    NotLike(String),
    /// IS NULL.
    IsNull,
    /// IS NOT NULL.
    IsNotNull,
    /// Half-open range: `start <= field < end`.
    Within {
        /// Inclusive lower bound.
        start: Scalar,
        /// Exclusive upper bound.
        end: Scalar,
    },
    /// Membership in a list (an empty list matches nothing).
    In(Vec<Scalar>),
}

/// A boolean expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Conjunction. `And([])` is the neutral predicate.
    And(Vec<Predicate>),
    /// Disjunction. `Or([])` matches nothing.
    Or(Vec<Predicate>),
    /// Negation.
    Not(Box<Predicate>),
    /// A single field comparison.
    Leaf {
        /// The compared column.
        path: FieldPath,
        /// The comparison applied to it.
        condition: Condition,
    },
    /// A backend-native fragment; `?` placeholders bind `params` in order.
    Raw {
        /// SQL text with bare `?` placeholders.
        sql: String,
        /// Values bound to the placeholders.
        #[serde(default)]
        params: Vec<Scalar>,
    },
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::neutral()
    }
}

impl Predicate {
    /// The predicate that does not restrict the record set.
    pub fn neutral() -> Self {
        Predicate::And(Vec::new())
    }

    /// Creates a leaf.
    pub fn leaf(path: FieldPath, condition: Condition) -> Self {
        Predicate::Leaf { path, condition }
    }

    /// Creates a raw fragment without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Predicate::Raw {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Returns true if the predicate places no restriction on records.
    pub fn is_neutral(&self) -> bool {
        match self {
            Predicate::And(children) => children.iter().all(Predicate::is_neutral),
            _ => false,
        }
    }

    /// Combines two predicates with AND, flattening neutral operands.
    pub fn and(self, other: Predicate) -> Self {
        match (self.is_neutral(), other.is_neutral()) {
            (true, _) => other,
            (_, true) => self,
            _ => Predicate::And(vec![self, other]),
        }
    }

    /// Number of leaf comparisons in the tree.
    pub fn leaf_count(&self) -> usize {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().map(Predicate::leaf_count).sum()
            }
            Predicate::Not(inner) => inner.leaf_count(),
            Predicate::Leaf { .. } => 1,
            Predicate::Raw { .. } => 0,
        }
    }

    /// Names of all associations referenced by leaves.
    pub fn associations(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_associations(&mut out);
        out
    }

    fn collect_associations(&self, out: &mut BTreeSet<String>) {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_associations(out);
                }
            }
            Predicate::Not(inner) => inner.collect_associations(out),
            Predicate::Leaf { path, .. } => {
                if let Some(association) = &path.association {
                    out.insert(association.clone());
                }
            }
            Predicate::Raw { .. } => {}
        }
    }
}
