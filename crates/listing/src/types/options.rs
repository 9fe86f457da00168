//! Query option sets handed to a [`QueryExecutor`](crate::core::QueryExecutor).
//!
//! The orchestrator builds two option sets per request, one for the count
//! and one for the fetch. Both share the same [`WhereClause`], joins and
//! scope; only the fetch carries attributes, order and pagination.

use serde::{Deserialize, Serialize};

use super::predicate::{FieldPath, Predicate};

/// The combined WHERE clause of a listing.
///
/// The search disjunction is kept apart from the other conditions so search
/// hooks can add alternatives to it without reshaping the tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    search: Option<Vec<Predicate>>,
    conditions: Vec<Predicate>,
}

impl WhereClause {
    /// Creates an empty (neutral) clause.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the search clause. An `Or` is stored as its alternatives.
    pub fn set_search(&mut self, search: Predicate) {
        self.search = Some(match search {
            Predicate::Or(alternatives) => alternatives,
            other => vec![other],
        });
    }

    /// Adds an alternative to the search disjunction.
    ///
    /// Does nothing when the request has no search term.
    pub fn extend_search(&mut self, alternative: Predicate) {
        if let Some(alternatives) = self.search.as_mut() {
            alternatives.push(alternative);
        }
    }

    /// ANDs a condition into the clause. Neutral conditions are dropped.
    pub fn push(&mut self, condition: Predicate) {
        if !condition.is_neutral() {
            self.conditions.push(condition);
        }
    }

    /// The clause as one predicate: `search AND condition1 AND ...`.
    pub fn to_predicate(&self) -> Predicate {
        let mut parts = Vec::with_capacity(self.conditions.len() + 1);
        if let Some(alternatives) = &self.search {
            parts.push(Predicate::Or(alternatives.clone()));
        }
        parts.extend(self.conditions.iter().cloned());
        Predicate::And(parts)
    }
}

/// A belongs-to join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    /// Association name, used as the table alias and the nesting key.
    pub association: String,
    /// Table of the associated entity.
    pub table: String,
    /// Foreign key column on the listed entity.
    pub foreign_key: String,
    /// Referenced column on the associated entity.
    pub target_key: String,
    /// Columns of the associated entity to select.
    pub attributes: Vec<String>,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order.
    Ascending,
    /// Descending order.
    Descending,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClause {
    /// Column to sort on.
    pub path: FieldPath,
    /// Sort direction.
    pub direction: SortDirection,
}

impl OrderClause {
    /// Ascending order on a path.
    pub fn asc(path: FieldPath) -> Self {
        Self {
            path,
            direction: SortDirection::Ascending,
        }
    }

    /// Descending order on a path.
    pub fn desc(path: FieldPath) -> Self {
        Self {
            path,
            direction: SortDirection::Descending,
        }
    }
}

/// Options for one count or fetch query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Local columns to select; `None` selects every stored field.
    pub attributes: Option<Vec<String>>,
    /// Row filter.
    pub where_clause: WhereClause,
    /// Joined associations.
    pub includes: Vec<Join>,
    /// Sort order.
    pub order: Vec<OrderClause>,
    /// Rows to skip.
    pub offset: Option<u64>,
    /// Maximum rows to return.
    pub limit: Option<u64>,
    /// Named scope applied as a pre-filter.
    pub scope: Option<String>,
}

impl QueryOptions {
    /// Returns the join for an association, if included.
    pub fn include(&self, association: &str) -> Option<&Join> {
        self.includes.iter().find(|j| j.association == association)
    }

    /// Adds a join unless the association is already included.
    pub fn add_include(&mut self, join: Join) {
        if self.include(&join.association).is_none() {
            self.includes.push(join);
        }
    }
}
