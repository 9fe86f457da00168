//! Operator catalogs.
//!
//! Predicates use dialect-neutral [`Operator`]s. A backend compiles them
//! through the [`OperatorCatalog`] of its dialect, which supplies the
//! concrete token, the placeholder syntax and identifier quoting.

use std::fmt::Debug;

/// A dialect-neutral logical or comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Negation.
    Not,
    /// Equality.
    Eq,
    /// Inequality.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal.
    Lte,
    /// Pattern match.
    Like,
    /// Negated pattern match.
    NotLike,
    /// List membership.
    In,
    /// Null test.
    Is,
    /// Negated null test.
    IsNot,
}

/// Maps neutral operators onto one query dialect.
pub trait OperatorCatalog: Send + Sync + Debug {
    /// The concrete token of an operator.
    fn token(&self, operator: Operator) -> &'static str {
        match operator {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::In => "IN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }

    /// The placeholder for the `index`-th (1-based) bound parameter.
    fn placeholder(&self, index: usize) -> String;

    /// Quotes an identifier.
    fn quote_identifier(&self, ident: &str) -> String {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// SQLite: `?N` placeholders; LIKE is already case-insensitive for ASCII.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteOperators;

impl OperatorCatalog for SqliteOperators {
    fn placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }
}
