//! Raw passthrough query checks.
//!
//! A raw query is executed verbatim, so it must be a single read-only
//! selection. The check parses the query instead of matching prefixes, which
//! makes case, whitespace and comments irrelevant.

use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

use crate::error::ValidationError;

/// Rejects raw queries that are not a single read-only selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveQueryChecker;

impl LiveQueryChecker {
    /// Creates a checker.
    pub fn new() -> Self {
        Self
    }

    /// Checks a trimmed raw query.
    pub fn perform(&self, query: &str) -> Result<(), ValidationError> {
        let statements = Parser::parse_sql(&SQLiteDialect {}, query)
            .map_err(|e| unsafe_query(format!("cannot parse query: {}", e)))?;

        match statements.as_slice() {
            [] => Err(unsafe_query("empty query")),
            [Statement::Query(query)] => check_query(query),
            [_] => Err(unsafe_query("only SELECT queries are allowed")),
            _ => Err(unsafe_query("only one statement is allowed")),
        }
    }
}

fn unsafe_query(reason: impl Into<String>) -> ValidationError {
    ValidationError::UnsafeLiveQuery {
        reason: reason.into(),
    }
}

fn check_query(query: &Query) -> Result<(), ValidationError> {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            check_query(&cte.query)?;
        }
    }
    check_set_expr(&query.body)
}

fn check_set_expr(expr: &SetExpr) -> Result<(), ValidationError> {
    match expr {
        SetExpr::Select(select) => {
            if select.into.is_some() {
                return Err(unsafe_query("SELECT INTO is not allowed"));
            }
            Ok(())
        }
        SetExpr::Query(query) => check_query(query),
        SetExpr::SetOperation { left, right, .. } => {
            check_set_expr(left)?;
            check_set_expr(right)
        }
        SetExpr::Values(_) => Ok(()),
        _ => Err(unsafe_query("only SELECT queries are allowed")),
    }
}
