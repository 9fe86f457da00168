//! Core execution abstractions.
//!
//! - [`QueryExecutor`] - runs the count, the fetch and raw statements
//! - [`StatementKind`] - how a raw statement is read back

mod executor;

pub use executor::{QueryExecutor, StatementKind};
