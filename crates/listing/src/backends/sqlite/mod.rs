//! SQLite backend implementation.
//!
//! Runs listing queries against an in-memory or file-based SQLite database
//! through an r2d2 connection pool.
//!
//! # Features
//!
//! - In-memory and file-based modes
//! - [`QueryExecutor`](crate::core::QueryExecutor) implementation with
//!   `LEFT OUTER JOIN`s for belongs-to associations
//! - Numbered `?N` placeholders for every bound value
//!
//! # Example
//!
//! ```no_run
//! use helios_listing::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::in_memory()?;
//! backend.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Result columns
//!
//! Joined columns are aliased `"association.column"` and decoded into a
//! nested object per association. Columns declared `BOOLEAN` decode to JSON
//! booleans and columns declared `JSON` to parsed values.

mod backend;
mod compiler;
mod executor;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use compiler::{SqlCompiler, SqlFragment, SqlParam};
