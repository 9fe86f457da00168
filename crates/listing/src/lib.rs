//! Helios Record Listing
//!
//! This crate turns a generic, paginated "list records" request into a safe,
//! correctly scoped database query, runs it, and returns the total count plus
//! one page of records.
//!
//! # Features
//!
//! - **Filters**: per-field operator syntax (`>=10`, `!draft`, `*rust*`,
//!   `$previousWeek`, ...) combined under one AND or OR
//! - **Search**: free-text search across string, numeric, enum and UUID
//!   fields, optionally across associations, with smart-field search hooks
//! - **Segments**: named sub-views with static or computed predicates and scopes
//! - **Live queries**: a raw read-only `SELECT` restricting the listing to the
//!   keys it returns, checked with `sqlparser` before it runs
//! - **Composite keys**: records with multi-column keys get a stable `a|b` id
//!
//! # Backend Features
//!
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! - [`types`] - Request parameters, predicates, query options and records
//! - [`schema`] - Entity schemas and the registry
//! - [`query`] - Pure translation of parameters into query options
//! - [`core`] - The [`QueryExecutor`] trait
//! - [`backends`] - Executor implementations
//! - [`getter`] - The [`ResourcesGetter`] orchestrator
//! - [`config`] - Page size and timeout configuration
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use helios_listing::backends::sqlite::SqliteBackend;
//! use helios_listing::schema::{EntitySchema, FieldDescriptor, FieldType};
//! use helios_listing::{ListParams, ListingConfig, ResourcesGetter, SchemaRegistry};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = SchemaRegistry::from_schemas([EntitySchema::new("User", "users")
//!     .field(FieldDescriptor::new("id", FieldType::Integer))
//!     .field(FieldDescriptor::new("name", FieldType::String))])?;
//!
//! let backend = SqliteBackend::in_memory()?;
//! backend.execute_batch("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")?;
//!
//! let getter = ResourcesGetter::new(Arc::new(registry), Arc::new(backend), ListingConfig::default());
//! let listing = getter
//!     .perform("User", &ListParams::new().with_search("ada").with_sort("-name"))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors
//!
//! Every failure is a [`ListingError`]; [`ListingError::status_code`] gives
//! the HTTP status to surface (400 for validation, 422 when the data store
//! rejects the query, 504 on timeout).

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod config;
pub mod core;
pub mod error;
pub mod getter;
pub mod query;
pub mod schema;
pub mod types;

// Re-export commonly used types at crate root
pub use config::ListingConfig;
pub use error::{ListingError, ListingResult, Stage, ValidationError};
pub use getter::ResourcesGetter;
pub use schema::{SchemaLoader, SchemaRegistry};
pub use types::{ListParams, Listing, Predicate, Record};

// Re-export core traits
pub use core::{QueryExecutor, StatementKind};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
