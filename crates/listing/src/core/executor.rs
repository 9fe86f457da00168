//! Query execution trait.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::ListingResult;
use crate::query::OperatorCatalog;
use crate::schema::EntitySchema;
use crate::types::{QueryOptions, Record};

/// How a raw statement's result is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    /// The statement returns rows, decoded into records.
    Select,
}

/// Executes dialect-neutral query options against a data store.
///
/// Implementations compile the [`QueryOptions`] with their own
/// [`OperatorCatalog`]. The scope named by `options.scope` is ANDed in as a
/// pre-filter; without a scope the entity is queried unscoped.
///
/// # Example
///
/// ```ignore
/// use helios_listing::core::QueryExecutor;
///
/// let count = executor.count(&schema, &options).await?;
/// let records = executor.find_all(&schema, &options).await?;
/// ```
#[async_trait]
pub trait QueryExecutor: Send + Sync + Debug {
    /// Returns a human-readable name for this executor.
    fn name(&self) -> &'static str;

    /// The operator catalog of the executor's dialect.
    fn operators(&self) -> &dyn OperatorCatalog;

    /// Counts the records matching `options`, ignoring order and pagination.
    async fn count(&self, schema: &EntitySchema, options: &QueryOptions) -> ListingResult<u64>;

    /// Fetches one page of records matching `options`.
    async fn find_all(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> ListingResult<Vec<Record>>;

    /// Runs a raw statement.
    async fn select_raw(&self, sql: &str, kind: StatementKind) -> ListingResult<Vec<Record>>;
}
