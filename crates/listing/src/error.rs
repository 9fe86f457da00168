//! Error types for the listing pipeline.
//!
//! Errors are layered the same way across the crate: a top-level
//! [`ListingError`] wraps the category enums ([`ValidationError`],
//! [`BackendError`], [`SchemaError`]) and carries the two pipeline-specific
//! outcomes that have no category of their own (an execution failure
//! translated to "unprocessable entity", and a timeout).
//!
//! # HTTP Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | `Validation` | 400 |
//! | `UnprocessableEntity` | 422 |
//! | `Timeout` | 504 |
//! | `SegmentResolution`, `Backend`, `Schema` | 500 |

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Boxed error returned by user-supplied callbacks (segment queries, search hooks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type for listing operations.
#[derive(Error, Debug)]
pub enum ListingError {
    /// The request was rejected before any I/O happened.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The data store failed while executing the count, the fetch or the raw query.
    #[error("unprocessable entity: {message}")]
    UnprocessableEntity { message: String },

    /// A computed segment failed to produce its predicate.
    #[error("segment '{segment}' could not be resolved: {source}")]
    SegmentResolution {
        segment: String,
        #[source]
        source: BoxError,
    },

    /// A suspension point did not complete within its configured bound.
    #[error("{stage} timed out after {}", format_timeout(.timeout))]
    Timeout { stage: Stage, timeout: Duration },

    /// Backend-specific errors.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Schema definition errors.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl ListingError {
    /// Returns the HTTP status a caller should surface for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ListingError::Validation(_) => StatusCode::BAD_REQUEST,
            ListingError::UnprocessableEntity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ListingError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ListingError::SegmentResolution { .. }
            | ListingError::Backend(_)
            | ListingError::Schema(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translates an execution-time failure into an unprocessable entity error.
    ///
    /// Validation errors and timeouts keep their own classification.
    pub(crate) fn into_unprocessable(self) -> Self {
        match self {
            ListingError::Validation(_)
            | ListingError::Timeout { .. }
            | ListingError::UnprocessableEntity { .. } => self,
            ListingError::Backend(err) => ListingError::UnprocessableEntity {
                message: err.store_message(),
            },
            other => ListingError::UnprocessableEntity {
                message: other.to_string(),
            },
        }
    }
}

fn format_timeout(timeout: &Duration) -> String {
    humantime::format_duration(*timeout).to_string()
}

/// Pipeline stage, used for tracing and timeout reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Static checks on the request, no I/O.
    Validating,
    /// Segment lookup and computed segment resolution.
    Resolving,
    /// Raw passthrough query execution.
    LiveQuery,
    /// Concurrent count and fetch.
    Executing,
    /// Result decoration finished.
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validating => write!(f, "validation"),
            Stage::Resolving => write!(f, "segment resolution"),
            Stage::LiveQuery => write!(f, "live query"),
            Stage::Executing => write!(f, "query execution"),
            Stage::Done => write!(f, "done"),
        }
    }
}

/// Errors detected while checking a request, before any data store call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The entity is not registered in the schema registry.
    #[error("unknown entity: {entity}")]
    UnknownEntity { entity: String },

    /// The field does not exist on the entity.
    #[error("unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },

    /// The association does not exist or is not a relation.
    #[error("'{association}' is not an association of {entity}")]
    UnknownAssociation { entity: String, association: String },

    /// The filter value cannot be coerced to the field type.
    #[error("invalid filter value '{value}' for field '{field}': {message}")]
    InvalidFilterValue {
        field: String,
        value: String,
        message: String,
    },

    /// The filter combination operator is not AND or OR.
    #[error("invalid filter type: {filter_type}")]
    InvalidFilterType { filter_type: String },

    /// The timezone is not a UTC offset.
    #[error("invalid timezone: {timezone}")]
    InvalidTimezone { timezone: String },

    /// The requested segment is not defined for the entity.
    #[error("unknown segment '{segment}' on {entity}")]
    UnknownSegment { entity: String, segment: String },

    /// The segment refers to a scope the entity does not define.
    #[error("unknown scope '{scope}' on {entity}")]
    UnknownScope { entity: String, scope: String },

    /// The sort specification cannot be applied.
    #[error("invalid sort '{sort}': {message}")]
    InvalidSort { sort: String, message: String },

    /// The page number or size is out of range.
    #[error("invalid page: {message}")]
    InvalidPage { message: String },

    /// The raw passthrough query is not a single read-only selection.
    #[error("unsafe live query: {reason}")]
    UnsafeLiveQuery { reason: String },
}

/// A smart-field search hook failed. Logged and skipped, never propagated.
#[derive(Error, Debug)]
#[error("cannot search properly on smart field {field}: {message}")]
pub struct SearchHookFailure {
    pub field: String,
    pub message: String,
}

/// Errors originating from the database backend.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Query execution error.
    #[error("query execution failed: {message}")]
    QueryError { message: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl BackendError {
    /// Returns the message reported by the store, without the category prefix.
    pub fn store_message(&self) -> String {
        match self {
            BackendError::QueryError { message }
            | BackendError::ConnectionFailed { message, .. }
            | BackendError::Internal { message, .. } => message.clone(),
            BackendError::PoolExhausted { .. } => self.to_string(),
        }
    }
}

/// Errors in schema definitions.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Two entities were registered under the same name.
    #[error("entity already registered: {entity}")]
    DuplicateEntity { entity: String },

    /// A relation points to an entity that is not registered.
    #[error("relation {entity}.{field} targets unknown entity {target}")]
    UnknownRelationTarget {
        entity: String,
        field: String,
        target: String,
    },

    /// A primary key names a field the entity does not declare.
    #[error("primary key field '{field}' is not declared on {entity}")]
    UnknownPrimaryKey { entity: String, field: String },

    /// The entity declares no primary key.
    #[error("entity {entity} has no primary key")]
    MissingPrimaryKey { entity: String },

    /// The schema document could not be read.
    #[error("malformed schema document: {message}")]
    Malformed { message: String },
}

/// Result type alias for listing operations.
pub type ListingResult<T> = Result<T, ListingError>;

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Malformed {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(err: std::io::Error) -> Self {
        SchemaError::Malformed {
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for ListingError {
    fn from(err: rusqlite::Error) -> Self {
        // Keep the store's message but not the statement text it echoes.
        let message = match err {
            rusqlite::Error::SqlInputError { msg, offset, .. } => {
                format!("{} at offset {}", msg, offset)
            }
            other => other.to_string(),
        };
        ListingError::Backend(BackendError::QueryError { message })
    }
}

#[cfg(feature = "sqlite")]
impl From<r2d2::Error> for ListingError {
    fn from(_err: r2d2::Error) -> Self {
        ListingError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}
