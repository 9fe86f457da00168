//! Core types for listing requests, predicates and results.

mod options;
mod params;
mod predicate;
mod record;

pub use options::{Join, OrderClause, QueryOptions, SortDirection, WhereClause};
pub use params::{FilterType, ListParams, PageParams, Timezone};
pub use predicate::{Condition, FieldPath, Predicate, Scalar};
pub use record::{Listing, Record};
