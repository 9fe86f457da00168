//! Query translation: request parameters to dialect-neutral query options.
//!
//! Each component is pure except the [`SegmentResolver`], which may await a
//! computed segment. The [`ResourcesGetter`](crate::getter::ResourcesGetter)
//! sequences them.

mod assembler;
mod composite;
mod date_interval;
mod filter;
mod live_query;
mod operators;
mod search;
mod segment;
mod value_parser;

pub use assembler::QueryAssembler;
pub use composite::{CompositeKeysManager, GLUE};
pub use date_interval::{DateIntervalParser, format_instant};
pub use filter::FilterClauseBuilder;
pub use live_query::LiveQueryChecker;
pub use operators::{Operator, OperatorCatalog, SqliteOperators};
pub use search::{SearchClauseBuilder, SearchHook};
pub use segment::{ResolvedSegment, SegmentQuery, SegmentResolver};
pub use value_parser::OperatorValueParser;
