//! Entity schemas and the registry the pipeline resolves fields against.

mod loader;
mod registry;
mod types;

pub use loader::SchemaLoader;
pub use registry::{ResolvedField, SchemaRegistry};
pub use types::{EntitySchema, FieldDescriptor, FieldType, Relation, Segment, SegmentPredicate};
