//! Test infrastructure for the listing pipeline.
//!
//! Fixture schemas, a seeded in-memory SQLite backend and assertion helpers.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
