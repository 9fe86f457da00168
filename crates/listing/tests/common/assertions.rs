//! Assertion helpers for listings.

use serde_json::Value;

use helios_listing::{Listing, ListingError, ValidationError};

/// Returns the `id` of every record, in order.
pub fn ids(listing: &Listing) -> Vec<i64> {
    listing
        .records
        .iter()
        .map(|r| r.get("id").and_then(Value::as_i64).expect("record has an integer id"))
        .collect()
}

/// Asserts that a listing has the expected count and record ids.
pub fn assert_listing(listing: &Listing, count: u64, expected_ids: &[i64]) {
    assert_eq!(
        listing.count, count,
        "Count mismatch: expected {}, got {}",
        count, listing.count
    );
    assert_eq!(ids(listing), expected_ids, "Record ids mismatch");
}

/// Asserts that an error is a validation error.
pub fn assert_validation_error(err: &ListingError) -> &ValidationError {
    match err {
        ListingError::Validation(inner) => inner,
        other => panic!("Expected a validation error, got {:?}", other),
    }
}
