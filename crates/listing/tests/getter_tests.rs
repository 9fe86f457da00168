//! End-to-end listing tests against a seeded in-memory SQLite database.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use http::StatusCode;
use serde_json::{Value, json};

use helios_listing::backends::sqlite::SqliteBackend;
use helios_listing::error::BoxError;
use helios_listing::query::SegmentQuery;
use helios_listing::schema::{EntitySchema, FieldDescriptor, FieldType, Segment};
use helios_listing::types::{Condition, FieldPath, QueryOptions, Record, Scalar};
use helios_listing::{
    ListParams, ListingConfig, ListingError, ListingResult, Predicate, QueryExecutor,
    ResourcesGetter, Stage, StatementKind, ValidationError,
};

use common::*;

// ============================================================================
// Plain listings
// ============================================================================

#[tokio::test]
async fn test_listing_without_parameters_returns_everything() {
    let getter = create_getter();
    let listing = getter.perform("Article", &ListParams::new()).await.unwrap();

    assert_listing(&listing, 5, &[5, 4, 3, 2, 1]);

    let first = listing.records.iter().find(|r| r.get("id") == Some(&json!(1))).unwrap();
    assert_eq!(first.get_joined("author", "name"), Some(&json!("Ada Lovelace")));
    assert_eq!(first.get("featured"), Some(&json!(true)));

    let orphan = listing.records.iter().find(|r| r.get("id") == Some(&json!(4))).unwrap();
    assert_eq!(orphan.get("author"), Some(&Value::Null));
    assert!(orphan.composite_id.is_none());
}

#[tokio::test]
async fn test_requested_fields_always_include_the_primary_key() {
    let getter = create_getter();
    let params = ListParams::new().with_fields("Article", "name");
    let listing = getter.perform("Article", &params).await.unwrap();

    for record in &listing.records {
        let keys: Vec<&str> = record.attributes.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id", "name"]);
    }
}

#[tokio::test]
async fn test_unknown_entity_and_field() {
    let getter = create_getter();

    let err = getter.perform("Comment", &ListParams::new()).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

    let params = ListParams::new().with_fields("Article", "name,body");
    let err = getter.perform("Article", &params).await.unwrap_err();
    assert!(matches!(
        assert_validation_error(&err),
        ValidationError::UnknownField { field, .. } if field == "body"
    ));
}

// ============================================================================
// Filters
// ============================================================================

#[tokio::test]
async fn test_status_or_filter() {
    let getter = create_getter();
    let params = ListParams::new()
        .with_fields("Article", "name")
        .with_filter("status", "published,draft")
        .with_filter_type("or");
    let listing = getter.perform("Article", &params).await.unwrap();

    assert_listing(&listing, 4, &[5, 3, 2, 1]);
}

#[tokio::test]
async fn test_filters_combine_with_and_by_default() {
    let getter = create_getter();
    let params = ListParams::new()
        .with_filter("status", "draft")
        .with_filter("views", ">=40");
    let listing = getter.perform("Article", &params).await.unwrap();

    assert_listing(&listing, 1, &[5]);
}

#[tokio::test]
async fn test_association_filter_joins_the_association() {
    let getter = create_getter();
    let params = ListParams::new()
        .with_fields("Article", "name")
        .with_filter("author:name", "Ada Lovelace");
    let listing = getter.perform("Article", &params).await.unwrap();

    assert_listing(&listing, 2, &[3, 1]);
    for record in &listing.records {
        assert_eq!(record.get_joined("author", "name"), Some(&json!("Ada Lovelace")));
    }
}

#[tokio::test]
async fn test_association_fields_select_join_columns() {
    let getter = create_getter();
    let params = ListParams::new()
        .with_fields("Article", "name,author")
        .with_fields("author", "email");
    let listing = getter.perform("Article", &params).await.unwrap();

    let first = &listing.records[listing.records.len() - 1];
    assert_eq!(first.get("author"), Some(&json!({"email": "ada@example.com"})));
}

#[tokio::test]
async fn test_pattern_and_negation_filters() {
    let getter = create_getter();

    let params = ListParams::new().with_filter("name", "*rust*");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 2, &[3, 1]);

    let params = ListParams::new().with_filter("name", "!*rust*");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 3, &[5, 4, 2]);

    let params = ListParams::new().with_filter("status", "!archived");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_eq!(listing.count, 4);
}

#[tokio::test]
async fn test_boolean_filters() {
    let getter = create_getter();

    let params = ListParams::new().with_filter("featured", "true");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 1, &[1]);

    let params = ListParams::new().with_filter("featured", "!true");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 4, &[5, 4, 3, 2]);
}

#[tokio::test]
async fn test_date_filters() {
    let getter = create_getter();

    let params = ListParams::new().with_filter("published_at", "2024-05-14");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 1, &[3]);

    let params = ListParams::new().with_filter("published_at", ">2024-05-01");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 1, &[3]);

    let params = ListParams::new().with_filter("published_at", "$blank");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 2, &[5, 2]);
}

#[tokio::test]
async fn test_date_filters_use_the_request_timezone() {
    let getter = create_getter();

    let params = ListParams::new().with_filter("published_at", "2024-05-15");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 0, &[]);

    let params = params.with_timezone("+06:00");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 1, &[3]);
}

#[tokio::test]
async fn test_relative_date_filter() {
    // Monday 2024-05-20; the previous week is 2024-05-13 to 2024-05-19
    let getter =
        create_getter().with_clock(Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap());
    let params = ListParams::new().with_filter("published_at", "$previousWeek");
    let listing = getter.perform("Article", &params).await.unwrap();

    assert_listing(&listing, 1, &[3]);
}

#[tokio::test]
async fn test_invalid_filter_values() {
    let getter = create_getter();

    for (key, value) in [
        ("views", "many"),
        ("status", "deleted"),
        ("views", "*1*"),
        ("featured", "yes"),
    ] {
        let params = ListParams::new().with_filter(key, value);
        let err = getter.perform("Article", &params).await.unwrap_err();
        assert!(
            matches!(
                assert_validation_error(&err),
                ValidationError::InvalidFilterValue { .. }
            ),
            "{}={} should be rejected, got {:?}",
            key,
            value,
            err
        );
    }

    let params = ListParams::new()
        .with_filter("status", "draft")
        .with_filter_type("xor");
    let err = getter.perform("Article", &params).await.unwrap_err();
    assert!(matches!(
        assert_validation_error(&err),
        ValidationError::InvalidFilterType { .. }
    ));
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_matches_string_fields() {
    let getter = create_getter();
    let listing = getter
        .perform("Article", &ListParams::new().with_search("rust"))
        .await
        .unwrap();

    assert_listing(&listing, 2, &[3, 1]);
}

#[tokio::test]
async fn test_search_matches_numbers_and_enums() {
    let getter = create_getter();

    let listing = getter
        .perform("Article", &ListParams::new().with_search("300"))
        .await
        .unwrap();
    assert_listing(&listing, 1, &[3]);

    let listing = getter
        .perform("Article", &ListParams::new().with_search("DRAFT"))
        .await
        .unwrap();
    assert_listing(&listing, 2, &[5, 2]);
}

#[tokio::test]
async fn test_extended_search_covers_associations() {
    let getter = create_getter();

    let listing = getter
        .perform("Article", &ListParams::new().with_search("grace"))
        .await
        .unwrap();
    assert_listing(&listing, 0, &[]);

    let mut params = ListParams::new().with_search("grace");
    params.search_extended = true;
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 2, &[5, 2]);
}

#[tokio::test]
async fn test_search_hook_adds_an_alternative() {
    let popular = |options: &mut QueryOptions, _term: &str| -> Result<(), BoxError> {
        options.where_clause.extend_search(Predicate::leaf(
            FieldPath::local("views"),
            Condition::Gte(Scalar::Integer(300)),
        ));
        Ok(())
    };
    let article = article_schema()
        .field(FieldDescriptor::smart("popularity", FieldType::String).with_search_hook(Arc::new(popular)));
    let getter = getter_with(article, ListingConfig::default());

    let listing = getter
        .perform("Article", &ListParams::new().with_search("zzz"))
        .await
        .unwrap();
    assert_listing(&listing, 1, &[3]);
}

#[tokio::test]
async fn test_failing_search_hook_is_skipped() {
    let broken = |options: &mut QueryOptions, _term: &str| -> Result<(), BoxError> {
        options.where_clause.push(Predicate::Or(vec![]));
        Err("index unavailable".into())
    };
    let article = article_schema()
        .field(FieldDescriptor::smart("summary", FieldType::String).with_search_hook(Arc::new(broken)));
    let getter = getter_with(article, ListingConfig::default());

    let listing = getter
        .perform("Article", &ListParams::new().with_search("rust"))
        .await
        .unwrap();
    assert_listing(&listing, 2, &[3, 1]);
}

// ============================================================================
// Sort and pagination
// ============================================================================

#[tokio::test]
async fn test_sort_and_pages() {
    let getter = create_getter();

    let mut pages = Vec::new();
    for number in 1..=3 {
        let params = ListParams::new().with_sort("-views").with_page(number, 2);
        let listing = getter.perform("Article", &params).await.unwrap();
        assert_eq!(listing.count, 5);
        pages.push(ids(&listing));
    }

    assert_eq!(pages, vec![vec![3, 1], vec![5, 2], vec![4]]);
}

#[tokio::test]
async fn test_sort_on_association_field() {
    let getter = create_getter();
    let params = ListParams::new().with_sort("author.name");
    let listing = getter.perform("Article", &params).await.unwrap();

    // NULL authors sort first; equal names fall back to the primary key
    assert_listing(&listing, 5, &[4, 1, 3, 2, 5]);
}

#[tokio::test]
async fn test_invalid_sort_and_page() {
    let getter = create_getter();

    let err = getter
        .perform("Article", &ListParams::new().with_sort("-rating"))
        .await
        .unwrap_err();
    assert!(matches!(
        assert_validation_error(&err),
        ValidationError::InvalidSort { .. }
    ));

    for (number, size) in [(0, 10), (1, 0), (1, 5000)] {
        let err = getter
            .perform("Article", &ListParams::new().with_page(number, size))
            .await
            .unwrap_err();
        assert!(matches!(
            assert_validation_error(&err),
            ValidationError::InvalidPage { .. }
        ));
    }
}

#[tokio::test]
async fn test_count_equals_unpaginated_fetch() {
    let getter = create_getter();
    let requests = [
        ListParams::new(),
        ListParams::new()
            .with_filter("status", "published,draft")
            .with_filter_type("or"),
        ListParams::new().with_filter("author:name", "Grace Hopper"),
        ListParams::new().with_search("a").with_sort("author.email"),
    ];

    for params in requests {
        let listing = getter
            .perform("Article", &params.with_page(1, 1000))
            .await
            .unwrap();
        assert_eq!(listing.count as usize, listing.records.len());
    }
}

// ============================================================================
// Composite keys
// ============================================================================

#[tokio::test]
async fn test_composite_keys_are_synthesized() {
    let getter = create_getter();
    let listing = getter.perform("ArticleTag", &ListParams::new()).await.unwrap();

    let composite_ids: Vec<&str> = listing
        .records
        .iter()
        .map(|r| r.composite_id.as_deref().unwrap())
        .collect();
    assert_eq!(listing.count, 5);
    assert_eq!(
        composite_ids,
        vec!["3|async", "3|rust", "2|sql", "1|memory", "1|rust"]
    );

    let serialized = serde_json::to_value(&listing.records[0]).unwrap();
    assert_eq!(serialized["_compositeId"], json!("3|async"));
}

#[tokio::test]
async fn test_composite_key_fields_are_always_selected() {
    let getter = create_getter();
    let params = ListParams::new().with_fields("ArticleTag", "weight");
    let listing = getter.perform("ArticleTag", &params).await.unwrap();

    let record = &listing.records[0];
    assert_eq!(record.get("article_id"), Some(&json!(3)));
    assert_eq!(record.get("tag"), Some(&json!("async")));
    assert_eq!(record.get("weight"), Some(&json!(3)));
}

// ============================================================================
// Live queries
// ============================================================================

#[tokio::test]
async fn test_live_query_restricts_to_returned_ids() {
    let getter = create_getter();
    let params = ListParams::new().with_query("SELECT id FROM articles WHERE views > 100");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 2, &[3, 1]);

    let params = params.with_filter("featured", "false");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 1, &[3]);
}

#[tokio::test]
async fn test_live_query_with_many_ids() {
    let getter = create_getter();
    let query = "WITH RECURSIVE n(id) AS (SELECT 1 UNION ALL SELECT id + 1 FROM n WHERE id < 40000) \
                 SELECT id FROM n";
    let listing = getter
        .perform("Article", &ListParams::new().with_query(query))
        .await
        .unwrap();
    assert_listing(&listing, 5, &[5, 4, 3, 2, 1]);
}

#[tokio::test]
async fn test_destructive_live_query_is_rejected() {
    let getter = create_getter();

    for query in [
        "DROP TABLE articles",
        "  /* tidy up */ drop table articles",
        "SELECT id FROM articles; DELETE FROM articles",
        "UPDATE articles SET views = 0",
    ] {
        let err = getter
            .perform("Article", &ListParams::new().with_query(query))
            .await
            .unwrap_err();
        assert!(matches!(
            assert_validation_error(&err),
            ValidationError::UnsafeLiveQuery { .. }
        ));
    }

    let listing = getter.perform("Article", &ListParams::new()).await.unwrap();
    assert_eq!(listing.count, 5);
}

#[tokio::test]
async fn test_failing_live_query_is_unprocessable() {
    let getter = create_getter();

    let err = getter
        .perform("Article", &ListParams::new().with_query("SELECT id FROM missing"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    match err {
        ListingError::UnprocessableEntity { message } => {
            assert!(message.contains("no such table"), "{}", message);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = getter
        .perform("Article", &ListParams::new().with_query("SELECT name FROM articles"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ============================================================================
// Segments
// ============================================================================

#[derive(Debug)]
struct MinViews(i64);

#[async_trait]
impl SegmentQuery for MinViews {
    async fn resolve(&self, _params: &ListParams) -> Result<Predicate, BoxError> {
        Ok(Predicate::leaf(
            FieldPath::local("views"),
            Condition::Gte(Scalar::Integer(self.0)),
        ))
    }
}

#[derive(Debug)]
struct Unavailable;

#[async_trait]
impl SegmentQuery for Unavailable {
    async fn resolve(&self, _params: &ListParams) -> Result<Predicate, BoxError> {
        Err("segment service unavailable".into())
    }
}

#[derive(Debug)]
struct Stalled;

#[async_trait]
impl SegmentQuery for Stalled {
    async fn resolve(&self, _params: &ListParams) -> Result<Predicate, BoxError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(Predicate::neutral())
    }
}

fn article_with_computed_segments() -> EntitySchema {
    article_schema()
        .segment(Segment::new("popular").with_query(Arc::new(MinViews(100))))
        .segment(Segment::new("unavailable").with_query(Arc::new(Unavailable)))
        .segment(Segment::new("stalled").with_query(Arc::new(Stalled)))
}

#[tokio::test]
async fn test_static_segment() {
    let getter = create_getter();
    let listing = getter
        .perform("Article", &ListParams::new().with_segment("published"))
        .await
        .unwrap();
    assert_listing(&listing, 2, &[3, 1]);
}

#[tokio::test]
async fn test_segment_scope_is_a_pre_filter() {
    let getter = create_getter();
    let params = ListParams::new().with_segment("visible").with_search("notes");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 0, &[]);

    let listing = getter
        .perform("Article", &ListParams::new().with_segment("visible"))
        .await
        .unwrap();
    assert_listing(&listing, 4, &[5, 3, 2, 1]);
}

#[tokio::test]
async fn test_computed_segment() {
    let getter = getter_with(article_with_computed_segments(), ListingConfig::default());
    let params = ListParams::new()
        .with_segment("popular")
        .with_filter("featured", "false");
    let listing = getter.perform("Article", &params).await.unwrap();
    assert_listing(&listing, 1, &[3]);
}

#[tokio::test]
async fn test_failing_segment() {
    let getter = getter_with(article_with_computed_segments(), ListingConfig::default());
    let err = getter
        .perform("Article", &ListParams::new().with_segment("unavailable"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(matches!(err, ListingError::SegmentResolution { ref segment, .. } if segment == "unavailable"));
}

#[tokio::test]
async fn test_segment_timeout() {
    let config = ListingConfig::default().with_segment_timeout(Duration::from_millis(50));
    let getter = getter_with(article_with_computed_segments(), config);
    let err = getter
        .perform("Article", &ListParams::new().with_segment("stalled"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert!(matches!(
        err,
        ListingError::Timeout {
            stage: Stage::Resolving,
            ..
        }
    ));
}

#[tokio::test]
async fn test_unknown_segment() {
    let getter = create_getter();
    let err = getter
        .perform("Article", &ListParams::new().with_segment("trending"))
        .await
        .unwrap_err();
    assert!(matches!(
        assert_validation_error(&err),
        ValidationError::UnknownSegment { segment, .. } if segment == "trending"
    ));
}

// ============================================================================
// Execution bounds
// ============================================================================

/// Delays every call before delegating to SQLite.
#[derive(Debug)]
struct SlowExecutor {
    inner: Arc<SqliteBackend>,
    delay: Duration,
}

#[async_trait]
impl QueryExecutor for SlowExecutor {
    fn name(&self) -> &'static str {
        "slow-sqlite"
    }

    fn operators(&self) -> &dyn helios_listing::query::OperatorCatalog {
        self.inner.operators()
    }

    async fn count(&self, schema: &EntitySchema, options: &QueryOptions) -> ListingResult<u64> {
        tokio::time::sleep(self.delay).await;
        self.inner.count(schema, options).await
    }

    async fn find_all(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> ListingResult<Vec<Record>> {
        tokio::time::sleep(self.delay).await;
        self.inner.find_all(schema, options).await
    }

    async fn select_raw(&self, sql: &str, kind: StatementKind) -> ListingResult<Vec<Record>> {
        tokio::time::sleep(self.delay).await;
        self.inner.select_raw(sql, kind).await
    }
}

fn slow_getter(delay: Duration, timeout: Duration) -> ResourcesGetter<dyn QueryExecutor> {
    let executor: Arc<dyn QueryExecutor> = Arc::new(SlowExecutor {
        inner: seeded_backend(),
        delay,
    });
    ResourcesGetter::new(
        registry_with(article_schema()),
        executor,
        ListingConfig::default().with_query_timeout(timeout),
    )
}

#[tokio::test]
async fn test_query_timeout() {
    let getter = slow_getter(Duration::from_secs(5), Duration::from_millis(50));

    let err = getter.perform("Article", &ListParams::new()).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
    assert!(matches!(
        err,
        ListingError::Timeout {
            stage: Stage::Executing,
            ..
        }
    ));

    let params = ListParams::new().with_query("SELECT id FROM articles");
    let err = getter.perform("Article", &params).await.unwrap_err();
    assert!(matches!(
        err,
        ListingError::Timeout {
            stage: Stage::LiveQuery,
            ..
        }
    ));
}

#[tokio::test]
async fn test_dyn_executor_within_bounds() {
    let getter = slow_getter(Duration::from_millis(5), Duration::from_secs(5));
    let listing = getter
        .perform("Article", &ListParams::new().with_filter("status", "draft"))
        .await
        .unwrap();
    assert_listing(&listing, 2, &[5, 2]);
}
