//! Test fixtures for listing tests.
//!
//! A small blog: users, articles written by users, and article tags keyed
//! by `(article_id, tag)`.

use std::sync::Arc;

use helios_listing::backends::sqlite::SqliteBackend;
use helios_listing::schema::{EntitySchema, FieldDescriptor, FieldType, Segment};
use helios_listing::types::{Condition, FieldPath, Predicate, Scalar};
use helios_listing::{ListingConfig, ResourcesGetter, SchemaRegistry};

/// DDL and seed rows for the fixture database.
pub const SEED_SQL: &str = "
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL
);
CREATE TABLE articles (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    views INTEGER NOT NULL DEFAULT 0,
    published_at TEXT,
    featured BOOLEAN NOT NULL DEFAULT 0,
    author_id INTEGER REFERENCES users(id)
);
CREATE TABLE article_tags (
    article_id INTEGER NOT NULL REFERENCES articles(id),
    tag TEXT NOT NULL,
    weight INTEGER NOT NULL,
    PRIMARY KEY (article_id, tag)
);

INSERT INTO users VALUES (1, 'Ada Lovelace', 'ada@example.com');
INSERT INTO users VALUES (2, 'Grace Hopper', 'grace@example.com');

INSERT INTO articles VALUES (1, 'Rust ownership', 'published', 120, '2024-05-01T09:00:00Z', 1, 1);
INSERT INTO articles VALUES (2, 'SQL joins', 'draft', 15, NULL, 0, 2);
INSERT INTO articles VALUES (3, 'Async Rust', 'published', 300, '2024-05-14T18:30:00Z', 0, 1);
INSERT INTO articles VALUES (4, 'Archived notes', 'archived', 2, '2023-12-31T23:00:00Z', 0, NULL);
INSERT INTO articles VALUES (5, 'Pagination tips', 'draft', 40, NULL, 0, 2);

INSERT INTO article_tags VALUES (1, 'rust', 1);
INSERT INTO article_tags VALUES (1, 'memory', 2);
INSERT INTO article_tags VALUES (3, 'rust', 1);
INSERT INTO article_tags VALUES (3, 'async', 3);
INSERT INTO article_tags VALUES (2, 'sql', 1);
";

/// The `User` entity.
pub fn user_schema() -> EntitySchema {
    EntitySchema::new("User", "users")
        .field(FieldDescriptor::new("id", FieldType::Integer))
        .field(FieldDescriptor::new("name", FieldType::String))
        .field(FieldDescriptor::new("email", FieldType::String))
}

/// The `Article` entity, with a `published` segment and a `visible` scope.
pub fn article_schema() -> EntitySchema {
    EntitySchema::new("Article", "articles")
        .field(FieldDescriptor::new("id", FieldType::Integer))
        .field(FieldDescriptor::new("name", FieldType::String))
        .field(FieldDescriptor::new(
            "status",
            FieldType::Enum(vec![
                "published".to_string(),
                "draft".to_string(),
                "archived".to_string(),
            ]),
        ))
        .field(FieldDescriptor::new("views", FieldType::Integer))
        .field(FieldDescriptor::new("published_at", FieldType::Date))
        .field(FieldDescriptor::new("featured", FieldType::Boolean))
        .field(FieldDescriptor::belongs_to("author", "User", "author_id", "id"))
        .scope(
            "visible",
            Predicate::leaf(
                FieldPath::local("status"),
                Condition::Ne(Scalar::text("archived")),
            ),
        )
        .segment(Segment::new("published").with_where(status_is("published")))
        .segment(Segment::new("visible").with_scope("visible"))
}

/// The `ArticleTag` entity, keyed by `(article_id, tag)`.
pub fn article_tag_schema() -> EntitySchema {
    EntitySchema::new("ArticleTag", "article_tags")
        .field(FieldDescriptor::new("article_id", FieldType::Integer))
        .field(FieldDescriptor::new("tag", FieldType::String))
        .field(FieldDescriptor::new("weight", FieldType::Integer))
        .primary_key(["article_id", "tag"])
}

/// `status = <status>`.
pub fn status_is(status: &str) -> Predicate {
    Predicate::leaf(FieldPath::local("status"), Condition::Eq(Scalar::text(status)))
}

/// A registry of the fixture entities, with `article` in place of the default article schema.
pub fn registry_with(article: EntitySchema) -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::from_schemas([user_schema(), article, article_tag_schema()])
            .expect("fixture schemas are valid"),
    )
}

/// An in-memory backend seeded with [`SEED_SQL`].
pub fn seeded_backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.execute_batch(SEED_SQL).expect("Failed to seed database");
    Arc::new(backend)
}

/// A getter over the seeded backend with the default article schema.
pub fn create_getter() -> ResourcesGetter<SqliteBackend> {
    getter_with(article_schema(), ListingConfig::default())
}

/// A getter over the seeded backend.
pub fn getter_with(article: EntitySchema, config: ListingConfig) -> ResourcesGetter<SqliteBackend> {
    ResourcesGetter::new(registry_with(article), seeded_backend(), config)
}
