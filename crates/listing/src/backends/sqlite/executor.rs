//! [`QueryExecutor`] implementation for SQLite.
//!
//! rusqlite is synchronous, so every statement runs on the blocking pool
//! with its own pooled connection.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::ValueRef;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::{QueryExecutor, StatementKind};
use crate::error::{BackendError, ListingError, ListingResult};
use crate::query::OperatorCatalog;
use crate::schema::EntitySchema;
use crate::types::{QueryOptions, Record};

use super::SqliteBackend;
use super::compiler::{SqlCompiler, SqlFragment};

#[async_trait]
impl QueryExecutor for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn operators(&self) -> &dyn OperatorCatalog {
        self.sqlite_operators()
    }

    async fn count(&self, schema: &EntitySchema, options: &QueryOptions) -> ListingResult<u64> {
        let fragment = SqlCompiler::new(self.operators(), schema).count(options)?;
        debug!(entity = %schema.name, sql = %fragment.sql, "count");

        let pool = self.pool();
        run_blocking(move || {
            let conn = pool.get()?;
            let params = fragment.bind();
            let count: i64 = conn.query_row(&fragment.sql, params.as_slice(), |row| row.get(0))?;
            Ok(u64::try_from(count).unwrap_or_default())
        })
        .await
    }

    async fn find_all(
        &self,
        schema: &EntitySchema,
        options: &QueryOptions,
    ) -> ListingResult<Vec<Record>> {
        let fragment = SqlCompiler::new(self.operators(), schema).select(options)?;
        debug!(entity = %schema.name, sql = %fragment.sql, params = fragment.params.len(), "find_all");

        let pool = self.pool();
        run_blocking(move || query_records(&pool, &fragment, true)).await
    }

    async fn select_raw(&self, sql: &str, kind: StatementKind) -> ListingResult<Vec<Record>> {
        debug!(sql = %sql, ?kind, "raw select");
        let fragment = SqlFragment::new(sql);

        let pool = self.pool();
        match kind {
            StatementKind::Select => {
                run_blocking(move || query_records(&pool, &fragment, false)).await
            }
        }
    }
}

async fn run_blocking<T, F>(work: F) -> ListingResult<T>
where
    F: FnOnce() -> ListingResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        ListingError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: format!("blocking task failed: {}", e),
            source: Some(Box::new(e)),
        })
    })?
}

fn query_records(
    pool: &Pool<SqliteConnectionManager>,
    fragment: &SqlFragment,
    nest: bool,
) -> ListingResult<Vec<Record>> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(&fragment.sql)?;

    let columns: Vec<(String, Option<String>)> = stmt
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.decl_type().map(str::to_ascii_uppercase)))
        .collect();

    let params = fragment.bind();
    let mut rows = stmt.query(params.as_slice())?;
    let mut records = Vec::new();

    while let Some(row) = rows.next()? {
        let mut attributes = Map::new();
        let mut associations = Vec::new();
        for (i, (name, decl_type)) in columns.iter().enumerate() {
            let value = decode_value(row.get_ref(i)?, decl_type.as_deref());
            match name.split_once('.') {
                Some((association, field)) if nest => {
                    if !associations.contains(&association) {
                        associations.push(association);
                    }
                    let nested = attributes
                        .entry(association.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if let Value::Object(nested) = nested {
                        nested.insert(field.to_string(), value);
                    }
                }
                _ => {
                    attributes.insert(name.clone(), value);
                }
            }
        }
        collapse_absent_associations(&mut attributes, &associations);
        records.push(Record::new(attributes));
    }

    Ok(records)
}

/// A LEFT JOIN without a match yields only NULL columns; report it as `null`.
fn collapse_absent_associations(attributes: &mut Map<String, Value>, associations: &[&str]) {
    for association in associations {
        if let Some(value) = attributes.get_mut(*association)
            && value
                .as_object()
                .is_some_and(|nested| nested.values().all(Value::is_null))
        {
            *value = Value::Null;
        }
    }
}

fn decode_value(value: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if decl_type.is_some_and(|t| t.starts_with("BOOL")) => {
            Value::Bool(i != 0)
        }
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            if decl_type == Some("JSON") {
                serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
            } else {
                Value::String(text.into_owned())
            }
        }
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}
