//! The listing orchestrator.
//!
//! [`ResourcesGetter`] validates a request, resolves its segment, runs the
//! optional raw query, then executes the count and the page fetch
//! concurrently against a [`QueryExecutor`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::config::ListingConfig;
use crate::core::{QueryExecutor, StatementKind};
use crate::error::{ListingError, ListingResult, Stage};
use crate::query::{
    CompositeKeysManager, FilterClauseBuilder, LiveQueryChecker, OperatorValueParser,
    QueryAssembler, SearchClauseBuilder, SegmentResolver,
};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::types::{
    Condition, FieldPath, ListParams, Listing, OrderClause, Predicate, QueryOptions, Scalar,
    WhereClause,
};

/// Everything derived from a request before any I/O.
#[derive(Debug)]
struct ListingPlan {
    fields: Option<Vec<String>>,
    filter: Predicate,
    search: Option<Predicate>,
    order: Vec<OrderClause>,
    offset: u64,
    limit: u64,
}

/// Lists the records of one entity.
///
/// The getter is cheap to share: the registry and executor are behind `Arc`s
/// and every request builds its own options.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use helios_listing::backends::sqlite::SqliteBackend;
/// use helios_listing::{ListParams, ListingConfig, ResourcesGetter, SchemaRegistry};
///
/// # async fn example(registry: SchemaRegistry) -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(SqliteBackend::open("./data/listing.db")?);
/// let getter = ResourcesGetter::new(Arc::new(registry), backend, ListingConfig::default());
///
/// let params = ListParams::new()
///     .with_filter("status", "published,draft")
///     .with_filter_type("or")
///     .with_page(1, 20);
/// let listing = getter.perform("Article", &params).await?;
/// println!("{} matching, {} on this page", listing.count, listing.records.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ResourcesGetter<E: ?Sized> {
    registry: Arc<SchemaRegistry>,
    executor: Arc<E>,
    config: ListingConfig,
    clock: Option<DateTime<Utc>>,
}

impl<E: ?Sized> Clone for ResourcesGetter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            executor: Arc::clone(&self.executor),
            config: self.config.clone(),
            clock: self.clock,
        }
    }
}

impl<E: QueryExecutor + ?Sized> ResourcesGetter<E> {
    /// Creates a getter.
    pub fn new(registry: Arc<SchemaRegistry>, executor: Arc<E>, config: ListingConfig) -> Self {
        Self {
            registry,
            executor,
            config,
            clock: None,
        }
    }

    /// Pins the clock used by relative date filters.
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.clock = Some(now);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ListingConfig {
        &self.config
    }

    /// Runs the listing for `entity`.
    #[instrument(skip(self, params), fields(executor = self.executor.name()))]
    pub async fn perform(&self, entity: &str, params: &ListParams) -> ListingResult<Listing> {
        debug!(stage = %Stage::Validating);
        let schema = self.registry.require(entity)?;
        let plan = self.validate(&schema, params)?;

        debug!(stage = %Stage::Resolving);
        let segment = SegmentResolver::new(self.config.segment_timeout)
            .resolve(&schema, params)
            .await?;

        let live_ids = match params.live_query() {
            Some(query) => {
                debug!(stage = %Stage::LiveQuery);
                Some(self.live_query_ids(&schema, query).await?)
            }
            None => None,
        };

        let mut where_clause = WhereClause::new();
        if let Some(search) = plan.search {
            where_clause.set_search(search);
        }
        where_clause.push(plan.filter);
        where_clause.push(segment.predicate);
        if let Some(ids) = live_ids {
            where_clause.push(ids);
        }

        let assembler = QueryAssembler::new(&self.registry, &self.config);
        let includes = assembler.includes(
            &schema,
            params,
            plan.fields.as_deref(),
            &where_clause.to_predicate(),
        )?;

        let mut count_options = QueryOptions {
            where_clause,
            includes,
            scope: segment.scope,
            ..Default::default()
        };
        let mut fetch_options = QueryOptions {
            attributes: assembler.attributes(&schema, plan.fields.as_deref()),
            order: plan.order,
            offset: Some(plan.offset),
            limit: Some(plan.limit),
            ..count_options.clone()
        };

        if let Some(term) = params.search_term() {
            SearchClauseBuilder::new(&self.registry).apply_hooks(
                &schema,
                term,
                &mut count_options,
                &mut fetch_options,
            );
        }

        debug!(stage = %Stage::Executing);
        let timeout = self.config.query_timeout;
        let (count, mut records) = tokio::try_join!(
            bounded(
                timeout,
                Stage::Executing,
                self.executor.count(&schema, &count_options)
            ),
            bounded(
                timeout,
                Stage::Executing,
                self.executor.find_all(&schema, &fetch_options)
            ),
        )
        .map_err(ListingError::into_unprocessable)?;

        if schema.is_composite_primary() {
            CompositeKeysManager::new(&schema).decorate(&mut records);
        }

        debug!(stage = %Stage::Done, count, returned = records.len(), "listing complete");
        Ok(Listing { count, records })
    }

    /// Checks everything that needs no I/O.
    fn validate(&self, schema: &EntitySchema, params: &ListParams) -> ListingResult<ListingPlan> {
        params.tz()?;
        params.combination()?;

        let parser = match self.clock {
            Some(now) => OperatorValueParser::at(now),
            None => OperatorValueParser::new(),
        };
        let filter = FilterClauseBuilder::new(&self.registry, parser).perform(schema, params)?;

        let assembler = QueryAssembler::new(&self.registry, &self.config);
        let fields = assembler.requested_fields(schema, params)?;

        let search = params.search_term().map(|term| {
            SearchClauseBuilder::new(&self.registry).perform(
                schema,
                fields.as_deref(),
                term,
                params.search_extended,
            )
        });

        if let Some(query) = params.live_query() {
            LiveQueryChecker::new().perform(query)?;
        }

        let order = assembler.order(schema, params)?;
        let (offset, limit) = assembler.pagination(params)?;
        SegmentResolver::new(self.config.segment_timeout).lookup(schema, params)?;

        Ok(ListingPlan {
            fields,
            filter,
            search,
            order,
            offset,
            limit,
        })
    }

    /// Runs the raw query and restricts the listing to the keys it returns.
    async fn live_query_ids(&self, schema: &EntitySchema, query: &str) -> ListingResult<Predicate> {
        let rows = bounded(
            self.config.query_timeout,
            Stage::LiveQuery,
            self.executor.select_raw(query, StatementKind::Select),
        )
        .await
        .map_err(ListingError::into_unprocessable)?;

        let key = schema.primary_key_field();
        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let value = row.get(key).and_then(Scalar::from_json).ok_or_else(|| {
                ListingError::UnprocessableEntity {
                    message: format!("live query result has no '{}' column", key),
                }
            })?;
            ids.push(value);
        }

        debug!(ids = ids.len(), "live query resolved");
        Ok(Predicate::leaf(FieldPath::local(key), Condition::In(ids)))
    }
}

async fn bounded<T>(
    timeout: Duration,
    stage: Stage,
    work: impl Future<Output = ListingResult<T>>,
) -> ListingResult<T> {
    tokio::time::timeout(timeout, work)
        .await
        .unwrap_or(Err(ListingError::Timeout { stage, timeout }))
}
