//! Segment resolution.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BoxError, ListingError, ListingResult, Stage, ValidationError};
use crate::schema::{EntitySchema, Segment, SegmentPredicate};
use crate::types::{ListParams, Predicate};

/// Computes a segment predicate from the request parameters.
#[async_trait]
pub trait SegmentQuery: Send + Sync {
    /// Returns the predicate restricting the segment.
    async fn resolve(&self, params: &ListParams) -> Result<Predicate, BoxError>;
}

/// The outcome of resolving a segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSegment {
    /// Predicate ANDed into the WHERE clause (neutral without a segment).
    pub predicate: Predicate,
    /// Named scope applied as a pre-filter.
    pub scope: Option<String>,
}

/// Resolves the segment named by a request.
#[derive(Debug, Clone, Copy)]
pub struct SegmentResolver {
    timeout: Duration,
}

impl SegmentResolver {
    /// Creates a resolver bounding computed segments by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Finds the requested segment and checks its scope, without I/O.
    pub fn lookup<'s>(
        &self,
        schema: &'s EntitySchema,
        params: &ListParams,
    ) -> Result<Option<&'s Segment>, ValidationError> {
        let Some(name) = params.segment.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        let segment = schema
            .get_segment(name)
            .ok_or_else(|| ValidationError::UnknownSegment {
                entity: schema.name.clone(),
                segment: name.to_string(),
            })?;

        if let Some(scope) = &segment.scope
            && !schema.scopes.contains_key(scope)
        {
            return Err(ValidationError::UnknownScope {
                entity: schema.name.clone(),
                scope: scope.clone(),
            });
        }

        Ok(Some(segment))
    }

    /// Resolves the requested segment. Without a segment the result is neutral.
    pub async fn resolve(
        &self,
        schema: &EntitySchema,
        params: &ListParams,
    ) -> ListingResult<ResolvedSegment> {
        let Some(segment) = self.lookup(schema, params)? else {
            return Ok(ResolvedSegment::default());
        };

        let predicate = match &segment.predicate {
            None => Predicate::neutral(),
            Some(SegmentPredicate::Static(predicate)) => predicate.clone(),
            Some(SegmentPredicate::Computed(query)) => {
                debug!(entity = %schema.name, segment = %segment.name, "resolving computed segment");
                match tokio::time::timeout(self.timeout, query.resolve(params)).await {
                    Ok(Ok(predicate)) => predicate,
                    Ok(Err(source)) => {
                        return Err(ListingError::SegmentResolution {
                            segment: segment.name.clone(),
                            source,
                        });
                    }
                    Err(_) => {
                        return Err(ListingError::Timeout {
                            stage: Stage::Resolving,
                            timeout: self.timeout,
                        });
                    }
                }
            }
        };

        Ok(ResolvedSegment {
            predicate,
            scope: segment.scope.clone(),
        })
    }
}
