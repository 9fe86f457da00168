//! Free-text search.
//!
//! The search term becomes a disjunction of per-field matches. Smart fields
//! contribute through [`SearchHook`]s, which edit the query options directly.

use tracing::error;

use crate::error::{BoxError, SearchHookFailure};
use crate::schema::{EntitySchema, FieldDescriptor, FieldType, SchemaRegistry};
use crate::types::{Condition, FieldPath, Predicate, QueryOptions, Scalar};

use super::value_parser::escape_like;

/// Custom search logic attached to a smart field.
///
/// A hook typically calls `options.where_clause.extend_search(...)` to add an
/// alternative to the search disjunction, and may add joins.
pub trait SearchHook: Send + Sync {
    /// Applies the hook to one option set.
    fn search(&self, options: &mut QueryOptions, term: &str) -> Result<(), BoxError>;
}

impl<F> SearchHook for F
where
    F: Fn(&mut QueryOptions, &str) -> Result<(), BoxError> + Send + Sync,
{
    fn search(&self, options: &mut QueryOptions, term: &str) -> Result<(), BoxError> {
        self(options, term)
    }
}

/// Builds search predicates and runs search hooks.
#[derive(Debug, Clone, Copy)]
pub struct SearchClauseBuilder<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> SearchClauseBuilder<'a> {
    /// Creates a builder.
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Builds the search disjunction for `term`.
    ///
    /// `fields` restricts the searched fields; `None` searches every field.
    /// With `extended`, string fields of the associations in scope are
    /// searched too. Returns `Or([])` when no field can match the term.
    pub fn perform(
        &self,
        schema: &EntitySchema,
        fields: Option<&[String]>,
        term: &str,
        extended: bool,
    ) -> Predicate {
        let in_scope = |name: &str| fields.is_none_or(|f| f.iter().any(|n| n == name));
        let mut alternatives = Vec::new();

        for field in schema.stored_fields().filter(|f| in_scope(&f.name)) {
            if let Some(condition) = match_condition(field, term) {
                alternatives.push(Predicate::leaf(FieldPath::local(&field.name), condition));
            }
        }

        if extended {
            for (field, relation) in schema.relations().filter(|(f, _)| in_scope(&f.name)) {
                let Some(target) = self.registry.get(&relation.target) else {
                    continue;
                };
                for joined in target
                    .stored_fields()
                    .filter(|f| f.field_type == FieldType::String)
                {
                    alternatives.push(Predicate::leaf(
                        FieldPath::joined(&field.name, &joined.name),
                        Condition::Like(contains(term)),
                    ));
                }
            }
        }

        Predicate::Or(alternatives)
    }

    /// Runs every search hook of `schema` against both option sets.
    ///
    /// Each hook works on clones; its edits are committed only if it succeeds
    /// on both. A failing hook is logged and skipped.
    pub fn apply_hooks(
        &self,
        schema: &EntitySchema,
        term: &str,
        count_options: &mut QueryOptions,
        fetch_options: &mut QueryOptions,
    ) {
        for field in &schema.fields {
            let Some(hook) = &field.search_hook else {
                continue;
            };

            let mut count_draft = count_options.clone();
            let mut fetch_draft = fetch_options.clone();
            let outcome = hook
                .search(&mut count_draft, term)
                .and_then(|_| hook.search(&mut fetch_draft, term));

            match outcome {
                Ok(()) => {
                    *count_options = count_draft;
                    *fetch_options = fetch_draft;
                }
                Err(err) => {
                    let failure = SearchHookFailure {
                        field: field.name.clone(),
                        message: err.to_string(),
                    };
                    error!(entity = %schema.name, field = %field.name, "{}", failure);
                }
            }
        }
    }
}

fn contains(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

fn match_condition(field: &FieldDescriptor, term: &str) -> Option<Condition> {
    match &field.field_type {
        FieldType::String => Some(Condition::Like(contains(term))),
        FieldType::Integer => term.parse::<i64>().ok().map(|i| Condition::Eq(Scalar::Integer(i))),
        FieldType::Float => term
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| Condition::Eq(Scalar::Float(f))),
        FieldType::Enum(values) => values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(term))
            .map(|v| Condition::Eq(Scalar::text(v.clone()))),
        FieldType::Uuid => uuid::Uuid::parse_str(term)
            .ok()
            .map(|u| Condition::Eq(Scalar::Text(u.to_string()))),
        FieldType::Boolean | FieldType::Date | FieldType::Json => None,
    }
}
