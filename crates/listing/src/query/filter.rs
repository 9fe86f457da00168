//! Filter clause building.

use crate::error::ValidationError;
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::types::{FieldPath, FilterType, ListParams, Predicate};

use super::value_parser::OperatorValueParser;

/// Builds the filter predicate of a request.
///
/// Every comma-separated value of every filter key becomes one leaf; the
/// leaves are combined under a single AND or OR node.
#[derive(Debug, Clone, Copy)]
pub struct FilterClauseBuilder<'a> {
    registry: &'a SchemaRegistry,
    parser: OperatorValueParser,
}

impl<'a> FilterClauseBuilder<'a> {
    /// Creates a builder.
    pub fn new(registry: &'a SchemaRegistry, parser: OperatorValueParser) -> Self {
        Self { registry, parser }
    }

    /// Builds the predicate. An empty filter map yields the neutral predicate.
    pub fn perform(
        &self,
        schema: &EntitySchema,
        params: &ListParams,
    ) -> Result<Predicate, ValidationError> {
        if params.filter.is_empty() {
            return Ok(Predicate::neutral());
        }

        let combination = params.combination()?;
        let tz = params.tz()?;
        let mut leaves = Vec::new();

        for (key, values) in &params.filter {
            let path = FieldPath::parse(key);
            let resolved = self.registry.resolve_field(schema, &path)?;
            let descriptor = resolved.descriptor;

            if descriptor.is_relation() || descriptor.is_virtual {
                return Err(ValidationError::InvalidFilterValue {
                    field: path.to_string(),
                    value: values.clone(),
                    message: if descriptor.is_relation() {
                        format!("filter on a field of the association, e.g. {}:id", descriptor.name)
                    } else {
                        "smart fields cannot be filtered".to_string()
                    },
                });
            }

            for value in values.split(',') {
                let condition = self.parser.perform(descriptor, &path, value, &tz)?;
                leaves.push(Predicate::leaf(path.clone(), condition));
            }
        }

        Ok(match combination {
            FilterType::And => Predicate::And(leaves),
            FilterType::Or => Predicate::Or(leaves),
        })
    }
}
