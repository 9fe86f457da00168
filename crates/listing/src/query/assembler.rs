//! Field set, joins, order and pagination of a listing.

use std::collections::BTreeSet;

use crate::config::ListingConfig;
use crate::error::ValidationError;
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::types::{FieldPath, Join, ListParams, OrderClause, Predicate};

/// Computes everything about the query that is not the WHERE clause.
#[derive(Debug, Clone, Copy)]
pub struct QueryAssembler<'a> {
    registry: &'a SchemaRegistry,
    default_page_size: u64,
    max_page_size: u64,
}

impl<'a> QueryAssembler<'a> {
    /// Creates an assembler.
    pub fn new(registry: &'a SchemaRegistry, config: &ListingConfig) -> Self {
        Self {
            registry,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    /// The effective field set, or `None` when the request selects no fields.
    ///
    /// The set always starts with the primary key fields, followed by the
    /// requested fields and the associations needed by filters and the sort.
    pub fn requested_fields(
        &self,
        schema: &EntitySchema,
        params: &ListParams,
    ) -> Result<Option<Vec<String>>, ValidationError> {
        let Some(requested) = params.fields.get(&schema.name) else {
            return Ok(None);
        };

        let mut fields: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !fields.iter().any(|f| f == name) {
                fields.push(name.to_string());
            }
        };

        for key in &schema.primary_keys {
            push(key.as_str());
        }
        for name in split_list(requested) {
            push(name);
        }
        for key in params.filter.keys() {
            if let Some(association) = FieldPath::parse(key).association {
                push(association.as_str());
            }
        }
        if let Some(association) = sort_path(params).and_then(|(path, _)| path.association) {
            push(association.as_str());
        }

        for name in &fields {
            if schema.get_field(name).is_none() {
                return Err(ValidationError::UnknownField {
                    entity: schema.name.clone(),
                    field: name.clone(),
                });
            }
        }
        Ok(Some(fields))
    }

    /// Local columns to select for an effective field set.
    pub fn attributes(&self, schema: &EntitySchema, fields: Option<&[String]>) -> Option<Vec<String>> {
        fields.map(|fields| {
            schema
                .stored_fields()
                .filter(|f| fields.contains(&f.name))
                .map(|f| f.name.clone())
                .collect()
        })
    }

    /// The joins needed by the field set, the predicate and the sort.
    pub fn includes(
        &self,
        schema: &EntitySchema,
        params: &ListParams,
        fields: Option<&[String]>,
        predicate: &Predicate,
    ) -> Result<Vec<Join>, ValidationError> {
        let mut associations: Vec<String> = schema
            .relations()
            .map(|(f, _)| f.name.clone())
            .filter(|name| fields.is_none_or(|fields| fields.contains(name)))
            .collect();

        let mut referenced: BTreeSet<String> = predicate.associations();
        if let Some(association) = sort_path(params).and_then(|(path, _)| path.association) {
            referenced.insert(association);
        }
        for association in referenced {
            if !associations.contains(&association) {
                associations.push(association);
            }
        }

        associations
            .into_iter()
            .map(|association| self.join(schema, params, association))
            .collect()
    }

    fn join(
        &self,
        schema: &EntitySchema,
        params: &ListParams,
        association: String,
    ) -> Result<Join, ValidationError> {
        let (target, relation) = self.registry.resolve_association(schema, &association)?;

        let attributes = match params.fields.get(&association) {
            Some(requested) => {
                let names: Vec<String> = split_list(requested).map(str::to_string).collect();
                for name in &names {
                    if target.get_field(name).is_none_or(|f| !f.is_stored()) {
                        return Err(ValidationError::UnknownField {
                            entity: target.name.clone(),
                            field: name.clone(),
                        });
                    }
                }
                names
            }
            None => target.stored_fields().map(|f| f.name.clone()).collect(),
        };

        Ok(Join {
            table: target.table.clone(),
            foreign_key: relation.foreign_key.clone(),
            target_key: relation.target_key.clone(),
            association,
            attributes,
        })
    }

    /// The sort order, with primary key tie-breakers appended.
    pub fn order(
        &self,
        schema: &EntitySchema,
        params: &ListParams,
    ) -> Result<Vec<OrderClause>, ValidationError> {
        let mut order = Vec::new();

        match sort_path(params) {
            None => order.push(OrderClause::desc(FieldPath::local(schema.primary_key_field()))),
            Some((path, descending)) => {
                let sort = params.sort.clone().unwrap_or_default();
                let resolved = self.registry.resolve_field(schema, &path).map_err(|e| {
                    ValidationError::InvalidSort {
                        sort: sort.clone(),
                        message: e.to_string(),
                    }
                })?;
                if !resolved.descriptor.is_stored() {
                    return Err(ValidationError::InvalidSort {
                        sort,
                        message: "only stored fields can be sorted on".to_string(),
                    });
                }
                order.push(if descending {
                    OrderClause::desc(path)
                } else {
                    OrderClause::asc(path)
                });
            }
        }

        for key in &schema.primary_keys {
            let path = FieldPath::local(key);
            if !order.iter().any(|o| o.path == path) {
                order.push(OrderClause::asc(path));
            }
        }
        Ok(order)
    }

    /// Returns `(offset, limit)`.
    pub fn pagination(&self, params: &ListParams) -> Result<(u64, u64), ValidationError> {
        let size = params.page.size.unwrap_or(self.default_page_size);
        let number = params.page.number.unwrap_or(1);

        if size == 0 || size > self.max_page_size {
            return Err(ValidationError::InvalidPage {
                message: format!("size must be between 1 and {}", self.max_page_size),
            });
        }
        if number == 0 {
            return Err(ValidationError::InvalidPage {
                message: "number must be at least 1".to_string(),
            });
        }

        let offset = (number - 1)
            .checked_mul(size)
            .ok_or_else(|| ValidationError::InvalidPage {
                message: "page number is too large".to_string(),
            })?;
        Ok((offset, size))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Parses the sort parameter into a path and a descending flag.
fn sort_path(params: &ListParams) -> Option<(FieldPath, bool)> {
    let sort = params.sort.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let (descending, name) = match sort.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, sort),
    };
    Some((FieldPath::parse(name), descending))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType};
    use crate::types::{Condition, Scalar, SortDirection};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas([
            EntitySchema::new("User", "users")
                .field(FieldDescriptor::new("id", FieldType::Integer))
                .field(FieldDescriptor::new("name", FieldType::String))
                .field(FieldDescriptor::new("email", FieldType::String)),
            EntitySchema::new("Article", "articles")
                .field(FieldDescriptor::new("id", FieldType::Integer))
                .field(FieldDescriptor::new("name", FieldType::String))
                .field(FieldDescriptor::new("status", FieldType::String))
                .field(FieldDescriptor::belongs_to("author", "User", "author_id", "id"))
                .field(FieldDescriptor::belongs_to("editor", "User", "editor_id", "id")),
            EntitySchema::new("ArticleTag", "article_tags")
                .field(FieldDescriptor::new("article_id", FieldType::Integer))
                .field(FieldDescriptor::new("tag", FieldType::String))
                .primary_key(["article_id", "tag"]),
        ])
        .unwrap()
    }

    fn assembler(registry: &SchemaRegistry) -> QueryAssembler<'_> {
        QueryAssembler::new(registry, &ListingConfig::default())
    }

    #[test]
    fn test_requested_fields_include_primary_key() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        let params = ListParams::new().with_fields("Article", "name");
        let fields = assembler(&registry).requested_fields(&schema, &params).unwrap();
        assert_eq!(fields, Some(vec!["id".to_string(), "name".to_string()]));

        assert_eq!(
            assembler(&registry)
                .requested_fields(&schema, &ListParams::new())
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_requested_fields_add_filter_and_sort_associations() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        let params = ListParams::new()
            .with_fields("Article", "name,id")
            .with_filter("author:email", "*@example.com")
            .with_sort("-editor.name");
        let fields = assembler(&registry).requested_fields(&schema, &params).unwrap();
        assert_eq!(
            fields,
            Some(vec![
                "id".to_string(),
                "name".to_string(),
                "author".to_string(),
                "editor".to_string()
            ])
        );
    }

    #[test]
    fn test_requested_unknown_field() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        let params = ListParams::new().with_fields("Article", "nope");
        assert!(matches!(
            assembler(&registry).requested_fields(&schema, &params),
            Err(ValidationError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_includes_follow_fields_and_predicate() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        let assembler = assembler(&registry);

        let all = assembler
            .includes(&schema, &ListParams::new(), None, &Predicate::neutral())
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].attributes, vec!["id", "name", "email"]);

        let fields = vec!["id".to_string(), "name".to_string()];
        let predicate = Predicate::leaf(
            FieldPath::joined("editor", "email"),
            Condition::Eq(Scalar::text("a@b.c")),
        );
        let params = ListParams::new().with_fields("editor", "email");
        let joins = assembler
            .includes(&schema, &params, Some(&fields), &predicate)
            .unwrap();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].association, "editor");
        assert_eq!(joins[0].foreign_key, "editor_id");
        assert_eq!(joins[0].attributes, vec!["email"]);
    }

    #[test]
    fn test_default_order_is_primary_key_descending() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        let order = assembler(&registry).order(&schema, &ListParams::new()).unwrap();
        assert_eq!(order, vec![OrderClause::desc(FieldPath::local("id"))]);
    }

    #[test]
    fn test_order_appends_tie_breakers() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        let params = ListParams::new().with_sort("-author.name");
        let order = assembler(&registry).order(&schema, &params).unwrap();
        assert_eq!(order.len(), 2);
        assert_eq!(order[0].path, FieldPath::joined("author", "name"));
        assert_eq!(order[0].direction, SortDirection::Descending);
        assert_eq!(order[1], OrderClause::asc(FieldPath::local("id")));

        let tags = registry.get("ArticleTag").unwrap();
        let order = assembler(&registry).order(&tags, &ListParams::new()).unwrap();
        assert_eq!(
            order,
            vec![
                OrderClause::desc(FieldPath::local("article_id")),
                OrderClause::asc(FieldPath::local("tag")),
            ]
        );
    }

    #[test]
    fn test_invalid_sort() {
        let registry = registry();
        let schema = registry.get("Article").unwrap();
        for sort in ["nope", "author", "author.nope"] {
            let params = ListParams::new().with_sort(sort);
            assert!(
                matches!(
                    assembler(&registry).order(&schema, &params),
                    Err(ValidationError::InvalidSort { .. })
                ),
                "accepted sort {sort}"
            );
        }
    }

    #[test]
    fn test_pagination() {
        let registry = registry();
        let assembler = assembler(&registry);
        assert_eq!(assembler.pagination(&ListParams::new()).unwrap(), (0, 10));
        assert_eq!(
            assembler.pagination(&ListParams::new().with_page(3, 25)).unwrap(),
            (50, 25)
        );
        assert!(assembler.pagination(&ListParams::new().with_page(0, 10)).is_err());
        assert!(assembler.pagination(&ListParams::new().with_page(1, 0)).is_err());
        assert!(assembler.pagination(&ListParams::new().with_page(1, 5000)).is_err());
    }
}
