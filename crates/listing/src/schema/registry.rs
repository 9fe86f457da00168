//! Entity registry.
//!
//! The registry holds every entity schema known to the pipeline, indexed by
//! entity name. It is built once at startup and shared read-only behind an
//! `Arc`, so lookups need no locking.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{SchemaError, ValidationError};
use crate::types::FieldPath;

use super::types::{EntitySchema, FieldDescriptor, Relation};

/// A field path resolved against the registry.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedField<'a> {
    /// The entity owning the field: the listed entity, or the association target.
    pub entity: &'a EntitySchema,
    /// The field itself.
    pub descriptor: &'a FieldDescriptor,
    /// The association traversed, for joined paths.
    pub relation: Option<&'a Relation>,
}

/// In-memory registry of entity schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: HashMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a list of schemas and validates it.
    pub fn from_schemas(schemas: impl IntoIterator<Item = EntitySchema>) -> Result<Self, SchemaError> {
        let mut registry = Self::new();
        for schema in schemas {
            registry.register(schema)?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Registers an entity schema.
    pub fn register(&mut self, schema: EntitySchema) -> Result<(), SchemaError> {
        if self.entities.contains_key(&schema.name) {
            return Err(SchemaError::DuplicateEntity {
                entity: schema.name,
            });
        }
        self.entities.insert(schema.name.clone(), Arc::new(schema));
        Ok(())
    }

    /// Looks up an entity schema.
    pub fn get(&self, entity: &str) -> Option<Arc<EntitySchema>> {
        self.entities.get(entity).cloned()
    }

    /// Looks up an entity schema, failing with a validation error when unknown.
    pub fn require(&self, entity: &str) -> Result<Arc<EntitySchema>, ValidationError> {
        self.get(entity).ok_or_else(|| ValidationError::UnknownEntity {
            entity: entity.to_string(),
        })
    }

    /// Returns the number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity is registered.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns registered entity names, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolves the target schema and relation of an association.
    pub fn resolve_association<'a>(
        &'a self,
        schema: &'a EntitySchema,
        association: &str,
    ) -> Result<(&'a EntitySchema, &'a Relation), ValidationError> {
        let unknown = || ValidationError::UnknownAssociation {
            entity: schema.name.clone(),
            association: association.to_string(),
        };
        let relation = schema
            .get_field(association)
            .and_then(|f| f.relation.as_ref())
            .ok_or_else(unknown)?;
        let target = self
            .entities
            .get(&relation.target)
            .map(Arc::as_ref)
            .ok_or_else(unknown)?;
        Ok((target, relation))
    }

    /// Resolves a field path against an entity.
    ///
    /// Local paths resolve against `schema`; joined paths resolve the
    /// association first and then the field on its target entity.
    pub fn resolve_field<'a>(
        &'a self,
        schema: &'a EntitySchema,
        path: &FieldPath,
    ) -> Result<ResolvedField<'a>, ValidationError> {
        match &path.association {
            None => {
                let descriptor =
                    schema
                        .get_field(&path.field)
                        .ok_or_else(|| ValidationError::UnknownField {
                            entity: schema.name.clone(),
                            field: path.field.clone(),
                        })?;
                Ok(ResolvedField {
                    entity: schema,
                    descriptor,
                    relation: None,
                })
            }
            Some(association) => {
                let (target, relation) = self.resolve_association(schema, association)?;
                let descriptor =
                    target
                        .get_field(&path.field)
                        .ok_or_else(|| ValidationError::UnknownField {
                            entity: target.name.clone(),
                            field: path.field.clone(),
                        })?;
                Ok(ResolvedField {
                    entity: target,
                    descriptor,
                    relation: Some(relation),
                })
            }
        }
    }

    /// Checks cross-entity consistency: relation targets exist and primary
    /// key fields are declared.
    pub fn validate(&self) -> Result<(), SchemaError> {
        for schema in self.entities.values() {
            if schema.primary_keys.is_empty() {
                return Err(SchemaError::MissingPrimaryKey {
                    entity: schema.name.clone(),
                });
            }
            for key in &schema.primary_keys {
                if schema.get_field(key).is_none_or(|f| !f.is_stored()) {
                    return Err(SchemaError::UnknownPrimaryKey {
                        entity: schema.name.clone(),
                        field: key.clone(),
                    });
                }
            }
            for (field, relation) in schema.relations() {
                if !self.entities.contains_key(&relation.target) {
                    return Err(SchemaError::UnknownRelationTarget {
                        entity: schema.name.clone(),
                        field: field.name.clone(),
                        target: relation.target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
