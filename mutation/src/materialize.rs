//! Turn an input argument tree into a storable document.
//!
//! Field validators run for every declared field, supplied or not. Referenced
//! objects collapse to their foreign key, embedded ones recurse, and
//! referenced lists are set aside as collection deltas to apply once the
//! parent identifier is known.

use std::collections::BTreeMap;

use futures::future::{BoxFuture, FutureExt};
use morph_core::{Document, ObjectId, Value};
use morph_registry::{FieldDef, FieldShape, Operation, Registry, ScalarType};
use morph_store::SessionHandle;

use crate::{MutationError, MutationResult};

/// `{added, updated, deleted}` for one referenced list field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionDelta {
    pub added: Vec<Document>,
    pub updated: Vec<Document>,
    pub deleted: Vec<ObjectId>,
}

impl CollectionDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    fn parse(entity: &str, field: &str, value: &Value) -> MutationResult<Self> {
        let invalid = |reason: &str| MutationError::invalid_value(entity, field, reason);
        let doc = value
            .as_object()
            .ok_or_else(|| invalid("expected {added, updated, deleted}"))?;
        let documents = |key: &str| -> MutationResult<Vec<Document>> {
            match doc.get(key) {
                None | Some(Value::Null) => Ok(Vec::new()),
                Some(Value::List(items)) => items
                    .iter()
                    .map(|item| item.as_object().cloned().ok_or_else(|| invalid("expected objects")))
                    .collect(),
                Some(_) => Err(invalid("expected a list")),
            }
        };
        let deleted = match doc.get("deleted") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::List(items)) => items
                .iter()
                .map(|item| item.to_id().ok_or_else(|| invalid("deleted expects identifiers")))
                .collect::<MutationResult<_>>()?,
            Some(_) => return Err(invalid("deleted expects a list")),
        };
        Ok(Self {
            added: documents("added")?,
            updated: documents("updated")?,
            deleted,
        })
    }
}

/// Foreign key stamped on a child created or updated through a collection delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    pub connection_field: String,
    pub parent: ObjectId,
}

/// A materialized document plus the collection deltas found in its input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materialized {
    pub model: Document,
    /// Deltas by referenced list field, in field order.
    pub collections: BTreeMap<String, CollectionDelta>,
}

/// Materialize `args` as `entity` for `operation`.
pub fn materialize<'a>(
    registry: &'a Registry,
    entity: &'a str,
    args: &'a Document,
    operation: Operation,
    link: Option<&'a ParentLink>,
    session: &'a SessionHandle,
) -> BoxFuture<'a, MutationResult<Materialized>> {
    async move {
        let def = &registry.entity(entity)?.def;
        let mut materialized = Materialized::default();

        for field in &def.fields {
            let value = args.get(&field.name).filter(|v| !v.is_empty());
            for validator in field.validators_for(operation) {
                validator.validate(entity, &field.name, value, session).await?;
            }
            let Some(value) = value else {
                continue;
            };
            if field.name == "id" {
                continue;
            }

            let shape = field.shape().ok_or_else(|| {
                MutationError::configuration(entity, format!("field {} does not define a relation", field.name))
            })?;
            match shape {
                FieldShape::Scalar { ty, list } => {
                    let stored = coerce(entity, field, ty, list, value)?;
                    materialized.model.insert(field.name.clone(), stored);
                }
                FieldShape::Enum { .. } => {
                    materialized.model.insert(field.name.clone(), value.clone());
                }
                FieldShape::ReferencedObject { relation, .. } => {
                    let id = value
                        .as_object()
                        .and_then(|doc| doc.get("id"))
                        .and_then(Value::to_id)
                        .ok_or_else(|| MutationError::invalid_value(entity, &field.name, "expected {id}"))?;
                    materialized
                        .model
                        .insert(relation.connection_field.clone(), Value::Id(id));
                }
                FieldShape::EmbeddedObject { target } => {
                    let nested = nested_args(entity, field, value)?;
                    let inner = materialize(registry, target, nested, operation, None, session).await?;
                    inner.embeddable(target)?;
                    materialized
                        .model
                        .insert(field.name.clone(), Value::Object(inner.model));
                }
                FieldShape::EmbeddedList { target } => {
                    let items = value
                        .as_list()
                        .ok_or_else(|| MutationError::invalid_value(entity, &field.name, "expected a list"))?;
                    let mut entries = Vec::with_capacity(items.len());
                    for item in items {
                        let nested = nested_args(entity, field, item)?;
                        let inner = materialize(registry, target, nested, operation, None, session).await?;
                        inner.embeddable(target)?;
                        entries.push(Value::Object(inner.model));
                    }
                    materialized.model.insert(field.name.clone(), Value::List(entries));
                }
                FieldShape::ReferencedList { .. } => {
                    let delta = CollectionDelta::parse(entity, &field.name, value)?;
                    materialized.collections.insert(field.name.clone(), delta);
                }
            }
        }

        if let Some(link) = link {
            materialized
                .model
                .insert(link.connection_field.clone(), Value::Id(link.parent));
        }

        for validator in def.validators_for(operation) {
            validator
                .validate(entity, args, &materialized.model, session)
                .await?;
        }
        Ok(materialized)
    }
    .boxed()
}

impl Materialized {
    /// Embedded documents have no identifier to link children to.
    fn embeddable(&self, target: &str) -> MutationResult<()> {
        match self.collections.keys().next() {
            Some(field) => Err(MutationError::NestedDelta {
                entity: target.to_string(),
                field: field.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn nested_args<'v>(entity: &str, field: &FieldDef, value: &'v Value) -> MutationResult<&'v Document> {
    value
        .as_object()
        .ok_or_else(|| MutationError::invalid_value(entity, &field.name, "expected an object"))
}

fn coerce(entity: &str, field: &FieldDef, ty: ScalarType, list: bool, value: &Value) -> MutationResult<Value> {
    let one = |v: &Value| {
        ty.coerce(v).ok_or_else(|| {
            MutationError::invalid_value(entity, &field.name, format!("expected {}, got {}", ty, v.type_name()))
        })
    };
    match (list, value) {
        (true, Value::List(items)) => items.iter().map(one).collect::<MutationResult<Vec<_>>>().map(Value::List),
        (true, _) => Err(MutationError::invalid_value(entity, &field.name, "expected a list")),
        (false, v) => one(v),
    }
}
