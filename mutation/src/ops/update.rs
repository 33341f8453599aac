//! Update operation - applies a partial change to a stored document.

use futures::future::{BoxFuture, FutureExt};
use morph_core::{Document, Value};
use morph_registry::{FieldShape, Operation, Registry};
use morph_store::{SessionHandle, UpdateSpec};
use tracing::debug;

use crate::materialize::{materialize, ParentLink};
use crate::ops::execute_collections;
use crate::{MutationError, MutationResult};

/// Update the document of `entity` identified by `args.id`.
///
/// Collection deltas are applied first. Embedded objects shallow-merge over
/// the stored value, embedded lists replace it, and an explicit null on a
/// nullable field removes the field.
pub fn execute_update<'a>(
    registry: &'a Registry,
    session: &'a SessionHandle,
    entity: &'a str,
    args: &'a Document,
    link: Option<ParentLink>,
) -> BoxFuture<'a, MutationResult<Document>> {
    async move {
        let descriptor = registry.entity(entity)?;
        let collection = registry.collection_of(entity)?;
        let id = args
            .get("id")
            .and_then(Value::to_id)
            .ok_or_else(|| MutationError::invalid_value(entity, "id", "an identifier is required"))?;

        let materialized =
            materialize(registry, entity, args, Operation::Update, link.as_ref(), session).await?;
        execute_collections(registry, session, entity, id, &materialized.collections).await?;

        let current = session
            .find_by_id(collection, id)
            .await?
            .ok_or_else(|| MutationError::not_found(entity, id))?;

        let mut changes = materialized.model;
        let mut unset = Vec::new();
        for field in &descriptor.def.fields {
            let shape = field.shape();
            if let (Some(FieldShape::EmbeddedObject { .. }), Some(Value::Object(old))) =
                (shape, current.get(&field.name))
            {
                if let Some(Value::Object(new)) = changes.get_mut(&field.name) {
                    let mut merged = old.clone();
                    merged.append(new);
                    *new = merged;
                }
            }
            if field.nullable && matches!(args.get(&field.name), Some(Value::Null)) {
                let stored = match shape {
                    Some(FieldShape::ReferencedObject { relation, .. }) => relation.connection_field.clone(),
                    _ => field.name.clone(),
                };
                unset.push(stored);
            }
        }

        if let Some(controller) = &descriptor.controller {
            controller.on_updating(id, &mut changes, args, session).await?;
        }

        let updated = session
            .find_by_id_and_update(collection, id, UpdateSpec { set: changes, unset })
            .await?
            .ok_or_else(|| MutationError::not_found(entity, id))?;

        if let Some(controller) = &descriptor.controller {
            controller.on_updated(&updated, args, session).await?;
        }
        debug!(entity, id = %id, "document updated");
        Ok(updated)
    }
    .boxed()
}
