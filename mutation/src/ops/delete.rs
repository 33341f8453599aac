//! Delete operation - removes a stored document.

use futures::future::{BoxFuture, FutureExt};
use morph_core::{doc, Document, ObjectId};
use morph_registry::{Operation, Registry};
use morph_store::SessionHandle;
use tracing::debug;

use crate::{MutationError, MutationResult};

/// Remove the document of `entity` identified by `id` and return it.
///
/// Delete validators see the stored values; `on_delete` runs before removal.
pub fn execute_delete<'a>(
    registry: &'a Registry,
    session: &'a SessionHandle,
    entity: &'a str,
    id: ObjectId,
) -> BoxFuture<'a, MutationResult<Document>> {
    async move {
        let descriptor = registry.entity(entity)?;
        let collection = registry.collection_of(entity)?;
        let current = session
            .find_by_id(collection, id)
            .await?
            .ok_or_else(|| MutationError::not_found(entity, id))?;

        for field in &descriptor.def.fields {
            for validator in field.validators_for(Operation::Delete) {
                validator
                    .validate(entity, &field.name, current.get(&field.name), session)
                    .await?;
            }
        }
        let args = doc! { "id" => id };
        for validator in descriptor.def.validators_for(Operation::Delete) {
            validator.validate(entity, &args, &current, session).await?;
        }

        if let Some(controller) = &descriptor.controller {
            controller.on_delete(&current, session).await?;
        }

        let removed = session
            .find_by_id_and_delete(collection, id)
            .await?
            .ok_or_else(|| MutationError::not_found(entity, id))?;
        debug!(entity, id = %id, "document deleted");
        Ok(removed)
    }
    .boxed()
}
