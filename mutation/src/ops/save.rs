//! Save operation - creates a document.

use futures::future::{BoxFuture, FutureExt};
use morph_core::{Document, ObjectId, Value};
use morph_registry::{Operation, Registry};
use morph_store::SessionHandle;
use tracing::debug;

use crate::materialize::{materialize, ParentLink};
use crate::ops::execute_collections;
use crate::MutationResult;

/// Create a document of `entity` from `args`.
///
/// Order: materialize, stamp the initial state, `on_saving`, persist, apply
/// the collection deltas against the new identifier, `on_saved`.
pub fn execute_save<'a>(
    registry: &'a Registry,
    session: &'a SessionHandle,
    entity: &'a str,
    args: &'a Document,
    link: Option<ParentLink>,
) -> BoxFuture<'a, MutationResult<Document>> {
    async move {
        let descriptor = registry.entity(entity)?;
        let collection = registry.collection_of(entity)?;
        let materialized =
            materialize(registry, entity, args, Operation::Create, link.as_ref(), session).await?;

        let mut model = materialized.model;
        if let Some(machine) = &descriptor.state_machine {
            model.insert("state".to_string(), Value::from(machine.initial_state.as_str()));
        }
        let id = ObjectId::new();
        model.insert("_id".to_string(), Value::Id(id));

        if let Some(controller) = &descriptor.controller {
            controller.on_saving(&mut model, args, session).await?;
        }

        let saved = session.create(collection, model).await?;
        execute_collections(registry, session, entity, id, &materialized.collections).await?;

        if let Some(controller) = &descriptor.controller {
            controller.on_saved(&saved, args, session).await?;
        }
        debug!(entity, id = %id, "document saved");
        Ok(saved)
    }
    .boxed()
}
