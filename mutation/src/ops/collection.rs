//! Collection deltas - add, update and delete the children of a referenced list.

use std::collections::BTreeMap;

use morph_core::{ObjectId, Value};
use morph_registry::{FieldShape, Registry};
use morph_store::SessionHandle;

use crate::materialize::{CollectionDelta, ParentLink};
use crate::ops::{execute_delete, execute_save, execute_update};
use crate::{MutationError, MutationResult};

/// Apply every delta of `entity`'s referenced list fields for the parent `parent`.
///
/// Added and updated children get the parent stamped on their connection
/// field. Deleted children must currently belong to the parent.
pub async fn execute_collections(
    registry: &Registry,
    session: &SessionHandle,
    entity: &str,
    parent: ObjectId,
    collections: &BTreeMap<String, CollectionDelta>,
) -> MutationResult<()> {
    let def = &registry.entity(entity)?.def;
    for (field_name, delta) in collections {
        let field = def
            .get_field(field_name)
            .and_then(|f| f.shape())
            .ok_or_else(|| MutationError::configuration(entity, format!("unknown collection field {}", field_name)))?;
        let FieldShape::ReferencedList { target, relation } = field else {
            return Err(MutationError::configuration(
                entity,
                format!("{} is not a referenced list", field_name),
            ));
        };
        let link = ParentLink {
            connection_field: relation.connection_field.clone(),
            parent,
        };

        for child in &delta.added {
            execute_save(registry, session, target, child, Some(link.clone())).await?;
        }
        for child in &delta.updated {
            execute_update(registry, session, target, child, Some(link.clone())).await?;
        }
        if !delta.deleted.is_empty() {
            let collection = registry.collection_of(target)?;
            for &child in &delta.deleted {
                let stored = session
                    .find_by_id(collection, child)
                    .await?
                    .ok_or_else(|| MutationError::not_found(target, child))?;
                let owner = stored.get(&relation.connection_field).and_then(Value::to_id);
                if owner != Some(parent) {
                    return Err(MutationError::ForeignChild {
                        entity: target.to_string(),
                        child: child.to_string(),
                        parent: parent.to_string(),
                    });
                }
                execute_delete(registry, session, target, child).await?;
            }
        }
    }
    Ok(())
}
