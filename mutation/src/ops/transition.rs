//! State transition - a guarded update of the `state` field.

use morph_core::{Document, Value};
use morph_registry::Registry;
use morph_store::SessionHandle;
use tracing::info;

use crate::ops::execute_update;
use crate::{MutationError, MutationResult};

/// Run `action` on the document identified by `args.id`.
///
/// The stored state must equal the action's `from` state. The side effect
/// runs before the state is moved to `to` through the update path.
pub async fn execute_transition(
    registry: &Registry,
    session: &SessionHandle,
    entity: &str,
    action: &str,
    args: &Document,
) -> MutationResult<Document> {
    let descriptor = registry.entity(entity)?;
    let collection = registry.collection_of(entity)?;
    let unknown = || MutationError::UnknownAction {
        entity: entity.to_string(),
        action: action.to_string(),
    };
    let transition = descriptor
        .state_machine
        .as_ref()
        .and_then(|machine| machine.get_action(action))
        .ok_or_else(unknown)?;

    let id = args
        .get("id")
        .and_then(Value::to_id)
        .ok_or_else(|| MutationError::invalid_value(entity, "id", "an identifier is required"))?;
    let stored = session
        .find_by_id(collection, id)
        .await?
        .ok_or_else(|| MutationError::not_found(entity, id))?;

    let state = stored.get("state").and_then(Value::as_str).unwrap_or_default();
    if state != transition.from {
        return Err(MutationError::IllegalTransition {
            entity: entity.to_string(),
            action: action.to_string(),
            state: state.to_string(),
        });
    }

    if let Some(effect) = &transition.side_effect {
        effect(args.clone(), session.clone()).await?;
    }

    let mut args = args.clone();
    args.insert("state".to_string(), Value::from(transition.to.as_str()));
    let updated = execute_update(registry, session, entity, &args, None).await?;
    info!(entity, id = %id, action, from = %transition.from, to = %transition.to, "state changed");
    Ok(updated)
}
