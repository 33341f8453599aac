//! Mutation executor - runs entity operations inside the transactional envelope.
//!
//! The executor checks input against the synthesized shapes, then delegates
//! to the operation modules in `ops/` on a session owned by the
//! [`TransactionRunner`]:
//! - `ops/save.rs` - add
//! - `ops/update.rs` - update
//! - `ops/delete.rs` - delete
//! - `ops/transition.rs` - state-machine actions
//! - `ops/collection.rs` - referenced-list deltas

use std::sync::Arc;

use morph_core::{Document, ObjectId, Value};
use morph_registry::Registry;
use morph_store::SessionHandle;
use morph_synth::{InputCatalog, InputShape};
use morph_transaction::TransactionRunner;

use crate::ops;
use crate::{MutationError, MutationResult};

/// Mutation executor.
#[derive(Clone)]
pub struct MutationExecutor {
    registry: Arc<Registry>,
    catalog: Arc<InputCatalog>,
    runner: TransactionRunner,
}

impl MutationExecutor {
    /// Create a new executor.
    pub fn new(registry: Arc<Registry>, catalog: Arc<InputCatalog>, runner: TransactionRunner) -> Self {
        Self {
            registry,
            catalog,
            runner,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn catalog(&self) -> &Arc<InputCatalog> {
        &self.catalog
    }

    pub fn runner(&self) -> &TransactionRunner {
        &self.runner
    }

    /// Create a document from an add-shaped input.
    pub async fn add(&self, entity: &str, input: &Document) -> MutationResult<Document> {
        self.check(entity, self.catalog.add_shape(entity), input)?;
        let registry = self.registry.as_ref();
        self.runner
            .run(&format!("add {}", entity), |session| async move {
                ops::execute_save(registry, &session, entity, input, None).await
            })
            .await
    }

    /// Update a document from an update-shaped input carrying its `id`.
    pub async fn update(&self, entity: &str, input: &Document) -> MutationResult<Document> {
        self.check(entity, self.catalog.update_shape(entity), input)?;
        let registry = self.registry.as_ref();
        self.runner
            .run(&format!("update {}", entity), |session| async move {
                ops::execute_update(registry, &session, entity, input, None).await
            })
            .await
    }

    /// Delete a document by identifier, returning the removed document.
    pub async fn delete(&self, entity: &str, id: ObjectId) -> MutationResult<Document> {
        let registry = self.registry.as_ref();
        self.runner
            .run(&format!("delete {}", entity), |session| async move {
                ops::execute_delete(registry, &session, entity, id).await
            })
            .await
    }

    /// Run a state-machine action. The input is update-shaped and carries the `id`.
    pub async fn transition(&self, entity: &str, action: &str, input: &Document) -> MutationResult<Document> {
        self.check(entity, self.catalog.update_shape(entity), input)?;
        let registry = self.registry.as_ref();
        self.runner
            .run(&format!("{} {}", action, entity), |session| async move {
                ops::execute_transition(registry, &session, entity, action, input).await
            })
            .await
    }

    /// Run a registered custom mutation. No materialization happens.
    pub async fn custom(&self, name: &str, input: Option<&Document>) -> MutationResult<Value> {
        let mutation = self
            .registry
            .custom_mutation(name)
            .ok_or_else(|| MutationError::UnknownMutation(name.to_string()))?;
        if let (Some(entity), Some(input)) = (&mutation.input, input) {
            self.check(entity, self.catalog.add_shape(entity), input)?;
        }
        let args = input.cloned().unwrap_or_default();
        let callback = &mutation.callback;
        self.runner
            .run(name, |session| {
                let args = args.clone();
                async move { callback(args, session).await.map_err(MutationError::from) }
            })
            .await
    }

    /// Save inside a session the caller already controls. No transaction is
    /// opened and no input shape is checked.
    pub async fn save_in(&self, entity: &str, args: &Document, session: &SessionHandle) -> MutationResult<Document> {
        ops::execute_save(&self.registry, session, entity, args, None).await
    }

    fn check(&self, entity: &str, shape: Option<&InputShape>, input: &Document) -> MutationResult<()> {
        let shape = shape.ok_or_else(|| MutationError::configuration(entity, "no input shape"))?;
        self.catalog.check(&shape.name, input)?;
        Ok(())
    }
}
