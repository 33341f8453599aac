//! Lifecycle hooks, state machines and custom mutations.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use morph_core::{Classify, DomainError, Document, ErrorKind, ErrorPayload, ObjectId, Value};
use morph_store::{SessionHandle, StoreError};
use thiserror::Error;

/// Errors raised by user code: validators, controller hooks, side effects and
/// custom mutation callbacks.
#[derive(Debug, Error)]
pub enum HookError {
    /// A coded error, surfaced unchanged.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A persistence failure. Transient failures keep their retry label.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HookError {
    pub fn other(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other(Box::new(err))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, HookError::Store(err) if err.is_transient())
    }
}

impl Classify for HookError {
    fn kind(&self) -> ErrorKind {
        match self {
            HookError::Domain(_) => ErrorKind::Validation,
            HookError::Store(err) => err.kind(),
            HookError::Other(_) => ErrorKind::Internal,
        }
    }

    fn payload(&self) -> ErrorPayload {
        match self {
            HookError::Domain(err) => err.payload(),
            HookError::Store(err) => err.payload(),
            HookError::Other(err) => ErrorPayload::internal(err.as_ref()),
        }
    }
}

/// Per-entity lifecycle hooks. Every hook defaults to a no-op.
#[async_trait]
pub trait Controller: Send + Sync {
    /// Before a new document is persisted. May modify it.
    async fn on_saving(
        &self,
        _doc: &mut Document,
        _args: &Document,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// After a new document is persisted.
    async fn on_saved(
        &self,
        _doc: &Document,
        _args: &Document,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Before an update is applied. `changes` holds the fields about to be set.
    async fn on_updating(
        &self,
        _id: ObjectId,
        _changes: &mut Document,
        _args: &Document,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// After an update is applied, with the updated document.
    async fn on_updated(
        &self,
        _doc: &Document,
        _args: &Document,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Before a document is removed.
    async fn on_delete(&self, _doc: &Document, _session: &SessionHandle) -> Result<(), HookError> {
        Ok(())
    }
}

/// Side effect of a state-machine action, given the action's input arguments.
pub type SideEffect =
    Arc<dyn Fn(Document, SessionHandle) -> BoxFuture<'static, Result<(), HookError>> + Send + Sync>;

/// One named transition.
#[derive(Clone)]
pub struct StateAction {
    pub name: String,
    pub from: String,
    pub to: String,
    pub description: String,
    pub side_effect: Option<SideEffect>,
}

impl StateAction {
    pub fn new(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            from: from.into(),
            to: to.into(),
            side_effect: None,
        }
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    pub fn effect<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Document, SessionHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HookError>> + Send + 'static,
    {
        self.side_effect = Some(Arc::new(move |args, session| Box::pin(f(args, session))));
        self
    }
}

impl fmt::Debug for StateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateAction")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("side_effect", &self.side_effect.is_some())
            .finish()
    }
}

/// Guarded transitions over an entity's `state` field.
#[derive(Debug, Clone)]
pub struct StateMachine {
    pub initial_state: String,
    /// Declared states, the initial one first.
    pub states: Vec<String>,
    pub actions: BTreeMap<String, StateAction>,
}

impl StateMachine {
    pub fn new(initial_state: impl Into<String>) -> Self {
        let initial_state = initial_state.into();
        Self {
            states: vec![initial_state.clone()],
            initial_state,
            actions: BTreeMap::new(),
        }
    }

    pub fn state(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.states.contains(&name) {
            self.states.push(name);
        }
        self
    }

    pub fn action(mut self, action: StateAction) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn get_action(&self, name: &str) -> Option<&StateAction> {
        self.actions.get(name)
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|s| s == name)
    }
}

/// Callback of a custom mutation: input arguments in, result value out.
pub type MutationCallback =
    Arc<dyn Fn(Document, SessionHandle) -> BoxFuture<'static, Result<Value, HookError>> + Send + Sync>;

/// A named mutation that runs arbitrary code inside the transactional envelope.
#[derive(Clone)]
pub struct CustomMutation {
    pub name: String,
    pub description: String,
    /// Entity whose add-shape describes the input, if the mutation takes one.
    pub input: Option<String>,
    pub callback: MutationCallback,
}

impl CustomMutation {
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(Document, SessionHandle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HookError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input: None,
            callback: Arc::new(move |args, session| Box::pin(f(args, session))),
        }
    }

    pub fn input(mut self, entity: impl Into<String>) -> Self {
        self.input = Some(entity.into());
        self
    }
}

impl fmt::Debug for CustomMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomMutation")
            .field("name", &self.name)
            .field("input", &self.input)
            .finish()
    }
}
