//! Mutation error types.

use morph_core::{Classify, ErrorKind, ErrorPayload};
use morph_registry::{HookError, RegistryError};
use morph_store::StoreError;
use morph_synth::InputError;
use morph_transaction::{Transient, TransactionError};
use thiserror::Error;

/// Errors that can occur during mutation execution.
#[derive(Debug, Error)]
pub enum MutationError {
    /// Arguments do not fit the entity's input shape.
    #[error(transparent)]
    Input(#[from] InputError),

    /// A validator, controller hook, side effect or callback failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("invalid value for {entity}.{field}: {reason}")]
    InvalidValue {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("{entity} {id} is not valid")]
    NotFound { entity: String, id: String },

    #[error("Action is not allowed from state {state}")]
    IllegalTransition {
        entity: String,
        action: String,
        state: String,
    },

    #[error("unknown action {action} on {entity}")]
    UnknownAction { entity: String, action: String },

    #[error("unknown custom mutation: {0}")]
    UnknownMutation(String),

    /// A collection delta deletes a child owned by another parent.
    #[error("{entity} {child} does not belong to {parent}")]
    ForeignChild {
        entity: String,
        child: String,
        parent: String,
    },

    /// A referenced list inside an embedded document carries a collection delta.
    #[error("{entity}.{field}: collection deltas are not supported inside embedded documents")]
    NestedDelta { entity: String, field: String },

    #[error("configuration issue on {entity}: {message}")]
    Configuration { entity: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl MutationError {
    pub fn invalid_value(
        entity: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            entity: entity.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn configuration(entity: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

impl Classify for MutationError {
    fn kind(&self) -> ErrorKind {
        match self {
            MutationError::Input(_)
            | MutationError::InvalidValue { .. }
            | MutationError::ForeignChild { .. }
            | MutationError::NestedDelta { .. } => ErrorKind::Validation,
            MutationError::Hook(err) => err.kind(),
            MutationError::NotFound { .. } => ErrorKind::NotFound,
            MutationError::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            MutationError::UnknownAction { .. } | MutationError::UnknownMutation(_) => {
                ErrorKind::Validation
            }
            MutationError::Configuration { .. } => ErrorKind::Configuration,
            MutationError::Registry(err) => err.kind(),
            MutationError::Store(err) => err.kind(),
            MutationError::Transaction(err) => err.kind(),
        }
    }

    fn payload(&self) -> ErrorPayload {
        match self {
            MutationError::Hook(err) => err.payload(),
            MutationError::Store(err) => err.payload(),
            MutationError::Transaction(err) => err.payload(),
            other => {
                let kind = other.kind();
                ErrorPayload::new(other.to_string(), kind.code(), kind.status())
            }
        }
    }
}

impl Transient for MutationError {
    fn is_transient(&self) -> bool {
        match self {
            MutationError::Hook(err) => err.is_transient(),
            MutationError::Store(err) => err.is_transient(),
            MutationError::Transaction(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Result type for mutation operations.
pub type MutationResult<T> = Result<T, MutationError>;
