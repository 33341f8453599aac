//! Dispatch error types.

use morph_core::{Classify, DomainError, ErrorKind, ErrorPayload};
use morph_mutation::MutationError;
use morph_query::QueryError;
use morph_registry::RegistryError;
use morph_store::StoreError;
use morph_synth::SynthError;
use thiserror::Error;

/// Errors surfaced by entry points.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unknown entry point: {0}")]
    UnknownEndpoint(String),

    #[error("invalid arguments for {endpoint}: {message}")]
    InvalidArgument { endpoint: String, message: String },

    /// Raised by a middleware to reject the call.
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Synth(#[from] SynthError),
}

impl DispatchError {
    pub fn invalid_argument(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }
}

impl Classify for DispatchError {
    fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnknownEndpoint(_) | DispatchError::InvalidArgument { .. } => {
                ErrorKind::Validation
            }
            DispatchError::Rejected(err) => err.kind(),
            DispatchError::Query(err) => err.kind(),
            DispatchError::Mutation(err) => err.kind(),
            DispatchError::Store(err) => err.kind(),
            DispatchError::Registry(err) => err.kind(),
            DispatchError::Synth(err) => err.kind(),
        }
    }

    fn payload(&self) -> ErrorPayload {
        match self {
            DispatchError::Rejected(err) => err.payload(),
            DispatchError::Mutation(err) => err.payload(),
            DispatchError::Store(err) => err.payload(),
            other => match other.kind() {
                ErrorKind::Internal => ErrorPayload::internal(other),
                kind => ErrorPayload::new(other.to_string(), kind.code(), kind.status()),
            },
        }
    }
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
