//! Transaction error types.

use morph_core::{Classify, ErrorKind, ErrorPayload};
use morph_store::StoreError;
use thiserror::Error;

/// Transaction errors.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Every attempt ended in a transient conflict.
    #[error("transaction still conflicting after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Opening, committing or aborting failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TransactionError {
    pub fn retries_exhausted(attempts: u32, last: impl Into<String>) -> Self {
        Self::RetriesExhausted {
            attempts,
            last: last.into(),
        }
    }
}

impl Classify for TransactionError {
    fn kind(&self) -> ErrorKind {
        match self {
            TransactionError::RetriesExhausted { .. } => ErrorKind::TransientPersistence,
            TransactionError::Store(err) => err.kind(),
        }
    }

    fn payload(&self) -> ErrorPayload {
        match self {
            TransactionError::Store(err) => err.payload(),
            other => {
                let kind = other.kind();
                ErrorPayload::new(other.to_string(), kind.code(), kind.status())
            }
        }
    }
}

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that tell whether re-running the whole operation may succeed.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        StoreError::is_transient(self)
    }
}

impl Transient for TransactionError {
    fn is_transient(&self) -> bool {
        match self {
            TransactionError::Store(err) => err.is_transient(),
            // Already retried; must not be retried again by an outer runner.
            TransactionError::RetriesExhausted { .. } => false,
        }
    }
}
