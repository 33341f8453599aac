//! Store error types.

use morph_core::{Classify, ErrorKind, ErrorPayload};
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by a persistence backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The distinguished "transient transaction" signal: the whole operation
    /// may be retried inside a new transaction.
    #[error("transient transaction error: {message}")]
    TransientTransaction { message: String },

    /// A unique index rejected a write.
    #[error("duplicate key in {collection}.{field}: {value}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    #[error("no transaction is active")]
    NoActiveTransaction,

    #[error("transaction already active")]
    TransactionAlreadyActive,

    #[error("invalid pipeline: {message}")]
    InvalidPipeline { message: String },

    #[error("document without _id in {collection}")]
    MissingId { collection: String },

    #[error("backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::TransientTransaction {
            message: message.into(),
        }
    }

    pub fn duplicate_key(
        collection: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::DuplicateKey {
            collection: collection.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn invalid_pipeline(message: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Whether this failure carries the transient-transaction label.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::TransientTransaction { .. })
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::TransientTransaction { .. } => ErrorKind::TransientPersistence,
            StoreError::DuplicateKey { .. } => ErrorKind::Validation,
            _ => ErrorKind::Internal,
        }
    }

    fn payload(&self) -> ErrorPayload {
        match self {
            StoreError::DuplicateKey { .. } => ErrorPayload::new(self.to_string(), "DUPLICATE_KEY", 409),
            _ => {
                let kind = self.kind();
                ErrorPayload::new(self.to_string(), kind.code(), kind.status())
            }
        }
    }
}
