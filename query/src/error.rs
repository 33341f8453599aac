//! Query error types.

use morph_core::{Classify, ErrorKind};
use morph_registry::RegistryError;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while parsing list arguments or compiling a query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown field: {field} on entity {entity}")]
    UnknownField { entity: String, field: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("field {entity}.{field} does not define a relation")]
    MissingRelation { entity: String, field: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl QueryError {
    pub fn unknown_field(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::UnknownField {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl Classify for QueryError {
    fn kind(&self) -> ErrorKind {
        match self {
            QueryError::MissingRelation { .. } => ErrorKind::Configuration,
            QueryError::Registry(err) => err.kind(),
            _ => ErrorKind::Validation,
        }
    }
}
