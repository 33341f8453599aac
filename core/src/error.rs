//! The surfaced error contract.
//!
//! Every error that leaves the engine is described by an [`ErrorPayload`]
//! carrying `code`, `status`, `timestamp` and an optional `cause`. Component
//! error enums implement [`Classify`] to map themselves onto an [`ErrorKind`].

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Category of a surfaced error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Raised by a field or entity validator, or a malformed argument.
    Validation,
    /// Lookup or transition on a missing identifier.
    NotFound,
    /// State-machine precondition violated.
    IllegalTransition,
    /// Relation/extension metadata missing or malformed.
    Configuration,
    /// Transient transaction conflict that exhausted its retry budget.
    TransientPersistence,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Default wire code for this kind.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "BAD_REQUEST",
            ErrorKind::NotFound => "NOT_VALID_ID",
            ErrorKind::IllegalTransition => "BAD_REQUEST",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
            ErrorKind::TransientPersistence => "TRANSIENT_TRANSACTION_ERROR",
            ErrorKind::Internal => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Default status for this kind.
    pub fn status(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::IllegalTransition => 400,
            ErrorKind::Configuration => 500,
            ErrorKind::TransientPersistence => 503,
            ErrorKind::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not found",
            ErrorKind::IllegalTransition => "illegal transition",
            ErrorKind::Configuration => "configuration",
            ErrorKind::TransientPersistence => "transient persistence",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Stable, serializable error shape handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
    pub status: u16,
    /// RFC 2822 UTC time at which the payload was produced.
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorPayload {
    pub fn new(message: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            status,
            timestamp: chrono::Utc::now().to_rfc2822(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Wrap an arbitrary failure as an internal error, preserving its message as cause.
    pub fn internal(err: &(dyn std::error::Error + 'static)) -> Self {
        Self::new(
            err.to_string(),
            ErrorKind::Internal.code(),
            ErrorKind::Internal.status(),
        )
        .with_cause(root_cause(err))
    }
}

/// Walk an error's source chain down to the innermost message.
pub fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// A coded error raised by user code (validators, hooks, side effects).
///
/// It is surfaced with its own code and status unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct DomainError {
    pub message: String,
    pub code: String,
    pub status: u16,
}

impl DomainError {
    /// A validation failure with the default `BAD_REQUEST`/400 code.
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: ErrorKind::Validation.code().to_string(),
            status: ErrorKind::Validation.status(),
        }
    }

    /// A failure with a custom code and status.
    pub fn coded(message: impl Into<String>, code: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            status,
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload::new(&self.message, &self.code, self.status)
    }
}

/// Maps an error onto the surfaced contract.
pub trait Classify: std::error::Error {
    /// The category of this error.
    fn kind(&self) -> ErrorKind;

    /// The coded payload for this error. Defaults to the kind's code and status.
    fn payload(&self) -> ErrorPayload {
        let kind = self.kind();
        let payload = ErrorPayload::new(self.to_string(), kind.code(), kind.status());
        match (kind, self.source()) {
            (ErrorKind::Internal, Some(source)) => payload.with_cause(root_cause(source)),
            _ => payload,
        }
    }
}

impl Classify for DomainError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }

    fn payload(&self) -> ErrorPayload {
        DomainError::payload(self)
    }
}
