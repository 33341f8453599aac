//! Synthesis and input-check error types.

use morph_core::{Classify, ErrorKind};
use thiserror::Error;

/// Synthesis errors.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Some entities never had their embedded dependencies resolved.
    #[error("input shapes unresolvable after {passes} passes: {detail}")]
    Unresolvable {
        passes: usize,
        entities: Vec<String>,
        detail: String,
    },

    #[error("no input shapes for entity {0}")]
    UnknownEntity(String),

    /// An object-valued field without a relation policy.
    #[error("configuration issue on {entity}: field {field} does not define a relation")]
    MissingRelation { entity: String, field: String },
}

impl Classify for SynthError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Result type for synthesis.
pub type SynthResult<T> = Result<T, SynthError>;

/// An argument tree that does not fit its input shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid input at {path}: {reason}")]
pub struct InputError {
    /// Dotted location of the offending value, rooted at the shape name.
    pub path: String,
    pub reason: String,
}

impl InputError {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl Classify for InputError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}
