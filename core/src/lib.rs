//! Morph Core Types
//!
//! This crate provides the foundational types used throughout the engine:
//! - Identity types (ObjectId)
//! - Value types (the Value enum and the Document map)
//! - The surfaced error contract (ErrorKind, ErrorPayload, DomainError, Classify)
//! - Engine configuration (EngineConfig)

mod config;
mod error;
mod id;
mod value;

pub use config::*;
pub use error::*;
pub use id::*;
pub use value::*;
