//! Morph Mutation
//!
//! Execute write operations (add, update, delete, state transitions, custom
//! mutations) against the document store.
//!
//! Responsibilities:
//! - Check input against the synthesized shapes
//! - Materialize input trees into documents, running validators
//! - Apply referenced-list deltas once the parent identifier is known
//! - Invoke controller hooks and state-machine side effects
//! - Run every operation inside the transactional retry envelope
//!
//! # Module Structure
//!
//! - `executor` - Main MutationExecutor that coordinates operations
//! - `materialize` - Input tree to document conversion
//! - `ops/` - Individual operation implementations
//! - `error` - Error types for mutation failures

mod error;
mod executor;
mod materialize;
mod ops;

pub use error::{MutationError, MutationResult};
pub use executor::MutationExecutor;
pub use materialize::{materialize, CollectionDelta, Materialized, ParentLink};
