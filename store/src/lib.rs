//! Morph Store
//!
//! The persistence boundary of the engine.
//!
//! Responsibilities:
//! - Define the document-store contract (sessions, transactions, CRUD, pipelines)
//! - Model aggregation pipelines (lookup, unwind, match, sort, skip, limit, count)
//! - Evaluate pipelines over in-memory documents
//! - Provide a process-local store with snapshot transactions and unique indexes

mod contract;
mod error;
mod eval;
mod memory;
mod pipeline;

pub use contract::{CollectionSpec, DocumentStore, SessionHandle, StoreSession, UpdateSpec};
pub use error::{StoreError, StoreResult};
pub use eval::{remove_path, resolve_path, run_pipeline, set_path};
pub use memory::{MemorySession, MemoryStore};
pub use pipeline::{
    pipeline_to_json, Condition, Lookup, Pipeline, Predicate, SortDirection, SortKey, Stage, Unwind,
};
