//! Morph Transaction
//!
//! Run a unit of work inside one store transaction, retrying it whole on
//! transient conflicts.
//!
//! Responsibilities:
//! - Open a fresh session and transaction per attempt
//! - Commit on success, abort on failure
//! - Re-run the operation body when a transient conflict surfaces
//! - Bound the retries and space them with an injectable backoff
//! - Surface exhaustion as a transient-persistence failure

mod backoff;
mod error;
mod runner;

pub use backoff::{Backoff, ExponentialBackoff, NoBackoff, RetryPolicy};
pub use error::{Transient, TransactionError, TransactionResult};
pub use runner::TransactionRunner;
