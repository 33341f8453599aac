//! Morph integration test framework.
//!
//! A scenario registers a domain, then runs named steps against the generated
//! entry points of a fresh in-memory store, checking each result.
//!
//! Responsibilities:
//! - Provide shared domains (shop, tasks) and tracing setup
//! - Define scenarios with id bindings between steps
//! - Assert on results, list counts and error payloads
//! - Run scenarios and hand back the store for inspection

mod assertion;
mod error;
pub mod fixtures;
mod runner;
mod scenario;

pub use assertion::Assertion;
pub use error::{ScenarioError, ScenarioResult};
pub use runner::{Outcome, Runner};
pub use scenario::{Scenario, Step};

pub mod prelude {
    pub use crate::fixtures;
    pub use crate::{Assertion, Outcome, Runner, Scenario, ScenarioError, ScenarioResult, Step};
    pub use serde_json::json;
}
