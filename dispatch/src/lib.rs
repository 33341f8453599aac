//! Morph Dispatch
//!
//! Bind registered entities and custom mutations to named entry points.
//!
//! Responsibilities:
//! - Generate get-by-id, list, add, update, delete and action entry points
//! - Honour include-lists for queries, mutations and custom mutations
//! - Run the middleware chain before every call
//! - Route calls to the query compiler, the store and the mutation executor
//! - Convert wire JSON to documents and back, exposing `_id` as `id`
//! - Format every error into the surfaced payload

mod endpoint;
mod error;
mod format;
mod middleware;
mod schema;

pub use endpoint::{Endpoint, EndpointKind};
pub use error::{DispatchError, DispatchResult};
pub use format::{present, ErrorCallback, ErrorFormatter};
pub use middleware::{CallContext, Middleware, Next, RequestContext};
pub use schema::{Schema, SchemaBuilder};
