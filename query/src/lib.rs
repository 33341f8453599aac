//! Morph Query
//!
//! Compile list arguments into aggregation pipelines.
//!
//! Responsibilities:
//! - Parse the filter, sort and pagination wire shapes
//! - Map operators onto match conditions with id and temporal coercion
//! - Join referenced relations under deterministic aliases, one join per alias
//! - Extend matched paths through embedded sub-documents
//! - Emit the paged variant or the count variant of a query

mod args;
mod compiler;
mod error;

pub use args::{
    FieldFilter, FilterTerm, ListArgs, Operator, Pagination, PathFilterTerm, SortOrder, SortTerm,
};
pub use compiler::{stored_name, QueryCompiler, COUNT_FIELD};
pub use error::{QueryError, QueryResult};
