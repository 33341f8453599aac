//! Mutation operation implementations.
//!
//! Each operation (save, update, delete, state transition, collection delta)
//! is implemented in its own module. All of them run on the caller's session;
//! the executor owns the transaction.

mod collection;
mod delete;
mod save;
mod transition;
mod update;

pub use collection::execute_collections;
pub use delete::execute_delete;
pub use save::execute_save;
pub use transition::execute_transition;
pub use update::execute_update;
