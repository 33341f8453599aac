//! Morph Registry
//!
//! The Type Registry: entity metadata registered once at startup and read by
//! every engine thereafter.
//!
//! Responsibilities:
//! - Define entities, fields, relation policies and value kinds
//! - Hold lifecycle controllers, state machines and custom mutations
//! - Provide stock field validators
//! - Validate the configuration at build time
//! - Derive persistence schemas and install them into a store

mod builder;
mod hooks;
mod registry;
mod schema;
mod types;
pub mod validators;

pub use builder::{ConnectBuilder, RegistryBuilder, RegistryError, RegistryResult};
pub use hooks::{
    Controller, CustomMutation, HookError, MutationCallback, SideEffect, StateAction, StateMachine,
};
pub use registry::{Endpoints, EntityDescriptor, Registry};
pub use schema::{CollectionSchema, SchemaField, SchemaType};
pub use types::{
    EntityDef, EnumType, FieldDef, FieldShape, Operation, RelationPolicy, ScalarType, ValueKind,
};
pub use validators::{EntityValidator, FieldValidator};
