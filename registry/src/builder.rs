//! RegistryBuilder for constructing an immutable Registry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use morph_core::{Classify, ErrorKind};
use morph_store::StoreError;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::schema::schema_fields;
use crate::{
    CollectionSchema, Controller, CustomMutation, EntityDef, EntityDescriptor, Endpoints,
    Registry, StateMachine,
};

/// Errors that can occur during registry construction and lookup.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),

    #[error("duplicate custom mutation name: {0}")]
    DuplicateMutation(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("entity {0} has no collection")]
    NoCollection(String),

    #[error("field {entity}.{field} refers to unknown entity {target}")]
    UnknownTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("field {entity}.{field} does not define a relation")]
    MissingRelation { entity: String, field: String },

    #[error("field {entity}.{field} is a reference without a connection field")]
    MissingConnectionField { entity: String, field: String },

    #[error("field {entity}.{field} references {target}, which has no collection")]
    UnpersistedTarget {
        entity: String,
        field: String,
        target: String,
    },

    #[error("field {entity}.{field}: a type cannot have a field of its same type and embedded")]
    EmbeddedSelf { entity: String, field: String },

    #[error("embedding cycle in {entity}: {path}")]
    EmbeddedCycle { entity: String, path: String },

    #[error("invalid state machine on {entity}: {reason}")]
    InvalidStateMachine { entity: String, reason: String },

    #[error("custom mutation {mutation} takes input of unknown entity {entity}")]
    UnknownMutationInput { mutation: String, entity: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl RegistryError {
    pub fn unknown_target(
        entity: impl Into<String>,
        field: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::UnknownTarget {
            entity: entity.into(),
            field: field.into(),
            target: target.into(),
        }
    }

    pub fn missing_relation(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingRelation {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn embedded_self(entity: impl Into<String>, field: impl Into<String>) -> Self {
        Self::EmbeddedSelf {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub fn invalid_state_machine(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidStateMachine {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

impl Classify for RegistryError {
    fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Store(err) => err.kind(),
            _ => ErrorKind::Configuration,
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Builder for constructing an immutable Registry.
#[derive(Default)]
pub struct RegistryBuilder {
    /// Entities in registration order.
    entities: Vec<EntityDescriptor>,
    /// Entity name to index mapping.
    names: HashMap<String, usize>,
    /// Custom mutations by name.
    mutations: BTreeMap<String, CustomMutation>,
}

impl RegistryBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity with generated entry points.
    pub fn connect(
        &mut self,
        def: EntityDef,
        single: impl Into<String>,
        list: impl Into<String>,
    ) -> ConnectBuilder<'_> {
        ConnectBuilder {
            builder: self,
            collection: def.name.clone(),
            def,
            endpoints: Endpoints {
                single: single.into(),
                list: list.into(),
            },
            controller: None,
            state_machine: None,
        }
    }

    /// Register an entity usable only as an embedded or related type.
    pub fn add_no_endpoint_type(&mut self, def: EntityDef) -> RegistryResult<()> {
        self.insert(EntityDescriptor {
            def,
            collection: None,
            endpoints: None,
            controller: None,
            state_machine: None,
            schema: None,
        })
    }

    /// Register a custom mutation.
    pub fn register_mutation(&mut self, mutation: CustomMutation) -> RegistryResult<()> {
        if self.mutations.contains_key(&mutation.name) {
            return Err(RegistryError::DuplicateMutation(mutation.name));
        }
        self.mutations.insert(mutation.name.clone(), mutation);
        Ok(())
    }

    fn insert(&mut self, descriptor: EntityDescriptor) -> RegistryResult<()> {
        let name = descriptor.def.name.clone();
        if self.names.contains_key(&name) {
            return Err(RegistryError::DuplicateEntity(name));
        }
        debug!(entity = %name, endpoints = descriptor.endpoints.is_some(), "entity registered");
        self.names.insert(name, self.entities.len());
        self.entities.push(descriptor);
        Ok(())
    }

    /// Validate every entity and build the immutable Registry.
    pub fn build(mut self) -> RegistryResult<Registry> {
        for descriptor in &self.entities {
            self.check_fields(descriptor)?;
            check_state_machine(descriptor)?;
        }

        for mutation in self.mutations.values() {
            if let Some(entity) = &mutation.input {
                if !self.names.contains_key(entity) {
                    return Err(RegistryError::UnknownMutationInput {
                        mutation: mutation.name.clone(),
                        entity: entity.clone(),
                    });
                }
            }
        }

        // Generate persistence schemas
        let mut schemas = Vec::with_capacity(self.entities.len());
        {
            let lookup = |name: &str| self.names.get(name).map(|&i| &self.entities[i].def);
            for descriptor in &self.entities {
                let Some(collection) = &descriptor.collection else {
                    schemas.push(None);
                    continue;
                };
                let fields = schema_fields(&descriptor.def, &lookup, &mut Vec::new())?;
                schemas.push(Some(CollectionSchema {
                    entity: descriptor.def.name.clone(),
                    collection: collection.clone(),
                    fields,
                }));
            }
        }
        for (descriptor, schema) in self.entities.iter_mut().zip(schemas) {
            descriptor.schema = schema;
        }

        info!(
            entities = self.entities.len(),
            mutations = self.mutations.len(),
            "registry built"
        );
        Ok(Registry::new(self.entities, self.names, self.mutations))
    }

    fn check_fields(&self, descriptor: &EntityDescriptor) -> RegistryResult<()> {
        let entity = &descriptor.def.name;
        for field in &descriptor.def.fields {
            let Some(target) = field.target() else {
                continue;
            };
            let Some(relation) = &field.relation else {
                error!(entity = %entity, field = %field.name, "configuration issue: object field does not define a relation");
                return Err(RegistryError::missing_relation(entity, &field.name));
            };
            let Some(&target_index) = self.names.get(target) else {
                error!(entity = %entity, field = %field.name, target = %target, "configuration issue: relation to unknown entity");
                return Err(RegistryError::unknown_target(entity, &field.name, target));
            };
            if relation.embedded {
                if target == entity {
                    error!(entity = %entity, field = %field.name, "configuration issue: entity embeds itself");
                    return Err(RegistryError::embedded_self(entity, &field.name));
                }
                continue;
            }
            if relation.connection_field.is_empty() {
                error!(entity = %entity, field = %field.name, "configuration issue: reference without connection field");
                return Err(RegistryError::MissingConnectionField {
                    entity: entity.clone(),
                    field: field.name.clone(),
                });
            }
            if self.entities[target_index].collection.is_none() {
                error!(entity = %entity, field = %field.name, target = %target, "configuration issue: reference to an entity without collection");
                return Err(RegistryError::UnpersistedTarget {
                    entity: entity.clone(),
                    field: field.name.clone(),
                    target: target.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn check_state_machine(descriptor: &EntityDescriptor) -> RegistryResult<()> {
    let Some(machine) = &descriptor.state_machine else {
        return Ok(());
    };
    let entity = &descriptor.def.name;
    if descriptor.def.get_field("state").is_none() {
        return Err(RegistryError::invalid_state_machine(
            entity,
            "entity has no state field",
        ));
    }
    for action in machine.actions.values() {
        for state in [&action.from, &action.to] {
            if !machine.has_state(state) {
                return Err(RegistryError::invalid_state_machine(
                    entity,
                    format!("action {} uses undeclared state {}", action.name, state),
                ));
            }
        }
    }
    Ok(())
}

/// Builder for a connected entity.
pub struct ConnectBuilder<'a> {
    builder: &'a mut RegistryBuilder,
    def: EntityDef,
    endpoints: Endpoints,
    collection: String,
    controller: Option<Arc<dyn Controller>>,
    state_machine: Option<StateMachine>,
}

impl<'a> ConnectBuilder<'a> {
    /// Override the collection name (defaults to the entity name).
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = name.into();
        self
    }

    pub fn controller(mut self, controller: impl Controller + 'static) -> Self {
        self.controller = Some(Arc::new(controller));
        self
    }

    pub fn state_machine(mut self, machine: StateMachine) -> Self {
        self.state_machine = Some(machine);
        self
    }

    /// Finish registering this entity.
    pub fn done(self) -> RegistryResult<()> {
        self.builder.insert(EntityDescriptor {
            def: self.def,
            collection: Some(self.collection),
            endpoints: Some(self.endpoints),
            controller: self.controller,
            state_machine: self.state_machine,
            schema: None,
        })
    }
}
