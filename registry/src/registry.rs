//! The Registry - immutable entity lookup.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use morph_store::DocumentStore;
use tracing::info;

use crate::{
    CollectionSchema, Controller, CustomMutation, EntityDef, RegistryError, RegistryResult,
    StateMachine,
};

/// Names of an entity's generated entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Get-by-id name, also the suffix of `add`/`update`/`delete` names.
    pub single: String,
    /// Filtered list name.
    pub list: String,
}

/// Everything registered about one entity.
#[derive(Clone)]
pub struct EntityDescriptor {
    pub def: EntityDef,
    /// Collection name. `None` for types without endpoints.
    pub collection: Option<String>,
    pub endpoints: Option<Endpoints>,
    pub controller: Option<Arc<dyn Controller>>,
    pub state_machine: Option<StateMachine>,
    /// Persistence schema, set at build for entities with a collection.
    pub schema: Option<CollectionSchema>,
}

impl EntityDescriptor {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Whether `field` is the state field owned by this entity's state machine.
    pub fn is_machine_owned(&self, field: &str) -> bool {
        self.state_machine.is_some() && field == "state"
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("def", &self.def)
            .field("collection", &self.collection)
            .field("endpoints", &self.endpoints)
            .field("controller", &self.controller.is_some())
            .field("state_machine", &self.state_machine)
            .finish()
    }
}

/// The Registry provides runtime lookup of entity descriptors.
/// It is immutable after construction.
#[derive(Debug)]
pub struct Registry {
    /// Entities in registration order.
    entities: Vec<EntityDescriptor>,
    /// Entity name to index mapping.
    names: HashMap<String, usize>,
    /// Custom mutations by name.
    mutations: BTreeMap<String, CustomMutation>,
}

impl Registry {
    pub(crate) fn new(
        entities: Vec<EntityDescriptor>,
        names: HashMap<String, usize>,
        mutations: BTreeMap<String, CustomMutation>,
    ) -> Self {
        Self {
            entities,
            names,
            mutations,
        }
    }

    // ==================== Entity Lookups ====================

    /// Get a descriptor by entity name.
    pub fn get(&self, name: &str) -> Option<&EntityDescriptor> {
        self.names.get(name).map(|&i| &self.entities[i])
    }

    /// Get a descriptor by entity name, failing on unknown names.
    pub fn entity(&self, name: &str) -> RegistryResult<&EntityDescriptor> {
        self.get(name)
            .ok_or_else(|| RegistryError::UnknownEntity(name.to_string()))
    }

    /// Get an entity definition by name.
    pub fn def(&self, name: &str) -> Option<&EntityDef> {
        self.get(name).map(|d| &d.def)
    }

    /// The collection backing an entity.
    pub fn collection_of(&self, name: &str) -> RegistryResult<&str> {
        self.entity(name)?
            .collection
            .as_deref()
            .ok_or_else(|| RegistryError::NoCollection(name.to_string()))
    }

    /// All descriptors in registration order.
    pub fn all_entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ==================== Custom Mutations ====================

    pub fn custom_mutation(&self, name: &str) -> Option<&CustomMutation> {
        self.mutations.get(name)
    }

    /// All custom mutations, by name.
    pub fn custom_mutations(&self) -> impl Iterator<Item = &CustomMutation> {
        self.mutations.values()
    }

    // ==================== Persistence ====================

    /// Persistence schemas of every entity with a collection.
    pub fn schemas(&self) -> impl Iterator<Item = &CollectionSchema> {
        self.entities.iter().filter_map(|d| d.schema.as_ref())
    }

    /// Create every collection in `store` with its unique indexes.
    pub async fn install(&self, store: &dyn DocumentStore) -> RegistryResult<()> {
        for schema in self.schemas() {
            store.ensure_collection(&schema.to_spec()).await?;
        }
        info!(collections = self.schemas().count(), "collections installed");
        Ok(())
    }
}
