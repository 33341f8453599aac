//! Generated entry points.

use std::fmt;

use morph_registry::EntityDescriptor;

/// What an entry point does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointKind {
    GetById,
    List,
    Add,
    Update,
    Delete,
    /// A state-machine action, by action name.
    Action(String),
    Custom,
}

impl EndpointKind {
    /// Operation name handed to middleware.
    pub fn operation(&self) -> &'static str {
        match self {
            EndpointKind::GetById => "get_by_id",
            EndpointKind::List => "find",
            EndpointKind::Add => "save",
            EndpointKind::Update => "update",
            EndpointKind::Delete => "delete",
            EndpointKind::Action(_) => "state_changed",
            EndpointKind::Custom => "custom_mutation",
        }
    }

    pub fn is_query(&self) -> bool {
        matches!(self, EndpointKind::GetById | EndpointKind::List)
    }
}

/// One named entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub kind: EndpointKind,
    /// Entity served, `None` for custom mutations.
    pub entity: Option<String>,
    pub description: String,
}

impl Endpoint {
    fn entity(name: String, kind: EndpointKind, entity: &str, description: impl Into<String>) -> Self {
        Self {
            name,
            kind,
            entity: Some(entity.to_string()),
            description: description.into(),
        }
    }

    pub fn custom(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EndpointKind::Custom,
            entity: None,
            description: description.into(),
        }
    }

    /// `{single}` and `{list}`.
    pub(crate) fn queries(descriptor: &EntityDescriptor) -> Vec<Endpoint> {
        let Some(names) = &descriptor.endpoints else {
            return Vec::new();
        };
        let entity = descriptor.name();
        vec![
            Endpoint::entity(names.single.clone(), EndpointKind::GetById, entity, format!("Get a {} by id", entity)),
            Endpoint::entity(names.list.clone(), EndpointKind::List, entity, format!("List {} documents", entity)),
        ]
    }

    /// `add{single}`, `update{single}`, `delete{single}` and `{action}_{single}`.
    pub(crate) fn mutations(descriptor: &EntityDescriptor) -> Vec<Endpoint> {
        let Some(names) = &descriptor.endpoints else {
            return Vec::new();
        };
        let entity = descriptor.name();
        let mut endpoints = vec![
            Endpoint::entity(format!("add{}", names.single), EndpointKind::Add, entity, "add"),
            Endpoint::entity(format!("update{}", names.single), EndpointKind::Update, entity, "update"),
            Endpoint::entity(format!("delete{}", names.single), EndpointKind::Delete, entity, "delete"),
        ];
        if let Some(machine) = &descriptor.state_machine {
            for action in machine.actions.values() {
                endpoints.push(Endpoint::entity(
                    format!("{}_{}", action.name, names.single),
                    EndpointKind::Action(action.name.clone()),
                    entity,
                    action.description.clone(),
                ));
            }
        }
        endpoints
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity {
            Some(entity) => write!(f, "{} ({} {})", self.name, self.kind.operation(), entity),
            None => write!(f, "{} ({})", self.name, self.kind.operation()),
        }
    }
}
