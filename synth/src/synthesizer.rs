//! Input-shape synthesis.
//!
//! Each entity gets an add shape (`{Name}Input`) and an update shape
//! (`{Name}InputForUpdate`). An entity whose embedded targets are not built
//! yet is left waiting; passes repeat until every entity is built, a pass makes
//! no progress, or the pass budget runs out.

use morph_registry::{EntityDescriptor, FieldDef, FieldShape, Registry, ScalarType};
use tracing::{debug, error, info};

use crate::{
    InputCatalog, InputField, InputShape, InputType, SynthError, SynthResult,
};

/// Name of an entity's add shape.
pub fn add_shape_name(entity: &str) -> String {
    format!("{}Input", entity)
}

/// Name of an entity's update shape.
pub fn update_shape_name(entity: &str) -> String {
    format!("{}InputForUpdate", entity)
}

/// Name of the collection-delta type for `field`. `prefix` is `A` or `U`.
pub fn delta_name(prefix: &str, field: &str) -> String {
    format!("OneToMany{}{}", prefix, field)
}

/// Shapes built in the first phase, before self-referencing lists are attached.
struct Provisional {
    add: InputShape,
    update: InputShape,
    deferred: Vec<String>,
    machine_owned: Vec<String>,
}

/// Derives input shapes from a registry.
pub struct Synthesizer<'r> {
    registry: &'r Registry,
    max_passes: usize,
}

impl<'r> Synthesizer<'r> {
    pub fn new(registry: &'r Registry, max_passes: usize) -> Self {
        Self {
            registry,
            max_passes,
        }
    }

    /// Build shapes for every registered entity.
    pub fn synthesize(&self) -> SynthResult<InputCatalog> {
        let mut catalog = InputCatalog::default();
        let mut waiting: Vec<&EntityDescriptor> = self.registry.all_entities().collect();
        let mut passes = 0;

        while !waiting.is_empty() && passes < self.max_passes {
            passes += 1;
            let before = waiting.len();
            let mut blocked = Vec::with_capacity(before);
            for descriptor in waiting {
                match build_provisional(descriptor, &catalog)? {
                    Some(provisional) => {
                        let (add, update, machine_owned) = attach_deferred(provisional);
                        catalog.insert(add, update, machine_owned);
                    }
                    None => blocked.push(descriptor),
                }
            }
            waiting = blocked;
            debug!(
                pass = passes,
                resolved = before - waiting.len(),
                remaining = waiting.len(),
                "synthesis pass"
            );
            if waiting.len() == before {
                break;
            }
        }

        if !waiting.is_empty() {
            let detail = waiting
                .iter()
                .map(|d| format!("{} (waiting on {})", d.name(), blockers(d, &catalog).join(", ")))
                .collect::<Vec<_>>()
                .join("; ");
            error!(passes, %detail, "input shape synthesis did not converge");
            return Err(SynthError::Unresolvable {
                passes,
                entities: waiting.iter().map(|d| d.name().to_string()).collect(),
                detail,
            });
        }

        catalog.set_passes(passes);
        info!(entities = catalog.entity_count(), passes, "input shapes synthesized");
        Ok(catalog)
    }
}

/// Embedded targets of `descriptor` that have no shapes yet.
fn blockers(descriptor: &EntityDescriptor, catalog: &InputCatalog) -> Vec<String> {
    descriptor
        .def
        .fields
        .iter()
        .filter_map(|field| match field.shape() {
            Some(FieldShape::EmbeddedObject { target } | FieldShape::EmbeddedList { target })
                if !catalog.contains(target) =>
            {
                Some(target.to_string())
            }
            _ => None,
        })
        .collect()
}

/// Per-field outcome of the first phase.
enum FieldInputs {
    Both { add: Option<InputField>, update: InputField },
    Deferred,
    Blocked,
}

fn build_provisional(descriptor: &EntityDescriptor, catalog: &InputCatalog) -> SynthResult<Option<Provisional>> {
    let entity = descriptor.name();
    let mut add = Vec::new();
    let mut update = Vec::new();
    let mut deferred = Vec::new();
    let mut machine_owned = Vec::new();

    for field in &descriptor.def.fields {
        if field.read_only {
            continue;
        }
        if descriptor.is_machine_owned(&field.name) {
            machine_owned.push(field.name.clone());
            continue;
        }
        match field_inputs(entity, field, catalog)? {
            FieldInputs::Both {
                add: add_field,
                update: update_field,
            } => {
                add.extend(add_field);
                update.push(update_field);
            }
            FieldInputs::Deferred => deferred.push(field.name.clone()),
            FieldInputs::Blocked => return Ok(None),
        }
    }

    Ok(Some(Provisional {
        add: InputShape {
            name: add_shape_name(entity),
            entity: entity.to_string(),
            fields: add,
        },
        update: InputShape {
            name: update_shape_name(entity),
            entity: entity.to_string(),
            fields: update,
        },
        deferred,
        machine_owned,
    }))
}

fn input(field: &FieldDef, ty: InputType, non_null: bool) -> InputField {
    InputField {
        name: field.name.clone(),
        ty,
        non_null,
        description: field.description.clone(),
    }
}

fn field_inputs(entity: &str, field: &FieldDef, catalog: &InputCatalog) -> SynthResult<FieldInputs> {
    let shape = field.shape().ok_or_else(|| {
        error!(entity, field = %field.name, "configuration issue: field does not define a relation");
        SynthError::MissingRelation {
            entity: entity.to_string(),
            field: field.name.clone(),
        }
    })?;

    let inputs = match shape {
        FieldShape::Scalar { ty, list: false } => {
            let add = (field.name != "id").then(|| input(field, InputType::Scalar(ty), !field.nullable));
            let update = input(field, InputType::Scalar(ty), ty == ScalarType::Id);
            FieldInputs::Both { add, update }
        }
        FieldShape::Scalar { ty, list: true } => FieldInputs::Both {
            add: Some(input(field, InputType::ScalarList(ty), false)),
            update: input(field, InputType::ScalarList(ty), false),
        },
        FieldShape::Enum { ty, list: false } => FieldInputs::Both {
            add: Some(input(field, InputType::Enum(ty.clone()), !field.nullable)),
            update: input(field, InputType::Enum(ty.clone()), false),
        },
        FieldShape::Enum { ty, list: true } => FieldInputs::Both {
            add: Some(input(field, InputType::EnumList(ty.clone()), false)),
            update: input(field, InputType::EnumList(ty.clone()), false),
        },
        FieldShape::ReferencedObject { .. } => FieldInputs::Both {
            add: Some(input(field, InputType::IdRef, !field.nullable)),
            update: input(field, InputType::IdRef, false),
        },
        FieldShape::EmbeddedObject { target } => {
            if !catalog.contains(target) {
                return Ok(FieldInputs::Blocked);
            }
            FieldInputs::Both {
                add: Some(input(field, InputType::Shape(add_shape_name(target)), false)),
                update: input(field, InputType::Shape(update_shape_name(target)), false),
            }
        }
        FieldShape::EmbeddedList { target } => {
            if !catalog.contains(target) {
                return Ok(FieldInputs::Blocked);
            }
            FieldInputs::Both {
                add: Some(input(field, InputType::ShapeList(add_shape_name(target)), false)),
                update: input(field, InputType::ShapeList(update_shape_name(target)), false),
            }
        }
        FieldShape::ReferencedList { target, .. } if target == entity => FieldInputs::Deferred,
        FieldShape::ReferencedList { target, .. } => FieldInputs::Both {
            add: Some(input(field, delta(&field.name, "A", target), false)),
            update: input(field, delta(&field.name, "U", target), false),
        },
    };
    Ok(inputs)
}

fn delta(field: &str, prefix: &str, target: &str) -> InputType {
    InputType::Delta {
        name: delta_name(prefix, field),
        added: add_shape_name(target),
        updated: update_shape_name(target),
    }
}

/// Second phase: attach self-referencing collection deltas once the entity's
/// own shape names exist.
fn attach_deferred(provisional: Provisional) -> (InputShape, InputShape, Vec<String>) {
    let Provisional {
        mut add,
        mut update,
        deferred,
        machine_owned,
    } = provisional;
    for field in deferred {
        let added = add.name.clone();
        let updated = update.name.clone();
        add.fields.push(InputField {
            name: field.clone(),
            ty: InputType::Delta {
                name: delta_name("A", &field),
                added: added.clone(),
                updated: updated.clone(),
            },
            non_null: false,
            description: None,
        });
        update.fields.push(InputField {
            name: field.clone(),
            ty: InputType::Delta {
                name: delta_name("U", &field),
                added,
                updated,
            },
            non_null: false,
            description: None,
        });
    }
    (add, update, machine_owned)
}
