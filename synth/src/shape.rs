//! Input shapes and the catalog holding them.
//!
//! Shapes refer to each other by name, so a shape can mention itself (through
//! a collection delta) without being constructed recursively.

use std::collections::BTreeMap;

use morph_core::{Document, Value};
use morph_registry::{EnumType, ScalarType};

use crate::InputError;

/// Type of one input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputType {
    Scalar(ScalarType),
    Enum(EnumType),
    ScalarList(ScalarType),
    EnumList(EnumType),
    /// `{id}` reference to a stored entity.
    IdRef,
    /// A nested shape, by name.
    Shape(String),
    /// A list of a nested shape, by name.
    ShapeList(String),
    /// `{added: [added], updated: [updated], deleted: [ID]}`.
    Delta {
        name: String,
        added: String,
        updated: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputField {
    pub name: String,
    pub ty: InputType,
    pub non_null: bool,
    pub description: Option<String>,
}

/// A named input shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputShape {
    pub name: String,
    pub entity: String,
    /// Fields in declaration order.
    pub fields: Vec<InputField>,
}

impl InputShape {
    pub fn get_field(&self, name: &str) -> Option<&InputField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}

/// Add and update shapes of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInputs {
    pub add: String,
    pub update: String,
}

/// Every synthesized input shape, by name and by entity.
#[derive(Debug, Clone, Default)]
pub struct InputCatalog {
    shapes: BTreeMap<String, InputShape>,
    entities: BTreeMap<String, EntityInputs>,
    /// State fields excluded because a state machine owns them, per entity.
    machine_owned: BTreeMap<String, Vec<String>>,
    passes: usize,
}

impl InputCatalog {
    pub(crate) fn insert(&mut self, add: InputShape, update: InputShape, machine_owned: Vec<String>) {
        let entity = add.entity.clone();
        self.entities.insert(
            entity.clone(),
            EntityInputs {
                add: add.name.clone(),
                update: update.name.clone(),
            },
        );
        if !machine_owned.is_empty() {
            self.machine_owned.insert(entity, machine_owned);
        }
        self.shapes.insert(add.name.clone(), add);
        self.shapes.insert(update.name.clone(), update);
    }

    pub(crate) fn set_passes(&mut self, passes: usize) {
        self.passes = passes;
    }

    /// Whether an entity's shapes are built.
    pub fn contains(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn shape(&self, name: &str) -> Option<&InputShape> {
        self.shapes.get(name)
    }

    /// The creation shape of an entity.
    pub fn add_shape(&self, entity: &str) -> Option<&InputShape> {
        self.entities.get(entity).and_then(|e| self.shapes.get(&e.add))
    }

    /// The update shape of an entity.
    pub fn update_shape(&self, entity: &str) -> Option<&InputShape> {
        self.entities
            .get(entity)
            .and_then(|e| self.shapes.get(&e.update))
    }

    pub fn is_machine_owned(&self, entity: &str, field: &str) -> bool {
        self.machine_owned
            .get(entity)
            .map(|fields| fields.iter().any(|f| f == field))
            .unwrap_or(false)
    }

    /// Fixed-point passes the synthesis took.
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    // ==================== Input checking ====================

    /// Check an argument tree against the named shape: no unknown fields, no
    /// missing non-null fields, and every value of the declared type.
    pub fn check(&self, shape_name: &str, args: &Document) -> Result<(), InputError> {
        let shape = self
            .shape(shape_name)
            .ok_or_else(|| InputError::new(shape_name, "unknown input shape"))?;
        self.check_shape(shape, args, shape_name)
    }

    fn check_shape(&self, shape: &InputShape, args: &Document, path: &str) -> Result<(), InputError> {
        for key in args.keys() {
            if shape.get_field(key).is_none() {
                return Err(InputError::new(
                    format!("{}.{}", path, key),
                    format!("field is not defined by {}", shape.name),
                ));
            }
        }
        for field in &shape.fields {
            let here = format!("{}.{}", path, field.name);
            match args.get(&field.name) {
                None | Some(Value::Null) if field.non_null => {
                    return Err(InputError::new(here, "value is required"));
                }
                None | Some(Value::Null) => {}
                Some(value) => self.check_value(&field.ty, value, &here)?,
            }
        }
        Ok(())
    }

    fn check_value(&self, ty: &InputType, value: &Value, path: &str) -> Result<(), InputError> {
        match ty {
            InputType::Scalar(scalar) => check_scalar(*scalar, value, path),
            InputType::Enum(enumeration) => check_enum(enumeration, value, path),
            InputType::ScalarList(scalar) => each(value, path, |item, at| check_scalar(*scalar, item, at)),
            InputType::EnumList(enumeration) => {
                each(value, path, |item, at| check_enum(enumeration, item, at))
            }
            InputType::IdRef => {
                let id = value
                    .as_object()
                    .and_then(|doc| doc.get("id"))
                    .ok_or_else(|| InputError::new(path, "expected {id}"))?;
                check_scalar(ScalarType::Id, id, &format!("{}.id", path))
            }
            InputType::Shape(name) => self.check_nested(name, value, path),
            InputType::ShapeList(name) => each(value, path, |item, at| self.check_nested(name, item, at)),
            InputType::Delta {
                added, updated, ..
            } => {
                let doc = value
                    .as_object()
                    .ok_or_else(|| InputError::new(path, "expected {added, updated, deleted}"))?;
                for (key, item) in doc {
                    let at = format!("{}.{}", path, key);
                    match key.as_str() {
                        _ if item.is_null() => {}
                        "added" => each(item, &at, |v, p| self.check_nested(added, v, p))?,
                        "updated" => each(item, &at, |v, p| self.check_nested(updated, v, p))?,
                        "deleted" => each(item, &at, |v, p| check_scalar(ScalarType::Id, v, p))?,
                        _ => return Err(InputError::new(at, "field is not defined by collection delta")),
                    }
                }
                Ok(())
            }
        }
    }

    fn check_nested(&self, name: &str, value: &Value, path: &str) -> Result<(), InputError> {
        let shape = self
            .shape(name)
            .ok_or_else(|| InputError::new(path, format!("unknown input shape {}", name)))?;
        let doc = value
            .as_object()
            .ok_or_else(|| InputError::new(path, format!("expected {}", name)))?;
        self.check_shape(shape, doc, path)
    }
}

fn each(
    value: &Value,
    path: &str,
    mut check: impl FnMut(&Value, &str) -> Result<(), InputError>,
) -> Result<(), InputError> {
    let items = value
        .as_list()
        .ok_or_else(|| InputError::new(path, "expected a list"))?;
    for (i, item) in items.iter().enumerate() {
        check(item, &format!("{}[{}]", path, i))?;
    }
    Ok(())
}

fn check_scalar(ty: ScalarType, value: &Value, path: &str) -> Result<(), InputError> {
    match ty.coerce(value) {
        Some(_) => Ok(()),
        None => Err(InputError::new(
            path,
            format!("expected {}, got {}", ty, value.type_name()),
        )),
    }
}

fn check_enum(ty: &EnumType, value: &Value, path: &str) -> Result<(), InputError> {
    match value.as_str() {
        Some(symbol) if ty.contains(symbol) => Ok(()),
        _ => Err(InputError::new(
            path,
            format!("expected a value of {}, got {}", ty.name, value),
        )),
    }
}
