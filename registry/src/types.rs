//! Entity and field definition types.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use morph_core::{parse_timestamp, Value};

use crate::validators::{EntityValidator, FieldValidator};

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Id,
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Date,
    Time,
}

impl ScalarType {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarType::Id => "ID",
            ScalarType::String => "String",
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::Boolean => "Boolean",
            ScalarType::DateTime => "DateTime",
            ScalarType::Date => "Date",
            ScalarType::Time => "Time",
        }
    }

    /// Calendar/time types, stored as timestamps.
    pub fn is_temporal(&self) -> bool {
        matches!(self, ScalarType::DateTime | ScalarType::Date | ScalarType::Time)
    }

    /// Convert a wire value to its stored form. `None` when the value does not fit.
    ///
    /// Identifiers accept their hex rendering, temporal types accept their
    /// textual forms or epoch milliseconds. Null passes through.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            ScalarType::Id => value.to_id().map(Value::Id),
            ScalarType::String => value.as_str().map(Value::from),
            ScalarType::Int => match value {
                Value::Int(i) => Some(Value::Int(*i)),
                Value::Float(f) if f.fract() == 0.0 => Some(Value::Int(*f as i64)),
                _ => None,
            },
            ScalarType::Float => value.as_float().map(Value::Float),
            ScalarType::Boolean => value.as_bool().map(Value::Bool),
            ScalarType::DateTime | ScalarType::Date | ScalarType::Time => match value {
                Value::Timestamp(ms) | Value::Int(ms) => Some(Value::Timestamp(*ms)),
                Value::String(s) => parse_timestamp(s).map(Value::Timestamp),
                _ => None,
            },
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An enumeration type: a name and its allowed symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumType {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.values.iter().any(|v| v == symbol)
    }
}

/// Declared value kind of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Scalar(ScalarType),
    Enum(EnumType),
    /// A single related entity, by name.
    Object(String),
    ScalarList(ScalarType),
    EnumList(EnumType),
    /// Many related entities, by name.
    ObjectList(String),
}

/// How an object-valued field relates to its target entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationPolicy {
    /// Stored inline as a nested document.
    pub embedded: bool,
    /// Foreign-key field. On the owner for a single reference, on the
    /// child for a list reference.
    pub connection_field: String,
    pub display_field: Option<String>,
}

impl RelationPolicy {
    pub fn embedded() -> Self {
        Self {
            embedded: true,
            connection_field: String::new(),
            display_field: None,
        }
    }

    pub fn referenced(connection_field: impl Into<String>) -> Self {
        Self {
            embedded: false,
            connection_field: connection_field.into(),
            display_field: None,
        }
    }
}

/// Operation kinds validators are keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Field kind after relation policy is applied.
///
/// This is the one classification every engine matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape<'f> {
    Scalar { ty: ScalarType, list: bool },
    Enum { ty: &'f EnumType, list: bool },
    EmbeddedObject { target: &'f str },
    ReferencedObject { target: &'f str, relation: &'f RelationPolicy },
    EmbeddedList { target: &'f str },
    ReferencedList { target: &'f str, relation: &'f RelationPolicy },
}

/// Field definition within an entity.
#[derive(Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: ValueKind,
    pub nullable: bool,
    pub read_only: bool,
    pub unique: bool,
    pub relation: Option<RelationPolicy>,
    pub validators: BTreeMap<Operation, Vec<Arc<dyn FieldValidator>>>,
    pub description: Option<String>,
}

impl FieldDef {
    /// A nullable field of the given kind.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: true,
            read_only: false,
            unique: false,
            relation: None,
            validators: BTreeMap::new(),
            description: None,
        }
    }

    /// The conventional `id` field.
    pub fn id() -> Self {
        Self::new("id", ValueKind::Scalar(ScalarType::Id)).non_null()
    }

    pub fn scalar(name: impl Into<String>, ty: ScalarType) -> Self {
        Self::new(name, ValueKind::Scalar(ty))
    }

    pub fn enumeration(name: impl Into<String>, ty: EnumType) -> Self {
        Self::new(name, ValueKind::Enum(ty))
    }

    pub fn object(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, ValueKind::Object(target.into()))
    }

    pub fn list_of(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, ValueKind::ObjectList(target.into()))
    }

    pub fn non_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Store the related entity inline.
    pub fn embedded(mut self) -> Self {
        self.relation = Some(RelationPolicy::embedded());
        self
    }

    /// Store the related entity separately, linked through `connection_field`.
    pub fn references(mut self, connection_field: impl Into<String>) -> Self {
        self.relation = Some(RelationPolicy::referenced(connection_field));
        self
    }

    pub fn relation(mut self, relation: RelationPolicy) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn validate(mut self, operation: Operation, validator: impl FieldValidator + 'static) -> Self {
        self.validators
            .entry(operation)
            .or_default()
            .push(Arc::new(validator));
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn validators_for(&self, operation: Operation) -> &[Arc<dyn FieldValidator>] {
        self.validators
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the field is an identifier scalar.
    pub fn is_id(&self) -> bool {
        matches!(self.kind, ValueKind::Scalar(ScalarType::Id))
    }

    /// Classify the field. `None` for an object field without a relation policy.
    pub fn shape(&self) -> Option<FieldShape<'_>> {
        match (&self.kind, &self.relation) {
            (ValueKind::Scalar(ty), _) => Some(FieldShape::Scalar { ty: *ty, list: false }),
            (ValueKind::ScalarList(ty), _) => Some(FieldShape::Scalar { ty: *ty, list: true }),
            (ValueKind::Enum(ty), _) => Some(FieldShape::Enum { ty, list: false }),
            (ValueKind::EnumList(ty), _) => Some(FieldShape::Enum { ty, list: true }),
            (ValueKind::Object(target), Some(relation)) if relation.embedded => {
                Some(FieldShape::EmbeddedObject { target })
            }
            (ValueKind::Object(target), Some(relation)) => {
                Some(FieldShape::ReferencedObject { target, relation })
            }
            (ValueKind::ObjectList(target), Some(relation)) if relation.embedded => {
                Some(FieldShape::EmbeddedList { target })
            }
            (ValueKind::ObjectList(target), Some(relation)) => {
                Some(FieldShape::ReferencedList { target, relation })
            }
            (ValueKind::Object(_) | ValueKind::ObjectList(_), None) => None,
        }
    }

    /// Target entity of an object or object-list field.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Object(target) | ValueKind::ObjectList(target) => Some(target),
            _ => None,
        }
    }
}

impl fmt::Debug for FieldDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDef")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("nullable", &self.nullable)
            .field("read_only", &self.read_only)
            .field("unique", &self.unique)
            .field("relation", &self.relation)
            .field("validators", &self.validators.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

/// Entity definition: a named, ordered field list.
#[derive(Clone)]
pub struct EntityDef {
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
    pub validators: BTreeMap<Operation, Vec<Arc<dyn EntityValidator>>>,
    pub description: Option<String>,
}

impl EntityDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            validators: BTreeMap::new(),
            description: None,
        }
    }

    /// Add a field. A later field with the same name replaces the earlier one.
    pub fn field(mut self, field: FieldDef) -> Self {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(existing) => *existing = field,
            None => self.fields.push(field),
        }
        self
    }

    pub fn validate(mut self, operation: Operation, validator: impl EntityValidator + 'static) -> Self {
        self.validators
            .entry(operation)
            .or_default()
            .push(Arc::new(validator));
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn validators_for(&self, operation: Operation) -> &[Arc<dyn EntityValidator>] {
        self.validators
            .get(&operation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl fmt::Debug for EntityDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDef")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}
