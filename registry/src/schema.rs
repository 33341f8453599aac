//! Persistence schema generation.
//!
//! Every entity with a collection gets a [`CollectionSchema`] derived from its
//! fields. Referenced objects become their foreign-key field, embedded objects
//! become nested schemas, and referenced lists contribute nothing (the child
//! holds the key).

use morph_store::CollectionSpec;

use crate::{EntityDef, RegistryError, RegistryResult, ScalarType, ValueKind};

/// Stored type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaType {
    ObjectId,
    String,
    Number,
    Boolean,
    Date,
    Nested(Vec<SchemaField>),
    Array(Box<SchemaType>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaField {
    pub name: String,
    pub ty: SchemaType,
    pub unique: bool,
}

/// Stored layout of one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub entity: String,
    pub collection: String,
    pub fields: Vec<SchemaField>,
}

impl CollectionSchema {
    pub fn unique_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|f| f.unique)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn get_field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The store-level settings for this collection.
    pub fn to_spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.collection.clone(),
            unique: self.unique_fields(),
        }
    }
}

fn scalar_schema(ty: ScalarType) -> SchemaType {
    match ty {
        ScalarType::Id => SchemaType::ObjectId,
        ScalarType::String => SchemaType::String,
        ScalarType::Int | ScalarType::Float => SchemaType::Number,
        ScalarType::Boolean => SchemaType::Boolean,
        ScalarType::DateTime | ScalarType::Date | ScalarType::Time => SchemaType::Date,
    }
}

/// Derive the stored fields of `def`.
///
/// `lookup` resolves embedded targets; `visiting` holds the chain of entities
/// being expanded and rejects embedding cycles.
pub(crate) fn schema_fields<'a>(
    def: &'a EntityDef,
    lookup: &dyn Fn(&str) -> Option<&'a EntityDef>,
    visiting: &mut Vec<String>,
) -> RegistryResult<Vec<SchemaField>> {
    visiting.push(def.name.clone());
    let mut fields = Vec::with_capacity(def.fields.len());

    for field in &def.fields {
        let ty = match &field.kind {
            ValueKind::Scalar(ty) => Some(scalar_schema(*ty)),
            ValueKind::Enum(_) => Some(SchemaType::String),
            ValueKind::ScalarList(ty) => Some(SchemaType::Array(Box::new(scalar_schema(*ty)))),
            ValueKind::EnumList(_) => Some(SchemaType::Array(Box::new(SchemaType::String))),
            ValueKind::Object(target) | ValueKind::ObjectList(target) => {
                let Some(relation) = &field.relation else {
                    return Err(RegistryError::missing_relation(&def.name, &field.name));
                };
                let is_list = matches!(field.kind, ValueKind::ObjectList(_));
                if !relation.embedded {
                    if !is_list {
                        fields.push(SchemaField {
                            name: relation.connection_field.clone(),
                            ty: SchemaType::ObjectId,
                            unique: false,
                        });
                    }
                    None
                } else {
                    if target == &def.name {
                        return Err(RegistryError::embedded_self(&def.name, &field.name));
                    }
                    if visiting.contains(target) {
                        let mut path = visiting.clone();
                        path.push(target.clone());
                        return Err(RegistryError::EmbeddedCycle {
                            entity: def.name.clone(),
                            path: path.join(" -> "),
                        });
                    }
                    let nested_def = lookup(target)
                        .ok_or_else(|| RegistryError::unknown_target(&def.name, &field.name, target))?;
                    let nested = SchemaType::Nested(schema_fields(nested_def, lookup, visiting)?);
                    Some(if is_list {
                        SchemaType::Array(Box::new(nested))
                    } else {
                        nested
                    })
                }
            }
        };

        if let Some(ty) = ty {
            let unique = field.unique
                && matches!(
                    field.kind,
                    ValueKind::Enum(_)
                        | ValueKind::Scalar(ScalarType::String | ScalarType::Int | ScalarType::Float)
                );
            fields.push(SchemaField {
                name: field.name.clone(),
                ty,
                unique,
            });
        }
    }

    visiting.pop();
    Ok(fields)
}
