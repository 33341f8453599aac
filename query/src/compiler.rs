//! Query compiler: list arguments to an aggregation pipeline.
//!
//! Stage order is fixed: every join (`Lookup` + `Unwind`) first, then one
//! `Match` holding all predicates, then either `Sort` + `Limit` + `Skip` or a
//! terminal `Count`.

use morph_core::{QueryConfig, Value};
use morph_registry::{EntityDef, FieldShape, Registry, RelationPolicy, ScalarType};
use morph_store::{
    pipeline_to_json, Condition, Lookup, Pipeline, Predicate, SortDirection, SortKey, Stage, Unwind,
};
use tracing::debug;

use crate::{FieldFilter, ListArgs, Operator, Pagination, QueryError, QueryResult, SortOrder};

/// Field the count stage writes its total into.
pub const COUNT_FIELD: &str = "size";

/// Stored name of a field: `id` lives under `_id`.
pub fn stored_name(field: &str) -> &str {
    if field == "id" {
        "_id"
    } else {
        field
    }
}

/// Joins and predicates collected while walking the filters.
#[derive(Debug, Default)]
struct Plan {
    joins: Vec<Lookup>,
    predicates: Vec<Predicate>,
}

impl Plan {
    /// Add a join unless one with the same alias exists.
    fn join(&mut self, lookup: Lookup) {
        if !self.joins.iter().any(|j| j.alias == lookup.alias) {
            self.joins.push(lookup);
        }
    }

    fn is_empty(&self) -> bool {
        self.joins.is_empty() && self.predicates.is_empty()
    }
}

/// Compiles list arguments against the registry.
pub struct QueryCompiler<'r> {
    registry: &'r Registry,
    default_limit: u64,
}

impl<'r> QueryCompiler<'r> {
    pub fn new(registry: &'r Registry, config: &QueryConfig) -> Self {
        Self {
            registry,
            default_limit: config.default_limit,
        }
    }

    /// Pipeline returning the requested page of documents. Empty when the
    /// arguments carry no filter, sort or pagination.
    pub fn compile(&self, entity: &str, args: &ListArgs) -> QueryResult<Pipeline> {
        self.build(entity, args, false)
    }

    /// Pipeline returning `{size: n}`, or nothing when no document matches.
    pub fn compile_count(&self, entity: &str, args: &ListArgs) -> QueryResult<Pipeline> {
        self.build(entity, args, true)
    }

    fn build(&self, entity: &str, args: &ListArgs, count: bool) -> QueryResult<Pipeline> {
        let def = &self.registry.entity(entity)?.def;
        let mut plan = Plan::default();
        for (field, filter) in &args.filters {
            self.compile_filter(def, field, filter, &mut plan)?;
        }

        if !count && plan.is_empty() && args.sort.is_empty() && args.pagination.is_none() {
            return Ok(Vec::new());
        }

        let mut pipeline = Pipeline::new();
        for lookup in plan.joins {
            let path = lookup.alias.clone();
            pipeline.push(Stage::Lookup(lookup));
            pipeline.push(Stage::Unwind(Unwind {
                path,
                preserve_null_and_empty: true,
            }));
        }
        if !plan.predicates.is_empty() {
            pipeline.push(Stage::Match(plan.predicates));
        }

        if count {
            pipeline.push(Stage::Count(COUNT_FIELD.to_string()));
        } else {
            if !args.sort.is_empty() {
                pipeline.push(Stage::Sort(
                    args.sort
                        .iter()
                        .map(|term| SortKey {
                            path: sort_path(&term.field),
                            direction: match term.order {
                                SortOrder::Asc => SortDirection::Ascending,
                                SortOrder::Desc => SortDirection::Descending,
                            },
                        })
                        .collect(),
                ));
            }
            let (limit, skip) = match args.pagination.filter(Pagination::is_active) {
                Some(page) => (page.limit(), page.skip()),
                None => (self.default_limit, 0),
            };
            pipeline.push(Stage::Limit(limit));
            pipeline.push(Stage::Skip(skip));
        }

        debug!(
            entity,
            count,
            pipeline = %pipeline_to_json(&pipeline),
            "compiled list query"
        );
        Ok(pipeline)
    }

    // ==================== Filters ====================

    fn compile_filter(
        &self,
        def: &EntityDef,
        field: &str,
        filter: &FieldFilter,
        plan: &mut Plan,
    ) -> QueryResult<()> {
        let field_def = def
            .get_field(field)
            .ok_or_else(|| QueryError::unknown_field(&def.name, field))?;
        let shape = field_def.shape().ok_or_else(|| QueryError::MissingRelation {
            entity: def.name.clone(),
            field: field.to_string(),
        })?;

        match (shape, filter) {
            (FieldShape::Scalar { ty, .. }, FieldFilter::Term(term)) => {
                let path = stored_name(field).to_string();
                let condition = condition(&path, Some(ty), term.operator, &term.value)?;
                plan.predicates.push(Predicate::new(path, condition));
                Ok(())
            }
            (FieldShape::Enum { .. }, FieldFilter::Term(term)) => {
                let condition = condition(field, None, term.operator, &term.value)?;
                plan.predicates.push(Predicate::new(field, condition));
                Ok(())
            }
            (FieldShape::Scalar { .. } | FieldShape::Enum { .. }, FieldFilter::Terms(_)) => Err(
                QueryError::invalid_argument(format!("{} takes {{operator, value}}, not terms", field)),
            ),
            (_, FieldFilter::Term(_)) => Err(QueryError::invalid_argument(format!(
                "{} takes {{terms: [{{operator, value, path}}]}}",
                field
            ))),
            (shape, FieldFilter::Terms(terms)) => {
                let root = Hop::root(shape);
                if let Some(lookup) = self.root_join(field, &root)? {
                    plan.join(lookup);
                }
                for term in terms {
                    let (path, ty) = self.walk(&def.name, field, &root, &term.path, plan)?;
                    let condition = condition(&path, ty, term.operator, &term.value)?;
                    plan.predicates.push(Predicate::new(path, condition));
                }
                Ok(())
            }
        }
    }

    fn root_join(&self, field: &str, root: &Hop<'_>) -> QueryResult<Option<Lookup>> {
        match root.relation {
            Some((relation, list)) => Ok(Some(self.lookup(root.target, relation, list, "", field)?)),
            None => Ok(None),
        }
    }

    /// Join `target` into the stream under `alias`. `base` is the path of the
    /// document owning the relation, empty for the queried entity itself.
    fn lookup(
        &self,
        target: &str,
        relation: &RelationPolicy,
        list: bool,
        base: &str,
        alias: &str,
    ) -> QueryResult<Lookup> {
        let from = self.registry.collection_of(target)?.to_string();
        let (local_field, foreign_field) = if list {
            (join_path(base, "_id"), relation.connection_field.clone())
        } else {
            (join_path(base, &relation.connection_field), "_id".to_string())
        };
        Ok(Lookup {
            from,
            local_field,
            foreign_field,
            alias: alias.to_string(),
        })
    }

    /// Follow a dotted path from a relation or embedded field down to a
    /// scalar, joining every referenced hop on the way. Returns the matched
    /// path and the scalar type at its end.
    fn walk(
        &self,
        entity: &str,
        field: &str,
        root: &Hop<'_>,
        path: &str,
        plan: &mut Plan,
    ) -> QueryResult<(String, Option<ScalarType>)> {
        let full = format!("{}.{}.{}", entity, field, path);
        let segments: Vec<&str> = path.split('.').collect();
        let mut alias = field.to_string();
        let mut embedded: Vec<&str> = Vec::new();
        let mut current = root.target;

        for (i, segment) in segments.iter().enumerate() {
            let last = i + 1 == segments.len();
            let def = self
                .registry
                .def(current)
                .ok_or_else(|| QueryError::invalid_path(&full, format!("unknown entity {}", current)))?;
            let field_def = def
                .get_field(segment)
                .ok_or_else(|| QueryError::unknown_field(current, *segment))?;
            let shape = field_def.shape().ok_or_else(|| QueryError::MissingRelation {
                entity: current.to_string(),
                field: segment.to_string(),
            })?;

            match shape {
                FieldShape::Scalar { .. } | FieldShape::Enum { .. } if !last => {
                    return Err(QueryError::invalid_path(&full, format!("{} is not an object", segment)));
                }
                FieldShape::Scalar { ty, .. } => {
                    let matched = join_path(&join_path(&alias, &embedded.join(".")), stored_name(segment));
                    return Ok((matched, Some(ty)));
                }
                FieldShape::Enum { .. } => {
                    let matched = join_path(&join_path(&alias, &embedded.join(".")), segment);
                    return Ok((matched, None));
                }
                FieldShape::EmbeddedObject { target } | FieldShape::EmbeddedList { target } => {
                    embedded.push(segment);
                    current = target;
                }
                FieldShape::ReferencedObject { target, relation }
                | FieldShape::ReferencedList { target, relation } => {
                    let list = matches!(shape, FieldShape::ReferencedList { .. });
                    let base = join_path(&alias, &embedded.join("."));
                    let next = if embedded.is_empty() {
                        format!("{}_{}", alias, segment)
                    } else {
                        format!("{}_{}_{}", alias, embedded.join("_"), segment)
                    };
                    plan.join(self.lookup(target, relation, list, &base, &next)?);
                    alias = next;
                    embedded.clear();
                    current = target;
                }
            }
        }
        Err(QueryError::invalid_path(full, "path does not end at a scalar field"))
    }
}

/// The relation or embedded field a set of path terms starts from.
struct Hop<'f> {
    target: &'f str,
    /// Relation and list flag when the field is referenced.
    relation: Option<(&'f RelationPolicy, bool)>,
}

impl<'f> Hop<'f> {
    fn root(shape: FieldShape<'f>) -> Self {
        match shape {
            FieldShape::ReferencedObject { target, relation } => Hop {
                target,
                relation: Some((relation, false)),
            },
            FieldShape::ReferencedList { target, relation } => Hop {
                target,
                relation: Some((relation, true)),
            },
            FieldShape::EmbeddedObject { target } | FieldShape::EmbeddedList { target } => Hop {
                target,
                relation: None,
            },
            FieldShape::Scalar { .. } | FieldShape::Enum { .. } => Hop {
                target: "",
                relation: None,
            },
        }
    }
}

fn join_path(base: &str, field: &str) -> String {
    match (base.is_empty(), field.is_empty()) {
        (true, _) => field.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}.{}", base, field),
    }
}

fn sort_path(field: &str) -> String {
    match field.split_once('.') {
        Some((head, rest)) => format!("{}.{}", stored_name(head), rest),
        None => stored_name(field).to_string(),
    }
}

// ==================== Conditions ====================

fn is_id_path(path: &str) -> bool {
    path.ends_with("_id")
}

/// Convert a filter value to its stored form. The `_id` suffix only decides
/// for paths without a declared type.
fn coerce(path: &str, ty: Option<ScalarType>, value: &Value) -> QueryResult<Value> {
    let target = match ty {
        Some(ScalarType::Id) => Some(ScalarType::Id),
        Some(ty) if ty.is_temporal() => Some(ty),
        Some(_) => None,
        None if is_id_path(path) => Some(ScalarType::Id),
        None => None,
    };
    match target {
        Some(ty) => ty.coerce(value).ok_or_else(|| {
            QueryError::invalid_value(path, format!("expected {}, got {}", ty, value.type_name()))
        }),
        None => Ok(value.clone()),
    }
}

fn coerce_all(path: &str, ty: Option<ScalarType>, value: &Value) -> QueryResult<Vec<Value>> {
    match value {
        Value::List(items) => items.iter().map(|v| coerce(path, ty, v)).collect(),
        single => Ok(vec![coerce(path, ty, single)?]),
    }
}

fn condition(path: &str, ty: Option<ScalarType>, operator: Operator, value: &Value) -> QueryResult<Condition> {
    Ok(match operator {
        Operator::Eq => Condition::Eq(coerce(path, ty, value)?),
        Operator::Ne => Condition::Ne(coerce(path, ty, value)?),
        Operator::Lt => Condition::Lt(coerce(path, ty, value)?),
        Operator::Lte => Condition::Lte(coerce(path, ty, value)?),
        Operator::Gt => Condition::Gt(coerce(path, ty, value)?),
        Operator::Gte => Condition::Gte(coerce(path, ty, value)?),
        Operator::Btw => match value.as_list() {
            Some([low, high]) => Condition::Between {
                low: coerce(path, ty, low)?,
                high: coerce(path, ty, high)?,
            },
            _ => {
                return Err(QueryError::invalid_value(
                    path,
                    "BTW expects a two-element list",
                ))
            }
        },
        Operator::In => Condition::In(coerce_all(path, ty, value)?),
        Operator::Nin => Condition::Nin(coerce_all(path, ty, value)?),
        Operator::Like => {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => return Err(QueryError::invalid_value(path, "LIKE expects text")),
                other => other.to_string(),
            };
            Condition::Regex(format!(".*{}.*", regex_lite::escape(&text)))
        }
    })
}
