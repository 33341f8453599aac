//! Aggregation pipeline stages.
//!
//! A compiled read query is an ordered list of [`Stage`]s evaluated against one
//! collection: joins (`Lookup` + `Unwind`), one `Match`, an optional `Sort`,
//! then `Limit`/`Skip` or a terminal `Count`.

use morph_core::Value;
use serde_json::json;

/// An ordered list of stages.
pub type Pipeline = Vec<Stage>;

/// One step of a read query.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Left outer join against another collection.
    Lookup(Lookup),
    /// Flatten an array field, one output document per element.
    Unwind(Unwind),
    /// Keep documents satisfying every predicate.
    Match(Vec<Predicate>),
    /// Order documents by the given keys, most significant first.
    Sort(Vec<SortKey>),
    /// Drop the first `n` documents.
    Skip(u64),
    /// Keep at most `n` documents.
    Limit(u64),
    /// Replace the stream by a single `{field: count}` document (none when empty).
    Count(String),
}

/// Join specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Collection to join against.
    pub from: String,
    /// Path in the current document.
    pub local_field: String,
    /// Path in the joined collection's documents.
    pub foreign_field: String,
    /// Field receiving the array of joined documents.
    pub alias: String,
}

/// Flatten specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unwind {
    pub path: String,
    /// Keep documents whose array is missing or empty.
    pub preserve_null_and_empty: bool,
}

/// A single field predicate inside a `Match`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub path: String,
    pub condition: Condition,
}

impl Predicate {
    pub fn new(path: impl Into<String>, condition: Condition) -> Self {
        Self {
            path: path.into(),
            condition,
        }
    }
}

/// Comparison applied to the value(s) found at a predicate's path.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    /// Inclusive two-sided range.
    Between { low: Value, high: Value },
    In(Vec<Value>),
    Nin(Vec<Value>),
    /// Unanchored regular expression match on strings.
    Regex(String),
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    /// `1` for ascending, `-1` for descending.
    pub fn sign(&self) -> i32 {
        match self {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub direction: SortDirection,
}

impl Stage {
    /// Render in the document-store wire form, e.g. `{"$limit": 10}`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Stage::Lookup(lookup) => json!({
                "$lookup": {
                    "from": lookup.from,
                    "localField": lookup.local_field,
                    "foreignField": lookup.foreign_field,
                    "as": lookup.alias,
                }
            }),
            Stage::Unwind(unwind) => json!({
                "$unwind": {
                    "path": format!("${}", unwind.path),
                    "preserveNullAndEmptyArrays": unwind.preserve_null_and_empty,
                }
            }),
            Stage::Match(predicates) => {
                let mut clauses = serde_json::Map::new();
                for predicate in predicates {
                    let rendered = predicate.condition.to_json();
                    let mergeable = matches!(
                        (clauses.get(&predicate.path), &rendered),
                        (Some(serde_json::Value::Object(_)), serde_json::Value::Object(_))
                    );
                    if !mergeable {
                        clauses.insert(predicate.path.clone(), rendered);
                    } else if let (
                        Some(serde_json::Value::Object(existing)),
                        serde_json::Value::Object(more),
                    ) = (clauses.get_mut(&predicate.path), rendered)
                    {
                        existing.extend(more);
                    }
                }
                json!({ "$match": clauses })
            }
            Stage::Sort(keys) => {
                let mut spec = serde_json::Map::new();
                for key in keys {
                    spec.insert(key.path.clone(), json!(key.direction.sign()));
                }
                json!({ "$sort": spec })
            }
            Stage::Skip(n) => json!({ "$skip": n }),
            Stage::Limit(n) => json!({ "$limit": n }),
            Stage::Count(field) => json!({ "$count": field }),
        }
    }
}

impl Condition {
    fn to_json(&self) -> serde_json::Value {
        let list = |values: &[Value]| values.iter().map(Value::to_json).collect::<Vec<_>>();
        match self {
            Condition::Eq(v) => v.to_json(),
            Condition::Ne(v) => json!({ "$ne": v.to_json() }),
            Condition::Lt(v) => json!({ "$lt": v.to_json() }),
            Condition::Lte(v) => json!({ "$lte": v.to_json() }),
            Condition::Gt(v) => json!({ "$gt": v.to_json() }),
            Condition::Gte(v) => json!({ "$gte": v.to_json() }),
            Condition::Between { low, high } => {
                json!({ "$gte": low.to_json(), "$lte": high.to_json() })
            }
            Condition::In(values) => json!({ "$in": list(values) }),
            Condition::Nin(values) => json!({ "$nin": list(values) }),
            Condition::Regex(pattern) => json!({ "$regex": pattern }),
        }
    }
}

/// Render a whole pipeline, for logs and assertions.
pub fn pipeline_to_json(pipeline: &[Stage]) -> serde_json::Value {
    serde_json::Value::Array(pipeline.iter().map(Stage::to_json).collect())
}
