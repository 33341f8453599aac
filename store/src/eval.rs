//! Pipeline evaluation over in-memory documents.
//!
//! Path resolution follows document-store conventions: a dotted path fans out
//! over arrays, and a predicate holds when any resolved value satisfies it.

use std::cmp::Ordering;

use morph_core::{Document, Value};
use regex_lite::Regex;

use crate::pipeline::{Condition, Lookup, Predicate, SortDirection, SortKey, Stage, Unwind};
use crate::{StoreError, StoreResult};

/// Run `pipeline` over `docs`. `source` yields the documents of a joined collection.
pub fn run_pipeline(
    docs: Vec<Document>,
    pipeline: &[Stage],
    source: &dyn Fn(&str) -> Vec<Document>,
) -> StoreResult<Vec<Document>> {
    let mut current = docs;
    for stage in pipeline {
        current = match stage {
            Stage::Lookup(lookup) => execute_lookup(current, lookup, source),
            Stage::Unwind(unwind) => execute_unwind(current, unwind),
            Stage::Match(predicates) => execute_match(current, predicates)?,
            Stage::Sort(keys) => execute_sort(current, keys),
            Stage::Skip(n) => current.into_iter().skip(*n as usize).collect(),
            Stage::Limit(n) => current.into_iter().take(*n as usize).collect(),
            Stage::Count(field) => match current.len() {
                0 => Vec::new(),
                n => {
                    let mut doc = Document::new();
                    doc.insert(field.clone(), Value::Int(n as i64));
                    vec![doc]
                }
            },
        };
    }
    Ok(current)
}

// ==================== Paths ====================

/// All values reachable at `path`. An array at the end of the path yields the
/// array itself followed by its elements.
pub fn resolve_path<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut out = Vec::new();
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = doc.get(*head) {
            collect(value, rest, &mut out);
        }
    }
    out
}

fn collect<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    match segments.split_first() {
        None => {
            out.push(value);
            if let Value::List(items) = value {
                out.extend(items.iter());
            }
        }
        Some((head, rest)) => match value {
            Value::Object(doc) => {
                if let Some(child) = doc.get(*head) {
                    collect(child, rest, out);
                }
            }
            Value::List(items) => {
                for item in items {
                    collect(item, segments, out);
                }
            }
            _ => {}
        },
    }
}

/// Write `value` at a dotted path, creating intermediate objects.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !matches!(slot, Value::Object(_)) {
                *slot = Value::Object(Document::new());
            }
            if let Some(child) = slot.as_object_mut() {
                set_path(child, rest, value);
            }
        }
    }
}

/// Remove the value at a dotted path, if present.
pub fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.remove(path);
        }
        Some((head, rest)) => {
            if let Some(child) = doc.get_mut(head).and_then(Value::as_object_mut) {
                remove_path(child, rest);
            }
        }
    }
}

// ==================== Stages ====================

fn execute_lookup(
    docs: Vec<Document>,
    lookup: &Lookup,
    source: &dyn Fn(&str) -> Vec<Document>,
) -> Vec<Document> {
    let foreign = source(&lookup.from);
    docs.into_iter()
        .map(|mut doc| {
            let joined: Vec<Value> = {
                let locals = resolve_path(&doc, &lookup.local_field);
                foreign
                    .iter()
                    .filter(|candidate| {
                        resolve_path(candidate, &lookup.foreign_field)
                            .iter()
                            .any(|remote| {
                                !remote.is_null() && locals.iter().any(|local| local.loose_eq(remote))
                            })
                    })
                    .cloned()
                    .map(Value::Object)
                    .collect()
            };
            set_path(&mut doc, &lookup.alias, Value::List(joined));
            doc
        })
        .collect()
}

fn execute_unwind(docs: Vec<Document>, unwind: &Unwind) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        let items = match resolve_path(&doc, &unwind.path).first() {
            Some(Value::List(items)) => Some(items.clone()),
            Some(Value::Null) | None => Some(Vec::new()),
            Some(_) => None,
        };
        match items {
            None => out.push(doc),
            Some(items) if items.is_empty() => {
                if unwind.preserve_null_and_empty {
                    let mut doc = doc;
                    remove_path(&mut doc, &unwind.path);
                    out.push(doc);
                }
            }
            Some(items) => {
                for item in items {
                    let mut copy = doc.clone();
                    set_path(&mut copy, &unwind.path, item);
                    out.push(copy);
                }
            }
        }
    }
    out
}

enum Compiled<'p> {
    Plain(&'p Predicate),
    Regex(&'p str, Regex),
}

fn execute_match(docs: Vec<Document>, predicates: &[Predicate]) -> StoreResult<Vec<Document>> {
    let compiled = predicates
        .iter()
        .map(|predicate| match &predicate.condition {
            Condition::Regex(pattern) => Regex::new(pattern)
                .map(|re| Compiled::Regex(&predicate.path, re))
                .map_err(|e| StoreError::invalid_pipeline(format!("bad pattern {:?}: {}", pattern, e))),
            _ => Ok(Compiled::Plain(predicate)),
        })
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(docs
        .into_iter()
        .filter(|doc| {
            compiled.iter().all(|c| match c {
                Compiled::Plain(predicate) => {
                    matches(&resolve_path(doc, &predicate.path), &predicate.condition)
                }
                Compiled::Regex(path, re) => resolve_path(doc, path)
                    .iter()
                    .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false)),
            })
        })
        .collect())
}

/// Whether the resolved values satisfy a (non-regex) condition.
pub fn matches(values: &[&Value], condition: &Condition) -> bool {
    let equals = |target: &Value| {
        if values.is_empty() {
            target.is_null()
        } else {
            values.iter().any(|v| v.loose_eq(target))
        }
    };
    let compare = |target: &Value, accept: fn(Ordering) -> bool| {
        values
            .iter()
            .any(|v| v.partial_compare(target).map(accept).unwrap_or(false))
    };

    match condition {
        Condition::Eq(target) => equals(target),
        Condition::Ne(target) => !equals(target),
        Condition::Lt(target) => compare(target, |o| o == Ordering::Less),
        Condition::Lte(target) => compare(target, |o| o != Ordering::Greater),
        Condition::Gt(target) => compare(target, |o| o == Ordering::Greater),
        Condition::Gte(target) => compare(target, |o| o != Ordering::Less),
        Condition::Between { low, high } => values.iter().any(|v| {
            matches!(v.partial_compare(low), Some(Ordering::Greater | Ordering::Equal))
                && matches!(v.partial_compare(high), Some(Ordering::Less | Ordering::Equal))
        }),
        Condition::In(targets) => targets.iter().any(|t| equals(t)),
        Condition::Nin(targets) => !targets.iter().any(|t| equals(t)),
        Condition::Regex(pattern) => Regex::new(pattern)
            .map(|re| {
                values
                    .iter()
                    .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false))
            })
            .unwrap_or(false),
    }
}

fn execute_sort(mut docs: Vec<Document>, keys: &[SortKey]) -> Vec<Document> {
    docs.sort_by(|a, b| {
        for key in keys {
            let left = resolve_path(a, &key.path).first().copied().cloned().unwrap_or_default();
            let right = resolve_path(b, &key.path).first().copied().cloned().unwrap_or_default();
            let ordering = match key.direction {
                SortDirection::Ascending => left.cmp_sortable(&right),
                SortDirection::Descending => right.cmp_sortable(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    docs
}
