//! In-memory document store.
//!
//! Committed documents live in per-collection maps guarded by one lock. A
//! session transaction buffers its writes in an overlay keyed by
//! `(collection, id)` and remembers the version of every document it touched;
//! commit fails with a transient error when any of those versions moved.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use morph_core::{Document, ObjectId, Value};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::contract::{CollectionSpec, DocumentStore, SessionHandle, StoreSession, UpdateSpec};
use crate::eval::{remove_path, run_pipeline, set_path};
use crate::pipeline::Stage;
use crate::{StoreError, StoreResult};

type Key = (String, ObjectId);

#[derive(Debug, Default)]
struct Collection {
    spec: CollectionSpec,
    docs: BTreeMap<ObjectId, Document>,
    /// Last commit version per id. Entries survive deletion.
    versions: HashMap<ObjectId, u64>,
}

#[derive(Debug, Default)]
struct Shared {
    collections: RwLock<HashMap<String, Collection>>,
    injected_failures: AtomicU32,
    clock: AtomicU64,
}

impl Shared {
    fn committed(&self, collection: &str, id: &ObjectId) -> Option<Document> {
        self.collections
            .read()
            .get(collection)
            .and_then(|c| c.docs.get(id).cloned())
    }

    fn version(&self, key: &Key) -> u64 {
        self.collections
            .read()
            .get(&key.0)
            .and_then(|c| c.versions.get(&key.1).copied())
            .unwrap_or(0)
    }

    fn take_injected_failure(&self) -> bool {
        self.injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Validate and apply a write set atomically.
    fn commit(&self, writes: BTreeMap<Key, Option<Document>>, reads: &HashMap<Key, u64>) -> StoreResult<()> {
        let mut collections = self.collections.write();

        for (key, base) in reads {
            let current = collections
                .get(&key.0)
                .and_then(|c| c.versions.get(&key.1).copied())
                .unwrap_or(0);
            if current != *base {
                return Err(StoreError::transient(format!(
                    "write conflict on {}/{}",
                    key.0, key.1
                )));
            }
        }

        check_unique(&collections, &writes)?;

        for ((collection, id), doc) in writes {
            let version = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
            let entry = collections.entry(collection.clone()).or_insert_with(|| Collection {
                spec: CollectionSpec::new(collection.clone()),
                ..Default::default()
            });
            match doc {
                Some(doc) => {
                    entry.docs.insert(id, doc);
                }
                None => {
                    entry.docs.remove(&id);
                }
            }
            entry.versions.insert(id, version);
        }
        Ok(())
    }
}

fn check_unique(
    collections: &HashMap<String, Collection>,
    writes: &BTreeMap<Key, Option<Document>>,
) -> StoreResult<()> {
    for ((collection, id), doc) in writes {
        let (Some(doc), Some(existing)) = (doc, collections.get(collection)) else {
            continue;
        };
        for field in &existing.spec.unique {
            let value = match doc.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let clashes_committed = existing.docs.iter().any(|(other_id, other)| {
                other_id != id
                    && !writes.contains_key(&(collection.clone(), *other_id))
                    && other.get(field).map(|v| v.loose_eq(value)).unwrap_or(false)
            });
            let clashes_staged = writes.iter().any(|((c, other_id), other)| {
                c == collection
                    && other_id != id
                    && other
                        .as_ref()
                        .and_then(|o| o.get(field))
                        .map(|v| v.loose_eq(value))
                        .unwrap_or(false)
            });
            if clashes_committed || clashes_staged {
                return Err(StoreError::duplicate_key(
                    collection.clone(),
                    field.clone(),
                    value.to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// A process-local document store.
///
/// Cloning yields another handle onto the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` transaction commits fail with a transient error.
    pub fn inject_transient_failures(&self, n: u32) {
        self.shared.injected_failures.store(n, Ordering::SeqCst);
    }

    /// Number of committed documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.shared
            .collections
            .read()
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or(0)
    }

    /// Unique-indexed fields of a collection.
    pub fn unique_fields(&self, collection: &str) -> Vec<String> {
        self.shared
            .collections
            .read()
            .get(collection)
            .map(|c| c.spec.unique.clone())
            .unwrap_or_default()
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.shared
            .collections
            .read()
            .get(collection)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()> {
        let mut collections = self.shared.collections.write();
        let entry = collections.entry(spec.name.clone()).or_default();
        entry.spec.name = spec.name.clone();
        for field in &spec.unique {
            if !entry.spec.unique.contains(field) {
                entry.spec.unique.push(field.clone());
            }
        }
        debug!(collection = %spec.name, unique = ?entry.spec.unique, "collection ensured");
        Ok(())
    }

    async fn start_session(&self) -> StoreResult<SessionHandle> {
        Ok(Arc::new(MemorySession {
            shared: Arc::clone(&self.shared),
            state: Mutex::new(SessionState::default()),
        }))
    }

    async fn find_by_id(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>> {
        Ok(self.shared.committed(collection, &id))
    }

    async fn find_all(&self, collection: &str) -> StoreResult<Vec<Document>> {
        Ok(self.snapshot(collection))
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> StoreResult<Vec<Document>> {
        run_pipeline(self.snapshot(collection), pipeline, &|name: &str| self.snapshot(name))
    }
}

#[derive(Debug, Default)]
struct SessionState {
    active: bool,
    writes: BTreeMap<Key, Option<Document>>,
    /// Version observed on first touch of each key.
    reads: HashMap<Key, u64>,
}

/// A session on a [`MemoryStore`].
pub struct MemorySession {
    shared: Arc<Shared>,
    state: Mutex<SessionState>,
}

impl MemorySession {
    fn lookup(&self, collection: &str, id: ObjectId) -> Option<Document> {
        let key = (collection.to_string(), id);
        let mut state = self.state.lock();
        if state.active {
            if let Some(staged) = state.writes.get(&key) {
                return staged.clone();
            }
            if !state.reads.contains_key(&key) {
                let version = self.shared.version(&key);
                state.reads.insert(key, version);
            }
        }
        self.shared.committed(collection, &id)
    }

    fn write(&self, collection: &str, id: ObjectId, doc: Option<Document>) -> StoreResult<()> {
        let key = (collection.to_string(), id);
        let mut state = self.state.lock();
        if state.active {
            if !state.reads.contains_key(&key) {
                let version = self.shared.version(&key);
                state.reads.insert(key.clone(), version);
            }
            state.writes.insert(key, doc);
            return Ok(());
        }
        drop(state);
        let mut writes = BTreeMap::new();
        writes.insert(key, doc);
        self.shared.commit(writes, &HashMap::new())
    }

    /// Committed documents of `collection` with this session's overlay applied.
    fn view(&self, collection: &str) -> Vec<Document> {
        let mut docs: BTreeMap<ObjectId, Document> = self
            .shared
            .collections
            .read()
            .get(collection)
            .map(|c| c.docs.clone())
            .unwrap_or_default();
        let state = self.state.lock();
        if state.active {
            for ((c, id), doc) in &state.writes {
                if c != collection {
                    continue;
                }
                match doc {
                    Some(doc) => {
                        docs.insert(*id, doc.clone());
                    }
                    None => {
                        docs.remove(id);
                    }
                }
            }
        }
        docs.into_values().collect()
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn start_transaction(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.active {
            return Err(StoreError::TransactionAlreadyActive);
        }
        *state = SessionState {
            active: true,
            ..Default::default()
        };
        Ok(())
    }

    async fn commit_transaction(&self) -> StoreResult<()> {
        let (writes, reads) = {
            let mut state = self.state.lock();
            if !state.active {
                return Err(StoreError::NoActiveTransaction);
            }
            let taken = std::mem::take(&mut *state);
            (taken.writes, taken.reads)
        };

        if self.shared.take_injected_failure() {
            warn!("injected transient failure on commit");
            return Err(StoreError::transient("injected commit failure"));
        }

        let count = writes.len();
        self.shared.commit(writes, &reads)?;
        debug!(writes = count, "transaction committed");
        Ok(())
    }

    async fn abort_transaction(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.active {
            debug!(writes = state.writes.len(), "transaction aborted");
        }
        *state = SessionState::default();
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.state.lock().active
    }

    async fn create(&self, collection: &str, mut doc: Document) -> StoreResult<Document> {
        let id = match doc.get("_id") {
            None | Some(Value::Null) => {
                let id = ObjectId::new();
                doc.insert("_id".to_string(), Value::Id(id));
                id
            }
            Some(value) => match value.to_id() {
                Some(id) => {
                    doc.insert("_id".to_string(), Value::Id(id));
                    id
                }
                None => {
                    return Err(StoreError::MissingId {
                        collection: collection.to_string(),
                    })
                }
            },
        };
        self.write(collection, id, Some(doc.clone()))?;
        Ok(doc)
    }

    async fn find_by_id(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>> {
        Ok(self.lookup(collection, id))
    }

    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: ObjectId,
        update: UpdateSpec,
    ) -> StoreResult<Option<Document>> {
        let Some(mut doc) = self.lookup(collection, id) else {
            return Ok(None);
        };
        for (path, value) in update.set {
            set_path(&mut doc, &path, value);
        }
        for path in &update.unset {
            remove_path(&mut doc, path);
        }
        self.write(collection, id, Some(doc.clone()))?;
        Ok(Some(doc))
    }

    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: ObjectId,
    ) -> StoreResult<Option<Document>> {
        let existing = self.lookup(collection, id);
        if existing.is_some() {
            self.write(collection, id, None)?;
        }
        Ok(existing)
    }

    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> StoreResult<Vec<Document>> {
        run_pipeline(self.view(collection), pipeline, &|name: &str| self.view(name))
    }
}
