//! The persistence contract consumed by the engine.

use std::sync::Arc;

use async_trait::async_trait;
use morph_core::{Document, ObjectId};

use crate::pipeline::Stage;
use crate::StoreResult;

/// A shared handle to an open session.
pub type SessionHandle = Arc<dyn StoreSession>;

/// Collection-level settings the engine asks the backend to enforce.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    /// Fields carrying a unique index.
    pub unique: Vec<String>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            unique: Vec::new(),
        }
    }

    pub fn unique(mut self, field: impl Into<String>) -> Self {
        self.unique.push(field.into());
        self
    }
}

/// A partial update: paths to overwrite and paths to remove.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSpec {
    pub set: Document,
    pub unset: Vec<String>,
}

impl UpdateSpec {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// Document store with sessions, transactions and pipeline reads.
///
/// Implementations must be `Send + Sync`: one store is shared by every request.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the collection if missing and install its unique indexes. Idempotent.
    async fn ensure_collection(&self, spec: &CollectionSpec) -> StoreResult<()>;

    /// Open a new session. Transactions are started on the session.
    async fn start_session(&self) -> StoreResult<SessionHandle>;

    /// Read a committed document by identifier.
    async fn find_by_id(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>>;

    /// Every committed document of a collection, in identifier order.
    async fn find_all(&self, collection: &str) -> StoreResult<Vec<Document>>;

    /// Evaluate a pipeline against committed data.
    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> StoreResult<Vec<Document>>;
}

/// One session. Reads inside an active transaction observe its own writes.
///
/// Outside a transaction every write commits immediately.
#[async_trait]
pub trait StoreSession: Send + Sync {
    async fn start_transaction(&self) -> StoreResult<()>;

    /// Commit the active transaction. Conflicts surface as
    /// [`StoreError::TransientTransaction`](crate::StoreError::TransientTransaction).
    async fn commit_transaction(&self) -> StoreResult<()>;

    /// Discard the active transaction. A no-op when none is active.
    async fn abort_transaction(&self) -> StoreResult<()>;

    fn in_transaction(&self) -> bool;

    /// Insert a document, assigning `_id` when absent. Returns the stored document.
    async fn create(&self, collection: &str, doc: Document) -> StoreResult<Document>;

    async fn find_by_id(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>>;

    /// Apply `update` and return the document after the update, or `None` if absent.
    async fn find_by_id_and_update(
        &self,
        collection: &str,
        id: ObjectId,
        update: UpdateSpec,
    ) -> StoreResult<Option<Document>>;

    /// Remove a document and return it, or `None` if absent.
    async fn find_by_id_and_delete(
        &self,
        collection: &str,
        id: ObjectId,
    ) -> StoreResult<Option<Document>>;

    /// Evaluate a pipeline against this session's view of the data.
    async fn aggregate(&self, collection: &str, pipeline: &[Stage]) -> StoreResult<Vec<Document>>;
}
