use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::record::{Document, ID_FIELD};
use crate::{FindOptions, Predicate, Query, Record, RecordId, Result, Stage, StoreError};

/// A stream of records.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record>> + Send>>;

/// Core trait for document store clients.
///
/// Every single-document write is atomic with respect to other operations on
/// the same store; nothing spans more than one call. Retries and timeouts are
/// the implementation's concern. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document, assigning its `_id` and `createdAt`.
    ///
    /// Fails with `DuplicateKey` if a unique index on the collection would be
    /// violated; nothing is written in that case.
    async fn insert(&self, collection: &str, document: Document) -> Result<Record>;

    /// Runs a find. Records are filtered, sorted, paginated and then projected.
    async fn find_many(&self, collection: &str, options: FindOptions) -> Result<Vec<Record>>;

    /// Returns the first record (insertion order) matching the predicate.
    async fn find_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Record>>;

    /// Counts records matching the predicate.
    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<usize>;

    /// Runs an aggregation pipeline over the collection.
    async fn aggregate(&self, collection: &str, stages: Vec<Stage>) -> Result<Vec<Document>>;

    /// Merges `patch` into the record with the given ID.
    ///
    /// Fails with `NotFound` if the record does not exist.
    async fn upsert(&self, collection: &str, id: RecordId, patch: Document) -> Result<Record>;

    /// Merges `patch` into the first record matching the predicate and returns
    /// the updated record, or `None` if nothing matched.
    async fn update_one(
        &self,
        collection: &str,
        predicate: &Predicate,
        patch: Document,
    ) -> Result<Option<Record>>;

    /// Removes the first record matching the predicate and returns it, or
    /// `None` if nothing matched.
    async fn delete_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Record>>;

    /// Declares a unique index over `fields`. Idempotent.
    ///
    /// Fails with `DuplicateKey` if existing records already violate it.
    async fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> Result<()>;

    /// Streams every record of a collection in insertion order.
    async fn stream_all(&self, collection: &str) -> Result<RecordStream>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Starts a composable query over a collection.
    fn find(&self, collection: &str, predicate: Predicate) -> Query<'_, Self> {
        Query::new(self, collection, predicate)
    }

    /// Loads a record by ID.
    async fn get(&self, collection: &str, id: RecordId) -> Result<Option<Record>> {
        self.find_one(collection, &by_id(id)).await
    }

    /// Loads a record by ID, failing with `NotFound` if it is absent.
    async fn get_existing(&self, collection: &str, id: RecordId) -> Result<Record> {
        self.get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id,
            })
    }

    /// Checks whether a record with the given ID exists.
    async fn exists(&self, collection: &str, id: RecordId) -> Result<bool> {
        Ok(self.get(collection, id).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// The predicate selecting a single record by ID.
pub fn by_id(id: RecordId) -> Predicate {
    Predicate::equals(ID_FIELD, id.to_string())
}
