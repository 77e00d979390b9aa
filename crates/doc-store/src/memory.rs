use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::aggregate::run_pipeline;
use crate::record::{Document, lookup};
use crate::store::{DocumentStore, RecordStream};
use crate::{FindOptions, Predicate, Record, RecordId, Result, Stage, StoreError};

#[derive(Default)]
struct StoreState {
    /// Records per collection, in insertion order.
    collections: HashMap<String, Vec<Record>>,
    /// Unique indexes per collection, each a list of field names.
    unique_indexes: HashMap<String, Vec<Vec<String>>>,
    /// Last creation time handed out; keeps `createdAt` strictly increasing.
    last_created_at: Option<DateTime<Utc>>,
}

impl StoreState {
    fn next_created_at(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_created_at {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_created_at = Some(ts);
        ts
    }

    /// Checks every unique index of `collection` against `candidate`.
    ///
    /// `skip` names the record being replaced by an update, which must not
    /// collide with itself.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        skip: Option<RecordId>,
    ) -> Result<()> {
        let Some(indexes) = self.unique_indexes.get(collection) else {
            return Ok(());
        };
        let records = self.collections.get(collection);

        for fields in indexes {
            let key: Vec<Value> = fields
                .iter()
                .map(|f| lookup(candidate, f).cloned().unwrap_or(Value::Null))
                .collect();

            let clash = records.into_iter().flatten().any(|r| {
                Some(r.id()) != skip
                    && fields
                        .iter()
                        .zip(&key)
                        .all(|(f, v)| r.get(f).unwrap_or(&Value::Null) == v)
            });

            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    fields: fields.clone(),
                    values: key,
                });
            }
        }
        Ok(())
    }
}

/// In-memory document store implementation.
///
/// Stores every collection as an insertion-ordered vector behind a single
/// async lock, providing the same interface a networked store would.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of records in a collection.
    pub async fn record_count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Clears all collections. Index declarations are kept.
    pub async fn clear(&self) {
        self.state.write().await.collections.clear();
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert(&self, collection: &str, document: Document) -> Result<Record> {
        let mut state = self.state.write().await;
        state.check_unique(collection, &document, None)?;

        let created_at = state.next_created_at();
        let record = Record::new(RecordId::new(), created_at, document);
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(record.clone());

        tracing::debug!(collection, id = %record.id(), "record inserted");
        Ok(record)
    }

    async fn find_many(&self, collection: &str, options: FindOptions) -> Result<Vec<Record>> {
        let state = self.state.read().await;
        let mut records: Vec<Record> = state
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|r| options.filter.matches(r.document()))
            .cloned()
            .collect();
        drop(state);

        if !options.sort.is_empty() {
            // Stable, so ties keep insertion order.
            records.sort_by(|a, b| options.compare(a.document(), b.document()));
        }

        let skip = options.skip.unwrap_or(0);
        let limit = options.limit.unwrap_or(usize::MAX);

        Ok(records
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|r| r.with_document(options.projection.apply(r.document())))
            .collect())
    }

    async fn find_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Record>> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|records| records.iter().find(|r| predicate.matches(r.document())))
            .cloned())
    }

    async fn count(&self, collection: &str, predicate: &Predicate) -> Result<usize> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map_or(0, |records| {
                records
                    .iter()
                    .filter(|r| predicate.matches(r.document()))
                    .count()
            }))
    }

    async fn aggregate(&self, collection: &str, stages: Vec<Stage>) -> Result<Vec<Document>> {
        let documents: Vec<Document> = {
            let state = self.state.read().await;
            state
                .collections
                .get(collection)
                .into_iter()
                .flatten()
                .map(|r| r.document().clone())
                .collect()
        };
        Ok(run_pipeline(documents, &stages))
    }

    async fn upsert(&self, collection: &str, id: RecordId, patch: Document) -> Result<Record> {
        let mut state = self.state.write().await;
        let not_found = || StoreError::NotFound {
            collection: collection.to_string(),
            id,
        };

        let position = state
            .collections
            .get(collection)
            .and_then(|records| records.iter().position(|r| r.id() == id))
            .ok_or_else(not_found)?;

        patch_at(&mut state, collection, position, &patch)
    }

    async fn update_one(
        &self,
        collection: &str,
        predicate: &Predicate,
        patch: Document,
    ) -> Result<Option<Record>> {
        let mut state = self.state.write().await;
        let Some(position) = state
            .collections
            .get(collection)
            .and_then(|records| records.iter().position(|r| predicate.matches(r.document())))
        else {
            return Ok(None);
        };

        patch_at(&mut state, collection, position, &patch).map(Some)
    }

    async fn delete_one(&self, collection: &str, predicate: &Predicate) -> Result<Option<Record>> {
        let mut state = self.state.write().await;
        let Some(records) = state.collections.get_mut(collection) else {
            return Ok(None);
        };
        let removed = records
            .iter()
            .position(|r| predicate.matches(r.document()))
            .map(|position| records.remove(position));

        if let Some(record) = &removed {
            tracing::debug!(collection, id = %record.id(), "record deleted");
        }
        Ok(removed)
    }

    async fn ensure_unique_index(&self, collection: &str, fields: &[&str]) -> Result<()> {
        let mut state = self.state.write().await;
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();

        if state
            .unique_indexes
            .get(collection)
            .is_some_and(|indexes| indexes.contains(&fields))
        {
            return Ok(());
        }

        // Existing data must already satisfy the new index.
        let mut seen: Vec<Vec<Value>> = Vec::new();
        for record in state.collections.get(collection).into_iter().flatten() {
            let key: Vec<Value> = fields
                .iter()
                .map(|f| record.get(f).cloned().unwrap_or(Value::Null))
                .collect();
            if seen.contains(&key) {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    fields,
                    values: key,
                });
            }
            seen.push(key);
        }

        state
            .unique_indexes
            .entry(collection.to_string())
            .or_default()
            .push(fields);
        Ok(())
    }

    async fn stream_all(&self, collection: &str) -> Result<RecordStream> {
        use futures_util::stream;

        let records = self
            .state
            .read()
            .await
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default();

        Ok(Box::pin(stream::iter(records.into_iter().map(Ok))))
    }
}

/// Applies a patch to the record at `position`, enforcing unique indexes.
fn patch_at(
    state: &mut StoreState,
    collection: &str,
    position: usize,
    patch: &Document,
) -> Result<Record> {
    let mut updated = state.collections[collection][position].clone();
    updated.apply_patch(patch);
    state.check_unique(collection, updated.document(), Some(updated.id()))?;

    if let Some(records) = state.collections.get_mut(collection) {
        records[position] = updated.clone();
    }
    Ok(updated)
}
