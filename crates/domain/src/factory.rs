//! Generic handlers shared by every resource.

use std::marker::PhantomData;

use doc_store::{Document, DocumentStore, DocumentStoreExt, Predicate, Record, RecordId, by_id};
use query_pipeline::{QueryPipeline, QueryRequest, QuerySpec};
use serde_json::Value;

use crate::resource::{Resource, VERSION_KEY, merge};
use crate::{DomainError, Result};

/// CRUD handlers for one resource type.
///
/// Every operation is restricted to the service's scope, so records outside
/// it (secret tours, for instance) behave as if they did not exist.
pub struct ResourceService<S: DocumentStore, R: Resource> {
    store: S,
    pipeline: QueryPipeline,
    scope: Predicate,
    owned: Document,
    _phantom: PhantomData<R>,
}

impl<S: DocumentStore, R: Resource> ResourceService<S, R> {
    /// Creates a service that sees the whole collection.
    pub fn new(store: S, pipeline: QueryPipeline) -> Self {
        Self {
            store,
            pipeline,
            scope: Predicate::all(),
            owned: Document::new(),
            _phantom: PhantomData,
        }
    }

    /// Restricts every operation to records matching `scope`.
    pub fn with_scope(mut self, scope: Predicate) -> Self {
        self.scope = scope;
        self
    }

    /// Reserves fields maintained elsewhere. Input can neither set nor change
    /// them; new records start with the values given here.
    pub fn with_owned_fields(mut self, initial: Document) -> Self {
        self.owned = initial;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the query pipeline used by [`Self::get_all`].
    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    /// Lists records matching `base` and the request's query features.
    #[tracing::instrument(skip(self, request), fields(resource = R::NAME))]
    pub async fn get_all(
        &self,
        base: Predicate,
        request: &QueryRequest,
    ) -> Result<(Vec<Record>, QuerySpec)> {
        let base = self.store.find(R::COLLECTION, self.scope.clone().and(base));
        let (query, spec) = self.pipeline.apply(base, request)?;
        let records = query.execute().await?;
        Ok((records, spec))
    }

    /// Loads one record.
    #[tracing::instrument(skip(self), fields(resource = R::NAME))]
    pub async fn get_one(&self, id: RecordId) -> Result<Record> {
        self.store
            .find_one(R::COLLECTION, &self.select(id))
            .await?
            .ok_or_else(|| not_found::<R>(id))
    }

    /// Validates and inserts a new record.
    #[tracing::instrument(skip(self, input), fields(resource = R::NAME))]
    pub async fn create_one(&self, input: Value) -> Result<Record> {
        let document = self.validate_new(input)?;
        let record = self.store.insert(R::COLLECTION, document).await?;
        metrics::counter!("resources_created_total", "resource" => R::NAME).increment(1);
        Ok(record)
    }

    /// Merges a patch into a record and stores it after re-validating the
    /// merged result.
    #[tracing::instrument(skip(self, patch), fields(resource = R::NAME))]
    pub async fn update_one(&self, id: RecordId, patch: Value) -> Result<Record> {
        let existing = self.get_one(id).await?;
        let document = self.validate_update(&existing, patch)?;
        self.store
            .update_one(R::COLLECTION, &self.select(id), document)
            .await?
            .ok_or_else(|| not_found::<R>(id))
    }

    /// Deletes a record, returning what was removed.
    #[tracing::instrument(skip(self), fields(resource = R::NAME))]
    pub async fn delete_one(&self, id: RecordId) -> Result<Record> {
        let removed = self
            .store
            .delete_one(R::COLLECTION, &self.select(id))
            .await?
            .ok_or_else(|| not_found::<R>(id))?;
        metrics::counter!("resources_deleted_total", "resource" => R::NAME).increment(1);
        Ok(removed)
    }

    /// The predicate selecting one record within the scope.
    pub fn select(&self, id: RecordId) -> Predicate {
        by_id(id).and(self.scope.clone())
    }

    /// Turns create input into the document to insert.
    pub fn validate_new(&self, input: Value) -> Result<Document> {
        let mut document = R::from_input(self.without_owned(input))?;
        document.retain(|key, _| !self.owned.contains_key(key));
        document.extend(self.owned.clone());
        document.insert(VERSION_KEY.to_string(), Value::from(0));
        Ok(document)
    }

    /// Turns an update patch into the fields to write over `existing`.
    ///
    /// The whole merged model is re-validated; owned fields are never part of
    /// the result.
    pub fn validate_update(&self, existing: &Record, patch: Value) -> Result<Document> {
        let merged = merge(existing.document(), self.without_owned(patch))?;
        let mut document = R::from_input(merged)?;
        document.retain(|key, _| !self.owned.contains_key(key));
        Ok(document)
    }

    fn without_owned(&self, mut input: Value) -> Value {
        if let Value::Object(fields) = &mut input {
            fields.retain(|key, _| !self.owned.contains_key(key));
        }
        input
    }
}

pub(crate) fn not_found<R: Resource>(id: RecordId) -> DomainError {
    DomainError::NotFound {
        resource: R::NAME,
        id,
    }
}
