//! Aggregate recomputation and the dependent-record hooks.

use doc_store::{
    Accumulator, Document, DocumentStore, Predicate, Record, RecordId, Stage, StoreError,
};
use futures_util::StreamExt;
use serde_json::Value;

use crate::{
    AggregateRecord, CapturedSnapshot, RatingsConfig, RatingsError, Result, round_to_tenth,
};

const COUNT: &str = "count";
const MEAN: &str = "mean";

/// Maintains the rating aggregate stored on each parent record.
///
/// Aggregates are always recomputed from the full set of dependents, never
/// adjusted incrementally, so a recomputation can be repeated at any time.
pub struct RatingsEngine<S: DocumentStore> {
    store: S,
    config: RatingsConfig,
}

impl<S: DocumentStore> RatingsEngine<S> {
    /// Creates an engine over the given store.
    pub fn new(store: S, config: RatingsConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &RatingsConfig {
        &self.config
    }

    /// Declares the one-record-per-author-per-parent index on dependents.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.store
            .ensure_unique_index(
                &self.config.dependent_collection,
                &[
                    self.config.parent_field.as_str(),
                    self.config.author_field.as_str(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Recomputes and stores the aggregate for one parent.
    ///
    /// Runs a match-and-group over the dependents and writes the result onto
    /// the parent. A parent with no dependents gets `{0, default_mean}`.
    #[tracing::instrument(skip(self))]
    pub async fn recompute_for_parent(&self, parent_id: RecordId) -> Result<AggregateRecord> {
        let stages = vec![
            Stage::Match(Predicate::equals(
                self.config.parent_field.as_str(),
                parent_id.to_string(),
            )),
            Stage::group(
                Some(self.config.parent_field.as_str()),
                vec![
                    (COUNT, Accumulator::Count),
                    (MEAN, Accumulator::Avg(self.config.rating_field.clone())),
                ],
            ),
        ];
        let groups = self
            .store
            .aggregate(&self.config.dependent_collection, stages)
            .await?;

        let aggregate = groups
            .first()
            .and_then(|group| stats(group, parent_id))
            .unwrap_or_else(|| AggregateRecord::empty(parent_id, self.config.default_mean));

        let patch = self.config.aggregate_fields(aggregate.count, aggregate.mean);
        self.store
            .upsert(&self.config.parent_collection, parent_id, patch)
            .await?;

        metrics::counter!("ratings_recomputations_total").increment(1);
        tracing::debug!(count = aggregate.count, mean = aggregate.mean, "aggregate stored");
        Ok(aggregate)
    }

    /// Inserts a dependent record and recomputes its parent.
    ///
    /// A second record by the same author for the same parent fails with
    /// [`RatingsError::DuplicateDependent`] and triggers no recomputation.
    #[tracing::instrument(skip(self, document))]
    pub async fn create_dependent(&self, document: Document) -> Result<Record> {
        let parent = field_text(&document, &self.config.parent_field);
        let author = field_text(&document, &self.config.author_field);

        let record = self
            .store
            .insert(&self.config.dependent_collection, document)
            .await
            .map_err(|err| self.classify_insert_error(err, parent, author))?;

        self.on_dependent_created(&record).await;
        Ok(record)
    }

    /// Hook for a committed insert: recomputes the record's parent.
    ///
    /// Failures are logged and counted, never returned; the insert stands.
    pub async fn on_dependent_created(&self, record: &Record) -> Option<AggregateRecord> {
        match record.get_id(&self.config.parent_field) {
            Some(parent_id) => self.recompute_logged(parent_id).await,
            None => {
                tracing::warn!(id = %record.id(), "dependent record has no parent, skipping");
                None
            }
        }
    }

    /// First half of the change protocol: reads the single record the
    /// mutation will target and remembers its parent.
    ///
    /// Returns `None` when nothing matches, in which case the mutation will
    /// not touch anything and no recomputation is needed.
    #[tracing::instrument(skip(self))]
    pub async fn on_dependent_will_change(
        &self,
        predicate: &Predicate,
    ) -> Result<Option<CapturedSnapshot>> {
        let record = self
            .store
            .find_one(&self.config.dependent_collection, predicate)
            .await?;

        Ok(record.and_then(|record| {
            record
                .get_id(&self.config.parent_field)
                .map(|parent_id| CapturedSnapshot {
                    record_id: record.id(),
                    parent_id,
                })
        }))
    }

    /// Second half of the change protocol: recomputes the captured parent.
    ///
    /// `None` (the mutation matched nothing) is a no-op. Failures are logged
    /// and counted, never returned.
    pub async fn on_dependent_changed(
        &self,
        snapshot: Option<CapturedSnapshot>,
    ) -> Option<AggregateRecord> {
        let snapshot = snapshot?;
        self.recompute_logged(snapshot.parent_id).await
    }

    /// Follow-up to the change protocol for updates that may move a record:
    /// recomputes the parent the record belongs to now when it differs from
    /// the captured one.
    ///
    /// Returns `None` when the parent did not change. Failures are logged and
    /// counted, never returned.
    pub async fn on_dependent_moved(
        &self,
        snapshot: Option<&CapturedSnapshot>,
        record: &Record,
    ) -> Option<AggregateRecord> {
        let parent_id = record.get_id(&self.config.parent_field)?;
        if snapshot.is_some_and(|s| s.parent_id == parent_id) {
            return None;
        }
        self.recompute_logged(parent_id).await
    }

    /// Recomputes every parent in the parent collection.
    ///
    /// Heals aggregates left stale by a failed or interleaved recomputation.
    /// Returns the number of parents processed.
    #[tracing::instrument(skip(self))]
    pub async fn repair_all(&self) -> Result<usize> {
        let mut parents = self
            .store
            .stream_all(&self.config.parent_collection)
            .await?;
        let mut repaired = 0;

        while let Some(parent) = parents.next().await {
            self.recompute_for_parent(parent?.id()).await?;
            repaired += 1;
        }

        tracing::info!(repaired, "aggregate repair complete");
        Ok(repaired)
    }

    async fn recompute_logged(&self, parent_id: RecordId) -> Option<AggregateRecord> {
        match self.recompute_for_parent(parent_id).await {
            Ok(aggregate) => Some(aggregate),
            Err(err) => {
                let err = RatingsError::RecomputeFailed {
                    parent_id,
                    reason: err.to_string(),
                };
                metrics::counter!("ratings_recompute_failures_total").increment(1);
                tracing::warn!(error = %err, "aggregate left stale");
                None
            }
        }
    }

    fn classify_insert_error(
        &self,
        err: StoreError,
        parent: String,
        author: String,
    ) -> RatingsError {
        let unique = [
            self.config.parent_field.as_str(),
            self.config.author_field.as_str(),
        ];
        if err.is_duplicate_on(&unique) {
            RatingsError::DuplicateDependent { parent, author }
        } else {
            RatingsError::Store(err)
        }
    }
}

/// Reads `{count, mean}` from a group document.
fn stats(group: &Document, parent_id: RecordId) -> Option<AggregateRecord> {
    let count = group.get(COUNT).and_then(Value::as_u64).filter(|n| *n > 0)?;
    let mean = group.get(MEAN).and_then(Value::as_f64)?;
    Some(AggregateRecord {
        parent_id,
        count,
        mean: round_to_tenth(mean),
    })
}

fn field_text(document: &Document, field: &str) -> String {
    match document.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_store::{DocumentStoreExt, InMemoryDocumentStore, into_document};
    use serde_json::json;

    async fn setup() -> (RatingsEngine<InMemoryDocumentStore>, RecordId) {
        let store = InMemoryDocumentStore::new();
        let tour = store
            .insert("tours", into_document(json!({"name": "The Forest Hiker"})).unwrap())
            .await
            .unwrap();
        let engine = RatingsEngine::new(store, RatingsConfig::default());
        engine.ensure_indexes().await.unwrap();
        (engine, tour.id())
    }

    fn review(tour: RecordId, user: &str, rating: u8) -> Document {
        into_document(json!({
            "review": "A lovely trip through the woods",
            "rating": rating,
            "tour": tour.to_string(),
            "user": user,
        }))
        .unwrap()
    }

    async fn stored(engine: &RatingsEngine<InMemoryDocumentStore>, tour: RecordId) -> Value {
        let record = engine.store().get_existing("tours", tour).await.unwrap();
        json!([record.get("ratingsQuantity"), record.get("ratingsAverage")])
    }

    #[tokio::test]
    async fn empty_parent_gets_default() {
        let (engine, tour) = setup().await;
        let aggregate = engine.recompute_for_parent(tour).await.unwrap();
        assert_eq!(aggregate, AggregateRecord::empty(tour, 4.5));
        assert_eq!(stored(&engine, tour).await, json!([0, 4.5]));
    }

    #[tokio::test]
    async fn create_recomputes() {
        let (engine, tour) = setup().await;
        engine.create_dependent(review(tour, "u1", 4)).await.unwrap();
        engine.create_dependent(review(tour, "u2", 5)).await.unwrap();
        assert_eq!(stored(&engine, tour).await, json!([2, 4.5]));
    }

    #[tokio::test]
    async fn mean_is_rounded() {
        let (engine, tour) = setup().await;
        for (user, rating) in [("a", 5), ("b", 5), ("c", 4)] {
            engine.create_dependent(review(tour, user, rating)).await.unwrap();
        }
        assert_eq!(stored(&engine, tour).await, json!([3, 4.7]));
    }

    #[tokio::test]
    async fn duplicate_author_is_rejected_without_recompute() {
        let (engine, tour) = setup().await;
        engine.create_dependent(review(tour, "u1", 2)).await.unwrap();

        let err = engine
            .create_dependent(review(tour, "u1", 5))
            .await
            .unwrap_err();
        assert!(matches!(err, RatingsError::DuplicateDependent { ref author, .. } if author == "u1"));
        assert_eq!(stored(&engine, tour).await, json!([1, 2.0]));
    }

    #[tokio::test]
    async fn missing_parent_is_logged_not_returned() {
        let (engine, _) = setup().await;
        let orphan = RecordId::new();
        let record = engine.create_dependent(review(orphan, "u1", 3)).await.unwrap();
        assert_eq!(record.get_id("tour"), Some(orphan));
        assert!(engine.on_dependent_created(&record).await.is_none());
    }

    #[tokio::test]
    async fn unmatched_capture_is_none() {
        let (engine, _) = setup().await;
        let snapshot = engine
            .on_dependent_will_change(&Predicate::equals("user", "nobody"))
            .await
            .unwrap();
        assert!(snapshot.is_none());
        assert!(engine.on_dependent_changed(snapshot).await.is_none());
    }
}
