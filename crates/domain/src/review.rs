//! Reviews and the service that keeps tour ratings in step with them.

use doc_store::{Document, DocumentStore, Predicate, Record, RecordId, StoreError};
use query_pipeline::{QueryPipeline, QueryRequest, QuerySpec};
use ratings::{RatingsConfig, RatingsEngine, RatingsError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::factory::not_found;
use crate::resource::check_length;
use crate::{DomainError, Resource, ResourceService, Result};

/// A user's review of a tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub review: String,
    pub rating: f64,
    pub tour: RecordId,
    pub user: String,
}

impl Resource for Review {
    const COLLECTION: &'static str = "reviews";
    const NAME: &'static str = "review";

    fn prepare(&mut self) {
        self.review = self.review.trim().to_string();
        self.user = self.user.trim().to_string();
    }

    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        check_length(&mut errors, "Review", &self.review, 10, 500);
        if !(1.0..=5.0).contains(&self.rating) {
            errors.push("Rating must be between 1 and 5".to_string());
        }
        if self.user.is_empty() {
            errors.push("Review must belong to a user".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Review handlers.
///
/// Writes go through the ratings engine: creation recomputes the tour after
/// the insert, updates and deletes capture the tour first and recompute it
/// once the mutation has committed.
pub struct ReviewService<S: DocumentStore + Clone> {
    resources: ResourceService<S, Review>,
    engine: RatingsEngine<S>,
}

impl<S: DocumentStore + Clone> ReviewService<S> {
    /// Creates a review service.
    pub fn new(store: S, pipeline: QueryPipeline, ratings: RatingsConfig) -> Self {
        Self {
            resources: ResourceService::new(store.clone(), pipeline),
            engine: RatingsEngine::new(store, ratings),
        }
    }

    /// Returns the ratings engine.
    pub fn engine(&self) -> &RatingsEngine<S> {
        &self.engine
    }

    /// Declares the one-review-per-user-per-tour index.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.engine.ensure_indexes().await?;
        Ok(())
    }

    /// Lists reviews, optionally only those of one tour.
    pub async fn get_all(
        &self,
        tour: Option<RecordId>,
        request: &QueryRequest,
    ) -> Result<(Vec<Record>, QuerySpec)> {
        let base = match tour {
            Some(tour) => Predicate::equals("tour", tour.to_string()),
            None => Predicate::all(),
        };
        self.resources.get_all(base, request).await
    }

    pub async fn get(&self, id: RecordId) -> Result<Record> {
        self.resources.get_one(id).await
    }

    /// Creates a review and recomputes its tour's rating.
    #[tracing::instrument(skip(self, input))]
    pub async fn create(&self, input: Value) -> Result<Record> {
        let document = self.resources.validate_new(input)?;
        let record = self.engine.create_dependent(document).await?;
        Ok(record)
    }

    /// Updates a review and recomputes the tour it belonged to, plus the tour
    /// it moved to if the patch changed it.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update(&self, id: RecordId, patch: Value) -> Result<Record> {
        let existing = self.resources.get_one(id).await?;
        let document = self.resources.validate_update(&existing, patch)?;

        let target = self.resources.select(id);
        let snapshot = self.engine.on_dependent_will_change(&target).await?;
        let key = self.unique_key(&document);
        let updated = self
            .resources
            .store()
            .update_one(Review::COLLECTION, &target, document)
            .await
            .map_err(|err| self.duplicate_or_store(err, key))?;
        self.engine.on_dependent_changed(snapshot).await;

        let updated = updated.ok_or_else(|| not_found::<Review>(id))?;
        self.engine
            .on_dependent_moved(snapshot.as_ref(), &updated)
            .await;
        Ok(updated)
    }

    /// Deletes a review and recomputes the tour it belonged to.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: RecordId) -> Result<Record> {
        let target = self.resources.select(id);
        let snapshot = self.engine.on_dependent_will_change(&target).await?;
        let removed = self
            .resources
            .store()
            .delete_one(Review::COLLECTION, &target)
            .await?;
        self.engine.on_dependent_changed(snapshot).await;

        removed.ok_or_else(|| not_found::<Review>(id))
    }

    /// The `(tour, user)` pair a review document will occupy.
    fn unique_key(&self, document: &Document) -> (String, String) {
        let config = self.engine.config();
        let text = |field: &str| {
            document
                .get(field)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        (text(&config.parent_field), text(&config.author_field))
    }

    fn duplicate_or_store(
        &self,
        err: StoreError,
        (parent, author): (String, String),
    ) -> DomainError {
        let config = self.engine.config();
        let unique = [config.parent_field.as_str(), config.author_field.as_str()];
        if err.is_duplicate_on(&unique) {
            RatingsError::DuplicateDependent { parent, author }.into()
        } else {
            err.into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn review_validation() {
        let tour = RecordId::new();
        let ok = json!({
            "review": "  Loved every minute of it  ",
            "rating": 5,
            "tour": tour.to_string(),
            "user": "user-1",
        });
        let document = Review::from_input(ok).unwrap();
        assert_eq!(document["review"], json!("Loved every minute of it"));
        assert_eq!(document["tour"], json!(tour.to_string()));

        let bad = json!({"review": "meh", "rating": 0, "tour": tour.to_string(), "user": ""});
        let message = Review::from_input(bad).unwrap_err().to_string();
        assert!(message.contains("at least 10 characters"));
        assert!(message.contains("between 1 and 5"));
        assert!(message.contains("belong to a user"));
    }

    #[test]
    fn tour_must_be_an_id() {
        let input = json!({
            "review": "Loved every minute of it",
            "rating": 4,
            "tour": "not-an-id",
            "user": "user-1",
        });
        assert!(matches!(
            Review::from_input(input),
            Err(DomainError::Validation(_))
        ));
    }
}
