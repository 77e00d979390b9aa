//! Tours: the model, its validation, and the tour service.

use chrono::{DateTime, Utc};
use doc_store::{
    Accumulator, CmpOp, Document, DocumentStore, Predicate, Record, RecordId, SortKey, Stage,
};
use query_pipeline::{QueryPipeline, QueryRequest, QuerySpec};
use ratings::{DEFAULT_MEAN, RatingsConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::check_length;
use crate::{Resource, ResourceService, Result};

/// Parameters forced by the "top 5 cheap" listing.
pub const TOP_CHEAP_ALIAS: [(&str, &str); 3] = [
    ("limit", "5"),
    ("sort", "price,-ratingsAverage"),
    ("fields", "name,price,ratingsAverage,summary,difficulty"),
];

/// Tours rated at least this well are included in the statistics.
const STATS_MIN_RATING: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

/// A bookable tour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    pub duration: u32,
    pub max_group_size: u32,
    pub difficulty: Difficulty,
    #[serde(default = "default_ratings_average")]
    pub ratings_average: f64,
    #[serde(default)]
    pub ratings_quantity: u64,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub image_cover: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,
    #[serde(default)]
    pub secret_tour: bool,
}

fn default_ratings_average() -> f64 {
    DEFAULT_MEAN
}

impl Resource for Tour {
    const COLLECTION: &'static str = "tours";
    const NAME: &'static str = "tour";

    fn prepare(&mut self) {
        self.name = self.name.trim().to_string();
        self.summary = self.summary.trim().to_string();
        if let Some(description) = &mut self.description {
            *description = description.trim().to_string();
        }
        self.slug = slugify(&self.name);
    }

    fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        check_length(&mut errors, "A tour name", &self.name, 10, 40);
        if self.duration == 0 {
            errors.push("A tour must have a duration".to_string());
        }
        if self.max_group_size == 0 {
            errors.push("A tour must have a group size".to_string());
        }
        if !(1.0..=5.0).contains(&self.ratings_average) {
            errors.push("Rating must be between 1.0 and 5.0".to_string());
        }
        if self.price.is_nan() || self.price <= 0.0 {
            errors.push("A tour must have a price".to_string());
        }
        if let Some(discount) = self.price_discount {
            if discount >= self.price {
                errors.push(format!(
                    "Discount price ({discount}) should be below regular price"
                ));
            }
        }
        if self.summary.is_empty() {
            errors.push("A tour must have a summary".to_string());
        }
        if self.image_cover.trim().is_empty() {
            errors.push("A tour must have a cover image".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Lowercases a name and joins its alphanumeric words with `-`.
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Tour handlers. Secret tours are invisible to every operation.
pub struct TourService<S: DocumentStore> {
    resources: ResourceService<S, Tour>,
}

impl<S: DocumentStore> TourService<S> {
    /// Creates a tour service. The rating fields named in `ratings` belong to
    /// the ratings engine: new tours start unrated and input never sets them.
    pub fn new(store: S, pipeline: QueryPipeline, ratings: &RatingsConfig) -> Self {
        Self {
            resources: ResourceService::new(store, pipeline)
                .with_scope(Self::visible())
                .with_owned_fields(ratings.initial_aggregate()),
        }
    }

    /// Returns the underlying generic handlers.
    pub fn resources(&self) -> &ResourceService<S, Tour> {
        &self.resources
    }

    /// Declares the unique index on tour names.
    pub async fn ensure_indexes(&self) -> Result<()> {
        self.resources
            .store()
            .ensure_unique_index(Tour::COLLECTION, &["name"])
            .await?;
        Ok(())
    }

    /// The predicate hiding secret tours.
    pub fn visible() -> Predicate {
        Predicate::cmp("secretTour", CmpOp::Ne, true)
    }

    /// Lists tours.
    pub async fn get_all(&self, request: &QueryRequest) -> Result<(Vec<Record>, QuerySpec)> {
        self.resources.get_all(Predicate::all(), request).await
    }

    /// Lists the five cheapest tours, best rated first among equal prices.
    pub async fn top_cheap(&self, request: QueryRequest) -> Result<(Vec<Record>, QuerySpec)> {
        let request = request.with_overrides(TOP_CHEAP_ALIAS);
        self.get_all(&request).await
    }

    pub async fn get(&self, id: RecordId) -> Result<Record> {
        self.resources.get_one(id).await
    }

    pub async fn create(&self, input: Value) -> Result<Record> {
        self.resources.create_one(input).await
    }

    pub async fn update(&self, id: RecordId, patch: Value) -> Result<Record> {
        self.resources.update_one(id, patch).await
    }

    pub async fn delete(&self, id: RecordId) -> Result<Record> {
        self.resources.delete_one(id).await
    }

    /// Per-difficulty statistics over well-rated tours, cheapest group first.
    #[tracing::instrument(skip(self))]
    pub async fn tour_stats(&self) -> Result<Vec<Document>> {
        let stages = vec![
            Stage::Match(
                Self::visible().and(Predicate::cmp(
                    "ratingsAverage",
                    CmpOp::Gte,
                    STATS_MIN_RATING,
                )),
            ),
            Stage::group(
                Some("difficulty"),
                vec![
                    ("numTours", Accumulator::Count),
                    ("numRatings", Accumulator::Sum("ratingsQuantity".into())),
                    ("avgRating", Accumulator::Avg("ratingsAverage".into())),
                    ("avgPrice", Accumulator::Avg("price".into())),
                    ("minPrice", Accumulator::Min("price".into())),
                    ("maxPrice", Accumulator::Max("price".into())),
                ],
            ),
            Stage::Sort(vec![SortKey::asc("avgPrice")]),
        ];

        let mut groups = self
            .resources
            .store()
            .aggregate(Tour::COLLECTION, stages)
            .await?;
        for group in &mut groups {
            if let Some(Value::String(difficulty)) = group.get_mut("_id") {
                *difficulty = difficulty.to_uppercase();
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> Value {
        json!({
            "name": "  The Forest Hiker  ",
            "duration": 5,
            "maxGroupSize": 25,
            "difficulty": "easy",
            "price": 397,
            "summary": "Breathtaking hike through the Canadian Banff National Park",
            "imageCover": "tour-1-cover.jpg",
            "startDates": ["2021-04-25T09:00:00Z"]
        })
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("The Forest Hiker"), "the-forest-hiker");
        assert_eq!(slugify("  Sea & Sun: Explorer! "), "sea-sun-explorer");
    }

    #[test]
    fn valid_input_is_prepared() {
        let document = Tour::from_input(input()).unwrap();
        assert_eq!(document["name"], json!("The Forest Hiker"));
        assert_eq!(document["slug"], json!("the-forest-hiker"));
        assert_eq!(document["ratingsAverage"], json!(4.5));
        assert_eq!(document["ratingsQuantity"], json!(0));
        assert_eq!(document["secretTour"], json!(false));
        assert!(!document.contains_key("priceDiscount"));
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let mut value = input();
        value["$where"] = json!("1 == 1");
        let document = Tour::from_input(value).unwrap();
        assert!(!document.contains_key("$where"));
    }

    #[test]
    fn violations_are_collected() {
        let mut value = input();
        value["name"] = json!("Short");
        value["priceDiscount"] = json!(500);
        value["ratingsAverage"] = json!(6);

        let err = Tour::from_input(value).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("at least 10 characters"), "{message}");
        assert!(message.contains("Discount price (500) should be below regular price"));
        assert!(message.contains("between 1.0 and 5.0"));
    }

    #[test]
    fn unknown_difficulty_is_rejected() {
        let mut value = input();
        value["difficulty"] = json!("extreme");
        assert!(matches!(
            Tour::from_input(value),
            Err(crate::DomainError::Validation(_))
        ));
    }
}
