//! Integration tests for the tour and review services.
//!
//! These tests run the services against the in-memory store and check the
//! query features, secret-tour scoping and rating maintenance end to end.

use doc_store::{DocumentStoreExt, InMemoryDocumentStore, RecordId};
use domain::{DomainError, ReviewService, TourService};
use query_pipeline::{QueryPipeline, QueryRequest};
use ratings::{RatingsConfig, RatingsError};
use serde_json::{Value, json};

/// Helper to create both services over one store.
async fn create_services() -> (
    TourService<InMemoryDocumentStore>,
    ReviewService<InMemoryDocumentStore>,
) {
    let store = InMemoryDocumentStore::new();
    let tours = TourService::new(store.clone(), QueryPipeline::default(), &RatingsConfig::default());
    let reviews = ReviewService::new(store, QueryPipeline::default(), RatingsConfig::default());
    tours.ensure_indexes().await.unwrap();
    reviews.ensure_indexes().await.unwrap();
    (tours, reviews)
}

fn tour_input(name: &str, price: u32, difficulty: &str) -> Value {
    json!({
        "name": name,
        "duration": 7,
        "maxGroupSize": 15,
        "difficulty": difficulty,
        "price": price,
        "summary": "Exploring the jaw-dropping US east coast by foot and by boat",
        "imageCover": "tour-cover.jpg",
    })
}

fn review_input(tour: RecordId, user: &str, rating: u8) -> Value {
    json!({
        "review": "Everything was organised perfectly",
        "rating": rating,
        "tour": tour.to_string(),
        "user": user,
    })
}

fn names(records: &[doc_store::Record]) -> Vec<String> {
    records
        .iter()
        .filter_map(|r| r.get("name").and_then(Value::as_str).map(str::to_string))
        .collect()
}

mod tours {
    use super::*;

    #[tokio::test]
    async fn create_get_update_delete() {
        let (tours, _) = create_services().await;

        let created = tours
            .create(tour_input("The Sea Explorer", 497, "medium"))
            .await
            .unwrap();
        assert_eq!(created.get("slug"), Some(&json!("the-sea-explorer")));
        assert_eq!(created.get("__v"), Some(&json!(0)));

        let loaded = tours.get(created.id()).await.unwrap();
        assert_eq!(loaded, created);

        let updated = tours
            .update(created.id(), json!({"price": 597, "name": "The Sea Explorer Deluxe"}))
            .await
            .unwrap();
        assert_eq!(updated.get("price"), Some(&json!(597.0)));
        assert_eq!(updated.get("slug"), Some(&json!("the-sea-explorer-deluxe")));
        assert_eq!(updated.get("createdAt"), created.get("createdAt"));

        tours.delete(created.id()).await.unwrap();
        assert!(matches!(
            tours.get(created.id()).await,
            Err(DomainError::NotFound { resource: "tour", .. })
        ));
    }

    #[tokio::test]
    async fn update_revalidates_merged_document() {
        let (tours, _) = create_services().await;
        let created = tours
            .create(tour_input("The Park Camper", 1497, "medium"))
            .await
            .unwrap();

        let err = tours
            .update(created.id(), json!({"priceDiscount": 2000}))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let unchanged = tours.get(created.id()).await.unwrap();
        assert_eq!(unchanged.get("priceDiscount"), None);
    }

    #[tokio::test]
    async fn rating_fields_cannot_be_set_by_input() {
        let (tours, reviews) = create_services().await;

        let mut input = tour_input("The Wine Taster", 1997, "easy");
        input["ratingsQuantity"] = json!(999);
        input["ratingsAverage"] = json!(1.0);
        let tour = tours.create(input).await.unwrap();
        assert_eq!(tour.get("ratingsQuantity"), Some(&json!(0)));
        assert_eq!(tour.get("ratingsAverage"), Some(&json!(4.5)));

        reviews
            .create(review_input(tour.id(), "alice", 2))
            .await
            .unwrap();
        let updated = tours
            .update(
                tour.id(),
                json!({"ratingsQuantity": 50, "ratingsAverage": 5, "price": 1497}),
            )
            .await
            .unwrap();
        assert_eq!(updated.get("ratingsQuantity"), Some(&json!(1)));
        assert_eq!(updated.get("ratingsAverage"), Some(&json!(2.0)));
        assert_eq!(updated.get("price"), Some(&json!(1497.0)));
    }

    #[tokio::test]
    async fn new_tours_start_at_configured_mean() {
        let store = InMemoryDocumentStore::new();
        let ratings = RatingsConfig::default().with_default_mean(3.0);
        let tours = TourService::new(store, QueryPipeline::default(), &ratings);

        let tour = tours
            .create(tour_input("The Star Gazer", 2997, "medium"))
            .await
            .unwrap();
        assert_eq!(tour.get("ratingsAverage"), Some(&json!(3.0)));
        assert_eq!(tour.get("ratingsQuantity"), Some(&json!(0)));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let (tours, _) = create_services().await;
        tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap();
        let err = tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Store(ref e) if e.is_duplicate_on(&["name"])));
    }

    #[tokio::test]
    async fn secret_tours_are_invisible() {
        let (tours, _) = create_services().await;
        let mut secret = tour_input("The Secret Hideaway", 2997, "difficult");
        secret["secretTour"] = json!(true);
        let secret = tours.create(secret).await.unwrap();
        tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap();

        let (records, _) = tours.get_all(&QueryRequest::new()).await.unwrap();
        assert_eq!(names(&records), vec!["The Forest Hiker"]);
        assert!(tours.get(secret.id()).await.is_err());
        assert!(tours.delete(secret.id()).await.is_err());

        // Still stored, just hidden.
        assert!(tours.resources().store().exists("tours", secret.id()).await.unwrap());
    }

    #[tokio::test]
    async fn query_features_apply() {
        let (tours, _) = create_services().await;
        for (name, price, difficulty) in [
            ("The Forest Hiker", 397, "easy"),
            ("The Sea Explorer", 497, "medium"),
            ("The Snow Adventurer", 997, "difficult"),
            ("The City Wanderer", 1197, "easy"),
            ("The Park Camper", 1497, "medium"),
        ] {
            tours
                .create(tour_input(name, price, difficulty))
                .await
                .unwrap();
        }

        let request = QueryRequest::from_pairs([
            ("price[gte]", "400"),
            ("difficulty", "easy"),
            ("difficulty", "medium"),
            ("sort", "-price"),
            ("fields", "name,price"),
            ("limit", "2"),
        ])
        .unwrap();
        let (records, spec) = tours.get_all(&request).await.unwrap();

        assert_eq!(names(&records), vec!["The Park Camper", "The City Wanderer"]);
        assert_eq!(spec.limit, 2);
        assert!(records.iter().all(|r| r.get("summary").is_none()));

        let default = tours.get_all(&QueryRequest::new()).await.unwrap().0;
        assert_eq!(default.len(), 5);
        assert_eq!(names(&default)[0], "The Park Camper");
        assert!(default.iter().all(|r| r.get("__v").is_none()));
    }

    #[tokio::test]
    async fn invalid_operator_is_surfaced() {
        let (tours, _) = create_services().await;
        let request = QueryRequest::from_pairs([("price[ne]", "1")]).unwrap();
        assert!(matches!(
            tours.get_all(&request).await,
            Err(DomainError::Pipeline(_))
        ));
    }

    #[tokio::test]
    async fn top_cheap_overrides_request() {
        let (tours, _) = create_services().await;
        for i in 0..7u32 {
            tours
                .create(tour_input(&format!("Budget Tour Number {i}"), 100 + i * 10, "easy"))
                .await
                .unwrap();
        }

        let request = QueryRequest::new().param("limit", "50");
        let (records, spec) = tours.top_cheap(request).await.unwrap();

        assert_eq!(records.len(), 5);
        assert_eq!(spec.limit, 5);
        assert_eq!(names(&records)[0], "Budget Tour Number 0");
        assert!(records[0].get("imageCover").is_none());
        assert!(records[0].get("ratingsAverage").is_some());
    }

    #[tokio::test]
    async fn stats_group_by_difficulty() {
        let (tours, reviews) = create_services().await;
        for (name, price, difficulty) in [
            ("The Forest Hiker", 397, "easy"),
            ("The City Wanderer", 1197, "easy"),
            ("The Sea Explorer", 497, "medium"),
        ] {
            tours
                .create(tour_input(name, price, difficulty))
                .await
                .unwrap();
        }
        let low = tours
            .create(tour_input("The Northern Lights", 1497, "difficult"))
            .await
            .unwrap()
            .id();
        reviews.create(review_input(low, "alice", 3)).await.unwrap();

        let stats = tours.tour_stats().await.unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0]["_id"], json!("MEDIUM"));
        assert_eq!(stats[1]["_id"], json!("EASY"));
        assert_eq!(stats[1]["numTours"], json!(2));
        assert_eq!(stats[1]["avgPrice"], json!(797.0));
        assert_eq!(stats[1]["minPrice"], json!(397.0));
        assert_eq!(stats[1]["maxPrice"], json!(1197.0));
    }
}

mod reviews {
    use super::*;

    #[tokio::test]
    async fn ratings_follow_reviews() {
        let (tours, reviews) = create_services().await;
        let tour = tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap()
            .id();

        let first = reviews.create(review_input(tour, "alice", 4)).await.unwrap();
        let second = reviews.create(review_input(tour, "bob", 5)).await.unwrap();

        let loaded = tours.get(tour).await.unwrap();
        assert_eq!(loaded.get("ratingsQuantity"), Some(&json!(2)));
        assert_eq!(loaded.get("ratingsAverage"), Some(&json!(4.5)));

        reviews
            .update(first.id(), json!({"rating": 2}))
            .await
            .unwrap();
        let loaded = tours.get(tour).await.unwrap();
        assert_eq!(loaded.get("ratingsAverage"), Some(&json!(3.5)));

        reviews.delete(first.id()).await.unwrap();
        reviews.delete(second.id()).await.unwrap();
        let loaded = tours.get(tour).await.unwrap();
        assert_eq!(loaded.get("ratingsQuantity"), Some(&json!(0)));
        assert_eq!(loaded.get("ratingsAverage"), Some(&json!(4.5)));
    }

    #[tokio::test]
    async fn one_review_per_user_and_tour() {
        let (tours, reviews) = create_services().await;
        let tour = tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap()
            .id();
        let other = tours
            .create(tour_input("The Sea Explorer", 497, "medium"))
            .await
            .unwrap()
            .id();

        reviews.create(review_input(tour, "alice", 3)).await.unwrap();
        let err = reviews
            .create(review_input(tour, "alice", 5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Ratings(RatingsError::DuplicateDependent { .. })
        ));
        assert_eq!(
            tours.get(tour).await.unwrap().get("ratingsAverage"),
            Some(&json!(3.0))
        );

        // Moving a review onto a tour the user already reviewed also clashes.
        let moved = reviews.create(review_input(other, "alice", 4)).await.unwrap();
        let err = reviews
            .update(moved.id(), json!({"tour": tour.to_string()}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Ratings(RatingsError::DuplicateDependent { .. })
        ));
    }

    #[tokio::test]
    async fn moving_a_review_updates_both_tours() {
        let (tours, reviews) = create_services().await;
        let from = tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap()
            .id();
        let to = tours
            .create(tour_input("The Sea Explorer", 497, "medium"))
            .await
            .unwrap()
            .id();
        let review = reviews.create(review_input(from, "alice", 2)).await.unwrap();

        reviews
            .update(review.id(), json!({"tour": to.to_string()}))
            .await
            .unwrap();

        let from = tours.get(from).await.unwrap();
        assert_eq!(from.get("ratingsQuantity"), Some(&json!(0)));
        assert_eq!(from.get("ratingsAverage"), Some(&json!(4.5)));
        let to = tours.get(to).await.unwrap();
        assert_eq!(to.get("ratingsQuantity"), Some(&json!(1)));
        assert_eq!(to.get("ratingsAverage"), Some(&json!(2.0)));
    }

    #[tokio::test]
    async fn nested_listing_is_scoped_to_tour() {
        let (tours, reviews) = create_services().await;
        let tour = tours
            .create(tour_input("The Forest Hiker", 397, "easy"))
            .await
            .unwrap()
            .id();
        let other = tours
            .create(tour_input("The Sea Explorer", 497, "medium"))
            .await
            .unwrap()
            .id();
        reviews.create(review_input(tour, "alice", 4)).await.unwrap();
        reviews.create(review_input(tour, "bob", 5)).await.unwrap();
        reviews.create(review_input(other, "carol", 3)).await.unwrap();

        let (scoped, _) = reviews
            .get_all(Some(tour), &QueryRequest::new())
            .await
            .unwrap();
        assert_eq!(scoped.len(), 2);

        let request = QueryRequest::from_pairs([("rating[gte]", "4")]).unwrap();
        let (all, _) = reviews.get_all(None, &request).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn missing_review_is_not_found() {
        let (_, reviews) = create_services().await;
        let id = RecordId::new();
        assert!(matches!(
            reviews.delete(id).await,
            Err(DomainError::NotFound { resource: "review", .. })
        ));
        assert!(matches!(
            reviews.update(id, json!({"rating": 3})).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
