//! HTTP API for the tour-booking backend.
//!
//! Exposes tours and reviews over REST, with every listing going through the
//! query pipeline and every review write keeping tour ratings current.
//! Structured logging comes from `tracing`, metrics from Prometheus.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use doc_store::DocumentStore;
use domain::{DomainError, ReviewService, TourService};
use metrics_exporter_prometheus::PrometheusHandle;
use query_pipeline::QueryPipeline;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let api = Router::new()
        .route(
            "/tours",
            get(routes::tours::list::<S>).post(routes::tours::create::<S>),
        )
        .route("/tours/top-5-cheap", get(routes::tours::top_cheap::<S>))
        .route("/tours/tour-stats", get(routes::tours::stats::<S>))
        .route(
            "/tours/{id}",
            get(routes::tours::get::<S>)
                .patch(routes::tours::update::<S>)
                .delete(routes::tours::delete::<S>),
        )
        .route(
            "/tours/{id}/reviews",
            get(routes::reviews::list_for_tour::<S>).post(routes::reviews::create_for_tour::<S>),
        )
        .route(
            "/reviews",
            get(routes::reviews::list::<S>).post(routes::reviews::create::<S>),
        )
        .route(
            "/reviews/{id}",
            get(routes::reviews::get::<S>)
                .patch(routes::reviews::update::<S>)
                .delete(routes::reviews::delete::<S>),
        );

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api/v1", api)
        .with_state(state)
        .merge(metrics_router)
        .fallback(routes::not_found)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the tour and review services over `store` and declares their
/// unique indexes.
pub async fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    config: &Config,
) -> Result<Arc<AppState<S>>, DomainError> {
    let pipeline = QueryPipeline::new(config.pipeline());
    let ratings = config.ratings();
    let tours = TourService::new(store.clone(), pipeline.clone(), &ratings);
    let reviews = ReviewService::new(store, pipeline, ratings);

    tours.ensure_indexes().await?;
    reviews.ensure_indexes().await?;

    Ok(Arc::new(AppState { tours, reviews }))
}
