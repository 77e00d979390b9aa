//! Review endpoints, flat and nested under a tour.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use doc_store::{DocumentStore, Record};
use serde_json::Value;

use super::{AppState, Envelope, listing, parse_id, query_request};
use crate::error::ApiError;

type ListResponse = Json<Envelope<Vec<Record>>>;

/// GET /api/v1/reviews
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<ListResponse, ApiError> {
    let request = query_request(pairs)?;
    Ok(listing(state.reviews.get_all(None, &request).await?))
}

/// GET /api/v1/tours/{id}/reviews: reviews of one tour.
#[tracing::instrument(skip(state))]
pub async fn list_for_tour<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tour_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<ListResponse, ApiError> {
    let tour = parse_id(&tour_id)?;
    let request = query_request(pairs)?;
    Ok(listing(state.reviews.get_all(Some(tour), &request).await?))
}

/// POST /api/v1/reviews
#[tracing::instrument(skip(state, body))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), ApiError> {
    let review = state.reviews.create(body).await?;
    Ok((StatusCode::CREATED, Envelope::success(review)))
}

/// POST /api/v1/tours/{id}/reviews: the tour defaults to the one in the path.
#[tracing::instrument(skip(state, body))]
pub async fn create_for_tour<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(tour_id): Path<String>,
    Json(mut body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), ApiError> {
    let tour = parse_id(&tour_id)?;
    if let Some(fields) = body.as_object_mut() {
        fields
            .entry("tour")
            .or_insert_with(|| Value::String(tour.to_string()));
    }
    let review = state.reviews.create(body).await?;
    Ok((StatusCode::CREATED, Envelope::success(review)))
}

/// GET /api/v1/reviews/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Record>>, ApiError> {
    let review = state.reviews.get(parse_id(&id)?).await?;
    Ok(Envelope::success(review))
}

/// PATCH /api/v1/reviews/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Record>>, ApiError> {
    let review = state.reviews.update(parse_id(&id)?, body).await?;
    Ok(Envelope::success(review))
}

/// DELETE /api/v1/reviews/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.reviews.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
