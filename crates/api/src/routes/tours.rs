//! Tour endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use doc_store::{Document, DocumentStore, Record};
use serde_json::Value;

use super::{AppState, Envelope, listing, parse_id, query_request};
use crate::error::ApiError;

type ListResponse = Json<Envelope<Vec<Record>>>;

/// GET /api/v1/tours: list visible tours through the query pipeline.
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<ListResponse, ApiError> {
    let request = query_request(pairs)?;
    Ok(listing(state.tours.get_all(&request).await?))
}

/// GET /api/v1/tours/top-5-cheap: the five cheapest, best-rated tours.
#[tracing::instrument(skip(state))]
pub async fn top_cheap<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<ListResponse, ApiError> {
    let request = query_request(pairs)?;
    Ok(listing(state.tours.top_cheap(request).await?))
}

/// GET /api/v1/tours/tour-stats: per-difficulty statistics.
#[tracing::instrument(skip(state))]
pub async fn stats<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Envelope<Vec<Document>>>, ApiError> {
    let stats = state.tours.tour_stats().await?;
    Ok(Envelope::success(stats))
}

/// POST /api/v1/tours
#[tracing::instrument(skip(state, body))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Envelope<Record>>), ApiError> {
    let tour = state.tours.create(body).await?;
    Ok((StatusCode::CREATED, Envelope::success(tour)))
}

/// GET /api/v1/tours/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Record>>, ApiError> {
    let tour = state.tours.get(parse_id(&id)?).await?;
    Ok(Envelope::success(tour))
}

/// PATCH /api/v1/tours/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Envelope<Record>>, ApiError> {
    let tour = state.tours.update(parse_id(&id)?, body).await?;
    Ok(Envelope::success(tour))
}

/// DELETE /api/v1/tours/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.tours.delete(parse_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}
