//! Route handlers and the state they share.

pub mod health;
pub mod metrics;
pub mod reviews;
pub mod tours;

use axum::Json;
use doc_store::{DocumentStore, Record, RecordId};
use domain::{ReviewService, TourService};
use query_pipeline::{QueryRequest, QuerySpec};
use serde::Serialize;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore + Clone> {
    pub tours: TourService<S>,
    pub reviews: ReviewService<S>,
}

/// Success envelope: `{"status": "success", "results"?, "query"?, "data"}`.
#[derive(Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QuerySpec>,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            status: "success",
            results: None,
            query: None,
            data,
        })
    }
}

/// Wraps a listing with its count and the query that produced it.
pub fn listing((records, spec): (Vec<Record>, QuerySpec)) -> Json<Envelope<Vec<Record>>> {
    Json(Envelope {
        status: "success",
        results: Some(records.len()),
        query: Some(spec),
        data: records,
    })
}

/// Builds a query request from raw query-string pairs.
pub fn query_request(pairs: Vec<(String, String)>) -> Result<QueryRequest, ApiError> {
    Ok(QueryRequest::from_pairs(pairs)?)
}

pub fn parse_id(id: &str) -> Result<RecordId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid _id: {id}")))
}

/// Fallback for unmatched routes.
pub async fn not_found(uri: axum::http::Uri) -> ApiError {
    ApiError::NotFound(format!("Can't find {uri} on this server!"))
}
