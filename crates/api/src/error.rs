//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use doc_store::StoreError;
use domain::DomainError;
use query_pipeline::PipelineError;
use ratings::RatingsError;

/// Message returned when a user reviews the same tour twice.
pub const DUPLICATE_REVIEW_MESSAGE: &str =
    "You have already reviewed this tour. You can only submit one review per tour.";

/// API-level error type that maps to HTTP responses.
///
/// Responses carry `{"status": "fail" | "error", "message": ...}`: `fail` for
/// client errors, `error` for server errors.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let kind = if status.is_server_error() {
            tracing::error!(error = %message, "internal server error");
            "error"
        } else {
            "fail"
        };
        metrics::counter!("api_errors_total", "status" => status.as_u16().to_string())
            .increment(1);

        let body = serde_json::json!({ "status": kind, "message": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Validation(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Pipeline(pipeline_err) => pipeline_error_to_response(pipeline_err),
        DomainError::Ratings(RatingsError::DuplicateDependent { .. }) => {
            (StatusCode::BAD_REQUEST, DUPLICATE_REVIEW_MESSAGE.to_string())
        }
        DomainError::Ratings(RatingsError::Store(store_err)) | DomainError::Store(store_err) => {
            store_error_to_response(store_err)
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn pipeline_error_to_response(err: &PipelineError) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, err.to_string())
}

fn store_error_to_response(err: &StoreError) -> (StatusCode, String) {
    match err {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        StoreError::DuplicateKey { values, .. } => {
            let values: Vec<String> = values.iter().map(ToString::to_string).collect();
            (
                StatusCode::BAD_REQUEST,
                format!(
                    "Duplicate field value: {}. Please use another value!",
                    values.join(", ")
                ),
            )
        }
        StoreError::InvalidDocument(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StoreError::Serialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError::Domain(DomainError::Pipeline(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_store::RecordId;

    #[test]
    fn duplicate_review_has_fixed_message() {
        let err = DomainError::Ratings(RatingsError::DuplicateDependent {
            parent: "t".to_string(),
            author: "u".to_string(),
        });
        assert_eq!(
            domain_error_to_response(err),
            (StatusCode::BAD_REQUEST, DUPLICATE_REVIEW_MESSAGE.to_string())
        );
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (DomainError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                DomainError::NotFound {
                    resource: "tour",
                    id: RecordId::new(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                DomainError::Pipeline(PipelineError::InvalidOperator {
                    field: "price".into(),
                    operator: "where".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::Ratings(RatingsError::RecomputeFailed {
                    parent_id: RecordId::new(),
                    reason: "store down".into(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                DomainError::Store(StoreError::DuplicateKey {
                    collection: "tours".into(),
                    fields: vec!["name".into()],
                    values: vec![serde_json::json!("The Forest Hiker")],
                }),
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(domain_error_to_response(err).0, expected);
        }
    }
}
