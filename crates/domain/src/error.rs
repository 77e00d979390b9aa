//! Domain error types.

use doc_store::{RecordId, StoreError};
use query_pipeline::PipelineError;
use ratings::RatingsError;
use thiserror::Error;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input failed model validation.
    #[error("Invalid input data. {0}")]
    Validation(String),

    /// No visible resource with this ID.
    #[error("No {resource} found with that ID: {id}")]
    NotFound { resource: &'static str, id: RecordId },

    /// The query string could not be turned into a query.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// An error raised by the ratings engine.
    #[error(transparent)]
    Ratings(#[from] RatingsError),

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub(crate) fn validation(messages: Vec<String>) -> Self {
        DomainError::Validation(messages.join(". "))
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
