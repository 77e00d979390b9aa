//! Ratings engine error types.

use doc_store::{RecordId, StoreError};
use thiserror::Error;

/// Errors raised by the ratings engine.
#[derive(Debug, Error)]
pub enum RatingsError {
    /// The author has already written a dependent record for this parent.
    #[error("Author {author} already has a record for parent {parent}")]
    DuplicateDependent { parent: String, author: String },

    /// A recomputation did not complete. The mutation that triggered it has
    /// already committed, so this is logged rather than returned by the hooks.
    #[error("Recomputing aggregate for parent {parent_id} failed: {reason}")]
    RecomputeFailed { parent_id: RecordId, reason: String },

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for ratings operations.
pub type Result<T> = std::result::Result<T, RatingsError>;
