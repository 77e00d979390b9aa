use thiserror::Error;

use crate::RecordId;

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record with the given ID exists in the collection.
    #[error("No record found in {collection} with id {id}")]
    NotFound { collection: String, id: RecordId },

    /// A write would violate a unique index on the collection.
    #[error("Duplicate key in {collection} on ({}): {}", fields.join(", "), format_values(values))]
    DuplicateKey {
        collection: String,
        fields: Vec<String>,
        values: Vec<serde_json::Value>,
    },

    /// The document handed to the store is not usable (e.g. not an object).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error is a unique-index violation covering exactly `fields`.
    pub fn is_duplicate_on(&self, fields: &[&str]) -> bool {
        match self {
            StoreError::DuplicateKey { fields: dup, .. } => {
                dup.len() == fields.len() && fields.iter().all(|f| dup.iter().any(|d| d == f))
            }
            _ => false,
        }
    }
}

fn format_values(values: &[serde_json::Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
