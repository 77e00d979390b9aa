//! The trait every stored model implements.

use doc_store::{CREATED_AT_FIELD, Document, ID_FIELD, into_document};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{DomainError, Result};

/// Version marker stamped on every new document.
pub const VERSION_KEY: &str = "__v";

/// A model stored as one document per record.
///
/// Unknown input fields are dropped when the model is parsed, so only declared
/// fields ever reach the store.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection holding this resource.
    const COLLECTION: &'static str;

    /// Singular name used in messages ("tour").
    const NAME: &'static str;

    /// Fills in derived fields before validation.
    fn prepare(&mut self) {}

    /// Checks field constraints, returning one message per violation.
    fn validate(&self) -> std::result::Result<(), Vec<String>>;

    /// Parses, prepares and validates input, returning the document to store.
    fn from_input(input: Value) -> Result<Document> {
        let mut model: Self = serde_json::from_value(input)
            .map_err(|err| DomainError::Validation(err.to_string()))?;
        model.prepare();
        model.validate().map_err(DomainError::validation)?;
        let document = into_document(serde_json::to_value(&model)?)?;
        Ok(document)
    }
}

/// Merges a patch over a stored document. `_id` and `createdAt` cannot be
/// changed through a patch.
pub(crate) fn merge(stored: &Document, patch: Value) -> Result<Value> {
    let Value::Object(patch) = patch else {
        return Err(DomainError::Validation(
            "update body must be a JSON object".to_string(),
        ));
    };
    let mut merged = stored.clone();
    for (key, value) in patch {
        if key != ID_FIELD && key != CREATED_AT_FIELD {
            merged.insert(key, value);
        }
    }
    Ok(Value::Object(merged))
}

/// Pushes a message when a trimmed string's length is outside `min..=max`.
pub(crate) fn check_length(
    errors: &mut Vec<String>,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.push(format!("{label} is required"));
    } else if len < min {
        errors.push(format!("{label} must have at least {min} characters"));
    } else if len > max {
        errors.push(format!("{label} must have at most {max} characters"));
    }
}
