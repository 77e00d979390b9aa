use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{RecordId, StoreError};

/// A JSON object as stored in a collection.
pub type Document = serde_json::Map<String, Value>;

/// Field holding a record's unique identifier.
pub const ID_FIELD: &str = "_id";

/// Field holding a record's creation time (RFC 3339, UTC, microsecond precision).
pub const CREATED_AT_FIELD: &str = "createdAt";

/// A stored document together with its identifier.
///
/// The document always carries its own `_id` and `createdAt` fields so that
/// predicates, sort keys and projections can address them like any other field.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    document: Document,
}

impl Record {
    /// Builds a new record from a caller document, stamping id and creation time.
    ///
    /// Caller-supplied `_id` / `createdAt` values are overwritten.
    pub fn new(id: RecordId, created_at: DateTime<Utc>, mut document: Document) -> Self {
        document.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        document.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(format_timestamp(created_at)),
        );
        Self { id, document }
    }

    /// Returns the record ID.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Returns the full document, including `_id` and `createdAt`.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Consumes the record and returns its document.
    pub fn into_document(self) -> Document {
        self.document
    }

    /// Looks up a (possibly dotted) field path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        lookup(&self.document, path)
    }

    /// Reads a field holding a record ID.
    pub fn get_id(&self, field: &str) -> Option<RecordId> {
        self.get(field)?.as_str()?.parse().ok()
    }

    /// Merges top-level patch fields into the document.
    ///
    /// `_id` and `createdAt` are immutable and silently skipped.
    pub fn apply_patch(&mut self, patch: &Document) {
        for (key, value) in patch {
            if key == ID_FIELD || key == CREATED_AT_FIELD {
                continue;
            }
            self.document.insert(key.clone(), value.clone());
        }
    }

    /// Replaces the document body, keeping `_id` and `createdAt`.
    pub(crate) fn with_document(&self, document: Document) -> Self {
        let mut out = Self {
            id: self.id,
            document,
        };
        for key in [ID_FIELD, CREATED_AT_FIELD] {
            if let Some(value) = self.document.get(key) {
                out.document.insert(key.to_string(), value.clone());
            }
        }
        out
    }

    /// Deserializes the document into a concrete type.
    pub fn into_model<T: for<'de> serde::Deserialize<'de>>(self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(Value::Object(self.document))?)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.document.serialize(serializer)
    }
}

/// Converts any JSON value into a document, rejecting non-objects.
pub fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Formats a timestamp so that lexical order matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Resolves a dotted path (`startLocation.address`) against a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}
