use doc_store::{Predicate, Projection, SortKey};
use serde::Serialize;

/// The resolved transformations for one request.
///
/// Serializes as `{filter, sort, projection, page, skip, limit}` so handlers
/// can echo what was actually run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    pub filter: Predicate,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: usize,
    pub skip: usize,
    pub limit: usize,
}
