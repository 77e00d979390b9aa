use std::cmp::Ordering;

use serde::Serialize;

use crate::predicate::compare_values;
use crate::record::{Document, ID_FIELD, lookup};
use crate::{DocumentStore, Predicate, Record, Result};

/// Sort direction for a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key; a list of keys is applied primary-first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    /// Creates an ascending key.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Creates a descending key.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Field selection applied to returned documents.
///
/// Inclusion and exclusion are never mixed, matching the store's restriction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", content = "fields", rename_all = "lowercase")]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Applies the projection to a document. Inclusion always keeps `_id`.
    pub fn apply(&self, document: &Document) -> Document {
        match self {
            Projection::All => document.clone(),
            Projection::Include(fields) => document
                .iter()
                .filter(|(k, _)| k.as_str() == ID_FIELD || fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Projection::Exclude(fields) => document
                .iter()
                .filter(|(k, _)| !fields.iter().any(|f| f == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Everything a store needs to run a find.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Filter predicate; the default matches every record.
    pub filter: Predicate,

    /// Sort keys, primary first. Empty means insertion order.
    pub sort: Vec<SortKey>,

    /// Field selection on returned records.
    pub projection: Projection,

    /// Number of records to skip.
    pub skip: Option<usize>,

    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Creates options matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares two documents by the configured sort keys.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.sort {
            let ord = match (lookup(a, &key.field), lookup(b, &key.field)) {
                (Some(x), Some(y)) => compare_values(x, y),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
            }
        }
        Ordering::Equal
    }
}

/// A composable, not-yet-executed find against one collection.
///
/// Built with [`crate::DocumentStoreExt::find`]; each chained call refines the
/// options and [`Query::execute`] hands them to the store.
pub struct Query<'s, S: DocumentStore + ?Sized> {
    store: &'s S,
    collection: String,
    options: FindOptions,
}

impl<'s, S: DocumentStore + ?Sized> Query<'s, S> {
    /// Creates a query over `collection` filtered by `predicate`.
    pub fn new(store: &'s S, collection: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            store,
            collection: collection.into(),
            options: FindOptions {
                filter: predicate,
                ..FindOptions::default()
            },
        }
    }

    /// Narrows the query with an additional predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        let current = std::mem::take(&mut self.options.filter);
        self.options.filter = current.and(predicate);
        self
    }

    /// Replaces the sort keys.
    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.options.sort = keys;
        self
    }

    /// Replaces the projection.
    pub fn select(mut self, projection: Projection) -> Self {
        self.options.projection = projection;
        self
    }

    /// Skips this many records.
    pub fn skip(mut self, n: usize) -> Self {
        self.options.skip = Some(n);
        self
    }

    /// Returns at most this many records.
    pub fn limit(mut self, n: usize) -> Self {
        self.options.limit = Some(n);
        self
    }

    /// Returns the collection this query targets.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the accumulated options.
    pub fn options(&self) -> &FindOptions {
        &self.options
    }

    /// Runs the query. Consumes it, so a query can only be executed once.
    pub async fn execute(self) -> Result<Vec<Record>> {
        self.store.find_many(&self.collection, self.options).await
    }
}

impl<S: DocumentStore + ?Sized> std::fmt::Debug for Query<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("collection", &self.collection)
            .field("options", &self.options)
            .finish()
    }
}
