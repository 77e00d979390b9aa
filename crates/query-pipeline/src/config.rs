//! Pipeline configuration.

use std::collections::BTreeSet;

use doc_store::{CREATED_AT_FIELD, SortKey};

/// Parameters that control the pipeline stages, never filters.
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Fields that may legitimately appear more than once in a query string.
pub const DEFAULT_MULTI_VALUE_KEYS: [&str; 6] = [
    "duration",
    "ratingsQuantity",
    "ratingsAverage",
    "maxGroupSize",
    "difficulty",
    "price",
];

/// Internal version marker hidden from default projections.
pub const VERSION_FIELD: &str = "__v";

pub const DEFAULT_PAGE: usize = 1;
pub const DEFAULT_LIMIT: usize = 100;
pub const DEFAULT_MAX_LIMIT: usize = 1000;

/// Configuration for a [`crate::QueryPipeline`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPipelineConfig {
    /// Keys consumed by the sort/project/paginate stages.
    pub reserved_keys: BTreeSet<String>,

    /// Keys allowed to repeat; repeats become a membership filter.
    pub multi_value_keys: BTreeSet<String>,

    /// Sort applied when the request names none.
    pub default_sort: Vec<SortKey>,

    /// Field excluded when the request selects no fields.
    pub version_field: String,

    /// Page size when the request gives none.
    pub default_limit: usize,

    /// Upper bound on the page size a request can ask for.
    pub max_limit: usize,
}

impl QueryPipelineConfig {
    /// Replaces the multi-value allow-list.
    pub fn with_multi_value_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.multi_value_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the default page size.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    /// Sets the maximum page size.
    pub fn with_max_limit(mut self, limit: usize) -> Self {
        self.max_limit = limit.max(1);
        self
    }

    /// Returns true if `key` is consumed by a non-filter stage.
    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved_keys.contains(key)
    }

    /// Returns true if `key` may be supplied more than once.
    pub fn allows_repeats(&self, key: &str) -> bool {
        self.multi_value_keys.contains(key)
    }
}

impl Default for QueryPipelineConfig {
    fn default() -> Self {
        Self {
            reserved_keys: RESERVED_KEYS.iter().map(|k| k.to_string()).collect(),
            multi_value_keys: DEFAULT_MULTI_VALUE_KEYS
                .iter()
                .map(|k| k.to_string())
                .collect(),
            default_sort: vec![SortKey::desc(CREATED_AT_FIELD)],
            version_field: VERSION_FIELD.to_string(),
            default_limit: DEFAULT_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = QueryPipelineConfig::default();
        assert!(config.is_reserved("page"));
        assert!(config.is_reserved("fields"));
        assert!(!config.is_reserved("price"));
        assert!(config.allows_repeats("difficulty"));
        assert!(!config.allows_repeats("name"));
        assert_eq!(config.default_sort, vec![SortKey::desc("createdAt")]);
        assert_eq!(config.default_limit, 100);
    }

    #[test]
    fn limits_are_at_least_one() {
        let config = QueryPipelineConfig::default()
            .with_default_limit(0)
            .with_max_limit(0);
        assert_eq!(config.default_limit, 1);
        assert_eq!(config.max_limit, 1);
    }

    #[test]
    fn allow_list_can_be_replaced() {
        let config = QueryPipelineConfig::default().with_multi_value_keys(["tag"]);
        assert!(config.allows_repeats("tag"));
        assert!(!config.allows_repeats("price"));
    }
}
