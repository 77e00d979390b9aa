//! Collection and field names the engine works with.

use doc_store::Document;
use serde_json::Value;

/// Mean written for a parent with no dependent records.
pub const DEFAULT_MEAN: f64 = 4.5;

/// Where the engine reads dependents and writes aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingsConfig {
    pub parent_collection: String,
    pub dependent_collection: String,
    /// Field on a dependent holding its parent's ID.
    pub parent_field: String,
    /// Field on a dependent identifying its author.
    pub author_field: String,
    /// Numeric field averaged over dependents.
    pub rating_field: String,
    /// Field on the parent receiving the count.
    pub count_field: String,
    /// Field on the parent receiving the mean.
    pub mean_field: String,
    pub default_mean: f64,
}

impl RatingsConfig {
    /// Sets the mean written when a parent has no dependents.
    pub fn with_default_mean(mut self, mean: f64) -> Self {
        self.default_mean = mean;
        self
    }

    /// The parent fields holding an aggregate of `count` and `mean`.
    pub fn aggregate_fields(&self, count: u64, mean: f64) -> Document {
        let mut fields = Document::new();
        fields.insert(self.count_field.clone(), Value::from(count));
        fields.insert(self.mean_field.clone(), Value::from(mean));
        fields
    }

    /// The aggregate fields of a parent nobody has rated yet.
    pub fn initial_aggregate(&self) -> Document {
        self.aggregate_fields(0, self.default_mean)
    }
}

impl Default for RatingsConfig {
    fn default() -> Self {
        Self {
            parent_collection: "tours".to_string(),
            dependent_collection: "reviews".to_string(),
            parent_field: "tour".to_string(),
            author_field: "user".to_string(),
            rating_field: "rating".to_string(),
            count_field: "ratingsQuantity".to_string(),
            mean_field: "ratingsAverage".to_string(),
            default_mean: DEFAULT_MEAN,
        }
    }
}
