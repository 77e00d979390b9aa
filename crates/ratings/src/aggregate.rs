//! Aggregate values and the snapshot carried across a mutation.

use doc_store::RecordId;
use serde::Serialize;

/// The derived statistics of one parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub parent_id: RecordId,
    pub count: u64,
    pub mean: f64,
}

impl AggregateRecord {
    /// The aggregate of a parent without dependents.
    pub fn empty(parent_id: RecordId, default_mean: f64) -> Self {
        Self {
            parent_id,
            count: 0,
            mean: default_mean,
        }
    }
}

/// What must be remembered about a dependent record before it is updated or
/// deleted, so the right parent can be recomputed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedSnapshot {
    pub record_id: RecordId,
    pub parent_id: RecordId,
}

/// Rounds to one decimal place, halves away from zero (4.45 → 4.5).
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding() {
        assert_eq!(round_to_tenth(4.5), 4.5);
        assert_eq!(round_to_tenth(4.666_666), 4.7);
        assert_eq!(round_to_tenth(4.25), 4.3);
        assert_eq!(round_to_tenth(3.0), 3.0);
        assert_eq!(round_to_tenth(-1.25), -1.3);
    }

    #[test]
    fn serializes_camel_case() {
        let id = RecordId::new();
        let value = serde_json::to_value(AggregateRecord::empty(id, 4.5)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"parentId": id.to_string(), "count": 0, "mean": 4.5})
        );
    }
}
