//! Pipeline error types.

use thiserror::Error;

/// Errors raised while turning a query request into a query.
///
/// Every variant carries the offending key or value so callers can build a
/// user-facing message; none of them are retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// A nested comparison key is not one of the recognized operators.
    #[error("Invalid operator '{operator}' for field '{field}'")]
    InvalidOperator { field: String, operator: String },

    /// A parameter is malformed, repeated when it may not be, or names an
    /// unusable field.
    #[error("Invalid parameter '{key}': {reason}")]
    InvalidParameter { key: String, reason: String },

    /// The field selection mixes inclusion and exclusion.
    #[error("Invalid projection '{fields}': cannot mix included and excluded fields")]
    InvalidProjection { fields: String },
}

impl PipelineError {
    /// A short label for the error kind, used in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidOperator { .. } => "invalid_operator",
            PipelineError::InvalidParameter { .. } => "invalid_parameter",
            PipelineError::InvalidProjection { .. } => "invalid_projection",
        }
    }

    pub(crate) fn parameter(key: impl Into<String>, reason: impl Into<String>) -> Self {
        PipelineError::InvalidParameter {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
