//! Shared types for the tour booking backend.

pub mod types;

pub use types::RecordId;
