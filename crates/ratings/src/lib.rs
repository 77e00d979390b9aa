//! Derived rating aggregates.
//!
//! Every parent record (a tour) carries a `{count, mean}` aggregate computed
//! from its dependent records (reviews). [`RatingsEngine`] recomputes it from
//! scratch whenever a dependent is created, changed or removed:
//! - creation recomputes after the insert has committed
//! - change and removal use a two-step protocol: capture the affected parent
//!   with [`RatingsEngine::on_dependent_will_change`] before the mutation, then
//!   recompute with [`RatingsEngine::on_dependent_changed`] after it
//!
//! Recomputation is idempotent, so concurrent writers converge on the value
//! computed from the final state of the dependent collection.

pub mod aggregate;
pub mod config;
pub mod engine;
pub mod error;

pub use aggregate::{AggregateRecord, CapturedSnapshot, round_to_tenth};
pub use config::{DEFAULT_MEAN, RatingsConfig};
pub use engine::RatingsEngine;
pub use error::{RatingsError, Result};
