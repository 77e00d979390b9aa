//! Document store client abstraction.
//!
//! This crate provides the storage seam the rest of the workspace is written
//! against:
//! - [`DocumentStore`] trait with an extension trait for chained queries
//! - [`Predicate`] tree with the store's native comparison operators
//! - [`Query`] builder supporting sort, projection, skip and limit
//! - [`Stage`] pipeline for scoped aggregations
//! - [`InMemoryDocumentStore`] implementation used by tests and the API binary

pub mod aggregate;
pub mod error;
pub mod memory;
pub mod predicate;
pub mod query;
pub mod record;
pub mod store;

pub use aggregate::{Accumulator, Stage};
pub use common::RecordId;
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use predicate::{CmpOp, Predicate};
pub use query::{FindOptions, Projection, Query, SortDirection, SortKey};
pub use record::{CREATED_AT_FIELD, Document, ID_FIELD, Record, into_document};
pub use store::{DocumentStore, DocumentStoreExt, RecordStream, by_id};
