//! Query feature pipeline.
//!
//! Converts a flat set of string query parameters into a [`QuerySpec`] and
//! applies it to a base [`doc_store::Query`] in a fixed stage order:
//! filter → sort → project → paginate.
//!
//! Comparison operators are rewritten structurally from a whitelist into the
//! store's native [`doc_store::CmpOp`]; anything else is rejected rather than
//! passed through to the store.

pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod request;
pub mod spec;

pub use config::QueryPipelineConfig;
pub use error::{PipelineError, Result};
pub use filter::ComparisonOperator;
pub use pipeline::QueryPipeline;
pub use request::{ParamValue, QueryRequest};
pub use spec::QuerySpec;
