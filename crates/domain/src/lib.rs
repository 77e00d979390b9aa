//! Domain layer for the tour booking backend.
//!
//! This crate provides:
//! - [`Resource`] trait for validated document models
//! - [`ResourceService`], the generic get-all/get-one/create/update/delete handlers
//! - [`Tour`] and [`TourService`] with secret-tour scoping and statistics
//! - [`Review`] and [`ReviewService`], which keeps tour ratings current through
//!   the ratings engine

pub mod error;
pub mod factory;
pub mod resource;
pub mod review;
pub mod tour;

pub use error::{DomainError, Result};
pub use factory::ResourceService;
pub use resource::{Resource, VERSION_KEY};
pub use review::{Review, ReviewService};
pub use tour::{Difficulty, TOP_CHEAP_ALIAS, Tour, TourService, slugify};
