//! Query layer for a periodically refreshed catalog of rental listings.
//!
//! A [`ListingRepository`] loads a JSON snapshot from a [`SnapshotSource`],
//! the [`query`] module filters, sorts and aggregates it, and a [`Catalog`]
//! publishes the resulting view to whoever renders it.

pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod render;
pub mod repository;
pub mod sources;

pub use catalog::{Catalog, CatalogView};
pub use config::{load_config, Config, PriceOrderPolicy};
pub use error::{CatalogError, CatalogResult};
pub use models::{ListingRecord, PricePoint, Scalar};
pub use repository::{ListingRepository, LoadStatus, RefreshOutcome, Snapshot};
pub use sources::SnapshotSource;
