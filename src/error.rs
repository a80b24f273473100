//! Typed errors for the catalog library.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("unit {unit:?}: unparseable date_fetched {value:?}")]
    InvalidFetchDate { unit: String, value: String },

    #[error("unknown sort key {0:?} (expected one of: {})", crate::query::SortKey::NAMES.join(", "))]
    UnknownSortKey(String),

    #[error("unknown sort order {0:?} (expected asc or desc)")]
    UnknownSortOrder(String),

    #[error("prices are not newest-first for {count} unit(s): {units}")]
    PriceOrder { count: usize, units: String },

    #[error("no snapshot matching {prefix}*.json in {}", .dir.display())]
    NoSnapshot { dir: PathBuf, prefix: String },

    #[error("snapshot is neither an array of listings nor an object of listing arrays")]
    UnsupportedShape,
}

pub type CatalogResult<T> = Result<T, CatalogError>;
