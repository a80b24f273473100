use super::ListingRecord;
use crate::error::CatalogError;
use anyhow::{Context, Result};
use indexmap::IndexMap;

/// The two document shapes a snapshot may take
#[derive(Debug, Clone)]
pub enum SnapshotDocument {
    /// `[record, ...]`
    Flat(Vec<ListingRecord>),
    /// `{"group": [record, ...], ...}` in document order
    Grouped(IndexMap<String, Vec<ListingRecord>>),
}

impl SnapshotDocument {
    /// Parse raw snapshot bytes, dispatching on the top-level JSON type.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let first = bytes.iter().copied().find(|b| !b.is_ascii_whitespace());

        match first {
            Some(b'[') => {
                let records =
                    serde_json::from_slice(bytes).context("Failed to parse listing array")?;
                Ok(SnapshotDocument::Flat(records))
            }
            Some(b'{') => {
                let groups =
                    serde_json::from_slice(bytes).context("Failed to parse grouped listings")?;
                Ok(SnapshotDocument::Grouped(groups))
            }
            _ => Err(CatalogError::UnsupportedShape.into()),
        }
    }

    pub fn group_count(&self) -> Option<usize> {
        match self {
            SnapshotDocument::Flat(_) => None,
            SnapshotDocument::Grouped(groups) => Some(groups.len()),
        }
    }

    pub fn record_count(&self) -> usize {
        match self {
            SnapshotDocument::Flat(records) => records.len(),
            SnapshotDocument::Grouped(groups) => groups.values().map(Vec::len).sum(),
        }
    }

    /// Flatten into one sequence, groups concatenated in document order.
    pub fn into_records(self) -> Vec<ListingRecord> {
        match self {
            SnapshotDocument::Flat(records) => records,
            SnapshotDocument::Grouped(groups) => groups.into_values().flatten().collect(),
        }
    }
}
