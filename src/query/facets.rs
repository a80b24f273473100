use crate::models::ListingRecord;
use serde::Serialize;
use std::collections::BTreeSet;

/// Option lists for the filter controls, taken from the full collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facets {
    pub buildings: Vec<String>,
    pub floorplan_types: Vec<String>,
}

impl Facets {
    pub fn from_records(records: &[ListingRecord]) -> Self {
        Self {
            buildings: distinct_buildings(records),
            floorplan_types: distinct_floorplan_types(records),
        }
    }
}

pub fn distinct_buildings(records: &[ListingRecord]) -> Vec<String> {
    distinct(records, |record| &record.building)
}

pub fn distinct_floorplan_types(records: &[ListingRecord]) -> Vec<String> {
    distinct(records, |record| &record.floorplan_type)
}

fn distinct<F>(records: &[ListingRecord], field: F) -> Vec<String>
where
    F: Fn(&ListingRecord) -> &String,
{
    records
        .iter()
        .map(field)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect()
}
