use crate::models::ListingRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Criteria for narrowing the catalog.
///
/// Axes combine with AND; an axis left at its default passes everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Buildings to keep (empty keeps all)
    pub buildings: BTreeSet<String>,
    /// Floorplan types to keep (empty keeps all)
    pub floorplan_types: BTreeSet<String>,
    /// Inclusive lower bound on the current price
    pub min_price: Option<f64>,
    /// Inclusive upper bound on the current price
    pub max_price: Option<f64>,
    /// Inclusive ISO date lower bound on availability
    pub available_from: Option<String>,
    /// Inclusive ISO date upper bound on availability
    pub available_to: Option<String>,
    /// Case-insensitive substring over unit, building and floorplan type
    pub search: String,
}

impl FilterCriteria {
    pub fn is_unrestricted(&self) -> bool {
        self.buildings.is_empty()
            && self.floorplan_types.is_empty()
            && self.min_price.is_none()
            && self.max_price.is_none()
            && self.available_from.is_none()
            && self.available_to.is_none()
            && self.search.is_empty()
    }

    fn matches_with_query(&self, record: &ListingRecord, query: &str) -> bool {
        allowed(&self.buildings, &record.building)
            && allowed(&self.floorplan_types, &record.floorplan_type)
            && self.matches_price(record.current_price())
            && self.matches_availability(&record.available_date)
            && matches_search(record, query)
    }

    fn matches_price(&self, price: f64) -> bool {
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        true
    }

    // ISO-8601 dates order correctly as plain text
    fn matches_availability(&self, date: &str) -> bool {
        if let Some(from) = &self.available_from {
            if date < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.available_to {
            if date > to.as_str() {
                return false;
            }
        }
        true
    }
}

fn allowed(allow: &BTreeSet<String>, value: &str) -> bool {
    allow.is_empty() || allow.contains(value)
}

fn matches_search(record: &ListingRecord, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }

    [&record.unit, &record.building, &record.floorplan_type]
        .iter()
        .any(|field| field.to_lowercase().contains(query))
}

/// Records passing `criteria`, in input order.
pub fn filter<'a>(records: &'a [ListingRecord], criteria: &FilterCriteria) -> Vec<&'a ListingRecord> {
    let query = criteria.search.to_lowercase();

    records
        .iter()
        .filter(|record| criteria.matches_with_query(record, &query))
        .collect()
}
