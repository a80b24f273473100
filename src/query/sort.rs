use crate::error::CatalogError;
use crate::models::{ListingRecord, Scalar};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Field a listing table can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Unit,
    Building,
    Size,
    AvailableDate,
    FloorplanType,
    FloorplanLink,
    FloorplanNote,
    /// Current price, `prices[0]`
    Price,
}

impl SortKey {
    pub const ALL: [SortKey; 8] = [
        SortKey::Unit,
        SortKey::Building,
        SortKey::Size,
        SortKey::AvailableDate,
        SortKey::FloorplanType,
        SortKey::FloorplanLink,
        SortKey::FloorplanNote,
        SortKey::Price,
    ];

    pub const NAMES: [&'static str; 8] = [
        "unit",
        "building",
        "size",
        "available_date",
        "floorplan_type",
        "floorplan_link",
        "floorplan_note",
        "price",
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Unit => "unit",
            SortKey::Building => "building",
            SortKey::Size => "size",
            SortKey::AvailableDate => "available_date",
            SortKey::FloorplanType => "floorplan_type",
            SortKey::FloorplanLink => "floorplan_link",
            SortKey::FloorplanNote => "floorplan_note",
            SortKey::Price => "price",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| CatalogError::UnknownSortKey(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn flipped(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

impl FromStr for SortOrder {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => Err(CatalogError::UnknownSortOrder(s.to_string())),
        }
    }
}

/// Active sort: defaults to unit ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortCriteria {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortCriteria {
    pub fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Result of the user picking `key` as the sort column.
    ///
    /// Picking the active key flips the direction; any other key starts
    /// ascending.
    pub fn select(self, key: SortKey) -> Self {
        if key == self.key {
            Self {
                key,
                order: self.order.flipped(),
            }
        } else {
            Self {
                key,
                order: SortOrder::Ascending,
            }
        }
    }
}

enum SortValue {
    Number(f64),
    /// Already lower-cased
    Text(String),
}

fn text(value: &str) -> SortValue {
    SortValue::Text(value.to_lowercase())
}

fn scalar(value: Option<&Scalar>) -> SortValue {
    match value {
        Some(value) => match value.as_number() {
            Some(n) => SortValue::Number(n),
            None => text(&value.to_text()),
        },
        None => SortValue::Text(String::new()),
    }
}

fn extract(record: &ListingRecord, key: SortKey) -> SortValue {
    match key {
        SortKey::Unit => text(&record.unit),
        SortKey::Building => text(&record.building),
        SortKey::Size => scalar(record.size.as_ref()),
        SortKey::AvailableDate => text(&record.available_date),
        SortKey::FloorplanType => text(&record.floorplan_type),
        SortKey::FloorplanLink => text(&record.floorplan_link),
        SortKey::FloorplanNote => text(&record.floorplan_note),
        SortKey::Price => SortValue::Number(record.current_price()),
    }
}

fn compare(a: &SortValue, b: &SortValue) -> Ordering {
    match (a, b) {
        (SortValue::Number(a), SortValue::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (SortValue::Text(a), SortValue::Text(b)) => a.cmp(b),
        (SortValue::Number(a), SortValue::Text(b)) => a.to_string().cmp(b),
        (SortValue::Text(a), SortValue::Number(b)) => a.as_str().cmp(b.to_string().as_str()),
    }
}

/// Records reordered by `criteria`; equal keys keep their input order.
pub fn sort<'a, I>(records: I, criteria: &SortCriteria) -> Vec<&'a ListingRecord>
where
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let mut keyed: Vec<(SortValue, &'a ListingRecord)> = records
        .into_iter()
        .map(|record| (extract(record, criteria.key), record))
        .collect();

    // sort_by is stable, and reversing the comparator keeps ties in place
    keyed.sort_by(|(a, _), (b, _)| match criteria.order {
        SortOrder::Ascending => compare(a, b),
        SortOrder::Descending => compare(a, b).reverse(),
    });

    keyed.into_iter().map(|(_, record)| record).collect()
}
