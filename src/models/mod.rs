use serde::{Deserialize, Deserializer, Serialize};

mod snapshot;

pub use snapshot::SnapshotDocument;

/// Availability dates the scrapers write for "available now"
pub const IMMEDIATE_DATES: [&str; 2] = ["1900-01-01", "1970-01-01"];

/// A wire value that may arrive as a JSON number or as text.
///
/// Anything else (booleans, objects) is kept verbatim so one odd field
/// never fails a whole snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Other(serde_json::Value),
}

impl Scalar {
    /// Numeric reading of the value, if it has one.
    ///
    /// Text is trimmed and stripped of `$` and `,` before parsing, which
    /// covers the formatting the listing sites use ("$3,450").
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n).filter(|n| n.is_finite()),
            Scalar::Text(text) => parse_amount(text),
            Scalar::Other(_) => None,
        }
    }

    /// Text reading of the value; numbers render the way JSON writes them.
    pub fn to_text(&self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(text) => text.clone(),
            Scalar::Other(value) => value.to_string(),
        }
    }
}

fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// One observed price for a unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(default)]
    pub price: Option<Scalar>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price_range: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub date_fetched: String,
}

impl PricePoint {
    /// Coerced price; non-numeric or missing reads as 0.
    pub fn amount(&self) -> f64 {
        self.price.as_ref().and_then(Scalar::as_number).unwrap_or(0.0)
    }
}

/// One rental unit as published in the snapshot.
///
/// `prices` is expected newest-first: index 0 is the current price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub building: String,
    #[serde(default)]
    pub size: Option<Scalar>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub available_date: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub floorplan_type: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub floorplan_link: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub floorplan_note: String,
    #[serde(default, deserialize_with = "lenient_prices")]
    pub prices: Vec<PricePoint>,
}

impl ListingRecord {
    /// Price at `prices[0]`, or 0 when there is none.
    pub fn current_price(&self) -> f64 {
        self.prices.first().map(PricePoint::amount).unwrap_or(0.0)
    }

    pub fn size_value(&self) -> Option<f64> {
        self.size.as_ref().and_then(Scalar::as_number)
    }

    pub fn floorplan_link(&self) -> Option<&str> {
        Some(self.floorplan_link.trim()).filter(|link| !link.is_empty())
    }

    pub fn floorplan_note(&self) -> Option<&str> {
        Some(self.floorplan_note.trim()).filter(|note| !note.is_empty())
    }

    pub fn is_immediately_available(&self) -> bool {
        IMMEDIATE_DATES.contains(&self.available_date.as_str())
    }

    pub fn availability_label(&self) -> String {
        if self.is_immediately_available() {
            "Immediate".to_string()
        } else if self.available_date.trim().is_empty() {
            "N/A".to_string()
        } else {
            self.available_date.clone()
        }
    }

    pub fn size_label(&self) -> String {
        match self.size_value() {
            Some(size) => size.to_string(),
            None => "N/A".to_string(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Text(text)) => text,
        Some(other) => other.to_text(),
        None => String::new(),
    })
}

// Anything but an array reads as no prices. A malformed element becomes an
// empty point so that index 0 still means the current price.
fn lenient_prices<'de, D>(deserializer: D) -> Result<Vec<PricePoint>, D::Error>
where
    D: Deserializer<'de>,
{
    let points = match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| PricePoint::deserialize(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    };
    Ok(points)
}
