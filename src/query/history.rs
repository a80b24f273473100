use crate::error::{CatalogError, CatalogResult};
use crate::models::ListingRecord;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

/// One point of a unit's price chart
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceSample {
    pub fetched_at: NaiveDateTime,
    pub price: f64,
}

/// Headline numbers for a projected series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistorySummary {
    pub observations: usize,
    pub first: f64,
    pub latest: f64,
    pub min: f64,
    pub max: f64,
    /// Latest minus the observation before it (0 with a single observation)
    pub last_change: f64,
}

const FETCH_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a `date_fetched` value.
///
/// Scrapers write `YYYY-MM-DD HH:MM:SS`; ISO `T` timestamps, RFC 3339 with
/// an offset (normalized to UTC) and bare dates are accepted too.
pub fn parse_fetch_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    FETCH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Chronological price series for one record, oldest first.
///
/// Stored order is ignored. A single unparseable `date_fetched` fails the
/// whole projection rather than producing a misordered chart.
pub fn project(record: &ListingRecord) -> CatalogResult<Vec<PriceSample>> {
    let mut samples = record
        .prices
        .iter()
        .map(|point| {
            let fetched_at = parse_fetch_date(&point.date_fetched).ok_or_else(|| {
                CatalogError::InvalidFetchDate {
                    unit: record.unit.clone(),
                    value: point.date_fetched.clone(),
                }
            })?;
            Ok(PriceSample {
                fetched_at,
                price: point.amount(),
            })
        })
        .collect::<CatalogResult<Vec<_>>>()?;

    samples.sort_by_key(|sample| sample.fetched_at);
    Ok(samples)
}

pub fn summarize(samples: &[PriceSample]) -> Option<HistorySummary> {
    let first = samples.first()?;
    let latest = samples.last()?;
    let previous = samples.len().checked_sub(2).map(|i| samples[i].price);

    let (min, max) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), s| {
            (min.min(s.price), max.max(s.price))
        });

    Some(HistorySummary {
        observations: samples.len(),
        first: first.price,
        latest: latest.price,
        min,
        max,
        last_change: previous.map(|p| latest.price - p).unwrap_or(0.0),
    })
}

/// Whether `prices` is newest-first, so `prices[0]` really is current.
///
/// Points with unparseable dates are skipped here; `project` reports them.
pub fn is_newest_first(record: &ListingRecord) -> bool {
    let dates: Vec<NaiveDateTime> = record
        .prices
        .iter()
        .filter_map(|point| parse_fetch_date(&point.date_fetched))
        .collect();

    dates.windows(2).all(|pair| pair[0] >= pair[1])
}
