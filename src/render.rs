//! Plain-text rendering for the command line.

use crate::catalog::CatalogView;
use crate::models::ListingRecord;
use crate::query::{Facets, HistorySummary, PriceSample, SortOrder};
use std::fmt::Write;

const HEADERS: [&str; 6] = ["Unit", "Building", "Floorplan", "Size", "Available", "Price"];
const PRICE_COLUMN: usize = 5;

/// Whole-dollar price with thousands separators, e.g. `$3,450`
pub fn format_price(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

fn format_change(delta: f64) -> String {
    if delta > 0.0 {
        format!("+{}", format_price(delta))
    } else {
        format_price(delta)
    }
}

fn price_label(record: &ListingRecord) -> String {
    if record.prices.is_empty() {
        "N/A".to_string()
    } else {
        format_price(record.current_price())
    }
}

pub fn listing_table(rows: &[ListingRecord]) -> String {
    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|record| {
            [
                record.unit.clone(),
                record.building.clone(),
                record.floorplan_type.clone(),
                record.size_label(),
                record.availability_label(),
                price_label(record),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(str::to_string), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in &cells {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, row: &[String; 6], widths: &[usize; 6]) {
    let line: Vec<String> = row
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, width))| {
            if i == PRICE_COLUMN {
                format!("{:>width$}", cell, width = *width)
            } else {
                format!("{:<width$}", cell, width = *width)
            }
        })
        .collect();
    let _ = writeln!(out, "{}", line.join("  ").trim_end());
}

/// One-line description of a view, plus the load error if there is one
pub fn view_summary(view: &CatalogView) -> String {
    let order = match view.sort.order {
        SortOrder::Ascending => "ascending",
        SortOrder::Descending => "descending",
    };
    let filtered = if view.filter.is_unrestricted() { "" } else { " (filtered)" };
    let mut out = format!(
        "Showing {} of {} listings{}, sorted by {} ({})",
        view.rows.len(),
        view.total,
        filtered,
        view.sort.key,
        order
    );
    if let Some(error) = &view.error {
        let _ = write!(out, "\nLast refresh failed: {}", error);
    }
    out
}

pub fn facets_text(facets: &Facets) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Buildings ({}):", facets.buildings.len());
    for building in &facets.buildings {
        let _ = writeln!(out, "  {}", building);
    }
    let _ = writeln!(out, "Floorplan types ({}):", facets.floorplan_types.len());
    for floorplan in &facets.floorplan_types {
        let _ = writeln!(out, "  {}", floorplan);
    }
    out
}

pub fn history_text(
    record: &ListingRecord,
    samples: &[PriceSample],
    summary: Option<&HistorySummary>,
) -> String {
    let size = match record.size_value() {
        Some(size) => format!("{} sq ft", size),
        None => "size N/A".to_string(),
    };

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} · {} · {} · available {}",
        record.building,
        record.unit,
        record.floorplan_type,
        size,
        record.availability_label()
    );
    if let Some(link) = record.floorplan_link() {
        let _ = writeln!(out, "Floorplan: {}", link);
    }
    if let Some(note) = record.floorplan_note() {
        let _ = writeln!(out, "Note: {}", note);
    }

    match summary {
        Some(summary) => {
            let _ = writeln!(
                out,
                "Latest {} ({}) · low {} · high {} · {} observations",
                format_price(summary.latest),
                format_change(summary.last_change),
                format_price(summary.min),
                format_price(summary.max),
                summary.observations
            );
        }
        None => {
            let _ = writeln!(out, "No prices observed");
        }
    }

    for sample in samples {
        let _ = writeln!(
            out,
            "  {}  {:>10}",
            sample.fetched_at.format("%Y-%m-%d %H:%M"),
            format_price(sample.price)
        );
    }
    out
}
