use std::fmt::Write;

use crate::data_types::location::{LocationPoint, LocationSequence};

const HEADERS: [&str; 6] = [
    "Timestamp",
    "Latitude",
    "Longitude",
    "Elevation (file)",
    "Elevation (API)",
    "Resolution (API)",
];

const UNKNOWN: &str = "?";

fn cells(point: &LocationPoint) -> [String; 6] {
    let (elevation, resolution) = match point.service_elevation() {
        Some(service) => (
            format!("{:.1}", service.elevation),
            format!("{:.1}", service.resolution),
        ),
        None => (UNKNOWN.to_string(), UNKNOWN.to_string()),
    };

    [
        point.timestamp.clone(),
        point.coordinates.lat.to_string(),
        point.coordinates.lng.to_string(),
        point.recorded_elevation.to_string(),
        elevation,
        resolution,
    ]
}

/// Renders the track as a fixed-width text table, one row per point.
pub fn render_table(locations: &LocationSequence) -> String {
    let rows: Vec<[String; 6]> = locations.points().iter().map(cells).collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();

    let mut push_row = |row: &[&str]| {
        let line = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ");
        let _ = writeln!(out, "{}", line.trim_end());
    };

    push_row(&HEADERS);
    push_row(
        &widths
            .map(|width| "-".repeat(width))
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
    );

    for row in &rows {
        push_row(&row.iter().map(String::as_str).collect::<Vec<_>>());
    }

    out
}
