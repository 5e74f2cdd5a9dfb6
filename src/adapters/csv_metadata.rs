//! Tabular import and export of aircraft metadata.
//!
//! Column names follow the common public aircraft databases. A few aliases are
//! accepted on import (`type`, `cn`, and `operator` standing in for a missing
//! `airline`); export always writes the canonical columns.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::models::{classify_model, AircraftCategory, AircraftMetadata, RecordOrigin};

/// Canonical column order written by [`write_metadata`].
pub const METADATA_COLUMNS: [&str; 15] = [
    "icao24",
    "registration",
    "aircraft_type",
    "manufacturer",
    "model",
    "airline",
    "airline_iata",
    "airline_icao",
    "owner",
    "operator",
    "construction_number",
    "first_flight",
    "engines",
    "seats",
    "category",
];

/// Read metadata rows from a CSV file.
pub fn read_metadata_file(path: &Path) -> Result<Vec<AircraftMetadata>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open metadata CSV: {}", path.display()))?;
    read_metadata(file).with_context(|| format!("Failed to read metadata CSV: {}", path.display()))
}

/// Read metadata rows from any CSV source with a header line.
///
/// Rows with an empty identifier or that fail to decode are skipped.
pub fn read_metadata<R: Read>(reader: R) -> Result<Vec<AircraftMetadata>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(row = idx, error = %e, "skipping unreadable metadata row");
                continue;
            }
        };

        let fields: HashMap<&str, &str> = headers
            .iter()
            .map(String::as_str)
            .zip(record.iter().map(str::trim))
            .filter(|(_, v)| !v.is_empty())
            .collect();

        if let Some(metadata) = metadata_from_fields(&fields) {
            rows.push(metadata);
        }
    }

    tracing::debug!(rows = rows.len(), "read metadata CSV");
    Ok(rows)
}

fn metadata_from_fields(fields: &HashMap<&str, &str>) -> Option<AircraftMetadata> {
    let icao24 = fields.get("icao24")?.to_lowercase();
    let get = |key: &str| fields.get(key).map(|v| (*v).to_string());
    let first = |keys: &[&str]| keys.iter().find_map(|k| get(*k));

    let model = get("model");
    let category = fields
        .get("category")
        .and_then(|c| AircraftCategory::from_str(c))
        .or_else(|| model.as_deref().map(|m| classify_model(Some(m))));

    Some(AircraftMetadata {
        icao24,
        registration: get("registration"),
        aircraft_type: first(&["aircraft_type", "type"]),
        manufacturer: get("manufacturer"),
        model,
        airline: first(&["airline", "operator"]),
        airline_iata: get("airline_iata"),
        airline_icao: get("airline_icao"),
        owner: get("owner"),
        operator: get("operator"),
        construction_number: first(&["construction_number", "cn"]),
        first_flight: get("first_flight"),
        engines: get("engines"),
        seats: fields
            .get("seats")
            .filter(|s| s.chars().all(|c| c.is_ascii_digit()))
            .and_then(|s| s.parse().ok()),
        category,
        origin: RecordOrigin::Preload,
    })
}

/// Write metadata rows to a CSV file, returning the number of rows written.
pub fn write_metadata_file(path: &Path, records: &[AircraftMetadata]) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create metadata CSV: {}", path.display()))?;
    write_metadata(file, records)
        .with_context(|| format!("Failed to write metadata CSV: {}", path.display()))
}

/// Write metadata rows with the canonical header to any sink.
pub fn write_metadata<W: Write>(writer: W, records: &[AircraftMetadata]) -> Result<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(METADATA_COLUMNS)?;

    for m in records {
        let seats = m.seats.map(|s| s.to_string());
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        wtr.write_record([
            m.icao24.clone(),
            opt(&m.registration),
            opt(&m.aircraft_type),
            opt(&m.manufacturer),
            opt(&m.model),
            opt(&m.airline),
            opt(&m.airline_iata),
            opt(&m.airline_icao),
            opt(&m.owner),
            opt(&m.operator),
            opt(&m.construction_number),
            opt(&m.first_flight),
            opt(&m.engines),
            seats.unwrap_or_default(),
            m.category.map(|c| c.as_str().to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(records.len())
}
