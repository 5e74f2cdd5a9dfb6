//! Raw telemetry vector parsing and validation.
//!
//! Turns positional feed vectors into typed [`AircraftState`] values. Only two
//! things are validated: arity and a non-empty identifier. Everything else is
//! passed through as an optional; a value of the wrong JSON type is treated as
//! absent rather than as malformed input.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::{AircraftState, FeedPayload, STATE_VECTOR_ARITY};

/// Field positions within a raw state vector.
mod field {
    pub const ICAO24: usize = 0;
    pub const CALLSIGN: usize = 1;
    pub const ORIGIN_COUNTRY: usize = 2;
    pub const TIME_POSITION: usize = 3;
    pub const LAST_CONTACT: usize = 4;
    pub const LONGITUDE: usize = 5;
    pub const LATITUDE: usize = 6;
    pub const BARO_ALTITUDE: usize = 7;
    pub const ON_GROUND: usize = 8;
    pub const VELOCITY: usize = 9;
    pub const TRUE_TRACK: usize = 10;
    pub const VERTICAL_RATE: usize = 11;
    pub const SENSORS: usize = 12;
    pub const GEO_ALTITUDE: usize = 13;
    pub const SQUAWK: usize = 14;
    pub const SPI: usize = 15;
    pub const POSITION_SOURCE: usize = 16;
}

/// Snapshot of parser counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserStats {
    pub processed: u64,
    pub failed: u64,
}

/// Stateless parsing with instance-owned counters.
#[derive(Debug, Default)]
pub struct StateParser {
    processed: AtomicU64,
    failed: AtomicU64,
}

impl StateParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse one raw vector captured at `timestamp`.
    ///
    /// Returns `None` and bumps the failure counter by exactly one when the
    /// vector is too short or has no usable identifier.
    pub fn parse(&self, vector: &[Value], timestamp: DateTime<Utc>) -> Option<AircraftState> {
        if vector.len() < STATE_VECTOR_ARITY {
            self.failed.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(arity = vector.len(), "dropping short state vector");
            return None;
        }

        let Some(icao24) = non_empty_str(&vector[field::ICAO24]).map(str::to_lowercase) else {
            self.failed.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("dropping state vector without identifier");
            return None;
        };

        let state = AircraftState {
            icao24,
            callsign: non_empty_str(&vector[field::CALLSIGN]).map(str::to_string),
            origin_country: non_empty_str(&vector[field::ORIGIN_COUNTRY]).map(str::to_string),
            time_position: as_epoch_seconds(&vector[field::TIME_POSITION]),
            last_contact: as_epoch_seconds(&vector[field::LAST_CONTACT]),
            longitude: vector[field::LONGITUDE].as_f64(),
            latitude: vector[field::LATITUDE].as_f64(),
            baro_altitude: vector[field::BARO_ALTITUDE].as_f64(),
            on_ground: vector[field::ON_GROUND].as_bool(),
            velocity: vector[field::VELOCITY].as_f64(),
            true_track: vector[field::TRUE_TRACK].as_f64(),
            vertical_rate: vector[field::VERTICAL_RATE].as_f64(),
            sensors: vector[field::SENSORS]
                .as_array()
                .map(|ids| ids.iter().filter_map(Value::as_i64).collect()),
            geo_altitude: vector[field::GEO_ALTITUDE].as_f64(),
            squawk: non_empty_str(&vector[field::SQUAWK]).map(str::to_string),
            spi: vector[field::SPI].as_bool(),
            position_source: vector[field::POSITION_SOURCE].as_i64(),
            timestamp,
        };

        self.processed.fetch_add(1, Ordering::Relaxed);
        Some(state)
    }

    /// Parse every vector of a feed snapshot, keeping only valid states.
    pub fn parse_payload(&self, payload: &FeedPayload) -> Vec<AircraftState> {
        let Some(vectors) = payload.states.as_ref() else {
            return Vec::new();
        };

        let states: Vec<AircraftState> = vectors
            .iter()
            .filter_map(|v| self.parse(v, payload.capture_time))
            .collect();

        tracing::debug!(
            received = vectors.len(),
            parsed = states.len(),
            dropped = vectors.len() - states.len(),
            "parsed feed payload"
        );
        states
    }

    pub fn stats(&self) -> ParserStats {
        ParserStats {
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

#[allow(clippy::cast_possible_truncation)]
fn as_epoch_seconds(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

/// Criteria for narrowing a parsed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateFilter {
    pub only_airborne: bool,
    pub only_with_position: bool,
    /// Case-insensitive substring of the origin country.
    pub country: Option<String>,
    /// Inclusive barometric altitude bounds in meters.
    pub min_altitude: Option<f64>,
    pub max_altitude: Option<f64>,
}

impl StateFilter {
    /// Whether a state satisfies every configured criterion.
    ///
    /// Altitude bounds exclude states without an altitude.
    pub fn matches(&self, state: &AircraftState) -> bool {
        if self.only_airborne && !state.is_airborne() {
            return false;
        }
        if self.only_with_position && !state.has_position() {
            return false;
        }
        if let Some(country) = &self.country {
            let needle = country.to_lowercase();
            let matches = state
                .origin_country
                .as_deref()
                .is_some_and(|c| c.to_lowercase().contains(&needle));
            if !matches {
                return false;
            }
        }
        if let Some(min) = self.min_altitude {
            if !state.baro_altitude.is_some_and(|a| a >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_altitude {
            if !state.baro_altitude.is_some_and(|a| a <= max) {
                return false;
            }
        }
        true
    }
}

/// Keep only the states matching `filter`.
pub fn filter_states(states: &[AircraftState], filter: &StateFilter) -> Vec<AircraftState> {
    states
        .iter()
        .filter(|s| filter.matches(s))
        .cloned()
        .collect()
}

/// Summary of one parsed snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStatistics {
    pub total: usize,
    pub airborne: usize,
    pub on_ground: usize,
    pub with_position: usize,
    /// Distinct origin countries, sorted.
    pub countries: Vec<String>,
    pub avg_altitude: Option<f64>,
    pub max_altitude: Option<f64>,
    pub min_altitude: Option<f64>,
}

pub fn snapshot_statistics(states: &[AircraftState]) -> SnapshotStatistics {
    let airborne = states.iter().filter(|s| s.is_airborne()).count();
    let countries: BTreeSet<&str> = states
        .iter()
        .filter_map(|s| s.origin_country.as_deref())
        .collect();
    let altitudes: Vec<f64> = states.iter().filter_map(|s| s.baro_altitude).collect();

    let avg_altitude = if altitudes.is_empty() {
        None
    } else {
        Some(altitudes.iter().sum::<f64>() / altitudes.len() as f64)
    };

    SnapshotStatistics {
        total: states.len(),
        airborne,
        on_ground: states.len() - airborne,
        with_position: states.iter().filter(|s| s.has_position()).count(),
        countries: countries.into_iter().map(str::to_string).collect(),
        avg_altitude,
        max_altitude: altitudes.iter().copied().reduce(f64::max),
        min_altitude: altitudes.iter().copied().reduce(f64::min),
    }
}
