//! Durable sessions and the records exchanged with the persistence layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aircraft_state::AircraftState;
use super::metadata::AircraftMetadata;
use super::route::RouteEstimate;
use super::trajectory::FlightPhase;

/// Durable counterpart of a trajectory, partitioned by continuity gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Latest known flight phase.
    pub status: FlightPhase,
    pub position_count: i64,
    pub max_altitude: Option<f64>,
    pub max_velocity: Option<f64>,
}

impl Session {
    /// Open a session whose first and last sighting are both `now`.
    pub fn open(state: &AircraftState, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            icao24: state.icao24.clone(),
            callsign: state.callsign.clone(),
            origin_country: state.origin_country.clone(),
            first_seen: now,
            last_seen: now,
            status: FlightPhase::Unknown,
            position_count: 0,
            max_altitude: None,
            max_velocity: None,
        }
    }
}

/// A parsed state after enrichment, ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedState {
    pub state: AircraftState,
    /// Present only when the lookup produced descriptive fields.
    pub metadata: Option<AircraftMetadata>,
    /// Phase of the aircraft's in-memory trajectory, when it has one.
    pub phase: Option<FlightPhase>,
    /// Estimated route, when one could be derived.
    #[serde(default)]
    pub route: Option<RouteEstimate>,
}

impl EnrichedState {
    pub fn bare(state: AircraftState) -> Self {
        Self {
            state,
            metadata: None,
            phase: None,
            route: None,
        }
    }
}

/// Aggregate counters for one persisted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub items_seen: u64,
    pub new_sessions: u64,
    pub positions_added: u64,
    pub metadata_updates: u64,
    pub errors: u64,
}

/// Row counts of the durable store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordCounts {
    pub metadata: i64,
    pub sessions: i64,
    pub positions: i64,
}
