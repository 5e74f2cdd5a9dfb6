//! Reconstructed per-aircraft trajectories.
//!
//! A [`Trajectory`] is an append-only, chronologically ordered series of
//! [`Position`]s for one identifier, carrying running statistics that are
//! updated incrementally on every append.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::aircraft_state::AircraftState;

/// Mean Earth radius used for great-circle distances, in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Coarse flight-state classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightPhase {
    #[default]
    Unknown,
    Ground,
    Takeoff,
    Airborne,
    Landing,
}

impl FlightPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Ground => "ground",
            Self::Takeoff => "takeoff",
            Self::Airborne => "airborne",
            Self::Landing => "landing",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unknown" => Some(Self::Unknown),
            "ground" => Some(Self::Ground),
            "takeoff" => Some(Self::Takeoff),
            "airborne" => Some(Self::Airborne),
            "landing" => Some(Self::Landing),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single observed point of a trajectory. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Barometric altitude in meters.
    pub altitude: Option<f64>,
    pub geo_altitude: Option<f64>,
    pub velocity: Option<f64>,
    pub true_track: Option<f64>,
    pub vertical_rate: Option<f64>,
    pub on_ground: Option<bool>,
    pub spi: Option<bool>,
}

impl Position {
    /// Derive a position from a state. `None` when coordinates are missing.
    pub fn from_state(state: &AircraftState) -> Option<Self> {
        let (latitude, longitude) = (state.latitude?, state.longitude?);
        Some(Self {
            timestamp: state.timestamp,
            latitude,
            longitude,
            altitude: state.baro_altitude,
            geo_altitude: state.geo_altitude,
            velocity: state.velocity,
            true_track: state.true_track,
            vertical_rate: state.vertical_rate,
            on_ground: state.on_ground,
            spi: state.spi,
        })
    }

    /// Great-circle distance to another position in kilometers.
    pub fn distance_km(&self, other: &Position) -> f64 {
        haversine_km(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance between two coordinates in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Span of `minutes`, saturating at the largest representable duration.
pub fn minutes_span(minutes: i64) -> Duration {
    Duration::try_minutes(minutes).unwrap_or(if minutes < 0 { Duration::MIN } else { Duration::MAX })
}

/// Span of `hours`, saturating at the largest representable duration.
pub fn hours_span(hours: i64) -> Duration {
    Duration::try_hours(hours).unwrap_or(if hours < 0 { Duration::MIN } else { Duration::MAX })
}

/// Start of the window of length `span` ending at `now`.
///
/// Never earlier than the Unix epoch, the earliest instant any feed reports.
pub fn window_start(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    now.checked_sub_signed(span)
        .map_or(DateTime::UNIX_EPOCH, |start| start.max(DateTime::UNIX_EPOCH))
}

/// Ordered trajectory of one aircraft, owned by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    icao24: String,
    callsign: Option<String>,
    origin_country: Option<String>,
    positions: Vec<Position>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    phase: FlightPhase,
    max_altitude: Option<f64>,
    min_altitude: Option<f64>,
    max_speed: Option<f64>,
    total_distance_km: f64,
}

impl Trajectory {
    /// Start a trajectory from its first observation.
    pub(crate) fn new(state: &AircraftState, position: Position) -> Self {
        let mut trajectory = Self {
            icao24: state.icao24.clone(),
            callsign: None,
            origin_country: None,
            positions: Vec::new(),
            first_seen: position.timestamp,
            last_seen: position.timestamp,
            phase: FlightPhase::Unknown,
            max_altitude: None,
            min_altitude: None,
            max_speed: None,
            total_distance_km: 0.0,
        };
        trajectory.append(state, position);
        trajectory
    }

    /// Append a position and fold it into the running statistics.
    ///
    /// Phase is not touched here; the aggregator re-infers it afterwards.
    pub(crate) fn append(&mut self, state: &AircraftState, position: Position) {
        if self.callsign.is_none() {
            self.callsign.clone_from(&state.callsign);
        }
        if self.origin_country.is_none() {
            self.origin_country.clone_from(&state.origin_country);
        }

        if let Some(previous) = self.positions.last() {
            self.total_distance_km += previous.distance_km(&position);
        }

        if let Some(altitude) = position.altitude {
            self.max_altitude = Some(self.max_altitude.map_or(altitude, |m| m.max(altitude)));
            self.min_altitude = Some(self.min_altitude.map_or(altitude, |m| m.min(altitude)));
        }
        if let Some(velocity) = position.velocity {
            self.max_speed = Some(self.max_speed.map_or(velocity, |m| m.max(velocity)));
        }

        self.last_seen = position.timestamp;
        self.positions.push(position);
    }

    pub(crate) fn set_phase(&mut self, phase: FlightPhase) {
        self.phase = phase;
    }

    pub fn icao24(&self) -> &str {
        &self.icao24
    }

    pub fn callsign(&self) -> Option<&str> {
        self.callsign.as_deref()
    }

    pub fn origin_country(&self) -> Option<&str> {
        self.origin_country.as_deref()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// The most recent `window` positions (fewer if the trajectory is shorter).
    pub fn recent_positions(&self, window: usize) -> &[Position] {
        let start = self.positions.len().saturating_sub(window);
        &self.positions[start..]
    }

    pub fn first_seen(&self) -> DateTime<Utc> {
        self.first_seen
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn max_altitude(&self) -> Option<f64> {
        self.max_altitude
    }

    pub fn min_altitude(&self) -> Option<f64> {
        self.min_altitude
    }

    pub fn max_speed(&self) -> Option<f64> {
        self.max_speed
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    pub fn duration_minutes(&self) -> f64 {
        (self.last_seen - self.first_seen).num_milliseconds() as f64 / 60_000.0
    }

    /// The path as `(latitude, longitude)` pairs in observation order.
    pub fn flight_path(&self) -> Vec<(f64, f64)> {
        self.positions
            .iter()
            .map(|p| (p.latitude, p.longitude))
            .collect()
    }

    /// Time elapsed since the last observation.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_seen
    }

    /// Last observation is no older than `max_age`.
    pub fn is_active_at(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age_at(now) <= max_age
    }
}
