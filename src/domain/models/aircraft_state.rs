//! Telemetry observations as they arrive from the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of positions a raw state vector must carry to be parseable.
pub const STATE_VECTOR_ARITY: usize = 17;

/// One raw telemetry vector, positionally encoded.
///
/// Field order: identifier, callsign, origin country, time_position,
/// last_contact, longitude, latitude, baro_altitude, on_ground, velocity,
/// true_track, vertical_rate, sensors, geo_altitude, squawk, spi,
/// position_source.
pub type RawStateVector = Vec<serde_json::Value>;

/// A feed snapshot: every vector captured in one retrieval cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPayload {
    /// Raw vectors; the upstream feed reports `null` when nothing is visible.
    #[serde(default)]
    pub states: Option<Vec<RawStateVector>>,

    /// When the snapshot was captured.
    pub capture_time: DateTime<Utc>,
}

impl FeedPayload {
    pub fn new(states: Vec<RawStateVector>, capture_time: DateTime<Utc>) -> Self {
        Self {
            states: Some(states),
            capture_time,
        }
    }

    pub fn len(&self) -> usize {
        self.states.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One typed telemetry observation for a single aircraft.
///
/// Every field except `icao24` and `timestamp` may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftState {
    /// Normalized (trimmed, lowercase) transponder address.
    pub icao24: String,
    pub callsign: Option<String>,
    pub origin_country: Option<String>,
    /// Unix seconds of the last position update.
    pub time_position: Option<i64>,
    /// Unix seconds of the last message of any kind.
    pub last_contact: Option<i64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    /// Barometric altitude in meters.
    pub baro_altitude: Option<f64>,
    pub on_ground: Option<bool>,
    /// Ground speed in m/s.
    pub velocity: Option<f64>,
    /// Track angle in degrees clockwise from north.
    pub true_track: Option<f64>,
    /// Vertical rate in m/s.
    pub vertical_rate: Option<f64>,
    pub sensors: Option<Vec<i64>>,
    /// Geometric altitude in meters.
    pub geo_altitude: Option<f64>,
    pub squawk: Option<String>,
    pub spi: Option<bool>,
    pub position_source: Option<i64>,
    /// Capture timestamp of the snapshot this state came from.
    pub timestamp: DateTime<Utc>,
}

impl AircraftState {
    /// A state carrying only an identifier, useful as a builder seed.
    pub fn new(icao24: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            icao24: icao24.into(),
            callsign: None,
            origin_country: None,
            time_position: None,
            last_contact: None,
            longitude: None,
            latitude: None,
            baro_altitude: None,
            on_ground: None,
            velocity: None,
            true_track: None,
            vertical_rate: None,
            sensors: None,
            geo_altitude: None,
            squawk: None,
            spi: None,
            position_source: None,
            timestamp,
        }
    }

    /// Attach coordinates.
    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Attach a barometric altitude in meters.
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.baro_altitude = Some(altitude);
        self
    }

    /// Attach the ground flag.
    pub fn with_on_ground(mut self, on_ground: bool) -> Self {
        self.on_ground = Some(on_ground);
        self
    }

    /// Attach a ground speed in m/s.
    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }

    /// Both coordinates are present.
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    /// Not flagged as on the ground. An absent flag counts as airborne.
    pub fn is_airborne(&self) -> bool {
        !self.on_ground.unwrap_or(false)
    }

    pub fn speed_kmh(&self) -> Option<f64> {
        self.velocity.map(|v| v * 3.6)
    }

    pub fn altitude_feet(&self) -> Option<f64> {
        self.baro_altitude.map(|a| a * 3.280_84)
    }
}
