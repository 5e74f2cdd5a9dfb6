use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Main configuration structure for airtrack
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Trajectory aggregation configuration
    #[serde(default)]
    pub aggregator: AggregatorConfig,

    /// Metadata enrichment configuration
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Persistence synchronizer configuration
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Route estimation configuration
    #[serde(default)]
    pub routes: RouteConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Whether to persist at all; disabled means memory-only aggregation
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `SQLite` database URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long an item waits for a pooled connection before failing
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_database_url() -> String {
    "sqlite:.airtrack/airtrack.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

const fn default_acquire_timeout_secs() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_database_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when absent
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Trajectory aggregation windows and phase policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AggregatorConfig {
    /// Maximum age of the last position for "active" listings
    #[serde(default = "default_active_window_minutes")]
    pub active_window_minutes: i64,

    /// Age after which a trajectory counts as inactive for eviction
    #[serde(default = "default_inactivity_window_minutes")]
    pub inactivity_window_minutes: i64,

    /// Age after which an inactive trajectory is dropped
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,

    /// Phase inference thresholds
    #[serde(default)]
    pub phase: PhasePolicy,
}

const fn default_active_window_minutes() -> i64 {
    30
}

const fn default_inactivity_window_minutes() -> i64 {
    60
}

const fn default_retention_hours() -> i64 {
    24
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            active_window_minutes: default_active_window_minutes(),
            inactivity_window_minutes: default_inactivity_window_minutes(),
            retention_hours: default_retention_hours(),
            phase: PhasePolicy::default(),
        }
    }
}

/// Heuristic flight-phase thresholds.
///
/// These are policy constants, not physics: a window of recent positions, an
/// altitude ceiling below which climbs and descents count as takeoff or
/// landing, and the minimum altitude change that counts as a trend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PhasePolicy {
    /// Number of most recent positions considered
    #[serde(default = "default_phase_window")]
    pub window: usize,

    /// Altitude (meters) separating low-level phases from airborne
    #[serde(default = "default_low_altitude_ceiling")]
    pub low_altitude_ceiling: f64,

    /// Minimum altitude change (meters) across the window to count as a trend
    #[serde(default = "default_climb_threshold")]
    pub climb_threshold: f64,
}

/// Default number of recent positions used for phase inference.
pub const DEFAULT_PHASE_WINDOW: usize = 5;
/// Default low-altitude ceiling in meters.
pub const DEFAULT_LOW_ALTITUDE_CEILING: f64 = 1000.0;
/// Default altitude trend threshold in meters.
pub const DEFAULT_CLIMB_THRESHOLD: f64 = 50.0;

const fn default_phase_window() -> usize {
    DEFAULT_PHASE_WINDOW
}

const fn default_low_altitude_ceiling() -> f64 {
    DEFAULT_LOW_ALTITUDE_CEILING
}

const fn default_climb_threshold() -> f64 {
    DEFAULT_CLIMB_THRESHOLD
}

impl Default for PhasePolicy {
    fn default() -> Self {
        Self {
            window: DEFAULT_PHASE_WINDOW,
            low_altitude_ceiling: DEFAULT_LOW_ALTITUDE_CEILING,
            climb_threshold: DEFAULT_CLIMB_THRESHOLD,
        }
    }
}

/// Metadata enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetadataConfig {
    /// Query the external metadata source on cache misses
    #[serde(default)]
    pub external_lookup: bool,

    /// Base URL of the metadata endpoint; the identifier is appended
    #[serde(default = "default_metadata_base_url")]
    pub base_url: String,

    /// Per-request timeout for external lookups
    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum external lookups in flight during one enrichment pass
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Bound the cache to this many entries; unbounded when absent
    #[serde(default)]
    pub cache_capacity: Option<u64>,

    /// CSV file to preload into the cache at startup
    #[serde(default)]
    pub preload_csv: Option<PathBuf>,
}

fn default_metadata_base_url() -> String {
    "https://opensky-network.org/api/metadata/aircraft/icao".to_string()
}

const fn default_lookup_timeout_secs() -> u64 {
    10
}

const fn default_max_concurrent_lookups() -> usize {
    4
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            external_lookup: false,
            base_url: default_metadata_base_url(),
            timeout_secs: default_lookup_timeout_secs(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            cache_capacity: None,
            preload_csv: None,
        }
    }
}

/// Persistence synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PersistenceConfig {
    /// Maximum gap between sightings that still continues a session
    #[serde(default = "default_continuity_window_hours")]
    pub continuity_window_hours: i64,

    /// Recompute session statistics after this many appended positions
    #[serde(default = "default_statistics_interval")]
    pub statistics_interval: u64,
}

const fn default_continuity_window_hours() -> i64 {
    4
}

const fn default_statistics_interval() -> u64 {
    10
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            continuity_window_hours: default_continuity_window_hours(),
            statistics_interval: default_statistics_interval(),
        }
    }
}

/// Route estimation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RouteConfig {
    /// Attach route estimates to enriched states
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// How long an estimate is reused before it is derived again
    #[serde(default = "default_route_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Maximum number of cached estimates
    #[serde(default = "default_route_cache_capacity")]
    pub cache_capacity: u64,
}

const fn default_route_cache_ttl_secs() -> u64 {
    3600
}

const fn default_route_cache_capacity() -> u64 {
    10_000
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_secs: default_route_cache_ttl_secs(),
            cache_capacity: default_route_cache_capacity(),
        }
    }
}
