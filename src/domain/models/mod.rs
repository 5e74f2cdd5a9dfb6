//! Domain models for aircraft telemetry, trajectories, metadata and sessions.

pub mod aircraft_state;
pub mod config;
pub mod metadata;
pub mod route;
pub mod session;
pub mod trajectory;

pub use aircraft_state::{AircraftState, FeedPayload, RawStateVector, STATE_VECTOR_ARITY};
pub use config::{
    AggregatorConfig, Config, DatabaseConfig, LoggingConfig, MetadataConfig, PersistenceConfig,
    PhasePolicy, RouteConfig,
};
pub use metadata::{classify_model, AircraftCategory, AircraftMetadata, RecordOrigin};
pub use route::{canonical_country, country_matches, RouteBasis, RouteEstimate};
pub use session::{BatchOutcome, EnrichedState, RecordCounts, Session};
pub use trajectory::{
    haversine_km, hours_span, minutes_span, window_start, FlightPhase, Position, Trajectory,
};
