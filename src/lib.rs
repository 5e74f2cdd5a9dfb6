//! Airtrack - Aircraft Telemetry Aggregation
//!
//! Airtrack turns periodic snapshots of aircraft telemetry into continuous
//! per-aircraft trajectories, infers a coarse flight phase, enriches them with
//! static aircraft metadata, estimates routes from callsigns and keeps durable
//! flight sessions in `SQLite`.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): The pipeline stages and their orchestration
//! - **Adapters** (`adapters`): `SQLite` store, HTTP metadata source, CSV files
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//!
//! # Example
//!
//! ```ignore
//! use airtrack::{ConfigLoader, FeedPayload, FlightTracker};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::load()?;
//!     let tracker = FlightTracker::from_config(&config).await?;
//!     let payload: FeedPayload = serde_json::from_str(&std::fs::read_to_string("states.json")?)?;
//!     let report = tracker.run_cycle(&payload).await;
//!     println!("{} trajectories updated", report.update.applied);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    AircraftMetadata, AircraftState, BatchOutcome, Config, EnrichedState, FeedPayload,
    FlightPhase, Position, RouteEstimate, Session, Trajectory,
};
pub use domain::ports::{FlightStore, LookupOutcome, MetadataSource};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::logging::{LogConfig, LoggerImpl};
pub use services::{
    FlightTracker, MetadataCache, PersistenceSynchronizer, RouteEstimator, StateParser,
    SyncResult, TrajectoryAggregator,
};
