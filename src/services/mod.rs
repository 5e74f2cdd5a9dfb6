//! Pipeline services
//!
//! Each stage of the tracking pipeline, leaves first:
//! - `state_parser`: raw vectors to typed states
//! - `metadata_cache`: cache-aside aircraft metadata
//! - `phase_inference` / `trajectory_aggregator`: in-memory trajectories
//! - `persistence_sync`: durable sessions and positions
//! - `route_estimation`: heuristic origin and destination
//! - `flight_tracker`: per-cycle orchestration

pub mod flight_tracker;
pub mod metadata_cache;
pub mod persistence_sync;
pub mod phase_inference;
pub mod route_estimation;
pub mod state_parser;
pub mod trajectory_aggregator;

pub use flight_tracker::{CycleReport, FlightTracker, TrackerStatistics};
pub use metadata_cache::{CacheStats, MetadataCache};
pub use persistence_sync::{PersistenceSynchronizer, SyncResult, SyncStats};
pub use phase_inference::infer_phase;
pub use route_estimation::{estimate_route, RouteEstimator};
pub use state_parser::{
    filter_states, snapshot_statistics, ParserStats, SnapshotStatistics, StateFilter, StateParser,
};
pub use trajectory_aggregator::{AggregateStatistics, TrajectoryAggregator, UpdateSummary};
