//! Per-cycle orchestration of the tracking pipeline.
//!
//! One cycle takes a feed snapshot through parse, aggregate, enrich and
//! persist. The aggregator is the single writer of trajectory state and sits
//! behind an async `RwLock`, so readers interleave between cycles. The last
//! cycle's enriched states are kept for route queries.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::adapters::opensky::OpenSkyMetadataClient;
use crate::adapters::sqlite::{initialize_database, SqliteFlightStore};
use crate::domain::errors::DomainResult;
use crate::domain::models::{AircraftMetadata, Config, EnrichedState, FeedPayload, FlightPhase};
use crate::domain::ports::MetadataSource;
use crate::services::metadata_cache::{CacheStats, MetadataCache};
use crate::services::persistence_sync::{PersistenceSynchronizer, SyncResult, SyncStats};
use crate::services::route_estimation::RouteEstimator;
use crate::services::state_parser::{ParserStats, StateParser};
use crate::services::trajectory_aggregator::{
    AggregateStatistics, AggregatorExport, TrajectoryAggregator, UpdateSummary,
};

/// What one cycle did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub capture_time: DateTime<Utc>,
    /// Valid states parsed from the snapshot.
    pub parsed: usize,
    pub update: UpdateSummary,
    /// States that carried resolved metadata after enrichment.
    pub enriched: usize,
    /// States that received a route estimate.
    pub routed: usize,
    pub sync: SyncResult,
}

/// Combined counters of every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerStatistics {
    pub parser: ParserStats,
    pub aggregator: AggregateStatistics,
    pub metadata: CacheStats,
    /// Absent when running memory-only.
    pub persistence: Option<SyncStats>,
}

#[derive(Serialize)]
struct StateExport<'a> {
    aircraft_metadata: Vec<AircraftMetadata>,
    trajectories: AggregatorExport<'a>,
}

pub struct FlightTracker {
    parser: StateParser,
    aggregator: RwLock<TrajectoryAggregator>,
    metadata: Arc<MetadataCache>,
    persistence: Option<PersistenceSynchronizer>,
    routes: Option<RouteEstimator>,
    latest: RwLock<Vec<EnrichedState>>,
    use_external: bool,
}

impl FlightTracker {
    /// Assemble a tracker from already-built parts.
    ///
    /// `persistence` should already be initialized; an uninitialized
    /// synchronizer reports every batch as disabled. Route estimation uses
    /// default settings; see [`with_routes`](Self::with_routes).
    pub fn new(
        aggregator: TrajectoryAggregator,
        metadata: Arc<MetadataCache>,
        persistence: Option<PersistenceSynchronizer>,
        use_external: bool,
    ) -> Self {
        Self {
            parser: StateParser::new(),
            aggregator: RwLock::new(aggregator),
            metadata,
            persistence,
            routes: Some(RouteEstimator::new()),
            latest: RwLock::new(Vec::new()),
            use_external,
        }
    }

    /// Replace the route estimator; `None` turns estimation off.
    pub fn with_routes(mut self, routes: Option<RouteEstimator>) -> Self {
        self.routes = routes;
        self
    }

    /// Build the whole pipeline from configuration.
    ///
    /// A database that cannot be opened or migrated leaves the tracker
    /// memory-only. A preload file that cannot be read is logged and skipped.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source = if config.metadata.external_lookup {
            let client = OpenSkyMetadataClient::from_config(&config.metadata)
                .context("Failed to build metadata client")?;
            Some(Arc::new(client) as Arc<dyn MetadataSource>)
        } else {
            None
        };

        let metadata = Arc::new(MetadataCache::from_config(&config.metadata, source));
        if let Some(ref path) = config.metadata.preload_csv {
            if let Err(e) = metadata.preload_csv(path).await {
                tracing::warn!(path = %path.display(), error = %e, "metadata preload skipped");
            }
        }

        let persistence = if config.database.enabled {
            match initialize_database(&config.database).await {
                Ok(pool) => {
                    let store = Arc::new(SqliteFlightStore::new(pool));
                    let sync = PersistenceSynchronizer::new(store, config.persistence.clone());
                    sync.initialize().await;
                    Some(sync)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "database unavailable, running memory-only");
                    None
                }
            }
        } else {
            tracing::info!("persistence disabled by configuration");
            None
        };

        let routes = config
            .routes
            .enabled
            .then(|| RouteEstimator::from_config(&config.routes));

        Ok(Self::new(
            TrajectoryAggregator::new(config.aggregator.clone()),
            metadata,
            persistence,
            config.metadata.external_lookup,
        )
        .with_routes(routes))
    }

    /// Run one snapshot through the pipeline.
    ///
    /// The snapshot's capture time is "now" for eviction and session continuity.
    pub async fn run_cycle(&self, payload: &FeedPayload) -> CycleReport {
        let states = self.parser.parse_payload(payload);
        let parsed = states.len();

        let (update, phases) = {
            let mut aggregator = self.aggregator.write().await;
            let update = aggregator.update_at(&states, payload.capture_time);
            let phases: HashMap<String, FlightPhase> = states
                .iter()
                .filter_map(|s| aggregator.get(&s.icao24).map(|t| (s.icao24.clone(), t.phase())))
                .collect();
            (update, phases)
        };

        let mut enriched = self.metadata.enrich(states, self.use_external).await;
        for item in &mut enriched {
            item.phase = phases.get(&item.state.icao24).copied();
        }
        let enriched_count = enriched.iter().filter(|e| e.metadata.is_some()).count();
        let routed = match self.routes {
            Some(ref routes) => routes.annotate(&mut enriched).await,
            None => 0,
        };

        let sync = match self.persistence {
            Some(ref persistence) => persistence.process_batch(&enriched).await,
            None => SyncResult::Disabled,
        };

        tracing::info!(
            capture_time = %payload.capture_time,
            parsed,
            applied = update.applied,
            new_trajectories = update.new_trajectories,
            evicted = update.evicted,
            enriched = enriched_count,
            routed,
            persisted = matches!(sync, SyncResult::Synced(_)),
            "cycle complete"
        );

        *self.latest.write().await = enriched;

        CycleReport {
            capture_time: payload.capture_time,
            parsed,
            update,
            enriched: enriched_count,
            routed,
            sync,
        }
    }

    /// Read access to the aggregator between cycles.
    pub async fn aggregator(&self) -> RwLockReadGuard<'_, TrajectoryAggregator> {
        self.aggregator.read().await
    }

    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// The synchronizer, when the tracker was built with one.
    pub fn persistence(&self) -> Option<&PersistenceSynchronizer> {
        self.persistence.as_ref()
    }

    pub fn is_persisting(&self) -> bool {
        self.persistence.as_ref().is_some_and(PersistenceSynchronizer::is_enabled)
    }

    /// Enriched states of the most recent cycle.
    pub async fn latest_flights(&self) -> Vec<EnrichedState> {
        self.latest.read().await.clone()
    }

    /// Latest flights estimated to be heading for `country`.
    ///
    /// Empty when route estimation is off.
    pub async fn flights_by_destination(&self, country: &str) -> Vec<EnrichedState> {
        match self.routes {
            Some(ref routes) => routes.filter_by_destination(self.latest_flights().await, country).await,
            None => Vec::new(),
        }
    }

    /// Latest flights estimated to come from `country`.
    pub async fn flights_by_origin(&self, country: &str) -> Vec<EnrichedState> {
        match self.routes {
            Some(ref routes) => routes.filter_by_origin(self.latest_flights().await, country).await,
            None => Vec::new(),
        }
    }

    /// Destination countries among the latest flights, sorted.
    pub async fn available_destinations(&self) -> Vec<String> {
        match self.routes {
            Some(ref routes) => routes.available_destinations(&self.latest.read().await).await,
            None => Vec::new(),
        }
    }

    /// Origin countries among the latest flights, sorted.
    pub async fn available_origins(&self) -> Vec<String> {
        match self.routes {
            Some(ref routes) => routes.available_origins(&self.latest.read().await).await,
            None => Vec::new(),
        }
    }

    pub async fn statistics(&self) -> TrackerStatistics {
        let aggregator = self.aggregator.read().await.statistics();
        TrackerStatistics {
            parser: self.parser.stats(),
            aggregator,
            metadata: self.metadata.stats().await,
            persistence: self.persistence.as_ref().map(PersistenceSynchronizer::stats),
        }
    }

    /// Pretty-printed JSON of the metadata cache and all trajectories.
    pub async fn export_state_json(&self) -> DomainResult<String> {
        let aircraft_metadata = self.metadata.snapshot().await;
        let aggregator = self.aggregator.read().await;
        let export = StateExport {
            aircraft_metadata,
            trajectories: aggregator.export_at(false, Utc::now()),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DatabaseConfig, RawStateVector};
    use chrono::Duration;
    use serde_json::{json, Value};

    fn vector(icao24: &str, lat: Value, altitude: f64, on_ground: bool) -> RawStateVector {
        vec![
            json!(icao24),
            json!("SAS123 "),
            json!("Sweden"),
            json!(1_714_564_800),
            json!(1_714_564_801),
            json!(18.07),
            lat,
            json!(altitude),
            json!(on_ground),
            json!(120.0),
            json!(90.0),
            json!(0.0),
            Value::Null,
            json!(altitude + 20.0),
            json!("1000"),
            json!(false),
            json!(0),
        ]
    }

    fn memory_only() -> FlightTracker {
        FlightTracker::new(
            TrajectoryAggregator::default(),
            Arc::new(MetadataCache::new()),
            None,
            false,
        )
    }

    #[tokio::test]
    async fn test_memory_only_cycle() {
        let tracker = memory_only();
        let now = Utc::now();
        let payload = FeedPayload::new(
            vec![
                vector("4AB123", json!(59.3), 0.0, true),
                vector("4ab123", json!(59.31), 0.0, true),
                vector("", json!(59.3), 0.0, true),
                vector("4cd456", Value::Null, 3000.0, false),
            ],
            now,
        );

        let report = tracker.run_cycle(&payload).await;
        assert_eq!(report.parsed, 3);
        assert_eq!(report.update.applied, 2);
        assert_eq!(report.update.skipped, 1);
        assert_eq!(report.update.new_trajectories, 1);
        assert_eq!(report.enriched, 0);
        assert_eq!(report.sync, SyncResult::Disabled);

        let aggregator = tracker.aggregator().await;
        let trajectory = aggregator.get("4ab123").unwrap();
        assert_eq!(trajectory.positions().len(), 2);
        assert_eq!(trajectory.phase(), FlightPhase::Ground);
        drop(aggregator);

        let stats = tracker.statistics().await;
        assert_eq!(stats.parser.processed, 3);
        assert_eq!(stats.parser.failed, 1);
        assert_eq!(stats.aggregator.active, 1);
        assert!(stats.persistence.is_none());
        assert!(!tracker.is_persisting());
    }

    #[tokio::test]
    async fn test_preloaded_metadata_enriches_cycle() {
        let tracker = memory_only();
        let mut record = AircraftMetadata::placeholder("4ab123");
        record.registration = Some("SE-ROA".to_string());
        record.origin = crate::domain::models::RecordOrigin::Preload;
        tracker.metadata().preload(vec![record]).await;

        let payload = FeedPayload::new(vec![vector("4ab123", json!(59.3), 0.0, true)], Utc::now());
        let report = tracker.run_cycle(&payload).await;
        assert_eq!(report.enriched, 1);
    }

    #[tokio::test]
    async fn test_export_state_json() {
        let tracker = memory_only();
        let start = Utc::now() - Duration::minutes(2);
        for (i, altitude) in [0.0, 200.0].into_iter().enumerate() {
            let at = start + Duration::seconds(10 * i as i64);
            let payload = FeedPayload::new(vec![vector("abc999", json!(59.3), altitude, false)], at);
            tracker.run_cycle(&payload).await;
        }

        let json: Value = serde_json::from_str(&tracker.export_state_json().await.unwrap()).unwrap();
        assert_eq!(json["trajectories"]["flight_count"], 1);
        assert_eq!(json["trajectories"]["flights"][0]["positions"].as_array().unwrap().len(), 2);
        assert_eq!(json["aircraft_metadata"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_route_queries_follow_latest_cycle() {
        let tracker = memory_only();
        let mut lufthansa = vector("3c6444", json!(50.03), 0.0, true);
        lufthansa[1] = json!("DLH400  ");
        let mut swiss = vector("4b1805", json!(47.45), 0.0, true);
        swiss[1] = json!("SWR8");

        let report = tracker
            .run_cycle(&FeedPayload::new(vec![lufthansa, swiss], Utc::now()))
            .await;
        assert_eq!(report.parsed, 2);
        assert_eq!(report.routed, 2);
        assert!(tracker.latest_flights().await.iter().all(|f| f.route.is_some()));

        let inbound = tracker.flights_by_destination("Deutschland").await;
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].state.icao24, "4b1805");
        assert_eq!(tracker.flights_by_origin("CH").await.len(), 1);
        assert_eq!(tracker.available_destinations().await, vec!["Germany", "Various"]);
        assert_eq!(tracker.available_origins().await, vec!["Germany", "Switzerland"]);

        // "SAS123" has no known designator and 'a' no known prefix.
        let report = tracker
            .run_cycle(&FeedPayload::new(vec![vector("abc777", json!(59.3), 0.0, true)], Utc::now()))
            .await;
        assert_eq!(report.routed, 0);
        assert!(tracker.available_origins().await.is_empty());
    }

    #[tokio::test]
    async fn test_routes_disabled() {
        let tracker = memory_only().with_routes(None);
        let mut swiss = vector("4b1805", json!(47.45), 0.0, true);
        swiss[1] = json!("SWR8");

        let report = tracker.run_cycle(&FeedPayload::new(vec![swiss], Utc::now())).await;
        assert_eq!(report.routed, 0);
        assert!(tracker.latest_flights().await[0].route.is_none());
        assert!(tracker.flights_by_origin("Switzerland").await.is_empty());
        assert!(tracker.available_destinations().await.is_empty());
    }

    #[tokio::test]
    async fn test_from_config_without_database() {
        let mut config = Config::default();
        config.database.enabled = false;

        let tracker = FlightTracker::from_config(&config).await.unwrap();
        assert!(tracker.persistence().is_none());

        let payload = FeedPayload::new(vec![vector("abc001", json!(59.3), 0.0, true)], Utc::now());
        assert_eq!(tracker.run_cycle(&payload).await.sync, SyncResult::Disabled);
    }

    #[tokio::test]
    async fn test_from_config_with_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database: DatabaseConfig {
                url: format!("sqlite:{}", dir.path().join("airtrack.db").display()),
                ..DatabaseConfig::default()
            },
            ..Config::default()
        };

        let tracker = FlightTracker::from_config(&config).await.unwrap();
        assert!(tracker.is_persisting());

        let payload = FeedPayload::new(vec![vector("abc002", json!(59.3), 0.0, true)], Utc::now());
        let SyncResult::Synced(outcome) = tracker.run_cycle(&payload).await.sync else {
            panic!("expected a persisted batch")
        };
        assert_eq!(outcome.new_sessions, 1);
        assert_eq!(outcome.positions_added, 1);

        let sessions = tracker.persistence().unwrap().sessions_for("ABC002").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, FlightPhase::Ground);
    }

    #[tokio::test]
    async fn test_unopenable_database_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut config = Config::default();
        config.database.url = format!("sqlite:{}", blocker.join("airtrack.db").display());

        let tracker = FlightTracker::from_config(&config).await.unwrap();
        assert!(tracker.persistence().is_none());
        let payload = FeedPayload::new(vec![vector("abc003", json!(59.3), 0.0, true)], Utc::now());
        assert_eq!(tracker.run_cycle(&payload).await.update.applied, 1);
    }
}
