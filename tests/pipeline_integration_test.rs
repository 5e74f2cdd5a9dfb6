//! End-to-end cycles through parse, aggregate, enrich and persist.

mod common;

use std::sync::Arc;

use airtrack::{ConfigLoader, FlightPhase, FlightTracker, SyncResult};
use chrono::Duration;
use common::{base_time, file_db_config, payload, setup_test_logging, VectorBuilder};
use serde_json::json;

#[tokio::test]
async fn test_snapshot_with_malformed_vector() {
    setup_test_logging();
    let (_dir, config) = file_db_config();
    let tracker = FlightTracker::from_config(&config).await.unwrap();
    assert!(tracker.is_persisting());

    let snapshot = payload(
        vec![
            VectorBuilder::new("3C6444").position(50.03, 8.56).build(),
            VectorBuilder::new("3c6444 ").position(50.04, 8.57).build(),
            vec![json!("badbad"), json!("SHORT")],
        ],
        base_time(),
    );

    let report = tracker.run_cycle(&snapshot).await;
    assert_eq!(report.parsed, 2);
    assert_eq!(report.update.new_trajectories, 1);

    let SyncResult::Synced(outcome) = report.sync else {
        panic!("expected persisted batch, got {:?}", report.sync)
    };
    assert_eq!(outcome.items_seen, 2);
    assert_eq!(outcome.new_sessions, 1);
    assert_eq!(outcome.positions_added, 2);
    assert_eq!(outcome.errors, 0);

    {
        let aggregator = tracker.aggregator().await;
        assert_eq!(aggregator.len(), 1);
        let trajectory = aggregator.get("3c6444").unwrap();
        assert_eq!(trajectory.positions().len(), 2);
        assert_eq!(trajectory.callsign(), Some("KLM1023"));
    }

    let persistence = tracker.persistence().unwrap();
    let counts = persistence.record_counts().await.unwrap();
    assert_eq!(counts.sessions, 1);
    assert_eq!(counts.positions, 2);
    // Unknown aircraft still get a metadata row so sessions can reference it.
    assert_eq!(counts.metadata, 1);

    let stats = tracker.statistics().await;
    assert_eq!(stats.parser.processed, 2);
    assert_eq!(stats.parser.failed, 1);
    assert_eq!(stats.metadata.misses, 1);
}

#[tokio::test]
async fn test_short_located_and_unlocated_vectors() {
    let (_dir, config) = file_db_config();
    let tracker = FlightTracker::from_config(&config).await.unwrap();

    let snapshot = payload(
        vec![
            VectorBuilder::new("aa0001").build()[..10].to_vec(),
            VectorBuilder::new("aa0002").position(47.46, 8.55).build(),
            VectorBuilder::new("aa0003").no_position().build(),
        ],
        base_time(),
    );

    let report = tracker.run_cycle(&snapshot).await;
    assert_eq!(report.parsed, 2);
    assert_eq!(report.update.new_trajectories, 1);
    assert_eq!(report.update.applied, 1);
    assert_eq!(report.update.skipped, 1);

    let aggregator = tracker.aggregator().await;
    assert_eq!(aggregator.len(), 1);
    assert_eq!(aggregator.get("aa0002").unwrap().positions().len(), 1);
    assert!(aggregator.get("aa0003").is_none());
    drop(aggregator);

    assert_eq!(tracker.statistics().await.parser.failed, 1);

    // The unlocated state still opens a session, without a position row.
    let SyncResult::Synced(outcome) = report.sync else {
        panic!("expected persisted batch")
    };
    assert_eq!(outcome.new_sessions, 2);
    assert_eq!(outcome.positions_added, 1);
}

#[tokio::test]
async fn test_sessions_split_on_continuity_gap() {
    let (_dir, config) = file_db_config();
    let tracker = FlightTracker::from_config(&config).await.unwrap();

    let sighting = |at| payload(vec![VectorBuilder::new("a1b2c3").position(48.35, 11.78).build()], at);

    let first = tracker.run_cycle(&sighting(base_time())).await;
    let within = tracker.run_cycle(&sighting(base_time() + Duration::hours(3))).await;
    let after_gap = tracker
        .run_cycle(&sighting(base_time() + Duration::hours(8)))
        .await;

    let new_sessions = |sync: SyncResult| match sync {
        SyncResult::Synced(outcome) => outcome.new_sessions,
        SyncResult::Disabled => panic!("persistence should be enabled"),
    };
    assert_eq!(new_sessions(first.sync), 1);
    assert_eq!(new_sessions(within.sync), 0);
    assert_eq!(new_sessions(after_gap.sync), 1);

    let sessions = tracker
        .persistence()
        .unwrap()
        .sessions_for("A1B2C3")
        .await
        .unwrap();
    assert_eq!(sessions.len(), 2);
    let mut counts: Vec<i64> = sessions.iter().map(|s| s.position_count).collect();
    counts.sort_unstable();
    assert_eq!(counts, vec![1, 2]);
}

#[tokio::test]
async fn test_persisted_status_follows_phase() {
    let (_dir, config) = file_db_config();
    let tracker = FlightTracker::from_config(&config).await.unwrap();

    for (i, altitude) in [9_000.0, 9_100.0].into_iter().enumerate() {
        let at = base_time() + Duration::seconds(10 * i as i64);
        let vector = VectorBuilder::new("400a0b")
            .position(51.47, -0.45 + 0.01 * i as f64)
            .airborne(altitude, 230.0)
            .build();
        tracker.run_cycle(&payload(vec![vector], at)).await;
    }

    let aggregator = tracker.aggregator().await;
    assert_eq!(aggregator.get("400a0b").unwrap().phase(), FlightPhase::Airborne);
    drop(aggregator);

    let sessions = tracker
        .persistence()
        .unwrap()
        .sessions_for("400a0b")
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, FlightPhase::Airborne);
    assert_eq!(sessions[0].position_count, 2);
}

#[tokio::test]
async fn test_memory_only_from_yaml_config() {
    let dir = common::temp_dir();
    let path = dir.path().join("airtrack.yaml");
    std::fs::write(
        &path,
        "database:\n  enabled: false\naggregator:\n  phase:\n    window: 3\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert_eq!(config.aggregator.phase.window, 3);

    let tracker = FlightTracker::from_config(&config).await.unwrap();
    assert!(tracker.persistence().is_none());

    let report = tracker
        .run_cycle(&payload(
            vec![
                VectorBuilder::new("abcdef").position(40.64, -73.78).build(),
                VectorBuilder::new("fedcba").no_position().build(),
            ],
            base_time(),
        ))
        .await;
    assert_eq!(report.sync, SyncResult::Disabled);
    assert_eq!(report.update.applied, 1);
    assert_eq!(report.update.skipped, 1);
    assert_eq!(tracker.aggregator().await.len(), 1);
}

#[tokio::test]
async fn test_reads_interleave_with_cycles() {
    let (_dir, config) = file_db_config();
    let tracker = Arc::new(FlightTracker::from_config(&config).await.unwrap());

    let reader = {
        let tracker = Arc::clone(&tracker);
        tokio::spawn(async move {
            let mut observed = Vec::new();
            for _ in 0..20 {
                observed.push(tracker.aggregator().await.len());
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    for i in 0..5_i64 {
        let at = base_time() + Duration::seconds(10 * i);
        let vector = VectorBuilder::new(&format!("c0ffe{i}"))
            .position(35.55, 139.78)
            .build();
        tracker.run_cycle(&payload(vec![vector], at)).await;
    }

    let observed = reader.await.unwrap();
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(tracker.aggregator().await.len(), 5);
    let counts = tracker.persistence().unwrap().record_counts().await.unwrap();
    assert_eq!(counts.sessions, 5);
    assert_eq!(counts.positions, 5);
}

#[tokio::test]
async fn test_route_filters_over_latest_cycle() {
    let (_dir, config) = file_db_config();
    let tracker = FlightTracker::from_config(&config).await.unwrap();

    // The builder's default callsign is KLM1023.
    let report = tracker
        .run_cycle(&payload(
            vec![
                VectorBuilder::new("484506").position(52.31, 4.76).build(),
                VectorBuilder::new("3c6444").position(50.03, 8.56).build(),
            ],
            base_time(),
        ))
        .await;
    assert_eq!(report.routed, 2);

    let inbound = tracker.flights_by_destination("DE").await;
    assert_eq!(inbound.len(), 2);
    let route = inbound[0].route.as_ref().unwrap();
    assert_eq!(route.airline.as_deref(), Some("KLM"));
    assert_eq!(route.origin_city.as_deref(), Some("Amsterdam"));
    assert_eq!(route.estimated_at, base_time());

    assert_eq!(tracker.available_origins().await, vec!["Netherlands"]);
    assert!(tracker.flights_by_origin("France").await.is_empty());
}

#[tokio::test]
async fn test_routes_disabled_from_yaml_config() {
    let dir = common::temp_dir();
    let path = dir.path().join("airtrack.yaml");
    std::fs::write(&path, "database:\n  enabled: false\nroutes:\n  enabled: false\n").unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    assert!(!config.routes.enabled);
    assert_eq!(config.routes.cache_ttl_secs, 3600);

    let tracker = FlightTracker::from_config(&config).await.unwrap();
    let report = tracker
        .run_cycle(&payload(
            vec![VectorBuilder::new("484506").position(52.31, 4.76).build()],
            base_time(),
        ))
        .await;
    assert_eq!(report.routed, 0);
    assert!(tracker.available_destinations().await.is_empty());
}
