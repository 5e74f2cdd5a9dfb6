//! Common test utilities for integration tests
//!
//! Shared fixtures for feed payloads, databases and metadata sources.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use airtrack::domain::models::{DatabaseConfig, RawStateVector};
use airtrack::domain::ports::{LookupOutcome, MetadataSource, RemoteAircraftRecord};
use airtrack::{Config, FeedPayload};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Create a temporary directory for test isolation
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// A `SQLite` database file in a temporary directory.
pub fn temp_db_path() -> (TempDir, PathBuf) {
    let dir = temp_dir();
    let db_path = dir.path().join("airtrack.db");
    (dir, db_path)
}

/// Configuration persisting to a fresh file database, external lookups off.
pub fn file_db_config() -> (TempDir, Config) {
    let (dir, path) = temp_db_path();
    let config = Config {
        database: DatabaseConfig {
            url: format!("sqlite:{}", path.display()),
            ..DatabaseConfig::default()
        },
        ..Config::default()
    };
    (dir, config)
}

/// Setup test logging
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fixed reference instant for deterministic timelines.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

/// Builder for raw 17-field state vectors.
#[derive(Debug, Clone)]
pub struct VectorBuilder {
    fields: Vec<Value>,
}

impl VectorBuilder {
    pub fn new(icao24: &str) -> Self {
        Self {
            fields: vec![
                json!(icao24),
                json!("KLM1023 "),
                json!("Kingdom of the Netherlands"),
                json!(1_717_228_800),
                json!(1_717_228_800),
                json!(4.76),
                json!(52.31),
                json!(0.0),
                json!(true),
                json!(0.0),
                json!(270.0),
                json!(0.0),
                Value::Null,
                json!(0.0),
                json!("2000"),
                json!(false),
                json!(0),
            ],
        }
    }

    pub fn position(mut self, lat: f64, lon: f64) -> Self {
        self.fields[5] = json!(lon);
        self.fields[6] = json!(lat);
        self
    }

    pub fn no_position(mut self) -> Self {
        self.fields[5] = Value::Null;
        self.fields[6] = Value::Null;
        self
    }

    pub fn airborne(mut self, altitude: f64, velocity: f64) -> Self {
        self.fields[7] = json!(altitude);
        self.fields[8] = json!(false);
        self.fields[9] = json!(velocity);
        self
    }

    pub fn build(self) -> RawStateVector {
        self.fields
    }
}

pub fn payload(vectors: Vec<RawStateVector>, at: DateTime<Utc>) -> FeedPayload {
    FeedPayload::new(vectors, at)
}

/// In-memory metadata source that counts lookups.
#[derive(Default)]
pub struct CountingSource {
    records: HashMap<String, RemoteAircraftRecord>,
    calls: AtomicUsize,
}

impl CountingSource {
    pub fn with_record(mut self, icao24: &str, record: RemoteAircraftRecord) -> Self {
        self.records.insert(icao24.to_string(), record);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for CountingSource {
    async fn lookup(&self, icao24: &str) -> LookupOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(icao24)
            .cloned()
            .map_or(LookupOutcome::NotFound, LookupOutcome::Found)
    }
}
