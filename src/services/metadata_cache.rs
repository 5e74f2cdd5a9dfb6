//! Cache-aside metadata enrichment.
//!
//! Lookups hit an in-process map first. On a miss the cache may ask an
//! external [`MetadataSource`] once; whatever comes back (or a placeholder
//! when nothing does) is stored permanently, so every identifier costs at
//! most one external call for the lifetime of the cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::adapters::csv_metadata;
use crate::domain::models::{
    classify_model, AircraftCategory, AircraftMetadata, AircraftState, EnrichedState,
    MetadataConfig, RecordOrigin,
};
use crate::domain::ports::{LookupOutcome, MetadataSource, RemoteAircraftRecord};

/// Number of manufacturers reported by [`MetadataCache::stats`].
const TOP_MANUFACTURERS: usize = 10;

/// Snapshot of cache contents and counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub preloaded: u64,
    pub hits: u64,
    pub misses: u64,
    pub external_calls: u64,
    pub categories: BTreeMap<String, usize>,
    /// Most common manufacturers, descending by count.
    pub top_manufacturers: Vec<(String, usize)>,
}

/// Backing storage for cached records.
enum Storage {
    /// One entry per distinct identifier, never evicted.
    Unbounded(RwLock<HashMap<String, AircraftMetadata>>),
    /// Size-bounded; least-recently-used entries may be evicted.
    Bounded(Cache<String, AircraftMetadata>),
}

impl Storage {
    async fn get(&self, key: &str) -> Option<AircraftMetadata> {
        match self {
            Self::Unbounded(map) => map.read().await.get(key).cloned(),
            Self::Bounded(cache) => cache.get(key).await,
        }
    }

    /// Insert unless that would downgrade a resolved record to a placeholder.
    ///
    /// Returns the record left in the cache.
    async fn insert_unless_downgrade(&self, record: AircraftMetadata) -> AircraftMetadata {
        match self {
            Self::Unbounded(map) => {
                let mut map = map.write().await;
                match map.get(&record.icao24) {
                    Some(existing) if keeps_existing(existing, &record) => existing.clone(),
                    _ => {
                        map.insert(record.icao24.clone(), record.clone());
                        record
                    }
                }
            }
            Self::Bounded(cache) => {
                let key = record.icao24.clone();
                let fallback = record.clone();
                let result = cache
                    .entry(key)
                    .and_compute_with(|existing| {
                        let op = match existing {
                            Some(entry) if keeps_existing(entry.value(), &record) => Op::Nop,
                            _ => Op::Put(record),
                        };
                        std::future::ready(op)
                    })
                    .await;
                match result {
                    CompResult::Inserted(entry)
                    | CompResult::ReplacedWith(entry)
                    | CompResult::Unchanged(entry) => entry.into_value(),
                    CompResult::StillNone(_) | CompResult::Removed(_) => fallback,
                }
            }
        }
    }

    async fn overwrite(&self, record: AircraftMetadata) {
        match self {
            Self::Unbounded(map) => {
                map.write().await.insert(record.icao24.clone(), record);
            }
            Self::Bounded(cache) => cache.insert(record.icao24.clone(), record).await,
        }
    }

    async fn all(&self) -> Vec<AircraftMetadata> {
        match self {
            Self::Unbounded(map) => map.read().await.values().cloned().collect(),
            Self::Bounded(cache) => cache.iter().map(|(_, v)| v).collect(),
        }
    }

    async fn len(&self) -> usize {
        match self {
            Self::Unbounded(map) => map.read().await.len(),
            Self::Bounded(cache) => {
                cache.run_pending_tasks().await;
                usize::try_from(cache.entry_count()).unwrap_or(usize::MAX)
            }
        }
    }
}

fn keeps_existing(existing: &AircraftMetadata, incoming: &AircraftMetadata) -> bool {
    !existing.is_placeholder() && incoming.is_placeholder()
}

fn normalize(icao24: &str) -> String {
    icao24.trim().to_lowercase()
}

/// Build a classified record from an external lookup result.
fn from_remote(icao24: &str, remote: RemoteAircraftRecord) -> AircraftMetadata {
    let category = classify_model(remote.model.as_deref());
    AircraftMetadata {
        icao24: icao24.to_string(),
        registration: remote.registration,
        aircraft_type: remote.model.clone().or(remote.typecode),
        manufacturer: remote.manufacturer,
        model: remote.model,
        airline: remote.operator.clone(),
        airline_iata: remote.operator_iata,
        airline_icao: remote.operator_icao,
        owner: remote.owner,
        operator: remote.operator,
        construction_number: remote.serial_number,
        first_flight: None,
        engines: None,
        seats: None,
        category: Some(category),
        origin: RecordOrigin::External,
    }
}

/// Shared metadata cache with optional external fallback.
pub struct MetadataCache {
    storage: Storage,
    source: Option<Arc<dyn MetadataSource>>,
    max_concurrent_lookups: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    external_calls: AtomicU64,
    preloaded: AtomicU64,
}

impl MetadataCache {
    /// An unbounded cache without an external source.
    pub fn new() -> Self {
        Self::with_storage(Storage::Unbounded(RwLock::new(HashMap::new())), None, 1)
    }

    /// Build a cache from configuration.
    ///
    /// `source` is only consulted when a lookup explicitly asks for it.
    pub fn from_config(config: &MetadataConfig, source: Option<Arc<dyn MetadataSource>>) -> Self {
        let storage = match config.cache_capacity {
            Some(capacity) => Storage::Bounded(Cache::builder().max_capacity(capacity).build()),
            None => Storage::Unbounded(RwLock::new(HashMap::new())),
        };
        Self::with_storage(storage, source, config.max_concurrent_lookups)
    }

    fn with_storage(
        storage: Storage,
        source: Option<Arc<dyn MetadataSource>>,
        max_concurrent_lookups: usize,
    ) -> Self {
        Self {
            storage,
            source,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            external_calls: AtomicU64::new(0),
            preloaded: AtomicU64::new(0),
        }
    }

    /// Attach an external source to an existing cache.
    pub fn with_source(mut self, source: Arc<dyn MetadataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Resolve metadata for one identifier.
    ///
    /// Never fails: when no record can be resolved a placeholder is cached and
    /// returned, so repeated misses for the same identifier stay local.
    pub async fn get(&self, icao24: &str, use_external: bool) -> AircraftMetadata {
        let key = normalize(icao24);

        if let Some(found) = self.storage.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return found;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let record = match (&self.source, use_external) {
            (Some(source), true) => {
                self.external_calls.fetch_add(1, Ordering::Relaxed);
                match source.lookup(&key).await {
                    LookupOutcome::Found(remote) => {
                        tracing::debug!(icao24 = %key, "resolved metadata externally");
                        from_remote(&key, remote)
                    }
                    LookupOutcome::NotFound => {
                        tracing::debug!(icao24 = %key, "aircraft unknown to metadata source");
                        AircraftMetadata::placeholder(&key)
                    }
                    LookupOutcome::Failed(reason) => {
                        tracing::warn!(icao24 = %key, reason = %reason, "metadata lookup failed");
                        AircraftMetadata::placeholder(&key)
                    }
                }
            }
            _ => AircraftMetadata::placeholder(&key),
        };

        self.storage.insert_unless_downgrade(record).await
    }

    /// Attach resolved metadata to each state.
    ///
    /// Each distinct identifier is looked up once, with at most
    /// `max_concurrent_lookups` lookups in flight.
    pub async fn enrich(&self, states: Vec<AircraftState>, use_external: bool) -> Vec<EnrichedState> {
        let distinct: HashSet<String> = states.iter().map(|s| normalize(&s.icao24)).collect();

        let resolved: HashMap<String, AircraftMetadata> = stream::iter(distinct)
            .map(|id| async move {
                let metadata = self.get(&id, use_external).await;
                (id, metadata)
            })
            .buffer_unordered(self.max_concurrent_lookups)
            .collect()
            .await;

        let enriched: Vec<EnrichedState> = states
            .into_iter()
            .map(|state| {
                let metadata = resolved
                    .get(&normalize(&state.icao24))
                    .filter(|m| m.is_resolved())
                    .cloned();
                EnrichedState {
                    state,
                    metadata,
                    phase: None,
                    route: None,
                }
            })
            .collect();

        tracing::debug!(
            states = enriched.len(),
            distinct = resolved.len(),
            enriched = enriched.iter().filter(|e| e.metadata.is_some()).count(),
            "enriched states"
        );
        enriched
    }

    /// Insert records directly, overwriting existing entries.
    pub async fn preload(&self, rows: Vec<AircraftMetadata>) -> usize {
        let mut inserted = 0;
        for mut row in rows {
            row.icao24 = normalize(&row.icao24);
            if row.icao24.is_empty() {
                continue;
            }
            self.storage.overwrite(row).await;
            inserted += 1;
        }
        self.preloaded.fetch_add(inserted as u64, Ordering::Relaxed);
        tracing::info!(inserted, "preloaded aircraft metadata");
        inserted
    }

    /// Preload records from a CSV file.
    pub async fn preload_csv(&self, path: &Path) -> Result<usize> {
        let rows = csv_metadata::read_metadata_file(path)?;
        Ok(self.preload(rows).await)
    }

    /// Every cached record, sorted by identifier.
    pub async fn snapshot(&self) -> Vec<AircraftMetadata> {
        let mut records = self.storage.all().await;
        records.sort_by(|a, b| a.icao24.cmp(&b.icao24));
        records
    }

    /// Write every cached record to a CSV file.
    pub async fn export_csv(&self, path: &Path) -> Result<usize> {
        let records = self.snapshot().await;
        let written = csv_metadata::write_metadata_file(path, &records)?;
        tracing::info!(written, path = %path.display(), "exported metadata cache");
        Ok(written)
    }

    pub async fn len(&self) -> usize {
        self.storage.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        let records = self.storage.all().await;

        let mut categories: BTreeMap<String, usize> = BTreeMap::new();
        let mut manufacturers: HashMap<&str, usize> = HashMap::new();
        for record in &records {
            let category = record.category.unwrap_or(AircraftCategory::Unknown);
            *categories.entry(category.as_str().to_string()).or_insert(0) += 1;
            if let Some(m) = record.manufacturer.as_deref() {
                *manufacturers.entry(m).or_insert(0) += 1;
            }
        }

        let mut top_manufacturers: Vec<(String, usize)> = manufacturers
            .into_iter()
            .map(|(m, n)| (m.to_string(), n))
            .collect();
        top_manufacturers.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_manufacturers.truncate(TOP_MANUFACTURERS);

        CacheStats {
            entries: self.storage.len().await,
            preloaded: self.preloaded.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            external_calls: self.external_calls.load(Ordering::Relaxed),
            categories,
            top_manufacturers,
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
