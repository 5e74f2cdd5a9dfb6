//! Durable session synchronization.
//!
//! Maps enriched observations onto persisted sessions. A session continues as
//! long as sightings arrive within the continuity window; a longer gap starts
//! a new one. Every item is written in its own transaction so one bad item
//! never takes the rest of the batch with it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    hours_span, window_start, AircraftMetadata, BatchOutcome, EnrichedState, PersistenceConfig,
    Position, RecordCounts, Session,
};
use crate::domain::ports::FlightStore;

/// Result of handing a batch to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "outcome", rename_all = "snake_case")]
pub enum SyncResult {
    Synced(BatchOutcome),
    /// Persistence is off; nothing was attempted.
    Disabled,
}

/// Lifetime performance counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub enabled: bool,
    pub batches: u64,
    pub positions_written: u64,
    pub sessions_created: u64,
    pub item_errors: u64,
    pub statistics_runs: u64,
}

/// What one committed item changed.
struct ItemEffect {
    session_id: Uuid,
    new_session: bool,
    position_added: bool,
    metadata_updated: bool,
}

pub struct PersistenceSynchronizer {
    store: Arc<dyn FlightStore>,
    config: PersistenceConfig,
    /// Set once by `initialize`; `true` means the store was reachable.
    available: OnceCell<bool>,
    batches: AtomicU64,
    positions_written: AtomicU64,
    sessions_created: AtomicU64,
    item_errors: AtomicU64,
    statistics_runs: AtomicU64,
}

impl PersistenceSynchronizer {
    pub fn new(store: Arc<dyn FlightStore>, config: PersistenceConfig) -> Self {
        Self {
            store,
            config,
            available: OnceCell::new(),
            batches: AtomicU64::new(0),
            positions_written: AtomicU64::new(0),
            sessions_created: AtomicU64::new(0),
            item_errors: AtomicU64::new(0),
            statistics_runs: AtomicU64::new(0),
        }
    }

    /// Verify the store once.
    ///
    /// The first result sticks: after a failure persistence stays disabled for
    /// the lifetime of the synchronizer and later calls do not retry.
    pub async fn initialize(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                match self.store.ping().await {
                    Ok(()) => {
                        tracing::info!("flight store reachable, persistence enabled");
                        true
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "flight store unavailable, persistence disabled");
                        false
                    }
                }
            })
            .await
    }

    pub fn is_enabled(&self) -> bool {
        self.available.get().copied().unwrap_or(false)
    }

    /// Persist a batch item by item.
    ///
    /// Item failures are logged and counted in `errors`; they never abort the
    /// batch. A disabled or uninitialized synchronizer does nothing.
    pub async fn process_batch(&self, items: &[EnrichedState]) -> SyncResult {
        if !self.is_enabled() {
            return SyncResult::Disabled;
        }

        let mut outcome = BatchOutcome::default();
        for item in items {
            outcome.items_seen += 1;

            let effect = match self.persist_item(item).await {
                Ok(effect) => effect,
                Err(e) => {
                    outcome.errors += 1;
                    self.item_errors.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(icao24 = %item.state.icao24, error = %e, "failed to persist item");
                    continue;
                }
            };

            if effect.new_session {
                outcome.new_sessions += 1;
            }
            if effect.metadata_updated {
                outcome.metadata_updates += 1;
            }
            if effect.position_added {
                outcome.positions_added += 1;
                if self.config.statistics_interval > 0
                    && outcome.positions_added % self.config.statistics_interval == 0
                {
                    self.refresh_statistics(effect.session_id).await;
                }
            }
        }

        self.batches.fetch_add(1, Ordering::Relaxed);
        self.positions_written
            .fetch_add(outcome.positions_added, Ordering::Relaxed);
        self.sessions_created
            .fetch_add(outcome.new_sessions, Ordering::Relaxed);

        tracing::info!(
            items = outcome.items_seen,
            new_sessions = outcome.new_sessions,
            positions = outcome.positions_added,
            metadata = outcome.metadata_updates,
            errors = outcome.errors,
            "persisted batch"
        );
        SyncResult::Synced(outcome)
    }

    /// Write one item inside its own transaction.
    ///
    /// Any early return drops the transaction, which rolls it back and hands
    /// the connection back to the pool.
    async fn persist_item(&self, item: &EnrichedState) -> DomainResult<ItemEffect> {
        let state = &item.state;
        let now = state.timestamp;
        let mut tx = self.store.begin().await?;

        let mut metadata_updated = false;
        match item.metadata.as_ref().filter(|m| m.is_resolved()) {
            Some(metadata) => {
                tx.upsert_metadata(metadata).await?;
                metadata_updated = true;
            }
            None => {
                if !tx.metadata_exists(&state.icao24).await? {
                    tx.upsert_metadata(&AircraftMetadata::auto_created(&state.icao24))
                        .await?;
                }
            }
        }

        let since = window_start(now, hours_span(self.config.continuity_window_hours));
        let (session_id, new_session) = match tx.latest_session_since(&state.icao24, since).await? {
            Some(session) => (session.id, false),
            None => {
                let mut session = Session::open(state, now);
                if let Some(phase) = item.phase {
                    session.status = phase;
                }
                tx.insert_session(&session).await?;
                tracing::debug!(icao24 = %state.icao24, session_id = %session.id, "opened session");
                (session.id, true)
            }
        };

        let position_added = match Position::from_state(state) {
            Some(position) => {
                tx.insert_position(session_id, &position).await?;
                tx.touch_session(session_id, now, item.phase).await?;
                true
            }
            None => false,
        };

        tx.commit().await?;
        Ok(ItemEffect {
            session_id,
            new_session,
            position_added,
            metadata_updated,
        })
    }

    async fn refresh_statistics(&self, session_id: Uuid) {
        match self.store.recompute_session_statistics(session_id).await {
            Ok(()) => {
                self.statistics_runs.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "session statistics refresh failed");
            }
        }
    }

    fn ensure_enabled(&self) -> DomainResult<()> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(DomainError::StoreUnavailable(
                "persistence is disabled".to_string(),
            ))
        }
    }

    /// Sessions seen within the last `hours`, most recent first.
    pub async fn recent_sessions(&self, hours: i64, limit: usize) -> DomainResult<Vec<Session>> {
        self.recent_sessions_at(hours, limit, Utc::now()).await
    }

    pub async fn recent_sessions_at(
        &self,
        hours: i64,
        limit: usize,
        now: DateTime<Utc>,
    ) -> DomainResult<Vec<Session>> {
        self.ensure_enabled()?;
        self.store
            .sessions_since(window_start(now, hours_span(hours)), limit)
            .await
    }

    /// Every session of one aircraft, most recent first.
    pub async fn sessions_for(&self, icao24: &str) -> DomainResult<Vec<Session>> {
        self.ensure_enabled()?;
        self.store.sessions_for(&icao24.trim().to_lowercase()).await
    }

    pub async fn record_counts(&self) -> DomainResult<RecordCounts> {
        self.ensure_enabled()?;
        self.store.record_counts().await
    }

    pub fn stats(&self) -> SyncStats {
        SyncStats {
            enabled: self.is_enabled(),
            batches: self.batches.load(Ordering::Relaxed),
            positions_written: self.positions_written.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            item_errors: self.item_errors.load(Ordering::Relaxed),
            statistics_runs: self.statistics_runs.load(Ordering::Relaxed),
        }
    }
}
