//! Durable store port for metadata, sessions and positions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AircraftMetadata, FlightPhase, Position, RecordCounts, Session};

/// Repository interface for the durable flight store.
///
/// Writes go through a [`FlightStoreTx`] so one persisted item is one unit of
/// work on one pooled connection. Dropping a transaction without committing
/// rolls it back and returns the connection to the pool.
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Verify the store is reachable.
    async fn ping(&self) -> DomainResult<()>;

    /// Start a unit of work.
    async fn begin(&self) -> DomainResult<Box<dyn FlightStoreTx>>;

    /// Recompute session-level statistics from its stored positions.
    async fn recompute_session_statistics(&self, session_id: Uuid) -> DomainResult<()>;

    /// Load a session by ID.
    async fn get_session(&self, session_id: Uuid) -> DomainResult<Option<Session>>;

    /// All sessions of one aircraft, most recent first.
    async fn sessions_for(&self, icao24: &str) -> DomainResult<Vec<Session>>;

    /// Sessions seen at or after `since`, most recent first.
    async fn sessions_since(&self, since: DateTime<Utc>, limit: usize) -> DomainResult<Vec<Session>>;

    /// Load stored metadata for one aircraft.
    async fn get_metadata(&self, icao24: &str) -> DomainResult<Option<AircraftMetadata>>;

    /// Stored positions of a session in timestamp order.
    async fn positions_for(&self, session_id: Uuid) -> DomainResult<Vec<Position>>;

    /// Row counts per record type.
    async fn record_counts(&self) -> DomainResult<RecordCounts>;
}

/// One in-flight unit of work against the store.
#[async_trait]
pub trait FlightStoreTx: Send {
    /// Insert or replace the metadata row for an identifier.
    async fn upsert_metadata(&mut self, metadata: &AircraftMetadata) -> DomainResult<()>;

    /// Whether a metadata row exists for an identifier.
    async fn metadata_exists(&mut self, icao24: &str) -> DomainResult<bool>;

    /// Most recent session of an identifier whose `last_seen >= since`.
    async fn latest_session_since(
        &mut self,
        icao24: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Session>>;

    /// Insert a new session row.
    async fn insert_session(&mut self, session: &Session) -> DomainResult<()>;

    /// Append a position row to a session.
    async fn insert_position(&mut self, session_id: Uuid, position: &Position) -> DomainResult<()>;

    /// Advance `last_seen`, bump the position count and record the phase.
    async fn touch_session(
        &mut self,
        session_id: Uuid,
        seen_at: DateTime<Utc>,
        status: Option<FlightPhase>,
    ) -> DomainResult<()>;

    /// Make every write of this unit durable.
    async fn commit(self: Box<Self>) -> DomainResult<()>;
}
