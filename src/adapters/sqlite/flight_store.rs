//! SQLite implementation of the FlightStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AircraftCategory, AircraftMetadata, FlightPhase, Position, RecordCounts, RecordOrigin, Session,
};
use crate::domain::ports::{FlightStore, FlightStoreTx};

use super::connection::verify_connection;
use super::{format_datetime, parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteFlightStore {
    pool: SqlitePool,
}

impl SqliteFlightStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl FlightStore for SqliteFlightStore {
    async fn ping(&self) -> DomainResult<()> {
        verify_connection(&self.pool)
            .await
            .map_err(|e| DomainError::StoreUnavailable(e.to_string()))
    }

    async fn begin(&self) -> DomainResult<Box<dyn FlightStoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteFlightStoreTx { tx }))
    }

    async fn recompute_session_statistics(&self, session_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE sessions SET
                position_count = (SELECT COUNT(*) FROM positions WHERE session_id = ?1),
                max_altitude = (SELECT MAX(altitude) FROM positions WHERE session_id = ?1),
                max_velocity = (SELECT MAX(velocity) FROM positions WHERE session_id = ?1)
            WHERE id = ?1"#,
        )
        .bind(session_id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SessionNotFound(session_id));
        }
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> DomainResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as("SELECT * FROM sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn sessions_for(&self, icao24: &str) -> DomainResult<Vec<Session>> {
        let rows: Vec<SessionRow> =
            sqlx::query_as("SELECT * FROM sessions WHERE icao24 = ? ORDER BY last_seen DESC")
                .bind(icao24)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn sessions_since(&self, since: DateTime<Utc>, limit: usize) -> DomainResult<Vec<Session>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE last_seen >= ? ORDER BY last_seen DESC LIMIT ?",
        )
        .bind(format_datetime(since))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn get_metadata(&self, icao24: &str) -> DomainResult<Option<AircraftMetadata>> {
        let row: Option<MetadataRow> =
            sqlx::query_as("SELECT * FROM aircraft_metadata WHERE icao24 = ?")
                .bind(icao24)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn positions_for(&self, session_id: Uuid) -> DomainResult<Vec<Position>> {
        let rows: Vec<PositionRow> = sqlx::query_as(
            "SELECT * FROM positions WHERE session_id = ? ORDER BY timestamp ASC, id ASC",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.try_into()).collect()
    }

    async fn record_counts(&self) -> DomainResult<RecordCounts> {
        let (metadata, sessions, positions): (i64, i64, i64) = sqlx::query_as(
            r#"SELECT
                (SELECT COUNT(*) FROM aircraft_metadata),
                (SELECT COUNT(*) FROM sessions),
                (SELECT COUNT(*) FROM positions)"#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(RecordCounts {
            metadata,
            sessions,
            positions,
        })
    }
}

/// One open SQLite transaction. Rolled back on drop unless committed.
pub struct SqliteFlightStoreTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl FlightStoreTx for SqliteFlightStoreTx {
    async fn upsert_metadata(&mut self, m: &AircraftMetadata) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO aircraft_metadata (
                icao24, registration, aircraft_type, manufacturer, model, airline,
                airline_iata, airline_icao, owner, operator, construction_number,
                first_flight, engines, seats, category, origin, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(icao24) DO UPDATE SET
                registration = excluded.registration,
                aircraft_type = excluded.aircraft_type,
                manufacturer = excluded.manufacturer,
                model = excluded.model,
                airline = excluded.airline,
                airline_iata = excluded.airline_iata,
                airline_icao = excluded.airline_icao,
                owner = excluded.owner,
                operator = excluded.operator,
                construction_number = excluded.construction_number,
                first_flight = excluded.first_flight,
                engines = excluded.engines,
                seats = excluded.seats,
                category = excluded.category,
                origin = excluded.origin,
                updated_at = excluded.updated_at"#,
        )
        .bind(&m.icao24)
        .bind(&m.registration)
        .bind(&m.aircraft_type)
        .bind(&m.manufacturer)
        .bind(&m.model)
        .bind(&m.airline)
        .bind(&m.airline_iata)
        .bind(&m.airline_icao)
        .bind(&m.owner)
        .bind(&m.operator)
        .bind(&m.construction_number)
        .bind(&m.first_flight)
        .bind(&m.engines)
        .bind(m.seats.map(i64::from))
        .bind(m.category.map(|c| c.as_str()))
        .bind(m.origin.as_str())
        .bind(format_datetime(Utc::now()))
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn metadata_exists(&mut self, icao24: &str) -> DomainResult<bool> {
        let found: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM aircraft_metadata WHERE icao24 = ?")
            .bind(icao24)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(found.is_some())
    }

    async fn latest_session_since(
        &mut self,
        icao24: &str,
        since: DateTime<Utc>,
    ) -> DomainResult<Option<Session>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT * FROM sessions WHERE icao24 = ? AND last_seen >= ? ORDER BY last_seen DESC LIMIT 1",
        )
        .bind(icao24)
        .bind(format_datetime(since))
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(|r| r.try_into()).transpose()
    }

    async fn insert_session(&mut self, s: &Session) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO sessions (
                id, icao24, callsign, origin_country, first_seen, last_seen,
                status, position_count, max_altitude, max_velocity
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(s.id.to_string())
        .bind(&s.icao24)
        .bind(&s.callsign)
        .bind(&s.origin_country)
        .bind(format_datetime(s.first_seen))
        .bind(format_datetime(s.last_seen))
        .bind(s.status.as_str())
        .bind(s.position_count)
        .bind(s.max_altitude)
        .bind(s.max_velocity)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_position(&mut self, session_id: Uuid, p: &Position) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO positions (
                session_id, timestamp, latitude, longitude, altitude, geo_altitude,
                velocity, true_track, vertical_rate, on_ground, spi
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session_id.to_string())
        .bind(format_datetime(p.timestamp))
        .bind(p.latitude)
        .bind(p.longitude)
        .bind(p.altitude)
        .bind(p.geo_altitude)
        .bind(p.velocity)
        .bind(p.true_track)
        .bind(p.vertical_rate)
        .bind(p.on_ground)
        .bind(p.spi)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn touch_session(
        &mut self,
        session_id: Uuid,
        seen_at: DateTime<Utc>,
        status: Option<FlightPhase>,
    ) -> DomainResult<()> {
        let result = sqlx::query(
            r#"UPDATE sessions SET
                last_seen = MAX(last_seen, ?),
                position_count = position_count + 1,
                status = COALESCE(?, status)
            WHERE id = ?"#,
        )
        .bind(format_datetime(seen_at))
        .bind(status.map(|s| s.as_str()))
        .bind(session_id.to_string())
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SessionNotFound(session_id));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> DomainResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    icao24: String,
    callsign: Option<String>,
    origin_country: Option<String>,
    first_seen: String,
    last_seen: String,
    status: String,
    position_count: i64,
    max_altitude: Option<f64>,
    max_velocity: Option<f64>,
}

impl TryFrom<SessionRow> for Session {
    type Error = DomainError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = FlightPhase::from_str(&row.status).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid session status: {}", row.status))
        })?;

        Ok(Session {
            id: parse_uuid(&row.id)?,
            icao24: row.icao24,
            callsign: row.callsign,
            origin_country: row.origin_country,
            first_seen: parse_datetime(&row.first_seen)?,
            last_seen: parse_datetime(&row.last_seen)?,
            status,
            position_count: row.position_count,
            max_altitude: row.max_altitude,
            max_velocity: row.max_velocity,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MetadataRow {
    icao24: String,
    registration: Option<String>,
    aircraft_type: Option<String>,
    manufacturer: Option<String>,
    model: Option<String>,
    airline: Option<String>,
    airline_iata: Option<String>,
    airline_icao: Option<String>,
    owner: Option<String>,
    operator: Option<String>,
    construction_number: Option<String>,
    first_flight: Option<String>,
    engines: Option<String>,
    seats: Option<i64>,
    category: Option<String>,
    origin: String,
}

impl TryFrom<MetadataRow> for AircraftMetadata {
    type Error = DomainError;

    fn try_from(row: MetadataRow) -> Result<Self, Self::Error> {
        let origin = RecordOrigin::from_str(&row.origin).ok_or_else(|| {
            DomainError::SerializationError(format!("Invalid record origin: {}", row.origin))
        })?;
        let seats = row
            .seats
            .map(u32::try_from)
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(AircraftMetadata {
            icao24: row.icao24,
            registration: row.registration,
            aircraft_type: row.aircraft_type,
            manufacturer: row.manufacturer,
            model: row.model,
            airline: row.airline,
            airline_iata: row.airline_iata,
            airline_icao: row.airline_icao,
            owner: row.owner,
            operator: row.operator,
            construction_number: row.construction_number,
            first_flight: row.first_flight,
            engines: row.engines,
            seats,
            category: row.category.as_deref().and_then(AircraftCategory::from_str),
            origin,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PositionRow {
    timestamp: String,
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
    geo_altitude: Option<f64>,
    velocity: Option<f64>,
    true_track: Option<f64>,
    vertical_rate: Option<f64>,
    on_ground: Option<bool>,
    spi: Option<bool>,
}

impl TryFrom<PositionRow> for Position {
    type Error = DomainError;

    fn try_from(row: PositionRow) -> Result<Self, Self::Error> {
        Ok(Position {
            timestamp: parse_datetime(&row.timestamp)?,
            latitude: row.latitude,
            longitude: row.longitude,
            altitude: row.altitude,
            geo_altitude: row.geo_altitude,
            velocity: row.velocity,
            true_track: row.true_track,
            vertical_rate: row.vertical_rate,
            on_ground: row.on_ground,
            spi: row.spi,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::AircraftState;
    use chrono::{Duration, TimeZone};

    async fn setup_store() -> SqliteFlightStore {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteFlightStore::new(pool)
    }

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    async fn open_session(store: &SqliteFlightStore, icao24: &str, minute: i64) -> Session {
        let session = Session::open(&AircraftState::new(icao24, at(minute)), at(minute));
        let mut tx = store.begin().await.unwrap();
        tx.upsert_metadata(&AircraftMetadata::auto_created(icao24)).await.unwrap();
        tx.insert_session(&session).await.unwrap();
        tx.commit().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_metadata_upsert_roundtrip() {
        let store = setup_store().await;
        let metadata = AircraftMetadata {
            registration: Some("D-AIZA".to_string()),
            seats: Some(180),
            category: Some(AircraftCategory::Commercial),
            origin: RecordOrigin::External,
            ..AircraftMetadata::placeholder("3c6444")
        };

        let mut tx = store.begin().await.unwrap();
        assert!(!tx.metadata_exists("3c6444").await.unwrap());
        tx.upsert_metadata(&AircraftMetadata::auto_created("3c6444")).await.unwrap();
        tx.upsert_metadata(&metadata).await.unwrap();
        assert!(tx.metadata_exists("3c6444").await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.get_metadata("3c6444").await.unwrap(), Some(metadata));
        assert_eq!(store.record_counts().await.unwrap().metadata, 1);
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let store = setup_store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.upsert_metadata(&AircraftMetadata::auto_created("abc")).await.unwrap();
        }
        assert!(store.get_metadata("abc").await.unwrap().is_none());
        // The connection went back to the single-connection pool.
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_session_requires_metadata_row() {
        let store = setup_store().await;
        let session = Session::open(&AircraftState::new("nometa", at(0)), at(0));

        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_session(&session).await.is_err());
    }

    #[tokio::test]
    async fn test_touch_and_latest_session_since() {
        let store = setup_store().await;
        let session = open_session(&store, "abc", 0).await;

        let position = Position::from_state(
            &AircraftState::new("abc", at(30)).with_position(50.0, 8.0).with_altitude(3000.0),
        )
        .unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_position(session.id, &position).await.unwrap();
        tx.touch_session(session.id, at(30), Some(FlightPhase::Airborne)).await.unwrap();
        // An older timestamp never moves last_seen backwards.
        tx.touch_session(session.id, at(10), None).await.unwrap();
        tx.commit().await.unwrap();

        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.last_seen, at(30));
        assert_eq!(stored.position_count, 2);
        assert_eq!(stored.status, FlightPhase::Airborne);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.latest_session_since("abc", at(31)).await.unwrap().is_none());
        let found = tx.latest_session_since("abc", at(30)).await.unwrap().unwrap();
        assert_eq!(found.id, session.id);
    }

    #[tokio::test]
    async fn test_recompute_session_statistics() {
        let store = setup_store().await;
        let session = open_session(&store, "abc", 0).await;

        let mut tx = store.begin().await.unwrap();
        for (minute, altitude, velocity) in [(1, 500.0, 80.0), (2, 1500.0, 120.0), (3, 900.0, 100.0)] {
            let state = AircraftState::new("abc", at(minute))
                .with_position(50.0, 8.0)
                .with_altitude(altitude)
                .with_velocity(velocity);
            tx.insert_position(session.id, &Position::from_state(&state).unwrap())
                .await
                .unwrap();
        }
        tx.commit().await.unwrap();

        store.recompute_session_statistics(session.id).await.unwrap();
        let stored = store.get_session(session.id).await.unwrap().unwrap();
        assert_eq!(stored.position_count, 3);
        assert_eq!(stored.max_altitude, Some(1500.0));
        assert_eq!(stored.max_velocity, Some(120.0));

        let positions = store.positions_for(session.id).await.unwrap();
        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].timestamp, at(1));

        assert!(matches!(
            store.recompute_session_statistics(Uuid::new_v4()).await,
            Err(DomainError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ping_fails_on_closed_pool() {
        let store = setup_store().await;
        store.pool().close().await;
        assert!(matches!(store.ping().await, Err(DomainError::StoreUnavailable(_))));
    }
}
