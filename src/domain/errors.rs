//! Domain errors for the airtrack pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in the airtrack system.
///
/// Batch-level operations never surface these to their callers; they are
/// caught per item, logged, and folded into outcome counters.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Metadata not found for aircraft: {0}")]
    MetadataNotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("External lookup failed: {0}")]
    LookupFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DomainError::StoreUnavailable(err.to_string())
            }
            other => DomainError::DatabaseError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
