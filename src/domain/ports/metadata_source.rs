//! External aircraft metadata source port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Raw record returned by an external metadata source, before classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteAircraftRecord {
    pub registration: Option<String>,
    pub model: Option<String>,
    pub typecode: Option<String>,
    pub manufacturer: Option<String>,
    pub owner: Option<String>,
    pub operator: Option<String>,
    pub operator_icao: Option<String>,
    pub operator_iata: Option<String>,
    pub serial_number: Option<String>,
}

/// Result of one external lookup.
///
/// Callers branch on the tag; nothing here is an error to propagate.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The source knows the aircraft.
    Found(RemoteAircraftRecord),
    /// The source explicitly does not know the aircraft.
    NotFound,
    /// Timeout, transport error, unexpected status or undecodable body.
    Failed(String),
}

/// Source of static aircraft metadata keyed by transponder address.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Look up one identifier. Implementations must bound the call in time.
    async fn lookup(&self, icao24: &str) -> LookupOutcome;
}
