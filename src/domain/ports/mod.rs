//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - MetadataSource: external aircraft metadata lookups
//! - FlightStore: durable storage of metadata, sessions and positions
//!
//! These traits keep the pipeline services independent of reqwest and sqlx.

pub mod flight_store;
pub mod metadata_source;

pub use flight_store::{FlightStore, FlightStoreTx};
pub use metadata_source::{LookupOutcome, MetadataSource, RemoteAircraftRecord};
