//! Adapters for external systems.
//!
//! - `sqlite`: the durable flight store (sqlx)
//! - `opensky`: the HTTP metadata source (reqwest)
//! - `csv_metadata`: tabular metadata import and export

pub mod csv_metadata;
pub mod opensky;
pub mod sqlite;
