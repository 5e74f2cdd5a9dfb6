//! OpenSky Network metadata adapter.

pub mod client;
pub mod models;

pub use client::OpenSkyMetadataClient;
pub use models::OpenSkyAircraftRecord;
