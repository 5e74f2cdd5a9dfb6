//! Domain layer for the airtrack pipeline
//!
//! This module contains core models, errors and port traits.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
