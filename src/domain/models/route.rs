//! Estimated origin and destination of a flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an estimate was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteBasis {
    /// Airline designator at the start of the callsign.
    Callsign,
    /// Leading digit of the transponder address.
    TransponderPrefix,
}

/// Heuristic route of one aircraft.
///
/// Only the origin country is known for transponder-based estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEstimate {
    pub icao24: String,
    pub callsign: Option<String>,
    pub airline: Option<String>,
    pub origin_city: Option<String>,
    pub origin_country: Option<String>,
    pub destination_country: Option<String>,
    pub basis: RouteBasis,
    pub estimated_at: DateTime<Utc>,
}

/// Canonical country names and the codes and spellings accepted for them.
const COUNTRY_ALIASES: &[(&str, &[&str])] = &[
    ("Germany", &["DE", "DEU", "Deutschland"]),
    ("United States", &["US", "USA"]),
    ("France", &["FR", "FRA", "Frankreich"]),
    ("United Kingdom", &["GB", "GBR", "UK", "England"]),
    ("Spain", &["ES", "ESP", "Spanien"]),
    ("Italy", &["IT", "ITA", "Italien"]),
    ("Netherlands", &["NL", "NLD", "Niederlande"]),
    ("Switzerland", &["CH", "CHE", "Schweiz"]),
    ("Austria", &["AT", "AUT", "Österreich"]),
    ("Cameroon", &["CM", "CMR", "Kamerun"]),
    ("Nigeria", &["NG", "NGA"]),
    ("South Africa", &["ZA", "ZAF", "Südafrika"]),
    ("Kenya", &["KE", "KEN", "Kenia"]),
    ("Ethiopia", &["ET", "ETH", "Äthiopien"]),
    ("Ghana", &["GH", "GHA"]),
    ("Morocco", &["MA", "MAR", "Marokko"]),
    ("Egypt", &["EG", "EGY", "Ägypten"]),
];

/// Canonical name for a country name, code or alias.
pub fn canonical_country(name: &str) -> Option<&'static str> {
    let name = name.trim().to_lowercase();
    COUNTRY_ALIASES
        .iter()
        .find(|(canonical, aliases)| {
            canonical.to_lowercase() == name || aliases.iter().any(|a| a.to_lowercase() == name)
        })
        .map(|(canonical, _)| *canonical)
}

/// Whether two country designations refer to the same country.
///
/// Names match case-insensitively, or when both resolve to the same
/// canonical country. Empty names never match.
pub fn country_matches(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.to_lowercase() == b.to_lowercase() {
        return true;
    }
    matches!((canonical_country(a), canonical_country(b)), (Some(x), Some(y)) if x == y)
}
