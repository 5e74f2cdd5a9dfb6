//! Heuristic route estimation.
//!
//! The airline designator at the start of a callsign gives the airline, its
//! home country and hub, which stand in for the origin. Flights of foreign
//! airlines are assumed to be inbound to the home country; the home carrier's
//! destination is reported as `Various`. Without a known designator the
//! leading digit of the transponder address gives an origin country only.
//!
//! Estimates, including "no estimate", are cached for a configurable time.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;

use crate::domain::models::{
    country_matches, EnrichedState, RouteBasis, RouteConfig, RouteEstimate,
};

/// Country inbound foreign flights are assumed to head for.
const HOME_COUNTRY: &str = "Germany";

/// Destination reported for the home country's own airlines.
const VARIOUS: &str = "Various";

/// Airline designator, airline, home country, hub city.
const AIRLINES: &[(&str, &str, &str, &str)] = &[
    ("DLH", "Lufthansa", "Germany", "Frankfurt"),
    ("AFR", "Air France", "France", "Paris"),
    ("BAW", "British Airways", "United Kingdom", "London"),
    ("KLM", "KLM", "Netherlands", "Amsterdam"),
    ("SWR", "Swiss", "Switzerland", "Zürich"),
    ("AUA", "Austrian Airlines", "Austria", "Wien"),
    ("IBE", "Iberia", "Spain", "Madrid"),
    ("AZA", "Alitalia", "Italy", "Rom"),
    ("UAL", "United Airlines", "United States", "Chicago"),
    ("AAL", "American Airlines", "United States", "Dallas"),
    ("EZY", "EasyJet", "United Kingdom", "London"),
    ("RYR", "Ryanair", "Ireland", "Dublin"),
    ("CAM", "Camair-Co", "Cameroon", "Douala"),
    ("ADK", "Air Afrique", "Cameroon", "Yaoundé"),
    ("NGA", "Air Nigeria", "Nigeria", "Lagos"),
    ("ABC", "Arik Air", "Nigeria", "Lagos"),
    ("SAA", "South African Airways", "South Africa", "Johannesburg"),
    ("MNO", "Mango Airlines", "South Africa", "Johannesburg"),
    ("CUL", "Kulula.com", "South Africa", "Johannesburg"),
    ("FLY", "FlySafair", "South Africa", "Johannesburg"),
];

/// Leading transponder-address digit and origin country.
const TRANSPONDER_PREFIXES: &[(char, &str)] = &[
    ('3', "United States"),
    ('4', "Germany"),
    ('5', "Germany"),
    ('6', "Germany"),
    ('7', "Germany"),
];

/// Airline, country and hub for the callsign's designator.
pub fn airline_for_callsign(callsign: &str) -> Option<(&'static str, &'static str, &'static str)> {
    let callsign = callsign.trim();
    if callsign.chars().count() < 2 {
        return None;
    }
    let designator: String = callsign.chars().take(3).collect::<String>().to_uppercase();
    AIRLINES
        .iter()
        .find(|(code, ..)| *code == designator)
        .map(|(_, airline, country, hub)| (*airline, *country, *hub))
}

/// Origin country for a six-character transponder address.
pub fn country_for_icao24(icao24: &str) -> Option<&'static str> {
    let icao24 = icao24.trim();
    if icao24.chars().count() < 6 {
        return None;
    }
    let first = icao24.chars().next()?;
    TRANSPONDER_PREFIXES
        .iter()
        .find(|(digit, _)| *digit == first)
        .map(|(_, country)| *country)
}

/// Estimate a route without caching.
///
/// The callsign is tried first, then the transponder address.
pub fn estimate_route(icao24: &str, callsign: Option<&str>, now: DateTime<Utc>) -> Option<RouteEstimate> {
    let callsign = callsign.map(str::trim).filter(|c| !c.is_empty());

    if let Some((airline, country, hub)) = callsign.and_then(airline_for_callsign) {
        let destination = if country == HOME_COUNTRY { VARIOUS } else { HOME_COUNTRY };
        return Some(RouteEstimate {
            icao24: icao24.trim().to_lowercase(),
            callsign: callsign.map(str::to_string),
            airline: Some(airline.to_string()),
            origin_city: Some(hub.to_string()),
            origin_country: Some(country.to_string()),
            destination_country: Some(destination.to_string()),
            basis: RouteBasis::Callsign,
            estimated_at: now,
        });
    }

    country_for_icao24(icao24).map(|country| RouteEstimate {
        icao24: icao24.trim().to_lowercase(),
        callsign: callsign.map(str::to_string),
        airline: None,
        origin_city: None,
        origin_country: Some(country.to_string()),
        destination_country: None,
        basis: RouteBasis::TransponderPrefix,
        estimated_at: now,
    })
}

/// Cached route estimates keyed by transponder address and callsign.
pub struct RouteEstimator {
    cache: Cache<String, Option<RouteEstimate>>,
}

impl RouteEstimator {
    pub fn new() -> Self {
        Self::from_config(&RouteConfig::default())
    }

    pub fn from_config(config: &RouteConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();
        Self { cache }
    }

    /// Estimate, reusing a cached result until it expires.
    pub async fn estimate(&self, icao24: &str, callsign: Option<&str>) -> Option<RouteEstimate> {
        self.estimate_at(icao24, callsign, Utc::now()).await
    }

    /// As [`estimate`](Self::estimate), stamping fresh estimates with `now`.
    pub async fn estimate_at(
        &self,
        icao24: &str,
        callsign: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<RouteEstimate> {
        let key = format!(
            "{}_{}",
            icao24.trim().to_lowercase(),
            callsign.map(str::trim).unwrap_or_default().to_uppercase()
        );
        self.cache
            .get_with(key, async { estimate_route(icao24, callsign, now) })
            .await
    }

    async fn estimate_for(&self, item: &EnrichedState) -> Option<RouteEstimate> {
        self.estimate_at(
            &item.state.icao24,
            item.state.callsign.as_deref(),
            item.state.timestamp,
        )
        .await
    }

    /// Attach an estimate to every item. Returns how many got one.
    pub async fn annotate(&self, items: &mut [EnrichedState]) -> usize {
        let mut routed = 0;
        for item in items.iter_mut() {
            item.route = self.estimate_for(item).await;
            if item.route.is_some() {
                routed += 1;
            }
        }
        routed
    }

    /// Flights whose estimated destination matches `country`, with the estimate attached.
    pub async fn filter_by_destination(
        &self,
        flights: Vec<EnrichedState>,
        country: &str,
    ) -> Vec<EnrichedState> {
        self.filter_by(flights, country, |r| r.destination_country.as_deref())
            .await
    }

    /// Flights whose estimated origin matches `country`, with the estimate attached.
    pub async fn filter_by_origin(&self, flights: Vec<EnrichedState>, country: &str) -> Vec<EnrichedState> {
        self.filter_by(flights, country, |r| r.origin_country.as_deref())
            .await
    }

    async fn filter_by<F>(&self, flights: Vec<EnrichedState>, country: &str, field: F) -> Vec<EnrichedState>
    where
        F: Fn(&RouteEstimate) -> Option<&str>,
    {
        let mut kept = Vec::new();
        for mut flight in flights {
            let Some(route) = self.estimate_for(&flight).await else {
                continue;
            };
            if field(&route).is_some_and(|c| country_matches(c, country)) {
                flight.route = Some(route);
                kept.push(flight);
            }
        }
        kept
    }

    /// Distinct estimated destination countries, sorted.
    pub async fn available_destinations(&self, flights: &[EnrichedState]) -> Vec<String> {
        self.distinct(flights, |r| r.destination_country).await
    }

    /// Distinct estimated origin countries, sorted.
    pub async fn available_origins(&self, flights: &[EnrichedState]) -> Vec<String> {
        self.distinct(flights, |r| r.origin_country).await
    }

    async fn distinct<F>(&self, flights: &[EnrichedState], field: F) -> Vec<String>
    where
        F: Fn(RouteEstimate) -> Option<String>,
    {
        let mut countries = BTreeSet::new();
        for flight in flights {
            if let Some(country) = self.estimate_for(flight).await.and_then(&field) {
                countries.insert(country);
            }
        }
        countries.into_iter().collect()
    }

    /// Number of cached estimates, including cached misses.
    pub async fn cached(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

impl Default for RouteEstimator {
    fn default() -> Self {
        Self::new()
    }
}
