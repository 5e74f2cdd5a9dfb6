//! In-memory trajectory aggregation.
//!
//! Merges independent telemetry snapshots into one ordered [`Trajectory`] per
//! aircraft, re-infers the flight phase on every append and evicts
//! trajectories that have been silent beyond the retention window.
//!
//! Mutation takes `&mut self`; callers that share an aggregator wrap it in a
//! lock and serialize updates. Every time-dependent operation has an `_at`
//! variant taking an explicit `now` so behavior is reproducible in tests and
//! when replaying recorded data.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    hours_span, minutes_span, AggregatorConfig, AircraftState, FlightPhase, Position, Trajectory,
};
use crate::services::phase_inference::infer_phase;

/// What one `update` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// States handed to the update.
    pub received: usize,
    /// States appended to a trajectory.
    pub applied: usize,
    /// States without coordinates.
    pub skipped: usize,
    pub new_trajectories: usize,
    pub evicted: usize,
}

/// Aggregate view over the active trajectories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateStatistics {
    pub total_tracked: u64,
    pub active: usize,
    pub updates_processed: u64,
    pub phase_distribution: BTreeMap<FlightPhase, usize>,
    pub avg_duration_minutes: f64,
    pub max_duration_minutes: f64,
    pub avg_distance_km: f64,
    pub max_distance_km: f64,
}

/// Serializable view of one trajectory including its path.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryExport<'a> {
    pub icao24: &'a str,
    pub callsign: Option<&'a str>,
    pub origin_country: Option<&'a str>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub phase: FlightPhase,
    pub max_altitude: Option<f64>,
    pub min_altitude: Option<f64>,
    pub max_speed: Option<f64>,
    pub total_distance_km: f64,
    pub duration_minutes: f64,
    pub positions: &'a [Position],
}

impl<'a> From<&'a Trajectory> for TrajectoryExport<'a> {
    fn from(t: &'a Trajectory) -> Self {
        Self {
            icao24: t.icao24(),
            callsign: t.callsign(),
            origin_country: t.origin_country(),
            first_seen: t.first_seen(),
            last_seen: t.last_seen(),
            phase: t.phase(),
            max_altitude: t.max_altitude(),
            min_altitude: t.min_altitude(),
            max_speed: t.max_speed(),
            total_distance_km: t.total_distance_km(),
            duration_minutes: t.duration_minutes(),
            positions: t.positions(),
        }
    }
}

/// Full export document for the aggregator.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatorExport<'a> {
    pub export_timestamp: DateTime<Utc>,
    pub flight_count: usize,
    pub statistics: AggregateStatistics,
    pub flights: Vec<TrajectoryExport<'a>>,
}

/// Owner of every live trajectory, keyed by identifier.
#[derive(Debug)]
pub struct TrajectoryAggregator {
    trajectories: HashMap<String, Trajectory>,
    config: AggregatorConfig,
    total_updates: u64,
    total_tracked: u64,
}

impl TrajectoryAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            trajectories: HashMap::new(),
            config,
            total_updates: 0,
            total_tracked: 0,
        }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Merge a batch of states captured now.
    pub fn update(&mut self, states: &[AircraftState]) -> UpdateSummary {
        self.update_at(states, Utc::now())
    }

    /// Merge a batch of states, then evict relative to `now`.
    ///
    /// States without coordinates are counted as skipped and have no other
    /// effect. Each applied state appends exactly one position.
    pub fn update_at(&mut self, states: &[AircraftState], now: DateTime<Utc>) -> UpdateSummary {
        self.total_updates += 1;
        let policy = self.config.phase;
        let mut summary = UpdateSummary {
            received: states.len(),
            ..UpdateSummary::default()
        };

        for state in states {
            let Some(position) = Position::from_state(state) else {
                summary.skipped += 1;
                continue;
            };

            let trajectory = match self.trajectories.entry(state.icao24.clone()) {
                Entry::Occupied(entry) => {
                    let existing = entry.into_mut();
                    existing.append(state, position);
                    existing
                }
                Entry::Vacant(entry) => {
                    summary.new_trajectories += 1;
                    self.total_tracked += 1;
                    tracing::debug!(icao24 = %state.icao24, "tracking new aircraft");
                    entry.insert(Trajectory::new(state, position))
                }
            };

            let phase = infer_phase(
                trajectory.recent_positions(policy.window),
                trajectory.phase(),
                &policy,
            );
            if phase != trajectory.phase() {
                tracing::debug!(
                    icao24 = %state.icao24,
                    from = %trajectory.phase(),
                    to = %phase,
                    "flight phase changed"
                );
                trajectory.set_phase(phase);
            }
            summary.applied += 1;
        }

        summary.evicted = self.evict_stale_at(now);

        tracing::info!(
            received = summary.received,
            applied = summary.applied,
            new = summary.new_trajectories,
            evicted = summary.evicted,
            tracked = self.trajectories.len(),
            "aggregated telemetry batch"
        );
        summary
    }

    /// Drop trajectories that are inactive and older than the retention window.
    pub fn evict_stale_at(&mut self, now: DateTime<Utc>) -> usize {
        let inactivity = minutes_span(self.config.inactivity_window_minutes);
        let retention = hours_span(self.config.retention_hours);

        let before = self.trajectories.len();
        self.trajectories.retain(|_, t| {
            let age = t.age_at(now);
            !(age > inactivity && age > retention)
        });
        let evicted = before - self.trajectories.len();
        if evicted > 0 {
            tracing::debug!(evicted, "evicted stale trajectories");
        }
        evicted
    }

    pub fn get(&self, icao24: &str) -> Option<&Trajectory> {
        self.trajectories.get(icao24)
    }

    /// Trajectories tracked right now, active or not.
    pub fn len(&self) -> usize {
        self.trajectories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trajectories.is_empty()
    }

    pub fn active_trajectories(&self) -> Vec<&Trajectory> {
        self.active_trajectories_at(Utc::now())
    }

    /// Trajectories whose last position is within the active window.
    pub fn active_trajectories_at(&self, now: DateTime<Utc>) -> Vec<&Trajectory> {
        let window = minutes_span(self.config.active_window_minutes);
        self.trajectories
            .values()
            .filter(|t| t.is_active_at(now, window))
            .collect()
    }

    pub fn trajectories_by_phase(&self, phase: FlightPhase) -> Vec<&Trajectory> {
        self.trajectories_by_phase_at(phase, Utc::now())
    }

    /// Active trajectories currently in `phase`.
    pub fn trajectories_by_phase_at(&self, phase: FlightPhase, now: DateTime<Utc>) -> Vec<&Trajectory> {
        self.active_trajectories_at(now)
            .into_iter()
            .filter(|t| t.phase() == phase)
            .collect()
    }

    pub fn statistics(&self) -> AggregateStatistics {
        self.statistics_at(Utc::now())
    }

    /// Statistics over the active trajectories. Averages are zero when none are active.
    pub fn statistics_at(&self, now: DateTime<Utc>) -> AggregateStatistics {
        let active = self.active_trajectories_at(now);
        let mut stats = AggregateStatistics {
            total_tracked: self.total_tracked,
            active: active.len(),
            updates_processed: self.total_updates,
            ..AggregateStatistics::default()
        };
        if active.is_empty() {
            return stats;
        }

        for t in &active {
            *stats.phase_distribution.entry(t.phase()).or_insert(0) += 1;
        }

        let count = active.len() as f64;
        let durations = active.iter().map(|t| t.duration_minutes());
        let distances = active.iter().map(|t| t.total_distance_km());

        stats.avg_duration_minutes = durations.clone().sum::<f64>() / count;
        stats.max_duration_minutes = durations.fold(0.0, f64::max);
        stats.avg_distance_km = distances.clone().sum::<f64>() / count;
        stats.max_distance_km = distances.fold(0.0, f64::max);
        stats
    }

    /// Build the export document, sorted by identifier.
    pub fn export_at(&self, only_active: bool, now: DateTime<Utc>) -> AggregatorExport<'_> {
        let mut selected: Vec<&Trajectory> = if only_active {
            self.active_trajectories_at(now)
        } else {
            self.trajectories.values().collect()
        };
        selected.sort_by(|a, b| a.icao24().cmp(b.icao24()));

        AggregatorExport {
            export_timestamp: now,
            flight_count: selected.len(),
            statistics: self.statistics_at(now),
            flights: selected.into_iter().map(TrajectoryExport::from).collect(),
        }
    }

    /// Pretty-printed JSON export of trajectories with statistics and paths.
    pub fn export_json(&self, only_active: bool) -> DomainResult<String> {
        Ok(serde_json::to_string_pretty(&self.export_at(only_active, Utc::now()))?)
    }
}

impl Default for TrajectoryAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn state(icao24: &str, minute: i64, lat: f64, lon: f64) -> AircraftState {
        AircraftState::new(icao24, base() + Duration::minutes(minute)).with_position(lat, lon)
    }

    #[test]
    fn test_update_creates_and_appends() {
        let mut aggregator = TrajectoryAggregator::default();
        let summary = aggregator.update_at(
            &[
                state("aaa111", 0, 52.0, 13.0),
                state("bbb222", 0, 48.0, 2.0),
                AircraftState::new("ccc333", base()),
            ],
            base(),
        );

        assert_eq!(summary.received, 3);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.new_trajectories, 2);
        assert!(aggregator.get("ccc333").is_none());

        let summary = aggregator.update_at(&[state("aaa111", 1, 52.1, 13.1)], base() + Duration::minutes(1));
        assert_eq!(summary.new_trajectories, 0);
        assert_eq!(aggregator.get("aaa111").unwrap().positions().len(), 2);
        assert_eq!(aggregator.len(), 2);
    }

    #[test]
    fn test_distance_is_monotonic() {
        let mut aggregator = TrajectoryAggregator::default();
        let mut previous = 0.0;
        for minute in 0..10 {
            let lat = 50.0 + minute as f64 * 0.05;
            aggregator.update_at(&[state("abc", minute, lat, 8.0)], base() + Duration::minutes(minute));
            let distance = aggregator.get("abc").unwrap().total_distance_km();
            assert!(distance >= previous);
            previous = distance;
        }
        assert!(previous > 0.0);
    }

    #[test]
    fn test_phase_reinferred_on_update() {
        let mut aggregator = TrajectoryAggregator::default();
        for (minute, altitude) in [200.0, 300.0, 400.0, 500.0, 600.0].into_iter().enumerate() {
            let minute = minute as i64;
            let s = state("takeoff", minute, 50.0, 8.0)
                .with_altitude(altitude)
                .with_on_ground(false);
            aggregator.update_at(&[s], base() + Duration::minutes(minute));
        }

        assert_eq!(aggregator.get("takeoff").unwrap().phase(), FlightPhase::Takeoff);
        let now = base() + Duration::minutes(5);
        assert_eq!(aggregator.trajectories_by_phase_at(FlightPhase::Takeoff, now).len(), 1);
        assert!(aggregator.trajectories_by_phase_at(FlightPhase::Ground, now).is_empty());
    }

    #[test]
    fn test_eviction_requires_inactivity_and_retention() {
        let mut aggregator = TrajectoryAggregator::default();
        aggregator.update_at(&[state("old", 0, 50.0, 8.0)], base());

        // Inactive but inside retention.
        let evicted = aggregator.evict_stale_at(base() + Duration::hours(2));
        assert_eq!(evicted, 0);
        assert!(aggregator.get("old").is_some());

        let summary = aggregator.update_at(&[], base() + Duration::hours(25));
        assert_eq!(summary.evicted, 1);
        assert!(aggregator.get("old").is_none());
    }

    #[test]
    fn test_active_window() {
        let mut aggregator = TrajectoryAggregator::default();
        aggregator.update_at(&[state("recent", 0, 50.0, 8.0)], base());

        assert_eq!(aggregator.active_trajectories_at(base() + Duration::minutes(30)).len(), 1);
        assert!(aggregator.active_trajectories_at(base() + Duration::minutes(31)).is_empty());
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_unbounded_windows_keep_everything() {
        let mut aggregator = TrajectoryAggregator::new(AggregatorConfig {
            active_window_minutes: i64::MAX,
            inactivity_window_minutes: i64::MAX,
            retention_hours: 10_000_000_000,
            ..AggregatorConfig::default()
        });
        aggregator.update_at(&[state("keep", 0, 50.0, 8.0)], base());

        let much_later = base() + Duration::days(3_650);
        assert_eq!(aggregator.evict_stale_at(much_later), 0);
        assert_eq!(aggregator.active_trajectories_at(much_later).len(), 1);
    }

    #[test]
    fn test_statistics() {
        let mut aggregator = TrajectoryAggregator::default();
        let empty = aggregator.statistics_at(base());
        assert_eq!(empty.active, 0);
        assert!(empty.phase_distribution.is_empty());

        aggregator.update_at(&[state("a", 0, 50.0, 8.0), state("b", 0, 51.0, 9.0)], base());
        aggregator.update_at(&[state("a", 10, 50.1, 8.0)], base() + Duration::minutes(10));

        let stats = aggregator.statistics_at(base() + Duration::minutes(10));
        assert_eq!(stats.total_tracked, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.updates_processed, 2);
        assert_eq!(stats.phase_distribution.get(&FlightPhase::Unknown), Some(&2));
        assert!((stats.avg_duration_minutes - 5.0).abs() < 1e-9);
        assert!((stats.max_duration_minutes - 10.0).abs() < 1e-9);
        assert!(stats.max_distance_km > 10.0);
    }

    #[test]
    fn test_export_json_contains_positions() {
        let mut aggregator = TrajectoryAggregator::default();
        aggregator.update(&[AircraftState::new("abc", Utc::now()).with_position(50.0, 8.0)]);

        let json = aggregator.export_json(true).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["flight_count"], 1);
        assert_eq!(value["flights"][0]["icao24"], "abc");
        assert_eq!(value["flights"][0]["positions"].as_array().unwrap().len(), 1);
    }
}
