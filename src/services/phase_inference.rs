//! Coarse flight-phase heuristic.
//!
//! A pure function of the most recent positions and the previous phase, kept
//! apart from the aggregator so it can be exercised without any state.

use crate::domain::models::{FlightPhase, PhasePolicy, Position};

/// Infer the phase from the last `policy.window` positions.
///
/// Rules, first match wins:
/// 1. At least half of the window is flagged on the ground: `Ground`.
/// 2. With two or more known altitudes in the window, compare the last one to
///    the first. Below the ceiling, a rise beyond the threshold is `Takeoff`
///    and a drop beyond it is `Landing`. At or above the ceiling the aircraft
///    is `Airborne`.
/// 3. Otherwise the previous phase is kept.
pub fn infer_phase(recent: &[Position], current: FlightPhase, policy: &PhasePolicy) -> FlightPhase {
    let start = recent.len().saturating_sub(policy.window);
    let window = &recent[start..];
    if window.is_empty() {
        return current;
    }

    let grounded = window.iter().filter(|p| p.on_ground == Some(true)).count();
    if grounded * 2 >= window.len() {
        return FlightPhase::Ground;
    }

    let altitudes: Vec<f64> = window.iter().filter_map(|p| p.altitude).collect();
    let (Some(first), Some(last)) = (altitudes.first(), altitudes.last()) else {
        return current;
    };
    if altitudes.len() < 2 {
        return current;
    }

    let delta = last - first;
    if *last < policy.low_altitude_ceiling {
        if delta > policy.climb_threshold {
            FlightPhase::Takeoff
        } else if delta < -policy.climb_threshold {
            FlightPhase::Landing
        } else {
            current
        }
    } else {
        FlightPhase::Airborne
    }
}
