//! The per-segment speed model.
//!
//! Blends a base emergency-run speed with the congestion bucket, a
//! ramp-up at the start of the route, a ramp-down on the final approach,
//! a slowdown near signal waypoints and bounded random jitter.

use crate::traffic::CongestionLevel;
use rand::Rng;

/// Base speed of an emergency run in km/h.
const BASE_SPEED_KMH: f64 = 55.0;

/// Share of the route over which the vehicle accelerates to full speed.
const RAMP_UP_SHARE: f64 = 0.15;

/// Share of the route over which the vehicle slows for arrival.
const RAMP_DOWN_SHARE: f64 = 0.10;

/// Speed multiplier applied near a signal waypoint.
const SIGNAL_SLOWDOWN: f64 = 0.7;

/// Hard lower bound on the modelled speed, in km/h.
pub const MIN_SPEED_KMH: f64 = 25.0;

/// Hard upper bound on the modelled speed, in km/h.
pub const MAX_SPEED_KMH: f64 = 90.0;

/// Computes the travel speed for the leg starting at `index` of a route
/// with `total_points` points, in km/h. Clamped to
/// [[`MIN_SPEED_KMH`], [`MAX_SPEED_KMH`]].
pub fn segment_speed_kmh(
    index: usize,
    total_points: usize,
    congestion: CongestionLevel,
    near_signal: bool,
    rng: &mut impl Rng,
) -> f64 {
    let index = index as f64;
    let total = total_points as f64;
    let mut speed = BASE_SPEED_KMH * congestion_multiplier(congestion);

    // Pulling away from the scene.
    if index < total * RAMP_UP_SHARE {
        speed *= 0.6 + (index / (total * RAMP_UP_SHARE)) * 0.4;
    }

    // Final approach to the destination.
    if index > total * (1.0 - RAMP_DOWN_SHARE) {
        let remaining = (total - index) / (total * RAMP_DOWN_SHARE);
        speed *= 0.4 + remaining * 0.6;
    }

    if near_signal {
        speed *= SIGNAL_SLOWDOWN;
    }

    // +/- 10% jitter.
    speed *= 0.9 + rng.gen::<f64>() * 0.2;

    speed.clamp(MIN_SPEED_KMH, MAX_SPEED_KMH)
}

fn congestion_multiplier(congestion: CongestionLevel) -> f64 {
    match congestion {
        CongestionLevel::Low => 1.2,
        CongestionLevel::Medium => 0.9,
        // The animator treats critical traffic the same as heavy traffic.
        CongestionLevel::High | CongestionLevel::Critical => 0.7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::mock::StepRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// A rng whose `gen::<f64>()` is always 0.0, pinning the jitter at 0.9.
    fn flat_rng() -> StepRng {
        StepRng::new(0, 0)
    }

    #[test]
    fn cruise_speed_mid_route() {
        let speed = segment_speed_kmh(50, 100, CongestionLevel::Medium, false, &mut flat_rng());
        assert_approx_eq!(speed, 55.0 * 0.9 * 0.9, 1e-9);
    }

    #[test]
    fn ramp_up_slows_the_first_steps() {
        let start = segment_speed_kmh(0, 100, CongestionLevel::Medium, false, &mut flat_rng());
        assert_approx_eq!(start, 55.0 * 0.9 * 0.6 * 0.9, 1e-9);
    }

    #[test]
    fn ramp_down_slows_the_approach() {
        let approach = segment_speed_kmh(95, 100, CongestionLevel::Medium, false, &mut flat_rng());
        assert_approx_eq!(approach, 55.0 * 0.9 * (0.4 + 0.5 * 0.6) * 0.9, 1e-9);
    }

    #[test]
    fn signals_slow_the_vehicle() {
        let clear = segment_speed_kmh(50, 100, CongestionLevel::Medium, false, &mut flat_rng());
        let near = segment_speed_kmh(50, 100, CongestionLevel::Medium, true, &mut flat_rng());
        assert_approx_eq!(near, clear * SIGNAL_SLOWDOWN, 1e-9);
    }

    #[test]
    fn light_traffic_beats_heavy_traffic() {
        let light = segment_speed_kmh(50, 100, CongestionLevel::Low, false, &mut flat_rng());
        let heavy = segment_speed_kmh(50, 100, CongestionLevel::High, false, &mut flat_rng());
        let critical =
            segment_speed_kmh(50, 100, CongestionLevel::Critical, false, &mut flat_rng());
        assert!(light > heavy);
        assert_eq!(heavy, critical);
    }

    #[test]
    fn speed_is_always_within_bounds() {
        let mut rng = StdRng::seed_from_u64(99);
        for index in 0..100 {
            for &congestion in &[
                CongestionLevel::Low,
                CongestionLevel::Medium,
                CongestionLevel::High,
                CongestionLevel::Critical,
            ] {
                for &near in &[false, true] {
                    let speed = segment_speed_kmh(index, 100, congestion, near, &mut rng);
                    assert!((MIN_SPEED_KMH..=MAX_SPEED_KMH).contains(&speed));
                }
            }
        }
    }
}
