//! Route sequences: the ordered paths a vehicle is replayed along.

use crate::catalogue::SignalWaypoint;
use crate::math::{haversine_km, GeoPoint};
use itertools::Itertools;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default radius within which a signal counts as lying on a route, in km.
pub const SIGNAL_ON_ROUTE_KM: f64 = 0.15;

/// An ordered, immutable sequence of at least two geographic points.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteSequence {
    points: Vec<GeoPoint>,
}

impl RouteSequence {
    /// Creates a route from explicit points.
    /// Returns `None` for fewer than two points.
    pub fn new(points: Vec<GeoPoint>) -> Option<Self> {
        (points.len() >= 2).then_some(Self { points })
    }

    /// Generates a plausible street route between two points: linear
    /// interpolation with a deterministic sinusoidal perturbation on the
    /// intermediate points to emulate curvature. Endpoints are exact.
    pub fn generate(origin: GeoPoint, destination: GeoPoint, points: usize) -> Self {
        let points = points.max(2);
        let lat_diff = destination.lat - origin.lat;
        let lon_diff = destination.lon - origin.lon;

        let mut route = Vec::with_capacity(points);
        route.push(origin);
        for i in 1..points - 1 {
            let progress = i as f64 / (points - 1) as f64;
            let wander = (progress * std::f64::consts::PI * 3.0).sin() * 0.002;
            let lateral = (progress * std::f64::consts::PI * 2.0).cos() * 0.001;
            route.push(GeoPoint::new(
                origin.lat + lat_diff * progress + wander,
                origin.lon + lon_diff * progress + lateral,
            ));
        }
        route.push(destination);
        Self { points: route }
    }

    /// The route's points, in travel order.
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// The number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false: a route holds at least two points.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The index of the final point.
    pub fn last_index(&self) -> usize {
        self.points.len() - 1
    }

    /// The point at `index`.
    pub fn point(&self, index: usize) -> GeoPoint {
        self.points[index]
    }

    /// The length of the leg from `index` to `index + 1`, in km.
    pub fn leg_km(&self, index: usize) -> f64 {
        haversine_km(self.points[index], self.points[index + 1])
    }

    /// The total route length in km.
    pub fn total_km(&self) -> f64 {
        self.points
            .iter()
            .tuple_windows()
            .map(|(a, b)| haversine_km(*a, *b))
            .sum()
    }

    /// The catalogue signals lying within `radius_km` of any route point.
    pub fn signals_on_route(
        &self,
        signals: &[SignalWaypoint],
        radius_km: f64,
    ) -> Vec<SignalWaypoint> {
        signals
            .iter()
            .filter(|signal| {
                self.points
                    .iter()
                    .any(|point| haversine_km(*point, signal.coordinates) < radius_km)
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn rejects_degenerate_routes() {
        assert!(RouteSequence::new(vec![]).is_none());
        assert!(RouteSequence::new(vec![GeoPoint::new(0.0, 0.0)]).is_none());
        assert!(RouteSequence::new(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.1)]).is_some());
    }

    #[test]
    fn generated_route_hits_its_endpoints() {
        let origin = GeoPoint::new(-23.4958, -47.4524);
        let destination = GeoPoint::new(-23.5156, -47.4389);
        let route = RouteSequence::generate(origin, destination, 30);
        assert_eq!(route.len(), 30);
        assert_eq!(route.point(0), origin);
        assert_eq!(route.point(route.last_index()), destination);
    }

    #[test]
    fn generation_is_deterministic() {
        let origin = GeoPoint::new(-23.4958, -47.4524);
        let destination = GeoPoint::new(-23.5156, -47.4389);
        let a = RouteSequence::generate(origin, destination, 30);
        let b = RouteSequence::generate(origin, destination, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn total_is_the_sum_of_legs() {
        let route = RouteSequence::generate(
            GeoPoint::new(-23.4958, -47.4524),
            GeoPoint::new(-23.5156, -47.4389),
            10,
        );
        let legs: f64 = (0..route.last_index()).map(|i| route.leg_km(i)).sum();
        assert_approx_eq!(route.total_km(), legs, 1e-12);
    }

    #[test]
    fn signals_near_the_route_are_found() {
        let route = RouteSequence::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ])
        .unwrap();
        let near = SignalWaypoint {
            id: "near".into(),
            coordinates: GeoPoint::new(0.0, 0.0015),
            intersection: String::new(),
            connected_to_system: true,
            average_wait_secs: 30,
        };
        let far = SignalWaypoint {
            id: "far".into(),
            coordinates: GeoPoint::new(1.0, 1.0),
            ..near.clone()
        };
        let found = route.signals_on_route(&[near, far], SIGNAL_ON_ROUTE_KM);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "near");
    }
}
