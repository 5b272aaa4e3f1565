pub use catalogue::{
    Catalogue, EmergencyCapacity, Hospital, HospitalTier, Neighborhood, SegmentSite, SignalWaypoint,
};
pub use clock::Timestamp;
pub use math::{haversine_km, GeoPoint};
pub use playback::{PlaybackRate, RoutePlayback, RunPhase, RunState};
pub use route::RouteSequence;
pub use service::{TrafficService, DEFAULT_SNAPSHOT_INTERVAL_MS};
pub use simulation::{RunEvent, Simulation};
use slotmap::new_key_type;
pub use traffic::{
    project_route_time, simulate_spike, CongestionLevel, DayType, IncidentKind, IncidentSeverity,
    RouteTimeProjection, TrafficGenerator, TrafficIncident, TrafficSegment, TrafficSnapshot,
    WeatherCondition,
};

pub mod catalogue;
pub mod clock;
mod debug;
pub mod math;
pub mod playback;
pub mod route;
pub mod service;
pub mod simulation;
pub mod timer;
pub mod traffic;

new_key_type! {
    /// Unique ID of a traffic feed subscriber.
    pub struct SubscriberId;
}
