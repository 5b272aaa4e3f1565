//! The synthetic traffic model: time-of-day congestion, weather, transient
//! incidents, and route-time projection.
//!
//! The generator is not a predictive model. Every snapshot is derived from
//! fixed lookup tables plus draws from an injectable, seedable random
//! source, so two generators built with the same seed produce identical
//! snapshots for the same instant.

use crate::catalogue::SegmentSite;
use crate::clock::Timestamp;
use crate::math::GeoPoint;
use arrayvec::ArrayVec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// Typical urban congestion by hour of day, 0.0 (free flow) to 1.0.
/// Two peaks: the morning rush around 07:00-09:00 and the evening rush
/// around 17:00-19:00.
const HOURLY_CONGESTION: [f64; 24] = [
    0.05, 0.03, 0.02, 0.02, 0.05, 0.15, // 00:00 - 05:00
    0.35, 0.70, 0.85, 0.65, 0.45, 0.50, // 06:00 - 11:00
    0.55, 0.50, 0.45, 0.50, 0.60, 0.80, // 12:00 - 17:00
    0.90, 0.75, 0.50, 0.35, 0.20, 0.10, // 18:00 - 23:00
];

/// Demand factor per day of week, Monday first. Friday runs hottest,
/// Sunday quietest.
const DAY_FACTORS: [f64; 7] = [1.0, 0.95, 0.95, 1.0, 1.1, 0.6, 0.4];

/// Factor applied on public holidays, regardless of weekday.
const HOLIDAY_FACTOR: f64 = 0.3;

/// Year-independent public holidays as (month, day).
const HOLIDAYS: [(u32, u32); 8] = [
    (1, 1),
    (4, 21),
    (5, 1),
    (9, 7),
    (10, 12),
    (11, 2),
    (11, 15),
    (12, 25),
];

/// Chance that a snapshot carries any incidents at all.
const INCIDENT_PROBABILITY: f64 = 0.15;

/// Chance that a given segment is tagged with one of the snapshot's incidents.
const SEGMENT_INCIDENT_PROBABILITY: f64 = 0.1;

/// Severity bucket of a traffic incident.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IncidentSeverity {
    Low,
    Medium,
    High,
}

impl IncidentSeverity {
    /// Base delay contributed by an incident of this severity, in minutes.
    pub fn base_delay_minutes(self) -> u32 {
        match self {
            Self::Low => 2,
            Self::Medium => 5,
            Self::High => 10,
        }
    }

    /// Contribution to the overall congestion percentage.
    fn congestion_impact(self) -> f64 {
        match self {
            Self::Low => 5.0,
            Self::Medium => 15.0,
            Self::High => 30.0,
        }
    }
}

/// The kind of event behind a traffic incident.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum IncidentKind {
    Accident,
    Construction,
    Event,
    Weather,
}

/// A transient disruption. Incidents live only as long as the snapshot
/// that generated them.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficIncident {
    pub kind: IncidentKind,
    pub severity: IncidentSeverity,
    pub description: String,
    pub delay_minutes: u32,
}

/// The incident templates a generation draw picks from.
const INCIDENT_CATALOGUE: [(IncidentKind, IncidentSeverity, &str); 10] = [
    (IncidentKind::Accident, IncidentSeverity::Low, "Minor collision on the carriageway"),
    (IncidentKind::Accident, IncidentSeverity::Medium, "Accident with casualties"),
    (IncidentKind::Accident, IncidentSeverity::High, "Multi-vehicle pile-up"),
    (IncidentKind::Construction, IncidentSeverity::Low, "Road maintenance"),
    (IncidentKind::Construction, IncidentSeverity::Medium, "Works on the carriageway"),
    (IncidentKind::Event, IncidentSeverity::Low, "Local event"),
    (IncidentKind::Event, IncidentSeverity::Medium, "Street demonstration"),
    (IncidentKind::Weather, IncidentSeverity::Low, "Light rain"),
    (IncidentKind::Weather, IncidentSeverity::Medium, "Heavy rain"),
    (IncidentKind::Weather, IncidentSeverity::High, "Flooding"),
];

/// Simulated weather at snapshot time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum WeatherCondition {
    Clear,
    Rain,
    HeavyRain,
    Fog,
}

impl WeatherCondition {
    /// Multiplicative impact of the weather on congestion and travel time.
    pub fn impact_factor(self) -> f64 {
        match self {
            Self::Clear => 1.0,
            Self::Rain => 1.3,
            Self::HeavyRain => 1.6,
            Self::Fog => 1.4,
        }
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Clear => "clear skies",
            Self::Rain => "light rain",
            Self::HeavyRain => "heavy rain",
            Self::Fog => "fog",
        };
        f.write_str(label)
    }
}

/// Overall congestion bucket, derived from the congestion percentage by
/// fixed thresholds at 25, 50 and 75.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CongestionLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl CongestionLevel {
    /// Buckets a congestion percentage.
    pub fn from_percent(percent: f64) -> Self {
        if percent < 25.0 {
            Self::Low
        } else if percent < 50.0 {
            Self::Medium
        } else if percent < 75.0 {
            Self::High
        } else {
            Self::Critical
        }
    }

    /// Indicator color for dashboards.
    pub fn color(self) -> &'static str {
        match self {
            Self::Low => "#22c55e",
            Self::Medium => "#eab308",
            Self::High => "#f97316",
            Self::Critical => "#ef4444",
        }
    }
}

impl fmt::Display for CongestionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(label)
    }
}

/// Classification of the calendar day a snapshot was generated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DayType {
    Weekday,
    Weekend,
    Holiday,
}

/// A monitored street segment with its per-snapshot condition.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficSegment {
    pub id: String,
    pub name: String,
    pub coordinates: GeoPoint,
    pub base_speed_kmh: f64,
    /// Fractional slowdown versus free flow, 0.0 (free) to 1.0 (jammed).
    pub congestion_factor: f64,
    pub incidents: SmallVec<[TrafficIncident; 1]>,
}

/// One instant-in-time traffic state record. A new snapshot is produced on
/// every generation tick and the previous one is discarded; any history
/// keeping is the subscriber's business.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrafficSnapshot {
    pub timestamp: Timestamp,
    /// Overall congestion percentage, always within [0, 100].
    pub overall_congestion_percent: f64,
    /// Always the threshold bucket of `overall_congestion_percent`.
    pub congestion_level: CongestionLevel,
    pub segments: Vec<TrafficSegment>,
    pub average_speed_kmh: f64,
    pub incidents: ArrayVec<TrafficIncident, 2>,
    pub weather: WeatherCondition,
    pub is_rush_hour: bool,
    pub day_type: DayType,
}

/// Produces [`TrafficSnapshot`]s for a catalogue of segment sites.
pub struct TrafficGenerator {
    rng: StdRng,
    /// Zero-mean variation applied to the overall congestion (scaled x30
    /// into the percentage).
    variation: Normal<f64>,
    /// Zero-mean variation applied to each segment's congestion factor.
    segment_variation: Normal<f64>,
    sites: Vec<SegmentSite>,
}

impl TrafficGenerator {
    /// Creates a generator over the given segment sites. Pass a seed for
    /// reproducible snapshot streams; `None` seeds from entropy.
    pub fn new(sites: Vec<SegmentSite>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            variation: Normal::new(0.0, 0.1).expect("valid standard deviation"),
            segment_variation: Normal::new(0.0, 0.15).expect("valid standard deviation"),
            sites,
        }
    }

    /// Overrides the standard deviation of the overall congestion variation.
    pub fn with_variation(mut self, stddev: f64) -> Self {
        self.variation = Normal::new(0.0, stddev).expect("valid standard deviation");
        self
    }

    /// Generates a snapshot for the given instant.
    pub fn generate(&mut self, now: Timestamp) -> TrafficSnapshot {
        let hour = now.hour_of_day();
        let holiday = is_holiday(now);
        let day_type = if holiday {
            DayType::Holiday
        } else if now.is_weekend() {
            DayType::Weekend
        } else {
            DayType::Weekday
        };

        let weather = self.sample_weather();
        let weather_impact = weather.impact_factor();

        let hourly_factor = HOURLY_CONGESTION[hour as usize];
        let day_factor = if holiday {
            HOLIDAY_FACTOR
        } else {
            DAY_FACTORS[now.day_of_week()]
        };

        let variation = self.variation.sample(&mut self.rng);
        let base_congestion =
            (hourly_factor * day_factor * weather_impact * 100.0 + variation * 30.0).clamp(0.0, 100.0);

        let incidents = self.sample_incidents();
        let incident_impact: f64 = incidents
            .iter()
            .map(|incident| incident.severity.congestion_impact())
            .sum();
        let overall = (base_congestion + incident_impact).clamp(0.0, 100.0);

        let segments: Vec<TrafficSegment> = self
            .sites
            .clone()
            .into_iter()
            .map(|site| {
                let wobble = self.segment_variation.sample(&mut self.rng);
                let factor = (overall / 100.0 + wobble).clamp(0.0, 1.0);
                let tagged: SmallVec<[TrafficIncident; 1]> = if !incidents.is_empty()
                    && self.rng.gen::<f64>() < SEGMENT_INCIDENT_PROBABILITY
                {
                    let pick = self.rng.gen_range(0..incidents.len());
                    SmallVec::from_elem(incidents[pick].clone(), 1)
                } else {
                    SmallVec::new()
                };
                TrafficSegment {
                    id: site.id,
                    name: site.name,
                    coordinates: site.coordinates,
                    base_speed_kmh: site.base_speed_kmh,
                    congestion_factor: factor,
                    incidents: tagged,
                }
            })
            .collect();

        let mean_factor = if segments.is_empty() {
            overall / 100.0
        } else {
            segments.iter().map(|s| s.congestion_factor).sum::<f64>() / segments.len() as f64
        };
        let average_speed_kmh = (50.0 * (1.0 - mean_factor * 0.7)).round();

        let percent = overall.round();
        TrafficSnapshot {
            timestamp: now,
            overall_congestion_percent: percent,
            congestion_level: CongestionLevel::from_percent(percent),
            segments,
            average_speed_kmh,
            incidents,
            weather,
            is_rush_hour: (7..=9).contains(&hour) || (17..=19).contains(&hour),
            day_type,
        }
    }

    fn sample_weather(&mut self) -> WeatherCondition {
        let draw = self.rng.gen::<f64>();
        if draw < 0.70 {
            WeatherCondition::Clear
        } else if draw < 0.85 {
            WeatherCondition::Rain
        } else if draw < 0.95 {
            WeatherCondition::HeavyRain
        } else {
            WeatherCondition::Fog
        }
    }

    fn sample_incidents(&mut self) -> ArrayVec<TrafficIncident, 2> {
        let mut incidents = ArrayVec::new();
        if self.rng.gen::<f64>() < INCIDENT_PROBABILITY {
            let count = self.rng.gen_range(1..=2);
            for _ in 0..count {
                let (kind, severity, description) =
                    INCIDENT_CATALOGUE[self.rng.gen_range(0..INCIDENT_CATALOGUE.len())];
                incidents.push(TrafficIncident {
                    kind,
                    severity,
                    description: description.to_owned(),
                    delay_minutes: severity.base_delay_minutes() + self.rng.gen_range(0..5),
                });
            }
        }
        incidents
    }
}

/// Route-time estimate derived from a snapshot.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RouteTimeProjection {
    /// Total expected travel time in minutes.
    pub estimated_minutes: f64,
    /// Free-flow travel time in minutes.
    pub base_minutes: f64,
    /// Expected delay over free flow in minutes.
    pub delay_minutes: f64,
    /// Overall speed implied by the estimate, in km/h.
    pub effective_speed_kmh: f64,
}

/// Projects the travel time for `distance_km` under the given conditions.
///
/// Priority vehicles run a higher base speed and shed most of the delay:
/// 30% of the congestion impact, 20% of the incident delay and half of the
/// weather penalty.
pub fn project_route_time(
    distance_km: f64,
    snapshot: &TrafficSnapshot,
    priority_vehicle: bool,
) -> RouteTimeProjection {
    let base_speed_kmh = if priority_vehicle { 60.0 } else { 40.0 };
    let base_minutes = distance_km / base_speed_kmh * 60.0;

    let congestion_factor = snapshot.overall_congestion_percent / 100.0;
    let effective_congestion = if priority_vehicle {
        congestion_factor * 0.3
    } else {
        congestion_factor * 0.8
    };

    let incident_delay: f64 = snapshot
        .incidents
        .iter()
        .map(|incident| incident.delay_minutes as f64)
        .sum();
    let effective_incident_delay = if priority_vehicle {
        incident_delay * 0.2
    } else {
        incident_delay
    };

    let weather_factor = snapshot.weather.impact_factor();
    let weather_penalty = if priority_vehicle {
        (weather_factor - 1.0) * 0.5
    } else {
        weather_factor - 1.0
    };

    let delay_minutes =
        base_minutes * effective_congestion + effective_incident_delay + base_minutes * weather_penalty;
    let estimated_minutes = base_minutes + delay_minutes;
    let effective_speed_kmh = if estimated_minutes > 0.0 {
        (distance_km / estimated_minutes * 60.0).round()
    } else {
        0.0
    };

    RouteTimeProjection {
        estimated_minutes: round_tenth(estimated_minutes),
        base_minutes: round_tenth(base_minutes),
        delay_minutes: round_tenth(delay_minutes),
        effective_speed_kmh,
    }
}

/// Returns a copy of `current` with a sudden congestion spike applied:
/// +30 percentage points (clamped), the level forced to high, and the
/// incident list replaced by a single medium-severity accident. Meant for
/// manual demo triggering; not a draw from the statistical model.
pub fn simulate_spike(current: &TrafficSnapshot) -> TrafficSnapshot {
    let mut spiked = current.clone();
    spiked.overall_congestion_percent = (spiked.overall_congestion_percent + 30.0).min(100.0);
    spiked.congestion_level = CongestionLevel::High;
    spiked.incidents.clear();
    spiked.incidents.push(TrafficIncident {
        kind: IncidentKind::Accident,
        severity: IncidentSeverity::Medium,
        description: "Accident on the main corridor".to_owned(),
        delay_minutes: 8,
    });
    spiked
}

fn is_holiday(now: Timestamp) -> bool {
    HOLIDAYS.contains(&now.month_day())
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
