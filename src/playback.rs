//! Timed replay of a vehicle along a route.
//!
//! The playback owns its run state exclusively: it is mutated only by its
//! own command handlers and by [`RoutePlayback::step`], which the owning
//! simulation polls. Scheduling is a single pending deadline; pausing or
//! resetting disarms it synchronously, and `step` re-checks the phase on
//! entry, so a stale deadline can never advance a run that is no longer
//! running.

use crate::catalogue::SignalWaypoint;
use crate::math::{haversine_km, GeoPoint};
use crate::route::RouteSequence;
use crate::timer::OneshotTimer;
use crate::traffic::CongestionLevel;
use crate::clock::Timestamp;
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod speed;

/// Radius within which a passing route point clears a signal, in km.
pub const SIGNAL_CLEARED_KM: f64 = 0.10;

/// Radius within which a signal slows the approaching vehicle, in km.
pub const SIGNAL_NEAR_KM: f64 = 0.15;

/// Floor on the wall-clock delay between advancements, in ms.
const MIN_STEP_DELAY_MS: i64 = 50;

/// Replay rate selected by the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PlaybackRate {
    Half,
    #[default]
    Normal,
    Double,
    Quadruple,
}

impl PlaybackRate {
    /// The wall-clock speedup factor.
    pub fn factor(self) -> f64 {
        match self {
            Self::Half => 0.5,
            Self::Normal => 1.0,
            Self::Double => 2.0,
            Self::Quadruple => 4.0,
        }
    }
}

/// Lifecycle phase of a playback run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

/// Read-only snapshot of a run, published to the presentation layer.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunState {
    pub phase: RunPhase,
    pub current_index: usize,
    pub route_points: usize,
    /// 0-100; exactly 100 only at the final route point.
    pub progress_percent: f64,
    pub distance_km: f64,
    pub distance_traveled_km: f64,
    pub estimated_minutes: f64,
    /// Authoritative elapsed time, accumulated from unscaled segment
    /// durations.
    pub elapsed_seconds: f64,
    /// Smoothed elapsed time maintained by the display tick; re-synced to
    /// `elapsed_seconds` at every advancement. Presentation only.
    pub display_elapsed_seconds: f64,
    pub current_speed_kmh: f64,
    pub average_speed_kmh: f64,
    pub signals_cleared: usize,
    pub signals_total: usize,
    pub congestion: Option<CongestionLevel>,
    pub position: Option<GeoPoint>,
}

/// What a single advancement produced, for the owner to turn into events.
#[derive(Clone, Debug)]
pub struct Advancement {
    pub new_index: usize,
    pub progress_percent: f64,
    pub speed_kmh: f64,
    /// Ids of signals cleared by this advancement.
    pub cleared_signals: Vec<String>,
    pub arrived: bool,
}

/// The travel cost of the leg whose advancement is pending.
#[derive(Clone, Copy, Debug)]
struct PendingLeg {
    leg_km: f64,
    real_secs: f64,
    speed_kmh: f64,
}

/// Advances a vehicle along a [`RouteSequence`] over wall-clock time.
pub struct RoutePlayback {
    phase: RunPhase,
    route: Option<RouteSequence>,
    signals: Vec<SignalWaypoint>,
    cleared: Vec<bool>,
    current_index: usize,
    elapsed_seconds: f64,
    display_elapsed_seconds: f64,
    distance_traveled_km: f64,
    current_speed_kmh: f64,
    initial_average_kmh: f64,
    estimated_minutes: f64,
    congestion: Option<CongestionLevel>,
    rate: PlaybackRate,
    advance: OneshotTimer,
    pending: Option<PendingLeg>,
    rng: StdRng,
}

impl RoutePlayback {
    /// Creates an idle playback. Pass a seed for reproducible speed jitter.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            phase: RunPhase::Idle,
            route: None,
            signals: Vec::new(),
            cleared: Vec::new(),
            current_index: 0,
            elapsed_seconds: 0.0,
            display_elapsed_seconds: 0.0,
            distance_traveled_km: 0.0,
            current_speed_kmh: 0.0,
            initial_average_kmh: 0.0,
            estimated_minutes: 0.0,
            congestion: None,
            rate: PlaybackRate::Normal,
            advance: OneshotTimer::default(),
            pending: None,
            rng,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// The route being replayed, if a run exists.
    pub fn route(&self) -> Option<&RouteSequence> {
        self.route.as_ref()
    }

    /// Begins a run. Any previous run is discarded; counters reset, the
    /// phase becomes `Running` and the first advancement is scheduled.
    /// Signals already within clearance range of the origin are cleared
    /// immediately; their ids are returned.
    pub fn start(
        &mut self,
        route: RouteSequence,
        signals: Vec<SignalWaypoint>,
        congestion: CongestionLevel,
        estimated_minutes: f64,
        initial_average_kmh: f64,
        rate: PlaybackRate,
        now: Timestamp,
    ) -> Vec<String> {
        self.reset();
        self.cleared = vec![false; signals.len()];
        self.signals = signals;
        self.congestion = Some(congestion);
        self.estimated_minutes = estimated_minutes;
        self.initial_average_kmh = initial_average_kmh;
        self.rate = rate;
        self.phase = RunPhase::Running;

        let origin = route.point(0);
        self.route = Some(route);
        let cleared_at_origin = self.mark_cleared(origin);
        self.schedule_next(now);
        cleared_at_origin
    }

    /// Pauses a running run; no advancement or metric update happens while
    /// paused. Pausing in any other phase is a no-op.
    pub fn pause(&mut self) {
        if self.phase == RunPhase::Running {
            self.phase = RunPhase::Paused;
            self.advance.disarm();
            self.pending = None;
        }
    }

    /// Resumes a paused run, rescheduling the next advancement. Resuming
    /// in any other phase is a no-op.
    pub fn resume(&mut self, now: Timestamp) {
        if self.phase == RunPhase::Paused {
            self.phase = RunPhase::Running;
            self.schedule_next(now);
        }
    }

    /// Returns the playback to `Idle` from any phase, cancelling the
    /// pending advancement and clearing all per-run state.
    pub fn reset(&mut self) {
        self.phase = RunPhase::Idle;
        self.route = None;
        self.signals.clear();
        self.cleared.clear();
        self.current_index = 0;
        self.elapsed_seconds = 0.0;
        self.display_elapsed_seconds = 0.0;
        self.distance_traveled_km = 0.0;
        self.current_speed_kmh = 0.0;
        self.initial_average_kmh = 0.0;
        self.estimated_minutes = 0.0;
        self.congestion = None;
        self.advance.disarm();
        self.pending = None;
    }

    /// Polls the pending advancement. Returns the advancement performed,
    /// if its deadline had passed. A no-op unless `Running`.
    pub fn step(&mut self, now: Timestamp) -> Option<Advancement> {
        if self.phase != RunPhase::Running || !self.advance.fire(now) {
            return None;
        }
        let pending = self.pending.take()?;
        let route = self.route.as_ref()?;

        self.current_index += 1;
        self.elapsed_seconds += pending.real_secs;
        self.display_elapsed_seconds = self.elapsed_seconds;
        self.distance_traveled_km += pending.leg_km;
        self.current_speed_kmh = pending.speed_kmh;

        let position = route.point(self.current_index);
        let last_index = route.last_index();
        let progress = self.current_index as f64 / last_index as f64 * 100.0;
        let cleared_signals = self.mark_cleared(position);

        let arrived = self.current_index == last_index;
        if arrived {
            self.phase = RunPhase::Completed;
            self.advance.disarm();
        } else {
            if self.current_index % 5 == 0 {
                log::debug!(
                    "progress {:.0}% at {:.0} km/h",
                    progress,
                    pending.speed_kmh
                );
            }
            self.schedule_next(now);
        }

        Some(Advancement {
            new_index: self.current_index,
            progress_percent: progress,
            speed_kmh: pending.speed_kmh,
            cleared_signals,
            arrived,
        })
    }

    /// Advances the smoothed display clock. Only meaningful while
    /// `Running`; the authoritative elapsed time is untouched.
    pub fn display_tick(&mut self, dt_secs: f64) {
        if self.phase == RunPhase::Running {
            self.display_elapsed_seconds += dt_secs * self.rate.factor();
        }
    }

    /// A read-only snapshot of the run.
    pub fn state(&self) -> RunState {
        let route_points = self.route.as_ref().map_or(0, RouteSequence::len);
        let progress = match &self.route {
            Some(route) => self.current_index as f64 / route.last_index() as f64 * 100.0,
            None => 0.0,
        };
        let average = if self.elapsed_seconds > 0.0 {
            self.distance_traveled_km / (self.elapsed_seconds / 3600.0)
        } else {
            self.initial_average_kmh
        };
        RunState {
            phase: self.phase,
            current_index: self.current_index,
            route_points,
            progress_percent: progress,
            distance_km: self.route.as_ref().map_or(0.0, RouteSequence::total_km),
            distance_traveled_km: self.distance_traveled_km,
            estimated_minutes: self.estimated_minutes,
            elapsed_seconds: self.elapsed_seconds,
            display_elapsed_seconds: self.display_elapsed_seconds,
            current_speed_kmh: self.current_speed_kmh,
            average_speed_kmh: average,
            signals_cleared: self.cleared.iter().filter(|c| **c).count(),
            signals_total: self.signals.len(),
            congestion: self.congestion,
            position: self.route.as_ref().map(|r| r.point(self.current_index)),
        }
    }

    /// Computes the speed for the upcoming leg and arms the advancement
    /// deadline: wall delay is the leg's travel time divided by the
    /// playback rate, floored to keep visible progress.
    fn schedule_next(&mut self, now: Timestamp) {
        let route = match &self.route {
            Some(route) => route,
            None => return,
        };
        if self.current_index >= route.last_index() {
            return;
        }

        let from = route.point(self.current_index);
        let near_signal = self
            .signals
            .iter()
            .any(|signal| haversine_km(from, signal.coordinates) < SIGNAL_NEAR_KM);
        let congestion = self.congestion.unwrap_or(CongestionLevel::Medium);
        let speed_kmh = speed::segment_speed_kmh(
            self.current_index,
            route.len(),
            congestion,
            near_signal,
            &mut self.rng,
        );

        let leg_km = route.leg_km(self.current_index);
        let real_secs = leg_km / speed_kmh * 3600.0;
        let delay_ms = ((real_secs * 1000.0 / self.rate.factor()) as i64).max(MIN_STEP_DELAY_MS);

        self.pending = Some(PendingLeg {
            leg_km,
            real_secs,
            speed_kmh,
        });
        self.advance
            .arm(Timestamp::from_unix_ms(now.unix_ms() + delay_ms));
    }

    /// Marks every not-yet-cleared signal within clearance range of
    /// `position` and returns their ids.
    fn mark_cleared(&mut self, position: GeoPoint) -> Vec<String> {
        let mut cleared_now = Vec::new();
        for (signal, cleared) in self.signals.iter().zip(self.cleared.iter_mut()) {
            if !*cleared && haversine_km(position, signal.coordinates) < SIGNAL_CLEARED_KM {
                *cleared = true;
                cleared_now.push(signal.id.clone());
            }
        }
        cleared_now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> Timestamp {
        Timestamp::from_unix_ms(ms)
    }

    fn short_route() -> RouteSequence {
        RouteSequence::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.001),
            GeoPoint::new(0.0, 0.002),
        ])
        .unwrap()
    }

    fn start_default(playback: &mut RoutePlayback, route: RouteSequence) {
        playback.start(
            route,
            Vec::new(),
            CongestionLevel::Medium,
            5.0,
            40.0,
            PlaybackRate::Normal,
            at(0),
        );
    }

    /// Drives the playback with a generously increasing clock until it
    /// completes or `max_steps` is exhausted.
    fn run_to_completion(playback: &mut RoutePlayback, max_steps: usize) {
        let mut now = 0;
        for _ in 0..max_steps {
            now += 60_000;
            playback.step(at(now));
            if playback.phase() == RunPhase::Completed {
                return;
            }
        }
        panic!("playback did not complete");
    }

    #[test]
    fn three_point_route_runs_to_completion() {
        let mut playback = RoutePlayback::new(Some(1));
        start_default(&mut playback, short_route());
        assert_eq!(playback.phase(), RunPhase::Running);

        run_to_completion(&mut playback, 10);
        let state = playback.state();
        assert_eq!(state.phase, RunPhase::Completed);
        assert_eq!(state.current_index, 2);
        assert_eq!(state.progress_percent, 100.0);
    }

    #[test]
    fn progress_is_monotonic() {
        let mut playback = RoutePlayback::new(Some(2));
        start_default(
            &mut playback,
            RouteSequence::generate(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.05, 0.05), 20),
        );

        let mut last_index = 0;
        let mut last_elapsed = 0.0;
        let mut now = 0;
        while playback.phase() == RunPhase::Running {
            now += 60_000;
            playback.step(at(now));
            let state = playback.state();
            assert!(state.current_index >= last_index);
            assert!(state.elapsed_seconds >= last_elapsed);
            last_index = state.current_index;
            last_elapsed = state.elapsed_seconds;
        }
        assert_eq!(playback.phase(), RunPhase::Completed);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut playback = RoutePlayback::new(Some(3));
        start_default(&mut playback, short_route());

        playback.pause();
        assert_eq!(playback.phase(), RunPhase::Paused);
        let before = playback.state();
        playback.pause();
        let after = playback.state();
        assert_eq!(before.current_index, after.current_index);
        assert_eq!(before.elapsed_seconds, after.elapsed_seconds);

        playback.resume(at(1000));
        assert_eq!(playback.phase(), RunPhase::Running);
        playback.resume(at(1000));
        assert_eq!(playback.phase(), RunPhase::Running);
    }

    #[test]
    fn no_advancement_while_paused() {
        let mut playback = RoutePlayback::new(Some(4));
        start_default(&mut playback, short_route());
        playback.pause();
        assert!(playback.step(at(3_600_000)).is_none());
        assert_eq!(playback.state().current_index, 0);
    }

    #[test]
    fn reset_clears_state_from_any_phase() {
        let mut playback = RoutePlayback::new(Some(5));
        start_default(&mut playback, short_route());
        playback.step(at(60_000));

        playback.reset();
        let state = playback.state();
        assert_eq!(state.phase, RunPhase::Idle);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.elapsed_seconds, 0.0);
        assert_eq!(state.signals_total, 0);

        // A stale deadline from the old run can no longer advance anything.
        assert!(playback.step(at(7_200_000)).is_none());
    }

    #[test]
    fn elapsed_time_ignores_the_playback_rate() {
        let route = RouteSequence::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 0.01),
        ])
        .unwrap();

        let mut normal = RoutePlayback::new(Some(6));
        normal.start(
            route.clone(),
            Vec::new(),
            CongestionLevel::Medium,
            5.0,
            40.0,
            PlaybackRate::Normal,
            at(0),
        );
        run_to_completion(&mut normal, 10);

        let mut fast = RoutePlayback::new(Some(6));
        fast.start(
            route,
            Vec::new(),
            CongestionLevel::Medium,
            5.0,
            40.0,
            PlaybackRate::Quadruple,
            at(0),
        );
        run_to_completion(&mut fast, 10);

        // Same seed, same route: the reported (simulated) elapsed time is
        // identical even though the 4x replay finished four times sooner.
        assert_eq!(
            normal.state().elapsed_seconds,
            fast.state().elapsed_seconds
        );
    }

    #[test]
    fn signals_along_the_route_are_cleared_once() {
        let signals = vec![
            SignalWaypoint {
                id: "on-route".into(),
                coordinates: GeoPoint::new(0.0, 0.001),
                intersection: String::new(),
                connected_to_system: true,
                average_wait_secs: 30,
            },
            SignalWaypoint {
                id: "far-away".into(),
                coordinates: GeoPoint::new(1.0, 1.0),
                intersection: String::new(),
                connected_to_system: true,
                average_wait_secs: 30,
            },
        ];
        let mut playback = RoutePlayback::new(Some(7));
        playback.start(
            short_route(),
            signals,
            CongestionLevel::Medium,
            5.0,
            40.0,
            PlaybackRate::Normal,
            at(0),
        );

        run_to_completion(&mut playback, 10);
        let state = playback.state();
        assert_eq!(state.signals_cleared, 1);
        assert_eq!(state.signals_total, 2);
    }
}
