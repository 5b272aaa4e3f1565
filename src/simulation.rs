//! The top-level simulation: one catalogue, one traffic service, one
//! route playback, multiplexed over a single stepping entry point.
//!
//! The host owns a [`Simulation`] and calls [`Simulation::step`] with the
//! current wall-clock time from its event loop; everything else is
//! deadline state inside the components. Nothing here blocks and nothing
//! reads the system clock.

use crate::catalogue::Catalogue;
#[cfg(feature = "debug")]
use crate::debug::take_debug_frame;
use crate::clock::Timestamp;
use crate::playback::{PlaybackRate, RoutePlayback, RunState};
use crate::route::{RouteSequence, SIGNAL_ON_ROUTE_KM};
use crate::service::{TrafficService, DEFAULT_SNAPSHOT_INTERVAL_MS};
use crate::timer::IntervalTimer;
use crate::traffic::{project_route_time, TrafficGenerator, TrafficSnapshot};
use crate::SubscriberId;

/// Period of the display smoothing tick, in ms.
const DISPLAY_TICK_MS: i64 = 100;

/// Number of points in a generated run route.
const ROUTE_POINTS: usize = 30;

/// A discrete occurrence the presentation layer may want to cue on.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    /// A run was accepted and playback began.
    Started {
        origin: String,
        destination: String,
        distance_km: f64,
        estimated_minutes: f64,
    },
    /// The vehicle passed a signal waypoint.
    SignalCleared {
        signal_id: String,
        cleared: usize,
        total: usize,
    },
    /// The vehicle reached the final route point.
    Arrived {
        destination: String,
        elapsed_minutes: f64,
    },
}

/// An in-memory ambulance dispatch simulation.
pub struct Simulation {
    catalogue: Catalogue,
    traffic: TrafficService,
    playback: RoutePlayback,
    display: IntervalTimer,
    destination_name: Option<String>,
    events: Vec<RunEvent>,
    /// Debugging information from the previously performed advancement.
    #[cfg(feature = "debug")]
    debug: serde_json::Value,
}

impl Simulation {
    /// Creates a simulation over a catalogue. Pass a seed to make both
    /// the traffic draws and the playback jitter reproducible.
    pub fn new(catalogue: Catalogue, seed: Option<u64>) -> Self {
        let generator = TrafficGenerator::new(catalogue.segments.clone(), seed);
        let playback = RoutePlayback::new(seed.map(|s| s.wrapping_add(1)));
        Self {
            catalogue,
            traffic: TrafficService::new(generator),
            playback,
            display: IntervalTimer::default(),
            destination_name: None,
            events: Vec::new(),
            #[cfg(feature = "debug")]
            debug: serde_json::Value::Null,
        }
    }

    /// The catalogue this simulation serves.
    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    /// Starts the periodic traffic feed and the display tick.
    pub fn start(&mut self, now: Timestamp) {
        self.traffic.start(now, DEFAULT_SNAPSHOT_INTERVAL_MS);
        self.display.start(now, DISPLAY_TICK_MS);
    }

    /// Stops the periodic traffic feed and the display tick. A run in
    /// progress keeps its state and can still be stepped.
    pub fn stop(&mut self) {
        self.traffic.stop();
        self.display.stop();
    }

    /// Begins a run from a neighborhood to a hospital. When either
    /// identifier does not resolve the request is declined with a log
    /// line and no state changes.
    pub fn start_run(
        &mut self,
        origin: &str,
        destination: &str,
        rate: PlaybackRate,
        now: Timestamp,
    ) {
        let origin_area = match self.catalogue.neighborhood(origin) {
            Some(area) => area.clone(),
            None => {
                log::warn!("cannot start run: unknown origin {origin:?}");
                return;
            }
        };
        let hospital = match self.catalogue.hospital(destination) {
            Some(hospital) => hospital.clone(),
            None => {
                log::warn!("cannot start run: unknown destination {destination:?}");
                return;
            }
        };

        // The projection needs current conditions; bring the feed up if
        // the host never started it.
        if self.traffic.latest().is_none() {
            self.traffic.start(now, DEFAULT_SNAPSHOT_INTERVAL_MS);
            self.display.start(now, DISPLAY_TICK_MS);
        }
        let snapshot = self.traffic.latest().expect("feed was just started");

        let route =
            RouteSequence::generate(origin_area.coordinates, hospital.coordinates, ROUTE_POINTS);
        let distance_km = route.total_km();
        let projection = project_route_time(distance_km, snapshot, true);
        let congestion = snapshot.congestion_level;
        let signals = route.signals_on_route(&self.catalogue.signals, SIGNAL_ON_ROUTE_KM);

        log::info!(
            "run accepted: {} -> {} ({:.2} km, est {:.0} min, traffic {} at {:.0}%)",
            origin_area.name,
            hospital.name,
            distance_km,
            projection.estimated_minutes,
            congestion,
            snapshot.overall_congestion_percent,
        );
        if !snapshot.incidents.is_empty() {
            log::info!("{} incident(s) in the area", snapshot.incidents.len());
        }

        let cleared_at_origin = self.playback.start(
            route,
            signals,
            congestion,
            projection.estimated_minutes,
            projection.effective_speed_kmh,
            rate,
            now,
        );
        self.destination_name = Some(hospital.name);
        self.events.push(RunEvent::Started {
            origin: origin_area.name,
            destination: self.destination_name.clone().unwrap_or_default(),
            distance_km,
            estimated_minutes: projection.estimated_minutes,
        });
        self.push_signal_events(cleared_at_origin);
    }

    /// Pauses the run in progress.
    pub fn pause_run(&mut self) {
        self.playback.pause();
    }

    /// Resumes a paused run.
    pub fn resume_run(&mut self, now: Timestamp) {
        self.playback.resume(now);
    }

    /// Abandons the run and returns the playback to idle.
    pub fn reset_run(&mut self) {
        self.playback.reset();
        self.destination_name = None;
    }

    /// A read-only snapshot of the run in progress.
    pub fn run_state(&self) -> RunState {
        self.playback.state()
    }

    /// The most recent traffic snapshot, if the feed has produced one.
    pub fn latest_traffic(&self) -> Option<&TrafficSnapshot> {
        self.traffic.latest()
    }

    /// Subscribes to the traffic feed; the latest snapshot is replayed to
    /// the callback synchronously.
    pub fn subscribe_traffic(
        &mut self,
        callback: impl FnMut(&TrafficSnapshot) + 'static,
    ) -> SubscriberId {
        self.traffic.subscribe(callback)
    }

    /// Removes a traffic subscriber.
    pub fn unsubscribe_traffic(&mut self, id: SubscriberId) -> bool {
        self.traffic.unsubscribe(id)
    }

    /// Requests an out-of-band traffic regeneration after the artificial
    /// refresh delay.
    pub fn refresh_traffic(&mut self, now: Timestamp) {
        self.traffic.refresh(now);
    }

    /// Injects a congestion spike into the feed, for demos.
    pub fn trigger_traffic_spike(&mut self) {
        self.traffic.trigger_spike();
    }

    /// Takes the events accumulated since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<RunEvent> {
        std::mem::take(&mut self.events)
    }

    /// Polls every timer: the traffic cadence, a pending refresh, the
    /// pending advancement and the display tick.
    pub fn step(&mut self, now: Timestamp) {
        self.traffic.step(now);

        if let Some(advancement) = self.playback.step(now) {
            #[cfg(feature = "debug")]
            crate::debug::record_advancement(&advancement);

            let arrived = advancement.arrived;
            self.push_signal_events(advancement.cleared_signals);
            if arrived {
                let destination = self.destination_name.clone().unwrap_or_default();
                let elapsed_minutes = self.playback.state().elapsed_seconds / 60.0;
                log::info!("arrived at {destination} after {elapsed_minutes:.1} min");
                self.events.push(RunEvent::Arrived {
                    destination,
                    elapsed_minutes,
                });
            }
        }

        if self.display.fire(now) {
            self.playback.display_tick(DISPLAY_TICK_MS as f64 / 1000.0);
        }

        #[cfg(feature = "debug")]
        {
            self.debug = take_debug_frame();
        }
    }

    /// Gets the debugging information for the previously stepped
    /// advancement as a JSON array.
    #[cfg(feature = "debug")]
    pub fn debug(&mut self) -> serde_json::Value {
        self.debug.clone()
    }

    fn push_signal_events(&mut self, cleared: Vec<String>) {
        if cleared.is_empty() {
            return;
        }
        let state = self.playback.state();
        for signal_id in cleared {
            log::info!("signal {signal_id} cleared for passage");
            self.events.push(RunEvent::SignalCleared {
                signal_id,
                cleared: state.signals_cleared,
                total: state.signals_total,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::RunPhase;

    fn at(ms: i64) -> Timestamp {
        Timestamp::from_unix_ms(ms)
    }

    fn simulation() -> Simulation {
        Simulation::new(Catalogue::sorocaba().clone(), Some(42))
    }

    #[test]
    fn unknown_endpoints_decline_without_state() {
        let mut sim = simulation();
        sim.start(at(0));

        sim.start_run("Atlantis", "regional", PlaybackRate::Normal, at(0));
        assert_eq!(sim.run_state().phase, RunPhase::Idle);
        sim.start_run("Centro", "nowhere", PlaybackRate::Normal, at(0));
        assert_eq!(sim.run_state().phase, RunPhase::Idle);
        assert!(sim.drain_events().is_empty());
    }

    #[test]
    fn start_run_emits_a_started_event() {
        let mut sim = simulation();
        sim.start(at(0));
        sim.start_run("Centro", "regional", PlaybackRate::Quadruple, at(0));

        assert_eq!(sim.run_state().phase, RunPhase::Running);
        let events = sim.drain_events();
        assert!(matches!(events.first(), Some(RunEvent::Started { .. })));
    }

    #[test]
    fn run_completes_and_reports_arrival() {
        let mut sim = simulation();
        sim.start(at(0));
        sim.start_run("Centro", "regional", PlaybackRate::Quadruple, at(0));

        let mut now = 0;
        while sim.run_state().phase == RunPhase::Running {
            now += 1000;
            sim.step(at(now));
            assert!(now < 3_600_000, "run should complete within an hour");
        }

        assert_eq!(sim.run_state().phase, RunPhase::Completed);
        assert_eq!(sim.run_state().progress_percent, 100.0);
        let events = sim.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, RunEvent::Arrived { .. })));
    }

    #[test]
    fn display_clock_ticks_between_advancements() {
        let mut sim = simulation();
        sim.start(at(0));
        sim.start_run("Centro", "regional", PlaybackRate::Normal, at(0));

        // Drive only display ticks: no advancement happens in 400 ms of a
        // 1x replay of multi-hundred-metre legs.
        for ms in (100..=400i64).step_by(100) {
            sim.step(at(ms));
        }
        let state = sim.run_state();
        assert_eq!(state.elapsed_seconds, 0.0);
        assert!(state.display_elapsed_seconds > 0.0);
    }

    #[test]
    fn reset_during_a_run_goes_back_to_idle() {
        let mut sim = simulation();
        sim.start(at(0));
        sim.start_run("Centro", "regional", PlaybackRate::Quadruple, at(0));
        sim.step(at(1000));

        sim.reset_run();
        let state = sim.run_state();
        assert_eq!(state.phase, RunPhase::Idle);
        assert_eq!(state.current_index, 0);
        assert_eq!(state.elapsed_seconds, 0.0);
    }
}
