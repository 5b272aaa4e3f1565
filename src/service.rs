//! Periodic publication of traffic snapshots.
//!
//! The service owns a [`TrafficGenerator`] and pushes each fresh snapshot
//! to every subscriber. It replaces a module-level singleton from an
//! earlier design: construct it, inject it where needed, and drive it from
//! the owner's stepping loop.

use crate::clock::Timestamp;
use crate::timer::{IntervalTimer, OneshotTimer};
use crate::traffic::{simulate_spike, TrafficGenerator, TrafficSnapshot};
use crate::SubscriberId;
use slotmap::SlotMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Default period between generated snapshots, in ms.
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: i64 = 5000;

/// Artificial round-trip delay applied to manual refreshes, in ms.
pub const REFRESH_DELAY_MS: i64 = 300;

type SubscriberFn = Box<dyn FnMut(&TrafficSnapshot)>;

/// Generates snapshots on a fixed cadence and fans them out.
pub struct TrafficService {
    generator: TrafficGenerator,
    subscribers: SlotMap<SubscriberId, SubscriberFn>,
    latest: Option<TrafficSnapshot>,
    tick: IntervalTimer,
    pending_refresh: OneshotTimer,
}

impl TrafficService {
    /// Creates a stopped service around a generator.
    pub fn new(generator: TrafficGenerator) -> Self {
        Self {
            generator,
            subscribers: SlotMap::with_key(),
            latest: None,
            tick: IntervalTimer::default(),
            pending_refresh: OneshotTimer::default(),
        }
    }

    /// Starts periodic generation. The first snapshot is produced
    /// immediately if none exists yet; starting a running service is a
    /// no-op.
    pub fn start(&mut self, now: Timestamp, interval_ms: i64) {
        if self.tick.is_running() {
            return;
        }
        self.tick.start(now, interval_ms);
        if self.latest.is_none() {
            let snapshot = self.generator.generate(now);
            self.publish(snapshot);
        }
    }

    /// Stops periodic generation. Subscribers stay registered.
    pub fn stop(&mut self) {
        self.tick.stop();
    }

    /// Whether the periodic tick is running.
    pub fn is_running(&self) -> bool {
        self.tick.is_running()
    }

    /// Registers a subscriber. The latest snapshot, if any, is replayed to
    /// it synchronously before this call returns.
    pub fn subscribe(
        &mut self,
        mut callback: impl FnMut(&TrafficSnapshot) + 'static,
    ) -> SubscriberId {
        if let Some(latest) = &self.latest {
            callback(latest);
        }
        self.subscribers.insert(Box::new(callback))
    }

    /// Removes a subscriber. Returns false if the id was already gone.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.remove(id).is_some()
    }

    /// The number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Option<&TrafficSnapshot> {
        self.latest.as_ref()
    }

    /// Polls the service's timers, generating and publishing when due.
    pub fn step(&mut self, now: Timestamp) {
        if self.tick.fire(now) {
            let snapshot = self.generator.generate(now);
            self.publish(snapshot);
        }
        if self.pending_refresh.fire(now) {
            let snapshot = self.generator.generate(now);
            self.publish(snapshot);
        }
    }

    /// Requests an out-of-band regeneration, delivered after a short
    /// artificial delay to mimic a network round trip.
    pub fn refresh(&mut self, now: Timestamp) {
        self.pending_refresh
            .arm(Timestamp::from_unix_ms(now.unix_ms() + REFRESH_DELAY_MS));
    }

    /// Replaces the latest snapshot with a spiked copy and publishes it
    /// immediately.
    pub fn trigger_spike(&mut self) {
        if let Some(latest) = &self.latest {
            let spiked = simulate_spike(latest);
            self.publish(spiked);
        }
    }

    /// Publishes a snapshot to every subscriber. A panicking subscriber is
    /// dropped from the registry and must not prevent delivery to the
    /// rest.
    fn publish(&mut self, snapshot: TrafficSnapshot) {
        let mut poisoned = Vec::new();
        for (id, callback) in &mut self.subscribers {
            if catch_unwind(AssertUnwindSafe(|| callback(&snapshot))).is_err() {
                log::warn!("traffic subscriber panicked and was removed");
                poisoned.push(id);
            }
        }
        for id in poisoned {
            self.subscribers.remove(id);
        }
        self.latest = Some(snapshot);
    }
}
