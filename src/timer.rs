//! Cooperative timers.
//!
//! All "waiting" in the simulation is a deadline held in one of these
//! structs and polled from the stepping loop. Disarming is synchronous,
//! so a cancelled timer can never fire afterwards; there is no callback
//! registration and therefore no stale-callback race to guard against.

use crate::clock::Timestamp;

/// A timer that fires at most once per arming.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneshotTimer {
    due: Option<Timestamp>,
}

impl OneshotTimer {
    /// Arms the timer to fire at `due`. Re-arming replaces any pending deadline.
    pub fn arm(&mut self, due: Timestamp) {
        self.due = Some(due);
    }

    /// Clears any pending deadline.
    pub fn disarm(&mut self) {
        self.due = None;
    }

    /// Whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.due.is_some()
    }

    /// Returns `true` and disarms if the deadline has passed.
    pub fn fire(&mut self, now: Timestamp) -> bool {
        match self.due {
            Some(due) if now >= due => {
                self.due = None;
                true
            }
            _ => false,
        }
    }
}

/// A timer that fires repeatedly at a fixed period.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntervalTimer {
    period_ms: i64,
    next: Option<Timestamp>,
}

impl IntervalTimer {
    /// Starts the timer; the first firing is one period after `now`.
    /// Starting an already running timer is a no-op.
    pub fn start(&mut self, now: Timestamp, period_ms: i64) {
        if self.next.is_none() {
            self.period_ms = period_ms;
            self.next = Some(Timestamp::from_unix_ms(now.unix_ms() + period_ms));
        }
    }

    /// Stops the timer.
    pub fn stop(&mut self) {
        self.next = None;
    }

    /// Whether the timer is running.
    pub fn is_running(&self) -> bool {
        self.next.is_some()
    }

    /// Returns `true` if the deadline has passed, re-arming relative to the
    /// deadline itself so the cadence does not drift when polled late.
    pub fn fire(&mut self, now: Timestamp) -> bool {
        match self.next {
            Some(due) if now >= due => {
                self.next = Some(Timestamp::from_unix_ms(due.unix_ms() + self.period_ms));
                true
            }
            _ => false,
        }
    }
}
