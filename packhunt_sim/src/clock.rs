// Simulated clock.
//
// The only notion of time in the sim. `now` is a monotonic accumulator of
// the externally supplied per-tick deltas; nothing reads the wall clock.
// Every cooldown, window and timer in the crate is a stored timestamp
// compared against `now`, so save/restore reproduces them exactly.
//
// Timestamps are `Option<f64>`: `None` means "never happened", which makes
// "has the cooldown elapsed" true and "is the window open" false without a
// sentinel value.
//
// **Critical constraint: determinism.** `advance` is the only mutator.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimClock {
    /// Number of completed ticks.
    pub tick: u64,
    /// Simulated seconds since run start.
    pub now: f64,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `dt` seconds. Callers sanitize `dt` first.
    pub fn advance(&mut self, dt: f32) {
        self.tick += 1;
        self.now += f64::from(dt);
    }

    /// Seconds elapsed since `stamp`, or `f32::MAX` if it never happened.
    pub fn since(&self, stamp: Option<f64>) -> f32 {
        match stamp {
            Some(t) => (self.now - t) as f32,
            None => f32::MAX,
        }
    }

    /// Whether `stamp` happened no more than `window` seconds ago.
    pub fn within(&self, stamp: Option<f64>, window: f32) -> bool {
        stamp.is_some_and(|t| self.now - t <= f64::from(window))
    }

    /// Whether an end-time lies strictly in the future.
    pub fn before(&self, end: Option<f64>) -> bool {
        end.is_some_and(|t| self.now < t)
    }

    /// Seconds left until `end`, or zero if it has passed or never existed.
    pub fn remaining(&self, end: Option<f64>) -> f32 {
        match end {
            Some(t) if t > self.now => (t - self.now) as f32,
            _ => 0.0,
        }
    }

    /// Absolute timestamp `secs` from now.
    pub fn after(&self, secs: f32) -> f64 {
        self.now + f64::from(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_counts_ticks_and_time() {
        let mut clock = SimClock::new();
        clock.advance(0.25);
        clock.advance(0.25);
        assert_eq!(clock.tick, 2);
        assert_eq!(clock.now, 0.5);
    }

    #[test]
    fn never_is_infinitely_long_ago() {
        let clock = SimClock::new();
        assert_eq!(clock.since(None), f32::MAX);
        assert!(!clock.within(None, 100.0));
        assert!(!clock.before(None));
        assert_eq!(clock.remaining(None), 0.0);
    }

    #[test]
    fn windows_are_inclusive_and_end_times_exclusive() {
        let mut clock = SimClock::new();
        clock.advance(1.0);
        assert!(clock.within(Some(0.5), 0.5));
        assert!(!clock.within(Some(0.25), 0.5));
        assert!(clock.before(Some(1.5)));
        assert!(!clock.before(Some(1.0)));
        assert_eq!(clock.remaining(Some(1.5)), 0.5);
    }
}
