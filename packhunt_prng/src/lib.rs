// Deterministic, portable pseudo-random number generator for the hunt sim.
//
// Implements SplitMix64 (Steele, Lea & Flood, 2014) over a single 64-bit
// state word. The whole generator is one `u64`, which keeps snapshots small
// and makes "the RNG state" a single comparable value in desync reports.
// SplitMix64 passes BigCrush and has no bad seeds (every state, including
// zero, produces a full-period stream), so run seeds can be taken verbatim
// from the session without any warm-up.
//
// This crate is the single PRNG used across the Packhunt workspace:
// `packhunt_sim` owns exactly one `SimRng` inside `SimulationWorld`, and
// every random decision in a tick draws from it in a fixed call order.
//
// **Critical constraint: determinism.** Every method on `SimRng` must produce
// identical output given the same prior state, regardless of platform,
// compiler version, or optimization level. The core generator is pure
// integer arithmetic; float helpers only convert integer bits with exact
// operations. Range helpers are total: an empty range returns its lower
// bound instead of panicking, because a malformed config must not halt the
// shared simulation.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Weyl-sequence increment (the 64-bit golden ratio).
const GOLDEN_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// SplitMix64 PRNG: the simulation's sole source of randomness.
///
/// Advances exactly once per `next_u64` call. All other draws are built on
/// `next_u64`, so the number of state advances per helper is documented on
/// each method.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a generator whose stream starts from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// The raw 64-bit state. Two generators with equal state produce
    /// identical streams.
    pub fn state(&self) -> u64 {
        self.state
    }

    /// Generate the next `u64` in the sequence (one advance).
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(GOLDEN_GAMMA);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Upper 32 bits of a `u64` (one advance).
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform `f32` in [0, 1) from the upper 24 bits (one advance).
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform `f64` in [0, 1) from the upper 53 bits (one advance).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform value in `[low, high)` (one advance). Returns `low` without
    /// drawing when the range is empty.
    pub fn range_f32(&mut self, low: f32, high: f32) -> f32 {
        if low.partial_cmp(&high) != Some(Ordering::Less) {
            return low;
        }
        low + self.next_f32() * (high - low)
    }

    /// Uniform integer in `[low, high)`.
    ///
    /// Uses rejection sampling to avoid modulo bias, so the number of
    /// advances is data-dependent but still a pure function of the state.
    /// Returns `low` without drawing when the range is empty.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        if low >= high {
            return low;
        }
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Uniform `usize` in `[low, high)`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Uniform `usize` in `[low, high]`.
    pub fn range_usize_inclusive(&mut self, low: usize, high: usize) -> usize {
        if low > high {
            return low;
        }
        self.range_u64(low as u64, high as u64 + 1) as usize
    }

    /// `true` with probability `p` (one advance, even for p outside [0, 1]).
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn determinism_same_seed_same_output() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_different_output() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn zero_seed_is_not_degenerate() {
        let mut rng = SimRng::new(0);
        let first = rng.next_u64();
        let second = rng.next_u64();
        assert_ne!(first, 0);
        assert_ne!(first, second);
    }

    #[test]
    fn known_splitmix_reference_values() {
        // Reference stream for seed 1234567 from the published SplitMix64.
        let mut rng = SimRng::new(1234567);
        assert_eq!(rng.next_u64(), 6457827717110365317);
        assert_eq!(rng.next_u64(), 3203168211198807973);
    }

    #[test]
    fn each_draw_advances_state_once() {
        let mut rng = SimRng::new(9);
        let before = rng.state();
        rng.next_f32();
        assert_eq!(rng.state(), before.wrapping_add(GOLDEN_GAMMA));
        rng.chance(0.5);
        assert_eq!(rng.state(), before.wrapping_add(GOLDEN_GAMMA.wrapping_mul(2)));
    }

    #[test]
    fn f32_in_unit_range() {
        let mut rng = SimRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f32();
            assert!((0.0..1.0).contains(&v), "f32 out of range: {v}");
        }
    }

    #[test]
    fn f64_in_unit_range() {
        let mut rng = SimRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn range_f32_within_bounds() {
        let mut rng = SimRng::new(777);
        for _ in 0..10_000 {
            let v = rng.range_f32(1.5, 3.5);
            assert!((1.5..3.5).contains(&v), "range_f32 out of range: {v}");
        }
    }

    #[test]
    fn empty_ranges_return_low_without_drawing() {
        let mut rng = SimRng::new(5);
        let before = rng.state();
        assert_eq!(rng.range_f32(0.4, 0.4), 0.4);
        assert_eq!(rng.range_u64(7, 7), 7);
        assert_eq!(rng.range_usize_inclusive(3, 2), 3);
        assert_eq!(rng.state(), before);
    }

    #[test]
    fn range_usize_inclusive_reaches_upper_bound() {
        let mut rng = SimRng::new(666);
        let mut saw_max = false;
        for _ in 0..10_000 {
            let v = rng.range_usize_inclusive(5, 10);
            assert!((5..=10).contains(&v));
            saw_max |= v == 10;
        }
        assert!(saw_max, "range_usize_inclusive should reach the upper bound");
    }

    #[test]
    fn chance_extremes() {
        let mut rng = SimRng::new(3);
        for _ in 0..1000 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn serialization_roundtrip_continues_stream() {
        let mut rng = SimRng::new(42);
        for _ in 0..10 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SimRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
