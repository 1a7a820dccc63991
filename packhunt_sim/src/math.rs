// Deterministic 2D math for the simulation.
//
// `Vec2` is the only vector type in the sim. Positions live in the unit
// square (`[0, 1]²`), velocities are in world units per simulated second.
//
// Trigonometry is polynomial and built only from `+ - * /` on `f32`, which
// IEEE-754 specifies as correctly rounded. Square roots use `f32::sqrt`,
// which is also correctly rounded on every conforming platform. Nothing in
// this module calls into the platform libm (`sin`, `cos`, `atan2`, `powf`),
// and nothing uses fused multiply-add, so every peer computes bit-identical
// results for the same inputs.
//
// See also: `perception.rs` and `behavior.rs`, the main consumers;
// `pose.rs` for the only place the angle functions are used per tick.
//
// **Critical constraint: determinism.** Do not replace any function here
// with a `std` float method other than `sqrt`, `abs`, `floor`, `min`, `max`
// and `clamp` (all exact). Rust never contracts `a * b + c` into an FMA on
// its own, so plain expressions are safe.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

pub const PI: f32 = std::f32::consts::PI;
pub const TAU: f32 = std::f32::consts::TAU;
pub const FRAC_PI_2: f32 = std::f32::consts::FRAC_PI_2;

/// Below this length a vector is treated as zero when normalizing.
pub const EPSILON: f32 = 1e-6;

/// A 2D vector with `f32` components.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };
    pub const X: Vec2 = Vec2 { x: 1.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product. Positive when `other` lies
    /// counter-clockwise from `self`.
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Unit vector in the same direction, or zero for a (near-)zero vector.
    pub fn normalized(self) -> Self {
        self.normalize_or(Vec2::ZERO)
    }

    /// Unit vector in the same direction, or `fallback` for a (near-)zero
    /// vector.
    pub fn normalize_or(self, fallback: Self) -> Self {
        let len = self.length();
        if len > EPSILON {
            Vec2::new(self.x / len, self.y / len)
        } else {
            fallback
        }
    }

    /// Counter-clockwise perpendicular.
    pub fn perp(self) -> Self {
        Vec2::new(-self.y, self.x)
    }

    /// Rotate by an angle given as its cosine and sine.
    pub fn rotated(self, cos: f32, sin: f32) -> Self {
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Scale down to at most `max` length.
    pub fn clamp_length(self, max: f32) -> Self {
        let len = self.length();
        if len > max && len > 0.0 {
            self * (max / len)
        } else {
            self
        }
    }

    /// Clamp both components into `[0, 1]`.
    pub fn clamp_unit(self) -> Self {
        Vec2::new(clamp01(self.x), clamp01(self.y))
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Clamp into `[0, 1]`. NaN maps to 0 so a poisoned scalar cannot leak out
/// of a clamp site.
pub fn clamp01(v: f32) -> f32 {
    if v > 0.0 { v.min(1.0) } else { 0.0 }
}

/// Move `current` toward `target` by fraction `k` (clamped to `[0, 1]`).
pub fn approach(current: f32, target: f32, k: f32) -> f32 {
    current + (target - current) * clamp01(k)
}

/// Multiplicative per-tick decay factor `max(0, 1 - rate * dt)`.
pub fn decay_factor(rate: f32, dt: f32) -> f32 {
    (1.0 - rate * dt).max(0.0)
}

// ---------------------------------------------------------------------------
// Polynomial trigonometry
// ---------------------------------------------------------------------------

/// Wrap an angle into `[-PI, PI]`.
pub fn wrap_angle(a: f32) -> f32 {
    if (-PI..=PI).contains(&a) {
        return a;
    }
    let turns = ((a + PI) / TAU).floor();
    let wrapped = a - turns * TAU;
    // Rounding at the boundary can land a hair outside the range.
    wrapped.clamp(-PI, PI)
}

/// Sine via an odd Taylor polynomial on `[-PI/2, PI/2]` after symmetric
/// range reduction. Absolute error is below 1e-6 over the whole circle.
pub fn sin(a: f32) -> f32 {
    let mut x = wrap_angle(a);
    if x > FRAC_PI_2 {
        x = PI - x;
    } else if x < -FRAC_PI_2 {
        x = -PI - x;
    }
    let x2 = x * x;
    x * (1.0
        + x2 * (-1.0 / 6.0
            + x2 * (1.0 / 120.0
                + x2 * (-1.0 / 5040.0 + x2 * (1.0 / 362_880.0 - x2 / 39_916_800.0)))))
}

pub fn cos(a: f32) -> f32 {
    sin(a + FRAC_PI_2)
}

/// Four-quadrant arctangent. `atan2(0, 0)` is 0. Absolute error is below
/// 2e-5 rad, which is plenty for the procedural pose it feeds.
pub fn atan2(y: f32, x: f32) -> f32 {
    let ax = x.abs();
    let ay = y.abs();
    let hi = ax.max(ay);
    if hi <= 0.0 {
        return 0.0;
    }
    let z = ax.min(ay) / hi;
    let z2 = z * z;
    let mut r = z
        * (0.999_866
            + z2 * (-0.330_299_5
                + z2 * (0.180_141 + z2 * (-0.085_133 + z2 * 0.020_835_1))));
    if ay > ax {
        r = FRAC_PI_2 - r;
    }
    if x < 0.0 {
        r = PI - r;
    }
    if y < 0.0 { -r } else { r }
}

/// Unit vector at angle `a` (radians, counter-clockwise from +X).
pub fn from_angle(a: f32) -> Vec2 {
    Vec2::new(cos(a), sin(a))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn sin_matches_known_angles() {
        assert!(close(sin(0.0), 0.0, 1e-7));
        assert!(close(sin(FRAC_PI_2), 1.0, 1e-6));
        assert!(close(sin(-FRAC_PI_2), -1.0, 1e-6));
        assert!(close(sin(PI / 6.0), 0.5, 1e-6));
        assert!(close(sin(PI), 0.0, 1e-6));
        assert!(close(sin(3.0 * FRAC_PI_2), -1.0, 1e-6));
    }

    #[test]
    fn cos_matches_known_angles() {
        assert!(close(cos(0.0), 1.0, 1e-6));
        assert!(close(cos(PI / 3.0), 0.5, 1e-6));
        assert!(close(cos(PI), -1.0, 1e-6));
    }

    #[test]
    fn sin_handles_large_angles() {
        // 10 full turns plus a quarter.
        let a = 20.0 * PI + FRAC_PI_2;
        assert!(close(sin(a), 1.0, 1e-4));
    }

    #[test]
    fn pythagorean_identity_holds_on_sample() {
        let mut a = -7.0f32;
        while a < 7.0 {
            let s = sin(a);
            let c = cos(a);
            assert!(close(s * s + c * c, 1.0, 1e-5), "angle {a}");
            a += 0.173;
        }
    }

    #[test]
    fn atan2_quadrants() {
        assert!(close(atan2(0.0, 1.0), 0.0, 1e-6));
        assert!(close(atan2(1.0, 0.0), FRAC_PI_2, 1e-5));
        assert!(close(atan2(1.0, 1.0), PI / 4.0, 2e-5));
        assert!(close(atan2(1.0, -1.0), 3.0 * PI / 4.0, 2e-5));
        assert!(close(atan2(-1.0, -1.0), -3.0 * PI / 4.0, 2e-5));
        assert!(close(atan2(-1.0, 1.0), -PI / 4.0, 2e-5));
        assert_eq!(atan2(0.0, 0.0), 0.0);
    }

    #[test]
    fn atan2_inverts_from_angle() {
        let mut a = -3.0f32;
        while a < 3.0 {
            let v = from_angle(a);
            assert!(close(atan2(v.y, v.x), a, 5e-5), "angle {a}");
            a += 0.25;
        }
    }

    #[test]
    fn normalize_zero_is_zero() {
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        assert_eq!(Vec2::ZERO.normalize_or(Vec2::X), Vec2::X);
        let n = Vec2::new(3.0, 4.0).normalized();
        assert!(close(n.length(), 1.0, 1e-6));
    }

    #[test]
    fn cross_sign_is_counter_clockwise_positive() {
        assert!(Vec2::X.cross(Vec2::new(0.0, 1.0)) > 0.0);
        assert!(Vec2::X.cross(Vec2::new(0.0, -1.0)) < 0.0);
    }

    #[test]
    fn clamp01_maps_nan_to_zero() {
        assert_eq!(clamp01(f32::NAN), 0.0);
        assert_eq!(clamp01(2.0), 1.0);
        assert_eq!(clamp01(-1.0), 0.0);
        assert_eq!(clamp01(0.25), 0.25);
    }

    #[test]
    fn clamp_length_limits_magnitude() {
        let v = Vec2::new(3.0, 4.0).clamp_length(1.0);
        assert!(close(v.length(), 1.0, 1e-6));
        let w = Vec2::new(0.1, 0.0).clamp_length(1.0);
        assert_eq!(w, Vec2::new(0.1, 0.0));
    }
}
