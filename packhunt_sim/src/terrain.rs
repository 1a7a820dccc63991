// Ground and obstacle queries.
//
// The sim does not own world geometry. Collision goes through the `Terrain`
// trait, which turns an attempted move into the position actually reached.
// `OpenField` (the default used by `SimulationWorld::tick`) only keeps
// bodies inside the unit square; `CircleObstacles` adds static round
// obstacles that bodies slide around.
//
// A `Terrain` implementation is part of the lockstep contract: every peer
// must pass an identical one to `tick_on`, and its answers must be a pure
// function of its inputs.

use crate::math::{EPSILON, Vec2};
use serde::{Deserialize, Serialize};

pub trait Terrain {
    /// Resolve a move of a body with `radius` from `from` toward `to`.
    /// Returns the position the body ends at.
    fn resolve_move(&self, from: Vec2, to: Vec2, radius: f32) -> Vec2;
}

/// Flat, empty ground bounded by the unit square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenField;

impl Terrain for OpenField {
    fn resolve_move(&self, from: Vec2, to: Vec2, _radius: f32) -> Vec2 {
        if to.is_finite() {
            to.clamp_unit()
        } else {
            from.clamp_unit()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

/// Open field with static circular obstacles. A body that would end inside
/// an obstacle is pushed out along the line from the obstacle center.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CircleObstacles {
    pub obstacles: Vec<Circle>,
}

impl Terrain for CircleObstacles {
    fn resolve_move(&self, from: Vec2, to: Vec2, radius: f32) -> Vec2 {
        let mut pos = OpenField.resolve_move(from, to, radius);
        for circle in &self.obstacles {
            let reach = circle.radius + radius;
            let offset = pos - circle.center;
            let d = offset.length();
            if d >= reach {
                continue;
            }
            // Dead center: push out along the direction of travel instead.
            let out = if d > EPSILON {
                offset * (1.0 / d)
            } else {
                (to - from).normalize_or(Vec2::X)
            };
            pos = (circle.center + out * (reach + 1e-3)).clamp_unit();
        }
        pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_field_clamps_to_unit_square() {
        let p = OpenField.resolve_move(Vec2::new(0.5, 0.5), Vec2::new(1.2, -0.1), 0.01);
        assert_eq!(p, Vec2::new(1.0, 0.0));
    }

    #[test]
    fn open_field_rejects_non_finite_targets() {
        let from = Vec2::new(0.25, 0.75);
        let p = OpenField.resolve_move(from, Vec2::new(f32::NAN, 0.0), 0.01);
        assert_eq!(p, from);
    }

    #[test]
    fn obstacles_push_bodies_out() {
        let terrain = CircleObstacles {
            obstacles: vec![Circle {
                center: Vec2::new(0.5, 0.5),
                radius: 0.1,
            }],
        };
        let p = terrain.resolve_move(Vec2::new(0.3, 0.5), Vec2::new(0.45, 0.5), 0.02);
        assert!(p.distance(Vec2::new(0.5, 0.5)) >= 0.12);
        assert!(p.x < 0.5);
    }
}
