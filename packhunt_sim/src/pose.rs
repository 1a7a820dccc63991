// Procedural animation pose for a pack agent.
//
// The pose is derived output for the renderer: it is recomputed from the
// agent's authoritative state at the end of every agent update and is never
// read back by the simulation. It is `#[serde(skip)]` on `Agent`, so
// snapshots do not carry it and a restored world rebuilds it on the next
// tick.
//
// Gait phase comes from the simulated clock and the agent's speed. Tail,
// ears and fur respond to the emotional state; the body stretches during a
// lunge.
//
// **Critical constraint: determinism.** Although nothing reads the pose back,
// it is computed with the polynomial trig in `math.rs` so that renderer
// output is reproducible across peers too.

use crate::math::{self, Vec2, PI};
use crate::types::{Behavior, EmotionalState};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Foot offsets: front-left, front-right, hind-left, hind-right.
    pub legs: [Vec2; 4],
    pub spine_bend: f32,
    pub tail_angle: f32,
    pub head_pitch: f32,
    pub head_yaw: f32,
    pub ears: [f32; 2],
    pub body_stretch: f32,
    pub body_offset_y: f32,
    pub fur_ruffle: f32,
}

/// The slice of agent state the pose depends on.
pub struct PoseInput {
    pub velocity: Vec2,
    pub facing: Vec2,
    pub to_player: Vec2,
    pub emotion: EmotionalState,
    pub emotion_intensity: f32,
    pub behavior: Behavior,
    pub noticed: bool,
    pub lunging: bool,
    pub max_speed: f32,
}

// (base x, base y, phase offset, x amplitude, y amplitude)
const LEGS: [(f32, f32, f32, f32, f32); 4] = [
    (-0.01, 0.01, 0.0, 1.0, 0.5),
    (0.01, 0.01, PI, 1.0, 0.5),
    (-0.015, 0.015, PI * 0.5, 0.8, 0.4),
    (0.015, 0.015, PI * 1.5, 0.8, 0.4),
];

impl Pose {
    pub fn derive(input: &PoseInput, now: f64) -> Pose {
        let t = now as f32;
        let speed = input.velocity.length();
        let speed_frac = if input.max_speed > 0.0 {
            speed / input.max_speed
        } else {
            0.0
        };

        let phase = math::wrap_angle(t * 10.0 * speed);
        let amplitude = 0.015 * speed_frac;
        let mut legs = [Vec2::ZERO; 4];
        for (leg, &(bx, by, offset, ax, ay)) in legs.iter_mut().zip(LEGS.iter()) {
            let p = phase + offset;
            *leg = Vec2::new(
                bx + math::sin(p) * amplitude * ax,
                by + math::cos(p).abs() * amplitude * ay,
            );
        }

        let mut tail_angle = match input.emotion {
            EmotionalState::Aggressive | EmotionalState::Confident => 0.5,
            EmotionalState::Fearful | EmotionalState::Desperate => -0.5,
            _ => 0.1,
        };
        if speed > 0.01 || input.emotion == EmotionalState::Confident {
            tail_angle += math::sin(t * 8.0) * 0.2;
        }

        let stalking = input.behavior == Behavior::Ambush
            || (input.behavior == Behavior::Seek && !input.noticed);
        let head_pitch = if stalking {
            -0.2
        } else if input.behavior == Behavior::Retreat {
            0.15
        } else {
            0.0
        };
        let head_yaw = math::wrap_angle(
            math::atan2(input.to_player.y, input.to_player.x)
                - math::atan2(input.facing.y, input.facing.x),
        );

        let ear = match input.emotion {
            EmotionalState::Aggressive | EmotionalState::Confident => -0.2,
            EmotionalState::Fearful | EmotionalState::Hurt => 0.3,
            _ => 0.0,
        };

        let (body_stretch, body_offset_y) = if input.lunging {
            (1.2, -0.02)
        } else if speed > 0.01 {
            (1.0, math::sin(t * 12.0 * speed) * 0.005)
        } else {
            (1.0, 0.0)
        };

        let mut fur_ruffle = match input.emotion {
            EmotionalState::Aggressive | EmotionalState::Fearful => input.emotion_intensity * 0.1,
            _ => 0.0,
        };
        if speed_frac > 0.7 {
            fur_ruffle += speed_frac * 0.05;
        }

        Pose {
            legs,
            spine_bend: input.velocity.x * 0.1,
            tail_angle,
            head_pitch,
            head_yaw,
            ears: [ear, ear],
            body_stretch,
            body_offset_y,
            fur_ruffle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn still(emotion: EmotionalState) -> PoseInput {
        PoseInput {
            velocity: Vec2::ZERO,
            facing: Vec2::X,
            to_player: Vec2::X,
            emotion,
            emotion_intensity: 0.5,
            behavior: Behavior::Idle,
            noticed: true,
            lunging: false,
            max_speed: 0.26,
        }
    }

    #[test]
    fn standing_still_keeps_legs_at_rest() {
        let pose = Pose::derive(&still(EmotionalState::Calm), 3.0);
        assert_eq!(pose.legs[0], Vec2::new(-0.01, 0.01));
        assert_eq!(pose.body_stretch, 1.0);
        assert_eq!(pose.body_offset_y, 0.0);
        assert_eq!(pose.tail_angle, 0.1);
    }

    #[test]
    fn fear_tucks_tail_and_flattens_ears() {
        let pose = Pose::derive(&still(EmotionalState::Fearful), 1.0);
        assert_eq!(pose.tail_angle, -0.5);
        assert_eq!(pose.ears, [0.3, 0.3]);
        assert!(pose.fur_ruffle > 0.0);
    }

    #[test]
    fn lunge_stretches_body() {
        let mut input = still(EmotionalState::Aggressive);
        input.lunging = true;
        input.velocity = Vec2::new(0.2, 0.0);
        let pose = Pose::derive(&input, 2.0);
        assert_eq!(pose.body_stretch, 1.2);
        assert_eq!(pose.body_offset_y, -0.02);
    }

    #[test]
    fn head_tracks_player_relative_to_facing() {
        let mut input = still(EmotionalState::Calm);
        input.to_player = Vec2::new(0.0, 1.0);
        let pose = Pose::derive(&input, 0.0);
        assert!((pose.head_yaw - math::FRAC_PI_2).abs() < 1e-4);
    }
}
