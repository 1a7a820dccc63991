// Per-tick input: the only external mutation of simulation state.
//
// Everything outside the sim reaches it through a `TickInput`: the player's
// controller state for this tick plus any world postings (wind, sounds,
// danger zones, den placement) produced by collaborators. The sim is a pure
// function `(state, dt, input) -> (new_state, events)`.
//
// In lockstep play every peer appends an `InputFrame` per tick to a shared,
// ordered, lossless log and feeds the frames to `SimulationWorld::tick` in
// log order. Nothing else may reach the sim.
//
// Input is applied atomically at tick start: postings are ingested first, in
// the order listed, then the player state machine reads `player`. Held
// buttons are level-triggered (`block`); the rest are edge-free requests that
// the sim refuses silently when their preconditions fail.
//
// See also: `sim.rs` for `SimulationWorld::tick` which consumes these,
// `perception.rs` for where sound and danger postings land, `combat.rs` for
// the attack, roll and block requests.
//
// **Critical constraint: determinism.** Inputs are the sole external input
// to the sim. Two peers that apply the same frames from the same snapshot
// reach the same state.

use serde::{Deserialize, Serialize};

/// Controller state sampled for one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    /// Movement axes in `[-1, 1]`. Out-of-range and non-finite values are
    /// sanitized by the sim.
    pub move_x: f32,
    pub move_y: f32,
    pub light: bool,
    pub heavy: bool,
    pub special: bool,
    /// Held.
    pub block: bool,
    pub roll: bool,
    pub jump: bool,
}

impl PlayerInput {
    /// Pure movement with no buttons pressed.
    pub fn moving(move_x: f32, move_y: f32) -> Self {
        Self {
            move_x,
            move_y,
            ..Self::default()
        }
    }
}

/// Data a collaborator posts into the world for this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorldPosting {
    /// Replace the current wind vector (world units per second).
    Wind { x: f32, y: f32 },
    /// A sound at a world position. Enters the hearing ring buffer.
    Sound { x: f32, y: f32, intensity: f32 },
    /// A zone agents steer away from until it expires.
    Danger {
        x: f32,
        y: f32,
        radius: f32,
        strength: f32,
        duration: f32,
    },
    /// Place (or move) the pack den. A radius of zero clears it.
    Den { x: f32, y: f32, radius: f32 },
}

/// Everything applied to the sim in one tick.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub player: PlayerInput,
    pub postings: Vec<WorldPosting>,
}

impl From<PlayerInput> for TickInput {
    fn from(player: PlayerInput) -> Self {
        Self {
            player,
            postings: Vec::new(),
        }
    }
}

/// One entry of the lockstep input log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// Tick this frame is applied on (the world's tick count before the
    /// frame runs).
    pub tick: u64,
    pub dt: f32,
    pub input: TickInput,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serialization_roundtrip() {
        let frame = InputFrame {
            tick: 12,
            dt: 1.0 / 60.0,
            input: TickInput {
                player: PlayerInput {
                    move_x: 0.5,
                    light: true,
                    ..PlayerInput::default()
                },
                postings: vec![
                    WorldPosting::Wind { x: 0.1, y: 0.0 },
                    WorldPosting::Den {
                        x: 0.2,
                        y: 0.8,
                        radius: 0.1,
                    },
                ],
            },
        };
        let json = serde_json::to_string(&frame).unwrap();
        let restored: InputFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(frame, restored);
    }

    #[test]
    fn player_input_converts_into_tick_input() {
        let input: TickInput = PlayerInput::moving(1.0, 0.0).into();
        assert_eq!(input.player.move_x, 1.0);
        assert!(input.postings.is_empty());
    }
}
