// Pack agent state: one wolf.
//
// `Agent` is the per-slot record held by the `AgentPool` (see `pool.rs`).
// It carries body state (position, velocity, facing, health, stamina,
// fatigue), personality attributes, the perception `Memory`, the emotional
// layer, the current role and behavior, and every attack and coordination
// timer as an absolute timestamp on the sim clock.
//
// This file owns the parts of agent logic that touch only the agent itself:
// spawning with rolled attributes, the emotional-state update, damage intake
// and the timer predicates. Steering and attack decisions live in
// `behavior.rs`; sensing lives in `perception.rs`.
//
// See also: `pool.rs` for slot allocation, `lineage.rs` for who spawns
// agents, `pose.rs` for the derived animation pose.
//
// **Critical constraint: determinism.** `Agent::spawn` and
// `update_emotion` draw from the shared `SimRng`; callers invoke them in
// slot order so the draw sequence is identical on every peer.

use crate::clock::SimClock;
use crate::config::{AgentConfig, BiomeProfile};
use crate::math::{clamp01, decay_factor, Vec2};
use crate::pose::Pose;
use crate::prng::SimRng;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// What an agent believes about the player.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub last_seen: Vec2,
    pub last_seen_at: Option<f64>,
    pub seen_confidence: f32,
    pub scent_pos: Vec2,
    /// Best-known scent strength; decays so a stale peak can be beaten.
    pub scent_strength: f32,
    pub scent_confidence: f32,
    /// Smoothed estimate of the player's velocity while in sight.
    pub player_velocity: Vec2,
    pub last_player_block: Option<f64>,
    pub last_player_roll: Option<f64>,
    /// EMA of how often this agent's bites were blocked or parried.
    pub parry_rate: f32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub active: bool,
    pub lineage: Option<LineageId>,

    pub pos: Vec2,
    pub vel: Vec2,
    pub facing: Vec2,
    pub health: f32,
    pub stamina: f32,
    pub fatigue: f32,

    pub aggression: f32,
    pub intelligence: f32,
    pub coordination: f32,
    pub morale: f32,

    pub memory: Memory,
    pub emotion: EmotionalState,
    pub emotion_intensity: f32,
    pub role: Role,
    pub behavior: Behavior,

    pub noticed: bool,
    pub noticed_at: Option<f64>,
    pub lunge_end: Option<f64>,
    pub feint_end: Option<f64>,
    pub last_lunge: Option<f64>,
    pub lunge_dir: Vec2,
    /// Set once the current lunge has been resolved against the player.
    pub lunge_resolved: bool,
    pub stun_end: Option<f64>,
    pub ambush_ready_at: Option<f64>,

    pub target_locked: bool,
    pub retreat_until: Option<f64>,
    pub last_communication: Option<f64>,
    pub last_message_sent: Option<f64>,
    pub last_damage: Option<f64>,
    /// +1 or -1: which way this agent sweeps when searching or circling.
    pub sweep_sign: f32,

    pub successes: u32,
    pub failures: u32,

    #[serde(skip)]
    pub pose: Pose,
}

impl Agent {
    /// An inactive slot record.
    pub fn vacant(id: AgentId) -> Self {
        Agent {
            id,
            facing: Vec2::X,
            lunge_dir: Vec2::X,
            sweep_sign: 1.0,
            ..Agent::default()
        }
    }

    /// A fresh agent at `pos` with rolled attributes.
    ///
    /// Draws, in order: sweep direction, aggression, intelligence,
    /// coordination, morale.
    pub fn spawn(
        id: AgentId,
        pos: Vec2,
        lineage: Option<LineageId>,
        clock: &SimClock,
        rng: &mut SimRng,
        config: &AgentConfig,
        biome: &BiomeProfile,
    ) -> Self {
        let sweep_sign = if rng.chance(0.5) { 1.0 } else { -1.0 };
        let roll = |rng: &mut SimRng, (lo, hi): (f32, f32)| lo + rng.next_f32() * (hi - lo);
        let aggression = roll(rng, config.aggression_range);
        let intelligence = roll(rng, config.intelligence_range);
        let coordination = roll(rng, config.coordination_range);
        let morale = roll(rng, config.morale_range);
        let pos = pos.clamp_unit();

        Agent {
            id,
            active: true,
            lineage,
            pos,
            vel: Vec2::ZERO,
            facing: Vec2::X,
            health: clamp01(1.0 + biome.health),
            stamina: 1.0,
            fatigue: 0.0,
            aggression: clamp01(aggression + biome.aggression),
            intelligence: clamp01(intelligence + biome.intelligence),
            coordination: clamp01(coordination + biome.coordination),
            morale: clamp01(morale + biome.morale),
            memory: Memory {
                last_seen: pos,
                last_seen_at: Some(clock.now),
                scent_pos: pos,
                ..Memory::default()
            },
            emotion: EmotionalState::Calm,
            emotion_intensity: config.initial_emotion_intensity,
            role: Role::None,
            behavior: Behavior::Idle,
            lunge_dir: Vec2::X,
            sweep_sign,
            ..Agent::default()
        }
    }

    pub fn is_alive(&self) -> bool {
        self.active && self.health > 0.0
    }

    pub fn lunging(&self, clock: &SimClock) -> bool {
        clock.before(self.lunge_end)
    }

    pub fn feinting(&self, clock: &SimClock) -> bool {
        clock.before(self.feint_end)
    }

    pub fn stunned(&self, clock: &SimClock) -> bool {
        clock.before(self.stun_end)
    }

    /// Abort any lunge or feint in progress.
    pub fn cancel_attack(&mut self) {
        self.lunge_end = None;
        self.feint_end = None;
        self.lunge_resolved = true;
    }

    /// Take a hit from the player. Returns `true` if this killed the agent.
    pub fn take_damage(
        &mut self,
        amount: f32,
        knockback: Vec2,
        stun: f32,
        clock: &SimClock,
        config: &AgentConfig,
    ) -> bool {
        self.health = clamp01(self.health - amount);
        self.vel += knockback;
        self.stun_end = Some(clock.after(stun));
        self.last_damage = Some(clock.now);
        self.cancel_attack();
        self.emotion = EmotionalState::Hurt;
        self.emotion_intensity = self.emotion_intensity.max(config.hurt_intensity);
        self.health <= 0.0
    }

    pub fn success_rate(&self) -> f32 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.5
        } else {
            self.successes as f32 / total as f32
        }
    }

    /// Re-evaluate the emotional state and apply its attribute drift.
    ///
    /// Triggers are checked in priority order; the first that matches wins.
    /// A state change adopts the trigger's intensity, while staying in the
    /// same state keeps whichever intensity is higher. Draws from `rng` only
    /// while Frustrated.
    pub fn update_emotion(
        &mut self,
        pack_morale: f32,
        clock: &SimClock,
        dt: f32,
        rng: &mut SimRng,
        config: &AgentConfig,
    ) {
        self.emotion_intensity *= decay_factor(config.emotion_decay_per_sec, dt);

        let recently_hurt = clock.within(self.last_damage, config.damage_memory);
        let (next, intensity) = if self.health < 0.3 && self.fatigue > 0.7 {
            (EmotionalState::Fearful, 0.8)
        } else if pack_morale > 0.7 && self.success_rate() > 0.6 {
            (EmotionalState::Confident, 0.7)
        } else if self.failures > 3 && self.successes == 0 {
            (EmotionalState::Frustrated, 0.9)
        } else if self.health < 0.5 && pack_morale < 0.4 {
            (EmotionalState::Desperate, 0.85)
        } else if recently_hurt {
            (EmotionalState::Aggressive, 0.75)
        } else {
            (EmotionalState::Calm, self.emotion_intensity.max(0.3))
        };

        if next != self.emotion {
            self.emotion = next;
            self.emotion_intensity = intensity;
        } else {
            self.emotion_intensity = self.emotion_intensity.max(intensity);
        }

        let i = self.emotion_intensity;
        match self.emotion {
            EmotionalState::Aggressive => {
                self.aggression = clamp01(self.aggression + 0.2 * i * dt);
            }
            EmotionalState::Fearful => {
                self.aggression *= decay_factor(0.3 * i, dt);
                self.morale *= decay_factor(0.2 * i, dt);
            }
            EmotionalState::Desperate => self.aggression = 1.0,
            EmotionalState::Confident => {
                self.coordination = clamp01(self.coordination + 0.2 * i * dt);
                self.intelligence = clamp01(self.intelligence + 0.1 * i * dt);
            }
            EmotionalState::Frustrated => {
                self.aggression = clamp01(0.5 + rng.next_f32() * 0.5 * i);
            }
            EmotionalState::Calm | EmotionalState::Hurt => {}
        }
    }

    /// Whether every scalar is finite and in range. Checked by the integrity
    /// audit.
    pub fn is_sane(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        self.pos.is_finite()
            && self.vel.is_finite()
            && self.facing.is_finite()
            && unit(self.health)
            && unit(self.stamina)
            && unit(self.fatigue)
            && unit(self.aggression)
            && unit(self.intelligence)
            && unit(self.coordination)
            && unit(self.morale)
            && self.emotion_intensity.is_finite()
            && self.memory.seen_confidence.is_finite()
            && self.memory.scent_confidence.is_finite()
    }
}
