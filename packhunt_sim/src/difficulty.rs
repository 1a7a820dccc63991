// Adaptive difficulty: player-skill estimation and live AI parameters.
//
// `Difficulty` watches what the player does (dodges, blocks, damage taken,
// how cleanly they move, kills and deaths), folds it into a skill score in
// [0, 1] and, every retune interval, nudges the live `DifficultyParams`
// toward skill-dependent targets. The params are multiplicative modifiers
// and ranges read by perception (vision, hearing), the agent controller
// (speed, cooldown, reaction, feint, aggression, intelligence) and the pack
// controller (coordination).
//
// Retuning moves each parameter a fixed fraction toward its target; nothing
// ever snaps, so a sudden streak shifts the AI over several intervals.
//
// See also: `config.rs` (`DifficultyConfig`) for the weights, ranges and
// intervals, `sim.rs` for where outcomes are recorded.
//
// **Critical constraint: determinism.** No randomness; all timing is clock
// stamps. Params change only at retune ticks, so every subsystem within a
// tick reads the same values.

use crate::clock::SimClock;
use crate::config::DifficultyConfig;
use crate::math::{approach, clamp01};
use serde::{Deserialize, Serialize};

/// Live AI parameters derived from the player-skill estimate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyParams {
    /// Multiplier on agent movement speed.
    pub speed: f32,
    pub aggression: f32,
    pub intelligence: f32,
    pub coordination: f32,
    /// Base feint probability.
    pub feint: f32,
    /// Multiplier on the lunge cooldown.
    pub cooldown: f32,
    /// Seconds-scale hesitation before a first lunge.
    pub reaction: f32,
    /// Seek (sight) range in world units.
    pub vision: f32,
    /// Maximum hearing distance in world units.
    pub hearing: f32,
}

impl Default for DifficultyParams {
    fn default() -> Self {
        Self {
            speed: 1.0,
            aggression: 0.5,
            intelligence: 0.5,
            coordination: 0.5,
            feint: 0.35,
            cooldown: 0.9,
            reaction: 0.2,
            vision: 0.45,
            hearing: 0.5,
        }
    }
}

impl DifficultyParams {
    /// Minimum time an agent must chase before its first lunge.
    pub fn min_chase(&self, base: f32) -> f32 {
        base * (0.5 + 2.0 * self.reaction)
    }

    /// Effective lunge cooldown: the cooldown multiplier, shortened by
    /// global aggression (neutral at 0.5).
    pub fn lunge_cooldown(&self, base: f32) -> f32 {
        base * self.cooldown * (1.5 - self.aggression)
    }

    /// Agent intelligence scaled by the global intelligence parameter
    /// (neutral at 0.5).
    pub fn effective_intelligence(&self, agent_intelligence: f32) -> f32 {
        clamp01(agent_intelligence * (0.5 + self.intelligence))
    }

    /// Pack message radius scaled by the coordination parameter.
    pub fn comm_radius(&self, base: f32) -> f32 {
        base * (0.5 + self.coordination)
    }
}

/// Observed player performance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerMetrics {
    pub dodge_success: f32,
    pub block_success: f32,
    pub damage_avoidance: f32,
    pub movement_efficiency: f32,
    pub kills: u32,
    pub deaths: u32,
    pub kill_streak: u32,
    pub death_streak: u32,
    /// Kills in the last completed window.
    pub kill_rate: f32,
    pub window_kills: u32,
    pub window_start: f64,
}

impl Default for PlayerMetrics {
    fn default() -> Self {
        Self {
            dodge_success: 0.5,
            block_success: 0.5,
            damage_avoidance: 0.5,
            movement_efficiency: 0.5,
            kills: 0,
            deaths: 0,
            kill_streak: 0,
            death_streak: 0,
            kill_rate: 0.0,
            window_kills: 0,
            window_start: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Difficulty {
    pub metrics: PlayerMetrics,
    pub params: DifficultyParams,
    /// Skill at the last retune.
    pub skill: f32,
    pub next_retune: f64,
}

impl Difficulty {
    pub fn new(clock: &SimClock, config: &DifficultyConfig) -> Self {
        Self {
            metrics: PlayerMetrics {
                window_start: clock.now,
                ..PlayerMetrics::default()
            },
            params: DifficultyParams::default(),
            skill: 0.5,
            next_retune: clock.after(config.retune_interval),
        }
    }

    fn ema(value: &mut f32, sample: f32, config: &DifficultyConfig) {
        *value = clamp01(*value * config.ema_keep + sample * (1.0 - config.ema_keep));
    }

    /// An evasion attempt: `true` when a bite was evaded by roll or jump,
    /// `false` when it landed.
    pub fn record_dodge(&mut self, evaded: bool, config: &DifficultyConfig) {
        Self::ema(
            &mut self.metrics.dodge_success,
            if evaded { 1.0 } else { 0.0 },
            config,
        );
    }

    /// A guarded bite, scored 1 for a perfect parry and less for a plain
    /// block; an unguarded hit scores 0.
    pub fn record_block(&mut self, quality: f32, config: &DifficultyConfig) {
        Self::ema(&mut self.metrics.block_success, clamp01(quality), config);
    }

    /// One resolved bite: whether the player avoided taking damage.
    pub fn record_damage(&mut self, avoided: bool, config: &DifficultyConfig) {
        Self::ema(
            &mut self.metrics.damage_avoidance,
            if avoided { 1.0 } else { 0.0 },
            config,
        );
    }

    /// Per-tick movement sample: achieved speed over commanded speed while
    /// the player is steering. Smoothed per second rather than per tick.
    pub fn observe_movement(&mut self, efficiency: f32, dt: f32, config: &DifficultyConfig) {
        let k = (1.0 - config.ema_keep) * dt;
        self.metrics.movement_efficiency =
            clamp01(approach(self.metrics.movement_efficiency, clamp01(efficiency), k));
    }

    pub fn record_kill(&mut self) {
        let m = &mut self.metrics;
        m.kills += 1;
        m.window_kills += 1;
        m.kill_streak += 1;
        m.death_streak = 0;
    }

    pub fn record_death(&mut self) {
        let m = &mut self.metrics;
        m.deaths += 1;
        m.death_streak += 1;
        m.kill_streak = 0;
    }

    /// Skill score from the current metrics.
    pub fn compute_skill(&self, config: &DifficultyConfig) -> f32 {
        let m = &self.metrics;
        let kill_rate = m.kill_rate.max(m.window_kills as f32);
        let kill_term = if config.kill_rate_cap > 0.0 {
            (kill_rate / config.kill_rate_cap).min(1.0)
        } else {
            0.0
        };
        let mut skill = m.dodge_success * config.dodge_weight
            + m.block_success * config.block_weight
            + m.damage_avoidance * config.avoidance_weight
            + m.movement_efficiency * config.movement_weight
            + kill_term * config.kill_weight;
        if m.death_streak > config.death_streak {
            skill *= config.struggling_scale;
        }
        if m.kill_streak > config.kill_streak {
            skill *= config.dominant_scale;
        }
        clamp01(skill)
    }

    /// Roll the kill window and, when due, retune. Returns the new skill if
    /// a retune happened this tick.
    pub fn update(&mut self, clock: &SimClock, config: &DifficultyConfig) -> Option<f32> {
        if (clock.now - self.metrics.window_start) as f32 >= config.kill_window {
            self.metrics.kill_rate = self.metrics.window_kills as f32;
            self.metrics.window_kills = 0;
            self.metrics.window_start = clock.now;
        }

        if clock.now < self.next_retune {
            return None;
        }
        self.next_retune = clock.after(config.retune_interval);

        let skill = self.compute_skill(config);
        self.skill = skill;
        let rate = config.adapt_rate;
        let p = &mut self.params;
        p.speed = approach(p.speed, config.speed.at(skill), rate);
        p.aggression = approach(p.aggression, config.aggression.at(skill), rate);
        p.intelligence = approach(p.intelligence, config.intelligence.at(skill), rate);
        p.coordination = approach(p.coordination, config.coordination.at(skill), rate);
        p.feint = approach(p.feint, config.feint.at(skill), rate);
        p.cooldown = approach(p.cooldown, config.cooldown.at(skill), rate);
        p.reaction = approach(p.reaction, config.reaction.at(skill), rate);
        p.vision = approach(p.vision, config.vision.at(skill), rate);
        p.hearing = approach(p.hearing, config.hearing.at(skill), rate);

        // Old evidence fades toward neutral.
        let m = &mut self.metrics;
        let fade = |v: f32| 0.5 + (v - 0.5) * config.metric_decay;
        m.dodge_success = fade(m.dodge_success);
        m.block_success = fade(m.block_success);
        m.damage_avoidance = fade(m.damage_avoidance);
        m.movement_efficiency = fade(m.movement_efficiency);
        m.kill_rate *= config.metric_decay;

        Some(skill)
    }

    pub fn is_sane(&self) -> bool {
        let p = &self.params;
        let m = &self.metrics;
        [
            p.speed,
            p.aggression,
            p.intelligence,
            p.coordination,
            p.feint,
            p.cooldown,
            p.reaction,
            p.vision,
            p.hearing,
            self.skill,
            m.kill_rate,
        ]
        .iter()
        .all(|v| v.is_finite() && *v >= 0.0)
            && [
                m.dodge_success,
                m.block_success,
                m.damage_avoidance,
                m.movement_efficiency,
                self.skill,
            ]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
            && self.next_retune.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> (Difficulty, DifficultyConfig, SimClock) {
        let config = DifficultyConfig::default();
        let clock = SimClock::new();
        (Difficulty::new(&clock, &config), config, clock)
    }

    #[test]
    fn neutral_metrics_give_middling_skill() {
        let (d, config, _) = fresh();
        // .5 on every EMA term, no kills.
        assert!((d.compute_skill(&config) - 0.425).abs() < 1e-6);
    }

    #[test]
    fn retune_waits_for_interval() {
        let (mut d, config, mut clock) = fresh();
        clock.advance(5.0);
        assert!(d.update(&clock, &config).is_none());
        clock.advance(5.0);
        assert!(d.update(&clock, &config).is_some());
        assert!(d.update(&clock, &config).is_none());
    }

    #[test]
    fn params_move_gradually_toward_target() {
        let (mut d, config, mut clock) = fresh();
        for _ in 0..30 {
            d.record_dodge(true, &config);
            d.record_block(1.0, &config);
            d.record_damage(true, &config);
        }
        let before = d.params.speed;
        clock.advance(10.0);
        let skill = d.update(&clock, &config).unwrap();
        let target = config.speed.at(skill);
        assert!(skill > 0.5);
        assert!(d.params.speed > before);
        assert!(d.params.speed < target);
        assert!((d.params.speed - (before + (target - before) * 0.1)).abs() < 1e-6);
    }

    #[test]
    fn death_streak_scales_skill_down() {
        let (mut d, config, _) = fresh();
        let base = d.compute_skill(&config);
        for _ in 0..4 {
            d.record_death();
        }
        assert!((d.compute_skill(&config) - base * 0.7).abs() < 1e-6);
        d.record_kill();
        assert_eq!(d.metrics.death_streak, 0);
    }

    #[test]
    fn kill_window_rolls_into_rate() {
        let (mut d, config, mut clock) = fresh();
        for _ in 0..3 {
            d.record_kill();
        }
        clock.advance(61.0);
        d.update(&clock, &config);
        assert_eq!(d.metrics.window_kills, 0);
        // Rolled to 3, then faded once by the retune in the same tick.
        assert!((d.metrics.kill_rate - 3.0 * 0.95).abs() < 1e-5);
    }

    #[test]
    fn derived_ranges_respond_to_params() {
        let mut p = DifficultyParams::default();
        let slow = p.min_chase(0.75);
        p.reaction = 0.1;
        assert!(p.min_chase(0.75) < slow);
        assert_eq!(DifficultyParams::default().comm_radius(0.4), 0.4);
    }
}
