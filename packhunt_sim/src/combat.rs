// Player combat state machine.
//
// `PlayerCombat` tracks the attack sub-machine (Idle → Windup → Active →
// Recovery → Idle), the parallel roll sub-machine (Idle → Active → Sliding
// → Idle), the held block, and the windows that hang off them: combo,
// parry, counter, stun and hyperarmor. Every window is an absolute end time
// on the sim clock; phase progression compares elapsed time against the
// attack table in `CombatConfig`, scaled by the character's weapon profile.
//
// Requests (`try_attack`, `try_roll`, `try_feint`, `update_block`) return
// `false` and leave state untouched when a precondition fails. The caller
// owns stamina, so requests take it as `&mut f32` and only spend it on
// success.
//
// `handle_incoming_attack` resolves a bite against the player in a fixed
// order: roll i-frames or airborne, then range, then a facing-aligned block
// (perfect parry inside the parry window, plain block after), then a hit.
// It is called at most once per lunge.
//
// See also: `player.rs` for the body (movement, stamina, latch) that owns
// this machine, `behavior.rs` for the lunge that calls
// `handle_incoming_attack`, `sim.rs` for swing hit detection.
//
// **Critical constraint: determinism.** No randomness. All windows are
// timestamps, so a restored snapshot reproduces every phase exactly.

use crate::clock::SimClock;
use crate::config::{AttackTiming, CombatConfig, WeaponProfile};
use crate::math::{clamp01, Vec2};
use crate::types::{AgentId, AttackKind, AttackOutcome, AttackPhase, RollPhase};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerCombat {
    pub phase: AttackPhase,
    pub kind: Option<AttackKind>,
    /// When the current attack phase began.
    pub phase_start: Option<f64>,
    /// Facing locked at attack start.
    pub attack_dir: Vec2,
    /// Agents already struck by the current swing.
    pub struck: SmallVec<[AgentId; 8]>,
    /// The current swing started inside a counter window.
    pub counter_swing: bool,

    pub combo: u32,
    pub combo_expires: Option<f64>,

    pub blocking: bool,
    pub block_start: Option<f64>,
    pub block_facing: Vec2,
    /// Block input state on the previous tick, for press detection.
    pub block_held: bool,

    pub counter_end: Option<f64>,
    pub stun_end: Option<f64>,
    pub hyperarmor_end: Option<f64>,

    pub roll: RollPhase,
    pub roll_start: Option<f64>,
    pub roll_dir: Vec2,

    pub last_attack: Option<f64>,
    pub last_roll: Option<f64>,
}

/// Read-only view for UI and animation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombatTelemetry {
    pub phase: AttackPhase,
    pub kind: Option<AttackKind>,
    pub combo: u32,
    pub blocking: bool,
    pub parry_window_remaining: f32,
    pub counter_window_remaining: f32,
    pub stunned: bool,
    pub stun_remaining: f32,
    pub roll: RollPhase,
    pub hyperarmored: bool,
}

impl PlayerCombat {
    pub fn new() -> Self {
        Self {
            attack_dir: Vec2::X,
            block_facing: Vec2::X,
            roll_dir: Vec2::X,
            ..Self::default()
        }
    }

    pub fn stunned(&self, clock: &SimClock) -> bool {
        clock.before(self.stun_end)
    }

    pub fn hyperarmored(&self, clock: &SimClock) -> bool {
        clock.before(self.hyperarmor_end)
    }

    pub fn invulnerable(&self) -> bool {
        self.roll == RollPhase::Active
    }

    pub fn is_rolling(&self) -> bool {
        self.roll != RollPhase::Idle
    }

    /// Whether a swing is in its damaging phase.
    pub fn swing_active(&self) -> bool {
        self.phase == AttackPhase::Active
    }

    fn scaled(secs: f32, weapon: &WeaponProfile) -> f32 {
        if weapon.speed_mult > 0.0 {
            secs / weapon.speed_mult
        } else {
            secs
        }
    }

    fn phase_duration(timing: &AttackTiming, phase: AttackPhase, weapon: &WeaponProfile) -> f32 {
        let secs = match phase {
            AttackPhase::Idle => 0.0,
            AttackPhase::Windup => timing.windup,
            AttackPhase::Active => timing.active,
            AttackPhase::Recovery => timing.recovery,
        };
        Self::scaled(secs, weapon)
    }

    /// Damage the current swing deals to one target.
    pub fn swing_damage(&self, config: &CombatConfig, weapon: &WeaponProfile) -> f32 {
        let Some(kind) = self.kind else {
            return 0.0;
        };
        let mut damage = config.timing(kind).damage * weapon.damage_mult;
        if self.counter_swing {
            damage *= config.counter_damage_mult;
        }
        damage
    }

    /// Reach of the current swing.
    pub fn swing_range(&self, config: &CombatConfig, weapon: &WeaponProfile) -> f32 {
        config.attack_range * weapon.reach_mult
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    pub fn try_attack(
        &mut self,
        kind: AttackKind,
        facing: Vec2,
        stamina: &mut f32,
        clock: &SimClock,
        config: &CombatConfig,
        weapon: &WeaponProfile,
    ) -> bool {
        let cost = config.timing(kind).stamina_cost * weapon.stamina_mult;
        let ready_phase = matches!(self.phase, AttackPhase::Idle | AttackPhase::Recovery);
        if !ready_phase
            || self.stunned(clock)
            || self.is_rolling()
            || clock.since(self.last_attack) < config.attack_cooldown
            || *stamina < cost
        {
            return false;
        }

        *stamina = clamp01(*stamina - cost);
        self.phase = AttackPhase::Windup;
        self.kind = Some(kind);
        self.phase_start = Some(clock.now);
        self.attack_dir = facing.normalize_or(self.attack_dir);
        self.struck.clear();
        self.counter_swing = clock.before(self.counter_end);
        if self.counter_swing {
            self.counter_end = None;
        }
        self.last_attack = Some(clock.now);
        self.blocking = false;

        match kind {
            AttackKind::Light => {
                self.combo = if clock.before(self.combo_expires) {
                    self.combo + 1
                } else {
                    1
                };
                self.combo_expires = Some(clock.after(config.combo_window));
            }
            AttackKind::Heavy | AttackKind::Special => {
                self.combo = 0;
                self.combo_expires = None;
            }
        }

        let armored = kind == AttackKind::Special
            || (kind == AttackKind::Heavy && weapon.heavy_hyperarmor);
        if armored {
            let timing = config.timing(kind);
            let until = Self::scaled(timing.windup + timing.active, weapon);
            self.hyperarmor_end = Some(clock.after(until));
        }
        true
    }

    /// Cancel a Heavy attack during its windup. Keeps the cooldown stamp and
    /// refunds nothing.
    pub fn try_feint(&mut self) -> bool {
        if self.phase != AttackPhase::Windup || self.kind != Some(AttackKind::Heavy) {
            return false;
        }
        self.reset_attack();
        self.hyperarmor_end = None;
        true
    }

    pub fn try_roll(
        &mut self,
        dir: Vec2,
        facing: Vec2,
        stamina: &mut f32,
        clock: &SimClock,
        config: &CombatConfig,
    ) -> bool {
        if self.stunned(clock)
            || self.is_rolling()
            || clock.since(self.last_roll) < config.roll_cooldown
            || *stamina <= 0.0
        {
            return false;
        }
        *stamina = clamp01(*stamina - config.roll_cost);
        self.roll = RollPhase::Active;
        self.roll_start = Some(clock.now);
        self.roll_dir = dir.normalize_or(facing.normalize_or(Vec2::X));
        self.last_roll = Some(clock.now);
        self.blocking = false;
        if self.phase == AttackPhase::Windup {
            self.reset_attack();
            self.hyperarmor_end = None;
        }
        true
    }

    /// Apply the held block input. Returns `true` when a block started this
    /// tick. A press during a Heavy windup feints it first.
    pub fn update_block(
        &mut self,
        held: bool,
        facing: Vec2,
        stamina: &mut f32,
        clock: &SimClock,
        config: &CombatConfig,
    ) -> BlockInput {
        let pressed = held && !self.block_held;
        self.block_held = held;

        let feinted = pressed && self.try_feint();

        if !held {
            self.blocking = false;
            return BlockInput { feinted, started: false };
        }
        if self.blocking {
            self.block_facing = facing.normalize_or(self.block_facing);
            return BlockInput { feinted, started: false };
        }

        let can_start = matches!(self.phase, AttackPhase::Idle | AttackPhase::Recovery)
            && !self.stunned(clock)
            && !self.is_rolling()
            && *stamina >= config.block_start_cost;
        if !can_start {
            return BlockInput { feinted, started: false };
        }
        *stamina = clamp01(*stamina - config.block_start_cost);
        self.blocking = true;
        self.block_start = Some(clock.now);
        self.block_facing = facing.normalize_or(self.block_facing);
        if self.phase == AttackPhase::Recovery {
            self.reset_attack();
        }
        BlockInput { feinted, started: true }
    }

    // -----------------------------------------------------------------------
    // Time progression
    // -----------------------------------------------------------------------

    /// Advance phases by elapsed time and drain the block. Returns the phase
    /// the attack entered this tick, if any.
    pub fn advance(
        &mut self,
        stamina: &mut f32,
        clock: &SimClock,
        dt: f32,
        config: &CombatConfig,
        weapon: &WeaponProfile,
    ) -> Option<AttackPhase> {
        let mut entered = None;
        if let Some(kind) = self.kind {
            let timing = config.timing(kind).clone();
            // Several short phases can elapse within one long tick.
            while self.phase != AttackPhase::Idle {
                let elapsed = clock.since(self.phase_start);
                let duration = Self::phase_duration(&timing, self.phase, weapon);
                if elapsed < duration {
                    break;
                }
                let start = self.phase_start.map(|s| s + f64::from(duration));
                self.phase = match self.phase {
                    AttackPhase::Windup => AttackPhase::Active,
                    AttackPhase::Active => AttackPhase::Recovery,
                    AttackPhase::Recovery | AttackPhase::Idle => AttackPhase::Idle,
                };
                self.phase_start = start;
                entered = Some(self.phase);
            }
            if self.phase == AttackPhase::Idle {
                self.reset_attack();
            }
        }

        match self.roll {
            RollPhase::Active if clock.since(self.roll_start) >= config.roll_iframe => {
                self.roll = RollPhase::Sliding;
            }
            _ => {}
        }
        if self.roll == RollPhase::Sliding
            && clock.since(self.roll_start) >= config.roll_iframe + config.roll_slide
        {
            self.roll = RollPhase::Idle;
        }

        if self.combo > 0 && !clock.before(self.combo_expires) {
            self.combo = 0;
            self.combo_expires = None;
        }

        if self.blocking {
            *stamina = clamp01(*stamina - config.block_drain_per_sec * dt);
            if *stamina <= 0.0 {
                self.blocking = false;
            }
        }
        entered
    }

    fn reset_attack(&mut self) {
        self.phase = AttackPhase::Idle;
        self.kind = None;
        self.phase_start = None;
        self.struck.clear();
        self.counter_swing = false;
    }

    /// Stun the player unless hyperarmored. A stun interrupts a windup.
    pub fn apply_stun(&mut self, secs: f32, clock: &SimClock) -> bool {
        if self.hyperarmored(clock) {
            return false;
        }
        let end = clock.after(secs);
        self.stun_end = Some(self.stun_end.map_or(end, |e| e.max(end)));
        self.blocking = false;
        if self.phase == AttackPhase::Windup {
            self.reset_attack();
        }
        true
    }

    // -----------------------------------------------------------------------
    // Incoming attacks
    // -----------------------------------------------------------------------

    /// Resolve one bite from `attacker` against the player at `player_pos`.
    /// Applies the combat-side effects (parry stamina refill, counter
    /// window, block chip, stun on hit); the caller applies damage,
    /// knockback, the attacker's stun and the latch.
    pub fn handle_incoming_attack(
        &mut self,
        attacker: Vec2,
        player_pos: Vec2,
        airborne: bool,
        stamina: &mut f32,
        clock: &SimClock,
        config: &CombatConfig,
    ) -> AttackOutcome {
        if self.invulnerable() || airborne {
            return AttackOutcome::Miss;
        }
        let offset = attacker - player_pos;
        if offset.length() > config.attack_range {
            return AttackOutcome::Miss;
        }
        let toward = offset.normalized();
        if self.blocking && self.block_facing.dot(toward) >= config.block_facing_cos {
            if clock.within(self.block_start, config.parry_window) {
                *stamina = 1.0;
                self.counter_end = Some(clock.after(config.counter_window));
                return AttackOutcome::PerfectParry;
            }
            *stamina = clamp01(*stamina - config.block_chip_cost);
            if *stamina <= 0.0 {
                self.blocking = false;
            }
            return AttackOutcome::Block;
        }
        self.apply_stun(config.player_hit_stun, clock);
        AttackOutcome::Hit
    }

    pub fn telemetry(&self, clock: &SimClock, config: &CombatConfig) -> CombatTelemetry {
        let parry_end = if self.blocking {
            self.block_start.map(|s| s + f64::from(config.parry_window))
        } else {
            None
        };
        CombatTelemetry {
            phase: self.phase,
            kind: self.kind,
            combo: self.combo,
            blocking: self.blocking,
            parry_window_remaining: clock.remaining(parry_end),
            counter_window_remaining: clock.remaining(self.counter_end),
            stunned: self.stunned(clock),
            stun_remaining: clock.remaining(self.stun_end),
            roll: self.roll,
            hyperarmored: self.hyperarmored(clock),
        }
    }

    /// Structural invariants checked by the integrity audit.
    pub fn is_consistent(&self) -> bool {
        let attack_ok = match self.phase {
            AttackPhase::Idle => self.kind.is_none(),
            _ => self.kind.is_some() && self.phase_start.is_some(),
        };
        let roll_ok = self.roll == RollPhase::Idle || self.roll_start.is_some();
        let block_ok = !self.blocking || self.block_start.is_some();
        attack_ok && roll_ok && block_ok && self.attack_dir.is_finite()
    }
}

/// Result of applying the block input for one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInput {
    pub feinted: bool,
    pub started: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    struct Rig {
        combat: PlayerCombat,
        stamina: f32,
        clock: SimClock,
        config: SimConfig,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                combat: PlayerCombat::new(),
                stamina: 1.0,
                clock: SimClock::new(),
                config: SimConfig::default(),
            }
        }

        fn attack(&mut self, kind: AttackKind) -> bool {
            let weapon = self.config.weapons.warden.clone();
            self.combat.try_attack(
                kind,
                Vec2::X,
                &mut self.stamina,
                &self.clock,
                &self.config.combat,
                &weapon,
            )
        }

        fn step(&mut self, dt: f32) {
            self.clock.advance(dt);
            let weapon = self.config.weapons.warden.clone();
            self.combat
                .advance(&mut self.stamina, &self.clock, dt, &self.config.combat, &weapon);
        }

        fn block(&mut self, held: bool) -> BlockInput {
            self.combat.update_block(
                held,
                Vec2::X,
                &mut self.stamina,
                &self.clock,
                &self.config.combat,
            )
        }

        fn bite_from(&mut self, attacker: Vec2) -> AttackOutcome {
            self.combat.handle_incoming_attack(
                attacker,
                Vec2::new(0.5, 0.5),
                false,
                &mut self.stamina,
                &self.clock,
                &self.config.combat,
            )
        }
    }

    #[test]
    fn light_attack_runs_through_all_phases() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Light));
        assert_eq!(rig.combat.phase, AttackPhase::Windup);
        assert!((rig.stamina - 0.85).abs() < 1e-6);
        rig.step(0.05);
        assert_eq!(rig.combat.phase, AttackPhase::Active);
        rig.step(0.08);
        assert_eq!(rig.combat.phase, AttackPhase::Recovery);
        rig.step(0.15);
        assert_eq!(rig.combat.phase, AttackPhase::Idle);
        assert!(rig.combat.kind.is_none());
    }

    #[test]
    fn only_one_attack_in_flight() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Heavy));
        let stamina = rig.stamina;
        rig.step(0.2);
        assert_eq!(rig.combat.phase, AttackPhase::Active);
        assert!(!rig.attack(AttackKind::Light), "active swing must refuse");
        assert_eq!(rig.stamina, stamina);
    }

    #[test]
    fn cooldown_gates_next_attack() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Light));
        rig.step(0.25);
        assert_eq!(rig.combat.phase, AttackPhase::Recovery);
        assert!(!rig.attack(AttackKind::Light));
        rig.step(0.11);
        assert!(rig.attack(AttackKind::Light));
    }

    #[test]
    fn insufficient_stamina_refuses_without_mutation() {
        let mut rig = Rig::new();
        rig.stamina = 0.3;
        let before = rig.combat.clone();
        assert!(!rig.attack(AttackKind::Special));
        assert_eq!(rig.combat, before);
        assert_eq!(rig.stamina, 0.3);
    }

    #[test]
    fn light_combo_increments_then_resets() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Light));
        assert_eq!(rig.combat.combo, 1);
        rig.step(0.4);
        assert!(rig.attack(AttackKind::Light));
        assert_eq!(rig.combat.combo, 2);
        for _ in 0..12 {
            rig.step(0.1);
        }
        assert_eq!(rig.combat.combo, 0);
        assert!(rig.attack(AttackKind::Light));
        assert_eq!(rig.combat.combo, 1);
    }

    #[test]
    fn heavy_resets_combo() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Light));
        rig.step(0.4);
        assert!(rig.attack(AttackKind::Heavy));
        assert_eq!(rig.combat.combo, 0);
    }

    #[test]
    fn special_grants_hyperarmor_until_active_ends() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Special));
        rig.step(0.3);
        assert!(rig.combat.hyperarmored(&rig.clock));
        assert!(!rig.combat.apply_stun(0.25, &rig.clock));
        rig.step(0.06);
        assert!(!rig.combat.hyperarmored(&rig.clock));
    }

    #[test]
    fn block_press_feints_heavy_windup() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Heavy));
        let stamp = rig.combat.last_attack;
        let input = rig.block(true);
        assert!(input.feinted);
        assert!(input.started);
        assert_eq!(rig.combat.phase, AttackPhase::Idle);
        assert_eq!(rig.combat.last_attack, stamp);
    }

    #[test]
    fn light_windup_cannot_be_feinted() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Light));
        let input = rig.block(true);
        assert!(!input.feinted);
        assert!(!input.started);
        assert_eq!(rig.combat.phase, AttackPhase::Windup);
    }

    #[test]
    fn roll_has_iframes_then_slides() {
        let mut rig = Rig::new();
        assert!(rig.combat.try_roll(
            Vec2::X,
            Vec2::X,
            &mut rig.stamina,
            &rig.clock,
            &rig.config.combat
        ));
        assert!((rig.stamina - 0.8).abs() < 1e-6);
        assert_eq!(rig.bite_from(Vec2::new(0.52, 0.5)), AttackOutcome::Miss);
        rig.step(0.3);
        assert_eq!(rig.combat.roll, RollPhase::Sliding);
        assert!(!rig.combat.invulnerable());
        rig.step(0.2);
        assert_eq!(rig.combat.roll, RollPhase::Idle);
    }

    #[test]
    fn roll_cancels_windup_and_respects_cooldown() {
        let mut rig = Rig::new();
        assert!(rig.attack(AttackKind::Heavy));
        let cfg = rig.config.combat.clone();
        assert!(rig.combat.try_roll(Vec2::X, Vec2::X, &mut rig.stamina, &rig.clock, &cfg));
        assert_eq!(rig.combat.phase, AttackPhase::Idle);
        rig.step(0.6);
        assert!(!rig.combat.try_roll(Vec2::X, Vec2::X, &mut rig.stamina, &rig.clock, &cfg));
        rig.step(0.25);
        assert!(rig.combat.try_roll(Vec2::X, Vec2::X, &mut rig.stamina, &rig.clock, &cfg));
    }

    #[test]
    fn perfect_parry_refills_stamina_and_opens_counter() {
        let mut rig = Rig::new();
        rig.stamina = 0.4;
        assert!(rig.block(true).started);
        rig.step(0.05);
        assert_eq!(rig.bite_from(Vec2::new(0.54, 0.5)), AttackOutcome::PerfectParry);
        assert_eq!(rig.stamina, 1.0);
        let t = rig.combat.telemetry(&rig.clock, &rig.config.combat);
        assert!(t.counter_window_remaining > 0.0);
    }

    #[test]
    fn late_block_chips_and_wrong_facing_hits() {
        let mut rig = Rig::new();
        assert!(rig.block(true).started);
        rig.step(0.5);
        let before = rig.stamina;
        assert_eq!(rig.bite_from(Vec2::new(0.54, 0.5)), AttackOutcome::Block);
        assert!(rig.stamina < before);
        assert_eq!(rig.bite_from(Vec2::new(0.46, 0.5)), AttackOutcome::Hit);
        assert!(rig.combat.stunned(&rig.clock));
    }

    #[test]
    fn out_of_range_bite_misses() {
        let mut rig = Rig::new();
        assert_eq!(rig.bite_from(Vec2::new(0.7, 0.5)), AttackOutcome::Miss);
    }

    #[test]
    fn block_drains_and_drops_at_zero() {
        let mut rig = Rig::new();
        rig.stamina = 0.15;
        assert!(rig.block(true).started);
        for _ in 0..10 {
            rig.step(0.1);
        }
        assert!(!rig.combat.blocking);
        assert_eq!(rig.stamina, 0.0);
    }

    #[test]
    fn counter_swing_deals_bonus_damage() {
        let mut rig = Rig::new();
        rig.combat.counter_end = Some(1.0);
        assert!(rig.attack(AttackKind::Light));
        let weapon = rig.config.weapons.warden.clone();
        let dmg = rig.combat.swing_damage(&rig.config.combat, &weapon);
        assert!((dmg - 0.30).abs() < 1e-6);
    }
}
