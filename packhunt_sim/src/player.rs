// The player body: movement, stamina, jump, latch and damage intake.
//
// `Player` owns the physical side of the player and the `PlayerCombat`
// machine that rides on it. Each tick the world calls, in order:
//
// 1. `apply_input`: block (with feint-on-press), roll, jump and attack
//    requests, in that order. Attacks are tried Special, then Heavy, then
//    Light; the first that starts wins.
// 2. `advance`: combat phase progression, stamina regeneration, vertical
//    motion, then horizontal movement resolved through `Terrain`.
//
// Horizontal movement has four mutually exclusive modes, checked in order:
// downed (no motion), latched (dragged toward the latching wolf), rolling
// (fixed speed along the roll direction, low friction while sliding) and
// free (accelerate toward the input, friction when idle). Blocking and
// stun suppress acceleration.
//
// See also: `combat.rs` for the attack, roll and block state machine,
// `sim.rs` for the tick order and swing hit detection.
//
// **Critical constraint: determinism.** No randomness. Input axes are
// sanitized before use so malformed input cannot inject NaN.

use crate::clock::SimClock;
use crate::combat::PlayerCombat;
use crate::config::{CombatConfig, PlayerConfig, WeaponProfile};
use crate::event::{EventLog, SimEventKind};
use crate::input::PlayerInput;
use crate::math::{clamp01, decay_factor, Vec2};
use crate::terrain::Terrain;
use crate::types::{AgentId, AttackKind, AttackPhase, RollPhase};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    pub vel: Vec2,
    pub facing: Vec2,
    pub health: f32,
    pub stamina: f32,
    /// Height above ground while jumping.
    pub height: f32,
    pub vertical_speed: f32,
    /// Sanitized movement input from the current tick.
    pub move_input: Vec2,

    pub latched_by: Option<AgentId>,
    pub latch_end: Option<f64>,
    pub intimidated_by: Option<AgentId>,
    pub intimidate_end: Option<f64>,

    pub downed: bool,
    pub kills: u32,
    pub combat: PlayerCombat,
}

impl Player {
    pub fn new(config: &PlayerConfig) -> Self {
        Self {
            pos: config.spawn.clamp_unit(),
            vel: Vec2::ZERO,
            facing: Vec2::X,
            health: 1.0,
            stamina: 1.0,
            height: 0.0,
            vertical_speed: 0.0,
            move_input: Vec2::ZERO,
            latched_by: None,
            latch_end: None,
            intimidated_by: None,
            intimidate_end: None,
            downed: false,
            kills: 0,
            combat: PlayerCombat::new(),
        }
    }

    pub fn airborne(&self, config: &PlayerConfig) -> bool {
        self.height > config.airborne_clearance
    }

    pub fn on_ground(&self) -> bool {
        self.height <= 0.0 && self.vertical_speed == 0.0
    }

    pub fn latched(&self, clock: &SimClock) -> bool {
        self.latched_by.is_some() && clock.before(self.latch_end)
    }

    fn sanitize(input: &PlayerInput) -> Vec2 {
        let axis = |v: f32| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 };
        Vec2::new(axis(input.move_x), axis(input.move_y)).clamp_length(1.0)
    }

    /// Process this tick's button requests. Refused requests change nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_input(
        &mut self,
        input: &PlayerInput,
        clock: &SimClock,
        player_config: &PlayerConfig,
        combat_config: &CombatConfig,
        weapon: &WeaponProfile,
        sounds: &mut Vec<(Vec2, f32)>,
        events: &mut EventLog,
    ) {
        self.move_input = Self::sanitize(input);
        if self.downed {
            self.combat.blocking = false;
            return;
        }
        let facing = self.move_input.normalize_or(self.facing);

        let block = self.combat.update_block(
            input.block,
            facing,
            &mut self.stamina,
            clock,
            combat_config,
        );
        if block.feinted {
            events.push(SimEventKind::AttackFeinted);
        }

        if input.roll
            && !self.latched(clock)
            && self.combat.try_roll(
                self.move_input,
                self.facing,
                &mut self.stamina,
                clock,
                combat_config,
            )
        {
            sounds.push((self.pos, combat_config.roll_sound));
            events.push(SimEventKind::RollStarted);
        }

        if input.jump && self.try_jump(clock, player_config) {
            sounds.push((self.pos, combat_config.jump_sound));
            events.push(SimEventKind::Jumped);
        }

        let requested = [
            (input.special, AttackKind::Special),
            (input.heavy, AttackKind::Heavy),
            (input.light, AttackKind::Light),
        ];
        for (pressed, kind) in requested {
            if pressed
                && self.combat.try_attack(
                    kind,
                    facing,
                    &mut self.stamina,
                    clock,
                    combat_config,
                    weapon,
                )
            {
                self.facing = self.combat.attack_dir;
                sounds.push((self.pos, combat_config.attack_sound));
                events.push(SimEventKind::AttackStarted {
                    kind,
                    combo: self.combat.combo,
                });
                break;
            }
        }
    }

    /// Start a jump. Refused while airborne, stunned, latched, or when
    /// stamina is at or below the jump floor.
    pub fn try_jump(&mut self, clock: &SimClock, config: &PlayerConfig) -> bool {
        if self.downed
            || !self.on_ground()
            || self.combat.stunned(clock)
            || self.latched(clock)
            || self.stamina <= config.jump_min_stamina
        {
            return false;
        }
        self.stamina = clamp01(self.stamina - config.jump_cost);
        self.vertical_speed = config.jump_velocity;
        true
    }

    /// Integrate one tick of motion and resources. `latch_anchor` is the
    /// position of the latching agent, if it is still active.
    #[allow(clippy::too_many_arguments)]
    pub fn advance(
        &mut self,
        latch_anchor: Option<Vec2>,
        terrain: &dyn Terrain,
        clock: &SimClock,
        dt: f32,
        player_config: &PlayerConfig,
        combat_config: &CombatConfig,
        weapon: &WeaponProfile,
        intimidate_regen_mult: f32,
    ) {
        self.combat
            .advance(&mut self.stamina, clock, dt, combat_config, weapon);

        if self.latched_by.is_some() && (!clock.before(self.latch_end) || latch_anchor.is_none()) {
            self.latched_by = None;
            self.latch_end = None;
        }
        if self.intimidated_by.is_some() && !clock.before(self.intimidate_end) {
            self.intimidated_by = None;
            self.intimidate_end = None;
        }

        if !self.combat.blocking && !self.downed {
            let mut regen = player_config.stamina_regen;
            if self.intimidated_by.is_some() {
                regen *= intimidate_regen_mult;
            }
            self.stamina = clamp01(self.stamina + regen * dt);
        }

        if self.vertical_speed != 0.0 || self.height > 0.0 {
            self.height += self.vertical_speed * dt;
            self.vertical_speed -= player_config.gravity * dt;
            if self.height <= 0.0 {
                self.height = 0.0;
                self.vertical_speed = 0.0;
            }
        }

        let stunned = self.combat.stunned(clock);
        match (self.downed, latch_anchor.filter(|_| self.latched_by.is_some())) {
            (true, _) => self.vel = Vec2::ZERO,
            (false, Some(anchor)) => {
                self.vel = (anchor - self.pos).normalized() * combat_config.latch_drag_speed;
            }
            (false, None) => match self.combat.roll {
                RollPhase::Active => {
                    self.vel = self.combat.roll_dir
                        * (player_config.move_speed * combat_config.roll_speed_mult);
                }
                RollPhase::Sliding => {
                    let friction = player_config.friction * combat_config.roll_slide_friction;
                    self.vel = self.vel * decay_factor(friction, dt);
                }
                RollPhase::Idle => {
                    let steering = self.move_input.length_sq() > 0.0;
                    if self.combat.blocking {
                        self.vel = Vec2::ZERO;
                    } else if steering && !stunned {
                        let desired = self.move_input * player_config.move_speed;
                        let k = (player_config.accel * dt).min(1.0);
                        self.vel += (desired - self.vel) * k;
                    } else {
                        self.vel = self.vel * decay_factor(player_config.friction, dt);
                    }
                }
            },
        }

        let target = self.pos + self.vel * dt;
        self.pos = terrain.resolve_move(self.pos, target, player_config.radius);

        let attacking = !matches!(
            self.combat.phase,
            AttackPhase::Idle | AttackPhase::Recovery
        );
        if !attacking && self.move_input.length_sq() > 0.0 {
            self.facing = self.move_input.normalize_or(self.facing);
        }
    }

    /// Apply a landed bite. Returns `true` if this downed the player.
    pub fn take_bite(
        &mut self,
        damage: f32,
        from: Vec2,
        hyperarmored: bool,
        config: &CombatConfig,
    ) -> bool {
        if self.downed {
            return false;
        }
        self.health = clamp01(self.health - damage);
        if !hyperarmored {
            let push = (self.pos - from).normalized();
            self.vel += push * config.bite_knockback;
        }
        if self.health <= 0.0 {
            self.downed = true;
            self.combat.blocking = false;
            self.latched_by = None;
            self.latch_end = None;
            return true;
        }
        false
    }

    /// Latch `agent` onto the player. Refused while already latched.
    pub fn latch(&mut self, agent: AgentId, clock: &SimClock, config: &CombatConfig) -> bool {
        if self.downed || self.latched(clock) {
            return false;
        }
        self.latched_by = Some(agent);
        self.latch_end = Some(clock.after(config.latch_duration));
        true
    }

    pub fn is_sane(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        self.pos.is_finite()
            && self.vel.is_finite()
            && self.facing.is_finite()
            && unit(self.health)
            && unit(self.stamina)
            && self.height.is_finite()
            && self.vertical_speed.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::terrain::OpenField;

    struct Rig {
        player: Player,
        clock: SimClock,
        config: SimConfig,
        events: EventLog,
        sounds: Vec<(Vec2, f32)>,
    }

    impl Rig {
        fn new() -> Self {
            let config = SimConfig::default();
            Self {
                player: Player::new(&config.player),
                clock: SimClock::new(),
                config,
                events: EventLog::new(0),
                sounds: Vec::new(),
            }
        }

        fn tick(&mut self, input: PlayerInput, dt: f32) {
            self.tick_anchored(input, dt, None);
        }

        fn tick_anchored(&mut self, input: PlayerInput, dt: f32, anchor: Option<Vec2>) {
            self.clock.advance(dt);
            let weapon = self.config.weapons.warden.clone();
            self.player.apply_input(
                &input,
                &self.clock,
                &self.config.player,
                &self.config.combat,
                &weapon,
                &mut self.sounds,
                &mut self.events,
            );
            self.player.advance(
                anchor,
                &OpenField,
                &self.clock,
                dt,
                &self.config.player,
                &self.config.combat,
                &weapon,
                1.0,
            );
        }
    }

    #[test]
    fn idle_player_stays_put_with_full_stamina() {
        let mut rig = Rig::new();
        for _ in 0..60 {
            rig.tick(PlayerInput::default(), 1.0 / 60.0);
        }
        assert_eq!(rig.player.pos, Vec2::new(0.5, 0.5));
        assert_eq!(rig.player.stamina, 1.0);
        assert!(rig.events.is_empty());
    }

    #[test]
    fn movement_accelerates_toward_input_speed() {
        let mut rig = Rig::new();
        for _ in 0..60 {
            rig.tick(PlayerInput::moving(1.0, 0.0), 1.0 / 60.0);
        }
        assert!(rig.player.pos.x > 0.7);
        assert!((rig.player.vel.x - 0.3).abs() < 0.01);
        assert_eq!(rig.player.facing, Vec2::X);
    }

    #[test]
    fn malformed_axes_are_ignored() {
        let mut rig = Rig::new();
        rig.tick(PlayerInput::moving(f32::NAN, f32::INFINITY), 0.1);
        assert!(rig.player.is_sane());
        assert_eq!(rig.player.pos, Vec2::new(0.5, 0.5));
    }

    #[test]
    fn block_halts_movement() {
        let mut rig = Rig::new();
        rig.tick(PlayerInput::moving(1.0, 0.0), 0.1);
        let input = PlayerInput {
            move_x: 1.0,
            block: true,
            ..PlayerInput::default()
        };
        rig.tick(input, 0.1);
        assert!(rig.player.combat.blocking);
        assert_eq!(rig.player.vel, Vec2::ZERO);
    }

    #[test]
    fn jump_goes_up_and_lands() {
        let mut rig = Rig::new();
        let jump = PlayerInput {
            jump: true,
            ..PlayerInput::default()
        };
        rig.tick(jump.clone(), 0.05);
        assert!(rig.player.height > 0.0);
        assert!((rig.player.stamina - 0.855).abs() < 1e-3);
        rig.tick(jump, 0.05);
        // Second press mid-air is refused.
        assert!((rig.player.stamina - 0.86).abs() < 1e-3);
        for _ in 0..20 {
            rig.tick(PlayerInput::default(), 0.05);
        }
        assert!(rig.player.on_ground());
    }

    #[test]
    fn low_stamina_refuses_jump() {
        let mut rig = Rig::new();
        rig.player.stamina = 0.1;
        assert!(!rig.player.try_jump(&rig.clock, &rig.config.player));
        assert!(rig.player.on_ground());
    }

    #[test]
    fn latch_drags_toward_anchor_then_releases() {
        let mut rig = Rig::new();
        assert!(rig.player.latch(AgentId(2), &rig.clock, &rig.config.combat));
        assert!(!rig.player.latch(AgentId(3), &rig.clock, &rig.config.combat));
        let anchor = Vec2::new(0.6, 0.5);
        rig.tick_anchored(PlayerInput::moving(-1.0, 0.0), 0.1, Some(anchor));
        assert!(rig.player.pos.x > 0.5);
        for _ in 0..10 {
            rig.tick_anchored(PlayerInput::default(), 0.1, Some(anchor));
        }
        assert!(rig.player.latched_by.is_none());
    }

    #[test]
    fn fatal_bite_downs_player() {
        let mut rig = Rig::new();
        rig.player.health = 0.05;
        assert!(rig.player.take_bite(0.1, Vec2::new(0.45, 0.5), false, &rig.config.combat));
        assert!(rig.player.downed);
        assert!(!rig.player.take_bite(0.1, Vec2::new(0.45, 0.5), false, &rig.config.combat));
        rig.tick(
            PlayerInput {
                light: true,
                ..PlayerInput::default()
            },
            0.1,
        );
        assert!(rig.events.is_empty());
    }

    #[test]
    fn attack_priority_prefers_special() {
        let mut rig = Rig::new();
        let input = PlayerInput {
            light: true,
            special: true,
            ..PlayerInput::default()
        };
        rig.tick(input, 0.01);
        assert_eq!(rig.player.combat.kind, Some(AttackKind::Special));
        assert_eq!(rig.sounds.len(), 1);
    }
}
