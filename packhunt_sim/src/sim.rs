// Simulation world and tick loop.
//
// `SimulationWorld` is the single source of truth for a run. It owns the
// player, the agent pool, the pack, alpha, lineages, territories, the
// difficulty controller, the shared sensory channels (sounds, scent,
// danger zones, wind, den), the config, the clock and the PRNG. There are
// no globals: two worlds in one process never interact.
//
// A run starts at `initialize(seed, loadout)` (or `with_config`), which
// spawns every lineage, and restarts wholesale at `reset(new_seed)`. The
// only way forward is `tick(dt, input)` (`tick_on` with a custom
// `Terrain`), a pure function `(state, dt, input) -> (state', events)`.
//
// ## Tick order
//
// 1. Clamp `dt` to `[0, max_dt]` (NaN becomes 0), advance the clock, and
//    ingest world postings: wind, sounds, danger zones, den.
// 2. Player: apply the input requests, then advance combat, stamina and
//    movement.
// 3. Swing hits: an Active swing damages each living agent in range and
//    inside the arc once. Kills deactivate the agent, count as a pack
//    failure and a difficulty kill, and every `kills_per_choice` kills
//    offer a reward choice.
// 4. Perception: scent step, danger pruning, then a refresh per agent in
//    slot order, producing this tick's percepts.
// 5. Pack controller: stats, morale, plan, roles, messages, then the howl
//    check (which may spawn one reinforcement).
// 6. Agent pass in slot order: `update_agent` then `resolve_bite`. Bite
//    outcomes feed the difficulty metrics and the pack counters.
// 7. Alpha (validation, election, aura, one ability) and territory (mark,
//    decay, home-ground effects).
// 8. Lineages: prune, detect deaths, respawn.
// 9. Difficulty: movement sample, kill window, retune when due.
// 10. Integrity audit and any resets.
//
// Each tick returns the events it produced, in that order.
//
// ## Persistence
//
// `to_bytes`/`from_bytes` wrap the serialized world in the versioned
// snapshot format (`snapshot.rs`); `checksum` hashes the same encoding for
// desync detection. `to_json`/`from_json` are for debug dumps and tests.
//
// See also: `input.rs` for `TickInput`, `event.rs` for the output stream,
// `integrity.rs` for the audit, `config.rs` for every tunable.
//
// **Critical constraint: determinism.** All randomness comes from the one
// `SimRng`, drawn in the fixed order above. Agents are always visited in
// slot order. No wall clock, no OS entropy, no hash-ordered iteration.

use crate::agent::Agent;
use crate::alpha::{Alpha, AlphaWorld};
use crate::behavior::{self, AgentContext, AgentMods};
use crate::clock::SimClock;
use crate::combat::{CombatTelemetry, PlayerCombat};
use crate::config::SimConfig;
use crate::difficulty::Difficulty;
use crate::error::Result;
use crate::event::{EventLog, ResetScope, SimEvent, SimEventKind};
use crate::input::{TickInput, WorldPosting};
use crate::integrity::{self, AuditView};
use crate::lineage::{Lineages, SpawnContext};
use crate::math::{self, EPSILON, TAU, Vec2};
use crate::pack::{Den, HowlAction, Pack, PackDirective, PackEnvironment};
use crate::perception::{
    self, DangerZone, DangerZones, Percept, PlayerCues, ScentField, Senses, SoundLog,
};
use crate::player::Player;
use crate::pool::AgentPool;
use crate::pose::Pose;
use crate::prng::SimRng;
use crate::snapshot;
use crate::territory::Territories;
use crate::terrain::{OpenField, Terrain};
use crate::types::{AgentId, AttackOutcome, Loadout, Role, Vocalization};
use serde::{Deserialize, Serialize};

/// Top-level simulation state. This is the entire run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationWorld {
    /// Seed the run was initialized with; a run-scope reset replays it.
    pub seed: u64,
    pub loadout: Loadout,
    pub config: SimConfig,
    pub clock: SimClock,
    pub rng: SimRng,

    pub player: Player,
    pub pool: AgentPool,
    pub pack: Pack,
    pub alpha: Alpha,
    pub lineages: Lineages,
    pub territories: Territories,
    pub difficulty: Difficulty,

    pub sounds: SoundLog,
    pub scent: ScentField,
    pub dangers: DangerZones,
    pub wind: Vec2,
    pub den: Option<Den>,

    /// The pack directive from the last tick. Rebuilt every tick, not
    /// serialized.
    #[serde(skip)]
    pub directive: PackDirective,
}

impl SimulationWorld {
    /// Start a run with the default config.
    pub fn initialize(seed: u64, loadout: Loadout) -> Self {
        Self::with_config(seed, loadout, SimConfig::default())
    }

    /// Start a run with `config`. Spawns every lineage.
    pub fn with_config(seed: u64, loadout: Loadout, config: SimConfig) -> Self {
        let clock = SimClock::new();
        let mut rng = SimRng::new(seed);
        let player = Player::new(&config.player);
        let mut pool = AgentPool::new(config.agent.capacity);
        let mut lineages = Lineages::new(&config.lineage);
        let ctx = SpawnContext {
            player_pos: player.pos,
            agent: &config.agent,
            biome: config.biomes.profile(loadout.biome),
        };
        lineages.populate(&mut pool, &ctx, &mut rng, &clock, &config.lineage);
        tracing::info!(seed, ?loadout, agents = pool.active_count(), "run initialized");

        Self {
            seed,
            loadout,
            rng,
            player,
            pool,
            pack: Pack::new(&clock, &config.pack),
            alpha: Alpha::new(),
            lineages,
            territories: Territories::new(&config.territory),
            difficulty: Difficulty::new(&clock, &config.difficulty),
            sounds: SoundLog::new(config.perception.sound_capacity),
            scent: ScentField::new(&config.perception.scent),
            dangers: DangerZones::new(config.perception.danger_capacity),
            wind: Vec2::ZERO,
            den: None,
            directive: PackDirective::default(),
            clock,
            config,
        }
    }

    /// Throw the run away and start over from `new_seed`, keeping the
    /// loadout and config.
    pub fn reset(&mut self, new_seed: u64) {
        *self = Self::with_config(new_seed, self.loadout, self.config.clone());
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance one tick over open ground.
    pub fn tick(&mut self, dt: f32, input: &TickInput) -> Vec<SimEvent> {
        self.tick_on(&OpenField, dt, input)
    }

    /// Advance one tick, resolving movement through `terrain`.
    pub fn tick_on(&mut self, terrain: &dyn Terrain, dt: f32, input: &TickInput) -> Vec<SimEvent> {
        let dt = if dt.is_finite() {
            dt.clamp(0.0, self.config.max_dt)
        } else {
            0.0
        };
        self.clock.advance(dt);
        let mut events = EventLog::new(self.clock.tick);

        for posting in &input.postings {
            self.apply_posting(posting);
        }

        self.update_player(terrain, dt, input, &mut events);
        self.resolve_swings(&mut events);

        self.dangers.prune(&self.clock);
        self.scent
            .step(self.wind, self.player.pos, dt, &self.config.perception.scent);
        let cues = self.player_cues();
        let percepts = self.refresh_perception(&cues, dt);

        let env = PackEnvironment {
            player_pos: self.player.pos,
            player_health: self.player.health,
            den: self.den,
            dangers: &self.dangers,
        };
        let directive = self.pack.update(
            &mut self.pool,
            &percepts,
            self.alpha.agent,
            &env,
            &self.difficulty.params,
            &self.clock,
            dt,
            &self.config.pack,
            &mut events,
        );
        let howl = self.pack.howl(
            self.pool.active_count(),
            self.player.health,
            &self.clock,
            &self.config.pack,
            &mut events,
        );
        if howl == Some(HowlAction::Reinforce) {
            self.howl_reinforcement(&mut events);
        }

        self.update_agents(terrain, &cues, &percepts, &directive, dt, &mut events);
        self.directive = directive;

        self.update_alpha_and_territory(dt, &mut events);

        let ctx = SpawnContext {
            player_pos: self.player.pos,
            agent: &self.config.agent,
            biome: self.config.biomes.profile(self.loadout.biome),
        };
        self.lineages.update(
            &mut self.pool,
            &ctx,
            &mut self.rng,
            &self.clock,
            &self.config.lineage,
            &mut events,
        );

        self.update_difficulty(dt, &mut events);
        self.audit_and_repair(&mut events);

        events.into_events()
    }

    fn apply_posting(&mut self, posting: &WorldPosting) {
        match *posting {
            WorldPosting::Wind { x, y } => {
                let wind = Vec2::new(x, y);
                if wind.is_finite() {
                    self.wind = wind;
                }
            }
            WorldPosting::Sound { x, y, intensity } => {
                self.sounds.post(Vec2::new(x, y), intensity, self.clock.now);
            }
            WorldPosting::Danger {
                x,
                y,
                radius,
                strength,
                duration,
            } => {
                if duration.is_finite() && duration > 0.0 {
                    self.dangers.post(DangerZone {
                        pos: Vec2::new(x, y),
                        radius,
                        strength,
                        expires_at: self.clock.after(duration),
                    });
                }
            }
            WorldPosting::Den { x, y, radius } => {
                let pos = Vec2::new(x, y);
                self.den = if pos.is_finite() && radius.is_finite() && radius > 0.0 {
                    Some(Den {
                        pos: pos.clamp_unit(),
                        radius,
                    })
                } else {
                    None
                };
            }
        }
    }

    fn update_player(
        &mut self,
        terrain: &dyn Terrain,
        dt: f32,
        input: &TickInput,
        events: &mut EventLog,
    ) {
        let weapon = self.config.weapons.profile(self.loadout.character);
        let mut sounds = Vec::new();
        self.player.apply_input(
            &input.player,
            &self.clock,
            &self.config.player,
            &self.config.combat,
            weapon,
            &mut sounds,
            events,
        );
        for (pos, intensity) in sounds {
            self.sounds.post(pos, intensity, self.clock.now);
        }

        let anchor = self
            .player
            .latched_by
            .and_then(|id| self.pool.get(id))
            .map(|a| a.pos);
        self.player.advance(
            anchor,
            terrain,
            &self.clock,
            dt,
            &self.config.player,
            &self.config.combat,
            weapon,
            self.config.alpha.intimidate_regen_mult,
        );
    }

    /// Apply the player's Active swing to every agent it reaches, once per
    /// swing.
    fn resolve_swings(&mut self, events: &mut EventLog) {
        if !self.player.combat.swing_active() {
            return;
        }
        let combat = &self.config.combat;
        let weapon = self.config.weapons.profile(self.loadout.character);
        let damage = self.player.combat.swing_damage(combat, weapon);
        let range = self.player.combat.swing_range(combat, weapon);
        let dir = self.player.combat.attack_dir;
        let origin = self.player.pos;

        for id in self.pool.active_ids() {
            if self.player.combat.struck.contains(&id) {
                continue;
            }
            let Some(agent) = self.pool.get_mut(id) else {
                continue;
            };
            if !agent.is_alive() {
                continue;
            }
            let offset = agent.pos - origin;
            let d = offset.length();
            if d > range {
                continue;
            }
            if d > EPSILON && dir.dot(offset * (1.0 / d)) < combat.attack_arc_cos {
                continue;
            }
            self.player.combat.struck.push(id);
            let knockback = offset.normalize_or(dir) * combat.hit_knockback;
            let (stun, agent_cfg) = (combat.hit_stun, &self.config.agent);
            let killed = agent.take_damage(damage, knockback, stun, &self.clock, agent_cfg);
            events.push(SimEventKind::PlayerHitAgent { agent: id, damage });
            if !killed {
                continue;
            }

            self.pool.deactivate(id);
            events.push(SimEventKind::AgentKilled { agent: id });
            self.pack.record_failure(&self.clock);
            self.difficulty.record_kill();
            self.player.kills += 1;
            let per_choice = combat.kills_per_choice;
            if per_choice > 0 && self.player.kills % per_choice == 0 {
                events.push(SimEventKind::ChoiceOffered {
                    kills: self.player.kills,
                });
            }
        }
    }

    fn player_cues(&self) -> PlayerCues {
        let combat = &self.player.combat;
        PlayerCues {
            pos: self.player.pos,
            vel: self.player.vel,
            facing: self.player.facing,
            block_started: if combat.blocking { combat.block_start } else { None },
            roll_started: if combat.is_rolling() { combat.roll_start } else { None },
        }
    }

    fn refresh_perception(&mut self, cues: &PlayerCues, dt: f32) -> Vec<(AgentId, Percept)> {
        let senses = Senses {
            sounds: &self.sounds,
            scent: &self.scent,
            wind: self.wind,
        };
        self.pool
            .iter_active_mut()
            .map(|agent| {
                let percept = perception::refresh(
                    agent,
                    cues,
                    &senses,
                    &self.difficulty.params,
                    &self.clock,
                    dt,
                    &self.config.perception,
                );
                (agent.id, percept)
            })
            .collect()
    }

    /// One extra agent answering a howl, placed on a ring around the player
    /// and adopted by the alpha's lineage when it has room.
    fn howl_reinforcement(&mut self, events: &mut EventLog) {
        let cfg = &self.config.pack;
        let angle = self.rng.next_f32() * TAU;
        let dist = self.rng.range_f32(cfg.howl_spawn_min, cfg.howl_spawn_max);
        let pos = (self.player.pos + math::from_angle(angle) * dist).clamp_unit();
        let lineage = self
            .alpha
            .agent
            .and_then(|id| self.pool.get(id))
            .and_then(|a| a.lineage);

        let biome = self.config.biomes.profile(self.loadout.biome);
        let rng = &mut self.rng;
        let clock = &self.clock;
        let agent_cfg = &self.config.agent;
        let Some(id) = self
            .pool
            .activate(|id| Agent::spawn(id, pos, lineage, clock, rng, agent_cfg, biome))
        else {
            return;
        };
        let adopted = lineage.is_some_and(|l| self.lineages.adopt(l, id, &self.config.lineage));
        if let Some(agent) = self.pool.get_mut(id).filter(|_| !adopted) {
            agent.lineage = None;
        }
        events.push(SimEventKind::Vocalization {
            agent: None,
            call: Vocalization::ReinforcementHowl,
        });
        events.push(SimEventKind::ReinforcementsArrived { count: 1 });
    }

    fn update_agents(
        &mut self,
        terrain: &dyn Terrain,
        cues: &PlayerCues,
        percepts: &[(AgentId, Percept)],
        directive: &PackDirective,
        dt: f32,
        events: &mut EventLog,
    ) {
        let bodies: Vec<(AgentId, Vec2)> = self.pool.iter_active().map(|a| (a.id, a.pos)).collect();
        let params = self.difficulty.params.clone();
        let ctx = AgentContext {
            directive,
            player: cues,
            player_downed: self.player.downed,
            bodies: &bodies,
            dangers: &self.dangers,
            wind: self.wind,
            den: self.den,
            params: &params,
            terrain,
        };
        let mut lunging = directive.attacking;
        let dcfg = &self.config.difficulty;

        for (id, percept) in percepts {
            let (speed, damage_mult) = self.alpha.mods_for(*id, &self.clock, &self.config);
            let Some(agent) = self.pool.get_mut(*id) else {
                continue;
            };
            behavior::update_agent(
                agent,
                percept,
                &ctx,
                AgentMods { speed },
                &mut lunging,
                &mut self.rng,
                &self.clock,
                dt,
                &self.config,
            );

            let was_blocking = self.player.combat.blocking;
            let player = &mut self.player;
            let Some(bite) =
                behavior::resolve_bite(agent, player, damage_mult, &self.clock, &self.config)
            else {
                continue;
            };
            events.push(SimEventKind::IncomingAttack {
                agent: *id,
                outcome: bite.outcome,
            });
            let d = &mut self.difficulty;
            match bite.outcome {
                AttackOutcome::Miss => d.record_dodge(true, dcfg),
                AttackOutcome::PerfectParry => d.record_block(1.0, dcfg),
                AttackOutcome::Block => d.record_block(0.7, dcfg),
                AttackOutcome::Hit => {
                    d.record_dodge(false, dcfg);
                    if was_blocking {
                        d.record_block(0.0, dcfg);
                    }
                    self.pack.record_success(&self.clock);
                }
            }
            d.record_damage(bite.outcome != AttackOutcome::Hit, dcfg);
            if bite.latched {
                events.push(SimEventKind::PlayerLatched { agent: *id });
            }
            if bite.downed {
                tracing::info!(agent = %id, t = self.clock.now, "player downed");
                events.push(SimEventKind::PlayerDowned);
                d.record_death();
            }
        }
    }

    fn update_alpha_and_territory(&mut self, dt: f32, events: &mut EventLog) {
        let world = AlphaWorld {
            pool: &mut self.pool,
            pack: &mut self.pack,
            player: &mut self.player,
            lineages: &mut self.lineages,
            rng: &mut self.rng,
            biome: self.config.biomes.profile(self.loadout.biome),
        };
        let joined = self.alpha.update(world, &self.clock, dt, &self.config, events);
        if !joined.is_empty() {
            // Late arrivals take no part in this tick's role assignment; they
            // open as Harassers with the pack's current plan.
            let plan = self.directive.plan;
            for &id in &joined {
                if let Some(agent) = self.pool.get_mut(id) {
                    agent.role = Role::Harasser;
                    agent.behavior = behavior::behavior_for(plan, Role::Harasser);
                }
            }
            let agents = joined.as_slice();
            tracing::debug!(?agents, t = self.clock.now, "reinforcements joined");
        }

        let marker = self
            .alpha
            .agent
            .and_then(|id| self.pool.get(id))
            .and_then(|a| a.lineage.map(|l| (a.pos, l)));
        if let Some((pos, owner)) = marker {
            self.territories
                .mark(pos, owner, &self.clock, &self.config.territory, events);
        }
        self.territories
            .decay(&self.clock, dt, &self.config.territory, events);
        self.territories
            .apply(&mut self.pool, dt, &self.config.territory);
    }

    fn update_difficulty(&mut self, dt: f32, events: &mut EventLog) {
        let commanded = self.player.move_input.length() * self.config.player.move_speed;
        if commanded > EPSILON && !self.player.downed {
            let efficiency = self.player.vel.length() / commanded;
            self.difficulty
                .observe_movement(efficiency, dt, &self.config.difficulty);
        }
        if let Some(skill) = self.difficulty.update(&self.clock, &self.config.difficulty) {
            tracing::debug!(skill, t = self.clock.now, "difficulty retuned");
            events.push(SimEventKind::DifficultyRetuned { skill });
        }
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    fn audit_and_repair(&mut self, events: &mut EventLog) {
        let breaches = integrity::audit(&AuditView {
            clock: &self.clock,
            pool: &self.pool,
            player: &self.player,
            pack: &self.pack,
            alpha: &self.alpha,
            lineages: &self.lineages,
            territories: &self.territories,
            difficulty: &self.difficulty,
            config: &self.config,
        });
        for scope in breaches {
            tracing::warn!(?scope, tick = self.clock.tick, "invariant breach, resetting");
            self.apply_reset(scope);
            events.push(SimEventKind::SubsystemReset { scope });
        }
    }

    /// Reset the subsystem named by `scope`. See `integrity.rs`.
    pub fn apply_reset(&mut self, scope: ResetScope) {
        match scope {
            ResetScope::Agent(id) => {
                self.pool.clear_slot(id);
            }
            ResetScope::Pool => self.pool.rebuild_free_list(),
            ResetScope::Combat => self.player.combat = PlayerCombat::new(),
            ResetScope::Pack => {
                self.pack = Pack::new(&self.clock, &self.config.pack);
                self.alpha.clear();
                self.territories = Territories::new(&self.config.territory);
            }
            ResetScope::Lineage(slot) => {
                let id = self.lineages.get(slot).map(|l| l.id);
                self.lineages.kill(slot, &self.clock, &self.config.lineage);
                for agent in self.pool.iter_active_mut() {
                    if id.is_some() && agent.lineage == id {
                        agent.lineage = None;
                    }
                }
            }
            ResetScope::Run => {
                *self = Self::with_config(self.seed, self.loadout, self.config.clone());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.pool.get(id)
    }

    /// Active agents in slot order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.pool.iter_active()
    }

    pub fn agent_pose(&self, id: AgentId) -> Option<&Pose> {
        self.pool.get(id).map(|a| &a.pose)
    }

    pub fn combat_telemetry(&self) -> CombatTelemetry {
        self.player.combat.telemetry(&self.clock, &self.config.combat)
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Hash of the serialized world, for desync detection.
    pub fn checksum(&self) -> Result<u64> {
        snapshot::checksum(self)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        snapshot::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let world: Self = snapshot::decode(bytes)?;
        tracing::info!(
            tick = world.clock.tick,
            agents = world.pool.active_count(),
            "snapshot restored"
        );
        Ok(world)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
