// Individual agent controller.
//
// `update_agent` runs once per active agent per tick, in slot order, after
// perception and the pack controller. Each call:
//
// 1. Updates the agent's emotional state.
// 2. Picks a behavior from the pack plan and the agent's role (stunned
//    agents Recover, agents under a retreat order Retreat).
// 3. Builds a heading: perception intent, reshaped by the behavior, then
//    separation from packmates and avoidance of danger zones and the
//    player's facing cone.
// 4. Decides whether to start a lunge or a feint. Effective intelligence
//    (the agent's own, scaled by the difficulty parameter) sets how far
//    ahead it leads the player and whether it reads a fresh roll or block.
// 5. Integrates velocity, moves through `Terrain`, and updates fatigue,
//    stamina, facing and pose.
//
// Lunge resolution against the player is a separate step
// (`resolve_bite`) because it mutates the player as well as the agent;
// the world calls it right after `update_agent` for the same agent.
//
// See also: `pack.rs` for the directive, `perception.rs` for intent,
// `combat.rs` for `handle_incoming_attack`.
//
// **Critical constraint: determinism.** The RNG is drawn in a fixed order
// per agent: emotion update (only while Frustrated), the Frustrated
// cooldown jitter (only when an attack is being considered), then the
// feint roll (only when an attack starts).

use crate::agent::{Agent, Memory};
use crate::clock::SimClock;
use crate::config::{CombatConfig, SimConfig};
use crate::difficulty::DifficultyParams;
use crate::math::{self, clamp01, decay_factor, Vec2};
use crate::pack::{Den, PackDirective};
use crate::perception::{self, DangerZones, Percept, PlayerCues};
use crate::player::Player;
use crate::pose::{Pose, PoseInput};
use crate::prng::SimRng;
use crate::terrain::Terrain;
use crate::types::{AgentId, AttackOutcome, Behavior, EmotionalState, Plan, Role};

/// Shared, read-only inputs for one agent pass.
pub struct AgentContext<'a> {
    pub directive: &'a PackDirective,
    pub player: &'a PlayerCues,
    pub player_downed: bool,
    /// Positions of every active agent at the start of the pass.
    pub bodies: &'a [(AgentId, Vec2)],
    pub dangers: &'a DangerZones,
    pub wind: Vec2,
    pub den: Option<Den>,
    pub params: &'a DifficultyParams,
    pub terrain: &'a dyn Terrain,
}

/// Per-agent modifiers from the alpha (see `alpha.rs`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AgentMods {
    pub speed: f32,
}

impl Default for AgentMods {
    fn default() -> Self {
        Self { speed: 1.0 }
    }
}

/// Behavior implied by the pack plan for an agent in `role`.
pub fn behavior_for(plan: Plan, role: Role) -> Behavior {
    match plan {
        Plan::Stalk => Behavior::Seek,
        Plan::Encircle => Behavior::Circle,
        Plan::Harass | Plan::Commit => Behavior::Harass,
        Plan::Ambush => {
            if role == Role::Ambusher {
                Behavior::Ambush
            } else {
                Behavior::Seek
            }
        }
        Plan::Pincer => match role {
            Role::Scout | Role::FlankLeft | Role::FlankRight => Behavior::Flank,
            _ => Behavior::Circle,
        },
        Plan::Retreat => Behavior::Retreat,
    }
}

/// Attack-decision modifiers from the emotional state.
#[derive(Clone, Copy, Debug, PartialEq)]
struct EmotionMods {
    fatigue_threshold: f32,
    cooldown: f32,
    range_bonus: f32,
}

fn emotion_mods(agent: &Agent, rng: &mut SimRng, base_threshold: f32) -> EmotionMods {
    let mut mods = EmotionMods {
        fatigue_threshold: base_threshold,
        cooldown: 1.0,
        range_bonus: 0.0,
    };
    match agent.emotion {
        EmotionalState::Desperate => {
            mods.fatigue_threshold = 0.95;
            mods.cooldown = 0.5;
        }
        EmotionalState::Aggressive => {
            mods.fatigue_threshold = 0.85;
            mods.range_bonus = 0.03;
        }
        EmotionalState::Fearful => {
            mods.fatigue_threshold = 0.4;
            mods.cooldown = 1.5;
        }
        EmotionalState::Confident => mods.cooldown = 0.8,
        EmotionalState::Frustrated => mods.cooldown = 0.5 + rng.next_f32(),
        EmotionalState::Calm | EmotionalState::Hurt => {}
    }
    mods
}

/// Run one controller step for `agent`. `lunging` is the number of agents
/// with a lunge in flight; it is bumped when this agent starts one.
#[allow(clippy::too_many_arguments)]
pub fn update_agent(
    agent: &mut Agent,
    percept: &Percept,
    ctx: &AgentContext<'_>,
    mods: AgentMods,
    lunging: &mut u32,
    rng: &mut SimRng,
    clock: &SimClock,
    dt: f32,
    config: &SimConfig,
) {
    let cfg = &config.agent;
    agent.update_emotion(ctx.directive.morale, clock, dt, rng, cfg);

    let player = ctx.player;
    let to_player = player.pos - agent.pos;
    let dir_to_player = to_player.normalize_or(agent.facing);
    let dist = to_player.length();

    if agent.stunned(clock) {
        agent.behavior = Behavior::Recover;
        agent.vel = agent.vel * decay_factor(cfg.friction, dt);
        integrate(agent, ctx, dt, config);
        finish(agent, ctx, clock, cfg.max_speed);
        return;
    }

    let plan = ctx.directive.plan;
    let behavior = if ctx.player_downed {
        Behavior::Idle
    } else if clock.before(agent.retreat_until) {
        Behavior::Retreat
    } else if agent.target_locked && plan != Plan::Retreat {
        Behavior::Harass
    } else {
        behavior_for(plan, agent.role)
    };

    let intent = perception::intent(agent, percept, player.pos, ctx.wind, &config.perception);
    let mut dir = intent.dir;
    let mut caution = intent.caution;
    let mut hold_fire = false;

    match behavior {
        Behavior::Circle => {
            let tangent = dir_to_player.perp();
            let side = match agent.role {
                Role::FlankLeft => cfg.flank_tangent,
                Role::FlankRight => -cfg.flank_tangent,
                _ => cfg.circle_tangent * agent.sweep_sign,
            };
            dir = (dir_to_player * cfg.circle_radial + tangent * side).normalized();
        }
        Behavior::Ambush => {
            let predicted = player.pos + player.facing * cfg.ambush_lead;
            dir = (predicted - agent.pos).normalized();
            if dist > cfg.ambush_stealth_range {
                caution = cfg.ambush_stealth_speed;
            }
            if dist < cfg.lunge_range {
                if agent.ambush_ready_at.is_none() {
                    agent.ambush_ready_at = Some(clock.now);
                }
                hold_fire = clock.within(agent.ambush_ready_at, cfg.ambush_hold);
            } else {
                agent.ambush_ready_at = None;
            }
        }
        Behavior::Flank => {
            let angle = if agent.role == Role::FlankLeft {
                cfg.flank_angle
            } else {
                -cfg.flank_angle
            };
            dir = dir_to_player
                .rotated(math::cos(angle), math::sin(angle))
                .normalized();
        }
        Behavior::Retreat => {
            let mut away = -dir_to_player;
            if let Some(den) = ctx.den.filter(|d| d.radius > 0.0) {
                let home = (den.pos - agent.pos).normalized();
                away = away * (1.0 - cfg.den_blend) + home * cfg.den_blend;
            }
            dir = away.normalized();
            if plan == Plan::Retreat && !clock.before(agent.retreat_until) {
                agent.retreat_until = Some(clock.after(cfg.retreat_hold));
            }
        }
        Behavior::Idle => {
            dir = Vec2::ZERO;
        }
        Behavior::Seek | Behavior::Harass | Behavior::Recover => {}
    }
    if behavior != Behavior::Ambush {
        agent.ambush_ready_at = None;
    }

    // Separation from packmates.
    let mut push = Vec2::ZERO;
    let r2 = cfg.separation_radius * cfg.separation_radius;
    for &(id, pos) in ctx.bodies {
        if id == agent.id {
            continue;
        }
        let d = agent.pos - pos;
        let d2 = d.length_sq();
        if d2 < r2 && d2 > 0.0 {
            push += d * (1.0 / d2);
        }
    }
    if behavior != Behavior::Idle {
        dir = (dir + push * cfg.separation_weight).normalized();
    }

    // Danger zones and the player's facing cone.
    let mut avoid = -ctx.dangers.avoidance(agent.pos);
    let to_wolf = (agent.pos - player.pos).normalized();
    let facing_dot = player.facing.dot(to_wolf);
    if facing_dot > cfg.prey_cone_cos {
        avoid += player.facing * (cfg.prey_cone_weight * (facing_dot - cfg.prey_cone_cos));
        caution *= 0.9;
    }
    if avoid != Vec2::ZERO && behavior != Behavior::Idle {
        dir = (dir - avoid).normalized();
    }

    if !hold_fire && !agent.lunging(clock) && !agent.feinting(clock) && !ctx.player_downed {
        consider_attack(agent, ctx, dist, lunging, rng, clock, config);
    }

    let lunge_now = agent.lunging(clock);
    let feint_now = agent.feinting(clock);
    let desired = if lunge_now {
        agent.lunge_dir * cfg.lunge_speed
    } else if feint_now {
        agent.lunge_dir * (cfg.lunge_speed * 0.5)
    } else {
        let mut speed = cfg.base_speed * ctx.params.speed * mods.speed;
        if behavior == Behavior::Harass {
            speed *= cfg.harass_speed;
        }
        if plan == Plan::Commit {
            speed *= cfg.commit_speed;
        }
        speed *= caution;
        speed *= 0.9 + ctx.params.effective_intelligence(agent.intelligence) * 0.2;
        dir * speed + ctx.wind * cfg.wind_drift
    };

    let k = (cfg.accel * dt).min(1.0);
    agent.vel += (desired - agent.vel) * k;
    agent.vel = agent.vel * decay_factor(cfg.friction, dt);
    let cap = if lunge_now {
        cfg.max_speed.max(cfg.lunge_speed)
    } else {
        cfg.max_speed
    };
    agent.vel = agent.vel.clamp_length(cap);
    integrate(agent, ctx, dt, config);

    let exertion = if cfg.max_speed > 0.0 {
        agent.vel.length() / cfg.max_speed
    } else {
        0.0
    };
    let fatigue_rate = exertion * cfg.fatigue_per_speed - cfg.fatigue_recovery;
    agent.fatigue = clamp01(agent.fatigue + fatigue_rate * dt);
    agent.stamina = clamp01(agent.stamina + cfg.stamina_regen * dt);

    agent.behavior = behavior;
    finish(agent, ctx, clock, cfg.max_speed);
}

/// Attack decision: start a lunge or a feint if every gate passes.
fn consider_attack(
    agent: &mut Agent,
    ctx: &AgentContext<'_>,
    dist: f32,
    lunging: &mut u32,
    rng: &mut SimRng,
    clock: &SimClock,
    config: &SimConfig,
) {
    let cfg = &config.agent;
    let params = ctx.params;
    let mods = emotion_mods(agent, rng, cfg.base_fatigue_threshold);
    let smarts = params.effective_intelligence(agent.intelligence);
    // A sharp agent will not lunge into a roll it just saw start.
    let reads_roll = smarts >= cfg.read_min_intelligence
        && clock.within(agent.memory.last_player_roll, cfg.read_window);

    let mut should_attack = agent.noticed
        && clock.since(agent.noticed_at) >= params.min_chase(cfg.min_chase_before_lunge)
        && dist > 0.0
        && dist < cfg.lunge_range + mods.range_bonus
        && clock.since(agent.last_lunge) > params.lunge_cooldown(cfg.lunge_cooldown) * mods.cooldown
        && agent.fatigue < mods.fatigue_threshold
        && agent.stamina >= cfg.lunge_stamina_cost
        && !reads_roll;

    if should_attack && ctx.directive.plan == Plan::Commit {
        should_attack = match *lunging {
            0 => agent.role == Role::Lead || agent.target_locked,
            n => n < cfg.max_simultaneous_lunges,
        };
    }
    if !should_attack {
        return;
    }

    let feint_prob = feint_chance(&agent.memory, smarts, ctx.directive, params, clock, config);
    let feint = rng.chance(feint_prob);

    let lead = cfg.predict_lead * 2.0 * smarts;
    let predicted = ctx.player.pos + agent.memory.player_velocity * lead;
    agent.lunge_dir = (predicted - agent.pos).normalize_or(agent.facing);
    if feint {
        agent.feint_end = Some(clock.after(cfg.feint_duration));
    } else {
        agent.lunge_end = Some(clock.after(cfg.lunge_duration));
        agent.lunge_resolved = false;
        agent.stamina = clamp01(agent.stamina - cfg.lunge_stamina_cost);
        *lunging += 1;
    }
    agent.fatigue = clamp01(agent.fatigue + cfg.fatigue_lunge_bonus);
    agent.last_lunge = Some(clock.now);
}

/// Feint probability for a lunge about to start. Agents that keep getting
/// blocked, or that just saw the player raise a guard, feint more often in
/// proportion to their effective intelligence.
fn feint_chance(
    memory: &Memory,
    smarts: f32,
    directive: &PackDirective,
    params: &DifficultyParams,
    clock: &SimClock,
    config: &SimConfig,
) -> f32 {
    let mut p = params.feint * (0.5 + directive.skill);
    if directive.plan == Plan::Commit {
        p *= config.pack.commit_feint_scale;
    }
    let baited = if clock.within(memory.last_player_block, config.agent.read_window) {
        1.0
    } else {
        0.0
    };
    p * (1.0 + smarts * (memory.parry_rate + baited))
}

fn integrate(agent: &mut Agent, ctx: &AgentContext<'_>, dt: f32, config: &SimConfig) {
    let target = agent.pos + agent.vel * dt;
    agent.pos = ctx.terrain.resolve_move(agent.pos, target, config.agent.radius);
}

fn finish(agent: &mut Agent, ctx: &AgentContext<'_>, clock: &SimClock, max_speed: f32) {
    let lunge_now = agent.lunging(clock);
    agent.facing = if lunge_now {
        agent.lunge_dir
    } else {
        (ctx.player.pos - agent.pos).normalize_or(agent.facing)
    };
    agent.pose = Pose::derive(
        &PoseInput {
            velocity: agent.vel,
            facing: agent.facing,
            to_player: ctx.player.pos - agent.pos,
            emotion: agent.emotion,
            emotion_intensity: agent.emotion_intensity,
            behavior: agent.behavior,
            noticed: agent.noticed,
            lunging: lunge_now,
            max_speed,
        },
        clock.now,
    );
}

// ---------------------------------------------------------------------------
// Lunge resolution
// ---------------------------------------------------------------------------

/// Result of a lunge that reached the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bite {
    pub outcome: AttackOutcome,
    /// The bite came from behind and latched on.
    pub latched: bool,
    /// The bite took the player's last health.
    pub downed: bool,
}

/// Resolve `agent`'s lunge against the player, at most once per lunge and
/// only once the agent is within attack range. `damage_mult` carries alpha
/// damage modifiers.
pub fn resolve_bite(
    agent: &mut Agent,
    player: &mut Player,
    damage_mult: f32,
    clock: &SimClock,
    config: &SimConfig,
) -> Option<Bite> {
    let combat: &CombatConfig = &config.combat;
    if !agent.lunging(clock) || agent.lunge_resolved || player.downed {
        return None;
    }
    let offset = player.pos - agent.pos;
    if offset.length() > combat.attack_range {
        return None;
    }
    agent.lunge_resolved = true;

    let airborne = player.airborne(&config.player);
    let outcome = player.combat.handle_incoming_attack(
        agent.pos,
        player.pos,
        airborne,
        &mut player.stamina,
        clock,
        combat,
    );

    let keep = 0.9;
    let guarded = |rate: f32, hit: f32| rate * keep + hit * (1.0 - keep);
    let mut bite = Bite {
        outcome,
        latched: false,
        downed: false,
    };
    match outcome {
        AttackOutcome::Miss => agent.failures += 1,
        AttackOutcome::PerfectParry => {
            agent.failures += 1;
            agent.memory.parry_rate = guarded(agent.memory.parry_rate, 1.0);
            agent.cancel_attack();
            agent.stun_end = Some(clock.after(combat.parry_stun));
        }
        AttackOutcome::Block => {
            agent.failures += 1;
            agent.memory.parry_rate = guarded(agent.memory.parry_rate, 1.0);
        }
        AttackOutcome::Hit => {
            agent.successes += 1;
            agent.memory.parry_rate = guarded(agent.memory.parry_rate, 0.0);
            let hyperarmored = player.combat.hyperarmored(clock);
            bite.downed =
                player.take_bite(combat.bite_damage * damage_mult, agent.pos, hyperarmored, combat);
            let approach = offset.normalize_or(agent.lunge_dir);
            if !bite.downed
                && player.facing.dot(approach) < combat.back_attack_cos
                && player.latch(agent.id, clock, combat)
            {
                bite.latched = true;
            }
        }
    }
    Some(bite)
}
