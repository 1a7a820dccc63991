// The alpha: pack leadership and cooldown-gated abilities.
//
// At most one agent is the alpha. Each tick `Alpha::update` first checks
// that the current alpha is still alive (a dead alpha is mourned and
// cleared), elects a new one from the eligible agents if the seat is empty,
// applies the leadership aura, runs the intimidation aura, and then fires
// at most one ability.
//
// Ability priority, first whose trigger holds and whose cooldown has
// elapsed wins:
//
// 1. CallReinforcements: the pack is understrength.
// 2. RallyPack: pack morale is low.
// 3. BerserkRage: the alpha is badly hurt and not already enraged.
// 4. CoordinatedStrike: the pack is encircling, the sync timer has run
//    out, and enough members are circling or harassing.
// 5. Intimidate: the player is close to the alpha.
//
// The alpha also carries speed and damage multipliers (higher while
// enraged), read by the agent controller and bite resolution through
// `mods_for`.
//
// See also: `territory.rs` for marking, which the alpha drives, and
// `pack.rs` for the plan and morale the abilities push on.
//
// **Critical constraint: determinism.** Reinforcements draw from the RNG:
// count first, then per agent an angle, a distance and `Agent::spawn`'s own
// draws. No other path here draws.

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::config::{BiomeProfile, SimConfig};
use crate::event::{EventLog, SimEventKind};
use crate::lineage::Lineages;
use crate::math::{self, clamp01, TAU};
use crate::pack::Pack;
use crate::player::Player;
use crate::pool::AgentPool;
use crate::prng::SimRng;
use crate::types::{AgentId, AlphaAbility, Behavior, EmotionalState, Plan, Role, Vocalization};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Alpha {
    pub agent: Option<AgentId>,
    /// Per-ability ready times, indexed by `AlphaAbility::index`.
    pub ready_at: [Option<f64>; 5],
    pub enraged_until: Option<f64>,
    pub intimidate_until: Option<f64>,
}

/// Everything the alpha touches besides itself.
pub struct AlphaWorld<'a> {
    pub pool: &'a mut AgentPool,
    pub pack: &'a mut Pack,
    pub player: &'a mut Player,
    pub lineages: &'a mut Lineages,
    pub rng: &'a mut SimRng,
    pub biome: &'a BiomeProfile,
}

impl Alpha {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enraged(&self, clock: &SimClock) -> bool {
        clock.before(self.enraged_until)
    }

    pub fn ready(&self, ability: AlphaAbility, clock: &SimClock) -> bool {
        !clock.before(self.ready_at[ability.index()])
    }

    /// (speed, damage) multipliers for `id`. Neutral for everyone but the
    /// alpha.
    pub fn mods_for(&self, id: AgentId, clock: &SimClock, config: &SimConfig) -> (f32, f32) {
        if self.agent != Some(id) {
            return (1.0, 1.0);
        }
        let a = &config.alpha;
        if self.enraged(clock) {
            (a.enraged_speed_mod, a.enraged_damage_mod)
        } else {
            (a.speed_mod, a.damage_mod)
        }
    }

    pub fn eligible(agent: &Agent, config: &SimConfig) -> bool {
        let a = &config.alpha;
        agent.is_alive()
            && agent.health > a.min_health
            && agent.aggression > a.min_aggression
            && agent.intelligence > a.min_intelligence
            && agent.behavior != Behavior::Retreat
            && agent.emotion != EmotionalState::Fearful
    }

    pub fn score(agent: &Agent, config: &SimConfig) -> f32 {
        let a = &config.alpha;
        agent.health * a.health_weight
            + agent.aggression * a.aggression_weight
            + agent.intelligence * a.intelligence_weight
            + agent.coordination * a.coordination_weight
    }

    /// Best eligible candidate; ties go to the lower slot.
    pub fn select(pool: &AgentPool, config: &SimConfig) -> Option<AgentId> {
        let mut best: Option<(AgentId, f32)> = None;
        for agent in pool.iter_active().filter(|a| Self::eligible(a, config)) {
            let s = Self::score(agent, config);
            if best.is_none_or(|(_, b)| s > b) {
                best = Some((agent.id, s));
            }
        }
        best.map(|(id, _)| id)
    }

    fn promote(
        &mut self,
        id: AgentId,
        pool: &mut AgentPool,
        clock: &SimClock,
        config: &SimConfig,
        events: &mut EventLog,
    ) {
        let Some(agent) = pool.get_mut(id) else {
            return;
        };
        agent.role = Role::Lead;
        agent.aggression = clamp01(agent.aggression + config.alpha.promote_aggression);
        agent.coordination = 1.0;
        agent.morale = 1.0;
        self.agent = Some(id);
        self.enraged_until = None;
        tracing::info!(%id, t = clock.now, "alpha elected");
        events.push(SimEventKind::AlphaElected { agent: id });
        events.push(SimEventKind::Vocalization {
            agent: Some(id),
            call: Vocalization::RallyHowl,
        });
    }

    /// Clear the seat without mourning (used by resets).
    pub fn clear(&mut self) {
        self.agent = None;
        self.enraged_until = None;
        self.intimidate_until = None;
    }

    /// Per-tick alpha update. Returns any reinforcements spawned.
    pub fn update(
        &mut self,
        world: AlphaWorld<'_>,
        clock: &SimClock,
        dt: f32,
        config: &SimConfig,
        events: &mut EventLog,
    ) -> SmallVec<[AgentId; 4]> {
        let AlphaWorld {
            pool,
            pack,
            player,
            lineages,
            rng,
            biome,
        } = world;
        let mut spawned = SmallVec::new();

        let lost = self
            .agent
            .filter(|&id| !pool.get(id).is_some_and(|a| a.is_alive()));
        if let Some(id) = lost {
            tracing::info!(%id, t = clock.now, "alpha lost");
            events.push(SimEventKind::AlphaLost { agent: id });
            events.push(SimEventKind::Vocalization {
                agent: None,
                call: Vocalization::MourningHowl,
            });
            self.clear();
        }
        if self.agent.is_none() {
            if let Some(id) = Self::select(pool, config) {
                self.promote(id, pool, clock, config, events);
            }
        }
        let Some(id) = self.agent else {
            release_player(player, None);
            return spawned;
        };
        let Some((alpha_pos, alpha_health, lineage)) =
            pool.get(id).map(|a| (a.pos, a.health, a.lineage))
        else {
            return spawned;
        };

        let a = &config.alpha;
        for agent in pool.iter_active_mut() {
            if agent.id == id {
                continue;
            }
            let d = agent.pos.distance(alpha_pos);
            if d < a.leadership_radius {
                let boost = a.leadership_rate * (1.0 - d / a.leadership_radius) * dt;
                agent.morale = clamp01(agent.morale + boost);
            }
        }

        // Intimidation lingers on the player while they stay near.
        let player_dist = player.pos.distance(alpha_pos);
        if clock.before(self.intimidate_until) && player_dist <= a.intimidate_aura {
            player.intimidated_by = Some(id);
            player.intimidate_end = self.intimidate_until;
        } else {
            release_player(player, Some(id));
        }

        let circling = pool
            .iter_active()
            .filter(|m| matches!(m.behavior, Behavior::Circle | Behavior::Harass))
            .count();
        let enraged = self.enraged(clock);
        let candidates = [
            (
                AlphaAbility::CallReinforcements,
                pool.active_count() < a.understrength && pool.free_count() > 0,
            ),
            (AlphaAbility::RallyPack, pack.morale < a.rally_below_morale),
            (
                AlphaAbility::BerserkRage,
                alpha_health < a.berserk_health && !enraged,
            ),
            (
                AlphaAbility::CoordinatedStrike,
                pack.plan == Plan::Encircle
                    && pack.sync_timer <= 0.0
                    && circling >= a.strike_min_ready,
            ),
            (AlphaAbility::Intimidate, player_dist < a.intimidate_range),
        ];
        let Some(ability) = candidates
            .iter()
            .find(|(ability, trigger)| *trigger && self.ready(*ability, clock))
            .map(|(ability, _)| *ability)
        else {
            return spawned;
        };

        let cooldown = match ability {
            AlphaAbility::RallyPack => a.rally_cooldown,
            AlphaAbility::CoordinatedStrike => a.strike_cooldown,
            AlphaAbility::Intimidate => a.intimidate_cooldown,
            AlphaAbility::CallReinforcements => a.reinforcements_cooldown,
            AlphaAbility::BerserkRage => a.berserk_cooldown,
        };
        self.ready_at[ability.index()] = Some(clock.after(cooldown));
        events.push(SimEventKind::AlphaAbilityUsed { agent: id, ability });
        tracing::debug!(%id, ?ability, t = clock.now, "alpha ability");

        match ability {
            AlphaAbility::RallyPack => {
                pack.morale = clamp01(pack.morale + a.rally_pack_morale);
                for m in pool.iter_active_mut() {
                    m.morale = clamp01(m.morale + a.rally_morale);
                    m.coordination = clamp01(m.coordination + a.rally_coordination);
                    m.fatigue = clamp01(m.fatigue - a.rally_fatigue);
                    if matches!(m.emotion, EmotionalState::Fearful | EmotionalState::Calm) {
                        m.emotion = EmotionalState::Confident;
                        m.emotion_intensity = a.rally_confidence;
                    }
                }
                events.push(SimEventKind::Vocalization {
                    agent: Some(id),
                    call: Vocalization::RallyHowl,
                });
            }
            AlphaAbility::CoordinatedStrike => {
                pack.sync_timer = a.strike_sync;
                pack.force_plan(Plan::Commit, clock, &config.pack, events);
                // Ready to lunge once the sync timer runs out.
                let primed =
                    clock.now - f64::from(config.agent.lunge_cooldown) + f64::from(a.strike_sync);
                for m in pool.iter_active_mut() {
                    if matches!(m.behavior, Behavior::Circle | Behavior::Harass) {
                        m.target_locked = true;
                        m.last_lunge = Some(primed);
                    }
                }
            }
            AlphaAbility::Intimidate => {
                self.intimidate_until = Some(clock.after(a.intimidate_duration));
                if player_dist <= a.intimidate_aura {
                    player.intimidated_by = Some(id);
                    player.intimidate_end = self.intimidate_until;
                }
                events.push(SimEventKind::Vocalization {
                    agent: Some(id),
                    call: Vocalization::Growl,
                });
            }
            AlphaAbility::CallReinforcements => {
                let count = rng.range_usize_inclusive(a.reinforcements_min, a.reinforcements_max);
                for _ in 0..count {
                    let angle = rng.next_f32() * TAU;
                    let dist =
                        rng.range_f32(a.reinforcements_min_distance, a.reinforcements_max_distance);
                    let pos = (alpha_pos + math::from_angle(angle) * dist).clamp_unit();
                    let joined = pool.activate(|new_id| {
                        let mut agent =
                            Agent::spawn(new_id, pos, lineage, clock, rng, &config.agent, biome);
                        agent.emotion = EmotionalState::Aggressive;
                        agent.emotion_intensity = a.reinforcements_intensity;
                        agent
                    });
                    let Some(new_id) = joined else {
                        break;
                    };
                    let adopted =
                        lineage.is_some_and(|l| lineages.adopt(l, new_id, &config.lineage));
                    if !adopted {
                        if let Some(agent) = pool.get_mut(new_id) {
                            agent.lineage = None;
                        }
                    }
                    spawned.push(new_id);
                }
                events.push(SimEventKind::Vocalization {
                    agent: Some(id),
                    call: Vocalization::ReinforcementHowl,
                });
                events.push(SimEventKind::ReinforcementsArrived {
                    count: spawned.len() as u32,
                });
            }
            AlphaAbility::BerserkRage => {
                self.enraged_until = Some(clock.after(a.berserk_duration));
                for m in pool.iter_active_mut() {
                    if m.id == id {
                        m.aggression = 1.0;
                    } else if m.pos.distance(alpha_pos) < a.berserk_radius {
                        m.aggression = clamp01(m.aggression + a.berserk_aggression);
                    }
                }
                events.push(SimEventKind::Vocalization {
                    agent: Some(id),
                    call: Vocalization::Growl,
                });
            }
        }
        spawned
    }
}

/// Lift intimidation from the player if `by` (or anyone, for `None`)
/// applied it.
fn release_player(player: &mut Player, by: Option<AgentId>) {
    if player.intimidated_by.is_some() && (by.is_none() || player.intimidated_by == by) {
        player.intimidated_by = None;
        player.intimidate_end = None;
    }
}
