// Pack controller: plan selection, role assignment, and messaging.
//
// Once per tick, after perception and before the agent pass, `Pack::update`
// aggregates the active agents into `PackStats`, updates the pack's skill
// estimate and morale, walks the plan ladder, assigns roles, and sends the
// messages that plan changes and sightings call for. The result is a
// `PackDirective`: a read-only value the agent controller consumes for the
// rest of the tick.
//
// Plan ladder, first match wins:
//
// 1. Retreat when the pack is weak (low health or high fatigue).
// 2. Far from the player: Ambush against a weak player with enough
//    members, otherwise Stalk.
// 3. Middle band: Pincer with enough members and morale, otherwise
//    Encircle.
// 4. Close: Commit when morale is high and fatigue low, otherwise Harass.
//
// A howl or a coordinated strike can force a plan for a short hold; only
// Retreat overrides a forced plan.
//
// Messages are range-limited broadcasts from one agent to every other
// active agent within the (coordination-scaled) comm radius. Each sender
// has a short cooldown.
//
// See also: `behavior.rs` for how the directive turns into movement,
// `alpha.rs` for abilities that push the pack around, `lineage.rs` for
// spawn groups.
//
// **Critical constraint: determinism.** Agents are visited in slot order
// everywhere, ties in role selection go to the lower slot, and no
// randomness is drawn here.

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::config::PackConfig;
use crate::difficulty::DifficultyParams;
use crate::event::{EventLog, SimEventKind};
use crate::math::{approach, clamp01, Vec2};
use crate::perception::{DangerZones, Percept};
use crate::pool::AgentPool;
use crate::types::{AgentId, PackMessage, Plan, Role};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// The pack's home. Members near it feel safer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Den {
    pub pos: Vec2,
    pub radius: f32,
}

/// Aggregates over active agents, recomputed every tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackStats {
    pub count: usize,
    pub avg_distance: f32,
    pub avg_health: f32,
    pub avg_fatigue: f32,
    pub healthy: usize,
    pub lunging: u32,
    /// Fraction of members inside the (scaled) den radius.
    pub at_den: f32,
    /// Mean danger-zone hazard at member positions.
    pub hazard: f32,
}

/// What the pack controller needs from the rest of the world.
pub struct PackEnvironment<'a> {
    pub player_pos: Vec2,
    pub player_health: f32,
    pub den: Option<Den>,
    pub dangers: &'a DangerZones,
}

impl PackStats {
    pub fn gather(
        pool: &AgentPool,
        env: &PackEnvironment<'_>,
        clock: &SimClock,
        config: &PackConfig,
    ) -> Self {
        let mut stats = PackStats::default();
        let (mut dist, mut health, mut fatigue, mut den, mut hazard) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for agent in pool.iter_active() {
            stats.count += 1;
            dist += agent.pos.distance(env.player_pos);
            health += agent.health;
            fatigue += agent.fatigue;
            if agent.health > config.healthy_threshold {
                stats.healthy += 1;
            }
            if agent.lunging(clock) {
                stats.lunging += 1;
            }
            if env
                .den
                .is_some_and(|d| agent.pos.distance(d.pos) <= d.radius * config.den_radius_scale)
            {
                den += 1.0;
            }
            hazard += env.dangers.hazard_at(agent.pos);
        }
        if stats.count > 0 {
            let n = stats.count as f32;
            stats.avg_distance = dist / n;
            stats.avg_health = health / n;
            stats.avg_fatigue = fatigue / n;
            stats.at_den = den / n;
            stats.hazard = hazard / n;
        }
        stats
    }

    pub fn healthy_fraction(&self) -> f32 {
        if self.count == 0 {
            0.0
        } else {
            self.healthy as f32 / self.count as f32
        }
    }
}

/// Read-only per-tick output of the pack controller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PackDirective {
    pub plan: Plan,
    pub roles: SmallVec<[(AgentId, Role); 16]>,
    pub morale: f32,
    pub sync_timer: f32,
    pub skill: f32,
    /// Agents lunging at the start of the agent pass.
    pub attacking: u32,
}

impl PackDirective {
    pub fn role_of(&self, id: AgentId) -> Role {
        self.roles
            .iter()
            .find(|(a, _)| *a == id)
            .map_or(Role::None, |(_, r)| *r)
    }
}

/// What the howl check asks the world to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HowlAction {
    /// Spawn one extra agent near the player.
    Reinforce,
    /// The plan was forced to Encircle.
    Encircle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub plan: Plan,
    pub plan_since: f64,
    /// A forced plan holds until this time unless the pack must retreat.
    pub plan_hold_until: Option<f64>,
    pub morale: f32,
    pub sync_timer: f32,
    pub successes: u32,
    pub failures: u32,
    pub last_success: Option<f64>,
    pub last_failure: Option<f64>,
    /// The pack's estimate of player skill, in [0, 1].
    pub skill: f32,
    /// Most members active at once since the last full wipe.
    pub peak_members: usize,
    pub howl_ready_at: Option<f64>,
    pub last_coordinated_check: Option<f64>,
    /// Hunger counts up from here; reset when the pack lands a bite.
    pub fed_at: f64,
}

impl Pack {
    pub fn new(clock: &SimClock, config: &PackConfig) -> Self {
        Self {
            plan: Plan::Stalk,
            plan_since: clock.now,
            plan_hold_until: None,
            morale: config.initial_morale,
            sync_timer: 0.0,
            successes: 0,
            failures: 0,
            last_success: None,
            last_failure: None,
            skill: config.initial_skill_estimate,
            peak_members: 0,
            howl_ready_at: None,
            last_coordinated_check: None,
            fed_at: clock.now,
        }
    }

    /// A bite landed on the player.
    pub fn record_success(&mut self, clock: &SimClock) {
        self.successes += 1;
        self.last_success = Some(clock.now);
        self.fed_at = clock.now;
    }

    /// A pack member was killed.
    pub fn record_failure(&mut self, clock: &SimClock) {
        self.failures += 1;
        self.last_failure = Some(clock.now);
    }

    /// Recent successes mean the player is weaker than thought; recent
    /// failures mean stronger.
    pub fn update_skill(&mut self, clock: &SimClock, config: &PackConfig) {
        if clock.within(self.last_success, config.success_window) {
            self.skill *= config.skill_decay;
        }
        if clock.within(self.last_failure, config.success_window) {
            self.skill *= config.skill_growth;
        }
        self.skill = clamp01(self.skill);
    }

    /// Morale from pack condition, smoothed toward an environmental target.
    pub fn update_morale(
        &mut self,
        stats: &PackStats,
        env: &PackEnvironment<'_>,
        clock: &SimClock,
        dt: f32,
        config: &PackConfig,
    ) {
        if stats.count == 0 {
            return;
        }
        let mut morale = stats.avg_health * config.morale_health_weight
            + (1.0 - stats.avg_fatigue) * config.morale_rest_weight
            + stats.healthy_fraction() * config.morale_healthy_weight;
        if self.successes > self.failures {
            morale += config.morale_winning_bonus;
        }
        let morale = clamp01(morale);

        let hunger = if config.hunger_secs > 0.0 {
            clamp01((clock.now - self.fed_at) as f32 / config.hunger_secs)
        } else {
            0.0
        };
        let casualty = if self.peak_members > 0 {
            1.0 - stats.count as f32 / self.peak_members as f32
        } else {
            0.0
        };
        let wounded = 1.0 - clamp01(env.player_health);
        let target = clamp01(
            config.env_base + hunger * config.env_hunger
                + stats.at_den * config.env_den * config.den_bonus
                + wounded * config.env_wounded
                - stats.hazard * config.env_hazard
                - casualty * config.env_casualty,
        );
        let k = (config.morale_smoothing * dt).min(1.0);
        self.morale = clamp01(approach(morale, target, k));
    }

    /// The plan the ladder picks for `stats`.
    pub fn select_plan(&self, stats: &PackStats, config: &PackConfig) -> Plan {
        if stats.avg_health < config.retreat_health || stats.avg_fatigue > config.retreat_fatigue {
            Plan::Retreat
        } else if stats.avg_distance > config.far_band {
            if self.skill < config.ambush_skill && stats.count >= config.ambush_min_members {
                Plan::Ambush
            } else {
                Plan::Stalk
            }
        } else if stats.avg_distance > config.mid_band {
            if stats.count >= config.pincer_min_members && self.morale > config.pincer_morale {
                Plan::Pincer
            } else {
                Plan::Encircle
            }
        } else if self.morale > config.commit_morale && stats.avg_fatigue < config.commit_fatigue {
            Plan::Commit
        } else {
            Plan::Harass
        }
    }

    /// Switch plans, recording the time. Returns the previous plan if it
    /// changed.
    pub fn set_plan(
        &mut self,
        plan: Plan,
        clock: &SimClock,
        events: &mut EventLog,
    ) -> Option<Plan> {
        if plan == self.plan {
            return None;
        }
        let from = self.plan;
        self.plan = plan;
        self.plan_since = clock.now;
        tracing::debug!(?from, to = ?plan, t = clock.now, "pack plan changed");
        events.push(SimEventKind::PlanChanged { from, to: plan });
        Some(from)
    }

    /// Force `plan` for the configured hold.
    pub fn force_plan(
        &mut self,
        plan: Plan,
        clock: &SimClock,
        config: &PackConfig,
        events: &mut EventLog,
    ) {
        self.set_plan(plan, clock, events);
        self.plan_hold_until = Some(clock.after(config.forced_plan_hold));
    }

    /// Full per-tick pack update. See the module comment for the order.
    /// `leader` (the alpha, if any) always takes the Lead role.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        pool: &mut AgentPool,
        percepts: &[(AgentId, Percept)],
        leader: Option<AgentId>,
        env: &PackEnvironment<'_>,
        params: &DifficultyParams,
        clock: &SimClock,
        dt: f32,
        config: &PackConfig,
        events: &mut EventLog,
    ) -> PackDirective {
        let stats = PackStats::gather(pool, env, clock, config);
        if stats.count == 0 {
            self.peak_members = 0;
        }
        self.peak_members = self.peak_members.max(stats.count);
        self.update_skill(clock, config);
        self.update_morale(&stats, env, clock, dt, config);

        let previous = if stats.count == 0 {
            self.set_plan(Plan::Stalk, clock, events)
        } else {
            let picked = self.select_plan(&stats, config);
            let held = clock.before(self.plan_hold_until);
            if held && picked != Plan::Retreat {
                None
            } else {
                self.set_plan(picked, clock, events)
            }
        };

        let candidates: SmallVec<[RoleCandidate; 16]> =
            pool.iter_active().map(RoleCandidate::from).collect();
        let roles = assign_roles(&candidates, self.plan, env.player_pos, leader, config);
        for (id, role) in &roles {
            if let Some(agent) = pool.get_mut(*id) {
                agent.role = *role;
            }
        }

        let radius = params.comm_radius(config.comm_radius);
        let lead = roles.iter().find(|(_, r)| *r == Role::Lead).map(|(id, _)| *id);
        if let (Some(from), Some(lead)) = (previous, lead) {
            let message = match (from, self.plan) {
                (_, Plan::Retreat) => Some(PackMessage::Retreat),
                (_, Plan::Pincer) => Some(weaker_flank(&roles)),
                (Plan::Retreat | Plan::Commit, _) => Some(PackMessage::Regroup),
                _ => None,
            };
            if let Some(message) = message {
                self.send(pool, lead, message, radius, clock, config, events);
            }
        }

        for (id, percept) in percepts {
            if percept.newly_noticed {
                self.send(pool, *id, PackMessage::TargetSpotted, radius, clock, config, events);
            }
        }

        if self.plan == Plan::Commit
            && clock.since(self.last_coordinated_check) > config.coordinated_interval
        {
            self.last_coordinated_check = Some(clock.now);
            let ready = pool
                .iter_active()
                .filter(|a| {
                    a.pos.distance(env.player_pos) < config.coordinated_radius
                        && a.fatigue < config.coordinated_fatigue
                })
                .count();
            if ready >= config.coordinated_min {
                let sent = lead.and_then(|lead| {
                    self.send(pool, lead, PackMessage::AttackNow, radius, clock, config, events)
                });
                if sent.is_some() {
                    self.sync_timer = self.sync_timer.max(config.coordinated_interval);
                }
            }
        }
        self.sync_timer = (self.sync_timer - dt).max(0.0);

        PackDirective {
            plan: self.plan,
            roles,
            morale: self.morale,
            sync_timer: self.sync_timer,
            skill: self.skill,
            attacking: stats.lunging,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn send(
        &mut self,
        pool: &mut AgentPool,
        sender: AgentId,
        message: PackMessage,
        radius: f32,
        clock: &SimClock,
        config: &PackConfig,
        events: &mut EventLog,
    ) -> Option<u32> {
        let recipients = broadcast(pool, sender, message, radius, clock, config)?;
        events.push(SimEventKind::PackMessageSent {
            sender,
            message,
            recipients,
        });
        Some(recipients)
    }

    /// Howl check: with high morale and the cooldown elapsed, either call
    /// for one reinforcement (player badly wounded) or force Encircle.
    pub fn howl(
        &mut self,
        stats_count: usize,
        player_health: f32,
        clock: &SimClock,
        config: &PackConfig,
        events: &mut EventLog,
    ) -> Option<HowlAction> {
        if stats_count == 0
            || self.morale <= config.howl_morale
            || clock.before(self.howl_ready_at)
        {
            return None;
        }
        let wounds = 1.0 - clamp01(player_health);
        if wounds > config.howl_wound {
            self.howl_ready_at = Some(clock.after(config.howl_spawn_cooldown));
            Some(HowlAction::Reinforce)
        } else {
            self.howl_ready_at = Some(clock.after(config.howl_encircle_cooldown));
            self.force_plan(Plan::Encircle, clock, config, events);
            Some(HowlAction::Encircle)
        }
    }

    pub fn is_sane(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        unit(self.morale)
            && unit(self.skill)
            && self.sync_timer.is_finite()
            && self.sync_timer >= 0.0
            && self.plan_since.is_finite()
    }
}

fn weaker_flank(roles: &[(AgentId, Role)]) -> PackMessage {
    let count = |role| roles.iter().filter(|(_, r)| *r == role).count();
    if count(Role::FlankLeft) <= count(Role::FlankRight) {
        PackMessage::FlankLeft
    } else {
        PackMessage::FlankRight
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The agent fields role assignment looks at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoleCandidate {
    pub id: AgentId,
    pub pos: Vec2,
    pub health: f32,
    pub fatigue: f32,
    pub stamina: f32,
}

impl From<&Agent> for RoleCandidate {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            pos: agent.pos,
            health: agent.health,
            fatigue: agent.fatigue,
            stamina: agent.stamina,
        }
    }
}

/// Assign a role to every candidate.
///
/// Everyone starts as Harasser. The Lead is `leader` when it is among the
/// candidates, otherwise the closest, healthiest, least tired member.
/// Ambush adds one Ambusher (farthest healthy member), Pincer one Scout
/// (first fresh member). One FlankLeft and one FlankRight are
/// picked by which side of the Lead's approach line they are on, and with
/// enough members the farthest remaining Harasser guards the pups.
pub fn assign_roles(
    candidates: &[RoleCandidate],
    plan: Plan,
    player: Vec2,
    leader: Option<AgentId>,
    config: &PackConfig,
) -> SmallVec<[(AgentId, Role); 16]> {
    let mut roles: SmallVec<[(AgentId, Role); 16]> =
        candidates.iter().map(|c| (c.id, Role::Harasser)).collect();
    let n = candidates.len();
    if n == 0 {
        return roles;
    }
    let dist_sq = |c: &RoleCandidate| (c.pos - player).length_sq();
    let lead_score = |c: &RoleCandidate| {
        (1.0 / (dist_sq(c) + config.lead_distance_bias)) * c.health * (1.0 - c.fatigue)
    };

    let forced = leader.and_then(|id| candidates.iter().position(|c| c.id == id));
    let lead = forced.unwrap_or_else(|| {
        let mut best = 0;
        for k in 1..n {
            if lead_score(&candidates[k]) > lead_score(&candidates[best]) {
                best = k;
            }
        }
        best
    });
    roles[lead].1 = Role::Lead;

    if plan == Plan::Ambush && n >= config.ambush_min_members {
        let mut best: Option<usize> = None;
        for k in 0..n {
            let c = &candidates[k];
            if k == lead || c.health <= config.ambusher_min_health {
                continue;
            }
            if best.is_none_or(|b| dist_sq(c) > dist_sq(&candidates[b])) {
                best = Some(k);
            }
        }
        if let Some(k) = best {
            roles[k].1 = Role::Ambusher;
        }
    }

    if plan == Plan::Pincer && n >= config.pincer_min_members {
        let scout = (0..n).find(|&k| k != lead && candidates[k].stamina > config.scout_min_stamina);
        if let Some(k) = scout {
            roles[k].1 = Role::Scout;
        }
    }

    let approach_dir = (player - candidates[lead].pos).normalized();
    let (mut left, mut right) = (None, None);
    for k in 0..n {
        if roles[k].1 != Role::Harasser {
            continue;
        }
        let side = approach_dir.cross(candidates[k].pos - player);
        if side > 0.0 && left.is_none() {
            left = Some(k);
        } else if side < 0.0 && right.is_none() {
            right = Some(k);
        }
    }
    if let Some(k) = left {
        roles[k].1 = Role::FlankLeft;
    }
    if let Some(k) = right {
        roles[k].1 = Role::FlankRight;
    }

    if n >= config.pup_guard_min_members {
        let mut far: Option<usize> = None;
        for k in 0..n {
            if roles[k].1 == Role::Harasser
                && far.is_none_or(|f| dist_sq(&candidates[k]) > dist_sq(&candidates[f]))
            {
                far = Some(k);
            }
        }
        if let Some(k) = far {
            roles[k].1 = Role::PupGuard;
        }
    }
    roles
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// Send `message` from `sender` to every other active agent within
/// `radius`. Returns the number of recipients, or `None` if the sender is
/// inactive or still on its message cooldown.
pub fn broadcast(
    pool: &mut AgentPool,
    sender: AgentId,
    message: PackMessage,
    radius: f32,
    clock: &SimClock,
    config: &PackConfig,
) -> Option<u32> {
    let (origin, sighting, seen_at) = {
        let s = pool.get(sender).filter(|a| a.active)?;
        if clock.within(s.last_message_sent, config.message_cooldown) {
            return None;
        }
        (s.pos, s.memory.last_seen, s.memory.last_seen_at)
    };

    let mut recipients = 0;
    for agent in pool.iter_active_mut() {
        if agent.id == sender || agent.pos.distance(origin) >= radius {
            continue;
        }
        recipients += 1;
        agent.last_communication = Some(clock.now);
        match message {
            PackMessage::TargetSpotted => {
                if agent.memory.seen_confidence < config.spotted_confidence {
                    agent.memory.seen_confidence = config.spotted_confidence;
                    agent.memory.last_seen = sighting;
                    agent.memory.last_seen_at = seen_at;
                }
            }
            PackMessage::AttackNow => {
                if agent.fatigue < config.attack_now_fatigue {
                    agent.target_locked = true;
                }
            }
            PackMessage::Retreat => {
                agent.retreat_until = Some(clock.after(config.retreat_message_secs));
                agent.target_locked = false;
            }
            PackMessage::Regroup => agent.target_locked = false,
            PackMessage::FlankLeft => {
                if agent.role == Role::Harasser {
                    agent.role = Role::FlankLeft;
                }
            }
            PackMessage::FlankRight => {
                if agent.role == Role::Harasser {
                    agent.role = Role::FlankRight;
                }
            }
        }
    }

    if let Some(s) = pool.get_mut(sender) {
        s.last_message_sent = Some(clock.now);
    }
    Some(recipients)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::prng::SimRng;

    fn candidate(id: u16, x: f32, y: f32) -> RoleCandidate {
        RoleCandidate {
            id: AgentId(id),
            pos: Vec2::new(x, y),
            health: 1.0,
            fatigue: 0.0,
            stamina: 1.0,
        }
    }

    fn stats(count: usize, distance: f32, health: f32, fatigue: f32) -> PackStats {
        PackStats {
            count,
            avg_distance: distance,
            avg_health: health,
            avg_fatigue: fatigue,
            healthy: count,
            ..PackStats::default()
        }
    }

    fn pool_with(positions: &[Vec2]) -> AgentPool {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let mut rng = SimRng::new(3);
        let mut pool = AgentPool::new(config.agent.capacity);
        for &pos in positions {
            pool.activate(|id| {
                Agent::spawn(id, pos, None, &clock, &mut rng, &config.agent, &config.biomes.forest)
            });
        }
        pool
    }

    #[test]
    fn plan_ladder() {
        let config = PackConfig::default();
        let mut pack = Pack::new(&SimClock::new(), &config);
        assert_eq!(pack.select_plan(&stats(3, 0.1, 0.2, 0.0), &config), Plan::Retreat);
        assert_eq!(pack.select_plan(&stats(3, 0.1, 1.0, 0.9), &config), Plan::Retreat);
        assert_eq!(pack.select_plan(&stats(3, 0.5, 1.0, 0.0), &config), Plan::Stalk);
        pack.skill = 0.3;
        assert_eq!(pack.select_plan(&stats(3, 0.5, 1.0, 0.0), &config), Plan::Ambush);
        assert_eq!(pack.select_plan(&stats(2, 0.5, 1.0, 0.0), &config), Plan::Stalk);
        assert_eq!(pack.select_plan(&stats(3, 0.2, 1.0, 0.0), &config), Plan::Encircle);
        pack.morale = 0.7;
        assert_eq!(pack.select_plan(&stats(4, 0.2, 1.0, 0.0), &config), Plan::Pincer);
        assert_eq!(pack.select_plan(&stats(4, 0.1, 1.0, 0.1), &config), Plan::Commit);
        pack.morale = 0.5;
        assert_eq!(pack.select_plan(&stats(4, 0.1, 1.0, 0.1), &config), Plan::Harass);
    }

    #[test]
    fn plan_change_is_stamped_and_logged() {
        let config = PackConfig::default();
        let mut clock = SimClock::new();
        let mut pack = Pack::new(&clock, &config);
        let mut events = EventLog::new(0);
        clock.advance(1.5);
        assert_eq!(pack.set_plan(Plan::Harass, &clock, &mut events), Some(Plan::Stalk));
        assert_eq!(pack.plan_since, 1.5);
        assert!(pack.set_plan(Plan::Harass, &clock, &mut events).is_none());
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn skill_tracks_recent_outcomes() {
        let config = PackConfig::default();
        let clock = SimClock::new();
        let mut pack = Pack::new(&clock, &config);
        pack.record_failure(&clock);
        pack.update_skill(&clock, &config);
        assert!((pack.skill - 0.51).abs() < 1e-6);
        pack.skill = 1.0;
        pack.update_skill(&clock, &config);
        assert_eq!(pack.skill, 1.0);
    }

    #[test]
    fn roles_pick_lead_flanks_and_guard() {
        let config = PackConfig::default();
        let player = Vec2::new(0.5, 0.5);
        let candidates = [
            candidate(0, 0.5, 0.4),
            candidate(1, 0.6, 0.5),
            candidate(2, 0.4, 0.5),
            candidate(3, 0.5, 0.9),
        ];
        let roles = assign_roles(&candidates, Plan::Encircle, player, None, &config);
        assert_eq!(roles[0].1, Role::Lead);
        // Lead approaches along +y; x > 0.5 is to the right of that line.
        assert_eq!(roles[1].1, Role::FlankRight);
        assert_eq!(roles[2].1, Role::FlankLeft);
        assert_eq!(roles[3].1, Role::PupGuard);
    }

    #[test]
    fn ambush_and_pincer_roles() {
        let config = PackConfig::default();
        let player = Vec2::new(0.5, 0.5);
        let candidates = [
            candidate(0, 0.5, 0.45),
            candidate(1, 0.5, 0.7),
            candidate(2, 0.5, 0.95),
            candidate(3, 0.3, 0.5),
        ];
        let roles = assign_roles(&candidates, Plan::Ambush, player, None, &config);
        assert_eq!(roles[2].1, Role::Ambusher);
        let roles = assign_roles(&candidates, Plan::Pincer, player, None, &config);
        assert_eq!(roles[1].1, Role::Scout);
        assert!(roles.iter().all(|(_, r)| *r != Role::None));
    }

    #[test]
    fn leader_overrides_lead_score() {
        let config = PackConfig::default();
        let player = Vec2::new(0.5, 0.5);
        let candidates = [candidate(0, 0.5, 0.45), candidate(1, 0.9, 0.9)];
        let roles = assign_roles(&candidates, Plan::Stalk, player, Some(AgentId(1)), &config);
        assert_eq!(roles[1].1, Role::Lead);
        assert_ne!(roles[0].1, Role::Lead);
    }

    #[test]
    fn broadcast_reaches_only_nearby_agents() {
        let config = PackConfig::default();
        let clock = SimClock::new();
        let mut pool = pool_with(&[Vec2::new(0.1, 0.1), Vec2::new(0.2, 0.1), Vec2::new(0.9, 0.9)]);
        let n = broadcast(&mut pool, AgentId(0), PackMessage::AttackNow, 0.4, &clock, &config);
        assert_eq!(n, Some(1));
        assert!(pool.get(AgentId(1)).is_some_and(|a| a.target_locked));
        assert!(pool.get(AgentId(2)).is_some_and(|a| !a.target_locked));
        // Sender cooldown.
        let again = broadcast(&mut pool, AgentId(0), PackMessage::Regroup, 0.4, &clock, &config);
        assert!(again.is_none());
    }

    #[test]
    fn target_spotted_shares_sighting() {
        let config = PackConfig::default();
        let clock = SimClock::new();
        let mut pool = pool_with(&[Vec2::new(0.1, 0.1), Vec2::new(0.2, 0.1)]);
        if let Some(a) = pool.get_mut(AgentId(0)) {
            a.memory.last_seen = Vec2::new(0.3, 0.3);
        }
        broadcast(&mut pool, AgentId(0), PackMessage::TargetSpotted, 0.4, &clock, &config);
        let b = pool.get(AgentId(1)).map(|a| a.memory.clone()).unwrap_or_default();
        assert_eq!(b.seen_confidence, 0.5);
        assert_eq!(b.last_seen, Vec2::new(0.3, 0.3));
    }

    #[test]
    fn howl_reinforces_when_player_wounded() {
        let config = PackConfig::default();
        let clock = SimClock::new();
        let mut pack = Pack::new(&clock, &config);
        let mut events = EventLog::new(0);
        pack.morale = 0.9;
        assert_eq!(
            pack.howl(3, 0.5, &clock, &config, &mut events),
            Some(HowlAction::Reinforce)
        );
        assert!(pack.howl(3, 0.5, &clock, &config, &mut events).is_none());

        let mut pack = Pack::new(&clock, &config);
        pack.morale = 0.9;
        assert_eq!(
            pack.howl(3, 0.9, &clock, &config, &mut events),
            Some(HowlAction::Encircle)
        );
        assert_eq!(pack.plan, Plan::Encircle);
        assert!(pack.plan_hold_until.is_some());
    }

    #[test]
    fn update_on_empty_pool_stalks() {
        let config = SimConfig::default();
        let clock = SimClock::new();
        let mut pack = Pack::new(&clock, &config.pack);
        pack.plan = Plan::Commit;
        let mut pool = AgentPool::new(4);
        let dangers = DangerZones::new(4);
        let env = PackEnvironment {
            player_pos: Vec2::new(0.5, 0.5),
            player_health: 1.0,
            den: None,
            dangers: &dangers,
        };
        let mut events = EventLog::new(0);
        let d = pack.update(
            &mut pool,
            &[],
            None,
            &env,
            &DifficultyParams::default(),
            &clock,
            0.1,
            &config.pack,
            &mut events,
        );
        assert_eq!(d.plan, Plan::Stalk);
        assert!(d.roles.is_empty());
        assert!(pack.is_sane());
    }
}
