// Lineages: the spawn groups that keep the hunt populated.
//
// A fixed number of lineage slots (three by default) each hold one spawn
// group of up to six agents. Every tick `Lineages::update` prunes members
// that are no longer active, marks a lineage dead the first tick it has no
// living members, and starts its respawn timer. When the timer runs out the
// slot respawns under a fresh `LineageId` somewhere away from the player.
//
// Spawn size is `base_size + rng % size_spread`, plus the biome's extra
// members, clamped to `max_members` and to the free pool slots. The spawn
// center is searched on a ring around the player, rejecting points too
// close to the arena edge; after the configured attempts it falls back to
// a fixed ring position for that slot.
//
// See also: `pool.rs` for slot allocation, `agent.rs` for `Agent::spawn`,
// `integrity.rs` for the lineage reset path.
//
// **Critical constraint: determinism.** Draw order per spawn: size, biome
// extras, center search (two draws per attempt), then for each member two
// placement draws followed by `Agent::spawn`'s own draws.

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::config::{AgentConfig, BiomeProfile, LineageConfig};
use crate::event::{EventLog, SimEventKind};
use crate::math::{self, Vec2, TAU};
use crate::pool::AgentPool;
use crate::prng::SimRng;
use crate::types::{AgentId, LineageId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lineage {
    pub id: LineageId,
    pub members: SmallVec<[AgentId; 6]>,
    pub alive: bool,
    pub center: Vec2,
    pub spawned_at: f64,
    pub died_at: Option<f64>,
    /// Respawn time while dead.
    pub respawn_at: Option<f64>,
}

impl Lineage {
    /// A dead lineage holds no members and always has a respawn timer.
    pub fn is_consistent(&self, config: &LineageConfig) -> bool {
        self.members.len() <= config.max_members
            && (self.alive || (self.members.is_empty() && self.respawn_at.is_some()))
    }

    fn empty(id: LineageId) -> Self {
        Self {
            id,
            members: SmallVec::new(),
            alive: false,
            center: Vec2::ZERO,
            spawned_at: 0.0,
            died_at: None,
            respawn_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lineages {
    pub slots: Vec<Lineage>,
    next_id: u32,
}

/// Everything a spawn needs besides the pool.
pub struct SpawnContext<'a> {
    pub player_pos: Vec2,
    pub agent: &'a AgentConfig,
    pub biome: &'a BiomeProfile,
}

impl Lineages {
    pub fn new(config: &LineageConfig) -> Self {
        let slots = (0..config.count)
            .map(|i| Lineage::empty(LineageId(i as u32)))
            .collect();
        Self {
            slots,
            next_id: config.count as u32,
        }
    }

    pub fn get(&self, slot: usize) -> Option<&Lineage> {
        self.slots.get(slot)
    }

    pub fn alive_count(&self) -> usize {
        self.slots.iter().filter(|l| l.alive).count()
    }

    /// Slot index of the lineage with `id`.
    pub fn slot_of(&self, id: LineageId) -> Option<usize> {
        self.slots.iter().position(|l| l.id == id)
    }

    /// Spawn every slot at run start.
    pub fn populate(
        &mut self,
        pool: &mut AgentPool,
        ctx: &SpawnContext<'_>,
        rng: &mut SimRng,
        clock: &SimClock,
        config: &LineageConfig,
    ) {
        for slot in 0..self.slots.len() {
            self.spawn(slot, pool, ctx, rng, clock, config);
        }
    }

    /// (Re)spawn the lineage in `slot` under a fresh ID. Returns the number
    /// of members placed; zero leaves the slot dead with a new timer.
    pub fn spawn(
        &mut self,
        slot: usize,
        pool: &mut AgentPool,
        ctx: &SpawnContext<'_>,
        rng: &mut SimRng,
        clock: &SimClock,
        config: &LineageConfig,
    ) -> usize {
        if slot >= self.slots.len() {
            return 0;
        }
        let mut size = config.base_size + rng.range_usize(0, config.size_spread);
        size += rng.range_usize_inclusive(ctx.biome.extra_min, ctx.biome.extra_max);
        let size = size.min(config.max_members).min(pool.free_count());

        let center = spawn_center(slot, self.slots.len(), ctx.player_pos, rng, config);
        let id = LineageId(self.next_id);
        self.next_id += 1;

        let mut members = SmallVec::new();
        for _ in 0..size {
            let angle = rng.next_f32() * TAU;
            let r = config.spread * (0.4 + 0.6 * rng.next_f32());
            let pos = (center + math::from_angle(angle) * r).clamp_unit();
            let spawned = pool.activate(|agent_id| {
                Agent::spawn(agent_id, pos, Some(id), clock, rng, ctx.agent, ctx.biome)
            });
            if let Some(agent_id) = spawned {
                members.push(agent_id);
            }
        }

        let count = members.len();
        let lineage = &mut self.slots[slot];
        lineage.id = id;
        lineage.members = members;
        lineage.center = center;
        lineage.spawned_at = clock.now;
        lineage.alive = count > 0;
        lineage.died_at = None;
        lineage.respawn_at = if count > 0 {
            None
        } else {
            Some(clock.after(config.respawn_delay))
        };
        count
    }

    /// Add a reinforcement to the lineage with `id`. Refused when the
    /// lineage is dead, unknown or full.
    pub fn adopt(&mut self, id: LineageId, agent: AgentId, config: &LineageConfig) -> bool {
        let Some(lineage) = self.slots.iter_mut().find(|l| l.id == id) else {
            return false;
        };
        if !lineage.alive || lineage.members.len() >= config.max_members {
            return false;
        }
        lineage.members.push(agent);
        true
    }

    /// Drop a lineage to dead with a fresh respawn timer.
    pub fn kill(&mut self, slot: usize, clock: &SimClock, config: &LineageConfig) -> bool {
        let Some(lineage) = self.slots.get_mut(slot) else {
            return false;
        };
        lineage.members.clear();
        lineage.alive = false;
        lineage.died_at = Some(clock.now);
        lineage.respawn_at = Some(clock.after(config.respawn_delay));
        true
    }

    /// Prune members, detect deaths, and respawn expired slots.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        pool: &mut AgentPool,
        ctx: &SpawnContext<'_>,
        rng: &mut SimRng,
        clock: &SimClock,
        config: &LineageConfig,
        events: &mut EventLog,
    ) {
        for slot in 0..self.slots.len() {
            let lineage = &mut self.slots[slot];
            let id = lineage.id;
            lineage
                .members
                .retain(|m| pool.get(*m).is_some_and(|a| a.lineage == Some(id) && a.is_alive()));

            if lineage.alive && lineage.members.is_empty() {
                lineage.alive = false;
                lineage.died_at = Some(clock.now);
                lineage.respawn_at = Some(clock.after(config.respawn_delay));
                tracing::info!(%id, slot, t = clock.now, "lineage wiped out");
                events.push(SimEventKind::LineageDied { lineage: id });
                continue;
            }

            if !lineage.alive && lineage.respawn_at.is_some() && !clock.before(lineage.respawn_at) {
                let placed = self.spawn(slot, pool, ctx, rng, clock, config);
                let id = self.slots[slot].id;
                if placed > 0 {
                    tracing::info!(%id, slot, members = placed, t = clock.now, "lineage respawned");
                    events.push(SimEventKind::LineageRespawned {
                        lineage: id,
                        members: placed as u32,
                    });
                }
            }
        }
    }

    pub fn is_consistent(&self, config: &LineageConfig) -> bool {
        self.slots.iter().all(|l| l.is_consistent(config))
    }
}

/// Pick a spawn center away from the player and inside the margin box.
fn spawn_center(
    slot: usize,
    slots: usize,
    player: Vec2,
    rng: &mut SimRng,
    config: &LineageConfig,
) -> Vec2 {
    let lo = config.spawn_margin;
    let hi = 1.0 - config.spawn_margin;
    let inside = |p: Vec2| p.x >= lo && p.x <= hi && p.y >= lo && p.y <= hi;

    for _ in 0..config.spawn_attempts {
        let angle = rng.next_f32() * TAU;
        let dist = rng.range_f32(config.spawn_min_distance, config.spawn_max_distance);
        let candidate = player + math::from_angle(angle) * dist;
        if inside(candidate) {
            return candidate;
        }
    }

    // Ring fallback: slots spread evenly around the player, pulled into the
    // margin box.
    let angle = TAU * slot as f32 / slots.max(1) as f32;
    let p = player + math::from_angle(angle) * config.spawn_min_distance;
    Vec2::new(p.x.clamp(lo, hi), p.y.clamp(lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    struct Rig {
        config: SimConfig,
        pool: AgentPool,
        lineages: Lineages,
        rng: SimRng,
        clock: SimClock,
        events: EventLog,
    }

    impl Rig {
        fn new(seed: u64) -> Self {
            let config = SimConfig::default();
            Self {
                pool: AgentPool::new(config.agent.capacity),
                lineages: Lineages::new(&config.lineage),
                rng: SimRng::new(seed),
                clock: SimClock::new(),
                events: EventLog::new(0),
                config,
            }
        }

        fn populate(&mut self) {
            let config = self.config.clone();
            let ctx = SpawnContext {
                player_pos: Vec2::new(0.5, 0.5),
                agent: &config.agent,
                biome: &config.biomes.forest,
            };
            self.lineages
                .populate(&mut self.pool, &ctx, &mut self.rng, &self.clock, &config.lineage);
        }

        fn update(&mut self) {
            let config = self.config.clone();
            let ctx = SpawnContext {
                player_pos: Vec2::new(0.5, 0.5),
                agent: &config.agent,
                biome: &config.biomes.forest,
            };
            self.lineages.update(
                &mut self.pool,
                &ctx,
                &mut self.rng,
                &self.clock,
                &config.lineage,
                &mut self.events,
            );
        }

        fn wipe(&mut self, slot: usize) {
            let members = self.lineages.slots[slot].members.clone();
            for m in members {
                self.pool.deactivate(m);
            }
        }
    }

    #[test]
    fn populate_fills_every_slot_within_bounds() {
        let mut rig = Rig::new(1);
        rig.populate();
        assert_eq!(rig.lineages.alive_count(), 3);
        let total: usize = rig.lineages.slots.iter().map(|l| l.members.len()).sum();
        assert_eq!(total, rig.pool.active_count());
        assert!(total <= rig.config.agent.capacity);
        for lineage in &rig.lineages.slots {
            assert!((1..=6).contains(&lineage.members.len()));
            for m in &lineage.members {
                let agent = rig.pool.get(*m).map(|a| a.lineage);
                assert_eq!(agent, Some(Some(lineage.id)));
            }
        }
        assert!(rig.lineages.is_consistent(&rig.config.lineage));
    }

    #[test]
    fn spawn_center_keeps_away_from_player_and_edges() {
        let config = LineageConfig::default();
        let mut rng = SimRng::new(9);
        for slot in 0..3 {
            let c = spawn_center(slot, 3, Vec2::new(0.5, 0.5), &mut rng, &config);
            assert!(c.x >= 0.18 && c.x <= 0.82 && c.y >= 0.18 && c.y <= 0.82);
        }
    }

    #[test]
    fn wiped_lineage_dies_once_and_respawns_once() {
        let mut rig = Rig::new(4);
        rig.populate();
        let old_id = rig.lineages.slots[1].id;
        rig.wipe(1);

        rig.clock.advance(0.1);
        rig.update();
        let lineage = &rig.lineages.slots[1];
        assert!(!lineage.alive);
        let delay = lineage.respawn_at.map(|t| t - rig.clock.now);
        assert!(delay.is_some_and(|d| (d - 30.0).abs() < 1e-9));

        // Still dead: no second death event.
        rig.clock.advance(10.0);
        rig.update();
        let died = |rig: &Rig| {
            rig.events
                .clone()
                .into_events()
                .iter()
                .filter(|e| matches!(e.kind, SimEventKind::LineageDied { .. }))
                .count()
        };
        assert_eq!(died(&rig), 1);

        rig.clock.advance(20.0);
        rig.update();
        rig.clock.advance(0.1);
        rig.update();
        let respawns = rig
            .events
            .clone()
            .into_events()
            .iter()
            .filter(|e| matches!(e.kind, SimEventKind::LineageRespawned { .. }))
            .count();
        assert_eq!(respawns, 1);
        let lineage = &rig.lineages.slots[1];
        assert!(lineage.alive);
        assert_ne!(lineage.id, old_id);
        assert!(lineage.respawn_at.is_none());
    }

    #[test]
    fn adopt_respects_capacity() {
        let mut rig = Rig::new(2);
        rig.populate();
        let id = rig.lineages.slots[0].id;
        let room = 6 - rig.lineages.slots[0].members.len();
        for i in 0..room {
            assert!(rig.lineages.adopt(id, AgentId(100 + i as u16), &rig.config.lineage));
        }
        assert!(!rig.lineages.adopt(id, AgentId(200), &rig.config.lineage));
        assert!(!rig.lineages.adopt(LineageId(999), AgentId(201), &rig.config.lineage));
    }
}
