// Territory zones marked by the alpha.
//
// A fixed pool of zone slots (`TerritoryConfig::capacity`). Every
// `mark_interval` seconds the alpha marks its position for its lineage: a
// mark near one of that lineage's zones reinforces it (stronger, slightly
// wider), otherwise it claims a free slot. When the pool is full the mark
// is dropped. Zones left unmarked past `decay_grace` lose strength and the
// slot frees when strength reaches zero. Slot indices are stable, so events
// and snapshots can name a zone by index.
//
// Members standing inside their own lineage's territory gain morale and
// aggression in proportion to the local strength, which peaks at the
// center and falls to zero at the rim. A Calm member there turns Confident.
//
// See also: `alpha.rs` for who marks, `lineage.rs` for the owning IDs.
//
// **Critical constraint: determinism.** No RNG; zones are scanned in slot
// order and ties in reinforcement go to the lowest slot.

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::config::TerritoryConfig;
use crate::event::{EventLog, SimEventKind};
use crate::math::{clamp01, Vec2};
use crate::pool::AgentPool;
use crate::types::{EmotionalState, LineageId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub center: Vec2,
    pub radius: f32,
    pub owner: LineageId,
    pub strength: f32,
    pub last_marked: f64,
}

impl Zone {
    /// Strength felt at `pos`: full at the center, zero at the rim.
    pub fn strength_at(&self, pos: Vec2) -> f32 {
        let d = pos.distance(self.center);
        if d < self.radius {
            self.strength * (1.0 - d / self.radius)
        } else {
            0.0
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Territories {
    pub zones: Vec<Option<Zone>>,
    pub last_mark: Option<f64>,
}

impl Territories {
    pub fn new(config: &TerritoryConfig) -> Self {
        Self {
            zones: vec![None; config.capacity],
            last_mark: None,
        }
    }

    pub fn active_count(&self) -> usize {
        self.zones.iter().flatten().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Zone)> {
        self.zones
            .iter()
            .enumerate()
            .filter_map(|(i, z)| z.as_ref().map(|z| (i, z)))
    }

    /// Strongest own-territory strength at `pos` for `owner`.
    pub fn strength_at(&self, pos: Vec2, owner: LineageId) -> f32 {
        self.iter()
            .filter(|(_, z)| z.owner == owner)
            .map(|(_, z)| z.strength_at(pos))
            .fold(0.0, f32::max)
    }

    /// Mark `pos` for `owner` if the mark interval has elapsed. Returns the
    /// slot touched, if any.
    pub fn mark(
        &mut self,
        pos: Vec2,
        owner: LineageId,
        clock: &SimClock,
        config: &TerritoryConfig,
        events: &mut EventLog,
    ) -> Option<usize> {
        if self.last_mark.is_some() && clock.since(self.last_mark) < config.mark_interval {
            return None;
        }
        self.last_mark = Some(clock.now);

        let existing = self.zones.iter_mut().enumerate().find_map(|(i, slot)| {
            let reach = config.merge_scale;
            slot.as_mut()
                .filter(|z| z.owner == owner && pos.distance(z.center) < z.radius * reach)
                .map(|z| (i, z))
        });
        if let Some((i, zone)) = existing {
            zone.strength = (zone.strength + config.strength_gain).min(1.0);
            zone.radius = (zone.radius * config.radius_growth).min(config.max_radius);
            zone.last_marked = clock.now;
            events.push(SimEventKind::TerritoryMarked {
                zone: i,
                created: false,
            });
            return Some(i);
        }

        let free = self.zones.iter().position(Option::is_none)?;
        self.zones[free] = Some(Zone {
            center: pos,
            radius: config.new_radius,
            owner,
            strength: config.new_strength,
            last_marked: clock.now,
        });
        tracing::debug!(zone = free, %owner, t = clock.now, "territory claimed");
        events.push(SimEventKind::TerritoryMarked {
            zone: free,
            created: true,
        });
        Some(free)
    }

    /// Weaken zones left unmarked past the grace period; free the empty ones.
    pub fn decay(
        &mut self,
        clock: &SimClock,
        dt: f32,
        config: &TerritoryConfig,
        events: &mut EventLog,
    ) {
        for (i, slot) in self.zones.iter_mut().enumerate() {
            let Some(zone) = slot else {
                continue;
            };
            if clock.since(Some(zone.last_marked)) <= config.decay_grace {
                continue;
            }
            zone.strength -= config.decay_per_sec * dt;
            if zone.strength <= 0.0 {
                *slot = None;
                events.push(SimEventKind::TerritoryFaded { zone: i });
            }
        }
    }

    /// Home-ground effects on members standing in their own territory.
    pub fn apply(&self, pool: &mut AgentPool, dt: f32, config: &TerritoryConfig) {
        if self.active_count() == 0 {
            return;
        }
        for agent in pool.iter_active_mut() {
            self.apply_to(agent, dt, config);
        }
    }

    fn apply_to(&self, agent: &mut Agent, dt: f32, config: &TerritoryConfig) {
        let Some(owner) = agent.lineage else {
            return;
        };
        let strength = self.strength_at(agent.pos, owner);
        if strength <= 0.0 {
            return;
        }
        agent.morale = clamp01(agent.morale + strength * config.morale_bonus * dt);
        agent.aggression = clamp01(agent.aggression + strength * config.aggression_bonus * dt);
        if agent.emotion == EmotionalState::Calm {
            agent.emotion = EmotionalState::Confident;
        }
    }

    pub fn is_sane(&self, config: &TerritoryConfig) -> bool {
        self.zones.len() == config.capacity
            && self.iter().all(|(_, z)| {
                z.center.is_finite()
                    && z.radius.is_finite()
                    && z.radius > 0.0
                    && z.radius <= config.max_radius
                    && (0.0..=1.0).contains(&z.strength)
            })
    }
}
