// Post-tick invariant audit.
//
// `audit` inspects the world's subsystems after every tick and returns the
// narrowest reset scope for each breach it finds. `SimulationWorld::tick`
// then applies the resets in the returned order, logs each one, and emits a
// `SubsystemReset` event. Scopes, narrowest first:
//
// - `Agent(id)`: a non-finite or out-of-range agent, an active agent at
//   zero health, or an inactive slot still holding a role. The slot is
//   wiped to vacant.
// - `Pool`: free list out of step with the slots' active flags. Rebuilt.
// - `Combat`: the player's combat state breaks its phase rules. Reset to
//   neutral.
// - `Pack`: pack morale/skill/sync or a territory zone out of range. The
//   pack, alpha and territories start fresh.
// - `Lineage(slot)`: a lineage that is dead but holds members or has no
//   timer, over capacity, or claims an agent another lineage already
//   claims. Killed with a fresh respawn timer.
// - `Run`: the clock, player body or difficulty state is broken. Nothing
//   narrower can be trusted, so the run is re-initialized from its seed.
//   A `Run` breach is returned alone.
//
// See also: `sim.rs` for where the resets are applied, `event.rs` for
// `ResetScope`.
//
// **Critical constraint: determinism.** The audit only reads state and
// scans in slot order, so two peers that hold identical state produce the
// same reset list.

use crate::alpha::Alpha;
use crate::clock::SimClock;
use crate::config::SimConfig;
use crate::difficulty::Difficulty;
use crate::event::ResetScope;
use crate::lineage::Lineages;
use crate::pack::Pack;
use crate::player::Player;
use crate::pool::AgentPool;
use crate::territory::Territories;
use crate::types::{AgentId, Role};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

pub type Breaches = SmallVec<[ResetScope; 4]>;

/// Read-only view of the audited subsystems.
pub struct AuditView<'a> {
    pub clock: &'a SimClock,
    pub pool: &'a AgentPool,
    pub player: &'a Player,
    pub pack: &'a Pack,
    pub alpha: &'a Alpha,
    pub lineages: &'a Lineages,
    pub territories: &'a Territories,
    pub difficulty: &'a Difficulty,
    pub config: &'a SimConfig,
}

pub fn audit(view: &AuditView<'_>) -> Breaches {
    let mut breaches = Breaches::new();

    if !view.clock.now.is_finite()
        || view.clock.now < 0.0
        || !view.player.is_sane()
        || !view.difficulty.is_sane()
    {
        breaches.push(ResetScope::Run);
        return breaches;
    }

    for agent in view.pool.slots() {
        let broken = if agent.active {
            !agent.is_sane() || agent.health <= 0.0
        } else {
            agent.role != Role::None
        };
        if broken {
            breaches.push(ResetScope::Agent(agent.id));
        }
    }

    if !pool_bookkeeping_ok(view.pool) {
        breaches.push(ResetScope::Pool);
    }

    if !view.player.combat.is_consistent() {
        breaches.push(ResetScope::Combat);
    }

    let alpha_ok = view
        .alpha
        .agent
        .is_none_or(|id| id.index() < view.pool.capacity());
    if !view.pack.is_sane() || !view.territories.is_sane(&view.config.territory) || !alpha_ok {
        breaches.push(ResetScope::Pack);
    }

    let mut claimed: FxHashSet<AgentId> = FxHashSet::default();
    for (slot, lineage) in view.lineages.slots.iter().enumerate() {
        let mut ok = lineage.is_consistent(&view.config.lineage);
        for member in &lineage.members {
            ok &= claimed.insert(*member);
        }
        if !ok {
            breaches.push(ResetScope::Lineage(slot));
        }
    }

    breaches
}

/// Every slot is either active or on the free list exactly once.
fn pool_bookkeeping_ok(pool: &AgentPool) -> bool {
    let mut seen: FxHashSet<u16> = FxHashSet::default();
    for &index in pool.free_list() {
        let vacant = pool
            .slots()
            .get(index as usize)
            .is_some_and(|a| !a.active);
        if !vacant || !seen.insert(index) {
            return false;
        }
    }
    let inactive = pool.slots().iter().filter(|a| !a.active).count();
    inactive == seen.len()
}
