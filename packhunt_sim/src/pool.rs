// Fixed-capacity slot arena for pack agents.
//
// The pool owns `capacity` `Agent` records for the whole run. Spawning pops
// a slot index off a free list and overwrites the record; deactivation
// clears the slot's role and pushes it back. Slot indices are the agents'
// stable `AgentId`s and the iteration order of every per-agent loop in the
// sim.
//
// Accessors are total: an out-of-range or inactive ID yields `None`, never a
// panic, so stale IDs held in lineages, latches or alpha state are harmless.
//
// **Critical constraint: determinism.** The free list is a stack seeded in
// descending order, so allocation always returns the lowest free index
// first on a fresh pool, and reuse order is a pure function of the
// deactivation history.

use crate::agent::Agent;
use crate::types::{AgentId, Role};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentPool {
    slots: Vec<Agent>,
    free: Vec<u16>,
}

impl AgentPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize);
        let slots = (0..capacity)
            .map(|i| Agent::vacant(AgentId(i as u16)))
            .collect();
        let free = (0..capacity as u16).rev().collect();
        Self { slots, free }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Claim a free slot and fill it with the agent built by `make`.
    /// Returns `None` (without calling `make`) when the pool is full.
    pub fn activate(&mut self, make: impl FnOnce(AgentId) -> Agent) -> Option<AgentId> {
        let index = self.free.pop()?;
        let id = AgentId(index);
        let mut agent = make(id);
        agent.id = id;
        agent.active = true;
        self.slots[id.index()] = agent;
        Some(id)
    }

    /// Return a slot to the free list. Refused (returns `false`) for
    /// out-of-range or already inactive slots.
    pub fn deactivate(&mut self, id: AgentId) -> bool {
        let Some(agent) = self.slots.get_mut(id.index()) else {
            return false;
        };
        if !agent.active {
            return false;
        }
        agent.active = false;
        agent.role = Role::None;
        agent.target_locked = false;
        agent.vel = crate::math::Vec2::ZERO;
        self.free.push(id.0);
        true
    }

    /// The active agent in slot `id`.
    pub fn get(&self, id: AgentId) -> Option<&Agent> {
        self.slots.get(id.index()).filter(|a| a.active)
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut Agent> {
        self.slots.get_mut(id.index()).filter(|a| a.active)
    }

    pub fn is_active(&self, id: AgentId) -> bool {
        self.get(id).is_some()
    }

    /// Active agents in slot order.
    pub fn iter_active(&self) -> impl Iterator<Item = &Agent> {
        self.slots.iter().filter(|a| a.active)
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.slots.iter_mut().filter(|a| a.active)
    }

    /// IDs of active agents in slot order. Collected so callers can mutate
    /// the pool while walking it.
    pub fn active_ids(&self) -> Vec<AgentId> {
        self.iter_active().map(|a| a.id).collect()
    }

    /// Every slot, active or not. Used by the integrity audit.
    pub fn slots(&self) -> &[Agent] {
        &self.slots
    }

    /// Raw free list. Used by the integrity audit.
    pub fn free_list(&self) -> &[u16] {
        &self.free
    }

    /// Wipe slot `id` back to a vacant record, deactivating it first if
    /// needed. The integrity audit's agent-scope reset.
    pub fn clear_slot(&mut self, id: AgentId) -> bool {
        if id.index() >= self.slots.len() {
            return false;
        }
        self.deactivate(id);
        self.slots[id.index()] = Agent::vacant(id);
        true
    }

    /// Rebuild the free list from the slots' active flags. Used after an
    /// audit finds the two out of step.
    pub fn rebuild_free_list(&mut self) {
        self.free = self
            .slots
            .iter()
            .rev()
            .filter(|a| !a.active)
            .map(|a| a.id.0)
            .collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(n: usize) -> (AgentPool, Vec<AgentId>) {
        let mut pool = AgentPool::new(4);
        let ids = (0..n)
            .map(|_| pool.activate(Agent::vacant).unwrap())
            .collect();
        (pool, ids)
    }

    #[test]
    fn allocation_starts_at_lowest_index() {
        let (pool, ids) = pool_with(3);
        assert_eq!(ids, vec![AgentId(0), AgentId(1), AgentId(2)]);
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn full_pool_refuses_without_building() {
        let (mut pool, _) = pool_with(4);
        let mut called = false;
        let id = pool.activate(|id| {
            called = true;
            Agent::vacant(id)
        });
        assert!(id.is_none());
        assert!(!called);
    }

    #[test]
    fn deactivated_slot_is_reused_and_hidden() {
        let (mut pool, ids) = pool_with(3);
        pool.get_mut(ids[1]).unwrap().role = Role::Lead;
        assert!(pool.deactivate(ids[1]));
        assert!(pool.get(ids[1]).is_none());
        assert_eq!(pool.slots()[1].role, Role::None);
        assert_eq!(pool.active_ids(), vec![AgentId(0), AgentId(2)]);
        assert_eq!(pool.activate(Agent::vacant), Some(AgentId(1)));
    }

    #[test]
    fn double_deactivate_and_bad_ids_are_refused() {
        let (mut pool, ids) = pool_with(1);
        assert!(pool.deactivate(ids[0]));
        assert!(!pool.deactivate(ids[0]));
        assert!(!pool.deactivate(AgentId(99)));
        assert!(pool.get(AgentId(99)).is_none());
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn clear_slot_vacates_active_and_stale_records() {
        let (mut pool, ids) = pool_with(2);
        pool.get_mut(ids[0]).unwrap().health = f32::NAN;
        assert!(pool.clear_slot(ids[0]));
        assert!(pool.get(ids[0]).is_none());
        assert_eq!(pool.slots()[0].health, 0.0);
        assert_eq!(pool.free_count(), 3);
        // Already inactive: still wiped, free list untouched.
        assert!(pool.clear_slot(ids[0]));
        assert_eq!(pool.free_count(), 3);
        assert!(!pool.clear_slot(AgentId(40)));
    }

    #[test]
    fn rebuild_free_list_matches_flags() {
        let (mut pool, _) = pool_with(2);
        pool.free.clear();
        pool.rebuild_free_list();
        assert_eq!(pool.free_list(), &[3, 2]);
        assert_eq!(pool.activate(Agent::vacant), Some(AgentId(2)));
    }
}
