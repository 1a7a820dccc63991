// Simulation events emitted as tick output.
//
// The sim advances in fixed caller-driven ticks, so there is no internal
// scheduling queue: every timer is a timestamp in state (see `clock.rs`).
// What remains is the narrative/telemetry stream. Each `tick` returns the
// `SimEvent`s it produced, in the order the subsystems produced them, for
// audio, UI, replays and desync diagnostics. Events are pure output: nothing
// in the sim reads them back.
//
// See also: `sim.rs` for the tick loop that collects events,
// `integrity.rs` for `SubsystemReset`, `types.rs` for the IDs and enums
// carried here.
//
// **Critical constraint: determinism.** Event order within a tick follows
// the fixed subsystem order of `SimulationWorld::tick`, and within a
// subsystem the agent slot order. Two peers emit identical streams.

use crate::types::*;
use serde::{Deserialize, Serialize};

/// An event emitted during a tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

/// Scope of a corruption recovery, narrowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetScope {
    Agent(AgentId),
    /// Free list rebuilt from the slots' active flags.
    Pool,
    Combat,
    Pack,
    /// Lineage slot index.
    Lineage(usize),
    /// Whole run re-initialized from its seed.
    Run,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SimEventKind {
    // Player
    AttackStarted { kind: AttackKind, combo: u32 },
    AttackFeinted,
    RollStarted,
    Jumped,
    PlayerHitAgent { agent: AgentId, damage: f32 },
    AgentKilled { agent: AgentId },
    /// Every `kills_per_choice` kills the player is offered a reward pick.
    ChoiceOffered { kills: u32 },
    IncomingAttack { agent: AgentId, outcome: AttackOutcome },
    PlayerLatched { agent: AgentId },
    PlayerDowned,

    // Pack
    PlanChanged { from: Plan, to: Plan },
    PackMessageSent { sender: AgentId, message: PackMessage, recipients: u32 },
    ReinforcementsArrived { count: u32 },
    LineageDied { lineage: LineageId },
    LineageRespawned { lineage: LineageId, members: u32 },

    // Alpha and territory
    AlphaElected { agent: AgentId },
    AlphaLost { agent: AgentId },
    AlphaAbilityUsed { agent: AgentId, ability: AlphaAbility },
    Vocalization { agent: Option<AgentId>, call: Vocalization },
    TerritoryMarked { zone: usize, created: bool },
    TerritoryFaded { zone: usize },

    // Difficulty
    DifficultyRetuned { skill: f32 },

    // Integrity
    SubsystemReset { scope: ResetScope },
}

/// Collects events during a tick, stamping each with the tick number.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    tick: u64,
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new(tick: u64) -> Self {
        Self {
            tick,
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, kind: SimEventKind) {
        self.events.push(SimEvent {
            tick: self.tick,
            kind,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<SimEvent> {
        self.events
    }
}
