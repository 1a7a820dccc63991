// Core types shared across the simulation.
//
// Defines the compact entity identifiers (`AgentId`, `LineageId`) and every
// enumeration the sim dispatches on: agent emotions, roles and behavior
// states, pack plans and messages, alpha abilities, player attack and roll
// phases, and the run loadout. All types derive `Serialize` and
// `Deserialize` for snapshots and lockstep diagnostics.
//
// Enumerations are closed sum types dispatched with exhaustive `match`, so
// an out-of-range discriminant cannot exist in memory. Snapshot decoding
// rejects unknown variants at the serde layer.
//
// **Critical constraint: determinism.** IDs are slot indices and sequence
// numbers, never random or address-derived, so two peers assign identical
// IDs to identical spawns.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Entity IDs
// ---------------------------------------------------------------------------

/// Stable index of an agent slot in the `AgentPool`.
///
/// A slot keeps its ID across deactivation and reuse; whether the ID refers
/// to a living agent is answered by the pool, never by the ID itself.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct AgentId(pub u16);

impl AgentId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent#{}", self.0)
    }
}

/// Sequence number of a spawn group. Incremented per (re)spawn, so a
/// respawned lineage slot gets a fresh ID.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineageId(pub u32);

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Lineage#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Agent enums
// ---------------------------------------------------------------------------

/// Emotional modifier layer on top of an agent's attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmotionalState {
    #[default]
    Calm,
    Aggressive,
    Fearful,
    Desperate,
    Confident,
    Frustrated,
    /// Set directly by damage; decays back through the normal triggers.
    Hurt,
}

/// Tactical assignment within the current plan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Lead,
    FlankLeft,
    FlankRight,
    Harasser,
    PupGuard,
    Scout,
    Ambusher,
    #[default]
    None,
}

/// Per-agent movement mode chosen from plan and role each tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    #[default]
    Idle,
    Seek,
    Circle,
    Harass,
    /// Stunned; coasting until the stun ends.
    Recover,
    Ambush,
    Flank,
    Retreat,
}

// ---------------------------------------------------------------------------
// Pack enums
// ---------------------------------------------------------------------------

/// Pack-wide tactical mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Plan {
    #[default]
    Stalk,
    Encircle,
    Harass,
    Commit,
    Ambush,
    Pincer,
    Retreat,
}

/// Range-limited broadcast between agents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackMessage {
    TargetSpotted,
    AttackNow,
    Retreat,
    Regroup,
    FlankLeft,
    FlankRight,
}

/// Cooldown-gated leadership actions, in no particular order. Selection
/// priority lives in `alpha.rs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlphaAbility {
    RallyPack,
    CoordinatedStrike,
    Intimidate,
    CallReinforcements,
    BerserkRage,
}

impl AlphaAbility {
    pub const ALL: [AlphaAbility; 5] = [
        AlphaAbility::RallyPack,
        AlphaAbility::CoordinatedStrike,
        AlphaAbility::Intimidate,
        AlphaAbility::CallReinforcements,
        AlphaAbility::BerserkRage,
    ];

    pub fn index(self) -> usize {
        match self {
            AlphaAbility::RallyPack => 0,
            AlphaAbility::CoordinatedStrike => 1,
            AlphaAbility::Intimidate => 2,
            AlphaAbility::CallReinforcements => 3,
            AlphaAbility::BerserkRage => 4,
        }
    }
}

/// Non-mechanical pack calls, emitted as events for audio and UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vocalization {
    RallyHowl,
    MourningHowl,
    ReinforcementHowl,
    Growl,
}

// ---------------------------------------------------------------------------
// Player combat enums
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackKind {
    Light,
    Heavy,
    Special,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackPhase {
    #[default]
    Idle,
    Windup,
    Active,
    Recovery,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollPhase {
    #[default]
    Idle,
    /// Invulnerable.
    Active,
    /// Low-traction tail of the roll.
    Sliding,
}

/// Resolution of an attack landing on the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttackOutcome {
    /// Out of range, i-frames, or airborne.
    Miss,
    Hit,
    Block,
    PerfectParry,
}

impl AttackOutcome {
    /// Numeric result code exposed to UI collaborators.
    pub fn code(self) -> i8 {
        match self {
            AttackOutcome::Miss => -1,
            AttackOutcome::Hit => 0,
            AttackOutcome::Block => 1,
            AttackOutcome::PerfectParry => 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Run loadout
// ---------------------------------------------------------------------------

/// Playable character; selects a weapon profile from config.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Character {
    /// Balanced longsword.
    #[default]
    Warden,
    /// Heavy greataxe with hyperarmor on heavies.
    Raider,
    /// Fast katana with extended reach.
    Kensei,
}

/// Biome of the run; tweaks spawned pack size and wolf attributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Biome {
    #[default]
    Forest,
    Swamp,
    Mountains,
    Plains,
}

/// Starting selection supplied at `initialize`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loadout {
    pub character: Character,
    pub biome: Biome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_neutral() {
        assert_eq!(Role::default(), Role::None);
        assert_eq!(EmotionalState::default(), EmotionalState::Calm);
        assert_eq!(Plan::default(), Plan::Stalk);
        assert_eq!(AttackPhase::default(), AttackPhase::Idle);
        assert_eq!(RollPhase::default(), RollPhase::Idle);
    }

    #[test]
    fn outcome_codes_match_ui_contract() {
        assert_eq!(AttackOutcome::Miss.code(), -1);
        assert_eq!(AttackOutcome::Hit.code(), 0);
        assert_eq!(AttackOutcome::Block.code(), 1);
        assert_eq!(AttackOutcome::PerfectParry.code(), 2);
    }

    #[test]
    fn ability_indices_are_dense() {
        for (i, ability) in AlphaAbility::ALL.iter().enumerate() {
            assert_eq!(ability.index(), i);
        }
    }

    #[test]
    fn unknown_variant_is_rejected() {
        assert!(serde_json::from_str::<Plan>("\"Dance\"").is_err());
        assert_eq!(serde_json::from_str::<Plan>("\"Pincer\"").unwrap(), Plan::Pincer);
    }

    #[test]
    fn id_ordering_follows_index() {
        assert!(AgentId(1) < AgentId(2));
        assert_eq!(AgentId(7).index(), 7);
        assert_eq!(AgentId(3).to_string(), "Agent#3");
    }
}
