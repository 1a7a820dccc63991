// packhunt_sim: pure Rust simulation core for a wolf-pack action game.
//
// This crate contains all gameplay logic: the player's combat state
// machine, wolf agents and their perception, the pack controller, the
// alpha, territories, lineages and respawns, adaptive difficulty, and the
// fixed-step clock that drives them. It has no rendering, audio or input
// device dependencies and can be tested, benchmarked, and run headless.
//
// Module overview:
// - `sim.rs`:         SimulationWorld, the tick loop, snapshot and checksum entry points.
// - `clock.rs`:       SimClock, the only time source (tick counter plus sim seconds).
// - `input.rs`:       PlayerInput / WorldPosting / TickInput, everything fed into a tick.
// - `event.rs`:       SimEvent stream emitted by each tick, plus ResetScope.
// - `config.rs`:      SimConfig and nested per-subsystem configs, all tunables.
// - `types.rs`:       AgentId, LineageId, and the shared gameplay enums.
// - `math.rs`:        Vec2 and deterministic scalar helpers.
// - `terrain.rs`:     Terrain trait for movement resolution; OpenField default.
// - `player.rs`:      Player body: movement, stamina, jump, latch, bites taken.
// - `combat.rs`:      PlayerCombat: attacks, combos, block/parry, rolls, telemetry.
// - `agent.rs`:       Agent record: attributes, emotion, memory, damage.
// - `pool.rs`:        Fixed-capacity AgentPool with free-list slot reuse.
// - `perception.rs`:  Vision, hearing (SoundLog), scent (ScentField), danger zones.
// - `behavior.rs`:    Per-agent controller and bite resolution.
// - `pack.rs`:        Pack controller: stats, morale, plan, roles, messages, howls.
// - `alpha.rs`:       Alpha election, leadership aura, abilities.
// - `territory.rs`:   Territory zones marked by the alpha.
// - `lineage.rs`:     Lineage groups, wipe detection, timed respawn.
// - `difficulty.rs`:  Player metrics, skill estimate, difficulty parameter retuning.
// - `pose.rs`:        Derived per-agent pose for animation collaborators.
// - `integrity.rs`:   Post-tick invariant audit and reset scopes.
// - `snapshot.rs`:    Versioned, checksummed binary snapshot encoding.
// - `error.rs`:       SimError for the fallible decode edges.
// - `prng`:           Re-exported from `packhunt_prng`, a single-word SplitMix64 generator.
//
// The `lockstep_tests` crate drives this library from several peers at
// once to check that identical input logs produce identical checksums.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, dt, input) -> (new_state, events)`. All randomness comes from a
// seeded SplitMix64 PRNG (re-exported from `packhunt_prng`). No `HashMap`
// iteration in the tick, no system time, no OS entropy. Agents are visited
// in slot order.

pub mod agent;
pub mod alpha;
pub mod behavior;
pub mod clock;
pub mod combat;
pub mod config;
pub mod difficulty;
pub mod error;
pub mod event;
pub mod input;
pub mod integrity;
pub mod lineage;
pub mod math;
pub mod pack;
pub mod perception;
pub mod player;
pub mod pool;
pub mod pose;
pub use packhunt_prng as prng;
pub mod sim;
pub mod snapshot;
pub mod terrain;
pub mod territory;
pub mod types;
