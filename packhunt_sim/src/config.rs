// Data-driven simulation configuration.
//
// All tunable parameters live in `SimConfig`, grouped into nested structs
// per subsystem: `CombatConfig`, `PlayerConfig`, `PerceptionConfig`,
// `AgentConfig`, `PackConfig`, `LineageConfig`, `AlphaConfig`,
// `TerritoryConfig` and `DifficultyConfig`. Character weapon profiles and
// biome spawn tweaks live in `WeaponTable` and `BiomeTable`, looked up from
// the run `Loadout`.
//
// Gameplay tuning lives here rather than at the use site. Every struct is
// `#[serde(default)]`, so a JSON file only needs to name the values it
// overrides. The config is part of `SimulationWorld` and therefore of every
// snapshot and checksum: in lockstep, all peers must run identical configs.
//
// See also: `sim.rs` which owns the `SimConfig` as part of
// `SimulationWorld`, `difficulty.rs` for the live multipliers that scale
// several of these values at runtime.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. All peers must use identical configs for identical
// results.

use crate::math::Vec2;
use crate::types::{AttackKind, Biome, Character};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Player combat
// ---------------------------------------------------------------------------

/// Phase durations, damage and stamina cost of one attack type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackTiming {
    pub windup: f32,
    pub active: f32,
    pub recovery: f32,
    pub damage: f32,
    pub stamina_cost: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub light: AttackTiming,
    pub heavy: AttackTiming,
    pub special: AttackTiming,
    /// Minimum seconds between attack starts.
    pub attack_cooldown: f32,
    /// Reach of both player swings and wolf bites.
    pub attack_range: f32,
    /// Cosine of the half-angle of the player's swing arc.
    pub attack_arc_cos: f32,
    pub combo_window: f32,
    pub counter_window: f32,
    /// Damage multiplier for swings started inside a counter window.
    pub counter_damage_mult: f32,
    pub parry_window: f32,
    /// Stun applied to an attacker whose bite is perfectly parried.
    pub parry_stun: f32,
    pub block_facing_cos: f32,
    pub block_start_cost: f32,
    pub block_drain_per_sec: f32,
    /// Stamina lost when a bite lands on a (non-parry) block.
    pub block_chip_cost: f32,
    pub roll_iframe: f32,
    pub roll_slide: f32,
    /// Friction multiplier while sliding out of a roll.
    pub roll_slide_friction: f32,
    pub roll_cost: f32,
    pub roll_cooldown: f32,
    pub roll_speed_mult: f32,
    /// Impulse applied to a wolf hit by the player.
    pub hit_knockback: f32,
    /// Stun applied to a wolf hit by the player.
    pub hit_stun: f32,
    pub bite_damage: f32,
    pub bite_knockback: f32,
    /// Stun applied to the player by an unblocked bite (unless hyperarmored).
    pub player_hit_stun: f32,
    pub latch_duration: f32,
    pub latch_drag_speed: f32,
    /// A bite whose direction has at most this cosine with the player's
    /// facing comes from behind and latches.
    pub back_attack_cos: f32,
    /// Wolf kills between reward choices.
    pub kills_per_choice: u32,
    pub attack_sound: f32,
    pub roll_sound: f32,
    pub jump_sound: f32,
}

impl CombatConfig {
    pub fn timing(&self, kind: AttackKind) -> &AttackTiming {
        match kind {
            AttackKind::Light => &self.light,
            AttackKind::Heavy => &self.heavy,
            AttackKind::Special => &self.special,
        }
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            light: AttackTiming {
                windup: 0.05,
                active: 0.08,
                recovery: 0.15,
                damage: 0.20,
                stamina_cost: 0.15,
            },
            heavy: AttackTiming {
                windup: 0.15,
                active: 0.12,
                recovery: 0.25,
                damage: 0.45,
                stamina_cost: 0.25,
            },
            special: AttackTiming {
                windup: 0.20,
                active: 0.15,
                recovery: 0.30,
                damage: 0.60,
                stamina_cost: 0.40,
            },
            attack_cooldown: 0.35,
            attack_range: 0.055,
            attack_arc_cos: 0.34,
            combo_window: 1.0,
            counter_window: 0.5,
            counter_damage_mult: 1.5,
            parry_window: 0.12,
            parry_stun: 0.30,
            block_facing_cos: 0.5,
            block_start_cost: 0.10,
            block_drain_per_sec: 0.10,
            block_chip_cost: 0.05,
            roll_iframe: 0.30,
            roll_slide: 0.20,
            roll_slide_friction: 0.3,
            roll_cost: 0.20,
            roll_cooldown: 0.80,
            roll_speed_mult: 2.6,
            hit_knockback: 0.12,
            hit_stun: 0.25,
            bite_damage: 0.10,
            bite_knockback: 0.05,
            player_hit_stun: 0.20,
            latch_duration: 1.0,
            latch_drag_speed: 0.22,
            back_attack_cos: -0.5,
            kills_per_choice: 3,
            attack_sound: 0.6,
            roll_sound: 0.3,
            jump_sound: 0.4,
        }
    }
}

/// Weapon modifiers for one character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeaponProfile {
    pub damage_mult: f32,
    /// Divides every attack phase duration.
    pub speed_mult: f32,
    pub stamina_mult: f32,
    pub reach_mult: f32,
    /// Heavy attacks also grant hyperarmor through their active phase.
    pub heavy_hyperarmor: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponTable {
    pub warden: WeaponProfile,
    pub raider: WeaponProfile,
    pub kensei: WeaponProfile,
}

impl WeaponTable {
    pub fn profile(&self, character: Character) -> &WeaponProfile {
        match character {
            Character::Warden => &self.warden,
            Character::Raider => &self.raider,
            Character::Kensei => &self.kensei,
        }
    }
}

impl Default for WeaponTable {
    fn default() -> Self {
        Self {
            warden: WeaponProfile {
                damage_mult: 1.0,
                speed_mult: 1.0,
                stamina_mult: 1.0,
                reach_mult: 1.0,
                heavy_hyperarmor: false,
            },
            raider: WeaponProfile {
                damage_mult: 1.4,
                speed_mult: 0.8,
                stamina_mult: 1.3,
                reach_mult: 1.1,
                heavy_hyperarmor: true,
            },
            kensei: WeaponProfile {
                damage_mult: 1.1,
                speed_mult: 1.2,
                stamina_mult: 0.9,
                reach_mult: 1.3,
                heavy_hyperarmor: false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Player body
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub spawn: Vec2,
    pub move_speed: f32,
    pub accel: f32,
    pub friction: f32,
    pub radius: f32,
    pub stamina_regen: f32,
    pub jump_velocity: f32,
    pub gravity: f32,
    pub jump_cost: f32,
    pub jump_min_stamina: f32,
    /// Height above which bites pass underneath.
    pub airborne_clearance: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            spawn: Vec2::new(0.5, 0.5),
            move_speed: 0.3,
            accel: 12.0,
            friction: 9.0,
            radius: 0.018,
            stamina_regen: 0.10,
            jump_velocity: 0.45,
            gravity: 1.2,
            jump_cost: 0.15,
            jump_min_stamina: 0.1,
            airborne_clearance: 0.03,
        }
    }
}

// ---------------------------------------------------------------------------
// Perception
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScentConfig {
    pub width: usize,
    pub height: usize,
    pub decay_per_sec: f32,
    pub emit_per_sec: f32,
    pub advect_cells_per_sec: f32,
}

impl Default for ScentConfig {
    fn default() -> Self {
        Self {
            width: 48,
            height: 27,
            decay_per_sec: 0.35,
            emit_per_sec: 2.2,
            advect_cells_per_sec: 6.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub scent: ScentConfig,
    pub sound_capacity: usize,
    pub sound_window: f32,
    /// Speed multiplier while steering toward a sound instead of a sighting.
    pub heard_caution: f32,
    /// Per-second multiplicative decay of last-seen confidence.
    pub seen_decay_per_sec: f32,
    pub scent_confidence_decay_per_sec: f32,
    /// Decay of the best-known scent strength, so a stale peak can be beaten.
    pub scent_memory_decay_per_sec: f32,
    /// Minimum last-seen confidence to steer toward the remembered point.
    pub memory_follow_threshold: f32,
    pub search_min_radius: f32,
    pub search_max_radius: f32,
    /// Half-width of the orbit band, as a fraction of the target radius.
    pub search_band: f32,
    /// Weight of the sweep direction when blended into the memory heading.
    pub search_blend: f32,
    pub scent_wind_bias: f32,
    /// Blend factor for the observed player velocity estimate.
    pub observe_blend: f32,
    pub danger_capacity: usize,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            scent: ScentConfig::default(),
            sound_capacity: 32,
            sound_window: 1.0,
            heard_caution: 0.75,
            seen_decay_per_sec: 0.8,
            scent_confidence_decay_per_sec: 0.8,
            scent_memory_decay_per_sec: 0.35,
            memory_follow_threshold: 0.1,
            search_min_radius: 0.08,
            search_max_radius: 0.32,
            search_band: 0.15,
            search_blend: 0.4,
            scent_wind_bias: 0.25,
            observe_blend: 0.2,
            danger_capacity: 16,
        }
    }
}

// ---------------------------------------------------------------------------
// Individual agents
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub capacity: usize,
    pub radius: f32,
    pub base_speed: f32,
    pub accel: f32,
    pub friction: f32,
    pub max_speed: f32,
    pub harass_speed: f32,
    pub commit_speed: f32,
    pub wind_drift: f32,

    pub lunge_range: f32,
    pub lunge_speed: f32,
    pub lunge_duration: f32,
    pub lunge_cooldown: f32,
    pub lunge_stamina_cost: f32,
    pub feint_prob: f32,
    pub feint_duration: f32,
    pub min_chase_before_lunge: f32,
    /// Lead time used to predict the player's position for a lunge.
    pub predict_lead: f32,
    /// How long a block or roll stays fresh in an agent's memory.
    pub read_window: f32,
    /// Effective intelligence at or above which an agent holds its lunge
    /// while the player's roll is fresh.
    pub read_min_intelligence: f32,
    /// Lunges in flight at or above which a Commit-plan agent waits.
    pub max_simultaneous_lunges: u32,
    pub base_fatigue_threshold: f32,

    pub fatigue_lunge_bonus: f32,
    pub fatigue_per_speed: f32,
    pub fatigue_recovery: f32,
    pub stamina_regen: f32,

    pub separation_radius: f32,
    pub separation_weight: f32,
    pub prey_cone_cos: f32,
    pub prey_cone_weight: f32,
    pub circle_radial: f32,
    pub circle_tangent: f32,
    pub flank_tangent: f32,
    /// Rotation of the approach heading for Flank behavior, in radians.
    pub flank_angle: f32,
    pub ambush_lead: f32,
    pub ambush_stealth_range: f32,
    pub ambush_stealth_speed: f32,
    /// Seconds an Ambusher waits inside strike range before it may lunge.
    pub ambush_hold: f32,
    pub retreat_hold: f32,
    pub den_blend: f32,

    pub aggression_range: (f32, f32),
    pub intelligence_range: (f32, f32),
    pub coordination_range: (f32, f32),
    pub morale_range: (f32, f32),

    pub initial_emotion_intensity: f32,
    pub emotion_decay_per_sec: f32,
    /// Seconds after taking damage during which an agent turns Aggressive.
    pub damage_memory: f32,
    pub hurt_intensity: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            capacity: 16,
            radius: 0.018,
            base_speed: 0.18,
            accel: 1.1,
            friction: 2.0,
            max_speed: 0.26,
            harass_speed: 0.85,
            commit_speed: 1.35,
            wind_drift: 0.02,

            lunge_range: 0.125,
            lunge_speed: 0.42,
            lunge_duration: 0.16,
            lunge_cooldown: 0.90,
            lunge_stamina_cost: 0.2,
            feint_prob: 0.35,
            feint_duration: 0.10,
            min_chase_before_lunge: 0.75,
            predict_lead: 0.2,
            read_window: 0.5,
            read_min_intelligence: 0.5,
            max_simultaneous_lunges: 3,
            base_fatigue_threshold: 0.7,

            fatigue_lunge_bonus: 0.15,
            fatigue_per_speed: 0.3,
            fatigue_recovery: 0.2,
            stamina_regen: 0.1,

            separation_radius: 0.03,
            separation_weight: 0.6,
            prey_cone_cos: 0.5,
            prey_cone_weight: 0.8,
            circle_radial: 0.4,
            circle_tangent: 0.6,
            flank_tangent: 0.8,
            flank_angle: 1.2,
            ambush_lead: 0.3,
            ambush_stealth_range: 0.4,
            ambush_stealth_speed: 0.5,
            ambush_hold: 0.25,
            retreat_hold: 3.0,
            den_blend: 0.5,

            aggression_range: (0.3, 0.7),
            intelligence_range: (0.4, 0.8),
            coordination_range: (0.5, 0.8),
            morale_range: (0.6, 0.8),

            initial_emotion_intensity: 0.3,
            emotion_decay_per_sec: 1.2,
            damage_memory: 2.0,
            hurt_intensity: 0.6,
        }
    }
}

// ---------------------------------------------------------------------------
// Pack controller
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    pub initial_morale: f32,
    pub initial_skill_estimate: f32,

    pub retreat_health: f32,
    pub retreat_fatigue: f32,
    pub far_band: f32,
    pub mid_band: f32,
    pub ambush_skill: f32,
    pub ambush_min_members: usize,
    pub pincer_min_members: usize,
    pub pincer_morale: f32,
    pub commit_morale: f32,
    pub commit_fatigue: f32,
    pub healthy_threshold: f32,

    pub success_window: f32,
    pub skill_decay: f32,
    pub skill_growth: f32,

    pub morale_health_weight: f32,
    pub morale_rest_weight: f32,
    pub morale_healthy_weight: f32,
    pub morale_winning_bonus: f32,
    pub morale_smoothing: f32,
    pub hunger_secs: f32,
    pub env_base: f32,
    pub env_hunger: f32,
    pub env_den: f32,
    pub env_wounded: f32,
    pub env_hazard: f32,
    pub env_casualty: f32,
    pub den_bonus: f32,
    pub den_radius_scale: f32,

    pub lead_distance_bias: f32,
    pub ambusher_min_health: f32,
    pub scout_min_stamina: f32,
    pub pup_guard_min_members: usize,

    pub comm_radius: f32,
    pub attack_now_fatigue: f32,
    pub retreat_message_secs: f32,
    pub spotted_confidence: f32,
    pub message_cooldown: f32,
    pub coordinated_interval: f32,
    pub coordinated_radius: f32,
    pub coordinated_min: usize,
    pub coordinated_fatigue: f32,
    pub commit_feint_scale: f32,

    pub howl_morale: f32,
    pub howl_wound: f32,
    pub howl_spawn_cooldown: f32,
    pub howl_encircle_cooldown: f32,
    pub howl_spawn_min: f32,
    pub howl_spawn_max: f32,
    /// How long a plan forced by a howl or a coordinated strike overrides
    /// the plan ladder (Retreat still wins).
    pub forced_plan_hold: f32,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            initial_morale: 0.7,
            initial_skill_estimate: 0.5,

            retreat_health: 0.3,
            retreat_fatigue: 0.8,
            far_band: 0.35,
            mid_band: 0.16,
            ambush_skill: 0.4,
            ambush_min_members: 3,
            pincer_min_members: 4,
            pincer_morale: 0.6,
            commit_morale: 0.65,
            commit_fatigue: 0.5,
            healthy_threshold: 0.5,

            success_window: 5.0,
            skill_decay: 0.98,
            skill_growth: 1.02,

            morale_health_weight: 0.4,
            morale_rest_weight: 0.3,
            morale_healthy_weight: 0.3,
            morale_winning_bonus: 0.1,
            morale_smoothing: 1.5,
            hunger_secs: 60.0,
            env_base: 0.35,
            env_hunger: 0.35,
            env_den: 0.5,
            env_wounded: 0.2,
            env_hazard: 0.5,
            env_casualty: 0.6,
            den_bonus: 0.25,
            den_radius_scale: 1.4,

            lead_distance_bias: 0.01,
            ambusher_min_health: 0.6,
            scout_min_stamina: 0.7,
            pup_guard_min_members: 3,

            comm_radius: 0.4,
            attack_now_fatigue: 0.6,
            retreat_message_secs: 2.0,
            spotted_confidence: 0.5,
            message_cooldown: 1.0,
            coordinated_interval: 0.5,
            coordinated_radius: 0.2,
            coordinated_min: 3,
            coordinated_fatigue: 0.5,
            commit_feint_scale: 0.4,

            howl_morale: 0.75,
            howl_wound: 0.35,
            howl_spawn_cooldown: 8.0,
            howl_encircle_cooldown: 5.0,
            howl_spawn_min: 0.55,
            howl_spawn_max: 0.75,
            forced_plan_hold: 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Lineages
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    /// Number of lineage slots kept populated.
    pub count: usize,
    pub respawn_delay: f32,
    pub base_size: usize,
    /// Spawn size is `base_size + rng % size_spread` before biome extras.
    pub size_spread: usize,
    pub max_members: usize,
    pub spawn_margin: f32,
    pub spawn_min_distance: f32,
    pub spawn_max_distance: f32,
    pub spawn_attempts: u32,
    pub spread: f32,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            count: 3,
            respawn_delay: 30.0,
            base_size: 3,
            size_spread: 3,
            max_members: 6,
            spawn_margin: 0.18,
            spawn_min_distance: 0.55,
            spawn_max_distance: 0.85,
            spawn_attempts: 10,
            spread: 0.06,
        }
    }
}

/// Spawn tweaks for one biome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BiomeProfile {
    /// Extra members drawn uniformly from `[extra_min, extra_max]`.
    pub extra_min: usize,
    pub extra_max: usize,
    pub aggression: f32,
    pub intelligence: f32,
    pub coordination: f32,
    pub morale: f32,
    pub health: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiomeTable {
    pub forest: BiomeProfile,
    pub swamp: BiomeProfile,
    pub mountains: BiomeProfile,
    pub plains: BiomeProfile,
}

impl BiomeTable {
    pub fn profile(&self, biome: Biome) -> &BiomeProfile {
        match biome {
            Biome::Forest => &self.forest,
            Biome::Swamp => &self.swamp,
            Biome::Mountains => &self.mountains,
            Biome::Plains => &self.plains,
        }
    }
}

impl Default for BiomeTable {
    fn default() -> Self {
        let plain = BiomeProfile {
            extra_min: 0,
            extra_max: 0,
            aggression: 0.0,
            intelligence: 0.0,
            coordination: 0.0,
            morale: 0.0,
            health: 0.0,
        };
        Self {
            forest: BiomeProfile {
                extra_max: 1,
                aggression: 0.1,
                intelligence: 0.05,
                ..plain.clone()
            },
            // Fewer but tougher wolves; health is already at the cap, so the
            // bonus only matters once a config lowers the spawn health.
            swamp: BiomeProfile {
                health: 0.1,
                ..plain.clone()
            },
            mountains: BiomeProfile {
                extra_max: 2,
                coordination: 0.15,
                intelligence: 0.1,
                ..plain.clone()
            },
            plains: BiomeProfile {
                extra_min: 1,
                extra_max: 2,
                aggression: 0.2,
                morale: 0.1,
                ..plain
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Alpha and territory
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaConfig {
    pub min_health: f32,
    pub min_aggression: f32,
    pub min_intelligence: f32,
    pub health_weight: f32,
    pub aggression_weight: f32,
    pub intelligence_weight: f32,
    pub coordination_weight: f32,
    pub promote_aggression: f32,

    pub leadership_radius: f32,
    pub leadership_rate: f32,
    pub speed_mod: f32,
    pub enraged_speed_mod: f32,
    pub damage_mod: f32,
    pub enraged_damage_mod: f32,

    pub rally_cooldown: f32,
    pub strike_cooldown: f32,
    pub intimidate_cooldown: f32,
    pub reinforcements_cooldown: f32,
    pub berserk_cooldown: f32,

    pub understrength: usize,
    /// Pack morale below which the alpha rallies.
    pub rally_below_morale: f32,
    pub berserk_health: f32,
    pub strike_min_ready: usize,
    pub intimidate_range: f32,

    pub rally_pack_morale: f32,
    pub rally_morale: f32,
    pub rally_coordination: f32,
    pub rally_fatigue: f32,
    pub rally_confidence: f32,
    pub strike_sync: f32,
    pub intimidate_aura: f32,
    pub intimidate_regen_mult: f32,
    pub intimidate_duration: f32,
    pub reinforcements_min: usize,
    pub reinforcements_max: usize,
    pub reinforcements_min_distance: f32,
    pub reinforcements_max_distance: f32,
    pub reinforcements_intensity: f32,
    pub berserk_duration: f32,
    pub berserk_radius: f32,
    pub berserk_aggression: f32,
}

impl Default for AlphaConfig {
    fn default() -> Self {
        Self {
            min_health: 0.8,
            min_aggression: 0.6,
            min_intelligence: 0.6,
            health_weight: 0.3,
            aggression_weight: 0.3,
            intelligence_weight: 0.2,
            coordination_weight: 0.2,
            promote_aggression: 0.2,

            leadership_radius: 0.4,
            leadership_rate: 0.2,
            speed_mod: 1.1,
            enraged_speed_mod: 1.5,
            damage_mod: 1.2,
            enraged_damage_mod: 2.0,

            rally_cooldown: 20.0,
            strike_cooldown: 15.0,
            intimidate_cooldown: 10.0,
            reinforcements_cooldown: 30.0,
            berserk_cooldown: 25.0,

            understrength: 3,
            rally_below_morale: 0.4,
            berserk_health: 0.3,
            strike_min_ready: 3,
            intimidate_range: 0.2,

            rally_pack_morale: 0.3,
            rally_morale: 0.25,
            rally_coordination: 0.2,
            rally_fatigue: 0.3,
            rally_confidence: 0.8,
            strike_sync: 1.0,
            intimidate_aura: 0.15,
            intimidate_regen_mult: 0.3,
            intimidate_duration: 3.0,
            reinforcements_min: 2,
            reinforcements_max: 3,
            reinforcements_min_distance: 0.2,
            reinforcements_max_distance: 0.3,
            reinforcements_intensity: 0.7,
            berserk_duration: 10.0,
            berserk_radius: 0.3,
            berserk_aggression: 0.3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerritoryConfig {
    pub capacity: usize,
    pub mark_interval: f32,
    /// A mark within `merge_scale * radius` of a zone reinforces it.
    pub merge_scale: f32,
    pub strength_gain: f32,
    pub radius_growth: f32,
    pub max_radius: f32,
    pub new_radius: f32,
    pub new_strength: f32,
    /// Seconds a zone holds full strength after its last mark.
    pub decay_grace: f32,
    pub decay_per_sec: f32,
    pub morale_bonus: f32,
    pub aggression_bonus: f32,
}

impl Default for TerritoryConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            mark_interval: 5.0,
            merge_scale: 1.5,
            strength_gain: 0.1,
            radius_growth: 1.05,
            max_radius: 0.5,
            new_radius: 0.15,
            new_strength: 0.5,
            decay_grace: 60.0,
            decay_per_sec: 0.1,
            morale_bonus: 0.1,
            aggression_bonus: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Adaptive difficulty
// ---------------------------------------------------------------------------

/// Linear map from skill 0 to skill 1.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkillRange {
    pub at_zero: f32,
    pub at_one: f32,
}

impl SkillRange {
    pub const fn new(at_zero: f32, at_one: f32) -> Self {
        Self { at_zero, at_one }
    }

    pub fn at(self, skill: f32) -> f32 {
        self.at_zero + (self.at_one - self.at_zero) * skill
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyConfig {
    pub retune_interval: f32,
    pub adapt_rate: f32,
    pub metric_decay: f32,
    /// Weight kept by an outcome EMA on each new sample.
    pub ema_keep: f32,
    pub dodge_weight: f32,
    pub block_weight: f32,
    pub avoidance_weight: f32,
    pub movement_weight: f32,
    pub kill_weight: f32,
    /// Kills per minute that saturate the kill-rate term.
    pub kill_rate_cap: f32,
    pub kill_window: f32,
    pub death_streak: u32,
    pub kill_streak: u32,
    pub struggling_scale: f32,
    pub dominant_scale: f32,

    pub speed: SkillRange,
    pub aggression: SkillRange,
    pub intelligence: SkillRange,
    pub coordination: SkillRange,
    pub feint: SkillRange,
    pub cooldown: SkillRange,
    pub reaction: SkillRange,
    pub vision: SkillRange,
    pub hearing: SkillRange,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            retune_interval: 10.0,
            adapt_rate: 0.1,
            metric_decay: 0.95,
            ema_keep: 0.9,
            dodge_weight: 0.25,
            block_weight: 0.20,
            avoidance_weight: 0.25,
            movement_weight: 0.15,
            kill_weight: 0.15,
            kill_rate_cap: 5.0,
            kill_window: 60.0,
            death_streak: 3,
            kill_streak: 5,
            struggling_scale: 0.7,
            dominant_scale: 1.3,

            speed: SkillRange::new(0.8, 1.2),
            aggression: SkillRange::new(0.3, 0.8),
            intelligence: SkillRange::new(0.3, 0.9),
            coordination: SkillRange::new(0.3, 0.9),
            feint: SkillRange::new(0.2, 0.6),
            cooldown: SkillRange::new(1.2, 0.7),
            reaction: SkillRange::new(0.4, 0.1),
            vision: SkillRange::new(0.35, 0.6),
            hearing: SkillRange::new(0.4, 0.7),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Largest delta a single tick will integrate; larger deltas are clamped.
    pub max_dt: f32,
    pub combat: CombatConfig,
    pub weapons: WeaponTable,
    pub player: PlayerConfig,
    pub perception: PerceptionConfig,
    pub agent: AgentConfig,
    pub pack: PackConfig,
    pub lineage: LineageConfig,
    pub biomes: BiomeTable,
    pub alpha: AlphaConfig,
    pub territory: TerritoryConfig,
    pub difficulty: DifficultyConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_dt: 0.1,
            combat: CombatConfig::default(),
            weapons: WeaponTable::default(),
            player: PlayerConfig::default(),
            perception: PerceptionConfig::default(),
            agent: AgentConfig::default(),
            pack: PackConfig::default(),
            lineage: LineageConfig::default(),
            biomes: BiomeTable::default(),
            alpha: AlphaConfig::default(),
            territory: TerritoryConfig::default(),
            difficulty: DifficultyConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse a (possibly partial) JSON config. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, crate::error::SimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, crate::error::SimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips_through_json() {
        let config = SimConfig::default();
        let json = config.to_json().unwrap();
        let restored = SimConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let json = r#"{ "lineage": { "respawn_delay": 5.0 }, "combat": { "parry_window": 0.2 } }"#;
        let config = SimConfig::from_json(json).unwrap();
        assert_eq!(config.lineage.respawn_delay, 5.0);
        assert_eq!(config.lineage.count, 3);
        assert_eq!(config.combat.parry_window, 0.2);
        assert_eq!(config.combat.combo_window, 1.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(SimConfig::from_json("{ not json").is_err());
    }

    #[test]
    fn attack_timings_grow_with_weight() {
        let c = CombatConfig::default();
        assert!(c.light.windup < c.heavy.windup);
        assert!(c.heavy.windup < c.special.windup);
        assert!(c.light.damage < c.heavy.damage);
        assert!(c.heavy.damage < c.special.damage);
    }

    #[test]
    fn skill_range_interpolates_both_directions() {
        let up = SkillRange::new(0.8, 1.2);
        assert_eq!(up.at(0.0), 0.8);
        assert_eq!(up.at(1.0), 1.2);
        let down = SkillRange::new(1.2, 0.7);
        assert!(down.at(1.0) < down.at(0.0));
    }

    #[test]
    fn weapon_lookup_matches_character() {
        let table = WeaponTable::default();
        assert!(table.profile(Character::Raider).heavy_hyperarmor);
        assert!(!table.profile(Character::Warden).heavy_hyperarmor);
        assert!(table.profile(Character::Kensei).reach_mult > 1.0);
    }
}
