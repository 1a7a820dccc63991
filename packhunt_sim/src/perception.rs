// Perception and memory: how agents sense the player.
//
// Three independent channels feed each agent's `Memory`:
//
// - **Sight.** A plain distance check against the live seek range (the
//   difficulty `vision` parameter). A sighting sets the last-seen point to
//   the player's position with confidence 1 and marks the agent as having
//   noticed the player; losing sight clears the noticed flag.
// - **Hearing.** A ring buffer of recent sound postings shared by the whole
//   world (`SoundLog`). Each agent takes the single best-scoring ping in the
//   recency window, scored by intensity, recency and inverse distance.
// - **Scent.** A coarse grid (`ScentField`) the player deposits into, which
//   wind advects and time decays. Memory only adopts a sample that strictly
//   beats the agent's best-known strength.
//
// All remembered confidences decay multiplicatively each tick. The movement
// intent fuses the channels in priority order (sight, sound, remembered
// point with a search sweep, scent gradient against the wind) so fresher
// cues win without stale ones being thrown away.
//
// Danger postings live here too (`DangerZones`): they are world knowledge
// the agents sense and steer away from.
//
// See also: `agent.rs` for the `Memory` record, `behavior.rs` which turns
// the `Intent` into steering, `difficulty.rs` for the vision and hearing
// parameters.
//
// **Critical constraint: determinism.** Perception draws no randomness. The
// scent grid is updated in row-major order through a scratch buffer, so the
// result never depends on update order within a step.

use crate::agent::Agent;
use crate::clock::SimClock;
use crate::config::{PerceptionConfig, ScentConfig};
use crate::difficulty::DifficultyParams;
use crate::math::{clamp01, decay_factor, Vec2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Hearing
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundPing {
    pub pos: Vec2,
    pub intensity: f32,
    pub at: f64,
}

/// Fixed-size ring buffer of recent sounds. Posting into a full buffer
/// overwrites the oldest ping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SoundLog {
    pings: Vec<SoundPing>,
    next: usize,
    capacity: usize,
}

impl SoundLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            pings: Vec::with_capacity(capacity),
            next: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn post(&mut self, pos: Vec2, intensity: f32, now: f64) {
        if !pos.is_finite() || !intensity.is_finite() || intensity <= 0.0 {
            return;
        }
        let ping = SoundPing {
            pos: pos.clamp_unit(),
            intensity,
            at: now,
        };
        if self.pings.len() < self.capacity {
            self.pings.push(ping);
        } else {
            self.pings[self.next] = ping;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.pings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pings.is_empty()
    }

    /// Best ping audible from `listener`, as (position, score). Ties keep the
    /// earlier buffer entry.
    pub fn best_heard(
        &self,
        listener: Vec2,
        clock: &SimClock,
        window: f32,
        max_distance: f32,
    ) -> Option<(Vec2, f32)> {
        if window <= 0.0 || max_distance <= 0.0 {
            return None;
        }
        let mut best: Option<(Vec2, f32)> = None;
        for ping in &self.pings {
            let age = (clock.now - ping.at) as f32;
            if !(0.0..=window).contains(&age) {
                continue;
            }
            let d = listener.distance(ping.pos);
            if d > max_distance {
                continue;
            }
            let score = ping.intensity * (1.0 - age / window) * (1.0 - d / max_distance);
            if score > best.map_or(0.0, |(_, s)| s) {
                best = Some((ping.pos, score));
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Scent
// ---------------------------------------------------------------------------

/// Player scent on a coarse grid over the unit square.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScentField {
    width: usize,
    height: usize,
    cells: Vec<f32>,
    #[serde(skip)]
    scratch: Vec<f32>,
}

impl ScentField {
    pub fn new(config: &ScentConfig) -> Self {
        let width = config.width.max(3);
        let height = config.height.max(3);
        Self {
            width,
            height,
            cells: vec![0.0; width * height],
            scratch: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = 0.0);
    }

    /// Grid cell containing `pos`, clamped to the grid.
    pub fn cell_of(&self, pos: Vec2) -> (usize, usize) {
        let fx = clamp01(pos.x) * (self.width - 1) as f32;
        let fy = clamp01(pos.y) * (self.height - 1) as f32;
        ((fx as usize).min(self.width - 1), (fy as usize).min(self.height - 1))
    }

    fn at(&self, x: usize, y: usize) -> f32 {
        self.cells[y * self.width + x]
    }

    pub fn sample(&self, pos: Vec2) -> f32 {
        let (x, y) = self.cell_of(pos);
        self.at(x, y)
    }

    /// Normalized central-difference gradient at the cell containing `pos`
    /// (pulled one cell in from the border).
    pub fn gradient(&self, pos: Vec2) -> Vec2 {
        let (x, y) = self.cell_of(pos);
        let x = x.clamp(1, self.width - 2);
        let y = y.clamp(1, self.height - 2);
        let gx = self.at(x + 1, y) - self.at(x - 1, y);
        let gy = self.at(x, y + 1) - self.at(x, y - 1);
        Vec2::new(gx, gy).normalized()
    }

    /// Advect by `wind`, decay, then deposit at `source`.
    pub fn step(&mut self, wind: Vec2, source: Vec2, dt: f32, config: &ScentConfig) {
        if dt <= 0.0 {
            return;
        }
        let (w, h) = (self.width, self.height);
        let shift = -wind * (config.advect_cells_per_sec * dt);
        self.scratch.resize(w * h, 0.0);

        for y in 0..h {
            for x in 0..w {
                let sx = x as f32 + shift.x;
                let sy = y as f32 + shift.y;
                let (x0, fx) = Self::lerp_index(sx, w);
                let (y0, fy) = Self::lerp_index(sy, h);
                let v00 = self.at(x0, y0);
                let v10 = self.at(x0 + 1, y0);
                let v01 = self.at(x0, y0 + 1);
                let v11 = self.at(x0 + 1, y0 + 1);
                let top = v00 + (v10 - v00) * fx;
                let bottom = v01 + (v11 - v01) * fx;
                self.scratch[y * w + x] = top + (bottom - top) * fy;
            }
        }

        let keep = decay_factor(config.decay_per_sec, dt);
        for (cell, &v) in self.cells.iter_mut().zip(self.scratch.iter()) {
            *cell = clamp01(v * keep);
        }

        if source.is_finite() {
            let (x, y) = self.cell_of(source);
            let cell = &mut self.cells[y * w + x];
            *cell = clamp01(*cell + config.emit_per_sec * dt);
        }
    }

    /// Lower sample index and fraction for bilinear lookup, clamped so the
    /// upper neighbor stays on the grid.
    fn lerp_index(s: f32, n: usize) -> (usize, f32) {
        if s.is_nan() || s <= 0.0 {
            return (0, 0.0);
        }
        let i = s.floor();
        if i as usize >= n - 1 {
            return (n - 2, 1.0);
        }
        (i as usize, s - i)
    }
}

// ---------------------------------------------------------------------------
// Danger zones
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DangerZone {
    pub pos: Vec2,
    pub radius: f32,
    pub strength: f32,
    pub expires_at: f64,
}

impl DangerZone {
    /// Penetration-weighted strength at `pos`: full strength at the center,
    /// zero at the edge and outside.
    pub fn weight_at(&self, pos: Vec2) -> f32 {
        let d = pos.distance(self.pos);
        if d >= self.radius {
            0.0
        } else {
            self.strength * (1.0 - d / self.radius)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DangerZones {
    zones: Vec<DangerZone>,
    capacity: usize,
}

impl DangerZones {
    pub fn new(capacity: usize) -> Self {
        Self {
            zones: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a zone. Refused when the pool is full or the zone is degenerate.
    pub fn post(&mut self, zone: DangerZone) -> bool {
        let valid = zone.pos.is_finite()
            && zone.radius.is_finite()
            && zone.radius > 0.0
            && zone.strength.is_finite()
            && zone.expires_at.is_finite();
        if !valid || self.zones.len() >= self.capacity {
            return false;
        }
        self.zones.push(zone);
        true
    }

    /// Drop zones whose expiry has passed.
    pub fn prune(&mut self, clock: &SimClock) {
        self.zones.retain(|z| z.expires_at > clock.now);
    }

    pub fn iter(&self) -> impl Iterator<Item = &DangerZone> {
        self.zones.iter()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Push-out vector for an agent at `pos`: away from every zone it is
    /// inside, weighted by strength and penetration.
    pub fn avoidance(&self, pos: Vec2) -> Vec2 {
        let mut push = Vec2::ZERO;
        for zone in &self.zones {
            let w = zone.weight_at(pos);
            if w > 0.0 {
                let away = (pos - zone.pos).normalized();
                push += away * w;
            }
        }
        push
    }

    /// Strongest zone weight at `pos`, clamped to [0, 1].
    pub fn hazard_at(&self, pos: Vec2) -> f32 {
        clamp01(self.zones.iter().map(|z| z.weight_at(pos)).fold(0.0, f32::max))
    }
}

// ---------------------------------------------------------------------------
// Per-agent refresh and intent
// ---------------------------------------------------------------------------

/// What the player exposes to perception this tick.
#[derive(Clone, Debug, Default)]
pub struct PlayerCues {
    pub pos: Vec2,
    pub vel: Vec2,
    pub facing: Vec2,
    /// Start time of the current block, if blocking.
    pub block_started: Option<f64>,
    /// Start time of the current roll, if rolling.
    pub roll_started: Option<f64>,
}

/// Shared world channels, read-only during the agent pass.
pub struct Senses<'a> {
    pub sounds: &'a SoundLog,
    pub scent: &'a ScentField,
    pub wind: Vec2,
}

/// Result of one perception refresh.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Percept {
    pub distance: f32,
    pub sees_player: bool,
    /// The agent noticed the player this tick (it had not before).
    pub newly_noticed: bool,
    pub heard: Option<Vec2>,
    pub scent_gradient: Vec2,
}

/// Decay memory, then update it from sight, sound and scent.
pub fn refresh(
    agent: &mut Agent,
    player: &PlayerCues,
    senses: &Senses<'_>,
    params: &DifficultyParams,
    clock: &SimClock,
    dt: f32,
    config: &PerceptionConfig,
) -> Percept {
    let memory = &mut agent.memory;
    memory.seen_confidence *= decay_factor(config.seen_decay_per_sec, dt);
    memory.scent_confidence *= decay_factor(config.scent_confidence_decay_per_sec, dt);
    memory.scent_strength *= decay_factor(config.scent_memory_decay_per_sec, dt);

    let distance = agent.pos.distance(player.pos);
    let sees_player = distance <= params.vision;
    let mut newly_noticed = false;

    if sees_player {
        memory.last_seen = player.pos;
        memory.last_seen_at = Some(clock.now);
        memory.seen_confidence = 1.0;
        let k = config.observe_blend;
        memory.player_velocity = memory.player_velocity * (1.0 - k) + player.vel * k;
        if player.block_started.is_some() {
            memory.last_player_block = player.block_started;
        }
        if player.roll_started.is_some() {
            memory.last_player_roll = player.roll_started;
        }
        if !agent.noticed {
            agent.noticed = true;
            agent.noticed_at = Some(clock.now);
            newly_noticed = true;
        }
    } else {
        agent.noticed = false;
    }

    let heard = senses
        .sounds
        .best_heard(agent.pos, clock, config.sound_window, params.hearing)
        .map(|(pos, _)| pos);

    let strength = senses.scent.sample(agent.pos);
    if strength > memory.scent_strength {
        memory.scent_pos = agent.pos;
        memory.scent_strength = strength;
        memory.scent_confidence = 1.0;
    }

    Percept {
        distance,
        sees_player,
        newly_noticed,
        heard,
        scent_gradient: senses.scent.gradient(agent.pos),
    }
}

/// Desired heading and speed multiplier from the fused cues.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intent {
    pub dir: Vec2,
    pub caution: f32,
}

pub fn intent(
    agent: &Agent,
    percept: &Percept,
    player_pos: Vec2,
    wind: Vec2,
    config: &PerceptionConfig,
) -> Intent {
    let memory = &agent.memory;
    let (mut dir, caution) = if percept.sees_player {
        ((player_pos - agent.pos).normalized(), 1.0)
    } else if let Some(heard) = percept.heard {
        ((heard - agent.pos).normalized(), config.heard_caution)
    } else if memory.seen_confidence > config.memory_follow_threshold {
        ((memory.last_seen - agent.pos).normalized(), 1.0)
    } else {
        let toward = percept.scent_gradient - wind * config.scent_wind_bias;
        (toward.normalized(), 1.0)
    };

    if !percept.sees_player && percept.heard.is_none() && memory.seen_confidence > 0.0 {
        let sweep = search_sweep(agent, config);
        let w = config.search_blend;
        dir = (dir * (1.0 - w) + sweep * w).normalized();
    }

    Intent { dir, caution }
}

/// Orbit around the remembered point. The orbit radius shrinks as
/// confidence rises; inside the band the agent circles, otherwise it
/// corrects radially toward the band.
fn search_sweep(agent: &Agent, config: &PerceptionConfig) -> Vec2 {
    let memory = &agent.memory;
    let target = config.search_min_radius
        + (1.0 - memory.seen_confidence) * (config.search_max_radius - config.search_min_radius);
    let offset = agent.pos - memory.last_seen;
    let d = offset.length();
    let radial = offset.normalize_or(Vec2::X);
    let tangent = radial.perp() * agent.sweep_sign;

    let in_band =
        d > target * (1.0 - config.search_band) && d < target * (1.0 + config.search_band);
    let w_tangential = if in_band {
        1.0
    } else if d < target {
        0.2
    } else {
        0.4
    };
    let radial_sign = if d < target { 1.0 } else { -0.6 };
    (radial * (radial_sign * (1.0 - w_tangential)) + tangent * w_tangential).normalized()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::prng::SimRng;
    use crate::types::AgentId;

    fn agent_at(pos: Vec2) -> Agent {
        let config = SimConfig::default();
        let mut rng = SimRng::new(1);
        Agent::spawn(
            AgentId(0),
            pos,
            None,
            &SimClock::new(),
            &mut rng,
            &config.agent,
            &config.biomes.forest,
        )
    }

    #[test]
    fn sound_log_overwrites_oldest() {
        let mut log = SoundLog::new(2);
        log.post(Vec2::new(0.1, 0.1), 1.0, 0.0);
        log.post(Vec2::new(0.2, 0.2), 1.0, 0.1);
        log.post(Vec2::new(0.3, 0.3), 1.0, 0.2);
        assert_eq!(log.len(), 2);
        assert_eq!(log.pings[0].pos, Vec2::new(0.3, 0.3));
    }

    #[test]
    fn best_sound_prefers_fresh_close_and_loud() {
        let mut log = SoundLog::new(8);
        let mut clock = SimClock::new();
        log.post(Vec2::new(0.5, 0.5), 1.0, 0.0);
        clock.advance(0.5);
        log.post(Vec2::new(0.6, 0.5), 1.0, clock.now);
        let (pos, score) = log.best_heard(Vec2::new(0.6, 0.5), &clock, 1.0, 0.5).unwrap();
        assert_eq!(pos, Vec2::new(0.6, 0.5));
        assert!(score > 0.9);
    }

    #[test]
    fn stale_or_distant_sound_is_inaudible() {
        let mut log = SoundLog::new(8);
        let mut clock = SimClock::new();
        log.post(Vec2::new(0.9, 0.9), 1.0, 0.0);
        assert!(log.best_heard(Vec2::new(0.1, 0.1), &clock, 1.0, 0.5).is_none());
        clock.advance(1.5);
        assert!(log.best_heard(Vec2::new(0.9, 0.9), &clock, 1.0, 0.5).is_none());
    }

    #[test]
    fn scent_deposits_and_decays() {
        let config = ScentConfig::default();
        let mut field = ScentField::new(&config);
        let source = Vec2::new(0.5, 0.5);
        field.step(Vec2::ZERO, source, 0.1, &config);
        let first = field.sample(source);
        assert!((first - 0.22).abs() < 1e-5);
        field.step(Vec2::ZERO, Vec2::new(f32::NAN, 0.0), 0.1, &config);
        assert!(field.sample(source) < first);
        assert!(field.cells().iter().all(|c| (0.0..=1.0).contains(c)));
    }

    #[test]
    fn wind_carries_scent_downwind() {
        let config = ScentConfig::default();
        let mut field = ScentField::new(&config);
        let source = Vec2::new(0.5, 0.5);
        for _ in 0..5 {
            field.step(Vec2::ZERO, source, 0.1, &config);
        }
        let (x, y) = field.cell_of(source);
        let downwind = field.at(x + 1, y);
        for _ in 0..5 {
            field.step(Vec2::new(1.0, 0.0), Vec2::new(f32::NAN, 0.0), 0.05, &config);
        }
        assert!(field.at(x + 1, y) > downwind);
    }

    #[test]
    fn gradient_points_up_the_trail() {
        let config = ScentConfig::default();
        let mut field = ScentField::new(&config);
        let source = Vec2::new(0.5, 0.5);
        for _ in 0..10 {
            field.step(Vec2::new(0.3, 0.0), source, 0.1, &config);
        }
        let g = field.gradient(Vec2::new(0.55, 0.5));
        assert!(g.x < 0.0, "gradient {g:?} should point back toward the source");
    }

    #[test]
    fn danger_zones_prune_and_repel() {
        let mut zones = DangerZones::new(2);
        let zone = DangerZone {
            pos: Vec2::new(0.5, 0.5),
            radius: 0.1,
            strength: 1.0,
            expires_at: 1.0,
        };
        assert!(zones.post(zone.clone()));
        assert!(zones.post(zone.clone()));
        assert!(!zones.post(zone));
        let push = zones.avoidance(Vec2::new(0.55, 0.5));
        assert!(push.x > 0.0);
        assert!(zones.hazard_at(Vec2::new(0.5, 0.5)) > 0.99);
        let mut clock = SimClock::new();
        clock.advance(1.0);
        zones.prune(&clock);
        assert!(zones.is_empty());
    }

    #[test]
    fn sighting_sets_full_confidence_and_notices() {
        let config = SimConfig::default();
        let mut agent = agent_at(Vec2::new(0.4, 0.5));
        let sounds = SoundLog::new(4);
        let scent = ScentField::new(&config.perception.scent);
        let senses = Senses {
            sounds: &sounds,
            scent: &scent,
            wind: Vec2::ZERO,
        };
        let player = PlayerCues {
            pos: Vec2::new(0.5, 0.5),
            ..PlayerCues::default()
        };
        let params = DifficultyParams::default();
        let clock = SimClock::new();
        let p = refresh(&mut agent, &player, &senses, &params, &clock, 0.016, &config.perception);
        assert!(p.sees_player && p.newly_noticed);
        assert_eq!(agent.memory.seen_confidence, 1.0);
        let again = refresh(
            &mut agent,
            &player,
            &senses,
            &params,
            &clock,
            0.016,
            &config.perception,
        );
        assert!(!again.newly_noticed);

        let far = PlayerCues {
            pos: Vec2::new(1.0, 1.0),
            ..PlayerCues::default()
        };
        let lost = refresh(&mut agent, &far, &senses, &params, &clock, 0.1, &config.perception);
        assert!(!lost.sees_player);
        assert!(!agent.noticed);
        assert!(agent.memory.seen_confidence < 1.0);
    }

    #[test]
    fn memory_confidence_decays_multiplicatively() {
        let config = SimConfig::default();
        let mut agent = agent_at(Vec2::new(0.0, 0.0));
        agent.memory.seen_confidence = 0.5;
        let sounds = SoundLog::new(4);
        let scent = ScentField::new(&config.perception.scent);
        let senses = Senses {
            sounds: &sounds,
            scent: &scent,
            wind: Vec2::ZERO,
        };
        let player = PlayerCues {
            pos: Vec2::new(1.0, 1.0),
            ..PlayerCues::default()
        };
        refresh(
            &mut agent,
            &player,
            &senses,
            &DifficultyParams::default(),
            &SimClock::new(),
            0.5,
            &config.perception,
        );
        assert!((agent.memory.seen_confidence - 0.3).abs() < 1e-6);
    }

    #[test]
    fn intent_prefers_sight_then_sound() {
        let config = SimConfig::default();
        let agent = agent_at(Vec2::new(0.5, 0.5));
        let seen = Percept {
            sees_player: true,
            heard: Some(Vec2::new(0.5, 0.0)),
            ..Percept::default()
        };
        let i = intent(&agent, &seen, Vec2::new(0.6, 0.5), Vec2::ZERO, &config.perception);
        assert_eq!(i.dir, Vec2::X);
        assert_eq!(i.caution, 1.0);

        let heard = Percept {
            heard: Some(Vec2::new(0.5, 0.0)),
            ..Percept::default()
        };
        let i = intent(&agent, &heard, Vec2::new(0.6, 0.5), Vec2::ZERO, &config.perception);
        assert!(i.dir.y < -0.99);
        assert_eq!(i.caution, 0.75);
    }

    #[test]
    fn search_orbits_inside_the_band() {
        let config = SimConfig::default();
        let mut agent = agent_at(Vec2::new(0.5, 0.5));
        agent.memory.seen_confidence = 1.0;
        agent.memory.last_seen = Vec2::new(0.42, 0.5);
        agent.sweep_sign = 1.0;
        // Exactly on the minimum radius: pure tangential motion.
        let sweep = search_sweep(&agent, &config.perception);
        assert!(sweep.x.abs() < 1e-5);
        assert!((sweep.y - 1.0).abs() < 1e-5);
    }
}
