//! Simulation state: balls, the ball arena and the session that owns them
//!
//! A `SimulationSession` is rebuilt whenever the layout changes and is
//! exclusively owned by the game; nothing else holds references into it.

use std::fmt;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::guidance::GuidanceController;
use super::layout::Layout;
use super::world::PhysicsWorld;
use crate::error::PlinkoError;
use crate::round::Round;
use crate::tuning::GuidanceTuning;

/// Trail point for ball rendering
#[derive(Debug, Clone, Copy)]
pub struct TrailPoint {
    pub pos: Vec2,
    pub speed: f32,
}

/// Maximum number of trail points to store
pub const TRAIL_LENGTH: usize = 20;

/// Horizontal spawn jitter, in spacings
const SPAWN_JITTER_SPACINGS: f32 = 0.08;

/// Generational handle into a `BallArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BallId {
    index: u32,
    generation: u32,
}

impl BallId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for BallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// A ball in flight, bound to the round it reveals
#[derive(Debug, Clone)]
pub struct Ball {
    pub id: BallId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    pub mass: f32,
    /// Force accumulated this tick, cleared by the world step
    pub force: Vec2,
    pub round: Round,
    has_landed: bool,
    /// Registered (post-cooldown) peg hits
    pub peg_collision_count: u32,
    /// Ball age at the last registered peg hit
    pub last_peg_collision_at: Option<f32>,
    /// Time spent without meaningful downward progress
    pub stuck_timer: f32,
    /// Anchor for stuck detection
    pub last_position: Vec2,
    pub spawned_at_ms: f64,
    /// Simulated seconds since spawn
    pub age: f32,
    /// Trail history for rendering (newest first)
    pub trail: Vec<TrailPoint>,
}

impl Ball {
    pub fn new(id: BallId, layout: &Layout, pos: Vec2, round: Round, now_ms: f64) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius: layout.ball_radius,
            mass: layout.ball_mass(),
            force: Vec2::ZERO,
            round,
            has_landed: false,
            peg_collision_count: 0,
            last_peg_collision_at: None,
            stuck_timer: 0.0,
            last_position: pos,
            spawned_at_ms: now_ms,
            age: 0.0,
            trail: Vec::with_capacity(TRAIL_LENGTH),
        }
    }

    #[inline]
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    #[inline]
    pub fn target_bucket(&self) -> usize {
        self.round.target_bucket
    }

    pub fn has_landed(&self) -> bool {
        self.has_landed
    }

    /// Flip to landed; returns false if the ball had already landed
    pub fn mark_landed(&mut self) -> bool {
        if self.has_landed {
            return false;
        }
        self.has_landed = true;
        true
    }

    /// Record current position to trail (call each tick)
    pub fn record_trail(&mut self) {
        let speed = self.vel.length();
        self.trail.insert(0, TrailPoint { pos: self.pos, speed });
        if self.trail.len() > TRAIL_LENGTH {
            self.trail.pop();
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    ball: Option<Ball>,
}

/// Index-addressed ball storage with generation checks
///
/// Stale ids (from a removed ball whose slot was reused) never resolve.
#[derive(Debug, Clone, Default)]
pub struct BallArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl BallArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a ball built from its freshly allocated id
    pub fn insert_with(&mut self, build: impl FnOnce(BallId) -> Ball) -> BallId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    ball: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = BallId::new(index, slot.generation);
        slot.ball = Some(build(id));
        self.len += 1;
        id
    }

    pub fn get(&self, id: BallId) -> Option<&Ball> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.ball.as_ref())
    }

    pub fn get_mut(&mut self, id: BallId) -> Option<&mut Ball> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.ball.as_mut())
    }

    pub fn remove(&mut self, id: BallId) -> Option<Ball> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let ball = slot.ball.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(ball)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Live balls in slot order
    pub fn iter(&self) -> impl Iterator<Item = &Ball> {
        self.slots.iter().filter_map(|s| s.ball.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Ball> {
        self.slots.iter_mut().filter_map(|s| s.ball.as_mut())
    }

    pub fn ids(&self) -> Vec<BallId> {
        self.iter().map(|b| b.id).collect()
    }

    /// Remove every ball, returning them in slot order
    pub fn drain(&mut self) -> Vec<Ball> {
        self.ids().into_iter().filter_map(|id| self.remove(id)).collect()
    }
}

/// Everything the fixed-step simulation mutates
#[derive(Debug, Clone)]
pub struct SimulationSession {
    pub layout: Layout,
    pub world: PhysicsWorld,
    pub guidance: GuidanceController,
    pub balls: BallArena,
    /// Jitter and stall-nudge randomness
    pub rng: Pcg32,
    pub seed: u64,
    pub time_ticks: u64,
}

impl SimulationSession {
    pub fn new(layout: Layout, tuning: GuidanceTuning, seed: u64) -> Self {
        Self {
            world: PhysicsWorld::from_layout(&layout),
            layout,
            guidance: GuidanceController::new(tuning),
            balls: BallArena::new(),
            rng: Pcg32::seed_from_u64(seed),
            seed,
            time_ticks: 0,
        }
    }

    pub fn balls_in_flight(&self) -> usize {
        self.balls.len()
    }

    /// Swap in a new layout; refused while any ball is alive
    pub fn rebuild(&mut self, layout: Layout) -> Result<(), PlinkoError> {
        if !self.balls.is_empty() {
            return Err(PlinkoError::BallInFlight);
        }
        self.world = PhysicsWorld::from_layout(&layout);
        self.layout = layout;
        Ok(())
    }

    /// Create a ball for a round near the drop point
    pub fn spawn(&mut self, round: Round, now_ms: f64) -> Result<BallId, PlinkoError> {
        if round.rows != self.layout.rows {
            return Err(PlinkoError::validation(
                "rows",
                format!("round has {} rows, field has {}", round.rows, self.layout.rows),
            ));
        }
        if round.target_bucket >= self.layout.bucket_count() {
            return Err(PlinkoError::validation(
                "target_bucket",
                format!("bucket {} does not exist", round.target_bucket),
            ));
        }

        let jitter = self.layout.spacing * SPAWN_JITTER_SPACINGS;
        let mut dx = self.rng.random_range(-jitter..=jitter);
        // Start on the target's side of the top peg so the first bounce agrees
        let offset = self.layout.buckets[round.target_bucket].x - self.layout.drop_point.x;
        if offset.abs() > self.layout.spacing * 0.25 {
            dx = dx.abs().copysign(offset);
        }
        let pos = self.layout.drop_point + Vec2::new(dx, 0.0);
        let layout = &self.layout;
        let id = self
            .balls
            .insert_with(|id| Ball::new(id, layout, pos, round, now_ms));
        log::debug!("Spawned ball {} at x={:.1}", id, pos.x);
        Ok(id)
    }

    /// Drop every ball without resolving it
    pub fn clear(&mut self) -> Vec<Ball> {
        self.balls.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::layout::compute_layout;
    use crate::sim::multipliers::RiskTier;
    use crate::sim::tests_support::sample_round;

    fn session() -> SimulationSession {
        let layout = compute_layout(8, RiskTier::Low, 800.0, 700.0).unwrap();
        SimulationSession::new(layout, GuidanceTuning::default(), 7)
    }

    #[test]
    fn test_mark_landed_once() {
        let layout = compute_layout(8, RiskTier::Low, 800.0, 700.0).unwrap();
        let mut ball = Ball::new(BallId::new(0, 0), &layout, Vec2::ZERO, sample_round(2), 0.0);
        assert!(ball.mark_landed());
        assert!(!ball.mark_landed());
        assert!(ball.has_landed());
    }

    #[test]
    fn test_trail_is_bounded() {
        let layout = compute_layout(8, RiskTier::Low, 800.0, 700.0).unwrap();
        let mut ball = Ball::new(BallId::new(0, 0), &layout, Vec2::ZERO, sample_round(2), 0.0);
        for i in 0..50 {
            ball.pos.y = i as f32;
            ball.record_trail();
        }
        assert_eq!(ball.trail.len(), TRAIL_LENGTH);
        assert_eq!(ball.trail[0].pos.y, 49.0);
    }

    #[test]
    fn test_arena_generations() {
        let mut s = session();
        let a = s.spawn(sample_round(1), 0.0).unwrap();
        let b = s.spawn(sample_round(2), 0.0).unwrap();
        assert_eq!(s.balls_in_flight(), 2);

        let removed = s.balls.remove(a).unwrap();
        assert_eq!(removed.target_bucket(), 1);
        assert!(s.balls.get(a).is_none());
        assert!(s.balls.remove(a).is_none());

        // Slot is reused with a new generation; the old id stays dead
        let c = s.spawn(sample_round(3), 0.0).unwrap();
        assert_eq!(c.index(), a.index());
        assert_ne!(c, a);
        assert!(s.balls.get(a).is_none());
        assert_eq!(s.balls.get(c).unwrap().target_bucket(), 3);
        assert_eq!(s.balls.get(b).unwrap().target_bucket(), 2);
    }

    #[test]
    fn test_spawn_jitter_is_small_and_seeded() {
        let mut a = session();
        let mut b = session();
        for _ in 0..10 {
            let ia = a.spawn(sample_round(4), 0.0).unwrap();
            let ib = b.spawn(sample_round(4), 0.0).unwrap();
            let pa = a.balls.get(ia).unwrap().pos;
            let pb = b.balls.get(ib).unwrap().pos;
            assert_eq!(pa, pb);
            assert!((pa.x - a.layout.drop_point.x).abs() <= a.layout.spacing * SPAWN_JITTER_SPACINGS);
        }
    }

    #[test]
    fn test_spawn_starts_on_target_side() {
        let mut s = session();
        let drop_x = s.layout.drop_point.x;
        for _ in 0..10 {
            let left = s.spawn(sample_round(1), 0.0).unwrap();
            let right = s.spawn(sample_round(7), 0.0).unwrap();
            assert!(s.balls.get(left).unwrap().pos.x <= drop_x);
            assert!(s.balls.get(right).unwrap().pos.x >= drop_x);
        }
    }

    #[test]
    fn test_spawn_rejects_foreign_round() {
        let mut s = session();
        let mut round = sample_round(4);
        round.target_bucket = 9;
        assert!(s.spawn(round, 0.0).is_err());

        let mut round = sample_round(4);
        round.rows = 12;
        assert!(s.spawn(round, 0.0).is_err());
        assert!(s.balls.is_empty());
    }

    #[test]
    fn test_rebuild_refused_in_flight() {
        let mut s = session();
        let id = s.spawn(sample_round(4), 0.0).unwrap();
        let bigger = compute_layout(8, RiskTier::Low, 1000.0, 900.0).unwrap();
        assert_eq!(s.rebuild(bigger.clone()), Err(PlinkoError::BallInFlight));
        s.balls.remove(id);
        s.rebuild(bigger).unwrap();
        assert_eq!(s.layout.width, 1000.0);
    }

    #[test]
    fn test_clear_drains() {
        let mut s = session();
        s.spawn(sample_round(1), 0.0).unwrap();
        s.spawn(sample_round(2), 0.0).unwrap();
        assert_eq!(s.clear().len(), 2);
        assert!(s.balls.is_empty());
    }
}
