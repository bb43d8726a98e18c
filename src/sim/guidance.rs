//! Guidance controller
//!
//! Steers a ball toward the bucket its round already decided, while the
//! motion still reads as a free fall. Three mechanisms cooperate once the
//! ball leaves the drop zone:
//!
//! 1. A capped steering force that tightens in bands as the ball descends
//!    (Free -> Coarse -> Strong -> Final). The force cancels the predicted
//!    miss: the horizontal error left over if the ball kept its current
//!    horizontal speed for the remaining fall, spread over that fall time.
//!    In the final band the horizontal speed is also servoed onto the pace
//!    that arrives exactly at the bucket centre.
//! 2. Biased peg bounces: the bounce direction is blended toward the target,
//!    and bounces heading the wrong way are attenuated rather than reversed.
//! 3. Anti-stall: nudges for slow balls and a one-shot escape impulse for
//!    balls that stop making vertical progress.
//!
//! Every force is scaled by the ball's mass and every length by the peg
//! spacing, so one tuning works at every size.

use glam::Vec2;
use rand::Rng;

use super::layout::Layout;
use super::state::Ball;
use super::world::GRAVITY_SPACINGS;
use crate::tuning::GuidanceTuning;

/// Horizontal error (spacings) treated as "already on target" for bounce bias
const ON_TARGET_SPACINGS: f32 = 0.05;

/// Steering stage, ordered from weakest to strongest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GuidanceBand {
    Free,
    Coarse,
    Strong,
    Final,
}

/// What anti-stall did this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallRecovery {
    Nudge,
    Escape,
}

impl StallRecovery {
    pub fn as_str(&self) -> &'static str {
        match self {
            StallRecovery::Nudge => "nudge",
            StallRecovery::Escape => "escape",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuidanceController {
    pub tuning: GuidanceTuning,
}

impl Default for GuidanceController {
    fn default() -> Self {
        Self::new(GuidanceTuning::default())
    }
}

impl GuidanceController {
    pub fn new(tuning: GuidanceTuning) -> Self {
        Self { tuning }
    }

    /// Band for a ball at height `y` with horizontal error `dx`
    pub fn band(&self, layout: &Layout, y: f32, dx: f32) -> GuidanceBand {
        let t = &self.tuning;
        let progress = layout.progress(y);
        if progress < t.free_until {
            GuidanceBand::Free
        } else if progress >= t.final_from && dx.abs() <= t.final_tolerance * layout.spacing {
            GuidanceBand::Final
        } else if progress >= t.strong_from {
            GuidanceBand::Strong
        } else {
            GuidanceBand::Coarse
        }
    }

    fn gain_and_cap(&self, band: GuidanceBand) -> Option<(f32, f32)> {
        let t = &self.tuning;
        match band {
            GuidanceBand::Free => None,
            GuidanceBand::Coarse => Some((t.coarse_gain, t.coarse_cap)),
            GuidanceBand::Strong => Some((t.strong_gain, t.strong_cap)),
            GuidanceBand::Final => Some((t.final_gain, t.final_cap)),
        }
    }

    fn blend_weight(&self, band: GuidanceBand) -> f32 {
        let t = &self.tuning;
        match band {
            GuidanceBand::Free => 0.0,
            GuidanceBand::Coarse => t.coarse_blend,
            GuidanceBand::Strong => t.strong_blend,
            GuidanceBand::Final => t.final_blend,
        }
    }

    /// Signed horizontal distance from the ball to its target bucket centre
    fn target_dx(ball: &Ball, layout: &Layout) -> Option<f32> {
        layout
            .bucket(ball.target_bucket())
            .map(|bucket| bucket.x - ball.pos.x)
    }

    /// Predicted seconds until the ball reaches the bucket tops under gravity
    pub fn time_to_go(&self, ball: &Ball, layout: &Layout) -> f32 {
        let floor = self.tuning.min_time_to_go;
        let remaining = layout.bucket_top_y() - ball.pos.y;
        if remaining <= 0.0 {
            return floor;
        }
        let g = GRAVITY_SPACINGS * layout.spacing;
        let vy = ball.vel.y;
        let t = (-vy + (vy * vy + 2.0 * g * remaining).max(0.0).sqrt()) / g;
        t.max(floor)
    }

    /// Steering acceleration (field units/s²) for a band, given the error
    /// `dx`, horizontal speed `vx` and remaining fall time
    pub fn steering_accel(
        &self,
        band: GuidanceBand,
        dx: f32,
        vx: f32,
        time_to_go: f32,
        spacing: f32,
    ) -> f32 {
        let Some((gain, cap)) = self.gain_and_cap(band) else {
            return 0.0;
        };
        let t = time_to_go.max(self.tuning.min_time_to_go);
        let miss = dx - vx * t;
        let cap = cap * spacing;
        (gain * 2.0 * miss / (t * t)).clamp(-cap, cap)
    }

    /// Accumulate this tick's steering force on the ball
    pub fn steer(&self, ball: &mut Ball, layout: &Layout, dt: f32) -> GuidanceBand {
        if ball.pos.y <= layout.drop_zone_y() {
            return GuidanceBand::Free;
        }
        let Some(dx) = Self::target_dx(ball, layout) else {
            return GuidanceBand::Free;
        };

        let band = self.band(layout, ball.pos.y, dx);
        if band == GuidanceBand::Free {
            return band;
        }
        let time_to_go = self.time_to_go(ball, layout);
        let accel = self.steering_accel(band, dx, ball.vel.x, time_to_go, layout.spacing);
        if accel != 0.0 {
            ball.apply_force(Vec2::new(accel * ball.mass, 0.0));
        }

        if band == GuidanceBand::Final {
            // Arrive at the bucket centre just as the fall ends
            let max_vx = self.tuning.max_horizontal_speed * layout.spacing;
            let desired = (dx / time_to_go).clamp(-max_vx, max_vx);
            let k = (self.tuning.final_damping * dt).min(1.0);
            ball.vel.x += (desired - ball.vel.x) * k;
        }
        band
    }

    /// Bias a fresh peg bounce; returns false when the hit is inside the cooldown
    pub fn on_peg_contact(&self, ball: &mut Ball, layout: &Layout) -> bool {
        let t = &self.tuning;
        if ball.pos.y <= layout.drop_zone_y() {
            return false;
        }
        if let Some(last) = ball.last_peg_collision_at {
            if ball.age - last < t.peg_cooldown_secs {
                return false;
            }
        }
        ball.last_peg_collision_at = Some(ball.age);
        ball.peg_collision_count += 1;

        if let Some(dx) = Self::target_dx(ball, layout) {
            let band = self.band(layout, ball.pos.y, dx);
            let speed = ball.vel.length();
            let on_target = dx.abs() <= ON_TARGET_SPACINGS * layout.spacing;
            if band != GuidanceBand::Free && speed > f32::EPSILON && !on_target {
                if ball.vel.x * dx < 0.0 {
                    ball.vel.x *= t.disagree_attenuation;
                } else {
                    let dir = ball.vel / speed;
                    let toward = Vec2::new(dx.signum(), dir.y).normalize_or_zero();
                    let w = self.blend_weight(band);
                    let blended = (dir * (1.0 - w) + toward * w).normalize_or_zero();
                    ball.vel = blended * speed;
                }
            }
        }

        if ball.peg_collision_count > t.fatigue_after_hits {
            let extra = (ball.peg_collision_count - t.fatigue_after_hits) as f32;
            ball.vel *= (1.0 - t.fatigue_per_hit * extra).max(t.fatigue_floor);
        }
        true
    }

    /// Detect stalls and stuck balls and push them along
    pub fn recover_stall<R: Rng>(
        &self,
        ball: &mut Ball,
        layout: &Layout,
        rng: &mut R,
        dt: f32,
    ) -> Option<StallRecovery> {
        let t = &self.tuning;
        let spacing = layout.spacing;
        if ball.pos.y <= layout.drop_zone_y() {
            ball.last_position = ball.pos;
            return None;
        }

        if (ball.pos.y - ball.last_position.y).abs() > t.stuck_epsilon * spacing {
            ball.stuck_timer = 0.0;
            ball.last_position = ball.pos;
        } else {
            ball.stuck_timer += dt;
        }

        if ball.stuck_timer >= t.stuck_secs {
            ball.stuck_timer = 0.0;
            ball.last_position = ball.pos;
            let dir = Self::target_dx(ball, layout).map(f32::signum).unwrap_or(0.0);
            ball.vel = Vec2::new(dir * t.nudge_speed, -t.escape_speed) * spacing;
            return Some(StallRecovery::Escape);
        }

        if ball.vel.length() < t.stall_speed * spacing {
            let nudge = rng.random_range(-t.nudge_speed..=t.nudge_speed) * spacing;
            ball.vel.x += nudge;
            ball.apply_force(Vec2::new(0.0, t.stall_push * spacing * ball.mass));
            return Some(StallRecovery::Nudge);
        }
        None
    }

    /// Enforce the horizontal speed limit
    pub fn clamp_horizontal(&self, ball: &mut Ball, layout: &Layout) {
        let max_vx = self.tuning.max_horizontal_speed * layout.spacing;
        ball.vel.x = ball.vel.x.clamp(-max_vx, max_vx);
    }
}
