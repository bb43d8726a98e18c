//! Data-driven guidance tuning
//!
//! Lengths are in peg spacings and times in seconds, so one set of numbers
//! works for every row count and canvas size. Steering bands must tighten
//! monotonically: Free < Coarse < Strong < Final.

use serde::{Deserialize, Serialize};

use crate::error::PlinkoError;
use crate::sim::world::GRAVITY_SPACINGS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceTuning {
    /// Progress below which the ball falls unsteered
    pub free_until: f32,
    /// Progress at which strong guidance takes over
    pub strong_from: f32,
    /// Progress at which the final correction may engage
    pub final_from: f32,
    /// Horizontal error (spacings) inside which the final correction engages
    pub final_tolerance: f32,

    /// Navigation constant: the share of the predicted miss corrected per
    /// unit of remaining fall time
    pub coarse_gain: f32,
    pub strong_gain: f32,
    pub final_gain: f32,
    /// Steering acceleration caps (spacings/s²)
    pub coarse_cap: f32,
    pub strong_cap: f32,
    pub final_cap: f32,
    /// Rate (1/s) at which the final band pulls horizontal velocity onto the target
    pub final_damping: f32,
    /// Floor on the predicted time to reach the buckets, in seconds
    pub min_time_to_go: f32,

    /// Weight of the target direction when blending a peg bounce
    pub coarse_blend: f32,
    pub strong_blend: f32,
    pub final_blend: f32,
    /// Horizontal factor for bounces heading away from the target
    pub disagree_attenuation: f32,

    /// Minimum time between registered peg bounces
    pub peg_cooldown_secs: f32,
    /// Registered hits before bounces start losing energy
    pub fatigue_after_hits: u32,
    /// Energy lost per hit past the threshold
    pub fatigue_per_hit: f32,
    /// Bounce energy never drops below this factor
    pub fatigue_floor: f32,

    /// Speed (spacings/s) below which a ball counts as stalled
    pub stall_speed: f32,
    /// Largest random horizontal nudge (spacings/s)
    pub nudge_speed: f32,
    /// Downward acceleration while stalled (spacings/s²)
    pub stall_push: f32,
    /// Vertical movement (spacings) that resets the stuck timer
    pub stuck_epsilon: f32,
    /// Stuck time before the escape impulse
    pub stuck_secs: f32,
    /// Upward escape speed (spacings/s)
    pub escape_speed: f32,

    /// Horizontal speed limit (spacings/s), enforced every tick
    pub max_horizontal_speed: f32,
}

impl Default for GuidanceTuning {
    fn default() -> Self {
        Self {
            free_until: 0.05,
            strong_from: 0.4,
            final_from: 0.75,
            final_tolerance: 2.5,

            coarse_gain: 2.0,
            strong_gain: 3.5,
            final_gain: 4.0,
            coarse_cap: 13.0,
            strong_cap: 14.0,
            final_cap: 15.0,
            final_damping: 10.0,
            min_time_to_go: 0.15,

            coarse_blend: 0.35,
            strong_blend: 0.6,
            final_blend: 0.85,
            disagree_attenuation: 0.15,

            peg_cooldown_secs: 0.2,
            fatigue_after_hits: 12,
            fatigue_per_hit: 0.05,
            fatigue_floor: 0.5,

            stall_speed: 0.5,
            nudge_speed: 1.5,
            stall_push: 8.0,
            stuck_epsilon: 0.05,
            stuck_secs: 1.0,
            escape_speed: 4.0,

            max_horizontal_speed: 6.0,
        }
    }
}

impl GuidanceTuning {
    /// Check band ordering, monotonic tightening and force caps
    pub fn validate(&self) -> Result<(), PlinkoError> {
        if !(0.0 <= self.free_until
            && self.free_until < self.strong_from
            && self.strong_from <= self.final_from
            && self.final_from <= 1.0)
        {
            return Err(PlinkoError::validation(
                "tuning",
                "band thresholds must satisfy 0 <= free < strong <= final <= 1",
            ));
        }
        if !(0.0 < self.coarse_gain
            && self.coarse_gain < self.strong_gain
            && self.strong_gain < self.final_gain)
        {
            return Err(PlinkoError::validation("tuning", "gains must strictly increase"));
        }
        if !(0.0 < self.coarse_cap && self.coarse_cap < self.strong_cap && self.strong_cap <= self.final_cap) {
            return Err(PlinkoError::validation("tuning", "caps must increase"));
        }
        if !(0.0 < self.coarse_blend
            && self.coarse_blend < self.strong_blend
            && self.strong_blend < self.final_blend
            && self.final_blend < 1.0)
        {
            return Err(PlinkoError::validation("tuning", "blend weights must strictly increase below 1"));
        }
        // No steering force may outweigh half of gravity
        if self.final_cap > GRAVITY_SPACINGS * 0.5 {
            return Err(PlinkoError::validation(
                "tuning",
                format!("final cap {} exceeds half of gravity", self.final_cap),
            ));
        }
        if !(0.0..=1.0).contains(&self.disagree_attenuation)
            || !(0.0..=1.0).contains(&self.fatigue_floor)
        {
            return Err(PlinkoError::validation("tuning", "attenuation factors must be within [0, 1]"));
        }
        if self.peg_cooldown_secs < 0.0
            || self.stuck_secs <= 0.0
            || self.min_time_to_go <= 0.0
            || self.max_horizontal_speed <= 0.0
        {
            return Err(PlinkoError::validation("tuning", "timers and limits must be positive"));
        }
        Ok(())
    }
}
