//! Landing resolver
//!
//! A ball lands exactly once, by the first trigger that fires in a tick:
//! a contact with its target bucket's sensor or walls while the ball centre
//! is inside that bucket's span, then the fallback
//! line through the bucket centres, then the wall-clock timeout. Whatever
//! the trigger, the payout comes from the round and never from the bucket
//! the ball ended up in.

use serde::{Deserialize, Serialize};

use super::layout::Layout;
use super::state::{Ball, BallId};
use super::world::Contact;
use crate::Cents;
use crate::consts::LANDING_TIMEOUT_MS;
use crate::error::SimulationFault;
use crate::round::FairnessReceipt;

/// Which trigger landed the ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandingVia {
    Collision,
    Fallback,
    Timeout,
}

impl LandingVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            LandingVia::Collision => "collision",
            LandingVia::Fallback => "fallback",
            LandingVia::Timeout => "timeout",
        }
    }
}

/// A finalized round
#[derive(Debug, Clone, PartialEq)]
pub struct Landing {
    pub ball: BallId,
    pub request_id: u64,
    pub via: LandingVia,
    /// Bucket the round paid for
    pub target_bucket: usize,
    /// Bucket the ball was seen in
    pub visual_bucket: usize,
    pub bet: Cents,
    pub multiplier: f64,
    pub payout: Cents,
    pub expected_final_balance: Cents,
    pub receipt: FairnessReceipt,
}

impl Landing {
    fn from_ball(ball: &Ball, via: LandingVia, visual_bucket: usize) -> Self {
        let round = &ball.round;
        Self {
            ball: ball.id,
            request_id: round.request_id,
            via,
            target_bucket: round.target_bucket,
            visual_bucket,
            bet: round.bet_amount,
            multiplier: round.multiplier,
            payout: round.payout,
            expected_final_balance: round.expected_final_balance,
            receipt: round.receipt.clone(),
        }
    }

    pub fn is_win(&self) -> bool {
        self.payout >= self.bet
    }

    pub fn net(&self) -> Cents {
        self.payout - self.bet
    }
}

/// Decide whether the ball has landed this tick, and where it is seen
pub fn detect(
    ball: &Ball,
    layout: &Layout,
    contacts: &[Contact],
    now_ms: f64,
) -> Option<(LandingVia, usize)> {
    if ball.has_landed() {
        return None;
    }
    let target = ball.target_bucket();

    // Neighbouring buckets share divider walls; touching one from the
    // far side is not a landing in the target
    let inside_target = layout
        .bucket(target)
        .is_some_and(|b| (b.left()..=b.right()).contains(&ball.pos.x));
    if inside_target && contacts.iter().any(|c| c.label.bucket() == Some(target)) {
        return Some((LandingVia::Collision, target));
    }
    if ball.pos.y >= layout.fallback_line_y() {
        return Some((LandingVia::Fallback, layout.nearest_bucket(ball.pos.x)));
    }
    if now_ms - ball.spawned_at_ms >= LANDING_TIMEOUT_MS {
        return Some((LandingVia::Timeout, target));
    }
    None
}

/// Mark the ball landed and build its `Landing`; `None` if it already landed
pub fn finalize(ball: &mut Ball, via: LandingVia, visual_bucket: usize) -> Option<Landing> {
    if !ball.mark_landed() {
        return None;
    }
    Some(Landing::from_ball(ball, via, visual_bucket))
}

/// Detect and finalize in one go
pub fn resolve(
    ball: &mut Ball,
    layout: &Layout,
    contacts: &[Contact],
    now_ms: f64,
) -> Option<Landing> {
    let (via, visual_bucket) = detect(ball, layout, contacts, now_ms)?;
    if via == LandingVia::Timeout {
        let fault = SimulationFault::LandingTimeout {
            ball: ball.id.index(),
            elapsed_ms: now_ms - ball.spawned_at_ms,
            bucket: visual_bucket,
        };
        log::debug!("{}", fault);
    }
    finalize(ball, via, visual_bucket)
}
