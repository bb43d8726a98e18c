//! Fixed timestep simulation tick
//!
//! Advances every ball in flight by one step: steer, integrate, bias peg
//! bounces, recover stalls, then resolve landings. Landed balls leave the
//! arena in the same tick.

use super::landing::{self, Landing};
use super::state::{BallId, SimulationSession};
use super::world::BodyLabel;
use crate::error::SimulationFault;

/// Input for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Wall clock, used only by the landing timeout
    pub now_ms: f64,
}

/// Something that happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A registered (post-cooldown) peg bounce
    PegHit { ball: BallId, peg: usize },
    /// Anti-stall kicked in
    Recovered(SimulationFault),
    /// A ball finished its round
    Landed(Landing),
}

/// Advance the session by one fixed timestep
pub fn tick(session: &mut SimulationSession, input: &TickInput, dt: f32) -> Vec<SimEvent> {
    let SimulationSession {
        layout,
        world,
        guidance,
        balls,
        rng,
        time_ticks,
        ..
    } = session;
    *time_ticks += 1;

    let mut events = Vec::new();
    let mut landed = Vec::new();

    for ball in balls.iter_mut() {
        ball.age += dt;

        guidance.steer(ball, layout, dt);
        let contacts = world.step_ball(ball, dt);

        for contact in &contacts {
            if let BodyLabel::Peg { index } = contact.label {
                if guidance.on_peg_contact(ball, layout) {
                    events.push(SimEvent::PegHit {
                        ball: ball.id,
                        peg: index,
                    });
                }
            }
        }

        let speed = ball.vel.length() / layout.spacing;
        if let Some(recovery) = guidance.recover_stall(ball, layout, rng, dt) {
            let fault = SimulationFault::Stall {
                ball: ball.id.index(),
                speed,
                recovery: recovery.as_str(),
            };
            log::debug!("{}", fault);
            events.push(SimEvent::Recovered(fault));
        }

        guidance.clamp_horizontal(ball, layout);
        ball.record_trail();

        if let Some(landing) = landing::resolve(ball, layout, &contacts, input.now_ms) {
            landed.push(ball.id);
            events.push(SimEvent::Landed(landing));
        }
    }

    for id in landed {
        balls.remove(id);
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::sim::landing::LandingVia;
    use crate::sim::layout::compute_layout;
    use crate::sim::multipliers::{RiskTier, multipliers};
    use crate::sim::tests_support::{round_for, sample_round};
    use crate::tuning::GuidanceTuning;
    use proptest::prelude::*;

    /// Ticks past the landing timeout, so every run must end
    const MAX_TICKS: usize = (LANDING_TIMEOUT_MS as usize / 1000 + 1) * 120;

    fn session(rows: u8, seed: u64) -> SimulationSession {
        let layout = compute_layout(rows, RiskTier::Low, 800.0, 800.0).unwrap();
        SimulationSession::new(layout, GuidanceTuning::default(), seed)
    }

    /// Tick until the first landing; returns it with the number of Landed events seen
    fn run_to_landing(session: &mut SimulationSession) -> (Landing, usize) {
        let mut now = 0.0;
        let mut first = None;
        let mut count = 0;
        for _ in 0..MAX_TICKS {
            now += SIM_DT as f64 * 1000.0;
            for event in tick(session, &TickInput { now_ms: now }, SIM_DT) {
                if let SimEvent::Landed(landing) = event {
                    count += 1;
                    first.get_or_insert(landing);
                }
            }
            if session.balls.is_empty() {
                break;
            }
        }
        (first.expect("ball never landed"), count)
    }

    #[test]
    fn test_tick_counts() {
        let mut s = session(8, 1);
        tick(&mut s, &TickInput::default(), SIM_DT);
        tick(&mut s, &TickInput::default(), SIM_DT);
        assert_eq!(s.time_ticks, 2);
    }

    #[test]
    fn test_ball_falls() {
        let mut s = session(8, 1);
        let id = s.spawn(sample_round(4), 0.0).unwrap();
        let start = s.balls.get(id).unwrap().pos.y;
        for _ in 0..10 {
            tick(&mut s, &TickInput::default(), SIM_DT);
        }
        let ball = s.balls.get(id).unwrap();
        assert!(ball.pos.y > start);
        assert!(!ball.trail.is_empty());
    }

    #[test]
    fn test_every_target_pays_its_multiplier() {
        let table = multipliers(8, RiskTier::Low).unwrap();
        for target in 0..=8 {
            let mut s = session(8, 42 + target as u64);
            s.spawn(sample_round(target), 0.0).unwrap();
            let (landing, count) = run_to_landing(&mut s);
            assert_eq!(count, 1);
            assert_eq!(landing.target_bucket, target);
            assert_eq!(landing.multiplier, table[target]);
            assert!(s.balls.is_empty(), "landed ball must leave the arena");
        }
    }

    #[test]
    fn test_guided_balls_land_in_their_target() {
        let mut runs = 0;
        let mut on_target = 0;
        let mut misses = Vec::new();
        for &rows in &SUPPORTED_ROWS {
            for target in 0..=rows as usize {
                for seed in 0..4u64 {
                    let mut s = session(rows, seed * 7919 + target as u64);
                    let round = round_for(rows, RiskTier::Low, target);
                    let expected = round.payout;
                    s.spawn(round, 0.0).unwrap();
                    let (landing, count) = run_to_landing(&mut s);
                    assert_eq!(count, 1);
                    assert_eq!(landing.payout, expected);
                    runs += 1;
                    let in_target = landing.visual_bucket == landing.target_bucket;
                    if landing.via == LandingVia::Collision && in_target {
                        on_target += 1;
                    } else {
                        misses.push((rows, target, seed, landing.via, landing.visual_bucket));
                    }
                }
            }
        }
        // A few percent of drops may still bounce into a neighbour and land
        // by fallback; allow up to 10%
        assert!(
            on_target * 10 >= runs * 9,
            "{on_target}/{runs} landed in their target; misses: {misses:?}"
        );
    }

    #[test]
    fn test_stuck_ball_times_out() {
        let mut s = session(8, 3);
        let id = s.spawn(sample_round(0), 0.0).unwrap();
        // Freeze the ball above the field so nothing but the clock can land it
        let mut landing = None;
        let mut now = 0.0;
        while landing.is_none() && now <= LANDING_TIMEOUT_MS + 100.0 {
            now += 100.0;
            if let Some(ball) = s.balls.get_mut(id) {
                ball.pos = s.layout.drop_point;
                ball.vel = glam::Vec2::ZERO;
            }
            landing = tick(&mut s, &TickInput { now_ms: now }, SIM_DT)
                .into_iter()
                .find_map(|e| match e {
                    SimEvent::Landed(l) => Some(l),
                    _ => None,
                });
        }
        let landing = landing.unwrap();
        assert_eq!(landing.via, LandingVia::Timeout);
        assert_eq!(landing.visual_bucket, 0);
        assert_eq!(landing.payout, 5600);
    }

    #[test]
    fn test_balls_land_independently() {
        let mut s = session(12, 5);
        let round = round_for(12, RiskTier::Low, 2);
        s.spawn(round, 0.0).unwrap();
        s.spawn(round_for(12, RiskTier::Low, 10), 0.0).unwrap();
        let mut landed = Vec::new();
        let mut now = 0.0;
        for _ in 0..MAX_TICKS {
            now += SIM_DT as f64 * 1000.0;
            for event in tick(&mut s, &TickInput { now_ms: now }, SIM_DT) {
                if let SimEvent::Landed(l) = event {
                    landed.push(l.target_bucket);
                }
            }
        }
        landed.sort();
        assert_eq!(landed, vec![2, 10]);
    }

    #[test]
    fn test_determinism() {
        let mut a = session(16, 99);
        let mut b = session(16, 99);
        let ia = a.spawn(round_for(16, RiskTier::Low, 3), 0.0).unwrap();
        let ib = b.spawn(round_for(16, RiskTier::Low, 3), 0.0).unwrap();
        for i in 0..200 {
            let input = TickInput { now_ms: i as f64 * 8.0 };
            let ea = tick(&mut a, &input, SIM_DT);
            let eb = tick(&mut b, &input, SIM_DT);
            assert_eq!(ea, eb);
        }
        match (a.balls.get(ia), b.balls.get(ib)) {
            (Some(x), Some(y)) => assert_eq!(x.pos, y.pos),
            (None, None) => {}
            _ => panic!("sessions diverged"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(12))]

        #[test]
        fn prop_lands_once_with_round_payout(
            rows_idx in 0usize..3,
            target_frac in 0.0f64..=1.0,
            seed in any::<u64>(),
        ) {
            let rows = SUPPORTED_ROWS[rows_idx];
            let target = (target_frac * rows as f64).round() as usize;
            let round = round_for(rows, RiskTier::High, target);
            let expected = round.payout;
            let mut s = session(rows, seed);
            s.spawn(round, 0.0).unwrap();
            let (landing, count) = run_to_landing(&mut s);
            prop_assert_eq!(count, 1);
            prop_assert_eq!(landing.payout, expected);
            prop_assert_eq!(landing.target_bucket, target);
        }
    }
}
