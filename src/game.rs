//! One player session
//!
//! Wires the outcome client, balance ledger, simulation session, autobet
//! sequencer and history together. Two event sources drive it: the frame
//! clock (`advance`) and round responses (`complete_drop`). Both run on the
//! same thread, so nothing here locks.

use glam::Vec2;

use crate::autobet::{AutobetConfig, AutobetSequencer};
use crate::consts::*;
use crate::error::{NetworkFailure, PlinkoError};
use crate::history::{HistoryEntry, RoundHistory};
use crate::ledger::BalanceLedger;
use crate::round::{OutcomeClient, RoundAuthority, RoundRequest, RoundResponse};
use crate::settings::Settings;
use crate::sim::landing::{self, Landing, LandingVia};
use crate::sim::layout::{Layout, compute_layout};
use crate::sim::multipliers::{RiskTier, bucket_probability};
use crate::sim::state::{BallId, SimulationSession};
use crate::sim::tick::{SimEvent, TickInput, tick};
use crate::{Cents, format_cents, payout_for};

/// How long a bucket stays highlighted after a landing
pub const FLASH_MS: f64 = 600.0;

/// Hover information for one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketTooltip {
    pub bucket: usize,
    pub multiplier: f64,
    /// Chance of an unbiased ball ending here
    pub probability: f64,
    /// Profit on the current bet if the round lands here
    pub profit: Cents,
}

impl BucketTooltip {
    pub fn text(&self) -> String {
        format!(
            "{}x · {:.2}% · {}",
            self.multiplier,
            self.probability * 100.0,
            format_cents(self.profit)
        )
    }
}

/// A recently landed bucket, for the renderer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketFlash {
    pub bucket: usize,
    pub started_at_ms: f64,
}

impl BucketFlash {
    /// 1.0 at landing, fading to 0.0
    pub fn intensity(&self, now_ms: f64) -> f32 {
        (1.0 - (now_ms - self.started_at_ms) / FLASH_MS).clamp(0.0, 1.0) as f32
    }
}

pub struct PlinkoGame {
    settings: Settings,
    session: SimulationSession,
    client: OutcomeClient,
    ledger: BalanceLedger,
    autobet: AutobetSequencer,
    history: RoundHistory,
    accumulator: f32,
    last_drop_at_ms: Option<f64>,
    /// Request currently driven by autobet
    autobet_request: Option<u64>,
    flashes: Vec<BucketFlash>,
    last_error: Option<PlinkoError>,
}

impl PlinkoGame {
    pub fn new(
        settings: Settings,
        width: f32,
        height: f32,
        balance: Cents,
        seed: u64,
    ) -> Result<Self, PlinkoError> {
        settings.validate()?;
        let layout = compute_layout(settings.rows, settings.risk, width, height)?;
        let session = SimulationSession::new(layout, settings.tuning.clone(), seed);
        log::info!(
            "Session ready: {} rows, {} risk, balance {}",
            settings.rows,
            settings.risk.as_str(),
            format_cents(balance)
        );
        Ok(Self {
            settings,
            session,
            client: OutcomeClient::new(),
            ledger: BalanceLedger::new(balance),
            autobet: AutobetSequencer::new(),
            history: RoundHistory::new(),
            accumulator: 0.0,
            last_drop_at_ms: None,
            autobet_request: None,
            flashes: Vec::new(),
            last_error: None,
        })
    }

    pub fn with_history(mut self, history: RoundHistory) -> Self {
        self.history = history;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &Layout {
        &self.session.layout
    }

    pub fn session(&self) -> &SimulationSession {
        &self.session
    }

    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    pub fn autobet(&self) -> &AutobetSequencer {
        &self.autobet
    }

    pub fn balance(&self) -> Cents {
        self.ledger.optimistic()
    }

    pub fn confirmed_balance(&self) -> Cents {
        self.ledger.confirmed()
    }

    pub fn is_awaiting(&self) -> bool {
        self.client.is_awaiting()
    }

    pub fn balls_in_flight(&self) -> usize {
        self.session.balls_in_flight()
    }

    /// Something is in progress; a new drop or layout change must wait
    pub fn is_busy(&self) -> bool {
        self.balls_in_flight() > 0 || self.is_awaiting()
    }

    pub fn flashes(&self) -> &[BucketFlash] {
        &self.flashes
    }

    pub fn last_error(&self) -> Option<&PlinkoError> {
        self.last_error.as_ref()
    }

    pub fn set_bet(&mut self, bet: Cents) -> Result<(), PlinkoError> {
        crate::round::validate_bet(bet)?;
        self.settings.bet_cents = bet;
        self.settings.save();
        Ok(())
    }

    /// Manual drop: validate, request a round and debit optimistically
    pub fn begin_drop(&mut self, bet: Cents, now_ms: f64) -> Result<RoundRequest, PlinkoError> {
        if self.is_busy() {
            return Err(PlinkoError::BallInFlight);
        }
        if self
            .last_drop_at_ms
            .is_some_and(|t| now_ms - t < DROP_DEBOUNCE_MS)
        {
            return Err(PlinkoError::BallInFlight);
        }
        let request = self.start_round(bet, now_ms)?;
        self.last_drop_at_ms = Some(now_ms);
        Ok(request)
    }

    fn start_round(&mut self, bet: Cents, now_ms: f64) -> Result<RoundRequest, PlinkoError> {
        let begun = self
            .client
            .begin(bet, self.settings.risk, self.settings.rows, now_ms)
            .and_then(|request| match self.ledger.debit(request.request_id, bet) {
                Ok(()) => Ok(request),
                Err(e) => {
                    self.client.invalidate();
                    Err(e)
                }
            });
        self.last_error = begun.as_ref().err().cloned();
        begun
    }

    /// Feed the authority's answer for a request
    ///
    /// On success the ball is spawned. Failures roll back the debit; answers
    /// for abandoned requests are ignored and leave the balance alone.
    pub fn complete_drop(
        &mut self,
        request_id: u64,
        result: Result<RoundResponse, PlinkoError>,
        now_ms: f64,
    ) -> Result<BallId, PlinkoError> {
        let round = match self.client.complete(request_id, result) {
            Ok(round) => round,
            Err(e @ PlinkoError::StaleResponse(_)) => return Err(e),
            Err(e) => {
                self.fail_round(request_id, &e);
                return Err(e);
            }
        };

        self.ledger.attach(request_id, round.expected_final_balance);
        let (payout, expected_final) = (round.payout, round.expected_final_balance);
        match self.session.spawn(round, now_ms) {
            Ok(id) => {
                log::info!("Round {} revealed by ball {}", request_id, id);
                Ok(id)
            }
            Err(e) => {
                // The authority already settled this round; honour it without a ball
                log::warn!("Could not spawn ball for round {}: {}", request_id, e);
                self.ledger.settle(request_id, payout, expected_final);
                self.autobet_request = None;
                self.autobet.stop();
                Err(e)
            }
        }
    }

    fn fail_round(&mut self, request_id: u64, error: &PlinkoError) {
        if error.requires_rollback() {
            self.ledger.rollback(request_id);
        }
        log::warn!("Round {} failed: {}", request_id, error);
        if self.autobet_request.take() == Some(request_id) {
            self.autobet.on_round_failed(error);
        }
        self.last_error = Some(error.clone());
    }

    /// Request and reveal a round against a synchronous authority
    pub fn drop_with<A: RoundAuthority>(
        &mut self,
        authority: &mut A,
        bet: Cents,
        now_ms: f64,
    ) -> Result<BallId, PlinkoError> {
        let request = self.begin_drop(bet, now_ms)?;
        let result = authority.request_round(&request);
        self.complete_drop(request.request_id, result, now_ms)
    }

    /// Abandon a request that has waited too long
    pub fn expire_requests(&mut self, now_ms: f64) -> Option<PlinkoError> {
        let request = self.client.expire(now_ms)?;
        let error = PlinkoError::Network(NetworkFailure::Timeout);
        self.fail_round(request.request_id, &error);
        Some(error)
    }

    /// Run fixed simulation steps for a frame of `frame_dt` seconds
    pub fn advance(&mut self, frame_dt: f32, now_ms: f64) -> Vec<Landing> {
        let dt = frame_dt.clamp(0.0, 0.1);
        self.accumulator += dt;

        let mut landings = Vec::new();
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            landings.extend(self.tick(now_ms));
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        if substeps == MAX_SUBSTEPS {
            // Behind by more than a frame's budget: drop the backlog
            self.accumulator = self.accumulator.min(SIM_DT);
        }

        self.flashes.retain(|f| now_ms - f.started_at_ms < FLASH_MS);
        landings
    }

    /// One fixed simulation step, settling any landings
    pub fn tick(&mut self, now_ms: f64) -> Vec<Landing> {
        let events = tick(&mut self.session, &TickInput { now_ms }, SIM_DT);
        let mut landings = Vec::new();
        for event in events {
            if let SimEvent::Landed(landing) = event {
                self.settle(&landing, now_ms);
                landings.push(landing);
            }
        }
        landings
    }

    fn settle(&mut self, landing: &Landing, now_ms: f64) {
        self.ledger
            .settle(landing.request_id, landing.payout, landing.expected_final_balance);
        log::info!(
            "Round {} landed via {} in bucket {} (paid {} at {}x), balance {}",
            landing.request_id,
            landing.via.as_str(),
            landing.visual_bucket,
            format_cents(landing.payout),
            landing.multiplier,
            format_cents(self.ledger.optimistic())
        );
        self.history
            .record(HistoryEntry::from_landing(landing, crate::platform::now_ms()));
        self.history.save();
        self.flashes.push(BucketFlash {
            bucket: landing.visual_bucket,
            started_at_ms: now_ms,
        });
        if self.autobet_request.take() == Some(landing.request_id) {
            self.autobet
                .on_round_complete(landing.bet, landing.payout, self.ledger.optimistic(), now_ms);
        }
    }

    /// Start the next autobet round if one is due
    pub fn poll_autobet(&mut self, now_ms: f64) -> Option<Result<RoundRequest, PlinkoError>> {
        let bet = self
            .autobet
            .poll(now_ms, self.balls_in_flight(), self.is_awaiting())?;
        let result = self.start_round(bet, now_ms);
        match &result {
            Ok(request) => self.autobet_request = Some(request.request_id),
            Err(e) => {
                self.autobet.on_round_failed(e);
            }
        }
        Some(result)
    }

    pub fn start_autobet(&mut self, config: AutobetConfig) -> Result<(), PlinkoError> {
        self.autobet.start(config, self.ledger.optimistic())
    }

    pub fn stop_autobet(&mut self) {
        self.autobet.stop();
    }

    /// Apply a pushed session balance; returns whether the display changed
    pub fn apply_server_balance(&mut self, balance: Cents) -> bool {
        self.ledger.apply_server_balance(balance)
    }

    /// Tear down everything in flight
    ///
    /// Pending requests are abandoned (their debit rolled back, their late
    /// answers ignored). Balls already revealing a round are settled with
    /// the round's result so no accepted bet goes missing.
    pub fn cancel(&mut self, now_ms: f64) -> Vec<Landing> {
        self.autobet.stop();
        if let Some(request) = self.client.invalidate() {
            self.ledger.rollback(request.request_id);
            log::info!("Abandoned request {}", request.request_id);
        }
        self.autobet_request = None;
        self.accumulator = 0.0;

        let mut landings = Vec::new();
        for mut ball in self.session.clear() {
            let target = ball.target_bucket();
            if let Some(landing) = landing::finalize(&mut ball, LandingVia::Timeout, target) {
                self.settle(&landing, now_ms);
                landings.push(landing);
            }
        }
        landings
    }

    /// Rebuild the field for a new canvas size, cancelling anything in flight
    pub fn resize(&mut self, width: f32, height: f32, now_ms: f64) -> Result<Vec<Landing>, PlinkoError> {
        let layout = compute_layout(self.settings.rows, self.settings.risk, width, height)?;
        let landings = self.cancel(now_ms);
        self.session.rebuild(layout)?;
        Ok(landings)
    }

    pub fn set_rows(&mut self, rows: u8) -> Result<(), PlinkoError> {
        self.reconfigure(rows, self.settings.risk)
    }

    pub fn set_risk(&mut self, risk: RiskTier) -> Result<(), PlinkoError> {
        self.reconfigure(self.settings.rows, risk)
    }

    fn reconfigure(&mut self, rows: u8, risk: RiskTier) -> Result<(), PlinkoError> {
        if self.is_busy() || self.autobet.is_active() {
            return Err(PlinkoError::BallInFlight);
        }
        let layout = self.session.layout.clone();
        let layout = compute_layout(rows, risk, layout.width, layout.height)?;
        self.session.rebuild(layout)?;
        self.settings.rows = rows;
        self.settings.risk = risk;
        self.settings.save();
        log::info!("Field rebuilt: {} rows, {} risk", rows, risk.as_str());
        Ok(())
    }

    /// Tooltip for the bucket under a point in field coordinates
    pub fn hover_tooltip(&self, point: Vec2) -> Option<BucketTooltip> {
        let layout = &self.session.layout;
        let bucket = layout.bucket_at(point)?;
        let bet = self.settings.bet_cents;
        Some(BucketTooltip {
            bucket: bucket.index,
            multiplier: bucket.multiplier,
            probability: bucket_probability(layout.rows, bucket.index),
            profit: payout_for(bet, bucket.multiplier) - bet,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autobet::{StopReason, Strategy};
    use crate::round::{FairnessReceipt, LocalAuthority, ReceiptTimestamp};
    use proptest::prelude::*;

    fn game(rows: u8, balance: Cents) -> PlinkoGame {
        let settings = Settings {
            rows,
            ..Default::default()
        };
        PlinkoGame::new(settings, 800.0, 800.0, balance, 11).unwrap()
    }

    /// Advance in frames until nothing is in flight
    fn run_until_idle(game: &mut PlinkoGame, now: &mut f64) -> Vec<Landing> {
        let mut landings = Vec::new();
        for _ in 0..2_000 {
            *now += 1000.0 / 60.0;
            landings.extend(game.advance(1.0 / 60.0, *now));
            if !game.is_busy() {
                break;
            }
        }
        landings
    }

    fn response(target: usize, multiplier: f64, payout: f64, balance_after: f64) -> RoundResponse {
        RoundResponse {
            success: true,
            target_bucket_index: Some(target),
            multiplier: Some(multiplier),
            payout_amount: Some(payout),
            balance_after: Some(balance_after),
            fairness_receipt: Some(FairnessReceipt {
                hash: "feedface".into(),
                timestamp: ReceiptTimestamp::Text("2025-01-01T00:00:00Z".into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_even_money_example() {
        // $1000, 8 rows low, bet $10, server says bucket 4 at 1.0x
        let mut g = game(8, 100_000);
        let mut now = 0.0;
        let req = g.begin_drop(1000, now).unwrap();
        assert_eq!(g.balance(), 99_000);
        g.complete_drop(req.request_id, Ok(response(4, 1.0, 10.0, 1000.0)), now)
            .unwrap();
        let landings = run_until_idle(&mut g, &mut now);
        assert_eq!(landings.len(), 1);
        assert_eq!(landings[0].payout, 1000);
        assert_eq!(g.balance(), 100_000);
        assert_eq!(g.confirmed_balance(), 100_000);
        assert_eq!(g.history().rounds, 1);
    }

    #[test]
    fn test_single_flight_and_debounce() {
        let mut g = game(8, 100_000);
        let req = g.begin_drop(100, 0.0).unwrap();
        assert_eq!(g.begin_drop(100, 1_000.0), Err(PlinkoError::BallInFlight));
        g.complete_drop(req.request_id, Ok(response(0, 5.6, 5.6, 1004.6)), 0.0)
            .unwrap();
        assert_eq!(g.begin_drop(100, 1_000.0), Err(PlinkoError::BallInFlight));
    }

    #[test]
    fn test_debounce_without_flight() {
        let mut g = game(8, 100_000);
        let req = g.begin_drop(100, 0.0).unwrap();
        let err = PlinkoError::Network(NetworkFailure::Transport("offline".into()));
        assert!(g.complete_drop(req.request_id, Err(err), 10.0).is_err());
        assert!(!g.is_busy());
        assert_eq!(g.begin_drop(100, 100.0), Err(PlinkoError::BallInFlight));
        assert!(g.begin_drop(100, DROP_DEBOUNCE_MS).is_ok());
    }

    #[test]
    fn test_network_failure_rolls_back() {
        let mut g = game(8, 10_000);
        let req = g.begin_drop(1000, 0.0).unwrap();
        assert_eq!(g.balance(), 9_000);
        let err = g
            .complete_drop(req.request_id, Err(PlinkoError::malformed("bad json")), 0.0)
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(g.balance(), 10_000);
        assert_eq!(g.balls_in_flight(), 0);
        assert!(g.last_error().is_some());
    }

    #[test]
    fn test_insufficient_balance_no_debit() {
        let mut g = game(8, 500);
        assert_eq!(
            g.begin_drop(1000, 0.0),
            Err(PlinkoError::InsufficientBalance { bet: 1000 })
        );
        assert_eq!(g.balance(), 500);
        assert!(!g.is_awaiting());
    }

    #[test]
    fn test_timeout_then_late_answer_is_ignored() {
        let mut g = game(8, 10_000);
        let req = g.begin_drop(1000, 0.0).unwrap();
        assert!(g.expire_requests(REQUEST_TIMEOUT_MS - 1.0).is_none());
        let err = g.expire_requests(REQUEST_TIMEOUT_MS).unwrap();
        assert_eq!(err, PlinkoError::Network(NetworkFailure::Timeout));
        assert_eq!(g.balance(), 10_000);

        let late = g.complete_drop(req.request_id, Ok(response(4, 0.5, 5.0, 99.95)), 9_000.0);
        assert_eq!(late, Err(PlinkoError::StaleResponse(req.request_id)));
        assert_eq!(g.balance(), 10_000);
        assert_eq!(g.balls_in_flight(), 0);
    }

    #[test]
    fn test_drop_with_local_authority() {
        let mut g = game(12, 100_000);
        let mut authority = LocalAuthority::new(100_000, "server", "client");
        let mut now = 0.0;
        for _ in 0..5 {
            g.drop_with(&mut authority, 500, now).unwrap();
            run_until_idle(&mut g, &mut now);
            now += DROP_DEBOUNCE_MS;
            assert_eq!(g.balance(), authority.balance());
        }
        assert_eq!(g.history().rounds, 5);
    }

    #[test]
    fn test_autobet_runs_to_count() {
        let mut g = game(8, 100_000);
        let mut authority = LocalAuthority::new(100_000, "s", "c");
        g.start_autobet(AutobetConfig {
            base_bet: 200,
            count: Some(3),
            on_loss: Strategy::Multiply(1.5),
            ..Default::default()
        })
        .unwrap();

        let mut now = 0.0;
        let mut rounds = 0;
        for _ in 0..50_000 {
            now += 1000.0 / 60.0;
            if let Some(result) = g.poll_autobet(now) {
                let request = result.unwrap();
                // Never issued with a ball alive
                assert_eq!(g.balls_in_flight(), 0);
                let response = authority.request_round(&request);
                g.complete_drop(request.request_id, response, now).unwrap();
                rounds += 1;
            }
            g.advance(1.0 / 60.0, now);
            if !g.autobet().is_active() && !g.is_busy() {
                break;
            }
        }
        assert_eq!(rounds, 3);
        assert_eq!(g.autobet().stop_reason(), Some(StopReason::CountExhausted));
        assert_eq!(g.balance(), authority.balance());
    }

    #[test]
    fn test_autobet_stops_on_failure() {
        let mut g = game(8, 100_000);
        g.start_autobet(AutobetConfig::default()).unwrap();
        let request = g.poll_autobet(0.0).unwrap().unwrap();
        g.complete_drop(request.request_id, Err(PlinkoError::Server("down".into())), 0.0)
            .unwrap_err();
        assert!(!g.autobet().is_active());
        assert_eq!(g.balance(), 100_000);
    }

    #[test]
    fn test_cancel_settles_balls_and_drops_requests() {
        let mut g = game(8, 100_000);
        let req = g.begin_drop(1000, 0.0).unwrap();
        g.complete_drop(req.request_id, Ok(response(0, 5.6, 56.0, 1046.0)), 0.0)
            .unwrap();
        g.advance(1.0 / 60.0, 16.0);

        let landings = g.cancel(20.0);
        assert_eq!(landings.len(), 1);
        assert_eq!(landings[0].payout, 5600);
        assert_eq!(g.balance(), 104_600);
        assert_eq!(g.balls_in_flight(), 0);

        // A pending request is abandoned and refunded
        let req = g.begin_drop(1000, 1_000.0).unwrap();
        assert!(g.cancel(1_001.0).is_empty());
        assert_eq!(g.balance(), 104_600);
        assert_eq!(
            g.complete_drop(req.request_id, Ok(response(0, 5.6, 56.0, 1092.0)), 1_002.0),
            Err(PlinkoError::StaleResponse(req.request_id))
        );
    }

    #[test]
    fn test_resize_rebuilds_after_cancel() {
        let mut g = game(8, 100_000);
        let req = g.begin_drop(1000, 0.0).unwrap();
        g.complete_drop(req.request_id, Ok(response(3, 1.0, 10.0, 1000.0)), 0.0)
            .unwrap();
        let landings = g.resize(1000.0, 600.0, 5.0).unwrap();
        assert_eq!(landings.len(), 1);
        assert_eq!(g.layout().width, 1000.0);
        assert_eq!(g.balance(), 100_000);
    }

    #[test]
    fn test_set_rows_refused_while_busy() {
        let mut g = game(8, 100_000);
        g.begin_drop(100, 0.0).unwrap();
        assert_eq!(g.set_rows(16), Err(PlinkoError::BallInFlight));
        g.cancel(1.0);
        g.set_rows(16).unwrap();
        assert_eq!(g.layout().bucket_count(), 17);
        g.set_risk(RiskTier::High).unwrap();
        assert_eq!(g.layout().buckets[0].multiplier, 1000.0);
    }

    #[test]
    fn test_server_balance_push() {
        let mut g = game(8, 10_000);
        assert!(g.apply_server_balance(12_000));
        assert_eq!(g.balance(), 12_000);
        g.begin_drop(1000, 0.0).unwrap();
        assert!(!g.apply_server_balance(50_000));
        assert_eq!(g.balance(), 11_000);
    }

    #[test]
    fn test_hover_tooltip() {
        let mut g = game(8, 10_000);
        g.set_bet(1000).unwrap();
        let bucket = g.layout().buckets[0];
        let tip = g.hover_tooltip(Vec2::new(bucket.x, bucket.y)).unwrap();
        assert_eq!(tip.bucket, 0);
        assert_eq!(tip.multiplier, 5.6);
        assert!((tip.probability - 1.0 / 256.0).abs() < 1e-12);
        assert_eq!(tip.profit, 4600);
        assert!(tip.text().contains("$46.00"));
        assert!(g.hover_tooltip(Vec2::new(bucket.x, 0.0)).is_none());
    }

    #[test]
    fn test_flash_fades() {
        let mut g = game(8, 100_000);
        let req = g.begin_drop(1000, 0.0).unwrap();
        g.complete_drop(req.request_id, Ok(response(4, 0.5, 5.0, 995.0)), 0.0)
            .unwrap();
        let landings = g.cancel(100.0);
        assert_eq!(g.flashes().len(), 1);
        assert_eq!(g.flashes()[0].bucket, landings[0].visual_bucket);
        assert_eq!(g.flashes()[0].intensity(100.0), 1.0);
        g.advance(0.0, 100.0 + FLASH_MS);
        assert!(g.flashes().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_balance_matches_authority(
            bets in prop::collection::vec(1i64..2_000, 1..4),
            seed in any::<u64>(),
        ) {
            let settings = Settings { rows: 8, ..Default::default() };
            let mut g = PlinkoGame::new(settings, 600.0, 600.0, 50_000, seed).unwrap();
            let mut authority = LocalAuthority::new(50_000, format!("seed-{}", seed), "client");
            let mut now = 0.0;
            for bet in bets {
                g.drop_with(&mut authority, bet, now).unwrap();
                run_until_idle(&mut g, &mut now);
                now += DROP_DEBOUNCE_MS;
                prop_assert_eq!(g.balance(), g.confirmed_balance());
                prop_assert_eq!(g.balance(), authority.balance());
            }
        }
    }
}
