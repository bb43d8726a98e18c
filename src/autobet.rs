//! Autobet sequencer
//!
//! Plays rounds back to back under a stop policy. It only ever proposes the
//! next bet; the game decides when a proposal becomes a drop, and `poll`
//! refuses while a ball is in flight or a request is pending.

use serde::{Deserialize, Serialize};

use crate::consts::{AUTOBET_DELAY_MS, MAX_BET_CENTS};
use crate::error::{ErrorKind, PlinkoError};
use crate::{Cents, format_cents};

/// How the next bet is derived after a win or a loss
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "factor", rename_all = "lowercase")]
pub enum Strategy {
    /// Go back to the base bet
    #[default]
    Reset,
    /// Multiply the current bet
    Multiply(f64),
    /// End the run
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutobetConfig {
    pub base_bet: Cents,
    /// Rounds to play; `None` runs until another condition stops it
    pub count: Option<u32>,
    /// Stop once session profit reaches this
    pub stop_win: Option<Cents>,
    /// Stop once session loss reaches this
    pub stop_loss: Option<Cents>,
    /// Stop once the balance has grown by this percentage
    pub stop_balance_gain_pct: Option<f64>,
    /// Stop once the balance has shrunk by this percentage
    pub stop_balance_loss_pct: Option<f64>,
    pub on_win: Strategy,
    pub on_loss: Strategy,
}

impl Default for AutobetConfig {
    fn default() -> Self {
        Self {
            base_bet: 100,
            count: Some(10),
            stop_win: None,
            stop_loss: None,
            stop_balance_gain_pct: None,
            stop_balance_loss_pct: None,
            on_win: Strategy::Reset,
            on_loss: Strategy::Reset,
        }
    }
}

impl AutobetConfig {
    pub fn validate(&self) -> Result<(), PlinkoError> {
        if self.base_bet <= 0 || self.base_bet > MAX_BET_CENTS {
            return Err(PlinkoError::validation("base_bet", "Bet must be greater than zero"));
        }
        if self.count == Some(0) {
            return Err(PlinkoError::validation("count", "Number of bets must be at least 1"));
        }
        if self.stop_win.is_some_and(|v| v <= 0) {
            return Err(PlinkoError::validation("stop_win", "Stop on profit must be positive"));
        }
        if self.stop_loss.is_some_and(|v| v <= 0) {
            return Err(PlinkoError::validation("stop_loss", "Stop on loss must be positive"));
        }
        for (field, pct) in [
            ("stop_balance_gain_pct", self.stop_balance_gain_pct),
            ("stop_balance_loss_pct", self.stop_balance_loss_pct),
        ] {
            if pct.is_some_and(|p| !p.is_finite() || p <= 0.0) {
                return Err(PlinkoError::validation(field, "Percentage must be positive"));
            }
        }
        if self.stop_balance_loss_pct.is_some_and(|p| p > 100.0) {
            return Err(PlinkoError::validation(
                "stop_balance_loss_pct",
                "Percentage cannot exceed 100",
            ));
        }
        for (field, strategy) in [("on_win", self.on_win), ("on_loss", self.on_loss)] {
            if let Strategy::Multiply(f) = strategy {
                if !f.is_finite() || f <= 0.0 {
                    return Err(PlinkoError::validation(field, "Multiplier must be positive"));
                }
            }
        }
        Ok(())
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    CountExhausted,
    StopWin,
    StopLoss,
    BalanceGain,
    BalanceLoss,
    Strategy,
    InsufficientBalance,
    Manual,
    Error(ErrorKind),
}

impl StopReason {
    pub fn message(&self) -> &'static str {
        match self {
            StopReason::CountExhausted => "Autobet finished",
            StopReason::StopWin => "Autobet stopped: profit target reached",
            StopReason::StopLoss => "Autobet stopped: loss limit reached",
            StopReason::BalanceGain => "Autobet stopped: balance gain reached",
            StopReason::BalanceLoss => "Autobet stopped: balance loss reached",
            StopReason::Strategy => "Autobet stopped",
            StopReason::InsufficientBalance => "Autobet stopped: insufficient balance",
            StopReason::Manual => "Autobet stopped",
            StopReason::Error(_) => "Autobet stopped after an error",
        }
    }
}

/// Result of feeding a completed round to the sequencer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutobetDecision {
    Continue { next_bet: Cents },
    Stopped(StopReason),
}

#[derive(Debug, Clone, Default)]
pub struct AutobetSequencer {
    config: AutobetConfig,
    active: bool,
    remaining: Option<u32>,
    current_bet: Cents,
    start_balance: Cents,
    profit: Cents,
    rounds_played: u32,
    last_completed_at_ms: Option<f64>,
    stop_reason: Option<StopReason>,
}

impl AutobetSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn config(&self) -> &AutobetConfig {
        &self.config
    }

    pub fn current_bet(&self) -> Cents {
        self.current_bet
    }

    pub fn profit(&self) -> Cents {
        self.profit
    }

    pub fn rounds_played(&self) -> u32 {
        self.rounds_played
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Begin a run; the first bet is available from `poll` immediately
    pub fn start(&mut self, config: AutobetConfig, balance: Cents) -> Result<(), PlinkoError> {
        config.validate()?;
        if config.base_bet > balance {
            return Err(PlinkoError::InsufficientBalance {
                bet: config.base_bet,
            });
        }
        log::info!(
            "Autobet started: base {}, count {:?}",
            format_cents(config.base_bet),
            config.count
        );
        *self = Self {
            remaining: config.count,
            current_bet: config.base_bet,
            start_balance: balance,
            active: true,
            config,
            ..Self::default()
        };
        Ok(())
    }

    pub fn stop(&mut self) {
        self.halt(StopReason::Manual);
    }

    fn halt(&mut self, reason: StopReason) -> AutobetDecision {
        if self.active {
            log::info!(
                "{} after {} rounds (profit {})",
                reason.message(),
                self.rounds_played,
                format_cents(self.profit)
            );
        }
        self.active = false;
        self.stop_reason = Some(reason);
        AutobetDecision::Stopped(reason)
    }

    /// A round of this run failed before landing
    pub fn on_round_failed(&mut self, error: &PlinkoError) -> AutobetDecision {
        let reason = match error {
            PlinkoError::InsufficientBalance { .. } => StopReason::InsufficientBalance,
            other => StopReason::Error(other.kind()),
        };
        self.halt(reason)
    }

    /// Account a settled round and decide whether to go on
    pub fn on_round_complete(
        &mut self,
        bet: Cents,
        payout: Cents,
        balance_after: Cents,
        now_ms: f64,
    ) -> AutobetDecision {
        if !self.active {
            return AutobetDecision::Stopped(self.stop_reason.unwrap_or(StopReason::Manual));
        }
        self.rounds_played += 1;
        self.profit += payout - bet;
        self.last_completed_at_ms = Some(now_ms);
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(1);
        }

        let cfg = &self.config;
        let start = self.start_balance as f64;
        let won = payout >= bet;

        let reason = if self.remaining == Some(0) {
            Some(StopReason::CountExhausted)
        } else if cfg.stop_win.is_some_and(|w| self.profit >= w) {
            Some(StopReason::StopWin)
        } else if cfg.stop_loss.is_some_and(|l| -self.profit >= l) {
            Some(StopReason::StopLoss)
        } else if cfg
            .stop_balance_gain_pct
            .is_some_and(|p| balance_after as f64 >= start * (1.0 + p / 100.0))
        {
            Some(StopReason::BalanceGain)
        } else if cfg
            .stop_balance_loss_pct
            .is_some_and(|p| balance_after as f64 <= start * (1.0 - p / 100.0))
        {
            Some(StopReason::BalanceLoss)
        } else {
            None
        };
        if let Some(reason) = reason {
            return self.halt(reason);
        }

        let strategy = if won { cfg.on_win } else { cfg.on_loss };
        let next_bet = match strategy {
            Strategy::Stop => return self.halt(StopReason::Strategy),
            Strategy::Reset => cfg.base_bet,
            Strategy::Multiply(factor) => ((self.current_bet as f64 * factor).round() as Cents).max(1),
        };
        if next_bet > balance_after || next_bet > MAX_BET_CENTS {
            return self.halt(StopReason::InsufficientBalance);
        }

        self.current_bet = next_bet;
        AutobetDecision::Continue { next_bet }
    }

    /// Next bet to place, if the run may drop now
    pub fn poll(&self, now_ms: f64, balls_in_flight: usize, awaiting: bool) -> Option<Cents> {
        if !self.active || balls_in_flight > 0 || awaiting {
            return None;
        }
        match self.last_completed_at_ms {
            Some(t) if now_ms - t < AUTOBET_DELAY_MS => None,
            _ => Some(self.current_bet),
        }
    }
}
