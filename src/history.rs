//! Recent-round history
//!
//! Persisted to LocalStorage, keeps the last 20 settled rounds plus running
//! session totals.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::Cents;
use crate::round::FairnessReceipt;
use crate::sim::landing::{Landing, LandingVia};

/// Maximum number of rounds to keep
pub const MAX_HISTORY: usize = 20;

/// One settled round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub request_id: u64,
    pub bet: Cents,
    pub multiplier: f64,
    pub payout: Cents,
    pub target_bucket: usize,
    pub visual_bucket: usize,
    pub via: LandingVia,
    pub receipt: FairnessReceipt,
    /// Unix timestamp (ms) when settled
    pub timestamp: f64,
}

impl HistoryEntry {
    pub fn from_landing(landing: &Landing, timestamp: f64) -> Self {
        Self {
            request_id: landing.request_id,
            bet: landing.bet,
            multiplier: landing.multiplier,
            payout: landing.payout,
            target_bucket: landing.target_bucket,
            visual_bucket: landing.visual_bucket,
            via: landing.via,
            receipt: landing.receipt.clone(),
            timestamp,
        }
    }

    pub fn is_win(&self) -> bool {
        self.payout >= self.bet
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundHistory {
    /// Newest first
    pub entries: VecDeque<HistoryEntry>,
    pub rounds: u64,
    pub wagered: Cents,
    pub paid_out: Cents,
    pub wins: u64,
}

impl RoundHistory {
    /// LocalStorage key
    const STORAGE_KEY: &'static str = "plinko_drop_history";

    pub fn new() -> Self {
        Self::default()
    }

    /// Record a settled round
    pub fn record(&mut self, entry: HistoryEntry) {
        self.rounds += 1;
        self.wagered += entry.bet;
        self.paid_out += entry.payout;
        if entry.is_win() {
            self.wins += 1;
        }
        self.entries.push_front(entry);
        self.entries.truncate(MAX_HISTORY);
    }

    pub fn net(&self) -> Cents {
        self.paid_out - self.wagered
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    /// Biggest multiplier among the kept rounds
    pub fn best_multiplier(&self) -> Option<f64> {
        self.entries.iter().map(|e| e.multiplier).reduce(f64::max)
    }

    pub fn load() -> Self {
        match crate::platform::load_json::<Self>(Self::STORAGE_KEY) {
            Some(history) => {
                log::info!("Loaded {} history entries", history.entries.len());
                history
            }
            None => Self::new(),
        }
    }

    pub fn save(&self) {
        crate::platform::save_json(Self::STORAGE_KEY, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::ReceiptTimestamp;

    fn entry(request_id: u64, bet: Cents, multiplier: f64) -> HistoryEntry {
        HistoryEntry {
            request_id,
            bet,
            multiplier,
            payout: crate::payout_for(bet, multiplier),
            target_bucket: 0,
            visual_bucket: 0,
            via: LandingVia::Collision,
            receipt: FairnessReceipt {
                hash: "abc".into(),
                timestamp: ReceiptTimestamp::Millis(0),
            },
            timestamp: 0.0,
        }
    }

    #[test]
    fn test_keeps_last_twenty() {
        let mut history = RoundHistory::new();
        for id in 1..=25 {
            history.record(entry(id, 100, 1.0));
        }
        assert_eq!(history.entries.len(), MAX_HISTORY);
        assert_eq!(history.latest().map(|e| e.request_id), Some(25));
        assert_eq!(history.entries.back().map(|e| e.request_id), Some(6));
        // Totals cover every round, not just the kept ones
        assert_eq!(history.rounds, 25);
        assert_eq!(history.wagered, 2_500);
    }

    #[test]
    fn test_totals() {
        let mut history = RoundHistory::new();
        history.record(entry(1, 1000, 5.6));
        history.record(entry(2, 1000, 0.5));
        assert_eq!(history.paid_out, 6_100);
        assert_eq!(history.net(), 4_100);
        assert_eq!(history.wins, 1);
        assert_eq!(history.best_multiplier(), Some(5.6));
    }

    #[test]
    fn test_serde_roundtrip_keeps_order() {
        let mut history = RoundHistory::new();
        history.record(entry(1, 100, 2.0));
        history.record(entry(2, 100, 0.3));
        let json = serde_json::to_string(&history).unwrap();
        let back: RoundHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
