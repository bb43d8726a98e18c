//! Balance reconciler
//!
//! The optimistic balance moves the instant a bet is placed and again the
//! instant its ball lands, so the display never waits on the network. The
//! authority's balance always wins: every settlement ends by overwriting the
//! optimistic value with the server's figure. A balance pushed while bets are
//! outstanding is held back and replaces that figure at settlement if it
//! arrived after the round was answered.

use std::collections::BTreeMap;

use crate::error::PlinkoError;
use crate::{Cents, format_cents};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingBet {
    bet: Cents,
    expected_final: Option<Cents>,
    /// Sequence number of the answer, once attached
    answered_at: Option<u64>,
}

/// A pushed balance that could not be shown yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeferredPush {
    seq: u64,
    balance: Cents,
}

/// Client-side shadow of the server balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceLedger {
    optimistic: Cents,
    confirmed: Cents,
    /// Debits not yet settled or rolled back, by request id
    pending: BTreeMap<u64, PendingBet>,
    /// Orders answers against pushes
    seq: u64,
    deferred_push: Option<DeferredPush>,
}

impl BalanceLedger {
    pub fn new(balance: Cents) -> Self {
        Self {
            optimistic: balance,
            confirmed: balance,
            pending: BTreeMap::new(),
            seq: 0,
            deferred_push: None,
        }
    }

    pub fn optimistic(&self) -> Cents {
        self.optimistic
    }

    pub fn confirmed(&self) -> Cents {
        self.confirmed
    }

    pub fn has_outstanding(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Expected final balance attached to a pending bet, if any
    pub fn expected_final(&self, request_id: u64) -> Option<Cents> {
        self.pending.get(&request_id).and_then(|p| p.expected_final)
    }

    /// Take the bet out of the optimistic balance
    pub fn debit(&mut self, request_id: u64, bet: Cents) -> Result<(), PlinkoError> {
        if bet <= 0 {
            return Err(PlinkoError::validation("bet", "Bet must be greater than zero"));
        }
        if self.pending.contains_key(&request_id) {
            return Err(PlinkoError::AwaitingResult);
        }
        if self.optimistic < bet {
            return Err(PlinkoError::InsufficientBalance { bet });
        }
        self.optimistic -= bet;
        self.pending.insert(
            request_id,
            PendingBet {
                bet,
                expected_final: None,
                answered_at: None,
            },
        );
        Ok(())
    }

    /// Remember the authority's final balance for a debited request
    pub fn attach(&mut self, request_id: u64, expected_final: Cents) -> bool {
        match self.pending.get_mut(&request_id) {
            Some(pending) => {
                self.seq += 1;
                pending.expected_final = Some(expected_final);
                pending.answered_at = Some(self.seq);
                true
            }
            None => false,
        }
    }

    /// Undo a debit whose round never arrived; returns the amount restored
    ///
    /// Rolling back the last outstanding bet releases any held-back push.
    pub fn rollback(&mut self, request_id: u64) -> Option<Cents> {
        let pending = self.pending.remove(&request_id)?;
        self.optimistic += pending.bet;
        if self.pending.is_empty() {
            if let Some(push) = self.deferred_push.take() {
                self.optimistic = push.balance;
            }
        }
        log::info!(
            "Rolled back bet of {} for request {} (balance {})",
            format_cents(pending.bet),
            request_id,
            format_cents(self.optimistic)
        );
        Some(pending.bet)
    }

    /// Credit a landed round, then defer to the authority's balance
    ///
    /// Debits made after this request are still outstanding on the server
    /// side of `expected_final`, so they stay subtracted. A push received
    /// after this round was answered is newer than `expected_final` and wins
    /// once no other bet is outstanding.
    pub fn settle(&mut self, request_id: u64, payout: Cents, expected_final: Cents) -> bool {
        let Some(settled) = self.pending.remove(&request_id) else {
            log::warn!("Settle for unknown request {}", request_id);
            return false;
        };
        self.optimistic += payout;
        let estimate = self.optimistic;

        let answered_at = settled.answered_at.unwrap_or(self.seq);
        let newer_push = match self.deferred_push {
            Some(push) if push.seq > answered_at => Some(push),
            _ => {
                self.deferred_push = None;
                None
            }
        };

        match newer_push {
            Some(push) if self.pending.is_empty() => {
                self.deferred_push = None;
                self.confirmed = push.balance;
                self.optimistic = push.balance;
            }
            _ => {
                let later_debits: Cents = self
                    .pending
                    .range(request_id + 1..)
                    .map(|(_, p)| p.bet)
                    .sum();
                self.confirmed = newer_push.map_or(expected_final, |push| push.balance);
                self.optimistic = expected_final - later_debits;
            }
        }

        if estimate != self.optimistic {
            log::info!(
                "Reconciled request {}: estimate {} corrected to {}",
                request_id,
                format_cents(estimate),
                format_cents(self.optimistic)
            );
        }
        true
    }

    /// Apply a pushed session balance
    ///
    /// The confirmed balance always follows the push; the optimistic one is
    /// only overwritten when no bet is outstanding, otherwise the push waits
    /// for the next settlement. Returns whether it was applied now.
    pub fn apply_server_balance(&mut self, balance: Cents) -> bool {
        self.seq += 1;
        self.confirmed = balance;
        if self.pending.is_empty() {
            self.optimistic = balance;
            self.deferred_push = None;
            true
        } else {
            self.deferred_push = Some(DeferredPush {
                seq: self.seq,
                balance,
            });
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_debit_and_settle_example() {
        // $1000, bet $10 on a 1.0x bucket
        let mut ledger = BalanceLedger::new(100_000);
        ledger.debit(1, 1000).unwrap();
        assert_eq!(ledger.optimistic(), 99_000);
        assert!(ledger.attach(1, 100_000));
        assert!(ledger.settle(1, 1000, 100_000));
        assert_eq!(ledger.optimistic(), 100_000);
        assert_eq!(ledger.confirmed(), 100_000);
        assert!(!ledger.has_outstanding());
    }

    #[test]
    fn test_insufficient_balance_does_not_mutate() {
        let mut ledger = BalanceLedger::new(500);
        assert_eq!(
            ledger.debit(1, 1000),
            Err(PlinkoError::InsufficientBalance { bet: 1000 })
        );
        assert_eq!(ledger.optimistic(), 500);
        assert!(!ledger.has_outstanding());
    }

    #[test]
    fn test_rollback_restores_pre_bet_value() {
        let mut ledger = BalanceLedger::new(2_500);
        ledger.debit(7, 1000).unwrap();
        assert_eq!(ledger.rollback(7), Some(1000));
        assert_eq!(ledger.optimistic(), 2_500);
        assert_eq!(ledger.rollback(7), None);
    }

    #[test]
    fn test_server_truth_wins() {
        let mut ledger = BalanceLedger::new(10_000);
        ledger.debit(1, 1000).unwrap();
        // Client estimate would be 9000 + 5600, server says otherwise
        ledger.settle(1, 5600, 14_000);
        assert_eq!(ledger.optimistic(), 14_000);
        assert_eq!(ledger.confirmed(), 14_000);
    }

    #[test]
    fn test_server_push_waits_for_outstanding_bets() {
        let mut ledger = BalanceLedger::new(10_000);
        ledger.debit(1, 1000).unwrap();
        assert!(!ledger.apply_server_balance(20_000));
        assert_eq!(ledger.optimistic(), 9_000);
        assert_eq!(ledger.confirmed(), 20_000);

        ledger.rollback(1);
        assert!(ledger.apply_server_balance(20_000));
        assert_eq!(ledger.optimistic(), 20_000);
    }

    #[test]
    fn test_push_after_answer_survives_settle() {
        let mut ledger = BalanceLedger::new(10_000);
        ledger.debit(1, 1000).unwrap();
        ledger.attach(1, 14_600);
        // A deposit lands while the ball is still falling
        assert!(!ledger.apply_server_balance(15_000));
        assert_eq!(ledger.optimistic(), 9_000);
        ledger.settle(1, 5600, 14_600);
        assert_eq!(ledger.optimistic(), 15_000);
        assert_eq!(ledger.confirmed(), 15_000);

        // Nothing left over for the next round
        ledger.debit(2, 1000).unwrap();
        ledger.attach(2, 14_000);
        ledger.settle(2, 0, 14_000);
        assert_eq!(ledger.optimistic(), 14_000);
    }

    #[test]
    fn test_push_before_answer_is_superseded() {
        let mut ledger = BalanceLedger::new(10_000);
        ledger.debit(1, 1000).unwrap();
        assert!(!ledger.apply_server_balance(20_000));
        ledger.attach(1, 14_600);
        ledger.settle(1, 5600, 14_600);
        assert_eq!(ledger.optimistic(), 14_600);
        assert_eq!(ledger.confirmed(), 14_600);
    }

    #[test]
    fn test_newer_push_waits_for_last_outstanding_bet() {
        let mut ledger = BalanceLedger::new(10_000);
        ledger.debit(1, 1000).unwrap();
        ledger.debit(2, 500).unwrap();
        ledger.attach(1, 9_000);
        ledger.attach(2, 8_500);
        ledger.apply_server_balance(30_000);
        ledger.settle(1, 0, 9_000);
        assert_eq!(ledger.optimistic(), 8_500);
        assert_eq!(ledger.confirmed(), 30_000);
        ledger.settle(2, 0, 8_500);
        assert_eq!(ledger.optimistic(), 30_000);
        assert_eq!(ledger.confirmed(), 30_000);
    }

    #[test]
    fn test_settle_keeps_later_debits() {
        let mut ledger = BalanceLedger::new(10_000);
        ledger.debit(1, 1000).unwrap();
        ledger.debit(2, 500).unwrap();
        ledger.settle(1, 0, 9_000);
        assert_eq!(ledger.optimistic(), 8_500);
        ledger.settle(2, 1000, 9_500);
        assert_eq!(ledger.optimistic(), 9_500);
        assert_eq!(ledger.confirmed(), 9_500);
    }

    #[test]
    fn test_unknown_settle_is_ignored() {
        let mut ledger = BalanceLedger::new(1000);
        assert!(!ledger.settle(3, 100, 5));
        assert_eq!(ledger.optimistic(), 1000);
        assert!(!ledger.attach(3, 5));
    }

    proptest! {
        #[test]
        fn prop_balance_converges_to_server(
            rounds in prop::collection::vec((1i64..5_000, 0u32..300, any::<bool>()), 1..40),
        ) {
            let mut server: Cents = 100_000;
            let mut ledger = BalanceLedger::new(server);
            for (i, (bet, mult_pct, fails)) in rounds.into_iter().enumerate() {
                let id = i as u64 + 1;
                if ledger.debit(id, bet).is_err() {
                    prop_assert!(ledger.optimistic() < bet);
                    continue;
                }
                if fails {
                    ledger.rollback(id);
                } else {
                    let payout = bet * mult_pct as i64 / 100;
                    server = server - bet + payout;
                    ledger.attach(id, server);
                    ledger.settle(id, payout, server);
                }
                prop_assert!(!ledger.has_outstanding());
                prop_assert_eq!(ledger.confirmed(), server);
                prop_assert_eq!(ledger.optimistic(), server);
            }
            prop_assert_eq!(ledger.optimistic(), server);
        }
    }
}
