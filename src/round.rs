//! Outcome client for the external round authority
//!
//! The authority decides every round. This module only asks for a round,
//! validates the answer, and turns it into an immutable `Round`. It never
//! computes an outcome for a live session; `LocalAuthority` is a stand-in
//! used by the native demo and tests.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_BET_CENTS, REQUEST_TIMEOUT_MS};
use crate::error::{NetworkFailure, PlinkoError};
use crate::sim::multipliers::{RiskTier, multipliers, validate_rows};
use crate::{Cents, cents_from_dollars, dollars_from_cents, payout_for};

/// Hex characters shown for a truncated receipt hash
const SHORT_HASH_LEN: usize = 12;

/// Receipt timestamp exactly as the authority sent it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReceiptTimestamp {
    Millis(u64),
    Text(String),
}

impl fmt::Display for ReceiptTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiptTimestamp::Millis(ms) => write!(f, "{}", ms),
            ReceiptTimestamp::Text(s) => f.write_str(s),
        }
    }
}

/// Proof that the outcome was fixed before the ball was revealed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FairnessReceipt {
    pub hash: String,
    pub timestamp: ReceiptTimestamp,
}

impl FairnessReceipt {
    pub fn short_hash(&self) -> &str {
        match self.hash.char_indices().nth(SHORT_HASH_LEN) {
            Some((idx, _)) => &self.hash[..idx],
            None => &self.hash,
        }
    }

    /// Truncated hash plus timestamp, for the fairness panel
    pub fn display(&self) -> String {
        if self.hash.chars().count() > SHORT_HASH_LEN {
            format!("{}… @ {}", self.short_hash(), self.timestamp)
        } else {
            format!("{} @ {}", self.hash, self.timestamp)
        }
    }
}

/// One authoritative round, consumed by exactly one ball
#[derive(Debug, Clone, PartialEq)]
pub struct Round {
    pub request_id: u64,
    pub bet_amount: Cents,
    pub rows: u8,
    pub risk: RiskTier,
    pub target_bucket: usize,
    pub multiplier: f64,
    pub payout: Cents,
    pub expected_final_balance: Cents,
    pub receipt: FairnessReceipt,
}

/// A request in flight
#[derive(Debug, Clone, PartialEq)]
pub struct RoundRequest {
    pub request_id: u64,
    pub bet_amount: Cents,
    pub risk: RiskTier,
    pub rows: u8,
    pub issued_at_ms: f64,
}

/// JSON body POSTed to the authority
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRequestBody {
    pub bet_amount: f64,
    pub risk_tier: RiskTier,
    pub rows: u8,
}

impl RoundRequest {
    pub fn body(&self) -> RoundRequestBody {
        RoundRequestBody {
            bet_amount: dollars_from_cents(self.bet_amount),
            risk_tier: self.risk,
            rows: self.rows,
        }
    }

    pub fn to_json(&self) -> Result<String, PlinkoError> {
        serde_json::to_string(&self.body())
            .map_err(|e| PlinkoError::validation("request", e.to_string()))
    }
}

/// JSON answer from the authority
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_bucket_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fairness_receipt: Option<FairnessReceipt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl RoundResponse {
    pub fn from_json(body: &str) -> Result<Self, PlinkoError> {
        serde_json::from_str(body).map_err(|e| PlinkoError::malformed(e.to_string()))
    }

    pub fn rejected(message: impl Into<String>, code: Option<&str>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            code: code.map(str::to_string),
            ..Default::default()
        }
    }
}

/// Map a non-2xx HTTP answer to an error
pub fn error_for_status(status: u16, body: &str, bet: Cents) -> PlinkoError {
    if let Ok(response) = RoundResponse::from_json(body) {
        if !response.success {
            return rejection_error(&response, bet);
        }
    }
    if status >= 500 {
        PlinkoError::Server(format!("HTTP {}", status))
    } else {
        PlinkoError::Network(NetworkFailure::Status(status))
    }
}

fn rejection_error(response: &RoundResponse, bet: Cents) -> PlinkoError {
    let message = response
        .message
        .clone()
        .unwrap_or_else(|| "round rejected".to_string());
    match response.code.as_deref() {
        Some("INSUFFICIENT_BALANCE") => PlinkoError::InsufficientBalance { bet },
        Some("SERVER_ERROR") => PlinkoError::Server(message),
        Some(_) => PlinkoError::validation("bet", message),
        None if message.to_lowercase().contains("insufficient") => {
            PlinkoError::InsufficientBalance { bet }
        }
        None => PlinkoError::validation("bet", message),
    }
}

/// Validate a bet before any request or debit
pub fn validate_bet(bet: Cents) -> Result<(), PlinkoError> {
    if bet <= 0 {
        return Err(PlinkoError::validation("bet", "Bet must be greater than zero"));
    }
    if bet > MAX_BET_CENTS {
        return Err(PlinkoError::validation(
            "bet",
            format!("Bet exceeds the maximum of {}", crate::format_cents(MAX_BET_CENTS)),
        ));
    }
    Ok(())
}

/// Turn a successful response into a `Round`, rejecting anything inconsistent
fn round_from_response(request: &RoundRequest, response: RoundResponse) -> Result<Round, PlinkoError> {
    if !response.success {
        return Err(rejection_error(&response, request.bet_amount));
    }

    let target_bucket = response
        .target_bucket_index
        .ok_or_else(|| PlinkoError::malformed("missing targetBucketIndex"))?;
    let bucket_count = request.rows as usize + 1;
    if target_bucket >= bucket_count {
        return Err(PlinkoError::malformed(format!(
            "targetBucketIndex {} outside [0, {})",
            target_bucket, bucket_count
        )));
    }

    let multiplier = response
        .multiplier
        .ok_or_else(|| PlinkoError::malformed("missing multiplier"))?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(PlinkoError::malformed(format!("bad multiplier {}", multiplier)));
    }

    let payout = response
        .payout_amount
        .filter(|p| p.is_finite())
        .map(cents_from_dollars)
        .ok_or_else(|| PlinkoError::malformed("missing payoutAmount"))?;
    let expected = payout_for(request.bet_amount, multiplier);
    if (payout - expected).abs() > 1 {
        return Err(PlinkoError::malformed(format!(
            "payout {} does not match bet x multiplier ({})",
            payout, expected
        )));
    }

    let expected_final_balance = response
        .balance_after
        .filter(|b| b.is_finite())
        .map(cents_from_dollars)
        .ok_or_else(|| PlinkoError::malformed("missing balanceAfter"))?;
    let receipt = response
        .fairness_receipt
        .ok_or_else(|| PlinkoError::malformed("missing fairnessReceipt"))?;

    Ok(Round {
        request_id: request.request_id,
        bet_amount: request.bet_amount,
        rows: request.rows,
        risk: request.risk,
        target_bucket,
        multiplier,
        payout,
        expected_final_balance,
        receipt,
    })
}

/// Something that can decide rounds synchronously
pub trait RoundAuthority {
    fn request_round(&mut self, request: &RoundRequest) -> Result<RoundResponse, PlinkoError>;
}

/// Per-session request tracker; at most one request awaits a result
#[derive(Debug, Default)]
pub struct OutcomeClient {
    next_request_id: u64,
    pending: Option<RoundRequest>,
}

impl OutcomeClient {
    pub fn new() -> Self {
        Self {
            next_request_id: 1,
            pending: None,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&RoundRequest> {
        self.pending.as_ref()
    }

    /// Validate and mark the session as awaiting a result
    pub fn begin(
        &mut self,
        bet_amount: Cents,
        risk: RiskTier,
        rows: u8,
        now_ms: f64,
    ) -> Result<RoundRequest, PlinkoError> {
        if self.pending.is_some() {
            return Err(PlinkoError::AwaitingResult);
        }
        validate_rows(rows)?;
        validate_bet(bet_amount)?;

        let request = RoundRequest {
            request_id: self.next_request_id.max(1),
            bet_amount,
            risk,
            rows,
            issued_at_ms: now_ms,
        };
        self.next_request_id = request.request_id + 1;
        self.pending = Some(request.clone());
        log::info!(
            "Round {} requested (bet {}, {} rows, {} risk)",
            request.request_id,
            crate::format_cents(bet_amount),
            rows,
            risk.as_str()
        );
        Ok(request)
    }

    /// Accept the authority's answer for the pending request
    ///
    /// Answers for abandoned or unknown requests return `StaleResponse`
    /// and leave the client untouched.
    pub fn complete(
        &mut self,
        request_id: u64,
        result: Result<RoundResponse, PlinkoError>,
    ) -> Result<Round, PlinkoError> {
        let Some(request) = self.pending.take_if(|p| p.request_id == request_id) else {
            log::debug!("Ignoring stale response for request {}", request_id);
            return Err(PlinkoError::StaleResponse(request_id));
        };
        let response = result?;
        round_from_response(&request, response)
    }

    /// Abandon a request that has waited too long
    pub fn expire(&mut self, now_ms: f64) -> Option<RoundRequest> {
        let request = self
            .pending
            .take_if(|p| now_ms - p.issued_at_ms >= REQUEST_TIMEOUT_MS)?;
        log::warn!("Round {} timed out", request.request_id);
        Some(request)
    }

    /// Abandon whatever is pending (navigation, resize)
    pub fn invalidate(&mut self) -> Option<RoundRequest> {
        self.pending.take()
    }
}

/// BLAKE3 digest of `server_seed:client_seed:nonce`
pub fn outcome_digest(server_seed: &str, client_seed: &str, nonce: u64) -> blake3::Hash {
    blake3::hash(format!("{}:{}:{}", server_seed, client_seed, nonce).as_bytes())
}

/// Each of the first `rows` bits moves the ball one slot right
pub fn bucket_from_digest(digest: &blake3::Hash, rows: u8) -> usize {
    let bytes = digest.as_bytes();
    (0..rows as usize)
        .filter(|bit| bytes[bit / 8] & (1 << (bit % 8)) != 0)
        .count()
}

/// Recompute a round from revealed seeds; `None` if the receipt does not match
pub fn verify_receipt(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    rows: u8,
    receipt: &FairnessReceipt,
) -> Option<usize> {
    let digest = outcome_digest(server_seed, client_seed, nonce);
    if digest.to_hex().as_str() == receipt.hash {
        Some(bucket_from_digest(&digest, rows))
    } else {
        None
    }
}

/// Seeded, provably-fair authority for native runs and tests
#[derive(Debug, Clone)]
pub struct LocalAuthority {
    balance: Cents,
    server_seed: String,
    client_seed: String,
    nonce: u64,
}

impl LocalAuthority {
    pub fn new(balance: Cents, server_seed: impl Into<String>, client_seed: impl Into<String>) -> Self {
        Self {
            balance,
            server_seed: server_seed.into(),
            client_seed: client_seed.into(),
            nonce: 0,
        }
    }

    pub fn balance(&self) -> Cents {
        self.balance
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Commitment published before play
    pub fn server_seed_hash(&self) -> String {
        blake3::hash(self.server_seed.as_bytes()).to_hex().to_string()
    }

    /// Reveal the seed (ends the commitment)
    pub fn reveal_server_seed(&self) -> &str {
        &self.server_seed
    }
}

impl RoundAuthority for LocalAuthority {
    fn request_round(&mut self, request: &RoundRequest) -> Result<RoundResponse, PlinkoError> {
        if validate_bet(request.bet_amount).is_err() {
            return Ok(RoundResponse::rejected("Invalid bet amount", Some("VALIDATION_ERROR")));
        }
        let Ok(table) = multipliers(request.rows, request.risk) else {
            return Ok(RoundResponse::rejected("Unsupported row count", Some("VALIDATION_ERROR")));
        };
        if request.bet_amount > self.balance {
            return Ok(RoundResponse::rejected(
                "Insufficient balance",
                Some("INSUFFICIENT_BALANCE"),
            ));
        }

        self.nonce += 1;
        let digest = outcome_digest(&self.server_seed, &self.client_seed, self.nonce);
        let bucket = bucket_from_digest(&digest, request.rows);
        let multiplier = table[bucket];
        let payout = payout_for(request.bet_amount, multiplier);
        self.balance = self.balance - request.bet_amount + payout;

        Ok(RoundResponse {
            success: true,
            target_bucket_index: Some(bucket),
            multiplier: Some(multiplier),
            payout_amount: Some(dollars_from_cents(payout)),
            balance_after: Some(dollars_from_cents(self.balance)),
            fairness_receipt: Some(FairnessReceipt {
                hash: digest.to_hex().to_string(),
                timestamp: ReceiptTimestamp::Millis(crate::platform::now_ms() as u64),
            }),
            message: None,
            code: None,
        })
    }
}
