//! Bucket multiplier tables and landing probabilities
//!
//! These tables only label the buckets and drive the local authority.
//! A live round's payout always comes from the authority's response.

use serde::{Deserialize, Serialize};

use crate::error::PlinkoError;

/// Risk tier selected by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(RiskTier::Low),
            "medium" | "med" => Some(RiskTier::Medium),
            "high" => Some(RiskTier::High),
            _ => None,
        }
    }
}

const LOW_8: [f64; 9] = [5.6, 2.1, 1.1, 0.7, 1.0, 0.7, 1.1, 2.1, 5.6];
const MEDIUM_8: [f64; 9] = [13.0, 3.0, 1.3, 0.7, 0.4, 0.7, 1.3, 3.0, 13.0];
const HIGH_8: [f64; 9] = [29.0, 4.0, 1.5, 0.3, 0.2, 0.3, 1.5, 4.0, 29.0];

const LOW_12: [f64; 13] = [10.0, 3.0, 1.6, 1.4, 1.1, 1.0, 0.5, 1.0, 1.1, 1.4, 1.6, 3.0, 10.0];
const MEDIUM_12: [f64; 13] = [33.0, 11.0, 4.0, 2.0, 1.1, 0.6, 0.3, 0.6, 1.1, 2.0, 4.0, 11.0, 33.0];
const HIGH_12: [f64; 13] = [170.0, 24.0, 8.1, 2.0, 0.7, 0.2, 0.2, 0.2, 0.7, 2.0, 8.1, 24.0, 170.0];

const LOW_16: [f64; 17] = [
    16.0, 9.0, 2.0, 1.4, 1.4, 1.2, 1.1, 1.0, 0.5, 1.0, 1.1, 1.2, 1.4, 1.4, 2.0, 9.0, 16.0,
];
const MEDIUM_16: [f64; 17] = [
    110.0, 41.0, 10.0, 5.0, 3.0, 1.5, 1.0, 0.5, 0.3, 0.5, 1.0, 1.5, 3.0, 5.0, 10.0, 41.0, 110.0,
];
const HIGH_16: [f64; 17] = [
    1000.0, 130.0, 26.0, 9.0, 4.0, 2.0, 0.2, 0.2, 0.2, 0.2, 0.2, 2.0, 4.0, 9.0, 26.0, 130.0, 1000.0,
];

/// Reject row counts without a multiplier table
pub fn validate_rows(rows: u8) -> Result<(), PlinkoError> {
    if crate::consts::SUPPORTED_ROWS.contains(&rows) {
        Ok(())
    } else {
        Err(PlinkoError::validation(
            "rows",
            format!("{} rows is not supported (use 8, 12 or 16)", rows),
        ))
    }
}

/// Multipliers for every bucket, left to right (`rows + 1` entries)
pub fn multipliers(rows: u8, risk: RiskTier) -> Result<&'static [f64], PlinkoError> {
    validate_rows(rows)?;
    let table: &'static [f64] = match (rows, risk) {
        (8, RiskTier::Low) => &LOW_8,
        (8, RiskTier::Medium) => &MEDIUM_8,
        (8, RiskTier::High) => &HIGH_8,
        (12, RiskTier::Low) => &LOW_12,
        (12, RiskTier::Medium) => &MEDIUM_12,
        (12, RiskTier::High) => &HIGH_12,
        (_, RiskTier::Low) => &LOW_16,
        (_, RiskTier::Medium) => &MEDIUM_16,
        (_, RiskTier::High) => &HIGH_16,
    };
    Ok(table)
}

/// Probability of landing in `bucket`: C(rows, bucket) / 2^rows
pub fn bucket_probability(rows: u8, bucket: usize) -> f64 {
    let n = rows as u64;
    let k = bucket as u64;
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    let mut combinations = 1u64;
    for i in 0..k {
        combinations = combinations * (n - i) / (i + 1);
    }
    combinations as f64 / (1u64 << n) as f64
}
