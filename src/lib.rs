//! Plinko Drop - outcome-constrained Plinko for the browser
//!
//! Core modules:
//! - `sim`: Guided physics simulation (layout, world, guidance, landing)
//! - `round`: Outcome client talking to the external round authority
//! - `ledger`: Optimistic balance with authoritative reconciliation
//! - `autobet`: Repeated rounds under stop policies
//! - `game`: Orchestrates one player session
//! - `renderer`: WebGPU rendering pipeline
//! - `platform`: Browser/native clock and storage
//! - `tuning`: Data-driven guidance constants

pub mod autobet;
pub mod error;
pub mod game;
pub mod history;
pub mod ledger;
pub mod platform;
pub mod renderer;
pub mod round;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use error::{ErrorKind, PlinkoError};
pub use game::PlinkoGame;
pub use history::RoundHistory;
pub use settings::{QualityPreset, Settings};

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Canvas width the base element sizes are tuned for
    pub const REFERENCE_WIDTH: f32 = 800.0;
    /// Row count the base element sizes are tuned for
    pub const REFERENCE_ROWS: u8 = 16;
    /// Supported row counts
    pub const SUPPORTED_ROWS: [u8; 3] = [8, 12, 16];

    /// Ball radius at scale 1.0
    pub const BASE_BALL_RADIUS: f32 = 7.0;
    /// Peg radius at scale 1.0
    pub const BASE_PEG_RADIUS: f32 = 4.0;
    /// Peg spacing must be at least this many ball diameters
    pub const MIN_PASSAGE_FACTOR: f32 = 2.5;
    /// Row spacing / peg spacing (equilateral lattice, sqrt(3)/2)
    pub const ROW_SPACING_RATIO: f32 = 0.866;
    /// Horizontal margin on each side, as a fraction of canvas width
    pub const SIDE_MARGIN_FRAC: f32 = 0.05;

    /// Forced landing after this much wall-clock time in flight
    pub const LANDING_TIMEOUT_MS: f64 = 10_000.0;
    /// Outcome requests older than this are abandoned
    pub const REQUEST_TIMEOUT_MS: f64 = 8_000.0;
    /// Minimum pause between autobet rounds
    pub const AUTOBET_DELAY_MS: f64 = 500.0;
    /// Minimum pause between manual drops
    pub const DROP_DEBOUNCE_MS: f64 = 250.0;

    /// Largest accepted bet, in cents
    pub const MAX_BET_CENTS: i64 = 10_000_000;
}

/// Money in integer cents
pub type Cents = i64;

/// Convert a wire dollar amount to cents (half away from zero)
#[inline]
pub fn cents_from_dollars(dollars: f64) -> Cents {
    (dollars * 100.0).round() as Cents
}

/// Convert cents to a wire dollar amount
#[inline]
pub fn dollars_from_cents(cents: Cents) -> f64 {
    cents as f64 / 100.0
}

/// Format cents as `$12.34` (or `-$12.34`)
pub fn format_cents(cents: Cents) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

/// Payout for a bet at a multiplier, rounded to the nearest cent
#[inline]
pub fn payout_for(bet: Cents, multiplier: f64) -> Cents {
    (bet as f64 * multiplier).round() as Cents
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_conversion() {
        assert_eq!(cents_from_dollars(10.0), 1000);
        assert_eq!(cents_from_dollars(0.125), 13);
        assert_eq!(cents_from_dollars(56.0), 5600);
        assert!((dollars_from_cents(1234) - 12.34).abs() < 1e-9);
    }

    #[test]
    fn test_format_cents() {
        assert_eq!(format_cents(5600), "$56.00");
        assert_eq!(format_cents(5), "$0.05");
        assert_eq!(format_cents(-250), "-$2.50");
    }

    #[test]
    fn test_payout_for() {
        assert_eq!(payout_for(1000, 5.6), 5600);
        assert_eq!(payout_for(1000, 1.0), 1000);
        assert_eq!(payout_for(1000, 0.0), 0);
        assert_eq!(payout_for(333, 0.3), 100);
    }
}
