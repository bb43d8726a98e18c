//! Error taxonomy
//!
//! Every failure in a round has a defined recovery: rollback of the
//! optimistic debit, a forced landing, or a retry offered to the player.
//! `SimulationFault` is internal and only ever logged.

use thiserror::Error;

use crate::Cents;

/// Transport-level failures talking to the round authority
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkFailure {
    #[error("request timed out")]
    Timeout,
    #[error("transport failed: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
}

/// Errors surfaced by the round lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlinkoError {
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("insufficient balance for a bet of {bet}c")]
    InsufficientBalance { bet: Cents },
    #[error("network error: {0}")]
    Network(#[from] NetworkFailure),
    #[error("server error: {0}")]
    Server(String),
    #[error("a round is already awaiting its result")]
    AwaitingResult,
    #[error("a ball is still in flight")]
    BallInFlight,
    #[error("stale response for request {0}")]
    StaleResponse(u64),
}

/// Coarse classification shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    InsufficientBalance,
    NetworkError,
    ServerError,
    Busy,
}

impl PlinkoError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Network(NetworkFailure::Malformed(reason.into()))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Server(_) => ErrorKind::ServerError,
            Self::AwaitingResult | Self::BallInFlight | Self::StaleResponse(_) => ErrorKind::Busy,
        }
    }

    /// Whether an optimistic debit made for this request must be undone
    pub fn requires_rollback(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Server(_) | Self::Validation { .. } | Self::InsufficientBalance { .. }
        )
    }

    /// Whether the player should be offered a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server(_))
    }

    /// Message for the status line
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { reason, .. } => reason.clone(),
            Self::InsufficientBalance { .. } => "Insufficient balance".to_string(),
            Self::Network(_) | Self::Server(_) => {
                "Connection problem, your bet was not placed. Try again.".to_string()
            }
            Self::AwaitingResult | Self::BallInFlight => "Wait for the current drop to land".to_string(),
            Self::StaleResponse(_) => String::new(),
        }
    }
}

/// Internal simulation conditions, resolved silently
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationFault {
    #[error("ball {ball} stalled at speed {speed:.2}, applying {recovery}")]
    Stall {
        ball: u32,
        speed: f32,
        recovery: &'static str,
    },
    #[error("ball {ball} did not land within {elapsed_ms:.0}ms, forcing bucket {bucket}")]
    LandingTimeout {
        ball: u32,
        elapsed_ms: f64,
        bucket: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            PlinkoError::validation("bet", "must be positive").kind(),
            ErrorKind::ValidationError
        );
        assert_eq!(
            PlinkoError::InsufficientBalance { bet: 100 }.kind(),
            ErrorKind::InsufficientBalance
        );
        assert_eq!(
            PlinkoError::from(NetworkFailure::Timeout).kind(),
            ErrorKind::NetworkError
        );
        assert_eq!(PlinkoError::Server("boom".into()).kind(), ErrorKind::ServerError);
    }

    #[test]
    fn test_rollback_and_retry() {
        assert!(PlinkoError::from(NetworkFailure::Timeout).requires_rollback());
        assert!(PlinkoError::from(NetworkFailure::Timeout).is_retryable());
        assert!(!PlinkoError::StaleResponse(3).requires_rollback());
        assert!(!PlinkoError::BallInFlight.requires_rollback());
        assert!(!PlinkoError::validation("bet", "zero").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = PlinkoError::InsufficientBalance { bet: 1000 };
        assert_eq!(err.to_string(), "insufficient balance for a bet of 1000c");
        let err = PlinkoError::malformed("missing multiplier");
        assert_eq!(
            err.to_string(),
            "network error: malformed response: missing multiplier"
        );
    }
}
