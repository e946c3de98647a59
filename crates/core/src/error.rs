//! Typed failures crossing component boundaries.
//!
//! Expected outcomes (gate and risk rejections) are plain enum variants in
//! their decision types, not errors; only genuine failures live here.

use std::time::Duration;
use thiserror::Error;

/// Classified failure from the execution gateway.
///
/// Classification drives retry policy: `Timeout` and `Unknown` are
/// retryable with capped backoff, `Rejected` is terminal for the attempt.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("order timed out after {0:?}")]
    Timeout(Duration),

    #[error("order rejected by broker: {0}")]
    Rejected(String),

    #[error("gateway failure: {0}")]
    Unknown(String),
}

impl GatewayError {
    /// True when a retry may plausibly succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unknown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_is_terminal() {
        assert!(!GatewayError::Rejected("insufficient margin".to_string()).is_retryable());
        assert!(GatewayError::Timeout(Duration::from_secs(15)).is_retryable());
        assert!(GatewayError::Unknown("connection reset".to_string()).is_retryable());
    }
}
