//! Timeout and retry discipline around any execution gateway.
//!
//! Every call is bounded by a wall-clock timeout. `Timeout` and `Unknown`
//! failures retry with capped exponential backoff; `Rejected` is terminal
//! for the attempt. Open orders get a small budget (a missed entry is
//! cheap), closes get a larger one (an un-closed losing position is not).

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use stealth_trade_core::{
    BrokerPosition, ExecutionGateway, FillReport, GatewayError, GatewayPolicy, OrderTicket,
    Position,
};

/// Resolved timeout/retry budgets.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub call_timeout: Duration,
    pub open_attempts: u32,
    pub close_attempts: u32,
    pub backoff_base: Duration,
}

impl From<&GatewayPolicy> for RetryPolicy {
    fn from(policy: &GatewayPolicy) -> Self {
        Self {
            call_timeout: Duration::from_secs(policy.call_timeout_secs),
            open_attempts: policy.open_attempts.max(1),
            close_attempts: policy.close_attempts.max(1),
            backoff_base: Duration::from_millis(policy.backoff_base_ms),
        }
    }
}

/// Wraps a gateway with the timeout/retry policy.
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G> RetryingGateway<G> {
    #[must_use]
    pub const fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(8);
        self.policy
            .backoff_base
            .checked_mul(1 << exponent)
            .unwrap_or(self.policy.backoff_base)
    }
}

impl<G: ExecutionGateway> RetryingGateway<G> {
    async fn with_timeout<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: std::future::Future<Output = Result<T, GatewayError>> + Send,
    {
        match tokio::time::timeout(self.policy.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(self.policy.call_timeout)),
        }
    }
}

#[async_trait]
impl<G: ExecutionGateway> ExecutionGateway for RetryingGateway<G> {
    async fn open(&self, ticket: &OrderTicket) -> Result<FillReport, GatewayError> {
        let mut last_error = GatewayError::Unknown("no attempt made".to_string());
        for attempt in 0..self.policy.open_attempts {
            match self.with_timeout(self.inner.open(ticket)).await {
                Ok(fill) => return Ok(fill),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    tracing::warn!(
                        symbol = %ticket.symbol,
                        attempt = attempt + 1,
                        %error,
                        "open submission failed"
                    );
                    last_error = error;
                    if attempt + 1 < self.policy.open_attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    async fn close(&self, position: &Position, mark: Decimal) -> Result<FillReport, GatewayError> {
        let mut last_error = GatewayError::Unknown("no attempt made".to_string());
        for attempt in 0..self.policy.close_attempts {
            match self.with_timeout(self.inner.close(position, mark)).await {
                Ok(fill) => return Ok(fill),
                Err(error) => {
                    if !error.is_retryable() {
                        return Err(error);
                    }
                    tracing::warn!(
                        symbol = %position.symbol,
                        attempt = attempt + 1,
                        %error,
                        "close submission failed"
                    );
                    last_error = error;
                    if attempt + 1 < self.policy.close_attempts {
                        tokio::time::sleep(self.backoff(attempt)).await;
                    }
                }
            }
        }
        Err(last_error)
    }

    async fn open_positions(&self) -> Result<Vec<BrokerPosition>, GatewayError> {
        self.with_timeout(self.inner.open_positions()).await
    }
}
