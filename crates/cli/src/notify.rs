//! Log-backed notification sink for CLI runs.

use async_trait::async_trait;
use stealth_trade_core::{EngineEvent, NotificationSink};

/// Writes every engine event to the structured log.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn notify(&self, event: &EngineEvent) {
        match event {
            EngineEvent::PositionOpened {
                symbol,
                side,
                quantity,
                entry_price,
                ..
            } => {
                tracing::info!(%symbol, ?side, quantity, %entry_price, "opened");
            }
            EngineEvent::PositionClosed {
                symbol,
                realized_pnl,
                reason,
                ..
            } => {
                tracing::info!(%symbol, %realized_pnl, %reason, "closed");
            }
            EngineEvent::SignalRejected { symbol, reason, .. } => {
                tracing::debug!(%symbol, %reason, "signal rejected");
            }
            EngineEvent::EntryRejected { symbol, reason, .. } => {
                tracing::info!(%symbol, %reason, "entry rejected");
            }
            EngineEvent::SafeModeChanged { active, reason, .. } => {
                tracing::warn!(active, %reason, "safe mode changed");
            }
            EngineEvent::InterventionRequired {
                symbol,
                close_attempts,
                ..
            } => {
                tracing::error!(%symbol, close_attempts, "manual intervention required");
            }
            EngineEvent::ReconciliationHalt { detail, .. } => {
                tracing::error!(%detail, "reconciliation halt");
            }
        }
    }
}
