use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Structured events delivered to the notification sink and broadcast to
/// in-process subscribers. Delivery failures never block trading logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Entry confirmed and position registered
    PositionOpened {
        symbol: String,
        side: Side,
        quantity: u32,
        entry_price: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Close confirmed with realized P&L and exit reason
    PositionClosed {
        symbol: String,
        side: Side,
        quantity: u32,
        entry_price: Decimal,
        exit_price: Decimal,
        realized_pnl: Decimal,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Candidate failed the quality gate
    SignalRejected {
        symbol: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Accepted signal rejected by the risk engine or the gateway
    EntryRejected {
        symbol: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// Safe mode toggled by the drawdown/streak trigger or manual override
    SafeModeChanged {
        active: bool,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A close kept failing past the retry budget; a human must look
    InterventionRequired {
        symbol: String,
        close_attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Startup reconciliation found persisted state the gateway disowns
    ReconciliationHalt {
        detail: String,
        timestamp: DateTime<Utc>,
    },
}
