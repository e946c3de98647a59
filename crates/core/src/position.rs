//! Position lifecycle records and closed-trade snapshots.

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a managed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// Open order submitted, fill not yet confirmed
    Opening,
    /// Filled; protected by the static entry-based stop and target
    Open,
    /// Favorable excursion reached activation; stop ratchets behind price
    Trailing,
    /// Exit condition met; close order pending or retrying
    Closing,
    /// Terminal; exit reason recorded, trade archived
    Closed,
}

/// Why a close was forced from outside the price path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcedReason {
    SafeMode,
    SessionEnd,
    Manual,
}

/// Trigger recorded when a position transitions to `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Protective stop breached against the position
    Stop,
    /// Profit target reached in favor
    Target,
    /// Externally forced close
    Forced(ForcedReason),
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stop => write!(f, "stop breached"),
            Self::Target => write!(f, "target reached"),
            Self::Forced(ForcedReason::SafeMode) => write!(f, "forced: safe mode"),
            Self::Forced(ForcedReason::SessionEnd) => write!(f, "forced: session end"),
            Self::Forced(ForcedReason::Manual) => write!(f, "forced: manual override"),
        }
    }
}

/// A single open position, exclusively owned by the trade manager.
///
/// Mutated on every price refresh and on manager-driven risk events;
/// archived as a [`Trade`] on the `Closed` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    /// Best favorable price observed since entry
    pub trailing_ref: Decimal,
    pub status: PositionStatus,
    pub exit_reason: Option<ExitReason>,
    /// Failed close submissions so far
    #[serde(default)]
    pub close_attempts: u32,
    /// Earliest instant the next close retry may run
    #[serde(default)]
    pub next_close_attempt_at: Option<DateTime<Utc>>,
}

impl Position {
    /// Entry cost of the position (quantity x entry price).
    #[must_use]
    pub fn entry_cost(&self) -> Decimal {
        self.entry_price * Decimal::from(self.quantity)
    }

    /// Signed profit at `mark`, before commissions.
    #[must_use]
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        let diff = match self.side {
            Side::Long => mark - self.entry_price,
            Side::Short => self.entry_price - mark,
        };
        diff * Decimal::from(self.quantity)
    }

    /// True while the position still holds shares (`Opening`/`Open`/`Trailing`).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(
            self.status,
            PositionStatus::Opening | PositionStatus::Open | PositionStatus::Trailing
        )
    }

    /// True once an exit has been decided but not yet confirmed.
    #[must_use]
    pub const fn is_closing(&self) -> bool {
        matches!(self.status, PositionStatus::Closing)
    }
}

/// Immutable snapshot of a closed position.
///
/// Created exactly once on the `Closed` transition and appended to
/// persistence keyed by `position_id`, which makes re-appends idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub position_id: Uuid,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub exit_reason: ExitReason,
}

impl Trade {
    /// Materializes the archive record for a position closed at `exit_price`.
    ///
    /// `commission` is subtracted from the realized result.
    #[must_use]
    pub fn from_close(
        position: &Position,
        exit_price: Decimal,
        commission: Decimal,
        closed_at: DateTime<Utc>,
    ) -> Self {
        let realized_pnl = position.unrealized_pnl(exit_price) - commission;
        Self {
            position_id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price,
            realized_pnl,
            opened_at: position.opened_at,
            closed_at,
            exit_reason: position.exit_reason.unwrap_or(ExitReason::Stop),
        }
    }

    /// True when the trade realized a profit.
    #[must_use]
    pub fn is_win(&self) -> bool {
        self.realized_pnl > Decimal::ZERO
    }
}
