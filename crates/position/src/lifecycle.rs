//! Position lifecycle transitions.
//!
//! OPENING -> OPEN -> TRAILING -> CLOSING -> CLOSED. Price-driven
//! evaluation is a pure function over (config, position, price), so the
//! trade manager can fan evaluations out across a worker pool and merge the
//! results before touching shared state.

use crate::trailing;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use stealth_trade_core::{
    AcceptedSignal, ExitReason, FillReport, ForcedReason, Position, PositionStatus, Side, Trade,
    TrailConfig,
};
use uuid::Uuid;

/// What a refresh decided for one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleAction {
    /// Nothing changed
    Hold,
    /// Trailing stop ratcheted; no exit yet
    Tightened,
    /// An exit condition fired; the position is now `Closing`
    Exit(ExitReason),
}

/// Owns the transition rules for one strategy's positions.
#[derive(Debug, Clone)]
pub struct PositionLifecycle {
    config: TrailConfig,
}

impl PositionLifecycle {
    #[must_use]
    pub const fn new(config: TrailConfig) -> Self {
        Self { config }
    }

    /// Builds an `Open` position from a confirmed entry fill.
    ///
    /// Static stop and target come from entry-based percentages unless the
    /// scorer supplied explicit levels.
    #[must_use]
    pub fn open_from_fill(&self, signal: &AcceptedSignal, fill: &FillReport) -> Position {
        let entry = fill.price;
        let stop_pct = Decimal::try_from(self.config.stop_loss_pct).unwrap_or(Decimal::ZERO);
        let target_pct = Decimal::try_from(self.config.take_profit_pct).unwrap_or(Decimal::ZERO);

        let (default_stop, default_target) = match signal.side {
            Side::Long => (
                entry * (Decimal::ONE - stop_pct),
                entry * (Decimal::ONE + target_pct),
            ),
            Side::Short => (
                entry * (Decimal::ONE + stop_pct),
                entry * (Decimal::ONE - target_pct),
            ),
        };

        Position {
            id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            side: signal.side,
            quantity: fill.quantity,
            entry_price: entry,
            opened_at: fill.timestamp,
            stop_price: signal.suggested_stop.unwrap_or(default_stop),
            target_price: signal.suggested_target.unwrap_or(default_target),
            trailing_ref: entry,
            status: PositionStatus::Open,
            exit_reason: None,
            close_attempts: 0,
            next_close_attempt_at: None,
        }
    }

    /// Builds a position for a brokerage-reported fill the engine never saw,
    /// discovered during startup reconciliation. Protection levels are
    /// derived from the reported average price.
    #[must_use]
    pub fn adopt_external(
        &self,
        symbol: &str,
        side: Side,
        quantity: u32,
        avg_price: Decimal,
        now: DateTime<Utc>,
    ) -> Position {
        let stop_pct = Decimal::try_from(self.config.stop_loss_pct).unwrap_or(Decimal::ZERO);
        let target_pct = Decimal::try_from(self.config.take_profit_pct).unwrap_or(Decimal::ZERO);
        let (stop_price, target_price) = match side {
            Side::Long => (
                avg_price * (Decimal::ONE - stop_pct),
                avg_price * (Decimal::ONE + target_pct),
            ),
            Side::Short => (
                avg_price * (Decimal::ONE + stop_pct),
                avg_price * (Decimal::ONE - target_pct),
            ),
        };

        Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            quantity,
            entry_price: avg_price,
            opened_at: now,
            stop_price,
            target_price,
            trailing_ref: avg_price,
            status: PositionStatus::Open,
            exit_reason: None,
            close_attempts: 0,
            next_close_attempt_at: None,
        }
    }

    /// Evaluates one `Open`/`Trailing` position against the current price.
    ///
    /// The trailing ratchet runs first, then the (possibly tightened) stop
    /// and the target are checked. Positions in any other state are held:
    /// `Closing` retries are scheduled separately and `Opening`/`Closed`
    /// have nothing to evaluate.
    pub fn on_price(&self, position: &mut Position, price: Decimal) -> CycleAction {
        if !matches!(
            position.status,
            PositionStatus::Open | PositionStatus::Trailing
        ) {
            return CycleAction::Hold;
        }

        let tightened = trailing::update(&self.config, position, price).is_some();

        let stop_hit = match position.side {
            Side::Long => price <= position.stop_price,
            Side::Short => price >= position.stop_price,
        };
        if stop_hit {
            self.begin_close(position, ExitReason::Stop);
            return CycleAction::Exit(ExitReason::Stop);
        }

        let target_hit = match position.side {
            Side::Long => price >= position.target_price,
            Side::Short => price <= position.target_price,
        };
        if target_hit {
            self.begin_close(position, ExitReason::Target);
            return CycleAction::Exit(ExitReason::Target);
        }

        if tightened {
            CycleAction::Tightened
        } else {
            CycleAction::Hold
        }
    }

    /// Moves an active position to `Closing` with the given reason.
    pub fn begin_close(&self, position: &mut Position, reason: ExitReason) {
        position.status = PositionStatus::Closing;
        position.exit_reason = Some(reason);
        tracing::info!(
            symbol = %position.symbol,
            %reason,
            "position entering close"
        );
    }

    /// Forces a close from outside the price path.
    pub fn force_close(&self, position: &mut Position, reason: ForcedReason) {
        if position.is_active() {
            self.begin_close(position, ExitReason::Forced(reason));
        }
    }

    /// Finalizes a confirmed close and materializes the archive record.
    #[must_use]
    pub fn complete_close(&self, position: &mut Position, fill: &FillReport) -> Trade {
        position.status = PositionStatus::Closed;
        Trade::from_close(position, fill.price, fill.commission, fill.timestamp)
    }

    /// Records a failed close submission and schedules the retry.
    ///
    /// Delay doubles per attempt from `backoff_base` up to `backoff_cap`.
    /// Returns true when the attempt count has reached `escalate_after`,
    /// meaning a manual-intervention alert is due; retries continue anyway,
    /// since an un-closed losing position is the worst outcome.
    pub fn on_close_failure(
        &self,
        position: &mut Position,
        now: DateTime<Utc>,
        backoff_base: Duration,
        backoff_cap: Duration,
        escalate_after: u32,
    ) -> bool {
        position.close_attempts += 1;
        let exponent = position.close_attempts.saturating_sub(1).min(16);
        let delay = backoff_base
            .checked_mul(1 << exponent)
            .unwrap_or(backoff_cap)
            .min(backoff_cap);
        let retry_at = now + delay;
        position.next_close_attempt_at = Some(retry_at);

        tracing::warn!(
            symbol = %position.symbol,
            attempts = position.close_attempts,
            %retry_at,
            "close submission failed, retry scheduled"
        );
        position.close_attempts == escalate_after
    }

    /// True when a `Closing` position's retry delay has elapsed.
    #[must_use]
    pub fn close_due(position: &Position, now: DateTime<Utc>) -> bool {
        position.is_closing()
            && position
                .next_close_attempt_at
                .map_or(true, |at| at <= now)
    }
}
