//! Account-wide risk accounting.
//!
//! A single [`RiskState`] value is owned by the trade manager and mutated
//! only from its task, which keeps the exposure invariant trivial to audit:
//! `open_exposure + reserved_cash <= equity` at every step.

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Mutable account risk picture refreshed on every sizing decision and close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    /// Account equity (cash + open exposure at cost, net of realized P&L)
    pub equity: Decimal,
    /// Cash free to allocate to new entries
    pub cash_available: Decimal,
    /// Cash optimistically held for in-flight open orders
    pub reserved_cash: Decimal,
    /// Sum of entry cost across open positions
    pub open_exposure: Decimal,
    /// High-water mark used for the drawdown trigger
    pub peak_equity: Decimal,
    /// Account-level losing streak across closed trades
    pub consecutive_losses: u32,
    /// When set, all new entries are rejected
    pub safe_mode: bool,
    /// Entries opened since the last session boundary
    pub daily_trades: u32,
    pub session_date: NaiveDate,
}

impl RiskState {
    /// Creates a fresh state with all capital available as cash.
    #[must_use]
    pub fn new(equity: Decimal, session_date: NaiveDate) -> Self {
        Self {
            equity,
            cash_available: equity,
            reserved_cash: Decimal::ZERO,
            open_exposure: Decimal::ZERO,
            peak_equity: equity,
            consecutive_losses: 0,
            safe_mode: false,
            daily_trades: 0,
            session_date,
        }
    }

    /// Optimistically holds `amount` of cash for an in-flight open order.
    ///
    /// # Errors
    /// Returns an error if `amount` exceeds available cash; callers must size
    /// against `cash_available` first, so hitting this is a logic bug upstream.
    pub fn reserve(&mut self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            anyhow::bail!("reservation must be positive, got {amount}");
        }
        if amount > self.cash_available {
            anyhow::bail!(
                "reservation {amount} exceeds available cash {}",
                self.cash_available
            );
        }
        self.cash_available -= amount;
        self.reserved_cash += amount;
        Ok(())
    }

    /// Rolls back a reservation after a failed or timed-out open order.
    pub fn release(&mut self, amount: Decimal) {
        let amount = amount.min(self.reserved_cash);
        self.reserved_cash -= amount;
        self.cash_available += amount;
    }

    /// Converts a reservation into open exposure once the fill is confirmed.
    ///
    /// The fill may differ from the reserved estimate (slippage); the
    /// difference settles against cash, and the commission is a realized cost.
    pub fn commit_fill(&mut self, reserved: Decimal, cost: Decimal, commission: Decimal) {
        let reserved = reserved.min(self.reserved_cash);
        self.reserved_cash -= reserved;
        self.cash_available += reserved - cost - commission;
        self.open_exposure += cost;
        self.equity -= commission;
        if self.cash_available < Decimal::ZERO {
            tracing::warn!(
                cash = %self.cash_available,
                "fill slippage drove available cash negative"
            );
        }
    }

    /// Settles a confirmed close: releases exposure, realizes P&L, and
    /// updates the losing streak.
    pub fn apply_close(&mut self, entry_cost: Decimal, realized_pnl: Decimal) {
        self.open_exposure -= entry_cost.min(self.open_exposure);
        self.cash_available += entry_cost + realized_pnl;
        self.equity += realized_pnl;
        if self.equity > self.peak_equity {
            self.peak_equity = self.equity;
        }
        if realized_pnl < Decimal::ZERO {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Counts a confirmed entry against the daily ceiling.
    pub fn record_open(&mut self) {
        self.daily_trades += 1;
    }

    /// Books exposure for a position adopted during reconciliation, where
    /// no reservation ever existed (e.g. an out-of-band fill).
    pub fn adopt_exposure(&mut self, entry_cost: Decimal) {
        self.open_exposure += entry_cost;
        self.cash_available -= entry_cost;
        if self.cash_available < Decimal::ZERO {
            tracing::warn!(
                cash = %self.cash_available,
                "adopted exposure drove available cash negative"
            );
        }
    }

    /// Fractional drawdown from the equity high-water mark.
    #[must_use]
    pub fn drawdown(&self) -> Decimal {
        if self.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.peak_equity - self.equity) / self.peak_equity).max(Decimal::ZERO)
    }

    /// Re-evaluates the safe-mode trigger after a close.
    ///
    /// Returns true only on the transition from off to on.
    pub fn evaluate_safe_mode(&mut self, max_drawdown: Decimal, max_losses: u32) -> bool {
        if self.safe_mode {
            return false;
        }
        let tripped = self.drawdown() >= max_drawdown || self.consecutive_losses >= max_losses;
        if tripped {
            self.safe_mode = true;
        }
        tripped
    }

    /// Resets the daily counter when the session date advances.
    ///
    /// Returns true when a boundary was crossed.
    pub fn roll_session(&mut self, today: NaiveDate) -> bool {
        if today == self.session_date {
            return false;
        }
        self.session_date = today;
        self.daily_trades = 0;
        true
    }

    /// Exposure invariant: committed plus reserved capital never exceeds equity.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.open_exposure + self.reserved_cash <= self.equity
    }
}
