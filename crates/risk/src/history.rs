//! Per-symbol performance ledger feeding the sizing adjustment.
//!
//! Symbols on a sustained losing streak get penalized and ultimately
//! suspended; symbols with a proven record earn a bounded boost. The
//! adjustment factor is hard-clamped to [0.6, 1.3] so no history can push
//! an allocation past the per-trade cap enforced downstream.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MIN_FACTOR: f64 = 0.6;
const MAX_FACTOR: f64 = 1.3;
const STREAK_PENALTY_STEP: f64 = 0.05;
const HOT_SAMPLE_FLOOR: u32 = 10;
const HOT_WIN_RATE: f64 = 0.55;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SymbolRecord {
    wins: u32,
    losses: u32,
    consecutive_losses: u32,
    net_pnl: Decimal,
}

impl SymbolRecord {
    fn samples(&self) -> u32 {
        self.wins + self.losses
    }

    fn win_rate(&self) -> f64 {
        let total = self.samples();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.wins) / f64::from(total)
    }
}

/// Session-scoped win/loss history per symbol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceLedger {
    records: HashMap<String, SymbolRecord>,
}

impl PerformanceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a closed trade's result for its symbol.
    pub fn record_close(&mut self, symbol: &str, realized_pnl: Decimal) {
        let record = self.records.entry(symbol.to_string()).or_default();
        record.net_pnl += realized_pnl;
        if realized_pnl < Decimal::ZERO {
            record.losses += 1;
            record.consecutive_losses += 1;
        } else {
            record.wins += 1;
            record.consecutive_losses = 0;
        }
    }

    /// True once the symbol's losing streak reached `loss_cap`.
    #[must_use]
    pub fn is_suspended(&self, symbol: &str, loss_cap: u32) -> bool {
        self.records
            .get(symbol)
            .is_some_and(|r| r.consecutive_losses >= loss_cap)
    }

    /// Current losing streak for a symbol.
    #[must_use]
    pub fn consecutive_losses(&self, symbol: &str) -> u32 {
        self.records
            .get(symbol)
            .map_or(0, |r| r.consecutive_losses)
    }

    /// Sizing adjustment in [0.6, 1.3].
    ///
    /// Streak penalty: 0.05 per consecutive loss, floored. Hot boost:
    /// requires at least 10 samples, a win rate above 55%, and positive net
    /// P&L; the boost is the win-rate excess, capped at +0.3.
    #[must_use]
    pub fn adjustment_factor(&self, symbol: &str) -> f64 {
        let Some(record) = self.records.get(symbol) else {
            return 1.0;
        };

        if record.consecutive_losses > 0 {
            let factor = STREAK_PENALTY_STEP.mul_add(-f64::from(record.consecutive_losses), 1.0);
            return factor.max(MIN_FACTOR);
        }

        if record.samples() >= HOT_SAMPLE_FLOOR
            && record.win_rate() > HOT_WIN_RATE
            && record.net_pnl > Decimal::ZERO
        {
            let boost = (record.win_rate() - HOT_WIN_RATE).min(MAX_FACTOR - 1.0);
            return 1.0 + boost;
        }

        1.0
    }
}
