//! Risk-gated position sizing.
//!
//! Turns an accepted signal into an approved share quantity under the
//! account limits, or rejects it with a reason. On approval the entry cost
//! is optimistically reserved in the [`RiskState`]; the trade manager
//! reconciles the reservation on fill confirmation or rolls it back on
//! gateway failure.

use crate::history::PerformanceLedger;
use anyhow::Result;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stealth_trade_core::{AcceptedSignal, QualityTier, RiskConfig, RiskState};

/// Outcome of a sizing evaluation.
#[derive(Debug, Clone)]
pub enum SizingDecision {
    Approved {
        /// Integer share quantity to submit
        quantity: u32,
        /// Entry cost reserved against cash
        allocation: Decimal,
    },
    Rejected {
        reason: RiskRejectReason,
    },
}

/// Why the risk engine refused an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskRejectReason {
    SafeModeActive,
    DailyTradeCapReached,
    PositionCapReached,
    SymbolAlreadyOpen,
    SymbolSuspended,
    AllocationRoundsToZero,
}

impl std::fmt::Display for RiskRejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SafeModeActive => write!(f, "safe mode active, new entries suspended"),
            Self::DailyTradeCapReached => write!(f, "daily trade ceiling reached"),
            Self::PositionCapReached => write!(f, "open position cap reached"),
            Self::SymbolAlreadyOpen => write!(f, "symbol already has an open position"),
            Self::SymbolSuspended => write!(f, "symbol suspended after sustained losses"),
            Self::AllocationRoundsToZero => write!(f, "allocation rounds to zero shares"),
        }
    }
}

/// Sizes approved entries under the configured account limits.
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    #[must_use]
    pub const fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Evaluates an accepted signal against the account's risk state.
    ///
    /// Checks run in a fixed order: safe mode, daily cap, position cap,
    /// symbol ownership isolation, symbol suspension, then sizing. On
    /// approval the entry cost has been reserved in `risk`.
    ///
    /// # Errors
    /// Returns an error only if the internal reservation fails, which would
    /// indicate an accounting bug rather than an expected rejection.
    pub fn evaluate(
        &self,
        signal: &AcceptedSignal,
        entry_price: Decimal,
        risk: &mut RiskState,
        open_positions: usize,
        symbol_open: bool,
        ledger: &PerformanceLedger,
    ) -> Result<SizingDecision> {
        if risk.safe_mode {
            return Ok(rejected(RiskRejectReason::SafeModeActive));
        }
        if risk.daily_trades >= self.config.max_daily_trades {
            return Ok(rejected(RiskRejectReason::DailyTradeCapReached));
        }
        if open_positions >= self.config.max_open_positions {
            return Ok(rejected(RiskRejectReason::PositionCapReached));
        }
        // Ownership isolation: this engine only manages positions it opened.
        if symbol_open {
            return Ok(rejected(RiskRejectReason::SymbolAlreadyOpen));
        }
        if ledger.is_suspended(&signal.symbol, self.config.symbol_loss_cap) {
            return Ok(rejected(RiskRejectReason::SymbolSuspended));
        }

        let quantity = self.size(signal, entry_price, risk, ledger)?;
        if quantity == 0 {
            return Ok(rejected(RiskRejectReason::AllocationRoundsToZero));
        }

        let allocation = entry_price * Decimal::from(quantity);
        risk.reserve(allocation)?;

        tracing::debug!(
            symbol = %signal.symbol,
            quantity,
            %allocation,
            tier = ?signal.tier,
            "entry approved and cash reserved"
        );
        Ok(SizingDecision::Approved {
            quantity,
            allocation,
        })
    }

    /// Base fraction of cash, scaled by tier and history, clamped to the
    /// per-trade cap and to available cash, converted to whole shares.
    fn size(
        &self,
        signal: &AcceptedSignal,
        entry_price: Decimal,
        risk: &RiskState,
        ledger: &PerformanceLedger,
    ) -> Result<u32> {
        if entry_price <= Decimal::ZERO {
            anyhow::bail!("entry price must be positive, got {entry_price}");
        }

        let base_pct = Decimal::try_from(self.config.base_allocation_pct)?;
        let tier_mult = Decimal::try_from(self.tier_multiplier(signal.tier))?;
        let perf_mult = Decimal::try_from(ledger.adjustment_factor(&signal.symbol))?;

        let scaled = risk.cash_available * base_pct * tier_mult * perf_mult;

        let per_trade_cap = risk.equity * Decimal::try_from(self.config.max_per_trade_pct)?;
        let allocation = scaled.min(per_trade_cap).min(risk.cash_available);

        let quantity = (allocation / entry_price).floor();
        Ok(quantity.to_u32().unwrap_or(0))
    }

    const fn tier_multiplier(&self, tier: QualityTier) -> f64 {
        match tier {
            QualityTier::Scout => self.config.scout_multiplier,
            QualityTier::Standard => self.config.standard_multiplier,
            QualityTier::Prime => self.config.prime_multiplier,
        }
    }
}

const fn rejected(reason: RiskRejectReason) -> SizingDecision {
    SizingDecision::Rejected { reason }
}


#[cfg(test)]
mod safe_mode_properties {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use stealth_trade_core::Side;

    proptest! {
        /// Safe mode implies zero approvals, for arbitrary high-confidence
        /// signals, tiers, prices, and account balances.
        #[test]
        fn safe_mode_rejects_everything(
            confidence in 0.85f64..1.0,
            price_cents in 100u32..100_000,
            equity_dollars in 1_000u32..1_000_000,
            tier_idx in 0usize..3,
        ) {
            let tier = [QualityTier::Scout, QualityTier::Standard, QualityTier::Prime][tier_idx];
            let engine = RiskEngine::new(RiskConfig::default());
            let mut risk = RiskState::new(
                Decimal::from(equity_dollars),
                NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            );
            risk.safe_mode = true;

            let signal = AcceptedSignal {
                symbol: "ANY".to_string(),
                side: Side::Long,
                confidence,
                tier,
                expected_return: 0.05,
                suggested_stop: None,
                suggested_target: None,
                timestamp: Utc::now(),
            };

            let decision = engine
                .evaluate(
                    &signal,
                    Decimal::from(price_cents) / dec!(100),
                    &mut risk,
                    0,
                    false,
                    &PerformanceLedger::new(),
                )
                .unwrap();

            let is_safe_mode_rejection = matches!(
                decision,
                SizingDecision::Rejected { reason: RiskRejectReason::SafeModeActive }
            );
            prop_assert!(is_safe_mode_rejection);
            prop_assert_eq!(risk.reserved_cash, Decimal::ZERO);
        }

        /// Whenever an entry is approved, its cost respects the per-trade cap
        /// and the cash on hand at approval time.
        #[test]
        fn approvals_respect_caps(
            price_cents in 100u32..50_000,
            equity_dollars in 500u32..100_000,
        ) {
            let engine = RiskEngine::new(RiskConfig::default());
            let equity = Decimal::from(equity_dollars);
            let mut risk = RiskState::new(
                equity,
                NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            );
            let cash_before = risk.cash_available;

            let signal = AcceptedSignal {
                symbol: "ANY".to_string(),
                side: Side::Long,
                confidence: 0.9,
                tier: QualityTier::Prime,
                expected_return: 0.05,
                suggested_stop: None,
                suggested_target: None,
                timestamp: Utc::now(),
            };

            let decision = engine
                .evaluate(
                    &signal,
                    Decimal::from(price_cents) / dec!(100),
                    &mut risk,
                    0,
                    false,
                    &PerformanceLedger::new(),
                )
                .unwrap();

            if let SizingDecision::Approved { quantity, allocation } = decision {
                let cost = Decimal::from(price_cents) / dec!(100) * Decimal::from(quantity);
                prop_assert_eq!(cost, allocation);
                prop_assert!(cost <= equity * dec!(0.20));
                prop_assert!(cost <= cash_before);
                prop_assert!(risk.invariant_holds());
            }
        }
    }
}
