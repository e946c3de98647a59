//! Startup reconciliation between persisted state and the gateway.
//!
//! Restarting must resume managing already-open positions without
//! re-opening them, adopt out-of-band fills the engine never saw, and halt
//! automatic trading when the persisted book disagrees with the brokerage.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use stealth_trade_core::{BrokerPosition, ExecutionGateway, Position, TradeStore};
use stealth_trade_position::PositionLifecycle;

/// What reconciliation found.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Persisted positions the gateway confirms; resumed as-is
    pub resumed: Vec<String>,
    /// Gateway positions with no persisted snapshot; adopted fresh
    pub orphans: Vec<String>,
    /// Persisted positions the gateway disowns; trading halts until resolved
    pub mismatches: Vec<String>,
}

impl ReconcileReport {
    /// True when the persisted book and the gateway agree.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Diffs the persisted open positions against the gateway's report.
///
/// Returns the positions to manage (resumed + orphans) and the report.
/// Mismatched positions are *not* returned; they stay in the store for
/// manual resolution.
///
/// # Errors
/// Returns an error if the store or the gateway cannot be queried.
pub async fn reconcile(
    store: &dyn TradeStore,
    gateway: &dyn ExecutionGateway,
    lifecycle: &PositionLifecycle,
) -> Result<(Vec<Position>, ReconcileReport)> {
    let persisted = store
        .load_open_positions()
        .await
        .context("loading persisted positions")?;
    let broker = gateway
        .open_positions()
        .await
        .map_err(|e| anyhow::anyhow!("querying gateway positions: {e}"))?;

    let broker_by_symbol: HashMap<String, BrokerPosition> = broker
        .into_iter()
        .map(|p| (p.symbol.clone(), p))
        .collect();

    let mut report = ReconcileReport::default();
    let mut managed = Vec::new();
    let mut persisted_symbols = HashSet::new();

    for position in persisted {
        persisted_symbols.insert(position.symbol.clone());
        if broker_by_symbol.contains_key(&position.symbol) {
            report.resumed.push(position.symbol.clone());
            managed.push(position);
        } else {
            tracing::error!(
                symbol = %position.symbol,
                id = %position.id,
                "persisted position not reported by gateway"
            );
            report.mismatches.push(position.symbol.clone());
        }
    }

    let now = Utc::now();
    for (symbol, broker_position) in broker_by_symbol {
        if persisted_symbols.contains(&symbol) {
            continue;
        }
        tracing::warn!(
            symbol = %symbol,
            quantity = broker_position.quantity,
            avg_price = %broker_position.avg_price,
            "adopting gateway position with no persisted snapshot"
        );
        report.orphans.push(symbol.clone());
        managed.push(lifecycle.adopt_external(
            &symbol,
            broker_position.side,
            broker_position.quantity,
            broker_position.avg_price,
            now,
        ));
    }

    Ok((managed, report))
}
