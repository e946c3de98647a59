//! In-memory trade store for tests and dry runs.
//!
//! Keeps the same contract as the `SQLite` store, including idempotent
//! trade appends keyed by position id.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use stealth_trade_core::{Position, RiskState, Trade, TradeStore};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    trades: Vec<Trade>,
    positions: HashMap<Uuid, Position>,
    risk: Option<RiskState>,
}

#[derive(Default)]
pub struct InMemoryTradeStore {
    inner: Mutex<Inner>,
}

impl InMemoryTradeStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn append_trade(&self, trade: &Trade) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner
            .trades
            .iter()
            .any(|t| t.position_id == trade.position_id)
        {
            return Ok(());
        }
        inner.trades.push(trade.clone());
        Ok(())
    }

    async fn load_trades(&self) -> Result<Vec<Trade>> {
        Ok(self.inner.lock().await.trades.clone())
    }

    async fn upsert_position(&self, position: &Position) -> Result<()> {
        self.inner
            .lock()
            .await
            .positions
            .insert(position.id, position.clone());
        Ok(())
    }

    async fn remove_position(&self, id: Uuid) -> Result<()> {
        self.inner.lock().await.positions.remove(&id);
        Ok(())
    }

    async fn load_open_positions(&self) -> Result<Vec<Position>> {
        Ok(self.inner.lock().await.positions.values().cloned().collect())
    }

    async fn save_risk_state(&self, state: &RiskState) -> Result<()> {
        self.inner.lock().await.risk = Some(state.clone());
        Ok(())
    }

    async fn load_risk_state(&self) -> Result<Option<RiskState>> {
        Ok(self.inner.lock().await.risk.clone())
    }
}
