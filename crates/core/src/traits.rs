//! Collaborator interfaces at the edges of the engine.
//!
//! The core owns no network protocol; it is driven through these traits and
//! every optional capability ships with a no-op implementation wired at
//! startup instead of being probed for ad hoc.

use crate::error::GatewayError;
use crate::events::EngineEvent;
use crate::position::{Position, Trade};
use crate::risk_state::RiskState;
use crate::signal::Side;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
}

/// Order submission request.
#[derive(Debug, Clone)]
pub struct OrderTicket {
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub kind: OrderKind,
    /// Reference price: the limit for `Limit` orders, the sizing mark for
    /// `Market` orders (paper gateways fill against it)
    pub price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Confirmed execution from the gateway.
#[derive(Debug, Clone)]
pub struct FillReport {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub price: Decimal,
    pub commission: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// A position as the brokerage reports it, used for reconciliation.
#[derive(Debug, Clone)]
pub struct BrokerPosition {
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub avg_price: Decimal,
}

/// Order placement and account inspection at the brokerage.
#[async_trait]
pub trait ExecutionGateway: Send + Sync {
    /// Submits an opening order.
    async fn open(&self, ticket: &OrderTicket) -> Result<FillReport, GatewayError>;

    /// Submits a closing order for the full position at the given mark.
    async fn close(&self, position: &Position, mark: Decimal) -> Result<FillReport, GatewayError>;

    /// Lists positions the brokerage currently reports as open.
    async fn open_positions(&self) -> Result<Vec<BrokerPosition>, GatewayError>;
}

/// Per-symbol current prices, refreshed once per monitor cycle.
///
/// Stale or missing data for a symbol means the symbol is simply absent
/// from the snapshot, never an error.
#[async_trait]
pub trait MarketDataFeed: Send + Sync {
    async fn snapshot(&self, symbols: &[String]) -> Result<HashMap<String, Decimal>>;
}

/// Outbound event delivery. Implementations must be quick and must swallow
/// their own failures; the engine never waits on delivery outcomes.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &EngineEvent);
}

/// Default sink when no notifier is configured.
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(&self, _event: &EngineEvent) {}
}

/// Durable trade history and restart snapshots.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Appends a closed trade. Must be idempotent per `position_id`.
    async fn append_trade(&self, trade: &Trade) -> Result<()>;

    /// Returns all archived trades, oldest first.
    async fn load_trades(&self) -> Result<Vec<Trade>>;

    /// Inserts or updates an open-position snapshot.
    async fn upsert_position(&self, position: &Position) -> Result<()>;

    /// Removes a position snapshot once the position is closed.
    async fn remove_position(&self, id: Uuid) -> Result<()>;

    /// Loads the open-position snapshots for startup recovery.
    async fn load_open_positions(&self) -> Result<Vec<Position>>;

    /// Persists the account risk state.
    async fn save_risk_state(&self, state: &RiskState) -> Result<()>;

    /// Loads the persisted risk state, if any.
    async fn load_risk_state(&self) -> Result<Option<RiskState>>;
}
