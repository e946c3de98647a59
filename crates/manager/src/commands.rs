use rust_decimal::Decimal;
use serde::Serialize;
use stealth_trade_core::{Candidate, ExitReason};
use stealth_trade_risk::{GateRejectReason, RiskRejectReason};
use tokio::sync::oneshot;
use uuid::Uuid;

/// Commands accepted by the trade manager actor.
#[derive(Debug)]
pub enum ManagerCommand {
    /// Run a candidate through the gate and sizing engine, opening on approval
    ProcessSignal(Box<Candidate>, oneshot::Sender<OpenResult>),
    /// Re-evaluate every open position immediately instead of waiting for the tick
    RefreshNow(oneshot::Sender<Vec<PositionUpdate>>),
    /// Manually force a symbol's position into close
    ForceClose {
        symbol: String,
        reply: oneshot::Sender<bool>,
    },
    GetStatus(oneshot::Sender<ManagerStatus>),
    /// Release a reconciliation halt; optionally also clear safe mode
    ClearHalt {
        reset_safe_mode: bool,
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Outcome of `process_signal`.
#[derive(Debug, Clone, Serialize)]
pub enum OpenResult {
    Opened {
        position_id: Uuid,
        symbol: String,
        quantity: u32,
        fill_price: Decimal,
    },
    RejectedByGate {
        reason: GateRejectReason,
    },
    RejectedByRisk {
        reason: RiskRejectReason,
    },
    /// Gateway failure or missing market data; no position was created
    Failed {
        reason: String,
    },
    /// Reconciliation halt active; automatic trading is blocked
    Halted,
}

/// Per-position result of one refresh cycle.
#[derive(Debug, Clone, Serialize)]
pub struct PositionUpdate {
    pub symbol: String,
    pub outcome: PositionOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub enum PositionOutcome {
    /// No transition this cycle
    Held,
    /// Trailing ratchet tightened the stop
    StopTightened { stop: Decimal },
    /// Close confirmed; trade archived
    Closed {
        realized_pnl: Decimal,
        reason: ExitReason,
    },
    /// Close submission failed; retry scheduled
    CloseFailed { attempts: u32 },
    /// No fresh price for the symbol; skipped this cycle
    Skipped,
}

/// Snapshot of the manager's account and control state.
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStatus {
    pub halted: bool,
    pub safe_mode: bool,
    pub equity: Decimal,
    pub cash_available: Decimal,
    pub open_positions: usize,
    pub daily_trades: u32,
}
