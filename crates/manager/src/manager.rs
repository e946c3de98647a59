//! Unified trade manager actor.
//!
//! One task owns every position and the account risk state. Candidates
//! arrive as commands; a fixed-interval tick drives position monitoring.
//! Price-driven evaluation fans out across a bounded worker pool, then all
//! results are merged back on the actor task before any shared-state
//! mutation, so no lock is ever held across a network call.

use crate::commands::{ManagerCommand, ManagerStatus, OpenResult, PositionOutcome, PositionUpdate};
use crate::handle::ManagerHandle;
use crate::reconcile;
use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stealth_trade_core::{
    Candidate, EngineConfig, EngineEvent, ExecutionGateway, ForcedReason, GatewayError,
    MarketDataFeed, NotificationSink, OrderKind, OrderTicket, Position, PositionStatus, RiskState,
    TradeStore,
};
use stealth_trade_position::{CycleAction, PositionLifecycle};
use stealth_trade_risk::{GateDecision, PerformanceLedger, RiskEngine, SignalGate, SizingDecision};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

/// External collaborators, injected at construction.
pub struct ManagerDeps {
    pub gateway: Arc<dyn ExecutionGateway>,
    pub feed: Arc<dyn MarketDataFeed>,
    pub store: Arc<dyn TradeStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

pub struct TradeManager {
    config: EngineConfig,
    gate: SignalGate,
    risk_engine: RiskEngine,
    ledger: PerformanceLedger,
    lifecycle: PositionLifecycle,
    positions: HashMap<String, Position>,
    risk: RiskState,
    /// Reconciliation mismatch detected; automatic entries blocked
    halted: bool,

    gateway: Arc<dyn ExecutionGateway>,
    feed: Arc<dyn MarketDataFeed>,
    store: Arc<dyn TradeStore>,
    notifier: Arc<dyn NotificationSink>,

    rx: mpsc::Receiver<ManagerCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
}

impl TradeManager {
    /// Creates a manager in its pre-recovery state.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        deps: ManagerDeps,
        rx: mpsc::Receiver<ManagerCommand>,
        event_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let risk = RiskState::new(config.risk.initial_equity, Utc::now().date_naive());
        Self {
            gate: SignalGate::new(config.gate.clone()),
            risk_engine: RiskEngine::new(config.risk.clone()),
            ledger: PerformanceLedger::new(),
            lifecycle: PositionLifecycle::new(config.trail.clone()),
            positions: HashMap::new(),
            risk,
            halted: false,
            gateway: deps.gateway,
            feed: deps.feed,
            store: deps.store,
            notifier: deps.notifier,
            rx,
            event_tx,
            config,
        }
    }

    /// Spawns a manager onto the runtime and returns its handle.
    #[must_use]
    pub fn spawn(config: EngineConfig, deps: ManagerDeps) -> ManagerHandle {
        let (tx, rx) = mpsc::channel(32);
        let (event_tx, _event_rx) = broadcast::channel(256);
        let manager = Self::new(config, deps, rx, event_tx.clone());

        tokio::spawn(async move {
            if let Err(e) = manager.run().await {
                tracing::error!("trade manager exited with error: {e:#}");
            }
        });

        ManagerHandle::new(tx, event_tx)
    }

    /// Runs recovery, then the command/monitor loop until shutdown.
    ///
    /// Gateway calls are awaited inline on this task, so by the time a
    /// shutdown command is observed no close order is in flight.
    ///
    /// # Errors
    /// Returns an error if startup recovery cannot query the store or the
    /// gateway; once running, failures are handled per cycle.
    pub async fn run(mut self) -> Result<()> {
        self.recover().await?;

        let period = Duration::from_secs(self.config.manager.monitor_interval_secs.max(1));
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.run_cycle().await;
                }
                cmd = self.rx.recv() => {
                    match cmd {
                        None | Some(ManagerCommand::Shutdown) => break,
                        Some(cmd) => self.handle_command(cmd).await,
                    }
                }
            }
        }

        self.persist_snapshot().await;
        tracing::info!("trade manager stopped");
        Ok(())
    }

    /// Loads persisted state and diffs it against the gateway.
    async fn recover(&mut self) -> Result<()> {
        if let Some(state) = self.store.load_risk_state().await? {
            tracing::info!(equity = %state.equity, "restored persisted risk state");
            self.risk = state;
        }
        self.risk.roll_session(Utc::now().date_naive());

        let (managed, report) =
            reconcile::reconcile(self.store.as_ref(), self.gateway.as_ref(), &self.lifecycle)
                .await?;

        for position in managed {
            if report.orphans.contains(&position.symbol) {
                self.risk.adopt_exposure(position.entry_cost());
                if let Err(e) = self.store.upsert_position(&position).await {
                    tracing::error!(symbol = %position.symbol, "persisting adopted position: {e:#}");
                }
            }
            self.positions.insert(position.symbol.clone(), position);
        }

        if !report.is_clean() {
            self.halted = true;
            let detail = format!(
                "persisted positions missing at gateway: {}",
                report.mismatches.join(", ")
            );
            tracing::error!(%detail, "reconciliation mismatch, automatic trading halted");
            self.emit(EngineEvent::ReconciliationHalt {
                detail,
                timestamp: Utc::now(),
            })
            .await;
        } else {
            tracing::info!(
                resumed = report.resumed.len(),
                orphans = report.orphans.len(),
                "reconciliation clean"
            );
        }
        Ok(())
    }

    async fn handle_command(&mut self, cmd: ManagerCommand) {
        match cmd {
            ManagerCommand::ProcessSignal(candidate, reply) => {
                let result = self.process_signal(*candidate).await;
                let _ = reply.send(result);
            }
            ManagerCommand::RefreshNow(reply) => {
                self.roll_session().await;
                let updates = self.fetch_and_refresh().await;
                let _ = reply.send(updates);
            }
            ManagerCommand::ForceClose { symbol, reply } => {
                let found = match self.positions.get_mut(&symbol) {
                    Some(position) if position.is_active() => {
                        self.lifecycle.force_close(position, ForcedReason::Manual);
                        let snapshot = position.clone();
                        if let Err(e) = self.store.upsert_position(&snapshot).await {
                            tracing::error!(%symbol, "persisting forced close: {e:#}");
                        }
                        true
                    }
                    _ => false,
                };
                let _ = reply.send(found);
            }
            ManagerCommand::GetStatus(reply) => {
                let _ = reply.send(self.status());
            }
            ManagerCommand::ClearHalt {
                reset_safe_mode,
                reply,
            } => {
                if self.halted {
                    tracing::info!("reconciliation halt cleared by operator");
                    self.halted = false;
                }
                if reset_safe_mode && self.risk.safe_mode {
                    self.risk.safe_mode = false;
                    self.risk.consecutive_losses = 0;
                    self.emit(EngineEvent::SafeModeChanged {
                        active: false,
                        reason: "manual reset".to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
                }
                let _ = reply.send(());
            }
            // Handled in the run loop before dispatch.
            ManagerCommand::Shutdown => {}
        }
    }

    /// Gate, size, submit, and register a candidate.
    pub async fn process_signal(&mut self, candidate: Candidate) -> OpenResult {
        if self.halted {
            tracing::warn!(symbol = %candidate.symbol, "signal ignored: trading halted");
            return OpenResult::Halted;
        }

        let signal = match self.gate.validate(&candidate) {
            GateDecision::Accepted(signal) => signal,
            GateDecision::Rejected { reason } => {
                self.emit(EngineEvent::SignalRejected {
                    symbol: candidate.symbol.clone(),
                    reason: reason.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
                return OpenResult::RejectedByGate { reason };
            }
        };

        let price = match self.current_price(&signal.symbol).await {
            Some(price) => price,
            None => {
                tracing::warn!(symbol = %signal.symbol, "no market data, entry skipped");
                return OpenResult::Failed {
                    reason: format!("no market data for {}", signal.symbol),
                };
            }
        };

        let symbol_open = self.positions.contains_key(&signal.symbol);
        let sizing = match self.risk_engine.evaluate(
            &signal,
            price,
            &mut self.risk,
            self.positions.len(),
            symbol_open,
            &self.ledger,
        ) {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(symbol = %signal.symbol, "sizing failed: {e:#}");
                return OpenResult::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let (quantity, allocation) = match sizing {
            SizingDecision::Approved {
                quantity,
                allocation,
            } => (quantity, allocation),
            SizingDecision::Rejected { reason } => {
                self.emit(EngineEvent::EntryRejected {
                    symbol: signal.symbol.clone(),
                    reason: reason.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
                return OpenResult::RejectedByRisk { reason };
            }
        };

        let ticket = OrderTicket {
            symbol: signal.symbol.clone(),
            side: signal.side,
            quantity,
            kind: OrderKind::Market,
            price: Some(price),
            timestamp: Utc::now(),
        };

        match self.gateway.open(&ticket).await {
            Ok(fill) => {
                let position = self.lifecycle.open_from_fill(&signal, &fill);
                self.risk
                    .commit_fill(allocation, position.entry_cost(), fill.commission);
                self.risk.record_open();

                if let Err(e) = self.store.upsert_position(&position).await {
                    tracing::error!(symbol = %position.symbol, "persisting new position: {e:#}");
                }
                self.save_risk_state().await;

                self.emit(EngineEvent::PositionOpened {
                    symbol: position.symbol.clone(),
                    side: position.side,
                    quantity: position.quantity,
                    entry_price: position.entry_price,
                    timestamp: Utc::now(),
                })
                .await;
                tracing::info!(
                    symbol = %position.symbol,
                    quantity = position.quantity,
                    entry = %position.entry_price,
                    "position opened"
                );

                let result = OpenResult::Opened {
                    position_id: position.id,
                    symbol: position.symbol.clone(),
                    quantity: position.quantity,
                    fill_price: position.entry_price,
                };
                self.positions.insert(position.symbol.clone(), position);
                result
            }
            Err(error) => {
                // An open that timed out is treated as a rejection; if an
                // out-of-band fill lands anyway, startup reconciliation will
                // adopt the orphan.
                self.risk.release(allocation);
                tracing::warn!(symbol = %signal.symbol, %error, "open failed, reservation rolled back");
                self.emit(EngineEvent::EntryRejected {
                    symbol: signal.symbol.clone(),
                    reason: error.to_string(),
                    timestamp: Utc::now(),
                })
                .await;
                OpenResult::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }

    /// One monitor tick: session roll, snapshot fetch, position refresh.
    async fn run_cycle(&mut self) {
        self.roll_session().await;
        if self.positions.is_empty() {
            return;
        }
        let _ = self.fetch_and_refresh().await;
    }

    async fn fetch_and_refresh(&mut self) -> Vec<PositionUpdate> {
        let symbols: Vec<String> = self.positions.keys().cloned().collect();
        if symbols.is_empty() {
            return Vec::new();
        }
        let snapshot = match self.feed.snapshot(&symbols).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("price snapshot failed, cycle skipped: {e:#}");
                return Vec::new();
            }
        };
        self.refresh_positions(&snapshot).await
    }

    /// Evaluates every open position against the snapshot and applies the
    /// merged results.
    ///
    /// Evaluation has no cross-position dependency: each task works on a
    /// clone and the merged clones replace the originals here, on the actor
    /// task, before any gateway call or risk-state mutation.
    pub async fn refresh_positions(
        &mut self,
        snapshot: &HashMap<String, Decimal>,
    ) -> Vec<PositionUpdate> {
        let mut updates = Vec::new();

        let limit = self.config.manager.max_concurrent_evaluations.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut evaluations: JoinSet<(Position, CycleAction)> = JoinSet::new();

        for position in self.positions.values() {
            if !matches!(
                position.status,
                PositionStatus::Open | PositionStatus::Trailing
            ) {
                continue;
            }
            let Some(&price) = snapshot.get(&position.symbol) else {
                tracing::debug!(symbol = %position.symbol, "no fresh price, skipping this cycle");
                updates.push(PositionUpdate {
                    symbol: position.symbol.clone(),
                    outcome: PositionOutcome::Skipped,
                });
                continue;
            };

            let lifecycle = self.lifecycle.clone();
            let semaphore = Arc::clone(&semaphore);
            let mut position = position.clone();
            evaluations.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let action = lifecycle.on_price(&mut position, price);
                (position, action)
            });
        }

        // Merge: every mutation below happens on this task only.
        let mut merged = Vec::new();
        while let Some(joined) = evaluations.join_next().await {
            match joined {
                Ok(result) => merged.push(result),
                Err(e) => tracing::error!("evaluation task failed: {e}"),
            }
        }

        for (position, action) in merged {
            let symbol = position.symbol.clone();
            self.positions.insert(symbol.clone(), position);
            match action {
                CycleAction::Hold => updates.push(PositionUpdate {
                    symbol,
                    outcome: PositionOutcome::Held,
                }),
                CycleAction::Tightened => {
                    let position = &self.positions[&symbol];
                    let stop = position.stop_price;
                    if let Err(e) = self.store.upsert_position(position).await {
                        tracing::error!(%symbol, "persisting tightened stop: {e:#}");
                    }
                    updates.push(PositionUpdate {
                        symbol,
                        outcome: PositionOutcome::StopTightened { stop },
                    });
                }
                CycleAction::Exit(_) => {
                    // The close itself is submitted below with the rest of
                    // the Closing book, so a retried close and a fresh exit
                    // share one code path.
                    if let Err(e) = self.store.upsert_position(&self.positions[&symbol]).await {
                        tracing::error!(%symbol, "persisting close transition: {e:#}");
                    }
                }
            }
        }

        // Submit every due close: fresh exits and scheduled retries alike.
        let now = Utc::now();
        let due: Vec<String> = self
            .positions
            .values()
            .filter(|p| PositionLifecycle::close_due(p, now))
            .map(|p| p.symbol.clone())
            .collect();

        for symbol in due {
            let Some(&mark) = snapshot.get(&symbol) else {
                tracing::debug!(%symbol, "no fresh price for pending close, deferred");
                updates.push(PositionUpdate {
                    symbol,
                    outcome: PositionOutcome::Skipped,
                });
                continue;
            };
            let outcome = self.submit_close(&symbol, mark).await;
            updates.push(PositionUpdate { symbol, outcome });
        }

        self.save_risk_state().await;
        updates
    }

    /// Submits one close order and settles the result.
    async fn submit_close(&mut self, symbol: &str, mark: Decimal) -> PositionOutcome {
        let Some(position) = self.positions.get(symbol).cloned() else {
            return PositionOutcome::Held;
        };

        match self.gateway.close(&position, mark).await {
            Ok(fill) => {
                let mut position = position;
                let trade = self.lifecycle.complete_close(&mut position, &fill);

                if let Err(e) = self.store.append_trade(&trade).await {
                    tracing::error!(%symbol, "archiving trade: {e:#}");
                }
                if let Err(e) = self.store.remove_position(position.id).await {
                    tracing::error!(%symbol, "removing position snapshot: {e:#}");
                }

                self.risk
                    .apply_close(position.entry_cost(), trade.realized_pnl);
                self.ledger.record_close(&trade.symbol, trade.realized_pnl);
                self.positions.remove(symbol);

                tracing::info!(
                    %symbol,
                    pnl = %trade.realized_pnl,
                    reason = %trade.exit_reason,
                    "position closed"
                );
                self.emit(EngineEvent::PositionClosed {
                    symbol: trade.symbol.clone(),
                    side: trade.side,
                    quantity: trade.quantity,
                    entry_price: trade.entry_price,
                    exit_price: trade.exit_price,
                    realized_pnl: trade.realized_pnl,
                    reason: trade.exit_reason.to_string(),
                    timestamp: Utc::now(),
                })
                .await;

                self.check_safe_mode().await;

                PositionOutcome::Closed {
                    realized_pnl: trade.realized_pnl,
                    reason: trade.exit_reason,
                }
            }
            Err(error) => self.handle_close_failure(position, &error).await,
        }
    }

    async fn handle_close_failure(
        &mut self,
        mut position: Position,
        error: &GatewayError,
    ) -> PositionOutcome {
        let settings = &self.config.manager;
        let backoff_base =
            chrono::Duration::seconds(i64::try_from(settings.close_backoff_base_secs).unwrap_or(30));
        let backoff_cap =
            chrono::Duration::seconds(i64::try_from(settings.close_backoff_cap_secs).unwrap_or(600));
        let escalate = self.lifecycle.on_close_failure(
            &mut position,
            Utc::now(),
            backoff_base,
            backoff_cap,
            settings.max_close_attempts,
        );
        let attempts = position.close_attempts;
        let symbol = position.symbol.clone();

        // A broker rejection needs eyes immediately; transient failures
        // alert only once the retry budget is crossed.
        if escalate || !error.is_retryable() {
            self.emit(EngineEvent::InterventionRequired {
                symbol: symbol.clone(),
                close_attempts: attempts,
                timestamp: Utc::now(),
            })
            .await;
        }

        if let Err(e) = self.store.upsert_position(&position).await {
            tracing::error!(%symbol, "persisting failed close: {e:#}");
        }
        self.positions.insert(symbol, position);

        PositionOutcome::CloseFailed { attempts }
    }

    /// Re-evaluates the safe-mode trigger after a close settles.
    async fn check_safe_mode(&mut self) {
        let max_drawdown =
            Decimal::try_from(self.config.risk.max_drawdown_pct).unwrap_or(Decimal::ONE);
        let newly_active = self
            .risk
            .evaluate_safe_mode(max_drawdown, self.config.risk.max_consecutive_losses);
        if !newly_active {
            return;
        }

        let reason = format!(
            "drawdown {:.2}% with {} consecutive losses",
            self.risk.drawdown() * Decimal::from(100),
            self.risk.consecutive_losses
        );
        tracing::error!(%reason, "safe mode activated, new entries suspended");
        self.emit(EngineEvent::SafeModeChanged {
            active: true,
            reason,
            timestamp: Utc::now(),
        })
        .await;

        if self.config.risk.liquidate_on_safe_mode {
            self.force_close_all(ForcedReason::SafeMode).await;
        }
    }

    /// Marks every active position for close; submissions happen with the
    /// next batch of due closes.
    async fn force_close_all(&mut self, reason: ForcedReason) {
        let symbols: Vec<String> = self
            .positions
            .values()
            .filter(|p| p.is_active())
            .map(|p| p.symbol.clone())
            .collect();
        for symbol in symbols {
            if let Some(position) = self.positions.get_mut(&symbol) {
                self.lifecycle.force_close(position, reason);
                let snapshot = position.clone();
                if let Err(e) = self.store.upsert_position(&snapshot).await {
                    tracing::error!(%symbol, "persisting forced close: {e:#}");
                }
            }
        }
    }

    /// Resets daily counters at the session boundary and runs the optional
    /// end-of-session sweep.
    async fn roll_session(&mut self) {
        let today = Utc::now().date_naive();
        if !self.risk.roll_session(today) {
            return;
        }
        tracing::info!(%today, "session boundary crossed, daily trade counter reset");
        if self.config.manager.close_at_session_end {
            self.force_close_all(ForcedReason::SessionEnd).await;
        }
        self.save_risk_state().await;
    }

    async fn current_price(&self, symbol: &str) -> Option<Decimal> {
        let symbols = [symbol.to_string()];
        match self.feed.snapshot(&symbols).await {
            Ok(snapshot) => snapshot.get(symbol).copied(),
            Err(e) => {
                tracing::warn!(%symbol, "price lookup failed: {e:#}");
                None
            }
        }
    }

    fn status(&self) -> ManagerStatus {
        ManagerStatus {
            halted: self.halted,
            safe_mode: self.risk.safe_mode,
            equity: self.risk.equity,
            cash_available: self.risk.cash_available,
            open_positions: self.positions.len(),
            daily_trades: self.risk.daily_trades,
        }
    }

    async fn save_risk_state(&self) {
        if !self.risk.invariant_holds() {
            tracing::error!(
                exposure = %self.risk.open_exposure,
                reserved = %self.risk.reserved_cash,
                equity = %self.risk.equity,
                "exposure invariant violated"
            );
        }
        if let Err(e) = self.store.save_risk_state(&self.risk).await {
            tracing::error!("persisting risk state: {e:#}");
        }
    }

    async fn persist_snapshot(&self) {
        for position in self.positions.values() {
            if let Err(e) = self.store.upsert_position(position).await {
                tracing::error!(symbol = %position.symbol, "persisting position at shutdown: {e:#}");
            }
        }
        self.save_risk_state().await;
    }

    async fn emit(&self, event: EngineEvent) {
        // The sink swallows its own failures; the broadcast has no
        // delivery guarantee. Neither may block trading.
        self.notifier.notify(&event).await;
        let _ = self.event_tx.send(event);
    }
}
