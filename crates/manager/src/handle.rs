use crate::commands::{ManagerCommand, ManagerStatus, OpenResult, PositionUpdate};
use anyhow::Result;
use stealth_trade_core::{Candidate, EngineEvent};
use tokio::sync::{broadcast, mpsc, oneshot};

/// Cloneable handle to a running trade manager.
#[derive(Clone)]
pub struct ManagerHandle {
    tx: mpsc::Sender<ManagerCommand>,
    events: broadcast::Sender<EngineEvent>,
}

impl ManagerHandle {
    #[must_use]
    pub const fn new(
        tx: mpsc::Sender<ManagerCommand>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self { tx, events }
    }

    /// Pipes a candidate through the gate and sizing engine.
    ///
    /// # Errors
    /// Returns an error if the manager task is gone.
    pub async fn process_signal(&self, candidate: Candidate) -> Result<OpenResult> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ManagerCommand::ProcessSignal(Box::new(candidate), reply))
            .await?;
        Ok(rx.await?)
    }

    /// Triggers an immediate refresh cycle and returns its per-position results.
    ///
    /// # Errors
    /// Returns an error if the manager task is gone.
    pub async fn refresh_now(&self) -> Result<Vec<PositionUpdate>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ManagerCommand::RefreshNow(reply)).await?;
        Ok(rx.await?)
    }

    /// Forces the symbol's position into close on the next cycle.
    ///
    /// Returns false when no open position exists for the symbol.
    ///
    /// # Errors
    /// Returns an error if the manager task is gone.
    pub async fn force_close(&self, symbol: impl Into<String>) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ManagerCommand::ForceClose {
                symbol: symbol.into(),
                reply,
            })
            .await?;
        Ok(rx.await?)
    }

    /// Fetches the current account and control state.
    ///
    /// # Errors
    /// Returns an error if the manager task is gone.
    pub async fn status(&self) -> Result<ManagerStatus> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ManagerCommand::GetStatus(reply)).await?;
        Ok(rx.await?)
    }

    /// Releases a reconciliation halt after manual resolution.
    ///
    /// # Errors
    /// Returns an error if the manager task is gone.
    pub async fn clear_halt(&self, reset_safe_mode: bool) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ManagerCommand::ClearHalt {
                reset_safe_mode,
                reply,
            })
            .await?;
        rx.await?;
        Ok(())
    }

    /// Stops the manager after any in-flight work finishes.
    ///
    /// # Errors
    /// Returns an error if the manager task is already gone.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(ManagerCommand::Shutdown).await?;
        Ok(())
    }

    /// Subscribes to the engine event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}
