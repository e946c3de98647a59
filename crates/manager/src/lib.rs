pub mod commands;
pub mod handle;
pub mod manager;
pub mod reconcile;

pub use commands::{
    ManagerCommand, ManagerStatus, OpenResult, PositionOutcome, PositionUpdate,
};
pub use handle::ManagerHandle;
pub use manager::{ManagerDeps, TradeManager};
pub use reconcile::ReconcileReport;
