pub mod engine;
pub mod gate;
pub mod history;

pub use engine::{RiskEngine, RiskRejectReason, SizingDecision};
pub use gate::{GateCounters, GateDecision, GateRejectReason, SignalGate};
pub use history::PerformanceLedger;
