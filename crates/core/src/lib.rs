pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod position;
pub mod risk_state;
pub mod signal;
pub mod traits;

pub use config::{
    EngineConfig, GateConfig, GatewayPolicy, ManagerSettings, RiskConfig, TrailConfig,
    TrailDistance,
};
pub use config_loader::ConfigLoader;
pub use error::GatewayError;
pub use events::EngineEvent;
pub use position::{ExitReason, ForcedReason, Position, PositionStatus, Trade};
pub use risk_state::RiskState;
pub use signal::{AcceptedSignal, Candidate, QualityTier, Side, SubScores};
pub use traits::{
    BrokerPosition, ExecutionGateway, FillReport, MarketDataFeed, NoopNotifier, NotificationSink,
    OrderKind, OrderTicket, TradeStore,
};
