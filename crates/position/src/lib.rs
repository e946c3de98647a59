pub mod lifecycle;
pub mod trailing;

pub use lifecycle::{CycleAction, PositionLifecycle};
pub use trailing::resolve_distance;
