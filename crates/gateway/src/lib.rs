pub mod paper;
pub mod retry;

pub use paper::PaperGateway;
pub use retry::{RetryPolicy, RetryingGateway};
