//! Per-chain processor state.

mod processor;
pub use processor::{MAX_DEFERRED_EVENTS, ProcessorState, Suspension};

mod health;
pub use health::{ProcessorHealth, ProcessorStatus};
