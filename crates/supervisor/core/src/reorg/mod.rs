//! L1 reorg handling.
//!
//! Each chain has a [`ReorgHandler`] that finds where the chain has to be rewound to after an L1
//! reorg and resets its managed node, in lockstep with the chain processor.
mod task;

mod handler;
pub use handler::ReorgHandler;

mod error;
pub use error::ReorgHandlerError;

mod metrics;
