//! Chain Processor Module
//! This module implements the Chain Processor, which owns all writes to one chain's storage.
//! It consumes the chain's events one at a time, keeps log and derivation storage in step with
//! the managed node, and drives the chain's side of L1 reorg handling and recovery.
mod error;
pub use error::ChainProcessorError;

mod chain;
pub use chain::{ChainProcessor, ChainProcessorConfig};

mod metrics;
pub(crate) use metrics::Metrics;

mod state;
pub use state::{
    MAX_DEFERRED_EVENTS, ProcessorHealth, ProcessorState, ProcessorStatus, Suspension,
};

pub mod handlers;
