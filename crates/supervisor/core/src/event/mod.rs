//! Events consumed by the per-chain [`ChainProcessor`](crate::chain_processor::ChainProcessor)
//! and the requests it hands to its reorg handler.

mod chain;
pub use chain::ChainEvent;

mod reorg;
pub use reorg::ReorgRequest;
