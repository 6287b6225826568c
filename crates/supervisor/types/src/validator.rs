//! Timestamp rules for executing interop messages.

use crate::BlockRef;
use alloy_primitives::ChainId;
use thiserror::Error;

/// Reasons an executing message is rejected on timing grounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InteropValidationError {
    /// Interop is not active on one of the chains at the relevant time.
    #[error("interop not enabled")]
    InteropNotEnabled,

    /// The message is executed before it was initiated.
    #[error(
        "executing timestamp is earlier than initiating timestamp, executing: {executing}, initiating: {initiating}"
    )]
    InvalidTimestampInvariant {
        /// Executing timestamp.
        executing: u64,
        /// Initiating timestamp.
        initiating: u64,
    },

    /// The message expired before the execution deadline.
    #[error("timestamp outside allowed interop window, timestamp: {0}")]
    InvalidInteropTimestamp(u64),
}

/// Validates interop timing against the rollup configuration of every chain.
pub trait InteropValidator: Send + Sync {
    /// Checks that a message initiated on `initiating_chain_id` at `initiating_timestamp` may be
    /// executed on `executing_chain_id` at `executing_timestamp`, and still at
    /// `executing_timestamp + timeout`.
    fn validate_interop_timestamps(
        &self,
        initiating_chain_id: ChainId,
        initiating_timestamp: u64,
        executing_chain_id: ChainId,
        executing_timestamp: u64,
        timeout: Option<u64>,
    ) -> Result<(), InteropValidationError>;

    /// Returns `true` if `timestamp` is strictly after the chain's interop activation block.
    fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool;

    /// Returns `true` if `block` is the chain's interop activation block.
    fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockRef) -> bool;
}
