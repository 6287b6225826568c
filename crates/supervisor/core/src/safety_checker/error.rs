use alloy_primitives::{B256, ChainId};
use interop_supervisor_storage::StorageError;
use interop_supervisor_types::{BlockRef, InteropValidationError};
use thiserror::Error;

/// Why a candidate block could not be promoted on this tick.
#[derive(Debug, Error)]
pub enum CrossSafetyError {
    /// Reading a chain database failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The block that a message depends on does not meet the required safety level yet.
    ///
    /// The check is retried on the next tick.
    #[error(
        "dependency on block {block_number} (chain {chain_id}) does not meet required safety level"
    )]
    DependencyNotSafe {
        /// Chain of the dependency.
        chain_id: ChainId,
        /// Block holding the initiating message.
        block_number: u64,
    },

    /// The lower level has nothing above the target head.
    #[error("no candidate block found to promote")]
    NoBlockToPromote,

    /// The candidate can never be promoted.
    #[error(transparent)]
    ValidationError(#[from] ValidationError),
}

/// A candidate block carries a message that can never become valid, so the block has to be
/// invalidated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Message timing breaks the interop rules of the dependency set.
    #[error(transparent)]
    InteropValidationError(#[from] InteropValidationError),

    /// The message references a chain outside the dependency set.
    #[error("message references unknown chain {0}")]
    UnknownChain(ChainId),

    /// The initiating log exists but its hash differs.
    #[error(
        "executing message hash {message_hash} does not match original log hash {original_hash}"
    )]
    InvalidMessageHash {
        /// Hash claimed by the executing message.
        message_hash: B256,
        /// Hash of the stored log.
        original_hash: B256,
    },

    /// The message's timestamp differs from its initiating block's.
    #[error(
        "executing message timestamp {actual_timestamp} does not match initiating block timestamp {expected_timestamp}"
    )]
    TimestampInvariantViolation {
        /// Initiating block timestamp.
        expected_timestamp: u64,
        /// Timestamp claimed by the message.
        actual_timestamp: u64,
    },

    /// No log exists at the referenced position, although the block is known.
    #[error("no initiating log at the referenced position")]
    InitiatingMessageNotFound,

    /// A message executed in the same block it was initiated in must come after it.
    #[error("log {executing} executes log {initiating} of the same block, which is not before it")]
    InvalidLogOrder {
        /// Index of the executing log.
        executing: u32,
        /// Index of the initiating log.
        initiating: u32,
    },

    /// Messages of the same timestamp depend on each other in a loop.
    #[error("block {block} is part of a dependency cycle")]
    CyclicDependency {
        /// The candidate block.
        block: BlockRef,
    },
}
