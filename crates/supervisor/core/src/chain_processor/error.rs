use crate::{logindexer::LogIndexerError, syncnode::ManagedNodeError};
use interop_supervisor_storage::StorageError;
use interop_supervisor_types::SafetyLevel;
use thiserror::Error;

/// Errors that may occur while processing chains in the supervisor core.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainProcessorError {
    /// Represents an error that occurred while interacting with the storage layer.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// Represents an error that occurred while indexing logs.
    #[error(transparent)]
    LogIndexerError(#[from] LogIndexerError),

    /// Represents an error that occurred while talking to the managed node.
    #[error(transparent)]
    ManagedNodeError(#[from] ManagedNodeError),

    /// Represents an error that occurred while sending an event to the channel.
    #[error("failed to send event to channel: {0}")]
    ChannelSendFailed(String),

    /// The incoming head diverges from stored history further back than the lookback window.
    #[error("no common ancestor for block {block_number} at or above block {floor}")]
    IrrecoverableGap {
        /// Number of the incoming head.
        block_number: u64,
        /// Lowest block that was compared.
        floor: u64,
    },

    /// Storage could not be rewound to the reorg target.
    #[error("failed to rewind storage for reorg: {0}")]
    RewindFailed(StorageError),

    /// The reorg handler gave up.
    #[error("reorg failed: {0}")]
    ReorgFailed(String),

    /// A promotion did not extend the head of its level.
    #[error("rejected {level} promotion of block {block_number}")]
    PromotionRejected {
        /// Level of the promotion.
        level: SafetyLevel,
        /// Promoted block number.
        block_number: u64,
    },

    /// The block the node reports as activation block does not match the rollup config.
    #[error("block {0} is not the interop activation block")]
    InvalidActivationBlock(u64),

    /// The activation block is the root of all history and cannot be invalidated.
    #[error("cannot invalidate the interop activation block {0}")]
    ActivationBlockInvalidation(u64),
}

impl ChainProcessorError {
    /// Returns `true` if the error leaves the chain in a state events cannot repair.
    ///
    /// A fatal error moves the processor to `Faulted`; everything else is logged and the next
    /// event is processed.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::IrrecoverableGap { .. } |
            Self::RewindFailed(_) |
            Self::ReorgFailed(_) |
            Self::ChannelSendFailed(_) => true,
            Self::StorageError(err) => matches!(
                err,
                StorageError::Database(_) | StorageError::DatabaseInit(_) | StorageError::LockPoisoned
            ),
            Self::LogIndexerError(_) |
            Self::ManagedNodeError(_) |
            Self::PromotionRejected { .. } |
            Self::InvalidActivationBlock(_) |
            Self::ActivationBlockInvalidation(_) => false,
        }
    }
}
