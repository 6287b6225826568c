use crate::syncnode::ManagedNodeError;
use interop_supervisor_storage::StorageError;
use thiserror::Error;

/// Error type for reorg handling
#[derive(Debug, Error)]
pub enum ReorgHandlerError {
    /// Indicates an error occurred while interacting with the managed node.
    #[error(transparent)]
    ManagedNodeError(#[from] ManagedNodeError),

    /// Indicates an error occurred while interacting with the database.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// Indicates an error occurred while interacting with the l1 RPC client.
    #[error("failed to interact with l1 RPC client: {0}")]
    RPCError(String),

    /// No stored L2 block above the activation block was built on canonical L1.
    #[error("no L2 block at or below L1 block {l1_ancestor} is built on canonical L1")]
    RewindTargetPreInterop {
        /// The common L1 ancestor of the reorg.
        l1_ancestor: u64,
    },

    /// The reorg reaches further back than the lookback window.
    #[error("reorg reaches below L2 block {floor}, the lookback limit")]
    ReorgTooDeep {
        /// Lowest L2 block that was searched.
        floor: u64,
    },

    /// The chain processor stopped listening.
    #[error("failed to send event to chain processor: {0}")]
    ChannelSendFailed(String),
}
