use interop_supervisor_storage::StorageError;
use thiserror::Error;

/// Errors of the [`L1Watcher`](super::L1Watcher).
#[derive(Debug, Error)]
pub enum L1WatcherError {
    /// The L1 RPC call failed.
    #[error("failed to fetch L1 block {block}: {reason}")]
    Rpc {
        /// The block that was requested.
        block: String,
        /// The transport error.
        reason: String,
    },

    /// Persisting the finalized L1 block failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The L1 node returned blocks that do not link up.
    #[error("L1 block {0} does not link to its parent")]
    Inconsistent(u64),
}
