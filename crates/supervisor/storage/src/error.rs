use alloy_eips::BlockNumHash;
use reth_db::DatabaseError;
use thiserror::Error;

/// Errors returned by the chain database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// MDBX error.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// The environment could not be opened.
    #[error(transparent)]
    DatabaseInit(#[from] eyre::Report),

    /// A lock guarding in-memory state was poisoned.
    #[error("lock poisoned")]
    LockPoisoned,

    /// The requested entry does not exist.
    #[error(transparent)]
    EntryNotFound(#[from] EntryNotFoundError),

    /// The requested data is ahead of what has been stored so far.
    #[error("data not yet available")]
    FutureData,

    /// Nothing has been stored for the chain yet.
    #[error("database not initialised")]
    DatabaseNotInitialised,

    /// The incoming data contradicts what is stored.
    #[error("conflicting data")]
    ConflictError,

    /// The incoming block does not extend the latest stored one.
    #[error("latest stored block is not parent of the incoming block")]
    BlockOutOfOrder,

    /// A derived block disagrees with the stored unsafe block at the same height.
    #[error("reorg required due to inconsistent storage state")]
    ReorgRequired,

    /// The incoming block's L1 origin is older than its parent's.
    #[error("l1 origin {incoming} of incoming block is behind parent l1 origin {parent}")]
    L1OriginRegression {
        /// L1 origin number of the incoming block.
        incoming: u64,
        /// L1 origin number of the latest stored block.
        parent: u64,
    },
}

impl PartialEq for StorageError {
    fn eq(&self, other: &Self) -> bool {
        use StorageError::*;
        match (self, other) {
            (Database(a), Database(b)) => a == b,
            (DatabaseInit(a), DatabaseInit(b)) => a.to_string() == b.to_string(),
            (EntryNotFound(a), EntryNotFound(b)) => a == b,
            (
                L1OriginRegression { incoming: a, parent: b },
                L1OriginRegression { incoming: c, parent: d },
            ) => a == c && b == d,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

impl Eq for StorageError {}

/// A lookup that found nothing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryNotFoundError {
    /// No L2 block was derived at or before the given source block.
    #[error("no derived blocks for source block, number: {}, hash: {}", .0.number, .0.hash)]
    MissingDerivedBlocks(BlockNumHash),

    /// No source block with that number.
    #[error("source block not found, number: {0}")]
    SourceBlockNotFound(u64),

    /// No derived block with that number.
    #[error("derived block not found, number: {0}")]
    DerivedBlockNotFound(u64),

    /// No L2 block with that number.
    #[error("block not found, number: {0}")]
    BlockNotFound(u64),

    /// No L1 block with that number.
    #[error("l1 block not found, number: {0}")]
    L1BlockNotFound(u64),

    /// No log at that position.
    #[error("log not found at block {block_number} index {log_index}")]
    LogNotFound {
        /// Block number.
        block_number: u64,
        /// Log index within the block.
        log_index: u32,
    },
}
