//! Storage capabilities consumed by the rest of the supervisor.
//!
//! The chain processor is the only writer of a chain's database. Everything else reads through
//! the reader traits or through [`CrossChainSafetyProvider`], which spans all chains.

use crate::StorageError;
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use interop_supervisor_types::{BlockRef, DerivedRefPair, L2BlockRef, Log, SafetyLevel, SuperHead};
use std::fmt::Debug;

/// Read access to derivation records.
pub trait DerivationStorageReader: Debug {
    /// Returns the L1 block the given L2 block was derived from.
    fn derived_to_source(&self, derived: BlockNumHash) -> Result<BlockRef, StorageError>;

    /// Returns the latest L2 block derived from `source` or any L1 block before it.
    ///
    /// Fails with [`StorageError::FutureData`] if derivation has not reached `source`.
    fn latest_derived_block_at_source(&self, source: BlockNumHash)
    -> Result<BlockRef, StorageError>;

    /// Returns the latest source block together with the latest derived block.
    fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;

    /// Returns the source block with the given number.
    fn get_source_block(&self, number: u64) -> Result<BlockRef, StorageError>;

    /// Returns the first derived block, the interop activation block.
    fn get_activation_block(&self) -> Result<BlockRef, StorageError>;
}

/// Write access to derivation records.
pub trait DerivationStorageWriter: Debug {
    /// Seeds derivation storage with the activation pair. The activation block must already be in
    /// block storage.
    fn initialise_derivation_storage(&self, activation: DerivedRefPair)
    -> Result<(), StorageError>;

    /// Records a derived block and raises the local-safe head.
    ///
    /// Fails with [`StorageError::FutureData`] if the block is not in block storage yet, and with
    /// [`StorageError::ReorgRequired`] if block storage holds a different block at that height.
    fn save_derived_block(&self, pair: DerivedRefPair) -> Result<(), StorageError>;

    /// Records an L1 block that derivation moved to.
    fn save_source_block(&self, source: BlockRef) -> Result<(), StorageError>;
}

/// Combined derivation storage.
pub trait DerivationStorage: DerivationStorageReader + DerivationStorageWriter {}

impl<T: DerivationStorageReader + DerivationStorageWriter> DerivationStorage for T {}

/// Read access to L2 blocks and their logs.
pub trait LogStorageReader: Debug {
    /// Returns the latest stored block, the local-unsafe head.
    fn get_latest_block(&self) -> Result<L2BlockRef, StorageError>;

    /// Returns the block with the given number.
    fn get_block(&self, number: u64) -> Result<L2BlockRef, StorageError>;

    /// Returns a single log.
    fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError>;

    /// Returns all logs of a block, ordered by index.
    fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError>;
}

/// Write access to L2 blocks and their logs.
pub trait LogStorageWriter: Send + Sync + Debug {
    /// Seeds block storage with the activation block and points both unsafe heads at it.
    fn initialise_log_storage(&self, activation: L2BlockRef) -> Result<(), StorageError>;

    /// Appends a block on top of the local-unsafe head.
    fn store_block_logs(&self, block: &L2BlockRef, logs: Vec<Log>) -> Result<(), StorageError>;
}

/// Combined block and log storage.
pub trait LogStorage: LogStorageReader + LogStorageWriter {}

impl<T: LogStorageReader + LogStorageWriter> LogStorage for T {}

/// Read access to safety heads.
pub trait HeadRefStorageReader: Debug {
    /// Returns the head at `level`, or [`StorageError::FutureData`] if it was never set.
    fn get_safety_head_ref(&self, level: SafetyLevel) -> Result<BlockRef, StorageError>;

    /// Returns every head and the latest derivation source.
    fn get_super_head(&self) -> Result<SuperHead, StorageError>;
}

/// Write access to safety heads.
pub trait HeadRefStorageWriter: Debug {
    /// Moves the finalized head to the latest block derived from `finalized_l1` or earlier, capped
    /// by the cross-safe head. Returns the finalized head.
    fn update_finalized_using_source(&self, finalized_l1: BlockRef)
    -> Result<BlockRef, StorageError>;

    /// Promotes `block` to cross-unsafe. It must directly extend the current cross-unsafe head.
    fn update_current_cross_unsafe(&self, block: &BlockRef) -> Result<(), StorageError>;

    /// Promotes `block` to cross-safe. It must directly extend the current cross-safe head and
    /// not be above the local-safe head. Returns the promoted pair.
    fn update_current_cross_safe(&self, block: &BlockRef) -> Result<DerivedRefPair, StorageError>;
}

/// Combined safety head storage.
pub trait HeadRefStorage: HeadRefStorageReader + HeadRefStorageWriter {}

impl<T: HeadRefStorageReader + HeadRefStorageWriter> HeadRefStorage for T {}

/// L1 blocks seen by the L1 watcher.
pub trait L1BlockStorage: Debug {
    /// Records an L1 block, replacing a different block at the same height and everything above.
    fn save_l1_block(&self, block: BlockRef) -> Result<(), StorageError>;

    /// Returns the recorded L1 block with the given number.
    fn get_l1_block(&self, number: u64) -> Result<BlockRef, StorageError>;

    /// Drops recorded L1 blocks below `number`.
    fn prune_l1_blocks_below(&self, number: u64) -> Result<(), StorageError>;
}

/// Finalized L1 block shared by all chains.
pub trait FinalizedL1Storage {
    /// Moves the finalized L1 block forward.
    fn update_finalized_l1(&self, block: BlockRef) -> Result<(), StorageError>;

    /// Returns the finalized L1 block, or [`StorageError::FutureData`] if none was seen yet.
    fn get_finalized_l1(&self) -> Result<BlockRef, StorageError>;
}

/// Read-only view over the databases of all chains, used for cross-chain validation.
///
/// Each call reads a consistent snapshot of one chain. Promotions are never written through this
/// view.
#[auto_impl::auto_impl(&, Arc)]
pub trait CrossChainSafetyProvider {
    /// Returns a block of the given chain.
    fn get_block(&self, chain_id: ChainId, block_number: u64) -> Result<BlockRef, StorageError>;

    /// Returns a single log of the given chain.
    fn get_log(
        &self,
        chain_id: ChainId,
        block_number: u64,
        log_index: u32,
    ) -> Result<Log, StorageError>;

    /// Returns all logs of a block of the given chain.
    fn get_block_logs(
        &self,
        chain_id: ChainId,
        block_number: u64,
    ) -> Result<Vec<Log>, StorageError>;

    /// Returns the head of the given chain at `level`.
    fn get_safety_head_ref(
        &self,
        chain_id: ChainId,
        level: SafetyLevel,
    ) -> Result<BlockRef, StorageError>;
}

/// Rewinds used by reorg handling, invalidation and recovery.
pub trait StorageRewinder {
    /// Deletes every L2 block above `to`, keeping `to`, and moves every head that is ahead back.
    fn rewind(&self, to: &BlockNumHash) -> Result<(), StorageError>;

    /// Deletes every derivation record whose source is above `l1_ancestor` and moves the safe
    /// heads back. Returns the latest derived block left.
    fn rewind_to_source(&self, l1_ancestor: &BlockNumHash)
    -> Result<Option<BlockRef>, StorageError>;

    /// Deletes every recorded L1 block above `l1_ancestor`.
    fn rewind_l1(&self, l1_ancestor: u64) -> Result<(), StorageError>;

    /// Deletes everything stored for the chain.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Everything the query surface reads from one chain.
pub trait DbReader: DerivationStorageReader + HeadRefStorageReader + LogStorageReader {}

impl<T: DerivationStorageReader + HeadRefStorageReader + LogStorageReader> DbReader for T {}
