//! L1 blocks reported by the L1 watcher.
//!
//! Kept so the chain processor can answer a node that ran out of L1 data with the next canonical
//! L1 block.

use crate::{
    error::{EntryNotFoundError, StorageError},
    models::L1Blocks,
};
use alloy_primitives::ChainId;
use derive_more::Constructor;
use interop_supervisor_types::BlockRef;
use reth_db_api::{
    cursor::DbCursorRO,
    transaction::{DbTx, DbTxMut},
};
use tracing::debug;

/// L1 block storage on top of a single transaction.
#[derive(Debug, Constructor)]
pub(crate) struct L1BlockProvider<'tx, TX> {
    tx: &'tx TX,
    chain_id: ChainId,
}

impl<TX> L1BlockProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn get_l1_block(&self, number: u64) -> Result<BlockRef, StorageError> {
        self.tx
            .get::<L1Blocks>(number)?
            .map(Into::into)
            .ok_or_else(|| EntryNotFoundError::L1BlockNotFound(number).into())
    }
}

impl<TX> L1BlockProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Stores `block`, replacing any block previously stored at its height along with every
    /// block above it.
    pub(crate) fn save_l1_block(&self, block: BlockRef) -> Result<(), StorageError> {
        if let Ok(stored) = self.get_l1_block(block.number) {
            if stored == block {
                return Ok(());
            }
            debug!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %stored,
                incoming = %block,
                "Replacing L1 block"
            );
            self.rewind_to(block.number.saturating_sub(1))?;
        }
        self.tx.put::<L1Blocks>(block.number, block.into())?;
        Ok(())
    }

    /// Deletes every L1 block above `number`.
    pub(crate) fn rewind_to(&self, number: u64) -> Result<(), StorageError> {
        let mut cursor = self.tx.cursor_write::<L1Blocks>()?;
        let mut walker = cursor.walk(Some(number + 1))?;
        while let Some(row) = walker.next() {
            row?;
            walker.delete_current()?;
        }
        Ok(())
    }

    /// Deletes every L1 block below `number`, returning how many were removed.
    pub(crate) fn prune_below(&self, number: u64) -> Result<usize, StorageError> {
        let mut cursor = self.tx.cursor_write::<L1Blocks>()?;
        let mut walker = cursor.walk_range(..number)?;
        let mut pruned = 0;
        while let Some(row) = walker.next() {
            row?;
            walker.delete_current()?;
            pruned += 1;
        }
        if pruned > 0 {
            debug!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                below = number,
                pruned,
                "Pruned L1 blocks"
            );
        }
        Ok(pruned)
    }

    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        self.tx.clear::<L1Blocks>()?;
        Ok(())
    }
}
