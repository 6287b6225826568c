//! L2 blocks and their logs.
//!
//! Blocks live in [`L2Blocks`] keyed by number, their logs in the dup-sorted [`BlockLogs`] table
//! with the log index as subkey. Blocks are only ever appended on top of the latest one, so the
//! stored range is always a single parent-linked chain starting at the activation block.

use crate::{
    error::{EntryNotFoundError, StorageError},
    models::{BlockLogs, L2Blocks},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use interop_supervisor_types::{BlockRef, L2BlockRef, Log};
use reth_db_api::{
    cursor::{DbCursorRO, DbDupCursorRO, DbDupCursorRW},
    transaction::{DbTx, DbTxMut},
};
use tracing::{debug, error, info, warn};

/// Number of deleted blocks between two rewind progress logs.
const DEFAULT_LOG_INTERVAL: u64 = 100;

/// Block and log storage on top of a single transaction.
#[derive(Debug)]
pub(crate) struct BlockProvider<'tx, TX> {
    tx: &'tx TX,
    chain_id: ChainId,
    observability_interval: u64,
}

impl<'tx, TX> BlockProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX, chain_id: ChainId) -> Self {
        Self { tx, chain_id, observability_interval: DEFAULT_LOG_INTERVAL }
    }
}

impl<TX> BlockProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn get_block(&self, block_number: u64) -> Result<L2BlockRef, StorageError> {
        let block = self.tx.get::<L2Blocks>(block_number).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                block_number,
                %err,
                "Failed to read block",
            );
        })?;

        block
            .map(Into::into)
            .ok_or_else(|| EntryNotFoundError::BlockNotFound(block_number).into())
    }

    pub(crate) fn get_latest_block(&self) -> Result<L2BlockRef, StorageError> {
        let mut cursor = self.tx.cursor_read::<L2Blocks>()?;
        let (_, block) = cursor.last()?.ok_or(StorageError::DatabaseNotInitialised)?;
        Ok(block.into())
    }

    pub(crate) fn get_first_block(&self) -> Result<L2BlockRef, StorageError> {
        let mut cursor = self.tx.cursor_read::<L2Blocks>()?;
        let (_, block) = cursor.first()?.ok_or(StorageError::DatabaseNotInitialised)?;
        Ok(block.into())
    }

    pub(crate) fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError> {
        let mut cursor = self.tx.cursor_dup_read::<BlockLogs>()?;
        let entry = cursor.seek_by_key_subkey(block_number, log_index).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                block_number,
                log_index,
                %err,
                "Failed to read log entry"
            );
        })?;

        // seek_by_key_subkey lands on the first entry >= subkey
        match entry {
            Some(entry) if entry.index == log_index => Ok(entry.into()),
            _ => Err(EntryNotFoundError::LogNotFound { block_number, log_index }.into()),
        }
    }

    pub(crate) fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError> {
        let mut cursor = self.tx.cursor_dup_read::<BlockLogs>()?;
        let walker = cursor.walk_range(block_number..=block_number)?;

        walker.map(|row| row.map(|(_, entry)| entry.into()).map_err(Into::into)).collect()
    }
}

impl<TX> BlockProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Seeds the storage with the activation block. Idempotent for the same block.
    pub(crate) fn initialise(&self, activation_block: L2BlockRef) -> Result<(), StorageError> {
        match self.get_first_block() {
            Ok(block) if block == activation_block => Ok(()),
            Ok(block) => {
                warn!(
                    target: "supervisor::storage",
                    chain_id = %self.chain_id,
                    stored = %block,
                    incoming = %activation_block,
                    "Activation block differs from the stored one"
                );
                Err(StorageError::ConflictError)
            }
            Err(StorageError::DatabaseNotInitialised) => {
                self.put_block_logs(&activation_block, Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Appends a block and its logs on top of the latest stored block.
    ///
    /// Re-storing a known block is a no-op; a different block at a known height is a
    /// [`StorageError::ConflictError`].
    pub(crate) fn store_block_logs(
        &self,
        block: &L2BlockRef,
        logs: Vec<Log>,
    ) -> Result<(), StorageError> {
        debug!(
            target: "supervisor::storage",
            chain_id = %self.chain_id,
            block_number = block.number(),
            logs = logs.len(),
            "Storing block logs",
        );

        let latest = self.get_latest_block()?;

        if latest.number() >= block.number() {
            let stored = self.get_block(block.number())?;
            if stored == *block {
                return Ok(());
            }
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %stored,
                incoming = %block,
                "Incoming block conflicts with the stored block"
            );
            return Err(StorageError::ConflictError);
        }

        if !latest.block.is_parent_of(&block.block) {
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %latest,
                incoming = %block,
                "Incoming block does not extend the latest stored block"
            );
            return Err(StorageError::BlockOutOfOrder);
        }

        if block.l1_origin.number < latest.l1_origin.number {
            return Err(StorageError::L1OriginRegression {
                incoming: block.l1_origin.number,
                parent: latest.l1_origin.number,
            });
        }

        self.put_block_logs(block, logs)
    }

    fn put_block_logs(&self, block: &L2BlockRef, logs: Vec<Log>) -> Result<(), StorageError> {
        self.tx.put::<L2Blocks>(block.number(), (*block).into()).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                block_number = block.number(),
                %err,
                "Failed to insert block"
            );
        })?;

        let mut cursor = self.tx.cursor_dup_write::<BlockLogs>()?;
        for log in logs {
            cursor.append_dup(block.number(), log.into()).inspect_err(|err| {
                error!(
                    target: "supervisor::storage",
                    chain_id = %self.chain_id,
                    block_number = block.number(),
                    %err,
                    "Failed to append log"
                );
            })?;
        }
        Ok(())
    }

    /// Deletes every block above `target`, keeping `target` itself. Returns the kept block.
    pub(crate) fn rewind_to(&self, target: &BlockNumHash) -> Result<BlockRef, StorageError> {
        let kept = self.get_block(target.number)?;
        if kept.hash() != target.hash {
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                stored = %kept,
                ?target,
                "Rewind target does not match the stored block"
            );
            return Err(StorageError::ConflictError);
        }

        let latest = self.get_latest_block()?.number();
        let total = latest - target.number;
        let mut deleted = 0u64;

        let mut cursor = self.tx.cursor_write::<L2Blocks>()?;
        let mut walker = cursor.walk(Some(target.number + 1))?;
        while let Some(row) = walker.next() {
            let (number, _) = row?;
            walker.delete_current()?;
            self.tx.delete::<BlockLogs>(number, None)?;

            deleted += 1;
            if deleted % self.observability_interval == 0 {
                info!(
                    target: "supervisor::storage",
                    chain_id = %self.chain_id,
                    block_number = number,
                    deleted,
                    total,
                    "Rewind progress"
                );
            }
        }

        info!(
            target: "supervisor::storage",
            chain_id = %self.chain_id,
            target_block_number = target.number,
            target_block_hash = %target.hash,
            deleted,
            "Rewound block storage"
        );
        Ok(kept.block)
    }

    /// Removes every block and log.
    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        self.tx.clear::<L2Blocks>()?;
        self.tx.clear::<BlockLogs>()?;
        Ok(())
    }
}
