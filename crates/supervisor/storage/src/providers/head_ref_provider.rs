//! Safety heads of a chain.

use crate::{StorageError, models::SafetyHeads};
use alloy_primitives::ChainId;
use derive_more::Constructor;
use interop_supervisor_types::{BlockRef, SafetyLevel};
use reth_db_api::transaction::{DbTx, DbTxMut};
use tracing::{error, warn};

/// Safety head storage on top of a single transaction.
#[derive(Debug, Constructor)]
pub(crate) struct SafetyHeadRefProvider<'tx, TX> {
    tx: &'tx TX,
    chain_id: ChainId,
}

impl<TX> SafetyHeadRefProvider<'_, TX>
where
    TX: DbTx,
{
    /// Returns the head at `level`, or [`StorageError::FutureData`] if it was never set.
    pub(crate) fn get_safety_head_ref(&self, level: SafetyLevel) -> Result<BlockRef, StorageError> {
        let head = self.tx.get::<SafetyHeads>(level.into()).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %level,
                %err,
                "Failed to read safety head"
            );
        })?;
        head.map(Into::into).ok_or(StorageError::FutureData)
    }

    /// Like [`Self::get_safety_head_ref`], mapping an unset head to `None`.
    pub(crate) fn find_safety_head_ref(
        &self,
        level: SafetyLevel,
    ) -> Result<Option<BlockRef>, StorageError> {
        match self.get_safety_head_ref(level) {
            Ok(head) => Ok(Some(head)),
            Err(StorageError::FutureData) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl<TX> SafetyHeadRefProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Moves the head at `level` forward to `head`.
    ///
    /// A head with a lower number than the stored one is ignored, keeping heads monotonic.
    pub(crate) fn update_safety_head_ref(
        &self,
        level: SafetyLevel,
        head: &BlockRef,
    ) -> Result<(), StorageError> {
        if let Some(current) = self.find_safety_head_ref(level)? {
            if current.number > head.number {
                warn!(
                    target: "supervisor::storage",
                    chain_id = %self.chain_id,
                    %current,
                    incoming = %head,
                    %level,
                    "Ignoring safety head update that would move the head back"
                );
                return Ok(());
            }
        }
        self.put(level, head)
    }

    /// Moves the head at `level` back to `head` if it is currently ahead of it.
    ///
    /// Used by rewinds only.
    pub(crate) fn reset_safety_head_ref_if_ahead(
        &self,
        level: SafetyLevel,
        head: &BlockRef,
    ) -> Result<(), StorageError> {
        match self.find_safety_head_ref(level)? {
            Some(current) if current.number >= head.number && current != *head => {
                self.put(level, head)
            }
            _ => Ok(()),
        }
    }

    pub(crate) fn remove_safety_head_ref(&self, level: SafetyLevel) -> Result<(), StorageError> {
        self.tx.delete::<SafetyHeads>(level.into(), None)?;
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        self.tx.clear::<SafetyHeads>()?;
        Ok(())
    }

    fn put(&self, level: SafetyLevel, head: &BlockRef) -> Result<(), StorageError> {
        self.tx.put::<SafetyHeads>(level.into(), (*head).into()).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %head,
                %level,
                %err,
                "Failed to store safety head"
            );
        })?;
        Ok(())
    }
}
