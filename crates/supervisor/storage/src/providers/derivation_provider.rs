//! Derivation records: derived L2 blocks and the L1 source blocks they came from.
//!
//! [`DerivedBlocks`] maps each derived block number to its pair, [`SourceBlocks`] maps each source
//! block number to the list of blocks derived from it. Both only grow at the tip.

use crate::{
    error::{EntryNotFoundError, StorageError},
    models::{DerivedBlocks, SourceBlockTraversal, SourceBlocks, StoredDerivedPair},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use interop_supervisor_types::{BlockRef, DerivedRefPair};
use reth_db_api::{
    cursor::DbCursorRO,
    transaction::{DbTx, DbTxMut},
};
use tracing::{error, info, warn};

/// Derivation storage on top of a single transaction.
#[derive(Debug)]
pub(crate) struct DerivationProvider<'tx, TX> {
    tx: &'tx TX,
    chain_id: ChainId,
}

impl<'tx, TX> DerivationProvider<'tx, TX> {
    pub(crate) const fn new(tx: &'tx TX, chain_id: ChainId) -> Self {
        Self { tx, chain_id }
    }
}

impl<TX> DerivationProvider<'_, TX>
where
    TX: DbTx,
{
    pub(crate) fn get_derived_pair_by_number(&self, number: u64) -> Result<StoredDerivedPair, StorageError> {
        let pair = self.tx.get::<DerivedBlocks>(number).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                derived_block_number = number,
                %err,
                "Failed to read derived block pair"
            );
        })?;
        pair.ok_or_else(|| EntryNotFoundError::DerivedBlockNotFound(number).into())
    }

    /// Returns the pair of the given derived block, checking its hash.
    pub(crate) fn get_derived_pair(
        &self,
        derived: BlockNumHash,
    ) -> Result<StoredDerivedPair, StorageError> {
        let pair = self.get_derived_pair_by_number(derived.number)?;
        if pair.derived.hash != derived.hash {
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                derived_block_number = derived.number,
                expected_hash = %derived.hash,
                stored_hash = %pair.derived.hash,
                "Derived block hash mismatch"
            );
            return Err(StorageError::ConflictError);
        }
        Ok(pair)
    }

    pub(crate) fn derived_to_source(&self, derived: BlockNumHash) -> Result<BlockRef, StorageError> {
        Ok(self.get_derived_pair(derived)?.source.into())
    }

    fn get_traversal(&self, source_number: u64) -> Result<SourceBlockTraversal, StorageError> {
        self.tx
            .get::<SourceBlocks>(source_number)?
            .ok_or_else(|| EntryNotFoundError::SourceBlockNotFound(source_number).into())
    }

    fn latest_traversal(&self) -> Result<SourceBlockTraversal, StorageError> {
        let mut cursor = self.tx.cursor_read::<SourceBlocks>()?;
        let (_, traversal) = cursor.last()?.ok_or(StorageError::DatabaseNotInitialised)?;
        Ok(traversal)
    }

    pub(crate) fn get_source_block(&self, source_number: u64) -> Result<BlockRef, StorageError> {
        Ok(self.get_traversal(source_number)?.source.into())
    }

    pub(crate) fn latest_source_block(&self) -> Result<BlockRef, StorageError> {
        Ok(self.latest_traversal()?.source.into())
    }

    /// Latest derived block whose source number is at or below `source_number`.
    pub(crate) fn latest_derived_at_or_below(
        &self,
        source_number: u64,
    ) -> Result<Option<BlockRef>, StorageError> {
        let mut cursor = self.tx.cursor_read::<SourceBlocks>()?;
        for row in cursor.walk_back(Some(source_number))? {
            let (_, traversal) = row?;
            if let Some(number) = traversal.derived_block_numbers.last() {
                return Ok(Some(self.get_derived_pair_by_number(*number)?.derived.into()));
            }
        }
        Ok(None)
    }

    /// Latest block derived from the given source block or any source before it.
    ///
    /// Fails with [`StorageError::FutureData`] if derivation has not reached the source yet.
    pub(crate) fn latest_derived_block_at_source(
        &self,
        source: BlockNumHash,
    ) -> Result<BlockRef, StorageError> {
        let latest = self.latest_source_block()?;
        if source.number > latest.number {
            return Err(StorageError::FutureData);
        }

        let traversal = self.get_traversal(source.number)?;
        if traversal.source.hash != source.hash {
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                source_block_number = source.number,
                expected_hash = %source.hash,
                stored_hash = %traversal.source.hash,
                "Source block hash mismatch"
            );
            return Err(StorageError::ConflictError);
        }

        self.latest_derived_at_or_below(source.number)?
            .ok_or_else(|| EntryNotFoundError::MissingDerivedBlocks(source).into())
    }

    pub(crate) fn latest_derived_block(&self) -> Result<BlockRef, StorageError> {
        let mut cursor = self.tx.cursor_read::<DerivedBlocks>()?;
        let (_, pair) = cursor.last()?.ok_or(StorageError::DatabaseNotInitialised)?;
        Ok(pair.derived.into())
    }

    /// The latest source block and the latest derived block.
    pub(crate) fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError> {
        let derived = self.latest_derived_block()?;
        let source = self.latest_source_block()?;
        Ok(DerivedRefPair { source, derived })
    }

    pub(crate) fn get_activation_block(&self) -> Result<BlockRef, StorageError> {
        let mut cursor = self.tx.cursor_read::<DerivedBlocks>()?;
        let (_, pair) = cursor.first()?.ok_or(StorageError::DatabaseNotInitialised)?;
        Ok(pair.derived.into())
    }
}

impl<TX> DerivationProvider<'_, TX>
where
    TX: DbTxMut + DbTx,
{
    /// Seeds the storage with the activation pair. Idempotent for the same pair.
    pub(crate) fn initialise(&self, activation: DerivedRefPair) -> Result<(), StorageError> {
        let mut cursor = self.tx.cursor_read::<DerivedBlocks>()?;
        match cursor.first()? {
            Some((_, stored)) if DerivedRefPair::from(stored) == activation => Ok(()),
            Some(_) => Err(StorageError::ConflictError),
            None => {
                self.put_source(SourceBlockTraversal::new(activation.source.into()))?;
                self.put_derived(activation)
            }
        }
    }

    /// Records an L1 block reached by derivation.
    ///
    /// Known blocks are accepted as-is; a new block must extend the latest source block.
    pub(crate) fn save_source_block(&self, source: BlockRef) -> Result<(), StorageError> {
        let latest = self.latest_source_block()?;
        if latest == source {
            return Ok(());
        }

        if source.number <= latest.number {
            let stored = self.get_source_block(source.number)?;
            if stored == source {
                return Ok(());
            }
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %stored,
                incoming = %source,
                "Incoming source block conflicts with the stored one"
            );
            return Err(StorageError::ConflictError);
        }

        if !latest.is_parent_of(&source) {
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %latest,
                incoming = %source,
                "Incoming source block does not extend the latest source block"
            );
            return Err(StorageError::BlockOutOfOrder);
        }

        self.put_source(SourceBlockTraversal::new(source.into()))
    }

    /// Records a derived block.
    ///
    /// The derived block must extend the latest derived block. Its source must be the latest
    /// source block, or its direct child, which is then recorded as well.
    pub(crate) fn save_derived_block(&self, pair: DerivedRefPair) -> Result<(), StorageError> {
        let latest = self.latest_derivation_state()?;

        if pair.derived.number <= latest.derived.number {
            let stored = self.get_derived_pair_by_number(pair.derived.number)?;
            if DerivedRefPair::from(stored) == pair {
                return Ok(());
            }
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %latest,
                incoming = %pair,
                "Incoming derived pair conflicts with the stored one"
            );
            return Err(StorageError::ConflictError);
        }

        if !latest.derived.is_parent_of(&pair.derived) {
            warn!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                %latest,
                incoming = %pair,
                "Incoming derived block does not extend the latest derived block"
            );
            return Err(StorageError::BlockOutOfOrder);
        }

        if latest.source != pair.source {
            if !latest.source.is_parent_of(&pair.source) {
                warn!(
                    target: "supervisor::storage",
                    chain_id = %self.chain_id,
                    latest_source = %latest.source,
                    incoming_source = %pair.source,
                    "Incoming source block does not extend the latest source block"
                );
                return Err(StorageError::BlockOutOfOrder);
            }
            self.put_source(SourceBlockTraversal::new(pair.source.into()))?;
        }

        self.put_derived(pair)
    }

    fn put_source(&self, traversal: SourceBlockTraversal) -> Result<(), StorageError> {
        let number = traversal.source.number;
        self.tx.put::<SourceBlocks>(number, traversal).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                source_block_number = number,
                %err,
                "Failed to save source block"
            );
        })?;
        Ok(())
    }

    /// Writes the pair and appends it to its source's traversal. The source must be stored.
    fn put_derived(&self, pair: DerivedRefPair) -> Result<(), StorageError> {
        let mut traversal = self.get_traversal(pair.source.number)?;
        traversal.derived_block_numbers.push(pair.derived.number);

        self.tx.put::<DerivedBlocks>(pair.derived.number, pair.into()).inspect_err(|err| {
            error!(
                target: "supervisor::storage",
                chain_id = %self.chain_id,
                incoming = %pair,
                %err,
                "Failed to save derived block pair"
            );
        })?;
        self.put_source(traversal)
    }

    /// Deletes every derived block above `derived_number`, and every source block after the
    /// source of the last kept derived block.
    pub(crate) fn rewind_to(&self, derived_number: u64) -> Result<Option<BlockRef>, StorageError> {
        let mut deleted = 0u64;
        {
            let mut cursor = self.tx.cursor_write::<DerivedBlocks>()?;
            let mut walker = cursor.walk(Some(derived_number + 1))?;
            while let Some(row) = walker.next() {
                row?;
                walker.delete_current()?;
                deleted += 1;
            }
        }

        let kept = {
            let mut cursor = self.tx.cursor_read::<DerivedBlocks>()?;
            cursor.last()?.map(|(_, pair)| pair)
        };

        let Some(kept) = kept else {
            self.tx.clear::<SourceBlocks>()?;
            return Ok(None);
        };

        let mut traversal = self.get_traversal(kept.source.number)?;
        traversal.derived_block_numbers.retain(|number| *number <= derived_number);
        self.put_source(traversal)?;
        self.delete_sources_above(kept.source.number)?;

        info!(
            target: "supervisor::storage",
            chain_id = %self.chain_id,
            derived_block_number = kept.derived.number,
            deleted,
            "Rewound derivation storage"
        );
        Ok(Some(kept.derived.into()))
    }

    /// Deletes every source block above `ancestor` and every block derived from them.
    ///
    /// Returns the latest derived block left, if any.
    pub(crate) fn rewind_to_source(
        &self,
        ancestor: &BlockNumHash,
    ) -> Result<Option<BlockRef>, StorageError> {
        if let Some(stored) = self.tx.get::<SourceBlocks>(ancestor.number)? {
            if stored.source.hash != ancestor.hash {
                warn!(
                    target: "supervisor::storage",
                    chain_id = %self.chain_id,
                    source_block_number = ancestor.number,
                    expected_hash = %ancestor.hash,
                    stored_hash = %stored.source.hash,
                    "Source block hash mismatch during rewind"
                );
                return Err(StorageError::ConflictError);
            }
        }

        let mut first_removed: Option<u64> = None;
        {
            let mut cursor = self.tx.cursor_read::<SourceBlocks>()?;
            for row in cursor.walk(Some(ancestor.number + 1))? {
                let (_, traversal) = row?;
                if let Some(number) = traversal.derived_block_numbers.first() {
                    first_removed = Some(*number);
                    break;
                }
            }
        }
        self.delete_sources_above(ancestor.number)?;

        if let Some(first_removed) = first_removed {
            let mut cursor = self.tx.cursor_write::<DerivedBlocks>()?;
            let mut walker = cursor.walk(Some(first_removed))?;
            while let Some(row) = walker.next() {
                row?;
                walker.delete_current()?;
            }
        }

        info!(
            target: "supervisor::storage",
            chain_id = %self.chain_id,
            l1_ancestor = ancestor.number,
            first_removed_derived = ?first_removed,
            "Rewound derivation storage to L1 ancestor"
        );

        match self.latest_derived_block() {
            Ok(block) => Ok(Some(block)),
            Err(StorageError::DatabaseNotInitialised) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn delete_sources_above(&self, source_number: u64) -> Result<(), StorageError> {
        let mut cursor = self.tx.cursor_write::<SourceBlocks>()?;
        let mut walker = cursor.walk(Some(source_number + 1))?;
        while let Some(row) = walker.next() {
            row?;
            walker.delete_current()?;
        }
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<(), StorageError> {
        self.tx.clear::<DerivedBlocks>()?;
        self.tx.clear::<SourceBlocks>()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Tables;
    use alloy_primitives::B256;
    use reth_db::{
        DatabaseEnv,
        mdbx::{DatabaseArguments, init_db_for},
    };
    use reth_db_api::Database;
    use tempfile::TempDir;

    const CHAIN_ID: ChainId = 1;

    fn l1(number: u64) -> BlockRef {
        BlockRef::new(
            B256::repeat_byte(number as u8),
            number,
            B256::repeat_byte(number.wrapping_sub(1) as u8),
            number * 12,
        )
    }

    fn l2(number: u64) -> BlockRef {
        BlockRef::new(
            B256::with_last_byte(number as u8),
            number,
            B256::with_last_byte(number.wrapping_sub(1) as u8),
            number * 2,
        )
    }

    fn setup_db() -> (TempDir, DatabaseEnv) {
        let dir = TempDir::new().expect("temp dir");
        let env = init_db_for::<_, Tables>(dir.path(), DatabaseArguments::default())
            .expect("init database");
        (dir, env)
    }

    fn write<T>(
        env: &DatabaseEnv,
        f: impl FnOnce(
            &DerivationProvider<'_, <DatabaseEnv as Database>::TXMut>,
        ) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let tx = env.tx_mut().expect("write tx");
        let result = f(&DerivationProvider::new(&tx, CHAIN_ID));
        if result.is_ok() {
            tx.commit().expect("commit");
        } else {
            tx.abort();
        }
        result
    }

    /// Activation pair (l1 10, l2 100), then l2 101..=103 from l1 10, 104..=105 from l1 11,
    /// l1 12 with nothing derived.
    fn populate(env: &DatabaseEnv) {
        write(env, |p| p.initialise(DerivedRefPair::new(l1(10), l2(100)))).unwrap();
        for number in 101..=103 {
            write(env, |p| p.save_derived_block(DerivedRefPair::new(l1(10), l2(number)))).unwrap();
        }
        for number in 104..=105 {
            write(env, |p| p.save_derived_block(DerivedRefPair::new(l1(11), l2(number)))).unwrap();
        }
        write(env, |p| p.save_source_block(l1(12))).unwrap();
    }

    #[test]
    fn test_save_requires_initialisation() {
        let (_dir, env) = setup_db();
        assert_eq!(
            write(&env, |p| p.save_source_block(l1(1))),
            Err(StorageError::DatabaseNotInitialised)
        );
    }

    #[test]
    fn test_latest_state_and_lookups() {
        let (_dir, env) = setup_db();
        populate(&env);

        let tx = env.tx().unwrap();
        let provider = DerivationProvider::new(&tx, CHAIN_ID);
        assert_eq!(
            provider.latest_derivation_state().unwrap(),
            DerivedRefPair::new(l1(12), l2(105))
        );
        assert_eq!(provider.derived_to_source(l2(104).id()).unwrap(), l1(11));
        assert_eq!(provider.get_activation_block().unwrap(), l2(100));
        assert_eq!(provider.latest_derived_block_at_source(l1(10).id()).unwrap(), l2(103));
        assert_eq!(provider.latest_derived_block_at_source(l1(12).id()).unwrap(), l2(105));
        assert_eq!(
            provider.latest_derived_block_at_source(l1(13).id()),
            Err(StorageError::FutureData)
        );
        assert_eq!(
            provider.latest_derived_block_at_source(BlockNumHash {
                number: 11,
                hash: B256::ZERO
            }),
            Err(StorageError::ConflictError)
        );
    }

    #[test]
    fn test_save_derived_rejects_out_of_order() {
        let (_dir, env) = setup_db();
        populate(&env);

        // skipping a derived block
        assert_eq!(
            write(&env, |p| p.save_derived_block(DerivedRefPair::new(l1(12), l2(107)))),
            Err(StorageError::BlockOutOfOrder)
        );
        // skipping a source block
        assert_eq!(
            write(&env, |p| p.save_derived_block(DerivedRefPair::new(l1(14), l2(106)))),
            Err(StorageError::BlockOutOfOrder)
        );
        // duplicate is accepted, conflicting source is not
        write(&env, |p| p.save_derived_block(DerivedRefPair::new(l1(11), l2(105)))).unwrap();
        assert_eq!(
            write(&env, |p| p.save_derived_block(DerivedRefPair::new(l1(10), l2(105)))),
            Err(StorageError::ConflictError)
        );
    }

    #[test]
    fn test_rewind_to_source_drops_later_derivations() {
        let (_dir, env) = setup_db();
        populate(&env);

        let latest = write(&env, |p| p.rewind_to_source(&l1(10).id())).unwrap();
        assert_eq!(latest, Some(l2(103)));

        let tx = env.tx().unwrap();
        let provider = DerivationProvider::new(&tx, CHAIN_ID);
        assert_eq!(provider.latest_derivation_state().unwrap(), DerivedRefPair::new(l1(10), l2(103)));
        assert!(provider.get_source_block(11).is_err());
    }

    #[test]
    fn test_rewind_to_derived_trims_traversal() {
        let (_dir, env) = setup_db();
        populate(&env);

        let kept = write(&env, |p| p.rewind_to(102)).unwrap();
        assert_eq!(kept, Some(l2(102)));

        // the next derived block can be appended again
        write(&env, |p| p.save_derived_block(DerivedRefPair::new(l1(10), l2(103)))).unwrap();

        let tx = env.tx().unwrap();
        let provider = DerivationProvider::new(&tx, CHAIN_ID);
        assert_eq!(provider.latest_derivation_state().unwrap(), DerivedRefPair::new(l1(10), l2(103)));
    }

    #[test]
    fn test_rewind_below_activation_empties_storage() {
        let (_dir, env) = setup_db();
        populate(&env);

        assert_eq!(write(&env, |p| p.rewind_to(99)).unwrap(), None);

        let tx = env.tx().unwrap();
        let provider = DerivationProvider::new(&tx, CHAIN_ID);
        assert_eq!(provider.latest_derivation_state(), Err(StorageError::DatabaseNotInitialised));
    }
}
