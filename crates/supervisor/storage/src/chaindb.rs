//! Main database access structure and transaction contexts.

use crate::{
    Metrics, StorageRewinder,
    error::StorageError,
    providers::{BlockProvider, DerivationProvider, L1BlockProvider, SafetyHeadRefProvider},
    traits::{
        DerivationStorageReader, DerivationStorageWriter, HeadRefStorageReader,
        HeadRefStorageWriter, L1BlockStorage, LogStorageReader, LogStorageWriter,
    },
};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::ChainId;
use interop_supervisor_metrics::{MetricsReporter, observe_metrics_for_result};
use interop_supervisor_types::{BlockRef, DerivedRefPair, L2BlockRef, Log, SafetyLevel, SuperHead};
use metrics::{Label, gauge};
use reth_db::{
    DatabaseEnv,
    mdbx::{DatabaseArguments, init_db_for},
};
use reth_db_api::{
    database::Database,
    transaction::{DbTx, DbTxMut},
};
use std::path::Path;
use tracing::{debug, warn};

/// Safe levels, which follow derivation records rather than unsafe blocks.
const SAFE_LEVELS: [SafetyLevel; 3] =
    [SafetyLevel::LocalSafe, SafetyLevel::CrossSafe, SafetyLevel::Finalized];

/// Manages the database environment for a single chain.
/// Provides transactional access to data via providers.
///
/// Every write runs in one MDBX transaction, so heads and the records they point at never
/// disagree, even if the process dies mid-operation.
#[derive(Debug)]
pub struct ChainDb {
    chain_id: ChainId,
    metrics_enabled: Option<bool>,

    env: DatabaseEnv,
}

impl ChainDb {
    /// Creates or opens a database environment at the given path.
    pub fn new(chain_id: ChainId, path: &Path) -> Result<Self, StorageError> {
        let env = init_db_for::<_, crate::models::Tables>(path, DatabaseArguments::default())?;
        Ok(Self { chain_id, metrics_enabled: None, env })
    }

    /// Enables metrics on the database environment.
    pub fn with_metrics(mut self) -> Self {
        self.metrics_enabled = Some(true);
        crate::Metrics::init(self.chain_id);
        self
    }

    /// Returns the chain this database belongs to.
    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    fn observe_call<T, E, F: FnOnce() -> Result<T, E>>(
        &self,
        name: &'static str,
        f: F,
    ) -> Result<T, E> {
        if self.metrics_enabled.unwrap_or(false) {
            observe_metrics_for_result!(
                Metrics::STORAGE_REQUESTS_SUCCESS_TOTAL,
                Metrics::STORAGE_REQUESTS_ERROR_TOTAL,
                Metrics::STORAGE_REQUEST_DURATION_SECONDS,
                name,
                f(),
                "chain_id" => self.chain_id.to_string()
            )
        } else {
            f()
        }
    }

    /// Runs `f` in a read-write transaction, committing only if it succeeds.
    fn write<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&<DatabaseEnv as Database>::TXMut) -> Result<T, StorageError>,
    {
        let tx = self.env.tx_mut()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.abort();
                Err(err)
            }
        }
    }

    /// Moves local-safe up to the highest derived block that is also cross-unsafe.
    fn raise_local_safe<TX: DbTxMut + DbTx>(&self, tx: &TX) -> Result<(), StorageError> {
        let sp = SafetyHeadRefProvider::new(tx, self.chain_id);
        let dp = DerivationProvider::new(tx, self.chain_id);

        let Some(cross_unsafe) = sp.find_safety_head_ref(SafetyLevel::CrossUnsafe)? else {
            return Ok(());
        };
        let latest_derived = match dp.latest_derived_block() {
            Ok(block) => block,
            Err(StorageError::DatabaseNotInitialised) => return Ok(()),
            Err(err) => return Err(err),
        };

        let target = if latest_derived.number <= cross_unsafe.number {
            latest_derived
        } else {
            match dp.get_derived_pair_by_number(cross_unsafe.number) {
                Ok(pair) => pair.derived.into(),
                Err(StorageError::EntryNotFound(_)) => return Ok(()),
                Err(err) => return Err(err),
            }
        };
        sp.update_safety_head_ref(SafetyLevel::LocalSafe, &target)
    }

    /// Moves the safe heads back to `latest_derived`, or removes them if nothing is derived.
    fn reset_safe_heads<TX: DbTxMut + DbTx>(
        &self,
        tx: &TX,
        latest_derived: Option<BlockRef>,
    ) -> Result<(), StorageError> {
        let sp = SafetyHeadRefProvider::new(tx, self.chain_id);
        for level in SAFE_LEVELS {
            match latest_derived {
                Some(block) => sp.reset_safety_head_ref_if_ahead(level, &block)?,
                None => sp.remove_safety_head_ref(level)?,
            }
        }
        Ok(())
    }
}

impl DerivationStorageReader for ChainDb {
    fn derived_to_source(&self, derived_block_id: BlockNumHash) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_DERIVED_TO_SOURCE, || {
            self.env.view(|tx| {
                DerivationProvider::new(tx, self.chain_id).derived_to_source(derived_block_id)
            })
        })?
    }

    fn latest_derived_block_at_source(
        &self,
        source_block_id: BlockNumHash,
    ) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_LATEST_DERIVED_BLOCK_AT_SOURCE, || {
            self.env.view(|tx| {
                DerivationProvider::new(tx, self.chain_id)
                    .latest_derived_block_at_source(source_block_id)
            })
        })?
    }

    fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_LATEST_DERIVATION_STATE, || {
            self.env.view(|tx| DerivationProvider::new(tx, self.chain_id).latest_derivation_state())
        })?
    }

    fn get_source_block(&self, source_block_number: u64) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_SOURCE_BLOCK, || {
            self.env.view(|tx| {
                DerivationProvider::new(tx, self.chain_id).get_source_block(source_block_number)
            })
        })?
    }

    fn get_activation_block(&self) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_ACTIVATION_BLOCK, || {
            self.env.view(|tx| DerivationProvider::new(tx, self.chain_id).get_activation_block())
        })?
    }
}

impl DerivationStorageWriter for ChainDb {
    fn initialise_derivation_storage(
        &self,
        incoming_pair: DerivedRefPair,
    ) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_INITIALISE_DERIVATION_STORAGE, || {
            self.write(|ctx| {
                let stored = match BlockProvider::new(ctx, self.chain_id)
                    .get_block(incoming_pair.derived.number)
                {
                    Ok(block) => block,
                    Err(StorageError::EntryNotFound(_)) => return Err(StorageError::FutureData),
                    Err(err) => return Err(err),
                };
                if stored.block != incoming_pair.derived {
                    warn!(
                        target: "supervisor::storage",
                        chain_id = %self.chain_id,
                        incoming_block = %incoming_pair.derived,
                        stored_block = %stored,
                        "Derivation activation block does not match the stored block"
                    );
                    return Err(StorageError::ConflictError);
                }

                DerivationProvider::new(ctx, self.chain_id).initialise(incoming_pair)?;
                let sp = SafetyHeadRefProvider::new(ctx, self.chain_id);
                sp.update_safety_head_ref(SafetyLevel::LocalSafe, &incoming_pair.derived)?;
                sp.update_safety_head_ref(SafetyLevel::CrossSafe, &incoming_pair.derived)
            })
        })
    }

    fn save_derived_block(&self, incoming_pair: DerivedRefPair) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_SAVE_DERIVED_BLOCK, || {
            self.write(|ctx| {
                DerivationProvider::new(ctx, self.chain_id).save_derived_block(incoming_pair)?;

                // Checked after the derivation write so that a missing parent in derivation
                // storage is reported as such rather than as a log storage mismatch.
                let derived_block = incoming_pair.derived;
                let block = BlockProvider::new(ctx, self.chain_id)
                    .get_block(derived_block.number)
                    .map_err(|err| match err {
                        StorageError::EntryNotFound(_) => {
                            debug!(
                                target: "supervisor::storage",
                                chain_id = %self.chain_id,
                                incoming_block = %derived_block,
                                "Derived block not in log storage yet"
                            );
                            StorageError::FutureData
                        }
                        other => other,
                    })?;
                if block.block != derived_block {
                    warn!(
                        target: "supervisor::storage",
                        chain_id = %self.chain_id,
                        incoming_block = %derived_block,
                        stored_log_block = %block,
                        "Derived block does not match the stored log block"
                    );
                    return Err(StorageError::ReorgRequired);
                }

                self.raise_local_safe(ctx)
            })
        })
    }

    fn save_source_block(&self, incoming_source: BlockRef) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_SAVE_SOURCE_BLOCK, || {
            self.write(|ctx| {
                DerivationProvider::new(ctx, self.chain_id).save_source_block(incoming_source)
            })
        })
    }
}

impl LogStorageReader for ChainDb {
    fn get_latest_block(&self) -> Result<L2BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_LATEST_BLOCK, || {
            self.env.view(|tx| BlockProvider::new(tx, self.chain_id).get_latest_block())
        })?
    }

    fn get_block(&self, block_number: u64) -> Result<L2BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_BLOCK, || {
            self.env.view(|tx| BlockProvider::new(tx, self.chain_id).get_block(block_number))
        })?
    }

    fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_LOG, || {
            self.env
                .view(|tx| BlockProvider::new(tx, self.chain_id).get_log(block_number, log_index))
        })?
    }

    fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_LOGS, || {
            self.env.view(|tx| BlockProvider::new(tx, self.chain_id).get_logs(block_number))
        })?
    }
}

impl LogStorageWriter for ChainDb {
    fn initialise_log_storage(&self, block: L2BlockRef) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_INITIALISE_LOG_STORAGE, || {
            self.write(|ctx| {
                BlockProvider::new(ctx, self.chain_id).initialise(block)?;
                let sp = SafetyHeadRefProvider::new(ctx, self.chain_id);
                sp.update_safety_head_ref(SafetyLevel::LocalUnsafe, &block.block)?;
                sp.update_safety_head_ref(SafetyLevel::CrossUnsafe, &block.block)
            })
        })
    }

    fn store_block_logs(&self, block: &L2BlockRef, logs: Vec<Log>) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_STORE_BLOCK_LOGS, || {
            self.write(|ctx| {
                BlockProvider::new(ctx, self.chain_id).store_block_logs(block, logs)?;

                SafetyHeadRefProvider::new(ctx, self.chain_id)
                    .update_safety_head_ref(SafetyLevel::LocalUnsafe, &block.block)
            })
        })
    }
}

impl HeadRefStorageReader for ChainDb {
    fn get_safety_head_ref(&self, safety_level: SafetyLevel) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_SAFETY_HEAD_REF, || {
            self.env.view(|tx| {
                SafetyHeadRefProvider::new(tx, self.chain_id).get_safety_head_ref(safety_level)
            })
        })?
    }

    fn get_super_head(&self) -> Result<SuperHead, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_SUPER_HEAD, || {
            self.env.view(|tx| {
                let sp = SafetyHeadRefProvider::new(tx, self.chain_id);
                let l1_source =
                    match DerivationProvider::new(tx, self.chain_id).latest_source_block() {
                        Ok(block) => Some(block),
                        Err(StorageError::DatabaseNotInitialised) => None,
                        Err(err) => return Err(err),
                    };

                Ok(SuperHead {
                    l1_source,
                    local_unsafe: sp.find_safety_head_ref(SafetyLevel::LocalUnsafe)?,
                    cross_unsafe: sp.find_safety_head_ref(SafetyLevel::CrossUnsafe)?,
                    local_safe: sp.find_safety_head_ref(SafetyLevel::LocalSafe)?,
                    cross_safe: sp.find_safety_head_ref(SafetyLevel::CrossSafe)?,
                    finalized: sp.find_safety_head_ref(SafetyLevel::Finalized)?,
                })
            })?
        })
    }
}

impl HeadRefStorageWriter for ChainDb {
    fn update_finalized_using_source(
        &self,
        finalized_source_block: BlockRef,
    ) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_UPDATE_FINALIZED_USING_SOURCE, || {
            self.write(|tx| {
                let sp = SafetyHeadRefProvider::new(tx, self.chain_id);
                let dp = DerivationProvider::new(tx, self.chain_id);
                let cross_safe = sp.get_safety_head_ref(SafetyLevel::CrossSafe)?;

                match dp.get_source_block(finalized_source_block.number) {
                    Ok(stored) if stored.hash != finalized_source_block.hash => {
                        warn!(
                            target: "supervisor::storage",
                            chain_id = %self.chain_id,
                            finalized_l1 = %finalized_source_block,
                            stored_source = %stored,
                            "Finalized L1 block conflicts with the stored source block"
                        );
                        return Err(StorageError::ConflictError);
                    }
                    Ok(_) | Err(StorageError::EntryNotFound(_)) => {}
                    Err(err) => return Err(err),
                }

                let latest_derived = dp
                    .latest_derived_at_or_below(finalized_source_block.number)?
                    .ok_or(StorageError::FutureData)?;

                let target = if latest_derived.number > cross_safe.number {
                    // happens while cross-safe validation lags behind derivation
                    debug!(
                        target: "supervisor::storage",
                        chain_id = %self.chain_id,
                        latest_derived = latest_derived.number,
                        cross_safe = cross_safe.number,
                        "Capping finalized head at the cross-safe head",
                    );
                    cross_safe
                } else {
                    latest_derived
                };

                sp.update_safety_head_ref(SafetyLevel::Finalized, &target)?;
                sp.get_safety_head_ref(SafetyLevel::Finalized)
            })
        })
    }

    fn update_current_cross_unsafe(&self, block: &BlockRef) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_UPDATE_CURRENT_CROSS_UNSAFE, || {
            self.write(|tx| {
                let bp = BlockProvider::new(tx, self.chain_id);
                let sp = SafetyHeadRefProvider::new(tx, self.chain_id);

                let parent = sp.get_safety_head_ref(SafetyLevel::CrossUnsafe)?;
                if !parent.is_parent_of(block) {
                    warn!(
                        target: "supervisor::storage",
                        chain_id = %self.chain_id,
                        incoming_block = %block,
                        latest_block = %parent,
                        "Incoming block is not the child of the current cross-unsafe head",
                    );
                    return Err(StorageError::ConflictError);
                }

                // The block may have been rewound since it was validated.
                let stored_block = bp.get_block(block.number)?;
                if stored_block.hash() != block.hash {
                    warn!(
                        target: "supervisor::storage",
                        chain_id = %self.chain_id,
                        incoming_block_hash = %block.hash,
                        stored_block_hash = %stored_block.hash(),
                        "Hash mismatch while updating CrossUnsafe head",
                    );
                    return Err(StorageError::ConflictError);
                }

                sp.update_safety_head_ref(SafetyLevel::CrossUnsafe, block)?;
                self.raise_local_safe(tx)
            })
        })
    }

    fn update_current_cross_safe(&self, block: &BlockRef) -> Result<DerivedRefPair, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_UPDATE_CURRENT_CROSS_SAFE, || {
            self.write(|tx| {
                let dp = DerivationProvider::new(tx, self.chain_id);
                let sp = SafetyHeadRefProvider::new(tx, self.chain_id);

                let parent = sp.get_safety_head_ref(SafetyLevel::CrossSafe)?;
                if !parent.is_parent_of(block) {
                    warn!(
                        target: "supervisor::storage",
                        chain_id = %self.chain_id,
                        incoming_block = %block,
                        latest_block = %parent,
                        "Incoming block is not the child of the current cross-safe head",
                    );
                    return Err(StorageError::ConflictError);
                }

                let local_safe = sp.get_safety_head_ref(SafetyLevel::LocalSafe)?;
                if block.number > local_safe.number {
                    return Err(StorageError::FutureData);
                }

                let derived_pair = dp.get_derived_pair(block.id())?;
                sp.update_safety_head_ref(SafetyLevel::CrossSafe, block)?;

                Ok(derived_pair.into())
            })
        })
    }
}

impl L1BlockStorage for ChainDb {
    fn save_l1_block(&self, block: BlockRef) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_SAVE_L1_BLOCK, || {
            self.write(|tx| L1BlockProvider::new(tx, self.chain_id).save_l1_block(block))
        })
    }

    fn get_l1_block(&self, number: u64) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_L1_BLOCK, || {
            self.env.view(|tx| L1BlockProvider::new(tx, self.chain_id).get_l1_block(number))
        })?
    }

    fn prune_l1_blocks_below(&self, number: u64) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_PRUNE_L1_BLOCKS, || {
            self.write(|tx| L1BlockProvider::new(tx, self.chain_id).prune_below(number).map(drop))
        })
    }
}

impl StorageRewinder for ChainDb {
    fn rewind(&self, to: &BlockNumHash) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_REWIND, || {
            self.write(|tx| {
                let bp = BlockProvider::new(tx, self.chain_id);
                let dp = DerivationProvider::new(tx, self.chain_id);
                let sp = SafetyHeadRefProvider::new(tx, self.chain_id);

                let kept = bp.rewind_to(to)?;
                let latest_derived = dp.rewind_to(kept.number)?;

                sp.reset_safety_head_ref_if_ahead(SafetyLevel::LocalUnsafe, &kept)?;
                sp.reset_safety_head_ref_if_ahead(SafetyLevel::CrossUnsafe, &kept)?;
                self.reset_safe_heads(tx, latest_derived)
            })
        })
    }

    fn rewind_to_source(&self, to: &BlockNumHash) -> Result<Option<BlockRef>, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_REWIND_TO_SOURCE, || {
            self.write(|tx| {
                let latest_derived =
                    DerivationProvider::new(tx, self.chain_id).rewind_to_source(to)?;
                self.reset_safe_heads(tx, latest_derived)?;
                Ok(latest_derived)
            })
        })
    }

    fn rewind_l1(&self, l1_ancestor: u64) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_REWIND_L1, || {
            self.write(|tx| L1BlockProvider::new(tx, self.chain_id).rewind_to(l1_ancestor))
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_CLEAR, || {
            self.write(|tx| {
                BlockProvider::new(tx, self.chain_id).clear()?;
                DerivationProvider::new(tx, self.chain_id).clear()?;
                SafetyHeadRefProvider::new(tx, self.chain_id).clear()?;
                L1BlockProvider::new(tx, self.chain_id).clear()
            })
        })
    }
}

impl MetricsReporter for ChainDb {
    fn report_metrics(&self) {
        let mut metrics = Vec::new();

        let _ = self
            .env
            .view(|tx| {
                for table in crate::models::Tables::ALL.iter().map(crate::models::Tables::name) {
                    let table_db = tx.inner.open_db(Some(table))?;
                    let stats = tx.inner.db_stat(&table_db)?;

                    let page_size = stats.page_size() as usize;
                    let leaf_pages = stats.leaf_pages();
                    let branch_pages = stats.branch_pages();
                    let overflow_pages = stats.overflow_pages();
                    let num_pages = leaf_pages + branch_pages + overflow_pages;
                    let table_size = page_size * num_pages;

                    let labels = |extra: Option<(&'static str, &'static str)>| {
                        let mut labels = vec![
                            Label::new("table", table),
                            Label::new("chain_id", self.chain_id.to_string()),
                        ];
                        if let Some((key, value)) = extra {
                            labels.push(Label::new(key, value));
                        }
                        labels
                    };

                    metrics.push((Metrics::STORAGE_TABLE_SIZE, table_size as f64, labels(None)));
                    for (kind, pages) in
                        [("leaf", leaf_pages), ("branch", branch_pages), ("overflow", overflow_pages)]
                    {
                        metrics.push((
                            Metrics::STORAGE_TABLE_PAGES,
                            pages as f64,
                            labels(Some(("type", kind))),
                        ));
                    }
                    metrics.push((
                        Metrics::STORAGE_TABLE_ENTRIES,
                        stats.entries() as f64,
                        labels(None),
                    ));
                }

                Ok::<(), eyre::Report>(())
            })
            .inspect_err(|err| {
                warn!(target: "supervisor::storage", %err, "Failed to collect database metrics");
            });

        for (name, value, labels) in metrics {
            gauge!(name, labels).set(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};
    use interop_supervisor_types::ExecutingMessage;
    use tempfile::TempDir;

    fn l1_hash(number: u64) -> B256 {
        B256::from(U256::from(10_000 + number))
    }

    fn l2_hash(number: u64) -> B256 {
        B256::from(U256::from(number))
    }

    fn l1(number: u64) -> BlockRef {
        BlockRef::new(l1_hash(number), number, l1_hash(number - 1), number * 12)
    }

    fn l2(number: u64) -> BlockRef {
        BlockRef::new(l2_hash(number), number, l2_hash(number - 1), number * 2)
    }

    fn l2_ref(number: u64, origin: u64) -> L2BlockRef {
        L2BlockRef::new(l2(number), BlockNumHash::new(origin, l1_hash(origin)), 0)
    }

    fn pair(source: u64, derived: u64) -> DerivedRefPair {
        DerivedRefPair::new(l1(source), l2(derived))
    }

    /// Activation block 100 derived from L1 block 10, with unsafe blocks up to `unsafe_head`.
    fn setup(unsafe_head: u64) -> (TempDir, ChainDb) {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = ChainDb::new(1, &tmp_dir.path().join("chaindb")).expect("create db");
        db.initialise_log_storage(l2_ref(100, 10)).expect("initialise log storage");
        db.initialise_derivation_storage(pair(10, 100)).expect("initialise derivation storage");
        for number in 101..=unsafe_head {
            db.store_block_logs(&l2_ref(number, 10 + (number - 100) / 2), vec![])
                .expect("store block");
        }
        (tmp_dir, db)
    }

    fn promote_cross_unsafe(db: &ChainDb, to: u64) {
        let current = db.get_safety_head_ref(SafetyLevel::CrossUnsafe).unwrap().number;
        for number in current + 1..=to {
            db.update_current_cross_unsafe(&l2(number)).unwrap();
        }
    }

    fn head(db: &ChainDb, level: SafetyLevel) -> Option<u64> {
        db.get_super_head().unwrap().head(level).map(|block| block.number)
    }

    #[test]
    fn test_create_and_open_db() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db_path = tmp_dir.path().join("chaindb");
        assert!(ChainDb::new(1, &db_path).is_ok());
        assert!(ChainDb::new(1, &db_path).is_ok(), "Should reopen the existing database");
    }

    #[test]
    fn test_super_head_empty() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = ChainDb::new(1, &tmp_dir.path().join("chaindb")).expect("create db");

        assert_eq!(db.get_super_head().unwrap(), SuperHead::default());
        assert_eq!(db.get_latest_block().unwrap_err(), StorageError::DatabaseNotInitialised);
        assert_eq!(db.latest_derivation_state().unwrap_err(), StorageError::DatabaseNotInitialised);
    }

    #[test]
    fn test_log_storage() {
        let (_tmp, db) = setup(100);
        let message = ExecutingMessage {
            chain_id: 2,
            block_number: 7,
            log_index: 0,
            timestamp: 14,
            hash: B256::repeat_byte(9),
        };
        let logs = vec![
            Log { index: 0, hash: B256::repeat_byte(1), executing_message: None },
            Log { index: 1, hash: B256::repeat_byte(2), executing_message: Some(message) },
        ];
        db.store_block_logs(&l2_ref(101, 10), logs.clone()).expect("store logs");

        assert_eq!(db.get_logs(101).unwrap(), logs);
        assert_eq!(db.get_log(101, 1).unwrap(), logs[1]);
        assert_eq!(db.get_latest_block().unwrap(), l2_ref(101, 10));
        assert_eq!(head(&db, SafetyLevel::LocalUnsafe), Some(101));
        assert_eq!(head(&db, SafetyLevel::CrossUnsafe), Some(100));
    }

    #[test]
    fn test_initialise_derivation_requires_stored_block() {
        let tmp_dir = TempDir::new().expect("create temp dir");
        let db = ChainDb::new(1, &tmp_dir.path().join("chaindb")).expect("create db");

        assert_eq!(
            db.initialise_derivation_storage(pair(10, 100)).unwrap_err(),
            StorageError::FutureData
        );

        db.initialise_log_storage(l2_ref(100, 10)).unwrap();
        let mut wrong = pair(10, 100);
        wrong.derived.hash = B256::repeat_byte(0xff);
        assert_eq!(db.initialise_derivation_storage(wrong).unwrap_err(), StorageError::ConflictError);

        db.initialise_derivation_storage(pair(10, 100)).unwrap();
        let super_head = db.get_super_head().unwrap();
        assert_eq!(super_head.local_safe, Some(l2(100)));
        assert_eq!(super_head.cross_safe, Some(l2(100)));
        assert_eq!(super_head.l1_source, Some(l1(10)));
        assert!(super_head.is_ordered());
    }

    #[test]
    fn test_local_safe_is_bounded_by_cross_unsafe() {
        let (_tmp, db) = setup(104);

        db.save_derived_block(pair(11, 101)).unwrap();
        db.save_derived_block(pair(11, 102)).unwrap();
        assert_eq!(head(&db, SafetyLevel::LocalSafe), Some(100));

        promote_cross_unsafe(&db, 101);
        assert_eq!(head(&db, SafetyLevel::LocalSafe), Some(101));

        promote_cross_unsafe(&db, 104);
        assert_eq!(head(&db, SafetyLevel::LocalSafe), Some(102));
        assert!(db.get_super_head().unwrap().is_ordered());
    }

    #[test]
    fn test_save_derived_block_checks_log_storage() {
        let (_tmp, db) = setup(101);

        assert_eq!(db.save_derived_block(pair(11, 102)).unwrap_err(), StorageError::BlockOutOfOrder);

        db.save_derived_block(pair(11, 101)).unwrap();
        assert_eq!(db.save_derived_block(pair(11, 102)).unwrap_err(), StorageError::FutureData);

        // nothing was kept from the failed write
        assert_eq!(db.latest_derivation_state().unwrap(), pair(11, 101));

        db.store_block_logs(&l2_ref(102, 11), vec![]).unwrap();
        let mut forked = pair(11, 102);
        forked.derived.hash = B256::repeat_byte(0xee);
        assert_eq!(db.save_derived_block(forked).unwrap_err(), StorageError::ReorgRequired);
    }

    #[test]
    fn test_update_current_cross_unsafe() {
        let (_tmp, db) = setup(102);

        assert_eq!(
            db.update_current_cross_unsafe(&l2(102)).unwrap_err(),
            StorageError::ConflictError,
            "must extend the current head"
        );

        let mut forked = l2(101);
        forked.hash = B256::repeat_byte(0xaa);
        assert_eq!(db.update_current_cross_unsafe(&forked).unwrap_err(), StorageError::ConflictError);

        db.update_current_cross_unsafe(&l2(101)).unwrap();
        assert_eq!(db.get_safety_head_ref(SafetyLevel::CrossUnsafe).unwrap(), l2(101));
    }

    #[test]
    fn test_update_current_cross_safe() {
        let (_tmp, db) = setup(103);
        db.save_derived_block(pair(11, 101)).unwrap();
        db.save_derived_block(pair(12, 102)).unwrap();

        assert_eq!(
            db.update_current_cross_safe(&l2(101)).unwrap_err(),
            StorageError::FutureData,
            "local safe is still at the activation block"
        );

        promote_cross_unsafe(&db, 103);
        let promoted = db.update_current_cross_safe(&l2(101)).unwrap();
        assert_eq!(promoted, pair(11, 101));

        assert_eq!(db.update_current_cross_safe(&l2(101)).unwrap_err(), StorageError::ConflictError);
        assert_eq!(db.update_current_cross_safe(&l2(102)).unwrap(), pair(12, 102));
        assert_eq!(db.update_current_cross_safe(&l2(103)).unwrap_err(), StorageError::FutureData);
        assert!(db.get_super_head().unwrap().is_ordered());
    }

    #[test]
    fn test_all_safe_derived_at_source() {
        let (_tmp, db) = setup(104);
        db.save_derived_block(pair(11, 101)).unwrap();
        db.save_derived_block(pair(11, 102)).unwrap();
        db.save_source_block(l1(12)).unwrap();
        db.save_derived_block(pair(13, 103)).unwrap();

        assert_eq!(db.latest_derived_block_at_source(l1(10).id()).unwrap(), l2(100));
        assert_eq!(db.latest_derived_block_at_source(l1(11).id()).unwrap(), l2(102));
        assert_eq!(db.latest_derived_block_at_source(l1(12).id()).unwrap(), l2(102));
        assert_eq!(db.latest_derived_block_at_source(l1(13).id()).unwrap(), l2(103));
        assert_eq!(
            db.latest_derived_block_at_source(l1(14).id()).unwrap_err(),
            StorageError::FutureData
        );
        assert_eq!(db.derived_to_source(l2(102).id()).unwrap(), l1(11));
        assert_eq!(db.get_source_block(12).unwrap(), l1(12));
        assert_eq!(db.get_activation_block().unwrap(), l2(100));
    }

    #[test]
    fn test_update_finalized_using_source() {
        let (_tmp, db) = setup(104);
        db.save_derived_block(pair(11, 101)).unwrap();
        db.save_derived_block(pair(12, 102)).unwrap();
        db.save_derived_block(pair(13, 103)).unwrap();
        promote_cross_unsafe(&db, 104);
        db.update_current_cross_safe(&l2(101)).unwrap();

        // derived up to 102 from L1 block 12, but cross-safe is only at 101
        assert_eq!(db.update_finalized_using_source(l1(12)).unwrap(), l2(101));

        db.update_current_cross_safe(&l2(102)).unwrap();
        db.update_current_cross_safe(&l2(103)).unwrap();
        assert_eq!(db.update_finalized_using_source(l1(12)).unwrap(), l2(102));

        // an older finalized L1 block never moves the head back
        assert_eq!(db.update_finalized_using_source(l1(11)).unwrap(), l2(102));

        let mut forked = l1(13);
        forked.hash = B256::repeat_byte(0xcc);
        assert_eq!(db.update_finalized_using_source(forked).unwrap_err(), StorageError::ConflictError);
        assert!(db.get_super_head().unwrap().is_ordered());
    }

    #[test]
    fn test_rewind_moves_heads_back() {
        let (_tmp, db) = setup(106);
        for (source, derived) in [(11, 101), (11, 102), (12, 103), (12, 104)] {
            db.save_derived_block(pair(source, derived)).unwrap();
        }
        promote_cross_unsafe(&db, 105);
        for number in 101..=104 {
            db.update_current_cross_safe(&l2(number)).unwrap();
        }
        db.update_finalized_using_source(l1(12)).unwrap();

        db.rewind(&l2(102).id()).unwrap();

        let super_head = db.get_super_head().unwrap();
        assert_eq!(super_head.local_unsafe, Some(l2(102)));
        assert_eq!(super_head.cross_unsafe, Some(l2(102)));
        assert_eq!(super_head.local_safe, Some(l2(102)));
        assert_eq!(super_head.cross_safe, Some(l2(102)));
        assert_eq!(super_head.finalized, Some(l2(102)));
        assert_eq!(super_head.l1_source, Some(l1(11)));
        assert!(super_head.is_ordered());

        assert!(matches!(db.get_block(103).unwrap_err(), StorageError::EntryNotFound(_)));
        db.store_block_logs(&l2_ref(103, 11), vec![]).unwrap();
    }

    #[test]
    fn test_rewind_rejects_unknown_target() {
        let (_tmp, db) = setup(103);
        let mut forked = l2(102);
        forked.hash = B256::repeat_byte(0x42);

        assert_eq!(db.rewind(&forked.id()).unwrap_err(), StorageError::ConflictError);
        assert_eq!(db.get_latest_block().unwrap().number(), 103);
    }

    #[test]
    fn test_rewind_to_source_keeps_unsafe_blocks() {
        let (_tmp, db) = setup(105);
        for (source, derived) in [(11, 101), (12, 102), (13, 103), (13, 104)] {
            db.save_derived_block(pair(source, derived)).unwrap();
        }
        promote_cross_unsafe(&db, 105);
        for number in 101..=104 {
            db.update_current_cross_safe(&l2(number)).unwrap();
        }

        let latest = db.rewind_to_source(&l1(12).id()).unwrap();
        assert_eq!(latest, Some(l2(102)));

        let super_head = db.get_super_head().unwrap();
        assert_eq!(super_head.local_unsafe, Some(l2(105)));
        assert_eq!(super_head.cross_unsafe, Some(l2(105)));
        assert_eq!(super_head.local_safe, Some(l2(102)));
        assert_eq!(super_head.cross_safe, Some(l2(102)));
        assert_eq!(super_head.l1_source, Some(l1(12)));
        assert!(super_head.is_ordered());
    }

    #[test]
    fn test_rewind_to_source_before_activation_removes_safe_heads() {
        let (_tmp, db) = setup(101);

        let latest = db.rewind_to_source(&l1(9).id()).unwrap();
        assert_eq!(latest, None);

        let super_head = db.get_super_head().unwrap();
        assert_eq!(super_head.local_unsafe, Some(l2(101)));
        assert_eq!(super_head.local_safe, None);
        assert_eq!(super_head.cross_safe, None);
        assert_eq!(super_head.l1_source, None);
        assert!(super_head.is_ordered());
    }

    #[test]
    fn test_l1_blocks() {
        let (_tmp, db) = setup(100);
        for number in 10..=13 {
            db.save_l1_block(l1(number)).unwrap();
        }
        assert_eq!(db.get_l1_block(12).unwrap(), l1(12));

        db.rewind_l1(11).unwrap();
        assert!(matches!(db.get_l1_block(12).unwrap_err(), StorageError::EntryNotFound(_)));
        assert_eq!(db.get_l1_block(11).unwrap(), l1(11));

        db.prune_l1_blocks_below(11).unwrap();
        assert!(matches!(db.get_l1_block(10).unwrap_err(), StorageError::EntryNotFound(_)));
        assert_eq!(db.get_l1_block(11).unwrap(), l1(11));
    }

    #[test]
    fn test_clear() {
        let (_tmp, db) = setup(103);
        db.save_l1_block(l1(10)).unwrap();

        db.clear().unwrap();

        assert_eq!(db.get_super_head().unwrap(), SuperHead::default());
        assert_eq!(db.get_latest_block().unwrap_err(), StorageError::DatabaseNotInitialised);
        assert!(db.get_l1_block(10).is_err());

        db.initialise_log_storage(l2_ref(100, 10)).unwrap();
        assert_eq!(head(&db, SafetyLevel::LocalUnsafe), Some(100));
    }

    #[test]
    fn test_report_metrics_does_not_panic() {
        let (_tmp, db) = setup(101);
        db.report_metrics();
    }
}
