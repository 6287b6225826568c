use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, RwLock},
};

use crate::{
    CrossChainSafetyProvider, FinalizedL1Storage, HeadRefStorageReader, LogStorageReader, Metrics,
    chaindb::ChainDb, error::StorageError,
};
use alloy_primitives::ChainId;
use interop_supervisor_metrics::{MetricsReporter, observe_metrics_for_result};
use interop_supervisor_types::{BlockRef, Log, SafetyLevel};
use tracing::{debug, error};

/// Factory for managing multiple chain databases.
/// This struct allows for the creation and retrieval of `ChainDb` instances
/// based on chain IDs, ensuring that each chain has its own database instance.
#[derive(Debug)]
pub struct ChainDbFactory {
    db_path: PathBuf,
    metrics_enabled: Option<bool>,

    dbs: RwLock<HashMap<ChainId, Arc<ChainDb>>>,
    /// Finalized L1 block shared by all chains.
    /// In-memory only, not persisted.
    finalized_l1: RwLock<Option<BlockRef>>,
}

impl ChainDbFactory {
    /// Create a new, empty factory.
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            metrics_enabled: None,
            dbs: RwLock::new(HashMap::new()),
            finalized_l1: RwLock::new(None),
        }
    }

    /// Enables metrics on the database environment.
    pub const fn with_metrics(mut self) -> Self {
        self.metrics_enabled = Some(true);
        self
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
                f()
            )
        } else {
            f()
        }
    }

    /// Get or create a [`ChainDb`] for the given chain id.
    ///
    /// If the database does not exist, it will be created at the path `self.db_path/<chain_id>`.
    pub fn get_or_create_db(&self, chain_id: ChainId) -> Result<Arc<ChainDb>, StorageError> {
        {
            let dbs = self.dbs.read().map_err(|err| {
                error!(target: "supervisor::storage", %err, "Failed to acquire read lock on databases");
                StorageError::LockPoisoned
            })?;
            if let Some(db) = dbs.get(&chain_id) {
                return Ok(db.clone());
            }
        }

        let mut dbs = self.dbs.write().map_err(|err| {
            error!(target: "supervisor::storage", %err, "Failed to acquire write lock on databases");
            StorageError::LockPoisoned
        })?;
        // another thread may have created it in between
        if let Some(db) = dbs.get(&chain_id) {
            return Ok(db.clone());
        }

        let chain_db_path = self.db_path.join(chain_id.to_string());
        let mut chain_db = ChainDb::new(chain_id, chain_db_path.as_path())?;
        if self.metrics_enabled.unwrap_or(false) {
            chain_db = chain_db.with_metrics();
        }
        debug!(target: "supervisor::storage", %chain_id, path = %chain_db_path.display(), "Opened chain database");

        let db = Arc::new(chain_db);
        dbs.insert(chain_id, db.clone());
        Ok(db)
    }

    /// Get a [`ChainDb`] for the given chain id.
    ///
    /// Fails with [`StorageError::DatabaseNotInitialised`] if the chain is not part of the
    /// dependency set.
    pub fn get_db(&self, chain_id: ChainId) -> Result<Arc<ChainDb>, StorageError> {
        let dbs = self.dbs.read().map_err(|_| StorageError::LockPoisoned)?;
        dbs.get(&chain_id).cloned().ok_or(StorageError::DatabaseNotInitialised)
    }

    /// Returns the ids of all opened chains, sorted.
    pub fn chain_ids(&self) -> Result<Vec<ChainId>, StorageError> {
        let dbs = self.dbs.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut ids: Vec<_> = dbs.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

impl MetricsReporter for ChainDbFactory {
    fn report_metrics(&self) {
        if !self.metrics_enabled.unwrap_or(false) {
            return;
        }
        let dbs: Vec<Arc<ChainDb>> = match self.dbs.read() {
            Ok(dbs_guard) => dbs_guard.values().cloned().collect(),
            Err(_) => {
                error!(target: "supervisor::storage", "Failed to acquire read lock for metrics reporting");
                return;
            }
        };
        for db in dbs {
            db.report_metrics();
        }
    }
}

impl FinalizedL1Storage for ChainDbFactory {
    fn get_finalized_l1(&self) -> Result<BlockRef, StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_GET_FINALIZED_L1, || {
            let guard = self.finalized_l1.read().map_err(|err| {
                error!(target: "supervisor::storage", %err, "Failed to acquire read lock on finalized_l1");
                StorageError::LockPoisoned
            })?;
            (*guard).ok_or(StorageError::FutureData)
        })
    }

    fn update_finalized_l1(&self, block: BlockRef) -> Result<(), StorageError> {
        self.observe_call(Metrics::STORAGE_METHOD_UPDATE_FINALIZED_L1, || {
            let mut guard = self.finalized_l1.write().map_err(|err| {
                error!(target: "supervisor::storage", %err, "Failed to acquire write lock on finalized_l1");
                StorageError::LockPoisoned
            })?;

            if let Some(current) = *guard {
                if current == block {
                    return Ok(());
                }
                if block.number <= current.number {
                    error!(
                        target: "supervisor::storage",
                        current_block_number = current.number,
                        new_block_number = block.number,
                        "New finalized block number is not greater than current finalized block number",
                    );
                    return Err(StorageError::BlockOutOfOrder);
                }
            }
            *guard = Some(block);
            Ok(())
        })
    }
}

impl CrossChainSafetyProvider for ChainDbFactory {
    fn get_block(&self, chain_id: ChainId, block_number: u64) -> Result<BlockRef, StorageError> {
        Ok(self.get_db(chain_id)?.get_block(block_number)?.block)
    }

    fn get_log(
        &self,
        chain_id: ChainId,
        block_number: u64,
        log_index: u32,
    ) -> Result<Log, StorageError> {
        self.get_db(chain_id)?.get_log(block_number, log_index)
    }

    fn get_block_logs(
        &self,
        chain_id: ChainId,
        block_number: u64,
    ) -> Result<Vec<Log>, StorageError> {
        self.get_db(chain_id)?.get_logs(block_number)
    }

    fn get_safety_head_ref(
        &self,
        chain_id: ChainId,
        level: SafetyLevel,
    ) -> Result<BlockRef, StorageError> {
        self.get_db(chain_id)?.get_safety_head_ref(level)
    }
}
