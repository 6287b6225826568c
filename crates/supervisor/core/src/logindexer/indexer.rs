use crate::syncnode::{BlockProvider, ManagedNodeError};
use alloy_primitives::ChainId;
use interop_supervisor_storage::{LogStorageWriter, StorageError};
use interop_supervisor_types::{ExecutingMessage, L2BlockRef, Log, log_hash};
use std::sync::Arc;
use thiserror::Error;
use tracing::trace;

/// The [`LogIndexer`] extracts [`Log`]s and [`ExecutingMessage`]s from L2 receipts and persists
/// them.
#[derive(Debug)]
pub struct LogIndexer<P, S> {
    /// The chain ID of the rollup.
    chain_id: ChainId,
    /// Component that provides receipts for a given block hash.
    block_provider: Arc<P>,
    /// Component that persists parsed log entries to storage.
    log_storage: Arc<S>,
}

impl<P, S> LogIndexer<P, S>
where
    P: BlockProvider + 'static,
    S: LogStorageWriter + 'static,
{
    /// Creates a new [`LogIndexer`].
    pub const fn new(chain_id: ChainId, block_provider: Arc<P>, log_storage: Arc<S>) -> Self {
        Self { chain_id, block_provider, log_storage }
    }

    /// Fetches the receipts of `block` and turns every log into an indexed [`Log`].
    ///
    /// Log indices run across all receipts of the block.
    pub async fn fetch_logs(&self, block: &L2BlockRef) -> Result<Vec<Log>, LogIndexerError> {
        let receipts = self.block_provider.fetch_receipts(block.hash()).await?;

        let logs = receipts
            .iter()
            .flat_map(|receipt| receipt.logs())
            .zip(0u32..)
            .map(|(log, index)| Log {
                index,
                hash: log_hash(log),
                executing_message: ExecutingMessage::from_log(log),
            })
            .collect::<Vec<_>>();

        trace!(
            target: "supervisor::log_indexer",
            chain_id = self.chain_id,
            block = %block,
            logs = logs.len(),
            "Indexed block logs"
        );
        Ok(logs)
    }

    /// Indexes the logs of `block` and stores them together with the block.
    pub async fn process_and_store_logs(&self, block: &L2BlockRef) -> Result<(), LogIndexerError> {
        let logs = self.fetch_logs(block).await?;
        self.log_storage.store_block_logs(block, logs)?;
        Ok(())
    }
}

/// Error type for the [`LogIndexer`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LogIndexerError {
    /// Failed to write processed logs for a block to storage.
    #[error(transparent)]
    StateWrite(#[from] StorageError),

    /// Failed to fetch receipts from the managed node.
    #[error(transparent)]
    FetchReceipt(#[from] ManagedNodeError),
}
