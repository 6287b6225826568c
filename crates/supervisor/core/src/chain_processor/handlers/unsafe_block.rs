use super::EventHandler;
use crate::{
    ChainProcessorError, LogIndexer, ProcessorState, chain_processor::Metrics,
    syncnode::BlockProvider,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use async_trait::async_trait;
use interop_supervisor_storage::{LogStorage, StorageError, StorageRewinder};
use interop_supervisor_types::{InteropValidator, L2BlockRef};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Handler for new local-unsafe heads.
///
/// Extends log storage block by block, filling gaps from the managed node and rolling storage
/// back to the common ancestor when the node's chain diverged from the stored one.
#[derive(Debug)]
pub struct UnsafeBlockHandler<P, W, V> {
    chain_id: ChainId,
    validator: Arc<V>,
    block_provider: Arc<P>,
    db_provider: Arc<W>,
    log_indexer: Arc<LogIndexer<P, W>>,
    activation_block: u64,
    lookback: u64,
}

#[async_trait]
impl<P, W, V> EventHandler<L2BlockRef> for UnsafeBlockHandler<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage + StorageRewinder + Send + Sync + 'static,
{
    async fn handle(
        &self,
        block: L2BlockRef,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        trace!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %block,
            "Processing unsafe block"
        );

        if state.is_suspended() {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = block.number(),
                "Chain suspended for L1 reorg, dropping unsafe head"
            );
            return Ok(());
        }

        if let Some(invalidated) =
            state.invalidated().filter(|invalidated| block.number() >= invalidated.number)
        {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = block.number(),
                invalidated = invalidated.number,
                "Awaiting replacement of invalidated block, dropping unsafe head"
            );
            return Ok(());
        }

        let result = self.apply(block).await;
        Metrics::record_block_processing(
            self.chain_id,
            Metrics::BLOCK_TYPE_LOCAL_UNSAFE,
            &block.block,
            &result,
        );
        result
    }
}

impl<P, W, V> UnsafeBlockHandler<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage + StorageRewinder + Send + Sync + 'static,
{
    /// Creates a new [`UnsafeBlockHandler`].
    ///
    /// Reorgs are searched for at most `lookback` blocks below the stored head, and never below
    /// `activation_block`.
    pub const fn new(
        chain_id: ChainId,
        validator: Arc<V>,
        block_provider: Arc<P>,
        db_provider: Arc<W>,
        log_indexer: Arc<LogIndexer<P, W>>,
        activation_block: u64,
        lookback: u64,
    ) -> Self {
        Self {
            chain_id,
            validator,
            block_provider,
            db_provider,
            log_indexer,
            activation_block,
            lookback,
        }
    }

    /// Fetches the node's block at `number` and applies it as the new unsafe head.
    pub(crate) async fn sync_block(&self, number: u64) -> Result<L2BlockRef, ChainProcessorError> {
        let block = self.block_provider.block_by_number(number).await?;
        self.apply(block).await?;
        Ok(block)
    }

    async fn apply(&self, block: L2BlockRef) -> Result<(), ChainProcessorError> {
        if block.number() < self.activation_block {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = block.number(),
                activation_block = self.activation_block,
                "Ignoring pre-interop block"
            );
            return Ok(());
        }

        let latest = match self.db_provider.get_latest_block() {
            Ok(latest) => latest,
            Err(StorageError::DatabaseNotInitialised) => {
                return self.initialise(block).await;
            }
            Err(err) => return Err(err.into()),
        };

        if block.number() <= latest.number() {
            let stored = self.db_provider.get_block(block.number())?;
            if stored == block {
                trace!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    block_number = block.number(),
                    "Unsafe block already stored"
                );
                return Ok(());
            }
            return self.reconcile(block, latest).await;
        }

        if latest.block.is_parent_of(&block.block) {
            self.log_indexer.process_and_store_logs(&block).await?;
            return Ok(());
        }

        if block.number() > latest.number() + 1 {
            let next = self.block_provider.block_by_number(latest.number() + 1).await?;
            if latest.block.is_parent_of(&next.block) {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    from = next.number(),
                    to = block.number(),
                    "Filling gap in unsafe chain"
                );
                return self.catch_up(next.number(), block).await;
            }
        }

        self.reconcile(block, latest).await
    }

    /// Seeds log storage with the activation block, then catches up to `block`.
    async fn initialise(&self, block: L2BlockRef) -> Result<(), ChainProcessorError> {
        let activation = if block.number() == self.activation_block {
            block
        } else {
            self.block_provider.block_by_number(self.activation_block).await?
        };

        if !self.validator.is_interop_activation_block(self.chain_id, activation.block) {
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block = %activation,
                "Block at activation height does not match the interop activation time"
            );
            return Err(ChainProcessorError::InvalidActivationBlock(activation.number()));
        }

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            block = %activation,
            "Initialising log storage at interop activation block"
        );
        self.db_provider.initialise_log_storage(activation).inspect_err(|err| {
            error!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %err,
                "Failed to initialise log storage"
            );
        })?;

        if block.number() > activation.number() {
            self.catch_up(activation.number() + 1, block).await?;
        }
        Ok(())
    }

    /// Stores the node's blocks from `from` up to `head`, then `head` itself.
    async fn catch_up(&self, from: u64, head: L2BlockRef) -> Result<(), ChainProcessorError> {
        for number in from..head.number() {
            let block = self.block_provider.block_by_number(number).await?;
            self.log_indexer.process_and_store_logs(&block).await?;
        }
        self.log_indexer.process_and_store_logs(&head).await?;
        Ok(())
    }

    /// Rolls log storage back to the highest block the node still agrees with, then replays the
    /// node's chain up to `block`.
    async fn reconcile(
        &self,
        block: L2BlockRef,
        latest: L2BlockRef,
    ) -> Result<(), ChainProcessorError> {
        let parent_number = block.number().checked_sub(1);
        let start = latest.number().min(block.number().saturating_sub(1));
        let floor = latest.number().saturating_sub(self.lookback).max(self.activation_block);

        let mut ancestor = None;
        for number in (floor..=start).rev() {
            let stored = self.db_provider.get_block(number)?;
            let canonical = if Some(number) == parent_number {
                // the incoming block names its parent, no need to ask the node
                if stored.hash() == block.block.parent_hash {
                    ancestor = Some(stored);
                    break;
                }
                continue;
            } else {
                self.block_provider.block_by_number(number).await?
            };
            if canonical.hash() == stored.hash() {
                ancestor = Some(stored);
                break;
            }
        }

        let Some(ancestor) = ancestor else {
            error!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %block,
                floor,
                "No common ancestor within lookback window"
            );
            return Err(ChainProcessorError::IrrecoverableGap {
                block_number: block.number(),
                floor,
            });
        };

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %ancestor,
            stored_head = %latest,
            incoming = %block,
            "Unsafe chain diverged, rewinding to common ancestor"
        );

        self.db_provider.rewind(&BlockNumHash { number: ancestor.number(), hash: ancestor.hash() })?;
        self.catch_up(ancestor.number() + 1, block).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncnode::MockBlockProvider;
    use alloy_primitives::B256;
    use interop_supervisor_storage::{LogStorageReader, LogStorageWriter};
    use interop_supervisor_types::{BlockRef, InteropValidationError, Log};
    use mockall::{mock, predicate::eq};
    use std::sync::Arc;

    mock!(
        #[derive(Debug)]
        pub Validator {}

        impl InteropValidator for Validator {
            fn validate_interop_timestamps(
                &self,
                initiating_chain_id: ChainId,
                initiating_timestamp: u64,
                executing_chain_id: ChainId,
                executing_timestamp: u64,
                timeout: Option<u64>,
            ) -> Result<(), InteropValidationError>;

            fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool;

            fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockRef) -> bool;
        }
    );

    mock!(
        #[derive(Debug)]
        pub Db {}

        impl LogStorageWriter for Db {
            fn initialise_log_storage(&self, activation: L2BlockRef) -> Result<(), StorageError>;
            fn store_block_logs(&self, block: &L2BlockRef, logs: Vec<Log>) -> Result<(), StorageError>;
        }

        impl LogStorageReader for Db {
            fn get_latest_block(&self) -> Result<L2BlockRef, StorageError>;
            fn get_block(&self, number: u64) -> Result<L2BlockRef, StorageError>;
            fn get_log(&self, block_number: u64, log_index: u32) -> Result<Log, StorageError>;
            fn get_logs(&self, block_number: u64) -> Result<Vec<Log>, StorageError>;
        }

        impl StorageRewinder for Db {
            fn rewind(&self, to: &BlockNumHash) -> Result<(), StorageError>;
            fn rewind_to_source(&self, l1_ancestor: &BlockNumHash) -> Result<Option<BlockRef>, StorageError>;
            fn rewind_l1(&self, l1_ancestor: u64) -> Result<(), StorageError>;
            fn clear(&self) -> Result<(), StorageError>;
        }
    );

    const CHAIN_ID: ChainId = 10;

    fn block(number: u64, fork: u8) -> L2BlockRef {
        let hash = |n: u64, f: u8| {
            let mut bytes = [0u8; 32];
            bytes[..8].copy_from_slice(&n.to_be_bytes());
            bytes[8] = if n == 0 { 0 } else { f };
            B256::from(bytes)
        };
        let parent_fork = if number == 0 { 0 } else { fork };
        L2BlockRef::new(
            BlockRef::new(
                hash(number, fork),
                number,
                hash(number.saturating_sub(1), parent_fork),
                1000 + number * 2,
            ),
            BlockNumHash { number: 1, hash: B256::ZERO },
            0,
        )
    }

    fn handler(
        node: MockBlockProvider,
        db: MockDb,
        validator: MockValidator,
        lookback: u64,
    ) -> UnsafeBlockHandler<MockBlockProvider, MockDb, MockValidator> {
        let node = Arc::new(node);
        let db = Arc::new(db);
        let log_indexer = Arc::new(LogIndexer::new(CHAIN_ID, node.clone(), db.clone()));
        UnsafeBlockHandler::new(CHAIN_ID, Arc::new(validator), node, db, log_indexer, 0, lookback)
    }

    fn no_receipts(node: &mut MockBlockProvider) {
        node.expect_fetch_receipts().returning(|_| Ok(Vec::new()));
    }

    #[tokio::test]
    async fn test_stores_child_of_latest() {
        let mut node = MockBlockProvider::new();
        no_receipts(&mut node);
        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Ok(block(5, 1)));
        db.expect_store_block_logs()
            .withf(|b, logs| *b == block(6, 1) && logs.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let handler = handler(node, db, MockValidator::new(), 16);
        let mut state = ProcessorState::new();
        handler.handle(block(6, 1), &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_block_is_noop() {
        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Ok(block(5, 1)));
        db.expect_get_block().with(eq(4)).returning(|_| Ok(block(4, 1)));
        db.expect_store_block_logs().never();

        let handler = handler(MockBlockProvider::new(), db, MockValidator::new(), 16);
        let mut state = ProcessorState::new();
        handler.handle(block(4, 1), &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_while_suspended() {
        let mut db = MockDb::new();
        db.expect_get_latest_block().never();

        let handler = handler(MockBlockProvider::new(), db, MockValidator::new(), 16);
        let mut state = ProcessorState::new();
        state.suspend(BlockNumHash::default());
        handler.handle(block(6, 1), &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_initialises_at_activation_and_catches_up() {
        let mut node = MockBlockProvider::new();
        no_receipts(&mut node);
        node.expect_block_by_number().returning(|n| Ok(block(n, 1)));

        let mut validator = MockValidator::new();
        validator
            .expect_is_interop_activation_block()
            .withf(|_, b| b.number == 0)
            .returning(|_, _| true);

        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Err(StorageError::DatabaseNotInitialised));
        db.expect_initialise_log_storage()
            .with(eq(block(0, 1)))
            .times(1)
            .returning(|_| Ok(()));
        db.expect_store_block_logs().times(2).returning(|_, _| Ok(()));

        let handler = handler(node, db, validator, 16);
        let mut state = ProcessorState::new();
        handler.handle(block(2, 1), &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_mismatching_activation_block() {
        let mut validator = MockValidator::new();
        validator.expect_is_interop_activation_block().returning(|_, _| false);

        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Err(StorageError::DatabaseNotInitialised));
        db.expect_initialise_log_storage().never();

        let handler = handler(MockBlockProvider::new(), db, validator, 16);
        let mut state = ProcessorState::new();
        let err = handler.handle(block(0, 1), &mut state).await.unwrap_err();
        assert_eq!(err, ChainProcessorError::InvalidActivationBlock(0));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_fills_gap_from_node() {
        let mut node = MockBlockProvider::new();
        no_receipts(&mut node);
        node.expect_block_by_number().returning(|n| Ok(block(n, 1)));

        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Ok(block(5, 1)));
        db.expect_store_block_logs().times(3).returning(|_, _| Ok(()));

        let handler = handler(node, db, MockValidator::new(), 16);
        let mut state = ProcessorState::new();
        handler.handle(block(8, 1), &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_rewinds_to_common_ancestor() {
        // stored chain is fork 1 up to 6; the node switched to fork 2 from block 5
        let mut node = MockBlockProvider::new();
        no_receipts(&mut node);
        node.expect_block_by_number()
            .returning(|n| Ok(if n >= 5 { block(n, 2) } else { block(n, 1) }));

        let mut incoming = block(6, 2);
        incoming.block.parent_hash = block(5, 2).hash();

        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Ok(block(6, 1)));
        db.expect_get_block().returning(|n| Ok(block(n, 1)));
        db.expect_rewind()
            .withf(|to| to.number == 4 && to.hash == block(4, 1).hash())
            .times(1)
            .returning(|_| Ok(()));
        db.expect_store_block_logs().times(2).returning(|_, _| Ok(()));

        let handler = handler(node, db, MockValidator::new(), 16);
        let mut state = ProcessorState::new();
        handler.handle(incoming, &mut state).await.unwrap();
    }

    #[tokio::test]
    async fn test_gap_beyond_lookback_is_fatal() {
        let mut node = MockBlockProvider::new();
        node.expect_block_by_number().returning(|n| Ok(block(n, 2)));

        let mut db = MockDb::new();
        db.expect_get_latest_block().returning(|| Ok(block(10, 1)));
        db.expect_get_block().returning(|n| Ok(block(n, 1)));
        db.expect_rewind().never();

        let handler = handler(node, db, MockValidator::new(), 3);
        let mut state = ProcessorState::new();
        let err = handler.handle(block(11, 2), &mut state).await.unwrap_err();
        assert_eq!(err, ChainProcessorError::IrrecoverableGap { block_number: 11, floor: 7 });
        assert!(err.is_fatal());
    }
}
