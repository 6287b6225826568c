use super::{EventHandler, send_command};
use crate::{
    ChainProcessorError, ProcessorState, chain_processor::Metrics, syncnode::ManagedNodeCommand,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_storage::{LogStorageReader, StorageError, StorageRewinder};
use interop_supervisor_types::BlockRef;
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

/// Handler for blocks that failed cross-safe validation.
///
/// The node is asked to replace the block, and storage is rewound to its parent so the
/// replacement can be indexed in its place. Until the replacement arrives, the invalidated block
/// is held in [`ProcessorState`] so local heads at or above it are not indexed again.
#[derive(Debug, Constructor)]
pub struct InvalidationHandler<W> {
    chain_id: ChainId,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    db_provider: Arc<W>,
    activation_block: u64,
}

#[async_trait]
impl<W> EventHandler<BlockRef> for InvalidationHandler<W>
where
    W: LogStorageReader + StorageRewinder + Send + Sync + 'static,
{
    async fn handle(
        &self,
        block: BlockRef,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        trace!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %block,
            "Processing block invalidation"
        );

        if state.is_suspended() {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = block.number,
                "Chain suspended for L1 reorg, dropping invalidation"
            );
            return Ok(());
        }

        let start = Instant::now();
        let result = self.inner_handle(block, state).await;
        Metrics::record_block_invalidation(self.chain_id, start, &result);
        result
    }
}

impl<W> InvalidationHandler<W>
where
    W: LogStorageReader + StorageRewinder + Send + Sync + 'static,
{
    /// Clears the pending invalidation once the node reports a replacement for it.
    pub fn handle_replacement(
        &self,
        replacement: BlockRef,
        invalidated: B256,
        state: &mut ProcessorState,
    ) {
        if state.take_invalidated(BlockNumHash { number: replacement.number, hash: invalidated }) {
            info!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %replacement,
                %invalidated,
                "Invalidated block replaced"
            );
        } else {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %replacement,
                %invalidated,
                "Replacement does not match the pending invalidation"
            );
        }
    }

    async fn inner_handle(
        &self,
        block: BlockRef,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        if block.number <= self.activation_block {
            return Err(ChainProcessorError::ActivationBlockInvalidation(block.number));
        }

        match self.db_provider.get_block(block.number) {
            Ok(stored) if stored.hash() == block.hash => {}
            Ok(_) | Err(StorageError::EntryNotFound(_)) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %block,
                    "Invalidated block no longer stored, ignoring"
                );
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        }

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %block,
            "Invalidating block with invalid executing messages"
        );

        self.db_provider.rewind(&BlockNumHash { number: block.number - 1, hash: block.parent_hash })?;
        state.set_invalidated(block);

        send_command(
            self.chain_id,
            &self.managed_node_sender,
            ManagedNodeCommand::InvalidateBlock { block },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use interop_supervisor_types::{L2BlockRef, Log};
    use mockall::{mock, predicate::eq};

    mock!(
        #[derive(Debug)]
        pub Db {}

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

    fn block() -> BlockRef {
        BlockRef::new(B256::repeat_byte(9), 9, B256::repeat_byte(8), 118)
    }

    fn stored(hash: B256) -> L2BlockRef {
        L2BlockRef::new(BlockRef { hash, ..block() }, BlockNumHash::default(), 0)
    }

    #[tokio::test]
    async fn test_rewinds_and_sends_invalidation() {
        let mut db = MockDb::new();
        db.expect_get_block().with(eq(9)).returning(|_| Ok(stored(block().hash)));
        db.expect_rewind()
            .withf(|to| *to == BlockNumHash { number: 8, hash: B256::repeat_byte(8) })
            .times(1)
            .returning(|_| Ok(()));

        let (tx, mut rx) = mpsc::channel(1);
        let handler = InvalidationHandler::new(1, tx, Arc::new(db), 0);
        let mut state = ProcessorState::new();
        handler.handle(block(), &mut state).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), ManagedNodeCommand::InvalidateBlock { block: block() });
        assert_eq!(state.invalidated(), Some(block()));
    }

    #[tokio::test]
    async fn test_pending_invalidation_cleared_by_replacement() {
        let mut db = MockDb::new();
        db.expect_get_block().returning(|_| Ok(stored(block().hash)));
        db.expect_rewind().returning(|_| Ok(()));

        let (tx, _rx) = mpsc::channel(1);
        let handler = InvalidationHandler::new(1, tx, Arc::new(db), 0);
        let mut state = ProcessorState::new();
        handler.handle(block(), &mut state).await.unwrap();

        let replacement = BlockRef::new(B256::repeat_byte(0x77), 9, B256::repeat_byte(8), 120);
        handler.handle_replacement(replacement, B256::repeat_byte(0x42), &mut state);
        assert_eq!(state.invalidated(), Some(block()));

        handler.handle_replacement(replacement, block().hash, &mut state);
        assert_eq!(state.invalidated(), None);
    }

    #[tokio::test]
    async fn test_replaced_block_is_ignored() {
        let mut db = MockDb::new();
        db.expect_get_block().returning(|_| Ok(stored(B256::repeat_byte(0x55))));
        db.expect_rewind().never();

        let (tx, mut rx) = mpsc::channel(1);
        let handler = InvalidationHandler::new(1, tx, Arc::new(db), 0);
        let mut state = ProcessorState::new();
        handler.handle(block(), &mut state).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(state.invalidated(), None);
    }

    #[tokio::test]
    async fn test_activation_block_cannot_be_invalidated() {
        let (tx, _rx) = mpsc::channel(1);
        let handler = InvalidationHandler::new(1, tx, Arc::new(MockDb::new()), 9);
        let err = handler.handle(block(), &mut ProcessorState::new()).await.unwrap_err();
        assert_eq!(err, ChainProcessorError::ActivationBlockInvalidation(9));
    }
}
