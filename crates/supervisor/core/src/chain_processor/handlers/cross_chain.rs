use super::{EventHandler, send_command};
use crate::{
    ChainProcessorError, ProcessorState, chain_processor::Metrics, syncnode::ManagedNodeCommand,
};
use alloy_primitives::ChainId;
use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_storage::{HeadRefStorageWriter, StorageError};
use interop_supervisor_types::{BlockRef, SafetyLevel};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Handler for blocks promoted by the cross-safety checker.
///
/// Moves the cross-unsafe or cross-safe head one block forward and tells the node. Promotions
/// that do not extend the current head are stale and get rejected.
#[derive(Debug, Constructor)]
pub struct SafetyPromotionHandler<W> {
    chain_id: ChainId,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    db_provider: Arc<W>,
}

#[async_trait]
impl<W> EventHandler<(SafetyLevel, BlockRef)> for SafetyPromotionHandler<W>
where
    W: HeadRefStorageWriter + Send + Sync + 'static,
{
    async fn handle(
        &self,
        (level, block): (SafetyLevel, BlockRef),
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        trace!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %level,
            %block,
            "Processing safety promotion"
        );

        if state.is_suspended() {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %level,
                block_number = block.number,
                "Chain suspended for L1 reorg, dropping promotion"
            );
            return Ok(());
        }

        let result = self.inner_handle(level, block).await;
        let block_type = match level {
            SafetyLevel::CrossSafe => Metrics::BLOCK_TYPE_CROSS_SAFE,
            _ => Metrics::BLOCK_TYPE_CROSS_UNSAFE,
        };
        Metrics::record_block_processing(self.chain_id, block_type, &block, &result);
        result
    }
}

impl<W> SafetyPromotionHandler<W>
where
    W: HeadRefStorageWriter + Send + Sync + 'static,
{
    async fn inner_handle(
        &self,
        level: SafetyLevel,
        block: BlockRef,
    ) -> Result<(), ChainProcessorError> {
        let command = match level {
            SafetyLevel::CrossUnsafe => {
                self.db_provider
                    .update_current_cross_unsafe(&block)
                    .map_err(|err| self.reject(level, &block, err))?;
                ManagedNodeCommand::UpdateCrossUnsafe { block_id: block.id() }
            }
            SafetyLevel::CrossSafe => {
                let pair = self
                    .db_provider
                    .update_current_cross_safe(&block)
                    .map_err(|err| self.reject(level, &block, err))?;
                ManagedNodeCommand::UpdateCrossSafe {
                    derived: pair.derived.id(),
                    source: pair.source.id(),
                }
            }
            _ => {
                warn!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %level,
                    block_number = block.number,
                    "Only cross-unsafe and cross-safe can be promoted"
                );
                return Err(ChainProcessorError::PromotionRejected {
                    level,
                    block_number: block.number,
                });
            }
        };

        send_command(self.chain_id, &self.managed_node_sender, command).await
    }

    /// Stale promotions turn into a rejection; anything else is a storage failure.
    fn reject(&self, level: SafetyLevel, block: &BlockRef, err: StorageError) -> ChainProcessorError {
        match err {
            StorageError::ConflictError | StorageError::FutureData | StorageError::EntryNotFound(_) => {
                warn!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %level,
                    %block,
                    %err,
                    "Rejected stale promotion"
                );
                ChainProcessorError::PromotionRejected { level, block_number: block.number }
            }
            err => err.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use interop_supervisor_types::DerivedRefPair;
    use mockall::mock;

    mock!(
        #[derive(Debug)]
        pub Db {}

        impl HeadRefStorageWriter for Db {
            fn update_finalized_using_source(&self, finalized_l1: BlockRef) -> Result<BlockRef, StorageError>;
            fn update_current_cross_unsafe(&self, block: &BlockRef) -> Result<(), StorageError>;
            fn update_current_cross_safe(&self, block: &BlockRef) -> Result<DerivedRefPair, StorageError>;
        }
    );

    fn block() -> BlockRef {
        BlockRef::new(B256::repeat_byte(7), 7, B256::repeat_byte(6), 114)
    }

    #[tokio::test]
    async fn test_cross_unsafe_promotion_updates_node() {
        let mut db = MockDb::new();
        db.expect_update_current_cross_unsafe()
            .withf(|b| *b == block())
            .times(1)
            .returning(|_| Ok(()));

        let (tx, mut rx) = mpsc::channel(1);
        let handler = SafetyPromotionHandler::new(1, tx, Arc::new(db));
        handler
            .handle((SafetyLevel::CrossUnsafe, block()), &mut ProcessorState::new())
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ManagedNodeCommand::UpdateCrossUnsafe { block_id: block().id() }
        );
    }

    #[tokio::test]
    async fn test_cross_safe_promotion_updates_node_with_source() {
        let source = BlockRef::new(B256::repeat_byte(0xaa), 3, B256::ZERO, 36);
        let mut db = MockDb::new();
        db.expect_update_current_cross_safe()
            .returning(move |b| Ok(DerivedRefPair::new(source, *b)));

        let (tx, mut rx) = mpsc::channel(1);
        let handler = SafetyPromotionHandler::new(1, tx, Arc::new(db));
        handler
            .handle((SafetyLevel::CrossSafe, block()), &mut ProcessorState::new())
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ManagedNodeCommand::UpdateCrossSafe { derived: block().id(), source: source.id() }
        );
    }

    #[tokio::test]
    async fn test_stale_promotion_is_rejected_without_fault() {
        let mut db = MockDb::new();
        db.expect_update_current_cross_safe().returning(|_| Err(StorageError::ConflictError));

        let (tx, mut rx) = mpsc::channel(1);
        let handler = SafetyPromotionHandler::new(1, tx, Arc::new(db));
        let err = handler
            .handle((SafetyLevel::CrossSafe, block()), &mut ProcessorState::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ChainProcessorError::PromotionRejected { level: SafetyLevel::CrossSafe, block_number: 7 }
        );
        assert!(!err.is_fatal());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_other_levels_are_rejected() {
        let (tx, _rx) = mpsc::channel(1);
        let handler = SafetyPromotionHandler::new(1, tx, Arc::new(MockDb::new()));
        let err = handler
            .handle((SafetyLevel::Finalized, block()), &mut ProcessorState::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ChainProcessorError::PromotionRejected { .. }));
    }

    #[tokio::test]
    async fn test_dropped_while_suspended() {
        let mut db = MockDb::new();
        db.expect_update_current_cross_unsafe().never();

        let (tx, _rx) = mpsc::channel(1);
        let handler = SafetyPromotionHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        state.suspend(Default::default());
        handler.handle((SafetyLevel::CrossUnsafe, block()), &mut state).await.unwrap();
        assert_eq!(state.deferred_len(), 0);
    }
}
