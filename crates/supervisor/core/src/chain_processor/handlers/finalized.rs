use super::{EventHandler, defer_event, send_command};
use crate::{
    ChainProcessorError, ProcessorState, chain_processor::Metrics, event::ChainEvent,
    syncnode::ManagedNodeCommand,
};
use alloy_primitives::ChainId;
use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_storage::{HeadRefStorageWriter, StorageError};
use interop_supervisor_types::BlockRef;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Handler for finalized L1 blocks.
///
/// The finalized L2 head is the latest derived block whose source is finalized, capped by the
/// cross-safe head. It is recomputed whenever either moves.
#[derive(Debug, Constructor)]
pub struct FinalizedHandler<W> {
    chain_id: ChainId,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    db_provider: Arc<W>,
}

#[async_trait]
impl<W> EventHandler<BlockRef> for FinalizedHandler<W>
where
    W: HeadRefStorageWriter + Send + Sync + 'static,
{
    async fn handle(
        &self,
        finalized_l1: BlockRef,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        trace!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %finalized_l1,
            "Processing finalized L1 block"
        );

        if state.is_suspended() {
            defer_event(self.chain_id, state, ChainEvent::FinalizedL1 { block: finalized_l1 });
            return Ok(());
        }

        state.set_finalized_l1(finalized_l1);
        self.refresh(state).await
    }
}

impl<W> FinalizedHandler<W>
where
    W: HeadRefStorageWriter + Send + Sync + 'static,
{
    /// Recomputes the finalized head from the latest finalized L1 block and pushes it to the
    /// node if it moved.
    pub async fn refresh(&self, state: &mut ProcessorState) -> Result<(), ChainProcessorError> {
        let Some(finalized_l1) = state.finalized_l1() else {
            return Ok(());
        };

        let result = self.db_provider.update_finalized_using_source(finalized_l1);
        let finalized = match result {
            Ok(block) => block,
            Err(
                StorageError::FutureData |
                StorageError::DatabaseNotInitialised |
                StorageError::EntryNotFound(_),
            ) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %finalized_l1,
                    "Nothing derived from finalized L1 yet"
                );
                return Ok(());
            }
            Err(err) => {
                Metrics::record_block_processing(
                    self.chain_id,
                    Metrics::BLOCK_TYPE_FINALIZED,
                    &finalized_l1,
                    &Err(()),
                );
                return Err(err.into());
            }
        };

        if !state.set_last_finalized(finalized) {
            return Ok(());
        }

        Metrics::record_block_processing(
            self.chain_id,
            Metrics::BLOCK_TYPE_FINALIZED,
            &finalized,
            &Ok::<_, ()>(()),
        );
        send_command(
            self.chain_id,
            &self.managed_node_sender,
            ManagedNodeCommand::UpdateFinalized { block_id: finalized.id() },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use interop_supervisor_types::DerivedRefPair;
    use mockall::{mock, predicate::eq};

    mock!(
        #[derive(Debug)]
        pub Db {}

        impl HeadRefStorageWriter for Db {
            fn update_finalized_using_source(&self, finalized_l1: BlockRef) -> Result<BlockRef, StorageError>;
            fn update_current_cross_unsafe(&self, block: &BlockRef) -> Result<(), StorageError>;
            fn update_current_cross_safe(&self, block: &BlockRef) -> Result<DerivedRefPair, StorageError>;
        }
    );

    fn l1(number: u64) -> BlockRef {
        BlockRef::new(B256::with_last_byte(number as u8), number, B256::ZERO, number * 12)
    }

    fn l2(number: u64) -> BlockRef {
        BlockRef::new(B256::repeat_byte(number as u8), number, B256::ZERO, number * 2)
    }

    #[tokio::test]
    async fn test_pushes_new_finalized_head_once() {
        let mut db = MockDb::new();
        db.expect_update_finalized_using_source()
            .with(eq(l1(5)))
            .times(2)
            .returning(|_| Ok(l2(20)));

        let (tx, mut rx) = mpsc::channel(4);
        let handler = FinalizedHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        handler.handle(l1(5), &mut state).await.unwrap();
        handler.refresh(&mut state).await.unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            ManagedNodeCommand::UpdateFinalized { block_id: l2(20).id() }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_nothing_derived_yet() {
        let mut db = MockDb::new();
        db.expect_update_finalized_using_source().returning(|_| Err(StorageError::FutureData));

        let (tx, mut rx) = mpsc::channel(1);
        let handler = FinalizedHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        handler.handle(l1(5), &mut state).await.unwrap();
        assert_eq!(state.finalized_l1(), Some(l1(5)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_conflict_is_reported() {
        let mut db = MockDb::new();
        db.expect_update_finalized_using_source().returning(|_| Err(StorageError::ConflictError));

        let (tx, _rx) = mpsc::channel(1);
        let handler = FinalizedHandler::new(1, tx, Arc::new(db));
        let err = handler.handle(l1(5), &mut ProcessorState::new()).await.unwrap_err();
        assert_eq!(err, ChainProcessorError::StorageError(StorageError::ConflictError));
    }

    #[tokio::test]
    async fn test_refresh_without_finalized_l1_is_noop() {
        let mut db = MockDb::new();
        db.expect_update_finalized_using_source().never();

        let (tx, _rx) = mpsc::channel(1);
        let handler = FinalizedHandler::new(1, tx, Arc::new(db));
        handler.refresh(&mut ProcessorState::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_deferred_while_suspended() {
        let mut db = MockDb::new();
        db.expect_update_finalized_using_source().never();

        let (tx, _rx) = mpsc::channel(1);
        let handler = FinalizedHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        state.suspend(Default::default());
        handler.handle(l1(5), &mut state).await.unwrap();
        assert_eq!(state.deferred_len(), 1);
        assert_eq!(state.finalized_l1(), None);
    }
}
