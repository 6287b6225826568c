use super::{EventHandler, defer_event};
use crate::{ChainProcessorError, ProcessorState, event::ChainEvent};
use alloy_primitives::ChainId;
use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_storage::{DerivationStorageWriter, StorageError};
use interop_supervisor_types::BlockRef;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Handler for derivation moving to a new L1 block without deriving an L2 block.
#[derive(Debug, Constructor)]
pub struct OriginHandler<W> {
    chain_id: ChainId,
    db_provider: Arc<W>,
}

#[async_trait]
impl<W> EventHandler<BlockRef> for OriginHandler<W>
where
    W: DerivationStorageWriter + Send + Sync + 'static,
{
    async fn handle(
        &self,
        origin: BlockRef,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        trace!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %origin,
            "Processing derivation origin update"
        );

        if state.is_suspended() {
            defer_event(self.chain_id, state, ChainEvent::DerivationOriginUpdate { origin });
            return Ok(());
        }

        match self.db_provider.save_source_block(origin) {
            Ok(()) => Ok(()),
            Err(StorageError::DatabaseNotInitialised) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %origin,
                    "Derivation storage not initialised, skipping origin update"
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %origin,
                    %err,
                    "Failed to save source block"
                );
                Err(err.into())
            }
        }
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

        impl DerivationStorageWriter for Db {
            fn initialise_derivation_storage(&self, activation: DerivedRefPair) -> Result<(), StorageError>;
            fn save_derived_block(&self, pair: DerivedRefPair) -> Result<(), StorageError>;
            fn save_source_block(&self, source: BlockRef) -> Result<(), StorageError>;
        }
    );

    fn origin() -> BlockRef {
        BlockRef::new(B256::repeat_byte(4), 4, B256::repeat_byte(3), 48)
    }

    #[tokio::test]
    async fn test_saves_source_block() {
        let mut db = MockDb::new();
        db.expect_save_source_block().with(eq(origin())).times(1).returning(|_| Ok(()));

        let handler = OriginHandler::new(1, Arc::new(db));
        handler.handle(origin(), &mut ProcessorState::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_uninitialised_storage_is_skipped() {
        let mut db = MockDb::new();
        db.expect_save_source_block().returning(|_| Err(StorageError::DatabaseNotInitialised));

        let handler = OriginHandler::new(1, Arc::new(db));
        handler.handle(origin(), &mut ProcessorState::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_out_of_order_source_is_reported() {
        let mut db = MockDb::new();
        db.expect_save_source_block().returning(|_| Err(StorageError::BlockOutOfOrder));

        let handler = OriginHandler::new(1, Arc::new(db));
        let err = handler.handle(origin(), &mut ProcessorState::new()).await.unwrap_err();
        assert_eq!(err, ChainProcessorError::StorageError(StorageError::BlockOutOfOrder));
    }

    #[tokio::test]
    async fn test_deferred_while_suspended() {
        let mut db = MockDb::new();
        db.expect_save_source_block().never();

        let handler = OriginHandler::new(1, Arc::new(db));
        let mut state = ProcessorState::new();
        state.suspend(Default::default());
        handler.handle(origin(), &mut state).await.unwrap();
        assert_eq!(state.deferred_len(), 1);
    }
}
