use crate::{
    ChainProcessorError, ProcessorState,
    event::{ChainEvent, ReorgRequest},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use derive_more::Constructor;
use interop_supervisor_storage::{
    DerivationStorageReader, L1BlockStorage, LogStorageReader, StorageError, StorageRewinder,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drives the chain's side of the L1 reorg protocol.
///
/// An L1 reorg that touches the chain suspends it and starts the reorg handler. Once the
/// handler found the rewind target, storage is rewound and the handler resets the node. When it
/// reports completion, the suspension ends.
#[derive(Debug, Constructor)]
pub struct ReorgEventHandler<W> {
    chain_id: ChainId,
    reorg_sender: mpsc::Sender<ReorgRequest>,
    db_provider: Arc<W>,
}

impl<W> ReorgEventHandler<W>
where
    W: LogStorageReader + DerivationStorageReader + StorageRewinder + L1BlockStorage + Send + Sync,
{
    /// Handles an L1 reorg down to `l1_ancestor`.
    pub async fn handle_l1_reorg(
        &self,
        l1_ancestor: BlockNumHash,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        self.db_provider.rewind_l1(l1_ancestor.number)?;
        state.clear_awaiting_l1();

        if !self.is_affected(l1_ancestor)? {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                l1_ancestor = l1_ancestor.number,
                "L1 reorg above everything the chain derived from"
            );
            return Ok(());
        }

        if state.suspend(l1_ancestor) {
            info!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                l1_ancestor = l1_ancestor.number,
                "L1 reorg affects chain, suspending promotion"
            );
            return self.send(ReorgRequest::Start { l1_ancestor }).await;
        }

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            l1_ancestor = l1_ancestor.number,
            restart_pending = state.suspension().is_some_and(|s| s.restart_pending),
            "L1 reorg while another one is reconciled"
        );
        Ok(())
    }

    /// Rewinds storage to `target` and asks the reorg handler to reset the node.
    pub async fn handle_rewind(
        &self,
        target: BlockNumHash,
        l1_ancestor: BlockNumHash,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        let Some(suspension) = state.suspension() else {
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                target_block = target.number,
                "Rewind requested while not suspended, ignoring"
            );
            return Ok(());
        };

        if let Some(l1_ancestor) = state.take_restart() {
            return self.send(ReorgRequest::Start { l1_ancestor }).await;
        }

        if suspension.l1_ancestor != l1_ancestor {
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                expected = suspension.l1_ancestor.number,
                got = l1_ancestor.number,
                "Rewind for a superseded L1 ancestor, ignoring"
            );
            return Ok(());
        }

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            target_block = target.number,
            l1_ancestor = l1_ancestor.number,
            "Rewinding chain for L1 reorg"
        );

        match self.db_provider.rewind_to_source(&l1_ancestor) {
            Ok(_) | Err(StorageError::DatabaseNotInitialised) => {}
            Err(err) => return Err(ChainProcessorError::RewindFailed(err)),
        }
        self.db_provider.rewind(&target).map_err(ChainProcessorError::RewindFailed)?;
        state.clear_invalidated_above(target.number);

        self.send(ReorgRequest::ResetNode { target }).await
    }

    /// Ends the suspension once the node has been reset.
    ///
    /// Returns the L1 ancestor and the events deferred while suspended, unless a deeper reorg
    /// arrived meanwhile, in which case the reorg is started over.
    pub async fn handle_completed(
        &self,
        target: BlockNumHash,
        state: &mut ProcessorState,
    ) -> Result<Option<(BlockNumHash, Vec<ChainEvent>)>, ChainProcessorError> {
        if let Some(l1_ancestor) = state.take_restart() {
            self.send(ReorgRequest::Start { l1_ancestor }).await?;
            return Ok(None);
        }

        let resumed = state.resume();
        if resumed.is_some() {
            info!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                target_block = target.number,
                "L1 reorg reconciled, resuming"
            );
        }
        Ok(resumed)
    }

    /// Whether anything stored for the chain was built on L1 blocks above `l1_ancestor`.
    fn is_affected(&self, l1_ancestor: BlockNumHash) -> Result<bool, ChainProcessorError> {
        let unsafe_origin = match self.db_provider.get_latest_block() {
            Ok(block) => Some(block.l1_origin.number),
            Err(StorageError::DatabaseNotInitialised) => None,
            Err(err) => return Err(err.into()),
        };
        let source = match self.db_provider.latest_derivation_state() {
            Ok(pair) => Some(pair.source.number),
            Err(StorageError::DatabaseNotInitialised) => None,
            Err(err) => return Err(err.into()),
        };

        Ok([unsafe_origin, source].into_iter().flatten().any(|n| n > l1_ancestor.number))
    }

    async fn send(&self, request: ReorgRequest) -> Result<(), ChainProcessorError> {
        self.reorg_sender.send(request).await.map_err(|err| {
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %err,
                "Failed to send request to reorg handler"
            );
            ChainProcessorError::ChannelSendFailed(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;
    use interop_supervisor_types::{BlockRef, DerivedRefPair, L2BlockRef, Log};
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

        impl DerivationStorageReader for Db {
            fn derived_to_source(&self, derived: BlockNumHash) -> Result<BlockRef, StorageError>;
            fn latest_derived_block_at_source(&self, source: BlockNumHash) -> Result<BlockRef, StorageError>;
            fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;
            fn get_source_block(&self, number: u64) -> Result<BlockRef, StorageError>;
            fn get_activation_block(&self) -> Result<BlockRef, StorageError>;
        }

        impl StorageRewinder for Db {
            fn rewind(&self, to: &BlockNumHash) -> Result<(), StorageError>;
            fn rewind_to_source(&self, l1_ancestor: &BlockNumHash) -> Result<Option<BlockRef>, StorageError>;
            fn rewind_l1(&self, l1_ancestor: u64) -> Result<(), StorageError>;
            fn clear(&self) -> Result<(), StorageError>;
        }

        impl L1BlockStorage for Db {
            fn save_l1_block(&self, block: BlockRef) -> Result<(), StorageError>;
            fn get_l1_block(&self, number: u64) -> Result<BlockRef, StorageError>;
            fn prune_l1_blocks_below(&self, number: u64) -> Result<(), StorageError>;
        }
    );

    fn id(number: u64) -> BlockNumHash {
        BlockNumHash { number, hash: B256::with_last_byte(number as u8) }
    }

    fn db_at(unsafe_origin: u64, source: u64) -> MockDb {
        let mut db = MockDb::new();
        db.expect_rewind_l1().returning(|_| Ok(()));
        db.expect_get_latest_block()
            .returning(move || Ok(L2BlockRef::new(BlockRef::default(), id(unsafe_origin), 0)));
        db.expect_latest_derivation_state().returning(move || {
            Ok(DerivedRefPair::new(
                BlockRef::new(id(source).hash, source, B256::ZERO, 0),
                BlockRef::default(),
            ))
        });
        db
    }

    #[tokio::test]
    async fn test_unaffected_chain_is_not_suspended() {
        let (tx, mut rx) = mpsc::channel(1);
        let handler = ReorgEventHandler::new(1, tx, Arc::new(db_at(40, 38)));
        let mut state = ProcessorState::new();

        handler.handle_l1_reorg(id(45), &mut state).await.unwrap();
        assert!(!state.is_suspended());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_affected_chain_is_suspended_once() {
        let (tx, mut rx) = mpsc::channel(4);
        let handler = ReorgEventHandler::new(1, tx, Arc::new(db_at(50, 44)));
        let mut state = ProcessorState::new();

        handler.handle_l1_reorg(id(45), &mut state).await.unwrap();
        assert!(state.is_suspended());
        assert_eq!(rx.recv().await.unwrap(), ReorgRequest::Start { l1_ancestor: id(45) });

        handler.handle_l1_reorg(id(47), &mut state).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rewind_then_complete() {
        let mut db = db_at(50, 44);
        db.expect_rewind_to_source().with(eq(id(45))).times(1).returning(|_| Ok(None));
        db.expect_rewind().with(eq(id(100))).times(1).returning(|_| Ok(()));

        let (tx, mut rx) = mpsc::channel(4);
        let handler = ReorgEventHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        handler.handle_l1_reorg(id(45), &mut state).await.unwrap();
        rx.recv().await.unwrap();

        handler.handle_rewind(id(100), id(45), &mut state).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ReorgRequest::ResetNode { target: id(100) });

        let (ancestor, deferred) =
            handler.handle_completed(id(100), &mut state).await.unwrap().unwrap();
        assert_eq!(ancestor, id(45));
        assert!(deferred.is_empty());
        assert!(!state.is_suspended());
    }

    #[tokio::test]
    async fn test_deeper_reorg_restarts_before_rewind() {
        let mut db = db_at(50, 44);
        db.expect_rewind().never();

        let (tx, mut rx) = mpsc::channel(4);
        let handler = ReorgEventHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        handler.handle_l1_reorg(id(45), &mut state).await.unwrap();
        rx.recv().await.unwrap();
        handler.handle_l1_reorg(id(41), &mut state).await.unwrap();

        handler.handle_rewind(id(100), id(45), &mut state).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ReorgRequest::Start { l1_ancestor: id(41) });
        assert!(state.is_suspended());
    }

    #[tokio::test]
    async fn test_rewind_failure_is_fatal() {
        let mut db = db_at(50, 44);
        db.expect_rewind_to_source().returning(|_| Err(StorageError::ConflictError));

        let (tx, _rx) = mpsc::channel(4);
        let handler = ReorgEventHandler::new(1, tx, Arc::new(db));
        let mut state = ProcessorState::new();
        handler.handle_l1_reorg(id(45), &mut state).await.unwrap();

        let err = handler.handle_rewind(id(100), id(45), &mut state).await.unwrap_err();
        assert!(err.is_fatal());
    }
}
