use super::{EventHandler, UnsafeBlockHandler, defer_event, send_command};
use crate::{
    ChainProcessorError, ProcessorState,
    chain_processor::Metrics,
    event::ChainEvent,
    syncnode::{BlockProvider, ManagedNodeCommand, ManagedNodeError},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_storage::{DerivationStorage, LogStorage, StorageError, StorageRewinder};
use interop_supervisor_types::{DerivedRefPair, InteropValidator};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Handler for blocks the managed node derived from L1.
///
/// Records the derivation pair. The block has to be in log storage first; if it is missing or
/// differs, log storage is brought in line with the node before the pair is recorded again.
#[derive(Debug, Constructor)]
pub struct SafeBlockHandler<P, W, V> {
    chain_id: ChainId,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    db_provider: Arc<W>,
    validator: Arc<V>,
    unsafe_handler: Arc<UnsafeBlockHandler<P, W, V>>,
    activation_block: u64,
}

#[async_trait]
impl<P, W, V> EventHandler<DerivedRefPair> for SafeBlockHandler<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage + DerivationStorage + StorageRewinder + Send + Sync + 'static,
{
    async fn handle(
        &self,
        derived_ref_pair: DerivedRefPair,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        trace!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %derived_ref_pair,
            "Processing local safe derived block pair"
        );

        if state.is_suspended() {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = derived_ref_pair.derived.number,
                "Chain suspended for L1 reorg, deferring derived block"
            );
            defer_event(self.chain_id, state, ChainEvent::DerivedBlock { derived_ref_pair });
            return Ok(());
        }

        if let Some(invalidated) =
            state.invalidated().filter(|invalidated| derived_ref_pair.derived.number >= invalidated.number)
        {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = derived_ref_pair.derived.number,
                invalidated = invalidated.number,
                "Awaiting replacement of invalidated block, dropping derived block"
            );
            return Ok(());
        }

        let result = self.inner_handle(derived_ref_pair).await;
        Metrics::record_block_processing(
            self.chain_id,
            Metrics::BLOCK_TYPE_LOCAL_SAFE,
            &derived_ref_pair.derived,
            &result,
        );
        result
    }
}

impl<P, W, V> SafeBlockHandler<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage + DerivationStorage + StorageRewinder + Send + Sync + 'static,
{
    async fn inner_handle(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<(), ChainProcessorError> {
        if derived_ref_pair.derived.number < self.activation_block {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = derived_ref_pair.derived.number,
                "Ignoring pre-interop derived block"
            );
            return Ok(());
        }

        match self.db_provider.save_derived_block(derived_ref_pair) {
            Ok(()) => Ok(()),
            Err(StorageError::DatabaseNotInitialised) => {
                self.initialise_derivation_storage(derived_ref_pair).await
            }
            Err(StorageError::FutureData) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    derived_block = %derived_ref_pair.derived,
                    "Derived block not indexed yet, syncing it from the node"
                );
                self.sync_derived_block(derived_ref_pair).await?;
                self.save_after_sync(derived_ref_pair)
            }
            Err(StorageError::ReorgRequired) => {
                info!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    derived_block = %derived_ref_pair.derived,
                    "Derived block differs from the unsafe block at its height, rewinding"
                );
                let parent = BlockNumHash {
                    number: derived_ref_pair.derived.number.saturating_sub(1),
                    hash: derived_ref_pair.derived.parent_hash,
                };
                self.db_provider.rewind(&parent)?;
                self.sync_derived_block(derived_ref_pair).await?;
                self.save_after_sync(derived_ref_pair)
            }
            Err(StorageError::BlockOutOfOrder) => {
                let latest = self.db_provider.latest_derivation_state()?;
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    incoming = %derived_ref_pair,
                    %latest,
                    "Derived block out of order, resetting managed node to latest derived block"
                );
                send_command(
                    self.chain_id,
                    &self.managed_node_sender,
                    ManagedNodeCommand::ResetTo { target: latest.derived.id() },
                )
                .await
            }
            Err(err) => {
                error!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    block_number = derived_ref_pair.derived.number,
                    %err,
                    "Failed to save derived block pair"
                );
                Err(err.into())
            }
        }
    }

    async fn initialise_derivation_storage(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<(), ChainProcessorError> {
        if !self.validator.is_interop_activation_block(self.chain_id, derived_ref_pair.derived) {
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                derived_block = %derived_ref_pair.derived,
                "Derivation storage not initialised and block is not the activation block"
            );
            return Err(StorageError::DatabaseNotInitialised.into());
        }

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %derived_ref_pair,
            "Initialising derivation storage at interop activation block"
        );

        match self.db_provider.initialise_derivation_storage(derived_ref_pair) {
            Err(StorageError::FutureData) => {
                self.sync_derived_block(derived_ref_pair).await?;
                self.db_provider.initialise_derivation_storage(derived_ref_pair)?;
                Ok(())
            }
            result => result.map_err(Into::into),
        }
    }

    /// Brings log storage up to the derived block, checking the node agrees on its hash.
    async fn sync_derived_block(
        &self,
        derived_ref_pair: DerivedRefPair,
    ) -> Result<(), ChainProcessorError> {
        let derived = derived_ref_pair.derived;
        let synced = self.unsafe_handler.sync_block(derived.number).await?;
        if synced.block != derived {
            warn!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %derived,
                node_block = %synced,
                "Node returned a different block than it derived"
            );
            return Err(ManagedNodeError::InconsistentBlock(derived.number).into());
        }
        Ok(())
    }

    fn save_after_sync(&self, derived_ref_pair: DerivedRefPair) -> Result<(), ChainProcessorError> {
        self.db_provider.save_derived_block(derived_ref_pair).inspect_err(|err| {
            error!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                block_number = derived_ref_pair.derived.number,
                %err,
                "Error saving derived block after resync"
            );
        })?;
        Ok(())
    }
}
