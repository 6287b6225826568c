use super::send_command;
use crate::{
    ChainProcessorError, ProcessorState,
    syncnode::{BlockProvider, ManagedNodeCommand},
};
use alloy_primitives::ChainId;
use derive_more::Constructor;
use interop_supervisor_storage::{DerivationStorage, LogStorage, StorageError, StorageRewinder};
use interop_supervisor_types::{DerivedRefPair, L2BlockRef};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Handler for operator-requested recovery: a full resync from the interop activation block.
#[derive(Debug, Constructor)]
pub struct RecoveryHandler<P, W> {
    chain_id: ChainId,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    block_provider: Arc<P>,
    db_provider: Arc<W>,
    activation_block: u64,
}

impl<P, W> RecoveryHandler<P, W>
where
    P: BlockProvider + 'static,
    W: LogStorage + DerivationStorage + StorageRewinder + Send + Sync + 'static,
{
    /// Clears the chain's storage, seeds it with the activation block again and resets the node
    /// to it.
    pub async fn handle(&self, state: &mut ProcessorState) -> Result<(), ChainProcessorError> {
        let activation = self.activation_block_ref().await?;
        let activation_pair = self.activation_pair(&activation)?;

        info!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            %activation,
            "Recovering chain from interop activation block"
        );

        self.db_provider.clear()?;
        self.db_provider.initialise_log_storage(activation)?;
        if let Some(pair) = activation_pair {
            self.db_provider.initialise_derivation_storage(pair)?;
        }
        state.reset();

        send_command(
            self.chain_id,
            &self.managed_node_sender,
            ManagedNodeCommand::ResetTo { target: activation.id() },
        )
        .await
    }

    async fn activation_block_ref(&self) -> Result<L2BlockRef, ChainProcessorError> {
        match self.db_provider.get_block(self.activation_block) {
            Ok(block) => Ok(block),
            Err(StorageError::EntryNotFound(_) | StorageError::DatabaseNotInitialised) => {
                Ok(self.block_provider.block_by_number(self.activation_block).await?)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The derivation record of the activation block, if derivation reached it before.
    fn activation_pair(
        &self,
        activation: &L2BlockRef,
    ) -> Result<Option<DerivedRefPair>, ChainProcessorError> {
        match self.db_provider.derived_to_source(activation.id()) {
            Ok(source) => Ok(Some(DerivedRefPair::new(source, activation.block))),
            Err(StorageError::EntryNotFound(_) | StorageError::DatabaseNotInitialised) => {
                warn!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    "No derivation record for activation block, derivation restarts uninitialised"
                );
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }
}
