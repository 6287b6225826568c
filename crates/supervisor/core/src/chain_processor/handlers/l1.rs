use super::{EventHandler, send_command};
use crate::{ChainProcessorError, ProcessorState, syncnode::ManagedNodeCommand};
use alloy_primitives::ChainId;
use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_storage::{L1BlockStorage, StorageError};
use interop_supervisor_types::{BlockRef, DerivedRefPair};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Handler for L1 blocks reported by the L1 watcher, and for the node asking for the next one.
///
/// Records below the latest finalized L1 block are pruned as new blocks arrive.
#[derive(Debug, Constructor)]
pub struct L1BlockHandler<W> {
    chain_id: ChainId,
    managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
    db_provider: Arc<W>,
}

#[async_trait]
impl<W> EventHandler<BlockRef> for L1BlockHandler<W>
where
    W: L1BlockStorage + Send + Sync + 'static,
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
            "Recording L1 block"
        );

        self.db_provider.save_l1_block(block)?;
        if let Some(finalized) = state.finalized_l1() {
            self.db_provider.prune_l1_blocks_below(finalized.number)?;
        }

        if state.take_awaiting_l1(block.number) {
            debug!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                %block,
                "Providing awaited L1 block to managed node"
            );
            send_command(
                self.chain_id,
                &self.managed_node_sender,
                ManagedNodeCommand::ProvideL1State { block },
            )
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<W> EventHandler<DerivedRefPair> for L1BlockHandler<W>
where
    W: L1BlockStorage + Send + Sync + 'static,
{
    /// Answers the node running out of L1 data with the L1 block after its last source.
    async fn handle(
        &self,
        derived_ref_pair: DerivedRefPair,
        state: &mut ProcessorState,
    ) -> Result<(), ChainProcessorError> {
        if state.is_suspended() {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                "Chain suspended for L1 reorg, dropping L1 exhaustion"
            );
            return Ok(());
        }

        let source = derived_ref_pair.source;
        let next_number = source.number + 1;
        match self.db_provider.get_l1_block(next_number) {
            Ok(next) if source.is_parent_of(&next) => {
                send_command(
                    self.chain_id,
                    &self.managed_node_sender,
                    ManagedNodeCommand::ProvideL1State { block: next },
                )
                .await
            }
            Ok(next) => {
                // the node derived from a block that is no longer canonical; the reorg path
                // resets it
                warn!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    %source,
                    %next,
                    "Node's L1 source is not the parent of the next canonical L1 block"
                );
                Ok(())
            }
            Err(StorageError::EntryNotFound(_))
                if state.finalized_l1().is_some_and(|finalized| next_number < finalized.number) =>
            {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    next_number,
                    "Next L1 block is finalized and no longer recorded"
                );
                Ok(())
            }
            Err(StorageError::EntryNotFound(_)) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    next_number,
                    "Next L1 block not seen yet, waiting for L1 watcher"
                );
                state.await_l1(next_number);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
