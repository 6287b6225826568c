use async_trait::async_trait;
use interop_supervisor_core::{ChainProcessor, event::ChainEvent, syncnode::BlockProvider};
use interop_supervisor_storage::{
    DerivationStorage, HeadRefStorageWriter, L1BlockStorage, LogStorage, StorageRewinder,
};
use interop_supervisor_types::InteropValidator;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::SupervisorActor;

/// Feeds a chain's [`ChainEvent`]s to its [`ChainProcessor`], one at a time.
#[derive(Debug)]
pub struct ChainProcessorActor<P, W, V> {
    chain_processor: ChainProcessor<P, W, V>,
    cancel_token: CancellationToken,
    event_rx: mpsc::Receiver<ChainEvent>,
}

impl<P, W, V> ChainProcessorActor<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage
        + DerivationStorage
        + HeadRefStorageWriter
        + StorageRewinder
        + L1BlockStorage
        + Send
        + Sync
        + 'static,
{
    /// Creates a new [`ChainProcessorActor`].
    pub const fn new(
        chain_processor: ChainProcessor<P, W, V>,
        cancel_token: CancellationToken,
        event_rx: mpsc::Receiver<ChainEvent>,
    ) -> Self {
        Self { chain_processor, cancel_token, event_rx }
    }
}

#[async_trait]
impl<P, W, V> SupervisorActor for ChainProcessorActor<P, W, V>
where
    P: BlockProvider + 'static,
    V: InteropValidator + 'static,
    W: LogStorage
        + DerivationStorage
        + HeadRefStorageWriter
        + StorageRewinder
        + L1BlockStorage
        + Send
        + Sync
        + 'static,
{
    type InboundEvent = ChainEvent;
    type Error = ChainProcessorActorError;

    async fn start(mut self) -> Result<(), Self::Error> {
        let chain_id = self.chain_processor.chain_id();
        info!(target: "supervisor::chain_processor_actor", chain_id, "Starting chain processor");

        loop {
            tokio::select! {
                // cancellation wins over queued events
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!(
                        target: "supervisor::chain_processor_actor",
                        chain_id,
                        "Cancellation requested, stopping chain processor"
                    );
                    break;
                }
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        info!(
                            target: "supervisor::chain_processor_actor",
                            chain_id,
                            "Chain event channel closed, stopping chain processor"
                        );
                        return Err(ChainProcessorActorError::ReceiverClosed(chain_id));
                    };
                    self.chain_processor.handle_event(event).await;
                }
            }
        }

        Ok(())
    }
}

/// Errors of the [`ChainProcessorActor`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainProcessorActorError {
    /// Every sender of the chain's events is gone.
    #[error("chain event receiver closed for chain {0}")]
    ReceiverClosed(u64),
}
