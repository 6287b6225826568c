//! This module contains various event handlers for processing different types of chain events.
mod cross_chain;
mod finalized;
mod invalidation;
mod l1;
mod origin;
mod recovery;
mod reorg;
mod safe_block;
mod unsafe_block;

pub use cross_chain::SafetyPromotionHandler;
pub use finalized::FinalizedHandler;
pub use invalidation::InvalidationHandler;
pub use l1::L1BlockHandler;
pub use origin::OriginHandler;
pub use recovery::RecoveryHandler;
pub use reorg::ReorgEventHandler;
pub use safe_block::SafeBlockHandler;
pub use unsafe_block::UnsafeBlockHandler;

use crate::{
    ChainProcessorError, ProcessorState, event::ChainEvent, syncnode::ManagedNodeCommand,
};
use alloy_primitives::ChainId;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

/// [`EventHandler`] trait defines the interface for handling different types of events in the chain
/// processor. Each handler will implement this trait to process specific events like block updates,
/// invalidations, etc.
#[async_trait]
pub trait EventHandler<E> {
    /// Handle the event with the given state.
    async fn handle(&self, event: E, state: &mut ProcessorState)
    -> Result<(), ChainProcessorError>;
}

/// Sends a command to the managed node actor of the chain.
pub(crate) async fn send_command(
    chain_id: ChainId,
    sender: &mpsc::Sender<ManagedNodeCommand>,
    command: ManagedNodeCommand,
) -> Result<(), ChainProcessorError> {
    sender.send(command).await.map_err(|err| {
        warn!(
            target: "supervisor::chain_processor",
            chain_id,
            %err,
            "Failed to send command to managed node"
        );
        ChainProcessorError::ChannelSendFailed(err.to_string())
    })
}

/// Defers an event until the chain's suspension ends, warning when the oldest one is dropped.
pub(crate) fn defer_event(chain_id: ChainId, state: &mut ProcessorState, event: ChainEvent) {
    if let Some(dropped) = state.defer(event) {
        warn!(
            target: "supervisor::chain_processor",
            chain_id,
            event = dropped.name(),
            "Too many events deferred during suspension, dropping the oldest"
        );
    }
}
