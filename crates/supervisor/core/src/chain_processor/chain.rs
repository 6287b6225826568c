use super::{
    Metrics, ProcessorHealth, ProcessorStatus,
    handlers::{
        EventHandler, FinalizedHandler, InvalidationHandler, L1BlockHandler, OriginHandler,
        RecoveryHandler, ReorgEventHandler, SafeBlockHandler, SafetyPromotionHandler,
        UnsafeBlockHandler,
    },
};
use crate::{
    ChainProcessorError, LogIndexer, ProcessorState,
    event::{ChainEvent, ReorgRequest},
    syncnode::{BlockProvider, ManagedNodeCommand},
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use derive_more::Constructor;
use interop_supervisor_storage::{
    DerivationStorage, HeadRefStorageWriter, L1BlockStorage, LogStorage, StorageRewinder,
};
use interop_supervisor_types::{DerivedRefPair, InteropValidator, SafetyLevel};
use std::{sync::Arc, time::Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, trace, warn};

/// Per-chain bounds of a [`ChainProcessor`].
#[derive(Debug, Clone, Copy, Constructor)]
pub struct ChainProcessorConfig {
    /// Number of the chain's interop activation block. Nothing below it is ever stored.
    pub activation_block: u64,
    /// How far below the stored head a diverging unsafe chain is searched for its ancestor.
    pub lookback: u64,
}

/// Represents a task that processes chain events from a managed node.
///
/// Every event for one chain goes through a single [`ChainProcessor`], one at a time. A fatal
/// error faults the processor: it then only answers [`ChainEvent::Recover`] until recovery
/// succeeds. Its health is published through a [`watch`] channel.
#[derive(Debug)]
pub struct ChainProcessor<P, W, V> {
    chain_id: ChainId,
    metrics_enabled: bool,

    // state
    state: ProcessorState,
    health_tx: watch::Sender<ProcessorHealth>,

    // Handlers for different types of chain events.
    unsafe_handler: Arc<UnsafeBlockHandler<P, W, V>>,
    safe_handler: SafeBlockHandler<P, W, V>,
    origin_handler: OriginHandler<W>,
    promotion_handler: SafetyPromotionHandler<W>,
    finalized_handler: FinalizedHandler<W>,
    invalidation_handler: InvalidationHandler<W>,
    l1_handler: L1BlockHandler<W>,
    reorg_handler: ReorgEventHandler<W>,
    recovery_handler: RecoveryHandler<P, W>,
}

impl<P, W, V> ChainProcessor<P, W, V>
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
    /// Creates a new [`ChainProcessor`].
    pub fn new(
        chain_id: ChainId,
        config: ChainProcessorConfig,
        validator: Arc<V>,
        block_provider: Arc<P>,
        db_provider: Arc<W>,
        managed_node_sender: mpsc::Sender<ManagedNodeCommand>,
        reorg_sender: mpsc::Sender<ReorgRequest>,
    ) -> Self {
        let log_indexer =
            Arc::new(LogIndexer::new(chain_id, block_provider.clone(), db_provider.clone()));

        let unsafe_handler = Arc::new(UnsafeBlockHandler::new(
            chain_id,
            validator.clone(),
            block_provider.clone(),
            db_provider.clone(),
            log_indexer,
            config.activation_block,
            config.lookback,
        ));

        let safe_handler = SafeBlockHandler::new(
            chain_id,
            managed_node_sender.clone(),
            db_provider.clone(),
            validator,
            unsafe_handler.clone(),
            config.activation_block,
        );

        let origin_handler = OriginHandler::new(chain_id, db_provider.clone());
        let promotion_handler =
            SafetyPromotionHandler::new(chain_id, managed_node_sender.clone(), db_provider.clone());
        let finalized_handler =
            FinalizedHandler::new(chain_id, managed_node_sender.clone(), db_provider.clone());
        let invalidation_handler = InvalidationHandler::new(
            chain_id,
            managed_node_sender.clone(),
            db_provider.clone(),
            config.activation_block,
        );
        let l1_handler =
            L1BlockHandler::new(chain_id, managed_node_sender.clone(), db_provider.clone());
        let reorg_handler = ReorgEventHandler::new(chain_id, reorg_sender, db_provider.clone());
        let recovery_handler = RecoveryHandler::new(
            chain_id,
            managed_node_sender,
            block_provider,
            db_provider,
            config.activation_block,
        );

        let (health_tx, _) = watch::channel(ProcessorHealth::default());

        Self {
            chain_id,
            metrics_enabled: false,

            state: ProcessorState::new(),
            health_tx,

            unsafe_handler,
            safe_handler,
            origin_handler,
            promotion_handler,
            finalized_handler,
            invalidation_handler,
            l1_handler,
            reorg_handler,
            recovery_handler,
        }
    }

    /// Enables event metrics for this processor.
    pub fn with_metrics(mut self) -> Self {
        self.metrics_enabled = true;
        Metrics::init(self.chain_id);
        self
    }

    /// Returns the chain this processor handles.
    pub const fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Returns a receiver that observes every health change of this processor.
    pub fn subscribe_health(&self) -> watch::Receiver<ProcessorHealth> {
        self.health_tx.subscribe()
    }

    /// Returns the current health of this processor.
    pub fn health(&self) -> ProcessorHealth {
        self.health_tx.borrow().clone()
    }

    /// Handles a chain event by delegating it to the appropriate handler.
    pub async fn handle_event(&mut self, event: ChainEvent) {
        let was_faulted = self.health_tx.borrow().is_faulted();
        if was_faulted && !matches!(event, ChainEvent::Recover) {
            trace!(
                target: "supervisor::chain_processor",
                chain_id = self.chain_id,
                event = event.name(),
                "Chain faulted, dropping event"
            );
            return;
        }

        let name = event.name();
        self.publish(ProcessorStatus::ProcessingEvent);

        let start = Instant::now();
        let result = self.dispatch(event).await;
        if self.metrics_enabled {
            Metrics::record_event(self.chain_id, name, start, &result);
        }

        let status = match result {
            Ok(()) => ProcessorStatus::Idle,
            Err(err) if err.is_fatal() || was_faulted => {
                error!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    event = name,
                    %err,
                    "Chain processor faulted, awaiting recovery"
                );
                ProcessorStatus::Faulted { reason: err.to_string() }
            }
            Err(err) => {
                debug!(
                    target: "supervisor::chain_processor",
                    chain_id = self.chain_id,
                    event = name,
                    %err,
                    "Failed to process event"
                );
                ProcessorStatus::Idle
            }
        };
        self.publish(status);
    }

    async fn dispatch(&mut self, event: ChainEvent) -> Result<(), ChainProcessorError> {
        match event {
            ChainEvent::NewUnsafeHead { block } => {
                self.unsafe_handler.handle(block, &mut self.state).await
            }
            ChainEvent::BlockReplaced { block, invalidated } => {
                self.invalidation_handler.handle_replacement(
                    block.block,
                    invalidated,
                    &mut self.state,
                );
                self.unsafe_handler.handle(block, &mut self.state).await
            }
            ChainEvent::NewL1Block { block } => {
                self.l1_handler.handle(block, &mut self.state).await
            }
            ChainEvent::L1Reorg { ancestor } => {
                self.reorg_handler.handle_l1_reorg(ancestor, &mut self.state).await
            }
            ChainEvent::SafetyPromoted { level, block } => {
                self.promotion_handler.handle((level, block), &mut self.state).await?;
                // a higher cross-safe head may let finality move along
                if level == SafetyLevel::CrossSafe && !self.state.is_suspended() {
                    self.finalized_handler.refresh(&mut self.state).await?;
                }
                Ok(())
            }
            ChainEvent::DerivedBlock { derived_ref_pair } => {
                self.safe_handler.handle(derived_ref_pair, &mut self.state).await
            }
            ChainEvent::DerivationOriginUpdate { origin } => {
                self.origin_handler.handle(origin, &mut self.state).await
            }
            ChainEvent::L1Exhausted { derived_ref_pair } => {
                EventHandler::<DerivedRefPair>::handle(
                    &self.l1_handler,
                    derived_ref_pair,
                    &mut self.state,
                )
                .await
            }
            ChainEvent::FinalizedL1 { block } => {
                self.finalized_handler.handle(block, &mut self.state).await
            }
            ChainEvent::InvalidateBlock { block } => {
                self.invalidation_handler.handle(block, &mut self.state).await
            }
            ChainEvent::ReorgRewind { target, l1_ancestor } => {
                self.reorg_handler.handle_rewind(target, l1_ancestor, &mut self.state).await
            }
            ChainEvent::ReorgCompleted { target } => {
                match self.reorg_handler.handle_completed(target, &mut self.state).await? {
                    Some((l1_ancestor, deferred)) => self.replay(l1_ancestor, deferred).await,
                    None => Ok(()),
                }
            }
            ChainEvent::ReorgFailed { reason } => Err(ChainProcessorError::ReorgFailed(reason)),
            ChainEvent::Recover => self.recovery_handler.handle(&mut self.state).await,
        }
    }

    /// Replays the events deferred while the chain was suspended.
    ///
    /// Derivation events built on L1 blocks above `l1_ancestor` were reorged out and are
    /// discarded; the node re-derives them.
    async fn replay(
        &mut self,
        l1_ancestor: BlockNumHash,
        deferred: Vec<ChainEvent>,
    ) -> Result<(), ChainProcessorError> {
        debug!(
            target: "supervisor::chain_processor",
            chain_id = self.chain_id,
            l1_ancestor = l1_ancestor.number,
            events = deferred.len(),
            "Replaying deferred events"
        );

        for event in deferred {
            let name = event.name();
            let result = match event {
                ChainEvent::DerivedBlock { derived_ref_pair }
                    if derived_ref_pair.source.number > l1_ancestor.number =>
                {
                    trace!(
                        target: "supervisor::chain_processor",
                        chain_id = self.chain_id,
                        %derived_ref_pair,
                        "Discarding derived block from reorged L1"
                    );
                    continue;
                }
                ChainEvent::DerivedBlock { derived_ref_pair } => {
                    self.safe_handler.handle(derived_ref_pair, &mut self.state).await
                }
                ChainEvent::DerivationOriginUpdate { origin }
                    if origin.number > l1_ancestor.number =>
                {
                    continue;
                }
                ChainEvent::DerivationOriginUpdate { origin } => {
                    self.origin_handler.handle(origin, &mut self.state).await
                }
                ChainEvent::FinalizedL1 { block } => {
                    self.finalized_handler.handle(block, &mut self.state).await
                }
                other => {
                    warn!(
                        target: "supervisor::chain_processor",
                        chain_id = self.chain_id,
                        event = other.name(),
                        "Unexpected deferred event, dropping"
                    );
                    continue;
                }
            };

            match result {
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    debug!(
                        target: "supervisor::chain_processor",
                        chain_id = self.chain_id,
                        event = name,
                        %err,
                        "Failed to replay deferred event"
                    );
                }
                Ok(()) => {}
            }
        }
        Ok(())
    }

    fn publish(&self, status: ProcessorStatus) {
        let health = ProcessorHealth { status, suspended: self.state.is_suspended() };
        if self.metrics_enabled {
            Metrics::record_health(self.chain_id, health.is_faulted(), health.suspended);
        }
        self.health_tx.send_replace(health);
    }
}
