use super::{metrics::Metrics, task::ReorgTask};
use crate::{
    ReorgHandlerError,
    event::{ChainEvent, ReorgRequest},
    syncnode::ManagedNodeController,
};
use alloy_eips::BlockNumHash;
use alloy_primitives::ChainId;
use alloy_rpc_client::RpcClient;
use interop_supervisor_metrics::observe_metrics_for_result_async;
use interop_supervisor_storage::DbReader;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Handles L1 reorgs for a single chain.
///
/// Driven by the chain's processor: on [`ReorgRequest::Start`] it searches the rewind target and
/// reports it back as [`ChainEvent::ReorgRewind`]; once storage is rewound,
/// [`ReorgRequest::ResetNode`] resets the managed node and reports
/// [`ChainEvent::ReorgCompleted`]. Anything that cannot be completed is reported as
/// [`ChainEvent::ReorgFailed`].
#[derive(Debug)]
pub struct ReorgHandler<DB, C> {
    chain_id: ChainId,
    task: ReorgTask<DB>,
    node: Arc<C>,
    event_tx: mpsc::Sender<ChainEvent>,
}

impl<DB, C> ReorgHandler<DB, C>
where
    DB: DbReader + Send + Sync + 'static,
    C: ManagedNodeController + 'static,
{
    /// Creates a new [`ReorgHandler`].
    ///
    /// The rewind target is never searched below `activation_block`, nor more than `lookback`
    /// blocks below the first block built on the L1 ancestor.
    pub fn new(
        chain_id: ChainId,
        db: Arc<DB>,
        node: Arc<C>,
        rpc_client: RpcClient,
        event_tx: mpsc::Sender<ChainEvent>,
        activation_block: u64,
        lookback: u64,
    ) -> Self {
        Self {
            chain_id,
            task: ReorgTask::new(chain_id, db, rpc_client, activation_block, lookback),
            node,
            event_tx,
        }
    }

    /// Initializes the metrics for the reorg handler
    pub fn with_metrics(self) -> Self {
        Metrics::init(self.chain_id);
        self
    }

    /// Checks on startup that the chain's latest derivation source is still canonical.
    ///
    /// If it is not, an [`ChainEvent::L1Reorg`] is sent to the chain processor so the chain goes
    /// through the regular reorg protocol.
    pub async fn verify_l1_consistency(&self) -> Result<(), ReorgHandlerError> {
        info!(
            target: "supervisor::reorg_handler",
            chain_id = %self.chain_id,
            "Verifying L1 consistency..."
        );

        let Some(ancestor) = self.task.find_l1_divergence().await? else {
            return Ok(());
        };

        warn!(
            target: "supervisor::reorg_handler",
            chain_id = %self.chain_id,
            l1_ancestor = ancestor.number,
            "Derivation source no longer canonical, starting reorg"
        );
        self.send(ChainEvent::L1Reorg { ancestor }).await
    }

    /// Serves requests from the chain processor until cancelled or the processor goes away.
    pub async fn run(
        self,
        mut requests: mpsc::Receiver<ReorgRequest>,
        cancel_token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!(target: "supervisor::reorg_handler", chain_id = %self.chain_id, "Reorg handler cancelled");
                    break;
                }
                request = requests.recv() => {
                    let Some(request) = request else {
                        info!(target: "supervisor::reorg_handler", chain_id = %self.chain_id, "Reorg request channel closed");
                        break;
                    };
                    if let Err(err) = self.handle_request(request).await {
                        error!(
                            target: "supervisor::reorg_handler",
                            chain_id = %self.chain_id,
                            %err,
                            "Failed to report reorg progress"
                        );
                        break;
                    }
                }
            }
        }
    }

    /// Handles a single request, reporting the outcome to the chain processor.
    pub async fn handle_request(&self, request: ReorgRequest) -> Result<(), ReorgHandlerError> {
        let event = match request {
            ReorgRequest::Start { l1_ancestor } => self.find_rewind_target(l1_ancestor).await,
            ReorgRequest::ResetNode { target } => self.reset_node(target).await,
        };
        self.send(event).await
    }

    async fn find_rewind_target(&self, l1_ancestor: BlockNumHash) -> ChainEvent {
        let result = observe_metrics_for_result_async!(
            Metrics::SUPERVISOR_REORG_SUCCESS_TOTAL,
            Metrics::SUPERVISOR_REORG_ERROR_TOTAL,
            Metrics::SUPERVISOR_REORG_DURATION_SECONDS,
            Metrics::SUPERVISOR_REORG_METHOD_FIND_REWIND_TARGET,
            self.task.find_rewind_target(l1_ancestor),
            "chain_id" => self.chain_id.to_string()
        );

        match result {
            Ok(rewind) => {
                Metrics::record_block_depth(
                    self.chain_id,
                    rewind.head.l1_origin.number.saturating_sub(l1_ancestor.number),
                    rewind.head.number() - rewind.target.number(),
                );
                ChainEvent::ReorgRewind { target: rewind.target.id(), l1_ancestor }
            }
            Err(err) => {
                error!(
                    target: "supervisor::reorg_handler",
                    chain_id = %self.chain_id,
                    l1_ancestor = l1_ancestor.number,
                    %err,
                    "Failed to find rewind target"
                );
                ChainEvent::ReorgFailed { reason: err.to_string() }
            }
        }
    }

    async fn reset_node(&self, target: BlockNumHash) -> ChainEvent {
        let result = observe_metrics_for_result_async!(
            Metrics::SUPERVISOR_REORG_SUCCESS_TOTAL,
            Metrics::SUPERVISOR_REORG_ERROR_TOTAL,
            Metrics::SUPERVISOR_REORG_DURATION_SECONDS,
            Metrics::SUPERVISOR_REORG_METHOD_RESET_NODE,
            self.node.reset_to(target),
            "chain_id" => self.chain_id.to_string()
        );

        match result {
            Ok(()) => {
                info!(
                    target: "supervisor::reorg_handler",
                    chain_id = %self.chain_id,
                    target_block = target.number,
                    "Managed node reset after L1 reorg"
                );
                ChainEvent::ReorgCompleted { target }
            }
            Err(err) => {
                error!(
                    target: "supervisor::reorg_handler",
                    chain_id = %self.chain_id,
                    target_block = target.number,
                    %err,
                    "Failed to reset managed node"
                );
                ChainEvent::ReorgFailed { reason: err.to_string() }
            }
        }
    }

    async fn send(&self, event: ChainEvent) -> Result<(), ReorgHandlerError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|err| ReorgHandlerError::ChannelSendFailed(err.to_string()))
    }
}
