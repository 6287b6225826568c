use async_trait::async_trait;
use derive_more::Constructor;
use interop_supervisor_core::syncnode::{
    ClientError, EventDelivery, ManagedNodeClient, ManagedNodeCommand, ManagedNodeController,
    SubscriptionHandler,
};
use interop_supervisor_types::ManagedEvent;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio::{sync::mpsc, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    SupervisorActor,
    actors::utils::{RetryExhausted, run_with_retry},
};

/// Connects one managed node to the supervisor.
///
/// Forwards the node's events to its [`SubscriptionHandler`], by subscription or by polling
/// depending on the node's [`EventDelivery`], and executes the chain processor's
/// [`ManagedNodeCommand`]s against the node.
#[derive(Debug, Constructor)]
pub struct ManagedNodeActor<C, N> {
    client: Arc<C>,
    node: Arc<N>,
    command_rx: mpsc::Receiver<ManagedNodeCommand>,
    cancel_token: CancellationToken,
    retry_budget: u32,
}

#[async_trait]
impl<C, N> SupervisorActor for ManagedNodeActor<C, N>
where
    C: ManagedNodeClient + 'static,
    N: ManagedNodeController + SubscriptionHandler + 'static,
{
    type InboundEvent = ManagedNodeCommand;
    type Error = ManagedNodeActorError;

    async fn start(mut self) -> Result<(), Self::Error> {
        let events = run_event_task(
            self.client.clone(),
            self.node.clone(),
            &self.cancel_token,
            self.retry_budget,
        );
        let commands = run_command_task(self.node.clone(), self.command_rx, &self.cancel_token);

        tokio::select! {
            result = events => result.map_err(ManagedNodeActorError::EventsLost),
            result = commands => result,
        }
    }
}

async fn run_event_task<C, N>(
    client: Arc<C>,
    node: Arc<N>,
    cancel_token: &CancellationToken,
    retry_budget: u32,
) -> Result<(), RetryExhausted>
where
    C: ManagedNodeClient + 'static,
    N: SubscriptionHandler + 'static,
{
    match client.event_delivery() {
        EventDelivery::Subscribe => {
            run_with_retry(
                "managed node subscription",
                || run_subscription_task(client.clone(), node.clone()),
                cancel_token,
                retry_budget,
            )
            .await
        }
        EventDelivery::Poll { interval } => {
            run_with_retry(
                "managed node event polling",
                || run_poll_task(client.clone(), node.clone(), interval),
                cancel_token,
                retry_budget,
            )
            .await
        }
    }
}

async fn run_command_task<N>(
    node: Arc<N>,
    mut command_rx: mpsc::Receiver<ManagedNodeCommand>,
    cancel_token: &CancellationToken,
) -> Result<(), ManagedNodeActorError>
where
    N: ManagedNodeController + 'static,
{
    info!(target: "supervisor::managed_node", "Starting command task for managed node");
    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!(target: "supervisor::managed_node", "Cancellation requested, shutting down command task");
                return Ok(());
            }
            maybe_cmd = command_rx.recv() => {
                let Some(cmd) = maybe_cmd else {
                    info!(target: "supervisor::managed_node", "Command channel closed, shutting down command task");
                    return Err(ManagedNodeActorError::CommandReceiverClosed);
                };
                execute_command(&node, cmd).await;
            }
        }
    }
}

/// Executes one command. Failures are logged; the chain processor re-issues what it still needs.
async fn execute_command<N: ManagedNodeController>(node: &Arc<N>, cmd: ManagedNodeCommand) {
    let (command, result) = match cmd {
        ManagedNodeCommand::ResetTo { target } => ("reset_to", node.reset_to(target).await),
        ManagedNodeCommand::InvalidateBlock { block } => {
            ("invalidate_block", node.invalidate_block(block).await)
        }
        ManagedNodeCommand::ProvideL1State { block } => {
            ("provide_l1", node.provide_l1(block).await)
        }
        ManagedNodeCommand::UpdateCrossUnsafe { block_id } => {
            ("update_cross_unsafe", node.update_cross_unsafe(block_id).await)
        }
        ManagedNodeCommand::UpdateCrossSafe { derived, source } => {
            ("update_cross_safe", node.update_cross_safe(derived, source).await)
        }
        ManagedNodeCommand::UpdateFinalized { block_id } => {
            ("update_finalized", node.update_finalized(block_id).await)
        }
    };

    if let Err(err) = result {
        warn!(target: "supervisor::managed_node", command, %err, "Failed to execute managed node command");
    }
}

async fn run_subscription_task<C: ManagedNodeClient, N: SubscriptionHandler>(
    client: Arc<C>,
    handler: Arc<N>,
) -> Result<(), EventTaskError> {
    info!(target: "supervisor::managed_node", "Subscribing to managed node events");

    let mut subscription = client.subscribe_events().await.inspect_err(|err| {
        error!(target: "supervisor::managed_node", %err, "Failed to subscribe to node events");
    })?;

    loop {
        match subscription.next().await {
            Some(Ok(subscription_event)) => {
                if let Some(event) = subscription_event.data {
                    handle_managed_event(&handler, event).await;
                }
            }
            Some(Err(err)) => {
                error!(target: "supervisor::managed_node", %err, "Error in event deserialization");
                return Err(EventTaskError::Decode(err.to_string()));
            }
            None => {
                warn!(target: "supervisor::managed_node", "Subscription closed by server");
                client.reset_ws_client().await;
                return Ok(());
            }
        }
    }
}

async fn run_poll_task<C: ManagedNodeClient, N: SubscriptionHandler>(
    client: Arc<C>,
    handler: Arc<N>,
    interval: Duration,
) -> Result<(), EventTaskError> {
    info!(target: "supervisor::managed_node", ?interval, "Polling managed node events");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        // drain the node's queue on every tick
        loop {
            match client.pull_event().await {
                Ok(event) => handle_managed_event(&handler, event).await,
                Err(ClientError::NoEvent) => break,
                Err(err) => {
                    warn!(target: "supervisor::managed_node", %err, "Failed to pull managed node event");
                    return Err(err.into());
                }
            }
        }
    }
}

async fn handle_managed_event<N: SubscriptionHandler>(handler: &Arc<N>, event: ManagedEvent) {
    debug!(target: "supervisor::managed_node", ?event, "Received managed node event");

    if let Some(reset_id) = &event.reset {
        if let Err(err) = handler.handle_reset(reset_id).await {
            warn!(target: "supervisor::managed_node", %err, %reset_id, "Failed to handle reset event");
        }
    }

    if let Some(unsafe_block) = &event.unsafe_block {
        if let Err(err) = handler.handle_unsafe_block(unsafe_block).await {
            warn!(
                target: "supervisor::managed_node",
                %err,
                %unsafe_block,
                "Failed to handle unsafe block event"
            );
        }
    }

    // an origin update carries the same pair again; it is handled as an origin update only
    if let Some(derived_ref_pair) = &event.derivation_update {
        if event.derivation_origin_update.is_none() {
            if let Err(err) = handler.handle_derivation_update(derived_ref_pair).await {
                warn!(
                    target: "supervisor::managed_node",
                    %err,
                    %derived_ref_pair,
                    "Failed to handle derivation update event"
                );
            }
        }
    }

    if let Some(origin) = &event.derivation_origin_update {
        if let Err(err) = handler.handle_derivation_origin_update(origin).await {
            warn!(
                target: "supervisor::managed_node",
                %err,
                %origin,
                "Failed to handle derivation origin update event"
            );
        }
    }

    if let Some(derived_ref_pair) = &event.exhaust_l1 {
        if let Err(err) = handler.handle_exhaust_l1(derived_ref_pair).await {
            warn!(
                target: "supervisor::managed_node",
                %err,
                %derived_ref_pair,
                "Failed to handle L1 exhaust event"
            );
        }
    }

    if let Some(replacement) = &event.replace_block {
        if let Err(err) = handler.handle_replace_block(replacement).await {
            warn!(
                target: "supervisor::managed_node",
                %err,
                ?replacement,
                "Failed to handle block replacement event"
            );
        }
    }
}

#[derive(Debug, Error)]
enum EventTaskError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("malformed managed node event: {0}")]
    Decode(String),
}

/// Errors of the [`ManagedNodeActor`].
#[derive(Debug, Error)]
pub enum ManagedNodeActorError {
    /// The chain processor dropped its command sender.
    #[error("managed node command receiver closed")]
    CommandReceiverClosed,

    /// The node kept failing to deliver events.
    #[error(transparent)]
    EventsLost(RetryExhausted),
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_eips::BlockNumHash;
    use alloy_primitives::{B256, ChainId};
    use interop_supervisor_core::syncnode::{AuthenticationError, ManagedNodeError};
    use interop_supervisor_types::{
        BlockRef, BlockReplacement, BlockSeal, DerivedRefPair, L2BlockRef, NodeSelf,
        NodeSyncStatus, OutputV0, PeerDump, Receipts, SubscriptionEvent,
    };
    use jsonrpsee::core::client::Subscription;
    use mockall::{Sequence, mock, predicate::*};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    mock! {
        #[derive(Debug)]
        pub Node {}

        #[async_trait]
        impl ManagedNodeController for Node {
            async fn update_finalized(&self, finalized: BlockNumHash) -> Result<(), ManagedNodeError>;
            async fn update_cross_unsafe(&self, cross_unsafe: BlockNumHash) -> Result<(), ManagedNodeError>;
            async fn update_cross_safe(&self, derived: BlockNumHash, source: BlockNumHash) -> Result<(), ManagedNodeError>;
            async fn reset_to(&self, target: BlockNumHash) -> Result<(), ManagedNodeError>;
            async fn reset(&self) -> Result<(), ManagedNodeError>;
            async fn invalidate_block(&self, block: BlockRef) -> Result<(), ManagedNodeError>;
            async fn provide_l1(&self, block: BlockRef) -> Result<(), ManagedNodeError>;
        }

        #[async_trait]
        impl SubscriptionHandler for Node {
            async fn handle_exhaust_l1(&self, derived_ref_pair: &DerivedRefPair) -> Result<(), ManagedNodeError>;
            async fn handle_reset(&self, reset_id: &str) -> Result<(), ManagedNodeError>;
            async fn handle_unsafe_block(&self, block: &BlockRef) -> Result<(), ManagedNodeError>;
            async fn handle_derivation_update(&self, derived_ref_pair: &DerivedRefPair) -> Result<(), ManagedNodeError>;
            async fn handle_replace_block(&self, replacement: &BlockReplacement) -> Result<(), ManagedNodeError>;
            async fn handle_derivation_origin_update(&self, origin: &BlockRef) -> Result<(), ManagedNodeError>;
        }
    }

    mock! {
        #[derive(Debug)]
        pub NodeClient {}

        #[async_trait]
        impl ManagedNodeClient for NodeClient {
            async fn chain_id(&self) -> Result<ChainId, ClientError>;
            fn event_delivery(&self) -> EventDelivery;
            async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError>;
            async fn pull_event(&self) -> Result<ManagedEvent, ClientError>;
            async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError>;
            async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;
            async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockRef, ClientError>;
            async fn l2_block_ref_by_number(&self, number: u64) -> Result<L2BlockRef, ClientError>;
            async fn reset(
                &self,
                local_unsafe: BlockNumHash,
                cross_unsafe: BlockNumHash,
                local_safe: BlockNumHash,
                cross_safe: BlockNumHash,
                finalized: BlockNumHash,
            ) -> Result<(), ClientError>;
            async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError>;
            async fn provide_l1(&self, block: BlockRef) -> Result<(), ClientError>;
            async fn update_finalized(&self, finalized: BlockNumHash) -> Result<(), ClientError>;
            async fn update_cross_unsafe(&self, cross_unsafe: BlockNumHash) -> Result<(), ClientError>;
            async fn update_cross_safe(&self, derived: BlockNumHash, source: BlockNumHash) -> Result<(), ClientError>;
            async fn sync_status(&self) -> Result<NodeSyncStatus, ClientError>;
            async fn peers(&self) -> Result<PeerDump, ClientError>;
            async fn self_info(&self) -> Result<NodeSelf, ClientError>;
            async fn connect_peer(&self, addr: String) -> Result<(), ClientError>;
            async fn disconnect_peer(&self, peer_id: String) -> Result<(), ClientError>;
            async fn start_sequencer(&self, unsafe_head: B256) -> Result<(), ClientError>;
            async fn stop_sequencer(&self) -> Result<B256, ClientError>;
            async fn reset_ws_client(&self);
        }
    }

    fn block(number: u64) -> BlockRef {
        BlockRef::new(B256::repeat_byte(number as u8), number, B256::ZERO, 1000 + number)
    }

    #[tokio::test]
    async fn test_command_task_executes_commands_in_order() {
        let mut node = MockNode::new();
        let mut seq = Sequence::new();
        node.expect_update_cross_unsafe()
            .with(eq(block(5).id()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        node.expect_update_cross_safe()
            .with(eq(block(4).id()), eq(block(2).id()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        node.expect_reset_to()
            .with(eq(block(3).id()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ManagedNodeError::ResetBudgetExhausted { attempts: 5 }));
        node.expect_provide_l1()
            .with(eq(block(9)))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let (tx, rx) = mpsc::channel(10);
        let cancel_token = CancellationToken::new();

        tx.send(ManagedNodeCommand::UpdateCrossUnsafe { block_id: block(5).id() }).await.unwrap();
        tx.send(ManagedNodeCommand::UpdateCrossSafe {
            derived: block(4).id(),
            source: block(2).id(),
        })
        .await
        .unwrap();
        // a failing command does not stop the task
        tx.send(ManagedNodeCommand::ResetTo { target: block(3).id() }).await.unwrap();
        tx.send(ManagedNodeCommand::ProvideL1State { block: block(9) }).await.unwrap();
        drop(tx);

        let result = run_command_task(Arc::new(node), rx, &cancel_token).await;
        assert!(matches!(result, Err(ManagedNodeActorError::CommandReceiverClosed)));
    }

    #[tokio::test]
    async fn test_derivation_update_with_origin_update_is_handled_once() {
        let mut node = MockNode::new();
        node.expect_handle_derivation_update().times(0);
        node.expect_handle_derivation_origin_update()
            .with(eq(block(7)))
            .times(1)
            .returning(|_| Ok(()));
        node.expect_handle_unsafe_block().with(eq(block(12))).times(1).returning(|_| Ok(()));

        let event = ManagedEvent {
            unsafe_block: Some(block(12)),
            derivation_update: Some(DerivedRefPair::new(block(7), block(10))),
            derivation_origin_update: Some(block(7)),
            ..Default::default()
        };
        handle_managed_event(&Arc::new(node), event).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_task_drains_queue_and_fails_on_client_error() {
        let mut client = MockNodeClient::new();
        let mut seq = Sequence::new();
        client
            .expect_pull_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(ManagedEvent { unsafe_block: Some(block(1)), ..Default::default() }));
        client
            .expect_pull_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(ManagedEvent { unsafe_block: Some(block(2)), ..Default::default() }));
        client
            .expect_pull_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(ClientError::NoEvent));
        client
            .expect_pull_event()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(ClientError::Authentication(AuthenticationError::InvalidJwt)));

        let mut node = MockNode::new();
        node.expect_handle_unsafe_block().times(2).returning(|_| Ok(()));

        let result =
            run_poll_task(Arc::new(client), Arc::new(node), Duration::from_millis(500)).await;
        assert!(matches!(result, Err(EventTaskError::Client(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_actor_gives_up_when_node_keeps_failing() {
        let mut client = MockNodeClient::new();
        client
            .expect_event_delivery()
            .returning(|| EventDelivery::Poll { interval: Duration::from_secs(1) });
        client
            .expect_pull_event()
            .times(3)
            .returning(|| Err(ClientError::Authentication(AuthenticationError::InvalidHeader)));

        let (_tx, rx) = mpsc::channel(1);
        let actor = ManagedNodeActor::new(
            Arc::new(client),
            Arc::new(MockNode::new()),
            rx,
            CancellationToken::new(),
            2,
        );

        let result = actor.start().await;
        assert!(matches!(
            result,
            Err(ManagedNodeActorError::EventsLost(RetryExhausted { attempts: 3, .. }))
        ));
    }
}
