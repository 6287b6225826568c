//! [`ManagedNode`] adapts a managed node's RPC surface to the supervisor's capability traits.

use super::{
    BlockProvider, ManagedNodeAdmin, ManagedNodeClient, ManagedNodeController,
    ManagedNodeDataProvider, ManagedNodeError, SubscriptionHandler,
    resetter::{ResetPolicy, Resetter},
};
use crate::event::ChainEvent;
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use async_trait::async_trait;
use interop_supervisor_storage::{DerivationStorageReader, HeadRefStorageReader};
use interop_supervisor_types::{
    BlockRef, BlockReplacement, DerivedRefPair, L2BlockRef, NodeSelf, NodeSyncStatus, OutputV0,
    PeerDump, Receipts,
};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace, warn};

/// [`ManagedNode`] forwards node events to the chain processor and executes its commands.
#[derive(Debug)]
pub struct ManagedNode<DB, C> {
    /// The RPC client of the node.
    client: Arc<C>,
    /// Resetter for handling node resets
    resetter: Arc<Resetter<DB, C>>,
    /// Channel for sending events to the chain processor
    chain_event_sender: mpsc::Sender<ChainEvent>,

    /// Cached chain ID
    chain_id: Mutex<Option<ChainId>>,
}

impl<DB, C> ManagedNode<DB, C>
where
    DB: DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    /// Creates a new [`ManagedNode`] with the specified client.
    pub fn new(
        client: Arc<C>,
        db_provider: Arc<DB>,
        reset_policy: ResetPolicy,
        chain_event_sender: mpsc::Sender<ChainEvent>,
    ) -> Self {
        let resetter = Arc::new(Resetter::new(client.clone(), db_provider, reset_policy));
        Self { client, resetter, chain_event_sender, chain_id: Mutex::new(None) }
    }

    /// Returns the [`ChainId`] of the node, fetching it once.
    pub async fn chain_id(&self) -> Result<ChainId, ManagedNodeError> {
        let mut cache = self.chain_id.lock().await;
        if let Some(chain_id) = *cache {
            Ok(chain_id)
        } else {
            let chain_id = self.client.chain_id().await?;
            *cache = Some(chain_id);
            Ok(chain_id)
        }
    }

    /// Returns the underlying client.
    pub fn client(&self) -> Arc<C> {
        self.client.clone()
    }

    async fn send_event(&self, event: ChainEvent) -> Result<(), ManagedNodeError> {
        let name = event.name();
        self.chain_event_sender.send(event).await.map_err(|err| {
            warn!(target: "supervisor::managed_node", event = name, %err, "Failed to send chain event");
            ManagedNodeError::ChannelSendFailed(err.to_string())
        })
    }

    /// Fetches the full L2 reference of a block the node reported, making sure the node still
    /// has that block.
    async fn l2_block_ref(&self, block: &BlockRef) -> Result<L2BlockRef, ManagedNodeError> {
        let l2_block = self.client.l2_block_ref_by_number(block.number).await?;
        if l2_block.block != *block {
            debug!(
                target: "supervisor::managed_node",
                reported = %block,
                fetched = %l2_block,
                "Node no longer has the reported block"
            );
            return Err(ManagedNodeError::InconsistentBlock(block.number));
        }
        Ok(l2_block)
    }
}

#[async_trait]
impl<DB, C> SubscriptionHandler for ManagedNode<DB, C>
where
    DB: DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    async fn handle_exhaust_l1(
        &self,
        derived_ref_pair: &DerivedRefPair,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %derived_ref_pair, "L1 exhausted event received");

        self.send_event(ChainEvent::L1Exhausted { derived_ref_pair: *derived_ref_pair }).await
    }

    async fn handle_reset(&self, reset_id: &str) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, reset_id, "Reset event received");

        self.resetter.reset().await
    }

    async fn handle_unsafe_block(&self, unsafe_block: &BlockRef) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %unsafe_block, "Unsafe block event received");

        let block = self.l2_block_ref(unsafe_block).await?;
        self.send_event(ChainEvent::NewUnsafeHead { block }).await
    }

    async fn handle_derivation_update(
        &self,
        derived_ref_pair: &DerivedRefPair,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %derived_ref_pair, "Derivation update event received");

        self.send_event(ChainEvent::DerivedBlock { derived_ref_pair: *derived_ref_pair }).await
    }

    async fn handle_replace_block(
        &self,
        replacement: &BlockReplacement,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            replacement = %replacement.replacement,
            invalidated = %replacement.invalidated,
            "Block replacement received"
        );

        let block = self.l2_block_ref(&replacement.replacement).await?;
        self.send_event(ChainEvent::BlockReplaced { block, invalidated: replacement.invalidated })
            .await
    }

    async fn handle_derivation_origin_update(
        &self,
        origin: &BlockRef,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %origin, "Derivation origin update received");

        self.send_event(ChainEvent::DerivationOriginUpdate { origin: *origin }).await
    }
}

#[async_trait]
impl<DB, C> BlockProvider for ManagedNode<DB, C>
where
    DB: DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    async fn block_by_number(&self, number: u64) -> Result<L2BlockRef, ManagedNodeError> {
        Ok(self.client.l2_block_ref_by_number(number).await?)
    }

    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ManagedNodeError> {
        Ok(self.client.fetch_receipts(block_hash).await?)
    }
}

#[async_trait]
impl<DB, C> ManagedNodeDataProvider for ManagedNode<DB, C>
where
    DB: DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ManagedNodeError> {
        Ok(self.client.output_v0_at_timestamp(timestamp).await?)
    }

    async fn l2_block_ref_by_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<L2BlockRef, ManagedNodeError> {
        Ok(self.client.l2_block_ref_by_timestamp(timestamp).await?)
    }
}

#[async_trait]
impl<DB, C> ManagedNodeController for ManagedNode<DB, C>
where
    DB: DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    async fn update_finalized(&self, finalized: BlockNumHash) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, finalized = finalized.number, "Updating finalized block");

        Ok(self.client.update_finalized(finalized).await?)
    }

    async fn update_cross_unsafe(
        &self,
        cross_unsafe: BlockNumHash,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, cross_unsafe = cross_unsafe.number, "Updating cross unsafe block");

        Ok(self.client.update_cross_unsafe(cross_unsafe).await?)
    }

    async fn update_cross_safe(
        &self,
        derived: BlockNumHash,
        source: BlockNumHash,
    ) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(
            target: "supervisor::managed_node",
            %chain_id,
            derived = derived.number,
            source = source.number,
            "Updating cross safe block"
        );

        Ok(self.client.update_cross_safe(derived, source).await?)
    }

    async fn reset_to(&self, target: BlockNumHash) -> Result<(), ManagedNodeError> {
        self.resetter.reset_to(target).await
    }

    async fn reset(&self) -> Result<(), ManagedNodeError> {
        self.resetter.reset().await
    }

    async fn invalidate_block(&self, block: BlockRef) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %block, "Invalidating block");

        Ok(self.client.invalidate_block(block.into()).await?)
    }

    async fn provide_l1(&self, block: BlockRef) -> Result<(), ManagedNodeError> {
        let chain_id = self.chain_id().await?;
        trace!(target: "supervisor::managed_node", %chain_id, %block, "Providing L1 block");

        Ok(self.client.provide_l1(block).await?)
    }
}

#[async_trait]
impl<DB, C> ManagedNodeAdmin for ManagedNode<DB, C>
where
    DB: DerivationStorageReader + HeadRefStorageReader + Send + Sync + 'static,
    C: ManagedNodeClient + Send + Sync + 'static,
{
    async fn sync_status(&self) -> Result<NodeSyncStatus, ManagedNodeError> {
        Ok(self.client.sync_status().await?)
    }

    async fn peers(&self) -> Result<PeerDump, ManagedNodeError> {
        Ok(self.client.peers().await?)
    }

    async fn self_info(&self) -> Result<NodeSelf, ManagedNodeError> {
        Ok(self.client.self_info().await?)
    }

    async fn connect_peer(&self, addr: String) -> Result<(), ManagedNodeError> {
        Ok(self.client.connect_peer(addr).await?)
    }

    async fn disconnect_peer(&self, peer_id: String) -> Result<(), ManagedNodeError> {
        Ok(self.client.disconnect_peer(peer_id).await?)
    }

    async fn start_sequencer(&self, unsafe_head: B256) -> Result<(), ManagedNodeError> {
        Ok(self.client.start_sequencer(unsafe_head).await?)
    }

    async fn stop_sequencer(&self) -> Result<B256, ManagedNodeError> {
        Ok(self.client.stop_sequencer().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncnode::client::MockManagedNodeClient;
    use interop_supervisor_storage::StorageError;
    use interop_supervisor_types::{BlockSeal, SafetyLevel, SuperHead};
    use mockall::{mock, predicate::*};

    mock! {
        #[derive(Debug)]
        pub Db {}

        impl DerivationStorageReader for Db {
            fn derived_to_source(&self, derived: BlockNumHash) -> Result<BlockRef, StorageError>;
            fn latest_derived_block_at_source(&self, source: BlockNumHash) -> Result<BlockRef, StorageError>;
            fn latest_derivation_state(&self) -> Result<DerivedRefPair, StorageError>;
            fn get_source_block(&self, number: u64) -> Result<BlockRef, StorageError>;
            fn get_activation_block(&self) -> Result<BlockRef, StorageError>;
        }

        impl HeadRefStorageReader for Db {
            fn get_safety_head_ref(&self, level: SafetyLevel) -> Result<BlockRef, StorageError>;
            fn get_super_head(&self) -> Result<SuperHead, StorageError>;
        }
    }

    fn unsafe_block() -> BlockRef {
        BlockRef::new(B256::repeat_byte(1), 42, B256::repeat_byte(2), 1_234)
    }

    fn node(
        client: MockManagedNodeClient,
    ) -> (ManagedNode<MockDb, MockManagedNodeClient>, mpsc::Receiver<ChainEvent>) {
        let (tx, rx) = mpsc::channel(8);
        let node = ManagedNode::new(
            Arc::new(client),
            Arc::new(MockDb::new()),
            ResetPolicy::default(),
            tx,
        );
        (node, rx)
    }

    #[tokio::test]
    async fn test_chain_id_caching() {
        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().times(1).returning(|| Ok(42));

        let (node, _rx) = node(client);
        assert_eq!(node.chain_id().await.unwrap(), 42);
        assert_eq!(node.chain_id().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_handle_unsafe_block_sends_l2_ref() {
        let l2_block = L2BlockRef::new(unsafe_block(), BlockNumHash { number: 7, hash: B256::ZERO }, 3);

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client
            .expect_l2_block_ref_by_number()
            .with(eq(42))
            .returning(move |_| Ok(l2_block));

        let (node, mut rx) = node(client);
        node.handle_unsafe_block(&unsafe_block()).await.unwrap();

        assert_eq!(rx.recv().await, Some(ChainEvent::NewUnsafeHead { block: l2_block }));
    }

    #[tokio::test]
    async fn test_handle_unsafe_block_rejects_moved_node() {
        let other = BlockRef::new(B256::repeat_byte(9), 42, B256::repeat_byte(2), 1_234);

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client
            .expect_l2_block_ref_by_number()
            .returning(move |_| Ok(L2BlockRef::new(other, BlockNumHash::default(), 0)));

        let (node, mut rx) = node(client);
        assert_eq!(
            node.handle_unsafe_block(&unsafe_block()).await,
            Err(ManagedNodeError::InconsistentBlock(42))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_handle_derivation_update_sends_event() {
        let pair = DerivedRefPair::new(BlockRef::default(), unsafe_block());

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));

        let (node, mut rx) = node(client);
        node.handle_derivation_update(&pair).await.unwrap();

        assert_eq!(rx.recv().await, Some(ChainEvent::DerivedBlock { derived_ref_pair: pair }));
    }

    #[tokio::test]
    async fn test_handle_exhaust_l1_sends_event() {
        let pair = DerivedRefPair::new(BlockRef::default(), unsafe_block());

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_provide_l1().never();

        let (node, mut rx) = node(client);
        node.handle_exhaust_l1(&pair).await.unwrap();

        assert_eq!(rx.recv().await, Some(ChainEvent::L1Exhausted { derived_ref_pair: pair }));
    }

    #[tokio::test]
    async fn test_handle_replace_block_sends_replacement() {
        let replacement = BlockReplacement { replacement: unsafe_block(), invalidated: B256::repeat_byte(5) };
        let l2_block = L2BlockRef::new(unsafe_block(), BlockNumHash::default(), 0);

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_l2_block_ref_by_number().returning(move |_| Ok(l2_block));

        let (node, mut rx) = node(client);
        node.handle_replace_block(&replacement).await.unwrap();

        assert_eq!(
            rx.recv().await,
            Some(ChainEvent::BlockReplaced { block: l2_block, invalidated: B256::repeat_byte(5) })
        );
    }

    #[tokio::test]
    async fn test_handle_derivation_origin_update_sends_event() {
        let origin = BlockRef::new(B256::repeat_byte(3), 100, B256::ZERO, 0);

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));

        let (node, mut rx) = node(client);
        node.handle_derivation_origin_update(&origin).await.unwrap();

        assert_eq!(rx.recv().await, Some(ChainEvent::DerivationOriginUpdate { origin }));
    }

    #[tokio::test]
    async fn test_closed_channel_is_reported() {
        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));

        let (node, rx) = node(client);
        drop(rx);
        let err = node.handle_derivation_origin_update(&BlockRef::default()).await.unwrap_err();
        assert!(matches!(err, ManagedNodeError::ChannelSendFailed(_)));
    }

    #[tokio::test]
    async fn test_invalidate_block_sends_seal() {
        let block = unsafe_block();

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client
            .expect_invalidate_block()
            .with(eq(BlockSeal::from(block)))
            .times(1)
            .returning(|_| Ok(()));

        let (node, _rx) = node(client);
        node.invalidate_block(block).await.unwrap();
    }

    #[tokio::test]
    async fn test_controller_delegates_to_client() {
        let derived = BlockNumHash { number: 10, hash: B256::repeat_byte(1) };
        let source = BlockNumHash { number: 3, hash: B256::repeat_byte(2) };

        let mut client = MockManagedNodeClient::new();
        client.expect_chain_id().returning(|| Ok(1));
        client.expect_update_cross_safe().with(eq(derived), eq(source)).times(1).returning(|_, _| Ok(()));
        client.expect_update_cross_unsafe().with(eq(derived)).times(1).returning(|_| Ok(()));
        client.expect_update_finalized().with(eq(derived)).times(1).returning(|_| Ok(()));
        client.expect_provide_l1().times(1).returning(|_| Ok(()));

        let (node, _rx) = node(client);
        node.update_cross_safe(derived, source).await.unwrap();
        node.update_cross_unsafe(derived).await.unwrap();
        node.update_finalized(derived).await.unwrap();
        node.provide_l1(BlockRef::default()).await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_delegates_to_client() {
        let mut client = MockManagedNodeClient::new();
        client.expect_peers().returning(|| Ok(PeerDump::default()));
        client.expect_stop_sequencer().returning(|| Ok(B256::repeat_byte(4)));
        client.expect_start_sequencer().with(eq(B256::repeat_byte(4))).returning(|_| Ok(()));

        let (node, _rx) = node(client);
        assert_eq!(node.peers().await.unwrap().total_connected, 0);
        let head = node.stop_sequencer().await.unwrap();
        node.start_sequencer(head).await.unwrap();
    }
}
