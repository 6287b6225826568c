use super::ManagedNodeError;
use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use async_trait::async_trait;
use interop_supervisor_types::{
    BlockRef, BlockReplacement, DerivedRefPair, L2BlockRef, NodeSelf, NodeSyncStatus, OutputV0,
    PeerDump, Receipts,
};
use std::fmt::Debug;

/// Turns events reported by a managed node into chain events.
#[async_trait]
pub trait SubscriptionHandler: Send + Sync {
    /// Handles the node running out of L1 data.
    async fn handle_exhaust_l1(
        &self,
        derived_ref_pair: &DerivedRefPair,
    ) -> Result<(), ManagedNodeError>;

    /// Handles the node announcing it reset itself.
    async fn handle_reset(&self, reset_id: &str) -> Result<(), ManagedNodeError>;

    /// Handles a new unsafe head.
    async fn handle_unsafe_block(&self, block: &BlockRef) -> Result<(), ManagedNodeError>;

    /// Handles a newly derived block.
    async fn handle_derivation_update(
        &self,
        derived_ref_pair: &DerivedRefPair,
    ) -> Result<(), ManagedNodeError>;

    /// Handles a block replaced after invalidation.
    async fn handle_replace_block(
        &self,
        replacement: &BlockReplacement,
    ) -> Result<(), ManagedNodeError>;

    /// Handles derivation moving to a new L1 block.
    async fn handle_derivation_origin_update(
        &self,
        origin: &BlockRef,
    ) -> Result<(), ManagedNodeError>;
}

/// [`BlockProvider`] abstracts fetching blocks and receipts from a managed node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlockProvider: Send + Sync + Debug {
    /// Fetch all transaction receipts for the block with the given hash.
    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ManagedNodeError>;

    /// Returns the canonical L2 block with the given number.
    async fn block_by_number(&self, number: u64) -> Result<L2BlockRef, ManagedNodeError>;
}

/// Data the query surface reads from a managed node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagedNodeDataProvider: Send + Sync + Debug {
    /// Fetch the output v0 at a given timestamp.
    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ManagedNodeError>;

    /// Fetch the L2 block at a given timestamp.
    async fn l2_block_ref_by_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<L2BlockRef, ManagedNodeError>;
}

/// [`ManagedNodeController`] pushes supervisor decisions into a managed node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagedNodeController: Send + Sync + Debug {
    /// Moves the node's finalized head.
    async fn update_finalized(&self, finalized: BlockNumHash) -> Result<(), ManagedNodeError>;

    /// Moves the node's cross-unsafe head.
    async fn update_cross_unsafe(&self, cross_unsafe: BlockNumHash)
    -> Result<(), ManagedNodeError>;

    /// Moves the node's cross-safe head.
    async fn update_cross_safe(
        &self,
        derived: BlockNumHash,
        source: BlockNumHash,
    ) -> Result<(), ManagedNodeError>;

    /// Resets the node so that every head is at or below `target`.
    ///
    /// Bounded by a per-call timeout and retried with exponential backoff. Resetting to the same
    /// target twice is harmless.
    async fn reset_to(&self, target: BlockNumHash) -> Result<(), ManagedNodeError>;

    /// Resets the node to the latest local-safe block it agrees on with the supervisor.
    async fn reset(&self) -> Result<(), ManagedNodeError>;

    /// Asks the node to replace a block.
    async fn invalidate_block(&self, block: BlockRef) -> Result<(), ManagedNodeError>;

    /// Hands the node the next L1 block.
    async fn provide_l1(&self, block: BlockRef) -> Result<(), ManagedNodeError>;
}

/// Operator controls of a managed node, exposed through the admin API.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagedNodeAdmin: Send + Sync + Debug {
    /// The node's own sync status.
    async fn sync_status(&self) -> Result<NodeSyncStatus, ManagedNodeError>;

    /// Connected peers.
    async fn peers(&self) -> Result<PeerDump, ManagedNodeError>;

    /// Local p2p identity.
    async fn self_info(&self) -> Result<NodeSelf, ManagedNodeError>;

    /// Dials the given multiaddress.
    async fn connect_peer(&self, addr: String) -> Result<(), ManagedNodeError>;

    /// Drops the connection to `peer_id`.
    async fn disconnect_peer(&self, peer_id: String) -> Result<(), ManagedNodeError>;

    /// Starts sequencing on top of `unsafe_head`.
    async fn start_sequencer(&self, unsafe_head: B256) -> Result<(), ManagedNodeError>;

    /// Stops sequencing, returning the last sequenced block hash.
    async fn stop_sequencer(&self) -> Result<B256, ManagedNodeError>;
}

/// Everything the supervisor does with a managed node.
#[async_trait]
pub trait ManagedNodeProvider:
    SubscriptionHandler
    + BlockProvider
    + ManagedNodeDataProvider
    + ManagedNodeController
    + ManagedNodeAdmin
    + Send
    + Sync
    + Debug
{
}

#[async_trait]
impl<T> ManagedNodeProvider for T where
    T: SubscriptionHandler
        + BlockProvider
        + ManagedNodeDataProvider
        + ManagedNodeController
        + ManagedNodeAdmin
        + Send
        + Sync
        + Debug
{
}
