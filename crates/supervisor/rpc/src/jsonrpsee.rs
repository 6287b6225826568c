//! API traits, built with the `jsonrpsee` proc macros.

pub use jsonrpsee::{
    core::{RpcResult, SubscriptionResult},
    types::{ErrorCode, ErrorObjectOwned},
};

use crate::{ChainHealth, SuperRootOutputRpc, SupervisorSyncStatus};
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, BlockHash, ChainId, map::HashMap};
use interop_supervisor_types::{
    BlockRef, BlockSeal, DependencySet, DerivedIdPair, ExecutingDescriptor, HexStringU64,
    L2BlockRef, ManagedEvent, NodeSelf, NodeSyncStatus, OutputV0, PeerDump, Receipts,
    SafetyLevel, SubscriptionEvent,
};
use jsonrpsee::proc_macros::rpc;
use serde::{Deserialize, Serialize};

/// Query API of the supervisor.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "supervisor"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "supervisor"))]
pub trait SupervisorApi {
    /// Returns the L1 block the given L2 block was derived from, provided the L2 block is
    /// cross-safe.
    #[method(name = "crossDerivedToSource")]
    async fn cross_derived_to_source(
        &self,
        chain_id: HexStringU64,
        block_id: BlockNumHash,
    ) -> RpcResult<BlockRef>;

    /// Returns the [`LocalUnsafe`] head of a chain.
    ///
    /// [`LocalUnsafe`]: SafetyLevel::LocalUnsafe
    #[method(name = "localUnsafe")]
    async fn local_unsafe(&self, chain_id: HexStringU64) -> RpcResult<BlockNumHash>;

    /// Returns the [`CrossUnsafe`] head of a chain.
    ///
    /// [`CrossUnsafe`]: SafetyLevel::CrossUnsafe
    #[method(name = "crossUnsafe")]
    async fn cross_unsafe(&self, chain_id: HexStringU64) -> RpcResult<BlockNumHash>;

    /// Returns the [`LocalSafe`] head of a chain with its source.
    ///
    /// [`LocalSafe`]: SafetyLevel::LocalSafe
    #[method(name = "localSafe")]
    async fn local_safe(&self, chain_id: HexStringU64) -> RpcResult<DerivedIdPair>;

    /// Returns the [`CrossSafe`] head of a chain with its source.
    ///
    /// [`CrossSafe`]: SafetyLevel::CrossSafe
    #[method(name = "crossSafe")]
    async fn cross_safe(&self, chain_id: HexStringU64) -> RpcResult<DerivedIdPair>;

    /// Returns the [`Finalized`] head of a chain.
    ///
    /// [`Finalized`]: SafetyLevel::Finalized
    #[method(name = "finalized")]
    async fn finalized(&self, chain_id: HexStringU64) -> RpcResult<BlockNumHash>;

    /// Returns the finalized L1 block known to the supervisor.
    #[method(name = "finalizedL1")]
    async fn finalized_l1(&self) -> RpcResult<BlockRef>;

    /// Returns the super root of every chain in the dependency set at `timestamp`.
    ///
    /// Fails while some chain has not cross-safe derived a block at that timestamp.
    #[method(name = "superRootAtTimestamp")]
    async fn super_root_at_timestamp(
        &self,
        timestamp: HexStringU64,
    ) -> RpcResult<SuperRootOutputRpc>;

    /// Checks that every message claimed by the access list exists at `min_safety` or above, and
    /// may be executed as described by `executing_descriptor`.
    #[method(name = "checkAccessList")]
    async fn check_access_list(
        &self,
        inbox_entries: Vec<B256>,
        min_safety: SafetyLevel,
        executing_descriptor: ExecutingDescriptor,
    ) -> RpcResult<()>;

    /// Returns the heads of every chain.
    #[method(name = "syncStatus")]
    async fn sync_status(&self) -> RpcResult<SupervisorSyncStatus>;

    /// Returns, per chain, the last block derived from the given L1 block.
    #[method(name = "allSafeDerivedAt")]
    async fn all_safe_derived_at(
        &self,
        derived_from: BlockNumHash,
    ) -> RpcResult<HashMap<ChainId, BlockNumHash>>;

    /// Returns the dependency set.
    #[method(name = "dependencySetV1")]
    async fn dependency_set_v1(&self) -> RpcResult<DependencySet>;
}

/// Operator API of the supervisor.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "admin"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "admin"))]
pub trait SupervisorAdminApi {
    /// Re-initialises a chain from its activation block and resets its node.
    #[method(name = "resetChain")]
    async fn reset_chain(&self, chain_id: HexStringU64) -> RpcResult<()>;

    /// Reports whether each chain is processing, suspended by a reorg, or faulted.
    #[method(name = "health")]
    async fn health(&self) -> RpcResult<Vec<ChainHealth>>;

    /// Returns the sync status reported by a chain's node.
    #[method(name = "nodeSyncStatus")]
    async fn node_sync_status(&self, chain_id: HexStringU64) -> RpcResult<NodeSyncStatus>;

    /// Returns the peers of a chain's node.
    #[method(name = "nodePeers")]
    async fn node_peers(&self, chain_id: HexStringU64) -> RpcResult<PeerDump>;

    /// Connects the node of `chain_id` to the node of `peer_chain_id`.
    #[method(name = "connectNodes")]
    async fn connect_nodes(
        &self,
        chain_id: HexStringU64,
        peer_chain_id: HexStringU64,
    ) -> RpcResult<()>;

    /// Disconnects the node of `chain_id` from the node of `peer_chain_id`.
    #[method(name = "disconnectNodes")]
    async fn disconnect_nodes(
        &self,
        chain_id: HexStringU64,
        peer_chain_id: HexStringU64,
    ) -> RpcResult<()>;

    /// Starts block production on a chain's node.
    #[method(name = "startSequencer")]
    async fn start_sequencer(&self, chain_id: HexStringU64) -> RpcResult<()>;

    /// Stops block production on a chain's node. Returns the hash of the last sequenced block.
    #[method(name = "stopSequencer")]
    async fn stop_sequencer(&self, chain_id: HexStringU64) -> RpcResult<B256>;
}

/// Subscription topics of the managed mode API.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriptionTopic {
    /// Node events.
    Events,
}

/// Managed mode API, served by a node and driven by the supervisor.
#[cfg_attr(not(feature = "client"), rpc(server, namespace = "interop"))]
#[cfg_attr(feature = "client", rpc(server, client, namespace = "interop"))]
pub trait ManagedModeApi {
    /// Streams node events as [`SubscriptionEvent`]s.
    // the topic has to be passed explicitly even though only `events` exists
    #[subscription(name = "subscribe" => "subscription", item = SubscriptionEvent, unsubscribe = "unsubscribe")]
    async fn subscribe_events(&self, topic: SubscriptionTopic) -> SubscriptionResult;

    /// Pops the next pending event. Fails when there is none.
    #[method(name = "pullEvent")]
    async fn pull_event(&self) -> RpcResult<ManagedEvent>;

    /// Sets the node's cross-unsafe head.
    #[method(name = "updateCrossUnsafe")]
    async fn update_cross_unsafe(&self, id: BlockNumHash) -> RpcResult<()>;

    /// Sets the node's cross-safe head.
    #[method(name = "updateCrossSafe")]
    async fn update_cross_safe(&self, derived: BlockNumHash, source: BlockNumHash)
    -> RpcResult<()>;

    /// Sets the node's finalized head.
    #[method(name = "updateFinalized")]
    async fn update_finalized(&self, id: BlockNumHash) -> RpcResult<()>;

    /// Replaces the given block with a deposits-only block.
    #[method(name = "invalidateBlock")]
    async fn invalidate_block(&self, seal: BlockSeal) -> RpcResult<()>;

    /// Hands the node the next L1 block to derive from.
    #[method(name = "provideL1")]
    async fn provide_l1(&self, next_l1: BlockRef) -> RpcResult<()>;

    /// Resets the node heads.
    #[method(name = "reset")]
    async fn reset(
        &self,
        local_unsafe: BlockNumHash,
        cross_unsafe: BlockNumHash,
        local_safe: BlockNumHash,
        cross_safe: BlockNumHash,
        finalized: BlockNumHash,
    ) -> RpcResult<()>;

    /// Returns the receipts of a block.
    #[method(name = "fetchReceipts")]
    async fn fetch_receipts(&self, block_hash: BlockHash) -> RpcResult<Receipts>;

    /// Returns the canonical L2 block at `number`.
    #[method(name = "l2BlockRefByNumber")]
    async fn l2_block_ref_by_number(&self, number: u64) -> RpcResult<L2BlockRef>;

    /// Returns the chain id, as a decimal string.
    #[method(name = "chainID")]
    async fn chain_id(&self) -> RpcResult<String>;

    /// Returns the output of the last block at or before `timestamp`.
    #[method(name = "outputV0AtTimestamp")]
    async fn output_v0_at_timestamp(&self, timestamp: u64) -> RpcResult<OutputV0>;

    /// Returns the last L2 block at or before `timestamp`.
    #[method(name = "l2BlockRefByTimestamp")]
    async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> RpcResult<L2BlockRef>;
}

/// Rollup status API of a node.
#[cfg(feature = "client")]
#[rpc(client, namespace = "optimism")]
pub trait NodeRollupApi {
    /// Returns the node's sync status.
    #[method(name = "syncStatus")]
    async fn sync_status(&self) -> RpcResult<NodeSyncStatus>;
}

/// Peer-to-peer API of a node.
#[cfg(feature = "client")]
#[rpc(client, namespace = "opp2p")]
pub trait NodeP2pApi {
    /// Returns the peer table. With `connected` set, only connected peers are listed.
    #[method(name = "peers")]
    async fn peers(&self, connected: bool) -> RpcResult<PeerDump>;

    /// Returns the node's own p2p identity.
    #[method(name = "self")]
    async fn self_info(&self) -> RpcResult<NodeSelf>;

    /// Dials a peer by multiaddress.
    #[method(name = "connectPeer")]
    async fn connect_peer(&self, addr: String) -> RpcResult<()>;

    /// Drops the connection to a peer.
    #[method(name = "disconnectPeer")]
    async fn disconnect_peer(&self, peer_id: String) -> RpcResult<()>;
}

/// Sequencer control API of a node.
#[cfg(feature = "client")]
#[rpc(client, namespace = "admin")]
pub trait NodeAdminApi {
    /// Starts sequencing on top of the given unsafe head.
    #[method(name = "startSequencer")]
    async fn start_sequencer(&self, unsafe_head: B256) -> RpcResult<()>;

    /// Stops sequencing and returns the last sequenced block hash.
    #[method(name = "stopSequencer")]
    async fn stop_sequencer(&self) -> RpcResult<B256>;
}
