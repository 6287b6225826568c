use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use async_trait::async_trait;
use core::fmt::Debug;
use interop_supervisor_rpc::{ChainHealth, ChainHealthStatus, ChainRootInfoRpc, SuperRootOutputRpc};
use interop_supervisor_storage::{
    ChainDb, ChainDbFactory, DerivationStorageReader, EntryNotFoundError, FinalizedL1Storage,
    HeadRefStorageReader, LogStorageReader, StorageError,
};
use interop_supervisor_types::{
    Access, BlockRef, DependencySet, ExecutingDescriptor, InteropValidator, NodeSyncStatus,
    OutputRootWithChain, PeerDump, SUPER_ROOT_VERSION, SafetyLevel, SuperHead, SuperRoot,
    parse_access_list,
};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::{
    SpecError, SupervisorError,
    chain_processor::ProcessorHealth,
    config::Config,
    error::SuperchainDAError,
    event::ChainEvent,
    syncnode::{ManagedNodeAdmin, ManagedNodeDataProvider},
};

/// Read-only query service over the supervised chains.
#[async_trait]
#[auto_impl::auto_impl(&, &mut, Arc, Box)]
pub trait SupervisorService: Debug + Send + Sync {
    /// Returns list of supervised [`ChainId`]s.
    fn chain_ids(&self) -> impl Iterator<Item = ChainId>;

    /// Returns the [`DependencySet`] the supervisor validates messages against.
    fn dependency_set(&self) -> &DependencySet;

    /// Returns [`SuperHead`] of given supervised chain.
    fn super_head(&self, chain: ChainId) -> Result<SuperHead, SupervisorError>;

    /// Returns latest block derived from given L1 block, for given chain.
    fn latest_block_from(
        &self,
        l1_block: BlockNumHash,
        chain: ChainId,
    ) -> Result<BlockRef, SupervisorError>;

    /// Returns the L1 source block that the given L2 derived block was based on, for the specified
    /// chain.
    fn derived_to_source_block(
        &self,
        chain: ChainId,
        derived: BlockNumHash,
    ) -> Result<BlockRef, SupervisorError>;

    /// Like [`derived_to_source_block`](Self::derived_to_source_block), but only for blocks at or
    /// below the cross-safe head.
    fn cross_derived_to_source(
        &self,
        chain: ChainId,
        derived: BlockNumHash,
    ) -> Result<BlockRef, SupervisorError>;

    /// Returns [`LocalUnsafe`] block for the given chain.
    ///
    /// [`LocalUnsafe`]: SafetyLevel::LocalUnsafe
    fn local_unsafe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError>;

    /// Returns [`CrossUnsafe`] block for the given chain.
    ///
    /// [`CrossUnsafe`]: SafetyLevel::CrossUnsafe
    fn cross_unsafe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError>;

    /// Returns [`LocalSafe`] block for the given chain.
    ///
    /// [`LocalSafe`]: SafetyLevel::LocalSafe
    fn local_safe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError>;

    /// Returns [`CrossSafe`] block for the given chain.
    ///
    /// [`CrossSafe`]: SafetyLevel::CrossSafe
    fn cross_safe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError>;

    /// Returns [`Finalized`] block for the given chain.
    ///
    /// [`Finalized`]: SafetyLevel::Finalized
    fn finalized(&self, chain: ChainId) -> Result<BlockRef, SupervisorError>;

    /// Returns the finalized L1 block that the supervisor is synced to.
    fn finalized_l1(&self) -> Result<BlockRef, SupervisorError>;

    /// Returns the super root at `timestamp`.
    ///
    /// Fails with `FutureData` while the block of some chain at that timestamp is not cross-safe.
    async fn super_root_at_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<SuperRootOutputRpc, SupervisorError>;

    /// Verifies if an access-list references only valid messages
    fn check_access_list(
        &self,
        inbox_entries: Vec<B256>,
        min_safety: SafetyLevel,
        executing_descriptor: ExecutingDescriptor,
    ) -> Result<(), SupervisorError>;
}

/// Operator actions on chains and their managed nodes.
#[async_trait]
#[auto_impl::auto_impl(&, Arc, Box)]
pub trait SupervisorAdminService: Debug + Send + Sync {
    /// Asks the chain processor to resync the chain from its activation block.
    async fn reset_chain(&self, chain: ChainId) -> Result<(), SupervisorError>;

    /// Health of every chain in the dependency set, ordered by chain id.
    async fn health(&self) -> Vec<ChainHealth>;

    /// Sync status as reported by the chain's node.
    async fn node_sync_status(&self, chain: ChainId) -> Result<NodeSyncStatus, SupervisorError>;

    /// Peers of the chain's node.
    async fn node_peers(&self, chain: ChainId) -> Result<PeerDump, SupervisorError>;

    /// Connects the node of `chain` to the node of `peer_chain`.
    async fn connect_nodes(&self, chain: ChainId, peer_chain: ChainId)
    -> Result<(), SupervisorError>;

    /// Disconnects the node of `chain` from the node of `peer_chain`.
    async fn disconnect_nodes(
        &self,
        chain: ChainId,
        peer_chain: ChainId,
    ) -> Result<(), SupervisorError>;

    /// Starts sequencing on the chain's node, on top of its current unsafe head.
    async fn start_sequencer(&self, chain: ChainId) -> Result<(), SupervisorError>;

    /// Stops sequencing on the chain's node.
    async fn stop_sequencer(&self, chain: ChainId) -> Result<B256, SupervisorError>;
}

/// Channels into a running chain processor.
#[derive(Debug, Clone)]
struct ProcessorHandle {
    event_tx: mpsc::Sender<ChainEvent>,
    health: watch::Receiver<ProcessorHealth>,
}

/// The core Supervisor component responsible for monitoring and coordinating chain states.
#[derive(Debug)]
pub struct Supervisor<M> {
    config: Arc<Config>,
    database_factory: Arc<ChainDbFactory>,

    // One managed node per chain.
    managed_nodes: RwLock<HashMap<ChainId, Arc<M>>>,
    processors: RwLock<HashMap<ChainId, ProcessorHandle>>,
}

impl<M> Supervisor<M>
where
    M: ManagedNodeDataProvider + ManagedNodeAdmin + Send + Sync + Debug,
{
    /// Creates a new [`Supervisor`] instance.
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(config: Arc<Config>, database_factory: Arc<ChainDbFactory>) -> Self {
        Self {
            config,
            database_factory,
            managed_nodes: RwLock::new(HashMap::new()),
            processors: RwLock::new(HashMap::new()),
        }
    }

    /// Adds a new managed node to the [`Supervisor`].
    pub async fn add_managed_node(
        &self,
        chain_id: ChainId,
        managed_node: Arc<M>,
    ) -> Result<(), SupervisorError> {
        self.ensure_supported(chain_id)?;

        let mut managed_nodes = self.managed_nodes.write().await;
        if managed_nodes.contains_key(&chain_id) {
            warn!(target: "supervisor::service", %chain_id, "Managed node already exists for chain");
            return Ok(());
        }

        managed_nodes.insert(chain_id, managed_node);
        Ok(())
    }

    /// Registers the event channel and health feed of a chain's processor.
    pub async fn register_processor(
        &self,
        chain_id: ChainId,
        event_tx: mpsc::Sender<ChainEvent>,
        health: watch::Receiver<ProcessorHealth>,
    ) -> Result<(), SupervisorError> {
        self.ensure_supported(chain_id)?;
        self.processors.write().await.insert(chain_id, ProcessorHandle { event_tx, health });
        Ok(())
    }

    fn ensure_supported(&self, chain_id: ChainId) -> Result<(), SupervisorError> {
        if !self.config.dependency_set.contains(chain_id) {
            warn!(target: "supervisor::service", %chain_id, "Unsupported chain ID");
            return Err(SupervisorError::UnsupportedChainId(chain_id));
        }
        Ok(())
    }

    async fn managed_node(&self, chain_id: ChainId) -> Result<Arc<M>, SupervisorError> {
        self.ensure_supported(chain_id)?;
        self.managed_nodes.read().await.get(&chain_id).cloned().ok_or_else(|| {
            error!(target: "supervisor::service", %chain_id, "Managed node not found for chain");
            SupervisorError::ManagedNodeMissing(chain_id)
        })
    }

    fn get_db(&self, chain: ChainId) -> Result<Arc<ChainDb>, SupervisorError> {
        self.ensure_supported(chain)?;
        self.database_factory.get_db(chain).map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get database for chain");
            SpecError::from(err).into()
        })
    }

    fn head(&self, chain: ChainId, level: SafetyLevel) -> Result<BlockRef, SupervisorError> {
        Ok(self.get_db(chain)?.get_safety_head_ref(level).map_err(|err| {
            debug!(target: "supervisor::service", %chain, %level, %err, "Failed to get head ref for chain");
            SpecError::from(err)
        })?)
    }

    /// Checks a single access-list claim.
    fn check_access(
        &self,
        access: &Access,
        min_safety: SafetyLevel,
        executing_descriptor: &ExecutingDescriptor,
    ) -> Result<(), SupervisorError> {
        let chain_id = access.chain_id()?;
        self.ensure_supported(chain_id)?;

        let executing_chain_id = executing_descriptor.chain_id.unwrap_or(chain_id);
        self.config.validate_interop_timestamps(
            chain_id,
            access.timestamp,
            executing_chain_id,
            executing_descriptor.timestamp,
            executing_descriptor.timeout,
        ).inspect_err(|err| {
            debug!(target: "supervisor::service", %chain_id, %err, "Message may not be executed at the given time");
        })?;

        let db = self.get_db(chain_id)?;
        let block = db.get_block(access.block_number)?.block;
        if block.timestamp != access.timestamp {
            return Err(SupervisorError::TimestampMismatch {
                block_number: access.block_number,
                expected: block.timestamp,
                got: access.timestamp,
            });
        }

        let log = db.get_log(access.block_number, access.log_index).map_err(|err| match err {
            StorageError::EntryNotFound(EntryNotFoundError::LogNotFound { .. }) => {
                SupervisorError::LogIndexMismatch {
                    block_number: access.block_number,
                    log_index: access.log_index,
                }
            }
            err => err.into(),
        })?;
        access.verify_checksum(&log.hash).map_err(|_| SupervisorError::InvalidChecksum {
            chain_id,
            block_number: access.block_number,
            log_index: access.log_index,
        })?;

        // anything in log storage is at least local-unsafe
        if min_safety == SafetyLevel::LocalUnsafe {
            return Ok(());
        }
        let insufficient = || SupervisorError::InsufficientSafety {
            chain_id,
            block_number: block.number,
            level: min_safety,
        };
        let head = match db.get_safety_head_ref(min_safety) {
            Ok(head) => head,
            Err(StorageError::FutureData) => return Err(insufficient()),
            Err(err) => return Err(err.into()),
        };
        if head.number < block.number {
            return Err(insufficient());
        }
        Ok(())
    }
}

#[async_trait]
impl<M> SupervisorService for Supervisor<M>
where
    M: ManagedNodeDataProvider + ManagedNodeAdmin + Send + Sync + Debug,
{
    fn chain_ids(&self) -> impl Iterator<Item = ChainId> {
        self.config.dependency_set.chain_ids().into_iter()
    }

    fn dependency_set(&self) -> &DependencySet {
        &self.config.dependency_set
    }

    fn super_head(&self, chain: ChainId) -> Result<SuperHead, SupervisorError> {
        Ok(self.get_db(chain)?.get_super_head().map_err(|err| {
            error!(target: "supervisor::service", %chain, %err, "Failed to get super head for chain");
            SpecError::from(err)
        })?)
    }

    fn latest_block_from(
        &self,
        l1_block: BlockNumHash,
        chain: ChainId,
    ) -> Result<BlockRef, SupervisorError> {
        Ok(self
            .get_db(chain)?
            .latest_derived_block_at_source(l1_block)
            .map_err(|err| {
                debug!(target: "supervisor::service", %chain, %err, "Failed to get latest derived block at source for chain");
                SpecError::from(err)
            })?
        )
    }

    fn derived_to_source_block(
        &self,
        chain: ChainId,
        derived: BlockNumHash,
    ) -> Result<BlockRef, SupervisorError> {
        Ok(self.get_db(chain)?.derived_to_source(derived).map_err(|err| {
            debug!(target: "supervisor::service", %chain, %err, "Failed to get derived to source block for chain");
            SpecError::from(err)
        })?)
    }

    fn cross_derived_to_source(
        &self,
        chain: ChainId,
        derived: BlockNumHash,
    ) -> Result<BlockRef, SupervisorError> {
        let cross_safe = self.head(chain, SafetyLevel::CrossSafe)?;
        if derived.number > cross_safe.number {
            return Err(SpecError::from(SuperchainDAError::FutureData).into());
        }
        self.derived_to_source_block(chain, derived)
    }

    fn local_unsafe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError> {
        self.head(chain, SafetyLevel::LocalUnsafe)
    }

    fn cross_unsafe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError> {
        self.head(chain, SafetyLevel::CrossUnsafe)
    }

    fn local_safe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError> {
        self.head(chain, SafetyLevel::LocalSafe)
    }

    fn cross_safe(&self, chain: ChainId) -> Result<BlockRef, SupervisorError> {
        self.head(chain, SafetyLevel::CrossSafe)
    }

    fn finalized(&self, chain: ChainId) -> Result<BlockRef, SupervisorError> {
        self.head(chain, SafetyLevel::Finalized)
    }

    fn finalized_l1(&self) -> Result<BlockRef, SupervisorError> {
        Ok(self.database_factory.get_finalized_l1().map_err(|err| {
            debug!(target: "supervisor::service", %err, "Failed to get finalized L1");
            SpecError::from(err)
        })?)
    }

    async fn super_root_at_timestamp(
        &self,
        timestamp: u64,
    ) -> Result<SuperRootOutputRpc, SupervisorError> {
        let chain_ids = self.config.dependency_set.chain_ids();

        let mut chain_infos = Vec::<ChainRootInfoRpc>::with_capacity(chain_ids.len());
        let mut output_roots = Vec::<OutputRootWithChain>::with_capacity(chain_ids.len());
        let mut cross_safe_source = BlockNumHash::default();

        for id in chain_ids {
            let managed_node = self.managed_node(id).await?;

            let l2_block = managed_node.l2_block_ref_by_timestamp(timestamp).await?;
            let cross_safe = self.head(id, SafetyLevel::CrossSafe)?;
            if l2_block.number() > cross_safe.number {
                debug!(
                    target: "supervisor::service",
                    chain_id = %id,
                    %timestamp,
                    block = %l2_block,
                    "Block at timestamp is not cross-safe yet"
                );
                return Err(SpecError::from(SuperchainDAError::FutureData).into());
            }

            let source = self.derived_to_source_block(id, l2_block.id()).inspect_err(|err| {
                warn!(target: "supervisor::service", chain_id = %id, %err, "Failed to get source of block at timestamp");
            })?;
            if source.number > cross_safe_source.number {
                cross_safe_source = source.id();
            }

            let output_root = managed_node.output_v0_at_timestamp(timestamp).await?.output_root();
            chain_infos.push(ChainRootInfoRpc { chain_id: id, canonical: output_root });
            output_roots.push(OutputRootWithChain::new(id, output_root));
        }

        Ok(SuperRootOutputRpc {
            cross_safe_derived_from: cross_safe_source,
            timestamp,
            super_root: SuperRoot::new(timestamp, output_roots).hash(),
            chains: chain_infos,
            version: SUPER_ROOT_VERSION,
        })
    }

    fn check_access_list(
        &self,
        inbox_entries: Vec<B256>,
        min_safety: SafetyLevel,
        executing_descriptor: ExecutingDescriptor,
    ) -> Result<(), SupervisorError> {
        let access_list = parse_access_list(inbox_entries)?;

        for access in &access_list {
            self.check_access(access, min_safety, &executing_descriptor).inspect_err(|err| {
                warn!(
                    target: "supervisor::service",
                    block_number = access.block_number,
                    log_index = access.log_index,
                    %err,
                    "Access list entry rejected"
                );
            })?;
        }

        Ok(())
    }
}

#[async_trait]
impl<M> SupervisorAdminService for Supervisor<M>
where
    M: ManagedNodeDataProvider + ManagedNodeAdmin + Send + Sync + Debug,
{
    async fn reset_chain(&self, chain: ChainId) -> Result<(), SupervisorError> {
        self.ensure_supported(chain)?;
        let event_tx = self
            .processors
            .read()
            .await
            .get(&chain)
            .map(|handle| handle.event_tx.clone())
            .ok_or(SupervisorError::ChannelSendFailed(chain))?;

        info!(target: "supervisor::service", chain_id = %chain, "Operator requested chain reset");
        event_tx.send(ChainEvent::Recover).await.map_err(|err| {
            error!(target: "supervisor::service", chain_id = %chain, %err, "Failed to send recovery event");
            SupervisorError::ChannelSendFailed(chain)
        })
    }

    async fn health(&self) -> Vec<ChainHealth> {
        let processors = self.processors.read().await;
        self.config
            .dependency_set
            .chain_ids()
            .into_iter()
            .map(|chain_id| match processors.get(&chain_id) {
                Some(handle) => {
                    let health = handle.health.borrow();
                    ChainHealth {
                        chain_id,
                        status: health.health_status(),
                        reason: health.fault_reason().map(str::to_string),
                    }
                }
                None => ChainHealth {
                    chain_id,
                    status: ChainHealthStatus::Faulted,
                    reason: Some("chain processor not running".to_string()),
                },
            })
            .collect()
    }

    async fn node_sync_status(&self, chain: ChainId) -> Result<NodeSyncStatus, SupervisorError> {
        Ok(self.managed_node(chain).await?.sync_status().await?)
    }

    async fn node_peers(&self, chain: ChainId) -> Result<PeerDump, SupervisorError> {
        Ok(self.managed_node(chain).await?.peers().await?)
    }

    async fn connect_nodes(
        &self,
        chain: ChainId,
        peer_chain: ChainId,
    ) -> Result<(), SupervisorError> {
        let node = self.managed_node(chain).await?;
        let peer = self.managed_node(peer_chain).await?.self_info().await?;

        let mut last_err = None;
        for addr in peer.addresses {
            match node.connect_peer(addr.clone()).await {
                Ok(()) => {
                    info!(target: "supervisor::service", chain_id = %chain, %peer_chain, %addr, "Connected nodes");
                    return Ok(());
                }
                Err(err) => {
                    warn!(target: "supervisor::service", chain_id = %chain, %addr, %err, "Failed to connect to peer address");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.map_or(SupervisorError::NoPeerAddress(peer_chain), Into::into))
    }

    async fn disconnect_nodes(
        &self,
        chain: ChainId,
        peer_chain: ChainId,
    ) -> Result<(), SupervisorError> {
        let node = self.managed_node(chain).await?;
        let peer = self.managed_node(peer_chain).await?.self_info().await?;
        node.disconnect_peer(peer.peer_id).await?;
        info!(target: "supervisor::service", chain_id = %chain, %peer_chain, "Disconnected nodes");
        Ok(())
    }

    async fn start_sequencer(&self, chain: ChainId) -> Result<(), SupervisorError> {
        let node = self.managed_node(chain).await?;
        let unsafe_head = node.sync_status().await?.unsafe_l2.hash();
        node.start_sequencer(unsafe_head).await?;
        info!(target: "supervisor::service", chain_id = %chain, %unsafe_head, "Started sequencer");
        Ok(())
    }

    async fn stop_sequencer(&self, chain: ChainId) -> Result<B256, SupervisorError> {
        let last = self.managed_node(chain).await?.stop_sequencer().await?;
        info!(target: "supervisor::service", chain_id = %chain, %last, "Stopped sequencer");
        Ok(last)
    }
}
