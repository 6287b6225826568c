//! Server-side implementation of the Supervisor RPC API.

use super::Metrics;
use crate::{SpecError, SupervisorError, SupervisorService, error::SuperchainDAError};
use alloy_eips::eip1898::BlockNumHash;
use alloy_primitives::{B256, ChainId, map::HashMap};
use async_trait::async_trait;
use interop_supervisor_rpc::{
    SuperRootOutputRpc, SupervisorApiServer, SupervisorChainSyncStatus, SupervisorSyncStatus,
};
use interop_supervisor_types::{
    BlockRef, DependencySet, DerivedIdPair, ExecutingDescriptor, HexStringU64, SafetyLevel,
    SuperHead,
};
use jsonrpsee::{core::RpcResult, types::ErrorObject};
use std::sync::Arc;
use tracing::{trace, warn};

/// The server-side implementation struct for the [`SupervisorApiServer`].
/// It holds a reference to the core Supervisor logic.
#[derive(Debug)]
pub struct SupervisorRpc<T> {
    supervisor: Arc<T>,
}

impl<T> SupervisorRpc<T> {
    /// Creates a new [`SupervisorRpc`] instance.
    pub fn new(supervisor: Arc<T>) -> Self {
        Metrics::init();
        trace!(target: "supervisor::rpc", "Creating new SupervisorRpc handler");
        Self { supervisor }
    }
}

impl<T> SupervisorRpc<T>
where
    T: SupervisorService,
{
    /// Pairs a head with the L1 block it was derived from.
    fn with_source(&self, chain_id: ChainId, head: BlockRef) -> Result<DerivedIdPair, SupervisorError> {
        let derived = head.id();
        let source = self.supervisor.derived_to_source_block(chain_id, derived)?.id();
        Ok(DerivedIdPair { source, derived })
    }
}

/// Returns `true` if the chain has nothing stored yet. Such chains are left out of the sync
/// status instead of failing it.
const fn is_uninitialised(err: &SupervisorError) -> bool {
    matches!(
        err,
        SupervisorError::SpecError(SpecError::SuperchainDAError(
            SuperchainDAError::UninitializedChainDatabase
        ))
    )
}

#[async_trait]
impl<T> SupervisorApiServer for SupervisorRpc<T>
where
    T: SupervisorService + 'static,
{
    async fn cross_derived_to_source(
        &self,
        chain_id_hex: HexStringU64,
        derived: BlockNumHash,
    ) -> RpcResult<BlockRef> {
        let chain_id = ChainId::from(chain_id_hex);
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_CROSS_DERIVED_TO_SOURCE,
            async {
                trace!(
                    target: "supervisor::rpc",
                    %chain_id,
                    ?derived,
                    "Received cross_derived_to_source request"
                );

                self.supervisor.cross_derived_to_source(chain_id, derived).map_err(|err| {
                    warn!(
                        target: "supervisor::rpc",
                        %chain_id,
                        ?derived,
                        %err,
                        "Failed to get source block for derived block"
                    );
                    ErrorObject::from(err)
                })
            }
            .await
        )
    }

    async fn local_unsafe(&self, chain_id_hex: HexStringU64) -> RpcResult<BlockNumHash> {
        let chain_id = ChainId::from(chain_id_hex);
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_LOCAL_UNSAFE,
            async {
                trace!(target: "supervisor::rpc", %chain_id, "Received local_unsafe request");
                Ok(self.supervisor.local_unsafe(chain_id)?.id())
            }
            .await
        )
    }

    async fn cross_unsafe(&self, chain_id_hex: HexStringU64) -> RpcResult<BlockNumHash> {
        let chain_id = ChainId::from(chain_id_hex);
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_CROSS_UNSAFE,
            async {
                trace!(target: "supervisor::rpc", %chain_id, "Received cross_unsafe request");
                Ok(self.supervisor.cross_unsafe(chain_id)?.id())
            }
            .await
        )
    }

    async fn local_safe(&self, chain_id_hex: HexStringU64) -> RpcResult<DerivedIdPair> {
        let chain_id = ChainId::from(chain_id_hex);
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_LOCAL_SAFE,
            async {
                trace!(target: "supervisor::rpc", %chain_id, "Received local_safe request");
                let head = self.supervisor.local_safe(chain_id)?;
                Ok(self.with_source(chain_id, head)?)
            }
            .await
        )
    }

    async fn cross_safe(&self, chain_id_hex: HexStringU64) -> RpcResult<DerivedIdPair> {
        let chain_id = ChainId::from(chain_id_hex);
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_CROSS_SAFE,
            async {
                trace!(target: "supervisor::rpc", %chain_id, "Received cross_safe request");
                let head = self.supervisor.cross_safe(chain_id)?;
                Ok(self.with_source(chain_id, head)?)
            }
            .await
        )
    }

    async fn finalized(&self, chain_id_hex: HexStringU64) -> RpcResult<BlockNumHash> {
        let chain_id = ChainId::from(chain_id_hex);
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_FINALIZED,
            async {
                trace!(target: "supervisor::rpc", %chain_id, "Received finalized request");
                Ok(self.supervisor.finalized(chain_id)?.id())
            }
            .await
        )
    }

    async fn finalized_l1(&self) -> RpcResult<BlockRef> {
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_FINALIZED_L1,
            async {
                trace!(target: "supervisor::rpc", "Received finalized_l1 request");
                Ok(self.supervisor.finalized_l1()?)
            }
            .await
        )
    }

    async fn super_root_at_timestamp(
        &self,
        timestamp_hex: HexStringU64,
    ) -> RpcResult<SuperRootOutputRpc> {
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_SUPER_ROOT_AT_TIMESTAMP,
            async {
                let timestamp = u64::from(timestamp_hex);
                trace!(target: "supervisor::rpc",
                    %timestamp,
                    "Received super_root_at_timestamp request"
                );

                self.supervisor.super_root_at_timestamp(timestamp)
                    .await
                    .map_err(|err| {
                        warn!(target: "supervisor::rpc", %timestamp, %err, "Failed to compute super root");
                        ErrorObject::from(err)
                    })
            }.await
        )
    }

    async fn check_access_list(
        &self,
        inbox_entries: Vec<B256>,
        min_safety: SafetyLevel,
        executing_descriptor: ExecutingDescriptor,
    ) -> RpcResult<()> {
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_CHECK_ACCESS_LIST,
            async {
                trace!(target: "supervisor::rpc",
                    num_inbox_entries = inbox_entries.len(),
                    %min_safety,
                    ?executing_descriptor,
                    "Received check_access_list request",
                );
                self.supervisor
                    .check_access_list(inbox_entries, min_safety, executing_descriptor)
                    .map_err(ErrorObject::from)
            }.await
        )
    }

    async fn sync_status(&self) -> RpcResult<SupervisorSyncStatus> {
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_SYNC_STATUS,
            async {
                trace!(target: "supervisor::rpc", "Received sync_status request");

                let chain_ids = self.supervisor.chain_ids().collect::<Vec<_>>();
                if chain_ids.is_empty() {
                    Err(SupervisorError::EmptyDependencySet)?;
                }

                let mut chains = HashMap::<ChainId, SupervisorChainSyncStatus>::default();
                let mut min_synced_l1 = BlockRef { number: u64::MAX, ..Default::default() };
                let mut cross_safe_timestamp = u64::MAX;
                let mut finalized_timestamp = u64::MAX;

                // Faulted chains still report the heads they stopped at.
                for id in chain_ids {
                    let head = match self.supervisor.super_head(id) {
                        Ok(head) => head,
                        Err(err) if is_uninitialised(&err) => continue,
                        Err(err) => return Err(ErrorObject::from(err)),
                    };

                    let SuperHead { l1_source, cross_safe, finalized, .. } = &head;
                    let l1_source = l1_source.unwrap_or_default();
                    let cross_safe = cross_safe.unwrap_or_default();
                    let finalized = finalized.unwrap_or_default();

                    if l1_source.number < min_synced_l1.number {
                        min_synced_l1 = l1_source;
                    }
                    cross_safe_timestamp = cross_safe_timestamp.min(cross_safe.timestamp);
                    finalized_timestamp = finalized_timestamp.min(finalized.timestamp);

                    chains.insert(id, head.into());
                }

                if chains.is_empty() {
                    warn!(target: "supervisor::rpc", "No chain db initialized");
                    return Err(ErrorObject::from(SpecError::from(
                        SuperchainDAError::UninitializedChainDatabase,
                    )));
                }

                Ok(SupervisorSyncStatus {
                    min_synced_l1,
                    cross_safe_timestamp,
                    finalized_timestamp,
                    chains,
                })
            }
            .await
        )
    }

    async fn all_safe_derived_at(
        &self,
        derived_from: BlockNumHash,
    ) -> RpcResult<HashMap<ChainId, BlockNumHash>> {
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_ALL_SAFE_DERIVED_AT,
            async {
                trace!(target: "supervisor::rpc",
                    ?derived_from,
                    "Received all_safe_derived_at request"
                );

                let mut chains = HashMap::default();
                for id in self.supervisor.chain_ids() {
                    chains.insert(id, self.supervisor.latest_block_from(derived_from, id)?.id());
                }

                Ok(chains)
            }
            .await
        )
    }

    async fn dependency_set_v1(&self) -> RpcResult<DependencySet> {
        crate::observe_rpc_call!(
            Metrics::SUPERVISOR_RPC_METHOD_DEPENDENCY_SET,
            async {
                trace!(target: "supervisor::rpc", "Received dependency_set request");
                Ok(self.supervisor.dependency_set().to_owned())
            }
            .await
        )
    }
}

impl<T> Clone for SupervisorRpc<T> {
    fn clone(&self) -> Self {
        Self { supervisor: self.supervisor.clone() }
    }
}
