use super::Metrics;
use crate::{SupervisorAdminService, SupervisorError};
use alloy_primitives::{B256, ChainId};
use async_trait::async_trait;
use interop_supervisor_rpc::{ChainHealth, SupervisorAdminApiServer};
use interop_supervisor_types::{HexStringU64, NodeSyncStatus, PeerDump};
use jsonrpsee::{core::RpcResult, types::ErrorObjectOwned};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{trace, warn};

// upper bound for admin requests that reach out to managed nodes
const ADMIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Supervisor Admin RPC interface
#[derive(Debug)]
pub struct AdminRpc<T> {
    supervisor: Arc<T>,
    request_timeout: Duration,
}

impl<T> AdminRpc<T> {
    /// Creates a new [`AdminRpc`].
    pub fn new(supervisor: Arc<T>) -> Self {
        Self { supervisor, request_timeout: ADMIN_REQUEST_TIMEOUT }
    }

    /// Overrides how long a request may wait for a managed node.
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn run<R>(
        &self,
        method: &'static str,
        chain_id: ChainId,
        request: impl Future<Output = Result<R, SupervisorError>> + Send,
    ) -> RpcResult<R> {
        trace!(target: "supervisor::admin_rpc", %chain_id, method, "Received admin request");
        let result = timeout(self.request_timeout, request)
            .await
            .unwrap_or(Err(SupervisorError::Timeout(self.request_timeout)));

        result.map_err(|err| {
            warn!(target: "supervisor::admin_rpc", %chain_id, method, %err, "Admin request failed");
            ErrorObjectOwned::from(err)
        })
    }
}

#[async_trait]
impl<T> SupervisorAdminApiServer for AdminRpc<T>
where
    T: SupervisorAdminService + 'static,
{
    async fn reset_chain(&self, chain_id: HexStringU64) -> RpcResult<()> {
        let chain_id = ChainId::from(chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_RESET_CHAIN,
            self.run("reset_chain", chain_id, self.supervisor.reset_chain(chain_id)).await
        )
    }

    async fn health(&self) -> RpcResult<Vec<ChainHealth>> {
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_HEALTH,
            RpcResult::Ok(self.supervisor.health().await)
        )
    }

    async fn node_sync_status(&self, chain_id: HexStringU64) -> RpcResult<NodeSyncStatus> {
        let chain_id = ChainId::from(chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_NODE_SYNC_STATUS,
            self.run("node_sync_status", chain_id, self.supervisor.node_sync_status(chain_id))
                .await
        )
    }

    async fn node_peers(&self, chain_id: HexStringU64) -> RpcResult<PeerDump> {
        let chain_id = ChainId::from(chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_NODE_PEERS,
            self.run("node_peers", chain_id, self.supervisor.node_peers(chain_id)).await
        )
    }

    async fn connect_nodes(
        &self,
        chain_id: HexStringU64,
        peer_chain_id: HexStringU64,
    ) -> RpcResult<()> {
        let chain_id = ChainId::from(chain_id);
        let peer = ChainId::from(peer_chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_CONNECT_NODES,
            self.run("connect_nodes", chain_id, self.supervisor.connect_nodes(chain_id, peer)).await
        )
    }

    async fn disconnect_nodes(
        &self,
        chain_id: HexStringU64,
        peer_chain_id: HexStringU64,
    ) -> RpcResult<()> {
        let chain_id = ChainId::from(chain_id);
        let peer = ChainId::from(peer_chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_DISCONNECT_NODES,
            self.run("disconnect_nodes", chain_id, self.supervisor.disconnect_nodes(chain_id, peer))
                .await
        )
    }

    async fn start_sequencer(&self, chain_id: HexStringU64) -> RpcResult<()> {
        let chain_id = ChainId::from(chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_START_SEQUENCER,
            self.run("start_sequencer", chain_id, self.supervisor.start_sequencer(chain_id)).await
        )
    }

    async fn stop_sequencer(&self, chain_id: HexStringU64) -> RpcResult<B256> {
        let chain_id = ChainId::from(chain_id);
        crate::observe_rpc_call!(
            Metrics::ADMIN_RPC_METHOD_STOP_SEQUENCER,
            self.run("stop_sequencer", chain_id, self.supervisor.stop_sequencer(chain_id)).await
        )
    }
}
