use super::{AuthenticationError, ClientError, metrics::Metrics};
use crate::config::deserialize_duration;
use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId};
use alloy_rpc_types_engine::{Claims, JwtSecret};
use async_trait::async_trait;
use interop_supervisor_metrics::observe_metrics_for_result_async;
use interop_supervisor_rpc::{
    ManagedModeApiClient, NodeAdminApiClient, NodeP2pApiClient, NodeRollupApiClient,
    jsonrpsee::SubscriptionTopic,
};
use interop_supervisor_types::{
    BlockRef, BlockSeal, L2BlockRef, ManagedEvent, NodeSelf, NodeSyncStatus, OutputV0, PeerDump,
    Receipts, SubscriptionEvent,
};
use jsonrpsee::{
    core::client::Subscription,
    ws_client::{HeaderMap, HeaderValue, WsClient, WsClientBuilder},
};
use serde::{Deserialize, Deserializer, de::Error};
use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, OnceLock},
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// RPC surface of a managed node used by the supervisor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManagedNodeClient: Send + Sync + Debug {
    /// Returns the [`ChainId`] of the managed node.
    async fn chain_id(&self) -> Result<ChainId, ClientError>;

    /// How this node delivers its events.
    fn event_delivery(&self) -> EventDelivery;

    /// Subscribes to [`SubscriptionEvent`] from the managed node.
    async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError>;

    /// Takes the next queued event from the node.
    ///
    /// Returns [`ClientError::NoEvent`] if the queue is empty.
    async fn pull_event(&self) -> Result<ManagedEvent, ClientError>;

    /// Fetches [`Receipts`] for a given block hash.
    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError>;

    /// Fetches the [`OutputV0`] at a specific timestamp.
    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError>;

    /// Fetches the L2 block at the given timestamp.
    async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockRef, ClientError>;

    /// Fetches the L2 block with the given number.
    async fn l2_block_ref_by_number(&self, number: u64) -> Result<L2BlockRef, ClientError>;

    /// Resets the node heads to the given blocks.
    async fn reset(
        &self,
        local_unsafe: BlockNumHash,
        cross_unsafe: BlockNumHash,
        local_safe: BlockNumHash,
        cross_safe: BlockNumHash,
        finalized: BlockNumHash,
    ) -> Result<(), ClientError>;

    /// Invalidates a block in the managed node.
    async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError>;

    /// Hands the next L1 block to the node.
    async fn provide_l1(&self, block: BlockRef) -> Result<(), ClientError>;

    /// Updates the finalized block in the managed node.
    async fn update_finalized(&self, finalized: BlockNumHash) -> Result<(), ClientError>;

    /// Updates the cross-unsafe block in the managed node.
    async fn update_cross_unsafe(&self, cross_unsafe: BlockNumHash) -> Result<(), ClientError>;

    /// Updates the cross-safe block in the managed node.
    async fn update_cross_safe(
        &self,
        derived: BlockNumHash,
        source: BlockNumHash,
    ) -> Result<(), ClientError>;

    /// Returns the node's own view of its sync state.
    async fn sync_status(&self) -> Result<NodeSyncStatus, ClientError>;

    /// Returns the connected peers of the node.
    async fn peers(&self) -> Result<PeerDump, ClientError>;

    /// Returns the p2p identity of the node.
    async fn self_info(&self) -> Result<NodeSelf, ClientError>;

    /// Connects the node to the peer at `addr`.
    async fn connect_peer(&self, addr: String) -> Result<(), ClientError>;

    /// Disconnects the node from `peer_id`.
    async fn disconnect_peer(&self, peer_id: String) -> Result<(), ClientError>;

    /// Starts sequencing on top of `unsafe_head`.
    async fn start_sequencer(&self, unsafe_head: B256) -> Result<(), ClientError>;

    /// Stops sequencing and returns the last sequenced block hash.
    async fn stop_sequencer(&self) -> Result<B256, ClientError>;

    /// Resets the ws-client to None when server disconnects
    async fn reset_ws_client(&self);
}

/// How a managed node hands its events to the supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventDelivery {
    /// Push delivery over an `interop_subscribe` WebSocket subscription.
    #[default]
    Subscribe,
    /// Pull delivery through `interop_pullEvent`, drained every `interval`.
    Poll {
        /// Time between drains.
        #[serde(deserialize_with = "deserialize_duration")]
        interval: Duration,
    },
}

/// [`ClientConfig`] sets the configuration for the managed node client.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// The URL + port of the managed node
    pub url: String,
    /// jwt secret for the managed node interop rpc
    #[serde(deserialize_with = "deserialize_jwt_secret")]
    pub jwt_secret: JwtSecret,
    /// Event delivery mode.
    #[serde(default)]
    pub event_delivery: EventDelivery,
}

fn deserialize_jwt_secret<'de, D>(deserializer: D) -> Result<JwtSecret, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    JwtSecret::from_hex(raw.trim()).map_err(D::Error::custom)
}

/// Client for interacting with a managed node.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    /// Chain ID of the managed node
    chain_id: OnceLock<ChainId>,
    /// The attached web socket client
    ws_client: Mutex<Option<Arc<WsClient>>>,
}

impl Client {
    /// Creates a new [`Client`] with the given configuration.
    pub fn new(config: ClientConfig) -> Self {
        Metrics::init(config.url.as_ref());
        Self { config, chain_id: OnceLock::new(), ws_client: Mutex::new(None) }
    }

    /// Creates authentication headers using JWT secret.
    fn create_auth_headers(&self) -> Result<HeaderMap, ClientError> {
        let claims = Claims::with_current_timestamp();
        let token = self.config.jwt_secret.encode(&claims).map_err(|err| {
            error!(target: "supervisor::managed_node", %err, "Failed to encode JWT claims");
            AuthenticationError::InvalidJwt
        })?;

        let mut headers = HeaderMap::new();
        let auth_header = format!("Bearer {token}");

        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth_header).map_err(|err| {
                error!(target: "supervisor::managed_node", %err, "Invalid authorization header");
                AuthenticationError::InvalidHeader
            })?,
        );

        Ok(headers)
    }

    /// Returns a reference to the WebSocket client, creating it if it doesn't exist.
    pub async fn get_ws_client(&self) -> Result<Arc<WsClient>, ClientError> {
        let mut ws_client_guard = self.ws_client.lock().await;
        if let Some(client) = ws_client_guard.as_ref() {
            return Ok(client.clone());
        }

        let headers = self.create_auth_headers().inspect_err(|err| {
            error!(target: "supervisor::managed_node", %err, "Failed to create auth headers");
        })?;

        info!(target: "supervisor::managed_node", ws_url = self.config.url, "Creating a new web socket client");
        let client =
            Arc::new(WsClientBuilder::default().set_headers(headers).build(&self.config.url).await?);

        *ws_client_guard = Some(client.clone());
        Ok(client)
    }

    /// Runs one RPC call against the node, recording its outcome.
    async fn call<T, F, Fut>(&self, method: &'static str, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(Arc<WsClient>) -> Fut + Send,
        Fut: Future<Output = Result<T, jsonrpsee::core::ClientError>> + Send,
    {
        let client = self.get_ws_client().await?;
        let result = observe_metrics_for_result_async!(
            Metrics::MANAGED_NODE_RPC_REQUESTS_SUCCESS_TOTAL,
            Metrics::MANAGED_NODE_RPC_REQUESTS_ERROR_TOTAL,
            Metrics::MANAGED_NODE_RPC_REQUEST_DURATION_SECONDS,
            method,
            f(client),
            "node" => self.config.url.clone()
        )?;
        Ok(result)
    }
}

#[async_trait]
impl ManagedNodeClient for Client {
    async fn reset_ws_client(&self) {
        let mut ws_client_guard = self.ws_client.lock().await;
        if ws_client_guard.is_some() {
            *ws_client_guard = None;
        };
    }

    async fn chain_id(&self) -> Result<ChainId, ClientError> {
        if let Some(chain_id) = self.chain_id.get() {
            return Ok(*chain_id);
        }

        let chain_id_str = self
            .call(Metrics::RPC_METHOD_CHAIN_ID, |client| async move {
                ManagedModeApiClient::chain_id(client.as_ref()).await
            })
            .await
            .inspect_err(|err| {
                error!(target: "supervisor::managed_node", %err, "Failed to get chain ID");
            })?;

        let chain_id = chain_id_str.parse::<u64>().inspect_err(|err| {
            error!(target: "supervisor::managed_node", %err, "Failed to parse chain ID");
        })?;

        let _ = self.chain_id.set(chain_id);
        Ok(chain_id)
    }

    fn event_delivery(&self) -> EventDelivery {
        self.config.event_delivery
    }

    async fn subscribe_events(&self) -> Result<Subscription<SubscriptionEvent>, ClientError> {
        self.call(Metrics::RPC_METHOD_SUBSCRIBE_EVENTS, |client| async move {
            ManagedModeApiClient::subscribe_events(client.as_ref(), SubscriptionTopic::Events).await
        })
        .await
    }

    async fn pull_event(&self) -> Result<ManagedEvent, ClientError> {
        let result = self
            .call(Metrics::RPC_METHOD_PULL_EVENT, |client| async move {
                ManagedModeApiClient::pull_event(client.as_ref()).await
            })
            .await;

        match result {
            // The node answers with a call error once its queue is drained.
            Err(ClientError::Client(jsonrpsee::core::ClientError::Call(err))) => {
                debug!(target: "supervisor::managed_node", %err, "No event pulled from managed node");
                Err(ClientError::NoEvent)
            }
            other => other,
        }
    }

    async fn fetch_receipts(&self, block_hash: B256) -> Result<Receipts, ClientError> {
        self.call(Metrics::RPC_METHOD_FETCH_RECEIPTS, |client| async move {
            ManagedModeApiClient::fetch_receipts(client.as_ref(), block_hash).await
        })
        .await
    }

    async fn output_v0_at_timestamp(&self, timestamp: u64) -> Result<OutputV0, ClientError> {
        self.call(Metrics::RPC_METHOD_OUTPUT_V0_AT_TIMESTAMP, |client| async move {
            ManagedModeApiClient::output_v0_at_timestamp(client.as_ref(), timestamp).await
        })
        .await
    }

    async fn l2_block_ref_by_timestamp(&self, timestamp: u64) -> Result<L2BlockRef, ClientError> {
        self.call(Metrics::RPC_METHOD_L2_BLOCK_REF_BY_TIMESTAMP, |client| async move {
            ManagedModeApiClient::l2_block_ref_by_timestamp(client.as_ref(), timestamp).await
        })
        .await
    }

    async fn l2_block_ref_by_number(&self, number: u64) -> Result<L2BlockRef, ClientError> {
        self.call(Metrics::RPC_METHOD_L2_BLOCK_REF_BY_NUMBER, |client| async move {
            ManagedModeApiClient::l2_block_ref_by_number(client.as_ref(), number).await
        })
        .await
    }

    async fn reset(
        &self,
        local_unsafe: BlockNumHash,
        cross_unsafe: BlockNumHash,
        local_safe: BlockNumHash,
        cross_safe: BlockNumHash,
        finalized: BlockNumHash,
    ) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_RESET, |client| async move {
            ManagedModeApiClient::reset(
                client.as_ref(),
                local_unsafe,
                cross_unsafe,
                local_safe,
                cross_safe,
                finalized,
            )
            .await
        })
        .await
    }

    async fn invalidate_block(&self, seal: BlockSeal) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_INVALIDATE_BLOCK, |client| async move {
            ManagedModeApiClient::invalidate_block(client.as_ref(), seal).await
        })
        .await
    }

    async fn provide_l1(&self, block: BlockRef) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_PROVIDE_L1, |client| async move {
            ManagedModeApiClient::provide_l1(client.as_ref(), block).await
        })
        .await
    }

    async fn update_finalized(&self, finalized: BlockNumHash) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_UPDATE_FINALIZED, |client| async move {
            ManagedModeApiClient::update_finalized(client.as_ref(), finalized).await
        })
        .await
    }

    async fn update_cross_unsafe(&self, cross_unsafe: BlockNumHash) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_UPDATE_CROSS_UNSAFE, |client| async move {
            ManagedModeApiClient::update_cross_unsafe(client.as_ref(), cross_unsafe).await
        })
        .await
    }

    async fn update_cross_safe(
        &self,
        derived: BlockNumHash,
        source: BlockNumHash,
    ) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_UPDATE_CROSS_SAFE, |client| async move {
            ManagedModeApiClient::update_cross_safe(client.as_ref(), derived, source).await
        })
        .await
    }

    async fn sync_status(&self) -> Result<NodeSyncStatus, ClientError> {
        self.call(Metrics::RPC_METHOD_SYNC_STATUS, |client| async move {
            NodeRollupApiClient::sync_status(client.as_ref()).await
        })
        .await
    }

    async fn peers(&self) -> Result<PeerDump, ClientError> {
        self.call(Metrics::RPC_METHOD_PEERS, |client| async move {
            NodeP2pApiClient::peers(client.as_ref(), true).await
        })
        .await
    }

    async fn self_info(&self) -> Result<NodeSelf, ClientError> {
        self.call(Metrics::RPC_METHOD_SELF, |client| async move {
            NodeP2pApiClient::self_info(client.as_ref()).await
        })
        .await
    }

    async fn connect_peer(&self, addr: String) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_CONNECT_PEER, |client| async move {
            NodeP2pApiClient::connect_peer(client.as_ref(), addr).await
        })
        .await
    }

    async fn disconnect_peer(&self, peer_id: String) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_DISCONNECT_PEER, |client| async move {
            NodeP2pApiClient::disconnect_peer(client.as_ref(), peer_id).await
        })
        .await
    }

    async fn start_sequencer(&self, unsafe_head: B256) -> Result<(), ClientError> {
        self.call(Metrics::RPC_METHOD_START_SEQUENCER, |client| async move {
            NodeAdminApiClient::start_sequencer(client.as_ref(), unsafe_head).await
        })
        .await
    }

    async fn stop_sequencer(&self) -> Result<B256, ClientError> {
        self.call(Metrics::RPC_METHOD_STOP_SEQUENCER, |client| async move {
            NodeAdminApiClient::stop_sequencer(client.as_ref()).await
        })
        .await
    }
}
