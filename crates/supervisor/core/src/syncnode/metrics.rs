//! Metrics for the managed node RPC client.

/// Container for metrics.
#[derive(Debug, Clone)]
pub(super) struct Metrics;

impl Metrics {
    // --- Metric Names ---
    /// Identifier for the counter of successful RPC requests. Labels: `method`, `node`.
    pub(crate) const MANAGED_NODE_RPC_REQUESTS_SUCCESS_TOTAL: &'static str =
        "managed_node_rpc_requests_success_total";
    /// Identifier for the counter of failed RPC requests. Labels: `method`, `node`.
    pub(crate) const MANAGED_NODE_RPC_REQUESTS_ERROR_TOTAL: &'static str =
        "managed_node_rpc_requests_error_total";
    /// Identifier for the histogram of RPC request durations. Labels: `method`, `node`.
    pub(crate) const MANAGED_NODE_RPC_REQUEST_DURATION_SECONDS: &'static str =
        "managed_node_rpc_request_duration_seconds";

    pub(crate) const RPC_METHOD_CHAIN_ID: &'static str = "chain_id";
    pub(crate) const RPC_METHOD_SUBSCRIBE_EVENTS: &'static str = "subscribe_events";
    pub(crate) const RPC_METHOD_PULL_EVENT: &'static str = "pull_event";
    pub(crate) const RPC_METHOD_FETCH_RECEIPTS: &'static str = "fetch_receipts";
    pub(crate) const RPC_METHOD_OUTPUT_V0_AT_TIMESTAMP: &'static str = "output_v0_at_timestamp";
    pub(crate) const RPC_METHOD_L2_BLOCK_REF_BY_TIMESTAMP: &'static str =
        "l2_block_ref_by_timestamp";
    pub(crate) const RPC_METHOD_L2_BLOCK_REF_BY_NUMBER: &'static str = "l2_block_ref_by_number";
    pub(crate) const RPC_METHOD_RESET: &'static str = "reset";
    pub(crate) const RPC_METHOD_INVALIDATE_BLOCK: &'static str = "invalidate_block";
    pub(crate) const RPC_METHOD_PROVIDE_L1: &'static str = "provide_l1";
    pub(crate) const RPC_METHOD_UPDATE_FINALIZED: &'static str = "update_finalized";
    pub(crate) const RPC_METHOD_UPDATE_CROSS_UNSAFE: &'static str = "update_cross_unsafe";
    pub(crate) const RPC_METHOD_UPDATE_CROSS_SAFE: &'static str = "update_cross_safe";
    pub(crate) const RPC_METHOD_SYNC_STATUS: &'static str = "sync_status";
    pub(crate) const RPC_METHOD_PEERS: &'static str = "peers";
    pub(crate) const RPC_METHOD_SELF: &'static str = "self";
    pub(crate) const RPC_METHOD_CONNECT_PEER: &'static str = "connect_peer";
    pub(crate) const RPC_METHOD_DISCONNECT_PEER: &'static str = "disconnect_peer";
    pub(crate) const RPC_METHOD_START_SEQUENCER: &'static str = "start_sequencer";
    pub(crate) const RPC_METHOD_STOP_SEQUENCER: &'static str = "stop_sequencer";

    const ALL_METHODS: [&'static str; 20] = [
        Self::RPC_METHOD_CHAIN_ID,
        Self::RPC_METHOD_SUBSCRIBE_EVENTS,
        Self::RPC_METHOD_PULL_EVENT,
        Self::RPC_METHOD_FETCH_RECEIPTS,
        Self::RPC_METHOD_OUTPUT_V0_AT_TIMESTAMP,
        Self::RPC_METHOD_L2_BLOCK_REF_BY_TIMESTAMP,
        Self::RPC_METHOD_L2_BLOCK_REF_BY_NUMBER,
        Self::RPC_METHOD_RESET,
        Self::RPC_METHOD_INVALIDATE_BLOCK,
        Self::RPC_METHOD_PROVIDE_L1,
        Self::RPC_METHOD_UPDATE_FINALIZED,
        Self::RPC_METHOD_UPDATE_CROSS_UNSAFE,
        Self::RPC_METHOD_UPDATE_CROSS_SAFE,
        Self::RPC_METHOD_SYNC_STATUS,
        Self::RPC_METHOD_PEERS,
        Self::RPC_METHOD_SELF,
        Self::RPC_METHOD_CONNECT_PEER,
        Self::RPC_METHOD_DISCONNECT_PEER,
        Self::RPC_METHOD_START_SEQUENCER,
        Self::RPC_METHOD_STOP_SEQUENCER,
    ];

    /// Describes the client metrics and zeroes every series of `node`.
    pub(crate) fn init(node: &str) {
        Self::describe();
        Self::zero(node);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::MANAGED_NODE_RPC_REQUESTS_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successful RPC requests sent to managed nodes"
        );
        metrics::describe_counter!(
            Self::MANAGED_NODE_RPC_REQUESTS_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of failed RPC requests sent to managed nodes"
        );
        metrics::describe_histogram!(
            Self::MANAGED_NODE_RPC_REQUEST_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of RPC requests sent to managed nodes"
        );
    }

    fn zero_rpc_method(method: &str, node: &str) {
        metrics::counter!(
            Self::MANAGED_NODE_RPC_REQUESTS_SUCCESS_TOTAL,
            "method" => method.to_string(),
            "node" => node.to_string()
        )
        .increment(0);
        metrics::counter!(
            Self::MANAGED_NODE_RPC_REQUESTS_ERROR_TOTAL,
            "method" => method.to_string(),
            "node" => node.to_string()
        )
        .increment(0);
        metrics::histogram!(
            Self::MANAGED_NODE_RPC_REQUEST_DURATION_SECONDS,
            "method" => method.to_string(),
            "node" => node.to_string()
        )
        .record(0.0);
    }

    fn zero(node: &str) {
        for method in Self::ALL_METHODS {
            Self::zero_rpc_method(method, node);
        }
    }
}
