//! Metrics for the Supervisor RPC service.

/// Container for metrics.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    // --- Metric Names ---
    /// Identifier for the counter of successful RPC requests. Labels: `method`.
    pub(crate) const SUPERVISOR_RPC_REQUESTS_SUCCESS_TOTAL: &'static str =
        "supervisor_rpc_requests_success_total";
    /// Identifier for the counter of failed RPC requests. Labels: `method`.
    pub(crate) const SUPERVISOR_RPC_REQUESTS_ERROR_TOTAL: &'static str =
        "supervisor_rpc_requests_error_total";
    /// Identifier for the histogram of RPC request durations. Labels: `method`.
    pub(crate) const SUPERVISOR_RPC_REQUEST_DURATION_SECONDS: &'static str =
        "supervisor_rpc_request_duration_seconds";

    pub(crate) const SUPERVISOR_RPC_METHOD_CROSS_DERIVED_TO_SOURCE: &'static str =
        "cross_derived_to_source";
    pub(crate) const SUPERVISOR_RPC_METHOD_DEPENDENCY_SET: &'static str = "dependency_set";
    pub(crate) const SUPERVISOR_RPC_METHOD_LOCAL_UNSAFE: &'static str = "local_unsafe";
    pub(crate) const SUPERVISOR_RPC_METHOD_CROSS_UNSAFE: &'static str = "cross_unsafe";
    pub(crate) const SUPERVISOR_RPC_METHOD_LOCAL_SAFE: &'static str = "local_safe";
    pub(crate) const SUPERVISOR_RPC_METHOD_CROSS_SAFE: &'static str = "cross_safe";
    pub(crate) const SUPERVISOR_RPC_METHOD_FINALIZED: &'static str = "finalized";
    pub(crate) const SUPERVISOR_RPC_METHOD_FINALIZED_L1: &'static str = "finalized_l1";
    pub(crate) const SUPERVISOR_RPC_METHOD_SUPER_ROOT_AT_TIMESTAMP: &'static str =
        "super_root_at_timestamp";
    pub(crate) const SUPERVISOR_RPC_METHOD_SYNC_STATUS: &'static str = "sync_status";
    pub(crate) const SUPERVISOR_RPC_METHOD_ALL_SAFE_DERIVED_AT: &'static str =
        "all_safe_derived_at";
    pub(crate) const SUPERVISOR_RPC_METHOD_CHECK_ACCESS_LIST: &'static str = "check_access_list";

    pub(crate) const ADMIN_RPC_METHOD_RESET_CHAIN: &'static str = "admin_reset_chain";
    pub(crate) const ADMIN_RPC_METHOD_HEALTH: &'static str = "admin_health";
    pub(crate) const ADMIN_RPC_METHOD_NODE_SYNC_STATUS: &'static str = "admin_node_sync_status";
    pub(crate) const ADMIN_RPC_METHOD_NODE_PEERS: &'static str = "admin_node_peers";
    pub(crate) const ADMIN_RPC_METHOD_CONNECT_NODES: &'static str = "admin_connect_nodes";
    pub(crate) const ADMIN_RPC_METHOD_DISCONNECT_NODES: &'static str = "admin_disconnect_nodes";
    pub(crate) const ADMIN_RPC_METHOD_START_SEQUENCER: &'static str = "admin_start_sequencer";
    pub(crate) const ADMIN_RPC_METHOD_STOP_SEQUENCER: &'static str = "admin_stop_sequencer";

    const METHODS: [&'static str; 20] = [
        Self::SUPERVISOR_RPC_METHOD_CROSS_DERIVED_TO_SOURCE,
        Self::SUPERVISOR_RPC_METHOD_DEPENDENCY_SET,
        Self::SUPERVISOR_RPC_METHOD_LOCAL_UNSAFE,
        Self::SUPERVISOR_RPC_METHOD_CROSS_UNSAFE,
        Self::SUPERVISOR_RPC_METHOD_LOCAL_SAFE,
        Self::SUPERVISOR_RPC_METHOD_CROSS_SAFE,
        Self::SUPERVISOR_RPC_METHOD_FINALIZED,
        Self::SUPERVISOR_RPC_METHOD_FINALIZED_L1,
        Self::SUPERVISOR_RPC_METHOD_SUPER_ROOT_AT_TIMESTAMP,
        Self::SUPERVISOR_RPC_METHOD_SYNC_STATUS,
        Self::SUPERVISOR_RPC_METHOD_ALL_SAFE_DERIVED_AT,
        Self::SUPERVISOR_RPC_METHOD_CHECK_ACCESS_LIST,
        Self::ADMIN_RPC_METHOD_RESET_CHAIN,
        Self::ADMIN_RPC_METHOD_HEALTH,
        Self::ADMIN_RPC_METHOD_NODE_SYNC_STATUS,
        Self::ADMIN_RPC_METHOD_NODE_PEERS,
        Self::ADMIN_RPC_METHOD_CONNECT_NODES,
        Self::ADMIN_RPC_METHOD_DISCONNECT_NODES,
        Self::ADMIN_RPC_METHOD_START_SEQUENCER,
        Self::ADMIN_RPC_METHOD_STOP_SEQUENCER,
    ];

    /// Initializes metrics for the Supervisor RPC service.
    ///
    /// This does two things:
    /// * Describes various metrics.
    /// * Initializes metrics with their labels to 0 so they can be queried immediately.
    pub(crate) fn init() {
        Self::describe();
        Self::zero();
    }

    /// Describes metrics used in the Supervisor RPC service.
    fn describe() {
        metrics::describe_counter!(
            Self::SUPERVISOR_RPC_REQUESTS_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successful RPC requests processed by the supervisor"
        );
        metrics::describe_counter!(
            Self::SUPERVISOR_RPC_REQUESTS_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of failed RPC requests processed by the supervisor"
        );
        metrics::describe_histogram!(
            Self::SUPERVISOR_RPC_REQUEST_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of RPC requests processed by the supervisor"
        );
    }

    fn zero_rpc_method(method: &str) {
        metrics::counter!(
            Self::SUPERVISOR_RPC_REQUESTS_SUCCESS_TOTAL,
            "method" => method.to_string()
        )
        .increment(0);

        metrics::counter!(
            Self::SUPERVISOR_RPC_REQUESTS_ERROR_TOTAL,
            "method" => method.to_string()
        )
        .increment(0);

        metrics::histogram!(
            Self::SUPERVISOR_RPC_REQUEST_DURATION_SECONDS,
            "method" => method.to_string()
        )
        .record(0.0); // Record a zero value to ensure the label combination is present
    }

    /// Initializes metrics with their labels to `0` so they appear in Prometheus from the start.
    fn zero() {
        for method in Self::METHODS {
            Self::zero_rpc_method(method);
        }
    }
}

/// Observes an RPC call, recording its duration and outcome.
///
/// # Usage
/// ```ignore
/// async fn my_rpc_method(&self, arg: u32) -> RpcResult<String> {
///     observe_rpc_call!("my_rpc_method_name", {
///         if arg == 0 { Ok("success".to_string()) } else { Err(ErrorObject::owned(1, "failure", None::<()>)) }
///     })
/// }
/// ```
#[macro_export]
macro_rules! observe_rpc_call {
    ($method_name:expr, $block:expr) => {{
        let start_time = std::time::Instant::now();
        let result = $block; // Execute the provided code block
        let duration = start_time.elapsed().as_secs_f64();

        if result.is_ok() {
            metrics::counter!($crate::rpc::metrics::Metrics::SUPERVISOR_RPC_REQUESTS_SUCCESS_TOTAL, "method" => $method_name).increment(1);
        } else {
            metrics::counter!($crate::rpc::metrics::Metrics::SUPERVISOR_RPC_REQUESTS_ERROR_TOTAL, "method" => $method_name).increment(1);
        }

        metrics::histogram!($crate::rpc::metrics::Metrics::SUPERVISOR_RPC_REQUEST_DURATION_SECONDS, "method" => $method_name).record(duration);
        result
    }};
}
