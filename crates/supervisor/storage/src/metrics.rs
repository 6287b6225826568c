use alloy_primitives::ChainId;

/// Container for ChainDb metrics.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const STORAGE_REQUESTS_SUCCESS_TOTAL: &'static str =
        "supervisor_storage_success_total";
    pub(crate) const STORAGE_REQUESTS_ERROR_TOTAL: &'static str = "supervisor_storage_error_total";
    pub(crate) const STORAGE_REQUEST_DURATION_SECONDS: &'static str =
        "supervisor_storage_duration_seconds";

    pub(crate) const STORAGE_TABLE_SIZE: &'static str = "supervisor_storage_table_size";
    pub(crate) const STORAGE_TABLE_PAGES: &'static str = "supervisor_storage_table_pages";
    pub(crate) const STORAGE_TABLE_ENTRIES: &'static str = "supervisor_storage_table_entries";

    pub(crate) const STORAGE_METHOD_DERIVED_TO_SOURCE: &'static str = "derived_to_source";
    pub(crate) const STORAGE_METHOD_LATEST_DERIVED_BLOCK_AT_SOURCE: &'static str =
        "latest_derived_block_at_source";
    pub(crate) const STORAGE_METHOD_LATEST_DERIVATION_STATE: &'static str =
        "latest_derivation_state";
    pub(crate) const STORAGE_METHOD_GET_SOURCE_BLOCK: &'static str = "get_source_block";
    pub(crate) const STORAGE_METHOD_GET_ACTIVATION_BLOCK: &'static str = "get_activation_block";
    pub(crate) const STORAGE_METHOD_INITIALISE_DERIVATION_STORAGE: &'static str =
        "initialise_derivation_storage";
    pub(crate) const STORAGE_METHOD_SAVE_DERIVED_BLOCK: &'static str = "save_derived_block";
    pub(crate) const STORAGE_METHOD_SAVE_SOURCE_BLOCK: &'static str = "save_source_block";
    pub(crate) const STORAGE_METHOD_GET_LATEST_BLOCK: &'static str = "get_latest_block";
    pub(crate) const STORAGE_METHOD_GET_BLOCK: &'static str = "get_block";
    pub(crate) const STORAGE_METHOD_GET_LOG: &'static str = "get_log";
    pub(crate) const STORAGE_METHOD_GET_LOGS: &'static str = "get_logs";
    pub(crate) const STORAGE_METHOD_INITIALISE_LOG_STORAGE: &'static str = "initialise_log_storage";
    pub(crate) const STORAGE_METHOD_STORE_BLOCK_LOGS: &'static str = "store_block_logs";
    pub(crate) const STORAGE_METHOD_GET_SAFETY_HEAD_REF: &'static str = "get_safety_head_ref";
    pub(crate) const STORAGE_METHOD_GET_SUPER_HEAD: &'static str = "get_super_head";
    pub(crate) const STORAGE_METHOD_UPDATE_FINALIZED_USING_SOURCE: &'static str =
        "update_finalized_using_source";
    pub(crate) const STORAGE_METHOD_UPDATE_CURRENT_CROSS_UNSAFE: &'static str =
        "update_current_cross_unsafe";
    pub(crate) const STORAGE_METHOD_UPDATE_CURRENT_CROSS_SAFE: &'static str =
        "update_current_cross_safe";
    pub(crate) const STORAGE_METHOD_SAVE_L1_BLOCK: &'static str = "save_l1_block";
    pub(crate) const STORAGE_METHOD_GET_L1_BLOCK: &'static str = "get_l1_block";
    pub(crate) const STORAGE_METHOD_PRUNE_L1_BLOCKS: &'static str = "prune_l1_blocks_below";
    pub(crate) const STORAGE_METHOD_UPDATE_FINALIZED_L1: &'static str = "update_finalized_l1";
    pub(crate) const STORAGE_METHOD_GET_FINALIZED_L1: &'static str = "get_finalized_l1";
    pub(crate) const STORAGE_METHOD_REWIND: &'static str = "rewind";
    pub(crate) const STORAGE_METHOD_REWIND_TO_SOURCE: &'static str = "rewind_to_source";
    pub(crate) const STORAGE_METHOD_REWIND_L1: &'static str = "rewind_l1";
    pub(crate) const STORAGE_METHOD_CLEAR: &'static str = "clear";

    const METHODS: [&'static str; 28] = [
        Self::STORAGE_METHOD_DERIVED_TO_SOURCE,
        Self::STORAGE_METHOD_LATEST_DERIVED_BLOCK_AT_SOURCE,
        Self::STORAGE_METHOD_LATEST_DERIVATION_STATE,
        Self::STORAGE_METHOD_GET_SOURCE_BLOCK,
        Self::STORAGE_METHOD_GET_ACTIVATION_BLOCK,
        Self::STORAGE_METHOD_INITIALISE_DERIVATION_STORAGE,
        Self::STORAGE_METHOD_SAVE_DERIVED_BLOCK,
        Self::STORAGE_METHOD_SAVE_SOURCE_BLOCK,
        Self::STORAGE_METHOD_GET_LATEST_BLOCK,
        Self::STORAGE_METHOD_GET_BLOCK,
        Self::STORAGE_METHOD_GET_LOG,
        Self::STORAGE_METHOD_GET_LOGS,
        Self::STORAGE_METHOD_INITIALISE_LOG_STORAGE,
        Self::STORAGE_METHOD_STORE_BLOCK_LOGS,
        Self::STORAGE_METHOD_GET_SAFETY_HEAD_REF,
        Self::STORAGE_METHOD_GET_SUPER_HEAD,
        Self::STORAGE_METHOD_UPDATE_FINALIZED_USING_SOURCE,
        Self::STORAGE_METHOD_UPDATE_CURRENT_CROSS_UNSAFE,
        Self::STORAGE_METHOD_UPDATE_CURRENT_CROSS_SAFE,
        Self::STORAGE_METHOD_SAVE_L1_BLOCK,
        Self::STORAGE_METHOD_GET_L1_BLOCK,
        Self::STORAGE_METHOD_PRUNE_L1_BLOCKS,
        Self::STORAGE_METHOD_UPDATE_FINALIZED_L1,
        Self::STORAGE_METHOD_GET_FINALIZED_L1,
        Self::STORAGE_METHOD_REWIND,
        Self::STORAGE_METHOD_REWIND_TO_SOURCE,
        Self::STORAGE_METHOD_REWIND_L1,
        Self::STORAGE_METHOD_CLEAR,
    ];

    pub(crate) fn init(chain_id: ChainId) {
        Self::describe();
        Self::zero(chain_id);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::STORAGE_REQUESTS_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successful supervisor storage requests"
        );
        metrics::describe_counter!(
            Self::STORAGE_REQUESTS_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of failed supervisor storage requests"
        );
        metrics::describe_histogram!(
            Self::STORAGE_REQUEST_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Duration of supervisor storage requests"
        );
        metrics::describe_gauge!(
            Self::STORAGE_TABLE_SIZE,
            metrics::Unit::Bytes,
            "Size of each storage table"
        );
        metrics::describe_gauge!(
            Self::STORAGE_TABLE_PAGES,
            metrics::Unit::Count,
            "Pages of each storage table by page type"
        );
        metrics::describe_gauge!(
            Self::STORAGE_TABLE_ENTRIES,
            metrics::Unit::Count,
            "Entries in each storage table"
        );
    }

    fn zero_storage_method(chain_id: ChainId, method_name: &'static str) {
        metrics::counter!(
            Self::STORAGE_REQUESTS_SUCCESS_TOTAL,
            "method" => method_name,
            "chain_id" => chain_id.to_string()
        )
        .increment(0);

        metrics::counter!(
            Self::STORAGE_REQUESTS_ERROR_TOTAL,
            "method" => method_name,
            "chain_id" => chain_id.to_string()
        )
        .increment(0);

        metrics::histogram!(
            Self::STORAGE_REQUEST_DURATION_SECONDS,
            "method" => method_name,
            "chain_id" => chain_id.to_string()
        )
        .record(0.0);
    }

    fn zero(chain_id: ChainId) {
        for method in Self::METHODS {
            Self::zero_storage_method(chain_id, method);
        }
    }
}
