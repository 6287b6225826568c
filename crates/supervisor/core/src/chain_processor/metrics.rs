use alloy_primitives::ChainId;
use interop_supervisor_types::BlockRef;
use std::time::{Instant, SystemTime};
use tracing::error;

#[derive(Debug)]
pub(crate) struct Metrics;

impl Metrics {
    // --- Metric Names ---
    /// Identifier for block processing success.
    /// Labels: `chain_id`, `type`
    pub(crate) const BLOCK_PROCESSING_SUCCESS_TOTAL: &'static str =
        "supervisor_block_processing_success_total";

    /// Identifier for block processing errors.
    /// Labels: `chain_id`, `type`
    pub(crate) const BLOCK_PROCESSING_ERROR_TOTAL: &'static str =
        "supervisor_block_processing_error_total";

    /// Identifier for block processing latency.
    /// Labels: `chain_id`, `type`
    pub(crate) const BLOCK_PROCESSING_LATENCY_SECONDS: &'static str =
        "supervisor_block_processing_latency_seconds";

    pub(crate) const BLOCK_TYPE_LOCAL_UNSAFE: &'static str = "local_unsafe";
    pub(crate) const BLOCK_TYPE_CROSS_UNSAFE: &'static str = "cross_unsafe";
    pub(crate) const BLOCK_TYPE_LOCAL_SAFE: &'static str = "local_safe";
    pub(crate) const BLOCK_TYPE_CROSS_SAFE: &'static str = "cross_safe";
    pub(crate) const BLOCK_TYPE_FINALIZED: &'static str = "finalized";

    const BLOCK_TYPES: [&'static str; 5] = [
        Self::BLOCK_TYPE_LOCAL_UNSAFE,
        Self::BLOCK_TYPE_CROSS_UNSAFE,
        Self::BLOCK_TYPE_LOCAL_SAFE,
        Self::BLOCK_TYPE_CROSS_SAFE,
        Self::BLOCK_TYPE_FINALIZED,
    ];

    // --- Block Invalidation Metric Names ---
    /// Identifier for block invalidation success.
    /// Labels: `chain_id`
    pub(crate) const BLOCK_INVALIDATION_SUCCESS_TOTAL: &'static str =
        "supervisor_block_invalidation_success_total";

    /// Identifier for block invalidation errors.
    /// Labels: `chain_id`
    pub(crate) const BLOCK_INVALIDATION_ERROR_TOTAL: &'static str =
        "supervisor_block_invalidation_error_total";

    /// Identifier for block invalidation latency.
    /// Labels: `chain_id`
    pub(crate) const BLOCK_INVALIDATION_LATENCY_SECONDS: &'static str =
        "supervisor_block_invalidation_latency_seconds";

    // --- Event Metric Names ---
    /// Identifier for handled chain events.
    /// Labels: `chain_id`, `event`
    pub(crate) const CHAIN_EVENTS_SUCCESS_TOTAL: &'static str =
        "supervisor_chain_events_success_total";

    /// Identifier for chain events that failed.
    /// Labels: `chain_id`, `event`
    pub(crate) const CHAIN_EVENTS_ERROR_TOTAL: &'static str = "supervisor_chain_events_error_total";

    /// Identifier for chain event handling duration.
    /// Labels: `chain_id`, `event`
    pub(crate) const CHAIN_EVENT_DURATION_SECONDS: &'static str =
        "supervisor_chain_event_duration_seconds";

    /// Identifier for the fault state of a chain, 1 when faulted.
    /// Labels: `chain_id`
    pub(crate) const CHAIN_FAULTED: &'static str = "supervisor_chain_faulted";

    /// Identifier for the suspension state of a chain, 1 while an L1 reorg is reconciled.
    /// Labels: `chain_id`
    pub(crate) const CHAIN_SUSPENDED: &'static str = "supervisor_chain_suspended";

    // --- Safety Head Ref Metric Names ---
    /// Identifier for safety head ref.
    /// Labels: `chain_id`, `type`
    pub(crate) const SAFETY_HEAD_REF_LABELS: &'static str = "supervisor_safety_head_ref_labels";

    pub(crate) fn init(chain_id: ChainId) {
        Self::describe();
        Self::zero(chain_id);
    }

    fn describe() {
        metrics::describe_counter!(
            Self::BLOCK_PROCESSING_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successfully processed blocks in the supervisor",
        );

        metrics::describe_counter!(
            Self::BLOCK_PROCESSING_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of errors encountered while processing blocks in the supervisor",
        );

        metrics::describe_histogram!(
            Self::BLOCK_PROCESSING_LATENCY_SECONDS,
            metrics::Unit::Seconds,
            "Latency for processing in the supervisor",
        );

        metrics::describe_counter!(
            Self::BLOCK_INVALIDATION_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of successfully invalidated blocks in the supervisor",
        );

        metrics::describe_counter!(
            Self::BLOCK_INVALIDATION_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of errors encountered while invalidating blocks in the supervisor",
        );

        metrics::describe_histogram!(
            Self::BLOCK_INVALIDATION_LATENCY_SECONDS,
            metrics::Unit::Seconds,
            "Latency for invalidating blocks in the supervisor",
        );

        metrics::describe_counter!(
            Self::CHAIN_EVENTS_SUCCESS_TOTAL,
            metrics::Unit::Count,
            "Total number of chain events handled by the chain processor",
        );

        metrics::describe_counter!(
            Self::CHAIN_EVENTS_ERROR_TOTAL,
            metrics::Unit::Count,
            "Total number of chain events the chain processor failed to handle",
        );

        metrics::describe_histogram!(
            Self::CHAIN_EVENT_DURATION_SECONDS,
            metrics::Unit::Seconds,
            "Time spent handling a chain event",
        );

        metrics::describe_gauge!(Self::CHAIN_FAULTED, "Whether the chain processor is faulted");
        metrics::describe_gauge!(
            Self::CHAIN_SUSPENDED,
            "Whether the chain processor is suspended for an L1 reorg"
        );
        metrics::describe_gauge!(Self::SAFETY_HEAD_REF_LABELS, "Supervisor safety head ref",);
    }

    fn zero(chain_id: ChainId) {
        for block_type in Self::BLOCK_TYPES {
            metrics::counter!(
                Self::BLOCK_PROCESSING_SUCCESS_TOTAL,
                "type" => block_type,
                "chain_id" => chain_id.to_string()
            )
            .increment(0);

            metrics::counter!(
                Self::BLOCK_PROCESSING_ERROR_TOTAL,
                "type" => block_type,
                "chain_id" => chain_id.to_string()
            )
            .increment(0);

            metrics::gauge!(
                Self::SAFETY_HEAD_REF_LABELS,
                "type" => block_type,
                "chain_id" => chain_id.to_string(),
            )
            .set(0.0);
        }

        metrics::counter!(Self::BLOCK_INVALIDATION_SUCCESS_TOTAL, "chain_id" => chain_id.to_string())
            .increment(0);
        metrics::counter!(Self::BLOCK_INVALIDATION_ERROR_TOTAL, "chain_id" => chain_id.to_string())
            .increment(0);

        metrics::gauge!(Self::CHAIN_FAULTED, "chain_id" => chain_id.to_string()).set(0.0);
        metrics::gauge!(Self::CHAIN_SUSPENDED, "chain_id" => chain_id.to_string()).set(0.0);
    }

    /// Records metrics for a block processing operation.
    ///
    /// On success the head gauge of `block_type` moves to `block`, and the latency between the
    /// block timestamp and now is recorded.
    pub(crate) fn record_block_processing<E>(
        chain_id: ChainId,
        block_type: &'static str,
        block: &BlockRef,
        result: &Result<(), E>,
    ) {
        if result.is_err() {
            metrics::counter!(
                Self::BLOCK_PROCESSING_ERROR_TOTAL,
                "type" => block_type,
                "chain_id" => chain_id.to_string()
            )
            .increment(1);
            return;
        }

        metrics::counter!(
            Self::BLOCK_PROCESSING_SUCCESS_TOTAL,
            "type" => block_type,
            "chain_id" => chain_id.to_string()
        )
        .increment(1);

        metrics::gauge!(
            Self::SAFETY_HEAD_REF_LABELS,
            "type" => block_type,
            "chain_id" => chain_id.to_string(),
        )
        .set(block.number as f64);

        match SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
            Ok(duration) => {
                let latency = duration.as_secs_f64() - block.timestamp as f64;
                metrics::histogram!(
                    Self::BLOCK_PROCESSING_LATENCY_SECONDS,
                    "type" => block_type,
                    "chain_id" => chain_id.to_string()
                )
                .record(latency);
            }
            Err(err) => {
                error!(
                    target: "supervisor::chain_processor",
                    chain_id,
                    %err,
                    "SystemTime error when recording block processing latency"
                );
            }
        }
    }

    /// Records the outcome of a block invalidation.
    pub(crate) fn record_block_invalidation<E>(
        chain_id: ChainId,
        start: Instant,
        result: &Result<(), E>,
    ) {
        let name = if result.is_ok() {
            Self::BLOCK_INVALIDATION_SUCCESS_TOTAL
        } else {
            Self::BLOCK_INVALIDATION_ERROR_TOTAL
        };
        metrics::counter!(name, "chain_id" => chain_id.to_string()).increment(1);
        metrics::histogram!(Self::BLOCK_INVALIDATION_LATENCY_SECONDS, "chain_id" => chain_id.to_string())
            .record(start.elapsed().as_secs_f64());
    }

    /// Records the outcome of handling one chain event.
    pub(crate) fn record_event<E>(
        chain_id: ChainId,
        event: &'static str,
        start: Instant,
        result: &Result<(), E>,
    ) {
        let name = if result.is_ok() {
            Self::CHAIN_EVENTS_SUCCESS_TOTAL
        } else {
            Self::CHAIN_EVENTS_ERROR_TOTAL
        };
        metrics::counter!(name, "chain_id" => chain_id.to_string(), "event" => event).increment(1);
        metrics::histogram!(
            Self::CHAIN_EVENT_DURATION_SECONDS,
            "chain_id" => chain_id.to_string(),
            "event" => event
        )
        .record(start.elapsed().as_secs_f64());
    }

    /// Publishes the fault and suspension state of a chain.
    pub(crate) fn record_health(chain_id: ChainId, faulted: bool, suspended: bool) {
        metrics::gauge!(Self::CHAIN_FAULTED, "chain_id" => chain_id.to_string())
            .set(if faulted { 1.0 } else { 0.0 });
        metrics::gauge!(Self::CHAIN_SUSPENDED, "chain_id" => chain_id.to_string())
            .set(if suspended { 1.0 } else { 0.0 });
    }
}
