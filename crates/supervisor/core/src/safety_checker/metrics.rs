use alloy_primitives::ChainId;
use interop_supervisor_types::SafetyLevel;

/// Metrics of the cross-safety checkers.
#[derive(Debug, Clone)]
pub(crate) struct Metrics;

impl Metrics {
    pub(crate) const PROMOTIONS_TOTAL: &'static str = "supervisor_cross_safety_promotions_total";
    pub(crate) const DEFERRALS_TOTAL: &'static str = "supervisor_cross_safety_deferrals_total";
    pub(crate) const INVALIDATIONS_TOTAL: &'static str =
        "supervisor_cross_safety_invalidations_total";

    pub(crate) fn init(chain_id: ChainId, level: SafetyLevel) {
        metrics::describe_counter!(
            Self::PROMOTIONS_TOTAL,
            metrics::Unit::Count,
            "Blocks that passed cross-safety validation",
        );
        metrics::describe_counter!(
            Self::DEFERRALS_TOTAL,
            metrics::Unit::Count,
            "Cross-safety checks deferred because a dependency was not safe yet",
        );
        metrics::describe_counter!(
            Self::INVALIDATIONS_TOTAL,
            metrics::Unit::Count,
            "Blocks that failed cross-safety validation",
        );

        for name in [Self::PROMOTIONS_TOTAL, Self::DEFERRALS_TOTAL, Self::INVALIDATIONS_TOTAL] {
            metrics::counter!(
                name,
                "chain_id" => chain_id.to_string(),
                "level" => level.as_str(),
            )
            .increment(0);
        }
    }

    pub(crate) fn record(name: &'static str, chain_id: ChainId, level: SafetyLevel) {
        metrics::counter!(
            name,
            "chain_id" => chain_id.to_string(),
            "level" => level.as_str(),
        )
        .increment(1);
    }
}
