use crate::event::ChainEvent;
use interop_supervisor_types::{BlockRef, SafetyLevel};

/// Defines which [`SafetyLevel`] a checker promotes to and how the promotion is reported.
///
/// The checker never writes the heads itself. The event is handled by the chain processor,
/// which is the only writer of the chain's storage.
pub trait SafetyPromoter: Send + Sync {
    /// Target safety level this promoter upgrades to.
    fn target_level(&self) -> SafetyLevel;

    /// Required lower bound level for promotion eligibility.
    fn lower_bound_level(&self) -> SafetyLevel;

    /// Whether a block failing validation is invalidated.
    fn invalidates(&self) -> bool;

    /// The event announcing that `block` passed validation.
    fn promotion_event(&self, block: BlockRef) -> ChainEvent {
        ChainEvent::SafetyPromoted { level: self.target_level(), block }
    }
}
