use crate::safety_checker::traits::SafetyPromoter;
use interop_supervisor_types::SafetyLevel;

/// CrossUnsafePromoter implements [`SafetyPromoter`] for [`SafetyLevel::CrossUnsafe`]
#[derive(Debug, Clone, Copy)]
pub struct CrossUnsafePromoter;

impl SafetyPromoter for CrossUnsafePromoter {
    fn target_level(&self) -> SafetyLevel {
        SafetyLevel::CrossUnsafe
    }

    fn lower_bound_level(&self) -> SafetyLevel {
        SafetyLevel::LocalUnsafe
    }

    // Unsafe blocks may still be replaced by the sequencer.
    fn invalidates(&self) -> bool {
        false
    }
}

/// CrossSafePromoter implements [`SafetyPromoter`] for [`SafetyLevel::CrossSafe`]
#[derive(Debug, Clone, Copy)]
pub struct CrossSafePromoter;

impl SafetyPromoter for CrossSafePromoter {
    fn target_level(&self) -> SafetyLevel {
        SafetyLevel::CrossSafe
    }

    fn lower_bound_level(&self) -> SafetyLevel {
        SafetyLevel::LocalSafe
    }

    fn invalidates(&self) -> bool {
        true
    }
}
