//! # Cross-Chain Block Safety Checker
//!
//! Verifies that all executing messages in a block are based on initiating messages that have
//! reached the required safety level, and reports blocks that pass to the chain processor.
//!
//! One [`CrossSafetyCheckerJob`] runs per chain and target level
//! ([`CrossUnsafe`](interop_supervisor_types::SafetyLevel::CrossUnsafe) and
//! [`CrossSafe`](interop_supervisor_types::SafetyLevel::CrossSafe)).
mod cross;
pub use cross::CrossSafetyChecker;
mod error;
mod metrics;
mod task;
mod traits;
pub use traits::SafetyPromoter;
mod promoter;
pub use promoter::{CrossSafePromoter, CrossUnsafePromoter};

pub use task::CrossSafetyCheckerJob;

pub use error::{CrossSafetyError, ValidationError};
