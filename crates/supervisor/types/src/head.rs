//! Per-chain safety heads.

use crate::{BlockRef, SafetyLevel};
use serde::{Deserialize, Serialize};

/// Heads of a chain at every [`SafetyLevel`], plus the L1 block it has been derived up to.
///
/// A level that has never been reached is `None`. For every pair of levels `L < L'`, the head at
/// `L'` never has a higher number than the head at `L`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperHead {
    /// Latest L1 block the chain has been derived from.
    pub l1_source: Option<BlockRef>,
    /// [`SafetyLevel::LocalUnsafe`] head.
    pub local_unsafe: Option<BlockRef>,
    /// [`SafetyLevel::CrossUnsafe`] head.
    pub cross_unsafe: Option<BlockRef>,
    /// [`SafetyLevel::LocalSafe`] head.
    pub local_safe: Option<BlockRef>,
    /// [`SafetyLevel::CrossSafe`] head.
    pub cross_safe: Option<BlockRef>,
    /// [`SafetyLevel::Finalized`] head.
    pub finalized: Option<BlockRef>,
}

impl SuperHead {
    /// Returns the head at the given level.
    pub const fn head(&self, level: SafetyLevel) -> Option<BlockRef> {
        match level {
            SafetyLevel::LocalUnsafe => self.local_unsafe,
            SafetyLevel::CrossUnsafe => self.cross_unsafe,
            SafetyLevel::LocalSafe => self.local_safe,
            SafetyLevel::CrossSafe => self.cross_safe,
            SafetyLevel::Finalized => self.finalized,
        }
    }

    /// Returns `true` if no higher level is ahead of a lower one.
    pub fn is_ordered(&self) -> bool {
        let numbers = SafetyLevel::ALL.map(|level| self.head(level).map(|b| b.number));
        numbers.windows(2).all(|pair| match (pair[0], pair[1]) {
            (Some(lower), Some(higher)) => higher <= lower,
            (None, Some(_)) => false,
            _ => true,
        })
    }
}
