//! Pairs linking an L2 block to the L1 block it was derived from.

use crate::BlockRef;
use alloy_eips::BlockNumHash;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// An L2 block together with the L1 source block it was derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Constructor, Serialize, Deserialize)]
#[display("source: {source}, derived: {derived}")]
#[serde(rename_all = "camelCase")]
pub struct DerivedRefPair {
    /// The L1 block.
    pub source: BlockRef,
    /// The L2 block derived from [`source`](Self::source).
    pub derived: BlockRef,
}

/// Identifier-only form of [`DerivedRefPair`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedIdPair {
    /// The L1 block.
    pub source: BlockNumHash,
    /// The L2 block.
    pub derived: BlockNumHash,
}

impl From<DerivedRefPair> for DerivedIdPair {
    fn from(pair: DerivedRefPair) -> Self {
        Self { source: pair.source.id(), derived: pair.derived.id() }
    }
}
