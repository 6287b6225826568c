use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use interop_supervisor_types::{BlockRef, DerivedRefPair, L2BlockRef, SafetyLevel};

/// Events delivered to a [`ChainProcessor`](crate::chain_processor::ChainProcessor).
///
/// They come from the managed node, the L1 watcher, the cross-safety checker, the reorg handler
/// and the admin API. A processor handles them one at a time, in arrival order.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ChainEvent {
    /// The managed node reports a new local-unsafe head.
    NewUnsafeHead {
        /// The new head.
        block: L2BlockRef,
    },

    /// The managed node replaced an invalidated block.
    BlockReplaced {
        /// The replacement, built on the invalidated block's parent.
        block: L2BlockRef,
        /// Hash of the block it replaces.
        invalidated: B256,
    },

    /// The L1 watcher observed a new canonical L1 block.
    NewL1Block {
        /// The L1 block.
        block: BlockRef,
    },

    /// The L1 watcher detected a reorg. Everything above `ancestor` is no longer canonical.
    L1Reorg {
        /// Highest L1 block shared by the old and the new chain.
        ancestor: BlockNumHash,
    },

    /// The cross-safety checker validated the next block at `level`.
    SafetyPromoted {
        /// Level the block was validated for.
        level: SafetyLevel,
        /// The validated block.
        block: BlockRef,
    },

    /// The managed node derived a block from L1.
    DerivedBlock {
        /// The derived block and the L1 block it was derived from.
        derived_ref_pair: DerivedRefPair,
    },

    /// Derivation moved to a new L1 block.
    DerivationOriginUpdate {
        /// The new L1 origin of derivation.
        origin: BlockRef,
    },

    /// The managed node ran out of L1 blocks to derive from.
    L1Exhausted {
        /// The last pair the node derived.
        derived_ref_pair: DerivedRefPair,
    },

    /// A new finalized L1 block was observed.
    FinalizedL1 {
        /// The finalized L1 block.
        block: BlockRef,
    },

    /// A block was found to execute an invalid message at cross-safe level.
    InvalidateBlock {
        /// The offending block.
        block: BlockRef,
    },

    /// The reorg handler found where the chain has to be rewound to.
    ReorgRewind {
        /// Highest L2 block still derived from canonical L1.
        target: BlockNumHash,
        /// Common L1 ancestor the reorg was detected at.
        l1_ancestor: BlockNumHash,
    },

    /// The managed node was reset to the rewind target.
    ReorgCompleted {
        /// The block the node was reset to.
        target: BlockNumHash,
    },

    /// The reorg could not be completed.
    ReorgFailed {
        /// Why it failed.
        reason: String,
    },

    /// An operator requested a full resync of the chain.
    Recover,
}

impl ChainEvent {
    /// Short name used for logs and metric labels.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NewUnsafeHead { .. } => "new_unsafe_head",
            Self::BlockReplaced { .. } => "block_replaced",
            Self::NewL1Block { .. } => "new_l1_block",
            Self::L1Reorg { .. } => "l1_reorg",
            Self::SafetyPromoted { .. } => "safety_promoted",
            Self::DerivedBlock { .. } => "derived_block",
            Self::DerivationOriginUpdate { .. } => "derivation_origin_update",
            Self::L1Exhausted { .. } => "l1_exhausted",
            Self::FinalizedL1 { .. } => "finalized_l1",
            Self::InvalidateBlock { .. } => "invalidate_block",
            Self::ReorgRewind { .. } => "reorg_rewind",
            Self::ReorgCompleted { .. } => "reorg_completed",
            Self::ReorgFailed { .. } => "reorg_failed",
            Self::Recover => "recover",
        }
    }
}
