use alloy_eips::BlockNumHash;
use interop_supervisor_types::BlockRef;

/// Commands sent by a chain processor to its managed node actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedNodeCommand {
    /// Resets the node so that its heads are at or below `target`.
    ResetTo {
        /// The block the node is rewound to.
        target: BlockNumHash,
    },

    /// Asks the node to replace a block that executes an invalid message.
    InvalidateBlock {
        /// The offending block.
        block: BlockRef,
    },

    /// Hands the node the next L1 block to derive from.
    ProvideL1State {
        /// The next L1 block.
        block: BlockRef,
    },

    /// Updates the cross-unsafe block in the managed node.
    UpdateCrossUnsafe {
        /// [`BlockNumHash`] of the cross-unsafe block.
        block_id: BlockNumHash,
    },

    /// Updates the cross-safe block in the managed node.
    UpdateCrossSafe {
        /// [`BlockNumHash`] of the derived block.
        derived: BlockNumHash,
        /// [`BlockNumHash`] of the source block.
        source: BlockNumHash,
    },

    /// Updates the finalized block in the managed node.
    UpdateFinalized {
        /// [`BlockNumHash`] of the finalized block.
        block_id: BlockNumHash,
    },
}
