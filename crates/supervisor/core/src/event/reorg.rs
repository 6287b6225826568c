use alloy_eips::BlockNumHash;

/// Requests a chain processor makes to its reorg handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorgRequest {
    /// Find the highest L2 block still derived from canonical L1 at or below `l1_ancestor`.
    Start {
        /// Highest L1 block shared by the old and the new L1 chain.
        l1_ancestor: BlockNumHash,
    },

    /// Storage has been rewound to `target`; reset the managed node to it.
    ResetNode {
        /// The block the chain was rewound to.
        target: BlockNumHash,
    },
}
