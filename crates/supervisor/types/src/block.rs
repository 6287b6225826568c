//! Block references tracked by the supervisor.

use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use derive_more::{Constructor, Display};
use serde::{Deserialize, Serialize};

/// Reference to a block on any tracked chain, L1 or L2.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, Constructor, Serialize, Deserialize,
)]
#[display("number: {number}, hash: {hash}, parent_hash: {parent_hash}, timestamp: {timestamp}")]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    /// Block hash.
    pub hash: B256,
    /// Block number.
    pub number: u64,
    /// Hash of the parent block.
    pub parent_hash: B256,
    /// Block timestamp, in seconds.
    pub timestamp: u64,
}

impl BlockRef {
    /// Returns the number and hash of the block.
    pub const fn id(&self) -> BlockNumHash {
        BlockNumHash { number: self.number, hash: self.hash }
    }

    /// Returns `true` if `self` is the direct parent of `child`.
    pub fn is_parent_of(&self, child: &Self) -> bool {
        self.number + 1 == child.number && self.hash == child.parent_hash
    }
}

/// Reference to an L2 block, including the L1 block it was derived from.
///
/// For two blocks on the same chain, a higher number never has a lower
/// [`l1_origin`](Self::l1_origin) number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[display("{block}, l1_origin: {}", l1_origin.number)]
pub struct L2BlockRef {
    /// The L2 block.
    #[serde(flatten)]
    pub block: BlockRef,
    /// The L1 block this block's epoch is anchored to.
    #[serde(rename = "l1origin")]
    pub l1_origin: BlockNumHash,
    /// Distance to the first block of the epoch.
    #[serde(rename = "sequenceNumber")]
    pub sequence_number: u64,
}

impl L2BlockRef {
    /// Creates a new [`L2BlockRef`].
    pub const fn new(block: BlockRef, l1_origin: BlockNumHash, sequence_number: u64) -> Self {
        Self { block, l1_origin, sequence_number }
    }

    /// Returns the number and hash of the block.
    pub const fn id(&self) -> BlockNumHash {
        self.block.id()
    }

    /// Block number.
    pub const fn number(&self) -> u64 {
        self.block.number
    }

    /// Block hash.
    pub const fn hash(&self) -> B256 {
        self.block.hash
    }
}

impl From<L2BlockRef> for BlockRef {
    fn from(block: L2BlockRef) -> Self {
        block.block
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_parent_of() {
        let parent = BlockRef::new(B256::repeat_byte(1), 10, B256::ZERO, 100);
        let child = BlockRef::new(B256::repeat_byte(2), 11, parent.hash, 102);
        let stranger = BlockRef::new(B256::repeat_byte(3), 11, B256::repeat_byte(9), 102);

        assert!(parent.is_parent_of(&child));
        assert!(!parent.is_parent_of(&stranger));
        assert!(!child.is_parent_of(&parent));
    }

    #[test]
    fn test_l2_block_ref_json_shape() {
        let block = L2BlockRef::new(
            BlockRef::new(B256::repeat_byte(1), 5, B256::repeat_byte(2), 1000),
            BlockNumHash { number: 3, hash: B256::repeat_byte(3) },
            1,
        );

        let value = serde_json::to_value(block).unwrap();
        assert_eq!(value["number"], json!(5));
        assert_eq!(value["timestamp"], json!(1000));
        assert_eq!(value["sequenceNumber"], json!(1));
        assert!(value.get("l1origin").is_some());
        assert!(value.get("parentHash").is_some());

        let decoded: L2BlockRef = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, block);
    }
}
