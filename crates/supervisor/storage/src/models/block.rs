//! Block references as stored on disk.
//!
//! L1 and L2 blocks share [`StoredBlockRef`]; L2 blocks additionally carry the L1 origin used by
//! reorg handling.

use alloy_eips::BlockNumHash;
use alloy_primitives::B256;
use bytes::{Buf, BufMut};
use derive_more::Display;
use interop_supervisor_types::{BlockRef, L2BlockRef};
use reth_codecs::Compact;
use serde::{Deserialize, Serialize};

/// Number, hash, parent hash and timestamp of a block.
#[derive(Debug, Clone, Copy, Display, PartialEq, Eq, Default, Serialize, Deserialize, Compact)]
#[display("number: {number}, hash: {hash}")]
pub struct StoredBlockRef {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Parent hash.
    pub parent_hash: B256,
    /// Block timestamp.
    pub timestamp: u64,
}

impl From<BlockRef> for StoredBlockRef {
    fn from(block: BlockRef) -> Self {
        Self {
            number: block.number,
            hash: block.hash,
            parent_hash: block.parent_hash,
            timestamp: block.timestamp,
        }
    }
}

impl From<StoredBlockRef> for BlockRef {
    fn from(block: StoredBlockRef) -> Self {
        Self {
            number: block.number,
            hash: block.hash,
            parent_hash: block.parent_hash,
            timestamp: block.timestamp,
        }
    }
}

/// An L2 block with its L1 origin, the value of [`crate::models::L2Blocks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredL2BlockRef {
    /// The block itself.
    pub block: StoredBlockRef,
    /// L1 origin of the block.
    pub l1_origin: BlockNumHash,
    /// Position of the block inside its epoch.
    pub sequence_number: u64,
}

/// Layout: compact [`StoredBlockRef`], then `l1_origin.number: u64`, `l1_origin.hash: B256` and
/// `sequence_number: u64` at fixed width.
impl Compact for StoredL2BlockRef {
    fn to_compact<B>(&self, buf: &mut B) -> usize
    where
        B: BufMut + AsMut<[u8]>,
    {
        let written = self.block.to_compact(buf);
        buf.put_u64(self.l1_origin.number);
        buf.put_slice(self.l1_origin.hash.as_slice());
        buf.put_u64(self.sequence_number);
        written + 8 + 32 + 8
    }

    fn from_compact(buf: &[u8], _len: usize) -> (Self, &[u8]) {
        let (block, mut rest) = StoredBlockRef::from_compact(buf, buf.len());
        assert!(rest.len() >= 48, "StoredL2BlockRef::from_compact: truncated L1 origin");

        let origin_number = rest.get_u64();
        let origin_hash = B256::from_slice(&rest[..32]);
        rest.advance(32);
        let sequence_number = rest.get_u64();

        let l1_origin = BlockNumHash { number: origin_number, hash: origin_hash };
        (Self { block, l1_origin, sequence_number }, rest)
    }
}

impl From<L2BlockRef> for StoredL2BlockRef {
    fn from(block: L2BlockRef) -> Self {
        Self {
            block: block.block.into(),
            l1_origin: block.l1_origin,
            sequence_number: block.sequence_number,
        }
    }
}

impl From<StoredL2BlockRef> for L2BlockRef {
    fn from(block: StoredL2BlockRef) -> Self {
        Self::new(block.block.into(), block.l1_origin, block.sequence_number)
    }
}

impl From<StoredL2BlockRef> for BlockRef {
    fn from(block: StoredL2BlockRef) -> Self {
        block.block.into()
    }
}
