//! Derivation records: which L1 block each L2 block was derived from.

use super::{StoredBlockRef, U64List};
use interop_supervisor_types::DerivedRefPair;
use reth_codecs::Compact;
use serde::{Deserialize, Serialize};

/// An L2 block with the L1 block it was derived from. Value of
/// [`DerivedBlocks`](crate::models::DerivedBlocks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredDerivedPair {
    /// The derived L2 block.
    pub derived: StoredBlockRef,
    /// The L1 source block.
    pub source: StoredBlockRef,
}

impl Compact for StoredDerivedPair {
    fn to_compact<B: bytes::BufMut + AsMut<[u8]>>(&self, buf: &mut B) -> usize {
        self.derived.to_compact(buf) + self.source.to_compact(buf)
    }

    fn from_compact(buf: &[u8], _len: usize) -> (Self, &[u8]) {
        let (derived, rest) = StoredBlockRef::from_compact(buf, buf.len());
        let (source, rest) = StoredBlockRef::from_compact(rest, rest.len());
        (Self { derived, source }, rest)
    }
}

impl From<DerivedRefPair> for StoredDerivedPair {
    fn from(pair: DerivedRefPair) -> Self {
        Self { derived: pair.derived.into(), source: pair.source.into() }
    }
}

impl From<StoredDerivedPair> for DerivedRefPair {
    fn from(pair: StoredDerivedPair) -> Self {
        Self { source: pair.source.into(), derived: pair.derived.into() }
    }
}

/// An L1 source block with the numbers of the L2 blocks derived from it, in order. Value of
/// [`SourceBlocks`](crate::models::SourceBlocks).
///
/// The list is empty for L1 blocks that produced no L2 block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceBlockTraversal {
    /// The L1 block.
    pub source: StoredBlockRef,
    /// Numbers of the L2 blocks derived from it.
    pub derived_block_numbers: U64List,
}

impl SourceBlockTraversal {
    /// Creates a traversal with no derived blocks yet.
    pub fn new(source: StoredBlockRef) -> Self {
        Self { source, derived_block_numbers: U64List::default() }
    }
}

impl Compact for SourceBlockTraversal {
    fn to_compact<B: bytes::BufMut + AsMut<[u8]>>(&self, buf: &mut B) -> usize {
        self.source.to_compact(buf) + self.derived_block_numbers.to_compact(buf)
    }

    fn from_compact(buf: &[u8], _len: usize) -> (Self, &[u8]) {
        let (source, rest) = StoredBlockRef::from_compact(buf, buf.len());
        let (derived_block_numbers, rest) = U64List::from_compact(rest, rest.len());
        (Self { source, derived_block_numbers }, rest)
    }
}
