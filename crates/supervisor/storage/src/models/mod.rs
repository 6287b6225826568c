//! Table layout of a chain database.
//!
//! Every chain gets its own MDBX environment holding the tables below. Values are encoded with
//! [`reth_codecs::Compact`] and registered through [`reth_db_api::tables!`].

use reth_db_api::{
    TableSet, TableType, TableViewer,
    table::{DupSort, TableInfo},
    tables,
};
use std::fmt;

mod block;
pub use block::{StoredBlockRef, StoredL2BlockRef};

mod log;
pub use log::{ExecutingMessageEntry, LogEntry};

mod derivation;
pub use derivation::{SourceBlockTraversal, StoredDerivedPair};

mod head_ref;
pub use head_ref::SafetyHeadKey;

mod common;
pub use common::U64List;

/// Implements [`reth_db_api::table::Compress`] and [`reth_db_api::table::Decompress`] for types
/// encoded with [`reth_codecs::Compact`].
macro_rules! impl_compression_for_compact {
    ($($name:ident),+ $(,)?) => {
        $(
            impl reth_db_api::table::Compress for $name {
                type Compressed = Vec<u8>;

                fn compress_to_buf<B: bytes::BufMut + AsMut<[u8]>>(&self, buf: &mut B) {
                    let _ = reth_codecs::Compact::to_compact(self, buf);
                }
            }

            impl reth_db_api::table::Decompress for $name {
                fn decompress(value: &[u8]) -> Result<Self, reth_db_api::DatabaseError> {
                    let (decoded, _) = reth_codecs::Compact::from_compact(value, value.len());
                    Ok(decoded)
                }
            }
        )+
    };
}

impl_compression_for_compact!(
    StoredBlockRef,
    StoredL2BlockRef,
    LogEntry,
    StoredDerivedPair,
    SourceBlockTraversal,
);

tables! {
    /// L2 blocks accepted as local-unsafe, keyed by number.
    table L2Blocks {
        type Key = u64;
        type Value = StoredL2BlockRef;
    }

    /// Logs of each L2 block. Keyed by block number, dup-sorted by log index.
    table BlockLogs {
        type Key = u64;
        type Value = LogEntry;
        type SubKey = u32;
    }

    /// Derived L2 block number to the pair of derived block and L1 source.
    table DerivedBlocks {
        type Key = u64;
        type Value = StoredDerivedPair;
    }

    /// L1 source block number to the L2 blocks derived from it.
    table SourceBlocks {
        type Key = u64;
        type Value = SourceBlockTraversal;
    }

    /// L1 blocks reported by the L1 watcher, keyed by number. Only canonical blocks are kept.
    table L1Blocks {
        type Key = u64;
        type Value = StoredBlockRef;
    }

    /// Current head of every safety level.
    table SafetyHeads {
        type Key = SafetyHeadKey;
        type Value = StoredBlockRef;
    }
}
