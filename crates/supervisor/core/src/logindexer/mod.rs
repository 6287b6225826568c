//! Log indexing of L2 blocks.
//!
//! Fetches a block's receipts from its managed node, hashes every log and parses executing
//! messages out of `CrossL2Inbox` logs, then persists them with the block.

mod indexer;
pub use indexer::{LogIndexer, LogIndexerError};
