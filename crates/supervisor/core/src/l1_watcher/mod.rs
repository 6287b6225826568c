//! L1 Watcher Module
//! Polls the L1 chain and reports new, reorged and finalized blocks to every chain.
mod watcher;
pub use watcher::{L1Watcher, L1WatcherConfig};

mod error;
pub use error::L1WatcherError;
