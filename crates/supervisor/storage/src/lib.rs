//! Persistent storage for the interop supervisor.
//!
//! Every chain in the dependency set gets its own MDBX environment, built on [`reth-db`], holding:
//! - L2 blocks and their logs, with any executing messages parsed out
//! - derivation records linking L2 blocks to the L1 blocks they were derived from
//! - the head of the chain at every safety level
//! - L1 blocks reported by the L1 watcher
//!
//! All writes to one chain happen inside a single transaction, so a crash never leaves heads
//! pointing at records that are not there. [`ChainDbFactory`] opens the per-chain databases and
//! exposes the read-only cross-chain view used for message validation.

pub mod models;
pub use models::SourceBlockTraversal;

mod error;
pub use error::{EntryNotFoundError, StorageError};

mod providers;

mod chaindb;
pub use chaindb::ChainDb;

mod metrics;
pub(crate) use metrics::Metrics;

mod chaindb_factory;
pub use chaindb_factory::ChainDbFactory;

mod traits;
pub use traits::{
    CrossChainSafetyProvider, DbReader, DerivationStorage, DerivationStorageReader,
    DerivationStorageWriter, FinalizedL1Storage, HeadRefStorage, HeadRefStorageReader,
    HeadRefStorageWriter, L1BlockStorage, LogStorage, LogStorageReader, LogStorageWriter,
    StorageRewinder,
};
