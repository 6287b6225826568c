//! Core logic of the interop supervisor.
//!
//! One [`ChainProcessor`] per chain owns that chain's storage and applies its events in order.
//! Cross-safety checker jobs promote blocks whose interop dependencies are satisfied, the
//! [`L1Watcher`] feeds L1 heads, finality and reorgs, and the [`ReorgHandler`] reconciles chains
//! with a reorganised L1. [`Supervisor`] serves queries and operator actions on top.

pub mod chain_processor;
pub use chain_processor::{
    ChainProcessor, ChainProcessorConfig, ChainProcessorError, ProcessorHealth, ProcessorState,
    ProcessorStatus,
};

pub mod error;
pub use error::{SpecError, SuperchainDAError, SupervisorError};

/// Contains the main Supervisor struct and its implementation.
mod supervisor;
pub use supervisor::{Supervisor, SupervisorAdminService, SupervisorService};

mod logindexer;
pub use logindexer::{LogIndexer, LogIndexerError};

pub mod rpc;

pub mod config;
pub mod event;
pub mod syncnode;

pub mod l1_watcher;
pub use l1_watcher::{L1Watcher, L1WatcherConfig, L1WatcherError};

pub mod safety_checker;
pub use safety_checker::{CrossSafetyCheckerJob, CrossSafetyError};

mod reorg;
pub use reorg::{ReorgHandler, ReorgHandlerError};
