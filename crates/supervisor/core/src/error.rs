//! [`SupervisorService`](crate::SupervisorService) errors.

use crate::syncnode::ManagedNodeError;
use alloy_primitives::ChainId;
use interop_supervisor_storage::{EntryNotFoundError, StorageError};
use interop_supervisor_types::{AccessListError, InteropValidationError, SafetyLevel};
use jsonrpsee::types::{ErrorCode, ErrorObjectOwned};
use std::time::Duration;
use thiserror::Error;

/// Errors of the query and admin surface.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisorError {
    /// No chains are configured for supervision.
    #[error("empty dependency set")]
    EmptyDependencySet,

    /// The chain is not part of the dependency set.
    #[error("unsupported chain ID {0}")]
    UnsupportedChainId(ChainId),

    /// Protocol error with a well-known code.
    #[error(transparent)]
    SpecError(#[from] SpecError),

    /// Reading the chain database failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// No managed node is registered for the chain.
    #[error("managed node not found for chain: {0}")]
    ManagedNodeMissing(ChainId),

    /// A call to a managed node failed.
    #[error(transparent)]
    ManagedNodeError(#[from] ManagedNodeError),

    /// The access list could not be decoded.
    #[error(transparent)]
    AccessListError(#[from] AccessListError),

    /// The checksum of an access-list claim does not match the stored log.
    #[error("invalid checksum for log {log_index} in block {block_number} of chain {chain_id}")]
    InvalidChecksum {
        /// Chain of the initiating message.
        chain_id: ChainId,
        /// Block of the initiating message.
        block_number: u64,
        /// Claimed log index.
        log_index: u32,
    },

    /// The claimed timestamp differs from the stored block's.
    #[error("timestamp mismatch for block {block_number}: expected {expected}, got {got}")]
    TimestampMismatch {
        /// Block of the initiating message.
        block_number: u64,
        /// Stored timestamp.
        expected: u64,
        /// Claimed timestamp.
        got: u64,
    },

    /// The claimed log index does not exist in the block.
    #[error("log index {log_index} not found in block {block_number}")]
    LogIndexMismatch {
        /// Block of the initiating message.
        block_number: u64,
        /// Claimed log index.
        log_index: u32,
    },

    /// The message may not be executed at the given time.
    #[error(transparent)]
    InteropValidation(#[from] InteropValidationError),

    /// The initiating block has not reached the requested safety level.
    #[error("block {block_number} of chain {chain_id} is not {level} yet")]
    InsufficientSafety {
        /// Chain of the initiating message.
        chain_id: ChainId,
        /// Block of the initiating message.
        block_number: u64,
        /// Requested level.
        level: SafetyLevel,
    },

    /// The chain processor is no longer accepting events.
    #[error("failed to send event to chain {0}")]
    ChannelSendFailed(ChainId),

    /// The peer node advertises no address to connect to.
    #[error("node of chain {0} has no listen address")]
    NoPeerAddress(ChainId),

    /// A managed node did not answer in time.
    #[error("managed node call timed out after {0:?}")]
    Timeout(Duration),
}

impl SupervisorError {
    /// JSON-RPC error code of the error.
    pub fn code(&self) -> i32 {
        match self {
            Self::SpecError(err) => err.code(),
            Self::StorageError(err) => SpecError::from(err).code(),
            Self::UnsupportedChainId(_) => SuperchainDAError::UnknownChain as i32,
            Self::InvalidChecksum { .. } |
            Self::TimestampMismatch { .. } |
            Self::LogIndexMismatch { .. } |
            Self::InteropValidation(_) |
            Self::InsufficientSafety { .. } => SuperchainDAError::ConflictingData as i32,
            Self::AccessListError(_) => ErrorCode::InvalidParams.code(),
            Self::EmptyDependencySet |
            Self::ManagedNodeMissing(_) |
            Self::ManagedNodeError(_) |
            Self::ChannelSendFailed(_) |
            Self::NoPeerAddress(_) |
            Self::Timeout(_) => ErrorCode::InternalError.code(),
        }
    }
}

impl From<SupervisorError> for ErrorObjectOwned {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::SpecError(err) => err.into(),
            SupervisorError::StorageError(err) => SpecError::from(&err).into(),
            err => Self::owned(err.code(), err.to_string(), None::<()>),
        }
    }
}

/// Protocol error codes of the interop supervisor API.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, derive_more::TryFrom)]
#[repr(i32)]
#[try_from(repr)]
pub enum SuperchainDAError {
    /// The chain database has not been initialised yet.
    #[error("chain database is not initialized")]
    UninitializedChainDatabase = -320400,

    /// The data was skipped and is not available.
    #[error("data was skipped or pruned and is not available")]
    SkippedData = -320500,

    /// The chain is not in the dependency set.
    #[error("unsupported chain id")]
    UnknownChain = -320501,

    /// Different canonical data is known.
    #[error("conflicting data exists in the database")]
    ConflictingData = -320600,

    /// The data is already known and changed nothing.
    #[error("data is already known and didn't change anything")]
    IneffectiveData = -320601,

    /// The data does not fit onto the latest stored data.
    #[error("data is out of order (too old or new)")]
    OutOfOrder = -320900,

    /// A replacement block is needed before progress can be made.
    #[error("waiting for replacement block before progress can be made")]
    AwaitingReplacement = -320901,

    /// Access outside the allowed scope.
    #[error("data access not allowed due to limited scope")]
    OutOfScope = -321100,

    /// The first block in the database has no parent.
    #[error("cannot get parent of first block in database")]
    NoParentForFirstBlock = -321200,

    /// The data is not yet available.
    #[error("data is not yet available (from the future)")]
    FutureData = -321401,

    /// The data may exist but was not found.
    #[error("data may exist but was not found (possibly different revision)")]
    MissedData = -321500,

    /// The database is corrupted or failing.
    #[error("underlying database has I/O issues or is corrupted")]
    DataCorruption = -321501,
}

/// Extends [`SuperchainDAError`] with a code for errors that have no protocol equivalent.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SpecError {
    /// Protocol error.
    #[error(transparent)]
    SuperchainDAError(#[from] SuperchainDAError),

    /// Error without a protocol code.
    #[error("unclassified supervisor error")]
    ErrorNotInSpec,
}

impl SpecError {
    /// Maps the error to its JSON-RPC code.
    pub const fn code(&self) -> i32 {
        match self {
            Self::SuperchainDAError(e) => *e as i32,
            Self::ErrorNotInSpec => -321300,
        }
    }
}

impl From<SpecError> for ErrorObjectOwned {
    fn from(err: SpecError) -> Self {
        Self::owned(err.code(), err.to_string(), None::<()>)
    }
}

impl From<&StorageError> for SpecError {
    fn from(err: &StorageError) -> Self {
        match err {
            StorageError::Database(_) | StorageError::DatabaseInit(_) => {
                SuperchainDAError::DataCorruption.into()
            }
            StorageError::FutureData => SuperchainDAError::FutureData.into(),
            StorageError::EntryNotFound(EntryNotFoundError::MissingDerivedBlocks(_)) => {
                SuperchainDAError::SkippedData.into()
            }
            StorageError::EntryNotFound(_) => SuperchainDAError::MissedData.into(),
            StorageError::ConflictError | StorageError::ReorgRequired => {
                SuperchainDAError::ConflictingData.into()
            }
            StorageError::BlockOutOfOrder | StorageError::L1OriginRegression { .. } => {
                SuperchainDAError::OutOfOrder.into()
            }
            StorageError::DatabaseNotInitialised => {
                SuperchainDAError::UninitializedChainDatabase.into()
            }
            StorageError::LockPoisoned => Self::ErrorNotInSpec,
        }
    }
}

impl From<StorageError> for SpecError {
    fn from(err: StorageError) -> Self {
        Self::from(&err)
    }
}
