use interop_supervisor_storage::StorageError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to or managing a node.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManagedNodeError {
    /// The RPC call to the node failed.
    #[error(transparent)]
    ClientError(#[from] ClientError),

    /// Reading the supervisor state for the node failed.
    #[error(transparent)]
    StorageError(#[from] StorageError),

    /// The node returned a block that disagrees with the event it reported.
    #[error("node reported inconsistent block at number {0}")]
    InconsistentBlock(u64),

    /// Represents an error that occurred while sending an event to the channel.
    #[error("failed to send event to channel: {0}")]
    ChannelSendFailed(String),

    /// A call did not finish in time.
    #[error("managed node call timed out after {0:?}")]
    Timeout(Duration),

    /// The node rejected every reset attempt.
    #[error("failed to reset the managed node after {attempts} attempts")]
    ResetBudgetExhausted {
        /// Attempts made before giving up.
        attempts: usize,
    },
}

/// Error establishing authenticated connection to managed node.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthenticationError {
    /// Missing valid JWT secret for authentication header.
    #[error("jwt secret not found or invalid")]
    InvalidJwt,
    /// Invalid header format.
    #[error("invalid authorization header")]
    InvalidHeader,
}

/// Errors of the managed node RPC client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport or JSON-RPC error.
    #[error(transparent)]
    Client(#[from] jsonrpsee::core::ClientError),

    /// Represents an error that occurred while authenticating to the managed node.
    #[error("failed to authenticate: {0}")]
    Authentication(#[from] AuthenticationError),

    /// The node reported a chain id that is not a number.
    #[error(transparent)]
    ChainIdParseError(#[from] std::num::ParseIntError),

    /// The node has no event queued.
    #[error("no event available")]
    NoEvent,
}

impl PartialEq for ClientError {
    fn eq(&self, other: &Self) -> bool {
        use ClientError::*;
        match (self, other) {
            (Client(a), Client(b)) => a.to_string() == b.to_string(),
            (Authentication(a), Authentication(b)) => a == b,
            (ChainIdParseError(a), ChainIdParseError(b)) => a == b,
            (NoEvent, NoEvent) => true,
            _ => false,
        }
    }
}

impl Eq for ClientError {}
