use crate::message::ExecutingMessage;
use alloy_primitives::B256;

/// An indexed log of an L2 block.
///
/// Only the log hash is kept, not the log content. When the log is a `CrossL2Inbox` executing
/// message, the parsed message is kept alongside so the cross-safety checker can resolve its
/// dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// Index of the log within its block.
    pub index: u32,
    /// Hash of the log.
    pub hash: B256,
    /// Parsed executing message, if any.
    pub executing_message: Option<ExecutingMessage>,
}
