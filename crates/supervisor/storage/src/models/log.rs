//! Indexed logs, the value of the dup-sorted [`crate::models::BlockLogs`] table.
//!
//! Entries of one block are sorted by log index, which is why the index is encoded first.

use alloy_primitives::B256;
use bytes::{Buf, BufMut};
use interop_supervisor_types::{ExecutingMessage, Log};
use reth_codecs::Compact;
use serde::{Deserialize, Serialize};

/// Size of an encoded [`ExecutingMessageEntry`].
const MESSAGE_LEN: usize = 4 + 8 + 8 + 8 + 32;

/// A log of an L2 block, reduced to what cross-chain validation needs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogEntry {
    /// Index of the log within its block. Used as the dup-sort subkey.
    pub index: u32,
    /// Log hash.
    pub hash: B256,
    /// Executing message carried by the log, if it was emitted by the inbox.
    pub executing_message: Option<ExecutingMessageEntry>,
}

/// Layout: `index: u32`, `flag: u8` (1 when a message follows), `hash: B256`, then the message.
impl Compact for LogEntry {
    fn to_compact<B>(&self, buf: &mut B) -> usize
    where
        B: BufMut + AsMut<[u8]>,
    {
        buf.put_u32(self.index);
        buf.put_u8(u8::from(self.executing_message.is_some()));
        buf.put_slice(self.hash.as_slice());

        let message_len =
            self.executing_message.as_ref().map_or(0, |message| message.to_compact(buf));
        4 + 1 + 32 + message_len
    }

    fn from_compact(mut buf: &[u8], _len: usize) -> (Self, &[u8]) {
        assert!(buf.len() >= 37, "LogEntry::from_compact: truncated entry");
        let index = buf.get_u32();
        let has_message = buf.get_u8() == 1;
        let hash = B256::from_slice(&buf[..32]);
        buf.advance(32);

        let mut executing_message = None;
        if has_message {
            let (message, rest) = ExecutingMessageEntry::from_compact(buf, MESSAGE_LEN);
            executing_message = Some(message);
            buf = rest;
        }

        (Self { index, hash, executing_message }, buf)
    }
}

/// Stored form of an [`ExecutingMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutingMessageEntry {
    /// Log index of the initiating message.
    pub log_index: u32,
    /// Chain of the initiating message.
    pub chain_id: u64,
    /// Block of the initiating message.
    pub block_number: u64,
    /// Timestamp of the initiating block.
    pub timestamp: u64,
    /// Expected hash of the initiating log.
    pub hash: B256,
}

/// Fixed-width layout of `log_index`, `chain_id`, `block_number`, `timestamp`, `hash`.
impl Compact for ExecutingMessageEntry {
    fn to_compact<B>(&self, buf: &mut B) -> usize
    where
        B: BufMut + AsMut<[u8]>,
    {
        buf.put_u32(self.log_index);
        buf.put_u64(self.chain_id);
        buf.put_u64(self.block_number);
        buf.put_u64(self.timestamp);
        buf.put_slice(self.hash.as_slice());
        MESSAGE_LEN
    }

    fn from_compact(mut buf: &[u8], _len: usize) -> (Self, &[u8]) {
        assert!(buf.len() >= MESSAGE_LEN, "ExecutingMessageEntry::from_compact: truncated entry");
        let log_index = buf.get_u32();
        let chain_id = buf.get_u64();
        let block_number = buf.get_u64();
        let timestamp = buf.get_u64();
        let hash = B256::from_slice(&buf[..32]);
        buf.advance(32);

        (Self { log_index, chain_id, block_number, timestamp, hash }, buf)
    }
}

impl From<ExecutingMessage> for ExecutingMessageEntry {
    fn from(message: ExecutingMessage) -> Self {
        Self {
            log_index: message.log_index,
            chain_id: message.chain_id,
            block_number: message.block_number,
            timestamp: message.timestamp,
            hash: message.hash,
        }
    }
}

impl From<ExecutingMessageEntry> for ExecutingMessage {
    fn from(entry: ExecutingMessageEntry) -> Self {
        Self {
            chain_id: entry.chain_id,
            block_number: entry.block_number,
            log_index: entry.log_index,
            timestamp: entry.timestamp,
            hash: entry.hash,
        }
    }
}

impl From<Log> for LogEntry {
    fn from(log: Log) -> Self {
        Self {
            index: log.index,
            hash: log.hash,
            executing_message: log.executing_message.map(Into::into),
        }
    }
}

impl From<LogEntry> for Log {
    fn from(entry: LogEntry) -> Self {
        Self {
            index: entry.index,
            hash: entry.hash,
            executing_message: entry.executing_message.map(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> ExecutingMessageEntry {
        ExecutingMessageEntry {
            log_index: 2,
            chain_id: 10,
            block_number: 100,
            timestamp: 12345,
            hash: B256::repeat_byte(0x44),
        }
    }

    #[test]
    fn test_log_entry_encodes_index_first() {
        let entry = LogEntry { index: 0x0102_0304, hash: B256::repeat_byte(1), executing_message: None };
        let mut buffer = Vec::new();
        let written = entry.to_compact(&mut buffer);

        assert_eq!(written, 37);
        assert_eq!(&buffer[..4], &[1, 2, 3, 4]);
        assert_eq!(buffer[4], 0);
    }

    #[test]
    fn test_log_entry_with_message_decodes() {
        let entry =
            LogEntry { index: 5, hash: B256::repeat_byte(3), executing_message: Some(message()) };
        let mut buffer = Vec::new();
        let written = entry.to_compact(&mut buffer);
        assert_eq!(written, buffer.len());
        assert_eq!(written, 37 + MESSAGE_LEN);

        let (decoded, rest) = LogEntry::from_compact(&buffer, buffer.len());
        assert_eq!(decoded, entry);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_log_conversion_keeps_message() {
        let log = Log {
            index: 1,
            hash: B256::repeat_byte(9),
            executing_message: Some(ExecutingMessage::from(message())),
        };
        let entry = LogEntry::from(log.clone());
        assert_eq!(entry.executing_message, Some(message()));
        assert_eq!(Log::from(entry), log);
    }
}
