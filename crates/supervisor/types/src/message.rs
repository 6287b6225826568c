//! Interop messages and their on-chain encoding.

use alloy_primitives::{Address, B256, ChainId, Log as PrimitiveLog, address, keccak256};
use alloy_sol_types::{SolEvent, sol};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Address of the `CrossL2Inbox` predeploy.
pub const CROSS_L2_INBOX_ADDRESS: Address = address!("0x4200000000000000000000000000000000000022");

mod inbox {
    use super::sol;

    sol! {
        /// Pointer to an initiating message on a remote (or the local) chain.
        #[derive(Default, Debug, PartialEq, Eq)]
        struct MessageIdentifier {
            address origin;
            uint256 blockNumber;
            uint256 logIndex;
            uint256 timestamp;
            uint256 chainId;
        }

        /// Emitted by `CrossL2Inbox` when a cross-chain message is executed.
        #[derive(Default, Debug, PartialEq, Eq)]
        event ExecutingMessage(bytes32 indexed payloadHash, MessageIdentifier identifier);
    }
}

pub use inbox::{ExecutingMessage as ExecutingMessageEvent, MessageIdentifier};

/// An executing message parsed from a `CrossL2Inbox` log.
///
/// It points at the initiating log on [`chain_id`](Self::chain_id), and carries the hash that
/// log must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutingMessage {
    /// Chain of the initiating message.
    pub chain_id: u64,
    /// Block of the initiating message.
    pub block_number: u64,
    /// Log index of the initiating message.
    pub log_index: u32,
    /// Timestamp of the initiating block.
    pub timestamp: u64,
    /// Expected hash of the initiating log.
    pub hash: B256,
}

impl ExecutingMessage {
    /// Parses an [`ExecutingMessage`] from a log, if it is a `CrossL2Inbox` executing message
    /// event with an identifier that fits the supervisor's integer widths.
    pub fn from_log(log: &PrimitiveLog) -> Option<Self> {
        if log.address != CROSS_L2_INBOX_ADDRESS || log.topics().len() != 2 {
            return None;
        }
        let event = ExecutingMessageEvent::decode_log_data(&log.data).ok()?;
        let id = event.identifier;
        Some(Self {
            chain_id: id.chainId.try_into().ok()?,
            block_number: id.blockNumber.try_into().ok()?,
            log_index: id.logIndex.try_into().ok()?,
            timestamp: id.timestamp.try_into().ok()?,
            hash: payload_hash_to_log_hash(event.payloadHash, id.origin),
        })
    }
}

/// Computes a log hash from the payload hash and the emitting address.
///
/// `keccak256(address ++ payload_hash)`.
pub fn payload_hash_to_log_hash(payload_hash: B256, addr: Address) -> B256 {
    let mut buf = Vec::with_capacity(52);
    buf.extend_from_slice(addr.as_slice());
    buf.extend_from_slice(payload_hash.as_slice());
    keccak256(&buf)
}

/// Computes the hash under which a log is indexed.
///
/// The payload is all topics followed by the data; the log hash binds its keccak to the emitter.
pub fn log_hash(log: &PrimitiveLog) -> B256 {
    let mut payload = Vec::with_capacity(log.topics().len() * 32 + log.data.data.len());
    for topic in log.topics() {
        payload.extend_from_slice(topic.as_slice());
    }
    payload.extend_from_slice(&log.data.data);
    payload_hash_to_log_hash(keccak256(&payload), log.address)
}

/// Context in which messages of an access list are executed, as passed to
/// `supervisor_checkAccessList`.
#[derive(Default, Debug, PartialEq, Eq, Clone, Constructor, Serialize, Deserialize)]
pub struct ExecutingDescriptor {
    /// Timestamp of the executing block.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// Validity must still hold at `timestamp + timeout`.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "alloy_serde::quantity::opt")]
    pub timeout: Option<u64>,
    /// Chain executing the messages.
    #[serde(
        default,
        rename = "chainID",
        skip_serializing_if = "Option::is_none",
        with = "alloy_serde::quantity::opt"
    )]
    pub chain_id: Option<ChainId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Bytes, LogData, U256, b256};

    fn sample_log() -> PrimitiveLog {
        PrimitiveLog::new_unchecked(
            address!("0xe0e1e2e3e4e5e6e7e8e9f0f1f2f3f4f5f6f7f8f9"),
            vec![
                b256!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
                b256!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb"),
            ],
            Bytes::from_static(b"example payload"),
        )
    }

    #[test]
    fn test_payload_hash_to_log_hash_with_known_value() {
        let address = address!("0xe0e1e2e3e4e5e6e7e8e9f0f1f2f3f4f5f6f7f8f9");
        let payload_hash = keccak256(Bytes::from_static(b"example payload"));
        assert_eq!(
            payload_hash_to_log_hash(payload_hash, address),
            b256!("0xf9ed05990c887d3f86718aabd7e940faaa75d6a5cd44602e89642586ce85f2aa")
        );
    }

    #[test]
    fn test_log_hash_with_known_value() {
        assert_eq!(
            log_hash(&sample_log()),
            b256!("0x20b21f284fb0286571fbf1cbfc20cdb1d50ea5c74c914478aee4a47b0a82a170")
        );
    }

    #[test]
    fn test_parse_executing_message_from_inbox_log() {
        let origin = address!("0x1111111111111111111111111111111111111111");
        let payload_hash = B256::repeat_byte(0xaa);
        let event = ExecutingMessageEvent {
            payloadHash: payload_hash,
            identifier: MessageIdentifier {
                origin,
                blockNumber: U256::from(7),
                logIndex: U256::from(2),
                timestamp: U256::from(1_000),
                chainId: U256::from(10),
            },
        };
        let log = PrimitiveLog { address: CROSS_L2_INBOX_ADDRESS, data: event.encode_log_data() };

        let message = ExecutingMessage::from_log(&log).expect("executing message");
        assert_eq!(message.chain_id, 10);
        assert_eq!(message.block_number, 7);
        assert_eq!(message.log_index, 2);
        assert_eq!(message.timestamp, 1_000);
        assert_eq!(message.hash, payload_hash_to_log_hash(payload_hash, origin));
    }

    #[test]
    fn test_ignores_logs_from_other_contracts() {
        assert!(ExecutingMessage::from_log(&sample_log()).is_none());

        let log = PrimitiveLog {
            address: CROSS_L2_INBOX_ADDRESS,
            data: LogData::new_unchecked(vec![B256::ZERO], Bytes::new()),
        };
        assert!(ExecutingMessage::from_log(&log).is_none());
    }

    #[test]
    fn test_executing_descriptor_json() {
        let descriptor =
            ExecutingDescriptor { timestamp: 1234567890, timeout: Some(3600), chain_id: Some(1000) };
        let serialized = serde_json::to_string(&descriptor).unwrap();
        assert_eq!(serialized, r#"{"timestamp":"0x499602d2","timeout":"0xe10","chainID":"0x3e8"}"#);

        let decoded: ExecutingDescriptor =
            serde_json::from_str(r#"{"timestamp":"0x499602d2"}"#).unwrap();
        assert_eq!(decoded, ExecutingDescriptor::new(1234567890, None, None));
    }
}
