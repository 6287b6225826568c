//! Access-list codec for `CrossL2Inbox` message claims.
//!
//! A claim is a group of 32-byte entries: a lookup entry (`0x01`), an optional chain id
//! extension (`0x02`), and a checksum entry (`0x03`).

use alloy_primitives::{B256, U256, keccak256};
use thiserror::Error;

const PREFIX_LOOKUP: u8 = 0x01;
const PREFIX_CHAIN_ID_EXTENSION: u8 = 0x02;
const PREFIX_CHECKSUM: u8 = 0x03;

/// A parsed access-list claim on an initiating message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Access {
    /// Full 256-bit chain id, big endian.
    pub chain_id: [u8; 32],
    /// Block of the initiating message.
    pub block_number: u64,
    /// Timestamp of that block.
    pub timestamp: u64,
    /// Log index of the initiating message.
    pub log_index: u32,
    /// Checksum as supplied by the caller.
    pub checksum: B256,
}

impl Access {
    /// Returns the chain id if it fits in a `u64`.
    pub fn chain_id(&self) -> Result<u64, AccessListError> {
        U256::from_be_bytes(self.chain_id).try_into().map_err(|_| AccessListError::ChainIdOverflow)
    }

    /// Computes the checksum this claim must carry for an initiating log with `log_hash`.
    ///
    /// `idPacked = 12 zero bytes ++ block_number ++ timestamp ++ log_index`,
    /// `checksum = keccak256(keccak256(log_hash ++ idPacked) ++ chain_id)` with the first byte
    /// replaced by `0x03`.
    pub fn recompute_checksum(&self, log_hash: &B256) -> B256 {
        let mut id_packed = [0u8; 32];
        id_packed[12..20].copy_from_slice(&self.block_number.to_be_bytes());
        id_packed[20..28].copy_from_slice(&self.timestamp.to_be_bytes());
        id_packed[28..32].copy_from_slice(&self.log_index.to_be_bytes());

        let id_log_hash = keccak256([log_hash.as_slice(), &id_packed].concat());
        let mut checksum = keccak256([id_log_hash.as_slice(), &self.chain_id].concat());
        checksum.0[0] = PREFIX_CHECKSUM;
        checksum
    }

    /// Verifies the supplied checksum against the initiating log hash.
    pub fn verify_checksum(&self, log_hash: &B256) -> Result<(), AccessListError> {
        if self.recompute_checksum(log_hash) != self.checksum {
            return Err(AccessListError::ChecksumMismatch);
        }
        Ok(())
    }
}

/// Error returned when an access list is malformed or fails verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessListError {
    /// Input ended in the middle of a claim.
    #[error("unexpected end of access list")]
    UnexpectedEnd,

    /// Entry with an unknown type byte.
    #[error("unknown entry type {0:#x}")]
    UnknownType(u8),

    /// Entries out of order, or non-zero padding.
    #[error("malformed entry")]
    MalformedEntry,

    /// Checksum does not match the initiating log.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Chain id does not fit in 64 bits.
    #[error("chain id overflows u64")]
    ChainIdOverflow,
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Lookup { chain_id_low: [u8; 8], block_number: u64, timestamp: u64, log_index: u32 },
    ChainIdExtension { upper_bytes: [u8; 24] },
    Checksum(B256),
}

fn u64_at(entry: &B256, offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&entry[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

fn parse_entry(entry: &B256) -> Result<Entry, AccessListError> {
    match entry[0] {
        PREFIX_LOOKUP => {
            if entry[1..4] != [0; 3] {
                return Err(AccessListError::MalformedEntry);
            }
            let mut chain_id_low = [0u8; 8];
            chain_id_low.copy_from_slice(&entry[4..12]);
            let mut log_index = [0u8; 4];
            log_index.copy_from_slice(&entry[28..32]);
            Ok(Entry::Lookup {
                chain_id_low,
                block_number: u64_at(entry, 12),
                timestamp: u64_at(entry, 20),
                log_index: u32::from_be_bytes(log_index),
            })
        }
        PREFIX_CHAIN_ID_EXTENSION => {
            if entry[1..8] != [0; 7] {
                return Err(AccessListError::MalformedEntry);
            }
            let mut upper_bytes = [0u8; 24];
            upper_bytes.copy_from_slice(&entry[8..32]);
            Ok(Entry::ChainIdExtension { upper_bytes })
        }
        PREFIX_CHECKSUM => Ok(Entry::Checksum(*entry)),
        other => Err(AccessListError::UnknownType(other)),
    }
}

/// Parses raw access-list entries into [`Access`] claims, in order.
pub fn parse_access_list(entries: Vec<B256>) -> Result<Vec<Access>, AccessListError> {
    let mut list = Vec::with_capacity(entries.len() / 2);
    let mut chain_id: Option<[u8; 32]> = None;
    let mut lookup: Option<(u64, u64, u32)> = None;
    let mut extended = false;

    for raw in &entries {
        match parse_entry(raw)? {
            Entry::Lookup { chain_id_low, block_number, timestamp, log_index } => {
                if lookup.is_some() {
                    return Err(AccessListError::MalformedEntry);
                }
                let mut id = [0u8; 32];
                id[24..32].copy_from_slice(&chain_id_low);
                chain_id = Some(id);
                lookup = Some((block_number, timestamp, log_index));
            }
            Entry::ChainIdExtension { upper_bytes } => {
                let id = chain_id.as_mut().ok_or(AccessListError::MalformedEntry)?;
                if extended {
                    return Err(AccessListError::MalformedEntry);
                }
                id[0..24].copy_from_slice(&upper_bytes);
                extended = true;
            }
            Entry::Checksum(checksum) => {
                let (block_number, timestamp, log_index) =
                    lookup.take().ok_or(AccessListError::MalformedEntry)?;
                let chain_id = chain_id.take().ok_or(AccessListError::MalformedEntry)?;
                extended = false;
                list.push(Access { chain_id, block_number, timestamp, log_index, checksum });
            }
        }
    }

    if lookup.is_some() {
        return Err(AccessListError::UnexpectedEnd);
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    fn lookup_entry(block_number: u64, timestamp: u64, log_index: u32, chain_id: u64) -> B256 {
        let mut buf = [0u8; 32];
        buf[0] = PREFIX_LOOKUP;
        buf[4..12].copy_from_slice(&chain_id.to_be_bytes());
        buf[12..20].copy_from_slice(&block_number.to_be_bytes());
        buf[20..28].copy_from_slice(&timestamp.to_be_bytes());
        buf[28..32].copy_from_slice(&log_index.to_be_bytes());
        B256::from(buf)
    }

    fn extension_entry(upper: [u8; 24]) -> B256 {
        let mut buf = [0u8; 32];
        buf[0] = PREFIX_CHAIN_ID_EXTENSION;
        buf[8..32].copy_from_slice(&upper);
        B256::from(buf)
    }

    fn access(block_number: u64, timestamp: u64, log_index: u32, chain_id: u64) -> Access {
        Access {
            chain_id: U256::from(chain_id).to_be_bytes(),
            block_number,
            timestamp,
            log_index,
            checksum: B256::ZERO,
        }
    }

    #[test]
    fn test_checksum_known_value() {
        let log_hash = b256!("0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef");
        assert_eq!(
            access(2587, 4660, 66, 3).recompute_checksum(&log_hash),
            b256!("0x03ca886771056d8ea647bb809b888ba14986f57daaf28954d40408321717716a")
        );
    }

    #[test]
    fn test_parse_and_verify() {
        let log_hash = keccak256([1u8; 32]);
        let checksum = access(1, 2, 3, 10).recompute_checksum(&log_hash);

        let parsed = parse_access_list(vec![lookup_entry(1, 2, 3, 10), checksum]).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].chain_id().unwrap(), 10);
        assert_eq!(parsed[0].log_index, 3);
        assert!(parsed[0].verify_checksum(&log_hash).is_ok());
    }

    #[test]
    fn test_corrupted_checksum_is_rejected() {
        let log_hash = keccak256([1u8; 32]);
        let mut checksum = access(1, 2, 3, 10).recompute_checksum(&log_hash);
        checksum.0[31] ^= 0xff;

        let parsed = parse_access_list(vec![lookup_entry(1, 2, 3, 10), checksum]).unwrap();
        assert_eq!(parsed[0].verify_checksum(&log_hash), Err(AccessListError::ChecksumMismatch));
    }

    #[test]
    fn test_chain_id_extension() {
        let mut upper = [0u8; 24];
        upper[23] = 1;
        let mut raw_checksum = [0u8; 32];
        raw_checksum[0] = PREFIX_CHECKSUM;

        let parsed = parse_access_list(vec![
            lookup_entry(5, 6, 7, 0),
            extension_entry(upper),
            B256::from(raw_checksum),
        ])
        .unwrap();
        assert_eq!(parsed[0].chain_id[23], 1);
        assert_eq!(parsed[0].chain_id(), Err(AccessListError::ChainIdOverflow));
    }

    #[test]
    fn test_invalid_order_and_truncation() {
        let mut raw_checksum = [0u8; 32];
        raw_checksum[0] = PREFIX_CHECKSUM;
        let checksum = B256::from(raw_checksum);

        assert_eq!(
            parse_access_list(vec![checksum, lookup_entry(0, 0, 0, 1)]),
            Err(AccessListError::MalformedEntry)
        );
        assert_eq!(
            parse_access_list(vec![lookup_entry(0, 0, 0, 1)]),
            Err(AccessListError::UnexpectedEnd)
        );
        assert_eq!(
            parse_access_list(vec![B256::repeat_byte(0x09)]),
            Err(AccessListError::UnknownType(0x09))
        );
    }
}
