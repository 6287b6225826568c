//! Payloads exchanged with managed nodes.

use crate::{BlockRef, DerivedRefPair};
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// A block that replaced an invalidated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockReplacement {
    /// The replacement block.
    pub replacement: BlockRef,
    /// Hash of the block that was invalidated.
    pub invalidated: B256,
}

/// An event reported by a managed node.
///
/// At most one field is expected to be set per event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedEvent {
    /// The node reset itself and asks the supervisor to re-sync it.
    pub reset: Option<String>,
    /// A new unsafe block.
    pub unsafe_block: Option<BlockRef>,
    /// A new block derived from L1.
    pub derivation_update: Option<DerivedRefPair>,
    /// Derivation ran out of L1 data after the given pair.
    #[serde(rename = "exhaustL1")]
    pub exhaust_l1: Option<DerivedRefPair>,
    /// A block was replaced after invalidation.
    pub replace_block: Option<BlockReplacement>,
    /// The L1 origin of derivation advanced without producing a block.
    pub derivation_origin_update: Option<BlockRef>,
}

/// Envelope of a subscription notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionEvent {
    /// The event, if any.
    pub data: Option<ManagedEvent>,
}

/// Identifies a block by hash, number and timestamp, as used by `interop_invalidateBlock`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockSeal {
    /// Block hash.
    pub hash: B256,
    /// Block number.
    pub number: u64,
    /// Block timestamp.
    pub timestamp: u64,
}

impl From<BlockRef> for BlockSeal {
    fn from(block: BlockRef) -> Self {
        Self { hash: block.hash, number: block.number, timestamp: block.timestamp }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_managed_event_field_names() {
        let pair = DerivedRefPair::default();
        let event = ManagedEvent { exhaust_l1: Some(pair), ..Default::default() };
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("exhaustL1").is_some());

        let decoded: ManagedEvent = serde_json::from_value(json!({
            "unsafeBlock": {
                "hash": B256::repeat_byte(1),
                "number": 12,
                "parentHash": B256::ZERO,
                "timestamp": 24
            }
        }))
        .unwrap();
        assert_eq!(decoded.unsafe_block.map(|b| b.number), Some(12));
        assert!(decoded.derivation_update.is_none());
    }
}
