//! Response types of the supervisor RPC.

use alloy_eips::BlockNumHash;
use alloy_primitives::{B256, ChainId, map::HashMap};
use interop_supervisor_types::{BlockRef, SuperHead};
use serde::{Deserialize, Serialize, Serializer};

/// Sync status of every chain.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorSyncStatus {
    /// Lowest L1 block any chain has been derived up to.
    pub min_synced_l1: BlockRef,
    /// Lowest cross-safe timestamp across chains.
    #[serde(rename = "safeTimestamp")]
    pub cross_safe_timestamp: u64,
    /// Lowest finalized timestamp across chains.
    pub finalized_timestamp: u64,
    /// Status of each chain.
    pub chains: HashMap<ChainId, SupervisorChainSyncStatus>,
}

/// Heads of one chain.
///
/// Levels that have not been reached yet are reported as the zero block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorChainSyncStatus {
    /// Local-unsafe head.
    pub local_unsafe: BlockRef,
    /// Cross-unsafe head.
    pub cross_unsafe: BlockNumHash,
    /// Local-safe head.
    pub local_safe: BlockNumHash,
    /// Cross-safe head. Named `safe` on the wire.
    #[serde(rename = "safe")]
    pub cross_safe: BlockNumHash,
    /// Finalized head.
    pub finalized: BlockNumHash,
}

impl From<SuperHead> for SupervisorChainSyncStatus {
    fn from(super_head: SuperHead) -> Self {
        let SuperHead { local_unsafe, cross_unsafe, local_safe, cross_safe, finalized, .. } =
            super_head;
        let id = |block: Option<BlockRef>| block.unwrap_or_default().id();

        Self {
            local_unsafe: local_unsafe.unwrap_or_default(),
            cross_unsafe: id(cross_unsafe),
            local_safe: id(local_safe),
            cross_safe: id(cross_safe),
            finalized: id(finalized),
        }
    }
}

/// Output root of one chain in a [`SuperRootOutputRpc`].
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainRootInfoRpc {
    /// Chain id, as a hex quantity.
    #[serde(rename = "chainID", with = "alloy_serde::quantity")]
    pub chain_id: ChainId,
    /// Output root of the chain's last block at or before the super root timestamp.
    pub canonical: B256,
}

/// Super root at a timestamp.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperRootOutputRpc {
    /// Lowest L1 block from which every chain derived its block at the timestamp.
    pub cross_safe_derived_from: BlockNumHash,
    /// Super root timestamp, as a hex quantity.
    #[serde(with = "alloy_serde::quantity")]
    pub timestamp: u64,
    /// Super root hash.
    pub super_root: B256,
    /// Encoding version, as an even length hex string.
    #[serde(serialize_with = "serialize_u8_as_hex")]
    pub version: u8,
    /// Per-chain output roots, sorted by chain id.
    pub chains: Vec<ChainRootInfoRpc>,
}

fn serialize_u8_as_hex<S>(value: &u8, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("0x{value:02x}"))
}

/// Processing state of a chain, as seen by operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainHealthStatus {
    /// Events are processed normally.
    Healthy,
    /// Promotion is paused while an L1 reorg is reconciled.
    Suspended,
    /// Processing stopped until the chain is reset by an operator.
    Faulted,
}

/// Health of one chain, as returned by `admin_health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHealth {
    /// Chain id, as a hex quantity.
    #[serde(rename = "chainID", with = "alloy_serde::quantity")]
    pub chain_id: ChainId,
    /// Current state.
    pub status: ChainHealthStatus,
    /// Why the chain faulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;
    use interop_supervisor_types::SUPER_ROOT_VERSION;
    use serde_json::json;

    const STATUS: &str = r#"
    {
        "minSyncedL1": {
            "number": 100,
            "hash": "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
            "timestamp": 40044440000,
            "parentHash": "0x111def1234567890abcdef1234567890abcdef1234500000abcdef123456aaaa"
        },
        "safeTimestamp": 40044450000,
        "finalizedTimestamp": 40044460000,
        "chains" : {
            "1": {
                "localUnsafe": {
                    "number": 100,
                    "hash": "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
                    "timestamp": 40044440000,
                    "parentHash": "0x111def1234567890abcdef1234567890abcdef1234500000abcdef123456aaaa"
                },
                "crossUnsafe": {
                    "number": 90,
                    "hash": "0xabcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890"
                },
                "localSafe": {
                    "number": 80,
                    "hash": "0x34567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef13"
                },
                "safe": {
                    "number": 70,
                    "hash": "0x567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234"
                },
                "finalized": {
                    "number": 60,
                    "hash": "0x34567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef12"
                }
            }
        }
    }"#;

    #[test]
    fn test_deserialize_supervisor_sync_status() {
        let local_unsafe = BlockRef::new(
            b256!("0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef"),
            100,
            b256!("0x111def1234567890abcdef1234567890abcdef1234500000abcdef123456aaaa"),
            40044440000,
        );
        let mut chains = HashMap::default();
        chains.insert(
            1,
            SupervisorChainSyncStatus {
                local_unsafe,
                cross_unsafe: BlockNumHash::new(
                    90,
                    b256!("0xabcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890"),
                ),
                local_safe: BlockNumHash::new(
                    80,
                    b256!("0x34567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef13"),
                ),
                cross_safe: BlockNumHash::new(
                    70,
                    b256!("0x567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234"),
                ),
                finalized: BlockNumHash::new(
                    60,
                    b256!("0x34567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef12"),
                ),
            },
        );

        assert_eq!(
            serde_json::from_str::<SupervisorSyncStatus>(STATUS).expect("should deserialize"),
            SupervisorSyncStatus {
                min_synced_l1: local_unsafe,
                cross_safe_timestamp: 40044450000,
                finalized_timestamp: 40044460000,
                chains,
            }
        );
    }

    #[test]
    fn test_chain_status_from_partial_super_head() {
        let block = BlockRef::new(B256::repeat_byte(7), 12, B256::repeat_byte(6), 24);
        let status = SupervisorChainSyncStatus::from(SuperHead {
            local_unsafe: Some(block),
            cross_unsafe: Some(block),
            ..Default::default()
        });

        assert_eq!(status.local_unsafe, block);
        assert_eq!(status.cross_unsafe, block.id());
        assert_eq!(status.cross_safe, BlockNumHash::default());
    }

    #[test]
    fn test_super_root_version_even_length_hex() {
        let root = SuperRootOutputRpc {
            cross_safe_derived_from: BlockNumHash::default(),
            timestamp: 26,
            super_root: B256::default(),
            version: SUPER_ROOT_VERSION,
            chains: vec![ChainRootInfoRpc { chain_id: 10, canonical: B256::ZERO }],
        };
        let value = serde_json::to_value(&root).unwrap();

        assert_eq!(value["version"], json!("0x01"));
        assert_eq!(value["timestamp"], json!("0x1a"));
        assert_eq!(value["chains"][0]["chainID"], json!("0xa"));
    }

    #[test]
    fn test_chain_health_json() {
        let healthy = ChainHealth { chain_id: 10, status: ChainHealthStatus::Healthy, reason: None };
        assert_eq!(
            serde_json::to_value(&healthy).unwrap(),
            json!({ "chainID": "0xa", "status": "healthy" })
        );

        let faulted = ChainHealth {
            chain_id: 10,
            status: ChainHealthStatus::Faulted,
            reason: Some("reorg deeper than retained history".to_string()),
        };
        let value = serde_json::to_value(&faulted).unwrap();
        assert_eq!(value["status"], json!("faulted"));
        assert_eq!(value["reason"], json!("reorg deeper than retained history"));
    }
}
