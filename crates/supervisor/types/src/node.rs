//! Status and peer information reported by a managed node.

use crate::{BlockRef, L2BlockRef};
use alloy_primitives::map::HashMap;
use serde::{Deserialize, Serialize};

/// Sync status of a managed node (`optimism_syncStatus`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSyncStatus {
    /// L1 block derivation is currently at.
    pub current_l1: BlockRef,
    /// L1 head seen by the node.
    pub head_l1: BlockRef,
    /// L1 finalized block seen by the node.
    pub finalized_l1: BlockRef,
    /// Local unsafe L2 head.
    pub unsafe_l2: L2BlockRef,
    /// Cross-unsafe L2 head.
    pub cross_unsafe_l2: L2BlockRef,
    /// Local safe L2 head.
    pub local_safe_l2: L2BlockRef,
    /// Cross-safe L2 head.
    pub safe_l2: L2BlockRef,
    /// Finalized L2 head.
    pub finalized_l2: L2BlockRef,
}

/// A peer of a managed node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    /// libp2p peer id.
    #[serde(rename = "peerID")]
    pub peer_id: String,
    /// Known multiaddresses of the peer.
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Connection state.
    #[serde(default)]
    pub connectedness: u8,
}

/// Peer table of a managed node (`opp2p_peers`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerDump {
    /// Number of connected peers.
    pub total_connected: u32,
    /// Peers keyed by peer id.
    #[serde(default)]
    pub peers: HashMap<String, PeerInfo>,
}

/// Local p2p identity of a managed node (`opp2p_self`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelf {
    /// libp2p peer id.
    #[serde(rename = "peerID")]
    pub peer_id: String,
    /// Listen addresses.
    #[serde(default)]
    pub addresses: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_peer_dump_tolerates_extra_fields() {
        let dump: PeerDump = serde_json::from_value(json!({
            "totalConnected": 1,
            "peers": {
                "16Uiu2": { "peerID": "16Uiu2", "addresses": ["/ip4/127.0.0.1/tcp/9222"], "connectedness": 1, "latency": 3 }
            },
            "bannedPeers": []
        }))
        .unwrap();
        assert_eq!(dump.total_connected, 1);
        assert_eq!(dump.peers["16Uiu2"].addresses.len(), 1);
    }
}
