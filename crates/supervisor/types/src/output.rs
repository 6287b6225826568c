//! Output roots and super roots.

use alloy_primitives::{B256, ChainId, U256, keccak256};
use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Version byte of the [`SuperRoot`] encoding.
pub const SUPER_ROOT_VERSION: u8 = 1;

/// Components of a version 0 L2 output, as reported by a managed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Constructor, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputV0 {
    /// State root of the block.
    pub state_root: B256,
    /// Storage root of the `L2ToL1MessagePasser` predeploy.
    pub message_passer_storage_root: B256,
    /// Block hash.
    pub block_hash: B256,
}

impl OutputV0 {
    /// Returns the output root commitment.
    ///
    /// `keccak256(version ++ state_root ++ message_passer_storage_root ++ block_hash)` with a
    /// 32-byte zero version.
    pub fn output_root(&self) -> B256 {
        let mut encoded = [0u8; 128];
        encoded[32..64].copy_from_slice(self.state_root.as_slice());
        encoded[64..96].copy_from_slice(self.message_passer_storage_root.as_slice());
        encoded[96..128].copy_from_slice(self.block_hash.as_slice());
        keccak256(encoded)
    }
}

/// Output root of one chain inside a [`SuperRoot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Constructor)]
pub struct OutputRootWithChain {
    /// Chain of the output root.
    pub chain_id: ChainId,
    /// Output root hash.
    pub output_root: B256,
}

/// Snapshot of every chain in the dependency set at one timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperRoot {
    /// Timestamp of the snapshot.
    pub timestamp: u64,
    /// Output roots, sorted by chain id.
    pub output_roots: Vec<OutputRootWithChain>,
}

impl SuperRoot {
    /// Creates a [`SuperRoot`], sorting the output roots by chain id.
    pub fn new(timestamp: u64, mut output_roots: Vec<OutputRootWithChain>) -> Self {
        output_roots.sort_by_key(|root| root.chain_id);
        Self { timestamp, output_roots }
    }

    /// Encodes as `version ++ timestamp ++ (chain_id_u256 ++ output_root)*`.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 8 + 64 * self.output_roots.len());
        out.push(SUPER_ROOT_VERSION);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        for root in &self.output_roots {
            out.extend_from_slice(&U256::from(root.chain_id).to_be_bytes::<32>());
            out.extend_from_slice(root.output_root.as_slice());
        }
        out
    }

    /// Hash of the encoded super root.
    pub fn hash(&self) -> B256 {
        keccak256(self.encode())
    }
}
