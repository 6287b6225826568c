use alloy_primitives::ChainId;
use interop_supervisor_types::BlockRef;
use serde::Deserialize;
use std::collections::HashMap;

/// Genesis anchor of a rollup.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Genesis {
    /// The L1 block that the rollup starts after.
    pub l1: BlockRef,
    /// The L2 block that the rollup starts from.
    pub l2: BlockRef,
}

impl Genesis {
    /// Creates a new Genesis with the given L1 and L2 blocks.
    pub const fn new(l1: BlockRef, l2: BlockRef) -> Self {
        Self { l1, l2 }
    }
}

/// The interop relevant part of a rollup configuration.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RollupConfig {
    /// Genesis anchor information for the rollup.
    pub genesis: Genesis,

    /// The block time of the L2, in seconds.
    pub block_time: u64,

    /// Activation time for the interop network upgrade.
    #[serde(default)]
    pub interop_time: Option<u64>,
}

impl RollupConfig {
    /// Creates a new RollupConfig with the given genesis and block time.
    pub const fn new(genesis: Genesis, block_time: u64, interop_time: Option<u64>) -> Self {
        Self { genesis, block_time, interop_time }
    }

    /// Returns `true` if the timestamp is at or after the interop activation time.
    ///
    /// Returns `false` if `interop_time` is not configured.
    pub fn is_interop(&self, timestamp: u64) -> bool {
        self.interop_time.is_some_and(|t| timestamp >= t)
    }

    /// Returns `true` if the timestamp is strictly after the interop activation block.
    ///
    /// Messages can only be executed from the block after activation onward, so the activation
    /// block itself is not post-interop.
    pub fn is_post_interop(&self, timestamp: u64) -> bool {
        self.is_interop(timestamp.saturating_sub(self.block_time))
    }

    /// Returns `true` if given block is the interop activation block, the first block at or
    /// after the interop activation time.
    ///
    /// If interop is active at genesis, the genesis block is the activation block.
    pub fn is_interop_activation_block(&self, block: BlockRef) -> bool {
        if !self.is_interop(block.timestamp) {
            return false;
        }
        if block.number == self.genesis.l2.number {
            return true;
        }
        !self.is_interop(block.timestamp.saturating_sub(self.block_time))
    }

    /// Returns the number of the interop activation block, if interop is scheduled.
    pub fn activation_block_number(&self) -> Option<u64> {
        let interop_time = self.interop_time?;
        let genesis = self.genesis.l2;
        if interop_time <= genesis.timestamp {
            return Some(genesis.number);
        }
        if self.block_time == 0 {
            return None;
        }
        Some(genesis.number + (interop_time - genesis.timestamp).div_ceil(self.block_time))
    }
}

/// RollupConfigSet contains the configuration for every chain in the dependency set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct RollupConfigSet {
    /// The rollup configurations keyed by chain id.
    pub rollups: HashMap<ChainId, RollupConfig>,
}

impl RollupConfigSet {
    /// Creates a new RollupConfigSet with the given rollup configurations.
    pub const fn new(rollups: HashMap<ChainId, RollupConfig>) -> Self {
        Self { rollups }
    }

    /// Returns the rollup configuration for the given chain id.
    pub fn get(&self, chain_id: ChainId) -> Option<&RollupConfig> {
        self.rollups.get(&chain_id)
    }

    /// Returns `true` if interop is enabled for the chain at given timestamp.
    ///
    /// Unknown chains are never post-interop.
    pub fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool {
        self.get(chain_id).is_some_and(|cfg| cfg.is_post_interop(timestamp))
    }

    /// Returns `true` if given block is the interop activation block for the specified chain.
    pub fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockRef) -> bool {
        self.get(chain_id).is_some_and(|cfg| cfg.is_interop_activation_block(block))
    }

    /// Returns the activation block number of the given chain.
    pub fn activation_block_number(&self, chain_id: ChainId) -> Option<u64> {
        self.get(chain_id).and_then(RollupConfig::activation_block_number)
    }
}
