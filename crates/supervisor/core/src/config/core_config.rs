use super::{RollupConfigSet, deserialize_duration};
use crate::syncnode::ClientConfig;
use alloy_primitives::ChainId;
use interop_supervisor_types::{
    BlockRef, DependencySet, InteropValidationError, InteropValidator,
};
use serde::Deserialize;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

/// Configuration for the Supervisor service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The URL of the L1 RPC endpoint.
    pub l1_rpc: String,

    /// Managed L2 consensus nodes, one per chain.
    pub managed_nodes: Vec<ClientConfig>,

    /// Directory where the database files are stored.
    pub datadir: PathBuf,

    /// The socket address for the RPC server to listen on.
    pub rpc_addr: SocketAddr,

    /// Whether to enable the Supervisor Admin API.
    #[serde(default)]
    pub enable_admin_api: bool,

    /// The loaded dependency set configuration.
    pub dependency_set: DependencySet,

    /// The rollup configuration set.
    pub rollup_config_set: RollupConfigSet,

    /// Timing and retry knobs.
    #[serde(default)]
    pub tuning: Tuning,
}

/// Tunables of the supervisor. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// How many L2 blocks below the head are searched for a common ancestor.
    pub reorg_lookback_depth: u64,
    /// Attempts made to reset a managed node before the chain is faulted.
    pub reset_retry_budget: usize,
    /// Delay before the first reset retry. Later retries back off exponentially.
    #[serde(deserialize_with = "deserialize_duration")]
    pub reset_backoff_base: Duration,
    /// Upper bound for one reset call.
    #[serde(deserialize_with = "deserialize_duration")]
    pub reset_timeout: Duration,
    /// Poll interval for the latest L1 block.
    #[serde(deserialize_with = "deserialize_duration")]
    pub l1_poll_interval: Duration,
    /// Poll interval for the finalized L1 block.
    #[serde(deserialize_with = "deserialize_duration")]
    pub l1_finalized_poll_interval: Duration,
    /// Interval between cross-safety checks while nothing can be promoted.
    #[serde(deserialize_with = "deserialize_duration")]
    pub safety_check_interval: Duration,
    /// Number of L1 blocks the watcher keeps to find reorg ancestors.
    pub l1_history_depth: usize,
    /// Restarts of a failed background task before giving up.
    pub transient_retry_budget: u32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            reorg_lookback_depth: 256,
            reset_retry_budget: 5,
            reset_backoff_base: Duration::from_millis(500),
            reset_timeout: Duration::from_secs(10),
            l1_poll_interval: Duration::from_secs(2),
            l1_finalized_poll_interval: Duration::from_secs(47),
            safety_check_interval: Duration::from_secs(2),
            l1_history_depth: 64,
            transient_retry_budget: 3,
        }
    }
}

impl InteropValidator for Config {
    fn validate_interop_timestamps(
        &self,
        initiating_chain_id: ChainId,
        initiating_timestamp: u64,
        executing_chain_id: ChainId,
        executing_timestamp: u64,
        timeout: Option<u64>,
    ) -> Result<(), InteropValidationError> {
        if !self.rollup_config_set.is_post_interop(initiating_chain_id, initiating_timestamp) ||
            !self.rollup_config_set.is_post_interop(executing_chain_id, executing_timestamp)
        {
            return Err(InteropValidationError::InteropNotEnabled);
        }

        if initiating_timestamp > executing_timestamp {
            return Err(InteropValidationError::InvalidTimestampInvariant {
                initiating: initiating_timestamp,
                executing: executing_timestamp,
            });
        }

        // The message must still be within its expiry window at `executing + timeout`.
        let expiry_window = self.dependency_set.get_message_expiry_window();
        let expires_at = initiating_timestamp.saturating_add(expiry_window);
        let execution_deadline = executing_timestamp.saturating_add(timeout.unwrap_or(0));

        if expires_at < execution_deadline {
            return Err(InteropValidationError::InvalidInteropTimestamp(executing_timestamp));
        }

        Ok(())
    }

    fn is_post_interop(&self, chain_id: ChainId, timestamp: u64) -> bool {
        self.rollup_config_set.is_post_interop(chain_id, timestamp)
    }

    fn is_interop_activation_block(&self, chain_id: ChainId, block: BlockRef) -> bool {
        self.rollup_config_set.is_interop_activation_block(chain_id, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RollupConfig;
    use std::collections::HashMap;

    fn mock_rollup_config_set() -> RollupConfigSet {
        let chain1 =
            RollupConfig { genesis: Default::default(), block_time: 2, interop_time: Some(100) };
        let chain2 =
            RollupConfig { genesis: Default::default(), block_time: 2, interop_time: Some(105) };
        let mut config_set = HashMap::<ChainId, RollupConfig>::new();
        config_set.insert(1, chain1);
        config_set.insert(2, chain2);

        RollupConfigSet { rollups: config_set }
    }

    fn mock_config() -> Config {
        Config {
            l1_rpc: Default::default(),
            managed_nodes: vec![],
            datadir: PathBuf::new(),
            rpc_addr: SocketAddr::from(([127, 0, 0, 1], 8545)),
            enable_admin_api: false,
            dependency_set: DependencySet {
                dependencies: Default::default(),
                override_message_expiry_window: Some(10),
            },
            rollup_config_set: mock_rollup_config_set(),
            tuning: Tuning::default(),
        }
    }

    #[test]
    fn test_valid_case() {
        let cfg = mock_config();
        assert_eq!(cfg.validate_interop_timestamps(1, 200, 2, 202, None), Ok(()));
    }

    #[test]
    fn test_valid_with_timeout() {
        let cfg = mock_config();
        assert_eq!(cfg.validate_interop_timestamps(1, 200, 2, 202, Some(5)), Ok(()));
    }

    #[test]
    fn test_chain_id_doesnt_exist() {
        let cfg = mock_config();
        let res = cfg.validate_interop_timestamps(1, 200, 3, 215, Some(20));
        assert_eq!(res, Err(InteropValidationError::InteropNotEnabled));
    }

    #[test]
    fn test_interop_not_enabled_chain1() {
        let cfg = mock_config();
        let res = cfg.validate_interop_timestamps(1, 100, 2, 215, Some(20));
        assert_eq!(res, Err(InteropValidationError::InteropNotEnabled));
    }

    #[test]
    fn test_invalid_timestamp_invariant() {
        let cfg = mock_config();
        let res = cfg.validate_interop_timestamps(1, 200, 2, 195, Some(20));
        assert_eq!(
            res,
            Err(InteropValidationError::InvalidTimestampInvariant {
                initiating: 200,
                executing: 195
            })
        );
    }

    #[test]
    fn test_expired_message_with_timeout() {
        let cfg = mock_config();
        let res = cfg.validate_interop_timestamps(1, 200, 2, 205, Some(20));
        assert_eq!(res, Err(InteropValidationError::InvalidInteropTimestamp(205)));
    }

    #[test]
    fn test_expired_message_without_timeout() {
        let cfg = mock_config();
        let res = cfg.validate_interop_timestamps(1, 200, 2, 215, None);
        assert_eq!(res, Err(InteropValidationError::InvalidInteropTimestamp(215)));
    }

    #[test]
    fn test_deserialize_with_default_tuning() {
        let cfg: Config = serde_json::from_str(
            r#"{
                "l1_rpc": "http://localhost:8545",
                "managed_nodes": [{
                    "url": "ws://localhost:9545",
                    "jwt_secret": "0x2e0ab4a1b0a0d0c9a1e6a7e3bb0f0be1a2da71f8c1c4bde3c9ab4a8e4fe01f3d",
                    "event_delivery": {"poll": {"interval": "250ms"}}
                }],
                "datadir": "/tmp/supervisor",
                "rpc_addr": "127.0.0.1:8545",
                "dependency_set": {"dependencies": {"10": {}}},
                "rollup_config_set": {},
                "tuning": {"reorg_lookback_depth": 32, "reset_timeout": "3s"}
            }"#,
        )
        .unwrap();

        assert!(!cfg.enable_admin_api);
        assert_eq!(cfg.managed_nodes.len(), 1);
        assert_eq!(cfg.tuning.reorg_lookback_depth, 32);
        assert_eq!(cfg.tuning.reset_timeout, Duration::from_secs(3));
        assert_eq!(cfg.tuning.reset_retry_budget, 5);
        assert_eq!(cfg.tuning.l1_finalized_poll_interval, Duration::from_secs(47));
        assert_eq!(cfg.dependency_set.get_message_expiry_window(), 604_800);
    }
}
