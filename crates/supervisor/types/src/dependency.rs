//! The set of chains supervised together.

use alloy_primitives::{ChainId, map::HashMap};
use serde::{Deserialize, Serialize};

/// Default time, in seconds, during which an initiating message may be executed.
pub const MESSAGE_EXPIRY_WINDOW: u64 = 7 * 24 * 60 * 60;

/// Per-chain entry of a [`DependencySet`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDependency {}

/// The chains whose interop messages are validated jointly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySet {
    /// Member chains.
    pub dependencies: HashMap<ChainId, ChainDependency>,

    /// Replaces [`MESSAGE_EXPIRY_WINDOW`] when set to a non-zero value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_message_expiry_window: Option<u64>,
}

impl DependencySet {
    /// Returns the message expiry window in effect.
    pub const fn get_message_expiry_window(&self) -> u64 {
        match self.override_message_expiry_window {
            Some(window) if window > 0 => window,
            _ => MESSAGE_EXPIRY_WINDOW,
        }
    }

    /// Returns `true` if the chain is a member of the set.
    pub fn contains(&self, chain_id: ChainId) -> bool {
        self.dependencies.contains_key(&chain_id)
    }

    /// Returns the member chain ids in ascending order.
    pub fn chain_ids(&self) -> Vec<ChainId> {
        let mut ids: Vec<_> = self.dependencies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_expiry_window() {
        let mut set = DependencySet::default();
        assert_eq!(set.get_message_expiry_window(), 604_800);

        set.override_message_expiry_window = Some(0);
        assert_eq!(set.get_message_expiry_window(), MESSAGE_EXPIRY_WINDOW);

        set.override_message_expiry_window = Some(3600);
        assert_eq!(set.get_message_expiry_window(), 3600);
    }

    #[test]
    fn test_dependency_set_json() {
        let set: DependencySet = serde_json::from_value(json!({
            "dependencies": { "10": {}, "8453": {} },
            "overrideMessageExpiryWindow": 120
        }))
        .unwrap();

        assert_eq!(set.chain_ids(), vec![10, 8453]);
        assert!(set.contains(10));
        assert!(!set.contains(1));
        assert_eq!(set.get_message_expiry_window(), 120);
    }
}
