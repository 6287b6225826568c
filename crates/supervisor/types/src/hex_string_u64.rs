use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// A `u64` RPC parameter encoded as a hex quantity (`"0x1a"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexStringU64(#[serde(with = "alloy_serde::quantity")] pub u64);

impl From<HexStringU64> for u64 {
    fn from(value: HexStringU64) -> Self {
        value.0
    }
}
