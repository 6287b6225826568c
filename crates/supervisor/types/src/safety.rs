//! Safety levels a block moves through.

use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Safety level of a block.
///
/// Levels are totally ordered: a block reaches a level only after it reached every lower one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum SafetyLevel {
    /// Produced or received by the chain, not cross-validated.
    #[serde(rename = "unsafe")]
    LocalUnsafe,
    /// Unsafe block whose interop dependencies are cross-unsafe.
    #[serde(rename = "cross-unsafe")]
    CrossUnsafe,
    /// Derived from L1 data.
    #[serde(rename = "local-safe")]
    LocalSafe,
    /// Local-safe block whose interop dependencies are cross-safe.
    #[serde(rename = "safe")]
    CrossSafe,
    /// L1 origin reached L1 finality.
    #[serde(rename = "finalized")]
    Finalized,
}

impl SafetyLevel {
    /// All levels, lowest first.
    pub const ALL: [Self; 5] =
        [Self::LocalUnsafe, Self::CrossUnsafe, Self::LocalSafe, Self::CrossSafe, Self::Finalized];

    /// Returns the level directly below this one, if any.
    pub const fn lower(&self) -> Option<Self> {
        match self {
            Self::LocalUnsafe => None,
            Self::CrossUnsafe => Some(Self::LocalUnsafe),
            Self::LocalSafe => Some(Self::CrossUnsafe),
            Self::CrossSafe => Some(Self::LocalSafe),
            Self::Finalized => Some(Self::CrossSafe),
        }
    }

    /// Canonical string form, matching the JSON representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LocalUnsafe => "unsafe",
            Self::CrossUnsafe => "cross-unsafe",
            Self::LocalSafe => "local-safe",
            Self::CrossSafe => "safe",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error when parsing a [`SafetyLevel`] from a string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid safety level: {0}")]
pub struct SafetyLevelParseError(pub String);

impl FromStr for SafetyLevel {
    type Err = SafetyLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unsafe" | "local-unsafe" => Ok(Self::LocalUnsafe),
            "cross-unsafe" | "crossunsafe" => Ok(Self::CrossUnsafe),
            "local-safe" | "localsafe" => Ok(Self::LocalSafe),
            "safe" | "cross-safe" => Ok(Self::CrossSafe),
            "finalized" => Ok(Self::Finalized),
            other => Err(SafetyLevelParseError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        assert!(SafetyLevel::LocalUnsafe < SafetyLevel::CrossUnsafe);
        assert!(SafetyLevel::CrossUnsafe < SafetyLevel::LocalSafe);
        assert!(SafetyLevel::LocalSafe < SafetyLevel::CrossSafe);
        assert!(SafetyLevel::CrossSafe < SafetyLevel::Finalized);
        assert!(SafetyLevel::ALL.is_sorted());
    }

    #[test]
    fn test_lower_level() {
        assert_eq!(SafetyLevel::LocalUnsafe.lower(), None);
        assert_eq!(SafetyLevel::CrossSafe.lower(), Some(SafetyLevel::LocalSafe));
        assert_eq!(SafetyLevel::Finalized.lower(), Some(SafetyLevel::CrossSafe));
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&SafetyLevel::CrossSafe).unwrap(), r#""safe""#);
        assert_eq!(
            serde_json::from_str::<SafetyLevel>(r#""cross-unsafe""#).unwrap(),
            SafetyLevel::CrossUnsafe
        );
        assert!(serde_json::from_str::<SafetyLevel>(r#""invalid""#).is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("unsafe".parse::<SafetyLevel>().unwrap(), SafetyLevel::LocalUnsafe);
        assert_eq!("localsafe".parse::<SafetyLevel>().unwrap(), SafetyLevel::LocalSafe);
        assert!("safe ".parse::<SafetyLevel>().is_err());
    }
}
