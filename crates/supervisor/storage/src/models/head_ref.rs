use interop_supervisor_types::SafetyLevel;
use reth_db::DatabaseError;
use reth_db_api::table;
use serde::{Deserialize, Serialize};

/// Key of [`SafetyHeads`](crate::models::SafetyHeads), one per [`SafetyLevel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SafetyHeadKey {
    /// [`SafetyLevel::LocalUnsafe`].
    LocalUnsafe = 0,
    /// [`SafetyLevel::CrossUnsafe`].
    CrossUnsafe = 1,
    /// [`SafetyLevel::LocalSafe`].
    LocalSafe = 2,
    /// [`SafetyLevel::CrossSafe`].
    CrossSafe = 3,
    /// [`SafetyLevel::Finalized`].
    Finalized = 4,
}

impl table::Encode for SafetyHeadKey {
    type Encoded = [u8; 1];

    fn encode(self) -> Self::Encoded {
        [self as u8]
    }
}

impl table::Decode for SafetyHeadKey {
    fn decode(value: &[u8]) -> Result<Self, DatabaseError> {
        match value.first() {
            Some(0) => Ok(Self::LocalUnsafe),
            Some(1) => Ok(Self::CrossUnsafe),
            Some(2) => Ok(Self::LocalSafe),
            Some(3) => Ok(Self::CrossSafe),
            Some(4) => Ok(Self::Finalized),
            _ => Err(DatabaseError::Decode),
        }
    }
}

impl From<SafetyLevel> for SafetyHeadKey {
    fn from(level: SafetyLevel) -> Self {
        match level {
            SafetyLevel::LocalUnsafe => Self::LocalUnsafe,
            SafetyLevel::CrossUnsafe => Self::CrossUnsafe,
            SafetyLevel::LocalSafe => Self::LocalSafe,
            SafetyLevel::CrossSafe => Self::CrossSafe,
            SafetyLevel::Finalized => Self::Finalized,
        }
    }
}

impl From<SafetyHeadKey> for SafetyLevel {
    fn from(key: SafetyHeadKey) -> Self {
        match key {
            SafetyHeadKey::LocalUnsafe => Self::LocalUnsafe,
            SafetyHeadKey::CrossUnsafe => Self::CrossUnsafe,
            SafetyHeadKey::LocalSafe => Self::LocalSafe,
            SafetyHeadKey::CrossSafe => Self::CrossSafe,
            SafetyHeadKey::Finalized => Self::Finalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reth_db_api::table::{Decode, Encode};

    #[test]
    fn test_key_matches_every_level() {
        for level in SafetyLevel::ALL {
            let key = SafetyHeadKey::from(level);
            let decoded = SafetyHeadKey::decode(&key.encode()).unwrap();
            assert_eq!(SafetyLevel::from(decoded), level);
        }
    }

    #[test]
    fn test_decode_rejects_unknown_key() {
        assert!(SafetyHeadKey::decode(&[]).is_err());
        assert!(SafetyHeadKey::decode(&[u8::MAX]).is_err());
    }
}
