//! Value types shared by several tables.

use derive_more::{Deref, DerefMut};
use reth_codecs::Compact;
use serde::{Deserialize, Serialize};

/// A list of block numbers.
#[derive(
    Deref, DerefMut, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, Compact,
)]
pub struct U64List(pub Vec<u64>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u64list_compact() {
        for list in [U64List::default(), U64List(vec![10, 20, 30])] {
            let mut buffer = Vec::new();
            let written = list.to_compact(&mut buffer);
            assert_eq!(written, buffer.len());

            let (decoded, rest) = U64List::from_compact(&buffer, written);
            assert_eq!(decoded, list);
            assert!(rest.is_empty());
        }
    }
}
