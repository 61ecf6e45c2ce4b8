//! Block header type consumed by the finality engine.

use crate::{BlockHeight, BlockId, GeneratorKey, Round};
use serde::{Deserialize, Serialize};

/// Block header containing the consensus metadata the finality engine needs.
///
/// A header is both a chain element and an implicit vote: by forging at
/// `height` while claiming `prevoted_confirmed_upto_height`, the producer
/// commits to a specific view of the chain. `max_height_previously_forged`
/// ties consecutive headers from the same validator together so the engine
/// can detect a validator building on two branches at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Opaque block identifier.
    pub id: BlockId,

    /// Height of this block in the chain (first block = 1).
    pub height: BlockHeight,

    /// Validator that produced this header.
    pub generator: GeneratorKey,

    /// Height of the previous header forged by the same validator,
    /// `BlockHeight(0)` if this is its first.
    pub max_height_previously_forged: BlockHeight,

    /// The pre-voted-confirmed height as seen by the producer at forge time.
    pub prevoted_confirmed_upto_height: BlockHeight,

    /// Round since which the producer has been in the active validator set,
    /// if known. Limits how far back its votes may reach.
    pub active_since_round: Option<Round>,
}

impl BlockHeader {
    /// Whether the header contradicts itself by claiming to have previously
    /// forged at or above its own height. Such a header carries no votes.
    pub fn is_contradicting(&self) -> bool {
        self.max_height_previously_forged >= self.height
    }

    /// Lowest height this producer may vote for, from its activation round.
    ///
    /// Returns height 1 when the activation round is unknown.
    pub fn min_active_height(&self, active_validators: u32) -> BlockHeight {
        match self.active_since_round {
            Some(round) => round.first_height(active_validators),
            None => BlockHeight(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(height: u64, previously_forged: u64) -> BlockHeader {
        BlockHeader {
            id: BlockId::from_bytes(&height.to_le_bytes()),
            height: BlockHeight(height),
            generator: GeneratorKey::from_seed(b"v0"),
            max_height_previously_forged: BlockHeight(previously_forged),
            prevoted_confirmed_upto_height: BlockHeight(0),
            active_since_round: None,
        }
    }

    #[test]
    fn test_contradicting_header() {
        assert!(!header(5, 4).is_contradicting());
        assert!(!header(5, 0).is_contradicting());
        assert!(header(5, 5).is_contradicting());
        assert!(header(5, 9).is_contradicting());
    }

    #[test]
    fn test_min_active_height() {
        let mut h = header(30, 19);
        assert_eq!(h.min_active_height(11), BlockHeight(1));

        h.active_since_round = Some(Round(3));
        assert_eq!(h.min_active_height(11), BlockHeight(23));
    }
}
