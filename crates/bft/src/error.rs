//! Error types for the finality engine.

use thiserror::Error;
use tidemark_types::{BlockHeight, GeneratorKey};

/// Errors raised while validating or verifying a block header.
///
/// Every variant is deterministic and fatal to the candidate block: the
/// caller must reject the block, and may additionally report the producing
/// validator as misbehaving for the fork-choice variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BftError {
    /// Header is structurally malformed.
    #[error("Invalid block header: {reason}")]
    InvalidHeader {
        /// What was malformed.
        reason: &'static str,
    },

    /// Header height does not extend the window by exactly one.
    #[error("Non-sequential block header: expected height {expected}, got {actual}")]
    NonSequentialHeight {
        /// Height the window expects next.
        expected: BlockHeight,
        /// Height the header carries.
        actual: BlockHeight,
    },

    /// Validator's claimed previous height does not match the header it
    /// actually forged last — it moved to a different chain.
    #[error(
        "Violation of fork choice rule: validator {generator} last forged at \
         {last_forged} but claims {claimed} as previously forged"
    )]
    MovedToDifferentChain {
        /// Offending validator.
        generator: GeneratorKey,
        /// Height of its latest header in the window.
        last_forged: BlockHeight,
        /// Its claimed `max_height_previously_forged`.
        claimed: BlockHeight,
    },

    /// Validator forged at or below a height it already forged, so its
    /// claimed forging ranges overlap.
    #[error(
        "Violates disjointness condition: validator {generator} already forged \
         at {last_forged}, new header at {height}"
    )]
    ViolatesDisjointness {
        /// Offending validator.
        generator: GeneratorKey,
        /// Height of its latest header in the window.
        last_forged: BlockHeight,
        /// Height of the rejected header.
        height: BlockHeight,
    },

    /// Validator's claimed pre-voted height went backwards relative to its
    /// own previous header; the branch with the largest pre-voted height
    /// wins.
    #[error(
        "Lower chain branch: validator {generator} previously claimed pre-voted \
         height {previous}, new header claims {claimed}"
    )]
    LowerChainBranch {
        /// Offending validator.
        generator: GeneratorKey,
        /// Pre-voted height claimed by its previous header.
        previous: BlockHeight,
        /// Pre-voted height claimed by the rejected header.
        claimed: BlockHeight,
    },

    /// Header's claimed pre-voted height disagrees with the locally computed
    /// value — either a malicious header or a local desync.
    #[error(
        "Consensus disagreement: header claims pre-voted height {claimed}, \
         locally computed {computed}"
    )]
    ConsensusDisagreement {
        /// Pre-voted height claimed by the header.
        claimed: BlockHeight,
        /// Pre-voted height this engine computed.
        computed: BlockHeight,
    },
}
