//! Configuration for the finality engine.

use serde::{Deserialize, Serialize};
use tidemark_types::BlockHeight;

/// Configuration for a [`crate::BftState`] instance.
///
/// The thresholds are stored, not recomputed: a chain variant that wants a
/// different pre-vote or pre-commit bar sets the field explicitly instead of
/// patching the formula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BftConfig {
    /// Number of validators in the active set.
    pub active_validators: u32,

    /// Finality checkpoint the engine starts from (0 for a fresh chain).
    pub finalized_height: BlockHeight,

    /// Pre-votes required to confirm a height.
    pub pre_vote_threshold: u32,

    /// Pre-commits required to finalize a height.
    pub pre_commit_threshold: u32,

    /// Trailing headers required before pre-commit bookkeeping activates,
    /// and the reach of a single header's pre-commits.
    pub processing_threshold: usize,

    /// Window capacity; older headers are evicted beyond this.
    pub max_headers: usize,
}

impl BftConfig {
    /// Create a config for the given active validator count using the
    /// standard derivations: thresholds of `floor(2N/3) + 1`, a processing
    /// threshold of `3N`, and a window of five processing thresholds.
    pub fn new(active_validators: u32) -> Self {
        let threshold = active_validators * 2 / 3 + 1;
        let processing_threshold = active_validators as usize * 3;
        Self {
            active_validators,
            finalized_height: BlockHeight::GENESIS,
            pre_vote_threshold: threshold,
            pre_commit_threshold: threshold,
            processing_threshold,
            max_headers: processing_threshold * 5,
        }
    }

    /// Same derivations, starting from a persisted finality checkpoint.
    pub fn with_finalized_height(active_validators: u32, finalized_height: BlockHeight) -> Self {
        Self {
            finalized_height,
            ..Self::new(active_validators)
        }
    }
}
