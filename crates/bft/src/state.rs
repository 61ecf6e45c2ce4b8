//! BFT finality engine state machine.

use crate::{BftConfig, BftError, HeaderList, VoteTally};
use tidemark_types::{BlockHeader, BlockHeight};
use tracing::{debug, info, warn};

/// Finality engine for one chain instance.
///
/// Owns the header window and the vote tallies derived from it, and exposes
/// the two heights the block pipeline acts on. One instance lives for the
/// process lifetime of the node; after a restart or resync the caller
/// refills the window and calls [`BftState::recompute`].
#[derive(Debug, Clone)]
pub struct BftState {
    config: BftConfig,
    headers: HeaderList,
    tally: VoteTally,
    finalized_height: BlockHeight,
    pre_voted_confirmed_height: BlockHeight,
}

impl BftState {
    /// Create an engine from the node's consensus configuration.
    pub fn new(config: BftConfig) -> Self {
        Self {
            headers: HeaderList::new(config.max_headers),
            tally: VoteTally::new(),
            finalized_height: config.finalized_height,
            // A finalized height is by definition pre-voted-confirmed.
            pre_voted_confirmed_height: config.finalized_height,
            config,
        }
    }

    /// Highest height considered irreversible.
    pub fn finalized_height(&self) -> BlockHeight {
        self.finalized_height
    }

    /// Highest height enough validators have pre-voted.
    pub fn pre_voted_confirmed_height(&self) -> BlockHeight {
        self.pre_voted_confirmed_height
    }

    /// The header window.
    pub fn headers(&self) -> &HeaderList {
        &self.headers
    }

    /// The current vote tallies (derived state, read-only).
    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    /// The configuration this engine was built with.
    pub fn config(&self) -> &BftConfig {
        &self.config
    }

    /// Whether enough headers have been observed for the engine's pre-voted
    /// height to be authoritative (and for pre-commits to count).
    pub fn is_bookkeeping_active(&self) -> bool {
        self.headers.len() >= self.config.processing_threshold
    }

    /// Structural validation of a header, independent of engine state.
    pub fn validate_block_header(header: &BlockHeader) -> Result<(), BftError> {
        if header.height < BlockHeight(1) {
            return Err(BftError::InvalidHeader {
                reason: "height must be at least 1",
            });
        }
        if header.id.is_zero() {
            return Err(BftError::InvalidHeader {
                reason: "block id must not be zero",
            });
        }
        if header.generator.is_zero() {
            return Err(BftError::InvalidHeader {
                reason: "generator key must not be zero",
            });
        }
        if header.is_contradicting() {
            return Err(BftError::InvalidHeader {
                reason: "previously forged height at or above own height",
            });
        }
        Ok(())
    }

    /// Accept one block header: validate, verify fork choice, append, and
    /// update the tracked heights.
    ///
    /// Returns `&mut Self` so accepted headers chain with `?`. On any error
    /// the engine is unchanged and the caller must reject the candidate
    /// block.
    pub fn add_block_header(&mut self, header: BlockHeader) -> Result<&mut Self, BftError> {
        Self::validate_block_header(&header)?;
        self.verify_block_headers(&header)?;
        self.verify_sequence(&header)?;

        debug!(
            height = header.height.0,
            generator = %header.generator,
            prevoted_claim = header.prevoted_confirmed_upto_height.0,
            "Block header accepted"
        );

        self.headers.add(header);
        self.apply_latest_votes();
        Ok(self)
    }

    /// Rebuild tallies and both heights from the current window.
    ///
    /// Used after a restart or resync where the incremental state was lost
    /// but headers are still available. Replays the window through the same
    /// per-header path as the incremental updates, so the result is
    /// identical to having added the same headers one by one.
    pub fn recompute(&mut self) {
        self.tally.reset();
        self.finalized_height = self.config.finalized_height;
        self.pre_voted_confirmed_height = self.config.finalized_height;

        let replay: Vec<BlockHeader> = self.headers.items().cloned().collect();
        for (idx, header) in replay.iter().enumerate() {
            self.tally.apply(
                header,
                &self.headers,
                idx + 1,
                self.finalized_height,
                &self.config,
            );
            self.update_heights();
        }
        self.prune_tally();

        info!(
            window = self.headers.len(),
            finalized = self.finalized_height.0,
            pre_voted = self.pre_voted_confirmed_height.0,
            "Recomputed finality state from header window"
        );
    }

    /// Fork-choice verification of a header against previous validator
    /// behavior.
    fn verify_block_headers(&self, header: &BlockHeader) -> Result<(), BftError> {
        // Once a full processing window has been observed, the engine's own
        // pre-voted height is authoritative and the header must agree.
        if self.is_bookkeeping_active()
            && header.prevoted_confirmed_upto_height != self.pre_voted_confirmed_height
        {
            warn!(
                claimed = header.prevoted_confirmed_upto_height.0,
                computed = self.pre_voted_confirmed_height.0,
                generator = %header.generator,
                "Header disagrees with locally computed pre-voted height"
            );
            return Err(BftError::ConsensusDisagreement {
                claimed: header.prevoted_confirmed_upto_height,
                computed: self.pre_voted_confirmed_height,
            });
        }

        // First observation of this validator is trivially valid.
        let Some(prev) = self.headers.header_for_generator(&header.generator) else {
            return Ok(());
        };

        if header.height <= prev.height {
            warn!(
                generator = %header.generator,
                last_forged = prev.height.0,
                height = header.height.0,
                "Validator re-forged at a height it already produced"
            );
            return Err(BftError::ViolatesDisjointness {
                generator: header.generator,
                last_forged: prev.height,
                height: header.height,
            });
        }

        if header.max_height_previously_forged != prev.height {
            warn!(
                generator = %header.generator,
                last_forged = prev.height.0,
                claimed = header.max_height_previously_forged.0,
                "Violation of fork choice rule, validator moved to a different chain"
            );
            return Err(BftError::MovedToDifferentChain {
                generator: header.generator,
                last_forged: prev.height,
                claimed: header.max_height_previously_forged,
            });
        }

        if header.prevoted_confirmed_upto_height < prev.prevoted_confirmed_upto_height {
            warn!(
                generator = %header.generator,
                previous = prev.prevoted_confirmed_upto_height.0,
                claimed = header.prevoted_confirmed_upto_height.0,
                "Validator switched to a branch with a lower pre-voted height"
            );
            return Err(BftError::LowerChainBranch {
                generator: header.generator,
                previous: prev.prevoted_confirmed_upto_height,
                claimed: header.prevoted_confirmed_upto_height,
            });
        }

        Ok(())
    }

    /// Defensive ordering check: the window only ever grows by exactly one
    /// height. The caller's pipeline guarantees this; a gap here means the
    /// pipeline and engine have diverged.
    fn verify_sequence(&self, header: &BlockHeader) -> Result<(), BftError> {
        if let Some(last) = self.headers.last() {
            let expected = last.height.next();
            if header.height != expected {
                return Err(BftError::NonSequentialHeight {
                    expected,
                    actual: header.height,
                });
            }
        }
        Ok(())
    }

    /// Apply the newest header's implied votes and refresh both heights.
    fn apply_latest_votes(&mut self) {
        let window_len = self.headers.len();
        if let Some(header) = self.headers.last() {
            self.tally.apply(
                header,
                &self.headers,
                window_len,
                self.finalized_height,
                &self.config,
            );
        }
        self.update_heights();
        self.prune_tally();
    }

    /// Raise the tracked heights to the current tally candidates. Both are
    /// monotonic: a shrinking window never lowers a published height.
    fn update_heights(&mut self) {
        if let Some(candidate) = self
            .tally
            .highest_pre_voted(self.config.pre_vote_threshold)
        {
            if candidate > self.pre_voted_confirmed_height {
                debug!(
                    height = candidate.0,
                    threshold = self.config.pre_vote_threshold,
                    "Pre-vote threshold reached"
                );
                self.pre_voted_confirmed_height = candidate;
            }
        }

        if let Some(candidate) = self
            .tally
            .highest_pre_committed(self.config.pre_commit_threshold)
        {
            if candidate > self.finalized_height {
                info!(
                    height = candidate.0,
                    threshold = self.config.pre_commit_threshold,
                    "Finalized height advanced"
                );
                self.finalized_height = candidate;
            }
        }
    }

    /// Drop tally entries for heights that fell out of the window.
    fn prune_tally(&mut self) {
        if let Some(first) = self.headers.first() {
            self.tally.prune_below(first.height);
        }
    }
}
