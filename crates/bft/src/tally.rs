//! Pre-vote and pre-commit weight tracking.

use crate::{BftConfig, HeaderList};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use tidemark_types::{BlockHeader, BlockHeight, GeneratorKey};

/// Per-validator high-water marks.
///
/// A tally counts *validators*, not headers, so each validator may
/// contribute at most one pre-vote and one pre-commit per height. The marks
/// record the highest height the validator has been counted for.
#[derive(Debug, Clone, Copy, Default)]
struct ValidatorMarks {
    max_pre_vote_height: u64,
    max_pre_commit_height: u64,
}

/// Height-keyed tallies of implied pre-votes and pre-commits.
///
/// Derived state owned by the engine: rebuilt by `recompute()`, updated
/// incrementally on every accepted header, never persisted.
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    pre_votes: BTreeMap<u64, u32>,
    pre_commits: BTreeMap<u64, u32>,
    validators: IndexMap<GeneratorKey, ValidatorMarks>,
}

impl VoteTally {
    /// Create an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of validators that pre-voted the given height.
    pub fn pre_vote_count(&self, height: BlockHeight) -> u32 {
        self.pre_votes.get(&height.0).copied().unwrap_or(0)
    }

    /// Number of validators that pre-committed the given height.
    pub fn pre_commit_count(&self, height: BlockHeight) -> u32 {
        self.pre_commits.get(&height.0).copied().unwrap_or(0)
    }

    /// Highest height whose pre-vote count meets the threshold.
    pub fn highest_pre_voted(&self, threshold: u32) -> Option<BlockHeight> {
        self.pre_votes
            .iter()
            .rev()
            .find(|(_, &count)| count >= threshold)
            .map(|(&height, _)| BlockHeight(height))
    }

    /// Highest height whose pre-commit count meets the threshold.
    pub fn highest_pre_committed(&self, threshold: u32) -> Option<BlockHeight> {
        self.pre_commits
            .iter()
            .rev()
            .find(|(_, &count)| count >= threshold)
            .map(|(&height, _)| BlockHeight(height))
    }

    /// Apply the votes implied by one header.
    ///
    /// `window` is the header window the engine maintains (already containing
    /// `header`); `window_len` is the effective window length at application
    /// time, which during a replay is the length of the replayed prefix so
    /// that pre-commit activation happens exactly where it did live.
    pub(crate) fn apply(
        &mut self,
        header: &BlockHeader,
        window: &HeaderList,
        window_len: usize,
        finalized_height: BlockHeight,
        config: &BftConfig,
    ) {
        // A header claiming to have previously forged at or above its own
        // height contradicts itself and carries no votes. The live path
        // rejects such headers during schema validation already.
        if header.is_contradicting() {
            return;
        }

        let min_active = header.min_active_height(config.active_validators).0;
        let marks = *self.validators.entry(header.generator).or_default();

        // Pre-commits first, against the tallies as they stood before this
        // header's own pre-votes. Finality is not actionable until a full
        // processing window of headers has been observed.
        let mut new_marks = marks;
        if window_len >= config.processing_threshold {
            let window_floor = header
                .height
                .0
                .saturating_sub(config.processing_threshold as u64)
                + 1;
            let lo = branch_start(header, window, finalized_height)
                .max(marks.max_pre_commit_height + 1)
                .max(window_floor)
                .max(finalized_height.0 + 1)
                .max(min_active);
            let hi = header.prevoted_confirmed_upto_height.0;

            for j in lo..=hi {
                // A validator can only pre-commit a height it has seen reach
                // the pre-vote threshold.
                if self.pre_votes.get(&j).copied().unwrap_or(0) >= config.pre_vote_threshold {
                    *self.pre_commits.entry(j).or_insert(0) += 1;
                    new_marks.max_pre_commit_height = j;
                }
            }
        }

        // Pre-votes: every height from just above the claimed confirmed
        // height (and above anything this validator already voted for) up to
        // the header's own height.
        let claimed = header.prevoted_confirmed_upto_height.0;
        let previously_forged = header.max_height_previously_forged.0;
        let lo = (claimed.max(previously_forged) + 1)
            .max(marks.max_pre_vote_height + 1)
            .max(min_active);
        let hi = header.height.0;

        for j in lo..=hi {
            *self.pre_votes.entry(j).or_insert(0) += 1;
            new_marks.max_pre_vote_height = j;
        }

        self.validators.insert(header.generator, new_marks);
    }

    /// Drop tally entries below the given height.
    ///
    /// Called after window eviction; the engine's monotonic height clamps
    /// make entries for evicted heights irrelevant.
    pub(crate) fn prune_below(&mut self, height: BlockHeight) {
        self.pre_votes = self.pre_votes.split_off(&height.0);
        self.pre_commits = self.pre_commits.split_off(&height.0);
    }

    /// Clear all tallies and per-validator marks.
    pub(crate) fn reset(&mut self) {
        self.pre_votes.clear();
        self.pre_commits.clear();
        self.validators.clear();
    }
}

/// Lowest height on the branch `header`'s producer actually extends.
///
/// Walks the producer's own `max_height_previously_forged` chain backwards
/// while every link is a window header by the same producer. The walk stops
/// at the finalized height; below the stopping point the producer may have
/// been forging on a different branch, so it cannot vouch for those heights.
fn branch_start(header: &BlockHeader, window: &HeaderList, finalized_height: BlockHeight) -> u64 {
    let mut needle = header.max_height_previously_forged.0;
    while needle > finalized_height.0 {
        match window.get(BlockHeight(needle)) {
            Some(prev) if prev.generator == header.generator => {
                needle = prev.max_height_previously_forged.0;
            }
            _ => break,
        }
    }
    needle + 1
}
