//! End-to-end finality scenarios driven through the public engine API.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tidemark_bft::{BftConfig, BftError, BftState};
use tidemark_test_helpers::{block_id, HonestChain};
use tidemark_types::{BlockHeader, BlockHeight};

/// Drive an honest chain, feeding the engine's own pre-voted height back
/// into each forged header the way a live forger would.
fn forge_honest(bft: &mut BftState, chain: &mut HonestChain) {
    let header = chain.forge(bft.pre_voted_confirmed_height());
    bft.add_block_header(header).expect("honest header accepted");
}

#[test]
fn test_four_validator_reference_trace() {
    // 4 validators: thresholds 3, processing window 12. The honest steady
    // state confirms pre-votes two heights behind the tip and finalizes
    // five behind, once a full processing window has been seen.
    let mut bft = BftState::new(BftConfig::new(4));
    let mut chain = HonestChain::new(4);

    for h in 1..=40u64 {
        forge_honest(&mut bft, &mut chain);

        let expected_pre_voted = if h >= 3 { h - 2 } else { 0 };
        let expected_finalized = if h >= 14 { h - 5 } else { 0 };
        assert_eq!(
            bft.pre_voted_confirmed_height(),
            BlockHeight(expected_pre_voted),
            "pre-voted height after block {h}"
        );
        assert_eq!(
            bft.finalized_height(),
            BlockHeight(expected_finalized),
            "finalized height after block {h}"
        );
    }

    // Exact tally fixture at the tip.
    let tally = bft.tally();
    for j in 1..=38u64 {
        assert_eq!(tally.pre_vote_count(BlockHeight(j)), 3, "pre-votes at {j}");
    }
    assert_eq!(tally.pre_vote_count(BlockHeight(39)), 2);
    assert_eq!(tally.pre_vote_count(BlockHeight(40)), 1);

    // Pre-commits ramp up at the activation edge and trail the tip.
    assert_eq!(tally.pre_commit_count(BlockHeight(1)), 1);
    assert_eq!(tally.pre_commit_count(BlockHeight(2)), 2);
    for j in 3..=35u64 {
        assert_eq!(tally.pre_commit_count(BlockHeight(j)), 3, "pre-commits at {j}");
    }
    assert_eq!(tally.pre_commit_count(BlockHeight(36)), 2);
    assert_eq!(tally.pre_commit_count(BlockHeight(37)), 1);
    assert_eq!(tally.pre_commit_count(BlockHeight(38)), 0);
}

#[test]
fn test_eleven_validator_branch_switch_scenario() {
    // 11 validators rotate for three rounds; partway through round three,
    // four of them try to contribute headers from a competing branch. Every
    // such header is rejected and the tallies match the honest-only trace.
    let mut bft = BftState::new(BftConfig::new(11));
    let mut chain = HonestChain::new(11);

    // Rounds 1 and 2: heights 1..=22.
    for _ in 1..=22u64 {
        forge_honest(&mut bft, &mut chain);
    }
    assert_eq!(bft.pre_voted_confirmed_height(), BlockHeight(15));
    assert_eq!(bft.finalized_height(), BlockHeight(0));

    // Round 3, honest part: validators 0..=6 forge heights 23..=29.
    for _ in 23..=29u64 {
        forge_honest(&mut bft, &mut chain);
    }
    assert_eq!(bft.pre_voted_confirmed_height(), BlockHeight(22));

    let validators = chain.validators().to_vec();
    let pre_voted = bft.pre_voted_confirmed_height();

    // Validator 7 (last forged at 19) claims the chain tip as its previous
    // block: it moved to a different chain.
    let err = bft
        .add_block_header(BlockHeader {
            id: block_id(30, &validators[7]),
            height: BlockHeight(30),
            generator: validators[7],
            max_height_previously_forged: BlockHeight(29),
            prevoted_confirmed_upto_height: pre_voted,
            active_since_round: None,
        })
        .unwrap_err();
    assert_eq!(
        err,
        BftError::MovedToDifferentChain {
            generator: validators[7],
            last_forged: BlockHeight(19),
            claimed: BlockHeight(29),
        }
    );

    // Validator 8 (last forged at 20) pretends it never forged at all.
    let err = bft
        .add_block_header(BlockHeader {
            id: block_id(30, &validators[8]),
            height: BlockHeight(30),
            generator: validators[8],
            max_height_previously_forged: BlockHeight(0),
            prevoted_confirmed_upto_height: pre_voted,
            active_since_round: None,
        })
        .unwrap_err();
    assert_eq!(
        err,
        BftError::MovedToDifferentChain {
            generator: validators[8],
            last_forged: BlockHeight(20),
            claimed: BlockHeight(0),
        }
    );

    // Validator 9 re-forges at height 21, which it already produced.
    let err = bft
        .add_block_header(BlockHeader {
            id: block_id(21, &validators[9]),
            height: BlockHeight(21),
            generator: validators[9],
            max_height_previously_forged: BlockHeight(20),
            prevoted_confirmed_upto_height: pre_voted,
            active_since_round: None,
        })
        .unwrap_err();
    assert_eq!(
        err,
        BftError::ViolatesDisjointness {
            generator: validators[9],
            last_forged: BlockHeight(21),
            height: BlockHeight(21),
        }
    );

    // Validator 10 extends its own chain but claims a lower pre-voted
    // height than its previous header did.
    let err = bft
        .add_block_header(BlockHeader {
            id: block_id(30, &validators[10]),
            height: BlockHeight(30),
            generator: validators[10],
            max_height_previously_forged: BlockHeight(22),
            prevoted_confirmed_upto_height: BlockHeight(10),
            active_since_round: None,
        })
        .unwrap_err();
    assert_eq!(
        err,
        BftError::LowerChainBranch {
            generator: validators[10],
            previous: BlockHeight(14),
            claimed: BlockHeight(10),
        }
    );

    // The rejections left the engine untouched.
    assert_eq!(bft.headers().len(), 29);
    assert_eq!(bft.pre_voted_confirmed_height(), BlockHeight(22));
    assert_eq!(bft.finalized_height(), BlockHeight(0));

    // Reference tallies: every height through 22 is pre-voted by a full
    // complement of 8 distinct validators; the trailing heights taper off.
    // Pre-commits never started: the window is one round short of the
    // processing threshold.
    let tally = bft.tally();
    for j in 1..=22u64 {
        assert_eq!(tally.pre_vote_count(BlockHeight(j)), 8, "pre-votes at {j}");
    }
    for j in 23..=29u64 {
        assert_eq!(
            tally.pre_vote_count(BlockHeight(j)),
            (30 - j) as u32,
            "pre-votes at {j}"
        );
    }
    assert_eq!(tally.pre_vote_count(BlockHeight(30)), 0);
    for j in 1..=29u64 {
        assert_eq!(tally.pre_commit_count(BlockHeight(j)), 0, "pre-commits at {j}");
    }

    // Rebuilding from the surviving window reproduces the same state.
    bft.recompute();
    assert_eq!(bft.pre_voted_confirmed_height(), BlockHeight(22));
    assert_eq!(bft.finalized_height(), BlockHeight(0));
    for j in 1..=22u64 {
        assert_eq!(bft.tally().pre_vote_count(BlockHeight(j)), 8);
    }
}

#[test]
fn test_recompute_matches_incremental_path() {
    let mut bft = BftState::new(BftConfig::new(4));
    let mut chain = HonestChain::new(4);

    for _ in 1..=40u64 {
        forge_honest(&mut bft, &mut chain);
    }

    let finalized = bft.finalized_height();
    let pre_voted = bft.pre_voted_confirmed_height();
    let pre_votes: Vec<u32> = (1..=40)
        .map(|j| bft.tally().pre_vote_count(BlockHeight(j)))
        .collect();
    let pre_commits: Vec<u32> = (1..=40)
        .map(|j| bft.tally().pre_commit_count(BlockHeight(j)))
        .collect();

    bft.recompute();

    assert_eq!(bft.finalized_height(), finalized);
    assert_eq!(bft.pre_voted_confirmed_height(), pre_voted);
    for j in 1..=40usize {
        assert_eq!(
            bft.tally().pre_vote_count(BlockHeight(j as u64)),
            pre_votes[j - 1],
            "pre-votes at {j}"
        );
        assert_eq!(
            bft.tally().pre_commit_count(BlockHeight(j as u64)),
            pre_commits[j - 1],
            "pre-commits at {j}"
        );
    }
}

#[test]
fn test_window_bound_with_default_config() {
    // 11 validators, window capacity 165: drive well past capacity and the
    // window stays bounded with the oldest headers evicted first.
    let mut bft = BftState::new(BftConfig::new(11));
    let mut chain = HonestChain::new(11);
    let max_headers = bft.config().max_headers;
    assert_eq!(max_headers, 165);

    for h in 1..=400u64 {
        forge_honest(&mut bft, &mut chain);
        assert!(bft.headers().len() <= max_headers, "window bound after {h}");
    }

    assert_eq!(bft.headers().len(), max_headers);
    assert_eq!(
        bft.headers().first().unwrap().height,
        BlockHeight(400 - max_headers as u64 + 1)
    );
    assert_eq!(bft.headers().last().unwrap().height, BlockHeight(400));
    // Finality is live and trails the confirmed tip.
    assert!(bft.finalized_height() > BlockHeight(0));
    assert!(bft.finalized_height() <= bft.pre_voted_confirmed_height());
}

#[test]
fn test_randomized_monotonicity_and_recompute() {
    // Seeded generator: the runs are random-looking but reproducible.
    let mut rng = ChaCha8Rng::seed_from_u64(0x71de_3a2b);

    for case in 0..10 {
        let validator_count: u32 = rng.gen_range(2..=8);
        let mut bft = BftState::new(BftConfig::new(validator_count));
        let mut chain = HonestChain::new(validator_count);

        let mut last_finalized = bft.finalized_height();
        let mut last_pre_voted = bft.pre_voted_confirmed_height();

        // Stay under the window capacity so the replayed window is the
        // complete history.
        let blocks = validator_count as u64 * 12;
        for _ in 0..blocks {
            // Occasionally interleave a fork attempt from the scheduled
            // producer; it must be rejected without touching the state.
            if rng.gen_bool(0.2) && chain.next_producer_last_forged() > BlockHeight(0) {
                let bad = BlockHeader {
                    id: block_id(chain.next_height().0, &chain.next_producer()),
                    height: chain.next_height(),
                    generator: chain.next_producer(),
                    max_height_previously_forged: chain.next_producer_last_forged().next(),
                    prevoted_confirmed_upto_height: bft.pre_voted_confirmed_height(),
                    active_since_round: None,
                };
                let before = bft.headers().len();
                assert!(matches!(
                    bft.add_block_header(bad),
                    Err(BftError::MovedToDifferentChain { .. })
                ));
                assert_eq!(bft.headers().len(), before);
            }

            forge_honest(&mut bft, &mut chain);

            assert!(
                bft.finalized_height() >= last_finalized,
                "finalized regressed in case {case}"
            );
            assert!(
                bft.pre_voted_confirmed_height() >= last_pre_voted,
                "pre-voted regressed in case {case}"
            );
            assert!(bft.finalized_height() <= bft.pre_voted_confirmed_height());
            last_finalized = bft.finalized_height();
            last_pre_voted = bft.pre_voted_confirmed_height();
        }

        let finalized = bft.finalized_height();
        let pre_voted = bft.pre_voted_confirmed_height();
        bft.recompute();
        assert_eq!(bft.finalized_height(), finalized, "case {case}");
        assert_eq!(bft.pre_voted_confirmed_height(), pre_voted, "case {case}");
    }
}
