//! BFT finality and fork-choice engine.
//!
//! This crate tracks chain finality for a delegated-proof-of-stake chain.
//! Validators take turns forging block headers; each header doubles as an
//! implicit vote on the producer's view of the chain. [`BftState`] keeps a
//! sliding window of recent headers, tallies the pre-votes and pre-commits
//! those headers imply, and exposes two heights to the surrounding block
//! pipeline:
//!
//! - `pre_voted_confirmed_height` — the highest height enough validators
//!   have pre-voted,
//! - `finalized_height` — the highest height enough validators have
//!   pre-committed; blocks at or below it are irreversible.
//!
//! # Architecture
//!
//! The engine is a synchronous state machine:
//!
//! - **Synchronous**: no async, no `.await`, no timers
//! - **Deterministic**: same header sequence, same outputs
//! - **No I/O**: headers come in as values, heights go out as values
//!
//! Exactly one block-processing pipeline feeds headers through
//! [`BftState::add_block_header`]; callers in a multi-threaded node must
//! serialize access themselves. A rejected header means the candidate block
//! must be rejected outright — nothing here retries.

mod config;
mod error;
mod header_list;
mod state;
mod tally;

pub use config::BftConfig;
pub use error::BftError;
pub use header_list::HeaderList;
pub use state::BftState;
pub use tally::VoteTally;
