//! Deterministic fixtures for consensus tests.
//!
//! Everything here is reproducible from fixed seeds: validator keys are
//! hashes of their schedule index, block ids are hashes of the producing
//! slot. No clocks, no entropy.

use tidemark_types::{BlockHeader, BlockHeight, BlockId, GeneratorKey, Round};

/// Deterministic key for the validator at a schedule index.
pub fn generator_key(index: u32) -> GeneratorKey {
    let mut seed = *b"validator-00000000";
    seed[10..].copy_from_slice(&format!("{index:08}").as_bytes()[..8]);
    GeneratorKey::from_seed(&seed)
}

/// Deterministic block id for a height/producer pair.
pub fn block_id(height: u64, producer: &GeneratorKey) -> BlockId {
    let mut bytes = Vec::with_capacity(40);
    bytes.extend_from_slice(&height.to_le_bytes());
    bytes.extend_from_slice(producer.as_bytes());
    BlockId::from_bytes(&bytes)
}

/// An honest round-robin forging schedule.
///
/// Validators take turns in index order; each honest header points at the
/// producer's previous height and claims whatever pre-voted-confirmed
/// height the caller observed from the engine. Invalid headers for
/// misbehavior tests are built by hand from [`HonestChain::next_producer`]
/// without advancing the schedule.
#[derive(Debug, Clone)]
pub struct HonestChain {
    validators: Vec<GeneratorKey>,
    last_forged: Vec<u64>,
    next_height: u64,
}

impl HonestChain {
    /// Create a schedule of `validator_count` validators starting at
    /// height 1.
    pub fn new(validator_count: u32) -> Self {
        Self {
            validators: (0..validator_count).map(generator_key).collect(),
            last_forged: vec![0; validator_count as usize],
            next_height: 1,
        }
    }

    /// All validator keys in schedule order.
    pub fn validators(&self) -> &[GeneratorKey] {
        &self.validators
    }

    /// Height the next forged header will carry.
    pub fn next_height(&self) -> BlockHeight {
        BlockHeight(self.next_height)
    }

    /// Schedule index of the next producer.
    pub fn next_producer_index(&self) -> usize {
        ((self.next_height - 1) % self.validators.len() as u64) as usize
    }

    /// Key of the next producer.
    pub fn next_producer(&self) -> GeneratorKey {
        self.validators[self.next_producer_index()]
    }

    /// Height the next producer last forged at (0 if never).
    pub fn next_producer_last_forged(&self) -> BlockHeight {
        BlockHeight(self.last_forged[self.next_producer_index()])
    }

    /// Forge the next honest header, claiming the given pre-voted height.
    ///
    /// Advances the schedule: the producer's forging history and the chain
    /// height move forward, so only call this for headers the engine will
    /// accept.
    pub fn forge(&mut self, prevoted_confirmed: BlockHeight) -> BlockHeader {
        self.forge_with_round(prevoted_confirmed, None)
    }

    /// Forge the next honest header with an explicit activation round.
    pub fn forge_with_round(
        &mut self,
        prevoted_confirmed: BlockHeight,
        active_since_round: Option<Round>,
    ) -> BlockHeader {
        let producer = self.next_producer_index();
        let height = self.next_height;
        let header = BlockHeader {
            id: block_id(height, &self.validators[producer]),
            height: BlockHeight(height),
            generator: self.validators[producer],
            max_height_previously_forged: BlockHeight(self.last_forged[producer]),
            prevoted_confirmed_upto_height: prevoted_confirmed,
            active_since_round,
        };
        self.last_forged[producer] = height;
        self.next_height += 1;
        header
    }
}
