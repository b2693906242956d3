//! Deterministic hashing using ahash.
//!
//! The store index and the duplicate-read filter both hash with fixed seeds so
//! that two runs over the same input produce the same table layout and the same
//! duplicate decisions.

use ahash::RandomState;
use std::hash::{BuildHasher, Hasher};

/// A deterministic hasher with a seeded state
#[derive(Clone)]
pub struct DeterministicHasher {
    seed: u64,
    state: RandomState,
}

impl DeterministicHasher {
    /// Create a new deterministic hasher with the given seed
    pub fn new(seed: u64) -> Self {
        let state = RandomState::with_seeds(seed, !seed, seed, !seed);
        Self { seed, state }
    }

    /// Hash a sequence of packed values in the given order
    pub fn hash_sequence<I>(&self, values: I) -> u64
    where
        I: IntoIterator<Item = u128>,
    {
        let mut hasher = self.state.build_hasher();
        let mut len = 0usize;
        for value in values {
            hasher.write_u128(value);
            len += 1;
        }
        hasher.write_usize(len);
        hasher.finish()
    }

    /// Get the seed value
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for DeterministicHasher {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_SEED)
    }
}

impl BuildHasher for DeterministicHasher {
    type Hasher = ahash::AHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.state.build_hasher()
    }
}
