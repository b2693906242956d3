//! Constants and configuration defaults
//!
//! This module defines compile-time and runtime constants used throughout
//! the library, including valid k-mer sizes and default ingestion parameters.

/// Minimum k-mer size supported
pub const MIN_K: usize = 3;

/// Maximum k-mer size supported (two 64-bit words of storage)
pub const MAX_K: usize = 63;

/// Upper bound on the number of colours a store may be created with
pub const MAX_COLOURS: usize = 64;

/// Default number of colours
pub const DEFAULT_NUM_COLOURS: usize = 1;

/// Default maximum read length accepted by the sequence readers
pub const DEFAULT_MAX_READ_LENGTH: usize = 10_000;

/// Default expected number of distinct k-mers (initial table capacity)
pub const DEFAULT_EXPECTED_KMERS: usize = 1 << 16;

/// Phred offset of FASTQ quality characters
pub const PHRED_OFFSET: u8 = 33;

/// Seed for the store index and read fingerprints
pub const DEFAULT_SEED: u64 = 1;

/// Version number
pub const VERSION: (u8, u8, u8) = (0, 1, 0);

/// Check if a k-mer size is valid
#[inline]
pub const fn is_valid_k(k: usize) -> bool {
    k >= MIN_K && k <= MAX_K
}

/// Worst-case number of windows for a read of `max_read_length` bases.
///
/// Every window needs `k` good bases and all but the last need one
/// separating bad base, so `n` windows need at least `n * (k + 1) - 1` bases.
#[inline]
pub const fn max_windows(max_read_length: usize, k: usize) -> usize {
    (max_read_length + 1) / (k + 1)
}

/// Number of k-mers in a perfect read of `max_read_length` bases
#[inline]
pub const fn max_kmers(max_read_length: usize, k: usize) -> usize {
    if max_read_length < k {
        0
    } else {
        max_read_length - k + 1
    }
}
