//! K-mer representation with const generics and optimal storage
//!
//! This module implements k-mer types using const generics to support
//! every k-mer size from 3 to 63. Storage is automatically selected
//! (u64 for K ≤ 31, u128 for K > 31).
//!
//! The first base occupies the most significant bit pair, so comparing two
//! packed k-mers as unsigned integers gives the same answer as comparing their
//! base strings. Canonical keys are therefore the lexicographically smaller of
//! a k-mer and its reverse complement.

use crate::encoding::{decode_base, encode_base, EncodingError};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitOr, Not, Shl, Shr};

/// Which strand an occurrence of a k-mer used relative to its canonical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The occurrence reads exactly like the canonical key
    Forward,
    /// The occurrence is the reverse complement of the canonical key
    Reverse,
}

impl Orientation {
    /// The other strand
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reverse,
            Orientation::Reverse => Orientation::Forward,
        }
    }
}

/// Trait defining optimal storage type for a given K
///
/// This trait is implemented for every K from 3 to 63.
/// - K ≤ 31: uses u64 (8 bytes)
/// - K > 31: uses u128 (16 bytes)
pub trait KmerBits: Sized {
    /// The underlying storage type (u64 or u128)
    type Storage: Copy
        + Ord
        + Hash
        + fmt::Debug
        + From<u8>
        + BitAnd<Output = Self::Storage>
        + BitOr<Output = Self::Storage>
        + Not<Output = Self::Storage>
        + Shl<usize, Output = Self::Storage>
        + Shr<usize, Output = Self::Storage>;

    /// Number of bits in the storage type
    const BITS: usize;

    /// Convert storage to u8 (truncates)
    fn to_u8(val: Self::Storage) -> u8;

    /// Convert storage to u64 (truncates)
    fn to_u64(val: Self::Storage) -> u64;

    /// Convert storage to u128
    fn to_u128(val: Self::Storage) -> u128;

    /// Convert u64 to storage
    fn from_u64(val: u64) -> Self::Storage;

    /// Convert u128 to storage (truncates)
    fn from_u128(val: u128) -> Self::Storage;
}

/// Implement KmerBits for all K ≤ 31 (use u64)
macro_rules! impl_kmer_bits_u64 {
    ($($k:literal),* $(,)?) => {
        $(
            impl KmerBits for Kmer<$k> {
                type Storage = u64;
                const BITS: usize = 64;

                #[inline]
                fn to_u8(val: Self::Storage) -> u8 {
                    val as u8
                }

                #[inline]
                fn to_u64(val: Self::Storage) -> u64 {
                    val
                }

                #[inline]
                fn to_u128(val: Self::Storage) -> u128 {
                    val as u128
                }

                #[inline]
                fn from_u64(val: u64) -> Self::Storage {
                    val
                }

                #[inline]
                fn from_u128(val: u128) -> Self::Storage {
                    val as u64
                }
            }
        )*
    };
}

impl_kmer_bits_u64!(
    3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27,
    28, 29, 30, 31
);

/// Implement KmerBits for all K > 31 (use u128)
macro_rules! impl_kmer_bits_u128 {
    ($($k:literal),* $(,)?) => {
        $(
            impl KmerBits for Kmer<$k> {
                type Storage = u128;
                const BITS: usize = 128;

                #[inline]
                fn to_u8(val: Self::Storage) -> u8 {
                    val as u8
                }

                #[inline]
                fn to_u64(val: Self::Storage) -> u64 {
                    val as u64
                }

                #[inline]
                fn to_u128(val: Self::Storage) -> u128 {
                    val
                }

                #[inline]
                fn from_u64(val: u64) -> Self::Storage {
                    val as u128
                }

                #[inline]
                fn from_u128(val: u128) -> Self::Storage {
                    val
                }
            }
        )*
    };
}

impl_kmer_bits_u128!(
    32, 33, 34, 35, 36, 37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48, 49, 50, 51, 52, 53, 54, 55,
    56, 57, 58, 59, 60, 61, 62, 63
);

/// Run a block with a const `K` matching a runtime k-mer length.
///
/// The block must evaluate to a `Result` whose error type can be built from
/// [`ConfigError`](crate::builder::config::ConfigError); an unsupported `k`
/// produces `ConfigError::InvalidK`.
///
/// ```
/// use popgraph_lib::{dispatch_on_k, KmerStore};
///
/// fn distinct_kmers(k: usize) -> anyhow::Result<usize> {
///     dispatch_on_k!(k, K => {
///         let store = KmerStore::<K>::new(1);
///         Ok(store.len())
///     })
/// }
/// assert_eq!(distinct_kmers(31).unwrap(), 0);
/// assert!(distinct_kmers(2).is_err());
/// ```
#[macro_export]
macro_rules! dispatch_on_k {
    ($k:expr, $K:ident => $body:expr) => {
        $crate::__dispatch_on_k_arms!($k, $K => $body;
            3 4 5 6 7 8 9 10 11 12 13 14 15 16 17 18 19 20 21 22 23 24 25 26 27 28 29 30 31
            32 33 34 35 36 37 38 39 40 41 42 43 44 45 46 47 48 49 50 51 52 53 54 55 56 57 58
            59 60 61 62 63)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __dispatch_on_k_arms {
    ($k:expr, $K:ident => $body:expr; $($n:literal)*) => {
        match $k {
            $(
                $n => {
                    const $K: usize = $n;
                    $body
                }
            )*
            other => ::core::result::Result::Err(::core::convert::From::from(
                $crate::builder::config::ConfigError::InvalidK(other),
            )),
        }
    };
}

/// K-mer representation with compile-time size and optimal storage
///
/// # Example
/// ```
/// use popgraph_lib::kmer::{Kmer, Orientation};
///
/// let kmer: Kmer<5> = Kmer::from_str("TTGCA").unwrap();
/// assert_eq!(kmer.reverse_complement().to_string(), "TGCAA");
///
/// let (canonical, orientation) = kmer.canonical_with_orientation();
/// assert_eq!(canonical.to_string(), "TGCAA");
/// assert_eq!(orientation, Orientation::Reverse);
/// ```
#[derive(Clone, Copy)]
pub struct Kmer<const K: usize>
where
    Kmer<K>: KmerBits,
{
    bits: <Kmer<K> as KmerBits>::Storage,
}

impl<const K: usize> Kmer<K>
where
    Kmer<K>: KmerBits,
{
    /// Number of bytes used by the fixed-width key encoding (`⌈2K/8⌉`)
    pub const BYTES: usize = (2 * K).div_ceil(8);

    /// Create a new k-mer from raw bits
    #[inline]
    pub fn new(bits: <Kmer<K> as KmerBits>::Storage) -> Self {
        Self { bits }
    }

    /// Create a k-mer from a u128 value (high bits beyond 2K are dropped)
    #[inline]
    pub fn from_bits(bits: u128) -> Self {
        Self {
            bits: <Kmer<K> as KmerBits>::from_u128(bits & Self::mask_u128()),
        }
    }

    /// Get the raw bits
    #[inline]
    pub fn bits(&self) -> <Kmer<K> as KmerBits>::Storage {
        self.bits
    }

    /// Packed value widened to u128
    #[inline]
    pub fn as_u128(&self) -> u128 {
        <Kmer<K> as KmerBits>::to_u128(self.bits)
    }

    #[inline]
    fn mask_u128() -> u128 {
        (1u128 << (2 * K)) - 1
    }

    /// Create a k-mer from a DNA string
    ///
    /// This is an inherent method so callers don't need to import [`std::str::FromStr`].
    ///
    /// # Errors
    /// Returns an error if the string length doesn't match K or contains invalid bases.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, EncodingError> {
        Self::from_ascii(s.as_bytes())
    }

    /// Encode exactly K bases (A/C/G/T, any case)
    ///
    /// # Errors
    /// `LengthMismatch` if `bases.len() != K`, `InvalidBase` for anything else
    /// than A/C/G/T (including `N`).
    pub fn from_ascii(bases: &[u8]) -> Result<Self, EncodingError> {
        if bases.len() != K {
            return Err(EncodingError::LengthMismatch {
                expected: K,
                actual: bases.len(),
            });
        }

        let mut bits = 0u128;
        for &base in bases {
            bits = (bits << 2) | encode_base(base)? as u128;
        }

        Ok(Self::from_bits(bits))
    }

    /// Get the reverse complement of this k-mer
    ///
    /// Uses bit-parallel operations: complement via NOT, then reverse 2-bit pairs.
    #[inline]
    pub fn reverse_complement(&self) -> Self {
        if K <= 31 {
            // u64 fast path
            let mut x = !<Kmer<K> as KmerBits>::to_u64(self.bits);
            // Swap adjacent 2-bit pairs, then nibbles, then bytes
            x = ((x >> 2) & 0x3333_3333_3333_3333u64) | ((x & 0x3333_3333_3333_3333u64) << 2);
            x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0Fu64) | ((x & 0x0F0F_0F0F_0F0F_0F0Fu64) << 4);
            x = x.swap_bytes();
            // Complemented padding ended up at the bottom; shift it out
            x >>= 64usize.saturating_sub(K * 2);
            Self {
                bits: <Kmer<K> as KmerBits>::from_u64(x),
            }
        } else {
            let mut x = !<Kmer<K> as KmerBits>::to_u128(self.bits);
            x = ((x >> 2) & 0x3333_3333_3333_3333_3333_3333_3333_3333u128)
                | ((x & 0x3333_3333_3333_3333_3333_3333_3333_3333u128) << 2);
            x = ((x >> 4) & 0x0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0Fu128)
                | ((x & 0x0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0F_0F0Fu128) << 4);
            x = x.swap_bytes();
            x >>= 128 - K * 2;
            Self {
                bits: <Kmer<K> as KmerBits>::from_u128(x),
            }
        }
    }

    /// Get the canonical representation (minimum of forward and reverse complement)
    #[inline]
    pub fn canonical(&self) -> Self {
        self.canonical_with_orientation().0
    }

    /// Canonical representation plus the orientation of `self` relative to it
    ///
    /// Palindromes are their own reverse complement and report `Forward`.
    #[inline]
    pub fn canonical_with_orientation(&self) -> (Self, Orientation) {
        let rc = self.reverse_complement();
        if self.bits <= rc.bits {
            (*self, Orientation::Forward)
        } else {
            (rc, Orientation::Reverse)
        }
    }

    /// This k-mer read on the given strand
    #[inline]
    pub fn oriented(&self, orientation: Orientation) -> Self {
        match orientation {
            Orientation::Forward => *self,
            Orientation::Reverse => self.reverse_complement(),
        }
    }

    /// Extract the 2-bit base at a position (0 = first base)
    pub fn get_base(&self, pos: usize) -> u8 {
        assert!(pos < K, "Position {} out of bounds for k-mer of length {}", pos, K);
        let shift = 2 * (K - 1 - pos);
        <Kmer<K> as KmerBits>::to_u8(self.bits >> shift) & 0b11
    }

    /// First (leftmost) base
    #[inline]
    pub fn first_base(&self) -> u8 {
        self.get_base(0)
    }

    /// Last (rightmost) base
    #[inline]
    pub fn last_base(&self) -> u8 {
        <Kmer<K> as KmerBits>::to_u8(self.bits) & 0b11
    }

    /// Drop the first base and append `base` at the end
    ///
    /// # Arguments
    /// * `base` - 2-bit encoded base (0=A, 1=C, 2=G, 3=T)
    #[inline]
    pub fn append_base(self, base: u8) -> Self {
        debug_assert!(base <= 0b11, "Base value must be 0-3");
        Self::from_bits((self.as_u128() << 2) | (base & 0b11) as u128)
    }

    /// Drop the last base and prepend `base` at the front
    #[inline]
    pub fn prepend_base(self, base: u8) -> Self {
        debug_assert!(base <= 0b11, "Base value must be 0-3");
        Self::from_bits((self.as_u128() >> 2) | (((base & 0b11) as u128) << (2 * (K - 1))))
    }

    /// Write the fixed-width big-endian key encoding into `out`
    ///
    /// `out` must be exactly [`Self::BYTES`] long.
    pub fn write_key_bytes(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), Self::BYTES);
        let be = self.as_u128().to_be_bytes();
        out.copy_from_slice(&be[16 - Self::BYTES..]);
    }

    /// Decode a fixed-width key written by [`write_key_bytes`](Self::write_key_bytes)
    ///
    /// Returns `None` if the slice has the wrong length or sets bits beyond 2K.
    pub fn from_key_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::BYTES {
            return None;
        }
        let mut be = [0u8; 16];
        be[16 - Self::BYTES..].copy_from_slice(bytes);
        let value = u128::from_be_bytes(be);
        if value & !Self::mask_u128() != 0 {
            return None;
        }
        Some(Self::from_bits(value))
    }
}

impl<const K: usize> PartialEq for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<const K: usize> Eq for Kmer<K> where Kmer<K>: KmerBits {}

impl<const K: usize> PartialOrd for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<const K: usize> Ord for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.bits.cmp(&other.bits)
    }
}

impl<const K: usize> Hash for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<const K: usize> fmt::Debug for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kmer<{}>(\"{}\")", K, self)
    }
}

impl<const K: usize> fmt::Display for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pos in 0..K {
            write!(f, "{}", decode_base(self.get_base(pos)) as char)?;
        }
        Ok(())
    }
}

impl<const K: usize> Default for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    fn default() -> Self {
        Self {
            bits: <Kmer<K> as KmerBits>::Storage::from(0u8),
        }
    }
}

impl<const K: usize> std::str::FromStr for Kmer<K>
where
    Kmer<K>: KmerBits,
{
    type Err = EncodingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_ascii(s.as_bytes())
    }
}
