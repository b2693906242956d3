//! DNA nucleotide encoding
//!
//! This module implements the 2-bit encoding scheme for DNA nucleotides.
//! Codes follow alphabetical order so that the packed value of a k-mer
//! compares exactly like its base string:
//! - A (65/97)  -> 00
//! - C (67/99)  -> 01
//! - G (71/103) -> 10
//! - T (84/116) -> 11
//!
//! With this layout the complement of a code is `3 - code`, i.e. `code ^ 0b11`.

use thiserror::Error;

/// Error type for encoding operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    /// The input byte is not a valid DNA base (A/C/G/T)
    #[error("Invalid DNA base: {:?}", *.0 as char)]
    InvalidBase(u8),
    /// The input string length does not match the expected k-mer length
    #[error("K-mer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected k-mer length
        expected: usize,
        /// Actual string length
        actual: usize,
    },
}

/// Encode a single DNA nucleotide to 2 bits
///
/// Accepts upper and lower case. `N` and anything else is rejected.
#[inline]
pub const fn encode_base(base: u8) -> Result<u8, EncodingError> {
    match base {
        b'A' | b'a' => Ok(0b00),
        b'C' | b'c' => Ok(0b01),
        b'G' | b'g' => Ok(0b10),
        b'T' | b't' => Ok(0b11),
        _ => Err(EncodingError::InvalidBase(base)),
    }
}

/// Encode a base, returning `None` for ambiguous or invalid symbols
#[inline]
pub const fn try_encode_base(base: u8) -> Option<u8> {
    match encode_base(base) {
        Ok(code) => Some(code),
        Err(_) => None,
    }
}

/// Decode a 2-bit value to DNA nucleotide (uppercase)
#[inline]
pub const fn decode_base(bits: u8) -> u8 {
    match bits & 0b11 {
        0b00 => b'A',
        0b01 => b'C',
        0b10 => b'G',
        _ => b'T',
    }
}

/// Get the complement of a DNA base (encoded)
#[inline]
pub const fn complement_base(bits: u8) -> u8 {
    // A(00) <-> T(11), C(01) <-> G(10)
    (bits ^ 0b11) & 0b11
}

/// Complement an ASCII base, preserving `N` and mapping anything else to `N`
#[inline]
pub const fn complement_char(base: u8) -> u8 {
    match base {
        b'A' | b'a' => b'T',
        b'C' | b'c' => b'G',
        b'G' | b'g' => b'C',
        b'T' | b't' => b'A',
        _ => b'N',
    }
}

/// Whether a symbol may appear in a sequence record (A, C, G, T, N; any case)
#[inline]
pub const fn is_sequence_symbol(base: u8) -> bool {
    matches!(
        base,
        b'A' | b'a' | b'C' | b'c' | b'G' | b'g' | b'T' | b't' | b'N' | b'n'
    )
}

/// Reverse complement an ASCII base string
pub fn reverse_complement_str(seq: &str) -> String {
    seq.bytes()
        .rev()
        .map(|b| complement_char(b) as char)
        .collect()
}
