//! FNV-1a over UTF-16 code units.
//!
//! Strings are hashed one UTF-16 code unit at a time, surrogate halves folded
//! independently, so that a `&str` and the `&[u16]` holding the same text
//! always produce the same value.
//!
//! Hash values are only stable within one process; nothing persists them.

/// FNV-1a offset basis.
pub const OFFSET_BASIS: u32 = 2_166_136_261;

/// FNV-1a prime.
pub const PRIME: u32 = 16_777_619;

/// A 32-bit FNV-1a hash of a sequence of UTF-16 code units.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct StringHash(u32);

impl StringHash {
    /// Starts an incremental hash: the offset basis.
    #[inline]
    pub const fn begin() -> Self {
        Self(OFFSET_BASIS)
    }

    /// Folds one code unit into the hash.
    #[inline(always)]
    pub const fn iterate(self, unit: u16) -> Self {
        Self((unit as u32 ^ self.0).wrapping_mul(PRIME))
    }

    /// Hashes every code unit of `units`, in order.
    #[inline]
    pub fn of_units(units: &[u16]) -> Self {
        units.iter().fold(Self::begin(), |h, &u| h.iterate(u))
    }

    /// Hashes the UTF-16 encoding of `s`, without materializing it.
    #[inline]
    pub fn of_str(s: &str) -> Self {
        s.encode_utf16().fold(Self::begin(), Self::iterate)
    }

    /// Wraps a raw value, e.g. one computed earlier by `get`.
    #[inline]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }

    /// Returns the raw 32-bit value.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}
