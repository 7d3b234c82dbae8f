//! Variable-length unsigned integers: little-endian base-128 groups.
//!
//! Each byte carries 7 bits of the value, low groups first; the high bit is
//! set on every byte but the last. Zero encodes as a single `0x00`.

use crate::error::{Error, Result};

/// Longest encoding of a `u64`.
pub const MAX_LEN: usize = 10;

const CONTINUATION: u8 = 0x80;
const GROUP_MASK: u8 = 0x7F;

/// Number of bytes `value` encodes to: 1 up to 7 bits, 2 up to 14 bits, and so on up to 10.
#[inline]
pub const fn byte_count(value: u64) -> usize {
    let bits = (u64::BITS - value.leading_zeros()) as usize;

    if bits == 0 {
        1
    } else {
        bits.div_ceil(7)
    }
}

/// Encodes `value` into the front of `out`, returning the number of bytes written.
///
/// #   Panics
///
/// If `out` is shorter than `byte_count(value)`.
#[inline]
pub fn encode(mut value: u64, out: &mut [u8]) -> usize {
    let mut written = 0;

    loop {
        let group = (value as u8) & GROUP_MASK;
        value >>= 7;

        if value == 0 {
            out[written] = group;
            return written + 1;
        }

        out[written] = group | CONTINUATION;
        written += 1;
    }
}

/// Decodes a value from the front of `bytes`, returning it with the number of bytes consumed.
///
/// Fails with `EndOfData` if `bytes` ends before the last group, and with `InvalidData` if the value does not fit
/// in a `u64`.
#[inline]
pub fn decode(bytes: &[u8]) -> Result<(u64, usize)> {
    let mut value = 0u64;

    for (index, &byte) in bytes.iter().enumerate() {
        if index == MAX_LEN {
            return Err(Error::InvalidData("variable-length integer too long"));
        }

        let group = u64::from(byte & GROUP_MASK);
        let shift = 7 * index as u32;

        //  The tenth group only has room for the top bit.
        if index == MAX_LEN - 1 && group > 1 {
            return Err(Error::InvalidData("variable-length integer overflows 64 bits"));
        }

        value |= group << shift;

        if byte & CONTINUATION == 0 {
            return Ok((value, index + 1));
        }
    }

    Err(Error::EndOfData {
        requested: bytes.len() + 1,
        available: bytes.len(),
    })
}
