//! Allocation-free equality between strings and UTF-16 code-unit buffers.
//!
//! Short inputs (fewer than 8 units) are compared with one unrolled path per
//! exact length; longer inputs are compared 4 units at a time, packed into a
//! `u64`, with the 0-3 trailing units compared one by one.
//!
//! None of these functions ever read past the declared length of either input.
//!
//! `StringSet` only relies on `str_equals_units`. `units_equal` and
//! `units_equal_at` are standalone helpers for callers comparing code-unit
//! buffers of their own.

/// Compares two code-unit slices.
///
/// Two slices starting at the same address with the same length are equal
/// without inspecting their contents.
#[inline]
pub fn units_equal(a: &[u16], b: &[u16]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    if core::ptr::eq(a.as_ptr(), b.as_ptr()) {
        return true;
    }

    equal_same_length(a, b, |u| u)
}

/// Compares `a` against `buffer[start..start + length]`.
///
/// Returns false, without inspecting any unit, if the lengths differ or if the
/// range does not fit within `buffer`.
#[inline]
pub fn units_equal_at(a: &[u16], buffer: &[u16], start: usize, length: usize) -> bool {
    if a.len() != length {
        return false;
    }

    let Some(end) = start.checked_add(length) else {
        return false;
    };

    match buffer.get(start..end) {
        Some(candidate) => equal_same_length(a, candidate, |u| u),
        None => false,
    }
}

/// Compares a string against a code-unit slice, ordinally.
///
/// Equivalent to `s.encode_utf16().eq(units.iter().copied())`, with an early
/// exit on lengths that cannot match and a widened fast path for ASCII.
#[inline]
pub fn str_equals_units(s: &str, units: &[u16]) -> bool {
    let bytes = s.as_bytes();

    //  A UTF-16 unit takes 1 to 3 bytes in UTF-8.
    if units.len() > bytes.len() || bytes.len() > units.len().saturating_mul(3) {
        return false;
    }

    //  Equal lengths can only match if `s` is pure ASCII.
    if bytes.len() == units.len() {
        return bytes.is_ascii() && equal_same_length(bytes, units, u16::from);
    }

    let mut remaining = units.iter();

    for unit in s.encode_utf16() {
        match remaining.next() {
            Some(&candidate) if candidate == unit => {}
            _ => return false,
        }
    }

    remaining.next().is_none()
}

//
//  Implementation
//

macro_rules! unrolled {
    ($a:ident, $b:ident, $widen:ident; $($i:literal)*) => {
        true $(&& $widen($a[$i]) == $b[$i])*
    };
}

//  `a.len() == b.len()` must hold.
#[inline(always)]
fn equal_same_length<T, F>(a: &[T], b: &[u16], widen: F) -> bool
where
    T: Copy,
    F: Fn(T) -> u16,
{
    debug_assert_eq!(a.len(), b.len());

    match a.len() {
        0 => true,
        1 => unrolled!(a, b, widen; 0),
        2 => unrolled!(a, b, widen; 0 1),
        3 => unrolled!(a, b, widen; 0 1 2),
        4 => unrolled!(a, b, widen; 0 1 2 3),
        5 => unrolled!(a, b, widen; 0 1 2 3 4),
        6 => unrolled!(a, b, widen; 0 1 2 3 4 5),
        7 => unrolled!(a, b, widen; 0 1 2 3 4 5 6),
        _ => equal_chunked(a, b, widen),
    }
}

#[inline]
fn equal_chunked<T, F>(a: &[T], b: &[u16], widen: F) -> bool
where
    T: Copy,
    F: Fn(T) -> u16,
{
    let (a_chunks, b_chunks) = (a.chunks_exact(4), b.chunks_exact(4));
    let (a_tail, b_tail) = (a_chunks.remainder(), b_chunks.remainder());

    for (x, y) in a_chunks.zip(b_chunks) {
        let x = pack([widen(x[0]), widen(x[1]), widen(x[2]), widen(x[3])]);
        let y = pack([y[0], y[1], y[2], y[3]]);

        if x != y {
            return false;
        }
    }

    a_tail.iter().zip(b_tail).all(|(&x, &y)| widen(x) == y)
}

#[inline(always)]
fn pack(units: [u16; 4]) -> u64 {
    u64::from(units[0])
        | u64::from(units[1]) << 16
        | u64::from(units[2]) << 32
        | u64::from(units[3]) << 48
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    /// Invariant: every length from 0 through the chunked path agrees with `==`.
    #[test]
    fn all_lengths_agree_with_slice_equality() {
        let text = utf16("abcdefghijklmnopqrstuvwxyz0123");

        for len in 0..text.len() {
            let a = text[..len].to_vec();
            assert!(units_equal(&a, &text[..len]), "len {len}");

            for flip in 0..len {
                let mut b = a.clone();
                b[flip] ^= 1;
                assert!(!units_equal(&a, &b), "len {len}, flip {flip}");
            }
        }
    }

    /// Invariant: different lengths never compare equal.
    #[test]
    fn length_mismatch_is_unequal() {
        assert!(!units_equal(&utf16("abc"), &utf16("abcd")));
        assert!(!str_equals_units("abc", &utf16("ab")));
        assert!(!str_equals_units("", &utf16("a")));
    }

    #[test]
    fn identical_slices_short_circuit() {
        let a = utf16("the very same buffer");
        assert!(units_equal(&a, &a));
    }

    /// Invariant: out-of-range sub-ranges compare unequal instead of panicking.
    #[test]
    fn bounded_overload_rejects_out_of_range() {
        let buffer = utf16("xxhelloxx");
        let hello = utf16("hello");
        assert!(units_equal_at(&hello, &buffer, 2, 5));
        assert!(!units_equal_at(&hello, &buffer, 5, 5));
        assert!(!units_equal_at(&hello, &buffer, usize::MAX, 5));
        assert!(!units_equal_at(&hello, &buffer, 2, 4));
    }

    /// Invariant: the ASCII fast path does not confuse UTF-8 bytes with Latin-1 units.
    #[test]
    fn non_ascii_bytes_are_not_widened() {
        //  "Ã" is [0xC3, 0x83] in UTF-8.
        assert!(!str_equals_units("Ã", &[0x00C3, 0x0083]));
        assert!(str_equals_units("Ã", &[0x00C3]));
    }

    #[test]
    fn str_matches_units_across_planes() {
        for s in ["", "a", "hello, world", "naïve café", "日本語テキスト", "emoji \u{1F600}!"] {
            assert!(str_equals_units(s, &utf16(s)), "{s:?}");
        }
        assert!(!str_equals_units("日本語", &utf16("日本人")));
        assert!(!str_equals_units("\u{1F600}", &utf16("\u{1F601}")));
    }
}
