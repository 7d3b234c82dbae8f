//! Byte copies between slices, dispatched on size.
//!
//! Below `MANUAL_COPY_THRESHOLD` bytes a word-at-a-time loop is used, above
//! it the platform bulk copy. Both paths produce identical results.

/// Copies of fewer bytes than this use the word loop.
pub const MANUAL_COPY_THRESHOLD: usize = 400;

const WORD: usize = core::mem::size_of::<u64>();

/// Copies `src` into the front of `dst`.
///
/// #   Panics
///
/// If `dst` is shorter than `src`.
#[inline]
pub fn copy(src: &[u8], dst: &mut [u8]) {
    let dst = &mut dst[..src.len()];

    if src.len() < MANUAL_COPY_THRESHOLD {
        copy_words(src, dst);
    } else {
        dst.copy_from_slice(src);
    }
}

//  `src.len() == dst.len()` must hold.
#[inline(always)]
fn copy_words(src: &[u8], dst: &mut [u8]) {
    let mut src_words = src.chunks_exact(WORD);
    let mut dst_words = dst.chunks_exact_mut(WORD);

    for (s, d) in (&mut src_words).zip(&mut dst_words) {
        let word = u64::from_ne_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]);
        d.copy_from_slice(&word.to_ne_bytes());
    }

    for (s, d) in src_words.remainder().iter().zip(dst_words.into_remainder()) {
        *d = *s;
    }
}
