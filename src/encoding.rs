//! Text encodings supported by the stream's string codecs.
//!
//! Sizes are derived from the UTF-8 length `L` of the input, which is known
//! without inspecting the text:
//!
//! | Encoding | Worst case | Lower bound    | Exact without measuring |
//! |----------|------------|----------------|-------------------------|
//! | Ascii    | `L`        | `ceil(L / 4)`  | no                      |
//! | Latin1   | `L`        | `ceil(L / 4)`  | no                      |
//! | Utf8     | `L`        | `L`            | yes                     |
//! | Utf16    | `2L`       | `2 ceil(L / 3)`| no                      |
//! | Utf32    | `4L`       | `4 ceil(L / 4)`| no                      |
//!
//! UTF-16 and UTF-32 use the native byte order of the running process.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A text encoding for length-prefixed and raw string coding.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// 7-bit ASCII, one byte per character; others encode as `?`.
    Ascii,
    /// ISO-8859-1, one byte per character; others encode as `?`.
    Latin1,
    /// UTF-8.
    #[default]
    Utf8,
    /// UTF-16, native byte order.
    Utf16,
    /// UTF-32, native byte order.
    Utf32,
}

const REPLACEMENT_BYTE: u8 = b'?';

impl TextEncoding {
    /// Largest number of bytes `s` may encode to.
    pub fn max_byte_count(self, s: &str) -> Result<usize> {
        let factor = match self {
            TextEncoding::Ascii | TextEncoding::Latin1 | TextEncoding::Utf8 => 1,
            TextEncoding::Utf16 => 2,
            TextEncoding::Utf32 => 4,
        };

        s.len().checked_mul(factor).ok_or(Error::CapacityOverflow)
    }

    /// Smallest number of bytes `s` may encode to.
    pub fn min_byte_count(self, s: &str) -> usize {
        let len = s.len();

        match self {
            TextEncoding::Ascii | TextEncoding::Latin1 => len.div_ceil(4),
            TextEncoding::Utf8 => len,
            TextEncoding::Utf16 => 2 * len.div_ceil(3),
            TextEncoding::Utf32 => 4 * len.div_ceil(4),
        }
    }

    /// Returns true if the exact size is known without inspecting the text.
    pub fn is_size_exact(self) -> bool {
        matches!(self, TextEncoding::Utf8)
    }

    /// Exact number of bytes `s` encodes to.
    pub fn byte_count(self, s: &str) -> usize {
        match self {
            TextEncoding::Ascii | TextEncoding::Latin1 => s.chars().count(),
            TextEncoding::Utf8 => s.len(),
            TextEncoding::Utf16 => 2 * s.chars().map(char::len_utf16).sum::<usize>(),
            TextEncoding::Utf32 => 4 * s.chars().count(),
        }
    }

    /// Encodes `s` into the front of `out`, returning the number of bytes written.
    ///
    /// #   Panics
    ///
    /// If `out` is shorter than `byte_count(s)`.
    pub fn encode_into(self, s: &str, out: &mut [u8]) -> usize {
        match self {
            TextEncoding::Ascii => encode_narrow(s, out, 0x7F),
            TextEncoding::Latin1 => encode_narrow(s, out, 0xFF),
            TextEncoding::Utf8 => {
                out[..s.len()].copy_from_slice(s.as_bytes());
                s.len()
            }
            TextEncoding::Utf16 => {
                let mut written = 0;
                for unit in s.encode_utf16() {
                    out[written..written + 2].copy_from_slice(&unit.to_ne_bytes());
                    written += 2;
                }
                written
            }
            TextEncoding::Utf32 => {
                let mut written = 0;
                for c in s.chars() {
                    out[written..written + 4].copy_from_slice(&u32::from(c).to_ne_bytes());
                    written += 4;
                }
                written
            }
        }
    }

    /// Decodes `bytes`, appending the text to `out`.
    ///
    /// Malformed sequences decode to U+FFFD, as does a trailing partial code unit.
    pub fn decode_into(self, bytes: &[u8], out: &mut String) {
        match self {
            TextEncoding::Ascii => out.extend(bytes.iter().map(|&b| {
                if b.is_ascii() {
                    char::from(b)
                } else {
                    char::REPLACEMENT_CHARACTER
                }
            })),
            TextEncoding::Latin1 => out.extend(bytes.iter().map(|&b| char::from(b))),
            TextEncoding::Utf8 => match std::str::from_utf8(bytes) {
                Ok(s) => out.push_str(s),
                Err(_) => out.push_str(&String::from_utf8_lossy(bytes)),
            },
            TextEncoding::Utf16 => {
                let chunks = bytes.chunks_exact(2);
                let partial = !chunks.remainder().is_empty();
                let units = chunks.map(|c| u16::from_ne_bytes([c[0], c[1]]));

                out.extend(char::decode_utf16(units).map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER)));

                if partial {
                    out.push(char::REPLACEMENT_CHARACTER);
                }
            }
            TextEncoding::Utf32 => {
                let chunks = bytes.chunks_exact(4);
                let partial = !chunks.remainder().is_empty();

                out.extend(chunks.map(|c| {
                    char::from_u32(u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                        .unwrap_or(char::REPLACEMENT_CHARACTER)
                }));

                if partial {
                    out.push(char::REPLACEMENT_CHARACTER);
                }
            }
        }
    }
}

fn encode_narrow(s: &str, out: &mut [u8], max: u32) -> usize {
    let mut written = 0;

    for c in s.chars() {
        let c = u32::from(c);
        out[written] = if c <= max { c as u8 } else { REPLACEMENT_BYTE };
        written += 1;
    }

    written
}
