//! String codecs of `ReusableStream`.
//!
//! Layout of a length-prefixed string:
//!
//! ```text
//! VarUInt(encoded byte length) [bool is_null, if nullable and length == 0] encoded bytes
//! ```
//!
//! Writing
//! - The prefix slot is sized for the worst-case encoded length, so that the
//!   text can be encoded straight into the buffer without measuring it first.
//!   If the actual length needs a shorter prefix, the body is moved down over
//!   the unused prefix bytes: the written prefix is always minimal.
//! - Growth is decided on bounds first. If the worst case fits, or if the
//!   encoding size is exact, no measuring happens. Otherwise the exact size is
//!   measured, and the buffer only grows, to that size, if it does not fit.
//!
//! Reading
//! - Strings of up to `max_encoded_size_to_lookup_in_set` encoded bytes are
//!   decoded into a scratch buffer and looked up in (or added to) the attached
//!   `StringSet`; longer ones are always freshly allocated.

use std::sync::Arc;

use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::options::StringSetOptions;
use crate::stream::ReusableStream;
use crate::string_set::StringSet;
use crate::var_uint;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Prefix {
    Absent,
    Length,
    NullableLength,
}

impl ReusableStream {
    /// Writes a length-prefixed, non-nullable string in the default encoding.
    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_string_with(Some(value), false, self.encoding)
    }

    /// Writes a length-prefixed, nullable string in the default encoding.
    pub fn write_nullable_str(&mut self, value: Option<&str>) -> Result<()> {
        self.write_string_with(value, true, self.encoding)
    }

    /// Writes a length-prefixed string.
    ///
    /// When `nullable`, an empty or absent `value` is followed by a flag byte telling them apart; a non-nullable
    /// string must be present.
    pub fn write_string_with(&mut self, value: Option<&str>, nullable: bool, encoding: TextEncoding) -> Result<()> {
        self.check_initialized()?;

        match value {
            Some(value) => {
                let prefix = if nullable { Prefix::NullableLength } else { Prefix::Length };

                self.write_encoded(value, encoding, prefix).map(|_| ())
            }
            None if nullable => self.write_bytes(&[0, 1]),
            None => Err(Error::NullNotAllowed),
        }
    }

    /// Writes the encoded bytes of `value`, without length prefix, returning their count.
    ///
    /// Uses the default encoding if `encoding` is `None`.
    pub fn write_str_bytes(&mut self, value: &str, encoding: Option<TextEncoding>) -> Result<usize> {
        self.check_initialized()?;

        let encoding = encoding.unwrap_or(self.encoding);

        self.write_encoded(value, encoding, Prefix::Absent)
    }

    /// Reads a length-prefixed, non-nullable string in the default encoding, with the default interning options.
    pub fn read_string(&mut self) -> Result<Arc<str>> {
        self.read_string_with(false, self.encoding, None)?
            .ok_or(Error::NullNotAllowed)
    }

    /// Reads a length-prefixed, nullable string in the default encoding, with the default interning options.
    pub fn read_nullable_string(&mut self) -> Result<Option<Arc<str>>> {
        self.read_string_with(true, self.encoding, None)
    }

    /// Reads a length-prefixed string.
    ///
    /// `options` override the default interning options of the stream, unless they leave interning disabled.
    /// Interning with no string set attached fails with `NoStringSet`. On failure the cursor is left unchanged.
    pub fn read_string_with(
        &mut self,
        nullable: bool,
        encoding: TextEncoding,
        options: Option<StringSetOptions>,
    ) -> Result<Option<Arc<str>>> {
        self.check_initialized()?;

        let options = StringSetOptions::resolve(options, self.string_set_options);

        if options.is_enabled() && self.string_set.is_none() {
            return Err(Error::NoStringSet);
        }

        let checkpoint = self.cursor;
        let result = self.read_prefixed(nullable, encoding, options);

        if result.is_err() {
            self.cursor = checkpoint;
        }

        result
    }

    /// Reads `byte_count` encoded bytes as a string, without length prefix nor interning.
    ///
    /// Uses the default encoding if `encoding` is `None`. Malformed input decodes to U+FFFD.
    pub fn read_str_bytes(&mut self, byte_count: usize, encoding: Option<TextEncoding>) -> Result<String> {
        let encoding = encoding.unwrap_or(self.encoding);
        let bytes = self.read_slot(byte_count)?;

        let mut result = String::with_capacity(byte_count);
        encoding.decode_into(bytes, &mut result);

        Ok(result)
    }
}

//
//  Implementation
//

impl ReusableStream {
    //  Returns the number of bytes written, prefix and flag included.
    fn write_encoded(&mut self, value: &str, encoding: TextEncoding, prefix: Prefix) -> Result<usize> {
        let null_flag = usize::from(prefix == Prefix::NullableLength && value.is_empty());
        let prefix_len = |length: usize| match prefix {
            Prefix::Absent => 0,
            _ => var_uint::byte_count(length as u64),
        };

        let worst = encoding.max_byte_count(value)?;
        let reserved = prefix_len(worst);
        let worst_total = reserved
            .checked_add(worst)
            .and_then(|total| total.checked_add(null_flag))
            .ok_or(Error::CapacityOverflow)?;

        let available = self.remaining_capacity()?;

        if worst_total <= available || encoding.is_size_exact() {
            let required = self.cursor.checked_add(worst_total).ok_or(Error::CapacityOverflow)?;
            self.ensure_capacity(required)?;

            return self.encode_at(value, encoding, prefix, reserved, null_flag);
        }

        //  The worst case does not fit: measure.
        let exact = encoding.byte_count(value);
        let reserved = prefix_len(exact);
        let exact_total = reserved
            .checked_add(exact)
            .and_then(|total| total.checked_add(null_flag))
            .ok_or(Error::CapacityOverflow)?;

        if exact_total > available {
            let required = self.cursor.checked_add(exact_total).ok_or(Error::CapacityOverflow)?;
            self.ensure_capacity(required)?;
        }

        self.encode_at(value, encoding, prefix, reserved, null_flag)
    }

    //  Encodes at the cursor, which must have room for `reserved` prefix bytes, the encoded body and the flag.
    fn encode_at(
        &mut self,
        value: &str,
        encoding: TextEncoding,
        prefix: Prefix,
        reserved: usize,
        null_flag: usize,
    ) -> Result<usize> {
        let Self { data, cursor, end, .. } = self;
        let data = data.as_mut().ok_or(Error::Uninitialized)?;

        let start = *cursor;
        let body = start + reserved;
        let length = encoding.encode_into(value, &mut data[body..]);
        let mut next = body + length;

        if prefix != Prefix::Absent {
            let mut encoded = [0u8; var_uint::MAX_LEN];
            let written = var_uint::encode(length as u64, &mut encoded);

            debug_assert!(written <= reserved);

            data[start..start + written].copy_from_slice(&encoded[..written]);

            if written < reserved {
                data.copy_within(body..next, start + written);
                next -= reserved - written;
            }

            if null_flag != 0 {
                data[next] = 0;
                next += 1;
            }
        }

        *cursor = next;
        *end = (*end).max(next);

        Ok(next - start)
    }

    fn read_prefixed(
        &mut self,
        nullable: bool,
        encoding: TextEncoding,
        options: StringSetOptions,
    ) -> Result<Option<Arc<str>>> {
        let length = self.read_var_uint()?;
        let length = usize::try_from(length).map_err(|_| Error::InvalidData("string length exceeds address space"))?;

        if length == 0 {
            if nullable && self.read_value::<bool>()? {
                return Ok(None);
            }

            return Ok(Some(Arc::from("")));
        }

        let range = self.read_range(length)?;
        let data = self.data.as_ref().ok_or(Error::Uninitialized)?;
        let text = decode_text(encoding, &data[range], &mut self.scratch);

        let eligible = options.is_enabled() && length <= options.max_encoded_size_to_lookup_in_set;

        match self.string_set.as_deref() {
            Some(set) if eligible => intern_text(set, text, options).map(Some),
            _ => Ok(Some(Arc::from(text))),
        }
    }
}

//  Borrows valid UTF-8 straight from `bytes`, decodes anything else into `scratch`.
fn decode_text<'a>(encoding: TextEncoding, bytes: &'a [u8], scratch: &'a mut String) -> &'a str {
    if encoding == TextEncoding::Utf8 {
        if let Ok(text) = std::str::from_utf8(bytes) {
            return text;
        }
    }

    scratch.clear();
    encoding.decode_into(bytes, scratch);

    scratch.as_str()
}

fn intern_text(set: &StringSet, text: &str, options: StringSetOptions) -> Result<Arc<str>> {
    if options.perform_dangerous_auto_add_to_set {
        let (added, value) = set.intern(text, None)?;

        tracing::trace!(length = text.len(), added, "string read through intern set");

        return Ok(value);
    }

    match set.get_existing_str(text, None) {
        Some(value) => {
            tracing::trace!(length = text.len(), "string read served from intern set");
            Ok(value)
        }
        None => {
            tracing::trace!(length = text.len(), "string read missed intern set");
            Ok(Arc::from(text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interning_stream(options: StringSetOptions) -> (Arc<StringSet>, ReusableStream) {
        let set = Arc::new(StringSet::new(4));
        let stream = ReusableStream::with_capacity(16).with_string_set(set.clone(), options);

        (set, stream)
    }

    /// Invariant: only nullable zero-length strings carry the flag byte.
    #[test]
    fn empty_and_null_boundary() {
        let mut s = ReusableStream::with_capacity(8);
        s.write_str("").unwrap();
        s.write_nullable_str(Some("")).unwrap();
        s.write_nullable_str(None).unwrap();
        assert_eq!(s.written(), &[0, 0, 0, 0, 1]);

        s.reset_for_reading();
        assert_eq!(&*s.read_string().unwrap(), "");
        assert_eq!(s.read_nullable_string().unwrap().as_deref(), Some(""));
        assert_eq!(s.read_nullable_string().unwrap(), None);
        assert_eq!(s.unread_byte_count(), 0);
    }

    #[test]
    fn null_requires_nullable() {
        let mut s = ReusableStream::with_capacity(8);
        assert_eq!(
            s.write_string_with(None, false, TextEncoding::Utf8).unwrap_err(),
            Error::NullNotAllowed
        );
        assert_eq!(s.length(), 0);
    }

    #[test]
    fn missing_null_flag_is_end_of_data() {
        let mut s = ReusableStream::from_vec(vec![0]);
        assert!(s.read_nullable_string().unwrap_err().is_exhaustion());
        assert_eq!(s.position(), 0);
    }

    /// Invariant: when the worst case overflows but the actual encoding fits, a non-growable stream accepts the write.
    #[test]
    fn worst_case_overflow_but_actual_fits() {
        //  Worst case: 1 + 18 bytes; actual: 1 + 6 bytes.
        let mut view = ReusableStream::from_vec(vec![0; 7]);
        view.reset_for_writing();
        view.write_string_with(Some("日本語"), false, TextEncoding::Utf16).unwrap();
        assert_eq!((view.length(), view.capacity()), (7, 7));

        view.reset_for_reading();
        assert_eq!(
            view.read_string_with(false, TextEncoding::Utf16, None).unwrap().as_deref(),
            Some("日本語")
        );

        //  Same on a growable stream: no growth.
        let mut owned = ReusableStream::with_capacity(7);
        owned.write_string_with(Some("日本語"), false, TextEncoding::Utf16).unwrap();
        assert_eq!(owned.capacity(), 7);

        //  Worst case: 1 + 6 bytes; actual: 1 + 3 bytes.
        let mut latin = ReusableStream::from_vec(vec![0; 4]);
        latin.reset_for_writing();
        latin.write_string_with(Some("éèê"), false, TextEncoding::Latin1).unwrap();
        assert_eq!(latin.written(), &[3, 0xE9, 0xE8, 0xEA]);
    }

    /// Invariant: when the actual encoding does not fit either, nothing is written.
    #[test]
    fn actual_overflow_is_refused_intact() {
        let mut view = ReusableStream::from_vec(vec![0; 6]);
        view.reset_for_writing();
        view.write_bytes(&[0xAA]).unwrap();

        let err = view
            .write_string_with(Some("日本語"), false, TextEncoding::Utf16)
            .unwrap_err();
        assert!(err.is_capacity(), "{err:?}");
        assert_eq!(view.written(), &[0xAA]);
        assert_eq!(view.position(), 1);
    }

    /// Invariant: the prefix is minimal even when the worst case needed a longer one.
    #[test]
    fn prefix_shrinks_to_actual_length() {
        //  80 UTF-8 bytes, 160 worst-case UTF-16 bytes, 80 actual UTF-16 bytes.
        let text = "é".repeat(40);

        let mut s = ReusableStream::with_capacity(256);
        s.write_string_with(Some(&text), false, TextEncoding::Utf16).unwrap();
        assert_eq!(s.length(), 81);
        assert_eq!(s.written()[0], 80);

        s.reset_for_reading();
        assert_eq!(&*s.read_string_with(false, TextEncoding::Utf16, None).unwrap().unwrap(), text);
    }

    /// Invariant: growth is driven by the exact size, not by a pessimistic worst case.
    #[test]
    fn growth_targets_exact_size() {
        //  Worst case: 2 + 1800 bytes; actual: 2 + 600 bytes.
        let text = "日".repeat(300);

        let mut s = ReusableStream::with_capacity(500);
        s.write_string_with(Some(&text), false, TextEncoding::Utf16).unwrap();
        assert_eq!((s.length(), s.capacity()), (602, 1000));

        s.reset_for_reading();
        assert_eq!(&*s.read_string_with(false, TextEncoding::Utf16, None).unwrap().unwrap(), text);

        //  Latin-1: worst case 2 + 600 bytes, actual 2 + 300 bytes.
        let mut latin = ReusableStream::with_capacity(100);
        latin.write_string_with(Some(&"é".repeat(300)), false, TextEncoding::Latin1).unwrap();
        assert_eq!((latin.length(), latin.capacity()), (302, 400));

        //  UTF-8 is size-exact: its worst case is the exact size.
        let mut utf8 = ReusableStream::with_capacity(100);
        utf8.write_string_with(Some(&"a".repeat(300)), false, TextEncoding::Utf8).unwrap();
        assert_eq!((utf8.length(), utf8.capacity()), (302, 400));
    }

    /// Invariant: an 8-byte string fills a capacity-8 stream exactly; a longer one grows it.
    #[test]
    fn capacity_eight_scenario() {
        let mut s = ReusableStream::with_capacity(8);
        assert_eq!(s.write_str_bytes("abcdefgh", None).unwrap(), 8);
        assert_eq!((s.length(), s.capacity()), (8, 8));

        s.reset_for_writing();
        assert_eq!(s.write_str_bytes("abcdefgé", None).unwrap(), 9);
        assert_eq!(s.length(), 9);
        assert!(s.capacity() >= 9);

        s.reset_for_reading();
        assert_eq!(s.read_str_bytes(9, None).unwrap(), "abcdefgé");

        let mut view = ReusableStream::from_vec(vec![0; 8]);
        view.reset_for_writing();
        assert!(view.write_str_bytes("abcdefgé", None).unwrap_err().is_capacity());
        assert_eq!(view.length(), 0);
    }

    #[test]
    fn default_encoding_applies() {
        let mut s = ReusableStream::with_capacity(8);
        s.set_encoding(TextEncoding::Utf32);
        s.write_str("ab").unwrap();
        assert_eq!(s.length(), 9);

        s.reset_for_reading();
        assert_eq!(&*s.read_string().unwrap(), "ab");
    }

    /// Invariant: lookups return the set's instance on a hit and never insert.
    #[test]
    fn lookup_interning() {
        let (set, mut s) = interning_stream(StringSetOptions::lookup(16));
        set.add("alpha", None).unwrap();

        s.write_str("alpha").unwrap();
        s.write_str("beta").unwrap();
        s.reset_for_reading();

        let alpha = s.read_string().unwrap();
        let canonical = set.get_existing_str("alpha", None).unwrap();
        assert!(Arc::ptr_eq(&alpha, &canonical));

        assert_eq!(&*s.read_string().unwrap(), "beta");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn auto_add_interning() {
        let (set, mut s) = interning_stream(StringSetOptions::auto_add(16));

        s.write_str("gamma").unwrap();
        s.write_str("gamma").unwrap();
        s.reset_for_reading();

        let first = s.read_string().unwrap();
        let second = s.read_string().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(set.len(), 1);
    }

    /// Invariant: strings longer than the threshold are never interned.
    #[test]
    fn threshold_limits_interning() {
        let (set, mut s) = interning_stream(StringSetOptions::auto_add(4));

        s.write_str("four").unwrap();
        s.write_str("fives").unwrap();
        s.reset_for_reading();

        s.read_string().unwrap();
        s.read_string().unwrap();
        assert_eq!(set.len(), 1);
        assert!(set.get_existing_str("fives", None).is_none());
    }

    #[test]
    fn call_site_options_override_default() {
        let (set, mut s) = interning_stream(StringSetOptions::default());

        s.write_str("delta").unwrap();
        s.write_str("delta").unwrap();
        s.reset_for_reading();

        //  Disabled by default: no interning.
        s.read_string().unwrap();
        assert!(set.is_empty());

        s.read_string_with(false, TextEncoding::Utf8, Some(StringSetOptions::auto_add(8)))
            .unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn non_utf8_encodings_intern_too() {
        let (set, mut s) = interning_stream(StringSetOptions::auto_add(64));
        s.set_encoding(TextEncoding::Utf16);

        s.write_str("x\u{1F600}").unwrap();
        s.reset_for_reading();
        let read = s.read_string().unwrap();

        assert!(Arc::ptr_eq(&read, &set.get_existing_str("x\u{1F600}", None).unwrap()));
    }

    /// Invariant: interning without a set is a state error, and the cursor does not move.
    #[test]
    fn interning_requires_string_set() {
        let mut s = ReusableStream::with_capacity(8);
        s.write_str("abc").unwrap();
        s.reset_for_reading();

        let err = s
            .read_string_with(false, TextEncoding::Utf8, Some(StringSetOptions::lookup(8)))
            .unwrap_err();
        assert_eq!(err, Error::NoStringSet);
        assert!(err.is_state());
        assert_eq!(s.position(), 0);

        //  Disabled options need no set.
        assert_eq!(&*s.read_string().unwrap(), "abc");
    }

    #[test]
    fn truncated_body_rewinds() {
        let mut s = ReusableStream::from_vec(vec![5, b'a', b'b']);
        assert!(s.read_string().unwrap_err().is_exhaustion());
        assert_eq!(s.position(), 0);
    }

    #[test]
    fn malformed_utf8_reads_lossy() {
        let mut s = ReusableStream::from_vec(vec![2, b'a', 0xFF]);
        assert_eq!(&*s.read_string().unwrap(), "a\u{FFFD}");
    }
}
