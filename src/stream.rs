//! ReusableStream: one growable byte buffer, one cursor for reads and writes.
//!
//! State
//! - Uninitialized: no buffer. Every read or write fails with
//!   `Error::Uninitialized` until `replace_data` provides one.
//! - Ready: `offset <= cursor <= end <= buffer length` always holds, where
//!   `end` is the high-water mark of written (or supplied) data.
//!
//! Writes advance `end` when they move the cursor past it; reads never do.
//! `reset_for_writing` rewinds both cursor and `end` to the start of the
//! view, `reset_for_reading` rewinds only the cursor so the written data can
//! be read back.
//!
//! Layout
//! - Fixed-width values use the native byte order of the running process.
//!   The bytes are NOT portable across machines of differing endianness.
//!
//! Growth
//! - An owning stream doubles its buffer until the required size fits, then
//!   copies the existing bytes over. A view over caller-supplied data does not
//!   grow by default, and fails instead.
//! - Any slice previously borrowed from the buffer is invalidated by growth;
//!   the borrow checker enforces it.

use core::fmt;
use core::ops::Range;
use std::io::{self, SeekFrom};
use std::sync::Arc;

use crate::copy;
use crate::encoding::TextEncoding;
use crate::error::{Error, Result};
use crate::options::StringSetOptions;
use crate::string_set::StringSet;

/// A reusable binary read/write buffer.
///
/// Intended for one owner at a time; share the attached `StringSet` across
/// streams instead of sharing a stream across threads.
pub struct ReusableStream {
    pub(crate) data: Option<Vec<u8>>,
    pub(crate) can_grow: bool,
    pub(crate) offset: usize,
    pub(crate) cursor: usize,
    pub(crate) end: usize,
    pub(crate) encoding: TextEncoding,
    pub(crate) string_set: Option<Arc<StringSet>>,
    pub(crate) string_set_options: StringSetOptions,
    pub(crate) scratch: String,
}

impl ReusableStream {
    /// Creates a stream without a buffer.
    pub fn new() -> Self {
        Self {
            data: None,
            can_grow: false,
            offset: 0,
            cursor: 0,
            end: 0,
            encoding: TextEncoding::default(),
            string_set: None,
            string_set_options: StringSetOptions::default(),
            scratch: String::new(),
        }
    }

    /// Creates a growable stream owning a buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut stream = Self::new();
        stream.install(vec![0; capacity], 0, 0, true);
        stream
    }

    /// Creates a non-growable stream over `data`, all of which is readable.
    pub fn from_vec(data: Vec<u8>) -> Self {
        let length = data.len();
        let mut stream = Self::new();
        stream.install(data, 0, length, false);
        stream
    }

    /// Attaches a string set and the default interning options, builder-style.
    pub fn with_string_set(mut self, set: Arc<StringSet>, options: StringSetOptions) -> Self {
        self.string_set = Some(set);
        self.string_set_options = options;
        self
    }

    /// Replaces the buffer with `data`, exposing `data[offset..offset + length]` as readable.
    ///
    /// Cursor and high-water mark are reset; the view may later be written up to the end of `data`, and beyond
    /// only if `can_grow`.
    pub fn replace_data(&mut self, data: Vec<u8>, offset: usize, length: usize, can_grow: bool) -> Result<()> {
        if offset > data.len() {
            return Err(Error::out_of_range("offset", offset, data.len()));
        }

        if length > data.len() - offset {
            return Err(Error::out_of_range("offset + length", offset.saturating_add(length), data.len()));
        }

        self.install(data, offset, length, can_grow);
        Ok(())
    }

    /// Removes the buffer, returning the stream to the uninitialized state.
    pub fn take_data(&mut self) -> Option<Vec<u8>> {
        self.offset = 0;
        self.cursor = 0;
        self.end = 0;
        self.data.take()
    }

    /// Consumes the stream, returning its buffer.
    pub fn into_vec(mut self) -> Option<Vec<u8>> {
        self.take_data()
    }

    /// Returns true once a buffer is attached.
    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    /// Returns true if the buffer may be reallocated when full.
    pub fn can_grow(&self) -> bool {
        self.can_grow
    }

    /// Allows or forbids growth.
    pub fn set_can_grow(&mut self, can_grow: bool) {
        self.can_grow = can_grow;
    }

    /// Cursor position, relative to the start of the view.
    pub fn position(&self) -> usize {
        self.cursor - self.offset
    }

    /// Length of the data, relative to the start of the view.
    pub fn length(&self) -> usize {
        self.end - self.offset
    }

    /// Bytes available in the view without growing.
    pub fn capacity(&self) -> usize {
        self.data.as_ref().map_or(0, |data| data.len() - self.offset)
    }

    /// Bytes between the cursor and the high-water mark.
    pub fn unread_byte_count(&self) -> usize {
        self.end - self.cursor
    }

    /// The data of the view, from its start to the high-water mark.
    pub fn written(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[self.offset..self.end],
            None => &[],
        }
    }

    /// The data between the cursor and the high-water mark.
    pub fn unread(&self) -> &[u8] {
        match &self.data {
            Some(data) => &data[self.cursor..self.end],
            None => &[],
        }
    }

    /// Default encoding of string codecs.
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Sets the default encoding of string codecs.
    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    /// The string set consulted when reading strings, if any.
    pub fn string_set(&self) -> Option<&Arc<StringSet>> {
        self.string_set.as_ref()
    }

    /// Attaches or detaches the string set consulted when reading strings.
    pub fn set_string_set(&mut self, set: Option<Arc<StringSet>>) {
        self.string_set = set;
    }

    /// Default interning options of string reads.
    pub fn string_set_options(&self) -> StringSetOptions {
        self.string_set_options
    }

    /// Sets the default interning options of string reads.
    pub fn set_string_set_options(&mut self, options: StringSetOptions) {
        self.string_set_options = options;
    }

    /// Rewinds cursor and high-water mark to the start of the view, keeping the buffer.
    pub fn reset_for_writing(&mut self) {
        self.cursor = self.offset;
        self.end = self.offset;
    }

    /// Rewinds the cursor to the start of the view, so that written data can be read again.
    pub fn reset_for_reading(&mut self) {
        self.cursor = self.offset;
    }

    /// Moves the cursor, which must stay between the start of the view and the high-water mark.
    ///
    /// Returns the new position.
    pub fn seek_to(&mut self, target: SeekFrom) -> Result<u64> {
        self.check_initialized()?;

        let (base, delta) = match target {
            SeekFrom::Start(n) => (self.offset as i128, i128::from(n)),
            SeekFrom::Current(n) => (self.cursor as i128, i128::from(n)),
            SeekFrom::End(n) => (self.end as i128, i128::from(n)),
        };

        let cursor = base + delta;

        if cursor < self.offset as i128 || cursor > self.end as i128 {
            let value = usize::try_from(cursor - self.offset as i128).unwrap_or(usize::MAX);
            return Err(Error::out_of_range("seek position", value, self.length()));
        }

        self.cursor = cursor as usize;
        Ok(self.position() as u64)
    }

    /// Advances the cursor over `count` unread bytes.
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.read_slot(count).map(|_| ())
    }

    /// Moves the high-water mark to `length` bytes past the start of the view, growing if allowed.
    ///
    /// The cursor is pulled back if it ends up past the new mark.
    pub fn set_length(&mut self, length: usize) -> Result<()> {
        self.check_initialized()?;

        let end = self.offset.checked_add(length).ok_or(Error::CapacityOverflow)?;
        self.ensure_capacity(end)?;

        self.end = end;
        self.cursor = self.cursor.min(end);
        Ok(())
    }

    /// Reads one byte, or `None` if no unread byte remains.
    ///
    /// Fails with `Uninitialized` if the stream has no buffer.
    pub fn read_byte(&mut self) -> Result<Option<u8>> {
        let data = self.data.as_ref().ok_or(Error::Uninitialized)?;

        if self.cursor >= self.end {
            return Ok(None);
        }

        let byte = data[self.cursor];
        self.cursor += 1;
        Ok(Some(byte))
    }

    /// Reads up to `buffer.len()` bytes, returning how many were read.
    pub fn read_into(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let count = buffer.len().min(self.unread_byte_count());
        let bytes = self.read_slot(count)?;

        copy::copy(bytes, buffer);
        Ok(count)
    }

    /// Reads exactly `count` bytes, borrowing them from the buffer.
    pub fn read_bytes(&mut self, count: usize) -> Result<&[u8]> {
        self.read_slot(count)
    }

    /// Writes all of `bytes`, growing if necessary and allowed.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let slot = self.write_slot(bytes.len())?;

        copy::copy(bytes, slot);
        Ok(())
    }

    /// Writes the unread bytes to `writer`, consuming them.
    pub fn copy_to<W>(&mut self, writer: &mut W) -> io::Result<u64>
    where
        W: io::Write,
    {
        let count = self.unread_byte_count();
        let bytes = self.read_slot(count)?;

        writer.write_all(bytes)?;
        Ok(count as u64)
    }
}

//  Crate methods.
impl ReusableStream {
    pub(crate) fn check_initialized(&self) -> Result<()> {
        if self.data.is_none() {
            return Err(Error::Uninitialized);
        }

        Ok(())
    }

    //  Bytes between the cursor and the end of the buffer.
    pub(crate) fn remaining_capacity(&self) -> Result<usize> {
        let data = self.data.as_ref().ok_or(Error::Uninitialized)?;

        Ok(data.len() - self.cursor)
    }

    //  Ensures the buffer is at least `required` bytes long, doubling it as needed.
    //
    //  On failure the buffer is untouched.
    pub(crate) fn ensure_capacity(&mut self, required: usize) -> Result<()> {
        let can_grow = self.can_grow;
        let data = self.data.as_mut().ok_or(Error::Uninitialized)?;

        if required <= data.len() {
            return Ok(());
        }

        if !can_grow {
            tracing::warn!(required, capacity = data.len(), "non-growable stream is full");

            return Err(Error::NotGrowable {
                required,
                capacity: data.len(),
            });
        }

        let mut length = data.len().max(1);

        while length < required {
            length = length.checked_mul(2).unwrap_or(required);
        }

        if length > isize::MAX as usize {
            length = required;
        }

        data.try_reserve_exact(length - data.len())
            .map_err(|_| Error::CapacityOverflow)?;

        tracing::debug!(old_length = data.len(), new_length = length, required, "stream grew");

        data.resize(length, 0);
        Ok(())
    }

    //  Reserves `count` bytes at the cursor for writing, and moves the cursor past them.
    pub(crate) fn write_slot(&mut self, count: usize) -> Result<&mut [u8]> {
        self.check_initialized()?;

        let start = self.cursor;
        let end = start.checked_add(count).ok_or(Error::CapacityOverflow)?;

        self.ensure_capacity(end)?;

        self.cursor = end;
        self.end = self.end.max(end);

        let data = self.data.as_mut().ok_or(Error::Uninitialized)?;

        Ok(&mut data[start..end])
    }

    //  Borrows the next `count` unread bytes, and moves the cursor past them.
    pub(crate) fn read_slot(&mut self, count: usize) -> Result<&[u8]> {
        let range = self.read_range(count)?;
        let data = self.data.as_ref().ok_or(Error::Uninitialized)?;

        Ok(&data[range])
    }

    //  Same as `read_slot`, returning the absolute range instead of borrowing it.
    pub(crate) fn read_range(&mut self, count: usize) -> Result<Range<usize>> {
        self.check_initialized()?;

        let available = self.end - self.cursor;

        if count > available {
            return Err(Error::EndOfData {
                requested: count,
                available,
            });
        }

        let start = self.cursor;
        self.cursor += count;

        Ok(start..start + count)
    }

    fn install(&mut self, data: Vec<u8>, offset: usize, length: usize, can_grow: bool) {
        debug_assert!(offset + length <= data.len());

        self.data = Some(data);
        self.can_grow = can_grow;
        self.offset = offset;
        self.cursor = offset;
        self.end = offset + length;
    }
}

impl Default for ReusableStream {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReusableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReusableStream")
            .field("initialized", &self.is_initialized())
            .field("can_grow", &self.can_grow)
            .field("offset", &self.offset)
            .field("position", &self.position())
            .field("length", &self.length())
            .field("capacity", &self.capacity())
            .field("encoding", &self.encoding)
            .field("string_set", &self.string_set.is_some())
            .field("string_set_options", &self.string_set_options)
            .finish()
    }
}

impl io::Read for ReusableStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl io::Write for ReusableStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Seek for ReusableStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        Ok(self.seek_to(pos)?)
    }
}
