//! Errors returned by the string set and the reusable stream.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this library.
///
/// All errors are synchronous and local to the call that raised them; the
/// structure the call was made on is left exactly as it was before the call.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A `None` value was passed where the format cannot represent it.
    #[error("null value is not allowed for a non-nullable field")]
    NullNotAllowed,

    /// An argument described a range outside of its buffer.
    #[error("{what} is out of range: {value} exceeds {limit}")]
    OutOfRange {
        /// The argument at fault.
        what: &'static str,
        /// The offending value.
        value: usize,
        /// The largest acceptable value.
        limit: usize,
    },

    /// The stream has no backing buffer yet.
    #[error("stream has no backing buffer; call `replace_data` first")]
    Uninitialized,

    /// Interning was requested but no string set is attached.
    #[error("string interning requested but no string set is attached")]
    NoStringSet,

    /// The buffer must grow, but this instance does not allow growth.
    #[error("buffer cannot grow: {required} bytes required, capacity is {capacity}")]
    NotGrowable {
        /// Minimum buffer length required by the operation.
        required: usize,
        /// Current buffer length.
        capacity: usize,
    },

    /// The required size cannot be represented or allocated.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// Fewer bytes remain unread than the operation needs.
    #[error("end of data: {requested} bytes requested, {available} available")]
    EndOfData {
        /// Number of bytes the operation needed.
        requested: usize,
        /// Number of unread bytes.
        available: usize,
    },

    /// The bytes or characters do not form a valid value.
    #[error("invalid data: {0}")]
    InvalidData(&'static str),
}

impl Error {
    /// Returns true for errors caused by a bad argument.
    pub fn is_argument(&self) -> bool {
        matches!(self, Error::NullNotAllowed | Error::OutOfRange { .. })
    }

    /// Returns true for errors caused by using an instance in the wrong state.
    pub fn is_state(&self) -> bool {
        matches!(self, Error::Uninitialized | Error::NoStringSet)
    }

    /// Returns true for errors caused by a buffer or table that cannot grow.
    pub fn is_capacity(&self) -> bool {
        matches!(self, Error::NotGrowable { .. } | Error::CapacityOverflow)
    }

    /// Returns true for errors caused by reading past the written data.
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Error::EndOfData { .. })
    }

    pub(crate) fn out_of_range(what: &'static str, value: usize, limit: usize) -> Self {
        Error::OutOfRange { what, value, limit }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> Self {
        let kind = match &error {
            Error::NullNotAllowed | Error::OutOfRange { .. } => io::ErrorKind::InvalidInput,
            Error::EndOfData { .. } => io::ErrorKind::UnexpectedEof,
            Error::NotGrowable { .. } | Error::CapacityOverflow => io::ErrorKind::WriteZero,
            Error::InvalidData(_) => io::ErrorKind::InvalidData,
            Error::Uninitialized | Error::NoStringSet => io::ErrorKind::Other,
        };

        io::Error::new(kind, error)
    }
}
