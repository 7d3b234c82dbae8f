//! Fixed-width values and variable-length integers on a `ReusableStream`.
//!
//! Every `NativeValue` is written in the native byte order of the running
//! process, with no padding nor tag.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::stream::ReusableStream;
use crate::var_uint;

/// A fixed-width value with a native-endian binary representation.
pub trait NativeValue: Sized {
    /// Number of bytes of the representation.
    const SIZE: usize;

    /// The representation itself, `SIZE` bytes long.
    type Bytes: AsRef<[u8]>;

    /// Converts to the binary representation.
    fn to_native_bytes(&self) -> Result<Self::Bytes>;

    /// Converts from the binary representation; `bytes` is exactly `SIZE` bytes long.
    fn from_native_bytes(bytes: &[u8]) -> Result<Self>;
}

macro_rules! native_number {
    ($($t:ty)*) => {
        $(
            impl NativeValue for $t {
                const SIZE: usize = core::mem::size_of::<$t>();

                type Bytes = [u8; core::mem::size_of::<$t>()];

                #[inline]
                fn to_native_bytes(&self) -> Result<Self::Bytes> {
                    Ok(self.to_ne_bytes())
                }

                #[inline]
                fn from_native_bytes(bytes: &[u8]) -> Result<Self> {
                    let bytes = bytes.try_into().map_err(|_| Error::InvalidData("wrong value width"))?;

                    Ok(<$t>::from_ne_bytes(bytes))
                }
            }
        )*
    };
}

native_number!(u8 i8 u16 i16 u32 i32 u64 i64 u128 i128 f32 f64);

/// A single byte, `0` or `1`; any non-zero byte reads as `true`.
impl NativeValue for bool {
    const SIZE: usize = 1;

    type Bytes = [u8; 1];

    fn to_native_bytes(&self) -> Result<Self::Bytes> {
        Ok([u8::from(*self)])
    }

    fn from_native_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(u8::from_native_bytes(bytes)? != 0)
    }
}

/// The 16 bytes of the UUID, in RFC 4122 order.
impl NativeValue for Uuid {
    const SIZE: usize = 16;

    type Bytes = [u8; 16];

    fn to_native_bytes(&self) -> Result<Self::Bytes> {
        Ok(*self.as_bytes())
    }

    fn from_native_bytes(bytes: &[u8]) -> Result<Self> {
        Uuid::from_slice(bytes).map_err(|_| Error::InvalidData("wrong value width"))
    }
}

const TICKS_PER_SECOND: i64 = 10_000_000;
const NANOS_PER_TICK: u32 = 100;

/// 100-nanosecond ticks since the Unix epoch, as a native-endian `i64`.
///
/// Covers about 29,000 years either side of 1970. Precision below one tick is truncated towards the past.
impl NativeValue for DateTime<Utc> {
    const SIZE: usize = 8;

    type Bytes = [u8; 8];

    fn to_native_bytes(&self) -> Result<Self::Bytes> {
        let ticks = self
            .timestamp()
            .checked_mul(TICKS_PER_SECOND)
            .and_then(|ticks| ticks.checked_add(i64::from(self.timestamp_subsec_nanos() / NANOS_PER_TICK)))
            .ok_or(Error::InvalidData("date-time outside the range of i64 ticks"))?;

        ticks.to_native_bytes()
    }

    fn from_native_bytes(bytes: &[u8]) -> Result<Self> {
        let ticks = i64::from_native_bytes(bytes)?;

        let seconds = ticks.div_euclid(TICKS_PER_SECOND);
        let nanos = ticks.rem_euclid(TICKS_PER_SECOND) as u32 * NANOS_PER_TICK;

        Utc.timestamp_opt(seconds, nanos)
            .single()
            .ok_or(Error::InvalidData("date-time outside the supported range"))
    }
}

impl ReusableStream {
    /// Writes a fixed-width value at the cursor.
    pub fn write_value<T>(&mut self, value: T) -> Result<()>
    where
        T: NativeValue,
    {
        let bytes = value.to_native_bytes()?;

        self.write_bytes(bytes.as_ref())
    }

    /// Reads a fixed-width value at the cursor.
    ///
    /// Fails, leaving the cursor unchanged, if fewer than `T::SIZE` bytes remain unread.
    pub fn read_value<T>(&mut self) -> Result<T>
    where
        T: NativeValue,
    {
        let checkpoint = self.cursor;
        let bytes = self.read_slot(T::SIZE)?;

        let result = T::from_native_bytes(bytes);

        if result.is_err() {
            self.cursor = checkpoint;
        }

        result
    }

    /// Writes `value` as a variable-length unsigned integer.
    pub fn write_var_uint(&mut self, value: u64) -> Result<()> {
        let slot = self.write_slot(var_uint::byte_count(value))?;

        var_uint::encode(value, slot);
        Ok(())
    }

    /// Reads a variable-length unsigned integer.
    ///
    /// Fails, leaving the cursor unchanged, on truncated or over-long input.
    pub fn read_var_uint(&mut self) -> Result<u64> {
        self.check_initialized()?;

        let (value, consumed) = var_uint::decode(self.unread())?;

        self.cursor += consumed;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invariant: every value reads back as written, in native byte order.
    #[test]
    fn primitives_round_trip() {
        let mut s = ReusableStream::with_capacity(1);

        s.write_value(0xABu8).unwrap();
        s.write_value(-5i8).unwrap();
        s.write_value(0xBEEFu16).unwrap();
        s.write_value(i16::MIN).unwrap();
        s.write_value(0xDEAD_BEEFu32).unwrap();
        s.write_value(-123_456i32).unwrap();
        s.write_value(u64::MAX).unwrap();
        s.write_value(i64::MIN).unwrap();
        s.write_value(u128::MAX - 1).unwrap();
        s.write_value(-1i128).unwrap();
        s.write_value(3.5f32).unwrap();
        s.write_value(-0.1f64).unwrap();
        s.write_value(true).unwrap();
        s.write_value(false).unwrap();
        s.write_value(0xD83Du16).unwrap();

        s.reset_for_reading();

        assert_eq!(s.read_value::<u8>().unwrap(), 0xAB);
        assert_eq!(s.read_value::<i8>().unwrap(), -5);
        assert_eq!(s.read_value::<u16>().unwrap(), 0xBEEF);
        assert_eq!(s.read_value::<i16>().unwrap(), i16::MIN);
        assert_eq!(s.read_value::<u32>().unwrap(), 0xDEAD_BEEF);
        assert_eq!(s.read_value::<i32>().unwrap(), -123_456);
        assert_eq!(s.read_value::<u64>().unwrap(), u64::MAX);
        assert_eq!(s.read_value::<i64>().unwrap(), i64::MIN);
        assert_eq!(s.read_value::<u128>().unwrap(), u128::MAX - 1);
        assert_eq!(s.read_value::<i128>().unwrap(), -1);
        assert_eq!(s.read_value::<f32>().unwrap(), 3.5);
        assert_eq!(s.read_value::<f64>().unwrap(), -0.1);
        assert!(s.read_value::<bool>().unwrap());
        assert!(!s.read_value::<bool>().unwrap());
        assert_eq!(s.read_value::<u16>().unwrap(), 0xD83D);
        assert_eq!(s.unread_byte_count(), 0);
    }

    #[test]
    fn native_byte_order() {
        let mut s = ReusableStream::with_capacity(4);
        s.write_value(0x0102_0304u32).unwrap();
        assert_eq!(s.written(), &0x0102_0304u32.to_ne_bytes());
    }

    #[test]
    fn bool_is_one_byte() {
        let mut s = ReusableStream::with_capacity(2);
        s.write_value(true).unwrap();
        s.write_value(false).unwrap();
        assert_eq!(s.written(), &[1, 0]);
    }

    #[test]
    fn uuid_and_date_time_round_trip() {
        let id = Uuid::from_u128(0x0123_4567_89AB_CDEF_0011_2233_4455_6677);
        let recent = Utc.timestamp_nanos(1_700_000_000_123_456_700);
        let first = Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap();
        let early = Utc.with_ymd_and_hms(1600, 1, 1, 12, 30, 0).unwrap();
        let far = Utc.with_ymd_and_hms(3000, 1, 1, 0, 0, 0).unwrap();
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap() + chrono::Duration::nanoseconds(999_999_900);

        let mut s = ReusableStream::with_capacity(8);
        s.write_value(id).unwrap();
        for when in [recent, first, early, far, last] {
            s.write_value(when).unwrap();
        }
        assert_eq!(s.length(), 16 + 5 * 8);

        s.reset_for_reading();
        assert_eq!(s.read_value::<Uuid>().unwrap(), id);
        for when in [recent, first, early, far, last] {
            assert_eq!(s.read_value::<DateTime<Utc>>().unwrap(), when);
        }
    }

    /// Invariant: sub-tick precision is truncated towards the past, before and after the epoch.
    #[test]
    fn date_time_truncates_to_ticks() {
        let after = Utc.timestamp_nanos(1_234_567_899);
        let before = Utc.timestamp_nanos(-1_234_567_899);

        let mut s = ReusableStream::with_capacity(16);
        s.write_value(after).unwrap();
        s.write_value(before).unwrap();

        s.reset_for_reading();
        assert_eq!(s.read_value::<DateTime<Utc>>().unwrap(), Utc.timestamp_nanos(1_234_567_800));
        assert_eq!(s.read_value::<DateTime<Utc>>().unwrap(), Utc.timestamp_nanos(-1_234_567_900));
    }

    #[test]
    fn unrepresentable_date_time_is_rejected_before_writing() {
        let far = Utc.with_ymd_and_hms(100_000, 1, 1, 0, 0, 0).unwrap();
        let mut s = ReusableStream::with_capacity(8);
        assert!(matches!(s.write_value(far), Err(Error::InvalidData(_))));
        assert_eq!(s.length(), 0);
    }

    /// Invariant: a short read fails and leaves the cursor where it was.
    #[test]
    fn short_read_fails_in_place() {
        let mut s = ReusableStream::from_vec(vec![1, 2, 3]);
        assert!(s.read_value::<u32>().unwrap_err().is_exhaustion());
        assert_eq!(s.position(), 0);
        assert_eq!(s.read_value::<u16>().unwrap(), u16::from_ne_bytes([1, 2]));
    }

    #[test]
    fn var_uint_on_stream() {
        let mut s = ReusableStream::with_capacity(1);
        for value in [0, 1, 127, 128, 16_383, 16_384, u64::MAX] {
            s.write_var_uint(value).unwrap();
        }
        assert_eq!(s.length(), 1 + 1 + 1 + 2 + 2 + 3 + 10);

        s.reset_for_reading();
        for value in [0, 1, 127, 128, 16_383, 16_384, u64::MAX] {
            assert_eq!(s.read_var_uint().unwrap(), value);
        }

        let mut truncated = ReusableStream::from_vec(vec![0x80]);
        assert!(truncated.read_var_uint().unwrap_err().is_exhaustion());
        assert_eq!(truncated.position(), 0);
    }
}
