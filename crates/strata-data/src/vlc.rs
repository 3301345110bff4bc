//! Variable-length integer coding
//!
//! A signed 64-bit value is written as big-endian groups of 7 bits. Bit 7 of
//! every byte except the last is the continuation flag, and bit 6 of the
//! first byte carries the sign. The shortest form is the only valid form: a
//! leading `0x80` followed by a byte with bit 6 clear, or a leading `0xFF`
//! followed by a byte with bit 6 set, is rejected as non-canonical.

use crate::{DataError, DataResult};
use bytes::{Buf, BufMut};

const DATA_BITS: u32 = 7;
const DATA_MASK: u8 = 0x7F;
const CONTINUATION: u8 = 0x80;
const SIGN: u8 = 0x40;

/// Largest encoding of an i64
pub const MAX_VLC_LENGTH: usize = 10;

/// Number of bytes needed to encode `value`
pub fn encoded_len(value: i64) -> usize {
    let leading = if value < 0 {
        (!value).leading_zeros()
    } else {
        value.leading_zeros()
    };
    // significant bits plus one sign bit
    let bits = (64 - leading + 1) as usize;
    bits.div_ceil(DATA_BITS as usize)
}

/// Encode a signed integer
pub fn write(value: i64, buf: &mut impl BufMut) {
    let len = encoded_len(value);
    for i in (0..len).rev() {
        let group = ((value >> (DATA_BITS as usize * i)) as u8) & DATA_MASK;
        if i > 0 {
            buf.put_u8(group | CONTINUATION);
        } else {
            buf.put_u8(group);
        }
    }
}

/// Decode a signed integer, rejecting truncated, overlong and overflowing input
pub fn read(buf: &mut impl Buf) -> DataResult<i64> {
    if !buf.has_remaining() {
        return Err(DataError::bad_format("truncated VLC integer"));
    }
    let first = buf.get_u8();
    // sign-extend the 7 data bits of the first byte
    let mut value = (((first << 1) as i8) >> 1) as i64;
    let mut current = first;
    let mut length = 1;

    while current & CONTINUATION != 0 {
        if !buf.has_remaining() {
            return Err(DataError::bad_format("truncated VLC integer"));
        }
        let next = buf.get_u8();
        if length == 1 {
            let redundant = (first == 0x80 && next & SIGN == 0) || (first == 0xFF && next & SIGN != 0);
            if redundant {
                return Err(DataError::bad_format("non-canonical VLC integer"));
            }
        }
        if value > (i64::MAX >> DATA_BITS) || value < (i64::MIN >> DATA_BITS) {
            return Err(DataError::bad_format("VLC integer overflow"));
        }
        value = (value << DATA_BITS) | (next & DATA_MASK) as i64;
        current = next;
        length += 1;
    }
    Ok(value)
}

/// Encode a count or length. Counts are bounded by `i64::MAX`.
pub fn write_count(count: u64, buf: &mut impl BufMut) {
    write(count as i64, buf)
}

/// Decode a count or length, rejecting negative values
pub fn read_count(buf: &mut impl Buf) -> DataResult<u64> {
    let value = read(buf)?;
    if value < 0 {
        return Err(DataError::bad_format(format!("negative count {}", value)));
    }
    Ok(value as u64)
}
