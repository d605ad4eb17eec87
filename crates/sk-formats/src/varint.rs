//! MIDI variable-length quantities and fixed-width big-endian integers.

use arrayvec::ArrayVec;

use crate::FormatError;

/// Longest variable-length quantity accepted on input.
pub const MAX_VARINT_LEN: usize = 4;

/// Largest value that fits in [`MAX_VARINT_LEN`] bytes (28 bits).
pub const MAX_VARINT: u32 = 0x0FFF_FFFF;

/// Encode `value` as a variable-length quantity, most significant group
/// first.
///
/// The low seven bits become the last byte; each higher group is stacked
/// in front of it with the continuation bit set. Values above
/// [`MAX_VARINT`] produce a fifth byte that [`decode_varint`] rejects.
pub fn encode_varint(value: u32) -> ArrayVec<u8, 5> {
    let mut v = value;
    let mut buffer: u64 = (v & 0x7F) as u64;
    v >>= 7;
    while v > 0 {
        buffer <<= 8;
        buffer |= ((v & 0x7F) | 0x80) as u64;
        v >>= 7;
    }
    let mut out = ArrayVec::new();
    loop {
        out.push(buffer as u8);
        if buffer & 0x80 != 0 {
            buffer >>= 8;
        } else {
            break;
        }
    }
    out
}

/// Append the encoding of `value` to `out`.
pub fn put_varint(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&encode_varint(value));
}

/// Decode a variable-length quantity from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_varint(bytes: &[u8]) -> Result<(u32, usize), FormatError> {
    let mut value: u32 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if i == MAX_VARINT_LEN {
            return Err(FormatError::MalformedVarint);
        }
        value = (value << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    if bytes.len() >= MAX_VARINT_LEN {
        Err(FormatError::MalformedVarint)
    } else {
        Err(FormatError::UnexpectedEof)
    }
}

pub fn encode_u16_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

pub fn encode_u32_be(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn put_u16_be(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&encode_u16_be(value));
}

pub fn put_u32_be(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&encode_u32_be(value));
}
