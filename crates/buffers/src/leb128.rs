//! LEB128 variable-length integers.
//!
//! Unsigned values are written as little-endian 7-bit groups, the high bit
//! of every byte except the last set as a continuation flag. Signed values
//! use the same layout over the two's complement representation; bit 6 of
//! the final byte carries the sign.

use crate::BufferError;

/// Longest encoding of a 64-bit value.
pub const MAX_LEB128_LEN: usize = 10;

pub fn encode_unsigned(mut value: u64, out: &mut [u8; MAX_LEB128_LEN]) -> usize {
    let mut n = 0;
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out[n] = byte;
        n += 1;
        if value == 0 {
            return n;
        }
    }
}

pub fn encode_signed(mut value: i64, out: &mut [u8; MAX_LEB128_LEN]) -> usize {
    let mut n = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        out[n] = if done { byte } else { byte | 0x80 };
        n += 1;
        if done {
            return n;
        }
    }
}

/// Number of bytes [`encode_unsigned`] produces for `value`.
pub fn unsigned_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Number of bytes [`encode_signed`] produces for `value`.
pub fn signed_len(value: i64) -> usize {
    // One extra bit for the sign.
    let magnitude = (if value < 0 { !value } else { value }) as u64;
    let bits = 64 - magnitude.leading_zeros() as usize + 1;
    bits.div_ceil(7)
}

pub fn decode_unsigned(data: &[u8], pos: &mut usize) -> Result<u64, BufferError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *data.get(*pos).ok_or(BufferError::EndOfBuffer)?;
        *pos += 1;
        let low = (byte & 0x7f) as u64;
        if shift >= 64 || (shift == 63 && low > 1) {
            return Err(BufferError::Overflow { bits: 64 });
        }
        result |= low << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn decode_signed(data: &[u8], pos: &mut usize) -> Result<i64, BufferError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;
    loop {
        let byte = *data.get(*pos).ok_or(BufferError::EndOfBuffer)?;
        *pos += 1;
        // The tenth byte may only hold sign extension of bit 63.
        if shift == 63 && byte != 0x00 && byte != 0x7f {
            return Err(BufferError::Overflow { bits: 64 });
        }
        result |= ((byte & 0x7f) as i64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                result |= -1i64 << shift;
            }
            return Ok(result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unsigned(value: u64) -> Vec<u8> {
        let mut out = [0u8; MAX_LEB128_LEN];
        let n = encode_unsigned(value, &mut out);
        out[..n].to_vec()
    }

    fn signed(value: i64) -> Vec<u8> {
        let mut out = [0u8; MAX_LEB128_LEN];
        let n = encode_signed(value, &mut out);
        out[..n].to_vec()
    }

    #[test]
    fn unsigned_known_encodings() {
        assert_eq!(unsigned(0), [0x00]);
        assert_eq!(unsigned(127), [0x7f]);
        assert_eq!(unsigned(128), [0x80, 0x01]);
        assert_eq!(unsigned(624_485), [0xe5, 0x8e, 0x26]);
    }

    #[test]
    fn signed_known_encodings() {
        assert_eq!(signed(0), [0x00]);
        assert_eq!(signed(-1), [0x7f]);
        assert_eq!(signed(63), [0x3f]);
        assert_eq!(signed(64), [0xc0, 0x00]);
        assert_eq!(signed(-64), [0x40]);
        assert_eq!(signed(-123_456), [0xc0, 0xbb, 0x78]);
    }

    #[test]
    fn lengths_match_encoders() {
        for v in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            assert_eq!(unsigned_len(v), unsigned(v).len(), "unsigned {v}");
        }
        for v in [0i64, 1, -1, 63, 64, -64, -65, 8191, -8192, i64::MAX, i64::MIN] {
            assert_eq!(signed_len(v), signed(v).len(), "signed {v}");
        }
    }

    #[test]
    fn extremes_decode() {
        let mut pos = 0;
        assert_eq!(decode_unsigned(&unsigned(u64::MAX), &mut pos), Ok(u64::MAX));
        for v in [i64::MAX, i64::MIN, -1, 0] {
            let mut pos = 0;
            assert_eq!(decode_signed(&signed(v), &mut pos), Ok(v));
        }
    }

    #[test]
    fn truncated_input_is_end_of_buffer() {
        let mut pos = 0;
        assert_eq!(decode_unsigned(&[0x80, 0x80], &mut pos), Err(BufferError::EndOfBuffer));
        let mut pos = 0;
        assert_eq!(decode_signed(&[], &mut pos), Err(BufferError::EndOfBuffer));
    }

    #[test]
    fn too_many_bits_overflow() {
        let data = [0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x02];
        let mut pos = 0;
        assert_eq!(decode_unsigned(&data, &mut pos), Err(BufferError::Overflow { bits: 64 }));
        let mut pos = 0;
        assert_eq!(decode_signed(&data, &mut pos), Err(BufferError::Overflow { bits: 64 }));
    }

    #[test]
    fn decode_advances_position() {
        let data = [0xe5, 0x8e, 0x26, 0x7f];
        let mut pos = 0;
        assert_eq!(decode_unsigned(&data, &mut pos), Ok(624_485));
        assert_eq!(pos, 3);
        assert_eq!(decode_signed(&data, &mut pos), Ok(-1));
        assert_eq!(pos, 4);
    }
}
