//! Cursor over column and chunk bytes.

use std::str;

use crate::leb128;
use crate::BufferError;

/// A bounds-checked reader over a borrowed byte slice.
///
/// Every read checks the remaining length first and returns
/// [`BufferError::EndOfBuffer`] instead of panicking, so a truncated column
/// surfaces as a format error.
///
/// # Example
///
/// ```
/// use columnar_buffers::Reader;
///
/// let data = [0x03, b'a', b'b', b'c', 0x7f];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.try_prefixed_utf8().unwrap(), "abc");
/// assert_eq!(reader.try_sleb128().unwrap(), -1);
/// assert!(reader.is_done());
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    pub uint8: &'a [u8],
    /// Offset of the next unread byte.
    pub x: usize,
    /// Reads stop here, even if `uint8` is longer.
    pub end: usize,
}

impl<'a> Reader<'a> {
    pub fn new(uint8: &'a [u8]) -> Self {
        let end = uint8.len();
        Self { uint8, x: 0, end }
    }

    /// Bytes left before `end`.
    pub fn size(&self) -> usize {
        self.end - self.x
    }

    /// Returns `true` once every byte up to `end` has been consumed.
    pub fn is_done(&self) -> bool {
        self.x >= self.end
    }

    pub fn position(&self) -> usize {
        self.x
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        (n <= self.size()).then_some(()).ok_or(BufferError::EndOfBuffer)
    }

    #[inline]
    pub fn try_u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let byte = self.uint8[self.x];
        self.x += 1;
        Ok(byte)
    }

    /// Borrows the next `size` bytes.
    pub fn try_buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let start = self.x;
        self.x += size;
        Ok(&self.uint8[start..self.x])
    }

    pub fn try_utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        let bin = self.try_buf(size)?;
        str::from_utf8(bin).map_err(|_| BufferError::InvalidUtf8)
    }

    /// Creates a reader over the next `size` bytes and advances past them.
    pub fn try_cut(&mut self, size: usize) -> Result<Reader<'a>, BufferError> {
        let bin = self.try_buf(size)?;
        Ok(Reader::new(bin))
    }

    /// Reads an unsigned LEB128 integer.
    pub fn try_uleb128(&mut self) -> Result<u64, BufferError> {
        let data = &self.uint8[..self.end];
        leb128::decode_unsigned(data, &mut self.x)
    }

    /// Reads a signed LEB128 integer.
    pub fn try_sleb128(&mut self) -> Result<i64, BufferError> {
        let data = &self.uint8[..self.end];
        leb128::decode_signed(data, &mut self.x)
    }

    /// Reads an unsigned LEB128 integer that must fit in 32 bits.
    pub fn try_uleb128_u32(&mut self) -> Result<u32, BufferError> {
        let val = self.try_uleb128()?;
        u32::try_from(val).map_err(|_| BufferError::Overflow { bits: 32 })
    }

    /// Reads an unsigned LEB128 length followed by that many bytes.
    pub fn try_prefixed_buf(&mut self) -> Result<&'a [u8], BufferError> {
        let len = self.try_uleb128()?;
        let len = usize::try_from(len).map_err(|_| BufferError::EndOfBuffer)?;
        self.try_buf(len)
    }

    /// Reads an unsigned LEB128 byte length followed by a UTF-8 string.
    pub fn try_prefixed_utf8(&mut self) -> Result<&'a str, BufferError> {
        let bin = self.try_prefixed_buf()?;
        str::from_utf8(bin).map_err(|_| BufferError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8() {
        let data = [0x01, 0x02];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_u8(), Ok(0x01));
        assert_eq!(reader.try_u8(), Ok(0x02));
        assert_eq!(reader.try_u8(), Err(BufferError::EndOfBuffer));
    }

    #[test]
    fn test_buf_out_of_bounds() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_buf(2), Ok(&data[..2]));
        assert_eq!(reader.try_buf(2), Err(BufferError::EndOfBuffer));
        // A failed read leaves the cursor where it was.
        assert_eq!(reader.size(), 1);
    }

    #[test]
    fn test_cut_is_independent() {
        let data = [0x02, 0xaa, 0xbb, 0x01];
        let mut reader = Reader::new(&data);
        let len = reader.try_uleb128().unwrap() as usize;
        let mut inner = reader.try_cut(len).unwrap();
        assert_eq!(inner.try_u8(), Ok(0xaa));
        assert_eq!(inner.try_u8(), Ok(0xbb));
        assert!(inner.is_done());
        assert_eq!(inner.try_u8(), Err(BufferError::EndOfBuffer));
        assert_eq!(reader.try_u8(), Ok(0x01));
        assert!(reader.is_done());
    }

    #[test]
    fn test_leb128_respects_end() {
        // The varint continues past `end`; the reader must not look there.
        let data = [0x80, 0x01];
        let mut reader = Reader::new(&data[..1]);
        assert_eq!(reader.try_uleb128(), Err(BufferError::EndOfBuffer));
    }

    #[test]
    fn test_u32_overflow() {
        let data = [0x80, 0x80, 0x80, 0x80, 0x10];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.try_uleb128_u32(), Err(BufferError::Overflow { bits: 32 }));
    }

    #[test]
    fn test_utf8() {
        let data = b"\x05hello\x02\xff\xfe";
        let mut reader = Reader::new(data);
        assert_eq!(reader.try_prefixed_utf8(), Ok("hello"));
        assert_eq!(reader.try_prefixed_utf8(), Err(BufferError::InvalidUtf8));
    }
}
