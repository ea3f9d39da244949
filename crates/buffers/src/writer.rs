//! Growable output buffer shared by every column encoder.

use crate::leb128::{self, MAX_LEB128_LEN};
use crate::BufferError;

/// Initial allocation of [`Writer::new`].
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

/// Capacity multiplier applied whenever a write would reach the end.
pub const GROWTH_FACTOR: usize = 4;

/// Append-only byte buffer.
///
/// Growth happens in place: bytes already written keep their offsets.
///
/// # Example
///
/// ```
/// use columnar_buffers::Writer;
///
/// let mut writer = Writer::with_capacity(4);
/// writer.u8(0x01).unwrap();
/// writer.uleb128(300).unwrap();
/// assert_eq!(writer.flush(), [0x01, 0xac, 0x02]);
/// ```
#[derive(Debug, Clone)]
pub struct Writer {
    /// Backing storage; its length is the capacity.
    pub uint8: Vec<u8>,
    /// Start of the unflushed bytes.
    pub x0: usize,
    /// End of the written bytes.
    pub x: usize,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A zero capacity is bumped to one byte so growth can multiply it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            uint8: vec![0u8; capacity.max(1)],
            x0: 0,
            x: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.uint8.len()
    }

    /// Number of bytes written since the last flush.
    pub fn len(&self) -> usize {
        self.x - self.x0
    }

    pub fn is_empty(&self) -> bool {
        self.x == self.x0
    }

    /// Ensures `n` more bytes can be written without reaching the end of
    /// the buffer, multiplying the capacity by [`GROWTH_FACTOR`] as often
    /// as needed.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<(), BufferError> {
        let required = self
            .x
            .checked_add(n)
            .ok_or(BufferError::Alloc { requested: usize::MAX })?;
        if required < self.uint8.len() {
            return Ok(());
        }
        let mut new_size = self.uint8.len();
        while new_size <= required {
            new_size = new_size
                .checked_mul(GROWTH_FACTOR)
                .ok_or(BufferError::Alloc { requested: required })?;
        }
        self.grow(new_size)
    }

    fn grow(&mut self, new_size: usize) -> Result<(), BufferError> {
        let additional = new_size - self.uint8.len();
        self.uint8
            .try_reserve_exact(additional)
            .map_err(|_| BufferError::Alloc { requested: new_size })?;
        self.uint8.resize(new_size, 0);
        Ok(())
    }

    /// Copies out the unflushed bytes and marks them flushed.
    pub fn flush(&mut self) -> Vec<u8> {
        let out = self.as_slice().to_vec();
        self.x0 = self.x;
        out
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.uint8[self.x0..self.x]
    }

    /// Consumes the writer, returning the data written since the last flush.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.uint8.truncate(self.x);
        if self.x0 > 0 {
            self.uint8.drain(..self.x0);
        }
        self.uint8
    }

    /// Writes an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self, val: u8) -> Result<(), BufferError> {
        self.ensure_capacity(1)?;
        self.uint8[self.x] = val;
        self.x += 1;
        Ok(())
    }

    /// Writes a byte slice. Returns the number of bytes written.
    pub fn buf(&mut self, buf: &[u8]) -> Result<usize, BufferError> {
        let length = buf.len();
        self.ensure_capacity(length)?;
        self.uint8[self.x..self.x + length].copy_from_slice(buf);
        self.x += length;
        Ok(length)
    }

    /// Writes a UTF-8 string. Returns the number of bytes written.
    pub fn utf8(&mut self, s: &str) -> Result<usize, BufferError> {
        self.buf(s.as_bytes())
    }

    /// Writes an unsigned LEB128 integer. Returns the number of bytes written.
    pub fn uleb128(&mut self, val: u64) -> Result<usize, BufferError> {
        let mut scratch = [0u8; MAX_LEB128_LEN];
        let n = leb128::encode_unsigned(val, &mut scratch);
        self.buf(&scratch[..n])
    }

    /// Writes a signed LEB128 integer. Returns the number of bytes written.
    pub fn sleb128(&mut self, val: i64) -> Result<usize, BufferError> {
        let mut scratch = [0u8; MAX_LEB128_LEN];
        let n = leb128::encode_signed(val, &mut scratch);
        self.buf(&scratch[..n])
    }

    /// Writes an unsigned LEB128 length followed by the bytes.
    pub fn prefixed_buf(&mut self, buf: &[u8]) -> Result<usize, BufferError> {
        let head = self.uleb128(buf.len() as u64)?;
        Ok(head + self.buf(buf)?)
    }

    /// Writes an unsigned LEB128 byte length followed by the UTF-8 bytes.
    pub fn prefixed_utf8(&mut self, s: &str) -> Result<usize, BufferError> {
        self.prefixed_buf(s.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flush_hands_out_each_batch_once() {
        let mut writer = Writer::with_capacity(8);
        writer.u8(0x01).unwrap();
        assert_eq!(writer.utf8("ab").unwrap(), 2);
        assert_eq!(writer.flush(), [0x01, b'a', b'b']);
        assert!(writer.is_empty());
        writer.u8(0x02).unwrap();
        assert_eq!(writer.len(), 1);
        assert_eq!(writer.flush(), [0x02]);
    }

    #[test]
    fn test_grows_by_four_when_full() {
        let mut writer = Writer::with_capacity(4);
        writer.buf(&[1, 2, 3]).unwrap();
        assert_eq!(writer.capacity(), 4);
        // Reaching the capacity exactly already triggers growth.
        writer.u8(4).unwrap();
        assert_eq!(writer.capacity(), 16);
        assert_eq!(writer.as_slice(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_large_write_grows_repeatedly() {
        let mut writer = Writer::with_capacity(2);
        let data = vec![7u8; 100];
        writer.buf(&data).unwrap();
        assert_eq!(writer.capacity(), 128);
        assert_eq!(writer.into_vec(), data);
    }

    #[test]
    fn test_growth_keeps_offsets() {
        let mut writer = Writer::with_capacity(2);
        writer.u8(9).unwrap();
        let before = writer.x;
        writer.buf(&[0; 64]).unwrap();
        assert_eq!(writer.uint8[before - 1], 9);
    }

    #[test]
    fn test_leb128() {
        let mut writer = Writer::new();
        assert_eq!(writer.uleb128(624_485).unwrap(), 3);
        assert_eq!(writer.sleb128(-1).unwrap(), 1);
        assert_eq!(writer.flush(), [0xe5, 0x8e, 0x26, 0x7f]);
    }

    #[test]
    fn test_prefixed() {
        let mut writer = Writer::new();
        assert_eq!(writer.prefixed_utf8("ab").unwrap(), 3);
        assert_eq!(writer.flush(), [0x02, b'a', b'b']);
    }

    #[test]
    fn test_into_vec_after_flush() {
        let mut writer = Writer::new();
        writer.buf(&[1, 2]).unwrap();
        writer.flush();
        writer.buf(&[3]).unwrap();
        assert_eq!(writer.into_vec(), [3]);
    }
}
