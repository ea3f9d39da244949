//! Uncompressed byte columns.

use columnar_buffers::{BufferError, Reader, Writer};

use crate::ColumnarError;

#[derive(Debug, Clone, Default)]
pub struct RawEncoder {
    buf: Writer,
}

impl RawEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Writer::with_capacity(capacity),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, BufferError> {
        self.buf.buf(bytes)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, BufferError> {
        Ok(self.buf.into_vec())
    }
}

#[derive(Debug, Clone)]
pub struct RawDecoder<'a> {
    reader: Reader<'a>,
}

impl<'a> RawDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(data),
        }
    }

    /// Takes the next `len` bytes.
    pub fn read(&mut self, len: usize) -> Result<&'a [u8], ColumnarError> {
        Ok(self.reader.try_buf(len)?)
    }

    pub fn done(&self) -> bool {
        self.reader.is_done()
    }

    pub fn remaining(&self) -> usize {
        self.reader.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_in_slices() {
        let mut encoder = RawEncoder::with_capacity(2);
        encoder.write(b"hello").unwrap();
        encoder.write(b" world").unwrap();
        assert_eq!(encoder.len(), 11);
        let bytes = encoder.finish().unwrap();

        let mut decoder = RawDecoder::new(&bytes);
        assert_eq!(decoder.read(5).unwrap(), b"hello");
        assert_eq!(decoder.remaining(), 6);
        assert_eq!(decoder.read(6).unwrap(), b" world");
        assert!(decoder.done());
        assert!(decoder.read(1).is_err());
    }
}
