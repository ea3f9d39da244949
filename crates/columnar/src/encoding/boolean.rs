//! Boolean columns as alternating run lengths.
//!
//! The column is a sequence of unsigned LEB128 counts. The first count is the
//! number of leading `false` values (possibly zero), the next the number of
//! `true` values that follow, and so on.

use columnar_buffers::{BufferError, Reader, Writer};

use crate::ColumnarError;

#[derive(Debug, Clone, Default)]
pub struct BooleanEncoder {
    buf: Writer,
    last: bool,
    count: u64,
}

impl BooleanEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Writer::with_capacity(capacity),
            last: false,
            count: 0,
        }
    }

    pub fn write(&mut self, value: bool) -> Result<(), BufferError> {
        if value == self.last {
            self.count += 1;
        } else {
            self.buf.uleb128(self.count)?;
            self.last = value;
            self.count = 1;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && self.count == 0
    }

    pub fn finish(mut self) -> Result<Vec<u8>, BufferError> {
        if self.count > 0 {
            self.buf.uleb128(self.count)?;
        }
        Ok(self.buf.into_vec())
    }
}

#[derive(Debug, Clone)]
pub struct BooleanDecoder<'a> {
    reader: Reader<'a>,
    value: bool,
    count: u64,
    started: bool,
}

impl<'a> BooleanDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: Reader::new(data),
            value: false,
            count: 0,
            started: false,
        }
    }

    pub fn done(&self) -> bool {
        self.count == 0 && self.reader.is_done()
    }

    pub fn remaining(&self) -> usize {
        self.reader.size()
    }

    pub fn next_value(&mut self) -> Result<Option<bool>, ColumnarError> {
        while self.count == 0 {
            if self.reader.is_done() {
                return Ok(None);
            }
            self.count = self.reader.try_uleb128()?;
            if self.started {
                self.value = !self.value;
            }
            self.started = true;
        }
        self.count -= 1;
        Ok(Some(self.value))
    }
}

impl Iterator for BooleanDecoder<'_> {
    type Item = Result<bool, ColumnarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_value().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(values: &[bool]) -> Vec<u8> {
        let mut encoder = BooleanEncoder::with_capacity(8);
        for value in values {
            encoder.write(*value).unwrap();
        }
        encoder.finish().unwrap()
    }

    fn decode(bytes: &[u8]) -> Vec<bool> {
        BooleanDecoder::new(bytes).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn starts_with_false_run() {
        let values = [false, false, true, true, true, false];
        let bytes = encode(&values);
        assert_eq!(bytes, [0x02, 0x03, 0x01]);
        assert_eq!(decode(&bytes), values);
    }

    #[test]
    fn leading_true_writes_empty_false_run() {
        let values = [true, true, false];
        let bytes = encode(&values);
        assert_eq!(bytes, [0x00, 0x02, 0x01]);
        assert_eq!(decode(&bytes), values);
    }

    #[test]
    fn empty_column() {
        let bytes = encode(&[]);
        assert!(bytes.is_empty());
        assert!(decode(&bytes).is_empty());
    }

    #[test]
    fn zero_length_runs_in_the_middle_are_skipped() {
        // 1 false, 0 true, 2 false.
        assert_eq!(decode(&[0x01, 0x00, 0x02]), [false, false, false]);
    }

    #[test]
    fn truncated_count_is_an_error() {
        let mut decoder = BooleanDecoder::new(&[0x80]);
        assert!(decoder.next_value().is_err());
    }
}
