//! Run-length encoding of a column of values.
//!
//! Wire format, one token group per run:
//!
//! - `count > 0` (signed LEB128), then one value: the value repeats `count` times.
//! - `count < 0`, then `|count|` values: a literal block, each value once.
//! - `0`, then an unsigned LEB128 `n`: `n` absent values.
//!
//! [`RleEncoder`] only ever produces the first and last forms. The decoder
//! also accepts literal blocks, which other writers of the format emit for
//! columns with many short runs.

use std::marker::PhantomData;

use columnar_buffers::{BufferError, Reader, Writer};

use super::ColumnValue;
use crate::ColumnarError;

/// `count` consecutive copies of `value`; `None` is the absent marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run<V> {
    pub count: u64,
    pub value: Option<V>,
}

#[derive(Debug, Clone)]
enum RunState<V> {
    /// Nothing written yet.
    Empty,
    Run { value: Option<V>, count: u64 },
}

/// Streaming RLE encoder over one column.
#[derive(Debug, Clone)]
pub struct RleEncoder<V> {
    buf: Writer,
    state: RunState<V>,
}

impl<V: ColumnValue> Default for RleEncoder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: ColumnValue> RleEncoder<V> {
    pub fn new() -> Self {
        Self::from_writer(Writer::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_writer(Writer::with_capacity(capacity))
    }

    fn from_writer(buf: Writer) -> Self {
        Self {
            buf,
            state: RunState::Empty,
        }
    }

    /// Appends one value. Equal consecutive values extend the pending run;
    /// anything else flushes it and starts a new one.
    pub fn write(&mut self, value: Option<V>) -> Result<(), BufferError> {
        if let RunState::Run { value: last, count } = &mut self.state {
            if *last == value {
                *count += 1;
                return Ok(());
            }
        }
        self.flush_run()?;
        self.state = RunState::Run { value, count: 1 };
        Ok(())
    }

    /// Appends `count` copies of `value` in one step.
    pub fn write_n(&mut self, value: Option<V>, count: u64) -> Result<(), BufferError> {
        if count == 0 {
            return Ok(());
        }
        self.write(value)?;
        if let RunState::Run { count: pending, .. } = &mut self.state {
            *pending += count - 1;
        }
        Ok(())
    }

    fn flush_run(&mut self) -> Result<(), BufferError> {
        match std::mem::replace(&mut self.state, RunState::Empty) {
            RunState::Empty => {}
            RunState::Run { value: None, count } => {
                self.buf.sleb128(0)?;
                self.buf.uleb128(count)?;
            }
            RunState::Run {
                value: Some(value),
                count,
            } => {
                self.buf.sleb128(count as i64)?;
                value.encode(&mut self.buf)?;
            }
        }
        Ok(())
    }

    /// Bytes written so far, excluding the pending run.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && matches!(self.state, RunState::Empty)
    }

    /// Flushes the pending run and returns the column bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, BufferError> {
        self.flush_run()?;
        Ok(self.buf.into_vec())
    }
}

/// Decoder over one RLE column.
///
/// Use either the run-level API ([`next_run`](Self::next_run), or the
/// iterator impl) or the value-level API ([`next_value`](Self::next_value))
/// on a given decoder, not both.
#[derive(Debug, Clone)]
pub struct RleDecoder<'a, V> {
    reader: Reader<'a>,
    /// Values still owed by the current literal block.
    literal_remaining: u64,
    /// Run being expanded by `next_value`.
    pending: Option<Run<V>>,
    _marker: PhantomData<V>,
}

impl<'a, V: ColumnValue> RleDecoder<'a, V> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::from_reader(Reader::new(data))
    }

    pub fn from_reader(reader: Reader<'a>) -> Self {
        Self {
            reader,
            literal_remaining: 0,
            pending: None,
            _marker: PhantomData,
        }
    }

    /// `true` once every declared run has been read.
    pub fn done(&self) -> bool {
        self.literal_remaining == 0
            && self.pending.as_ref().map_or(true, |run| run.count == 0)
            && self.reader.is_done()
    }

    /// Unread bytes left in the column.
    pub fn remaining(&self) -> usize {
        self.reader.size()
    }

    /// Reads the next run; a literal block comes out as one run per value.
    pub fn next_run(&mut self) -> Result<Option<Run<V>>, ColumnarError> {
        if self.literal_remaining > 0 {
            self.literal_remaining -= 1;
            let value = V::decode(&mut self.reader)?;
            return Ok(Some(Run {
                count: 1,
                value: Some(value),
            }));
        }
        if self.reader.is_done() {
            return Ok(None);
        }
        let count = self.reader.try_sleb128()?;
        let run = if count > 0 {
            Run {
                count: count as u64,
                value: Some(V::decode(&mut self.reader)?),
            }
        } else if count < 0 {
            self.literal_remaining = count.unsigned_abs() - 1;
            Run {
                count: 1,
                value: Some(V::decode(&mut self.reader)?),
            }
        } else {
            Run {
                count: self.reader.try_uleb128()?,
                value: None,
            }
        };
        Ok(Some(run))
    }

    /// Reads the next single value; `Some(None)` is an absent value.
    pub fn next_value(&mut self) -> Result<Option<Option<V>>, ColumnarError> {
        loop {
            if let Some(run) = &mut self.pending {
                if run.count > 0 {
                    run.count -= 1;
                    return Ok(Some(run.value.clone()));
                }
            }
            match self.next_run()? {
                Some(run) => self.pending = Some(run),
                None => return Ok(None),
            }
        }
    }
}

impl<V: ColumnValue> Iterator for RleDecoder<'_, V> {
    type Item = Result<Run<V>, ColumnarError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_run().transpose()
    }
}

/// Decodes a whole column into its run sequence.
pub fn decode_runs<V: ColumnValue>(data: &[u8]) -> Result<Vec<Run<V>>, ColumnarError> {
    RleDecoder::new(data).collect()
}

/// Makes room for `count` more entries, failing instead of aborting when a
/// run claims more than can be allocated.
pub(crate) fn reserve_run<T>(values: &mut Vec<T>, count: u64) -> Result<usize, BufferError> {
    let count = usize::try_from(count).map_err(|_| BufferError::Alloc { requested: usize::MAX })?;
    values
        .try_reserve(count)
        .map_err(|_| BufferError::Alloc { requested: values.len().saturating_add(count) })?;
    Ok(count)
}

/// Decodes a whole column into individual values.
pub fn decode_values<V: ColumnValue>(data: &[u8]) -> Result<Vec<Option<V>>, ColumnarError> {
    let mut values = Vec::new();
    for run in RleDecoder::<V>::new(data) {
        let run = run?;
        let count = reserve_run(&mut values, run.count)?;
        values.extend(std::iter::repeat(run.value).take(count));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<V: ColumnValue>(values: &[Option<V>]) -> Vec<u8> {
        let mut encoder = RleEncoder::with_capacity(16);
        for value in values {
            encoder.write(value.clone()).unwrap();
        }
        encoder.finish().unwrap()
    }

    #[test]
    fn repeated_values_collapse_into_one_run() {
        let bytes = encode(&[Some(7u64), Some(7), Some(7)]);
        assert_eq!(bytes, [0x03, 0x07]);
        let runs = decode_runs::<u64>(&bytes).unwrap();
        assert_eq!(runs, vec![Run { count: 3, value: Some(7) }]);
    }

    #[test]
    fn run_token_width_independent_of_run_length() {
        for n in [1u64, 5, 1000] {
            let values = vec![Some(300u64); n as usize];
            let bytes = encode(&values);
            let runs = decode_runs::<u64>(&bytes).unwrap();
            assert_eq!(runs.len(), 1, "n={n}");
            // One count token plus one value token, however long the run.
            let count_len = columnar_buffers::leb128::signed_len(n as i64);
            assert_eq!(bytes.len(), count_len + 300u64.encoded_len(), "n={n}");
        }
    }

    #[test]
    fn absent_values_become_null_runs() {
        let values = [None, None, Some(1u64), None];
        let bytes = encode(&values);
        assert_eq!(bytes, [0x00, 0x02, 0x01, 0x01, 0x00, 0x01]);
        assert_eq!(decode_values::<u64>(&bytes).unwrap(), values);
    }

    #[test]
    fn empty_column_decodes_to_nothing() {
        let bytes = encode::<u64>(&[]);
        assert!(bytes.is_empty());
        assert!(decode_values::<u64>(&bytes).unwrap().is_empty());
        assert!(RleDecoder::<u64>::new(&bytes).done());
    }

    #[test]
    fn literal_block_decodes_one_run_per_value() {
        // -3, 4, 5, 6 followed by a run of two 9s.
        let bytes = [0x7d, 0x04, 0x05, 0x06, 0x02, 0x09];
        let runs = decode_runs::<u64>(&bytes).unwrap();
        assert_eq!(
            runs,
            vec![
                Run { count: 1, value: Some(4) },
                Run { count: 1, value: Some(5) },
                Run { count: 1, value: Some(6) },
                Run { count: 2, value: Some(9) },
            ]
        );
        assert_eq!(
            decode_values::<u64>(&bytes).unwrap(),
            [Some(4), Some(5), Some(6), Some(9), Some(9)]
        );
    }

    #[test]
    fn truncated_literal_block_is_an_error() {
        // Declares three literals but carries two.
        let bytes = [0x7d, 0x04, 0x05];
        let err = decode_runs::<u64>(&bytes).unwrap_err();
        assert!(matches!(err, ColumnarError::Buffer(BufferError::EndOfBuffer)));
    }

    #[test]
    fn missing_run_value_is_an_error() {
        let bytes = [0x05];
        assert!(decode_values::<u64>(&bytes).is_err());
    }

    #[test]
    fn signed_and_string_values() {
        let ints = [Some(-1i64), Some(-1), Some(64), None];
        assert_eq!(decode_values::<i64>(&encode(&ints)).unwrap(), ints);

        let strings = [
            Some("text".to_string()),
            Some("text".to_string()),
            None,
            Some("".to_string()),
        ];
        let bytes = encode(&strings);
        assert_eq!(&bytes[..6], &[0x02, 0x04, b't', b'e', b'x', b't']);
        assert_eq!(decode_values::<String>(&bytes).unwrap(), strings);
    }

    #[test]
    fn write_n_matches_repeated_writes() {
        let mut bulk = RleEncoder::<u64>::with_capacity(8);
        bulk.write_n(Some(3), 4).unwrap();
        bulk.write_n(None, 2).unwrap();
        bulk.write_n(Some(8), 0).unwrap();
        let one_by_one = encode(&[Some(3u64), Some(3), Some(3), Some(3), None, None]);
        assert_eq!(bulk.finish().unwrap(), one_by_one);
    }

    #[test]
    fn done_tracks_value_level_expansion() {
        let bytes = encode(&[Some(1u64), Some(1)]);
        let mut decoder = RleDecoder::<u64>::new(&bytes);
        assert_eq!(decoder.next_value().unwrap(), Some(Some(1)));
        assert!(!decoder.done());
        assert_eq!(decoder.next_value().unwrap(), Some(Some(1)));
        assert!(decoder.done());
        assert_eq!(decoder.next_value().unwrap(), None);
    }

    #[test]
    fn oversized_null_run_fails_to_allocate() {
        let mut bytes = vec![0x00];
        bytes.extend([0xff; 9]);
        bytes.push(0x01);
        assert_eq!(decode_runs::<u64>(&bytes).unwrap()[0].count, u64::MAX);
        assert!(matches!(
            decode_values::<u64>(&bytes),
            Err(ColumnarError::Buffer(BufferError::Alloc { .. }))
        ));
    }
}
