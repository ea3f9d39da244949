//! Delta encoding on top of RLE.
//!
//! Each value is stored as its difference from the previous present value,
//! so a counter that grows by one per operation turns into one long run of
//! `1`s. Absent values pass through unchanged and do not move the base.

use columnar_buffers::BufferError;

use super::rle::{reserve_run, RleDecoder, RleEncoder};
use crate::ColumnarError;

#[derive(Debug, Clone, Default)]
pub struct DeltaEncoder {
    rle: RleEncoder<i64>,
    absolute: i64,
}

impl DeltaEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rle: RleEncoder::with_capacity(capacity),
            absolute: 0,
        }
    }

    pub fn write(&mut self, value: Option<i64>) -> Result<(), BufferError> {
        match value {
            Some(value) => {
                self.rle.write(Some(value.wrapping_sub(self.absolute)))?;
                self.absolute = value;
                Ok(())
            }
            None => self.rle.write(None),
        }
    }

    pub fn len(&self) -> usize {
        self.rle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rle.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, BufferError> {
        self.rle.finish()
    }
}

#[derive(Debug, Clone)]
pub struct DeltaDecoder<'a> {
    rle: RleDecoder<'a, i64>,
    absolute: i64,
}

impl<'a> DeltaDecoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            rle: RleDecoder::new(data),
            absolute: 0,
        }
    }

    pub fn done(&self) -> bool {
        self.rle.done()
    }

    pub fn remaining(&self) -> usize {
        self.rle.remaining()
    }

    pub fn next_value(&mut self) -> Result<Option<Option<i64>>, ColumnarError> {
        Ok(self.rle.next_value()?.map(|delta| {
            delta.map(|delta| {
                self.absolute = self.absolute.wrapping_add(delta);
                self.absolute
            })
        }))
    }
}

/// Decodes a whole delta column.
pub fn decode_delta(data: &[u8]) -> Result<Vec<Option<i64>>, ColumnarError> {
    let mut values = Vec::new();
    let mut absolute = 0i64;
    for run in RleDecoder::<i64>::new(data) {
        let run = run?;
        let count = reserve_run(&mut values, run.count)?;
        match run.value {
            Some(delta) => values.extend((0..count).map(|_| {
                absolute = absolute.wrapping_add(delta);
                Some(absolute)
            })),
            None => values.extend(std::iter::repeat(None).take(count)),
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::decode_runs;

    fn encode(values: &[Option<i64>]) -> Vec<u8> {
        let mut encoder = DeltaEncoder::with_capacity(16);
        for value in values {
            encoder.write(*value).unwrap();
        }
        encoder.finish().unwrap()
    }

    #[test]
    fn counters_become_runs_of_one() {
        let values: Vec<_> = (1..=100).map(Some).collect();
        let bytes = encode(&values);
        // First delta is 1 from the zero base too: a single run.
        assert_eq!(bytes, [0xe4, 0x00, 0x01]);
        assert_eq!(decode_delta(&bytes).unwrap(), values);
    }

    #[test]
    fn small_scenario_roundtrips_and_compresses() {
        let values = [Some(5), Some(5), Some(5), Some(7), Some(7), Some(10)];
        let bytes = encode(&values);
        assert_eq!(decode_delta(&bytes).unwrap(), values);
        let runs = decode_runs::<i64>(&bytes).unwrap();
        let deltas: Vec<_> = runs.iter().map(|r| (r.count, r.value)).collect();
        assert_eq!(
            deltas,
            [(1, Some(5)), (2, Some(0)), (1, Some(2)), (1, Some(0)), (1, Some(3))]
        );
        // Smaller than the same six values stored as fixed-width u32s.
        assert!(bytes.len() < 6 * 4);
    }

    #[test]
    fn constant_sequence_is_zero_deltas() {
        let values = vec![Some(42); 10];
        let bytes = encode(&values);
        let runs = decode_runs::<i64>(&bytes).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].value, Some(0));
        assert_eq!(decode_delta(&bytes).unwrap(), values);
    }

    #[test]
    fn large_jump_and_negative_values() {
        let values = [Some(1), Some(1_000_000_000_000), Some(-7), Some(i64::MIN), Some(i64::MAX)];
        assert_eq!(decode_delta(&encode(&values)).unwrap(), values);
    }

    #[test]
    fn absent_values_keep_the_base() {
        let values = [Some(10), None, Some(11), None, None, Some(12)];
        let bytes = encode(&values);
        let runs = decode_runs::<i64>(&bytes).unwrap();
        assert_eq!(runs[2].value, Some(1));
        assert_eq!(decode_delta(&bytes).unwrap(), values);
    }

    #[test]
    fn oversized_run_fails_to_allocate() {
        // i64::MAX repeats of delta 1.
        let mut bytes = vec![0xff; 9];
        bytes.extend([0x00, 0x01]);
        assert!(matches!(
            decode_delta(&bytes),
            Err(ColumnarError::Buffer(BufferError::Alloc { .. }))
        ));
    }
}
