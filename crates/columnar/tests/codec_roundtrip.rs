//! Property tests for the column codecs.

use columnar::encoding::{
    decode_delta, decode_runs, decode_values, BooleanDecoder, BooleanEncoder, DeltaEncoder, RleEncoder,
};
use proptest::prelude::*;

/// Values drawn from a small alphabet so runs actually occur.
fn column() -> impl Strategy<Value = Vec<Option<u64>>> {
    prop::collection::vec(prop::option::weighted(0.8, 0u64..4), 0..200)
}

proptest! {
    #[test]
    fn rle_roundtrip(values in column()) {
        let mut encoder = RleEncoder::with_capacity(8);
        for value in &values {
            encoder.write(*value).unwrap();
        }
        let bytes = encoder.finish().unwrap();
        prop_assert_eq!(decode_values::<u64>(&bytes).unwrap(), values);
    }

    #[test]
    fn rle_never_splits_equal_neighbours(values in column()) {
        let mut encoder = RleEncoder::with_capacity(8);
        for value in &values {
            encoder.write(*value).unwrap();
        }
        let runs = decode_runs::<u64>(&encoder.finish().unwrap()).unwrap();
        for pair in runs.windows(2) {
            prop_assert_ne!(&pair[0].value, &pair[1].value);
        }
    }

    #[test]
    fn signed_and_string_roundtrip(
        ints in prop::collection::vec(prop::option::of(any::<i64>()), 0..64),
        strings in prop::collection::vec(prop::option::of("[a-c]{0,3}"), 0..64),
    ) {
        let mut encoder = RleEncoder::with_capacity(8);
        for value in &ints {
            encoder.write(*value).unwrap();
        }
        prop_assert_eq!(decode_values::<i64>(&encoder.finish().unwrap()).unwrap(), ints);

        let mut encoder = RleEncoder::with_capacity(8);
        for value in &strings {
            encoder.write(value.clone()).unwrap();
        }
        prop_assert_eq!(decode_values::<String>(&encoder.finish().unwrap()).unwrap(), strings);
    }

    #[test]
    fn delta_roundtrip(values in prop::collection::vec(prop::option::weighted(0.9, any::<i64>()), 0..128)) {
        let mut encoder = DeltaEncoder::with_capacity(8);
        for value in &values {
            encoder.write(*value).unwrap();
        }
        prop_assert_eq!(decode_delta(&encoder.finish().unwrap()).unwrap(), values);
    }

    #[test]
    fn boolean_roundtrip(values in prop::collection::vec(any::<bool>(), 0..200)) {
        let mut encoder = BooleanEncoder::with_capacity(8);
        for value in &values {
            encoder.write(*value).unwrap();
        }
        let bytes = encoder.finish().unwrap();
        let decoded: Vec<bool> = BooleanDecoder::new(&bytes).collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(decoded, values);
    }

    #[test]
    fn garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_runs::<u64>(&bytes);
        let _ = decode_runs::<String>(&bytes);
        let _ = columnar::Document::parse(&bytes);
    }
}

#[test]
fn delta_scenario_beats_fixed_width() {
    let values = [5i64, 5, 5, 7, 7, 10];
    let mut encoder = DeltaEncoder::with_capacity(8);
    for value in values {
        encoder.write(Some(value)).unwrap();
    }
    let bytes = encoder.finish().unwrap();
    let decoded: Vec<_> = decode_delta(&bytes).unwrap().into_iter().flatten().collect();
    assert_eq!(decoded, values);
    assert!(bytes.len() < values.len() * std::mem::size_of::<u32>());
}

#[test]
fn empty_column_decodes_empty() {
    let bytes = RleEncoder::<u64>::with_capacity(8).finish().unwrap();
    assert!(decode_values::<u64>(&bytes).unwrap().is_empty());
}
