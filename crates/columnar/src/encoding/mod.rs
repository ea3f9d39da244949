//! Column codecs.
//!
//! Each encoder owns its own [`Writer`] and exposes the same two operations,
//! `write` and `finish`. Encoders compose by holding one another (a
//! [`DeltaEncoder`] holds an [`RleEncoder`]); there is no shared base type.
//! Decoders borrow the column bytes and keep an independent cursor.

mod boolean;
mod delta;
mod raw;
mod rle;

pub use boolean::{BooleanDecoder, BooleanEncoder};
pub use delta::{decode_delta, DeltaDecoder, DeltaEncoder};
pub use raw::{RawDecoder, RawEncoder};
pub use rle::{decode_runs, decode_values, RleDecoder, RleEncoder, Run};

use columnar_buffers::{leb128, BufferError, Reader, Writer};

/// A value type that can appear as a token inside an RLE column.
pub trait ColumnValue: Clone + PartialEq + std::fmt::Debug {
    /// Appends the token for `self`, returning the number of bytes written.
    fn encode(&self, out: &mut Writer) -> Result<usize, BufferError>;

    fn decode(reader: &mut Reader<'_>) -> Result<Self, BufferError>;

    /// Encoded width of the token, without writing it.
    fn encoded_len(&self) -> usize;
}

impl ColumnValue for u64 {
    fn encode(&self, out: &mut Writer) -> Result<usize, BufferError> {
        out.uleb128(*self)
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, BufferError> {
        reader.try_uleb128()
    }

    fn encoded_len(&self) -> usize {
        leb128::unsigned_len(*self)
    }
}

impl ColumnValue for i64 {
    fn encode(&self, out: &mut Writer) -> Result<usize, BufferError> {
        out.sleb128(*self)
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, BufferError> {
        reader.try_sleb128()
    }

    fn encoded_len(&self) -> usize {
        leb128::signed_len(*self)
    }
}

impl ColumnValue for String {
    fn encode(&self, out: &mut Writer) -> Result<usize, BufferError> {
        out.prefixed_utf8(self)
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, BufferError> {
        reader.try_prefixed_utf8().map(str::to_owned)
    }

    fn encoded_len(&self) -> usize {
        leb128::unsigned_len(self.len() as u64) + self.len()
    }
}
