//! Errors raised by buffer reads and writes.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// A read needed more bytes than the buffer holds.
    #[error("unexpected end of buffer")]
    EndOfBuffer,
    /// A varint carried more significant bits than the target type.
    #[error("varint does not fit in {bits} bits")]
    Overflow { bits: u32 },
    #[error("invalid UTF-8 in buffer")]
    InvalidUtf8,
    /// Growing the buffer failed; the host is out of memory.
    #[error("failed to grow buffer to {requested} bytes")]
    Alloc { requested: usize },
}
