//! Error types for the columnar codec.
//!
//! Everything except [`ColumnarError::Precondition`] is a format error: the
//! input blob is malformed and retrying the same bytes reproduces it.

use columnar_buffers::BufferError;
use thiserror::Error;

use crate::columns::ColumnId;

#[derive(Debug, Error)]
pub enum ColumnarError {
    #[error("malformed column data: {0}")]
    Buffer(#[from] BufferError),
    #[error("columns must be in ascending order: column {current} follows {previous}")]
    ColumnOrder { previous: ColumnId, current: ColumnId },
    #[error("column {column} ended before all operations were read")]
    ColumnEnded { column: ColumnId },
    #[error("column {column} has {remaining} unread bytes")]
    TrailingBytes { column: ColumnId, remaining: usize },
    #[error("run in column {column} extends past the tracked operations")]
    RunOverflow { column: ColumnId },
    #[error("unexpected null in column {column}")]
    UnexpectedNull { column: ColumnId },
    #[error("invalid value in column {column}: {description}")]
    InvalidValue { column: ColumnId, description: String },
    #[error("group of {len} entries in column {column} exceeds the limit of {limit}")]
    GroupTooLarge { column: ColumnId, len: u64, limit: u64 },
    #[error("bad operation ID: {0}")]
    BadOpId(String),
    #[error("bad operation reference: {0}")]
    BadOpRef(String),
    #[error("invalid edit trace: {0}")]
    InvalidTrace(String),
    #[error("not a columnar document: bad magic bytes")]
    BadMagic,
    #[error("unsupported chunk type {0}")]
    ChunkType(u8),
    #[error("checksum mismatch: header {expected:02x?}, computed {computed:02x?}")]
    Checksum { expected: [u8; 4], computed: [u8; 4] },
    #[error("{0} trailing bytes after the document chunk")]
    TrailingData(usize),
    #[error("invalid actor ID {actor:?}: {source}")]
    ActorId {
        actor: String,
        #[source]
        source: hex::FromHexError,
    },
    #[error("reconstructed text is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("fast text path unavailable: {0}")]
    Precondition(#[from] PreconditionError),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ColumnarError {
    /// `true` when the error only rules out the fast text path; general
    /// decoding of the same blob may still succeed.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ColumnarError::Precondition(_))
    }
}

/// Conditions the single-pass text reconstructor needs before it runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    #[error("object column is not one absent run followed by one run of object {object}")]
    ObjectLayout { object: u64 },
    #[error("no operations on object {object}")]
    NoOperations { object: u64 },
    #[error("values of object {object} are not all single-byte UTF-8")]
    ValueLayout { object: u64 },
}
