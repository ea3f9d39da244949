//! Column-oriented binary encoding of collaborative edit logs.
//!
//! Operations are split field by field into independent byte columns, each
//! compressed with run-length, delta or raw encoding, and collected into a
//! column directory. The read side parses directories back, reassembles
//! operations, and can pull the live text of a text object straight out of
//! the columns without materializing its history.
//!
//! # Example
//!
//! ```
//! use columnar::encoding::{decode_delta, DeltaEncoder};
//!
//! let mut encoder = DeltaEncoder::with_capacity(16);
//! for counter in [5, 5, 5, 7, 7, 10] {
//!     encoder.write(Some(counter)).unwrap();
//! }
//! let bytes = encoder.finish().unwrap();
//! assert_eq!(decode_delta(&bytes).unwrap(), [Some(5), Some(5), Some(5), Some(7), Some(7), Some(10)]);
//! ```

pub mod change;
pub mod columns;
pub mod document;
pub mod encoding;
mod error;
pub mod op;
pub mod op_columns;
pub mod options;
pub mod text;
pub mod trace;

pub use change::ChangeMeta;
pub use columns::{read_columns, write_columns, ColumnDirectory, ColumnId, ColumnSizes, ColumnType};
pub use document::{Document, DocumentBuilder};
pub use error::{ColumnarError, PreconditionError};
pub use op::{parse_op_id, Action, ElemId, Key, ObjId, Op, OpId, ScalarValue};
pub use op_columns::{OpColumnDecoder, OpColumnEncoder, OpLayout};
pub use options::{Config, DocumentOptions, EncoderOptions, TextOptions};
pub use text::{load_text, reconstruct_text, visible_text};
pub use trace::{encode_trace, Trace, TraceColumns, TraceEncoder};
