//! Byte buffers for the columnar codec.
//!
//! - [`Writer`]: append-only buffer that grows by a factor of four.
//! - [`Reader`]: bounds-checked cursor over a borrowed byte slice.
//! - [`leb128`]: unsigned/signed LEB128 varints shared by both.

pub mod leb128;

mod error;
mod reader;
mod writer;

pub use error::BufferError;
pub use reader::Reader;
pub use writer::{Writer, DEFAULT_CAPACITY, GROWTH_FACTOR};
