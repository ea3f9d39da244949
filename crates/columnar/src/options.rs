//! Options for encoding, document parsing and text loading.
//!
//! Every struct has a `Default` and deserializes with missing fields filled
//! in from it, so a config file only needs to name what it changes.

use std::path::Path;

use columnar_buffers::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};

use crate::ColumnarError;

/// Default cap on the entries of one successor, predecessor or dependency
/// group.
pub const DEFAULT_MAX_GROUP_LEN: u64 = 1 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Initial buffer size of each column encoder.
    pub initial_capacity: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentOptions {
    /// If true, reject blobs whose header checksum does not match the chunk.
    pub verify_checksum: bool,
    /// Largest group a decoder accepts before it allocates for it.
    pub max_group_len: u64,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_group_len: DEFAULT_MAX_GROUP_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Counter of the text object's creating op.
    pub object_counter: u64,
    /// If true, fall back to general decoding when the fast path does not
    /// apply. If false, the precondition error is returned.
    pub fallback: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            object_counter: 1,
            fallback: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub encoder: EncoderOptions,
    pub document: DocumentOptions,
    pub text: TextOptions,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ColumnarError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ColumnarError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
