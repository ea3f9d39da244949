//! Operation records as they flow through the op columns.
//!
//! Actors are referred to by their index in the document's actor table.

use std::borrow::Cow;

use columnar_buffers::leb128::{self, MAX_LEB128_LEN};

use crate::ColumnarError;

/// Unique operation identifier: a Lamport counter plus an actor index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId {
    pub counter: u64,
    pub actor: usize,
}

impl OpId {
    pub const fn new(counter: u64, actor: usize) -> Self {
        Self { counter, actor }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjId {
    Root,
    Op(OpId),
}

/// Position reference in a sequence object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemId {
    Head,
    Op(OpId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Map(String),
    Seq(ElemId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    MakeMap = 0,
    Set = 1,
    MakeList = 2,
    Del = 3,
    MakeText = 4,
    Inc = 5,
    MakeTable = 6,
    Link = 7,
}

impl TryFrom<u64> for Action {
    type Error = u64;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => Action::MakeMap,
            1 => Action::Set,
            2 => Action::MakeList,
            3 => Action::Del,
            4 => Action::MakeText,
            5 => Action::Inc,
            6 => Action::MakeTable,
            7 => Action::Link,
            other => return Err(other),
        })
    }
}

/// Type codes stored in the low four bits of a value-length tag.
pub mod value_type {
    pub const NULL: u8 = 0;
    pub const FALSE: u8 = 1;
    pub const TRUE: u8 = 2;
    pub const LEB128_UINT: u8 = 3;
    pub const LEB128_INT: u8 = 4;
    pub const IEEE754: u8 = 5;
    pub const UTF8: u8 = 6;
    pub const BYTES: u8 = 7;
    pub const COUNTER: u8 = 8;
    pub const TIMESTAMP: u8 = 9;
}

/// Value-length tag of a one-byte UTF-8 string.
pub const SINGLE_BYTE_UTF8: u64 = (1 << 4) | value_type::UTF8 as u64;

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Counter(i64),
    Timestamp(i64),
    /// A type code this crate does not interpret; the bytes are kept as is.
    Unknown { type_code: u8, bytes: Vec<u8> },
}

impl ScalarValue {
    /// Type code and raw bytes of the value.
    pub fn to_raw(&self) -> (u8, Cow<'_, [u8]>) {
        use value_type::*;
        match self {
            ScalarValue::Null => (NULL, Cow::Borrowed(&[][..])),
            ScalarValue::Bool(false) => (FALSE, Cow::Borrowed(&[][..])),
            ScalarValue::Bool(true) => (TRUE, Cow::Borrowed(&[][..])),
            ScalarValue::Uint(n) => (LEB128_UINT, Cow::Owned(uleb(*n))),
            ScalarValue::Int(n) => (LEB128_INT, Cow::Owned(sleb(*n))),
            ScalarValue::F64(n) => (IEEE754, Cow::Owned(n.to_le_bytes().to_vec())),
            ScalarValue::Str(s) => (UTF8, Cow::Borrowed(s.as_bytes())),
            ScalarValue::Bytes(b) => (BYTES, Cow::Borrowed(b.as_slice())),
            ScalarValue::Counter(n) => (COUNTER, Cow::Owned(sleb(*n))),
            ScalarValue::Timestamp(n) => (TIMESTAMP, Cow::Owned(sleb(*n))),
            ScalarValue::Unknown { type_code, bytes } => (*type_code, Cow::Borrowed(bytes.as_slice())),
        }
    }

    /// Decodes `raw` according to the type code of a value-length tag.
    /// Errors are descriptions; the caller attaches the column.
    pub fn from_raw(type_code: u8, raw: &[u8]) -> Result<Self, String> {
        use value_type::*;
        let value = match type_code {
            NULL => ScalarValue::Null,
            FALSE => ScalarValue::Bool(false),
            TRUE => ScalarValue::Bool(true),
            LEB128_UINT => ScalarValue::Uint(whole(raw, leb128::decode_unsigned)?),
            LEB128_INT => ScalarValue::Int(whole(raw, leb128::decode_signed)?),
            IEEE754 => {
                let bytes: [u8; 8] = raw
                    .try_into()
                    .map_err(|_| format!("float of {} bytes", raw.len()))?;
                ScalarValue::F64(f64::from_le_bytes(bytes))
            }
            UTF8 => ScalarValue::Str(
                std::str::from_utf8(raw)
                    .map_err(|e| e.to_string())?
                    .to_owned(),
            ),
            BYTES => ScalarValue::Bytes(raw.to_vec()),
            COUNTER => ScalarValue::Counter(whole(raw, leb128::decode_signed)?),
            TIMESTAMP => ScalarValue::Timestamp(whole(raw, leb128::decode_signed)?),
            type_code => ScalarValue::Unknown {
                type_code,
                bytes: raw.to_vec(),
            },
        };
        if matches!(type_code, NULL | FALSE | TRUE) && !raw.is_empty() {
            return Err(format!("{} unexpected bytes after type {type_code}", raw.len()));
        }
        Ok(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

fn uleb(n: u64) -> Vec<u8> {
    let mut scratch = [0u8; MAX_LEB128_LEN];
    let len = leb128::encode_unsigned(n, &mut scratch);
    scratch[..len].to_vec()
}

fn sleb(n: i64) -> Vec<u8> {
    let mut scratch = [0u8; MAX_LEB128_LEN];
    let len = leb128::encode_signed(n, &mut scratch);
    scratch[..len].to_vec()
}

/// Runs a varint decoder that must consume `raw` exactly.
fn whole<T>(
    raw: &[u8],
    decode: fn(&[u8], &mut usize) -> Result<T, columnar_buffers::BufferError>,
) -> Result<T, String> {
    let mut pos = 0;
    let value = decode(raw, &mut pos).map_err(|e| e.to_string())?;
    if pos != raw.len() {
        return Err(format!("{} bytes after integer value", raw.len() - pos));
    }
    Ok(value)
}

/// One operation with all of its column fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Op {
    pub obj: ObjId,
    pub key: Key,
    pub id: OpId,
    pub insert: bool,
    pub action: Action,
    pub value: ScalarValue,
    pub child: Option<OpId>,
    pub pred: Vec<OpId>,
    pub succ: Vec<OpId>,
}

impl Op {
    /// An op that is visible unless a later op lists it as predecessor.
    pub fn is_live(&self) -> bool {
        self.succ.is_empty()
    }
}

/// Splits `"counter@actor"` into the counter and the hex actor ID.
pub fn parse_op_id(s: &str) -> Result<(u64, &str), ColumnarError> {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"^(\d+)@([0-9a-f]+)$").unwrap());
    let caps = re
        .captures(s)
        .ok_or_else(|| ColumnarError::BadOpId(s.to_owned()))?;
    let counter = caps[1]
        .parse()
        .map_err(|_| ColumnarError::BadOpId(s.to_owned()))?;
    let actor = caps.get(2).map_or("", |m| m.as_str());
    Ok((counter, actor))
}
