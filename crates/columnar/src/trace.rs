//! Edit traces and their column size report.
//!
//! A trace is a JSON object `{"messages": [{"node": 1, "ops": [...]}]}`
//! where each op is `{"op": "insert" | "delete", "id": "5-1", "ref":
//! "4-1" | null, "val": "x"}`. Ids and refs are `counter-node`. Ops of any
//! other kind are ignored.

use std::io::Read;

use serde::Deserialize;
use tracing::info;

use crate::columns::{ColumnId, ColumnSizes, ColumnType, EncodedColumn, EncodedColumns};
use crate::encoding::{DeltaEncoder, RawEncoder, RleEncoder};
use crate::options::EncoderOptions;
use crate::ColumnarError;

pub const OP_TYPES: ColumnId = ColumnId::new(0, ColumnType::IntRle);
pub const INSERTED_LENGTHS: ColumnId = ColumnId::new(1, ColumnType::IntRle);
pub const INSERTED_STRINGS: ColumnId = ColumnId::new(1, ColumnType::ValueRaw);
pub const OP_ID_COUNTERS: ColumnId = ColumnId::new(2, ColumnType::IntDelta);
pub const ORIGIN_NODES: ColumnId = ColumnId::new(3, ColumnType::IntRle);
pub const REF_COUNTERS: ColumnId = ColumnId::new(4, ColumnType::IntDelta);
pub const REF_NODES: ColumnId = ColumnId::new(5, ColumnType::IntRle);

const OP_INSERT: u64 = 0;
const OP_DELETE: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Trace {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub node: u64,
    #[serde(default)]
    pub ops: Vec<TraceOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceOp {
    pub op: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "ref")]
    pub reference: Option<String>,
    #[serde(default)]
    pub val: Option<String>,
}

impl Trace {
    pub fn from_json_str(json: &str) -> Result<Self, ColumnarError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, ColumnarError> {
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Splits `counter-node`; `None` if `s` has another shape.
fn split_id(s: &str) -> Option<(u64, u64)> {
    use std::sync::OnceLock;
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| regex::Regex::new(r"^(\d+)-(\d+)$").unwrap());
    let caps = re.captures(s)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}

fn to_signed(value: u64, reference: &str) -> Result<i64, ColumnarError> {
    i64::try_from(value).map_err(|_| ColumnarError::BadOpRef(reference.to_owned()))
}

/// Streams trace ops into seven columns.
#[derive(Debug, Clone)]
pub struct TraceEncoder {
    op_types: RleEncoder<u64>,
    inserted_strings: RawEncoder,
    inserted_lengths: RleEncoder<u64>,
    op_id_counters: DeltaEncoder,
    origin_nodes: RleEncoder<u64>,
    ref_counters: DeltaEncoder,
    ref_nodes: RleEncoder<i64>,
    ops: usize,
}

impl TraceEncoder {
    pub fn new(options: &EncoderOptions) -> Self {
        let cap = options.initial_capacity;
        Self {
            op_types: RleEncoder::with_capacity(cap),
            inserted_strings: RawEncoder::with_capacity(cap),
            inserted_lengths: RleEncoder::with_capacity(cap),
            op_id_counters: DeltaEncoder::with_capacity(cap),
            origin_nodes: RleEncoder::with_capacity(cap),
            ref_counters: DeltaEncoder::with_capacity(cap),
            ref_nodes: RleEncoder::with_capacity(cap),
            ops: 0,
        }
    }

    /// Number of insert and delete ops encoded so far.
    pub fn len(&self) -> usize {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops == 0
    }

    pub fn write_message(&mut self, message: &Message) -> Result<(), ColumnarError> {
        for op in &message.ops {
            self.write_op(message.node, op)?;
        }
        Ok(())
    }

    pub fn write_op(&mut self, node: u64, op: &TraceOp) -> Result<(), ColumnarError> {
        let insert = match op.op.as_str() {
            "insert" => true,
            "delete" => false,
            _ => return Ok(()),
        };

        let raw_id = op.id.as_deref().unwrap_or_default();
        let (counter, origin) = split_id(raw_id)
            .filter(|(_, origin)| *origin == node)
            .ok_or_else(|| ColumnarError::BadOpId(raw_id.to_owned()))?;
        let counter = i64::try_from(counter).map_err(|_| ColumnarError::BadOpId(raw_id.to_owned()))?;

        let reference = match (insert, op.reference.as_deref()) {
            (true, None) => (-1, -1),
            (_, reference) => {
                let raw_ref = reference.unwrap_or("null");
                let (ref_counter, ref_node) =
                    split_id(raw_ref).ok_or_else(|| ColumnarError::BadOpRef(raw_ref.to_owned()))?;
                (to_signed(ref_counter, raw_ref)?, to_signed(ref_node, raw_ref)?)
            }
        };

        if insert {
            let val = op
                .val
                .as_deref()
                .ok_or_else(|| ColumnarError::InvalidTrace(format!("insert {raw_id} has no value")))?;
            self.op_types.write(Some(OP_INSERT))?;
            self.inserted_strings.write(val.as_bytes())?;
            self.inserted_lengths.write(Some(val.len() as u64))?;
        } else {
            self.op_types.write(Some(OP_DELETE))?;
        }
        self.op_id_counters.write(Some(counter))?;
        self.origin_nodes.write(Some(origin))?;
        self.ref_counters.write(Some(reference.0))?;
        self.ref_nodes.write(Some(reference.1))?;
        self.ops += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<TraceColumns, ColumnarError> {
        let column = |id, name, data| EncodedColumn { id, name, data };
        let columns = EncodedColumns {
            columns: vec![
                column(OP_TYPES, "opTypes", self.op_types.finish()?),
                column(INSERTED_LENGTHS, "insertedLengths", self.inserted_lengths.finish()?),
                column(INSERTED_STRINGS, "insertedStrings", self.inserted_strings.finish()?),
                column(OP_ID_COUNTERS, "opIdCounters", self.op_id_counters.finish()?),
                column(ORIGIN_NODES, "originNodes", self.origin_nodes.finish()?),
                column(REF_COUNTERS, "refCounters", self.ref_counters.finish()?),
                column(REF_NODES, "refNodes", self.ref_nodes.finish()?),
            ],
        };
        let trace = TraceColumns {
            ops: self.ops,
            columns,
        };
        info!(ops = trace.ops, total = trace.sizes().total(), "encoded trace");
        Ok(trace)
    }
}

/// Encoded columns of a trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceColumns {
    pub ops: usize,
    pub columns: EncodedColumns,
}

impl TraceColumns {
    pub fn sizes(&self) -> ColumnSizes {
        self.columns.sizes()
    }

    /// The columns as one directory blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ColumnarError> {
        self.columns.to_bytes()
    }
}

pub fn encode_trace(trace: &Trace, options: &EncoderOptions) -> Result<TraceColumns, ColumnarError> {
    let mut encoder = TraceEncoder::new(options);
    for message in &trace.messages {
        encoder.write_message(message)?;
    }
    encoder.finish()
}
