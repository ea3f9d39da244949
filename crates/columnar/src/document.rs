//! Whole-document blobs.
//!
//! ```text
//! magic (4) | checksum (4) | chunk type (1) | chunk length (uleb) | body
//!
//! body:
//!   actor count (uleb), then each actor ID as prefixed bytes
//!   head count (uleb), then each head as a 32-byte hash
//!   change column count (uleb), then that many directory entries
//!   op column directory entries up to the end of the chunk
//! ```
//!
//! The checksum is the first four bytes of the SHA-256 of everything from
//! the chunk type to the end of the body.

use columnar_buffers::{Reader, Writer};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::change::{ChangeDecoder, ChangeEncoder, ChangeMeta};
use crate::columns::{read_columns, ColumnDirectory};
use crate::op::{parse_op_id, Op, OpId};
use crate::op_columns::{OpColumnDecoder, OpColumnEncoder, OpLayout};
use crate::options::{DocumentOptions, EncoderOptions, TextOptions};
use crate::text::load_text_limited;
use crate::ColumnarError;

pub const MAGIC: [u8; 4] = [0x85, 0x6f, 0x4a, 0x83];

/// Chunk type byte of a whole document.
pub const CHUNK_DOCUMENT: u8 = 0;

pub const HASH_LEN: usize = 32;

pub type ChangeHash = [u8; HASH_LEN];

fn checksum(chunk: &[u8]) -> [u8; 4] {
    let hash = Sha256::digest(chunk);
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// A parsed document, borrowing its columns from the blob.
#[derive(Debug, Clone)]
pub struct Document<'a> {
    pub actors: Vec<String>,
    pub heads: Vec<ChangeHash>,
    pub checksum: [u8; 4],
    pub change_columns: ColumnDirectory<'a>,
    pub op_columns: ColumnDirectory<'a>,
    /// Group cap applied by [`Document::changes`] and [`Document::ops`].
    pub max_group_len: u64,
}

impl<'a> Document<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self, ColumnarError> {
        Self::parse_with(data, &DocumentOptions::default())
    }

    pub fn parse_with(data: &'a [u8], options: &DocumentOptions) -> Result<Self, ColumnarError> {
        let mut reader = Reader::new(data);
        if reader.try_buf(MAGIC.len()).ok() != Some(&MAGIC[..]) {
            return Err(ColumnarError::BadMagic);
        }
        let mut expected = [0u8; 4];
        expected.copy_from_slice(reader.try_buf(4)?);

        let chunk_start = reader.position();
        let chunk_type = reader.try_u8()?;
        if chunk_type != CHUNK_DOCUMENT {
            return Err(ColumnarError::ChunkType(chunk_type));
        }
        let len = reader.try_uleb128()?;
        let len = usize::try_from(len).map_err(|_| columnar_buffers::BufferError::EndOfBuffer)?;
        let mut body = reader.try_cut(len)?;
        let chunk_end = reader.position();
        if !reader.is_done() {
            return Err(ColumnarError::TrailingData(reader.size()));
        }

        if options.verify_checksum {
            let computed = checksum(&data[chunk_start..chunk_end]);
            if computed != expected {
                return Err(ColumnarError::Checksum { expected, computed });
            }
        }

        let num_actors = body.try_uleb128()?;
        let mut actors = Vec::new();
        for _ in 0..num_actors {
            actors.push(hex::encode(body.try_prefixed_buf()?));
        }

        let num_heads = body.try_uleb128()?;
        let mut heads = Vec::new();
        for _ in 0..num_heads {
            let mut head = [0u8; HASH_LEN];
            head.copy_from_slice(body.try_buf(HASH_LEN)?);
            heads.push(head);
        }

        let num_change_columns = body.try_uleb128()?;
        let num_change_columns =
            usize::try_from(num_change_columns).map_err(|_| columnar_buffers::BufferError::EndOfBuffer)?;
        let change_columns = read_columns(&mut body, Some(num_change_columns))?;
        let op_columns = read_columns(&mut body, None)?;
        debug!(
            actors = actors.len(),
            heads = heads.len(),
            change_columns = change_columns.len(),
            op_columns = op_columns.len(),
            "parsed document"
        );

        Ok(Self {
            actors,
            heads,
            checksum: expected,
            change_columns,
            op_columns,
            max_group_len: options.max_group_len,
        })
    }

    pub fn changes(&self) -> Result<Vec<ChangeMeta>, ColumnarError> {
        ChangeDecoder::new(&self.change_columns)
            .with_max_group_len(self.max_group_len)
            .collect()
    }

    pub fn ops(&self) -> Result<Vec<Op>, ColumnarError> {
        OpColumnDecoder::new(&self.op_columns, OpLayout::Document)
            .with_max_group_len(self.max_group_len)
            .collect()
    }

    /// Live text of the object named in `options`.
    pub fn text(&self, options: &TextOptions) -> Result<String, ColumnarError> {
        load_text_limited(&self.op_columns, options, self.max_group_len)
    }
}

/// Writes a document blob from changes and ops in their final order.
#[derive(Debug, Clone)]
pub struct DocumentBuilder {
    actors: Vec<Vec<u8>>,
    heads: Vec<ChangeHash>,
    changes: ChangeEncoder,
    ops: OpColumnEncoder,
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new(&EncoderOptions::default())
    }
}

impl DocumentBuilder {
    pub fn new(options: &EncoderOptions) -> Self {
        Self {
            actors: Vec::new(),
            heads: Vec::new(),
            changes: ChangeEncoder::new(options),
            ops: OpColumnEncoder::new(OpLayout::Document, options),
        }
    }

    /// Adds a hex actor ID to the actor table, returning its index. Adding
    /// the same actor again returns the existing index.
    pub fn add_actor(&mut self, actor: &str) -> Result<usize, ColumnarError> {
        let bytes = hex::decode(actor).map_err(|source| ColumnarError::ActorId {
            actor: actor.to_owned(),
            source,
        })?;
        if let Some(index) = self.actors.iter().position(|a| *a == bytes) {
            return Ok(index);
        }
        self.actors.push(bytes);
        Ok(self.actors.len() - 1)
    }

    /// Resolves `"counter@actor"`, adding the actor if it is new.
    pub fn op_id(&mut self, id: &str) -> Result<OpId, ColumnarError> {
        let (counter, actor) = parse_op_id(id)?;
        Ok(OpId::new(counter, self.add_actor(actor)?))
    }

    pub fn add_head(&mut self, hash: ChangeHash) {
        self.heads.push(hash);
    }

    pub fn push_change(&mut self, change: &ChangeMeta) -> Result<(), ColumnarError> {
        self.changes.write(change)
    }

    /// Appends an op. Ops must come in document order, with `succ` filled in.
    pub fn push_op(&mut self, op: &Op) -> Result<(), ColumnarError> {
        self.ops.write(op)
    }

    pub fn finish(self) -> Result<Vec<u8>, ColumnarError> {
        let mut body = Writer::with_capacity(1024);
        body.uleb128(self.actors.len() as u64)?;
        for actor in &self.actors {
            body.prefixed_buf(actor)?;
        }
        body.uleb128(self.heads.len() as u64)?;
        for head in &self.heads {
            body.buf(head)?;
        }
        let changes = self.changes.finish()?;
        body.uleb128(changes.non_empty() as u64)?;
        changes.write_to(&mut body)?;
        self.ops.finish()?.write_to(&mut body)?;
        let body = body.into_vec();

        let mut chunk = Writer::with_capacity(body.len() + 16);
        chunk.u8(CHUNK_DOCUMENT)?;
        chunk.prefixed_buf(&body)?;
        let chunk = chunk.into_vec();

        let mut out = Writer::with_capacity(chunk.len() + 8);
        out.buf(&MAGIC)?;
        out.buf(&checksum(&chunk))?;
        out.buf(&chunk)?;
        Ok(out.into_vec())
    }
}
