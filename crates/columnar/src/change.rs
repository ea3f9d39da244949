//! Per-change metadata stored in a document's change columns.

use columnar_buffers::BufferError;

use crate::columns::{group_vec, required, ColumnDirectory, ColumnId, ColumnType, EncodedColumn, EncodedColumns};
use crate::encoding::{DeltaDecoder, DeltaEncoder, RawDecoder, RawEncoder, RleDecoder, RleEncoder};
use crate::op::value_type;
use crate::options::{EncoderOptions, DEFAULT_MAX_GROUP_LEN};
use crate::ColumnarError;

pub const ACTOR: ColumnId = ColumnId::new(0, ColumnType::ActorId);
pub const SEQ: ColumnId = ColumnId::new(0, ColumnType::IntDelta);
pub const MAX_OP: ColumnId = ColumnId::new(1, ColumnType::IntDelta);
pub const TIME: ColumnId = ColumnId::new(2, ColumnType::IntDelta);
pub const MESSAGE: ColumnId = ColumnId::new(3, ColumnType::StringRle);
pub const DEPS_NUM: ColumnId = ColumnId::new(4, ColumnType::GroupCard);
pub const DEPS_INDEX: ColumnId = ColumnId::new(4, ColumnType::IntDelta);
pub const EXTRA_LEN: ColumnId = ColumnId::new(5, ColumnType::ValueLen);
pub const EXTRA_RAW: ColumnId = ColumnId::new(5, ColumnType::ValueRaw);

/// Header fields of one change, as recorded in a whole document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeMeta {
    /// Index into the document's actor table.
    pub actor: usize,
    pub seq: u64,
    pub max_op: u64,
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    pub message: Option<String>,
    /// Indices of the changes this one depends on.
    pub deps: Vec<u64>,
    pub extra: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ChangeEncoder {
    actor: RleEncoder<u64>,
    seq: DeltaEncoder,
    max_op: DeltaEncoder,
    time: DeltaEncoder,
    message: RleEncoder<String>,
    deps_num: RleEncoder<u64>,
    deps_index: DeltaEncoder,
    extra_len: RleEncoder<u64>,
    extra_raw: RawEncoder,
}

fn to_signed(value: u64, column: ColumnId) -> Result<i64, ColumnarError> {
    i64::try_from(value).map_err(|_| ColumnarError::InvalidValue {
        column,
        description: format!("{value} out of range"),
    })
}

impl ChangeEncoder {
    pub fn new(options: &EncoderOptions) -> Self {
        let cap = options.initial_capacity;
        Self {
            actor: RleEncoder::with_capacity(cap),
            seq: DeltaEncoder::with_capacity(cap),
            max_op: DeltaEncoder::with_capacity(cap),
            time: DeltaEncoder::with_capacity(cap),
            message: RleEncoder::with_capacity(cap),
            deps_num: RleEncoder::with_capacity(cap),
            deps_index: DeltaEncoder::with_capacity(cap),
            extra_len: RleEncoder::with_capacity(cap),
            extra_raw: RawEncoder::with_capacity(cap),
        }
    }

    pub fn write(&mut self, change: &ChangeMeta) -> Result<(), ColumnarError> {
        self.actor.write(Some(change.actor as u64))?;
        self.seq.write(Some(to_signed(change.seq, SEQ)?))?;
        self.max_op.write(Some(to_signed(change.max_op, MAX_OP)?))?;
        self.time.write(Some(change.time))?;
        self.message.write(change.message.clone())?;
        self.deps_num.write(Some(change.deps.len() as u64))?;
        for dep in &change.deps {
            self.deps_index.write(Some(to_signed(*dep, DEPS_INDEX)?))?;
        }
        let tag = ((change.extra.len() as u64) << 4) | u64::from(value_type::BYTES);
        self.extra_len.write(Some(tag))?;
        self.extra_raw.write(&change.extra)?;
        Ok(())
    }

    pub fn finish(self) -> Result<EncodedColumns, BufferError> {
        let column = |id, name, data| EncodedColumn { id, name, data };
        Ok(EncodedColumns {
            columns: vec![
                column(ACTOR, "actor", self.actor.finish()?),
                column(SEQ, "seq", self.seq.finish()?),
                column(MAX_OP, "maxOp", self.max_op.finish()?),
                column(TIME, "time", self.time.finish()?),
                column(MESSAGE, "message", self.message.finish()?),
                column(DEPS_NUM, "depsNum", self.deps_num.finish()?),
                column(DEPS_INDEX, "depsIndex", self.deps_index.finish()?),
                column(EXTRA_LEN, "extraLen", self.extra_len.finish()?),
                column(EXTRA_RAW, "extraRaw", self.extra_raw.finish()?),
            ],
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChangeDecoder<'a> {
    actor: RleDecoder<'a, u64>,
    seq: DeltaDecoder<'a>,
    max_op: DeltaDecoder<'a>,
    time: DeltaDecoder<'a>,
    message: RleDecoder<'a, String>,
    deps_num: RleDecoder<'a, u64>,
    deps_index: DeltaDecoder<'a>,
    extra_len: RleDecoder<'a, u64>,
    extra_raw: RawDecoder<'a>,
    max_group_len: u64,
    finished: bool,
}

fn unsigned(value: i64, column: ColumnId) -> Result<u64, ColumnarError> {
    u64::try_from(value).map_err(|_| ColumnarError::InvalidValue {
        column,
        description: format!("negative value {value}"),
    })
}

impl<'a> ChangeDecoder<'a> {
    pub fn new(columns: &ColumnDirectory<'a>) -> Self {
        Self {
            actor: RleDecoder::new(columns.data(ACTOR)),
            seq: DeltaDecoder::new(columns.data(SEQ)),
            max_op: DeltaDecoder::new(columns.data(MAX_OP)),
            time: DeltaDecoder::new(columns.data(TIME)),
            message: RleDecoder::new(columns.data(MESSAGE)),
            deps_num: RleDecoder::new(columns.data(DEPS_NUM)),
            deps_index: DeltaDecoder::new(columns.data(DEPS_INDEX)),
            extra_len: RleDecoder::new(columns.data(EXTRA_LEN)),
            extra_raw: RawDecoder::new(columns.data(EXTRA_RAW)),
            max_group_len: DEFAULT_MAX_GROUP_LEN,
            finished: false,
        }
    }

    /// Caps the number of dependencies of one change.
    pub fn with_max_group_len(mut self, max_group_len: u64) -> Self {
        self.max_group_len = max_group_len;
        self
    }

    pub fn next_change(&mut self) -> Result<Option<ChangeMeta>, ColumnarError> {
        let Some(actor) = self.actor.next_value()? else {
            self.check_exhausted()?;
            return Ok(None);
        };
        let actor = required(Some(actor), ACTOR)?;
        let actor = usize::try_from(actor).map_err(|_| ColumnarError::InvalidValue {
            column: ACTOR,
            description: format!("actor index {actor} out of range"),
        })?;
        let seq = unsigned(required(self.seq.next_value()?, SEQ)?, SEQ)?;
        let max_op = unsigned(required(self.max_op.next_value()?, MAX_OP)?, MAX_OP)?;
        let time = required(self.time.next_value()?, TIME)?;
        let message = self
            .message
            .next_value()?
            .ok_or(ColumnarError::ColumnEnded { column: MESSAGE })?;

        let num = required(self.deps_num.next_value()?, DEPS_NUM)?;
        let mut deps = group_vec(num, self.max_group_len, DEPS_NUM)?;
        for _ in 0..num {
            deps.push(unsigned(required(self.deps_index.next_value()?, DEPS_INDEX)?, DEPS_INDEX)?);
        }

        let tag = required(self.extra_len.next_value()?, EXTRA_LEN)?;
        let len = usize::try_from(tag >> 4).map_err(|_| ColumnarError::ColumnEnded { column: EXTRA_RAW })?;
        let extra = self
            .extra_raw
            .read(len)
            .map_err(|_| ColumnarError::ColumnEnded { column: EXTRA_RAW })?
            .to_vec();

        Ok(Some(ChangeMeta {
            actor,
            seq,
            max_op,
            time,
            message,
            deps,
            extra,
        }))
    }

    fn check_exhausted(&self) -> Result<(), ColumnarError> {
        let columns = [
            (SEQ, self.seq.done(), self.seq.remaining()),
            (MAX_OP, self.max_op.done(), self.max_op.remaining()),
            (TIME, self.time.done(), self.time.remaining()),
            (MESSAGE, self.message.done(), self.message.remaining()),
            (DEPS_NUM, self.deps_num.done(), self.deps_num.remaining()),
            (DEPS_INDEX, self.deps_index.done(), self.deps_index.remaining()),
            (EXTRA_LEN, self.extra_len.done(), self.extra_len.remaining()),
            (EXTRA_RAW, self.extra_raw.done(), self.extra_raw.remaining()),
        ];
        match columns.into_iter().find(|(_, done, _)| !done) {
            Some((column, _, remaining)) => Err(ColumnarError::TrailingBytes { column, remaining }),
            None => Ok(()),
        }
    }
}

impl Iterator for ChangeDecoder<'_> {
    type Item = Result<ChangeMeta, ColumnarError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_change().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.finished = true;
        }
        result
    }
}
