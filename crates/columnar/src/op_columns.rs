//! Operation columns: splits [`Op`] records into one column per field and
//! reassembles them.

use columnar_buffers::BufferError;

use crate::columns::{group_vec, required, ColumnDirectory, ColumnId, ColumnType, EncodedColumn, EncodedColumns};
use crate::encoding::{
    BooleanDecoder, BooleanEncoder, DeltaDecoder, DeltaEncoder, RawDecoder, RawEncoder, RleDecoder,
    RleEncoder,
};
use crate::op::{Action, ElemId, Key, ObjId, Op, OpId, ScalarValue};
use crate::options::{EncoderOptions, DEFAULT_MAX_GROUP_LEN};
use crate::ColumnarError;

pub const OBJ_ACTOR: ColumnId = ColumnId::new(0, ColumnType::ActorId);
pub const OBJ_CTR: ColumnId = ColumnId::new(0, ColumnType::IntRle);
pub const KEY_ACTOR: ColumnId = ColumnId::new(1, ColumnType::ActorId);
pub const KEY_CTR: ColumnId = ColumnId::new(1, ColumnType::IntDelta);
pub const KEY_STR: ColumnId = ColumnId::new(1, ColumnType::StringRle);
pub const ID_ACTOR: ColumnId = ColumnId::new(2, ColumnType::ActorId);
pub const ID_CTR: ColumnId = ColumnId::new(2, ColumnType::IntDelta);
pub const INSERT: ColumnId = ColumnId::new(3, ColumnType::Boolean);
pub const ACTION: ColumnId = ColumnId::new(4, ColumnType::IntRle);
pub const VAL_LEN: ColumnId = ColumnId::new(5, ColumnType::ValueLen);
pub const VAL_RAW: ColumnId = ColumnId::new(5, ColumnType::ValueRaw);
pub const CHLD_ACTOR: ColumnId = ColumnId::new(6, ColumnType::ActorId);
pub const CHLD_CTR: ColumnId = ColumnId::new(6, ColumnType::IntDelta);
pub const PRED_NUM: ColumnId = ColumnId::new(7, ColumnType::GroupCard);
pub const PRED_ACTOR: ColumnId = ColumnId::new(7, ColumnType::ActorId);
pub const PRED_CTR: ColumnId = ColumnId::new(7, ColumnType::IntDelta);
pub const SUCC_NUM: ColumnId = ColumnId::new(8, ColumnType::GroupCard);
pub const SUCC_ACTOR: ColumnId = ColumnId::new(8, ColumnType::ActorId);
pub const SUCC_CTR: ColumnId = ColumnId::new(8, ColumnType::IntDelta);

/// Which op-id group a record carries.
///
/// Changes list each op's predecessors; documents list successors instead,
/// which is what makes a deleted op recognizable without replaying history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpLayout {
    Change,
    Document,
}

impl OpLayout {
    fn group_columns(self) -> [(ColumnId, &'static str); 3] {
        match self {
            OpLayout::Change => [
                (PRED_NUM, "predNum"),
                (PRED_ACTOR, "predActor"),
                (PRED_CTR, "predCtr"),
            ],
            OpLayout::Document => [
                (SUCC_NUM, "succNum"),
                (SUCC_ACTOR, "succActor"),
                (SUCC_CTR, "succCtr"),
            ],
        }
    }

    fn group<'o>(self, op: &'o Op) -> &'o [OpId] {
        match self {
            OpLayout::Change => &op.pred,
            OpLayout::Document => &op.succ,
        }
    }
}

fn signed_counter(counter: u64, column: ColumnId) -> Result<i64, ColumnarError> {
    i64::try_from(counter).map_err(|_| ColumnarError::InvalidValue {
        column,
        description: format!("counter {counter} out of range"),
    })
}

#[derive(Debug, Clone)]
pub struct OpColumnEncoder {
    layout: OpLayout,
    obj_actor: RleEncoder<u64>,
    obj_ctr: RleEncoder<u64>,
    key_actor: RleEncoder<u64>,
    key_ctr: DeltaEncoder,
    key_str: RleEncoder<String>,
    id_actor: RleEncoder<u64>,
    id_ctr: DeltaEncoder,
    insert: BooleanEncoder,
    action: RleEncoder<u64>,
    val_len: RleEncoder<u64>,
    val_raw: RawEncoder,
    chld_actor: RleEncoder<u64>,
    chld_ctr: DeltaEncoder,
    group_num: RleEncoder<u64>,
    group_actor: RleEncoder<u64>,
    group_ctr: DeltaEncoder,
    ops: usize,
}

impl OpColumnEncoder {
    pub fn new(layout: OpLayout, options: &EncoderOptions) -> Self {
        let cap = options.initial_capacity;
        Self {
            layout,
            obj_actor: RleEncoder::with_capacity(cap),
            obj_ctr: RleEncoder::with_capacity(cap),
            key_actor: RleEncoder::with_capacity(cap),
            key_ctr: DeltaEncoder::with_capacity(cap),
            key_str: RleEncoder::with_capacity(cap),
            id_actor: RleEncoder::with_capacity(cap),
            id_ctr: DeltaEncoder::with_capacity(cap),
            insert: BooleanEncoder::with_capacity(cap),
            action: RleEncoder::with_capacity(cap),
            val_len: RleEncoder::with_capacity(cap),
            val_raw: RawEncoder::with_capacity(cap),
            chld_actor: RleEncoder::with_capacity(cap),
            chld_ctr: DeltaEncoder::with_capacity(cap),
            group_num: RleEncoder::with_capacity(cap),
            group_actor: RleEncoder::with_capacity(cap),
            group_ctr: DeltaEncoder::with_capacity(cap),
            ops: 0,
        }
    }

    pub fn layout(&self) -> OpLayout {
        self.layout
    }

    /// Number of ops written so far.
    pub fn len(&self) -> usize {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops == 0
    }

    pub fn write(&mut self, op: &Op) -> Result<(), ColumnarError> {
        match op.obj {
            ObjId::Root => {
                self.obj_actor.write(None)?;
                self.obj_ctr.write(None)?;
            }
            ObjId::Op(id) => {
                self.obj_actor.write(Some(id.actor as u64))?;
                self.obj_ctr.write(Some(id.counter))?;
            }
        }

        match &op.key {
            Key::Map(name) => {
                self.key_actor.write(None)?;
                self.key_ctr.write(None)?;
                self.key_str.write(Some(name.clone()))?;
            }
            Key::Seq(ElemId::Head) => {
                self.key_actor.write(None)?;
                self.key_ctr.write(Some(0))?;
                self.key_str.write(None)?;
            }
            Key::Seq(ElemId::Op(id)) => {
                self.key_actor.write(Some(id.actor as u64))?;
                self.key_ctr.write(Some(signed_counter(id.counter, KEY_CTR)?))?;
                self.key_str.write(None)?;
            }
        }

        self.id_actor.write(Some(op.id.actor as u64))?;
        self.id_ctr.write(Some(signed_counter(op.id.counter, ID_CTR)?))?;
        self.insert.write(op.insert)?;
        self.action.write(Some(op.action as u64))?;

        let (type_code, raw) = op.value.to_raw();
        self.val_len
            .write(Some(((raw.len() as u64) << 4) | u64::from(type_code)))?;
        self.val_raw.write(&raw)?;

        match op.child {
            None => {
                self.chld_actor.write(None)?;
                self.chld_ctr.write(None)?;
            }
            Some(id) => {
                self.chld_actor.write(Some(id.actor as u64))?;
                self.chld_ctr.write(Some(signed_counter(id.counter, CHLD_CTR)?))?;
            }
        }

        let group = self.layout.group(op);
        let [_, _, (ctr_column, _)] = self.layout.group_columns();
        self.group_num.write(Some(group.len() as u64))?;
        for id in group {
            self.group_actor.write(Some(id.actor as u64))?;
            self.group_ctr.write(Some(signed_counter(id.counter, ctr_column)?))?;
        }

        self.ops += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<EncodedColumns, BufferError> {
        let [(num_id, num_name), (actor_id, actor_name), (ctr_id, ctr_name)] =
            self.layout.group_columns();
        let column = |id, name, data| EncodedColumn { id, name, data };
        Ok(EncodedColumns {
            columns: vec![
                column(OBJ_ACTOR, "objActor", self.obj_actor.finish()?),
                column(OBJ_CTR, "objCtr", self.obj_ctr.finish()?),
                column(KEY_ACTOR, "keyActor", self.key_actor.finish()?),
                column(KEY_CTR, "keyCtr", self.key_ctr.finish()?),
                column(KEY_STR, "keyStr", self.key_str.finish()?),
                column(ID_ACTOR, "idActor", self.id_actor.finish()?),
                column(ID_CTR, "idCtr", self.id_ctr.finish()?),
                column(INSERT, "insert", self.insert.finish()?),
                column(ACTION, "action", self.action.finish()?),
                column(VAL_LEN, "valLen", self.val_len.finish()?),
                column(VAL_RAW, "valRaw", self.val_raw.finish()?),
                column(CHLD_ACTOR, "chldActor", self.chld_actor.finish()?),
                column(CHLD_CTR, "chldCtr", self.chld_ctr.finish()?),
                column(num_id, num_name, self.group_num.finish()?),
                column(actor_id, actor_name, self.group_actor.finish()?),
                column(ctr_id, ctr_name, self.group_ctr.finish()?),
            ],
        })
    }
}

fn nullable<T>(value: Option<Option<T>>, column: ColumnId) -> Result<Option<T>, ColumnarError> {
    value.ok_or(ColumnarError::ColumnEnded { column })
}

fn actor_index(actor: u64, column: ColumnId) -> Result<usize, ColumnarError> {
    usize::try_from(actor).map_err(|_| ColumnarError::InvalidValue {
        column,
        description: format!("actor index {actor} out of range"),
    })
}

fn counter(counter: i64, column: ColumnId) -> Result<u64, ColumnarError> {
    u64::try_from(counter).map_err(|_| ColumnarError::InvalidValue {
        column,
        description: format!("negative counter {counter}"),
    })
}

/// Builds an op id from an actor and a counter column that must be null
/// together.
fn op_id(
    actor: Option<u64>,
    ctr: Option<i64>,
    actor_column: ColumnId,
    ctr_column: ColumnId,
) -> Result<Option<OpId>, ColumnarError> {
    match (actor, ctr) {
        (None, None) => Ok(None),
        (Some(actor), Some(ctr)) => Ok(Some(OpId::new(
            counter(ctr, ctr_column)?,
            actor_index(actor, actor_column)?,
        ))),
        _ => Err(ColumnarError::InvalidValue {
            column: actor_column,
            description: "actor and counter columns disagree on null".to_owned(),
        }),
    }
}

/// Reassembles [`Op`] records from a directory, one per iteration.
///
/// Once the action column runs out every other column must be exhausted as
/// well; leftover bytes are reported as [`ColumnarError::TrailingBytes`].
#[derive(Debug, Clone)]
pub struct OpColumnDecoder<'a> {
    layout: OpLayout,
    obj_actor: RleDecoder<'a, u64>,
    obj_ctr: RleDecoder<'a, u64>,
    key_actor: RleDecoder<'a, u64>,
    key_ctr: DeltaDecoder<'a>,
    key_str: RleDecoder<'a, String>,
    id_actor: RleDecoder<'a, u64>,
    id_ctr: DeltaDecoder<'a>,
    insert: BooleanDecoder<'a>,
    action: RleDecoder<'a, u64>,
    val_len: RleDecoder<'a, u64>,
    val_raw: RawDecoder<'a>,
    chld_actor: RleDecoder<'a, u64>,
    chld_ctr: DeltaDecoder<'a>,
    group_num: RleDecoder<'a, u64>,
    group_actor: RleDecoder<'a, u64>,
    group_ctr: DeltaDecoder<'a>,
    max_group_len: u64,
    finished: bool,
}

impl<'a> OpColumnDecoder<'a> {
    pub fn new(columns: &ColumnDirectory<'a>, layout: OpLayout) -> Self {
        let [(num, _), (actor, _), (ctr, _)] = layout.group_columns();
        Self {
            layout,
            obj_actor: RleDecoder::new(columns.data(OBJ_ACTOR)),
            obj_ctr: RleDecoder::new(columns.data(OBJ_CTR)),
            key_actor: RleDecoder::new(columns.data(KEY_ACTOR)),
            key_ctr: DeltaDecoder::new(columns.data(KEY_CTR)),
            key_str: RleDecoder::new(columns.data(KEY_STR)),
            id_actor: RleDecoder::new(columns.data(ID_ACTOR)),
            id_ctr: DeltaDecoder::new(columns.data(ID_CTR)),
            insert: BooleanDecoder::new(columns.data(INSERT)),
            action: RleDecoder::new(columns.data(ACTION)),
            val_len: RleDecoder::new(columns.data(VAL_LEN)),
            val_raw: RawDecoder::new(columns.data(VAL_RAW)),
            chld_actor: RleDecoder::new(columns.data(CHLD_ACTOR)),
            chld_ctr: DeltaDecoder::new(columns.data(CHLD_CTR)),
            group_num: RleDecoder::new(columns.data(num)),
            group_actor: RleDecoder::new(columns.data(actor)),
            group_ctr: DeltaDecoder::new(columns.data(ctr)),
            max_group_len: DEFAULT_MAX_GROUP_LEN,
            finished: false,
        }
    }

    /// Caps the number of entries in one pred or succ group.
    pub fn with_max_group_len(mut self, max_group_len: u64) -> Self {
        self.max_group_len = max_group_len;
        self
    }

    pub fn next_op(&mut self) -> Result<Option<Op>, ColumnarError> {
        let Some(action) = self.action.next_value()? else {
            self.check_exhausted()?;
            return Ok(None);
        };
        let action = required(Some(action), ACTION)?;
        let action = Action::try_from(action).map_err(|code| ColumnarError::InvalidValue {
            column: ACTION,
            description: format!("unknown action {code}"),
        })?;

        let obj_ctr = nullable(self.obj_ctr.next_value()?, OBJ_CTR)?
            .map(|ctr| {
                i64::try_from(ctr).map_err(|_| ColumnarError::InvalidValue {
                    column: OBJ_CTR,
                    description: format!("object counter {ctr} out of range"),
                })
            })
            .transpose()?;
        let obj = op_id(
            nullable(self.obj_actor.next_value()?, OBJ_ACTOR)?,
            obj_ctr,
            OBJ_ACTOR,
            OBJ_CTR,
        )?
        .map_or(ObjId::Root, ObjId::Op);

        let key_actor = nullable(self.key_actor.next_value()?, KEY_ACTOR)?;
        let key_ctr = nullable(self.key_ctr.next_value()?, KEY_CTR)?;
        let key_str = nullable(self.key_str.next_value()?, KEY_STR)?;
        let key = match (key_actor, key_ctr, key_str) {
            (None, None, Some(name)) => Key::Map(name),
            (None, Some(0), None) => Key::Seq(ElemId::Head),
            (Some(actor), Some(ctr), None) => Key::Seq(ElemId::Op(OpId::new(
                counter(ctr, KEY_CTR)?,
                actor_index(actor, KEY_ACTOR)?,
            ))),
            _ => {
                return Err(ColumnarError::InvalidValue {
                    column: KEY_STR,
                    description: "key is neither a map key nor an element".to_owned(),
                })
            }
        };

        let id = OpId::new(
            counter(required(self.id_ctr.next_value()?, ID_CTR)?, ID_CTR)?,
            actor_index(required(self.id_actor.next_value()?, ID_ACTOR)?, ID_ACTOR)?,
        );

        let insert = self
            .insert
            .next_value()?
            .ok_or(ColumnarError::ColumnEnded { column: INSERT })?;

        let tag = required(self.val_len.next_value()?, VAL_LEN)?;
        let len = usize::try_from(tag >> 4).map_err(|_| ColumnarError::ColumnEnded { column: VAL_RAW })?;
        let raw = self
            .val_raw
            .read(len)
            .map_err(|_| ColumnarError::ColumnEnded { column: VAL_RAW })?;
        let value = ScalarValue::from_raw((tag & 0xf) as u8, raw)
            .map_err(|description| ColumnarError::InvalidValue { column: VAL_RAW, description })?;

        let child = op_id(
            nullable(self.chld_actor.next_value()?, CHLD_ACTOR)?,
            nullable(self.chld_ctr.next_value()?, CHLD_CTR)?,
            CHLD_ACTOR,
            CHLD_CTR,
        )?;

        let [(num_column, _), (actor_column, _), (ctr_column, _)] = self.layout.group_columns();
        let num = required(self.group_num.next_value()?, num_column)?;
        let mut group = group_vec(num, self.max_group_len, num_column)?;
        for _ in 0..num {
            let actor = required(self.group_actor.next_value()?, actor_column)?;
            let ctr = required(self.group_ctr.next_value()?, ctr_column)?;
            group.push(OpId::new(
                counter(ctr, ctr_column)?,
                actor_index(actor, actor_column)?,
            ));
        }
        let (pred, succ) = match self.layout {
            OpLayout::Change => (group, Vec::new()),
            OpLayout::Document => (Vec::new(), group),
        };

        Ok(Some(Op {
            obj,
            key,
            id,
            insert,
            action,
            value,
            child,
            pred,
            succ,
        }))
    }

    fn check_exhausted(&self) -> Result<(), ColumnarError> {
        let [(num, _), (actor, _), (ctr, _)] = self.layout.group_columns();
        let columns = [
            (OBJ_ACTOR, self.obj_actor.done(), self.obj_actor.remaining()),
            (OBJ_CTR, self.obj_ctr.done(), self.obj_ctr.remaining()),
            (KEY_ACTOR, self.key_actor.done(), self.key_actor.remaining()),
            (KEY_CTR, self.key_ctr.done(), self.key_ctr.remaining()),
            (KEY_STR, self.key_str.done(), self.key_str.remaining()),
            (ID_ACTOR, self.id_actor.done(), self.id_actor.remaining()),
            (ID_CTR, self.id_ctr.done(), self.id_ctr.remaining()),
            (INSERT, self.insert.done(), self.insert.remaining()),
            (VAL_LEN, self.val_len.done(), self.val_len.remaining()),
            (VAL_RAW, self.val_raw.done(), self.val_raw.remaining()),
            (CHLD_ACTOR, self.chld_actor.done(), self.chld_actor.remaining()),
            (CHLD_CTR, self.chld_ctr.done(), self.chld_ctr.remaining()),
            (num, self.group_num.done(), self.group_num.remaining()),
            (actor, self.group_actor.done(), self.group_actor.remaining()),
            (ctr, self.group_ctr.done(), self.group_ctr.remaining()),
        ];
        match columns.into_iter().find(|(_, done, _)| !done) {
            Some((column, _, remaining)) => Err(ColumnarError::TrailingBytes { column, remaining }),
            None => Ok(()),
        }
    }
}

impl Iterator for OpColumnDecoder<'_> {
    type Item = Result<Op, ColumnarError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let result = self.next_op().transpose();
        if !matches!(result, Some(Ok(_))) {
            self.finished = true;
        }
        result
    }
}
