//! Live text of a text object, read straight from the op columns.
//!
//! [`reconstruct_text`] is the single-pass fast path. It only looks at the
//! object-counter, value-length, value-raw and successor-count columns and
//! needs the document to have a particular shape:
//!
//! - the object-counter column is an optional run of nulls (ops outside any
//!   object, skipped) followed by exactly one run of the tracked counter;
//! - every tracked op carries a one-byte UTF-8 value and every skipped op a
//!   null value.
//!
//! Anything else is a [`PreconditionError`], and [`load_text`] falls back to
//! [`visible_text`], which decodes every op.

use columnar_buffers::Writer;
use tracing::{debug, warn};

use crate::columns::ColumnDirectory;
use crate::encoding::{RawDecoder, RleDecoder, Run};
use crate::op::{Action, ObjId, SINGLE_BYTE_UTF8};
use crate::op_columns::{OpColumnDecoder, OpLayout, OBJ_CTR, SUCC_NUM, VAL_LEN, VAL_RAW};
use crate::options::{TextOptions, DEFAULT_MAX_GROUP_LEN};
use crate::{ColumnarError, PreconditionError};

/// Returns `(skip, read)`: the number of leading ops outside the object and
/// the number of ops on it.
fn object_span(ops: &ColumnDirectory<'_>, object: u64) -> Result<(u64, u64), ColumnarError> {
    let layout = || PreconditionError::ObjectLayout { object };
    let mut runs = RleDecoder::<u64>::new(ops.data(OBJ_CTR));
    let mut skip = 0;
    let mut run = runs.next_run()?;
    if let Some(Run { count, value: None }) = run {
        skip = count;
        run = runs.next_run()?;
    }
    let read = match run {
        None => 0,
        Some(Run { count, value: Some(value) }) if value == object => count,
        Some(_) => return Err(layout().into()),
    };
    if runs.next_run()?.is_some() {
        return Err(layout().into());
    }
    if read == 0 {
        return Err(PreconditionError::NoOperations { object }.into());
    }
    Ok((skip, read))
}

fn check_values(ops: &ColumnDirectory<'_>, object: u64, skip: u64, read: u64) -> Result<(), ColumnarError> {
    let mut runs = RleDecoder::<u64>::new(ops.data(VAL_LEN));
    let mut expect = |count: u64, value: u64| -> Result<(), ColumnarError> {
        match runs.next_run()? {
            Some(run) if run.count == count && run.value == Some(value) => Ok(()),
            _ => Err(PreconditionError::ValueLayout { object }.into()),
        }
    };
    if skip > 0 {
        expect(skip, 0)?;
    }
    expect(read, SINGLE_BYTE_UTF8)?;
    if runs.next_run()?.is_some() {
        return Err(PreconditionError::ValueLayout { object }.into());
    }
    Ok(())
}

fn to_len(count: u64) -> Result<usize, ColumnarError> {
    usize::try_from(count).map_err(|_| ColumnarError::ColumnEnded { column: VAL_RAW })
}

/// Fast path: the UTF-8 bytes of the ops on the tracked object that have
/// no successors, in column order.
pub fn reconstruct_text(ops: &ColumnDirectory<'_>, options: &TextOptions) -> Result<Vec<u8>, ColumnarError> {
    let object = options.object_counter;
    let (skip, read) = object_span(ops, object)?;
    check_values(ops, object, skip, read)?;
    debug!(object, skip, read, "reconstructing text");

    let mut succ = RleDecoder::<u64>::new(ops.data(SUCC_NUM));
    let mut values = RawDecoder::new(ops.data(VAL_RAW));
    let mut out = Writer::with_capacity(to_len(read.min(1 << 20))?);
    let mut skip_left = skip;
    let mut remaining = read;
    while remaining > 0 {
        let run = succ
            .next_run()?
            .ok_or(ColumnarError::ColumnEnded { column: SUCC_NUM })?;
        let mut count = run.count;
        if skip_left > 0 {
            let skipped = count.min(skip_left);
            skip_left -= skipped;
            count -= skipped;
        }
        if count > remaining {
            return Err(ColumnarError::RunOverflow { column: SUCC_NUM });
        }
        remaining -= count;
        let span = values
            .read(to_len(count)?)
            .map_err(|_| ColumnarError::ColumnEnded { column: VAL_RAW })?;
        if run.value == Some(0) {
            out.buf(span)?;
        }
    }

    if !succ.done() {
        return Err(ColumnarError::TrailingBytes {
            column: SUCC_NUM,
            remaining: succ.remaining(),
        });
    }
    if !values.done() {
        return Err(ColumnarError::TrailingBytes {
            column: VAL_RAW,
            remaining: values.remaining(),
        });
    }
    Ok(out.into_vec())
}

/// General path: decodes every op and concatenates the string values of
/// the live `set` ops on the tracked object. An element overwritten in
/// place shows its replacement, which is a `set` without `insert`.
pub fn visible_text(ops: &ColumnDirectory<'_>, options: &TextOptions) -> Result<String, ColumnarError> {
    visible_text_limited(ops, options, DEFAULT_MAX_GROUP_LEN)
}

fn visible_text_limited(
    ops: &ColumnDirectory<'_>,
    options: &TextOptions,
    max_group_len: u64,
) -> Result<String, ColumnarError> {
    let mut text = String::new();
    for op in OpColumnDecoder::new(ops, OpLayout::Document).with_max_group_len(max_group_len) {
        let op = op?;
        let on_object = matches!(op.obj, ObjId::Op(id) if id.counter == options.object_counter);
        if on_object && op.action == Action::Set && op.is_live() {
            if let Some(s) = op.value.as_str() {
                text.push_str(s);
            }
        }
    }
    Ok(text)
}

/// Fast path with fallback to general decoding, per `options.fallback`.
pub fn load_text(ops: &ColumnDirectory<'_>, options: &TextOptions) -> Result<String, ColumnarError> {
    load_text_limited(ops, options, DEFAULT_MAX_GROUP_LEN)
}

pub(crate) fn load_text_limited(
    ops: &ColumnDirectory<'_>,
    options: &TextOptions,
    max_group_len: u64,
) -> Result<String, ColumnarError> {
    match reconstruct_text(ops, options) {
        Ok(bytes) => Ok(String::from_utf8(bytes)?),
        Err(err) if err.is_precondition() && options.fallback => {
            warn!(%err, "falling back to general decoding");
            visible_text_limited(ops, options, max_group_len)
        }
        Err(err) => Err(err),
    }
}
