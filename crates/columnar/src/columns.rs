//! Column identifiers and column directories.
//!
//! A directory is a sequence of `(column id, length-prefixed bytes)` pairs
//! with strictly ascending ids. The low three bits of an id say how the bytes
//! are encoded; the remaining bits name the field.

use std::fmt;

use columnar_buffers::{BufferError, Reader, Writer};
use serde::Serialize;
use tracing::debug;

use crate::ColumnarError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    GroupCard = 0,
    ActorId = 1,
    IntRle = 2,
    IntDelta = 3,
    Boolean = 4,
    StringRle = 5,
    ValueLen = 6,
    ValueRaw = 7,
}

impl ColumnType {
    /// Interprets the low three bits of `tag`.
    pub const fn from_tag(tag: u64) -> Self {
        match tag & 7 {
            0 => ColumnType::GroupCard,
            1 => ColumnType::ActorId,
            2 => ColumnType::IntRle,
            3 => ColumnType::IntDelta,
            4 => ColumnType::Boolean,
            5 => ColumnType::StringRle,
            6 => ColumnType::ValueLen,
            _ => ColumnType::ValueRaw,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(u64);

impl ColumnId {
    pub const fn new(field: u64, column_type: ColumnType) -> Self {
        ColumnId((field << 3) | column_type as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        ColumnId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn field(self) -> u64 {
        self.0 >> 3
    }

    pub const fn column_type(self) -> ColumnType {
        ColumnType::from_tag(self.0)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of a parsed directory, borrowing its bytes from the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column<'a> {
    pub id: ColumnId,
    pub data: &'a [u8],
}

impl<'a> Column<'a> {
    /// Fresh cursor over the column bytes.
    pub fn reader(&self) -> Reader<'a> {
        Reader::new(self.data)
    }
}

/// Parsed directory, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDirectory<'a> {
    columns: Vec<Column<'a>>,
}

impl<'a> ColumnDirectory<'a> {
    pub fn get(&self, id: ColumnId) -> Option<&Column<'a>> {
        self.columns
            .binary_search_by_key(&id, |column| column.id)
            .ok()
            .map(|index| &self.columns[index])
    }

    /// Bytes of column `id`; a column that is not present reads as empty.
    pub fn data(&self, id: ColumnId) -> &'a [u8] {
        self.get(id).map(|column| column.data).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column<'a>> + '_ {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Reads directory entries while input remains and, if `max_columns` is
/// given, until that many entries were read.
pub fn read_columns<'a>(
    reader: &mut Reader<'a>,
    max_columns: Option<usize>,
) -> Result<ColumnDirectory<'a>, ColumnarError> {
    let limit = max_columns.unwrap_or(usize::MAX);
    let mut columns: Vec<Column<'a>> = Vec::new();
    while !reader.is_done() && columns.len() < limit {
        let id = ColumnId::from_raw(reader.try_uleb128()?);
        if let Some(previous) = columns.last() {
            if id <= previous.id {
                return Err(ColumnarError::ColumnOrder {
                    previous: previous.id,
                    current: id,
                });
            }
        }
        let data = reader.try_prefixed_buf()?;
        debug!(column = %id, len = data.len(), "read column");
        columns.push(Column { id, data });
    }
    Ok(ColumnDirectory { columns })
}

/// Output of one column encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedColumn {
    pub id: ColumnId,
    pub name: &'static str,
    pub data: Vec<u8>,
}

/// Result of finishing a multi-column encoder, in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedColumns {
    pub columns: Vec<EncodedColumn>,
}

impl EncodedColumns {
    pub fn get(&self, id: ColumnId) -> Option<&EncodedColumn> {
        self.columns.iter().find(|column| column.id == id)
    }

    /// Number of columns `write_columns` will actually write.
    pub fn non_empty(&self) -> usize {
        self.columns.iter().filter(|c| !c.data.is_empty()).count()
    }

    pub fn sizes(&self) -> ColumnSizes {
        ColumnSizes {
            columns: self
                .columns
                .iter()
                .map(|column| ColumnSize {
                    name: column.name.to_owned(),
                    bytes: column.data.len(),
                })
                .collect(),
        }
    }

    /// Serializes the columns as a directory.
    pub fn write_to(&self, out: &mut Writer) -> Result<usize, ColumnarError> {
        write_columns(out, &self.columns)
    }

    /// Serializes the directory into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ColumnarError> {
        let mut out = Writer::with_capacity(64);
        self.write_to(&mut out)?;
        Ok(out.into_vec())
    }
}

/// Writes `(id, prefixed bytes)` pairs, leaving out empty columns. Returns
/// the number of columns written.
pub fn write_columns(out: &mut Writer, columns: &[EncodedColumn]) -> Result<usize, ColumnarError> {
    let mut previous: Option<ColumnId> = None;
    let mut written = 0;
    for column in columns {
        if let Some(previous) = previous {
            if column.id <= previous {
                return Err(ColumnarError::ColumnOrder {
                    previous,
                    current: column.id,
                });
            }
        }
        previous = Some(column.id);
        if column.data.is_empty() {
            continue;
        }
        out.uleb128(column.id.raw())?;
        out.prefixed_buf(&column.data)?;
        written += 1;
    }
    Ok(written)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSize {
    pub name: String,
    pub bytes: usize,
}

/// Per-column byte counts of one encoding run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSizes {
    pub columns: Vec<ColumnSize>,
}

impl ColumnSizes {
    pub fn total(&self) -> usize {
        self.columns.iter().map(|c| c.bytes).sum()
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.bytes)
    }
}

impl fmt::Display for ColumnSizes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for column in &self.columns {
            writeln!(f, "{:<16} {:>10}", column.name, column.bytes)?;
        }
        write!(f, "{:<16} {:>10}", "total", self.total())
    }
}

/// Unwraps a value that must be present and non-null.
pub(crate) fn required<T>(value: Option<Option<T>>, column: ColumnId) -> Result<T, ColumnarError> {
    match value {
        None => Err(ColumnarError::ColumnEnded { column }),
        Some(None) => Err(ColumnarError::UnexpectedNull { column }),
        Some(Some(value)) => Ok(value),
    }
}

/// Allocates room for a group of `len` entries read from `column`.
pub(crate) fn group_vec<T>(len: u64, limit: u64, column: ColumnId) -> Result<Vec<T>, ColumnarError> {
    if len > limit {
        return Err(ColumnarError::GroupTooLarge { column, len, limit });
    }
    let requested = usize::try_from(len).map_err(|_| BufferError::Alloc { requested: usize::MAX })?;
    let mut group = Vec::new();
    group
        .try_reserve_exact(requested)
        .map_err(|_| BufferError::Alloc { requested })?;
    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory(ids: &[u64]) -> Vec<u8> {
        let mut out = Writer::with_capacity(16);
        for id in ids {
            out.uleb128(*id).unwrap();
            out.prefixed_buf(&[*id as u8]).unwrap();
        }
        out.into_vec()
    }

    #[test]
    fn ascending_ids_parse() {
        let bytes = directory(&[1, 2, 9]);
        let dir = read_columns(&mut Reader::new(&bytes), None).unwrap();
        assert_eq!(dir.len(), 3);
        assert_eq!(dir.data(ColumnId::from_raw(9)), [9]);
        assert!(dir.data(ColumnId::from_raw(3)).is_empty());
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let bytes = directory(&[2, 5, 5]);
        let err = read_columns(&mut Reader::new(&bytes), None).unwrap_err();
        assert!(matches!(
            err,
            ColumnarError::ColumnOrder { previous, current }
                if previous.raw() == 5 && current.raw() == 5
        ));
    }

    #[test]
    fn descending_ids_are_rejected() {
        let bytes = directory(&[5, 2]);
        assert!(matches!(
            read_columns(&mut Reader::new(&bytes), None),
            Err(ColumnarError::ColumnOrder { .. })
        ));
    }

    #[test]
    fn max_columns_stops_early() {
        let bytes = directory(&[1, 2, 9]);
        let mut reader = Reader::new(&bytes);
        let first = read_columns(&mut reader, Some(2)).unwrap();
        assert_eq!(first.len(), 2);
        let rest = read_columns(&mut reader, None).unwrap();
        assert_eq!(rest.iter().map(|c| c.id.raw()).collect::<Vec<_>>(), [9]);
    }

    #[test]
    fn truncated_column_is_an_error() {
        let bytes = [0x01, 0x05, 0xaa];
        assert!(matches!(
            read_columns(&mut Reader::new(&bytes), None),
            Err(ColumnarError::Buffer(_))
        ));
    }

    #[test]
    fn id_packs_field_and_type() {
        let id = ColumnId::new(5, ColumnType::ValueRaw);
        assert_eq!(id.raw(), 47);
        assert_eq!(id.field(), 5);
        assert_eq!(id.column_type(), ColumnType::ValueRaw);
        assert_eq!(id.to_string(), "47");
    }

    #[test]
    fn write_skips_empty_and_checks_order() {
        let columns = vec![
            EncodedColumn { id: ColumnId::from_raw(1), name: "a", data: vec![7] },
            EncodedColumn { id: ColumnId::from_raw(2), name: "b", data: vec![] },
            EncodedColumn { id: ColumnId::from_raw(9), name: "c", data: vec![8, 8] },
        ];
        let mut out = Writer::with_capacity(8);
        assert_eq!(write_columns(&mut out, &columns).unwrap(), 2);
        assert_eq!(out.into_vec(), [1, 1, 7, 9, 2, 8, 8]);

        let reversed: Vec<_> = columns.into_iter().rev().collect();
        let mut out = Writer::with_capacity(8);
        assert!(write_columns(&mut out, &reversed).is_err());
    }

    #[test]
    fn sizes_total() {
        let encoded = EncodedColumns {
            columns: vec![
                EncodedColumn { id: ColumnId::from_raw(1), name: "a", data: vec![0; 3] },
                EncodedColumn { id: ColumnId::from_raw(2), name: "b", data: vec![0; 4] },
            ],
        };
        let sizes = encoded.sizes();
        assert_eq!(sizes.total(), 7);
        assert_eq!(sizes.get("b"), Some(4));
        assert_eq!(encoded.non_empty(), 2);
    }

    #[test]
    fn group_allocation_is_bounded() {
        let column = ColumnId::from_raw(56);
        assert!(group_vec::<u64>(3, 4, column).unwrap().capacity() >= 3);
        assert!(matches!(
            group_vec::<u64>(5, 4, column),
            Err(ColumnarError::GroupTooLarge { len: 5, limit: 4, .. })
        ));
        assert!(matches!(
            group_vec::<u64>(u64::MAX, u64::MAX, column),
            Err(ColumnarError::Buffer(BufferError::Alloc { .. }))
        ));
    }

    #[test]
    fn required_values() {
        let column = ColumnId::from_raw(1);
        assert_eq!(required(Some(Some(3)), column).unwrap(), 3);
        assert!(matches!(required::<u64>(Some(None), column), Err(ColumnarError::UnexpectedNull { .. })));
        assert!(matches!(required::<u64>(None, column), Err(ColumnarError::ColumnEnded { .. })));
    }
}
