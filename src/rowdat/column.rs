//! Column-oriented ROWDAT_1 codec.
//!
//! Decoding produces parallel fixed-stride buffers per column (data +
//! NULL mask) plus a row-id vector; string cells become `u64` handles
//! into an object table owned by the returned batch. Encoding consumes
//! typed column slices with optional boolean masks and range-checks
//! every value against the destination SQL type.

use crate::error::{Error, Result};

use super::{CellObject, Cursor, ResolvedCol, WireKind, resolve_colspec};
#[cfg(test)]
use super::ALIGN_MSG;

/// Format tag describing a columnar buffer's element type, in the
/// single-character convention of typed-array wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Bool,
}

impl FormatTag {
    pub fn as_char(self) -> char {
        match self {
            Self::I8 => 'b',
            Self::U8 => 'B',
            Self::I16 => 'h',
            Self::U16 => 'H',
            Self::I32 => 'i',
            Self::U32 => 'I',
            Self::I64 => 'q',
            Self::U64 => 'Q',
            Self::F32 => 'f',
            Self::F64 => 'd',
            Self::Bool => '?',
        }
    }

    fn for_col(col: &ResolvedCol) -> Self {
        match col.kind {
            WireKind::Int8 { unsigned: false } => Self::I8,
            WireKind::Int8 { unsigned: true } => Self::U8,
            WireKind::Int16 { unsigned: false } => Self::I16,
            WireKind::Int16 { unsigned: true } => Self::U16,
            WireKind::Int32 { unsigned: false } => Self::I32,
            WireKind::Int32 { unsigned: true } => Self::U32,
            WireKind::Int64 { unsigned: false } => Self::I64,
            WireKind::Int64 { unsigned: true } => Self::U64,
            WireKind::Float32 => Self::F32,
            WireKind::Float64 => Self::F64,
            // YEAR widens to u64; string cells are u64 handles
            WireKind::Year | WireKind::Str { .. } => Self::U64,
        }
    }
}

/// One decoded column: a fixed-stride data buffer in native byte order,
/// a one-byte-per-row NULL mask (`0x01` = NULL), and the format tag the
/// caller needs to wrap the data in a typed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedColumn {
    pub data: Vec<u8>,
    pub mask: Vec<u8>,
    pub format: FormatTag,
}

impl LoadedColumn {
    /// The mask buffer's own format tag.
    pub fn mask_format(&self) -> FormatTag {
        FormatTag::Bool
    }
}

/// Result of a columnar decode. String and blob cells live in
/// `objects`; the corresponding data buffers hold `u64` indices into
/// it. Ownership of everything transfers to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnarBatch {
    pub n_rows: usize,
    pub row_ids: Vec<u64>,
    pub columns: Vec<LoadedColumn>,
    pub objects: Vec<CellObject>,
}

/// Decode a ROWDAT_1 buffer into parallel column arrays.
///
/// The buffer is scanned twice: once to count rows and validate shape,
/// once to fill the pre-sized output buffers.
pub fn load_column(colspec: &[(String, i16)], buf: &[u8]) -> Result<ColumnarBatch> {
    let cols = resolve_colspec(colspec.iter().map(|(_, code)| *code))?;

    let n_rows = count_rows(&cols, buf)?;

    let mut row_ids = Vec::with_capacity(n_rows);
    let mut columns: Vec<LoadedColumn> = cols
        .iter()
        .map(|col| LoadedColumn {
            data: vec![0u8; col.kind.item_size() * n_rows],
            mask: vec![0u8; n_rows],
            format: FormatTag::for_col(col),
        })
        .collect();
    let mut objects = Vec::new();

    let mut cursor = Cursor::new(buf);
    for row in 0..n_rows {
        row_ids.push(cursor.u64_le()?);
        for (col, out) in cols.iter().zip(columns.iter_mut()) {
            let is_null = cursor.u8()? != 0;
            let item = col.kind.item_size();
            let slot = row * item;
            match col.kind {
                WireKind::Int8 { .. } => {
                    let raw = cursor.u8()?;
                    if !is_null {
                        out.data[slot] = raw;
                    }
                }
                WireKind::Int16 { .. } => {
                    let raw = cursor.u16_le()?;
                    if !is_null {
                        out.data[slot..slot + 2].copy_from_slice(&raw.to_ne_bytes());
                    }
                }
                WireKind::Int32 { .. } | WireKind::Float32 => {
                    let raw = cursor.u32_le()?;
                    if !is_null {
                        out.data[slot..slot + 4].copy_from_slice(&raw.to_ne_bytes());
                    }
                }
                WireKind::Int64 { .. } | WireKind::Float64 => {
                    let raw = cursor.u64_le()?;
                    if !is_null {
                        out.data[slot..slot + 8].copy_from_slice(&raw.to_ne_bytes());
                    }
                }
                WireKind::Year => {
                    let raw = u64::from(cursor.u16_le()?);
                    if !is_null {
                        out.data[slot..slot + 8].copy_from_slice(&raw.to_ne_bytes());
                    }
                }
                WireKind::Str { binary } => {
                    let payload = cursor.str_payload()?;
                    if !is_null {
                        let object = if binary {
                            CellObject::Bytes(payload.to_vec())
                        } else {
                            let text = simdutf8::basic::from_utf8(payload).map_err(|_| {
                                Error::Encoding(
                                    "invalid UTF-8 in ROWDAT_1 string cell".to_string(),
                                )
                            })?;
                            CellObject::Str(text.to_string())
                        };
                        let handle = objects.len() as u64;
                        objects.push(object);
                        out.data[slot..slot + 8].copy_from_slice(&handle.to_ne_bytes());
                    }
                }
            }
            if is_null {
                out.mask[row] = 1;
            }
        }
    }
    Ok(ColumnarBatch {
        n_rows,
        row_ids,
        columns,
        objects,
    })
}

/// First pass: walk the buffer without materialising anything.
fn count_rows(cols: &[ResolvedCol], buf: &[u8]) -> Result<usize> {
    let mut cursor = Cursor::new(buf);
    let mut n_rows = 0usize;
    while !cursor.is_empty() {
        cursor.take(8)?; // row id
        for col in cols {
            cursor.take(1)?; // null marker
            match col.kind.fixed_wire_size() {
                Some(width) => {
                    cursor.take(width)?;
                }
                None => {
                    cursor.str_payload()?;
                }
            }
        }
        n_rows += 1;
    }
    Ok(n_rows)
}

/// A typed source column for [`dump_column`]: one of the fixed-width
/// numeric slices, or object cells (format `O`) for string targets.
#[derive(Debug, Clone, Copy)]
pub enum ColumnData<'a> {
    I8(&'a [i8]),
    U8(&'a [u8]),
    I16(&'a [i16]),
    U16(&'a [u16]),
    I32(&'a [i32]),
    U32(&'a [u32]),
    I64(&'a [i64]),
    U64(&'a [u64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
    Obj(&'a [CellObject]),
}

impl ColumnData<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::I8(s) => s.len(),
            Self::U8(s) => s.len(),
            Self::I16(s) => s.len(),
            Self::U16(s) => s.len(),
            Self::I32(s) => s.len(),
            Self::U32(s) => s.len(),
            Self::I64(s) => s.len(),
            Self::U64(s) => s.len(),
            Self::F32(s) => s.len(),
            Self::F64(s) => s.len(),
            Self::Obj(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::I8(_) => "int8",
            Self::U8(_) => "uint8",
            Self::I16(_) => "int16",
            Self::U16(_) => "uint16",
            Self::I32(_) => "int32",
            Self::U32(_) => "uint32",
            Self::I64(_) => "int64",
            Self::U64(_) => "uint64",
            Self::F32(_) => "float32",
            Self::F64(_) => "float64",
            Self::Obj(_) => "object",
        }
    }

    /// Cell as a wide integer, for any integer source kind.
    fn int_at(&self, row: usize) -> Option<i128> {
        match self {
            Self::I8(s) => Some(i128::from(s[row])),
            Self::U8(s) => Some(i128::from(s[row])),
            Self::I16(s) => Some(i128::from(s[row])),
            Self::U16(s) => Some(i128::from(s[row])),
            Self::I32(s) => Some(i128::from(s[row])),
            Self::U32(s) => Some(i128::from(s[row])),
            Self::I64(s) => Some(i128::from(s[row])),
            Self::U64(s) => Some(i128::from(s[row])),
            Self::F32(_) | Self::F64(_) | Self::Obj(_) => None,
        }
    }

    fn float_at(&self, row: usize) -> Option<f64> {
        match self {
            Self::F32(s) => Some(f64::from(s[row])),
            Self::F64(s) => Some(s[row]),
            _ => None,
        }
    }
}

fn unsupported_source(col: &ResolvedCol, data: &ColumnData<'_>) -> Error {
    Error::InvalidData(format!(
        "unsupported source column type {} for {}",
        data.kind_name(),
        col.sql_name()
    ))
}

/// Encode parallel column arrays into a ROWDAT_1 buffer.
///
/// `returns` lists the signed target type codes; each column is a data
/// slice plus an optional NULL mask of the same length. Masked cells
/// write a zeroed payload. Integer and float values are widened or
/// narrowed to the target width after a range check.
pub fn dump_column(
    returns: &[i16],
    row_ids: &[u64],
    columns: &[(ColumnData<'_>, Option<&[bool]>)],
) -> Result<Vec<u8>> {
    let cols = resolve_colspec(returns.iter().copied())?;
    if columns.len() != cols.len() {
        return Err(Error::InvalidData(format!(
            "{} columns supplied but {} return types were specified",
            columns.len(),
            cols.len()
        )));
    }
    let n_rows = row_ids.len();
    for (data, mask) in columns {
        if data.len() != n_rows {
            return Err(Error::InvalidData(format!(
                "data column length ({}) does not match row id count ({n_rows})",
                data.len()
            )));
        }
        if let Some(mask) = mask
            && mask.len() != n_rows
        {
            return Err(Error::InvalidData(format!(
                "mask length ({}) does not match row id count ({n_rows})",
                mask.len()
            )));
        }
    }

    let mut out = Vec::new();
    for row in 0..n_rows {
        out.extend_from_slice(&row_ids[row].to_le_bytes());
        for (col, (data, mask)) in cols.iter().zip(columns) {
            let is_null = mask.is_some_and(|m| m[row]);
            out.push(u8::from(is_null));
            write_columnar_cell(&mut out, col, data, row, is_null)?;
        }
    }
    Ok(out)
}

fn write_columnar_cell(
    out: &mut Vec<u8>,
    col: &ResolvedCol,
    data: &ColumnData<'_>,
    row: usize,
    is_null: bool,
) -> Result<()> {
    match col.kind {
        WireKind::Int8 { .. }
        | WireKind::Int16 { .. }
        | WireKind::Int32 { .. }
        | WireKind::Int64 { .. }
        | WireKind::Year => {
            let value = if is_null {
                0
            } else {
                let value = data
                    .int_at(row)
                    .ok_or_else(|| unsupported_source(col, data))?;
                col.check_int_range(value)?;
                value
            };
            // Truncation is safe once the range check passed.
            match col.kind.fixed_wire_size() {
                Some(1) => out.push(value as u8),
                Some(2) => out.extend_from_slice(&(value as u16).to_le_bytes()),
                Some(4) => out.extend_from_slice(&(value as u32).to_le_bytes()),
                _ => out.extend_from_slice(&(value as u64).to_le_bytes()),
            }
        }
        WireKind::Float32 => {
            let value = if is_null {
                0.0
            } else {
                data.float_at(row)
                    .ok_or_else(|| unsupported_source(col, data))? as f32
            };
            out.extend_from_slice(&value.to_bits().to_le_bytes());
        }
        WireKind::Float64 => {
            let value = if is_null {
                0.0
            } else {
                data.float_at(row)
                    .ok_or_else(|| unsupported_source(col, data))?
            };
            out.extend_from_slice(&value.to_bits().to_le_bytes());
        }
        WireKind::Str { binary } => {
            let ColumnData::Obj(objects) = data else {
                return Err(unsupported_source(col, data));
            };
            if is_null {
                out.extend_from_slice(&0i64.to_le_bytes());
                return Ok(());
            }
            let bytes: &[u8] = match (binary, &objects[row]) {
                (false, CellObject::Str(s)) => s.as_bytes(),
                (true, CellObject::Bytes(b)) => b,
                (true, CellObject::Str(s)) => s.as_bytes(),
                (false, CellObject::Bytes(_)) => {
                    return Err(Error::InvalidData(format!(
                        "expected a string object for {}, got bytes",
                        col.sql_name()
                    )));
                }
            };
            out.extend_from_slice(&(bytes.len() as i64).to_le_bytes());
            out.extend_from_slice(bytes);
        }
    }
    Ok(())
}
