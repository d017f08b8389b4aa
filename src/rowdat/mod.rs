//! ROWDAT_1: the binary row-batch format exchanged with external UDF
//! servers.
//!
//! A buffer is a headerless concatenation of rows: a little-endian
//! `u64` row id, then per column a `u8` NULL marker followed by the
//! column payload (fixed-width numerics, or `i64` length plus bytes for
//! the string family). NULL cells still carry a zeroed payload so
//! per-column strides stay fixed.
//!
//! Colspec type codes are signed: a negative integer code means
//! unsigned, a negative string/blob code means binary payload.

mod column;
mod row;

pub use column::{ColumnData, ColumnarBatch, FormatTag, LoadedColumn, dump_column, load_column};
pub use row::{dump_row, load_row};

use crate::constant::ColumnType;
use crate::error::{Error, Result};

pub(crate) const ALIGN_MSG: &str = "data length does not align with specified column values";

/// A decoded string or blob cell, owned by the codec's object table in
/// columnar mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellObject {
    Str(String),
    Bytes(Vec<u8>),
}

/// Wire shape of one column's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WireKind {
    Int8 { unsigned: bool },
    Int16 { unsigned: bool },
    Int32 { unsigned: bool },
    Int64 { unsigned: bool },
    Float32,
    Float64,
    Year,
    Str { binary: bool },
}

impl WireKind {
    /// Bytes one cell occupies in a columnar data buffer. Strings and
    /// YEAR widen to 8 bytes (handle / u64).
    pub(crate) fn item_size(self) -> usize {
        match self {
            Self::Int8 { .. } => 1,
            Self::Int16 { .. } => 2,
            Self::Int32 { .. } => 4,
            Self::Float32 => 4,
            Self::Int64 { .. } | Self::Float64 | Self::Year | Self::Str { .. } => 8,
        }
    }

    /// Bytes of the fixed-width wire payload; `None` for the
    /// length-prefixed string family.
    pub(crate) fn fixed_wire_size(self) -> Option<usize> {
        match self {
            Self::Int8 { .. } => Some(1),
            Self::Int16 { .. } | Self::Year => Some(2),
            Self::Int32 { .. } | Self::Float32 => Some(4),
            Self::Int64 { .. } | Self::Float64 => Some(8),
            Self::Str { .. } => None,
        }
    }
}

/// One resolved colspec entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResolvedCol {
    pub(crate) column_type: ColumnType,
    pub(crate) kind: WireKind,
}

impl ResolvedCol {
    /// SQL name of the target type, as used in range error messages.
    pub(crate) fn sql_name(&self) -> &'static str {
        let unsigned = matches!(
            self.kind,
            WireKind::Int8 { unsigned: true }
                | WireKind::Int16 { unsigned: true }
                | WireKind::Int32 { unsigned: true }
                | WireKind::Int64 { unsigned: true }
        );
        match (self.column_type, unsigned) {
            (ColumnType::MYSQL_TYPE_TINY, false) => "TINYINT",
            (ColumnType::MYSQL_TYPE_TINY, true) => "UNSIGNED TINYINT",
            (ColumnType::MYSQL_TYPE_SHORT, false) => "SMALLINT",
            (ColumnType::MYSQL_TYPE_SHORT, true) => "UNSIGNED SMALLINT",
            (ColumnType::MYSQL_TYPE_INT24, false) => "MEDIUMINT",
            (ColumnType::MYSQL_TYPE_INT24, true) => "UNSIGNED MEDIUMINT",
            (ColumnType::MYSQL_TYPE_LONG, false) => "INT",
            (ColumnType::MYSQL_TYPE_LONG, true) => "UNSIGNED INT",
            (ColumnType::MYSQL_TYPE_LONGLONG, false) => "BIGINT",
            (ColumnType::MYSQL_TYPE_LONGLONG, true) => "UNSIGNED BIGINT",
            (ColumnType::MYSQL_TYPE_YEAR, _) => "YEAR",
            (ColumnType::MYSQL_TYPE_FLOAT, _) => "FLOAT",
            (ColumnType::MYSQL_TYPE_DOUBLE, _) => "DOUBLE",
            (ColumnType::MYSQL_TYPE_JSON, _) => "JSON",
            (ColumnType::MYSQL_TYPE_GEOMETRY, _) => "GEOMETRY",
            (ColumnType::MYSQL_TYPE_ENUM, _) => "ENUM",
            (ColumnType::MYSQL_TYPE_SET, _) => "SET",
            _ => "TEXT",
        }
    }

    /// Inclusive value range of an integer target; `None` for YEAR's
    /// discontinuous range and non-integer targets.
    fn int_bounds(&self) -> Option<(i128, i128)> {
        match self.kind {
            WireKind::Int8 { unsigned: false } => Some((-128, 127)),
            WireKind::Int8 { unsigned: true } => Some((0, 255)),
            WireKind::Int16 { unsigned: false } => Some((-32_768, 32_767)),
            WireKind::Int16 { unsigned: true } => Some((0, 65_535)),
            WireKind::Int32 { unsigned: false } => {
                if self.column_type == ColumnType::MYSQL_TYPE_INT24 {
                    Some((-8_388_608, 8_388_607))
                } else {
                    Some((-2_147_483_648, 2_147_483_647))
                }
            }
            WireKind::Int32 { unsigned: true } => {
                if self.column_type == ColumnType::MYSQL_TYPE_INT24 {
                    Some((0, 16_777_215))
                } else {
                    Some((0, 4_294_967_295))
                }
            }
            WireKind::Int64 { unsigned: false } => {
                Some((i128::from(i64::MIN), i128::from(i64::MAX)))
            }
            WireKind::Int64 { unsigned: true } => Some((0, i128::from(u64::MAX))),
            _ => None,
        }
    }

    /// Range-check an integer headed for this target type.
    pub(crate) fn check_int_range(&self, value: i128) -> Result<()> {
        let in_range = match self.kind {
            WireKind::Year => (0..=99).contains(&value) || (1901..=2155).contains(&value),
            _ => match self.int_bounds() {
                Some((min, max)) => (min..=max).contains(&value),
                None => false,
            },
        };
        if in_range {
            Ok(())
        } else {
            Err(range_error(self.sql_name()))
        }
    }
}

pub(crate) fn range_error(sql_name: &str) -> Error {
    Error::InvalidData(format!("value is outside the valid range for {sql_name}"))
}

/// Resolve one signed colspec type code.
pub(crate) fn resolve_code(code: i16) -> Result<ResolvedCol> {
    let negated = code < 0;
    let column_type = u8::try_from(code.unsigned_abs())
        .ok()
        .and_then(ColumnType::from_u8)
        .ok_or(Error::UnknownType(i32::from(code)))?;

    let kind = match column_type {
        ColumnType::MYSQL_TYPE_TINY => WireKind::Int8 { unsigned: negated },
        ColumnType::MYSQL_TYPE_SHORT => WireKind::Int16 { unsigned: negated },
        ColumnType::MYSQL_TYPE_LONG | ColumnType::MYSQL_TYPE_INT24 => {
            WireKind::Int32 { unsigned: negated }
        }
        ColumnType::MYSQL_TYPE_LONGLONG => WireKind::Int64 { unsigned: negated },
        ColumnType::MYSQL_TYPE_FLOAT => WireKind::Float32,
        ColumnType::MYSQL_TYPE_DOUBLE => WireKind::Float64,
        ColumnType::MYSQL_TYPE_YEAR => WireKind::Year,
        ty if ty.is_string_like() => WireKind::Str { binary: negated },
        // Reserved codes: the wire format for these is not fixed yet.
        other => {
            return Err(Error::Unsupported(format!(
                "ROWDAT_1 does not support {other:?} columns"
            )));
        }
    };
    Ok(ResolvedCol { column_type, kind })
}

pub(crate) fn resolve_colspec(codes: impl Iterator<Item = i16>) -> Result<Vec<ResolvedCol>> {
    codes.map(resolve_code).collect()
}

/// Bounds-checked linear reader over a ROWDAT_1 buffer.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| Error::InvalidData(ALIGN_MSG.to_string()))?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16_le(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn u64_le(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    pub(crate) fn i64_le(&mut self) -> Result<i64> {
        Ok(self.u64_le()? as i64)
    }

    /// Read a string payload: `i64` length then that many bytes.
    pub(crate) fn str_payload(&mut self) -> Result<&'a [u8]> {
        let len = self.i64_le()?;
        let len = usize::try_from(len).map_err(|_| Error::InvalidData(ALIGN_MSG.to_string()))?;
        self.take(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_codes_flip_sign_and_binary() {
        let col = resolve_code(3).unwrap();
        assert_eq!(col.kind, WireKind::Int32 { unsigned: false });
        let col = resolve_code(-3).unwrap();
        assert_eq!(col.kind, WireKind::Int32 { unsigned: true });

        let col = resolve_code(253).unwrap();
        assert_eq!(col.kind, WireKind::Str { binary: false });
        let col = resolve_code(-253).unwrap();
        assert_eq!(col.kind, WireKind::Str { binary: true });
    }

    #[test]
    fn reserved_codes_are_refused() {
        for code in [0i16, 6, 10, 11, 12, 7, 14, 16, 246] {
            assert!(matches!(resolve_code(code), Err(Error::Unsupported(_))), "{code}");
        }
        assert!(matches!(resolve_code(300), Err(Error::UnknownType(300))));
    }

    #[test]
    fn range_table_bounds() {
        let tiny = resolve_code(1).unwrap();
        assert!(tiny.check_int_range(-128).is_ok());
        assert!(tiny.check_int_range(127).is_ok());
        assert!(tiny.check_int_range(128).is_err());

        let utiny = resolve_code(-1).unwrap();
        assert!(utiny.check_int_range(255).is_ok());
        assert!(utiny.check_int_range(-1).is_err());

        let medium = resolve_code(9).unwrap();
        assert!(medium.check_int_range(8_388_607).is_ok());
        assert!(medium.check_int_range(8_388_608).is_err());
        assert_eq!(medium.sql_name(), "MEDIUMINT");

        let ubig = resolve_code(-8).unwrap();
        assert!(ubig.check_int_range(i128::from(u64::MAX)).is_ok());
        assert!(ubig.check_int_range(i128::from(u64::MAX) + 1).is_err());

        let year = resolve_code(13).unwrap();
        assert!(year.check_int_range(99).is_ok());
        assert!(year.check_int_range(1901).is_ok());
        assert!(year.check_int_range(2155).is_ok());
        assert!(year.check_int_range(100).is_err());
        assert!(year.check_int_range(2156).is_err());
    }

    #[test]
    fn cursor_rejects_reads_past_the_end() {
        let mut cursor = Cursor::new(&[1, 2, 3]);
        assert_eq!(cursor.u16_le().unwrap(), 0x0201);
        let err = cursor.u32_le().unwrap_err();
        assert!(matches!(err, Error::InvalidData(msg) if msg == ALIGN_MSG));
    }
}
