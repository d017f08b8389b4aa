//! Row-oriented ROWDAT_1 codec: per-row value tuples in, bytes out, and
//! back.

use crate::error::{Error, Result};
use crate::value::Value;

use super::{Cursor, ResolvedCol, WireKind, resolve_colspec};
#[cfg(test)]
use super::ALIGN_MSG;

/// Decode a ROWDAT_1 buffer into `(row_ids, rows)` using `colspec`, an
/// ordered list of `(name, signed type code)` pairs.
///
/// Each row has the colspec's arity; NULL cells decode to
/// [`Value::Null`] with their placeholder payload consumed.
pub fn load_row(colspec: &[(String, i16)], buf: &[u8]) -> Result<(Vec<u64>, Vec<Vec<Value>>)> {
    let cols = resolve_colspec(colspec.iter().map(|(_, code)| *code))?;

    let mut cursor = Cursor::new(buf);
    let mut row_ids = Vec::new();
    let mut rows = Vec::new();
    while !cursor.is_empty() {
        row_ids.push(cursor.u64_le()?);
        let mut row = Vec::with_capacity(cols.len());
        for col in &cols {
            let is_null = cursor.u8()? != 0;
            // The payload is always present; NULL just discards it.
            let value = read_cell(&mut cursor, col)?;
            row.push(if is_null { Value::Null } else { value });
        }
        rows.push(row);
    }
    Ok((row_ids, rows))
}

fn read_cell(cursor: &mut Cursor<'_>, col: &ResolvedCol) -> Result<Value> {
    Ok(match col.kind {
        WireKind::Int8 { unsigned } => {
            let raw = cursor.u8()?;
            if unsigned {
                Value::UInt(u64::from(raw))
            } else {
                Value::Int(i64::from(raw as i8))
            }
        }
        WireKind::Int16 { unsigned } => {
            let raw = cursor.u16_le()?;
            if unsigned {
                Value::UInt(u64::from(raw))
            } else {
                Value::Int(i64::from(raw as i16))
            }
        }
        WireKind::Int32 { unsigned } => {
            let raw = cursor.u32_le()?;
            if unsigned {
                Value::UInt(u64::from(raw))
            } else {
                Value::Int(i64::from(raw as i32))
            }
        }
        WireKind::Int64 { unsigned } => {
            let raw = cursor.u64_le()?;
            if unsigned {
                Value::UInt(raw)
            } else {
                Value::Int(raw as i64)
            }
        }
        WireKind::Float32 => Value::Float(f32::from_bits(cursor.u32_le()?)),
        WireKind::Float64 => Value::Double(f64::from_bits(cursor.u64_le()?)),
        WireKind::Year => Value::UInt(u64::from(cursor.u16_le()?)),
        WireKind::Str { binary } => {
            let payload = cursor.str_payload()?;
            if binary {
                Value::Bytes(payload.to_vec())
            } else {
                let text = simdutf8::basic::from_utf8(payload).map_err(|_| {
                    Error::Encoding("invalid UTF-8 in ROWDAT_1 string cell".to_string())
                })?;
                Value::Str(text.to_string())
            }
        }
    })
}

/// Encode `(row_ids, rows)` into a ROWDAT_1 buffer. `returns` is the
/// ordered list of signed target type codes.
///
/// NULL cells are written with `is_null = 1` and a zeroed placeholder
/// payload. Integers are range-checked against the target type.
pub fn dump_row(returns: &[i16], row_ids: &[u64], rows: &[Vec<Value>]) -> Result<Vec<u8>> {
    let cols = resolve_colspec(returns.iter().copied())?;
    if row_ids.len() != rows.len() {
        return Err(Error::InvalidData(format!(
            "row id count ({}) does not match row count ({})",
            row_ids.len(),
            rows.len()
        )));
    }

    let mut out = Vec::new();
    for (row_id, row) in row_ids.iter().zip(rows) {
        if row.len() != cols.len() {
            return Err(Error::InvalidData(format!(
                "row has {} values but {} columns were specified",
                row.len(),
                cols.len()
            )));
        }
        out.extend_from_slice(&row_id.to_le_bytes());
        for (col, value) in cols.iter().zip(row) {
            write_cell(&mut out, col, value)?;
        }
    }
    Ok(out)
}

fn write_cell(out: &mut Vec<u8>, col: &ResolvedCol, value: &Value) -> Result<()> {
    if value.is_null() {
        out.push(1);
        match col.kind.fixed_wire_size() {
            Some(width) => out.extend(std::iter::repeat_n(0u8, width)),
            // empty length-prefixed string
            None => out.extend_from_slice(&0i64.to_le_bytes()),
        }
        return Ok(());
    }
    out.push(0);

    match col.kind {
        WireKind::Int8 { .. }
        | WireKind::Int16 { .. }
        | WireKind::Int32 { .. }
        | WireKind::Int64 { .. }
        | WireKind::Year => {
            let v = int_value(col, value)?;
            col.check_int_range(v)?;
            // Truncation below is safe once the range check passed.
            match col.kind.fixed_wire_size() {
                Some(1) => out.push(v as u8),
                Some(2) => out.extend_from_slice(&(v as u16).to_le_bytes()),
                Some(4) => out.extend_from_slice(&(v as u32).to_le_bytes()),
                _ => out.extend_from_slice(&(v as u64).to_le_bytes()),
            }
        }
        WireKind::Float32 => match value {
            Value::Float(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            other => return Err(kind_mismatch(col, other)),
        },
        WireKind::Float64 => match value {
            Value::Double(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            other => return Err(kind_mismatch(col, other)),
        },
        WireKind::Str { binary } => {
            let bytes: &[u8] = match (binary, value) {
                (false, Value::Str(s)) => s.as_bytes(),
                // binary columns take bytes, or a string's UTF-8 verbatim
                (true, Value::Bytes(b)) => b,
                (true, Value::Str(s)) => s.as_bytes(),
                (_, other) => return Err(kind_mismatch(col, other)),
            };
            out.extend_from_slice(&(bytes.len() as i64).to_le_bytes());
            out.extend_from_slice(bytes);
        }
    }
    Ok(())
}

fn int_value(col: &ResolvedCol, value: &Value) -> Result<i128> {
    match value {
        Value::Int(v) => Ok(i128::from(*v)),
        Value::UInt(v) => Ok(i128::from(*v)),
        other => Err(kind_mismatch(col, other)),
    }
}

fn kind_mismatch(col: &ResolvedCol, value: &Value) -> Error {
    Error::InvalidData(format!(
        "cannot encode {} value as {}",
        value_kind(value),
        col.sql_name()
    ))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "NULL",
        Value::Int(_) => "integer",
        Value::UInt(_) => "unsigned integer",
        Value::Float(_) => "float",
        Value::Double(_) => "double",
        Value::Decimal(_) => "decimal",
        Value::Str(_) => "string",
        Value::Bytes(_) => "bytes",
        Value::Date(_) => "date",
        Value::Datetime(_) => "datetime",
        Value::Duration(_) => "duration",
        Value::Json(_) => "json",
    }
}
