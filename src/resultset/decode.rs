use std::sync::Arc;

use rust_decimal::Decimal;

use crate::constant::{ColumnFlags, ColumnType};
use crate::encoding::decode_text;
use crate::error::{Error, Result};
use crate::opts::RowShape;
use crate::protocol::primitive::read_lcs;
use crate::temporal::{self, Temporal};
use crate::value::{CellInput, LabeledRow, Row, Value};

use super::DecoderState;

/// Decode one row packet: `n_cols` length-coded cells, materialised
/// into the configured row shape.
pub(crate) fn decode_row(state: &DecoderState, payload: &[u8]) -> Result<Row> {
    let mut values = Vec::with_capacity(state.n_cols);
    let mut rest = payload;
    for col in 0..state.n_cols {
        let (cell, tail) = read_lcs(rest);
        rest = tail;
        let value = match cell {
            None => Value::Null,
            Some(raw) => decode_cell(state, col, raw)?,
        };
        values.push(value);
    }
    Ok(match state.results_type {
        RowShape::Tuples => Row::Tuple(values),
        RowShape::Dicts => Row::Dict(state.names.iter().map(Arc::clone).zip(values).collect()),
        RowShape::StructSequences => Row::Struct(LabeledRow {
            fields: Arc::clone(&state.names),
            values,
        }),
        RowShape::NamedTuples => Row::Named(LabeledRow {
            fields: Arc::clone(&state.names),
            values,
        }),
    })
}

/// Numeric cells are ASCII on the wire.
fn ascii_cell(raw: &[u8]) -> Result<&str> {
    simdutf8::basic::from_utf8(raw)
        .map_err(|_| Error::Encoding("non-ASCII bytes in numeric cell".to_string()))
}

fn decode_cell(state: &DecoderState, col: usize, raw: &[u8]) -> Result<Value> {
    let encoding = state.encodings[col];

    if let Some(converter) = &state.converters[col] {
        return if encoding.is_binary() {
            converter(CellInput::Bytes(raw))
        } else {
            let text = decode_text(encoding, raw, state.encoding_errors)?;
            converter(CellInput::Text(&text))
        };
    }

    let code = state.type_codes[col];
    let Some(column_type) = ColumnType::from_u8(code) else {
        return Err(Error::UnknownType(i32::from(code)));
    };

    match column_type {
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => {
            Ok(Value::Decimal(ascii_cell(raw)?.parse::<Decimal>()?))
        }

        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => {
            let text = ascii_cell(raw)?;
            if state.flags[col].contains(ColumnFlags::UNSIGNED_FLAG) {
                Ok(Value::UInt(text.parse::<u64>()?))
            } else {
                Ok(Value::Int(text.parse::<i64>()?))
            }
        }

        ColumnType::MYSQL_TYPE_FLOAT => Ok(Value::Float(ascii_cell(raw)?.parse::<f32>()?)),
        ColumnType::MYSQL_TYPE_DOUBLE => Ok(Value::Double(ascii_cell(raw)?.parse::<f64>()?)),

        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => {
            Ok(match temporal::parse_date(raw) {
                Temporal::Value(date) => Value::Date(date),
                Temporal::Zero => Value::Null,
                Temporal::Invalid => invalid_substitute(state, col, raw),
            })
        }

        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
            Ok(match temporal::parse_datetime(raw) {
                Temporal::Value(dt) => Value::Datetime(dt),
                Temporal::Zero => Value::Null,
                Temporal::Invalid => invalid_substitute(state, col, raw),
            })
        }

        ColumnType::MYSQL_TYPE_TIME => Ok(match temporal::parse_duration(raw) {
            Temporal::Value(delta) => Value::Duration(delta),
            Temporal::Zero => Value::Null,
            Temporal::Invalid => invalid_substitute(state, col, raw),
        }),

        // A NULL-typed column only ever carries NULL cells.
        ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),

        ColumnType::MYSQL_TYPE_BIT
        | ColumnType::MYSQL_TYPE_JSON
        | ColumnType::MYSQL_TYPE_ENUM
        | ColumnType::MYSQL_TYPE_SET
        | ColumnType::MYSQL_TYPE_TINY_BLOB
        | ColumnType::MYSQL_TYPE_MEDIUM_BLOB
        | ColumnType::MYSQL_TYPE_LONG_BLOB
        | ColumnType::MYSQL_TYPE_BLOB
        | ColumnType::MYSQL_TYPE_VARCHAR
        | ColumnType::MYSQL_TYPE_VAR_STRING
        | ColumnType::MYSQL_TYPE_STRING
        | ColumnType::MYSQL_TYPE_GEOMETRY => {
            if encoding.is_binary() {
                Ok(Value::Bytes(raw.to_vec()))
            } else {
                let text = decode_text(encoding, raw, state.encoding_errors)?;
                if column_type == ColumnType::MYSQL_TYPE_JSON && state.parse_json {
                    Ok(Value::Json(serde_json::from_str(&text)?))
                } else {
                    Ok(Value::Str(text.into_owned()))
                }
            }
        }
    }
}

/// A date/time cell that failed validation yields the configured
/// substitute for its type, falling back to the raw text.
fn invalid_substitute(state: &DecoderState, col: usize, raw: &[u8]) -> Value {
    match &state.invalid_values[col] {
        Some(value) => value.clone(),
        None => Value::Str(String::from_utf8_lossy(raw).into_owned()),
    }
}
