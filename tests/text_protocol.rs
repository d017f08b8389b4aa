//! End-to-end decoding of text-protocol result streams from captured
//! wire bytes.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use chrono::{NaiveDate, TimeDelta};
use pretty_assertions::assert_eq;
use s2_rowio::constant::{ColumnFlags, ColumnType};
use s2_rowio::error::Error;
use s2_rowio::protocol::packet::PacketHeader;
use s2_rowio::protocol::primitive::write_bytes_lenenc;
use s2_rowio::resultset::{Field, ResultSet};
use s2_rowio::{ColumnEncoding, Conn, DecodeOptions, Row, RowShape, Value};
use zerocopy::IntoBytes;

fn frame(seq: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + payload.len());
    out.extend_from_slice(PacketHeader::encode(payload.len(), seq).as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Frame each row payload (plus a trailing EOF packet) into a wire
/// capture, sequence numbers starting at `s0`.
fn result_stream(s0: u8, row_payloads: &[Vec<u8>], eof: &[u8]) -> Conn<Cursor<Vec<u8>>> {
    let mut wire = Vec::new();
    let mut seq = s0;
    for payload in row_payloads {
        wire.extend_from_slice(&frame(seq, payload));
        seq = seq.wrapping_add(1);
    }
    wire.extend_from_slice(&frame(seq, eof));
    let mut conn = Conn::new(Cursor::new(wire));
    conn.next_seq_id = s0;
    conn
}

fn row_payload(cells: &[Option<&[u8]>]) -> Vec<u8> {
    let mut out = Vec::new();
    for cell in cells {
        match cell {
            Some(bytes) => write_bytes_lenenc(&mut out, bytes),
            None => out.push(0xFB),
        }
    }
    out
}

const EOF_PLAIN: &[u8] = &[0xFE, 0x00, 0x00, 0x00, 0x00];

fn text_field(name: &str) -> Field {
    Field::new(name, ColumnType::MYSQL_TYPE_VAR_STRING)
}

#[test]
fn single_text_column() {
    // wire payload 05 68 65 6c 6c 6f, then EOF fe 00 00 00 00
    let mut conn = result_stream(0, &[vec![0x05, b'h', b'e', b'l', b'l', b'o']], EOF_PLAIN);
    let mut result = ResultSet::new(vec![text_field("greeting")], DecodeOptions::default());

    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows, vec![Row::Tuple(vec![Value::Str("hello".to_string())])]);
    assert_eq!(result.rows.as_deref().unwrap().len(), 1);
    assert_eq!(result.affected_rows, Some(1));
    assert_eq!(result.warning_count, 0);
    assert!(!result.has_next);
    assert_eq!(conn.next_seq_id, 2);
}

#[test]
fn int_and_null_cells() {
    // payload 01 37 fb = LCS "7" then NULL
    let mut conn = result_stream(0, &[vec![0x01, 0x37, 0xFB]], EOF_PLAIN);
    let mut big = Field::new("n", ColumnType::MYSQL_TYPE_LONGLONG);
    big.flags = ColumnFlags::UNSIGNED_FLAG;
    let fields = vec![big, text_field("s")];
    let mut result = ResultSet::new(fields, DecodeOptions::default());

    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows, vec![Row::Tuple(vec![Value::UInt(7), Value::Null])]);
}

#[test]
fn datetime_with_microseconds() {
    let cell = b"2024-01-02 03:04:05.000006";
    let mut conn = result_stream(0, &[row_payload(&[Some(cell)])], EOF_PLAIN);
    let fields = vec![Field::new("ts", ColumnType::MYSQL_TYPE_DATETIME)];
    let mut result = ResultSet::new(fields, DecodeOptions::default());

    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    let expected = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_micro_opt(3, 4, 5, 6)
        .unwrap();
    assert_eq!(rows, vec![Row::Tuple(vec![Value::Datetime(expected)])]);
}

#[test]
fn negative_time_is_a_duration() {
    let cell = b"-12:34:56.500000";
    let mut conn = result_stream(0, &[row_payload(&[Some(cell)])], EOF_PLAIN);
    let fields = vec![Field::new("t", ColumnType::MYSQL_TYPE_TIME)];
    let mut result = ResultSet::new(fields, DecodeOptions::default());

    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    let micros = -((12 * 3600 + 34 * 60 + 56) * 1_000_000 + 500_000);
    assert_eq!(
        rows,
        vec![Row::Tuple(vec![Value::Duration(TimeDelta::microseconds(
            micros
        ))])]
    );
}

#[test]
fn zero_dates_become_null_and_invalid_dates_substitute() {
    let payloads = vec![
        row_payload(&[Some(b"0000-00-00")]),
        row_payload(&[Some(b"2024-02-30")]),
    ];
    let fields = vec![Field::new("d", ColumnType::MYSQL_TYPE_DATE)];

    // without a substitute, the raw text comes back
    let mut conn = result_stream(0, &payloads, EOF_PLAIN);
    let mut result = ResultSet::new(fields, DecodeOptions::default());
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(
        rows,
        vec![
            Row::Tuple(vec![Value::Null]),
            Row::Tuple(vec![Value::Str("2024-02-30".to_string())]),
        ]
    );

    // with one, the substitute wins
    let mut conn = result_stream(0, &payloads, EOF_PLAIN);
    let mut options = DecodeOptions::default();
    options.invalid_values = HashMap::from([(
        ColumnType::MYSQL_TYPE_DATE as u8,
        Value::Str("<invalid>".to_string()),
    )]);
    let fields = vec![Field::new("d", ColumnType::MYSQL_TYPE_DATE)];
    let mut result = ResultSet::new(fields, options);
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows[1], Row::Tuple(vec![Value::Str("<invalid>".to_string())]));
}

#[test]
fn eof_records_warnings_and_more_results() {
    let eof = [0xFE, 0x03, 0x00, 0x08, 0x00];
    let mut conn = result_stream(0, &[], &eof);
    let mut result = ResultSet::new(vec![text_field("s")], DecodeOptions::default());
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert!(rows.is_empty());
    assert_eq!(result.warning_count, 3);
    assert!(result.has_next);
    assert_eq!(result.affected_rows, Some(0));
}

#[test]
fn buffered_read_drains_and_preserves_order() {
    let payloads: Vec<Vec<u8>> = (0..5)
        .map(|i| row_payload(&[Some(format!("{i}").as_bytes())]))
        .collect();
    let mut conn = result_stream(0, &payloads, EOF_PLAIN);
    let mut result = ResultSet::new(
        vec![Field::new("n", ColumnType::MYSQL_TYPE_LONG)],
        DecodeOptions::default(),
    );
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    let decoded: Vec<i64> = rows
        .iter()
        .map(|row| match row {
            Row::Tuple(values) => match values[0] {
                Value::Int(v) => v,
                _ => panic!("expected int"),
            },
            _ => panic!("expected tuple"),
        })
        .collect();
    assert_eq!(decoded, vec![0, 1, 2, 3, 4]);
    assert_eq!(result.affected_rows, Some(5));
    assert_eq!(conn.next_seq_id, 6);
}

#[test]
fn unbuffered_batches_leave_the_stream_open() {
    let payloads: Vec<Vec<u8>> = (0..3)
        .map(|i| row_payload(&[Some(format!("{i}").as_bytes())]))
        .collect();
    let mut conn = result_stream(0, &payloads, EOF_PLAIN);
    let mut options = DecodeOptions::default();
    options.unbuffered = true;
    let mut result = ResultSet::new(
        vec![Field::new("n", ColumnType::MYSQL_TYPE_LONG)],
        options,
    );

    let rows = result.read_rowdata_packet(&mut conn, 2).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(result.n_rows_in_batch(), 2);
    assert!(result.unbuffered_active);
    assert_eq!(result.rows, None);

    // second batch hits EOF after one row
    let rows = result.read_rowdata_packet(&mut conn, 2).unwrap();
    assert_eq!(rows, vec![Row::Tuple(vec![Value::Int(2)])]);
    assert!(!result.unbuffered_active);

    // the stream is drained; a further batch is empty
    let rows = result.read_rowdata_packet(&mut conn, 2).unwrap();
    assert!(rows.is_empty());
}

#[test]
fn unbuffered_empty_final_batch_finalises_counts() {
    let payloads = vec![row_payload(&[Some(b"1")])];
    let mut conn = result_stream(0, &payloads, EOF_PLAIN);
    let mut options = DecodeOptions::default();
    options.unbuffered = true;
    let mut result = ResultSet::new(
        vec![Field::new("n", ColumnType::MYSQL_TYPE_LONG)],
        options,
    );

    assert_eq!(result.read_rowdata_packet(&mut conn, 1).unwrap().len(), 1);
    // next call reads only the EOF packet
    assert!(result.read_rowdata_packet(&mut conn, 1).unwrap().is_empty());
    assert_eq!(result.rows, None);
    assert_eq!(result.affected_rows, Some(1));
}

#[test]
fn row_shapes() {
    let fields = || {
        vec![
            Field::new("id", ColumnType::MYSQL_TYPE_LONG),
            text_field("name"),
        ]
    };
    let payload = row_payload(&[Some(b"7"), Some(b"ada")]);

    for (shape, check) in [
        (
            RowShape::Dicts,
            Box::new(|row: &Row| {
                assert_eq!(row.get("id"), Some(&Value::Int(7)));
                assert_eq!(row.get("name"), Some(&Value::Str("ada".to_string())));
                assert!(matches!(row, Row::Dict(_)));
            }) as Box<dyn Fn(&Row)>,
        ),
        (
            RowShape::NamedTuples,
            Box::new(|row: &Row| {
                assert!(matches!(row, Row::Named(_)));
                assert_eq!(row.values()[0], Value::Int(7));
                assert_eq!(row.get("name"), Some(&Value::Str("ada".to_string())));
            }),
        ),
        (
            RowShape::StructSequences,
            Box::new(|row: &Row| {
                assert!(matches!(row, Row::Struct(_)));
                assert_eq!(row.values().len(), 2);
            }),
        ),
    ] {
        let mut conn = result_stream(0, &[payload.clone()], EOF_PLAIN);
        let mut options = DecodeOptions::default();
        options.results_type = shape;
        let mut result = ResultSet::new(fields(), options);
        let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
        check(&rows[0]);
    }
}

#[test]
fn duplicate_column_names_are_prefixed_in_dict_rows() {
    let mut a = Field::new("id", ColumnType::MYSQL_TYPE_LONG);
    a.table_name = "users".to_string();
    let mut b = Field::new("id", ColumnType::MYSQL_TYPE_LONG);
    b.table_name = "orders".to_string();

    let payload = row_payload(&[Some(b"1"), Some(b"2")]);
    let mut conn = result_stream(0, &[payload], EOF_PLAIN);
    let mut options = DecodeOptions::default();
    options.results_type = RowShape::Dicts;
    let mut result = ResultSet::new(vec![a, b], options);
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows[0].get("id"), Some(&Value::Int(1)));
    assert_eq!(rows[0].get("orders.id"), Some(&Value::Int(2)));
}

#[test]
fn user_converter_replaces_the_builtin_path() {
    let mut field = Field::new("n", ColumnType::MYSQL_TYPE_LONG);
    field.converter = Some(Arc::new(|input| match input {
        s2_rowio::CellInput::Text(text) => Ok(Value::Str(format!("<{text}>"))),
        s2_rowio::CellInput::Bytes(_) => Ok(Value::Null),
    }));
    let mut conn = result_stream(0, &[row_payload(&[Some(b"7")])], EOF_PLAIN);
    let mut result = ResultSet::new(vec![field], DecodeOptions::default());
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows, vec![Row::Tuple(vec![Value::Str("<7>".to_string())])]);
}

#[test]
fn binary_columns_pass_bytes_through() {
    let mut field = Field::new("b", ColumnType::MYSQL_TYPE_BLOB);
    field.encoding = ColumnEncoding::Binary;
    let raw = [0x00u8, 0xFF, 0x7F];
    let mut conn = result_stream(0, &[row_payload(&[Some(&raw)])], EOF_PLAIN);
    let mut result = ResultSet::new(vec![field], DecodeOptions::default());
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows, vec![Row::Tuple(vec![Value::Bytes(raw.to_vec())])]);
}

#[test]
fn json_cells_parse_when_enabled() {
    let cell = br#"{"a": [1, 2]}"#;
    let fields = || vec![Field::new("j", ColumnType::MYSQL_TYPE_JSON)];

    let mut conn = result_stream(0, &[row_payload(&[Some(cell)])], EOF_PLAIN);
    let mut options = DecodeOptions::default();
    options.parse_json = true;
    let mut result = ResultSet::new(fields(), options);
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    let expected: serde_json::Value = serde_json::json!({"a": [1, 2]});
    assert_eq!(rows, vec![Row::Tuple(vec![Value::Json(expected)])]);

    // disabled: plain text
    let mut conn = result_stream(0, &[row_payload(&[Some(cell)])], EOF_PLAIN);
    let mut result = ResultSet::new(fields(), DecodeOptions::default());
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(
        rows,
        vec![Row::Tuple(vec![Value::Str(
            String::from_utf8_lossy(cell).into_owned()
        )])]
    );
}

#[test]
fn server_error_packet_aborts_the_result() {
    let mut err_payload = vec![0xFF, 0x48, 0x04];
    err_payload.extend_from_slice(b"#HY000No tables used");

    let mut wire = frame(0, &row_payload(&[Some(b"1")]));
    wire.extend_from_slice(&frame(1, &err_payload));
    let mut conn = Conn::new(Cursor::new(wire));

    let mut options = DecodeOptions::default();
    options.unbuffered = true;
    let mut result = ResultSet::new(
        vec![Field::new("n", ColumnType::MYSQL_TYPE_LONG)],
        options,
    );
    let err = result.read_rowdata_packet(&mut conn, 0).unwrap_err();
    match err {
        Error::ServerError(payload) => {
            assert_eq!(payload.error_code, 1096);
            assert_eq!(payload.sql_state, "HY000");
        }
        other => panic!("expected a server error, got {other}"),
    }
    assert!(!result.unbuffered_active);
    assert_eq!(conn.next_seq_id, 2);
}

#[test]
fn unparseable_numeric_cell_is_fatal() {
    let mut conn = result_stream(0, &[row_payload(&[Some(b"not-a-number")])], EOF_PLAIN);
    let mut result = ResultSet::new(
        vec![Field::new("n", ColumnType::MYSQL_TYPE_LONG)],
        DecodeOptions::default(),
    );
    let err = result.read_rowdata_packet(&mut conn, 0).unwrap_err();
    assert!(matches!(err, Error::ParseInt(_)), "{err}");
    assert!(!conn.is_closed());
}

#[test]
fn unknown_type_code_is_refused() {
    let mut field = text_field("x");
    field.type_code = 0x42;
    let mut conn = result_stream(0, &[row_payload(&[Some(b"1")])], EOF_PLAIN);
    let mut result = ResultSet::new(vec![field], DecodeOptions::default());
    let err = result.read_rowdata_packet(&mut conn, 0).unwrap_err();
    assert!(matches!(err, Error::UnknownType(0x42)), "{err}");
}

#[test]
fn sequence_numbers_start_where_the_connection_left_off() {
    // a second result set on the same connection starts at seq 3
    let mut conn = result_stream(3, &[row_payload(&[Some(b"9")])], EOF_PLAIN);
    let mut result = ResultSet::new(
        vec![Field::new("n", ColumnType::MYSQL_TYPE_LONG)],
        DecodeOptions::default(),
    );
    let rows = result.read_rowdata_packet(&mut conn, 0).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(conn.next_seq_id, 5);
}
