//! Text-protocol result-set decoding.
//!
//! A [`ResultSet`] owns the column metadata and the decoder state for
//! one result; the connection is threaded through
//! [`ResultSet::read_rowdata_packet`] rather than stored, so the caller
//! keeps ownership of the socket.

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use crate::conn::Conn;
use crate::constant::{ColumnFlags, ColumnType};
use crate::encoding::{ColumnEncoding, EncodingErrors};
use crate::error::Result;
use crate::opts::{DecodeOptions, RowShape};
use crate::protocol::packet::{self, is_eof_packet, is_err_packet};
use crate::protocol::response::{EofPayload, ErrPayloadBytes};
use crate::stream::ByteSource;
use crate::value::{Converter, Row, Value};

mod decode;

/// Metadata for one result column, as reported by the server plus the
/// caller's per-column decode configuration.
pub struct Field {
    pub name: String,
    pub table_name: String,
    pub type_code: u8,
    pub flags: ColumnFlags,
    /// Decimal scale (the protocol's "decimals" byte).
    pub scale: u8,
    pub encoding: ColumnEncoding,
    /// Optional caller-supplied decode function; replaces the built-in
    /// path for every non-NULL cell of this column.
    pub converter: Option<Converter>,
}

impl Field {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            table_name: String::new(),
            type_code: column_type as u8,
            flags: ColumnFlags::empty(),
            scale: 0,
            encoding: ColumnEncoding::Utf8,
            converter: None,
        }
    }
}

impl std::fmt::Debug for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("table_name", &self.table_name)
            .field("type_code", &self.type_code)
            .field("flags", &self.flags)
            .field("scale", &self.scale)
            .field("encoding", &self.encoding)
            .field("converter", &self.converter.as_ref().map(|_| "fn"))
            .finish()
    }
}

/// Decoder state for one in-flight result set.
///
/// Owned by the [`ResultSet`]; created on the first batch call and
/// discarded at end-of-result or on a connection-breaking error.
pub(crate) struct DecoderState {
    pub(crate) n_cols: usize,
    pub(crate) type_codes: Vec<u8>,
    pub(crate) flags: Vec<ColumnFlags>,
    pub(crate) encodings: Vec<ColumnEncoding>,
    pub(crate) converters: Vec<Option<Converter>>,
    pub(crate) invalid_values: Vec<Option<Value>>,
    pub(crate) names: Arc<[Arc<str>]>,
    pub(crate) encoding_errors: EncodingErrors,
    /// Mirrored back to the connection after every batch.
    pub(crate) next_seq_id: u8,
    pub(crate) n_rows: u64,
    pub(crate) n_rows_in_batch: u64,
    pub(crate) rows: Vec<Row>,
    pub(crate) is_eof: bool,
    pub(crate) unbuffered: bool,
    pub(crate) results_type: RowShape,
    pub(crate) parse_json: bool,
}

impl DecoderState {
    fn new(fields: &[Field], options: &DecodeOptions, next_seq_id: u8) -> Self {
        let names: Arc<[Arc<str>]> = unique_names(fields).into();
        let converters = fields
            .iter()
            .map(|field| {
                let converter = field.converter.clone()?;
                // A converter identical to the default for this type
                // means "no converter": run the built-in fast path.
                match options.default_converters.get(&field.type_code) {
                    Some(default) if Arc::ptr_eq(&converter, default) => None,
                    _ => Some(converter),
                }
            })
            .collect();
        Self {
            n_cols: fields.len(),
            type_codes: fields.iter().map(|f| f.type_code).collect(),
            flags: fields.iter().map(|f| f.flags).collect(),
            encodings: fields.iter().map(|f| f.encoding).collect(),
            converters,
            invalid_values: fields
                .iter()
                .map(|f| options.invalid_values.get(&f.type_code).cloned())
                .collect(),
            names,
            encoding_errors: options.encoding_errors,
            next_seq_id,
            n_rows: 0,
            n_rows_in_batch: 0,
            rows: Vec::new(),
            is_eof: false,
            unbuffered: options.unbuffered,
            results_type: options.results_type,
            parse_json: options.parse_json,
        }
    }
}

/// Column names, made pairwise unique: a later occurrence of a repeated
/// bare name is prefixed with its table name.
fn unique_names(fields: &[Field]) -> Vec<Arc<str>> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(fields.len());
    fields
        .iter()
        .map(|field| {
            let name: Arc<str> = if seen.contains(field.name.as_str()) {
                format!("{}.{}", field.table_name, field.name).into()
            } else {
                field.name.as_str().into()
            };
            seen.insert(field.name.as_str());
            name
        })
        .collect()
}

/// One result set and its decoding progress.
pub struct ResultSet {
    pub fields: Vec<Field>,
    pub options: DecodeOptions,
    /// The drained rows, populated once a buffered read reaches EOF.
    /// `None` while streaming and after an empty final unbuffered batch.
    pub rows: Option<Vec<Row>>,
    pub affected_rows: Option<u64>,
    pub warning_count: u16,
    /// More result sets follow this one (EOF status bit 0x0008).
    pub has_next: bool,
    /// True while an unbuffered result still holds the connection.
    pub unbuffered_active: bool,
    state: Option<DecoderState>,
}

impl ResultSet {
    pub fn new(fields: Vec<Field>, options: DecodeOptions) -> Self {
        Self {
            fields,
            options,
            rows: None,
            affected_rows: None,
            warning_count: 0,
            has_next: false,
            unbuffered_active: false,
            state: None,
        }
    }

    /// The unique column names of this result, available once decoding
    /// has started.
    pub fn column_names(&self) -> Option<&[Arc<str>]> {
        self.state.as_ref().map(|s| &*s.names)
    }

    /// Rows decoded by the current batch of an in-flight result.
    pub fn n_rows_in_batch(&self) -> u64 {
        self.state.as_ref().map_or(0, |s| s.n_rows_in_batch)
    }

    /// Rows decoded so far: the accumulated (or current-batch) rows
    /// while streaming, the drained rows after completion.
    pub fn batch_rows(&self) -> &[Row] {
        match &self.state {
            Some(state) => &state.rows,
            None => self.rows.as_deref().unwrap_or(&[]),
        }
    }

    /// Read one batch of row-data packets.
    ///
    /// `size == 0` drains the result set; `size > 0` reads at most that
    /// many rows and leaves the stream open (the unbuffered pattern).
    /// Returns the batch's rows (cumulative rows for buffered reads);
    /// bookkeeping lands on the result's public fields.
    pub fn read_rowdata_packet<S: ByteSource>(
        &mut self,
        conn: &mut Conn<S>,
        size: usize,
    ) -> Result<&[Row]> {
        self.drive(conn, size)?;
        Ok(self.batch_rows())
    }

    fn drive<S: ByteSource>(&mut self, conn: &mut Conn<S>, size: usize) -> Result<()> {
        if self.state.is_none() {
            self.unbuffered_active = self.options.unbuffered;
            self.state = Some(DecoderState::new(&self.fields, &self.options, conn.next_seq_id));
        } else if size > 0
            && let Some(state) = self.state.as_mut()
        {
            state.rows.clear();
            state.n_rows_in_batch = 0;
        }

        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        if state.is_eof {
            self.state = Some(state);
            return Ok(());
        }

        let mut rows_read = 0usize;
        let mut payload = Vec::new();
        let outcome = loop {
            if size > 0 && rows_read >= size {
                break Ok(());
            }
            if let Err(err) = packet::read_packet(conn, &mut state.next_seq_id, &mut payload) {
                break Err(err);
            }
            if is_err_packet(&payload) {
                tracing::debug!(len = payload.len(), "server error packet in result stream");
                self.unbuffered_active = false;
                conn.next_seq_id = state.next_seq_id;
                // state is dropped here: the result is over
                return Err(ErrPayloadBytes(&payload).into());
            }
            if is_eof_packet(&payload) {
                let eof = EofPayload::parse(&payload);
                tracing::debug!(
                    warnings = eof.warning_count,
                    has_next = eof.has_next(),
                    "end of result set"
                );
                self.warning_count = eof.warning_count;
                self.has_next = eof.has_next();
                self.unbuffered_active = false;
                state.is_eof = true;
                break Ok(());
            }
            match decode::decode_row(&state, &payload) {
                Ok(row) => {
                    state.rows.push(row);
                    state.n_rows += 1;
                    state.n_rows_in_batch += 1;
                    rows_read += 1;
                }
                Err(err) => break Err(err),
            }
        };

        conn.next_seq_id = state.next_seq_id;

        if let Err(err) = outcome {
            // Cell-level conversion errors abort the batch but leave
            // the transport consistent; connection-breaking errors
            // discard the state with the connection.
            if !err.is_conn_broken() {
                self.state = Some(state);
            }
            return Err(err);
        }

        if state.unbuffered {
            if state.is_eof && rows_read == 0 {
                self.rows = None;
                self.affected_rows = Some(state.n_rows);
            } else {
                self.state = Some(state);
            }
        } else {
            self.affected_rows = Some(state.n_rows);
            if state.is_eof {
                self.rows = Some(mem::take(&mut state.rows));
            } else {
                self.state = Some(state);
            }
        }
        Ok(())
    }
}
